//! 树莓派 BMP280/BME280 SPI 传感器驱动

pub mod bus_config;
pub mod sensor;
pub mod shared_spi;
