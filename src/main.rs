use std::sync::{Arc, Mutex};
use std::{thread, time::Duration};

use bmpe_sensor::bus_config::{BusConfig, SPI0_CE0_PIN};
use bmpe_sensor::sensor::bmpe::{BMPE, SamplingPolicy};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

/// 第二个传感器的片选（CE1）
const SECOND_CS_PIN: u8 = 7;
/// SPI时钟频率
const SPI_CLOCK_HZ: u32 = 1_000_000;

/// 两个传感器共用SPI0，测量两处的相对高度
///
/// 启动时以第一个传感器的气压作为两者共同的参考气压面，
/// 之后第二个传感器读到的高度就是它相对第一个传感器的高度差。
fn main() -> anyhow::Result<()> {
    env_logger::init();
    println!("⚡ 相对高度测量程序");

    // 初始化SPI通信总线
    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)?;
    let spi_handle = Arc::new(Mutex::new(spi));

    // 两个传感器挂接在同一条总线上
    let base_link = BusConfig::hardware(SPI0_CE0_PIN, SPI_CLOCK_HZ).open_shared(spi_handle.clone())?;
    let rover_link = BusConfig::hardware(SECOND_CS_PIN, SPI_CLOCK_HZ).open_shared(spi_handle)?;

    let mut base = BMPE::new(base_link, SamplingPolicy::ContinuousFiltered)?;
    let mut rover = BMPE::new(rover_link, SamplingPolicy::ContinuousFiltered)?;

    // 等待第一次测量完成
    thread::sleep(Duration::from_millis(100));

    // 基准点气压作为参考
    let reference = base.set_reference_from_current_reading()?;
    rover.set_reference_pressure(reference)?;
    println!("✅ 参考气压: {:.2}Pa", reference);

    // 死循环读取传感器
    loop {
        match rover.read_altitude() {
            Ok(height) => {
                println!("✅ 相对高度: {:.2}m", height);
            }
            Err(e) => {
                eprintln!("❌ 读取失败: {}", e);
            }
        }

        thread::sleep(Duration::from_secs(1));
    }
}
