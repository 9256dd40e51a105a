use std::sync::{Arc, Mutex};

use embedded_hal::digital;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::sensor::bmpe::{BitBangSpi, HardwareSpi, SpiLink};
use crate::shared_spi::{SharedSpiDevice, SharedSpiError};

/// SPI0 默认引脚（BCM编号）
pub const SPI0_CE0_PIN: u8 = 8;
pub const SPI0_SCLK_PIN: u8 = 11;
pub const SPI0_MOSI_PIN: u8 = 10;
pub const SPI0_MISO_PIN: u8 = 9;

/// 传输方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// 树莓派 SPI0 外设，片选由GPIO控制
    Hardware,
    /// 4个普通GPIO模拟SPI
    BitBang,
}

/// 传感器接线配置
///
/// 硬件模式下只有 `cs` 与 `clock_hz` 生效，时钟和数据线固定为 SPI0 的引脚。
/// 片选始终作为普通GPIO输出，整帧读写期间保持低电平。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// 片选
    pub cs: u8,
    /// 时钟
    pub sck: u8,
    /// 主机输出
    pub mosi: u8,
    /// 主机输入
    pub miso: u8,
    /// SPI时钟频率（仅硬件模式），传感器最高支持10MHz
    pub clock_hz: u32,
    /// 传输方式
    pub mode: TransferMode,
}

impl BusConfig {
    /// SPI0 外设配置
    pub const fn hardware(cs: u8, clock_hz: u32) -> Self {
        Self {
            cs,
            sck: SPI0_SCLK_PIN,
            mosi: SPI0_MOSI_PIN,
            miso: SPI0_MISO_PIN,
            clock_hz,
            mode: TransferMode::Hardware,
        }
    }

    /// 软件模拟SPI配置
    pub const fn bit_bang(cs: u8, sck: u8, mosi: u8, miso: u8) -> Self {
        Self {
            cs,
            sck,
            mosi,
            miso,
            clock_hz: 0,
            mode: TransferMode::BitBang,
        }
    }

    /// 检查引脚分配
    fn validate(&self) -> anyhow::Result<()> {
        let pins = [self.cs, self.sck, self.mosi, self.miso];
        for (index, pin) in pins.iter().enumerate() {
            if pins[index + 1..].contains(pin) {
                return Err(anyhow::anyhow!("GPIO{} 被重复分配", pin));
            }
        }

        if self.mode == TransferMode::Hardware && self.clock_hz == 0 {
            return Err(anyhow::anyhow!("SPI时钟频率不能为0"));
        }

        Ok(())
    }

    /// 按配置打开链路
    pub fn open(&self) -> anyhow::Result<RpiSpiLink> {
        match self.mode {
            TransferMode::Hardware => {
                self.validate()?;
                let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, self.clock_hz, Mode::Mode0)?;
                self.open_shared(Arc::new(Mutex::new(spi)))
            }
            TransferMode::BitBang => {
                self.validate()?;
                let gpio = Gpio::new()?;
                let link = BitBangSpi::new(
                    gpio.get(self.cs)?.into_output_high(),
                    gpio.get(self.sck)?.into_output_low(),
                    gpio.get(self.mosi)?.into_output_low(),
                    gpio.get(self.miso)?.into_input(),
                )
                .map_err(|err| anyhow::anyhow!("软件SPI引脚初始化失败: {:?}", err))?;

                Ok(RpiSpiLink::BitBang(link))
            }
        }
    }

    /// 在已打开的 SPI0 总线上挂接一个设备（多个传感器共用总线时使用）
    pub fn open_shared(&self, spi_handle: Arc<Mutex<Spi>>) -> anyhow::Result<RpiSpiLink> {
        if self.mode != TransferMode::Hardware {
            return Err(anyhow::anyhow!("软件模拟SPI不能共享硬件总线"));
        }

        let gpio = Gpio::new()?;
        let device = SharedSpiDevice::new(spi_handle, gpio.get(self.cs)?.into_output_high())?;

        Ok(RpiSpiLink::Hardware(HardwareSpi::new(device)))
    }
}

/// 树莓派上可用的两种链路
pub enum RpiSpiLink {
    Hardware(HardwareSpi<SharedSpiDevice<Spi, OutputPin>>),
    BitBang(BitBangSpi<OutputPin, OutputPin, OutputPin, InputPin>),
}

/// 树莓派链路错误
#[derive(Debug, thiserror::Error)]
pub enum RpiLinkError {
    #[error("{0}")]
    Hardware(#[from] SharedSpiError),
    #[error("软件SPI引脚操作失败: {0:?}")]
    BitBang(digital::ErrorKind),
}

impl SpiLink for RpiSpiLink {
    type Error = RpiLinkError;

    fn exchange(&mut self, command: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        match self {
            RpiSpiLink::Hardware(link) => Ok(link.exchange(command, write, read)?),
            RpiSpiLink::BitBang(link) => link.exchange(command, write, read).map_err(RpiLinkError::BitBang),
        }
    }
}
