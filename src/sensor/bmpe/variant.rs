use log::{info, warn};

use super::error::Error;
use super::link::SpiLink;
use super::registers;
use super::transport::Transport;

/// 探测到的传感器型号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceVariant {
    /// 芯片ID不受支持（包括 BMP280 的工程样片 0x56/0x57），或者总线上根本没有设备
    Unsupported { chip_id: u8 },
    /// BMP280: 温度 + 压力
    Basic,
    /// BME280: 温度 + 压力 + 湿度
    Full,
}

impl DeviceVariant {
    pub fn from_chip_id(chip_id: u8) -> Self {
        match chip_id {
            registers::CHIP_ID_BASIC => DeviceVariant::Basic,
            registers::CHIP_ID_FULL => DeviceVariant::Full,
            _ => DeviceVariant::Unsupported { chip_id },
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, DeviceVariant::Unsupported { .. })
    }

    pub fn has_humidity(self) -> bool {
        self == DeviceVariant::Full
    }

    /// 后续所有操作的入口检查，不受支持的型号直接拒绝
    pub(crate) fn ensure_supported<E: std::fmt::Debug>(self) -> Result<Self, Error<E>> {
        match self {
            DeviceVariant::Unsupported { chip_id } => Err(Error::DeviceAbsentOrUnsupported { chip_id }),
            supported => Ok(supported),
        }
    }
}

/// 读取芯片ID寄存器，判断接入的型号
pub fn identify<L: SpiLink>(transport: &mut Transport<L>) -> Result<DeviceVariant, Error<L::Error>> {
    let chip_id = transport.read_register(registers::CHIP_ID)?;
    let variant = DeviceVariant::from_chip_id(chip_id);

    match variant {
        DeviceVariant::Unsupported { chip_id } => warn!("不受支持的芯片ID: {:#04x}", chip_id),
        DeviceVariant::Basic => info!("检测到 BMP280 (芯片ID {:#04x})", chip_id),
        DeviceVariant::Full => info!("检测到 BME280 (芯片ID {:#04x})", chip_id),
    }

    Ok(variant)
}
