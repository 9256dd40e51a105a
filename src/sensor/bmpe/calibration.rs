use super::error::Error;
use super::link::SpiLink;
use super::registers;
use super::transport::Transport;
use super::variant::DeviceVariant;

/// 湿度校准系数（仅 BME280）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HumidityCalibration {
    /// 0xA1
    pub h1: u8,
    /// 0xE1-0xE2 (小端序)
    pub h2: i16,
    /// 0xE3
    pub h3: u8,
    /// 0xE4[7:0] << 4 | 0xE5[3:0]
    pub h4: i16,
    /// 0xE6[7:0] << 4 | 0xE5[7:4]
    pub h5: i16,
    /// 0xE7
    pub h6: i8,
}

impl HumidityCalibration {
    /// 从 0xA1 与 0xE1..=0xE7 的原始字节解包
    ///
    /// H4/H5 跨寄存器按半字节拼接，布局由厂商寄存器表固定；
    /// 拼接结果是12位无符号数，高字节不做符号扩展。
    pub fn unpack(h1: u8, regs: [u8; 7]) -> Self {
        let [e1, e2, e3, e4, e5, e6, e7] = regs;

        Self {
            h1,
            h2: i16::from_le_bytes([e1, e2]),
            h3: e3,
            h4: ((e4 as i16) << 4) | (e5 & 0x0F) as i16,
            h5: ((e6 as i16) << 4) | (e5 >> 4) as i16,
            h6: e7 as i8,
        }
    }
}

/// 工厂校准系数
///
/// 上电后从 NVM 读出一次，会话期间不再变化；设备重新初始化时整体重新加载。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationProfile {
    // 温度校准参数组 0x88-0x8D
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,

    // 压力校准参数组 0x8E-0x9F
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,

    /// BMP280 上为 `None`
    pub humidity: Option<HumidityCalibration>,
}

impl CalibrationProfile {
    /// 读取校准系数
    ///
    /// - 调用前设备必须处于睡眠模式，校准寄存器只在非测量期间保证稳定
    /// - 任何一次读取失败都会让整个加载失败，不会留下只加载了一半的系数
    pub fn load<L: SpiLink>(transport: &mut Transport<L>, variant: DeviceVariant) -> Result<Self, Error<L::Error>> {
        let variant = variant.ensure_supported::<L::Error>()?;

        let mut profile = Self {
            t1: transport.read_u16_le(registers::CALIB_T1)?,
            t2: transport.read_i16_le(registers::CALIB_T2)?,
            t3: transport.read_i16_le(registers::CALIB_T3)?,

            p1: transport.read_u16_le(registers::CALIB_P1)?,
            p2: transport.read_i16_le(registers::CALIB_P2)?,
            p3: transport.read_i16_le(registers::CALIB_P3)?,
            p4: transport.read_i16_le(registers::CALIB_P4)?,
            p5: transport.read_i16_le(registers::CALIB_P5)?,
            p6: transport.read_i16_le(registers::CALIB_P6)?,
            p7: transport.read_i16_le(registers::CALIB_P7)?,
            p8: transport.read_i16_le(registers::CALIB_P8)?,
            p9: transport.read_i16_le(registers::CALIB_P9)?,

            humidity: None,
        };

        if variant.has_humidity() {
            let h1 = transport.read_register(registers::CALIB_H1)?;
            let h2 = transport.read_u16_le(registers::CALIB_H2)?.to_le_bytes();
            let regs = [
                h2[0],
                h2[1],
                transport.read_register(registers::CALIB_H3)?,
                transport.read_register(registers::CALIB_H4)?,
                transport.read_register(registers::CALIB_H5)?,
                transport.read_register(registers::CALIB_H5 + 1)?,
                transport.read_register(registers::CALIB_H6)?,
            ];
            profile.humidity = Some(HumidityCalibration::unpack(h1, regs));
        }

        Ok(profile)
    }
}
