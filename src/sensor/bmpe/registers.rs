//! BMP280/BME280 寄存器地址与控制字节编码
//!
//! 地址均为传感器内部寄存器地址（SPI 命令字节的低 7 位），
//! 读命令把最高位置 1，写命令把最高位清 0。

/// 芯片ID寄存器
pub const CHIP_ID: u8 = 0xD0;
/// 软复位寄存器
pub const SOFT_RESET: u8 = 0xE0;
/// 写入软复位寄存器即可触发上电复位流程的魔数
pub const SOFT_RESET_COMMAND: u8 = 0xB6;

/// 温度/压力校准系数 T1..T3, P1..P9（小端序，每个 2 字节）
pub const CALIB_T1: u8 = 0x88;
pub const CALIB_T2: u8 = 0x8A;
pub const CALIB_T3: u8 = 0x8C;
pub const CALIB_P1: u8 = 0x8E;
pub const CALIB_P2: u8 = 0x90;
pub const CALIB_P3: u8 = 0x92;
pub const CALIB_P4: u8 = 0x94;
pub const CALIB_P5: u8 = 0x96;
pub const CALIB_P6: u8 = 0x98;
pub const CALIB_P7: u8 = 0x9A;
pub const CALIB_P8: u8 = 0x9C;
pub const CALIB_P9: u8 = 0x9E;

/// 湿度校准系数（仅 BME280）
pub const CALIB_H1: u8 = 0xA1;
pub const CALIB_H2: u8 = 0xE1;
pub const CALIB_H3: u8 = 0xE3;
pub const CALIB_H4: u8 = 0xE4;
pub const CALIB_H5: u8 = 0xE5;
pub const CALIB_H6: u8 = 0xE7;

/// 湿度过采样寄存器（仅 BME280）
pub const CONTROL_HUMID: u8 = 0xF2;
/// 状态寄存器
pub const STATUS: u8 = 0xF3;
/// 温度/压力过采样 + 电源模式寄存器
pub const CONTROL: u8 = 0xF4;
/// 待机时间 / IIR滤波器 / 3线SPI 寄存器
pub const CONFIG: u8 = 0xF5;

/// 测量数据起始地址，突发读取顺序为 压力(3) 温度(3) 湿度(2)
pub const PRESSURE_DATA: u8 = 0xF7;
pub const TEMPERATURE_DATA: u8 = 0xFA;
pub const HUMIDITY_DATA: u8 = 0xFD;

/// BMP280 芯片ID（温度+压力）
pub const CHIP_ID_BASIC: u8 = 0x58;
/// BME280 芯片ID（温度+压力+湿度）
pub const CHIP_ID_FULL: u8 = 0x60;

/// 过采样倍数字段（CONTROL.7:5, CONTROL.4:2, CONTROL_HUMID.2:0 共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    Skip = 0b000,
    X1 = 0b001,
    X2 = 0b010,
    X4 = 0b011,
    X8 = 0b100,
    X16 = 0b101,
}

/// 电源模式字段（CONTROL.1:0）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerMode {
    Sleep = 0b00,
    Forced = 0b01,
    Normal = 0b11,
}

/// 正常模式下两次测量之间的待机时间（CONFIG.7:5）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Standby {
    Ms0_5 = 0b000,
    Ms62_5 = 0b001,
    Ms125 = 0b010,
    Ms250 = 0b011,
    Ms500 = 0b100,
    Ms1000 = 0b101,
    Ms10 = 0b110,
    Ms20 = 0b111,
}

/// IIR 滤波器系数（CONFIG.4:2）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Filter {
    Off = 0b000,
    X2 = 0b001,
    X4 = 0b010,
    X8 = 0b011,
    X16 = 0b100,
}

/// 组装 CONTROL 寄存器: osrs_t[7:5] osrs_p[4:2] mode[1:0]
pub const fn control_byte(temperature: Oversampling, pressure: Oversampling, mode: PowerMode) -> u8 {
    ((temperature as u8) << 5) | ((pressure as u8) << 2) | mode as u8
}

/// 组装 CONFIG 寄存器: t_sb[7:5] filter[4:2] spi3w_en[0]
pub const fn config_byte(standby: Standby, filter: Filter, spi3w: bool) -> u8 {
    ((standby as u8) << 5) | ((filter as u8) << 2) | spi3w as u8
}

/// 组装 CONTROL_HUMID 寄存器: osrs_h[2:0]
pub const fn control_humid_byte(humidity: Oversampling) -> u8 {
    humidity as u8
}

/// 传感器状态寄存器解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// 第3位: 正在进行转换
    pub measuring: bool,
    /// 第0位: NVM 数据正在复制到影子寄存器
    pub im_update: bool,
}

impl From<u8> for Status {
    fn from(data: u8) -> Self {
        Self {
            measuring: data & 0b0000_1000 != 0,
            im_update: data & 0b0000_0001 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_bytes_match_datasheet_layout() {
        assert_eq!(control_byte(Oversampling::X2, Oversampling::X16, PowerMode::Normal), 0x57);
        assert_eq!(control_byte(Oversampling::X1, Oversampling::X16, PowerMode::Normal), 0x3F);
        assert_eq!(control_byte(Oversampling::X1, Oversampling::X1, PowerMode::Forced), 0x25);
        assert_eq!(control_byte(Oversampling::Skip, Oversampling::Skip, PowerMode::Sleep), 0x00);
    }

    #[test]
    fn config_byte_places_filter_and_standby() {
        assert_eq!(config_byte(Standby::Ms0_5, Filter::X16, false), 0x10);
        assert_eq!(config_byte(Standby::Ms1000, Filter::Off, true), 0xA1);
    }

    #[test]
    fn status_bits() {
        assert_eq!(Status::from(0x09), Status { measuring: true, im_update: true });
        assert_eq!(Status::from(0x00), Status { measuring: false, im_update: false });
    }
}
