use std::fmt::Debug;

/// BMPE 驱动错误
///
/// `E` 为底层链路（硬件SPI或软件模拟SPI）的错误类型。
/// 校准异常（压力除数为0）与 BMP280 读取湿度都不算错误，分别返回 0Pa 与 0%RH。
#[derive(Debug, thiserror::Error)]
pub enum Error<E: Debug> {
    /// 链路传输失败（协议本身没有应答与校验，这里只能反映引脚/外设层面的失败）
    #[error("SPI通信失败: {0:?}")]
    Bus(E),
    /// 芯片ID既不是 BMP280 也不是 BME280，之后的所有操作都会被拒绝
    #[error("未检测到受支持的传感器, 芯片ID: {chip_id:#04x}")]
    DeviceAbsentOrUnsupported { chip_id: u8 },
    /// 在同一组原始数据上尚未做温度补偿就请求了压力/湿度补偿
    #[error("必须先对同一组原始数据完成温度补偿")]
    StaleState,
    /// 软复位后校准数据仍在从 NVM 复制
    #[error("传感器正在更新校准数据")]
    CalibrationBusy,
    /// 参考气压不是大于 0 的有限值
    #[error("参考气压无效: {0}Pa")]
    InvalidReference(f32),
}
