use log::debug;

use super::error::Error;
use super::link::SpiLink;
use super::registers::{self, Filter, Oversampling, PowerMode, Standby};
use super::transport::Transport;
use super::variant::DeviceVariant;

/// 采样策略
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// 正常模式，温度x2 压力x16，IIR滤波16，待机0.5ms（室内导航等对噪声敏感的场景）
    #[default]
    ContinuousFiltered,
    /// 正常模式，温度x1 压力x16，不滤波（需要快速响应的场景）
    ContinuousUnfiltered,
    /// 强制模式，温度x1 压力x1，测量一次后自动回到睡眠（气象监测等低功耗场景）
    ForcedSingleShot,
}

impl SamplingPolicy {
    /// CONTROL_HUMID 寄存器值（仅 BME280 写入）
    pub const fn control_humid(self) -> u8 {
        registers::control_humid_byte(Oversampling::X1)
    }

    /// CONFIG 寄存器值
    pub const fn config(self) -> u8 {
        match self {
            SamplingPolicy::ContinuousFiltered => registers::config_byte(Standby::Ms0_5, Filter::X16, false),
            SamplingPolicy::ContinuousUnfiltered | SamplingPolicy::ForcedSingleShot => {
                registers::config_byte(Standby::Ms0_5, Filter::Off, false)
            }
        }
    }

    /// CONTROL 寄存器值
    pub const fn control(self) -> u8 {
        match self {
            SamplingPolicy::ContinuousFiltered => {
                registers::control_byte(Oversampling::X2, Oversampling::X16, PowerMode::Normal)
            }
            SamplingPolicy::ContinuousUnfiltered => {
                registers::control_byte(Oversampling::X1, Oversampling::X16, PowerMode::Normal)
            }
            SamplingPolicy::ForcedSingleShot => {
                registers::control_byte(Oversampling::X1, Oversampling::X1, PowerMode::Forced)
            }
        }
    }
}

/// 让传感器进入睡眠模式并关闭滤波
///
/// 加载校准系数之前调用。
pub fn quiesce<L: SpiLink>(transport: &mut Transport<L>) -> Result<(), Error<L::Error>> {
    transport.write_register(registers::CONFIG, 0x00)?;
    transport.write_register(registers::CONTROL, 0x00)
}

/// 写入采样策略
///
/// 写入顺序固定为 CONTROL_HUMID -> CONFIG -> CONTROL：
/// 湿度过采样设置只在随后写入 CONTROL 时才生效。
pub fn configure_mode<L: SpiLink>(
    transport: &mut Transport<L>,
    variant: DeviceVariant,
    policy: SamplingPolicy,
) -> Result<(), Error<L::Error>> {
    let variant = variant.ensure_supported::<L::Error>()?;

    if variant.has_humidity() {
        transport.write_register(registers::CONTROL_HUMID, policy.control_humid())?;
    }
    transport.write_register(registers::CONFIG, policy.config())?;
    transport.write_register(registers::CONTROL, policy.control())?;

    debug!("采样策略已设置: {:?}", policy);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    /// 只记录写入的链路
    #[derive(Default)]
    struct Recorder {
        writes: Vec<(u8, u8)>,
    }

    impl SpiLink for Recorder {
        type Error = Infallible;

        fn exchange(&mut self, command: u8, write: &[u8], _read: &mut [u8]) -> Result<(), Self::Error> {
            if let Some(value) = write.first() {
                self.writes.push((command, *value));
            }
            Ok(())
        }
    }

    fn configure(variant: DeviceVariant, policy: SamplingPolicy) -> Vec<(u8, u8)> {
        let mut transport = Transport::new(Recorder::default());
        configure_mode(&mut transport, variant, policy).unwrap();
        transport.release().writes
    }

    #[test]
    fn policy_encodings() {
        assert_eq!(
            (SamplingPolicy::ContinuousFiltered.config(), SamplingPolicy::ContinuousFiltered.control()),
            (0x10, 0x57)
        );
        assert_eq!(
            (SamplingPolicy::ContinuousUnfiltered.config(), SamplingPolicy::ContinuousUnfiltered.control()),
            (0x00, 0x3F)
        );
        assert_eq!(
            (SamplingPolicy::ForcedSingleShot.config(), SamplingPolicy::ForcedSingleShot.control()),
            (0x00, 0x25)
        );
        assert_eq!(SamplingPolicy::ForcedSingleShot.control_humid(), 0x01);
    }

    #[test]
    fn full_variant_writes_humidity_control_first() {
        // 写命令的最高位清 0: 0xF2 -> 0x72, 0xF5 -> 0x75, 0xF4 -> 0x74
        assert_eq!(
            configure(DeviceVariant::Full, SamplingPolicy::ContinuousFiltered),
            vec![(0x72, 0x01), (0x75, 0x10), (0x74, 0x57)]
        );
    }

    #[test]
    fn basic_variant_skips_humidity_control() {
        assert_eq!(
            configure(DeviceVariant::Basic, SamplingPolicy::ForcedSingleShot),
            vec![(0x75, 0x00), (0x74, 0x25)]
        );
    }

    #[test]
    fn unsupported_variant_is_refused_without_bus_traffic() {
        let mut transport = Transport::new(Recorder::default());
        let result = configure_mode(
            &mut transport,
            DeviceVariant::Unsupported { chip_id: 0x57 },
            SamplingPolicy::ContinuousUnfiltered,
        );

        assert!(matches!(result, Err(Error::DeviceAbsentOrUnsupported { chip_id: 0x57 })));
        assert!(transport.release().writes.is_empty());
    }

    #[test]
    fn quiesce_puts_the_sensor_to_sleep() {
        let mut transport = Transport::new(Recorder::default());
        quiesce(&mut transport).unwrap();
        assert_eq!(transport.release().writes, vec![(0x75, 0x00), (0x74, 0x00)]);
    }
}
