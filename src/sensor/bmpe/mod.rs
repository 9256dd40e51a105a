//! BMP280 / BME280 SPI 驱动
//!
//! 两款传感器寄存器布局相同，BME280 多一路湿度测量。
//! 上电后按 识别型号 -> 进入睡眠 -> 读取校准系数 -> 写入采样策略 的顺序初始化，
//! 之后每次读取都是一次突发读取加上补偿计算。

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

mod altitude;
mod calibration;
mod compensation;
mod error;
mod link;
mod mode;
pub mod registers;
mod transport;
mod variant;

pub use altitude::{STANDARD_ATMOSPHERE_PA, altitude};
pub use calibration::{CalibrationProfile, HumidityCalibration};
pub use compensation::{CompensationState, FineTemperature, Strategy};
pub use error::Error;
pub use link::{BitBangSpi, HardwareSpi, SpiLink};
pub use mode::{SamplingPolicy, configure_mode, quiesce};
pub use registers::Status;
pub use transport::{BurstLength, BurstWords, Transport};
pub use variant::{DeviceVariant, identify};

/// 一次突发读取得到的原始数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// 0xF7-0xF9，高 20 位为 ADC 结果
    pub pressure: u32,
    /// 0xFA-0xFC，高 20 位为 ADC 结果
    pub temperature: u32,
    /// 0xFD-0xFE，仅 BME280
    pub humidity: Option<u32>,
}

/// 补偿后的一组测量结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompensatedReading {
    /// 温度【℃】
    pub temperature: f32,
    /// 空气压力【Pa】
    pub pressure: f32,
    /// 相对湿度【%RH】，BMP280 上恒为 0
    pub humidity: f32,
    /// 相对参考气压面的高度【m】
    pub altitude: f32,
}

/// BMP280/BME280 传感器会话
///
/// 持有链路、型号、校准系数与补偿状态，所有读取都通过它完成。
/// 补偿状态只在会话内部顺序使用，不能在线程之间共享同一个会话。
pub struct BMPE<L> {
    /// 寄存器传输层
    transport: Transport<L>,
    /// 探测到的型号（只会是 Basic 或 Full）
    variant: DeviceVariant,
    /// 工厂校准系数
    calib: CalibrationProfile,
    /// 补偿算法
    strategy: Strategy,
    /// 最近一次温度补偿的 t_fine
    state: CompensationState,
    /// 采样策略
    policy: SamplingPolicy,
    /// 高度计算的参考气压【Pa】
    reference_pressure: f32,
}

/// 初始化流程，构建会话与重新初始化共用
fn setup<L: SpiLink>(
    transport: &mut Transport<L>,
    policy: SamplingPolicy,
) -> Result<(DeviceVariant, CalibrationProfile), Error<L::Error>> {
    // 识别型号，不受支持的芯片直接拒绝
    let variant = identify(transport)?.ensure_supported::<L::Error>()?;

    // 校准寄存器只在睡眠模式下读取
    quiesce(transport)?;

    // 读取校准系数
    let calib = CalibrationProfile::load(transport, variant)?;
    debug!("校准系数: {:?}", calib);

    // 写入采样策略
    configure_mode(transport, variant, policy)?;

    Ok((variant, calib))
}

impl<L: SpiLink> BMPE<L> {
    /// 创建传感器会话，使用定点补偿算法
    pub fn new(link: L, policy: SamplingPolicy) -> Result<Self, Error<L::Error>> {
        Self::with_strategy(link, policy, Strategy::FixedPoint)
    }

    /// 创建传感器会话并指定补偿算法
    pub fn with_strategy(link: L, policy: SamplingPolicy, strategy: Strategy) -> Result<Self, Error<L::Error>> {
        let mut transport = Transport::new(link);
        let (variant, calib) = setup(&mut transport, policy)?;

        Ok(Self {
            transport,
            variant,
            calib,
            strategy,
            state: CompensationState::default(),
            policy,
            reference_pressure: STANDARD_ATMOSPHERE_PA,
        })
    }

    /// 当前型号，重新初始化失败后为 [`DeviceVariant::Unsupported`]
    pub fn variant(&self) -> DeviceVariant {
        self.variant
    }

    /// 最近一次成功加载的校准系数
    pub fn calibration(&self) -> &CalibrationProfile {
        &self.calib
    }

    /// 采样策略
    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    /// 当前使用的补偿算法
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// 会话是否可用，设备缺失时拒绝所有测量相关的操作
    fn ensure_ready(&self) -> Result<DeviceVariant, Error<L::Error>> {
        self.variant.ensure_supported::<L::Error>()
    }

    /// 切换补偿算法
    ///
    /// 之前得到的 t_fine 属于旧算法，一并作废。
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
        self.state.clear();
    }

    /// 读取状态寄存器
    ///
    /// 不检查型号，重新初始化失败后仍可用来轮询 `im_update`。
    pub fn status(&mut self) -> Result<Status, Error<L::Error>> {
        Ok(Status::from(self.transport.read_register(registers::STATUS)?))
    }

    /// 读取原始数据
    ///
    /// - 从 0xF7 开始一次读出 压力、温度（以及 BME280 的湿度）
    pub fn read_raw(&mut self) -> Result<RawSample, Error<L::Error>> {
        let length = if self.ensure_ready()?.has_humidity() {
            BurstLength::Eight
        } else {
            BurstLength::Six
        };
        let words = self.transport.read_burst(registers::PRESSURE_DATA, length)?;

        Ok(RawSample {
            pressure: words.first(),
            temperature: words.second().unwrap_or_default(),
            humidity: words.third(),
        })
    }

    /// 温度补偿，同时记录 t_fine 供同一组数据的压力/湿度补偿使用
    pub fn compensate_temperature(&mut self, raw: &RawSample) -> Result<f32, Error<L::Error>> {
        self.ensure_ready()?;

        let (temperature, fine) = self.strategy.temperature(&self.calib, raw.temperature);
        self.state.record(raw.temperature, fine);
        Ok(temperature)
    }

    /// 压力补偿
    ///
    /// - 必须先对同一组数据调用 [`Self::compensate_temperature`]，否则返回 [`Error::StaleState`]
    pub fn compensate_pressure(&self, raw: &RawSample) -> Result<f32, Error<L::Error>> {
        self.ensure_ready()?;
        let fine = self.state.fine_for(raw.temperature).ok_or(Error::StaleState)?;
        Ok(self.strategy.pressure(&self.calib, raw.pressure, fine))
    }

    /// 湿度补偿
    ///
    /// - BMP280 或者数据中没有湿度值时返回 0
    /// - 必须先对同一组数据调用 [`Self::compensate_temperature`]，否则返回 [`Error::StaleState`]
    pub fn compensate_humidity(&self, raw: &RawSample) -> Result<f32, Error<L::Error>> {
        let variant = self.ensure_ready()?;
        let Some(adc_h) = raw.humidity.filter(|_| variant.has_humidity()) else {
            return Ok(0.0);
        };
        let fine = self.state.fine_for(raw.temperature).ok_or(Error::StaleState)?;
        Ok(self.strategy.humidity(&self.calib, adc_h, fine))
    }

    /// 读取温度【℃】
    pub fn read_temperature(&mut self) -> Result<f32, Error<L::Error>> {
        self.ensure_ready()?;
        let words = self
            .transport
            .read_burst(registers::TEMPERATURE_DATA, BurstLength::Three)?;
        let raw = RawSample {
            pressure: 0,
            temperature: words.first(),
            humidity: None,
        };

        self.compensate_temperature(&raw)
    }

    /// 读取压力+温度两个原始值
    fn read_pressure_sample(&mut self) -> Result<RawSample, Error<L::Error>> {
        self.ensure_ready()?;
        let words = self.transport.read_burst(registers::PRESSURE_DATA, BurstLength::Six)?;

        Ok(RawSample {
            pressure: words.first(),
            temperature: words.second().unwrap_or_default(),
            humidity: None,
        })
    }

    /// 读取空气压力【Pa】
    pub fn read_pressure(&mut self) -> Result<f32, Error<L::Error>> {
        let raw = self.read_pressure_sample()?;
        self.compensate_temperature(&raw)?;
        self.compensate_pressure(&raw)
    }

    /// 读取相对湿度【%RH】
    ///
    /// - BMP280 直接返回 0，不产生总线访问
    pub fn read_humidity(&mut self) -> Result<f32, Error<L::Error>> {
        if !self.ensure_ready()?.has_humidity() {
            return Ok(0.0);
        }

        let raw = self.read_raw()?;
        self.compensate_temperature(&raw)?;
        self.compensate_humidity(&raw)
    }

    /// 读取相对参考气压面的高度【m】
    pub fn read_altitude(&mut self) -> Result<f32, Error<L::Error>> {
        let pressure = self.read_pressure()?;
        Ok(altitude(pressure, self.reference_pressure))
    }

    /// 一次突发读取，返回全部补偿结果
    pub fn read_all(&mut self) -> Result<CompensatedReading, Error<L::Error>> {
        let raw = self.read_raw()?;

        // 温度必须最先补偿
        let temperature = self.compensate_temperature(&raw)?;
        let pressure = self.compensate_pressure(&raw)?;
        let humidity = self.compensate_humidity(&raw)?;

        Ok(CompensatedReading {
            temperature,
            pressure,
            humidity,
            altitude: altitude(pressure, self.reference_pressure),
        })
    }

    /// 高度计算使用的参考气压【Pa】
    pub fn reference_pressure(&self) -> f32 {
        self.reference_pressure
    }

    /// 手动设置参考气压【Pa】
    ///
    /// - 必须是大于 0 的有限值，否则返回 [`Error::InvalidReference`]，原参考值保持不变
    pub fn set_reference_pressure(&mut self, pressure: f32) -> Result<(), Error<L::Error>> {
        if !pressure.is_finite() || pressure <= 0.0 {
            warn!("拒绝无效的参考气压: {}Pa", pressure);
            return Err(Error::InvalidReference(pressure));
        }

        self.reference_pressure = pressure;
        info!("参考气压已设置: {:.2}Pa", pressure);
        Ok(())
    }

    /// 恢复为标准大气压
    pub fn reset_reference_pressure(&mut self) {
        self.reference_pressure = STANDARD_ATMOSPHERE_PA;
        info!("参考气压已恢复为标准大气压");
    }

    /// 以当前气压作为参考气压面，返回新的参考气压【Pa】
    ///
    /// 补偿使用临时的 t_fine，会话的补偿状态保持不变。
    /// 校准异常导致气压为 0 时返回 [`Error::InvalidReference`]，原参考值保持不变。
    pub fn set_reference_from_current_reading(&mut self) -> Result<f32, Error<L::Error>> {
        let raw = self.read_pressure_sample()?;

        // t_fine 只在本次计算中使用，不写回会话
        let (_, fine) = self.strategy.temperature(&self.calib, raw.temperature);
        let pressure = self.strategy.pressure(&self.calib, raw.pressure, fine);

        self.set_reference_pressure(pressure)?;
        Ok(pressure)
    }

    /// 触发一次强制模式测量
    ///
    /// - 只在 [`SamplingPolicy::ForcedSingleShot`] 下写入控制寄存器，正常模式下传感器本身就在连续测量
    /// - 不等待测量完成，调用方可通过 [`Self::status`] 轮询
    pub fn trigger_forced_measurement(&mut self) -> Result<(), Error<L::Error>> {
        self.ensure_ready()?;

        if self.policy != SamplingPolicy::ForcedSingleShot {
            debug!("当前采样策略 {:?} 不需要触发测量", self.policy);
            return Ok(());
        }

        self.transport.write_register(registers::CONTROL, self.policy.control())
    }

    /// 软复位传感器并重新初始化
    ///
    /// - 参考气压、采样策略与补偿算法保持不变
    /// - 复位命令发出后旧的型号与校准系数即失效；之后任何一步失败，会话都按设备缺失处理，
    ///   测量相关的操作返回 [`Error::DeviceAbsentOrUnsupported`]，直到再次重新初始化成功
    pub fn reinitialize(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<L::Error>> {
        // 软重置
        self.transport
            .write_register(registers::SOFT_RESET, registers::SOFT_RESET_COMMAND)?;

        // 复位后芯片状态未知
        self.variant = DeviceVariant::Unsupported { chip_id: 0x00 };
        self.state.clear();

        // 等待重置完成
        delay.delay_ms(5);

        // 校准数据仍在复制时不能读取
        if self.status()?.im_update {
            return Err(Error::CalibrationBusy);
        }

        let (variant, calib) = setup(&mut self.transport, self.policy)?;
        self.variant = variant;
        self.calib = calib;

        info!("传感器已重新初始化: {:?}", variant);
        Ok(())
    }

    /// 结束会话，取回链路
    pub fn release(self) -> L {
        self.transport.release()
    }
}
