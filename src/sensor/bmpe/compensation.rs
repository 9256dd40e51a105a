//! 温度、压力、湿度补偿
//!
//! 两套实现对应数据手册 4.2.3 节（定点）与附录A（双精度浮点）中同一个补偿公式的
//! 两种写法，结果在很小的误差内一致，两者都保留并互相校验。
//!
//! 温度补偿必须最先执行：它产生的细温度值 (t_fine) 是压力与湿度补偿的输入。

use super::calibration::CalibrationProfile;

/// 补偿算法
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// 32/64位整数运算（温度 0.01°C，压力 Q24.8，湿度 Q22.10）
    #[default]
    FixedPoint,
    /// 双精度浮点参考实现
    FloatingPoint,
}

/// 温度补偿的中间结果 t_fine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FineTemperature {
    Fixed(i32),
    Floating(f64),
}

impl FineTemperature {
    fn fixed(self) -> i32 {
        match self {
            FineTemperature::Fixed(fine) => fine,
            FineTemperature::Floating(fine) => fine as i32,
        }
    }

    fn floating(self) -> f64 {
        match self {
            FineTemperature::Fixed(fine) => fine as f64,
            FineTemperature::Floating(fine) => fine,
        }
    }
}

impl Strategy {
    /// 温度补偿，返回 (°C, t_fine)
    ///
    /// - `adc_t`: 0xFA-0xFC 的 24 位原始值，高 20 位为 ADC 结果
    pub fn temperature(self, cal: &CalibrationProfile, adc_t: u32) -> (f32, FineTemperature) {
        let adc_t = (adc_t >> 4) as i32;
        match self {
            Strategy::FixedPoint => {
                let fine = fixed::temperature(cal, adc_t);
                (fixed::centi_celsius(fine) as f32 / 100.0, FineTemperature::Fixed(fine))
            }
            Strategy::FloatingPoint => {
                let fine = floating::temperature(cal, adc_t);
                ((fine / 5120.0) as f32, FineTemperature::Floating(fine))
            }
        }
    }

    /// 压力补偿，单位 Pa；校准系数异常导致除数为0时返回 0
    ///
    /// - `adc_p`: 0xF7-0xF9 的 24 位原始值，高 20 位为 ADC 结果
    pub fn pressure(self, cal: &CalibrationProfile, adc_p: u32, fine: FineTemperature) -> f32 {
        let adc_p = (adc_p >> 4) as i32;
        match self {
            Strategy::FixedPoint => match fixed::pressure(cal, adc_p, fine.fixed()) {
                Some(q24_8) => (q24_8 as f64 / 256.0) as f32,
                None => 0.0,
            },
            Strategy::FloatingPoint => floating::pressure(cal, adc_p, fine.floating()).unwrap_or(0.0) as f32,
        }
    }

    /// 湿度补偿，单位 %RH，限制在 0~100 之间；没有湿度校准系数（BMP280）时恒为 0
    ///
    /// - `adc_h`: 0xFD-0xFE 的 16 位原始值
    pub fn humidity(self, cal: &CalibrationProfile, adc_h: u32, fine: FineTemperature) -> f32 {
        let Some(hum) = cal.humidity.as_ref() else {
            return 0.0;
        };
        let adc_h = (adc_h & 0xFFFF) as i32;
        match self {
            Strategy::FixedPoint => {
                let q22_10 = fixed::humidity(hum, adc_h, fine.fixed());
                ((q22_10 >> 12) as f32) / 1024.0
            }
            Strategy::FloatingPoint => floating::humidity(hum, adc_h, fine.floating()) as f32,
        }
    }
}

/// 数据手册 4.2.3 节的整数公式
///
/// 校准系数取任意值都不能让补偿 panic：温度在 64 位中计算，
/// 压力与湿度按厂商 C 实现的有符号整数回绕语义计算。
mod fixed {
    use super::super::calibration::{CalibrationProfile, HumidityCalibration};

    /// 返回 t_fine，限制在 32 位有符号整数范围内
    pub fn temperature(cal: &CalibrationProfile, adc_t: i32) -> i32 {
        let adc_t = adc_t as i64;
        let dig_t1 = cal.t1 as i64;
        let dig_t2 = cal.t2 as i64;
        let dig_t3 = cal.t3 as i64;

        let var1 = (((adc_t >> 3) - (dig_t1 << 1)) * dig_t2) >> 11;
        let var2 = (((((adc_t >> 4) - dig_t1) * ((adc_t >> 4) - dig_t1)) >> 12) * dig_t3) >> 14;

        (var1 + var2).clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    /// 0.01°C 为单位的温度
    pub fn centi_celsius(t_fine: i32) -> i64 {
        (t_fine as i64 * 5 + 128) >> 8
    }

    /// 返回 Q24.8 格式的压力（Pa * 256），除数为0时返回 `None`
    pub fn pressure(cal: &CalibrationProfile, adc_p: i32, t_fine: i32) -> Option<i64> {
        let dig_p1 = cal.p1 as i64;
        let dig_p2 = cal.p2 as i64;
        let dig_p3 = cal.p3 as i64;
        let dig_p4 = cal.p4 as i64;
        let dig_p5 = cal.p5 as i64;
        let dig_p6 = cal.p6 as i64;
        let dig_p7 = cal.p7 as i64;
        let dig_p8 = cal.p8 as i64;
        let dig_p9 = cal.p9 as i64;

        // 步骤1: 温度相关的偏移与灵敏度
        let mut var1 = t_fine as i64 - 128000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(dig_p6);
        var2 = var2.wrapping_add(var1.wrapping_mul(dig_p5) << 17);
        var2 = var2.wrapping_add(dig_p4 << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(dig_p3) >> 8).wrapping_add(var1.wrapping_mul(dig_p2) << 12);
        var1 = (1i64 << 47).wrapping_add(var1).wrapping_mul(dig_p1) >> 33;

        if var1 == 0 {
            return None;
        }

        // 步骤2: 原始值换算
        let mut p = 1048576 - adc_p as i64;
        p = (p << 31).wrapping_sub(var2).wrapping_mul(3125).wrapping_div(var1);

        // 步骤3: 二阶校正
        var1 = dig_p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        var2 = dig_p8.wrapping_mul(p) >> 19;

        Some((p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(dig_p7 << 4))
    }

    /// 返回 Q22.10 格式的湿度（%RH * 1024 << 12），已限制在 [0, 419430400]
    pub fn humidity(hum: &HumidityCalibration, adc_h: i32, t_fine: i32) -> i32 {
        let dig_h1 = hum.h1 as i32;
        let dig_h2 = hum.h2 as i32;
        let dig_h3 = hum.h3 as i32;
        let dig_h4 = hum.h4 as i32;
        let dig_h5 = hum.h5 as i32;
        let dig_h6 = hum.h6 as i32;

        let x = t_fine.wrapping_sub(76800);

        // 步骤1: 偏移校正
        let scaled = (adc_h << 14)
            .wrapping_sub(dig_h4 << 20)
            .wrapping_sub(dig_h5.wrapping_mul(x))
            .wrapping_add(16384)
            >> 15;

        // 步骤2: 温度相关增益
        let temp_term = (x.wrapping_mul(dig_h6) >> 10).wrapping_mul((x.wrapping_mul(dig_h3) >> 11).wrapping_add(32768)) >> 10;
        let gain = temp_term.wrapping_add(2097152).wrapping_mul(dig_h2).wrapping_add(8192) >> 14;

        // 步骤3: 非线性补偿
        let mut v = scaled.wrapping_mul(gain);
        v = v.wrapping_sub(((v >> 15).wrapping_mul(v >> 15) >> 7).wrapping_mul(dig_h1) >> 4);

        // 步骤4: 限制输出范围
        v.clamp(0, 419430400)
    }
}

/// 数据手册附录A的双精度参考公式
mod floating {
    use super::super::calibration::{CalibrationProfile, HumidityCalibration};

    /// 返回实数形式的 t_fine
    pub fn temperature(cal: &CalibrationProfile, adc_t: i32) -> f64 {
        let adc_t = adc_t as f64;
        let dig_t1 = cal.t1 as f64;
        let dig_t2 = cal.t2 as f64;
        let dig_t3 = cal.t3 as f64;

        let var1 = (adc_t / 16384.0 - dig_t1 / 1024.0) * dig_t2;
        let delta = adc_t / 131072.0 - dig_t1 / 8192.0;
        let var2 = delta * delta * dig_t3;

        var1 + var2
    }

    /// 返回 Pa，除数为0时返回 `None`
    pub fn pressure(cal: &CalibrationProfile, adc_p: i32, t_fine: f64) -> Option<f64> {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * cal.p6 as f64 / 32768.0;
        var2 += var1 * cal.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + cal.p4 as f64 * 65536.0;
        var1 = (cal.p3 as f64 * var1 * var1 / 524288.0 + cal.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * cal.p1 as f64;

        if var1 == 0.0 {
            return None;
        }

        let mut p = 1048576.0 - adc_p as f64;
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        var1 = cal.p9 as f64 * p * p / 2147483648.0;
        var2 = p * cal.p8 as f64 / 32768.0;

        Some(p + (var1 + var2 + cal.p7 as f64) / 16.0)
    }

    /// 返回 %RH，已限制在 [0, 100]
    pub fn humidity(hum: &HumidityCalibration, adc_h: i32, t_fine: f64) -> f64 {
        let x = t_fine - 76800.0;
        let offset = hum.h4 as f64 * 64.0 + hum.h5 as f64 / 16384.0 * x;
        let gain = hum.h2 as f64 / 65536.0
            * (1.0 + hum.h6 as f64 / 67108864.0 * x * (1.0 + hum.h3 as f64 / 67108864.0 * x));

        let mut h = (adc_h as f64 - offset) * gain;
        h *= 1.0 - hum.h1 as f64 * h / 524288.0;

        h.clamp(0.0, 100.0)
    }
}

/// 会话内的补偿状态
///
/// 记录最近一次温度补偿得到的 t_fine，以及它来自哪个原始温度值。
/// 压力/湿度补偿只接受同一组原始数据上的 t_fine，
/// 从未做过温度补偿时查询结果为 `None`，而不是悄悄使用 0。
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CompensationState {
    latest: Option<(u32, FineTemperature)>,
}

impl CompensationState {
    pub fn record(&mut self, raw_temperature: u32, fine: FineTemperature) {
        self.latest = Some((raw_temperature, fine));
    }

    /// 取出与 `raw_temperature` 对应的 t_fine
    pub fn fine_for(&self, raw_temperature: u32) -> Option<FineTemperature> {
        match self.latest {
            Some((raw, fine)) if raw == raw_temperature => Some(fine),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.latest = None;
    }
}
