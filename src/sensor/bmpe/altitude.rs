/// 标准大气压（海平面），单位 Pa
pub const STANDARD_ATMOSPHERE_PA: f32 = 101325.0;

/// 由气压计算相对于参考气压面的高度，单位 m
///
/// 国际气压高度公式 `44330 * (1 - (p / p0)^(1 / 5.255))`，中间结果使用双精度。
/// 观测值与参考值相同时恰好为 0。参考气压必须大于 0，会话在设置参考气压时保证这一点。
pub fn altitude(observed: f32, reference: f32) -> f32 {
    if observed == reference {
        return 0.0;
    }

    let ratio = observed as f64 / reference as f64;
    (44330.0 * (1.0 - ratio.powf(0.1903))) as f32
}
