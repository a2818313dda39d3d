//! 时间戳类型.
//!
//! 提交给解码器的采样时间戳一律为"未定义". 解码输出按提交顺序到达,
//! 呈现时间戳由输出端按帧序号重建: `pts = 帧序号 * 每帧时长`.

use crate::rational::Rational;
use std::fmt;

/// 表示"未定义"的时间戳值
pub const NOPTS_VALUE: i64 = i64::MIN;

/// 时间戳, 实际时间 (秒) = pts * time_base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// `NOPTS_VALUE` 表示未定义
    pub pts: i64,
    pub time_base: Rational,
}

impl Timestamp {
    pub const fn new(pts: i64, time_base: Rational) -> Self {
        Self { pts, time_base }
    }

    /// 未定义的时间戳
    pub const fn none() -> Self {
        Self::new(NOPTS_VALUE, Rational::UNDEFINED)
    }

    /// 第 `index` 帧 (从 0 开始) 的呈现时间戳
    ///
    /// 假定帧按显示顺序到达 (无 B 帧重排). 溢出时返回未定义的时间戳.
    pub fn for_frame(index: u64, frame_duration: i64, time_base: Rational) -> Self {
        i64::try_from(index)
            .ok()
            .and_then(|index| index.checked_mul(frame_duration))
            .filter(|&pts| pts != NOPTS_VALUE)
            .map_or_else(Self::none, |pts| Self::new(pts, time_base))
    }

    pub const fn is_valid(&self) -> bool {
        self.pts != NOPTS_VALUE && self.time_base.is_valid()
    }

    /// 转换为秒, 无效时间戳返回 `f64::NAN`
    pub fn to_seconds(&self) -> f64 {
        if !self.is_valid() {
            return f64::NAN;
        }
        self.pts as f64 * self.time_base.to_f64()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("NOPTS");
        }
        write!(f, "{}@{} ({:.3}s)", self.pts, self.time_base, self.to_seconds())
    }
}
