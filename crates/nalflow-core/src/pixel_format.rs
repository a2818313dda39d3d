//! 像素格式定义.
//!
//! 解码会话的输出像素格式. 硬件解码常见的输出为 BGRA (32 位) 与 NV12,
//! 软件解码器通常输出 YUV420P.

use std::fmt;
use std::str::FromStr;

use crate::NalflowError;

/// 像素格式
///
/// 命名规则: 颜色空间 + 排列方式 (P=Planar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,
    /// YUV 4:2:0 平面格式, 8 位
    Yuv420p,
    /// NV12: Y 平面 + UV 交错, 4:2:0, 8 位 (硬件解码常用)
    Nv12,
    /// BGRA 各 8 位, 打包
    Bgra,
    /// 灰度 8 位 (仅亮度)
    Gray8,
}

impl PixelFormat {
    /// 平面数量
    pub const fn plane_count(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Yuv420p => 3,
            Self::Nv12 => 2,
            Self::Bgra | Self::Gray8 => 1,
        }
    }

    /// 计算指定平面每行的字节数 (linesize / stride)
    ///
    /// 格式为 None 或平面索引超出范围时返回 `None`.
    pub fn plane_linesize(&self, plane: usize, width: u32) -> Option<usize> {
        if *self == Self::None || plane >= self.plane_count() as usize {
            return None;
        }
        let w = width as usize;
        Some(match self {
            // 色度宽度向上取整, 奇数宽度不丢列
            Self::Yuv420p if plane > 0 => w.div_ceil(2),
            // NV12 plane1: UV 交错, 每行 ceil(w/2) 对
            Self::Nv12 if plane > 0 => w.div_ceil(2) * 2,
            Self::Bgra => w * 4,
            _ => w,
        })
    }

    /// 计算指定平面的行数
    pub fn plane_height(&self, plane: usize, height: u32) -> Option<usize> {
        if *self == Self::None || plane >= self.plane_count() as usize {
            return None;
        }
        let h = height as usize;
        Some(match self {
            Self::Yuv420p | Self::Nv12 if plane > 0 => h.div_ceil(2),
            _ => h,
        })
    }

    /// 计算整帧的字节数 (紧密排列)
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        if *self == Self::None {
            return None;
        }
        let mut total = 0usize;
        for plane in 0..self.plane_count() as usize {
            total += self.plane_linesize(plane, width)? * self.plane_height(plane, height)?;
        }
        Some(total)
    }

    /// 格式名称 (与 ffmpeg `-pix_fmt` 一致)
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Yuv420p => "yuv420p",
            Self::Nv12 => "nv12",
            Self::Bgra => "bgra",
            Self::Gray8 => "gray8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = NalflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yuv420p" | "i420" => Ok(Self::Yuv420p),
            "nv12" => Ok(Self::Nv12),
            "bgra" | "32bgra" => Ok(Self::Bgra),
            "gray8" | "gray" => Ok(Self::Gray8),
            other => Err(NalflowError::InvalidArgument(format!(
                "不支持的像素格式: {other}"
            ))),
        }
    }
}
