//! # nalflow
//!
//! Annex B H.264 码流解复用与解码会话驱动.
//!
//! 从按块读取的字节流中切分 NAL 单元, 维护 SPS/PPS 参数集, 驱动一个有状态的
//! 解码会话, 并把异步解码出的图像交给带反压的输出端:
//! - **NAL 解析**: 起始码扫描、类型分类、SPS 几何解析、avcC 构建
//! - **会话管理**: 参数集提交、格式描述、会话创建/复用/失效
//! - **流水线**: 分块读取、跨块扫描、帧消费与输出
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use nalflow::codec::SoftwareBackend;
//! use nalflow::format::{PipelineConfig, RawVideoWriter, run_pipeline};
//!
//! let input = std::fs::File::open("input.h264")?;
//! let writer = RawVideoWriter::create("frames.bgra")?;
//! let report = run_pipeline(input, SoftwareBackend::blank(), writer, &PipelineConfig::default())?;
//! println!("{report}");
//! # Ok::<(), nalflow::core::NalflowError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `nalflow-core` | 核心类型与工具 |
//! | `nalflow-codec` | NAL 解析与解码会话 |
//! | `nalflow-format` | 码流输入、帧输出与流水线 |

pub mod logging;

/// 核心类型与工具
pub use nalflow_core as core;

/// NAL 解析与解码会话
pub use nalflow_codec as codec;

/// 码流输入、帧输出与流水线
pub use nalflow_format as format;

/// 获取 nalflow 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 可用的解码引擎名称
pub fn available_engines() -> &'static [&'static str] {
    #[cfg(feature = "openh264")]
    {
        &["blank", "openh264"]
    }
    #[cfg(not(feature = "openh264"))]
    {
        &["blank"]
    }
}
