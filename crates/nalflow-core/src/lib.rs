//! # nalflow-core
//!
//! nalflow 核心库, 提供错误类型、时间基、时间戳、像素格式与比特流读取等基础设施.
//!
//! 上层的 `nalflow-codec` (NAL 解析与解码会话) 和 `nalflow-format`
//! (码流输入、帧输出与流水线) 都建立在本 crate 之上.

pub mod bitreader;
pub mod error;
pub mod pixel_format;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use error::{NalflowError, NalflowResult};
pub use pixel_format::PixelFormat;
pub use rational::Rational;
pub use timestamp::Timestamp;
