//! 统一错误类型定义.
//!
//! 所有 nalflow crate 共用的错误类型, 支持跨模块传播.
//! 逐帧的非致命解码错误另见 `nalflow_codec::DecodeError`.

use thiserror::Error;

/// nalflow 统一错误类型
#[derive(Debug, Error)]
pub enum NalflowError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 编解码器错误
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// nalflow 统一 Result 类型
pub type NalflowResult<T> = Result<T, NalflowError>;
