//! 解码错误分类.
//!
//! 所有逐帧错误都是非致命的: 它们经由 [`DecodeSink`](crate::DecodeSink)
//! 上报给消费者, 处理流程继续进行下一个 NAL 单元.

use std::fmt;

use nalflow_core::NalflowError;
use thiserror::Error;

/// 解码引擎返回的状态码
///
/// 0 表示成功, 其余取值由具体引擎定义. 内置软件引擎使用下列常量.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendStatus(pub i32);

impl BackendStatus {
    /// 成功
    pub const OK: Self = Self(0);
    /// 参数集被拒绝 (SPS 解析失败、PPS 为空或 NAL 类型不符)
    pub const INVALID_PARAMETER_SET: Self = Self(-12710);
    /// 会话不可用 (已关闭或工作线程已退出)
    pub const SESSION_UNAVAILABLE: Self = Self(-12903);
    /// 样本格式错误 (长度前缀与负载不符等)
    pub const MALFORMED_SAMPLE: Self = Self(-12911);
    /// 解码引擎内部失败
    pub const DECODER_FAILURE: Self = Self(-12909);
    /// 会话已在关闭过程中
    pub const SESSION_CLOSED: Self = Self(-12904);
    /// 不支持的输出格式或图像几何
    pub const UNSUPPORTED_FORMAT: Self = Self(-12906);

    /// 是否为成功状态
    pub const fn is_ok(&self) -> bool {
        self.0 == 0
    }

    /// 状态码的可读名称
    pub fn name(&self) -> Option<&'static str> {
        Some(match *self {
            Self::OK => "ok",
            Self::INVALID_PARAMETER_SET => "invalid_parameter_set",
            Self::SESSION_UNAVAILABLE => "session_unavailable",
            Self::MALFORMED_SAMPLE => "malformed_sample",
            Self::DECODER_FAILURE => "decoder_failure",
            Self::SESSION_CLOSED => "session_closed",
            Self::UNSUPPORTED_FORMAT => "unsupported_format",
            _ => return None,
        })
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// 逐帧解码错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// SPS/PPS 被解码引擎拒绝, 之前的格式描述 (如有) 继续生效
    #[error("格式描述创建失败: status={status}")]
    DescriptorBuild { status: BackendStatus },

    /// 解码会话创建失败, 在新的格式描述成功之前丢弃所有帧
    #[error("解码会话创建失败: status={status}")]
    SessionCreate { status: BackendStatus },

    /// 样本缓冲区构造失败
    #[error("帧封装失败: status={status}")]
    FramePackaging { status: BackendStatus },

    /// 提交帧时被同步拒绝
    #[error("解码提交失败: status={status}")]
    DecodeSubmission { status: BackendStatus },

    /// 异步解码回调返回失败状态, 该帧丢失
    #[error("异步解码失败: status={status}")]
    AsyncDecode { status: BackendStatus },

    /// 解码成功但没有可用的图像缓冲区
    #[error("解码成功但图像缓冲区无效")]
    InvalidImageBuffer,
}

impl DecodeError {
    /// 错误类别的稳定名称, 用于统计与日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DescriptorBuild { .. } => "descriptor_build",
            Self::SessionCreate { .. } => "session_create",
            Self::FramePackaging { .. } => "frame_packaging",
            Self::DecodeSubmission { .. } => "decode_submission",
            Self::AsyncDecode { .. } => "async_decode",
            Self::InvalidImageBuffer => "invalid_image_buffer",
        }
    }

    /// 关联的引擎状态码
    pub fn status(&self) -> Option<BackendStatus> {
        match self {
            Self::DescriptorBuild { status }
            | Self::SessionCreate { status }
            | Self::FramePackaging { status }
            | Self::DecodeSubmission { status }
            | Self::AsyncDecode { status } => Some(*status),
            Self::InvalidImageBuffer => None,
        }
    }
}

impl From<DecodeError> for NalflowError {
    fn from(err: DecodeError) -> Self {
        NalflowError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(BackendStatus::OK.to_string(), "0 (ok)");
        assert_eq!(BackendStatus(-1).to_string(), "-1");
        assert!(BackendStatus::OK.is_ok());
        assert!(!BackendStatus::DECODER_FAILURE.is_ok());
    }

    #[test]
    fn test_decode_error_kind_and_status() {
        let err = DecodeError::AsyncDecode {
            status: BackendStatus::DECODER_FAILURE,
        };
        assert_eq!(err.kind(), "async_decode");
        assert_eq!(err.status(), Some(BackendStatus::DECODER_FAILURE));
        assert_eq!(DecodeError::InvalidImageBuffer.status(), None);
    }

    #[test]
    fn test_decode_error_into_nalflow_error() {
        let err: NalflowError = DecodeError::SessionCreate {
            status: BackendStatus::UNSUPPORTED_FORMAT,
        }
        .into();
        match err {
            NalflowError::Codec(msg) => assert!(msg.contains("解码会话创建失败")),
            other => panic!("错误类型不符: {other:?}"),
        }
    }
}
