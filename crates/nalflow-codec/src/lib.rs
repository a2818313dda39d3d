//! # nalflow-codec
//!
//! nalflow 解码层, 负责把 Annex B H.264 NAL 单元驱动到一个有状态的解码会话上.
//!
//! 处理链路:
//!
//! ```text
//! NAL 单元 → 分类 → {SPS/PPS → 参数集缓存 → 格式描述 → 会话管理}
//!                  {IDR/Slice → AVCC 封装 → 会话提交 → DecodeSink → 消费者}
//! ```
//!
//! 实际的解码引擎通过 [`DecodeBackend`] 接入, 内置的 [`SoftwareBackend`]
//! 在独立线程上完成解码并异步回调.
//!
//! ## 使用示例
//!
//! ```rust
//! use nalflow_codec::{DecodeSink, H264StreamDecoder, SoftwareBackend};
//! use nalflow_core::PixelFormat;
//!
//! let (sink, events) = DecodeSink::channel();
//! let backend = SoftwareBackend::blank();
//! let mut decoder = H264StreamDecoder::new(backend, PixelFormat::Yuv420p, sink);
//!
//! // IDR 先于参数集到达: 静默丢弃, 不产生错误
//! decoder.process_nal_unit(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84]);
//! decoder.finish();
//! drop(decoder);
//! assert!(events.try_recv().is_err());
//! ```

pub mod backend;
pub mod backends;
pub mod error;
pub mod frame;
pub mod h264;
pub mod parsers;
pub mod sink;

// 重导出常用类型
pub use backend::DecodeBackend;
pub use backends::{BlankPictureDecoder, PictureDecoder, SoftwareBackend, SoftwareSession};
pub use error::{BackendStatus, DecodeError};
pub use frame::{DecodedFrame, PixelBuffer};
pub use h264::{
    CodedFrame, FormatChange, H264StreamDecoder, NalStats, ParameterSetCache, ParameterSetKind,
    SampleBuffer, SampleTiming, SessionManager, SessionState, SessionStats, SubmitOutcome,
    package_coded_frame, unpackage_coded_frame,
};
pub use parsers::h264::{H264FormatDescriptor, NalUnitType, classify};
pub use sink::{DEFAULT_SINK_CAPACITY, DecodeEvent, DecodeSink};

#[cfg(feature = "openh264")]
pub use backends::OpenH264PictureDecoder;
