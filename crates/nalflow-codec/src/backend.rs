//! 解码引擎接口.
//!
//! 会话管理器只通过本 trait 访问解码引擎. 引擎负责:
//! 由 SPS/PPS 构建格式描述、判断会话能否沿用新描述、创建/释放会话,
//! 以及接收长度前缀样本并异步回调 [`DecodeSink`].

use std::fmt;

use nalflow_core::PixelFormat;

use crate::error::BackendStatus;
use crate::h264::SampleBuffer;
use crate::sink::DecodeSink;

/// 解码引擎
pub trait DecodeBackend {
    /// 格式描述 (不可变, 参数集变化时整体替换)
    type Descriptor: Clone + fmt::Debug;
    /// 会话句柄
    type Session;

    /// 引擎名称
    fn name(&self) -> &str;

    /// 由不含起始码的 SPS 与 PPS 构建格式描述
    fn build_format_descriptor(
        &mut self,
        sps: &[u8],
        pps: &[u8],
    ) -> Result<Self::Descriptor, BackendStatus>;

    /// 现有会话能否不重建直接接受新描述
    fn can_accept_descriptor(&self, session: &Self::Session, descriptor: &Self::Descriptor)
    -> bool;

    /// 创建绑定到 `descriptor` 的会话, 解码结果经 `sink` 异步送出
    fn create_session(
        &mut self,
        descriptor: &Self::Descriptor,
        output_format: PixelFormat,
        sink: DecodeSink,
    ) -> Result<Self::Session, BackendStatus>;

    /// 释放会话. 返回前, 已接受帧的回调全部送达.
    fn invalidate_session(&mut self, session: Self::Session);

    /// 提交一帧, 不等待解码结果
    fn submit_frame(
        &mut self,
        session: &mut Self::Session,
        sample: SampleBuffer<Self::Descriptor>,
    ) -> Result<(), BackendStatus>;
}
