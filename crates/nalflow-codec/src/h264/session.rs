//! 解码会话管理.
//!
//! 状态机:
//!
//! ```text
//!            描述构建成功 + 会话创建成功
//! NoSession ───────────────────────────────▶ Active
//!     ▲   会话创建失败                        │  新描述: 可接受 → 沿用
//!     └──────────────────────────────────────┤         不可接受 → 释放旧会话并重建
//!                                             │ close()
//!                                             ▼
//!                                          Invalid ── 新描述 ──▶ Active
//! ```
//!
//! 任意时刻最多只有一个存活会话. 格式描述与会话只由本模块修改.

use log::{debug, info};
use nalflow_core::PixelFormat;

use crate::backend::DecodeBackend;
use crate::error::DecodeError;
use crate::sink::DecodeSink;

use super::packager::{SampleBuffer, package_coded_frame};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 尚无会话 (未收到参数集, 或会话创建失败)
    NoSession,
    /// 存在绑定到当前格式描述的会话
    Active,
    /// 会话已在流结束时释放
    Invalid,
}

/// `update_format` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChange {
    /// 首次创建会话 (或在 Invalid 之后重新创建)
    SessionCreated,
    /// 现有会话接受新描述, 未重建
    SessionReused,
    /// 旧会话不接受新描述, 已释放并重建
    SessionRecreated,
}

/// `submit` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 已异步提交
    Submitted,
    /// 没有格式描述或会话, 静默丢弃 (不是错误)
    Dropped,
}

/// 会话统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub descriptors_built: u64,
    pub sessions_created: u64,
    pub sessions_reused: u64,
    pub sessions_invalidated: u64,
    pub frames_submitted: u64,
    pub frames_dropped: u64,
}

/// 解码会话管理器
pub struct SessionManager<B: DecodeBackend> {
    backend: B,
    output_format: PixelFormat,
    sink: DecodeSink,
    descriptor: Option<B::Descriptor>,
    session: Option<B::Session>,
    closed: bool,
    stats: SessionStats,
}

impl<B: DecodeBackend> SessionManager<B> {
    pub fn new(backend: B, output_format: PixelFormat, sink: DecodeSink) -> Self {
        Self {
            backend,
            output_format,
            sink,
            descriptor: None,
            session: None,
            closed: false,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.session, self.closed) {
            (Some(_), _) => SessionState::Active,
            (None, true) => SessionState::Invalid,
            (None, false) => SessionState::NoSession,
        }
    }

    /// 当前生效的格式描述
    pub fn descriptor(&self) -> Option<&B::Descriptor> {
        self.descriptor.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// 由新提交的 SPS/PPS (不含起始码) 更新格式描述并调整会话
    ///
    /// 描述构建失败时之前的描述继续生效, 会话不变.
    /// 会话创建失败时回到 `NoSession`, 但保留新描述.
    pub fn update_format(&mut self, sps: &[u8], pps: &[u8]) -> Result<FormatChange, DecodeError> {
        let descriptor = self
            .backend
            .build_format_descriptor(sps, pps)
            .map_err(|status| DecodeError::DescriptorBuild { status })?;
        self.stats.descriptors_built += 1;
        debug!("{}: 格式描述已更新: {:?}", self.backend.name(), descriptor);

        let mut recreate = false;
        if let Some(session) = self.session.take() {
            if self.backend.can_accept_descriptor(&session, &descriptor) {
                self.session = Some(session);
                self.descriptor = Some(descriptor);
                self.stats.sessions_reused += 1;
                debug!("{}: 现有会话可接受新格式描述, 无需重建", self.backend.name());
                return Ok(FormatChange::SessionReused);
            }
            self.backend.invalidate_session(session);
            self.stats.sessions_invalidated += 1;
            recreate = true;
        }

        let created =
            self.backend
                .create_session(&descriptor, self.output_format, self.sink.clone());
        self.descriptor = Some(descriptor);
        let session = created.map_err(|status| DecodeError::SessionCreate { status })?;
        self.session = Some(session);
        self.closed = false;
        self.stats.sessions_created += 1;
        info!(
            "{}: 解码会话已{}, 输出格式 {}",
            self.backend.name(),
            if recreate { "重建" } else { "创建" },
            self.output_format
        );

        Ok(if recreate {
            FormatChange::SessionRecreated
        } else {
            FormatChange::SessionCreated
        })
    }

    /// 提交一个 slice/IDR 单元 (含起始码)
    ///
    /// 没有描述或会话时静默丢弃. 调用不等待解码结果.
    pub fn submit(&mut self, unit: &[u8]) -> Result<SubmitOutcome, DecodeError> {
        let (Some(descriptor), Some(session)) = (&self.descriptor, &mut self.session) else {
            self.stats.frames_dropped += 1;
            debug!("尚无可用会话, 丢弃 {} 字节的编码帧", unit.len());
            return Ok(SubmitOutcome::Dropped);
        };

        let frame = package_coded_frame(unit)?;
        let sample = SampleBuffer::new(frame, descriptor.clone());
        self.backend
            .submit_frame(session, sample)
            .map_err(|status| DecodeError::DecodeSubmission { status })?;
        self.stats.frames_submitted += 1;
        Ok(SubmitOutcome::Submitted)
    }

    /// 流结束: 释放会话, 等待已提交帧的回调全部送达
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            self.backend.invalidate_session(session);
            self.stats.sessions_invalidated += 1;
            debug!("{}: 解码会话已释放", self.backend.name());
        }
        self.closed = true;
    }
}

impl<B: DecodeBackend> Drop for SessionManager<B> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.backend.invalidate_session(session);
        }
    }
}
