use nalflow_core::PixelFormat;

use crate::backend::DecodeBackend;
use crate::error::BackendStatus;
use crate::frame::PixelBuffer;
use crate::h264::SampleBuffer;
use crate::parsers::h264::H264FormatDescriptor;
use crate::sink::DecodeSink;

/// 64x48 Baseline SPS (含起始码)
pub const SPS_64X48: &[u8] = &[0, 0, 0, 1, 0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x23, 0xC8];
/// 与 `SPS_64X48` 几何相同, level 不同
pub const SPS_64X48_L31: &[u8] = &[0, 0, 0, 1, 0x67, 0x42, 0xC0, 0x1F, 0xDA, 0x23, 0xC8];
/// 32x32 Baseline SPS
pub const SPS_32X32: &[u8] = &[0, 0, 0, 1, 0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x4B, 0x20];
/// 65535x65535 宏块, 超出图像尺寸上限
pub const SPS_OVERSIZED: &[u8] = &[
    0, 0, 0, 1, 0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x01, 0xFF, 0xFF, 0x90,
];
pub const PPS: &[u8] = &[0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80];
pub const IDR: &[u8] = &[0, 0, 0, 1, 0x65, 0x88, 0x84, 0x00, 0x33];
pub const SLICE: &[u8] = &[0, 0, 0, 1, 0x41, 0x9A, 0x02];
pub const SEI: &[u8] = &[0, 0, 0, 1, 0x06, 0x05, 0x01, 0x80];

pub struct FakeSession {
    pub width: u32,
    pub height: u32,
    output_format: PixelFormat,
    sink: DecodeSink,
}

/// 记录所有调用的同步解码引擎, 提交时立即回调
#[derive(Default)]
pub struct RecordingBackend {
    pub descriptors_built: usize,
    pub sessions_created: usize,
    pub sessions_invalidated: usize,
    pub live_sessions: usize,
    pub max_live_sessions: usize,
    /// 按顺序记录的 AVCC 提交单元
    pub submitted: Vec<Vec<u8>>,
    pub reject_descriptors: bool,
    pub fail_create: Option<BackendStatus>,
    pub fail_submit: Option<BackendStatus>,
    pub fail_decode: Option<BackendStatus>,
    pub omit_buffer: bool,
}

impl DecodeBackend for RecordingBackend {
    type Descriptor = H264FormatDescriptor;
    type Session = FakeSession;

    fn name(&self) -> &str {
        "recording"
    }

    fn build_format_descriptor(
        &mut self,
        sps: &[u8],
        pps: &[u8],
    ) -> Result<H264FormatDescriptor, BackendStatus> {
        if self.reject_descriptors {
            return Err(BackendStatus::INVALID_PARAMETER_SET);
        }
        let desc = H264FormatDescriptor::from_parameter_sets(sps, pps)
            .map_err(|_| BackendStatus::INVALID_PARAMETER_SET)?;
        self.descriptors_built += 1;
        Ok(desc)
    }

    fn can_accept_descriptor(&self, session: &FakeSession, desc: &H264FormatDescriptor) -> bool {
        (session.width, session.height) == (desc.width(), desc.height())
    }

    fn create_session(
        &mut self,
        desc: &H264FormatDescriptor,
        output_format: PixelFormat,
        sink: DecodeSink,
    ) -> Result<FakeSession, BackendStatus> {
        if let Some(status) = self.fail_create {
            return Err(status);
        }
        self.sessions_created += 1;
        self.live_sessions += 1;
        self.max_live_sessions = self.max_live_sessions.max(self.live_sessions);
        Ok(FakeSession {
            width: desc.width(),
            height: desc.height(),
            output_format,
            sink,
        })
    }

    fn invalidate_session(&mut self, _session: FakeSession) {
        self.sessions_invalidated += 1;
        self.live_sessions -= 1;
    }

    fn submit_frame(
        &mut self,
        session: &mut FakeSession,
        sample: SampleBuffer<H264FormatDescriptor>,
    ) -> Result<(), BackendStatus> {
        if let Some(status) = self.fail_submit {
            return Err(status);
        }
        self.submitted.push(sample.frame.as_bytes().to_vec());

        let pts = sample.timing.pts;
        match self.fail_decode {
            Some(status) => session.sink.complete(status, None, pts),
            None if self.omit_buffer => session.sink.complete(BackendStatus::OK, None, pts),
            None => {
                let buffer = PixelBuffer::blank(session.width, session.height, session.output_format)
                    .map_err(|_| BackendStatus::UNSUPPORTED_FORMAT)?;
                session.sink.complete(BackendStatus::OK, Some(buffer), pts);
            }
        }
        Ok(())
    }
}
