//! 软件解码引擎.
//!
//! 每个会话拥有一个工作线程, 样本经有界 `mpsc` 通道送入, 解码结果在工作线程上
//! 通过 [`DecodeSink`] 回调. 两段通道都有界, sink 满时提交方随之阻塞. 实际的图像解码由可替换的 [`PictureDecoder`] 完成.

use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};

use log::{debug, trace, warn};
use nalflow_core::PixelFormat;

use crate::backend::DecodeBackend;
use crate::error::BackendStatus;
use crate::frame::PixelBuffer;
use crate::h264::{SampleBuffer, unpackage_coded_frame};
use crate::parsers::h264::H264FormatDescriptor;
use crate::sink::DecodeSink;

/// 每个会话排队等待解码的样本数上限
const SAMPLE_QUEUE_DEPTH: usize = 4;

/// 图像解码引擎, 运行在会话的工作线程上
pub trait PictureDecoder: Send {
    /// 引擎名称
    fn name(&self) -> &str;

    /// 切换到新的格式描述 (会话创建时与描述变化时调用)
    fn configure(&mut self, descriptor: &H264FormatDescriptor) -> Result<(), BackendStatus>;

    /// 解码一个 NAL 负载 (头部字节 + slice 数据, 无长度前缀)
    ///
    /// 返回 `Ok(None)` 表示成功但没有输出图像.
    fn decode(
        &mut self,
        nal: &[u8],
        output_format: PixelFormat,
    ) -> Result<Option<PixelBuffer>, BackendStatus>;
}

/// 为每帧输出描述几何的黑色图像, 不做实际解码
#[derive(Debug, Default)]
pub struct BlankPictureDecoder {
    dimensions: Option<(u32, u32)>,
}

impl PictureDecoder for BlankPictureDecoder {
    fn name(&self) -> &str {
        "blank"
    }

    fn configure(&mut self, descriptor: &H264FormatDescriptor) -> Result<(), BackendStatus> {
        self.dimensions = Some((descriptor.width(), descriptor.height()));
        Ok(())
    }

    fn decode(
        &mut self,
        _nal: &[u8],
        output_format: PixelFormat,
    ) -> Result<Option<PixelBuffer>, BackendStatus> {
        let (width, height) = self.dimensions.ok_or(BackendStatus::SESSION_UNAVAILABLE)?;
        PixelBuffer::blank(width, height, output_format)
            .map(Some)
            .map_err(|_| BackendStatus::UNSUPPORTED_FORMAT)
    }
}

type EngineFactory = Box<dyn FnMut() -> Result<Box<dyn PictureDecoder>, BackendStatus>>;

/// 软件解码引擎
pub struct SoftwareBackend {
    name: String,
    factory: EngineFactory,
    next_session_id: u64,
}

impl SoftwareBackend {
    /// 使用自定义图像解码引擎
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: FnMut() -> Result<Box<dyn PictureDecoder>, BackendStatus> + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
            next_session_id: 0,
        }
    }

    /// 输出黑色图像的引擎 (空跑与测试)
    pub fn blank() -> Self {
        Self::new("software/blank", || {
            Ok(Box::new(BlankPictureDecoder::default()) as Box<dyn PictureDecoder>)
        })
    }

    /// 基于 OpenH264 的真实解码
    #[cfg(feature = "openh264")]
    pub fn openh264() -> Self {
        Self::new("software/openh264", || {
            super::openh264::OpenH264PictureDecoder::new()
                .map(|engine| Box::new(engine) as Box<dyn PictureDecoder>)
        })
    }
}

/// 软件会话: 工作线程 + 样本通道
pub struct SoftwareSession {
    id: u64,
    width: u32,
    height: u32,
    tx: Option<SyncSender<SampleBuffer<H264FormatDescriptor>>>,
    worker: Option<JoinHandle<()>>,
}

impl SoftwareSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 会话创建时的图像尺寸
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 关闭通道并等待工作线程处理完在途样本
    fn shutdown(&mut self) {
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("解码会话 #{} 工作线程异常退出", self.id);
            }
        }
    }
}

impl Drop for SoftwareSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DecodeBackend for SoftwareBackend {
    type Descriptor = H264FormatDescriptor;
    type Session = SoftwareSession;

    fn name(&self) -> &str {
        &self.name
    }

    fn build_format_descriptor(
        &mut self,
        sps: &[u8],
        pps: &[u8],
    ) -> Result<H264FormatDescriptor, BackendStatus> {
        H264FormatDescriptor::from_parameter_sets(sps, pps).map_err(|err| {
            debug!("{}: 参数集被拒绝: {}", self.name, err);
            BackendStatus::INVALID_PARAMETER_SET
        })
    }

    fn can_accept_descriptor(
        &self,
        session: &SoftwareSession,
        descriptor: &H264FormatDescriptor,
    ) -> bool {
        session.dimensions() == (descriptor.width(), descriptor.height())
    }

    fn create_session(
        &mut self,
        descriptor: &H264FormatDescriptor,
        output_format: PixelFormat,
        sink: DecodeSink,
    ) -> Result<SoftwareSession, BackendStatus> {
        if output_format.plane_count() == 0 {
            return Err(BackendStatus::UNSUPPORTED_FORMAT);
        }
        let mut engine = (self.factory)()?;
        engine.configure(descriptor)?;
        let engine_name = engine.name().to_string();

        let id = self.next_session_id;
        self.next_session_id += 1;
        let (tx, rx) =
            mpsc::sync_channel::<SampleBuffer<H264FormatDescriptor>>(SAMPLE_QUEUE_DEPTH);
        let mut current = descriptor.clone();
        let worker = thread::Builder::new()
            .name(format!("nalflow-decode-{id}"))
            .spawn(move || {
                for sample in rx {
                    let pts = sample.timing.pts;
                    if sample.descriptor != current {
                        if let Err(status) = engine.configure(&sample.descriptor) {
                            sink.complete(status, None, pts);
                            continue;
                        }
                        current = sample.descriptor;
                    }
                    let nal = match unpackage_coded_frame(sample.frame.as_bytes()) {
                        Ok(nal) => nal,
                        Err(_) => {
                            sink.complete(BackendStatus::MALFORMED_SAMPLE, None, pts);
                            continue;
                        }
                    };
                    trace!("会话 #{}: 解码 {} 字节", id, nal.len());
                    match engine.decode(nal, output_format) {
                        Ok(buffer) => sink.complete(BackendStatus::OK, buffer, pts),
                        Err(status) => sink.complete(status, None, pts),
                    }
                }
                debug!("会话 #{}: 工作线程退出", id);
            })
            .map_err(|err| {
                warn!("无法启动解码线程: {}", err);
                BackendStatus::SESSION_UNAVAILABLE
            })?;

        debug!(
            "{}: 会话 #{} 已创建, 引擎 {}, {}x{}, 输出 {}",
            self.name,
            id,
            engine_name,
            descriptor.width(),
            descriptor.height(),
            output_format
        );
        Ok(SoftwareSession {
            id,
            width: descriptor.width(),
            height: descriptor.height(),
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    fn invalidate_session(&mut self, mut session: SoftwareSession) {
        session.shutdown();
    }

    fn submit_frame(
        &mut self,
        session: &mut SoftwareSession,
        sample: SampleBuffer<H264FormatDescriptor>,
    ) -> Result<(), BackendStatus> {
        let tx = session.tx.as_ref().ok_or(BackendStatus::SESSION_CLOSED)?;
        tx.send(sample)
            .map_err(|_| BackendStatus::SESSION_UNAVAILABLE)
    }
}
