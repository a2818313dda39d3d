//! 带反压的帧消费者.
//!
//! 在独立线程上接收 [`DecodeEvent`], 把解码帧写入 [`FrameWriter`].
//! 输出端未就绪时按固定间隔轮询等待: 没有超时, 也从不丢帧.
//! 等待期间不再从有界通道取事件, 解码回调随之阻塞, 反压一直传到提交方.
//! 通道关闭 (所有 `DecodeSink` 句柄被丢弃) 后调用 `finish()` 并退出.

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, trace};
use nalflow_codec::DecodeEvent;
use nalflow_core::{NalflowResult, Rational, Timestamp};

use crate::writer::FrameWriter;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 消费统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// 写入输出端的帧数
    pub frames_written: u64,
    /// 按类型计数的解码错误 (见 `DecodeError::kind`)
    pub errors: BTreeMap<&'static str, u64>,
    /// 因输出端未就绪而等待的次数
    pub backpressure_waits: u64,
}

impl ConsumerReport {
    /// 错误总数
    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }
}

/// 帧消费者
pub struct FrameConsumer<W: FrameWriter> {
    writer: W,
    poll_interval: Duration,
    time_base: Rational,
    frame_duration: i64,
}

impl<W: FrameWriter> FrameConsumer<W> {
    /// 创建消费者, 呈现时间戳为 `帧序号 * frame_duration`, 单位 `time_base`
    pub fn new(writer: W, poll_interval: Duration, time_base: Rational, frame_duration: i64) -> Self {
        Self {
            writer,
            poll_interval,
            time_base,
            frame_duration,
        }
    }

    /// 在当前线程消费, 直到通道关闭
    ///
    /// 写入失败立即返回错误, 剩余事件不再处理.
    pub fn run(&mut self, events: Receiver<DecodeEvent>) -> NalflowResult<ConsumerReport> {
        let mut report = ConsumerReport::default();
        for event in events {
            match event {
                DecodeEvent::Frame(frame) => {
                    while !self.writer.is_ready_for_more_data() {
                        report.backpressure_waits += 1;
                        trace!("{}: 输出端未就绪, 等待", self.writer.name());
                        thread::sleep(self.poll_interval);
                    }
                    let index = report.frames_written;
                    let pts = Timestamp::for_frame(index, self.frame_duration, self.time_base);
                    trace!("{}: 写入第 {} 帧, pts={}", self.writer.name(), index, pts);
                    self.writer.append(&frame.buffer, pts)?;
                    report.frames_written += 1;
                }
                DecodeEvent::Error(err) => {
                    debug!("消费者收到解码错误: {}", err);
                    *report.errors.entry(err.kind()).or_default() += 1;
                }
            }
        }
        self.writer.finish()?;
        info!(
            "{}: 写入 {} 帧, 解码错误 {} 个",
            self.writer.name(),
            report.frames_written,
            report.total_errors()
        );
        Ok(report)
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: FrameWriter + 'static> FrameConsumer<W> {
    /// 在新线程上消费, 线程结束时交还输出端
    pub fn spawn(
        mut self,
        events: Receiver<DecodeEvent>,
    ) -> NalflowResult<JoinHandle<NalflowResult<(ConsumerReport, W)>>> {
        let handle = thread::Builder::new()
            .name("nalflow-consumer".into())
            .spawn(move || {
                let report = self.run(events)?;
                Ok((report, self.into_writer()))
            })?;
        Ok(handle)
    }
}
