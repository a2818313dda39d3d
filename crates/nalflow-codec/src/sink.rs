//! 解码完成回调.
//!
//! 解码引擎在自己的线程上调用 [`DecodeSink::complete`], 事件经有界
//! `mpsc::sync_channel` 转交给拥有消费者的线程. 通道满时回调阻塞,
//! 消费者的背压因此传回解码引擎与提交方. Sink 只持有发送端, 不拥有消费者;
//! 接收端被丢弃后, 后续事件直接丢弃.

use std::sync::mpsc::{self, Receiver, SyncSender};

use log::{debug, warn};
use nalflow_core::Timestamp;

use crate::error::{BackendStatus, DecodeError};
use crate::frame::{DecodedFrame, PixelBuffer};

/// 发给消费者的事件. 所有逐帧错误都走同一个通道.
#[derive(Debug, Clone)]
pub enum DecodeEvent {
    /// 解码成功的一帧
    Frame(DecodedFrame),
    /// 非致命错误
    Error(DecodeError),
}

/// 默认通道容量 (事件个数)
pub const DEFAULT_SINK_CAPACITY: usize = 32;

/// 解码完成回调句柄, 可克隆并跨线程传递
#[derive(Debug, Clone)]
pub struct DecodeSink {
    tx: SyncSender<DecodeEvent>,
}

impl DecodeSink {
    /// 从已有发送端创建
    pub fn new(tx: SyncSender<DecodeEvent>) -> Self {
        Self { tx }
    }

    /// 创建默认容量的 sink 与对应的接收端
    pub fn channel() -> (Self, Receiver<DecodeEvent>) {
        Self::bounded(DEFAULT_SINK_CAPACITY)
    }

    /// 创建容量为 `capacity` 的 sink 与接收端
    ///
    /// 积压达到容量后 [`complete`](Self::complete) 阻塞, 直到消费者取走事件.
    /// `capacity` 为 0 时退化为同步交接.
    pub fn bounded(capacity: usize) -> (Self, Receiver<DecodeEvent>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self::new(tx), rx)
    }

    /// 处理一次异步解码完成
    ///
    /// - 非成功状态: 上报 `AsyncDecode`, 该帧不重试
    /// - 成功但缓冲区缺失或不完整: 上报 `InvalidImageBuffer`
    /// - 成功: 转发解码帧
    pub fn complete(&self, status: BackendStatus, buffer: Option<PixelBuffer>, pts: Timestamp) {
        if !status.is_ok() {
            self.report(DecodeError::AsyncDecode { status });
            return;
        }
        match buffer {
            Some(buffer) if buffer.is_valid() => {
                self.send(DecodeEvent::Frame(DecodedFrame { buffer, pts }));
            }
            _ => self.report(DecodeError::InvalidImageBuffer),
        }
    }

    /// 上报非致命错误
    pub fn report(&self, err: DecodeError) {
        warn!("解码错误: {}", err);
        self.send(DecodeEvent::Error(err));
    }

    fn send(&self, event: DecodeEvent) {
        if self.tx.send(event).is_err() {
            debug!("DecodeSink: 接收端已关闭, 事件被丢弃");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalflow_core::PixelFormat;

    #[test]
    fn test_complete_success_forwards_frame() {
        let (sink, rx) = DecodeSink::channel();
        let buf = PixelBuffer::blank(2, 2, PixelFormat::Gray8).unwrap();
        sink.complete(BackendStatus::OK, Some(buf.clone()), Timestamp::none());
        match rx.try_recv().unwrap() {
            DecodeEvent::Frame(frame) => {
                assert_eq!(frame.buffer, buf);
                assert!(!frame.pts.is_valid());
            }
            other => panic!("期望解码帧, 实际为 {other:?}"),
        }
    }

    #[test]
    fn test_complete_failure_is_async_decode_error() {
        let (sink, rx) = DecodeSink::channel();
        let buf = PixelBuffer::blank(2, 2, PixelFormat::Gray8).unwrap();
        sink.complete(BackendStatus::DECODER_FAILURE, Some(buf), Timestamp::none());
        assert!(matches!(
            rx.try_recv().unwrap(),
            DecodeEvent::Error(DecodeError::AsyncDecode {
                status: BackendStatus::DECODER_FAILURE
            })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_complete_without_buffer_is_invalid_image_buffer() {
        let (sink, rx) = DecodeSink::channel();
        sink.complete(BackendStatus::OK, None, Timestamp::none());
        let mut broken = PixelBuffer::blank(2, 2, PixelFormat::Gray8).unwrap();
        broken.data.clear();
        sink.complete(BackendStatus::OK, Some(broken), Timestamp::none());
        for _ in 0..2 {
            assert!(matches!(
                rx.try_recv().unwrap(),
                DecodeEvent::Error(DecodeError::InvalidImageBuffer)
            ));
        }
    }

    #[test]
    fn test_sink_survives_dropped_receiver() {
        let (sink, rx) = DecodeSink::channel();
        drop(rx);
        sink.complete(BackendStatus::OK, None, Timestamp::none());
    }

    #[test]
    fn test_sink_delivers_across_threads() {
        let (sink, rx) = DecodeSink::channel();
        let worker = std::thread::spawn(move || {
            let buf = PixelBuffer::blank(2, 2, PixelFormat::Gray8).unwrap();
            sink.complete(BackendStatus::OK, Some(buf), Timestamp::none());
        });
        worker.join().unwrap();
        assert!(matches!(rx.recv().unwrap(), DecodeEvent::Frame(_)));
    }

    #[test]
    fn test_full_sink_blocks_until_consumer_drains() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let (sink, rx) = DecodeSink::bounded(2);
        let sent = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sent);
        let worker = std::thread::spawn(move || {
            for _ in 0..5 {
                sink.complete(BackendStatus::OK, None, Timestamp::none());
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(sent.load(Ordering::SeqCst), 2, "满载后回调应阻塞");

        let events: Vec<_> = rx.iter().collect();
        worker.join().unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(sent.load(Ordering::SeqCst), 5);
    }
}
