//! 码流馈送.
//!
//! 按块读取 Annex B 码流, 经 [`ChunkScanner`] 切分出 NAL 单元,
//! 逐个交给 [`H264StreamDecoder`]. 整个过程在调用线程上同步进行,
//! 只有来源的 I/O 错误会中断.

use std::io::Read;

use log::{debug, info};
use nalflow_codec::parsers::h264::MIN_NAL_UNIT_LEN;
use nalflow_codec::{DecodeBackend, H264StreamDecoder};
use nalflow_core::NalflowResult;

use crate::io::ChunkReader;
use crate::scanner::{ChunkBoundary, ChunkScanner};

/// 馈送统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// 读取的块数
    pub chunks: u64,
    /// 读取的字节数
    pub bytes: u64,
    /// 送入解码驱动的 NAL 单元数
    pub units: u64,
    /// 扫描时丢弃的字节数
    pub discarded_bytes: u64,
}

/// 码流馈送器
pub struct StreamFeeder<R: Read> {
    reader: ChunkReader<R>,
    scanner: ChunkScanner,
}

impl<R: Read> StreamFeeder<R> {
    pub fn new(reader: ChunkReader<R>, boundary: ChunkBoundary, max_unit_size: usize) -> Self {
        Self {
            reader,
            scanner: ChunkScanner::new(boundary, max_unit_size),
        }
    }

    /// 读到流末尾, 把每个 NAL 单元交给解码驱动
    ///
    /// 不足 5 字节的一次读取视为流结束. 返回时解码会话仍处于打开状态,
    /// 由调用方决定何时调用 [`H264StreamDecoder::finish`].
    pub fn run<B: DecodeBackend>(
        &mut self,
        decoder: &mut H264StreamDecoder<B>,
    ) -> NalflowResult<FeedStats> {
        let mut stats = FeedStats::default();
        let mut process = |unit: &[u8]| decoder.process_nal_unit(unit);

        while let Some(chunk) = self.reader.next_chunk()? {
            stats.chunks += 1;
            stats.bytes += chunk.len() as u64;
            let short_read = chunk.len() < MIN_NAL_UNIT_LEN;
            stats.units += self.scanner.push_chunk(chunk, &mut process) as u64;
            if short_read {
                debug!("读取不足 {} 字节, 结束码流", MIN_NAL_UNIT_LEN);
                break;
            }
        }
        stats.units += self.scanner.finish(&mut process) as u64;
        stats.discarded_bytes = self.scanner.discarded_bytes();

        info!(
            "码流读取完成: {} 块, {} 字节, {} 个 NAL 单元",
            stats.chunks, stats.bytes, stats.units
        );
        Ok(stats)
    }

    pub fn reader(&self) -> &ChunkReader<R> {
        &self.reader
    }
}
