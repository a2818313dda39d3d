//! 解码流水线.
//!
//! 把码流馈送、解码驱动与帧消费者串起来:
//!
//! ```text
//! 调用线程: ChunkReader → ChunkScanner → H264StreamDecoder → DecodeBackend
//!                                                              │ (引擎线程)
//!                                                              ▼
//! 消费线程:                       FrameWriter ← FrameConsumer ← DecodeSink
//! ```
//!
//! 通道有界 (`sink_capacity`), 输出端跟不上时解码回调阻塞, 馈送随之放慢.
//! 馈送在调用线程上同步完成; 随后关闭会话 (等待在途解码完成), 丢弃所有
//! `DecodeSink` 句柄, 消费线程随通道关闭而退出.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::info;
use nalflow_codec::parsers::h264::MIN_NAL_UNIT_LEN;
use nalflow_codec::{
    DEFAULT_SINK_CAPACITY, DecodeBackend, DecodeSink, H264StreamDecoder, NalStats, SessionStats,
};
use nalflow_core::{NalflowError, NalflowResult, PixelFormat, Rational};
use serde::{Deserialize, Serialize};

use crate::consumer::{ConsumerReport, FrameConsumer};
use crate::feeder::{FeedStats, StreamFeeder};
use crate::io::{ChunkReader, DEFAULT_CHUNK_SIZE};
use crate::scanner::ChunkBoundary;
use crate::writer::FrameWriter;

/// 流水线配置, 所有字段都有默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// 每次读取的字节数
    pub chunk_size: usize,
    /// 块边界处理方式
    pub chunk_boundary: ChunkBoundary,
    /// 跨块保留的未完成单元上限, 超出后丢弃
    pub max_nal_unit_size: usize,
    /// 输出像素格式名称
    pub output_pixel_format: String,
    /// 输出端未就绪时的轮询间隔 (毫秒)
    pub poll_interval_ms: u64,
    /// 呈现时间基 `[num, den]`
    pub frame_time_base: [i32; 2],
    /// 每帧时长 (单位为时间基)
    pub frame_duration: i64,
    /// 解码引擎与消费线程之间最多积压的事件数, 满后解码回调阻塞
    pub sink_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_boundary: ChunkBoundary::CarryOver,
            max_nal_unit_size: 16 * 1024 * 1024,
            output_pixel_format: PixelFormat::Bgra.name().to_string(),
            poll_interval_ms: 100,
            frame_time_base: [1, 300],
            frame_duration: 10,
            sink_capacity: DEFAULT_SINK_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// 从 JSON 文本解析, 缺省字段取默认值
    pub fn from_json_str(text: &str) -> NalflowResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| NalflowError::InvalidArgument(format!("流水线配置解析失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn from_json_file(path: impl AsRef<Path>) -> NalflowResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> NalflowResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| NalflowError::Internal(format!("流水线配置序列化失败: {e}")))
    }

    /// 检查取值范围
    pub fn validate(&self) -> NalflowResult<()> {
        if self.chunk_size < MIN_NAL_UNIT_LEN {
            return Err(NalflowError::InvalidArgument(format!(
                "chunk_size 至少为 {} 字节, 实际为 {}",
                MIN_NAL_UNIT_LEN, self.chunk_size
            )));
        }
        if self.max_nal_unit_size == 0 {
            return Err(NalflowError::InvalidArgument(
                "max_nal_unit_size 不能为 0".into(),
            ));
        }
        let [num, den] = self.frame_time_base;
        if num <= 0 || den <= 0 {
            return Err(NalflowError::InvalidArgument(format!(
                "frame_time_base 非法: {}/{}",
                num, den
            )));
        }
        if self.frame_duration <= 0 {
            return Err(NalflowError::InvalidArgument(format!(
                "frame_duration 必须为正数, 实际为 {}",
                self.frame_duration
            )));
        }
        if self.sink_capacity == 0 {
            return Err(NalflowError::InvalidArgument(
                "sink_capacity 不能为 0".into(),
            ));
        }
        self.output_pixel_format()?;
        Ok(())
    }

    /// 解析输出像素格式
    pub fn output_pixel_format(&self) -> NalflowResult<PixelFormat> {
        self.output_pixel_format.parse()
    }

    pub fn time_base(&self) -> Rational {
        Rational::new(self.frame_time_base[0], self.frame_time_base[1])
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 一次流水线运行的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub feed: FeedStats,
    pub nal: NalStats,
    pub session: SessionStats,
    pub consumer: ConsumerReport,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "输入: {} 字节, {} 块, 丢弃 {} 字节",
            self.feed.bytes, self.feed.chunks, self.feed.discarded_bytes
        )?;
        writeln!(
            f,
            "NAL: {} 个 (SPS {}, PPS {}, IDR {}, Slice {}, 忽略 {}, 过短 {})",
            self.nal.units,
            self.nal.sps,
            self.nal.pps,
            self.nal.idr,
            self.nal.coded_slices,
            self.nal.ignored,
            self.nal.malformed
        )?;
        writeln!(
            f,
            "会话: 格式描述 {}, 创建 {}, 复用 {}, 提交 {} 帧, 丢弃 {} 帧",
            self.session.descriptors_built,
            self.session.sessions_created,
            self.session.sessions_reused,
            self.session.frames_submitted,
            self.session.frames_dropped
        )?;
        write!(f, "输出: {} 帧", self.consumer.frames_written)?;
        for (kind, count) in &self.consumer.errors {
            write!(f, ", {kind}: {count}")?;
        }
        Ok(())
    }
}

/// 运行完整流水线
pub fn run_pipeline<R, B, W>(
    reader: R,
    backend: B,
    writer: W,
    config: &PipelineConfig,
) -> NalflowResult<PipelineReport>
where
    R: Read,
    B: DecodeBackend,
    W: FrameWriter + 'static,
{
    run_pipeline_with_writer(reader, backend, writer, config).map(|(report, _)| report)
}

/// 运行完整流水线, 结束后交还输出端
pub fn run_pipeline_with_writer<R, B, W>(
    reader: R,
    backend: B,
    writer: W,
    config: &PipelineConfig,
) -> NalflowResult<(PipelineReport, W)>
where
    R: Read,
    B: DecodeBackend,
    W: FrameWriter + 'static,
{
    config.validate()?;
    let output_format = config.output_pixel_format()?;
    info!(
        "流水线启动: 引擎 {}, 输出 {} ({}), 块大小 {}, {:?}, 事件队列 {}",
        backend.name(),
        writer.name(),
        output_format,
        config.chunk_size,
        config.chunk_boundary,
        config.sink_capacity
    );

    let (sink, events) = DecodeSink::bounded(config.sink_capacity);
    let consumer = FrameConsumer::new(
        writer,
        config.poll_interval(),
        config.time_base(),
        config.frame_duration,
    )
    .spawn(events)?;

    let mut decoder = H264StreamDecoder::new(backend, output_format, sink);
    let mut feeder = StreamFeeder::new(
        ChunkReader::new(reader, config.chunk_size),
        config.chunk_boundary,
        config.max_nal_unit_size,
    );
    let feed = feeder.run(&mut decoder);
    decoder.finish();
    let nal = decoder.stats();
    let session = decoder.session_stats();
    // 丢弃最后的 sink 句柄, 消费线程才能结束
    drop(decoder);

    let consumed = consumer
        .join()
        .map_err(|_| NalflowError::Internal("帧消费线程异常退出".into()))?;
    let feed = feed?;
    let (consumer, writer) = consumed?;

    let report = PipelineReport {
        feed,
        nal,
        session,
        consumer,
    };
    info!("流水线完成:\n{}", report);
    Ok((report, writer))
}
