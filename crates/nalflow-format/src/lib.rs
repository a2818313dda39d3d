//! # nalflow-format
//!
//! nalflow 输入输出层: 按固定大小分块读取 Annex B 码流, 把 NAL 单元送入
//! [`H264StreamDecoder`](nalflow_codec::H264StreamDecoder), 并在独立线程上
//! 把解码帧写入带反压的输出端.

pub mod consumer;
pub mod feeder;
pub mod io;
pub mod pipeline;
pub mod scanner;
pub mod writer;
pub mod writers;

// 重导出常用类型
pub use consumer::{ConsumerReport, FrameConsumer};
pub use feeder::{FeedStats, StreamFeeder};
pub use io::ChunkReader;
pub use pipeline::{PipelineConfig, PipelineReport, run_pipeline};
pub use scanner::{ChunkBoundary, ChunkScanner};
pub use writer::FrameWriter;
pub use writers::RawVideoWriter;
