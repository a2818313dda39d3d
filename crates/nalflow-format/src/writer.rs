//! 解码帧输出端 trait 定义.

use nalflow_codec::PixelBuffer;
use nalflow_core::{NalflowResult, Timestamp};

/// 解码帧输出端
///
/// 由帧消费线程驱动, 因此要求 `Send`.
///
/// 使用流程:
/// 1. 轮询 `is_ready_for_more_data()`, 未就绪时等待
/// 2. 调用 `append()` 写入一帧
/// 3. 流结束后调用 `finish()`
pub trait FrameWriter: Send {
    /// 输出端名称
    fn name(&self) -> &str;

    /// 是否可以接收下一帧
    fn is_ready_for_more_data(&self) -> bool;

    /// 写入一帧
    fn append(&mut self, buffer: &PixelBuffer, pts: Timestamp) -> NalflowResult<()>;

    /// 完成输出 (刷新缓冲等)
    fn finish(&mut self) -> NalflowResult<()>;
}
