//! 分块读取.
//!
//! 把任意 `Read` 来源按固定大小的块读出. 每块尽量填满:
//! 底层一次 `read` 返回的字节不足时继续读取, 直到块满或到达流末尾.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use nalflow_core::NalflowResult;

/// 参考块大小, 约为一帧 720x1280 图像的编码上限
pub const DEFAULT_CHUNK_SIZE: usize = 921_600;

/// 固定大小分块读取器
pub struct ChunkReader<R: Read> {
    inner: R,
    buffer: Vec<u8>,
    bytes_read: u64,
}

impl<R: Read> ChunkReader<R> {
    /// 创建读取器, `chunk_size` 最小为 1
    pub fn new(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            buffer: vec![0u8; chunk_size.max(1)],
            bytes_read: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// 已读取的总字节数
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// 读取下一块, 流末尾返回 `None`
    ///
    /// 只有最后一块可能短于 `chunk_size`.
    pub fn next_chunk(&mut self) -> NalflowResult<Option<&[u8]>> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.inner.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.bytes_read += filled as u64;
        if filled == 0 {
            return Ok(None);
        }
        Ok(Some(&self.buffer[..filled]))
    }
}

impl ChunkReader<File> {
    /// 从文件路径打开 (只读)
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> NalflowResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file, chunk_size))
    }
}
