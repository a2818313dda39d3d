//! 裸视频输出.
//!
//! 每帧按平面顺序写出紧密排列的像素行 (去掉行跨度填充),
//! 与 FFmpeg `rawvideo` 格式一致, 可直接用
//! `ffplay -f rawvideo -pixel_format bgra -video_size WxH` 播放.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, warn};
use nalflow_codec::PixelBuffer;
use nalflow_core::{NalflowError, NalflowResult, PixelFormat, Timestamp};

use crate::writer::FrameWriter;

/// 裸视频输出端
pub struct RawVideoWriter<W: Write + Send> {
    inner: W,
    /// 首帧的几何与格式, 用于检测中途变化
    geometry: Option<(u32, u32, PixelFormat)>,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: Write + Send> RawVideoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            geometry: None,
            frames_written: 0,
            bytes_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl RawVideoWriter<BufWriter<File>> {
    /// 创建 (或截断) 输出文件
    pub fn create(path: impl AsRef<Path>) -> NalflowResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> FrameWriter for RawVideoWriter<W> {
    fn name(&self) -> &str {
        "rawvideo"
    }

    fn is_ready_for_more_data(&self) -> bool {
        true
    }

    fn append(&mut self, buffer: &PixelBuffer, _pts: Timestamp) -> NalflowResult<()> {
        let geometry = (buffer.width, buffer.height, buffer.pixel_format);
        match self.geometry {
            None => {
                debug!(
                    "rawvideo: {}x{} {}, 每帧 {} 字节",
                    buffer.width,
                    buffer.height,
                    buffer.pixel_format,
                    buffer
                        .pixel_format
                        .frame_size(buffer.width, buffer.height)
                        .unwrap_or(0)
                );
                self.geometry = Some(geometry);
            }
            Some(prev) if prev != geometry => {
                warn!(
                    "rawvideo: 帧几何变化 {}x{} {} -> {}x{} {}",
                    prev.0, prev.1, prev.2, buffer.width, buffer.height, buffer.pixel_format
                );
                self.geometry = Some(geometry);
            }
            Some(_) => {}
        }

        let format = buffer.pixel_format;
        for (plane, data) in buffer.data.iter().enumerate() {
            let (Some(row_bytes), Some(rows), Some(&stride)) = (
                format.plane_linesize(plane, buffer.width),
                format.plane_height(plane, buffer.height),
                buffer.linesize.get(plane),
            ) else {
                return Err(NalflowError::InvalidData(format!(
                    "rawvideo: 平面 {} 与像素格式 {} 不符",
                    plane, format
                )));
            };
            if stride < row_bytes || data.len() < stride * rows.saturating_sub(1) + row_bytes {
                return Err(NalflowError::InvalidData(format!(
                    "rawvideo: 平面 {} 数据不足",
                    plane
                )));
            }
            for row in 0..rows {
                let start = row * stride;
                self.inner.write_all(&data[start..start + row_bytes])?;
            }
            self.bytes_written += (row_bytes * rows) as u64;
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> NalflowResult<()> {
        self.inner.flush()?;
        debug!(
            "rawvideo: 完成, {} 帧, {} 字节",
            self.frames_written, self.bytes_written
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planes_written_tightly() {
        let mut buf = PixelBuffer::blank(2, 2, PixelFormat::Yuv420p).unwrap();
        // 人为加宽 Y 平面行跨度
        buf.linesize[0] = 3;
        buf.data[0] = vec![1, 2, 0xEE, 3, 4, 0xEE];

        let mut writer = RawVideoWriter::new(Vec::new());
        writer.append(&buf, Timestamp::none()).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.frames_written(), 1);
        assert_eq!(writer.bytes_written(), 6);
        assert_eq!(writer.into_inner(), vec![1, 2, 3, 4, 128, 128]);
    }

    #[test]
    fn test_bgra_frames_appended_back_to_back() {
        let buf = PixelBuffer::blank(2, 1, PixelFormat::Bgra).unwrap();
        let mut writer = RawVideoWriter::new(Vec::new());
        assert!(writer.is_ready_for_more_data());
        writer.append(&buf, Timestamp::none()).unwrap();
        writer.append(&buf, Timestamp::none()).unwrap();
        let out = writer.into_inner();
        assert_eq!(out.len(), 16);
        assert_eq!(&out[..4], &[0, 0, 0, 0xFF]);
    }

    #[test]
    fn test_truncated_plane_is_rejected() {
        let mut buf = PixelBuffer::blank(4, 4, PixelFormat::Gray8).unwrap();
        buf.data[0].truncate(5);
        let mut writer = RawVideoWriter::new(Vec::new());
        assert!(writer.append(&buf, Timestamp::none()).is_err());
        assert_eq!(writer.frames_written(), 0);
    }

    #[test]
    fn test_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gray");
        let mut writer = RawVideoWriter::create(&path).unwrap();
        let buf = PixelBuffer::blank(4, 2, PixelFormat::Gray8).unwrap();
        writer.append(&buf, Timestamp::none()).unwrap();
        writer.finish().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![16u8; 8]);
    }
}
