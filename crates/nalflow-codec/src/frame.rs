//! 解码输出的像素缓冲区.
//!
//! 多平面存储, 与 `PixelFormat` 的平面布局一致.
//! 例如 YUV420P 有 3 个平面: Y, U, V; BGRA 只有 1 个打包平面.

use nalflow_core::{NalflowError, NalflowResult, PixelFormat, Timestamp};

/// 像素缓冲区
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// 各平面的像素数据
    pub data: Vec<Vec<u8>>,
    /// 各平面每行的字节数 (linesize / stride)
    pub linesize: Vec<usize>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
}

impl PixelBuffer {
    /// 创建指定几何的黑色图像 (紧密排列)
    pub fn blank(width: u32, height: u32, pixel_format: PixelFormat) -> NalflowResult<Self> {
        if width == 0 || height == 0 {
            return Err(NalflowError::InvalidArgument(format!(
                "图像尺寸非法: {}x{}",
                width, height
            )));
        }
        let mut data = Vec::new();
        let mut linesize = Vec::new();
        for plane in 0..pixel_format.plane_count() as usize {
            let (Some(stride), Some(rows)) = (
                pixel_format.plane_linesize(plane, width),
                pixel_format.plane_height(plane, height),
            ) else {
                break;
            };
            let len = plane_len(stride, rows, width, height)?;
            let mut buf = try_alloc(len, width, height)?;
            match (pixel_format, plane) {
                (PixelFormat::Bgra, _) => {
                    buf.resize(len, 0);
                    for px in buf.chunks_exact_mut(4) {
                        px[3] = 0xFF;
                    }
                }
                (_, 0) => buf.resize(len, 16),
                _ => buf.resize(len, 128),
            }
            data.push(buf);
            linesize.push(stride);
        }
        if data.is_empty() {
            return Err(NalflowError::Unsupported(format!(
                "不支持的输出像素格式: {}",
                pixel_format
            )));
        }
        Ok(Self {
            data,
            linesize,
            width,
            height,
            pixel_format,
        })
    }

    /// 从 I420 (YUV420P) 平面转换到目标像素格式
    ///
    /// `strides` 为源平面 (Y, U, V) 的行跨度, 可大于图像宽度.
    /// 转换到 BGRA 使用 BT.601 limited range 系数.
    pub fn from_i420(
        planes: (&[u8], &[u8], &[u8]),
        strides: (usize, usize, usize),
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> NalflowResult<Self> {
        if width == 0 || height == 0 {
            return Err(NalflowError::InvalidArgument(format!(
                "图像尺寸非法: {}x{}",
                width, height
            )));
        }
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let (y, u, v) = planes;
        let (ys, us, vs) = strides;
        let fits = |plane: &[u8], stride: usize, cols: usize, rows: usize| {
            stride >= cols
                && stride
                    .checked_mul(rows - 1)
                    .and_then(|n| n.checked_add(cols))
                    .is_some_and(|need| plane.len() >= need)
        };
        if !fits(y, ys, w, h) || !fits(u, us, cw, ch) || !fits(v, vs, cw, ch) {
            return Err(NalflowError::InvalidData(format!(
                "I420 平面尺寸不足: {}x{}, strides={:?}",
                width, height, strides
            )));
        }

        let y_at = |col: usize, row: usize| y[row * ys + col];
        let u_at = |col: usize, row: usize| u[(row / 2) * us + col / 2];
        let v_at = |col: usize, row: usize| v[(row / 2) * vs + col / 2];

        let data = match pixel_format {
            PixelFormat::Yuv420p => vec![
                copy_plane(y, ys, w, h),
                copy_plane(u, us, cw, ch),
                copy_plane(v, vs, cw, ch),
            ],
            PixelFormat::Nv12 => {
                let mut uv = try_alloc(plane_len(cw, 2 * ch, width, height)?, width, height)?;
                for row in 0..ch {
                    for col in 0..cw {
                        uv.push(u[row * us + col]);
                        uv.push(v[row * vs + col]);
                    }
                }
                vec![copy_plane(y, ys, w, h), uv]
            }
            PixelFormat::Gray8 => vec![copy_plane(y, ys, w, h)],
            PixelFormat::Bgra => {
                let row_bytes = plane_len(w, 4, width, height)?;
                let mut out = try_alloc(plane_len(row_bytes, h, width, height)?, width, height)?;
                for row in 0..h {
                    for col in 0..w {
                        let [r, g, b] = bt601_to_rgb(y_at(col, row), u_at(col, row), v_at(col, row));
                        out.extend_from_slice(&[b, g, r, 0xFF]);
                    }
                }
                vec![out]
            }
            other => {
                return Err(NalflowError::Unsupported(format!(
                    "不支持的输出像素格式: {}",
                    other
                )));
            }
        };

        let linesize = (0..data.len())
            .filter_map(|plane| pixel_format.plane_linesize(plane, width))
            .collect();
        Ok(Self {
            data,
            linesize,
            width,
            height,
            pixel_format,
        })
    }

    /// 获取指定平面
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.data.get(index).map(Vec::as_slice)
    }

    /// 平面数量、行跨度与数据长度是否与几何一致
    pub fn is_valid(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let planes = self.pixel_format.plane_count() as usize;
        if planes == 0 || self.data.len() != planes || self.linesize.len() != planes {
            return false;
        }
        (0..planes).all(|p| {
            match (
                self.pixel_format.plane_linesize(p, self.width),
                self.pixel_format.plane_height(p, self.height),
            ) {
                (Some(min_stride), Some(rows)) => {
                    self.linesize[p] >= min_stride && self.data[p].len() >= self.linesize[p] * rows
                }
                _ => false,
            }
        })
    }
}

/// 解码完成的一帧
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// 像素数据
    pub buffer: PixelBuffer,
    /// 显示时间戳 (提交时未指定, 通常为 NOPTS)
    pub pts: Timestamp,
}

fn plane_len(stride: usize, rows: usize, width: u32, height: u32) -> NalflowResult<usize> {
    stride.checked_mul(rows).ok_or_else(|| {
        NalflowError::InvalidArgument(format!("图像尺寸溢出: {}x{}", width, height))
    })
}

/// 申请平面内存, 失败时返回错误而不是中止进程
fn try_alloc(len: usize, width: u32, height: u32) -> NalflowResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|err| {
        NalflowError::InvalidArgument(format!(
            "无法为 {}x{} 图像分配 {} 字节: {}",
            width, height, len, err
        ))
    })?;
    Ok(buf)
}

fn copy_plane(src: &[u8], stride: usize, width: usize, height: usize) -> Vec<u8> {
    if stride == width {
        return src[..width * height].to_vec();
    }
    let mut out = Vec::with_capacity(width * height);
    for row in src.chunks(stride).take(height) {
        out.extend_from_slice(&row[..width]);
    }
    out
}

fn bt601_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |x: i32| x.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_yuv420p() {
        let buf = PixelBuffer::blank(4, 2, PixelFormat::Yuv420p).unwrap();
        assert_eq!(buf.data.len(), 3);
        assert_eq!(buf.linesize, vec![4, 2, 2]);
        assert!(buf.data[0].iter().all(|&b| b == 16));
        assert_eq!(buf.data[1], vec![128, 128]);
        assert!(buf.is_valid());
    }

    #[test]
    fn test_blank_bgra_is_opaque_black() {
        let buf = PixelBuffer::blank(2, 2, PixelFormat::Bgra).unwrap();
        assert_eq!(buf.data[0].len(), 16);
        assert_eq!(&buf.data[0][..4], &[0, 0, 0, 0xFF]);
        assert!(buf.is_valid());
    }

    #[test]
    fn test_blank_rejects_none_and_zero_size() {
        assert!(PixelBuffer::blank(4, 4, PixelFormat::None).is_err());
        assert!(PixelBuffer::blank(0, 4, PixelFormat::Gray8).is_err());
    }

    #[test]
    fn test_blank_oversized_is_error_not_abort() {
        // 4 * u32::MAX * u32::MAX 超出 usize, 须返回错误
        let err = PixelBuffer::blank(u32::MAX, u32::MAX, PixelFormat::Bgra).unwrap_err();
        assert!(matches!(err, NalflowError::InvalidArgument(_)));
        assert!(PixelBuffer::blank(u32::MAX, u32::MAX, PixelFormat::Yuv420p).is_err());
    }

    #[test]
    fn test_try_alloc_reports_capacity_overflow() {
        assert!(matches!(
            try_alloc(usize::MAX, 1, 1),
            Err(NalflowError::InvalidArgument(_))
        ));
        assert!(try_alloc(16, 2, 2).unwrap().capacity() >= 16);
    }

    #[test]
    fn test_from_i420_with_padded_stride() {
        // 2x2 图像, Y 行跨度 4
        let y = [16, 235, 0, 0, 16, 235, 0, 0];
        let u = [128];
        let v = [128];
        let buf = PixelBuffer::from_i420((&y, &u, &v), (4, 1, 1), 2, 2, PixelFormat::Yuv420p)
            .unwrap();
        assert_eq!(buf.data[0], vec![16, 235, 16, 235]);
        assert_eq!(buf.linesize, vec![2, 1, 1]);

        let gray =
            PixelBuffer::from_i420((&y, &u, &v), (4, 1, 1), 2, 2, PixelFormat::Gray8).unwrap();
        assert_eq!(gray.data, vec![vec![16, 235, 16, 235]]);
    }

    #[test]
    fn test_from_i420_to_bgra_and_nv12() {
        let y = [16, 235, 16, 235];
        let u = [128];
        let v = [128];
        let bgra =
            PixelBuffer::from_i420((&y, &u, &v), (2, 1, 1), 2, 2, PixelFormat::Bgra).unwrap();
        assert_eq!(&bgra.data[0][..4], &[0, 0, 0, 0xFF]);
        assert_eq!(&bgra.data[0][4..8], &[255, 255, 255, 0xFF]);

        let nv12 =
            PixelBuffer::from_i420((&y, &u, &v), (2, 1, 1), 2, 2, PixelFormat::Nv12).unwrap();
        assert_eq!(nv12.data[1], vec![128, 128]);
        assert!(nv12.is_valid());
    }

    #[test]
    fn test_from_i420_rejects_short_planes() {
        let y = [16u8; 3];
        let uv = [128u8];
        assert!(
            PixelBuffer::from_i420((&y, &uv, &uv), (2, 1, 1), 2, 2, PixelFormat::Yuv420p).is_err()
        );
    }

    #[test]
    fn test_invalid_buffer_detection() {
        let mut buf = PixelBuffer::blank(4, 4, PixelFormat::Gray8).unwrap();
        buf.data[0].truncate(3);
        assert!(!buf.is_valid());
    }
}
