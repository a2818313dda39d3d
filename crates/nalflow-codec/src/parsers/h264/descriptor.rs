//! H.264 格式描述.
//!
//! 由一对 SPS/PPS 构建, 记录解码会话所需的码流几何信息.
//! 描述一经创建不再修改, 参数集变化时整体替换.

use bytes::Bytes;
use nalflow_core::{NalflowError, NalflowResult, Rational};

use super::avcc::build_avcc_config;
use super::nal::{NalUnitType, remove_emulation_prevention};
use super::sps::{Sps, parse_sps};

/// NAL 长度前缀字节数 (AVCC)
pub const NAL_LENGTH_SIZE: usize = 4;

/// H.264 格式描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264FormatDescriptor {
    sps: Bytes,
    pps: Bytes,
    geometry: Sps,
}

impl H264FormatDescriptor {
    /// 从不含起始码的 SPS 与 PPS (含头部字节) 构建
    pub fn from_parameter_sets(sps: &[u8], pps: &[u8]) -> NalflowResult<Self> {
        match sps.first().map(|&h| NalUnitType::from_header_byte(h)) {
            Some(NalUnitType::Sps) => {}
            other => {
                return Err(NalflowError::InvalidData(format!(
                    "H.264: 期望 SPS, 实际为 {:?}",
                    other
                )));
            }
        }
        match pps.first().map(|&h| NalUnitType::from_header_byte(h)) {
            Some(NalUnitType::Pps) if pps.len() > 1 => {}
            _ => {
                return Err(NalflowError::InvalidData(format!(
                    "H.264: PPS 无效, len={}",
                    pps.len()
                )));
            }
        }

        let geometry = parse_sps(&remove_emulation_prevention(&sps[1..]))?;
        Ok(Self {
            sps: Bytes::copy_from_slice(sps),
            pps: Bytes::copy_from_slice(pps),
            geometry,
        })
    }

    /// 图像宽度 (已裁剪)
    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    /// 图像高度 (已裁剪)
    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    /// 宽高是否与另一描述一致
    pub fn same_dimensions(&self, other: &Self) -> bool {
        self.width() == other.width() && self.height() == other.height()
    }

    /// 像素宽高比
    pub fn sample_aspect_ratio(&self) -> Rational {
        self.geometry.sar
    }

    /// VUI 帧率
    pub fn frame_rate(&self) -> Option<Rational> {
        self.geometry.fps
    }

    /// 解析出的 SPS 字段
    pub fn geometry(&self) -> &Sps {
        &self.geometry
    }

    pub fn sps(&self) -> &[u8] {
        &self.sps
    }

    pub fn pps(&self) -> &[u8] {
        &self.pps
    }

    /// 生成 avcC (4 字节长度前缀), 供 MP4 等容器写入器使用
    pub fn avcc_config(&self) -> NalflowResult<Vec<u8>> {
        build_avcc_config(&[&self.sps[..]], &[&self.pps[..]], NAL_LENGTH_SIZE)
    }

    /// 以 Annex B 形式输出 SPS+PPS, 供需要起始码的解码引擎使用
    pub fn annex_b_parameter_sets(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.sps.len() + self.pps.len() + 8);
        for ps in [&self.sps, &self.pps] {
            out.extend_from_slice(&super::nal::START_CODE);
            out.extend_from_slice(ps);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS_64X48: &[u8] = &[0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x23, 0xC8];
    const PPS: &[u8] = &[0x68, 0xCE, 0x3C, 0x80];

    #[test]
    fn test_descriptor_geometry() {
        let desc = H264FormatDescriptor::from_parameter_sets(SPS_64X48, PPS).unwrap();
        assert_eq!((desc.width(), desc.height()), (64, 48));
        assert_eq!(desc.geometry().profile_idc, 66);
        assert_eq!(desc.sps(), SPS_64X48);
        assert_eq!(desc.pps(), PPS);
    }

    #[test]
    fn test_descriptor_rejects_swapped_or_empty_sets() {
        assert!(H264FormatDescriptor::from_parameter_sets(PPS, SPS_64X48).is_err());
        assert!(H264FormatDescriptor::from_parameter_sets(SPS_64X48, &[]).is_err());
        assert!(H264FormatDescriptor::from_parameter_sets(&[], PPS).is_err());
        assert!(H264FormatDescriptor::from_parameter_sets(&[0x67, 0x42], PPS).is_err());
    }

    #[test]
    fn test_descriptor_avcc_and_annex_b() {
        let desc = H264FormatDescriptor::from_parameter_sets(SPS_64X48, PPS).unwrap();
        let avcc = desc.avcc_config().unwrap();
        assert_eq!(avcc[4], 0xFF);
        let annex_b = desc.annex_b_parameter_sets();
        assert_eq!(&annex_b[..4], &[0, 0, 0, 1]);
        assert_eq!(annex_b.len(), SPS_64X48.len() + PPS.len() + 8);
    }

    #[test]
    fn test_descriptor_rejects_hostile_sps() {
        // 65535x65535 宏块
        let oversized = [
            0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x01, 0xFF, 0xFF, 0x90,
        ];
        // High profile, bit_depth_luma_minus8 = u32::MAX - 1
        let huge_bit_depth = [
            0x67, 0x64, 0x00, 0x1E, 0xA0, 0x00, 0x00, 0x00, 0x1F, 0xFF, 0xFF, 0xFF, 0xF8,
        ];
        for sps in [&oversized[..], &huge_bit_depth[..]] {
            assert!(matches!(
                H264FormatDescriptor::from_parameter_sets(sps, PPS),
                Err(NalflowError::InvalidData(_))
            ));
        }
    }
}
