//! H.264/AVC 码流解析器.
//!
//! 提供对 Annex B 码流的解析能力:
//! - 起始码扫描与 NAL 单元切分
//! - NAL 单元类型识别
//! - SPS (Sequence Parameter Set) 几何信息解析
//! - avcC (AVCDecoderConfigurationRecord) 构建
//! - 格式描述 ([`H264FormatDescriptor`])

pub mod avcc;
pub mod descriptor;
pub mod nal;
pub mod sps;

pub use avcc::build_avcc_config;
pub use descriptor::H264FormatDescriptor;
pub use nal::{
    MIN_NAL_UNIT_LEN, NalUnitType, START_CODE, START_CODE_LEN, bounded_nal_units, classify,
    find_start_codes, forbidden_zero_bit, nal_payload, nal_ref_idc, remove_emulation_prevention,
};
pub use sps::{Sps, parse_sps};
