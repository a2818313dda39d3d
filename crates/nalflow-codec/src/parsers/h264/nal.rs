//! H.264 NAL (Network Abstraction Layer) 单元扫描与分类.
//!
//! # Annex B 格式
//!
//! 本模块只识别 4 字节起始码 `00 00 00 01`. 一个缓冲区中找到 `k` 个起始码时,
//! 只产出 `k-1` 个两端都有边界的 NAL 单元, 最后一个起始码之后的数据
//! 由调用方决定是否跨块保留.
//!
//! # NAL 头部 (1 字节, 紧跟起始码)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! 所有函数都以下标切片的方式工作, 不复制调用方的缓冲区.

use std::fmt;

/// Annex B 起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// 起始码长度 (同时也是 AVCC 长度前缀的长度)
pub const START_CODE_LEN: usize = 4;

/// 可分类 NAL 单元的最小长度: 起始码 + 1 字节头部
pub const MIN_NAL_UNIT_LEN: usize = START_CODE_LEN + 1;

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// 未定义 / 保留 (0 与 13..=31)
    Undefined,
    /// 非 IDR 图像切片
    CodedSlice,
    /// 数据分区 A
    DataPartitionA,
    /// 数据分区 B
    DataPartitionB,
    /// 数据分区 C
    DataPartitionC,
    /// IDR 图像切片 (关键帧)
    Idr,
    /// 增补增强信息
    Sei,
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
    /// 访问单元分隔符
    AccessUnitDelimiter,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
}

impl NalUnitType {
    /// 从 NAL 类型编号 (低 5 位) 创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id & 0x1F {
            1 => Self::CodedSlice,
            2 => Self::DataPartitionA,
            3 => Self::DataPartitionB,
            4 => Self::DataPartitionC,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::AccessUnitDelimiter,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            _ => Self::Undefined,
        }
    }

    /// 从 NAL 头部字节创建, 忽略 forbidden 与 ref_idc 位
    pub fn from_header_byte(header: u8) -> Self {
        Self::from_type_id(header & 0x1F)
    }

    /// 获取类型编号, `Undefined` 返回 0
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::CodedSlice => 1,
            Self::DataPartitionA => 2,
            Self::DataPartitionB => 3,
            Self::DataPartitionC => 4,
            Self::Idr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::AccessUnitDelimiter => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::CodedSlice
                | Self::DataPartitionA
                | Self::DataPartitionB
                | Self::DataPartitionC
                | Self::Idr
        )
    }

    /// 是否为关键帧 (IDR)
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::Idr)
    }

    /// 是否为参数集 (SPS/PPS)
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }
}

impl fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "Undefined",
            Self::CodedSlice => "CodedSlice",
            Self::DataPartitionA => "DataPartitionA",
            Self::DataPartitionB => "DataPartitionB",
            Self::DataPartitionC => "DataPartitionC",
            Self::Idr => "IDR",
            Self::Sei => "SEI",
            Self::Sps => "SPS",
            Self::Pps => "PPS",
            Self::AccessUnitDelimiter => "AccessUnitDelimiter",
            Self::EndOfSequence => "EndOfSequence",
            Self::EndOfStream => "EndOfStream",
            Self::FillerData => "FillerData",
        };
        f.write_str(name)
    }
}

/// 头部字节中的 nal_ref_idc (0-3)
pub fn nal_ref_idc(header: u8) -> u8 {
    (header >> 5) & 0x03
}

/// 头部字节中的 forbidden_zero_bit
pub fn forbidden_zero_bit(header: u8) -> bool {
    header & 0x80 != 0
}

/// 查找所有 4 字节起始码的位置
///
/// 返回每个满足 `data[i..i + 4] == [0, 0, 0, 1]` 的偏移 `i`, 升序.
pub fn find_start_codes(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut i = 0;

    while i + START_CODE_LEN <= data.len() {
        // 第 3 字节不是 0x00 或 0x01 时, 任何覆盖它之前位置的起始码都不成立
        match data[i + 3] {
            0x01 if data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x00 => {
                positions.push(i);
                i += START_CODE_LEN;
            }
            0x00 | 0x01 => i += 1,
            _ => i += START_CODE_LEN,
        }
    }

    positions
}

/// 切分出缓冲区内两端都有起始码边界的 NAL 单元
///
/// `k` 个起始码产出恰好 `k-1` 个切片 `[o_i, o_{i+1})`, 每个切片以起始码开头.
/// 第一个起始码之前与最后一个起始码之后的数据不产出.
pub fn bounded_nal_units(data: &[u8]) -> Vec<&[u8]> {
    find_start_codes(data)
        .windows(2)
        .map(|w| &data[w[0]..w[1]])
        .collect()
}

/// 对一个以起始码开头的 NAL 单元分类
///
/// 起始码之后没有头部字节 (长度不足 5) 时返回 `None`, 调用方应跳过该单元.
pub fn classify(unit: &[u8]) -> Option<NalUnitType> {
    if unit.len() < MIN_NAL_UNIT_LEN {
        return None;
    }
    Some(NalUnitType::from_header_byte(unit[START_CODE_LEN]))
}

/// 去掉起始码后的 NAL 数据 (含头部字节)
pub fn nal_payload(unit: &[u8]) -> &[u8] {
    unit.get(START_CODE_LEN..).unwrap_or_default()
}

/// 移除 emulation prevention 字节 (0x00 0x00 0x03 → 0x00 0x00)
///
/// 参数集解析需要的是 RBSP, 编码器在连续两个 0x00 之后插入的 0x03 需去除.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03 {
            rbsp.push(0x00);
            rbsp.push(0x00);
            i += 3;
        } else {
            rbsp.push(data[i]);
            i += 1;
        }
    }

    rbsp
}
