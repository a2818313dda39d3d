//! AVCC 帧封装.
//!
//! 解码接口需要长度前缀的 NAL 负载而不是 Annex B 起始码:
//!
//! ```text
//! Annex B: [00 00 00 01][header | slice data]
//! AVCC:    [len: u32 BE][header | slice data]
//! ```
//!
//! 长度头与负载放在同一块连续内存中, 作为一次提交单元.

use bytes::{BufMut, Bytes, BytesMut};
use nalflow_core::Timestamp;

use crate::error::{BackendStatus, DecodeError};
use crate::parsers::h264::{MIN_NAL_UNIT_LEN, START_CODE_LEN};

/// 长度前缀封装后的编码帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedFrame {
    data: Bytes,
}

impl CodedFrame {
    /// 完整的提交单元: 长度头 + 负载
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// 负载 (NAL 头部字节 + slice 数据)
    pub fn payload(&self) -> &[u8] {
        &self.data[START_CODE_LEN..]
    }

    /// 长度头中声明的负载长度
    pub fn declared_len(&self) -> u32 {
        u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
    }

    /// 提交单元的总字节数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

/// 把以起始码开头的 slice/IDR 单元封装为 AVCC 帧
pub fn package_coded_frame(unit: &[u8]) -> Result<CodedFrame, DecodeError> {
    if unit.len() < MIN_NAL_UNIT_LEN {
        return Err(DecodeError::FramePackaging {
            status: BackendStatus::MALFORMED_SAMPLE,
        });
    }
    let payload = &unit[START_CODE_LEN..];
    let len = u32::try_from(payload.len()).map_err(|_| DecodeError::FramePackaging {
        status: BackendStatus::MALFORMED_SAMPLE,
    })?;

    let mut buf = BytesMut::with_capacity(START_CODE_LEN + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(CodedFrame { data: buf.freeze() })
}

/// 拆开一个 AVCC 帧, 返回负载
///
/// 长度头与实际负载长度不一致时视为格式错误.
pub fn unpackage_coded_frame(data: &[u8]) -> Result<&[u8], DecodeError> {
    let malformed = DecodeError::FramePackaging {
        status: BackendStatus::MALFORMED_SAMPLE,
    };
    let Some((header, payload)) = data.split_first_chunk::<4>() else {
        return Err(malformed);
    };
    if u32::from_be_bytes(*header) as usize != payload.len() {
        return Err(malformed);
    }
    Ok(payload)
}

/// 样本时间信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTiming {
    pub pts: Timestamp,
    pub dts: Timestamp,
}

impl SampleTiming {
    /// 未指定的时间信息. 解码输出按提交顺序排列, 不依赖时间戳.
    pub fn invalid() -> Self {
        Self {
            pts: Timestamp::none(),
            dts: Timestamp::none(),
        }
    }
}

/// 提交给解码引擎的样本: 编码帧 + 绑定的格式描述 + 时间信息
#[derive(Debug, Clone)]
pub struct SampleBuffer<D> {
    pub frame: CodedFrame,
    pub descriptor: D,
    pub timing: SampleTiming,
}

impl<D> SampleBuffer<D> {
    pub fn new(frame: CodedFrame, descriptor: D) -> Self {
        Self {
            frame,
            descriptor,
            timing: SampleTiming::invalid(),
        }
    }
}
