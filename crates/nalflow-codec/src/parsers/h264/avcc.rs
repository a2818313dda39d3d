//! AVCDecoderConfigurationRecord (MP4 avcC box 内容) 构建.
//!
//! ```text
//! version(8) profile(8) compat(8) level(8)
//! 111111 lengthSizeMinusOne(2)
//! 111 numOfSPS(5) { len(16) sps }*
//! numOfPPS(8)     { len(16) pps }*
//! ```

use bytes::BufMut;
use nalflow_core::{NalflowError, NalflowResult};

/// 构建 avcC
///
/// `sps_list`/`pps_list` 为不含起始码的 NAL 数据 (含头部字节).
/// `length_size` 为 NAL 长度前缀字节数 (1, 2 或 4).
pub fn build_avcc_config(
    sps_list: &[&[u8]],
    pps_list: &[&[u8]],
    length_size: usize,
) -> NalflowResult<Vec<u8>> {
    if !matches!(length_size, 1 | 2 | 4) {
        return Err(NalflowError::InvalidArgument(format!(
            "H.264: avcC length_size 非法, value={}",
            length_size
        )));
    }
    let Some(sps0) = sps_list.first() else {
        return Err(NalflowError::InvalidData(
            "H.264: 构建 avcC 需要至少一个 SPS".into(),
        ));
    };
    if sps0.len() < 4 {
        return Err(NalflowError::InvalidData("H.264: SPS 数据太短".into()));
    }
    if sps_list.len() > 31 || pps_list.len() > 255 {
        return Err(NalflowError::InvalidData(format!(
            "H.264: avcC 参数集数量超出范围, sps={}, pps={}",
            sps_list.len(),
            pps_list.len()
        )));
    }

    let total = 7
        + sps_list.iter().map(|s| s.len() + 2).sum::<usize>()
        + pps_list.iter().map(|p| p.len() + 2).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.put_u8(1); // configurationVersion
    out.put_u8(sps0[1]); // profile_idc
    out.put_u8(sps0[2]); // profile_compatibility
    out.put_u8(sps0[3]); // level_idc
    out.put_u8(0xFC | (length_size as u8 - 1));
    out.put_u8(0xE0 | sps_list.len() as u8);
    for sps in sps_list {
        put_parameter_set(&mut out, sps)?;
    }
    out.put_u8(pps_list.len() as u8);
    for pps in pps_list {
        put_parameter_set(&mut out, pps)?;
    }

    Ok(out)
}

fn put_parameter_set(out: &mut Vec<u8>, data: &[u8]) -> NalflowResult<()> {
    let len = u16::try_from(data.len()).map_err(|_| {
        NalflowError::InvalidData(format!("H.264: 参数集过长, len={}", data.len()))
    })?;
    out.put_u16(len);
    out.put_slice(data);
    Ok(())
}
