//! H.264 SPS (Sequence Parameter Set) 几何解析.
//!
//! 只解析构建格式描述所需的字段: profile/level、色度格式、位深、
//! 裁剪后的图像尺寸、像素宽高比与 VUI 帧率. 量化矩阵等解码细节被跳过.
//!
//! SPS 中大量使用 Exp-Golomb 可变长编码:
//! - `ue(v)`: 无符号 Exp-Golomb
//! - `se(v)`: 有符号 Exp-Golomb

use nalflow_core::bitreader::BitReader;
use nalflow_core::{NalflowError, NalflowResult, Rational};

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc (66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// constraint_set 标志位
    pub constraint_set_flags: u8,
    /// level_idc (30=3.0, 41=4.1)
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// 最大参考帧数
    pub max_num_ref_frames: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only: bool,
    /// 图像宽度 (像素, 已应用 cropping)
    pub width: u32,
    /// 图像高度 (像素, 已应用 cropping)
    pub height: u32,
    /// 是否存在 VUI 参数
    pub vui_present: bool,
    /// 像素宽高比
    pub sar: Rational,
    /// 帧率 (VUI timing_info)
    pub fps: Option<Rational>,
}

/// 单边像素上限
const MAX_PICTURE_DIMENSION: u32 = 16384;

/// 每帧宏块数上限 (Level 6.2 的 MaxFS)
const MAX_FRAME_MACROBLOCKS: u64 = 139_264;

/// 预定义的 SAR 表 (ITU-T H.264 表 E-1)
const SAR_TABLE: [(i32, i32); 17] = [
    (0, 1),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

/// 从 RBSP 数据 (不含 NAL 头部字节) 解析 SPS
pub fn parse_sps(rbsp: &[u8]) -> NalflowResult<Sps> {
    if rbsp.len() < 3 {
        return Err(NalflowError::InvalidData("H.264: SPS RBSP 太短".into()));
    }

    let mut br = BitReader::new(rbsp);

    let profile_idc = br.read_bits(8)? as u8;
    let constraint_set_flags = br.read_bits(8)? as u8;
    let level_idc = br.read_bits(8)? as u8;
    let sps_id = br.read_ue()?;
    if sps_id > 31 {
        return Err(NalflowError::InvalidData(format!(
            "H.264: sps_id 超出范围, sps_id={}",
            sps_id
        )));
    }

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    let mut bit_depth_luma = 8;
    let mut bit_depth_chroma = 8;

    if is_high_profile(profile_idc) {
        chroma_format_idc = br.read_ue()?;
        if chroma_format_idc > 3 {
            return Err(NalflowError::InvalidData(format!(
                "H.264: chroma_format_idc 非法, value={}",
                chroma_format_idc
            )));
        }
        if chroma_format_idc == 3 {
            separate_colour_plane = br.read_bit()? == 1;
        }
        bit_depth_luma = read_bit_depth(&mut br)?;
        bit_depth_chroma = read_bit_depth(&mut br)?;
        if !(8..=14).contains(&bit_depth_luma) || !(8..=14).contains(&bit_depth_chroma) {
            return Err(NalflowError::InvalidData(format!(
                "H.264: 位深非法, luma={}, chroma={}",
                bit_depth_luma, bit_depth_chroma
            )));
        }
        br.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

        // seq_scaling_matrix_present_flag
        if br.read_bit()? == 1 {
            let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
            for idx in 0..list_count {
                if br.read_bit()? == 1 {
                    skip_scaling_list(&mut br, if idx < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    let log2_max_frame_num_minus4 = br.read_ue()?;
    if log2_max_frame_num_minus4 > 12 {
        return Err(NalflowError::InvalidData(format!(
            "H.264: log2_max_frame_num_minus4 超出范围, value={}",
            log2_max_frame_num_minus4
        )));
    }

    let poc_type = br.read_ue()?;
    match poc_type {
        0 => {
            let log2_max_poc_lsb_minus4 = br.read_ue()?;
            if log2_max_poc_lsb_minus4 > 12 {
                return Err(NalflowError::InvalidData(format!(
                    "H.264: log2_max_pic_order_cnt_lsb_minus4 超出范围, value={}",
                    log2_max_poc_lsb_minus4
                )));
            }
        }
        1 => {
            br.skip_bits(1)?; // delta_pic_order_always_zero_flag
            br.read_se()?; // offset_for_non_ref_pic
            br.read_se()?; // offset_for_top_to_bottom_field
            let cycle = br.read_ue()?;
            if cycle > 255 {
                return Err(NalflowError::InvalidData(format!(
                    "H.264: num_ref_frames_in_pic_order_cnt_cycle 超出范围, value={}",
                    cycle
                )));
            }
            for _ in 0..cycle {
                br.read_se()?;
            }
        }
        2 => {}
        _ => {
            return Err(NalflowError::InvalidData(format!(
                "H.264: pic_order_cnt_type 非法, value={}",
                poc_type
            )));
        }
    }

    let max_num_ref_frames = br.read_ue()?;
    if max_num_ref_frames > 16 {
        return Err(NalflowError::InvalidData(format!(
            "H.264: max_num_ref_frames 超出范围, value={}",
            max_num_ref_frames
        )));
    }
    br.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = read_minus1(&mut br, "pic_width_in_mbs_minus1")?;
    let pic_height_in_map_units = read_minus1(&mut br, "pic_height_in_map_units_minus1")?;

    let frame_mbs_only = br.read_bit()? == 1;
    let frame_height_in_mbs =
        u64::from(pic_height_in_map_units) * if frame_mbs_only { 1 } else { 2 };
    let frame_macroblocks = u64::from(pic_width_in_mbs) * frame_height_in_mbs;
    if u64::from(pic_width_in_mbs) * 16 > u64::from(MAX_PICTURE_DIMENSION)
        || frame_height_in_mbs * 16 > u64::from(MAX_PICTURE_DIMENSION)
        || frame_macroblocks > MAX_FRAME_MACROBLOCKS
    {
        return Err(NalflowError::InvalidData(format!(
            "H.264: 图像尺寸超出上限, {}x{} 宏块",
            pic_width_in_mbs, frame_height_in_mbs
        )));
    }
    if !frame_mbs_only {
        br.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    br.skip_bits(1)?; // direct_8x8_inference_flag

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if br.read_bit()? == 1 {
        crop_left = br.read_ue()?;
        crop_right = br.read_ue()?;
        crop_top = br.read_ue()?;
        crop_bottom = br.read_ue()?;
    }

    let chroma_array_type = if separate_colour_plane {
        0
    } else {
        chroma_format_idc
    };
    let (crop_unit_x, crop_unit_y) = cropping_unit(chroma_array_type, frame_mbs_only);
    let raw_width = pic_width_in_mbs
        .checked_mul(16)
        .ok_or_else(|| NalflowError::InvalidData("H.264: 计算宽度时发生溢出".into()))?;
    let raw_height = pic_height_in_map_units
        .checked_mul(if frame_mbs_only { 16 } else { 32 })
        .ok_or_else(|| NalflowError::InvalidData("H.264: 计算高度时发生溢出".into()))?;
    let crop_x = crop_left
        .checked_add(crop_right)
        .and_then(|v| v.checked_mul(crop_unit_x))
        .ok_or_else(|| NalflowError::InvalidData("H.264: 计算水平裁剪时发生溢出".into()))?;
    let crop_y = crop_top
        .checked_add(crop_bottom)
        .and_then(|v| v.checked_mul(crop_unit_y))
        .ok_or_else(|| NalflowError::InvalidData("H.264: 计算垂直裁剪时发生溢出".into()))?;
    if crop_x >= raw_width || crop_y >= raw_height {
        return Err(NalflowError::InvalidData(format!(
            "H.264: 裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
            raw_width, raw_height, crop_x, crop_y
        )));
    }

    let mut vui_present = false;
    let mut sar = Rational::new(1, 1);
    let mut fps = None;
    if br.read_bit()? == 1 {
        vui_present = true;
        (sar, fps) = parse_vui(&mut br)?;
    }

    Ok(Sps {
        profile_idc,
        constraint_set_flags,
        level_idc,
        sps_id,
        chroma_format_idc,
        bit_depth_luma,
        bit_depth_chroma,
        max_num_ref_frames,
        frame_mbs_only,
        width: raw_width - crop_x,
        height: raw_height - crop_y,
        vui_present,
        sar,
        fps,
    })
}

/// 读取 `bit_depth_*_minus8` 并还原位深
fn read_bit_depth(br: &mut BitReader) -> NalflowResult<u32> {
    let minus8 = br.read_ue()?;
    minus8
        .checked_add(8)
        .ok_or_else(|| NalflowError::InvalidData(format!("H.264: 位深非法, minus8={}", minus8)))
}

/// 读取 `*_minus1` 字段并加 1
fn read_minus1(br: &mut BitReader, field: &str) -> NalflowResult<u32> {
    let minus1 = br.read_ue()?;
    minus1
        .checked_add(1)
        .ok_or_else(|| NalflowError::InvalidData(format!("H.264: {} 溢出, value={}", field, minus1)))
}

/// 是否为 High Profile 或更高 (SPS 中带色度格式与位深字段)
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134
    )
}

/// 获取 cropping 单位
fn cropping_unit(chroma_array_type: u32, frame_mbs_only: bool) -> (u32, u32) {
    let sub_width = match chroma_array_type {
        0 | 3 => 1,
        _ => 2,
    };
    let sub_height = match chroma_array_type {
        1 => 2,
        _ => 1,
    };
    (sub_width, sub_height * if frame_mbs_only { 1 } else { 2 })
}

/// 跳过一组量化矩阵
fn skip_scaling_list(br: &mut BitReader, size: usize) -> NalflowResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = br.read_se()?;
            if !(-128..=127).contains(&delta) {
                return Err(NalflowError::InvalidData(format!(
                    "H.264: delta_scale 超出范围, value={}",
                    delta
                )));
            }
            next_scale = (last_scale + delta + 256).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// 解析 VUI 参数 (只取 SAR 与 timing_info)
fn parse_vui(br: &mut BitReader) -> NalflowResult<(Rational, Option<Rational>)> {
    let mut sar = Rational::new(1, 1);

    // aspect_ratio_info_present_flag
    if br.read_bit()? == 1 {
        let ar_idc = br.read_bits(8)? as usize;
        if ar_idc == 255 {
            let sar_w = br.read_bits(16)?;
            let sar_h = br.read_bits(16)?;
            if sar_w == 0 || sar_h == 0 {
                return Err(NalflowError::InvalidData(format!(
                    "H.264: VUI Extended_SAR 非法, sar_w={}, sar_h={}",
                    sar_w, sar_h
                )));
            }
            sar = Rational::new(sar_w as i32, sar_h as i32);
        } else if let Some(&(w, h)) = SAR_TABLE.get(ar_idc) {
            if w > 0 {
                sar = Rational::new(w, h);
            }
        } else {
            return Err(NalflowError::InvalidData(format!(
                "H.264: VUI aspect_ratio_idc 非法, value={}",
                ar_idc
            )));
        }
    }

    // overscan_info_present_flag
    if br.read_bit()? == 1 {
        br.skip_bits(1)?;
    }

    // video_signal_type_present_flag
    if br.read_bit()? == 1 {
        br.skip_bits(4)?; // video_format + video_full_range_flag
        if br.read_bit()? == 1 {
            br.skip_bits(24)?; // colour_primaries, transfer, matrix
        }
    }

    // chroma_loc_info_present_flag
    if br.read_bit()? == 1 {
        br.read_ue()?;
        br.read_ue()?;
    }

    // timing_info_present_flag
    let mut fps = None;
    if br.read_bit()? == 1 {
        let num_units = br.read_bits(32)?;
        let time_scale = br.read_bits(32)?;
        br.skip_bits(1)?; // fixed_frame_rate_flag
        if num_units == 0 || time_scale == 0 {
            return Err(NalflowError::InvalidData(format!(
                "H.264: VUI timing_info 非法, num_units_in_tick={}, time_scale={}",
                num_units, time_scale
            )));
        }
        // fps = time_scale / (2 * num_units_in_tick)
        let num = i32::try_from(time_scale).ok();
        let den = u64::from(num_units)
            .checked_mul(2)
            .and_then(|v| i32::try_from(v).ok());
        if let (Some(num), Some(den)) = (num, den) {
            fps = Some(Rational::new(num, den));
        }
    }

    Ok((sar, fps))
}
