//! H.264 NAL 扫描、分类与封装集成测试

use nalflow_codec::parsers::h264::{
    H264FormatDescriptor, NalUnitType, bounded_nal_units, classify, find_start_codes,
};
use nalflow_codec::{
    ParameterSetCache, ParameterSetKind, package_coded_frame, unpackage_coded_frame,
};
use nalflow_format::{ChunkBoundary, ChunkScanner};

// ============================================================
// 测试码流
// ============================================================

const SPS_64X48: &[u8] = &[0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x23, 0xC8];
const SPS_32X32: &[u8] = &[0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x4B, 0x20];
const PPS: &[u8] = &[0x68, 0xCE, 0x3C, 0x80];

fn unit(nal: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x00, 0x01];
    out.extend_from_slice(nal);
    out
}

/// SPS + PPS + AUD + IDR + SEI + P slice
fn build_stream() -> Vec<u8> {
    [
        unit(SPS_64X48),
        unit(PPS),
        unit(&[0x09, 0xF0]),
        unit(&[0x65, 0x88, 0x84, 0x00, 0x33]),
        unit(&[0x06, 0x05, 0x01, 0x80]),
        unit(&[0x41, 0x9A, 0x02]),
    ]
    .concat()
}

// ============================================================
// 扫描与分类
// ============================================================

#[test]
fn test_bounded_units_and_classification() {
    let data = build_stream();
    let starts = find_start_codes(&data);
    assert_eq!(starts.len(), 6);

    let units = bounded_nal_units(&data);
    assert_eq!(units.len(), 5, "k 个起始码产生 k-1 个封闭单元");
    let types: Vec<_> = units.iter().map(|u| classify(u)).collect();
    assert_eq!(
        types,
        vec![
            Some(NalUnitType::Sps),
            Some(NalUnitType::Pps),
            Some(NalUnitType::AccessUnitDelimiter),
            Some(NalUnitType::Idr),
            Some(NalUnitType::Sei),
        ]
    );
    // 每个单元都以起始码开头并延伸到下一个起始码
    for (unit, window) in units.iter().zip(starts.windows(2)) {
        assert_eq!(unit.len(), window[1] - window[0]);
        assert_eq!(&unit[..4], &[0, 0, 0, 1]);
    }
}

#[test]
fn test_three_byte_start_codes_are_not_boundaries() {
    let data = [
        0x00, 0x00, 0x00, 0x01, 0x67, 0x42, //
        0x00, 0x00, 0x01, 0x68, 0xCE, //
        0x00, 0x00, 0x00, 0x01, 0x65, 0x88,
    ];
    let units = bounded_nal_units(&data);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].len(), 11);
    assert_eq!(classify(units[0]), Some(NalUnitType::Sps));
}

#[test]
fn test_undefined_and_short_units() {
    assert_eq!(classify(&[0, 0, 0, 1]), None);
    assert_eq!(classify(&[0, 0, 0, 1, 0x00]), Some(NalUnitType::Undefined));
    assert_eq!(classify(&[0, 0, 0, 1, 0x1F]), Some(NalUnitType::Undefined));
    assert_eq!(classify(&[0, 0, 0, 1, 0x6D]), Some(NalUnitType::Undefined));
}

#[test]
fn test_scanner_matches_whole_buffer_scan() {
    let data = build_stream();
    let whole: Vec<Vec<u8>> = bounded_nal_units(&data).iter().map(|u| u.to_vec()).collect();

    for chunk_size in [1, 2, 3, 5, 7, 13, data.len()] {
        let mut scanner = ChunkScanner::new(ChunkBoundary::CarryOver, 1 << 16);
        let mut units = Vec::new();
        for chunk in data.chunks(chunk_size) {
            scanner.push_chunk(chunk, |u| units.push(u.to_vec()));
        }
        scanner.finish(|u| units.push(u.to_vec()));

        assert_eq!(units.len(), whole.len() + 1, "chunk_size={chunk_size}");
        assert_eq!(&units[..whole.len()], &whole[..]);
        assert_eq!(units.last().map(Vec::as_slice), Some(&unit(&[0x41, 0x9A, 0x02])[..]));
    }
}

// ============================================================
// 参数集缓存与格式描述
// ============================================================

#[test]
fn test_parameter_set_commit_sequence() {
    let mut cache = ParameterSetCache::new();
    cache.observe(ParameterSetKind::Sps, &unit(SPS_64X48));
    assert!(!cache.try_commit(), "只有 SPS 时不提交");

    cache.observe(ParameterSetKind::Pps, &unit(PPS));
    assert!(cache.try_commit());
    assert_eq!(cache.committed(), Some((SPS_64X48, PPS)));

    // 重复的相同参数集不再提交
    cache.observe(ParameterSetKind::Sps, &unit(SPS_64X48));
    cache.observe(ParameterSetKind::Pps, &unit(PPS));
    assert!(!cache.try_commit());

    // 分辨率变化: 新 SPS 与旧 PPS 组成新的一对
    cache.observe(ParameterSetKind::Sps, &unit(SPS_32X32));
    assert!(cache.try_commit());
    assert_eq!(cache.commit_count(), 2);

    let (sps, pps) = cache.committed().unwrap();
    let desc = H264FormatDescriptor::from_parameter_sets(sps, pps).unwrap();
    assert_eq!((desc.width(), desc.height()), (32, 32));
}

#[test]
fn test_descriptor_avcc_record() {
    let desc = H264FormatDescriptor::from_parameter_sets(SPS_64X48, PPS).unwrap();
    let avcc = desc.avcc_config().unwrap();
    assert_eq!(avcc[0], 1);
    assert_eq!(&avcc[1..4], &SPS_64X48[1..4]);
    assert_eq!(avcc[4] & 0x03, 3, "NAL 长度前缀为 4 字节");
    assert_eq!(avcc[5] & 0x1F, 1);
    assert_eq!(u16::from_be_bytes([avcc[6], avcc[7]]) as usize, SPS_64X48.len());
    assert!(avcc.ends_with(PPS));
}

#[test]
fn test_descriptor_rejects_bad_parameter_sets() {
    assert!(H264FormatDescriptor::from_parameter_sets(PPS, PPS).is_err());
    assert!(H264FormatDescriptor::from_parameter_sets(SPS_64X48, &[0x68]).is_err());
    assert!(H264FormatDescriptor::from_parameter_sets(&[0x67, 0x42], PPS).is_err());
}

// ============================================================
// AVCC 封装
// ============================================================

#[test]
fn test_package_coded_frame_layout() {
    let idr = unit(&[0x65, 0x88, 0x84, 0x00, 0x33]);
    let frame = package_coded_frame(&idr).unwrap();
    assert_eq!(frame.as_bytes(), &[0, 0, 0, 5, 0x65, 0x88, 0x84, 0x00, 0x33]);
    assert_eq!(frame.declared_len(), 5);
    assert_eq!(unpackage_coded_frame(frame.as_bytes()).unwrap(), &idr[4..]);
}

#[test]
fn test_package_rejects_unit_without_payload() {
    assert!(package_coded_frame(&[0, 0, 0, 1]).is_err());
}
