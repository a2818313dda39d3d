mod helpers;
mod session;

use nalflow_core::PixelFormat;

use super::H264StreamDecoder;
use crate::sink::DecodeSink;

use helpers::*;

#[test]
fn test_nal_stats_count_each_category() {
    let (sink, _rx) = DecodeSink::channel();
    let mut dec = H264StreamDecoder::new(RecordingBackend::default(), PixelFormat::Gray8, sink);
    for unit in [SPS_64X48, PPS, IDR, SLICE, SEI, &[0, 0, 0, 1][..]] {
        dec.process_nal_unit(unit);
    }
    let stats = dec.stats();
    assert_eq!(stats.units, 6);
    assert_eq!(stats.sps, 1);
    assert_eq!(stats.pps, 1);
    assert_eq!(stats.idr, 1);
    assert_eq!(stats.coded_slices, 1);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.parameter_set_commits, 1);
}

#[test]
fn test_forbidden_bit_is_counted_but_processed() {
    let (sink, _rx) = DecodeSink::channel();
    let mut dec = H264StreamDecoder::new(RecordingBackend::default(), PixelFormat::Gray8, sink);
    dec.process_nal_unit(&[0, 0, 0, 1, 0xE7, 0x42, 0xC0, 0x1E, 0xDA, 0x23, 0xC8]);
    let stats = dec.stats();
    assert_eq!(stats.forbidden_bit_set, 1);
    assert_eq!(stats.sps, 1);
}
