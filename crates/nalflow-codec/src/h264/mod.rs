//! H.264 码流解码驱动.
//!
//! [`H264StreamDecoder`] 接收已切分的 Annex B NAL 单元, 按类型分发:
//! - SPS/PPS → 参数集缓存 → 格式描述 → 会话管理
//! - IDR/非 IDR slice → AVCC 封装 → 会话提交
//! - 其他类型忽略
//!
//! 所有非致命错误经 [`DecodeSink`] 上报, 处理从不因单个单元中断.

mod packager;
mod parameter_sets;
mod session;
#[cfg(test)]
mod tests;

use log::{debug, trace, warn};
use nalflow_core::PixelFormat;

use crate::backend::DecodeBackend;
use crate::parsers::h264::{NalUnitType, START_CODE_LEN, classify, forbidden_zero_bit};
use crate::sink::DecodeSink;

pub use packager::{
    CodedFrame, SampleBuffer, SampleTiming, package_coded_frame, unpackage_coded_frame,
};
pub use parameter_sets::{ParameterSetCache, ParameterSetKind};
pub use session::{FormatChange, SessionManager, SessionState, SessionStats, SubmitOutcome};

/// NAL 单元统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NalStats {
    /// 收到的单元总数
    pub units: u64,
    /// 无法分类 (不足 5 字节) 而跳过的单元
    pub malformed: u64,
    pub sps: u64,
    pub pps: u64,
    pub idr: u64,
    pub coded_slices: u64,
    /// 其余类型 (SEI、AUD、数据分区等), 被忽略
    pub ignored: u64,
    /// forbidden_zero_bit 置位的单元 (仍按类型处理)
    pub forbidden_bit_set: u64,
    /// 参数集提交次数
    pub parameter_set_commits: u64,
}

/// H.264 码流解码驱动
pub struct H264StreamDecoder<B: DecodeBackend> {
    cache: ParameterSetCache,
    session: SessionManager<B>,
    sink: DecodeSink,
    stats: NalStats,
}

impl<B: DecodeBackend> H264StreamDecoder<B> {
    pub fn new(backend: B, output_format: PixelFormat, sink: DecodeSink) -> Self {
        Self {
            cache: ParameterSetCache::new(),
            session: SessionManager::new(backend, output_format, sink.clone()),
            sink,
            stats: NalStats::default(),
        }
    }

    /// 处理一个以起始码开头的 NAL 单元
    pub fn process_nal_unit(&mut self, unit: &[u8]) {
        self.stats.units += 1;
        let Some(nal_type) = classify(unit) else {
            self.stats.malformed += 1;
            debug!("跳过过短的 NAL 单元: len={}", unit.len());
            return;
        };
        if forbidden_zero_bit(unit[START_CODE_LEN]) {
            self.stats.forbidden_bit_set += 1;
            warn!("NAL 单元 forbidden_zero_bit 置位: type={}", nal_type);
        }
        trace!("NAL 类型: {}, len={}", nal_type, unit.len());

        match nal_type {
            NalUnitType::Sps => {
                self.stats.sps += 1;
                self.observe_parameter_set(ParameterSetKind::Sps, unit);
            }
            NalUnitType::Pps => {
                self.stats.pps += 1;
                self.observe_parameter_set(ParameterSetKind::Pps, unit);
            }
            NalUnitType::Idr | NalUnitType::CodedSlice => {
                if nal_type.is_idr() {
                    self.stats.idr += 1;
                } else {
                    self.stats.coded_slices += 1;
                }
                if let Err(err) = self.session.submit(unit) {
                    self.sink.report(err);
                }
            }
            _ => self.stats.ignored += 1,
        }
    }

    fn observe_parameter_set(&mut self, kind: ParameterSetKind, unit: &[u8]) {
        self.cache.observe(kind, unit);
        if !self.cache.try_commit() {
            return;
        }
        self.stats.parameter_set_commits += 1;
        let Some((sps, pps)) = self.cache.committed() else {
            return;
        };
        match self.session.update_format(sps, pps) {
            Ok(change) => debug!("参数集已提交: {:?}", change),
            Err(err) => self.sink.report(err),
        }
    }

    /// 流结束: 释放会话, 等待在途解码完成
    pub fn finish(&mut self) {
        self.session.close();
    }

    pub fn stats(&self) -> NalStats {
        self.stats
    }

    pub fn session_stats(&self) -> SessionStats {
        self.session.stats()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn descriptor(&self) -> Option<&B::Descriptor> {
        self.session.descriptor()
    }

    pub fn backend(&self) -> &B {
        self.session.backend()
    }
}
