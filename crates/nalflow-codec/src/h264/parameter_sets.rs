//! SPS/PPS 缓存.
//!
//! 两阶段: `observe` 只更新 "dirty" 候选, `try_commit` 在 SPS 与 PPS
//! 都存在且与已提交的一对不同时才提升为 "committed", 避免单个 SPS
//! 或重复的相同参数集引起格式描述与会话的反复重建.

use bytes::Bytes;

use crate::parsers::h264::nal_payload;

/// 参数集种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetKind {
    Sps,
    Pps,
}

/// 参数集缓存
#[derive(Debug, Default)]
pub struct ParameterSetCache {
    dirty_sps: Option<Bytes>,
    dirty_pps: Option<Bytes>,
    committed_sps: Option<Bytes>,
    committed_pps: Option<Bytes>,
    commit_count: u64,
}

impl ParameterSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个参数集候选 (整个单元, 含起始码)
    pub fn observe(&mut self, kind: ParameterSetKind, unit: &[u8]) {
        let data = Bytes::copy_from_slice(unit);
        match kind {
            ParameterSetKind::Sps => self.dirty_sps = Some(data),
            ParameterSetKind::Pps => self.dirty_pps = Some(data),
        }
    }

    /// 尝试提交候选参数集, 返回是否需要重建格式描述
    pub fn try_commit(&mut self) -> bool {
        let (Some(sps), Some(pps)) = (&self.dirty_sps, &self.dirty_pps) else {
            return false;
        };
        let unchanged = self.committed_sps.as_ref() == Some(sps)
            && self.committed_pps.as_ref() == Some(pps);
        if unchanged {
            return false;
        }

        self.committed_sps = Some(sps.clone());
        self.committed_pps = Some(pps.clone());
        self.commit_count += 1;
        true
    }

    /// 已提交的 SPS 与 PPS, 去掉起始码 (保留头部字节)
    pub fn committed(&self) -> Option<(&[u8], &[u8])> {
        match (&self.committed_sps, &self.committed_pps) {
            (Some(sps), Some(pps)) => Some((nal_payload(sps), nal_payload(pps))),
            _ => None,
        }
    }

    /// 成功提交的次数
    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }
}
