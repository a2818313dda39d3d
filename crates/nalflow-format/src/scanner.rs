//! 跨块 NAL 扫描.
//!
//! 单个缓冲区内只能产出两端都有起始码的单元, 每块最后一个起始码之后的数据
//! (未封闭的尾部) 在 `CarryOver` 模式下保留到下一块的开头, 因此跨块拆开的
//! 起始码或单元不会丢失; 流结束时尾部由 EOF 封闭, 作为最后一个单元产出.
//! 第一个起始码之前的字节被丢弃.
//!
//! `ChunkLocal` 模式逐块独立扫描: 每块最后一个单元被丢弃, 流结束时不补发.

use log::warn;
use nalflow_codec::parsers::h264::{START_CODE_LEN, bounded_nal_units, find_start_codes};
use serde::{Deserialize, Serialize};

/// 块边界处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkBoundary {
    /// 保留未封闭尾部到下一块
    #[default]
    CarryOver,
    /// 逐块独立扫描
    ChunkLocal,
}

/// 跨块扫描器
#[derive(Debug)]
pub struct ChunkScanner {
    boundary: ChunkBoundary,
    max_unit_size: usize,
    carry: Vec<u8>,
    /// `carry` 是否以起始码开头
    synced: bool,
    discarded_bytes: u64,
    scanned_bytes: u64,
}

impl ChunkScanner {
    pub fn new(boundary: ChunkBoundary, max_unit_size: usize) -> Self {
        Self {
            boundary,
            max_unit_size,
            carry: Vec::new(),
            synced: false,
            discarded_bytes: 0,
            scanned_bytes: 0,
        }
    }

    pub fn boundary(&self) -> ChunkBoundary {
        self.boundary
    }

    /// 丢弃的字节数 (首个起始码之前的数据与超长单元)
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// `CarryOver` 模式下累计搜索起始码的字节数, 与输入长度呈线性关系
    pub fn scanned_bytes(&self) -> u64 {
        self.scanned_bytes
    }

    /// 当前保留的未封闭尾部长度
    pub fn pending_len(&self) -> usize {
        self.carry.len()
    }

    /// 扫描一块数据, 对每个封闭单元调用 `emit`, 返回产出的单元数
    pub fn push_chunk<F: FnMut(&[u8])>(&mut self, chunk: &[u8], mut emit: F) -> usize {
        if self.boundary == ChunkBoundary::ChunkLocal {
            let units = bounded_nal_units(chunk);
            for unit in &units {
                emit(unit);
            }
            return units.len();
        }

        // 上一块之前的字节已检查过, 只需从可能被拆开的起始码处继续
        let resume = self.carry.len().saturating_sub(START_CODE_LEN - 1);
        self.carry.extend_from_slice(chunk);
        self.scanned_bytes += (self.carry.len() - resume) as u64;
        let mut starts: Vec<usize> = find_start_codes(&self.carry[resume..])
            .into_iter()
            .map(|pos| pos + resume)
            .collect();
        if self.synced {
            starts.insert(0, 0);
        }
        let (Some(&first), Some(&last)) = (starts.first(), starts.last()) else {
            // 尚未找到任何起始码: 只保留可能是半个起始码的尾部
            self.keep_partial_start_code();
            return 0;
        };

        self.discarded_bytes += first as u64;
        for window in starts.windows(2) {
            emit(&self.carry[window[0]..window[1]]);
        }

        self.carry.drain(..last);
        self.synced = true;
        if self.carry.len() > self.max_unit_size {
            warn!(
                "NAL 单元超过 {} 字节仍未结束, 丢弃 {} 字节",
                self.max_unit_size,
                self.carry.len()
            );
            self.synced = false;
            self.keep_partial_start_code();
        }
        starts.len() - 1
    }

    /// 流结束: 产出由 EOF 封闭的最后一个单元
    pub fn finish<F: FnMut(&[u8])>(&mut self, mut emit: F) -> usize {
        let tail = std::mem::take(&mut self.carry);
        if !self.synced || tail.is_empty() {
            self.discarded_bytes += tail.len() as u64;
            return 0;
        }
        self.synced = false;
        emit(&tail);
        1
    }

    fn keep_partial_start_code(&mut self) {
        let keep = self.carry.len().min(START_CODE_LEN - 1);
        let drop_len = self.carry.len() - keep;
        self.discarded_bytes += drop_len as u64;
        self.carry.drain(..drop_len);
    }
}
