// ============================================================================
// src/chrdev/stats.rs - 転送統計
// ============================================================================
//!
//! `stats` フィーチャー有効時のみカウンタを更新する。

use core::sync::atomic::{AtomicU64, Ordering};

/// 転送統計
#[derive(Debug, Default)]
pub struct TransferStats {
    reads: AtomicU64,
    writes: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    faults: AtomicU64,
}

/// 統計のスナップショット
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub faults: u64,
}

impl TransferStats {
    pub const fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_read(&self, bytes: usize) {
        if cfg!(feature = "stats") {
            self.reads.fetch_add(1, Ordering::Relaxed);
            self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_write(&self, bytes: usize) {
        if cfg!(feature = "stats") {
            self.writes.fetch_add(1, Ordering::Relaxed);
            self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_fault(&self) {
        if cfg!(feature = "stats") {
            self.faults.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}
