// ============================================================================
// src/chrdev/buffer.rs - 固定容量バイトバッファ
// ============================================================================
//!
//! デバイスに 1 つだけ存在する共有バッファ。
//! 全ての転送は `[0, logical_size)` にクランプされる。
//!
//! ストレージは `spin::Mutex` で保護し、ロックはカーネル内のバイトコピーの間だけ
//! 保持する。ユーザーコピーはロック外でステージングバッファに対して行う。

use alloc::vec;
use alloc::vec::Vec;

/// 固定容量バイトバッファ
pub struct BoundedBuffer {
    storage: spin::Mutex<Vec<u8>>,
    /// 論理サイズ (初期化時に固定)
    logical_size: usize,
}

impl BoundedBuffer {
    /// 容量 `capacity` のバッファを作成 (論理サイズ = 容量)
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: spin::Mutex::new(vec![0; capacity]),
            logical_size: capacity,
        }
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.storage.lock().len()
    }

    /// 論理サイズ
    pub fn logical_size(&self) -> usize {
        self.logical_size
    }

    /// `offset` から `requested` バイト転送するときの実際の長さ
    ///
    /// `offset >= logical_size` なら 0 (データ終端 / 容量枯渇)。
    pub fn clamp(&self, offset: usize, requested: usize) -> usize {
        if offset >= self.logical_size {
            return 0;
        }
        requested.min(self.logical_size - offset)
    }

    /// `[offset, offset + clamp(offset, requested))` のコピーを返す
    pub fn transfer_out(&self, offset: usize, requested: usize) -> Vec<u8> {
        let len = self.clamp(offset, requested);
        if len == 0 {
            return Vec::new();
        }
        let storage = self.storage.lock();
        storage[offset..offset + len].to_vec()
    }

    /// `bytes` を `offset` から書き込み、受け付けたバイト数を返す
    ///
    /// 論理サイズを超える分は黙って捨てる。
    pub fn transfer_in(&self, offset: usize, bytes: &[u8]) -> usize {
        let len = self.clamp(offset, bytes.len());
        if len == 0 {
            return 0;
        }
        let mut storage = self.storage.lock();
        storage[offset..offset + len].copy_from_slice(&bytes[..len]);
        len
    }
}
