// ============================================================================
// src/chrdev/handle.rs - オープンごとのセッション
// ============================================================================

use alloc::sync::Arc;
use hashbrown::HashMap;

use crate::error::{DeviceError, DeviceResult};

/// ハンドルID (Newtype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct HandleId(u64);

impl HandleId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// デバイスハンドル
///
/// 読み書きカーソルだけを持つ。バッファは参照しない。
#[derive(Debug, Default)]
pub struct DeviceHandle {
    cursor: usize,
}

impl DeviceHandle {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// 現在位置
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// 転送成功後にカーソルを進める
    pub fn advance(&mut self, n: usize) {
        self.cursor = self.cursor.saturating_add(n);
    }
}

/// 共有ハンドル
///
/// 同じハンドルへの読み書きはこのロックで直列化される (f_pos ロック相当)。
pub(crate) type SharedHandle = Arc<spin::Mutex<DeviceHandle>>;

/// ハンドルテーブル
pub(crate) struct HandleTable {
    handles: HashMap<HandleId, SharedHandle>,
    /// 次のハンドルID (再利用しない)
    next_id: u64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            next_id: 1,
        }
    }

    /// 新しいハンドルを挿入
    pub fn insert(&mut self) -> HandleId {
        let id = HandleId::new(self.next_id);
        self.next_id += 1;
        self.handles
            .insert(id, Arc::new(spin::Mutex::new(DeviceHandle::new())));
        id
    }

    /// ハンドルを取得 (テーブルのロック外で使う)
    pub fn get(&self, id: HandleId) -> DeviceResult<SharedHandle> {
        self.handles
            .get(&id)
            .cloned()
            .ok_or(DeviceError::InvalidHandle)
    }

    pub fn remove(&mut self, id: HandleId) -> DeviceResult<SharedHandle> {
        self.handles.remove(&id).ok_or(DeviceError::InvalidHandle)
    }

    /// 全ハンドルを破棄し、破棄した数を返す
    pub fn clear(&mut self) -> usize {
        let count = self.handles.len();
        self.handles.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }
}
