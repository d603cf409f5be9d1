// ============================================================================
// src/chrdev/node.rs - デバイスノードの公開
// ============================================================================
//!
//! ユーザーから見えるデバイスノードの作成・破棄を担う外部協調者と、
//! そのメモリ上実装 `NodeRegistry`。

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicU64, Ordering};

use super::namespace::DeviceNumber;
use crate::error::NodeError;

bitflags! {
    /// ノードのアクセスモード
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeMode: u32 {
        const OTHER_WRITE = 0o002;
        const OTHER_READ = 0o004;
        const GROUP_WRITE = 0o020;
        const GROUP_READ = 0o040;
        const OWNER_WRITE = 0o200;
        const OWNER_READ = 0o400;

        /// 全員に読み書きを許可 (0666)
        const WORLD_RW = Self::OWNER_READ.bits() | Self::OWNER_WRITE.bits()
            | Self::GROUP_READ.bits() | Self::GROUP_WRITE.bits()
            | Self::OTHER_READ.bits() | Self::OTHER_WRITE.bits();
    }
}

/// 公開するノードの記述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    /// ノード名
    pub name: String,
    /// デバイス番号
    pub number: DeviceNumber,
    /// アクセスモード
    pub mode: NodeMode,
}

impl NodeDescriptor {
    pub fn new(name: &str, number: DeviceNumber, mode: NodeMode) -> Self {
        Self {
            name: String::from(name),
            number,
            mode,
        }
    }

    /// 公開イベントの環境変数 (`DEVMODE=0666` 形式)
    pub fn presentation(&self) -> Vec<String> {
        vec![format!("DEVMODE={:04o}", self.mode.bits())]
    }
}

/// ノード公開トレイト
pub trait NodePublisher: Send + Sync {
    /// ノードを作成して可視化
    fn create_node(&self, node: &NodeDescriptor) -> Result<(), NodeError>;

    /// ノードを破棄
    fn destroy_node(&self, number: DeviceNumber) -> Result<(), NodeError>;
}

/// ノードエントリ
#[derive(Debug, Clone)]
pub struct NodeEntry {
    /// inode番号
    pub inode: u64,
    pub descriptor: NodeDescriptor,
}

/// メモリ上のノードテーブル
pub struct NodeRegistry {
    nodes: spin::RwLock<BTreeMap<String, NodeEntry>>,
    /// 次のinode番号
    next_inode: AtomicU64,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: spin::RwLock::new(BTreeMap::new()),
            next_inode: AtomicU64::new(2),
        }
    }

    fn allocate_inode(&self) -> u64 {
        self.next_inode.fetch_add(1, Ordering::AcqRel)
    }

    /// 名前でノードを検索
    pub fn lookup(&self, name: &str) -> Option<NodeEntry> {
        self.nodes.read().get(name).cloned()
    }

    /// ノード一覧
    pub fn readdir(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    /// ノードの公開イベントを問い合わせる
    pub fn uevent(&self, name: &str) -> Result<Vec<String>, NodeError> {
        self.nodes
            .read()
            .get(name)
            .map(|e| e.descriptor.presentation())
            .ok_or(NodeError::NotFound)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodePublisher for NodeRegistry {
    fn create_node(&self, node: &NodeDescriptor) -> Result<(), NodeError> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&node.name) {
            return Err(NodeError::AlreadyExists);
        }
        let entry = NodeEntry {
            inode: self.allocate_inode(),
            descriptor: node.clone(),
        };
        nodes.insert(node.name.clone(), entry);
        Ok(())
    }

    fn destroy_node(&self, number: DeviceNumber) -> Result<(), NodeError> {
        let mut nodes = self.nodes.write();
        let name = nodes
            .iter()
            .find(|(_, e)| e.descriptor.number == number)
            .map(|(name, _)| name.clone())
            .ok_or(NodeError::NotFound)?;
        nodes.remove(&name);
        Ok(())
    }
}
