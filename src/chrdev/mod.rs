// ============================================================================
// src/chrdev/mod.rs - hello キャラクタデバイス
// ============================================================================
//!
//! # キャラクタデバイス
//!
//! - `buffer`: 固定容量の共有バッファとクランプ規則
//! - `handle`: オープンごとのカーソル
//! - `controller`: ライフサイクルと操作のディスパッチ
//! - `namespace`, `node`: 外部協調者 (番号割り当て・ノード公開)

pub mod buffer;
pub mod controller;
pub mod handle;
pub mod namespace;
pub mod node;
pub mod stats;

pub use buffer::BoundedBuffer;
pub use controller::{DeviceController, DeviceState};
pub use handle::{DeviceHandle, HandleId};
pub use namespace::{DeviceNumber, DynamicNamespace, NamespaceAllocator};
pub use node::{NodeDescriptor, NodeEntry, NodeMode, NodePublisher, NodeRegistry};
pub use stats::{StatsSnapshot, TransferStats};
