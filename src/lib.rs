// ============================================================================
// src/lib.rs - hello キャラクタデバイス
// ============================================================================
//!
//! # hello_chrdev
//!
//! 固定容量バイトバッファを公開する単一インスタンスのキャラクタデバイス。
//!
//! ## ライフサイクル
//! 1. 名前空間からデバイス番号を取得 (register)
//! 2. バッファを初期化してからノードを公開 (publish)
//! 3. open / read / write / ioctl / release
//! 4. ノードを隠してから番号を返却 (unpublish)
//!
//! 名前空間アロケータ・ノード公開・ユーザーコピーは外部協調者であり、
//! それぞれトレイトとして注入する。

#![no_std]

extern crate alloc;

pub mod chrdev;
pub mod config;
pub mod error;
pub mod uaccess;

pub use chrdev::{
    BoundedBuffer, DeviceController, DeviceHandle, DeviceNumber, DeviceState, DynamicNamespace,
    HandleId, NamespaceAllocator, NodeDescriptor, NodeMode, NodePublisher, NodeRegistry,
    StatsSnapshot, TransferStats,
};
pub use config::DeviceConfig;
pub use error::{DeviceError, DeviceResult, ErrorContext, NamespaceError, NodeError};
pub use uaccess::{UserAccess, UserAddr, UserArena};

/// ログターゲット
pub(crate) const LOG_TARGET: &str = "hello";
