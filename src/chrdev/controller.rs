// ============================================================================
// src/chrdev/controller.rs - デバイスコントローラ
// ============================================================================
//!
//! ライフサイクル (register → publish → unpublish) と、
//! open / read / write / ioctl / release のディスパッチ。
//!
//! ## ロック順序
//! `transition` (Mutex) → `state` (RwLock) → `handles` (Mutex)
//! → ハンドルごとの Mutex → バッファ内部の Mutex
//!
//! 外部協調者 (ノード公開・名前空間) は `state` を保持せずに呼び出す。
//! 公開処理中のブロードキャスタは `presentation_event` を問い合わせてよい。
//! ユーザーコピーはハンドルのロックだけを保持して行う。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use log::{debug, info, warn};

use super::buffer::BoundedBuffer;
use super::handle::{HandleId, HandleTable, SharedHandle};
use super::namespace::{DeviceNumber, NamespaceAllocator};
use super::node::{NodeDescriptor, NodeMode, NodePublisher};
use super::stats::{StatsSnapshot, TransferStats};
use crate::LOG_TARGET;
use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult, ErrorContext, NamespaceError};
use crate::uaccess::{UserAccess, UserAddr};

/// 転送ログ (`verbose_logging` で info に昇格)
macro_rules! transfer_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "verbose_logging")]
        info!(target: LOG_TARGET, $($arg)*);
        #[cfg(not(feature = "verbose_logging"))]
        debug!(target: LOG_TARGET, $($arg)*);
    };
}

/// 外部から観測できるライフサイクル状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// 番号未取得
    Unregistered,
    /// 番号取得済み、ノード未公開
    Registered,
    /// バッファ初期化済み、ノード作成中
    Publishing,
    /// ノード公開中
    Published,
    /// ノード破棄中 (ハンドルは無効化済み)
    Unpublishing,
}

/// 内部状態
enum Lifecycle {
    Unregistered,
    Registered {
        identity: DeviceNumber,
    },
    Publishing {
        identity: DeviceNumber,
        buffer: Arc<BoundedBuffer>,
        node: NodeDescriptor,
    },
    Published {
        identity: DeviceNumber,
        buffer: Arc<BoundedBuffer>,
        node: NodeDescriptor,
    },
    Unpublishing {
        identity: DeviceNumber,
        node: NodeDescriptor,
    },
}

impl Lifecycle {
    fn identity(&self) -> Option<DeviceNumber> {
        match self {
            Lifecycle::Unregistered => None,
            Lifecycle::Registered { identity }
            | Lifecycle::Publishing { identity, .. }
            | Lifecycle::Published { identity, .. }
            | Lifecycle::Unpublishing { identity, .. } => Some(*identity),
        }
    }

    /// 転送に使えるバッファ (ノード作成中も含む)
    fn buffer(&self) -> Option<&Arc<BoundedBuffer>> {
        match self {
            Lifecycle::Publishing { buffer, .. } | Lifecycle::Published { buffer, .. } => {
                Some(buffer)
            }
            _ => None,
        }
    }

    fn node(&self) -> Option<&NodeDescriptor> {
        match self {
            Lifecycle::Publishing { node, .. }
            | Lifecycle::Published { node, .. }
            | Lifecycle::Unpublishing { node, .. } => Some(node),
            _ => None,
        }
    }
}

/// デバイスコントローラ
///
/// 唯一の `BoundedBuffer` を所有し、全てのアクセスはこのメソッド群を通る。
pub struct DeviceController {
    config: DeviceConfig,
    namespace: Arc<dyn NamespaceAllocator>,
    publisher: Arc<dyn NodePublisher>,
    uaccess: Arc<dyn UserAccess>,
    /// ライフサイクル遷移の直列化
    transition: spin::Mutex<()>,
    state: spin::RwLock<Lifecycle>,
    handles: spin::Mutex<HandleTable>,
    stats: TransferStats,
}

impl DeviceController {
    /// 新しいコントローラを作成 (状態は Unregistered)
    pub fn new(
        config: DeviceConfig,
        namespace: Arc<dyn NamespaceAllocator>,
        publisher: Arc<dyn NodePublisher>,
        uaccess: Arc<dyn UserAccess>,
    ) -> DeviceResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            namespace,
            publisher,
            uaccess,
            transition: spin::Mutex::new(()),
            state: spin::RwLock::new(Lifecycle::Unregistered),
            handles: spin::Mutex::new(HandleTable::new()),
            stats: TransferStats::new(),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state(&self) -> DeviceState {
        match *self.state.read() {
            Lifecycle::Unregistered => DeviceState::Unregistered,
            Lifecycle::Registered { .. } => DeviceState::Registered,
            Lifecycle::Publishing { .. } => DeviceState::Publishing,
            Lifecycle::Published { .. } => DeviceState::Published,
            Lifecycle::Unpublishing { .. } => DeviceState::Unpublishing,
        }
    }

    /// 保持しているデバイス番号
    pub fn identity(&self) -> Option<DeviceNumber> {
        self.state.read().identity()
    }

    pub fn is_node_visible(&self) -> bool {
        self.state() == DeviceState::Published
    }

    /// オープン中のハンドル数
    pub fn open_handles(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// ノード公開イベント
    ///
    /// ノードの作成から破棄までの間 (作成中・破棄中を含む) 応答する。
    pub fn presentation_event(&self) -> Option<Vec<String>> {
        self.state.read().node().map(NodeDescriptor::presentation)
    }

    // ------------------------------------------------------------------------
    // ライフサイクル
    // ------------------------------------------------------------------------

    /// 名前空間から番号を取得
    pub fn register(&self) -> DeviceResult<DeviceNumber> {
        let _transition = self.transition.lock();
        self.register_locked()
    }

    fn register_locked(&self) -> DeviceResult<DeviceNumber> {
        if !matches!(*self.state.read(), Lifecycle::Unregistered) {
            warn!(target: LOG_TARGET, "{}: already registered", self.config.name);
            return Err(NamespaceError::AlreadyRegistered.into());
        }

        let identity = self
            .namespace
            .allocate(self.config.first_minor, self.config.minor_count, self.config.name)
            .map_err(|e| {
                warn!(target: LOG_TARGET, "Device allocation error: {}", e);
                DeviceError::from(e)
            })?;

        *self.state.write() = Lifecycle::Registered { identity };
        info!(
            target: LOG_TARGET,
            "{}: registered as {}:{}",
            self.config.name,
            identity.major(),
            identity.minor()
        );
        Ok(identity)
    }

    /// バッファを初期化してからノードを公開
    pub fn publish(&self) -> DeviceResult<()> {
        let _transition = self.transition.lock();
        self.publish_locked()
    }

    fn publish_locked(&self) -> DeviceResult<()> {
        let node = {
            let mut state = self.state.write();
            let identity = match *state {
                Lifecycle::Registered { identity } => identity,
                Lifecycle::Unregistered => return Err(NamespaceError::NotRegistered.into()),
                _ => return Err(NamespaceError::AlreadyRegistered.into()),
            };

            // バッファと公開イベントはノードが見える前に用意する
            let buffer = Arc::new(BoundedBuffer::new(self.config.capacity));
            let node = NodeDescriptor::new(self.config.name, identity, NodeMode::WORLD_RW);
            *state = Lifecycle::Publishing {
                identity,
                buffer,
                node: node.clone(),
            };
            node
        };

        let created = self.publisher.create_node(&node).context("Device init error");

        let mut state = self.state.write();
        let (identity, buffer, node) =
            match core::mem::replace(&mut *state, Lifecycle::Unregistered) {
                Lifecycle::Publishing {
                    identity,
                    buffer,
                    node,
                } => (identity, buffer, node),
                // transition ロック下では起こらない
                other => {
                    *state = other;
                    return Err(DeviceError::Busy);
                }
            };

        match created {
            Ok(()) => {
                *state = Lifecycle::Published {
                    identity,
                    buffer,
                    node,
                };
                info!(target: LOG_TARGET, "Device init completed successfully");
                Ok(())
            }
            Err(e) => {
                *state = Lifecycle::Registered { identity };
                // 作成中に開かれたハンドルはバッファと共に破棄する
                self.handles.lock().clear();
                warn!(target: LOG_TARGET, "{}", e);
                Err(e.error)
            }
        }
    }

    /// ノードを隠し、番号を返却し、バッファを解放する
    ///
    /// 未登録状態では何もしない。
    pub fn unpublish(&self) {
        let _transition = self.transition.lock();
        // 使用中でも解体するので Busy にはならない
        let _ = self.teardown_locked(false);
    }

    fn teardown_locked(&self, refuse_busy: bool) -> DeviceResult<()> {
        let (identity, hide_node) = {
            let mut state = self.state.write();
            if refuse_busy && self.handles.lock().len() > 0 {
                return Err(DeviceError::Busy);
            }

            let previous = core::mem::replace(&mut *state, Lifecycle::Unregistered);
            match previous {
                Lifecycle::Unregistered => return Ok(()),
                Lifecycle::Registered { identity } => (identity, false),
                Lifecycle::Published {
                    identity,
                    buffer,
                    node,
                } => {
                    let dropped = self.handles.lock().clear();
                    if dropped > 0 {
                        warn!(target: LOG_TARGET, "{} handles invalidated by teardown", dropped);
                    }
                    *state = Lifecycle::Unpublishing { identity, node };
                    // 転送中の呼び出しが Arc を保持していれば、その完了時に解放される
                    drop(buffer);
                    (identity, true)
                }
                // transition ロック下では起こらない
                other @ (Lifecycle::Publishing { .. } | Lifecycle::Unpublishing { .. }) => {
                    *state = other;
                    return Err(DeviceError::Busy);
                }
            }
        };

        // ノードを隠してから番号を返却する
        if hide_node {
            if let Err(e) = self
                .publisher
                .destroy_node(identity)
                .context("node destroy failed")
            {
                warn!(target: LOG_TARGET, "{}", e);
            }
        }
        if let Err(e) = self
            .namespace
            .release(identity, self.config.minor_count)
            .context("namespace release failed")
        {
            warn!(target: LOG_TARGET, "{}", e);
        }

        *self.state.write() = Lifecycle::Unregistered;
        info!(target: LOG_TARGET, "Device cleanup completed");
        Ok(())
    }

    /// register + publish (失敗時は取得した番号を返却)
    pub fn activate(&self) -> DeviceResult<()> {
        let _transition = self.transition.lock();
        self.register_locked()?;
        if let Err(e) = self.publish_locked() {
            let _ = self.teardown_locked(false);
            return Err(e);
        }
        Ok(())
    }

    /// unpublish
    pub fn deactivate(&self) {
        self.unpublish();
    }

    /// オープン中のハンドルがあれば `Busy` で拒否する deactivate
    pub fn try_deactivate(&self) -> DeviceResult<()> {
        let _transition = self.transition.lock();
        self.teardown_locked(true)
    }

    // ------------------------------------------------------------------------
    // ファイル操作
    // ------------------------------------------------------------------------

    /// 新しいハンドルを開く
    ///
    /// バッファはノードが見える前に用意されるため、ノード作成中でも開ける。
    pub fn open(&self) -> DeviceResult<HandleId> {
        let state = self.state.read();
        if state.buffer().is_none() {
            return Err(DeviceError::NotPublished);
        }
        let id = self.handles.lock().insert();
        info!(target: LOG_TARGET, "Device open successfully");
        Ok(id)
    }

    /// ハンドルの現在位置
    pub fn position(&self, handle: HandleId) -> DeviceResult<usize> {
        let shared = self.handles.lock().get(handle)?;
        let position = shared.lock().position();
        Ok(position)
    }

    /// ハンドルと共有バッファを取得
    fn session(&self, handle: HandleId) -> DeviceResult<(Arc<BoundedBuffer>, SharedHandle)> {
        let state = self.state.read();
        let shared = self.handles.lock().get(handle)?;
        match state.buffer() {
            Some(buffer) => Ok((Arc::clone(buffer), shared)),
            // バッファがなければハンドルは存在しない
            None => Err(DeviceError::InvalidHandle),
        }
    }

    /// 現在位置から最大 `len` バイトを `dst` へ読み出す
    ///
    /// 戻り値 0 はデータ終端。
    pub fn read(&self, handle: HandleId, dst: UserAddr, len: usize) -> DeviceResult<usize> {
        let (buffer, shared) = self.session(handle)?;
        let mut cursor = shared.lock();
        let offset = cursor.position();
        let bytes = buffer.transfer_out(offset, len);
        if bytes.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.uaccess.copy_to_user(dst, &bytes) {
            self.stats.record_fault();
            warn!(target: LOG_TARGET, "read fault at offset {}", offset);
            return Err(e);
        }

        cursor.advance(bytes.len());
        self.stats.record_read(bytes.len());
        transfer_log!("Device read {} bytes", bytes.len());
        Ok(bytes.len())
    }

    /// `src` から最大 `len` バイトを現在位置へ書き込む
    ///
    /// 論理サイズを超える分は黙って切り捨てる。
    pub fn write(&self, handle: HandleId, src: UserAddr, len: usize) -> DeviceResult<usize> {
        let (buffer, shared) = self.session(handle)?;
        let mut cursor = shared.lock();
        let offset = cursor.position();
        let accepted = buffer.clamp(offset, len);
        if accepted == 0 {
            return Ok(0);
        }

        let mut staged = vec![0u8; accepted];
        if let Err(e) = self.uaccess.copy_from_user(&mut staged, src) {
            self.stats.record_fault();
            warn!(target: LOG_TARGET, "write fault at offset {}", offset);
            return Err(e);
        }

        let written = buffer.transfer_in(offset, &staged);
        cursor.advance(written);
        self.stats.record_write(written);
        transfer_log!("Device write {} bytes", written);
        Ok(written)
    }

    /// ioctl: 記録して常に成功を返す
    pub fn control(&self, handle: HandleId, cmd: u32, arg: usize) -> DeviceResult<usize> {
        info!(
            target: LOG_TARGET,
            "Device ioctl (handle {}, cmd {:#x}, arg {:#x})",
            handle.as_u64(),
            cmd,
            arg
        );
        Ok(0)
    }

    /// ハンドルを閉じる (バッファの内容は保持される)
    pub fn release(&self, handle: HandleId) -> DeviceResult<()> {
        self.handles.lock().remove(handle)?;
        info!(target: LOG_TARGET, "Device released");
        Ok(())
    }
}

impl Drop for DeviceController {
    fn drop(&mut self) {
        self.unpublish();
    }
}
