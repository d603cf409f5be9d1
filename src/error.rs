//! 統一エラーハンドリングモジュール
//!
//! デバイス全体で使用されるエラー型を定義し、
//! 各サブシステムのエラーから変換を提供します。
//!
//! 読み取り時のデータ終端と書き込み時の容量枯渇はエラーではなく、
//! 長さ 0 の成功として返される。

use core::fmt;

/// デバイス全体の統一エラー型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// 名前空間関連エラー
    Namespace(NamespaceError),
    /// ノード公開関連エラー
    Node(NodeError),
    /// ユーザーコピーの失敗 (EFAULT)
    Fault,
    /// 未知または解放済みのハンドル
    InvalidHandle,
    /// デバイスが公開されていない
    NotPublished,
    /// オープン中のハンドルが残っている
    Busy,
    /// 設定値が不正
    InvalidConfig,
}

/// 名前空間関連エラーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceError {
    /// 割り当て可能な番号がない
    Exhausted,
    /// 既に番号を保持している
    AlreadyRegistered,
    /// 番号を保持していない
    NotRegistered,
    /// マイナー番号範囲が不正
    InvalidRange,
}

/// ノード公開関連エラーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// 同名のノードが既に存在
    AlreadyExists,
    /// ノードが見つからない
    NotFound,
}

// errno 値 (asm-generic/errno-base.h)
const ENOENT: i32 = 2;
const EBADF: i32 = 9;
const EFAULT: i32 = 14;
const EBUSY: i32 = 16;
const EEXIST: i32 = 17;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;

impl DeviceError {
    /// ホスト ABI に返す負の errno
    pub const fn errno(&self) -> i32 {
        match self {
            DeviceError::Namespace(NamespaceError::Exhausted)
            | DeviceError::Namespace(NamespaceError::AlreadyRegistered) => -EBUSY,
            DeviceError::Namespace(NamespaceError::NotRegistered)
            | DeviceError::Namespace(NamespaceError::InvalidRange) => -EINVAL,
            DeviceError::Node(NodeError::AlreadyExists) => -EEXIST,
            DeviceError::Node(NodeError::NotFound) => -ENOENT,
            DeviceError::Fault => -EFAULT,
            DeviceError::InvalidHandle => -EBADF,
            DeviceError::NotPublished => -ENODEV,
            DeviceError::Busy => -EBUSY,
            DeviceError::InvalidConfig => -EINVAL,
        }
    }

    /// 名前空間クラスのエラーか
    pub const fn is_namespace(&self) -> bool {
        matches!(self, DeviceError::Namespace(_))
    }
}

// ===== Display implementations =====

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Namespace(e) => write!(f, "Namespace error: {}", e),
            DeviceError::Node(e) => write!(f, "Node error: {}", e),
            DeviceError::Fault => write!(f, "bad address"),
            DeviceError::InvalidHandle => write!(f, "invalid handle"),
            DeviceError::NotPublished => write!(f, "device not published"),
            DeviceError::Busy => write!(f, "device busy"),
            DeviceError::InvalidConfig => write!(f, "invalid configuration"),
        }
    }
}

impl fmt::Display for NamespaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceError::Exhausted => write!(f, "namespace exhausted"),
            NamespaceError::AlreadyRegistered => write!(f, "already registered"),
            NamespaceError::NotRegistered => write!(f, "not registered"),
            NamespaceError::InvalidRange => write!(f, "invalid minor range"),
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::AlreadyExists => write!(f, "node already exists"),
            NodeError::NotFound => write!(f, "node not found"),
        }
    }
}

// ===== From implementations for sub-errors =====

impl From<NamespaceError> for DeviceError {
    fn from(e: NamespaceError) -> Self {
        DeviceError::Namespace(e)
    }
}

impl From<NodeError> for DeviceError {
    fn from(e: NodeError) -> Self {
        DeviceError::Node(e)
    }
}

// ===== Result type alias =====

/// デバイス操作の結果型エイリアス
pub type DeviceResult<T> = Result<T, DeviceError>;

// ===== Error extension trait =====

/// エラーに追加情報を付加するためのトレイト
pub trait ErrorContext<T> {
    /// エラーにコンテキスト情報を追加
    fn context(self, ctx: &'static str) -> Result<T, ContextualError>;
}

/// コンテキスト付きエラー
#[derive(Debug)]
pub struct ContextualError {
    pub error: DeviceError,
    pub context: &'static str,
}

impl<T, E: Into<DeviceError>> ErrorContext<T> for Result<T, E> {
    fn context(self, ctx: &'static str) -> Result<T, ContextualError> {
        self.map_err(|e| ContextualError {
            error: e.into(),
            context: ctx,
        })
    }
}

impl fmt::Display for ContextualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.error)
    }
}
