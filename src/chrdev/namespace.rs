// ============================================================================
// src/chrdev/namespace.rs - デバイス番号名前空間
// ============================================================================
//!
//! デバイスの数値 ID (メジャー番号 + マイナー番号範囲) を割り当てる外部協調者。

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::error::NamespaceError;

/// デバイス番号 (Newtype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct DeviceNumber {
    major: u16,
    minor: u16,
}

impl DeviceNumber {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub const fn major(&self) -> u16 {
        self.major
    }

    pub const fn minor(&self) -> u16 {
        self.minor
    }

    pub const fn to_dev_t(&self) -> u32 {
        ((self.major as u32) << 16) | (self.minor as u32)
    }

    pub const fn from_dev_t(dev: u32) -> Self {
        Self {
            major: (dev >> 16) as u16,
            minor: dev as u16,
        }
    }
}

/// 名前空間アロケータトレイト
pub trait NamespaceAllocator: Send + Sync {
    /// `first_minor` から `count` 個のマイナー番号を持つ範囲を確保し、先頭番号を返す
    fn allocate(
        &self,
        first_minor: u16,
        count: u16,
        name: &str,
    ) -> Result<DeviceNumber, NamespaceError>;

    /// `allocate` で得た範囲を返却
    fn release(&self, base: DeviceNumber, count: u16) -> Result<(), NamespaceError>;
}

/// 確保済み範囲
struct Region {
    first_minor: u16,
    count: u16,
    name: String,
}

/// 動的メジャー番号アロケータ
///
/// 空いているメジャー番号を上限から下限に向かって探す。
pub struct DynamicNamespace {
    regions: spin::Mutex<BTreeMap<u16, Region>>,
    highest: u16,
    lowest: u16,
}

impl DynamicNamespace {
    /// 動的メジャー番号の上限
    pub const DYNAMIC_MAJOR_START: u16 = 254;
    /// 動的メジャー番号の下限
    pub const DYNAMIC_MAJOR_END: u16 = 234;

    pub fn new() -> Self {
        Self::with_range(Self::DYNAMIC_MAJOR_END, Self::DYNAMIC_MAJOR_START)
    }

    /// `[lowest, highest]` のメジャー番号を割り当てるアロケータ
    pub fn with_range(lowest: u16, highest: u16) -> Self {
        Self {
            regions: spin::Mutex::new(BTreeMap::new()),
            highest,
            lowest,
        }
    }

    /// 確保済み範囲の数
    pub fn allocated(&self) -> usize {
        self.regions.lock().len()
    }

    /// メジャー番号の登録名
    pub fn name_of(&self, major: u16) -> Option<String> {
        self.regions.lock().get(&major).map(|r| r.name.clone())
    }
}

impl Default for DynamicNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceAllocator for DynamicNamespace {
    fn allocate(
        &self,
        first_minor: u16,
        count: u16,
        name: &str,
    ) -> Result<DeviceNumber, NamespaceError> {
        if count == 0 || (first_minor as u32) + (count as u32) > u16::MAX as u32 + 1 {
            return Err(NamespaceError::InvalidRange);
        }

        let mut regions = self.regions.lock();
        let major = (self.lowest..=self.highest)
            .rev()
            .find(|major| !regions.contains_key(major))
            .ok_or(NamespaceError::Exhausted)?;

        regions.insert(
            major,
            Region {
                first_minor,
                count,
                name: String::from(name),
            },
        );
        Ok(DeviceNumber::new(major, first_minor))
    }

    fn release(&self, base: DeviceNumber, count: u16) -> Result<(), NamespaceError> {
        let mut regions = self.regions.lock();
        match regions.get(&base.major()) {
            Some(region) if region.first_minor == base.minor() && region.count == count => {
                regions.remove(&base.major());
                Ok(())
            }
            Some(_) => Err(NamespaceError::InvalidRange),
            None => Err(NamespaceError::NotRegistered),
        }
    }
}
