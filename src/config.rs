// ============================================================================
// src/config.rs - デバイス設定
// ============================================================================

use crate::error::{DeviceError, DeviceResult};

/// デフォルトのバッファ容量 (バイト)
pub const BUFFER_SIZE: usize = 1024;

/// デフォルトのデバイス名
pub const DEVICE_NAME: &str = "hello";

/// デバイス設定
///
/// ノードのアクセスモードは設定できない (常に 0666)。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// ノード名・名前空間登録名
    pub name: &'static str,
    /// バッファ容量
    pub capacity: usize,
    /// 先頭マイナー番号
    pub first_minor: u16,
    /// 確保するマイナー番号の数
    pub minor_count: u16,
}

impl DeviceConfig {
    /// 既定値 (/dev/hello, 1024 バイト, マイナー 0 を 1 つ)
    pub const fn new() -> Self {
        Self {
            name: DEVICE_NAME,
            capacity: BUFFER_SIZE,
            first_minor: 0,
            minor_count: 1,
        }
    }

    pub const fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub const fn with_minors(mut self, first_minor: u16, minor_count: u16) -> Self {
        self.first_minor = first_minor;
        self.minor_count = minor_count;
        self
    }

    /// 設定値を検証
    pub fn validate(&self) -> DeviceResult<()> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(DeviceError::InvalidConfig);
        }
        if self.minor_count == 0 {
            return Err(DeviceError::InvalidConfig);
        }
        // マイナー番号範囲が u16 に収まること
        if (self.first_minor as u32) + (self.minor_count as u32) > u16::MAX as u32 + 1 {
            return Err(DeviceError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}
