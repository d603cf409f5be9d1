// ============================================================================
// src/uaccess.rs - ユーザー空間コピー
// ============================================================================
//!
//! 特権境界をまたぐバイトコピーの抽象化。
//! コピーは失敗し得る (不正なユーザーアドレスなど)。失敗時は `Fault` を返し、
//! 呼び出し側はバッファもカーソルも変更しない。

use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DeviceError, DeviceResult};

/// ユーザー空間アドレス (Newtype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct UserAddr(usize);

impl UserAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn as_usize(&self) -> usize {
        self.0
    }

    /// 指定バイト先のアドレス
    pub const fn add(&self, bytes: usize) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

/// ユーザーコピー操作トレイト
pub trait UserAccess: Send + Sync {
    /// カーネル側 `src` をユーザーアドレス `dst` へコピー
    fn copy_to_user(&self, dst: UserAddr, src: &[u8]) -> DeviceResult<()>;

    /// ユーザーアドレス `src` からカーネル側 `dst` へコピー
    fn copy_from_user(&self, dst: &mut [u8], src: UserAddr) -> DeviceResult<()>;
}

/// メモリ上のユーザー空間
///
/// `base` から始まる連続領域だけが有効なアドレス。
/// `inject_fault` で次の 1 回のコピーを失敗させられる。
pub struct UserArena {
    base: usize,
    memory: spin::Mutex<Vec<u8>>,
    fault_next: AtomicBool,
}

impl UserArena {
    /// 既定のベースアドレス
    pub const DEFAULT_BASE: usize = 0x4000_0000;

    pub fn new(size: usize) -> Self {
        Self::with_base(Self::DEFAULT_BASE, size)
    }

    pub fn with_base(base: usize, size: usize) -> Self {
        Self {
            base,
            memory: spin::Mutex::new(vec![0; size]),
            fault_next: AtomicBool::new(false),
        }
    }

    /// 領域の先頭アドレス
    pub fn base(&self) -> UserAddr {
        UserAddr::new(self.base)
    }

    /// 領域サイズ
    pub fn len(&self) -> usize {
        self.memory.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 次のコピーを失敗させる
    pub fn inject_fault(&self) {
        self.fault_next.store(true, Ordering::Release);
    }

    /// ユーザー側メモリに直接書き込む (ユーザープロセスの代役)
    pub fn poke(&self, addr: UserAddr, data: &[u8]) -> DeviceResult<()> {
        let mut memory = self.memory.lock();
        let start = self.index(addr, data.len(), memory.len())?;
        memory[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// ユーザー側メモリを直接読み取る
    pub fn peek(&self, addr: UserAddr, len: usize) -> DeviceResult<Vec<u8>> {
        let memory = self.memory.lock();
        let start = self.index(addr, len, memory.len())?;
        Ok(memory[start..start + len].to_vec())
    }

    /// アドレス範囲を検証してインデックスに変換
    fn index(&self, addr: UserAddr, len: usize, size: usize) -> DeviceResult<usize> {
        let start = addr
            .as_usize()
            .checked_sub(self.base)
            .ok_or(DeviceError::Fault)?;
        let end = start.checked_add(len).ok_or(DeviceError::Fault)?;
        if end > size {
            return Err(DeviceError::Fault);
        }
        Ok(start)
    }

    fn take_fault(&self) -> DeviceResult<()> {
        if self.fault_next.swap(false, Ordering::AcqRel) {
            return Err(DeviceError::Fault);
        }
        Ok(())
    }
}

impl UserAccess for UserArena {
    fn copy_to_user(&self, dst: UserAddr, src: &[u8]) -> DeviceResult<()> {
        self.take_fault()?;
        self.poke(dst, src)
    }

    fn copy_from_user(&self, dst: &mut [u8], src: UserAddr) -> DeviceResult<()> {
        self.take_fault()?;
        let memory = self.memory.lock();
        let start = self.index(src, dst.len(), memory.len())?;
        dst.copy_from_slice(&memory[start..start + dst.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_roundtrip() {
        let arena = UserArena::new(16);
        arena.copy_to_user(arena.base().add(4), b"abcd").unwrap();

        let mut buf = [0u8; 4];
        arena.copy_from_user(&mut buf, arena.base().add(4)).unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_out_of_range_faults() {
        let arena = UserArena::new(8);
        assert_eq!(
            arena.copy_to_user(arena.base().add(6), b"abc"),
            Err(DeviceError::Fault)
        );
        assert_eq!(
            arena.copy_to_user(UserAddr::new(0), b"a"),
            Err(DeviceError::Fault)
        );
        let mut buf = [0u8; 1];
        assert_eq!(
            arena.copy_from_user(&mut buf, UserAddr::new(usize::MAX)),
            Err(DeviceError::Fault)
        );
    }

    #[test]
    fn test_injected_fault_is_one_shot() {
        let arena = UserArena::new(8);
        arena.inject_fault();
        assert_eq!(arena.copy_to_user(arena.base(), b"x"), Err(DeviceError::Fault));
        assert!(arena.copy_to_user(arena.base(), b"x").is_ok());
        assert_eq!(arena.peek(arena.base(), 1).unwrap(), b"x");
    }
}
