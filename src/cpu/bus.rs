//! Flat memory bus.
//!
//! The bus owns a sparse mapping from word-aligned addresses to 32-bit
//! signed words. Addresses are byte-based but every access must be aligned
//! to the 4-byte word size; unwritten addresses read as 0.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of a memory word in bytes. All bus addresses must be multiples
/// of this.
pub const WORD_SIZE: u32 = 4;

/// Read/write counters for the bus (diagnostics only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Number of words fetched from the backing store.
    pub reads: u64,
    /// Number of words written to the backing store.
    pub writes: u64,
}

/// Flat addressable word store.
///
/// The backing store is sparse: only written addresses occupy space, and
/// everything else reads as zero. An optional address bound turns accesses
/// beyond it into [`BusError::AddressOutOfRange`]; the default bus covers
/// the full 32-bit space.
#[derive(Clone, Debug)]
pub struct MemoryBus {
    words: HashMap<u32, i32>,
    limit: Option<u32>,
    stats: BusStats,
}

impl MemoryBus {
    /// Create an unbounded bus.
    pub fn new() -> Self {
        Self {
            words: HashMap::new(),
            limit: None,
            stats: BusStats::default(),
        }
    }

    /// Create a bus that rejects addresses at or beyond `limit`.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            words: HashMap::new(),
            limit: Some(limit),
            stats: BusStats::default(),
        }
    }

    /// Populate the backing store from `(address, value)` pairs.
    ///
    /// Every address is validated up front; a misaligned or out-of-range
    /// address rejects the whole batch and the store is left untouched.
    pub fn load(&mut self, init: &[(u32, i32)]) -> Result<(), BusError> {
        for &(addr, _) in init {
            self.check(addr)?;
        }
        for &(addr, value) in init {
            self.words.insert(addr, value);
        }
        Ok(())
    }

    /// Read the word at `addr`. Never-written addresses read as 0.
    pub fn read(&mut self, addr: u32) -> Result<i32, BusError> {
        self.check(addr)?;
        self.stats.reads += 1;
        Ok(self.words.get(&addr).copied().unwrap_or(0))
    }

    /// Write the word at `addr`, inserting or overwriting the entry.
    pub fn write(&mut self, addr: u32, value: i32) -> Result<(), BusError> {
        self.check(addr)?;
        self.stats.writes += 1;
        self.words.insert(addr, value);
        Ok(())
    }

    /// Access counters.
    pub fn stats(&self) -> BusStats {
        self.stats
    }

    /// Number of addresses that have ever been written.
    pub fn populated(&self) -> usize {
        self.words.len()
    }

    /// Clear all memory contents and counters.
    pub fn clear(&mut self) {
        self.words.clear();
        self.stats = BusStats::default();
    }

    fn check(&self, addr: u32) -> Result<(), BusError> {
        if addr % WORD_SIZE != 0 {
            return Err(BusError::InvalidAddress(addr));
        }
        if let Some(limit) = self.limit {
            if addr >= limit {
                return Err(BusError::AddressOutOfRange { addr, limit });
            }
        }
        Ok(())
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during bus operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The address is not aligned to the 4-byte word size.
    #[error("misaligned address {0:#010x} (words are {WORD_SIZE}-byte aligned)")]
    InvalidAddress(u32),

    /// The address lies beyond the configured bound.
    #[error("address {addr:#010x} outside bus range (limit {limit:#010x})")]
    AddressOutOfRange { addr: u32, limit: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_reads_as_zero() {
        let mut bus = MemoryBus::new();
        assert_eq!(bus.read(0x100).unwrap(), 0);
        assert_eq!(bus.read(0xFFFF_FFFC).unwrap(), 0);
    }

    #[test]
    fn test_write_then_read() {
        let mut bus = MemoryBus::new();
        bus.write(0x200, -42).unwrap();
        assert_eq!(bus.read(0x200).unwrap(), -42);
    }

    #[test]
    fn test_misaligned_access_rejected() {
        let mut bus = MemoryBus::new();
        assert_eq!(bus.read(0x101), Err(BusError::InvalidAddress(0x101)));
        assert_eq!(bus.write(0x3, 1), Err(BusError::InvalidAddress(0x3)));
    }

    #[test]
    fn test_load_init_data() {
        let mut bus = MemoryBus::new();
        bus.load(&[(0x100, 5), (0x104, 10)]).unwrap();
        assert_eq!(bus.read(0x100).unwrap(), 5);
        assert_eq!(bus.read(0x104).unwrap(), 10);
    }

    #[test]
    fn test_load_rejects_misaligned() {
        let mut bus = MemoryBus::new();
        let err = bus.load(&[(0x102, 5)]).unwrap_err();
        assert_eq!(err, BusError::InvalidAddress(0x102));
    }

    #[test]
    fn test_failed_load_leaves_store_untouched() {
        // The good pair before the bad one must not land either.
        let mut bus = MemoryBus::new();
        let err = bus.load(&[(0x100, 5), (0x102, 7)]).unwrap_err();
        assert_eq!(err, BusError::InvalidAddress(0x102));
        assert_eq!(bus.populated(), 0);
        assert_eq!(bus.read(0x100).unwrap(), 0);
    }

    #[test]
    fn test_address_bound() {
        let mut bus = MemoryBus::with_limit(0x1000);
        bus.write(0xFFC, 1).unwrap();
        assert_eq!(
            bus.read(0x1000),
            Err(BusError::AddressOutOfRange {
                addr: 0x1000,
                limit: 0x1000
            })
        );
    }

    #[test]
    fn test_stats_count_accesses() {
        let mut bus = MemoryBus::new();
        bus.write(0x0, 1).unwrap();
        let _ = bus.read(0x0).unwrap();
        let _ = bus.read(0x4).unwrap();
        assert_eq!(bus.stats(), BusStats { reads: 2, writes: 1 });
    }
}
