//! Single-level write-through cache.
//!
//! The cache sits in front of the memory bus and can be toggled on and off
//! at runtime by the CACHE instruction. Policy: write-through (every write
//! is persisted to the bus immediately) plus write-allocate (a write also
//! creates the cache entry), so the cache and the bus can never disagree
//! and no dirty-eviction logic is needed.
//!
//! Entry validity is presence in the map: `flush()` clears the map.
//! Toggling the cache off does NOT flush; entries merely become
//! unreachable, and toggling back on makes them hit again immediately.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cpu::bus::{BusError, MemoryBus};

/// Hit/miss counters for cached reads.
///
/// Only reads with the cache enabled count; pass-through reads while the
/// cache is off are not cache events. Counters survive a `flush()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of enabled reads served from the cache, 0.0 when idle.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Optional cache layer in front of [`MemoryBus`].
///
/// Starts disabled; programs opt in with `CACHE 1`.
#[derive(Clone, Debug)]
pub struct Cache {
    enabled: bool,
    entries: HashMap<u32, i32>,
    stats: CacheStats,
}

impl Cache {
    /// Create a disabled, empty cache.
    pub fn new() -> Self {
        Self {
            enabled: false,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Enable or disable the cache. Existing entries are kept either way.
    pub fn toggle(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether reads and writes currently go through the cache.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Read the word at `addr`, reporting whether it was a cache hit.
    ///
    /// Disabled: delegates straight to the bus with `hit = false`.
    /// Enabled: serves a present entry (hit), otherwise fetches from the
    /// bus, allocates the entry, and reports a miss.
    pub fn read(&mut self, bus: &mut MemoryBus, addr: u32) -> Result<(i32, bool), BusError> {
        if !self.enabled {
            return bus.read(addr).map(|word| (word, false));
        }

        if let Some(&word) = self.entries.get(&addr) {
            self.stats.hits += 1;
            return Ok((word, true));
        }

        let word = bus.read(addr)?;
        self.entries.insert(addr, word);
        self.stats.misses += 1;
        Ok((word, false))
    }

    /// Write the word at `addr`.
    ///
    /// The bus is always written first (write-through). When enabled, the
    /// cache entry is updated or created as well (write-allocate), so a
    /// subsequent read of `addr` hits.
    pub fn write(&mut self, bus: &mut MemoryBus, addr: u32, value: i32) -> Result<(), BusError> {
        bus.write(addr, value)?;
        if self.enabled {
            self.entries.insert(addr, value);
        }
        Ok(())
    }

    /// Invalidate all entries, regardless of the enabled flag.
    ///
    /// Never touches the bus: write-through already persisted every write.
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// Hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of valid entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_bus() -> MemoryBus {
        let mut bus = MemoryBus::new();
        bus.load(&[(0x100, 5), (0x104, 10)]).unwrap();
        bus
    }

    #[test]
    fn test_disabled_is_pass_through() {
        let mut bus = seeded_bus();
        let mut cache = Cache::new();

        let (word, hit) = cache.read(&mut bus, 0x100).unwrap();
        assert_eq!(word, 5);
        assert!(!hit);
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_miss_then_hit() {
        let mut bus = seeded_bus();
        let mut cache = Cache::new();
        cache.toggle(true);

        let (word, hit) = cache.read(&mut bus, 0x100).unwrap();
        assert_eq!((word, hit), (5, false));

        let (word, hit) = cache.read(&mut bus, 0x100).unwrap();
        assert_eq!((word, hit), (5, true));

        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_write_through_and_allocate() {
        let mut bus = MemoryBus::new();
        let mut cache = Cache::new();
        cache.toggle(true);

        cache.write(&mut bus, 0x200, 50).unwrap();

        // Persisted to the bus immediately.
        assert_eq!(bus.read(0x200).unwrap(), 50);
        // And the entry was allocated, so the next read hits.
        let (word, hit) = cache.read(&mut bus, 0x200).unwrap();
        assert_eq!((word, hit), (50, true));
    }

    #[test]
    fn test_disabled_write_goes_to_bus_only() {
        let mut bus = MemoryBus::new();
        let mut cache = Cache::new();

        cache.write(&mut bus, 0x200, 7).unwrap();
        assert_eq!(bus.read(0x200).unwrap(), 7);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_flush_invalidates_then_repopulates() {
        let mut bus = seeded_bus();
        let mut cache = Cache::new();
        cache.toggle(true);

        let _ = cache.read(&mut bus, 0x100).unwrap();
        cache.flush();
        assert!(cache.is_empty());

        // First read after flush is a miss again, second hits.
        let (_, hit) = cache.read(&mut bus, 0x100).unwrap();
        assert!(!hit);
        let (_, hit) = cache.read(&mut bus, 0x100).unwrap();
        assert!(hit);
    }

    #[test]
    fn test_flush_leaves_bus_untouched() {
        let mut bus = seeded_bus();
        let mut cache = Cache::new();
        cache.toggle(true);

        cache.write(&mut bus, 0x108, 99).unwrap();
        cache.flush();
        assert_eq!(bus.read(0x108).unwrap(), 99);
    }

    #[test]
    fn test_toggle_off_on_keeps_entries() {
        let mut bus = seeded_bus();
        let mut cache = Cache::new();
        cache.toggle(true);

        let _ = cache.read(&mut bus, 0x100).unwrap();

        // Off: entries unreachable but retained.
        cache.toggle(false);
        assert_eq!(cache.len(), 1);
        let (_, hit) = cache.read(&mut bus, 0x100).unwrap();
        assert!(!hit);

        // Back on without flush: the old entry hits immediately.
        cache.toggle(true);
        let (_, hit) = cache.read(&mut bus, 0x100).unwrap();
        assert!(hit);
    }

    #[test]
    fn test_hit_rate() {
        let mut bus = seeded_bus();
        let mut cache = Cache::new();
        cache.toggle(true);

        assert_eq!(cache.stats().hit_rate(), 0.0);
        let _ = cache.read(&mut bus, 0x100).unwrap();
        let _ = cache.read(&mut bus, 0x100).unwrap();
        let _ = cache.read(&mut bus, 0x100).unwrap();
        let _ = cache.read(&mut bus, 0x104).unwrap();
        assert_eq!(cache.stats().hit_rate(), 0.5);
    }
}
