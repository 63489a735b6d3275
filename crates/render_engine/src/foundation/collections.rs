//! Specialized collection types

use std::sync::atomic::{AtomicU64, Ordering};

pub use slotmap::{new_key_type, Key, SecondaryMap, SlotMap};

/// Source of stable integer ids for objects shared behind `Arc`
///
/// Ids are never reused, so comparing two ids is equivalent to comparing
/// object identity for the lifetime of the process.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator whose first id is 1
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Issue a fresh id
    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let allocator = IdAllocator::new();
        let first = allocator.allocate();
        let second = allocator.allocate();

        assert_eq!(first, 1);
        assert!(second > first);
    }
}
