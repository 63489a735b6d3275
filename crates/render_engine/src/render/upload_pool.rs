//! Per-frame upload memory
//!
//! An [`UploadPool`] hands out short-lived, CPU-writable staging ranges that
//! transfer commands copy into GPU buffers. Each frame in flight owns its own
//! pool, and the pool is only rewound once the GPU has finished with that
//! frame, so staged bytes stay valid for as long as the copies read them.

/// A staged byte range inside an upload pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadAllocation {
    /// Index of the block holding the range
    pub block: usize,
    /// Offset of the range inside its block
    pub offset: u64,
    /// Size of the range in bytes
    pub size: u64,
}

#[derive(Debug)]
struct UploadBlock {
    data: Vec<u8>,
    used: u64,
    dedicated: bool,
}

/// Linear allocator over fixed-size staging blocks
#[derive(Debug)]
pub struct UploadPool {
    block_size: u64,
    blocks: Vec<UploadBlock>,
}

impl UploadPool {
    /// Alignment applied to every allocation offset
    pub const ALIGNMENT: u64 = 16;

    /// Create an empty pool whose regular blocks are `block_size` bytes
    pub fn new(block_size: u64) -> Self {
        Self {
            block_size: block_size.max(Self::ALIGNMENT),
            blocks: Vec::new(),
        }
    }

    /// Reserve `size` bytes
    ///
    /// Requests larger than the block size get a dedicated block that is
    /// dropped on the next [`reset`](Self::reset).
    pub fn allocate(&mut self, size: u64) -> UploadAllocation {
        if size > self.block_size {
            self.blocks.push(UploadBlock {
                data: vec![0; to_usize(size)],
                used: size,
                dedicated: true,
            });

            return UploadAllocation {
                block: self.blocks.len() - 1,
                offset: 0,
                size,
            };
        }

        let block_size = self.block_size;
        let fitting = self.blocks.iter().position(|block| {
            !block.dedicated && align(block.used) + size <= block_size
        });

        let block = fitting.unwrap_or_else(|| {
            self.blocks.push(UploadBlock {
                data: vec![0; to_usize(block_size)],
                used: 0,
                dedicated: false,
            });
            self.blocks.len() - 1
        });

        let entry = &mut self.blocks[block];
        let offset = align(entry.used);
        entry.used = offset + size;

        UploadAllocation { block, offset, size }
    }

    /// Copy `bytes` into an allocation
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is larger than the allocation or the allocation does
    /// not come from this pool.
    pub fn write(&mut self, allocation: &UploadAllocation, bytes: &[u8]) {
        assert!(
            bytes.len() as u64 <= allocation.size,
            "upload of {} bytes overflows a {} byte allocation",
            bytes.len(),
            allocation.size
        );

        let start = to_usize(allocation.offset);
        self.blocks[allocation.block].data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Bytes staged in an allocation
    pub fn data(&self, allocation: &UploadAllocation) -> &[u8] {
        let start = to_usize(allocation.offset);
        &self.blocks[allocation.block].data[start..start + to_usize(allocation.size)]
    }

    /// Total bytes handed out since the last reset
    pub fn used_bytes(&self) -> u64 {
        self.blocks.iter().map(|block| block.used).sum()
    }

    /// Number of blocks currently owned
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Rewind the pool; regular blocks are kept for reuse
    pub fn reset(&mut self) {
        self.blocks.retain(|block| !block.dedicated);
        for block in &mut self.blocks {
            block.used = 0;
        }
    }
}

const fn align(offset: u64) -> u64 {
    offset.div_ceil(UploadPool::ALIGNMENT) * UploadPool::ALIGNMENT
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_are_aligned_and_packed() {
        let mut pool = UploadPool::new(256);
        let first = pool.allocate(10);
        let second = pool.allocate(10);

        assert_eq!(first.block, 0);
        assert_eq!(first.offset, 0);
        assert_eq!(second.block, 0);
        assert_eq!(second.offset, 16);
    }

    #[test]
    fn test_new_block_when_full() {
        let mut pool = UploadPool::new(64);
        pool.allocate(48);
        let spill = pool.allocate(32);

        assert_eq!(spill.block, 1);
        assert_eq!(pool.block_count(), 2);
    }

    #[test]
    fn test_oversized_allocation_is_dedicated_and_dropped_on_reset() {
        let mut pool = UploadPool::new(64);
        pool.allocate(16);
        let big = pool.allocate(1000);
        assert_eq!(big.size, 1000);
        assert_eq!(pool.block_count(), 2);

        pool.reset();
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.used_bytes(), 0);
    }

    #[test]
    fn test_write_then_read_back() {
        let mut pool = UploadPool::new(64);
        let allocation = pool.allocate(4);
        pool.write(&allocation, &[1, 2, 3, 4]);

        assert_eq!(pool.data(&allocation), &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn test_write_overflow_panics() {
        let mut pool = UploadPool::new(64);
        let allocation = pool.allocate(2);
        pool.write(&allocation, &[0; 8]);
    }
}
