//! Fixed-capacity bump arena.
//!
//! The [`Arena`] hands out regions of a fixed byte budget as [`ArenaBlock`]
//! handles. Blocks are never freed individually; [`Arena::reset`]
//! reclaims everything at once and bumps the arena generation so that blocks
//! issued before the reset are refused by [`Arena::read`] and [`Arena::write`].
//!
//! Allocation is pure accounting. Backing bytes are materialized (zeroed) the
//! first time a block is read or written, so an arena used only as a memory
//! budget, as [`Synthesizer`](crate::Synthesizer) does for its voice table and
//! waveform registry, never touches its full capacity.
//!
//! All bookkeeping happens under an internal [`parking_lot::Mutex`], so
//! concurrent [`Arena::alloc`] calls serialize.
//!
//! ```rust
//! use polysynth_engine::Arena;
//!
//! let arena = Arena::new(64);
//! let block = arena.alloc(10).unwrap();
//! assert_eq!(block.len(), 16); // rounded up to ARENA_ALIGN
//! assert!(arena.alloc(64).is_err());
//!
//! arena.reset();
//! assert!(arena.alloc(64).is_ok());
//! ```

use crate::error::{EngineError, Result};
use parking_lot::Mutex;

/// Alignment applied to every allocation, in bytes.
pub const ARENA_ALIGN: usize = 8;

/// Default arena capacity (1 MiB).
pub const DEFAULT_ARENA_CAPACITY: usize = 1024 * 1024;

/// Round `size` up to the next multiple of [`ARENA_ALIGN`].
#[inline]
pub const fn align_up(size: usize) -> usize {
    (size + ARENA_ALIGN - 1) & !(ARENA_ALIGN - 1)
}

/// A region handed out by [`Arena::alloc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaBlock {
    offset: usize,
    len: usize,
    generation: u64,
}

impl ArenaBlock {
    /// Byte offset of the block inside the arena buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Aligned length of the block in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the block has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arena generation the block was issued in.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct ArenaInner {
    /// Bytes materialized so far; never longer than `used`.
    buffer: Vec<u8>,
    used: usize,
    generation: u64,
}

impl ArenaInner {
    fn region(&self, block: &ArenaBlock) -> Option<std::ops::Range<usize>> {
        let end = block.offset.checked_add(block.len)?;
        (block.generation == self.generation && end <= self.used).then_some(block.offset..end)
    }

    fn materialize(&mut self, block: &ArenaBlock) -> Option<std::ops::Range<usize>> {
        let range = self.region(block)?;
        if self.buffer.len() < range.end {
            self.buffer.resize(range.end, 0);
        }
        Some(range)
    }
}

/// Lock-protected bump allocator with bulk-only reclamation.
#[derive(Debug)]
pub struct Arena {
    capacity: usize,
    inner: Mutex<ArenaInner>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_CAPACITY)
    }
}

impl Arena {
    /// Create an arena with a budget of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(ArenaInner {
                buffer: Vec::new(),
                used: 0,
                generation: 0,
            }),
        }
    }

    /// Reserve `size` bytes (rounded up to [`ARENA_ALIGN`]).
    ///
    /// Fails with [`EngineError::OutOfMemory`] when the aligned request does
    /// not fit; the arena is left unchanged in that case.
    pub fn alloc(&self, size: usize) -> Result<ArenaBlock> {
        let mut inner = self.inner.lock();
        let remaining = self.capacity - inner.used;
        let requested = size.saturating_add(ARENA_ALIGN - 1) & !(ARENA_ALIGN - 1);
        if requested > remaining {
            return Err(EngineError::OutOfMemory {
                requested,
                remaining,
                capacity: self.capacity,
            });
        }

        let block = ArenaBlock {
            offset: inner.used,
            len: requested,
            generation: inner.generation,
        };
        inner.used += requested;
        Ok(block)
    }

    /// Reclaim every allocation at once.
    ///
    /// Blocks issued before the reset become stale and blocks issued after it
    /// read as zeros. Only call this when no other thread still relies on
    /// earlier blocks.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.used = 0;
        inner.buffer.clear();
        inner.generation += 1;
        tracing::debug!(generation = inner.generation, "arena reset");
    }

    /// Release the backing buffer.
    pub fn destroy(self) {
        let inner = self.inner.into_inner();
        tracing::debug!(
            capacity = self.capacity,
            used = inner.used,
            "arena destroyed"
        );
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently allocated.
    pub fn used(&self) -> usize {
        self.inner.lock().used
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.capacity - self.used()
    }

    /// Number of resets performed so far.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Whether `block` belongs to the current generation.
    pub fn is_live(&self, block: &ArenaBlock) -> bool {
        self.inner.lock().region(block).is_some()
    }

    /// Run `f` over the bytes of `block`.
    ///
    /// Returns `None` when the block is stale or does not belong to this arena.
    pub fn read<R>(&self, block: &ArenaBlock, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        let range = inner.materialize(block)?;
        Some(f(&inner.buffer[range]))
    }

    /// Copy `bytes` into the start of `block`.
    ///
    /// Returns the number of bytes written (truncated to the block length),
    /// or `None` when the block is stale.
    pub fn write(&self, block: &ArenaBlock, bytes: &[u8]) -> Option<usize> {
        let mut inner = self.inner.lock();
        let range = inner.materialize(block)?;
        let n = bytes.len().min(range.len());
        inner.buffer[range.start..range.start + n].copy_from_slice(&bytes[..n]);
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 8);
        assert_eq!(align_up(8), 8);
        assert_eq!(align_up(9), 16);
    }

    #[test]
    fn test_alloc_does_not_touch_backing_bytes() {
        let arena = Arena::new(DEFAULT_ARENA_CAPACITY);
        let big = arena.alloc(DEFAULT_ARENA_CAPACITY / 2).unwrap();
        let small = arena.alloc(24).unwrap();
        assert_eq!(arena.inner.lock().buffer.len(), 0);

        assert_eq!(arena.write(&small, &[7; 24]), Some(24));
        assert_eq!(arena.inner.lock().buffer.len(), small.offset() + 24);
        assert_eq!(arena.read(&big, |b| b.iter().all(|&x| x == 0)), Some(true));
        assert_eq!(arena.read(&small, |b| b.to_vec()), Some(vec![7; 24]));

        arena.reset();
        assert_eq!(arena.inner.lock().buffer.len(), 0);
        let again = arena.alloc(24).unwrap();
        assert_eq!(arena.read(&again, |b| b.to_vec()), Some(vec![0; 24]));
    }

    #[test]
    fn test_alloc_advances_used() {
        let arena = Arena::new(64);
        let a = arena.alloc(3).unwrap();
        let b = arena.alloc(8).unwrap();

        assert_eq!(a.offset(), 0);
        assert_eq!(a.len(), 8);
        assert_eq!(b.offset(), 8);
        assert_eq!(arena.used(), 16);
        assert_eq!(arena.remaining(), 48);
    }

    #[test]
    fn test_out_of_memory_is_all_or_nothing() {
        let arena = Arena::new(32);
        arena.alloc(24).unwrap();

        let err = arena.alloc(9).unwrap_err();
        assert!(matches!(
            err,
            EngineError::OutOfMemory {
                requested: 16,
                remaining: 8,
                capacity: 32
            }
        ));
        assert_eq!(arena.used(), 24, "failed alloc must not move the cursor");

        // Exactly the remainder still fits
        assert!(arena.alloc(8).is_ok());
        assert_eq!(arena.used(), 32);
    }

    #[test]
    fn test_reset_reclaims_full_capacity() {
        let arena = Arena::new(128);
        arena.alloc(100).unwrap();
        assert!(arena.alloc(128).is_err());

        arena.reset();
        let block = arena.alloc(128).unwrap();
        assert_eq!(block.len(), 128);
        assert_eq!(arena.generation(), 1);
    }

    #[test]
    fn test_stale_block_refused() {
        let arena = Arena::new(64);
        let block = arena.alloc(16).unwrap();
        assert_eq!(arena.write(&block, b"voice"), Some(5));
        assert_eq!(
            arena.read(&block, |bytes| bytes[..5].to_vec()),
            Some(b"voice".to_vec())
        );

        arena.reset();
        assert!(!arena.is_live(&block));
        assert_eq!(arena.read(&block, |b| b.len()), None);
        assert_eq!(arena.write(&block, b"x"), None);
    }

    #[test]
    fn test_write_truncates_to_block() {
        let arena = Arena::new(16);
        let block = arena.alloc(8).unwrap();
        assert_eq!(arena.write(&block, &[1u8; 12]), Some(8));
    }

    #[test]
    fn test_huge_request_does_not_overflow() {
        let arena = Arena::new(16);
        assert!(matches!(
            arena.alloc(usize::MAX),
            Err(EngineError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_concurrent_allocs_never_overlap() {
        let arena = Arc::new(Arena::new(8 * 400));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let arena = Arc::clone(&arena);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| arena.alloc(8).unwrap().offset())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut offsets: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), 400);
        assert_eq!(arena.remaining(), 0);
    }
}
