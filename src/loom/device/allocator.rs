use std::{cell::RefCell, collections::VecDeque, num::NonZeroUsize, rc::Rc};

use derive_more::Display;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use super::{Block, DeviceError, Driver, MemorySpace};
use crate::loom::buffer::{Buffer, Ownership};

#[derive(Debug, Error)]
pub enum AllocError {
    #[error("allocation error: {space} memory cannot serve {size} bytes")]
    OutOfMemory {
        space: MemorySpace,
        size: usize,
        #[source]
        source: DeviceError,
    },
    #[error("allocation error: expected an allocator of {expected} memory, found {found}")]
    Space {
        expected: MemorySpace,
        found: MemorySpace,
    },
    #[error("allocation error: zero-sized request")]
    ZeroSize,
}

/// Snapshot of an allocator's pool. `entries == free + live` at every observation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display(
    "entries: {entries}, free: {free}, bytes: {bytes}, free bytes: {free_bytes}, hits: {hits}, misses: {misses}"
)]
pub struct PoolStats {
    /// Blocks owned by the pool, live or free.
    pub entries: usize,
    /// Blocks waiting on the free list.
    pub free: usize,
    /// Bytes owned by the pool.
    pub bytes: usize,
    /// Bytes waiting on the free list.
    pub free_bytes: usize,
    /// Requests served from the free list.
    pub hits: u64,
    /// Requests served by the driver.
    pub misses: u64,
}

impl PoolStats {
    /// Blocks currently handed out.
    #[inline]
    pub fn live(&self) -> usize {
        self.entries - self.free
    }
}

#[derive(Debug, Default)]
struct Pool {
    /// Sizes of all blocks owned by the pool, keyed by address.
    entries: HashMap<NonZeroUsize, usize>,
    /// Free blocks, keyed by exact byte size.
    free: HashMap<usize, VecDeque<Block>>,
    stats: PoolStats,
}

impl Pool {
    /// Returns every free block to the driver. Returns the number of bytes released.
    fn release(&mut self, driver: &dyn Driver) -> usize {
        let mut released = 0;
        for block in std::mem::take(&mut self.free).into_values().flatten() {
            self.entries.remove(&block.addr());
            self.stats.entries -= 1;
            self.stats.bytes -= block.size();
            released += block.size();
            // SAFETY: pooled blocks come from this driver and are unreachable once off the list.
            unsafe { driver.free(block) };
        }
        self.stats.free = 0;
        self.stats.free_bytes = 0;
        released
    }
}

#[derive(Debug)]
struct AllocatorInner {
    driver: Box<dyn Driver>,
    pooling: bool,
    pool: RefCell<Pool>,
}

impl Drop for AllocatorInner {
    fn drop(&mut self) {
        // live buffers hold the allocator, so everything left is on the free list
        let pool = self.pool.get_mut();
        debug_assert_eq!(pool.stats.live(), 0);
        let released = pool.release(self.driver.as_ref());
        log::debug!("{} allocator dropped, released {released} bytes", self.driver.space());
    }
}

/// A pooled allocator for one memory space.
///
/// Released blocks go onto a free list keyed by exact byte size and are handed out again
/// before the driver is asked for new memory. Cloning yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct Allocator(Rc<AllocatorInner>);

impl Allocator {
    /// A pooling allocator over `driver`.
    #[inline]
    pub fn new(driver: impl Driver + 'static) -> Self {
        AllocatorBuilder::new(driver).build()
    }

    #[inline]
    pub fn space(&self) -> MemorySpace {
        self.0.driver.space()
    }

    #[inline]
    pub fn pooling(&self) -> bool {
        self.0.pooling
    }

    #[inline]
    pub fn driver(&self) -> &dyn Driver {
        self.0.driver.as_ref()
    }

    #[inline]
    pub fn stats(&self) -> PoolStats {
        self.0.pool.borrow().stats
    }

    /// Returns `true` if both handles refer to the same pool.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Serves `size` bytes, reusing a free block of exactly that size if there is one.
    ///
    /// A failed request leaves the pool untouched.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip(self)))]
    pub fn allocate(&self, size: usize) -> Result<Buffer, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let space = self.space();
        let mut pool = self.0.pool.borrow_mut();

        let reused = match self.0.pooling {
            true => pool.free.get_mut(&size).and_then(VecDeque::pop_front),
            false => None,
        };
        if let Some(block) = reused {
            pool.stats.free -= 1;
            pool.stats.free_bytes -= size;
            pool.stats.hits += 1;
            log::trace!("{space} pool hit: {size} bytes at {:#x}", block.addr());
            return Ok(Buffer::new(block, Ownership::Pooled, self.clone()));
        }

        let block = match self.0.driver.allocate(size) {
            Ok(block) => block,
            Err(source) => {
                log::warn!("{space} allocation of {size} bytes failed: {source}");
                return Err(AllocError::OutOfMemory {
                    space,
                    size,
                    source,
                });
            }
        };
        pool.stats.misses += 1;

        if !self.0.pooling {
            log::debug!("{space} unmanaged block: {size} bytes at {:#x}", block.addr());
            return Ok(Buffer::new(block, Ownership::Unmanaged, self.clone()));
        }

        pool.entries.insert(block.addr(), size);
        pool.stats.entries += 1;
        pool.stats.bytes += size;
        log::debug!("{space} pool entry: {size} bytes at {:#x}", block.addr());
        Ok(Buffer::new(block, Ownership::Pooled, self.clone()))
    }

    /// Puts a live pooled block back on the free list.
    ///
    /// # Panics
    /// Panics if the pool does not own `block`; the accounting would be corrupt otherwise.
    pub(crate) fn deallocate(&self, block: Block) {
        let mut pool = self.0.pool.borrow_mut();
        let owned = pool.entries.get(&block.addr()) == Some(&block.size());
        assert!(
            owned,
            "block at {:#x} of {} bytes is not owned by this pool",
            block.addr(),
            block.size()
        );
        let size = block.size();
        pool.free.entry(size).or_default().push_back(block);
        pool.stats.free += 1;
        pool.stats.free_bytes += size;
        debug_assert!(pool.stats.free <= pool.stats.entries);
    }

    /// Returns every free block to the driver. Returns the number of bytes released.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip(self)))]
    pub fn purge(&self) -> usize {
        let released = self.0.pool.borrow_mut().release(self.0.driver.as_ref());
        log::debug!("{} pool purged: {released} bytes released", self.space());
        released
    }
}

/// Configures an [`Allocator`].
#[derive(Debug)]
pub struct AllocatorBuilder {
    pub driver: Box<dyn Driver>,
    pub pooling: bool,
}

impl AllocatorBuilder {
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self {
            driver: Box::new(driver),
            pooling: true,
        }
    }

    /// With pooling off, buffers are unmanaged and go straight back to the driver on release.
    pub fn pooling(mut self, pooling: bool) -> Self {
        self.pooling = pooling;
        self
    }

    pub fn build(self) -> Allocator {
        let Self { driver, pooling } = self;
        let pool = RefCell::new(Pool::default());
        Allocator(Rc::new(AllocatorInner {
            driver,
            pooling,
            pool,
        }))
    }
}
