use derive_more::Display;

use super::device::{Allocator, Block, DeviceError, MemorySpace};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId;

/// Who reclaims a buffer's memory once the last handle is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Ownership {
    /// Goes back onto the allocator's free list.
    Pooled,
    /// Memory provided by the caller; never freed here.
    Wrapped,
    /// Goes straight back to the driver.
    Unmanaged,
}

/// A raw memory block in one memory space.
///
/// Tensors share a buffer through `Rc<Buffer>`; the block is reclaimed when the last one drops.
/// Writes through any handle are visible through all others.
#[derive(Debug)]
pub struct Buffer {
    id: uid::Id<BufferId>,
    block: Block,
    ownership: Ownership,
    allocator: Allocator,
}

impl Buffer {
    #[inline]
    pub(crate) fn new(block: Block, ownership: Ownership, allocator: Allocator) -> Self {
        let id = uid::Id::new();
        Self {
            id,
            block,
            ownership,
            allocator,
        }
    }

    /// Wraps memory the caller keeps ownership of.
    ///
    /// # Safety
    /// `block` must stay live and reachable by the allocator's driver for the lifetime of the
    /// buffer and every tensor sharing it.
    #[inline]
    pub unsafe fn wrap(block: Block, allocator: Allocator) -> Self {
        Self::new(block, Ownership::Wrapped, allocator)
    }

    #[inline]
    pub fn id(&self) -> uid::Id<BufferId> {
        self.id
    }

    /// Size of the buffer in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.block.size()
    }

    /// Address of the first byte. Opaque for accelerator memory.
    #[inline]
    pub fn addr(&self) -> usize {
        self.block.addr().get()
    }

    #[inline]
    pub fn space(&self) -> MemorySpace {
        self.allocator.space()
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    #[inline]
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Returns `true` if both buffers reach some of the same bytes in one memory space.
    ///
    /// Wrapped buffers may alias each other, so this compares address ranges rather than
    /// buffer identity.
    #[inline]
    pub fn overlaps(&self, other: &Buffer) -> bool {
        let start = self.addr().max(other.addr());
        let end = (self.addr().saturating_add(self.capacity()))
            .min(other.addr().saturating_add(other.capacity()));
        self.space() == other.space() && start < end
    }

    #[inline]
    fn check_range(&self, offset: usize, len: usize) {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.capacity()),
            "byte range {offset}..{} out of buffer {} of {} bytes",
            offset.saturating_add(len),
            self.id.get(),
            self.capacity()
        );
    }

    /// Reads `data.len()` bytes starting `offset` bytes into the buffer.
    ///
    /// # Panics
    /// Panics if the range exceeds the buffer.
    pub fn read(&self, offset: usize, data: &mut [u8]) -> Result<(), DeviceError> {
        self.check_range(offset, data.len());
        // SAFETY: the block is live while the buffer is, and the range is checked.
        unsafe { self.allocator.driver().read(self.block, offset, data) }
    }

    /// Writes `data` starting `offset` bytes into the buffer.
    ///
    /// # Panics
    /// Panics if the range exceeds the buffer.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        self.check_range(offset, data.len());
        // SAFETY: the block is live while the buffer is, and the range is checked.
        unsafe { self.allocator.driver().write(self.block, offset, data) }
    }

    /// Copies `len` bytes from `source` into this buffer.
    ///
    /// Blocks of the same allocator are copied by its driver; anything else is staged
    /// through host memory.
    pub fn copy_from(
        &self,
        offset: usize,
        source: &Buffer,
        source_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError> {
        self.check_range(offset, len);
        source.check_range(source_offset, len);
        if self.allocator.ptr_eq(&source.allocator) {
            // SAFETY: both blocks are live and belong to the same driver; ranges are checked.
            return unsafe {
                self.allocator
                    .driver()
                    .copy(self.block, offset, source.block, source_offset, len)
            };
        }
        let mut stage = vec![0u8; len];
        source.read(source_offset, &mut stage)?;
        self.write(offset, &stage)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        match self.ownership {
            Ownership::Pooled => self.allocator.deallocate(self.block),
            // SAFETY: unmanaged blocks come from the allocator's driver and die with the buffer.
            Ownership::Unmanaged => unsafe { self.allocator.driver().free(self.block) },
            Ownership::Wrapped => {}
        }
    }
}
