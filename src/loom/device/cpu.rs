use std::num::NonZeroUsize;

use super::{Block, DeviceError, Driver, MemorySpace};

/// Alignment of every block handed out by the host allocator.
pub const ALIGN: usize = 64;

/// Host memory from the system allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cpu;

impl Cpu {
    pub(super) fn alloc_raw(size: usize) -> Result<Block, DeviceError> {
        debug_assert!(size > 0);
        let layout = std::alloc::Layout::from_size_align(size, ALIGN)
            .map_err(|_| DeviceError::OutOfMemory(size))?;
        // SAFETY: `layout` has non-zero size. Zeroed so no byte is ever read uninitialized.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let addr = NonZeroUsize::new(ptr.expose_provenance()).ok_or(DeviceError::OutOfMemory(size))?;
        // SAFETY: `ptr` is a fresh allocation of `size` bytes.
        Ok(unsafe { Block::from_raw_parts(addr, size) })
    }

    /// # Safety
    /// `block` must come from [`Cpu::alloc_raw`].
    pub(super) unsafe fn free_raw(block: Block) {
        let ptr = std::ptr::with_exposed_provenance_mut::<u8>(block.addr().get());
        unsafe {
            let layout = std::alloc::Layout::from_size_align_unchecked(block.size(), ALIGN);
            std::alloc::dealloc(ptr, layout);
        }
    }

    /// # Safety
    /// See [`Driver::read`].
    pub(super) unsafe fn read_raw(block: Block, offset: usize, data: &mut [u8]) {
        debug_assert!(offset + data.len() <= block.size());
        let ptr = std::ptr::with_exposed_provenance::<u8>(block.addr().get() + offset);
        unsafe { std::ptr::copy_nonoverlapping(ptr, data.as_mut_ptr(), data.len()) }
    }

    /// # Safety
    /// See [`Driver::write`].
    pub(super) unsafe fn write_raw(block: Block, offset: usize, data: &[u8]) {
        debug_assert!(offset + data.len() <= block.size());
        let ptr = std::ptr::with_exposed_provenance_mut::<u8>(block.addr().get() + offset);
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len()) }
    }

    /// # Safety
    /// See [`Driver::copy`].
    pub(super) unsafe fn copy_raw(
        dst: Block,
        dst_offset: usize,
        src: Block,
        src_offset: usize,
        len: usize,
    ) {
        debug_assert!(dst_offset + len <= dst.size());
        debug_assert!(src_offset + len <= src.size());
        let src = std::ptr::with_exposed_provenance::<u8>(src.addr().get() + src_offset);
        let dst = std::ptr::with_exposed_provenance_mut::<u8>(dst.addr().get() + dst_offset);
        unsafe { std::ptr::copy(src, dst, len) }
    }
}

impl Driver for Cpu {
    #[inline]
    fn space(&self) -> MemorySpace {
        MemorySpace::Host
    }

    fn allocate(&self, size: usize) -> Result<Block, DeviceError> {
        Self::alloc_raw(size)
    }

    unsafe fn free(&self, block: Block) {
        unsafe { Self::free_raw(block) }
    }

    unsafe fn read(&self, block: Block, offset: usize, data: &mut [u8]) -> Result<(), DeviceError> {
        unsafe { Self::read_raw(block, offset, data) };
        Ok(())
    }

    unsafe fn write(&self, block: Block, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        unsafe { Self::write_raw(block, offset, data) };
        Ok(())
    }

    unsafe fn copy(
        &self,
        dst: Block,
        dst_offset: usize,
        src: Block,
        src_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError> {
        unsafe { Self::copy_raw(dst, dst_offset, src, src_offset, len) };
        Ok(())
    }
}
