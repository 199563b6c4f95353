use std::cell::Cell;

use super::{Block, DeviceError, Driver, MemorySpace, cpu::Cpu};

/// Accelerator memory emulated in host RAM.
///
/// Blocks are only reachable through explicit transfers, like real device memory, and the
/// emulator can be given a byte capacity to model a device running out of memory.
#[derive(Debug, Default)]
pub struct Emu {
    capacity: Option<usize>,
    used: Cell<usize>,
}

impl Emu {
    /// An emulated device without a capacity limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// An emulated device holding at most `capacity` bytes at a time.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            used: Cell::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Bytes currently allocated from the device.
    #[inline]
    pub fn used(&self) -> usize {
        self.used.get()
    }
}

impl Driver for Emu {
    #[inline]
    fn space(&self) -> MemorySpace {
        MemorySpace::Device
    }

    fn allocate(&self, size: usize) -> Result<Block, DeviceError> {
        let used = self.used.get();
        if self.capacity.is_some_and(|capacity| used + size > capacity) {
            return Err(DeviceError::OutOfMemory(size));
        }
        let block = Cpu::alloc_raw(size)?;
        self.used.set(used + size);
        Ok(block)
    }

    unsafe fn free(&self, block: Block) {
        self.used.set(self.used.get() - block.size());
        unsafe { Cpu::free_raw(block) }
    }

    unsafe fn read(&self, block: Block, offset: usize, data: &mut [u8]) -> Result<(), DeviceError> {
        unsafe { Cpu::read_raw(block, offset, data) };
        Ok(())
    }

    unsafe fn write(&self, block: Block, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        unsafe { Cpu::write_raw(block, offset, data) };
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
        unsafe { Cpu::copy_raw(dst, dst_offset, src, src_offset, len) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::Emu;
    use crate::loom::device::{DeviceError, Driver, MemorySpace};

    #[test]
    fn test_capacity() -> Result<(), Box<dyn Error>> {
        let emu = Emu::with_capacity(100);
        assert_eq!(emu.space(), MemorySpace::Device);

        let a = emu.allocate(60)?;
        assert_eq!(emu.used(), 60);
        assert!(matches!(emu.allocate(41), Err(DeviceError::OutOfMemory(41))));
        assert_eq!(emu.used(), 60);

        let b = emu.allocate(40)?;
        assert_eq!(emu.used(), 100);
        unsafe {
            emu.free(a);
            emu.free(b);
        }
        assert_eq!(emu.used(), 0);
        Ok(())
    }
}
