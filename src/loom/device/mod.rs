use std::{cell::RefCell, num::NonZeroUsize};

use derive_more::Display;
use thiserror::Error;

pub use allocator::{AllocError, Allocator, AllocatorBuilder, PoolStats};
pub use cpu::Cpu;
pub use emu::Emu;
#[cfg(feature = "gpu")]
pub use gpu::{Gpu, GpuBuildError, GpuBuilder};

pub mod allocator;
pub mod cpu;
pub mod emu;
#[cfg(feature = "gpu")]
pub mod gpu;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device out of memory: failed to allocate {0} bytes")]
    OutOfMemory(usize),
    #[error("device limit error: {0} bytes exceeds the buffer size limit of {1}")]
    Limit(usize, usize),
    #[error("device transfer error: {0}")]
    Transfer(String),
}

/// The memory domain a buffer lives in. Moving bytes between domains is always an explicit copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemorySpace {
    Host,
    Device,
}

/// A raw block of memory handed out by a [`Driver`].
///
/// For host memory `addr` is the address of the first byte. Accelerator drivers may use it
/// as an opaque handle; it is only meaningful to the driver that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    addr: NonZeroUsize,
    size: usize,
}

impl Block {
    /// # Safety
    /// `addr` must identify live memory of at least `size` bytes, reachable by the driver
    /// the block is handed to, for as long as the block is used.
    #[inline]
    pub unsafe fn from_raw_parts(addr: NonZeroUsize, size: usize) -> Self {
        Self { addr, size }
    }

    #[inline]
    pub fn addr(&self) -> NonZeroUsize {
        self.addr
    }

    /// Size of the block in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

/// The backend of one memory space: raw allocation, release and byte transfers.
pub trait Driver: std::fmt::Debug {
    fn space(&self) -> MemorySpace;

    /// Requests `size > 0` bytes from the system.
    fn allocate(&self, size: usize) -> Result<Block, DeviceError>;

    /// Returns a block to the system.
    ///
    /// # Safety
    /// `block` must come from [`Driver::allocate`] of this driver and must not be used again.
    unsafe fn free(&self, block: Block);

    /// Reads `data.len()` bytes starting `offset` bytes into `block`.
    ///
    /// # Safety
    /// `block` must be live and reachable by this driver, and `offset + data.len()` must not
    /// exceed its size.
    unsafe fn read(&self, block: Block, offset: usize, data: &mut [u8]) -> Result<(), DeviceError>;

    /// Writes `data` starting `offset` bytes into `block`.
    ///
    /// # Safety
    /// Same as [`Driver::read`].
    unsafe fn write(&self, block: Block, offset: usize, data: &[u8]) -> Result<(), DeviceError>;

    /// Copies `len` bytes between two blocks of this driver. The ranges may overlap.
    ///
    /// # Safety
    /// Both ranges must satisfy the requirements of [`Driver::read`].
    unsafe fn copy(
        &self,
        dst: Block,
        dst_offset: usize,
        src: Block,
        src_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError> {
        let mut stage = vec![0u8; len];
        unsafe {
            self.read(src, src_offset, &mut stage)?;
            self.write(dst, dst_offset, &stage)
        }
    }
}

/// Type-level tag for the memory space of a tensor.
///
/// Each space owns a default [`Allocator`] per thread.
pub trait Space: std::fmt::Debug + Default + Clone + Copy + 'static {
    const KIND: MemorySpace;

    /// The current thread's default allocator for this space.
    fn allocator() -> Allocator;

    /// Replaces the current thread's default allocator, returning the previous one.
    fn set_allocator(allocator: Allocator) -> Result<Allocator, AllocError>;
}

/// Host memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Host;

/// Accelerator memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dev;

thread_local! {
    static HOST_ALLOCATOR: RefCell<Allocator> = RefCell::new(Allocator::new(Cpu));
    static DEV_ALLOCATOR: RefCell<Allocator> = RefCell::new(Allocator::new(Emu::new()));
}

macro_rules! impl_space {
    ($space:ty, $kind:expr, $local:ident) => {
        impl Space for $space {
            const KIND: MemorySpace = $kind;

            #[inline]
            fn allocator() -> Allocator {
                $local.with_borrow(Clone::clone)
            }

            fn set_allocator(allocator: Allocator) -> Result<Allocator, AllocError> {
                if allocator.space() != Self::KIND {
                    return Err(AllocError::Space {
                        expected: Self::KIND,
                        found: allocator.space(),
                    });
                }
                Ok($local.replace(allocator))
            }
        }
    };
}

impl_space!(Host, MemorySpace::Host, HOST_ALLOCATOR);
impl_space!(Dev, MemorySpace::Device, DEV_ALLOCATOR);
