use std::{
    cell::{Cell, RefCell},
    num::NonZeroUsize,
    ops::Range,
};

use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use super::{Block, DeviceError, Driver, MemorySpace};

/// Copy offsets and sizes on the device must be multiples of this.
const ALIGN: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;

/// Accelerator memory backed by WebGPU buffers.
///
/// Block addresses are opaque handles into the driver's buffer table. Every transfer is
/// synchronous: reads wait for the device to finish before returning.
#[derive(Debug)]
pub struct Gpu {
    /// Handle to a WebGPU compute device.
    device: wgpu::Device,
    /// The WebGPU command queue.
    queue: wgpu::Queue,
    /// Live buffers, keyed by block handle.
    buffers: RefCell<HashMap<usize, wgpu::Buffer>>,
    /// The next block handle to hand out.
    next: Cell<usize>,
}

impl From<wgpu::BufferAsyncError> for DeviceError {
    fn from(value: wgpu::BufferAsyncError) -> Self {
        Self::Transfer(value.to_string())
    }
}

impl From<wgpu::PollError> for DeviceError {
    fn from(value: wgpu::PollError) -> Self {
        Self::Transfer(value.to_string())
    }
}

impl From<flume::RecvError> for DeviceError {
    fn from(value: flume::RecvError) -> Self {
        Self::Transfer(value.to_string())
    }
}

#[inline]
fn aligned(range: Range<usize>) -> Range<usize> {
    let start = range.start - range.start % ALIGN;
    let end = range.end.next_multiple_of(ALIGN);
    start..end
}

impl Gpu {
    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn buffer(&self, block: Block) -> Result<wgpu::Buffer, DeviceError> {
        self.buffers
            .borrow()
            .get(&block.addr().get())
            .cloned()
            .ok_or_else(|| DeviceError::Transfer(format!("unknown block {:#x}", block.addr())))
    }

    /// Reads an aligned byte range of a buffer through a mapped staging buffer.
    fn download(&self, buffer: &wgpu::Buffer, range: Range<usize>) -> Result<Vec<u8>, DeviceError> {
        let size = (range.end - range.start) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(buffer, range.start as u64, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let (sender, receiver) = flume::bounded(1);
        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            _ = sender.send(result);
        });
        self.device.poll(wgpu::PollType::Wait)?;
        receiver.recv()??;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }
}

impl Driver for Gpu {
    #[inline]
    fn space(&self) -> MemorySpace {
        MemorySpace::Device
    }

    fn allocate(&self, size: usize) -> Result<Block, DeviceError> {
        let limit = self.device.limits().max_buffer_size as usize;
        let padded = size.next_multiple_of(ALIGN);
        if padded > limit {
            return Err(DeviceError::Limit(size, limit));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: padded as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        if let Some(error) = futures::executor::block_on(self.device.pop_error_scope()) {
            log::warn!("gpu allocation of {size} bytes failed: {error}");
            buffer.destroy();
            return Err(DeviceError::OutOfMemory(size));
        }

        let handle = self.next.get();
        let addr = NonZeroUsize::new(handle).ok_or(DeviceError::OutOfMemory(size))?;
        self.next.set(handle + 1);
        self.buffers.borrow_mut().insert(handle, buffer);
        // SAFETY: the handle names the buffer just created, which holds at least `size` bytes.
        Ok(unsafe { Block::from_raw_parts(addr, size) })
    }

    unsafe fn free(&self, block: Block) {
        let buffer = self.buffers.borrow_mut().remove(&block.addr().get());
        match buffer {
            Some(buffer) => buffer.destroy(),
            None => panic!("gpu block {:#x} is not owned by this device", block.addr()),
        }
    }

    unsafe fn read(&self, block: Block, offset: usize, data: &mut [u8]) -> Result<(), DeviceError> {
        if data.is_empty() {
            return Ok(());
        }
        let buffer = self.buffer(block)?;
        let range = aligned(offset..offset + data.len());
        let start = offset - range.start;
        let staged = self.download(&buffer, range)?;
        data.copy_from_slice(&staged[start..start + data.len()]);
        Ok(())
    }

    unsafe fn write(&self, block: Block, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        if data.is_empty() {
            return Ok(());
        }
        let buffer = self.buffer(block)?;
        let range = aligned(offset..offset + data.len());
        if range == (offset..offset + data.len()) {
            self.queue.write_buffer(&buffer, offset as u64, data);
            return Ok(());
        }

        // unaligned edges: patch the covering aligned range
        let start = offset - range.start;
        let mut staged = self.download(&buffer, range.clone())?;
        staged[start..start + data.len()].copy_from_slice(data);
        self.queue.write_buffer(&buffer, range.start as u64, &staged);
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
        if len == 0 {
            return Ok(());
        }
        let direct = [dst_offset, src_offset, len].iter().all(|x| x % ALIGN == 0);
        if direct && dst != src {
            let dst = self.buffer(dst)?;
            let src = self.buffer(src)?;
            let mut encoder = self.device.create_command_encoder(&Default::default());
            encoder.copy_buffer_to_buffer(
                &src,
                src_offset as u64,
                &dst,
                dst_offset as u64,
                len as u64,
            );
            self.queue.submit(Some(encoder.finish()));
            return Ok(());
        }

        let mut stage = vec![0u8; len];
        unsafe {
            self.read(src, src_offset, &mut stage)?;
            self.write(dst, dst_offset, &stage)
        }
    }
}

pub struct GpuBuilder {
    pub adapter: wgpu::Adapter,
    pub features: wgpu::Features,
    pub limits: wgpu::Limits,
}

#[derive(Debug, Error)]
pub enum GpuBuildError {
    #[error("failed to request device")]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
}

impl GpuBuilder {
    pub fn new(adapter: wgpu::Adapter) -> Self {
        Self {
            adapter,
            features: wgpu::Features::empty(),
            limits: Default::default(),
        }
    }

    pub async fn build(self) -> Result<Gpu, GpuBuildError> {
        let Self {
            adapter,
            features,
            limits,
        } = self;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: features,
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await?;
        log::info!("gpu device ready: {:?}", adapter.get_info());

        Ok(Gpu {
            device,
            queue,
            buffers: RefCell::new(HashMap::default()),
            next: Cell::new(1),
        })
    }

    pub fn limits(mut self, limits: wgpu::Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn features(mut self, features: wgpu::Features) -> Self {
        self.features = features;
        self
    }
}
