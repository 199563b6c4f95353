//! Moving element values between tensors.
//!
//! Two tensors that share a buffer see each other's writes; these operations are the only
//! way to get independent storage or to move values between memory spaces.

use super::{
    buffer::Buffer,
    device::{Allocator, DeviceError, Space},
    layout::{Layout, MemoryOrder, Order},
    num::Scalar,
    tensor::{Tensor, TensorError},
};

/// Copies elements between two layouts of equal shape, walking both in `order` and
/// moving the longest run both sides agree on at a time.
fn copy_runs(
    dst: &Buffer,
    dst_layout: &Layout,
    src: &Buffer,
    src_layout: &Layout,
    order: MemoryOrder,
    element: usize,
) -> Result<(), DeviceError> {
    debug_assert_eq!(dst_layout.shape(), src_layout.shape());
    let mut dst_runs = dst_layout.runs(order);
    let mut src_runs = src_layout.runs(order);
    let mut dst_run = dst_runs.next();
    let mut src_run = src_runs.next();
    while let (Some((dst_offset, dst_len)), Some((src_offset, src_len))) = (dst_run, src_run) {
        let len = dst_len.min(src_len);
        dst.copy_from(dst_offset * element, src, src_offset * element, len * element)?;
        dst_run = match dst_len - len {
            0 => dst_runs.next(),
            rest => Some((dst_offset + len, rest)),
        };
        src_run = match src_len - len {
            0 => src_runs.next(),
            rest => Some((src_offset + len, rest)),
        };
    }
    Ok(())
}

impl<T: Scalar, M: Space, L: Order> Tensor<T, M, L> {
    /// Reads every element into host memory, in the tensor's memory order.
    pub fn to_vec(&self) -> Result<Vec<T>, TensorError> {
        let mut output = vec![T::zero(); self.size()];
        let Some(buffer) = &self.data else {
            return Ok(output);
        };
        let element = size_of::<T>();
        let mut start = 0;
        for (offset, len) in self.layout.runs(L::ORDER) {
            let bytes = bytemuck::cast_slice_mut(&mut output[start..start + len]);
            buffer.read(offset * element, bytes)?;
            start += len;
        }
        Ok(output)
    }

    /// Writes `data`, given in the tensor's memory order, into the elements the tensor addresses.
    pub fn write_slice(&self, data: &[T]) -> Result<(), TensorError> {
        if data.len() != self.size() {
            return Err(TensorError::Create(self.shape().clone(), data.len()));
        }
        let Some(buffer) = &self.data else {
            return Ok(());
        };
        let element = size_of::<T>();
        let mut start = 0;
        for (offset, len) in self.layout.runs(L::ORDER) {
            buffer.write(offset * element, bytemuck::cast_slice(&data[start..start + len]))?;
            start += len;
        }
        Ok(())
    }

    /// A deep copy: a fresh contiguous buffer in the same memory space, sharing nothing
    /// with the source.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
    pub fn copy(&self) -> Result<Self, TensorError> {
        let output = Self::new_in(self.shape(), &self.allocator)?;
        output.assign_from(self)?;
        Ok(output)
    }

    /// Rebinds this handle to the source's buffer and layout. Afterwards both observe
    /// each other's writes.
    #[inline]
    pub fn bind(&mut self, source: &Self) {
        self.layout = source.layout.clone();
        self.data = source.data.clone();
        self.allocator = source.allocator.clone();
    }

    /// Copies values in place into the elements this tensor addresses, from a tensor of any
    /// memory space. The buffer and layout of this tensor are kept.
    pub fn assign_values<M2: Space>(
        &mut self,
        source: &Tensor<T, M2, L>,
    ) -> Result<(), TensorError> {
        self.assign_from(source)
    }

    /// Same as [`Tensor::assign_values`].
    #[inline]
    pub fn copy_from<M2: Space>(&mut self, source: &Tensor<T, M2, L>) -> Result<(), TensorError> {
        self.assign_from(source)
    }

    fn assign_from<M2: Space>(&self, source: &Tensor<T, M2, L>) -> Result<(), TensorError> {
        if self.shape() != source.shape() {
            return Err(TensorError::ShapeMismatch(
                self.shape().clone(),
                source.shape().clone(),
            ));
        }
        let (Some(dst), Some(src)) = (&self.data, &source.data) else {
            return Ok(());
        };

        // overlapping memory must be read in full before anything is written
        if dst.overlaps(src) {
            return self.write_slice(&source.to_vec()?);
        }

        let element = size_of::<T>();
        copy_runs(dst, &self.layout, src, &source.layout, L::ORDER, element)?;
        Ok(())
    }

    /// Same-space assignment. An empty destination is bound to the source's buffer; an
    /// already-backed one (owned, wrapped or a view) gets the source's values copied in place.
    pub fn assign(&mut self, source: &Self) -> Result<(), TensorError> {
        match self.data {
            None => {
                self.bind(source);
                Ok(())
            }
            Some(_) => self.assign_from(source),
        }
    }

    /// Cross-space assignment. Values are always transferred, never aliased; an empty
    /// destination first gets a buffer of the source's shape from its own allocator.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all))]
    pub fn transfer_from<M2: Space>(
        &mut self,
        source: &Tensor<T, M2, L>,
    ) -> Result<(), TensorError> {
        if self.data.is_none() {
            *self = Self::new_in(source.shape(), &self.allocator)?;
        }
        self.assign_from(source)
    }

    /// A copy of the tensor in another memory space, from that space's default allocator.
    #[inline]
    pub fn to_space<M2: Space>(&self) -> Result<Tensor<T, M2, L>, TensorError> {
        self.to_space_in(&M2::allocator())
    }

    /// A copy of the tensor in the memory space of `allocator`.
    pub fn to_space_in<M2: Space>(
        &self,
        allocator: &Allocator,
    ) -> Result<Tensor<T, M2, L>, TensorError> {
        let output = Tensor::<T, M2, L>::new_in(self.shape(), allocator)?;
        output.assign_from(self)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, ptr::NonNull, rc::Rc};

    use itertools::Itertools;

    use super::copy_runs;
    use crate::loom::{
        device::{Allocator, Cpu, Dev, Emu, Host},
        layout::{ColumnMajor, Layout, MemoryOrder},
        tensor::{Tensor, TensorError},
    };

    fn iota(len: usize) -> Vec<f32> {
        (0..len).map(|x| x as f32).collect()
    }

    fn shares(a: &Tensor<f32>, b: &Tensor<f32>) -> bool {
        match (a.buffer(), b.buffer()) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    #[test]
    fn test_copy_runs_split() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Cpu);
        let src = allocator.allocate(12 * 4)?;
        let dst = allocator.allocate(12 * 4)?;
        src.write(0, bytemuck::cast_slice(&iota(12)))?;

        // a transposed source against a contiguous destination
        let dst_layout = Layout::from_shape([4, 3], MemoryOrder::RowMajor);
        let src_layout = Layout::from_shape([3, 4], MemoryOrder::RowMajor).permute(&[1, 0])?;
        copy_runs(&dst, &dst_layout, &src, &src_layout, MemoryOrder::RowMajor, 4)?;

        let mut output = vec![0f32; 12];
        dst.read(0, bytemuck::cast_slice_mut(&mut output))?;
        let expected = (0..4)
            .cartesian_product(0..3)
            .map(|(i, j)| (j * 4 + i) as f32)
            .collect_vec();
        assert_eq!(output, expected);
        Ok(())
    }

    #[test]
    fn test_copy() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Cpu);
        let tensor = Tensor::<f32>::from_slice_in([4, 5], &iota(20), &allocator)?;

        let copy = tensor.copy()?;
        assert_ne!(copy.addr(), tensor.addr());
        assert_eq!(copy.to_vec()?, tensor.to_vec()?);
        copy.set(&[0, 0], -1.0)?;
        assert_eq!(tensor.get(&[0, 0])?, 0.0);

        // strided sources come out contiguous
        let view = tensor.view((1..4, 1))?;
        let copy = view.copy()?;
        assert!(copy.is_contiguous());
        assert_eq!(copy.offset(), 0);
        assert_eq!(copy.to_vec()?, vec![6.0, 11.0, 16.0]);
        assert!(!shares(&copy, &view));
        Ok(())
    }

    #[test]
    fn test_copy_random() -> Result<(), Box<dyn Error>> {
        fastrand::seed(42);
        let allocator = Allocator::new(Cpu);
        for _ in 0..16 {
            let shape = (0..3).map(|_| fastrand::usize(1..6)).collect_vec();
            let data = (0..shape.iter().product()).map(|_| fastrand::f32()).collect_vec();
            let tensor =
                Tensor::<f32, Host, ColumnMajor>::from_slice_in(shape.clone(), &data, &allocator)?;
            let view = tensor.permute(&[2, 0, 1])?;
            let copy = view.copy()?;
            for index in view.shape().iter().map(|&extent| 0..extent).multi_cartesian_product() {
                assert_eq!(copy.get(&index)?, view.get(&index)?);
            }
        }
        Ok(())
    }

    #[test]
    fn test_assign_empty_binds() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Cpu);
        let source = Tensor::<f32>::from_slice_in([2, 2], &iota(4), &allocator)?;
        let mut dst = Tensor::<f32>::empty();
        dst.assign(&source)?;
        assert!(shares(&dst, &source));
        assert_eq!(source.ref_count(), 2);

        dst.set(&[0, 1], 10.0)?;
        assert_eq!(source.get(&[0, 1])?, 10.0);
        source.set(&[1, 0], 20.0)?;
        assert_eq!(dst.get(&[1, 0])?, 20.0);
        Ok(())
    }

    #[test]
    fn test_assign_backed_copies() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Cpu);
        let source = Tensor::<f32>::from_slice_in([2, 2], &iota(4), &allocator)?;
        let mut dst = Tensor::<f32>::zeros_in([2, 2], &allocator)?;
        let addr = dst.addr();

        dst.assign(&source)?;
        assert_eq!(dst.addr(), addr);
        assert!(!shares(&dst, &source));
        assert_eq!(dst.to_vec()?, iota(4));
        dst.set(&[0, 0], 5.0)?;
        assert_eq!(source.get(&[0, 0])?, 0.0);

        let mut wrong = Tensor::<f32>::zeros_in([4], &allocator)?;
        assert!(matches!(
            wrong.assign(&source),
            Err(TensorError::ShapeMismatch(_, _))
        ));
        Ok(())
    }

    #[test]
    fn test_assign_into_view() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Cpu);
        let tensor = Tensor::<f32>::zeros_in([3, 3], &allocator)?;
        let source = Tensor::<f32>::from_slice_in(3, &[1.0, 2.0, 3.0], &allocator)?;

        let mut column = tensor.view((.., 1))?;
        column.assign(&source)?;
        assert_eq!(
            tensor.to_vec()?,
            vec![0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 3.0, 0.0]
        );
        Ok(())
    }

    #[test]
    fn test_assign_overlapping() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Cpu);
        let tensor = Tensor::<f32>::from_slice_in(6, &iota(6), &allocator)?;
        let source = tensor.view(0..5)?;
        let mut dst = tensor.view(1..6)?;
        dst.assign(&source)?;
        assert_eq!(tensor.to_vec()?, vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);

        let reversed = tensor.view_strided(6, vec![-1isize], 5)?;
        let mut whole = tensor.clone();
        whole.assign(&reversed)?;
        assert_eq!(tensor.to_vec()?, vec![4.0, 3.0, 2.0, 1.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_assign_overlapping_wrapped() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Cpu);
        let mut memory = iota(6);
        let ptr = NonNull::new(memory.as_mut_ptr()).ok_or("null")?;

        // two buffers over the same memory, one element apart
        let head = unsafe { Tensor::<f32>::wrap_in(ptr, 5, &allocator)? };
        let mut tail = unsafe { Tensor::<f32>::wrap_in(ptr.add(1), 5, &allocator)? };
        let reversed = head.view_strided(5, vec![-1isize], 4)?;
        tail.assign(&reversed)?;

        drop((head, tail, reversed));
        assert_eq!(memory, vec![0.0, 4.0, 3.0, 2.0, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_assign_wrapped() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Cpu);
        let mut memory = vec![0f32; 4];
        let ptr = NonNull::new(memory.as_mut_ptr()).ok_or("null")?;

        let source = Tensor::<f32>::from_slice_in([2, 2], &iota(4), &allocator)?;
        let mut wrapped = unsafe { Tensor::<f32>::wrap_in(ptr, [2, 2], &allocator)? };
        wrapped.assign(&source)?;
        assert_eq!(wrapped.as_ptr(), ptr.as_ptr().cast_const());
        drop(wrapped);
        assert_eq!(memory, iota(4));
        Ok(())
    }

    #[test]
    fn test_cross_space() -> Result<(), Box<dyn Error>> {
        let host = Allocator::new(Cpu);
        let dev = Allocator::new(Emu::new());

        let src = Tensor::<f32, Dev>::from_slice_in([2, 3], &iota(6), &dev)?;
        let mut dst = Tensor::<f32, Host>::new_in([0], &host)?;
        assert!(dst.buffer().is_none());
        dst.transfer_from(&src)?;
        assert_eq!(dst.shape(), src.shape());
        assert_eq!(dst.to_vec()?, iota(6));
        assert_eq!(host.stats().live(), 1);

        src.set(&[0, 0], 100.0)?;
        assert_eq!(dst.get(&[0, 0])?, 0.0);

        // an already-backed destination keeps its buffer
        let addr = dst.addr();
        dst.transfer_from(&src)?;
        assert_eq!(dst.addr(), addr);
        assert_eq!(dst.get(&[0, 0])?, 100.0);

        let back = dst.view((.., 1..))?.to_space_in::<Dev>(&dev)?;
        assert_eq!(back.to_vec()?, vec![1.0, 2.0, 4.0, 5.0]);
        assert_eq!(dev.stats().live(), 2);

        let mut wrong = Tensor::<f32, Dev>::new_in(5, &dev)?;
        assert!(matches!(
            wrong.transfer_from(&dst),
            Err(TensorError::ShapeMismatch(_, _))
        ));
        Ok(())
    }

    #[test]
    fn test_write_slice() -> Result<(), Box<dyn Error>> {
        let allocator = Allocator::new(Emu::new());
        let tensor = Tensor::<u16, Dev, ColumnMajor>::zeros_in([2, 3], &allocator)?;
        let row = tensor.view((1, ..))?;
        row.write_slice(&[7, 8, 9])?;
        assert_eq!(tensor.to_vec()?, vec![0, 7, 0, 8, 0, 9]);
        assert!(row.write_slice(&[1]).is_err());
        Ok(())
    }
}
