use std::{marker::PhantomData, num::NonZeroUsize, ptr::NonNull, rc::Rc};

use thiserror::Error;

use super::{
    buffer::{Buffer, Ownership},
    device::{AllocError, Allocator, Block, DeviceError, Host, MemorySpace, Space},
    layout::{
        ColumnMajor, IntoShape, Layout, LayoutError, MemoryOrder, Order, RowMajor, Shape, Strides,
        canonical_strides,
    },
    num::{DataType, Scalar},
    slice::Slice,
};

#[derive(Debug, Error)]
pub enum TensorError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("tensor shape error: shape {0} mismatches {1}")]
    ShapeMismatch(Shape, Shape),
    #[error("tensor creation error: shape {0}'s size not match data len {1}")]
    Create(Shape, usize),
    #[error("tensor reshape error: layout {0} cannot be reshaped into {1}")]
    Reshape(Layout, Shape),
}

/// A typed, shaped, strided handle to elements in a [`Buffer`].
///
/// Tensors are thin: cloning one yields another handle to the same buffer, and a view keeps
/// its buffer alive after the tensor it was sliced from is gone. Writes through any handle
/// are visible through every handle sharing the buffer.
///
/// A tensor without elements holds no buffer and never touches its allocator.
#[derive(Debug, Clone)]
pub struct Tensor<T: Scalar, M: Space = Host, L: Order = RowMajor> {
    pub(super) layout: Layout,
    pub(super) data: Option<Rc<Buffer>>,
    pub(super) allocator: Allocator,
    pub(super) phantom: PhantomData<(T, M, L)>,
}

impl<T: Scalar, M: Space, L: Order> Default for Tensor<T, M, L> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Scalar, M: Space, L: Order> Tensor<T, M, L> {
    fn check_space(allocator: &Allocator) -> Result<(), AllocError> {
        match allocator.space() == M::KIND {
            true => Ok(()),
            false => Err(AllocError::Space {
                expected: M::KIND,
                found: allocator.space(),
            }),
        }
    }

    /// A freshly declared tensor: no elements, no buffer.
    pub fn empty() -> Self {
        Self {
            layout: Layout::from_shape([0], L::ORDER),
            data: None,
            allocator: M::allocator(),
            phantom: PhantomData,
        }
    }

    /// Allocates a tensor from the thread's default allocator of its memory space.
    ///
    /// Contents are unspecified: a recycled block keeps the values it had.
    #[inline]
    pub fn new(shape: impl IntoShape) -> Result<Self, TensorError> {
        Self::new_in(shape, &M::allocator())
    }

    /// Allocates a tensor from `allocator`, which must serve this tensor's memory space.
    pub fn new_in(shape: impl IntoShape, allocator: &Allocator) -> Result<Self, TensorError> {
        Self::check_space(allocator)?;
        let layout = Layout::from_shape(shape, L::ORDER);
        let data = match layout.byte_size(size_of::<T>())? {
            0 => None,
            size => Some(Rc::new(allocator.allocate(size)?)),
        };
        Ok(Self {
            layout,
            data,
            allocator: allocator.clone(),
            phantom: PhantomData,
        })
    }

    #[inline]
    pub fn zeros(shape: impl IntoShape) -> Result<Self, TensorError> {
        Self::zeros_in(shape, &M::allocator())
    }

    pub fn zeros_in(shape: impl IntoShape, allocator: &Allocator) -> Result<Self, TensorError> {
        let tensor = Self::new_in(shape, allocator)?;
        if let Some(buffer) = &tensor.data {
            let zeros = vec![T::zero(); tensor.size()];
            buffer.write(0, bytemuck::cast_slice(&zeros))?;
        }
        Ok(tensor)
    }

    /// Creates a tensor holding `data`, laid out in the tensor's memory order.
    #[inline]
    pub fn from_slice(shape: impl IntoShape, data: &[T]) -> Result<Self, TensorError> {
        Self::from_slice_in(shape, data, &M::allocator())
    }

    pub fn from_slice_in(
        shape: impl IntoShape,
        data: &[T],
        allocator: &Allocator,
    ) -> Result<Self, TensorError> {
        let shape = shape.into_shape();
        if shape.checked_size() != Some(data.len()) {
            return Err(TensorError::Create(shape, data.len()));
        }
        let tensor = Self::new_in(shape, allocator)?;
        if let Some(buffer) = &tensor.data {
            buffer.write(0, bytemuck::cast_slice(data))?;
        }
        Ok(tensor)
    }

    /// Wraps caller-owned memory without copying it. The memory is never freed by the tensor,
    /// and writes through the tensor land in it.
    ///
    /// # Safety
    /// `ptr` must point to `shape.size()` elements reachable by the default allocator of `M`,
    /// and stay valid for as long as any tensor shares the wrapped buffer.
    #[inline]
    pub unsafe fn wrap(ptr: NonNull<T>, shape: impl IntoShape) -> Result<Self, TensorError> {
        unsafe { Self::wrap_in(ptr, shape, &M::allocator()) }
    }

    /// # Safety
    /// See [`Tensor::wrap`]; the memory must be reachable by the driver of `allocator`.
    pub unsafe fn wrap_in(
        ptr: NonNull<T>,
        shape: impl IntoShape,
        allocator: &Allocator,
    ) -> Result<Self, TensorError> {
        Self::check_space(allocator)?;
        let layout = Layout::from_shape(shape, L::ORDER);
        let data = match layout.byte_size(size_of::<T>())? {
            0 => None,
            size => {
                // drivers reach host memory through its exposed address
                let _ = ptr.as_ptr().expose_provenance();
                let addr: NonZeroUsize = ptr.addr();
                // SAFETY: guaranteed by the caller.
                let block = unsafe { Block::from_raw_parts(addr, size) };
                Some(Rc::new(unsafe { Buffer::wrap(block, allocator.clone()) }))
            }
        };
        Ok(Self {
            layout,
            data,
            allocator: allocator.clone(),
            phantom: PhantomData,
        })
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    #[inline]
    pub fn strides(&self) -> &Strides {
        self.layout.strides()
    }

    /// Element offset of the first element into the buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.layout.offset()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Returns `true` if the tensor has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous(L::ORDER)
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    #[inline]
    pub fn element_size(&self) -> usize {
        size_of::<T>()
    }

    #[inline]
    pub fn memory_space(&self) -> MemorySpace {
        M::KIND
    }

    #[inline]
    pub fn order(&self) -> MemoryOrder {
        L::ORDER
    }

    #[inline]
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    #[inline]
    pub fn buffer(&self) -> Option<&Rc<Buffer>> {
        self.data.as_ref()
    }

    #[inline]
    pub fn ownership(&self) -> Option<Ownership> {
        self.data.as_ref().map(|buffer| buffer.ownership())
    }

    /// Number of handles sharing the buffer; zero without one.
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.data.as_ref().map_or(0, Rc::strong_count)
    }

    /// Address of the element at the tensor's offset. Opaque for accelerator memory.
    #[inline]
    pub fn addr(&self) -> Option<usize> {
        self.data
            .as_ref()
            .map(|buffer| buffer.addr() + self.offset() * size_of::<T>())
    }

    /// Buffer position of the element at a multi-index.
    #[inline]
    pub fn index_of(&self, index: &[usize]) -> Result<usize, TensorError> {
        Ok(self.layout.index_of(index)?)
    }

    fn read_element(&self, linear: usize) -> Result<T, TensorError> {
        let Some(buffer) = &self.data else {
            return Err(LayoutError::OutOfRange {
                axis: 0,
                index: linear,
                extent: 0,
            }
            .into());
        };
        let mut value = T::zero();
        buffer.read(linear * size_of::<T>(), bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    fn write_element(&self, linear: usize, value: T) -> Result<(), TensorError> {
        let Some(buffer) = &self.data else {
            return Err(LayoutError::OutOfRange {
                axis: 0,
                index: linear,
                extent: 0,
            }
            .into());
        };
        buffer.write(linear * size_of::<T>(), bytemuck::bytes_of(&value))?;
        Ok(())
    }

    /// Reads the element at a multi-index.
    pub fn get(&self, index: &[usize]) -> Result<T, TensorError> {
        let linear = self.layout.index_of(index)?;
        self.read_element(linear)
    }

    /// Writes the element at a multi-index. Visible through every handle sharing the buffer.
    pub fn set(&self, index: &[usize], value: T) -> Result<(), TensorError> {
        let linear = self.layout.index_of(index)?;
        self.write_element(linear, value)
    }

    /// Reads the `linear`-th element in the tensor's memory order.
    pub fn at(&self, linear: usize) -> Result<T, TensorError> {
        let index = self.layout.unravel(linear, L::ORDER)?;
        self.get(&index)
    }

    /// Writes the `linear`-th element in the tensor's memory order.
    pub fn set_at(&self, linear: usize, value: T) -> Result<(), TensorError> {
        let index = self.layout.unravel(linear, L::ORDER)?;
        self.set(&index, value)
    }

    fn with_layout<L2: Order>(&self, layout: Layout) -> Tensor<T, M, L2> {
        let data = match layout.size() {
            0 => None,
            _ => self.data.clone(),
        };
        Tensor {
            layout,
            data,
            allocator: self.allocator.clone(),
            phantom: PhantomData,
        }
    }

    /// A view of a sub-region. Shares the buffer; nothing is allocated or copied.
    ///
    /// Axes the slice leaves out are taken in full.
    pub fn view(&self, slice: impl Into<Slice>) -> Result<Self, TensorError> {
        let layout = self.layout.slice(&slice.into())?;
        Ok(self.with_layout(layout))
    }

    /// A view with explicit shape, strides and offset into the same buffer.
    ///
    /// Every addressed element must lie inside the buffer; strides may be negative.
    pub fn view_strided(
        &self,
        shape: impl IntoShape,
        strides: impl Into<Strides>,
        offset: usize,
    ) -> Result<Self, TensorError> {
        let layout = Layout::from_parts(shape, strides, offset)?;
        layout.byte_size(size_of::<T>())?;
        if let Some((lo, hi)) = layout.span() {
            let capacity = self.data.as_ref().map_or(0, |buffer| buffer.capacity());
            let end = usize::try_from(hi)
                .ok()
                .and_then(|hi| hi.checked_add(1))
                .and_then(|len| len.checked_mul(size_of::<T>()));
            if lo < 0 || end.is_none_or(|end| end > capacity) {
                return Err(LayoutError::InvalidView(format!(
                    "layout {layout} spans elements {lo}..={hi} beyond a buffer of {capacity} bytes"
                ))
                .into());
            }
        }
        Ok(self.with_layout(layout))
    }

    /// Reorders dimensions; `axes[i]` names the old axis that becomes axis `i`.
    pub fn permute(&self, axes: &[usize]) -> Result<Self, TensorError> {
        let layout = self.layout.permute(axes)?;
        Ok(self.with_layout(layout))
    }

    /// Reinterprets the shape of a contiguous tensor, leaving the buffer untouched.
    pub fn reshape(self, shape: impl IntoShape) -> Result<Self, TensorError> {
        let shape = shape.into_shape();
        if shape.size() != self.size() || !self.is_contiguous() {
            return Err(TensorError::Reshape(self.layout, shape));
        }
        let strides = canonical_strides(&shape, L::ORDER);
        let layout = Layout::from_parts(shape, strides, self.offset())?;
        Ok(self.with_layout(layout))
    }

    /// Resizes to `shape`.
    ///
    /// If the new byte size equals the buffer's capacity, the buffer is kept and only the
    /// layout changes. Otherwise the old buffer is released before the new one is allocated,
    /// so a block of the old size is back on the free list by the time the new size is served.
    /// On allocation failure the tensor is left empty. A shape too large to address is
    /// rejected up front and leaves the tensor untouched.
    pub fn resize(&mut self, shape: impl IntoShape) -> Result<(), TensorError> {
        let layout = Layout::from_shape(shape, L::ORDER);
        let size = layout.byte_size(size_of::<T>())?;
        let capacity = self.data.as_ref().map_or(0, |buffer| buffer.capacity());
        if size == capacity {
            self.layout = layout;
            return Ok(());
        }

        log::debug!("resize {} -> {}: reallocating", self.layout, layout);
        self.data = None;
        self.layout = Layout::from_shape([0], L::ORDER);
        if size > 0 {
            self.data = Some(Rc::new(self.allocator.allocate(size)?));
        }
        self.layout = layout;
        Ok(())
    }
}

impl<T: Scalar, L: Order> Tensor<T, Host, L> {
    /// Pointer to the element at the tensor's offset; null without a buffer.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        match self.addr() {
            Some(addr) => std::ptr::with_exposed_provenance(addr),
            None => std::ptr::null(),
        }
    }
}

impl<T: Scalar, M: Space> Tensor<T, M, ColumnMajor> {
    /// The same elements as a row-major tensor with dimensions and strides reversed.
    #[inline]
    pub fn as_row_major(&self) -> Tensor<T, M, RowMajor> {
        self.with_layout(self.layout.reversed())
    }
}

impl<T: Scalar, M: Space> Tensor<T, M, RowMajor> {
    /// The same elements as a column-major tensor with dimensions and strides reversed.
    #[inline]
    pub fn as_column_major(&self) -> Tensor<T, M, ColumnMajor> {
        self.with_layout(self.layout.reversed())
    }
}
