//! Strided tensors over pooled host and accelerator memory.
//!
//! ```
//! use weft::loom::{device::Dev, tensor::Tensor};
//!
//! # fn main() -> Result<(), weft::loom::tensor::TensorError> {
//! let host = Tensor::<f32>::from_slice([2, 3], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0])?;
//! let column = host.view((.., 1))?;
//! assert_eq!(column.to_vec()?, vec![1.0, 4.0]);
//!
//! let dev = host.to_space::<Dev>()?;
//! host.set(&[0, 0], 9.0)?;
//! assert_eq!(dev.get(&[0, 0])?, 0.0);
//! # Ok(())
//! # }
//! ```

pub mod loom;

pub use loom::{
    buffer::{Buffer, Ownership},
    device::{Allocator, AllocatorBuilder, Dev, Host, MemorySpace, PoolStats, Space},
    layout::{ColumnMajor, Layout, MemoryOrder, Order, RowMajor, Shape, Strides},
    num::{DataType, Scalar},
    slice::{Axis, Slice},
    tensor::{Tensor, TensorError},
};
