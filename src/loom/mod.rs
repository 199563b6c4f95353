//! The `loom` module holds the tensor data model and the memory it lives in.
//!
//! ## Key Components
//! 1. **Layouts** (`layout`, `slice`):
//!    - Shapes, signed strides and element offsets.
//!    - Slicing, permutation and row/column-major reinterpretation.
//!    - Contiguous-run iteration for bulk transfers.
//!
//! 2. **Memory** (`device`, `buffer`):
//!    - Host and accelerator memory spaces behind the `Driver` trait.
//!    - A pooled `Allocator` per space that reuses freed blocks of the same size.
//!    - Reference-counted `Buffer`s that are pooled, wrapped or unmanaged.
//!
//! 3. **Tensors** (`tensor`, `ops`):
//!    - Typed handles that share buffers; views outlive the tensors they come from.
//!    - Deep copies, aliasing and value assignment, and cross-space transfers.
//!
//! Bookkeeping is single-threaded: buffers are `Rc`-counted and each thread owns its
//! default allocators.

pub mod buffer;
pub mod device;
pub mod layout;
pub mod num;
pub mod ops;
pub mod slice;
pub mod tensor;
