use derive_more::{Deref, DerefMut, Display, From, Into};
use itertools::Itertools;
use thiserror::Error;

use super::slice::{Axis, Resolved, Slice};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("layout index error: index {index} out of range for axis {axis} of extent {extent}")]
    OutOfRange {
        axis: usize,
        index: usize,
        extent: usize,
    },
    #[error("layout slice error: range {start}..{end} out of range for axis {axis} of extent {extent}")]
    Range {
        axis: usize,
        start: usize,
        end: usize,
        extent: usize,
    },
    #[error("layout rank error: expected {expected} coordinates, found {found}")]
    Rank { expected: usize, found: usize },
    #[error("layout view error: {0}")]
    InvalidView(String),
    #[error("layout size error: shape {0} of {1}-byte elements exceeds the address space")]
    TooLarge(Shape, usize),
}

/// Which dimension varies fastest when walking memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryOrder {
    /// The last dimension varies fastest.
    #[default]
    RowMajor,
    /// The first dimension varies fastest.
    ColumnMajor,
}

/// Type-level tag for the memory order of a tensor.
pub trait Order: std::fmt::Debug + Default + Clone + Copy + Send + Sync + 'static {
    const ORDER: MemoryOrder;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowMajor;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnMajor;

impl Order for RowMajor {
    const ORDER: MemoryOrder = MemoryOrder::RowMajor;
}

impl Order for ColumnMajor {
    const ORDER: MemoryOrder = MemoryOrder::ColumnMajor;
}

/// Extents of each dimension.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Deref, DerefMut, From, Into, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("({})", _0.iter().format(", "))]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Number of elements. Zero if any extent is zero; one for a rank-0 shape.
    ///
    /// Saturates at `usize::MAX`; use [`Shape::checked_size`] where overflow matters.
    #[inline]
    pub fn size(&self) -> usize {
        self.checked_size().unwrap_or(usize::MAX)
    }

    /// Number of elements, or `None` if it does not fit in a `usize`.
    pub fn checked_size(&self) -> Option<usize> {
        if self.0.contains(&0) {
            return Some(0);
        }
        self.0
            .iter()
            .try_fold(1usize, |acc, &extent| acc.checked_mul(extent))
    }
}

/// Element strides of each dimension. Signed, so that views may walk memory backwards.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Deref, DerefMut, From, Into, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("({})", _0.iter().format(", "))]
pub struct Strides(Vec<isize>);

pub trait IntoShape {
    fn into_shape(self) -> Shape;
}

impl IntoShape for Shape {
    #[inline]
    fn into_shape(self) -> Shape {
        self
    }
}

impl IntoShape for &Shape {
    #[inline]
    fn into_shape(self) -> Shape {
        self.clone()
    }
}

impl IntoShape for usize {
    #[inline]
    fn into_shape(self) -> Shape {
        Shape(vec![self])
    }
}

impl IntoShape for Vec<usize> {
    #[inline]
    fn into_shape(self) -> Shape {
        Shape(self)
    }
}

impl IntoShape for &[usize] {
    #[inline]
    fn into_shape(self) -> Shape {
        Shape(self.to_vec())
    }
}

impl<const N: usize> IntoShape for [usize; N] {
    #[inline]
    fn into_shape(self) -> Shape {
        Shape(self.to_vec())
    }
}

/// Shape, strides and element offset of a tensor into its buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("{shape}:{strides}+{offset}")]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    offset: usize,
}

impl Layout {
    /// Creates a layout with canonical strides and no offset.
    pub fn from_shape(shape: impl IntoShape, order: MemoryOrder) -> Self {
        let shape = shape.into_shape();
        let strides = canonical_strides(&shape, order);
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Creates a layout from explicit parts. Bounds are checked by the tensor that uses it.
    pub fn from_parts(
        shape: impl IntoShape,
        strides: impl Into<Strides>,
        offset: usize,
    ) -> Result<Self, LayoutError> {
        let shape = shape.into_shape();
        let strides = strides.into();
        if shape.len() != strides.len() {
            return Err(LayoutError::InvalidView(format!(
                "shape {shape} and strides {strides} differ in rank"
            )));
        }
        Ok(Self {
            shape,
            strides,
            offset,
        })
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &Strides {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of dimensions.
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Number of elements addressed by the layout.
    #[inline]
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Bytes spanned by the elements of the shape, each `element` bytes wide.
    ///
    /// Fails if the total does not fit in an `isize`, the most any allocation can hold.
    pub fn byte_size(&self, element: usize) -> Result<usize, LayoutError> {
        self.shape
            .checked_size()
            .and_then(|size| size.checked_mul(element))
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or_else(|| LayoutError::TooLarge(self.shape.clone(), element))
    }

    /// Linear element offset of a multi-index: `offset + Σ index[i] * strides[i]`.
    pub fn index_of(&self, index: &[usize]) -> Result<usize, LayoutError> {
        if index.len() != self.len() {
            return Err(LayoutError::Rank {
                expected: self.len(),
                found: index.len(),
            });
        }
        let mut linear = self.offset as isize;
        for (axis, (&index, &extent, &stride)) in
            itertools::izip!(index, self.shape.iter(), self.strides.iter()).enumerate()
        {
            if index >= extent {
                return Err(LayoutError::OutOfRange {
                    axis,
                    index,
                    extent,
                });
            }
            linear += index as isize * stride;
        }
        debug_assert!(linear >= 0, "layout {self} addresses before its base");
        Ok(linear as usize)
    }

    /// Converts a linear position in memory order into a multi-index.
    pub fn unravel(&self, linear: usize, order: MemoryOrder) -> Result<Vec<usize>, LayoutError> {
        let size = self.size();
        if linear >= size {
            return Err(LayoutError::OutOfRange {
                axis: 0,
                index: linear,
                extent: size,
            });
        }
        let mut index = vec![0; self.len()];
        let mut rest = linear;
        let mut place = |axis: usize| {
            let extent = self.shape[axis];
            index[axis] = rest % extent;
            rest /= extent;
        };
        match order {
            MemoryOrder::RowMajor => (0..self.len()).rev().for_each(&mut place),
            MemoryOrder::ColumnMajor => (0..self.len()).for_each(&mut place),
        }
        Ok(index)
    }

    /// Applies a slice. Ranged axes keep their stride, fixed axes are dropped, and the
    /// base offset moves to the first selected element.
    pub fn slice(&self, slice: &Slice) -> Result<Self, LayoutError> {
        if slice.len() > self.len() {
            return Err(LayoutError::InvalidView(format!(
                "slice {slice} has more axes than layout {self}"
            )));
        }

        let mut shape = Vec::with_capacity(self.len());
        let mut strides = Vec::with_capacity(self.len());
        let mut offset = self.offset as isize;

        let axes = slice.iter().copied().chain(std::iter::repeat(Axis::Full));
        for (axis, (slice, &extent, &stride)) in
            itertools::izip!(axes, self.shape.iter(), self.strides.iter()).enumerate()
        {
            match slice.resolve(extent) {
                Resolved::Fixed(index) if index < extent => offset += index as isize * stride,
                Resolved::Fixed(index) => {
                    return Err(LayoutError::OutOfRange {
                        axis,
                        index,
                        extent,
                    });
                }
                Resolved::Range(start, end) if start <= end && end <= extent => {
                    // an empty range selects nothing; keep the base inside the buffer
                    if end > start {
                        offset += start as isize * stride;
                    }
                    shape.push(end - start);
                    strides.push(stride);
                }
                Resolved::Range(start, end) => {
                    return Err(LayoutError::Range {
                        axis,
                        start,
                        end,
                        extent,
                    });
                }
            }
        }

        debug_assert!(offset >= 0);
        Ok(Self {
            shape: shape.into(),
            strides: strides.into(),
            offset: offset as usize,
        })
    }

    /// Reorders dimensions; `axes[i]` names the old axis that becomes axis `i`.
    pub fn permute(&self, axes: &[usize]) -> Result<Self, LayoutError> {
        let valid = axes.len() == self.len()
            && axes.iter().all(|&axis| axis < self.len())
            && axes.iter().all_unique();
        if !valid {
            return Err(LayoutError::InvalidView(format!(
                "axes {axes:?} are not a permutation of layout {self}"
            )));
        }
        let shape = axes.iter().map(|&axis| self.shape[axis]).collect_vec();
        let strides = axes.iter().map(|&axis| self.strides[axis]).collect_vec();
        Ok(Self {
            shape: shape.into(),
            strides: strides.into(),
            offset: self.offset,
        })
    }

    /// Reverses the order of dimensions and strides.
    ///
    /// A column-major layout reversed addresses the same elements as a row-major one:
    /// `reversed().index_of(rev(i)) == index_of(i)` for every multi-index `i`.
    pub fn reversed(&self) -> Self {
        let shape = self.shape.iter().rev().copied().collect_vec();
        let strides = self.strides.iter().rev().copied().collect_vec();
        Self {
            shape: shape.into(),
            strides: strides.into(),
            offset: self.offset,
        }
    }

    /// The equivalent layout to be walked in row-major order.
    #[inline]
    pub fn to_row_major(&self, order: MemoryOrder) -> Self {
        match order {
            MemoryOrder::RowMajor => self.clone(),
            MemoryOrder::ColumnMajor => self.reversed(),
        }
    }

    /// Returns `true` if the strides are the canonical ones for `order`, ignoring unit extents.
    pub fn is_contiguous(&self, order: MemoryOrder) -> bool {
        if self.size() == 0 {
            return true;
        }
        let canonical = canonical_strides(&self.shape, order);
        itertools::izip!(self.shape.iter(), self.strides.iter(), canonical.iter())
            .all(|(&extent, &stride, &canonical)| extent == 1 || stride == canonical)
    }

    /// Lowest and highest element offsets addressed. `None` if the layout is empty.
    pub fn span(&self) -> Option<(isize, isize)> {
        if self.size() == 0 {
            return None;
        }
        let base = self.offset as isize;
        let (lo, hi) = self
            .shape
            .iter()
            .zip_eq(self.strides.iter())
            .map(|(&extent, &stride)| {
                let extent = isize::try_from(extent).unwrap_or(isize::MAX);
                stride.saturating_mul(extent - 1)
            })
            .fold((base, base), |(lo, hi), step| match step < 0 {
                true => (lo.saturating_add(step), hi),
                false => (lo, hi.saturating_add(step)),
            });
        Some((lo, hi))
    }

    /// Merges adjacent dimensions that are contiguous with each other in row-major order,
    /// and drops unit extents.
    pub fn coalesce(&self) -> Self {
        let mut shape: Vec<usize> = vec![];
        let mut strides: Vec<isize> = vec![];
        for (&extent, &stride) in self.shape.iter().zip_eq(self.strides.iter()) {
            if extent == 1 {
                continue;
            }
            match strides.last() {
                Some(&outer) if outer == stride * extent as isize => {
                    if let (Some(outer), Some(outer_stride)) = (shape.last_mut(), strides.last_mut()) {
                        *outer *= extent;
                        *outer_stride = stride;
                    }
                }
                _ => {
                    shape.push(extent);
                    strides.push(stride);
                }
            }
        }
        Self {
            shape: shape.into(),
            strides: strides.into(),
            offset: self.offset,
        }
    }

    /// Contiguous element runs in memory order, as `(offset, len)` pairs.
    pub fn runs(&self, order: MemoryOrder) -> Runs {
        Runs::new(self.to_row_major(order).coalesce())
    }
}

/// Canonical strides of a shape: no gaps, with the fastest dimension at stride 1.
///
/// Strides saturate at `isize::MAX` for shapes too large to address.
pub fn canonical_strides(shape: &[usize], order: MemoryOrder) -> Strides {
    let mut strides = vec![0isize; shape.len()];
    let mut acc = 1isize;
    let mut step = |axis: usize| {
        strides[axis] = acc;
        let extent = isize::try_from(shape[axis]).unwrap_or(isize::MAX);
        acc = acc.saturating_mul(extent);
    };
    match order {
        MemoryOrder::RowMajor => (0..shape.len()).rev().for_each(&mut step),
        MemoryOrder::ColumnMajor => (0..shape.len()).for_each(&mut step),
    }
    strides.into()
}

/// Iterator over the contiguous runs of a coalesced row-major layout.
#[derive(Debug, Clone)]
pub struct Runs {
    layout: Layout,
    /// Number of leading dimensions walked by the odometer.
    outer: usize,
    /// Elements per run.
    len: usize,
    index: Vec<usize>,
    remaining: usize,
}

impl Runs {
    fn new(layout: Layout) -> Self {
        let size = layout.size();
        let (outer, len) = match layout.strides.last() {
            Some(1) => (layout.len() - 1, layout.shape[layout.len() - 1]),
            _ => (layout.len(), 1),
        };
        let remaining = match size {
            0 => 0,
            _ => size / len,
        };
        let index = vec![0; outer];
        Self {
            layout,
            outer,
            len,
            index,
            remaining,
        }
    }

    /// Elements per run.
    #[inline]
    pub fn run_len(&self) -> usize {
        self.len
    }
}

impl Iterator for Runs {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let offset = self.layout.offset as isize
            + self
                .index
                .iter()
                .zip(self.layout.strides.iter())
                .map(|(&index, &stride)| index as isize * stride)
                .sum::<isize>();
        debug_assert!(offset >= 0);

        self.remaining -= 1;
        for axis in (0..self.outer).rev() {
            self.index[axis] += 1;
            if self.index[axis] < self.layout.shape[axis] {
                break;
            }
            self.index[axis] = 0;
        }
        Some((offset as usize, self.len))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Runs {}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use itertools::Itertools;

    use super::{Layout, LayoutError, MemoryOrder};
    use crate::loom::slice::{Axis, Slice};

    fn indices(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> {
        shape.iter().map(|&extent| 0..extent).multi_cartesian_product()
    }

    #[test]
    fn test_canonical_index() -> Result<(), Box<dyn Error>> {
        let column = Layout::from_shape([2, 3, 4], MemoryOrder::ColumnMajor);
        assert_eq!(column.index_of(&[0, 0, 0])?, 0);
        assert_eq!(column.index_of(&[1, 0, 0])?, 1);
        assert_eq!(column.index_of(&[0, 1, 0])?, 2);

        let row = Layout::from_shape([2, 3, 4], MemoryOrder::RowMajor);
        assert_eq!(row.index_of(&[0, 0, 0])?, 0);
        assert_eq!(row.index_of(&[0, 0, 1])?, 1);
        assert_eq!(row.index_of(&[0, 0, 2])?, 2);
        assert_eq!(row.index_of(&[0, 1, 0])?, 4);
        Ok(())
    }

    #[test]
    fn test_index_bijection() -> Result<(), Box<dyn Error>> {
        fastrand::seed(42);
        for _ in 0..16 {
            let rank = fastrand::usize(1..5);
            let shape = (0..rank).map(|_| fastrand::usize(1..5)).collect_vec();
            for order in [MemoryOrder::RowMajor, MemoryOrder::ColumnMajor] {
                let layout = Layout::from_shape(shape.clone(), order);
                let mut offsets: Vec<usize> =
                    indices(&shape).map(|i| layout.index_of(&i)).try_collect()?;
                offsets.sort_unstable();
                assert_eq!(offsets, (0..layout.size()).collect_vec());

                for linear in 0..layout.size() {
                    let index = layout.unravel(linear, order)?;
                    assert_eq!(layout.index_of(&index)?, linear);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_index_errors() {
        let layout = Layout::from_shape([2, 3], MemoryOrder::RowMajor);
        assert_eq!(
            layout.index_of(&[0, 3]),
            Err(LayoutError::OutOfRange {
                axis: 1,
                index: 3,
                extent: 3
            })
        );
        assert_eq!(
            layout.index_of(&[0]),
            Err(LayoutError::Rank {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_slice() -> Result<(), Box<dyn Error>> {
        let layout = Layout::from_shape([4, 5, 6], MemoryOrder::RowMajor);
        let view = layout.slice(&Slice::from((1..3, 2, ..)))?;
        assert_eq!(view.shape().as_slice(), &[2, 6]);
        assert_eq!(view.strides().as_slice(), &[30, 1]);
        assert_eq!(view.offset(), 30 + 2 * 6);

        // every element of the view addresses the same memory as in the source
        for index in indices(view.shape()) {
            let source = [index[0] + 1, 2, index[1]];
            assert_eq!(view.index_of(&index)?, layout.index_of(&source)?);
        }

        // trailing axes default to full
        let view = layout.slice(&Slice::from(Axis::Range(0, 2)))?;
        assert_eq!(view.shape().as_slice(), &[2, 5, 6]);
        Ok(())
    }

    #[test]
    fn test_slice_errors() {
        let layout = Layout::from_shape([4, 5], MemoryOrder::ColumnMajor);
        assert!(matches!(
            layout.slice(&Slice::from((3..2, ..))),
            Err(LayoutError::Range {
                axis: 0,
                start: 3,
                end: 2,
                ..
            })
        ));
        assert!(matches!(
            layout.slice(&Slice::from((.., 0..6))),
            Err(LayoutError::Range { axis: 1, .. })
        ));
        assert!(matches!(
            layout.slice(&Slice::from((4, ..))),
            Err(LayoutError::OutOfRange { axis: 0, .. })
        ));
        assert!(matches!(
            layout.slice(&Slice::from((.., .., 0))),
            Err(LayoutError::InvalidView(_))
        ));
        assert!(matches!(
            layout.slice(&Slice::from((0..=usize::MAX, ..))),
            Err(LayoutError::Range {
                axis: 0,
                end: usize::MAX,
                ..
            })
        ));
        assert!(matches!(
            layout.slice(&Slice::from((.., ..=usize::MAX))),
            Err(LayoutError::Range { axis: 1, .. })
        ));
    }

    #[test]
    fn test_reversed() -> Result<(), Box<dyn Error>> {
        let column = Layout::from_shape([2, 3, 4], MemoryOrder::ColumnMajor)
            .slice(&Slice::from((.., 1..3, 1..4)))?;
        let row = column.reversed();
        assert!(row.is_contiguous(MemoryOrder::RowMajor) == column.is_contiguous(MemoryOrder::ColumnMajor));
        for index in indices(column.shape()) {
            let reversed = index.iter().rev().copied().collect_vec();
            assert_eq!(row.index_of(&reversed)?, column.index_of(&index)?);
        }
        Ok(())
    }

    #[test]
    fn test_runs() -> Result<(), Box<dyn Error>> {
        let layout = Layout::from_shape([4, 5, 6], MemoryOrder::RowMajor);
        assert_eq!(layout.runs(MemoryOrder::RowMajor).collect_vec(), vec![(0, 120)]);

        let view = layout.slice(&Slice::from((1..3, .., 2..5)))?;
        let runs = view.runs(MemoryOrder::RowMajor).collect_vec();
        assert_eq!(runs.len(), 10);
        assert_eq!(runs[0], (32, 3));
        assert_eq!(runs[1], (38, 3));

        // a column slice of a row-major matrix is made of single elements
        let column = Layout::from_shape([3, 4], MemoryOrder::RowMajor).slice(&Slice::from((.., 1)))?;
        assert_eq!(
            column.runs(MemoryOrder::RowMajor).collect_vec(),
            vec![(1, 1), (5, 1), (9, 1)]
        );

        // runs enumerate elements in the same order as `unravel`
        let column = Layout::from_shape([3, 4, 2], MemoryOrder::ColumnMajor)
            .slice(&Slice::from((1..3, .., 1)))?;
        let offsets = column
            .runs(MemoryOrder::ColumnMajor)
            .flat_map(|(offset, len)| offset..offset + len)
            .collect_vec();
        let expected: Vec<usize> = (0..column.size())
            .map(|linear| column.index_of(&column.unravel(linear, MemoryOrder::ColumnMajor)?))
            .try_collect()?;
        assert_eq!(offsets, expected);

        let empty = layout.slice(&Slice::from((2..2, ..)))?;
        assert_eq!(empty.runs(MemoryOrder::RowMajor).count(), 0);
        Ok(())
    }

    #[test]
    fn test_span() -> Result<(), Box<dyn Error>> {
        let layout = Layout::from_parts([3, 2], vec![-2isize, 1], 4)?;
        assert_eq!(layout.span(), Some((0, 5)));
        let layout = Layout::from_shape([3, 0], MemoryOrder::RowMajor);
        assert_eq!(layout.span(), None);
        let layout = Layout::from_parts([2, 3], vec![isize::MAX, isize::MIN], 1)?;
        assert_eq!(layout.span(), Some((isize::MIN + 1, isize::MAX)));
        Ok(())
    }

    #[test]
    fn test_huge_shapes() {
        let layout = Layout::from_shape([1usize << 40, 1 << 40], MemoryOrder::RowMajor);
        assert_eq!(layout.shape().checked_size(), None);
        assert_eq!(layout.size(), usize::MAX);
        assert_eq!(layout.strides().as_slice(), &[1 << 40, 1]);
        assert!(matches!(layout.byte_size(4), Err(LayoutError::TooLarge(_, 4))));

        let layout = Layout::from_shape([usize::MAX, 4, 2], MemoryOrder::ColumnMajor);
        assert_eq!(layout.strides().as_slice(), &[1, isize::MAX, isize::MAX]);

        let layout = Layout::from_shape([(1usize << 62) + 1, 4], MemoryOrder::RowMajor);
        assert_eq!(layout.shape().checked_size(), None);
        assert!(layout.byte_size(4).is_err());

        let layout = Layout::from_shape([usize::MAX / 2], MemoryOrder::RowMajor);
        assert_eq!(layout.byte_size(1).ok(), Some(usize::MAX / 2));
        assert!(layout.byte_size(4).is_err());

        let layout = Layout::from_shape([0usize, 1 << 40, 1 << 40], MemoryOrder::RowMajor);
        assert_eq!(layout.shape().checked_size(), Some(0));
        assert_eq!(layout.byte_size(8).ok(), Some(0));
        assert_eq!(layout.span(), None);
    }

    #[test]
    fn test_permute() -> Result<(), Box<dyn Error>> {
        let layout = Layout::from_shape([2, 3, 4], MemoryOrder::RowMajor);
        let permuted = layout.permute(&[2, 0, 1])?;
        assert_eq!(permuted.shape().as_slice(), &[4, 2, 3]);
        assert_eq!(permuted.strides().as_slice(), &[1, 12, 4]);
        assert!(!permuted.is_contiguous(MemoryOrder::RowMajor));
        assert!(layout.permute(&[0, 0, 1]).is_err());
        Ok(())
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde() -> Result<(), Box<dyn Error>> {
        let layout = Layout::from_shape([2, 3], MemoryOrder::ColumnMajor);
        let json = serde_json::to_string(&layout)?;
        assert_eq!(serde_json::from_str::<Layout>(&json)?, layout);
        Ok(())
    }
}
