use std::{
    ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive},
    sync::Arc,
};

use casey::snake;
use derive_more::{Deref, DerefMut, Display, From, Into};
use itertools::Itertools;

/// Selection along one axis of a tensor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    /// The whole axis.
    #[default]
    #[display("..")]
    Full,
    /// A single index. The axis is dropped from the result.
    #[display("{_0}")]
    One(usize),
    /// Half-open range `start..end`.
    #[display("{_0}..{_1}")]
    Range(usize, usize),
    /// Half-open range `start..`.
    #[display("{_0}..")]
    From(usize),
}

/// An [`Axis`] resolved against the extent of the axis it selects from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Fixed(usize),
    Range(usize, usize),
}

impl Axis {
    #[inline]
    pub fn resolve(self, extent: usize) -> Resolved {
        match self {
            Axis::Full => Resolved::Range(0, extent),
            Axis::One(index) => Resolved::Fixed(index),
            Axis::Range(start, end) => Resolved::Range(start, end),
            Axis::From(start) => Resolved::Range(start, extent),
        }
    }
}

impl From<usize> for Axis {
    #[inline]
    fn from(value: usize) -> Self {
        Self::One(value)
    }
}

impl From<RangeFull> for Axis {
    #[inline]
    fn from(_: RangeFull) -> Self {
        Self::Full
    }
}

impl From<Range<usize>> for Axis {
    #[inline]
    fn from(value: Range<usize>) -> Self {
        Self::Range(value.start, value.end)
    }
}

impl From<RangeInclusive<usize>> for Axis {
    #[inline]
    fn from(value: RangeInclusive<usize>) -> Self {
        Self::Range(*value.start(), value.end().saturating_add(1))
    }
}

impl From<RangeFrom<usize>> for Axis {
    #[inline]
    fn from(value: RangeFrom<usize>) -> Self {
        Self::From(value.start)
    }
}

impl From<RangeTo<usize>> for Axis {
    #[inline]
    fn from(value: RangeTo<usize>) -> Self {
        Self::Range(0, value.end)
    }
}

impl From<RangeToInclusive<usize>> for Axis {
    #[inline]
    fn from(value: RangeToInclusive<usize>) -> Self {
        Self::Range(0, value.end.saturating_add(1))
    }
}

/// Per-axis selection. Axes beyond its length are taken in full.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Deref, DerefMut, From, Into, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("[{}]", _0.iter().format(", "))]
pub struct Slice(Arc<[Axis]>);

impl From<Vec<Axis>> for Slice {
    #[inline]
    fn from(value: Vec<Axis>) -> Self {
        Self(value.into())
    }
}

impl From<&[Axis]> for Slice {
    #[inline]
    fn from(value: &[Axis]) -> Self {
        Self(value.into())
    }
}

macro_rules! impl_slice_from {
    ($t:ident) => {
        impl<$t: Into<Axis>> From<$t> for Slice {
            #[inline]
            fn from(snake!($t): $t) -> Self {
                Self([snake!($t).into()].into())
            }
        }
    };
    ($($t:ident),+) => {
        impl<$($t),+> From<($($t),+)> for Slice
        where
            $($t: Into<Axis>),+
        {
            #[inline]
            fn from(($(snake!($t)),+): ($($t),+)) -> Self {
                Self([$(snake!($t).into()),+].into())
            }
        }
    };
}

impl_slice_from!(T0);
impl_slice_from!(T0, T1);
impl_slice_from!(T0, T1, T2);
impl_slice_from!(T0, T1, T2, T3);
impl_slice_from!(T0, T1, T2, T3, T4);
impl_slice_from!(T0, T1, T2, T3, T4, T5);
impl_slice_from!(T0, T1, T2, T3, T4, T5, T6);
impl_slice_from!(T0, T1, T2, T3, T4, T5, T6, T7);

impl Slice {
    /// Creates a slice that takes every axis of a rank-`len` tensor in full.
    #[inline]
    pub fn full(len: usize) -> Self {
        Self::from(vec![Axis::Full; len])
    }

    /// Returns `true` if the slice contains only full axes.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.iter().all(|&axis| matches!(axis, Axis::Full))
    }
}
