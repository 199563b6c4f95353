use bytemuck::Pod;
use derive_more::Display;
use half::f16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    F32,
    F64,
    F16,
    U8,
    U16,
    U32,
    I32,
}

impl DataType {
    /// Returns the size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::F64 => 8,
            DataType::F16 => 2,
            DataType::U8 => 1,
            DataType::U16 => 2,
            DataType::U32 => 4,
            DataType::I32 => 4,
        }
    }
}

pub trait Zero {
    fn zero() -> Self;
}

macro_rules! impl_zero {
    ($ty:ty, $zero:expr) => {
        impl Zero for $ty {
            #[inline]
            fn zero() -> Self {
                $zero
            }
        }
    };
}

impl_zero!(f32, 0.0);
impl_zero!(f64, 0.0);
impl_zero!(f16, f16::ZERO);
impl_zero!(u8, 0);
impl_zero!(u16, 0);
impl_zero!(u32, 0);
impl_zero!(i32, 0);

/// An element type that can live in a tensor buffer and be moved as plain bytes.
pub trait Scalar: Sized + Pod + Zero + std::fmt::Debug + PartialEq + Send + Sync {
    const DATA_TYPE: DataType;
}

impl Scalar for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Scalar for f64 {
    const DATA_TYPE: DataType = DataType::F64;
}

impl Scalar for f16 {
    const DATA_TYPE: DataType = DataType::F16;
}

impl Scalar for u8 {
    const DATA_TYPE: DataType = DataType::U8;
}

impl Scalar for u16 {
    const DATA_TYPE: DataType = DataType::U16;
}

impl Scalar for u32 {
    const DATA_TYPE: DataType = DataType::U32;
}

impl Scalar for i32 {
    const DATA_TYPE: DataType = DataType::I32;
}
