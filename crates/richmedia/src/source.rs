//! Adapters from external data sources into the canonical forms media
//! constructors work on: nested JSON values for tables and `NumericArray`
//! for videos.

use crate::result::{MediaError, MediaResult};
use ndarray::{ArrayBase, ArrayD, ArrayViewD, Data, Dimension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Array-like source convertible to a nested sequence of primitives
pub trait ArraySource {
    /// Nested `Value::Array`s, one level per dimension
    fn to_nested(&self) -> MediaResult<Value>;
}

impl<S, D> ArraySource for ArrayBase<S, D>
where
    S: Data,
    S::Elem: Serialize,
    D: Dimension,
{
    fn to_nested(&self) -> MediaResult<Value> {
        nest(&self.view().into_dyn())
    }
}

fn nest<A: Serialize>(view: &ArrayViewD<'_, A>) -> MediaResult<Value> {
    if view.ndim() == 0 {
        let scalar = view
            .iter()
            .next()
            .ok_or_else(|| MediaError::unsupported_input("empty zero-dimensional array"))?;
        return Ok(serde_json::to_value(scalar)?);
    }
    view.outer_iter()
        .map(|sub| nest(&sub))
        .collect::<MediaResult<Vec<_>>>()
        .map(Value::Array)
}

/// Data-frame-like source: column labels plus a row-major values matrix
pub trait FrameSource {
    /// Column labels in order
    fn column_labels(&self) -> Vec<Value>;
    /// Rows of cell values
    fn values(&self) -> Vec<Vec<Value>>;
}

/// Minimal in-memory data frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnFrame {
    columns: Vec<Value>,
    values: Vec<Vec<Value>>,
}

impl ColumnFrame {
    /// Frame from labels and row-major values
    #[must_use]
    pub fn new(columns: Vec<Value>, values: Vec<Vec<Value>>) -> Self {
        Self { columns, values }
    }

    /// Frame from `(label, column values)` pairs; columns must be equally long
    pub fn from_columns<I, L>(columns: I) -> MediaResult<Self>
    where
        I: IntoIterator<Item = (L, Vec<Value>)>,
        L: Into<Value>,
    {
        let (labels, data): (Vec<Value>, Vec<Vec<Value>>) = columns
            .into_iter()
            .map(|(label, values)| (label.into(), values))
            .unzip();

        let height = data.first().map_or(0, Vec::len);
        if let Some(bad) = data.iter().position(|col| col.len() != height) {
            return Err(MediaError::unsupported_input(format!(
                "column {} has {} values, expected {height}",
                labels[bad],
                data[bad].len()
            )));
        }

        let values = (0..height)
            .map(|row| data.iter().map(|col| col[row].clone()).collect())
            .collect();
        Ok(Self::new(labels, values))
    }
}

impl FrameSource for ColumnFrame {
    fn column_labels(&self) -> Vec<Value> {
        self.columns.clone()
    }

    fn values(&self) -> Vec<Vec<Value>> {
        self.values.clone()
    }
}

/// Canonical N-dimensional numeric array
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    /// 8-bit unsigned
    U8(ArrayD<u8>),
    /// 32-bit signed
    I32(ArrayD<i32>),
    /// 64-bit signed
    I64(ArrayD<i64>),
    /// 32-bit float
    F32(ArrayD<f32>),
    /// 64-bit float
    F64(ArrayD<f64>),
}

impl NumericArray {
    /// Array shape
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::U8(a) => a.shape(),
            Self::I32(a) => a.shape(),
            Self::I64(a) => a.shape(),
            Self::F32(a) => a.shape(),
            Self::F64(a) => a.shape(),
        }
    }

    /// Number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Cast to `u8` with `as` semantics: integers wrap, floats truncate
    /// toward zero and saturate. Values are never rescaled.
    #[must_use]
    pub fn to_u8(&self) -> ArrayD<u8> {
        match self {
            Self::U8(a) => a.clone(),
            Self::I32(a) => a.mapv(|v| v as u8),
            Self::I64(a) => a.mapv(|v| v as u8),
            Self::F32(a) => a.mapv(|v| v as u8),
            Self::F64(a) => a.mapv(|v| v as u8),
        }
    }
}

/// Element types `NumericArray` can hold
pub trait NumericElement: Copy {
    /// Wrap an array of this element type
    fn wrap(array: ArrayD<Self>) -> NumericArray;
}

macro_rules! numeric_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl NumericElement for $ty {
                fn wrap(array: ArrayD<Self>) -> NumericArray {
                    NumericArray::$variant(array)
                }
            }

            impl From<ArrayD<$ty>> for NumericArray {
                fn from(array: ArrayD<$ty>) -> Self {
                    Self::$variant(array)
                }
            }
        )*
    };
}

numeric_element!(u8 => U8, i32 => I32, i64 => I64, f32 => F32, f64 => F64);

/// Tensor-like value convertible to a plain numeric array
pub trait TensorLike {
    /// Copy out as a `NumericArray`
    fn to_numeric(&self) -> MediaResult<NumericArray>;
}

impl TensorLike for NumericArray {
    fn to_numeric(&self) -> MediaResult<NumericArray> {
        Ok(self.clone())
    }
}

impl<S, D> TensorLike for ArrayBase<S, D>
where
    S: Data,
    S::Elem: NumericElement,
    D: Dimension,
{
    fn to_numeric(&self) -> MediaResult<NumericArray> {
        Ok(NumericElement::wrap(self.to_owned().into_dyn()))
    }
}
