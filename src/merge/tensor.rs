//! In-memory tensors for state-dict merging.
//!
//! Floating-point tensors (F32, F16, BF16) are decoded to `f32` values so that
//! blending is plain arithmetic; the storage dtype is kept alongside and the
//! values are always representable in it. Any other element type is carried as
//! opaque little-endian bytes that can be copied but not blended.

use std::borrow::Cow;

use half::{bf16, f16};
use safetensors::Dtype;
use safetensors::tensor::View;

use crate::merge::MergeError;

/// Element storage of a [`Tensor`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Decoded float values (row-major).
    Float(Vec<f32>),
    /// Raw little-endian bytes of a non-float tensor.
    Opaque(Vec<u8>),
}

/// A named parameter's value: element type, shape, and data.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    dtype: Dtype,
    shape: Vec<usize>,
    payload: Payload,
}

/// Whether `dtype` is one of the float types the merger can blend.
pub fn is_float_dtype(dtype: Dtype) -> bool {
    matches!(dtype, Dtype::F32 | Dtype::F16 | Dtype::BF16)
}

/// Result dtype of blending two float tensors.
///
/// Equal dtypes are preserved; any mix is widened to F32.
pub fn promote(a: Dtype, b: Dtype) -> Dtype {
    if a == b { a } else { Dtype::F32 }
}

impl Tensor {
    /// Build an F32 tensor.
    ///
    /// # Panics
    /// Panics if `values.len()` does not match the element count of `shape`.
    pub fn from_f32(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self::from_values(Dtype::F32, shape, values)
    }

    /// Build a float tensor of the given dtype, rounding `values` into it.
    ///
    /// # Panics
    /// Panics if `dtype` is not a float dtype or the value count does not match
    /// `shape`. Both are programming errors at call sites.
    pub fn from_values(dtype: Dtype, shape: Vec<usize>, values: Vec<f32>) -> Self {
        assert!(is_float_dtype(dtype), "{dtype:?} is not a float dtype");
        assert_eq!(
            values.len(),
            shape.iter().product::<usize>(),
            "value count does not match shape {shape:?}"
        );
        let values = quantize(dtype, values);
        Self {
            dtype,
            shape,
            payload: Payload::Float(values),
        }
    }

    /// Decode a tensor from its little-endian byte representation.
    pub fn from_bytes(
        key: &str,
        dtype: Dtype,
        shape: Vec<usize>,
        bytes: &[u8],
    ) -> Result<Self, MergeError> {
        let numel: usize = shape.iter().product();
        let payload = match dtype {
            Dtype::F32 => Payload::Float(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            Dtype::F16 => Payload::Float(
                bytes
                    .chunks_exact(2)
                    .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
                    .collect(),
            ),
            Dtype::BF16 => Payload::Float(
                bytes
                    .chunks_exact(2)
                    .map(|c| bf16::from_le_bytes([c[0], c[1]]).to_f32())
                    .collect(),
            ),
            _ => Payload::Opaque(bytes.to_vec()),
        };

        if let Payload::Float(values) = &payload {
            if values.len() != numel || bytes.len() != numel * element_size(dtype) {
                return Err(MergeError::InvalidCheckpoint(format!(
                    "tensor '{key}' has {} bytes, expected {numel} {dtype:?} elements for shape {shape:?}",
                    bytes.len()
                )));
            }
        }

        Ok(Self { dtype, shape, payload })
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Decoded values, for float tensors.
    pub fn values(&self) -> Option<&[f32]> {
        match &self.payload {
            Payload::Float(values) => Some(values),
            Payload::Opaque(_) => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self.payload, Payload::Float(_))
    }

    /// Encode to little-endian bytes in the tensor's dtype.
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        match &self.payload {
            Payload::Opaque(bytes) => Cow::Borrowed(bytes),
            Payload::Float(values) => Cow::Owned(match self.dtype {
                Dtype::F16 => values
                    .iter()
                    .flat_map(|&v| f16::from_f32(v).to_le_bytes())
                    .collect(),
                Dtype::BF16 => values
                    .iter()
                    .flat_map(|&v| bf16::from_f32(v).to_le_bytes())
                    .collect(),
                _ => values.iter().flat_map(|&v| v.to_le_bytes()).collect(),
            }),
        }
    }

    /// `(1 − alpha)·self + alpha·other`, element-wise.
    ///
    /// `alpha` is not clamped: values outside `[0, 1]` extrapolate along the
    /// line through both tensors. `key` is only used for error reporting.
    pub fn blend(&self, other: &Tensor, alpha: f64, key: &str) -> Result<Tensor, MergeError> {
        if self.shape != other.shape {
            return Err(MergeError::ShapeMismatch {
                key: key.to_string(),
                expected: self.shape.clone(),
                actual: other.shape.clone(),
            });
        }

        match (&self.payload, &other.payload) {
            (Payload::Float(a), Payload::Float(b)) => {
                let keep = 1.0 - alpha;
                let values = a
                    .iter()
                    .zip(b)
                    .map(|(&x, &y)| (keep * f64::from(x) + alpha * f64::from(y)) as f32)
                    .collect();
                Ok(Tensor::from_values(
                    promote(self.dtype, other.dtype),
                    self.shape.clone(),
                    values,
                ))
            }
            // Identical non-float payloads blend to themselves.
            (Payload::Opaque(a), Payload::Opaque(b)) if self.dtype == other.dtype && a == b => {
                Ok(self.clone())
            }
            _ => Err(MergeError::UnsupportedDtype {
                key: key.to_string(),
                dtype_a: self.dtype,
                dtype_b: other.dtype,
            }),
        }
    }

    /// Downcast to F16. Non-float tensors are returned unchanged.
    pub fn to_half(&self) -> Tensor {
        match &self.payload {
            Payload::Float(values) => {
                Tensor::from_values(Dtype::F16, self.shape.clone(), values.clone())
            }
            Payload::Opaque(_) => self.clone(),
        }
    }
}

impl View for &Tensor {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        self.to_bytes()
    }

    fn data_len(&self) -> usize {
        match &self.payload {
            Payload::Opaque(bytes) => bytes.len(),
            Payload::Float(values) => values.len() * element_size(self.dtype),
        }
    }
}

fn element_size(dtype: Dtype) -> usize {
    match dtype {
        Dtype::F16 | Dtype::BF16 => 2,
        _ => 4,
    }
}

/// Round values so they are exactly representable in `dtype`.
fn quantize(dtype: Dtype, values: Vec<f32>) -> Vec<f32> {
    match dtype {
        Dtype::F16 => values.into_iter().map(|v| f16::from_f32(v).to_f32()).collect(),
        Dtype::BF16 => values.into_iter().map(|v| bf16::from_f32(v).to_f32()).collect(),
        _ => values,
    }
}
