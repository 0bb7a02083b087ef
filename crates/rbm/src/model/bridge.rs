//! Tensor bridge: conversions between plain `f32` rows and burn tensors.
//!
//! Data loaders hand the model `Vec<f32>` rows; the RBM works on
//! `Tensor<B, 2>` batches. Ragged or empty input is reported as an
//! [`RbmError`] instead of panicking.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::error::RbmError;

/// Convert a batch of rows to a burn 2D tensor of shape `(rows, dim)`.
pub fn rows_to_tensor<B: Backend>(
    rows: &[Vec<f32>],
    device: &B::Device,
) -> Result<Tensor<B, 2>, RbmError> {
    let first = rows.first().ok_or(RbmError::EmptyBatch)?;
    let dim = first.len();
    if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
        return Err(RbmError::ShapeMismatch {
            expected: dim,
            actual: bad.len(),
        });
    }

    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Ok(Tensor::from_data(TensorData::new(flat, [rows.len(), dim]), device))
}

/// Convert a 2D tensor back to rows of `f32`.
pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, dim] = tensor.dims();
    let flat: Vec<f32> = tensor.into_data().iter::<f32>().collect();
    if dim == 0 {
        return Vec::new();
    }
    flat.chunks(dim).map(|c| c.to_vec()).collect()
}

/// Extract f64 values from a burn 1D tensor (e.g. per-row free energies).
pub fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Vec<f64> {
    tensor.into_data().iter::<f64>().collect()
}

/// Extract a single f64 scalar, e.g. a cost of shape `(1,)`.
pub fn tensor_to_f64<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem()
}
