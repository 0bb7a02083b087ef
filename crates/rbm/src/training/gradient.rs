//! Gradient-based training path: one optimizer step on the free-energy cost.
//!
//! The Gibbs chain inside [`Rbm::free_energy_cost`] is detached, so the
//! gradients collected here are the CD-k gradients with respect to `W`, `bv`
//! and `bh` only.

use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::RbmError;
use crate::model::rbm::Rbm;

/// Free-energy cost of a batch together with its parameter gradients.
pub struct CostGradients {
    /// Scalar cost value.
    pub cost: f64,
    /// Gradients keyed by parameter id.
    pub grads: GradientsParams,
}

/// Evaluate the free-energy cost on `x` and backpropagate it.
pub fn cost_gradients<B: AutodiffBackend>(
    model: &Rbm<B>,
    x: Tensor<B, 2>,
) -> Result<CostGradients, RbmError> {
    let cost = model.free_energy_cost(x)?;
    let cost_value: f64 = cost.clone().into_scalar().elem();
    let grads = GradientsParams::from_grads(cost.backward(), model);
    Ok(CostGradients {
        cost: cost_value,
        grads,
    })
}

/// One optimizer step on the free-energy cost of `x`.
///
/// The model is always handed back; on error it is unchanged.
pub fn gradient_step<B, O>(
    model: Rbm<B>,
    optimizer: &mut O,
    x: Tensor<B, 2>,
    lr: f64,
) -> (Rbm<B>, Result<f64, RbmError>)
where
    B: AutodiffBackend,
    O: Optimizer<Rbm<B>, B>,
{
    match cost_gradients(&model, x) {
        Ok(CostGradients { cost, grads }) => {
            let model = optimizer.step(lr, model, grads);
            tracing::debug!(cost, lr, "Applied gradient step");
            (model, Ok(cost))
        }
        Err(e) => (model, Err(e)),
    }
}
