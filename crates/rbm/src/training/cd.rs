//! Manual contrastive-divergence (CD-k) parameter update.
//!
//! This is the non-gradient training path: deltas are computed from a
//! positive phase on the data and a negative phase on a Gibbs sample, then
//! added to the parameters. Do not combine it with an optimizer step on the
//! free-energy cost in the same iteration, or the parameters move twice.

use burn::module::Param;
use burn::prelude::*;

use crate::error::RbmError;
use crate::model::rbm::{sample, Rbm};

/// Deltas of one CD-k step and the samples they were computed from.
#[derive(Debug, Clone)]
pub struct CdUpdate<B: Backend> {
    /// ΔW, shape (visible_dim, hidden_dim).
    pub weights: Tensor<B, 2>,
    /// Δbv, shape (visible_dim,).
    pub visible_bias: Tensor<B, 1>,
    /// Δbh, shape (hidden_dim,).
    pub hidden_bias: Tensor<B, 1>,
    /// Visible sample at the end of the Gibbs chain.
    pub x_sample: Tensor<B, 2>,
    /// Hidden sample driven by the data.
    pub hidden: Tensor<B, 2>,
    /// Hidden sample driven by `x_sample`.
    pub hidden_sample: Tensor<B, 2>,
}

impl<B: Backend> CdUpdate<B> {
    /// Frobenius norm of ΔW.
    pub fn weight_delta_norm(&self) -> f64 {
        self.weights
            .clone()
            .powf_scalar(2.0)
            .sum()
            .sqrt()
            .into_scalar()
            .elem()
    }
}

/// `param + delta` as a fresh leaf under the same id, keeping whether the
/// parameter was tracked by autodiff.
fn shifted<B: Backend, const D: usize>(
    param: &Param<Tensor<B, D>>,
    delta: Tensor<B, D>,
) -> Param<Tensor<B, D>> {
    let value = param.val();
    let tracked = value.is_require_grad();
    let updated = (value.detach() + delta).detach().set_require_grad(tracked);
    Param::initialized(param.id, updated)
}

impl<B: Backend> Rbm<B> {
    /// Compute CD-k deltas for a batch without touching the parameters.
    ///
    /// ```text
    /// x_sample = gibbs_sample(x)
    /// h        = sample(sigmoid(x·W + bh))
    /// h_sample = sample(sigmoid(x_sample·W + bh))
    /// scale    = lr / batch_size
    /// ΔW  = scale · (xᵗh − x_sampleᵗh_sample)
    /// Δbv = scale · Σ_rows(x − x_sample)
    /// Δbh = scale · Σ_rows(h − h_sample)
    /// ```
    pub fn cd_deltas(&self, x: Tensor<B, 2>) -> Result<CdUpdate<B>, RbmError> {
        let batch_size = self.check_batch(&x, self.visible_dim())?;
        let x = x.detach();

        let x_sample = self.run_chain(x.clone());
        let hidden = sample(self.hidden_probabilities(x.clone())?);
        let hidden_sample = sample(self.hidden_probabilities(x_sample.clone())?);

        let scale = self.learning_rate() / batch_size as f64;

        let positive = x.clone().transpose().matmul(hidden.clone());
        let negative = x_sample.clone().transpose().matmul(hidden_sample.clone());
        let weights = (positive - negative).mul_scalar(scale);

        let visible_bias = (x - x_sample.clone())
            .sum_dim(0)
            .squeeze::<1>(0)
            .mul_scalar(scale);
        let hidden_bias = (hidden.clone() - hidden_sample.clone())
            .sum_dim(0)
            .squeeze::<1>(0)
            .mul_scalar(scale);

        Ok(CdUpdate {
            weights,
            visible_bias,
            hidden_bias,
            x_sample,
            hidden,
            hidden_sample,
        })
    }

    /// Add previously computed deltas to the parameters in place.
    ///
    /// Parameter ids and gradient tracking are preserved, so gradient lookups,
    /// optimizer state keyed by id and frozen (`no_grad`) parameters stay
    /// valid.
    pub fn apply_cd_update(&mut self, update: &CdUpdate<B>) {
        self.weights = shifted(&self.weights, update.weights.clone());
        self.visible_bias = shifted(&self.visible_bias, update.visible_bias.clone());
        self.hidden_bias = shifted(&self.hidden_bias, update.hidden_bias.clone());
    }

    /// One full CD-k step: compute the deltas for `x` and apply them.
    pub fn contrastive_divergence_update(
        &mut self,
        x: Tensor<B, 2>,
    ) -> Result<CdUpdate<B>, RbmError> {
        let [batch_size, _] = x.dims();
        let update = self.cd_deltas(x)?;
        self.apply_cd_update(&update);

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                batch_size,
                gibbs_steps = self.gibbs_steps(),
                weight_delta_norm = update.weight_delta_norm(),
                "Applied CD update"
            );
        }
        Ok(update)
    }
}
