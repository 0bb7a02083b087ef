use burn::module::Param;
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use burn::tensor::Distribution;

use crate::error::RbmError;

/// Configuration for a Bernoulli-Bernoulli RBM.
///
/// ```text
/// visible (batch, visible_dim) ──W (visible_dim, hidden_dim)──> hidden (batch, hidden_dim)
///   p(h=1 | v) = sigmoid(v·W + bh)
///   p(v=1 | h) = sigmoid(h·Wᵗ + bv)
/// ```
#[derive(Config, Debug)]
pub struct RbmConfig {
    /// Number of visible units.
    pub visible_dim: usize,
    /// Number of hidden units.
    pub hidden_dim: usize,
    /// Up-down Gibbs steps per chain (k in CD-k).
    #[config(default = 1)]
    pub gibbs_steps: usize,
    /// Learning rate of the manual contrastive-divergence update.
    #[config(default = 0.01)]
    pub learning_rate: f64,
    /// When false, the hidden output of `forward` is detached so a downstream
    /// loss cannot reach `W` or `bh`.
    #[config(default = true)]
    pub supervised: bool,
    /// Weights are drawn from `uniform(-init_scale, init_scale)`.
    #[config(default = 0.1)]
    pub init_scale: f64,
}

impl RbmConfig {
    /// Check the construction preconditions.
    pub fn validate(&self) -> Result<(), RbmError> {
        if self.visible_dim == 0 {
            return Err(RbmError::InvalidConfiguration(
                "visible_dim must be > 0".into(),
            ));
        }
        if self.hidden_dim == 0 {
            return Err(RbmError::InvalidConfiguration(
                "hidden_dim must be > 0".into(),
            ));
        }
        if self.gibbs_steps == 0 {
            return Err(RbmError::InvalidConfiguration(
                "gibbs_steps must be >= 1".into(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RbmError::InvalidConfiguration(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.init_scale.is_finite() && self.init_scale > 0.0) {
            return Err(RbmError::InvalidConfiguration(format!(
                "init_scale must be finite and > 0, got {}",
                self.init_scale
            )));
        }
        Ok(())
    }

    /// Initialize an RBM: uniform weights, zero biases.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Rbm<B>, RbmError> {
        self.validate()?;
        let weights = Tensor::random(
            [self.visible_dim, self.hidden_dim],
            Distribution::Uniform(-self.init_scale, self.init_scale),
            device,
        );
        let visible_bias = Tensor::zeros([self.visible_dim], device);
        let hidden_bias = Tensor::zeros([self.hidden_dim], device);

        tracing::info!(
            visible_dim = self.visible_dim,
            hidden_dim = self.hidden_dim,
            gibbs_steps = self.gibbs_steps,
            learning_rate = self.learning_rate,
            supervised = self.supervised,
            "Initialized RBM"
        );
        Ok(self.assemble(weights, visible_bias, hidden_bias))
    }

    /// Build an RBM from existing parameter tensors.
    ///
    /// Shapes must be `(visible_dim, hidden_dim)`, `(visible_dim,)` and
    /// `(hidden_dim,)`.
    pub fn init_with<B: Backend>(
        &self,
        weights: Tensor<B, 2>,
        visible_bias: Tensor<B, 1>,
        hidden_bias: Tensor<B, 1>,
    ) -> Result<Rbm<B>, RbmError> {
        self.validate()?;
        let [rows, cols] = weights.dims();
        if rows != self.visible_dim {
            return Err(RbmError::ShapeMismatch {
                expected: self.visible_dim,
                actual: rows,
            });
        }
        if cols != self.hidden_dim {
            return Err(RbmError::ShapeMismatch {
                expected: self.hidden_dim,
                actual: cols,
            });
        }
        let [bv_len] = visible_bias.dims();
        if bv_len != self.visible_dim {
            return Err(RbmError::ShapeMismatch {
                expected: self.visible_dim,
                actual: bv_len,
            });
        }
        let [bh_len] = hidden_bias.dims();
        if bh_len != self.hidden_dim {
            return Err(RbmError::ShapeMismatch {
                expected: self.hidden_dim,
                actual: bh_len,
            });
        }
        Ok(self.assemble(weights, visible_bias, hidden_bias))
    }

    fn assemble<B: Backend>(
        &self,
        weights: Tensor<B, 2>,
        visible_bias: Tensor<B, 1>,
        hidden_bias: Tensor<B, 1>,
    ) -> Rbm<B> {
        Rbm {
            weights: Param::from_tensor(weights),
            visible_bias: Param::from_tensor(visible_bias),
            hidden_bias: Param::from_tensor(hidden_bias),
            visible_dim: self.visible_dim,
            hidden_dim: self.hidden_dim,
            gibbs_steps: self.gibbs_steps,
            learning_rate: self.learning_rate,
            supervised: self.supervised,
        }
    }
}

/// Output of [`Rbm::forward`].
#[derive(Debug, Clone)]
pub struct RbmOutput<B: Backend> {
    /// Free-energy contrastive cost, shape `(1,)`.
    pub cost: Tensor<B, 1>,
    /// Hidden activation probabilities, shape `(batch, hidden_dim)`.
    pub hidden: Tensor<B, 2>,
}

/// Restricted Boltzmann Machine with binary visible and hidden units.
///
/// Parameters are trained either by an external optimizer on
/// [`Rbm::free_energy_cost`] or by the manual CD rule in
/// [`crate::training::cd`]; a training regime should use exactly one.
#[derive(Module, Debug)]
pub struct Rbm<B: Backend> {
    /// Weight matrix, shape (visible_dim, hidden_dim).
    pub(crate) weights: Param<Tensor<B, 2>>,
    /// Visible bias, shape (visible_dim,).
    pub(crate) visible_bias: Param<Tensor<B, 1>>,
    /// Hidden bias, shape (hidden_dim,).
    pub(crate) hidden_bias: Param<Tensor<B, 1>>,
    visible_dim: usize,
    hidden_dim: usize,
    gibbs_steps: usize,
    learning_rate: f64,
    supervised: bool,
}

/// Stochastic binarization: 1 where `p + u >= 1` for `u ~ uniform[0, 1)`.
///
/// Equivalent to `floor(p + u)` for `p` in `[0, 1]`. The result is a
/// constant with respect to differentiation.
pub fn sample<B: Backend, const D: usize>(probabilities: Tensor<B, D>) -> Tensor<B, D> {
    let probabilities = probabilities.detach();
    let noise = Tensor::random(
        probabilities.shape(),
        Distribution::Uniform(0.0, 1.0),
        &probabilities.device(),
    );
    (probabilities + noise).greater_equal_elem(1.0).float()
}

/// `input·weights + bias`, with the bias broadcast over rows.
fn propagate<B: Backend>(
    input: Tensor<B, 2>,
    weights: Tensor<B, 2>,
    bias: Tensor<B, 1>,
) -> Tensor<B, 2> {
    input.matmul(weights) + bias.unsqueeze_dim::<2>(0)
}

/// `ln(1 + exp(z))` without overflow for large `|z|`.
fn softplus<B: Backend, const D: usize>(z: Tensor<B, D>) -> Tensor<B, D> {
    z.clone().clamp_min(0.0) + z.abs().neg().exp().log1p()
}

fn ensure_finite<B: Backend>(values: &Tensor<B, 1>, what: &str) -> Result<(), RbmError> {
    let data = values.to_data();
    let bad = data.iter::<f64>().filter(|v| !v.is_finite()).count();
    if bad == 0 {
        Ok(())
    } else {
        Err(RbmError::NumericInstability(format!(
            "{what} is not finite in {bad} of {} rows",
            data.num_elements()
        )))
    }
}

impl<B: Backend> Rbm<B> {
    pub fn visible_dim(&self) -> usize {
        self.visible_dim
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    pub fn gibbs_steps(&self) -> usize {
        self.gibbs_steps
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn is_supervised(&self) -> bool {
        self.supervised
    }

    /// Weight parameter, shape (visible_dim, hidden_dim).
    pub fn weights(&self) -> &Param<Tensor<B, 2>> {
        &self.weights
    }

    /// Visible bias parameter, shape (visible_dim,).
    pub fn visible_bias(&self) -> &Param<Tensor<B, 1>> {
        &self.visible_bias
    }

    /// Hidden bias parameter, shape (hidden_dim,).
    pub fn hidden_bias(&self) -> &Param<Tensor<B, 1>> {
        &self.hidden_bias
    }

    /// Validate a batch against an expected width; returns the row count.
    pub(crate) fn check_batch(&self, x: &Tensor<B, 2>, width: usize) -> Result<usize, RbmError> {
        let [rows, cols] = x.dims();
        if cols != width {
            return Err(RbmError::ShapeMismatch {
                expected: width,
                actual: cols,
            });
        }
        if rows == 0 {
            return Err(RbmError::EmptyBatch);
        }
        Ok(rows)
    }

    /// `p(h = 1 | x) = sigmoid(x·W + bh)`, shape `(batch, hidden_dim)`.
    pub fn hidden_probabilities(&self, x: Tensor<B, 2>) -> Result<Tensor<B, 2>, RbmError> {
        self.check_batch(&x, self.visible_dim)?;
        Ok(sigmoid(propagate(x, self.weights.val(), self.hidden_bias.val())))
    }

    /// `p(v = 1 | h) = sigmoid(h·Wᵗ + bv)`, shape `(batch, visible_dim)`.
    pub fn visible_probabilities(&self, h: Tensor<B, 2>) -> Result<Tensor<B, 2>, RbmError> {
        self.check_batch(&h, self.hidden_dim)?;
        Ok(sigmoid(propagate(
            h,
            self.weights.val().transpose(),
            self.visible_bias.val(),
        )))
    }

    /// Mean-field reconstruction: visible probabilities given the hidden
    /// probabilities of `x`.
    pub fn reconstruct(&self, x: Tensor<B, 2>) -> Result<Tensor<B, 2>, RbmError> {
        let hidden = self.hidden_probabilities(x)?;
        self.visible_probabilities(hidden)
    }

    /// One up-down Gibbs step. Returns `(hidden_sample, visible_sample)`.
    pub fn gibbs_step(&self, x: Tensor<B, 2>) -> Result<(Tensor<B, 2>, Tensor<B, 2>), RbmError> {
        self.check_batch(&x, self.visible_dim)?;
        let hk = sample(self.hidden_probabilities(x)?);
        let xk = sample(self.visible_probabilities(hk.clone())?);
        Ok((hk, xk))
    }

    /// Run a `gibbs_steps`-long chain from `x` and return the final visible
    /// sample, shape `(batch, visible_dim)`, detached from the graph.
    pub fn gibbs_sample(&self, x: Tensor<B, 2>) -> Result<Tensor<B, 2>, RbmError> {
        self.check_batch(&x, self.visible_dim)?;
        Ok(self.run_chain(x))
    }

    /// Chain body. Parameters are detached so no gradient path through the
    /// sampling loop exists.
    pub(crate) fn run_chain(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let weights = self.weights.val().detach();
        let weights_t = weights.clone().transpose();
        let visible_bias = self.visible_bias.val().detach();
        let hidden_bias = self.hidden_bias.val().detach();

        let mut xk = x.detach();
        for _ in 0..self.gibbs_steps {
            let hk = sample(sigmoid(propagate(xk, weights.clone(), hidden_bias.clone())));
            xk = sample(sigmoid(propagate(hk, weights_t.clone(), visible_bias.clone())));
        }
        xk
    }

    /// Free energy per row:
    /// `F(x) = -x·bv - Σ_j softplus((x·W + bh)_j)`, shape `(batch,)`.
    pub fn free_energy(&self, x: Tensor<B, 2>) -> Result<Tensor<B, 1>, RbmError> {
        self.check_batch(&x, self.visible_dim)?;
        let energy = self.free_energy_unchecked(x);
        ensure_finite(&energy, "free energy")?;
        Ok(energy)
    }

    fn free_energy_unchecked(&self, x: Tensor<B, 2>) -> Tensor<B, 1> {
        let visible_term: Tensor<B, 1> = x
            .clone()
            .matmul(self.visible_bias.val().unsqueeze_dim::<2>(1)) // (batch, 1)
            .squeeze::<1>(1);
        let hidden_term: Tensor<B, 1> =
            softplus(propagate(x, self.weights.val(), self.hidden_bias.val()))
                .sum_dim(1)
                .squeeze::<1>(1);
        visible_term.neg() - hidden_term
    }

    /// Contrastive free-energy cost `mean(F(x)) - mean(F(x_sample))` for a
    /// caller-supplied negative sample, shape `(1,)`.
    ///
    /// `x_sample` is detached before use, so it may come from any chain
    /// (e.g. a persistent one) and may have a different number of rows.
    pub fn contrastive_cost(
        &self,
        x: Tensor<B, 2>,
        x_sample: Tensor<B, 2>,
    ) -> Result<Tensor<B, 1>, RbmError> {
        self.check_batch(&x, self.visible_dim)?;
        self.check_batch(&x_sample, self.visible_dim)?;

        let data_energy = self.free_energy_unchecked(x);
        ensure_finite(&data_energy, "data free energy")?;
        let sample_energy = self.free_energy_unchecked(x_sample.detach());
        ensure_finite(&sample_energy, "sample free energy")?;

        Ok(data_energy.mean() - sample_energy.mean())
    }

    /// CD-k surrogate loss: `mean(F(x) - F(gibbs_sample(x)))`, shape `(1,)`.
    ///
    /// Its gradient with respect to the parameters approximates the CD-k
    /// gradient.
    pub fn free_energy_cost(&self, x: Tensor<B, 2>) -> Result<Tensor<B, 1>, RbmError> {
        self.check_batch(&x, self.visible_dim)?;
        let x_sample = self.run_chain(x.clone());
        self.contrastive_cost(x, x_sample)
    }

    /// Training cost plus hidden activations for a downstream task.
    ///
    /// In unsupervised mode the activations are detached, so only the
    /// cost shapes `W` and `bh`.
    pub fn forward(&self, x: Tensor<B, 2>) -> Result<RbmOutput<B>, RbmError> {
        let cost = self.free_energy_cost(x.clone())?;
        let hidden = self.hidden_probabilities(x)?;
        let hidden = if self.supervised {
            hidden
        } else {
            hidden.detach()
        };
        Ok(RbmOutput { cost, hidden })
    }
}
