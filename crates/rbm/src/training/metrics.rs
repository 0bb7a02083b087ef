use burn::prelude::*;

use crate::error::RbmError;
use crate::model::rbm::Rbm;

/// RBM monitoring metrics for one batch, with health checks.
#[derive(Debug, Clone)]
pub struct RbmMetrics {
    /// Mean free energy of the data rows.
    pub data_free_energy: f64,
    /// Mean free energy of a Gibbs sample started at the data.
    pub sample_free_energy: f64,
    /// `sample_free_energy - data_free_energy`; positive once the model
    /// prefers the data over its own samples.
    pub free_energy_gap: f64,
    /// Mean squared error between the data and its mean-field reconstruction.
    pub reconstruction_error: f64,
    /// Mean hidden activation probability over the batch.
    pub hidden_activation_mean: f64,
}

impl RbmMetrics {
    /// Compute metrics for a batch. Does not modify the model.
    pub fn compute<B: Backend>(model: &Rbm<B>, x: Tensor<B, 2>) -> Result<Self, RbmError> {
        let x = x.detach();
        let x_sample = model.gibbs_sample(x.clone())?;

        let data_free_energy: f64 = model.free_energy(x.clone())?.mean().into_scalar().elem();
        let sample_free_energy: f64 = model.free_energy(x_sample)?.mean().into_scalar().elem();

        let reconstruction = model.reconstruct(x.clone())?;
        let reconstruction_error: f64 = (x.clone() - reconstruction)
            .powf_scalar(2.0)
            .mean()
            .into_scalar()
            .elem();

        let hidden_activation_mean: f64 =
            model.hidden_probabilities(x)?.mean().into_scalar().elem();

        Ok(Self {
            data_free_energy,
            sample_free_energy,
            free_energy_gap: sample_free_energy - data_free_energy,
            reconstruction_error,
            hidden_activation_mean,
        })
    }

    /// Log and return warnings for unhealthy training signals.
    pub fn health_check(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let values = [
            self.data_free_energy,
            self.sample_free_energy,
            self.reconstruction_error,
            self.hidden_activation_mean,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            warnings.push("non-finite metric value".to_string());
        }
        if self.hidden_activation_mean < 0.01 {
            warnings.push(format!(
                "hidden units saturated off (mean activation {:.4})",
                self.hidden_activation_mean
            ));
        } else if self.hidden_activation_mean > 0.99 {
            warnings.push(format!(
                "hidden units saturated on (mean activation {:.4})",
                self.hidden_activation_mean
            ));
        }

        for w in &warnings {
            tracing::warn!(
                data_free_energy = self.data_free_energy,
                reconstruction_error = self.reconstruction_error,
                "RBM health check: {w}"
            );
        }
        warnings
    }
}

/// Metrics recorded over a training run.
#[derive(Debug, Default)]
pub struct MetricsHistory {
    entries: Vec<RbmMetrics>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: RbmMetrics) {
        self.entries.push(metrics);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&RbmMetrics> {
        self.entries.last()
    }

    /// Lowest reconstruction error seen so far.
    pub fn best_reconstruction_error(&self) -> Option<f64> {
        self.entries
            .iter()
            .map(|m| m.reconstruction_error)
            .filter(|e| e.is_finite())
            .reduce(f64::min)
    }

    /// True if the mean reconstruction error of the last `window` entries is
    /// below that of the `window` entries before them.
    pub fn is_improving(&self, window: usize) -> bool {
        if window == 0 || self.entries.len() < 2 * window {
            return false;
        }
        let n = self.entries.len();
        let mean = |slice: &[RbmMetrics]| {
            slice.iter().map(|m| m.reconstruction_error).sum::<f64>() / slice.len() as f64
        };
        mean(&self.entries[n - window..]) < mean(&self.entries[n - 2 * window..n - window])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rbm::RbmConfig;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn metrics_with_error(reconstruction_error: f64) -> RbmMetrics {
        RbmMetrics {
            data_free_energy: -1.0,
            sample_free_energy: -0.5,
            free_energy_gap: 0.5,
            reconstruction_error,
            hidden_activation_mean: 0.5,
        }
    }

    #[test]
    fn test_compute_on_fresh_model() {
        let device = Default::default();
        let model = RbmConfig::new(6, 3).init::<TestBackend>(&device).unwrap();
        let x = Tensor::<TestBackend, 2>::random([10, 6], Distribution::Bernoulli(0.5), &device);

        let metrics = RbmMetrics::compute(&model, x).unwrap();
        assert!(metrics.reconstruction_error > 0.0 && metrics.reconstruction_error < 1.0);
        // Small weights and zero biases keep activations near 0.5.
        assert!((metrics.hidden_activation_mean - 0.5).abs() < 0.1);
        assert!(
            (metrics.free_energy_gap - (metrics.sample_free_energy - metrics.data_free_energy))
                .abs()
                < 1e-9
        );
        assert!(metrics.health_check().is_empty());
    }

    #[test]
    fn test_compute_propagates_shape_error() {
        let device = Default::default();
        let model = RbmConfig::new(6, 3).init::<TestBackend>(&device).unwrap();
        let x = Tensor::<TestBackend, 2>::zeros([2, 5], &device);
        assert!(RbmMetrics::compute(&model, x).is_err());
    }

    #[test]
    fn test_health_check_flags_saturation_and_nan() {
        let mut m = metrics_with_error(0.1);
        m.hidden_activation_mean = 0.001;
        assert_eq!(m.health_check().len(), 1);

        m.hidden_activation_mean = 0.999;
        assert!(m.health_check()[0].contains("saturated on"));

        m.hidden_activation_mean = 0.5;
        m.data_free_energy = f64::NAN;
        assert!(m.health_check()[0].contains("non-finite"));
    }

    #[test]
    fn test_history_best_and_trend() {
        let mut history = MetricsHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.best_reconstruction_error(), None);

        for e in [0.5, 0.4, 0.3, 0.2] {
            history.push(metrics_with_error(e));
        }
        assert_eq!(history.len(), 4);
        assert_eq!(history.best_reconstruction_error(), Some(0.2));
        assert!(history.is_improving(2));
        assert!(!history.is_improving(3));
        assert!((history.last().unwrap().reconstruction_error - 0.2).abs() < 1e-12);

        history.push(metrics_with_error(0.9));
        history.push(metrics_with_error(0.9));
        assert!(!history.is_improving(2));
    }
}
