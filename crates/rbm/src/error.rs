/// Errors reported by RBM construction and batch operations.
///
/// All of these are usage errors surfaced at the call boundary; none are
/// transient, so nothing here is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RbmError {
    /// Input width does not match the layer it is fed into.
    #[error("Shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A batch with zero rows was passed where a batch mean is required.
    #[error("Empty batch")]
    EmptyBatch,

    /// Non-positive dimensions, Gibbs steps, learning rate or init scale.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A free energy or cost evaluated to NaN or infinity.
    #[error("Numeric instability: {0}")]
    NumericInstability(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = RbmError::ShapeMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Shape mismatch: expected 4 columns, got 3");

        let err = RbmError::InvalidConfiguration("hidden_dim must be > 0".into());
        assert!(err.to_string().contains("hidden_dim"));
    }
}
