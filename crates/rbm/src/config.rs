//! TOML config loading for RBM hyperparameters.
//!
//! Reads an `[rbm]` table: layer sizes are required, every tuning parameter
//! is optional and falls back to the `RbmConfig` defaults.

use std::path::Path;

use serde::Deserialize;

use crate::model::rbm::RbmConfig;

/// Top-level structure of an RBM TOML file.
#[derive(Debug, Deserialize)]
pub struct RbmToml {
    /// Model section.
    pub rbm: RbmSection,
}

/// The `[rbm]` table.
#[derive(Debug, Deserialize)]
pub struct RbmSection {
    /// Number of visible units.
    pub visible_dim: usize,
    /// Number of hidden units.
    pub hidden_dim: usize,
    /// Gibbs steps per chain (k in CD-k).
    pub gibbs_steps: Option<usize>,
    /// Learning rate for the manual CD update.
    pub learning_rate: Option<f64>,
    /// Whether a downstream task may backpropagate through the hidden output.
    pub supervised: Option<bool>,
    /// Half-width of the uniform weight initialisation.
    pub init_scale: Option<f64>,
}

impl RbmSection {
    /// Build an `RbmConfig`, applying only the keys present in the file.
    pub fn to_config(&self) -> RbmConfig {
        let mut config = RbmConfig::new(self.visible_dim, self.hidden_dim);
        if let Some(k) = self.gibbs_steps {
            config.gibbs_steps = k;
        }
        if let Some(lr) = self.learning_rate {
            config.learning_rate = lr;
        }
        if let Some(supervised) = self.supervised {
            config.supervised = supervised;
        }
        if let Some(scale) = self.init_scale {
            config.init_scale = scale;
        }
        config
    }
}

/// Parse an RBM config from TOML text and validate it.
pub fn parse_rbm_toml(contents: &str) -> anyhow::Result<RbmConfig> {
    let parsed: RbmToml = toml::from_str(contents)?;
    let config = parsed.rbm.to_config();
    config.validate()?;
    Ok(config)
}

/// Load, deserialize and validate an RBM config from a TOML file.
pub fn load_rbm_toml(path: &Path) -> anyhow::Result<RbmConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let config = parse_rbm_toml(&contents)?;
    tracing::info!(
        path = %path.display(),
        visible_dim = config.visible_dim,
        hidden_dim = config.hidden_dim,
        "Loaded RBM config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = parse_rbm_toml(
            r#"
            [rbm]
            visible_dim = 784
            hidden_dim = 128
            "#,
        )
        .unwrap();
        assert_eq!(config.visible_dim, 784);
        assert_eq!(config.hidden_dim, 128);
        assert_eq!(config.gibbs_steps, 1);
        assert!((config.learning_rate - 0.01).abs() < 1e-12);
        assert!(config.supervised);
        assert!((config.init_scale - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_overrides_applied() {
        let config = parse_rbm_toml(
            r#"
            [rbm]
            visible_dim = 6
            hidden_dim = 3
            gibbs_steps = 5
            learning_rate = 0.05
            supervised = false
            "#,
        )
        .unwrap();
        assert_eq!(config.gibbs_steps, 5);
        assert!((config.learning_rate - 0.05).abs() < 1e-12);
        assert!(!config.supervised);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_rbm_toml(
            r#"
            [rbm]
            visible_dim = 6
            hidden_dim = 3
            learning_rate = -1.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("learning_rate"), "got: {err}");
    }

    #[test]
    fn test_missing_section_rejected() {
        assert!(parse_rbm_toml("[other]\nvalue = 1\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rbm]\nvisible_dim = 4\nhidden_dim = 2\ngibbs_steps = 3").unwrap();

        let config = load_rbm_toml(file.path()).unwrap();
        assert_eq!(config.visible_dim, 4);
        assert_eq!(config.gibbs_steps, 3);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_rbm_toml(Path::new("/nonexistent/rbm.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
