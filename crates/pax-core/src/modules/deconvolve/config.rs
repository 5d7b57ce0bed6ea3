use crate::domain::{PaxError, PaxResult};
use crate::numerics::DEFAULT_EPSILON;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Initial estimate used for the first multiplicative update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedStrategy {
    /// Every bin starts at the mean measured intensity.
    #[default]
    Uniform,
    /// Start from a copy of the measured spectrum.
    Measured,
}

impl SeedStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Measured => "measured",
        }
    }
}

/// Residual series watched by the divergence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DivergenceMetric {
    /// Fit residual against the deconvolved measurement.
    #[default]
    Residual,
    /// Fit residual against a held-out validation measurement.
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeconvolutionConfig {
    pub max_iterations: usize,
    pub relative_change_tolerance: f64,
    /// Consecutive strict residual increases tolerated before stopping; 0 disables the rule.
    pub residual_increase_patience: usize,
    pub seed_strategy: SeedStrategy,
    pub epsilon: f64,
    /// Standard deviation (energy units) of the smoothing applied after every update.
    pub regularizer_width: Option<f64>,
    pub divergence_metric: DivergenceMetric,
}

impl Default for DeconvolutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            relative_change_tolerance: 1.0e-6,
            residual_increase_patience: 5,
            seed_strategy: SeedStrategy::Uniform,
            epsilon: DEFAULT_EPSILON,
            regularizer_width: None,
            divergence_metric: DivergenceMetric::Residual,
        }
    }
}

impl DeconvolutionConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_relative_change_tolerance(mut self, tolerance: f64) -> Self {
        self.relative_change_tolerance = tolerance;
        self
    }

    pub fn with_residual_increase_patience(mut self, patience: usize) -> Self {
        self.residual_increase_patience = patience;
        self
    }

    pub fn with_seed_strategy(mut self, seed_strategy: SeedStrategy) -> Self {
        self.seed_strategy = seed_strategy;
        self
    }

    pub fn with_regularizer_width(mut self, width: Option<f64>) -> Self {
        self.regularizer_width = width;
        self
    }

    pub fn with_divergence_metric(mut self, metric: DivergenceMetric) -> Self {
        self.divergence_metric = metric;
        self
    }

    pub fn validate(&self) -> PaxResult<()> {
        if self.max_iterations == 0 {
            return Err(PaxError::invalid_config("maxIterations must be at least 1"));
        }
        if !self.relative_change_tolerance.is_finite() || self.relative_change_tolerance < 0.0 {
            return Err(PaxError::invalid_config(format!(
                "relativeChangeTolerance must be finite and >= 0, got {}",
                self.relative_change_tolerance
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(PaxError::invalid_config(format!(
                "epsilon must be finite and > 0, got {}",
                self.epsilon
            )));
        }
        match self.regularizer_width {
            Some(width) if !width.is_finite() || width <= 0.0 => {
                Err(PaxError::invalid_config(format!(
                    "regularizerWidth must be finite and > 0, got {}",
                    width
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read deconvolution config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse deconvolution config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reads a JSON config; missing keys keep their defaults.
pub fn load_deconvolution_config(
    config_path: impl AsRef<Path>,
) -> Result<DeconvolutionConfig, ConfigLoadError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigLoadError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ConfigLoadError::Parse {
        path: config_path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigLoadError, DeconvolutionConfig, DivergenceMetric, SeedStrategy,
        load_deconvolution_config,
    };
    use crate::domain::PaxError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = DeconvolutionConfig::default();
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.relative_change_tolerance, 1.0e-6);
        assert_eq!(config.residual_increase_patience, 5);
        assert_eq!(config.seed_strategy, SeedStrategy::Uniform);
        assert_eq!(config.regularizer_width, None);
        assert_eq!(config.divergence_metric, DivergenceMetric::Residual);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: DeconvolutionConfig = serde_json::from_str(
            r#"{ "maxIterations": 250, "seedStrategy": "measured", "regularizerWidth": 0.01 }"#,
        )
        .expect("config json");
        assert_eq!(config.max_iterations, 250);
        assert_eq!(config.seed_strategy, SeedStrategy::Measured);
        assert_eq!(config.regularizer_width, Some(0.01));
        assert_eq!(config.residual_increase_patience, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            DeconvolutionConfig::default().with_max_iterations(0),
            DeconvolutionConfig::default().with_relative_change_tolerance(-1.0),
            DeconvolutionConfig::default().with_relative_change_tolerance(f64::NAN),
            DeconvolutionConfig::default().with_regularizer_width(Some(0.0)),
            DeconvolutionConfig {
                epsilon: 0.0,
                ..DeconvolutionConfig::default()
            },
        ];
        for config in cases {
            let error = config.validate().expect_err("invalid config");
            assert!(
                matches!(error, PaxError::InvalidConfig { .. }),
                "unexpected error {error:?}"
            );
        }
    }

    #[test]
    fn config_files_report_read_and_parse_failures() {
        let temp = TempDir::new().expect("tempdir should be created");
        let missing = temp.path().join("missing.json");
        assert!(matches!(
            load_deconvolution_config(&missing),
            Err(ConfigLoadError::Read { .. })
        ));

        let broken = temp.path().join("broken.json");
        fs::write(&broken, "{ maxIterations: }").expect("write");
        assert!(matches!(
            load_deconvolution_config(&broken),
            Err(ConfigLoadError::Parse { .. })
        ));

        let valid = temp.path().join("config.json");
        fs::write(&valid, r#"{ "relativeChangeTolerance": 0.0 }"#).expect("write");
        let config = load_deconvolution_config(&valid).expect("valid config");
        assert_eq!(config.relative_change_tolerance, 0.0);
    }
}
