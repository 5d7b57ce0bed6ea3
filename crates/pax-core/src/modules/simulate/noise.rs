use crate::domain::{PaxError, PaxResult};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Counting-statistics process applied to the expected counts of every bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    /// Independent Poisson draw per bin.
    #[default]
    Poisson,
    /// Normal approximation `N(λ, √λ)`, rounded to whole counts and clamped at zero.
    Gaussian,
    /// Expected counts returned unchanged.
    Noiseless,
}

impl NoiseKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poisson => "poisson",
            Self::Gaussian => "gaussian",
            Self::Noiseless => "noiseless",
        }
    }
}

impl Display for NoiseKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseModel {
    pub total_counts: f64,
    #[serde(default)]
    pub kind: NoiseKind,
}

impl NoiseModel {
    pub fn new(total_counts: f64, kind: NoiseKind) -> PaxResult<Self> {
        let model = Self { total_counts, kind };
        model.validate()?;
        Ok(model)
    }

    pub fn poisson(total_counts: f64) -> PaxResult<Self> {
        Self::new(total_counts, NoiseKind::Poisson)
    }

    pub fn gaussian(total_counts: f64) -> PaxResult<Self> {
        Self::new(total_counts, NoiseKind::Gaussian)
    }

    pub fn noiseless(total_counts: f64) -> PaxResult<Self> {
        Self::new(total_counts, NoiseKind::Noiseless)
    }

    pub fn validate(&self) -> PaxResult<()> {
        if !self.total_counts.is_finite() || self.total_counts <= 0.0 {
            return Err(PaxError::invalid_noise_config(format!(
                "total count budget must be finite and > 0, got {}",
                self.total_counts
            )));
        }
        Ok(())
    }

    /// Same noise kind with a different count budget.
    pub fn with_total_counts(&self, total_counts: f64) -> PaxResult<Self> {
        Self::new(total_counts, self.kind)
    }
}

pub(super) fn draw_counts(
    expected: &[f64],
    kind: NoiseKind,
    rng: &mut StdRng,
) -> PaxResult<Vec<f64>> {
    match kind {
        NoiseKind::Noiseless => Ok(expected.to_vec()),
        NoiseKind::Poisson => expected
            .iter()
            .map(|&mean| {
                // e^-mean rounds to 1 for means below ~1e-16; the sampler has no
                // usable draw there and the count is zero to double precision.
                if mean <= 0.0 || (-mean).exp() >= 1.0 {
                    return Ok(0.0);
                }
                let distribution = Poisson::new(mean).map_err(|error| {
                    PaxError::invalid_noise_config(format!(
                        "poisson mean {mean:e} is not usable: {error}"
                    ))
                })?;
                Ok(distribution.sample(rng).max(0.0))
            })
            .collect(),
        NoiseKind::Gaussian => expected
            .iter()
            .map(|&mean| {
                if mean <= 0.0 {
                    return Ok(0.0);
                }
                let distribution = Normal::new(mean, mean.sqrt()).map_err(|error| {
                    PaxError::invalid_noise_config(format!(
                        "gaussian mean {mean:e} is not usable: {error}"
                    ))
                })?;
                Ok(distribution.sample(rng).round().max(0.0))
            })
            .collect(),
    }
}
