//! Parametric line shapes for building ground-truth RIXS spectra and
//! photoemission spectra on an energy grid.

use crate::domain::{EnergyGrid, PaxError, PaxResult, Spectrum};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakShape {
    /// `width` is the standard deviation.
    Gaussian,
    /// `width` is the half width at half maximum.
    Lorentzian,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPeak {
    pub center: f64,
    pub width: f64,
    pub amplitude: f64,
    pub shape: PeakShape,
}

impl ModelPeak {
    pub const fn gaussian(center: f64, width: f64, amplitude: f64) -> Self {
        Self {
            center,
            width,
            amplitude,
            shape: PeakShape::Gaussian,
        }
    }

    pub const fn lorentzian(center: f64, width: f64, amplitude: f64) -> Self {
        Self {
            center,
            width,
            amplitude,
            shape: PeakShape::Lorentzian,
        }
    }

    /// Peak height is `amplitude` for both shapes.
    pub fn evaluate(&self, energy: f64) -> f64 {
        let offset = energy - self.center;
        match self.shape {
            PeakShape::Gaussian => self.amplitude * (-0.5 * (offset / self.width).powi(2)).exp(),
            PeakShape::Lorentzian => {
                let width_sq = self.width * self.width;
                self.amplitude * width_sq / (offset * offset + width_sq)
            }
        }
    }

    fn validate(&self, index: usize) -> PaxResult<()> {
        if !self.center.is_finite() {
            return Err(PaxError::invalid_config(format!(
                "model peak {index} center must be finite, got {}",
                self.center
            )));
        }
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(PaxError::invalid_config(format!(
                "model peak {index} width must be finite and > 0, got {}",
                self.width
            )));
        }
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(PaxError::invalid_config(format!(
                "model peak {index} amplitude must be finite and >= 0, got {}",
                self.amplitude
            )));
        }
        Ok(())
    }
}

/// Sum of `peaks` sampled on `grid`.
pub fn model_spectrum(grid: Arc<EnergyGrid>, peaks: &[ModelPeak]) -> PaxResult<Spectrum> {
    for (index, peak) in peaks.iter().enumerate() {
        peak.validate(index)?;
    }

    let intensities = grid
        .energies()
        .iter()
        .map(|&energy| peaks.iter().map(|peak| peak.evaluate(energy)).sum())
        .collect();
    Spectrum::with_label("model", grid, intensities)
}
