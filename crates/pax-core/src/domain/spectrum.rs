use super::errors::{DimensionMismatch, GridError, PaxError, PaxResult};
use crate::numerics::{
    DEFAULT_EPSILON, convolve_same, elementwise_divide_safe, flip_kernel, normalized, peak_index,
    stable_sum,
};
use std::sync::Arc;

/// Relative tolerance used when comparing grid steps and spacings.
pub const SPACING_RELATIVE_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGrid {
    energies: Vec<f64>,
    spacing: f64,
}

impl EnergyGrid {
    pub fn new(energies: Vec<f64>) -> Result<Self, GridError> {
        if energies.len() < 2 {
            return Err(GridError::InsufficientPoints {
                minimum: 2,
                actual: energies.len(),
            });
        }

        for (index, value) in energies.iter().copied().enumerate() {
            if !value.is_finite() {
                return Err(GridError::NonFiniteEnergy { index, value });
            }
            if index > 0 && value <= energies[index - 1] {
                return Err(GridError::NonIncreasingEnergy {
                    index,
                    previous: energies[index - 1],
                    current: value,
                });
            }
        }

        let last = energies.len() - 1;
        let spacing = (energies[last] - energies[0]) / last as f64;
        for index in 1..energies.len() {
            let step = energies[index] - energies[index - 1];
            if !spacings_match(step, spacing) {
                return Err(GridError::NonUniformSpacing {
                    index,
                    step,
                    expected: spacing,
                });
            }
        }

        Ok(Self { energies, spacing })
    }

    pub fn uniform(start: f64, spacing: f64, count: usize) -> Result<Self, GridError> {
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(GridError::InvalidSpacing { value: spacing });
        }
        Self::new(
            (0..count)
                .map(|index| start + spacing * index as f64)
                .collect(),
        )
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.energies[0]
    }

    pub fn last(&self) -> f64 {
        self.energies[self.energies.len() - 1]
    }
}

pub fn spacings_match(lhs: f64, rhs: f64) -> bool {
    (lhs - rhs).abs() <= SPACING_RELATIVE_TOLERANCE * lhs.abs().max(rhs.abs())
}

/// Non-negative intensities on a shared energy grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    grid: Arc<EnergyGrid>,
    intensities: Vec<f64>,
}

impl Spectrum {
    pub fn new(grid: Arc<EnergyGrid>, intensities: Vec<f64>) -> PaxResult<Self> {
        Self::with_label("spectrum", grid, intensities)
    }

    /// Like [`Spectrum::new`], naming the spectrum in validation errors.
    pub fn with_label(
        label: &str,
        grid: Arc<EnergyGrid>,
        intensities: Vec<f64>,
    ) -> PaxResult<Self> {
        if intensities.len() != grid.len() {
            return Err(DimensionMismatch::Length {
                expected: grid.len(),
                actual: intensities.len(),
            }
            .into());
        }
        if let Some((index, value)) = intensities
            .iter()
            .copied()
            .enumerate()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(PaxError::InvalidSpectrum {
                label: label.to_string(),
                index,
                value,
            });
        }
        Ok(Self { grid, intensities })
    }

    /// Builds a spectrum from algorithm output, clamping negatives to zero.
    pub(crate) fn from_clamped(grid: Arc<EnergyGrid>, mut intensities: Vec<f64>) -> Self {
        debug_assert_eq!(grid.len(), intensities.len());
        clamp_non_negative(&mut intensities);
        Self { grid, intensities }
    }

    pub fn grid(&self) -> &EnergyGrid {
        &self.grid
    }

    pub fn shared_grid(&self) -> &Arc<EnergyGrid> {
        &self.grid
    }

    pub fn energies(&self) -> &[f64] {
        self.grid.energies()
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn into_intensities(self) -> Vec<f64> {
        self.intensities
    }

    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    pub fn total(&self) -> f64 {
        stable_sum(&self.intensities)
    }

    pub fn same_grid(&self, other: &Spectrum) -> bool {
        Arc::ptr_eq(&self.grid, &other.grid) || self.grid == other.grid
    }

    /// A spectrum with the same grid and new intensities, clamped at zero.
    pub fn with_intensities(&self, intensities: Vec<f64>) -> PaxResult<Self> {
        if intensities.len() != self.len() {
            return Err(DimensionMismatch::Length {
                expected: self.len(),
                actual: intensities.len(),
            }
            .into());
        }
        Ok(Self::from_clamped(Arc::clone(&self.grid), intensities))
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::from_clamped(
            Arc::clone(&self.grid),
            self.intensities.iter().map(|value| value * factor).collect(),
        )
    }

    pub fn normalize(&self) -> PaxResult<Self> {
        normalize(self)
    }

    pub fn convolve(&self, kernel: &ResponseFunction) -> Self {
        convolve(self, kernel)
    }
}

/// Scales intensities to unit sum.
pub fn normalize(spectrum: &Spectrum) -> PaxResult<Spectrum> {
    let intensities = normalized(spectrum.intensities(), DEFAULT_EPSILON).ok_or_else(|| {
        PaxError::DegenerateSpectrum {
            label: "spectrum",
            sum: spectrum.total(),
            epsilon: DEFAULT_EPSILON,
        }
    })?;
    Ok(Spectrum::from_clamped(
        Arc::clone(spectrum.shared_grid()),
        intensities,
    ))
}

/// Same-length convolution of `signal` with the response, zero padded at the edges.
pub fn convolve(signal: &Spectrum, kernel: &ResponseFunction) -> Spectrum {
    Spectrum::from_clamped(
        Arc::clone(signal.shared_grid()),
        convolve_same(signal.intensities(), kernel.weights(), kernel.center()),
    )
}

pub fn divide_safe(numerator: &Spectrum, denominator: &Spectrum, epsilon: f64) -> Vec<f64> {
    elementwise_divide_safe(numerator.intensities(), denominator.intensities(), epsilon)
}

/// Elementwise mean of spectra sharing one grid.
pub fn mean_spectrum(spectra: &[Spectrum]) -> PaxResult<Spectrum> {
    let Some(first) = spectra.first() else {
        return Err(PaxError::DegenerateSpectrum {
            label: "spectrum set",
            sum: 0.0,
            epsilon: DEFAULT_EPSILON,
        });
    };

    let mut sums = vec![0.0; first.len()];
    for spectrum in spectra {
        if !spectrum.same_grid(first) {
            return Err(DimensionMismatch::DifferentGrid { label: "spectrum set" }.into());
        }
        for (sum, value) in sums.iter_mut().zip(spectrum.intensities()) {
            *sum += value;
        }
    }

    let count = spectra.len() as f64;
    Ok(Spectrum::from_clamped(
        Arc::clone(first.shared_grid()),
        sums.into_iter().map(|sum| sum / count).collect(),
    ))
}

/// Checks that `response` is sampled like `signal` and fits inside it.
pub fn check_response_compatible(signal: &Spectrum, response: &ResponseFunction) -> PaxResult<()> {
    let signal_spacing = signal.grid().spacing();
    if !spacings_match(signal_spacing, response.spacing()) {
        return Err(DimensionMismatch::Spacing {
            left_label: "spectrum",
            left_spacing: signal_spacing,
            right_label: "response",
            right_spacing: response.spacing(),
        }
        .into());
    }
    if response.len() > signal.len() {
        return Err(DimensionMismatch::KernelLongerThanSignal {
            kernel: response.len(),
            signal: signal.len(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn clamp_non_negative(values: &mut [f64]) {
    for value in values {
        if *value < 0.0 || value.is_nan() {
            *value = 0.0;
        }
    }
}

/// Unit-sum blurring kernel with an explicit zero-offset (center) sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFunction {
    spacing: f64,
    weights: Vec<f64>,
    center: usize,
}

impl ResponseFunction {
    /// Normalizes `weights` and centers the kernel on its peak.
    pub fn new(spacing: f64, weights: Vec<f64>) -> PaxResult<Self> {
        let center = peak_index(&weights);
        Self::with_center(spacing, weights, center)
    }

    pub fn with_center(spacing: f64, weights: Vec<f64>, center: usize) -> PaxResult<Self> {
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(GridError::InvalidSpacing { value: spacing }.into());
        }
        if weights.is_empty() {
            return Err(GridError::InsufficientPoints {
                minimum: 1,
                actual: 0,
            }
            .into());
        }
        if center >= weights.len() {
            return Err(DimensionMismatch::Length {
                expected: center + 1,
                actual: weights.len(),
            }
            .into());
        }
        if let Some((index, value)) = weights
            .iter()
            .copied()
            .enumerate()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(PaxError::InvalidSpectrum {
                label: "response".to_string(),
                index,
                value,
            });
        }

        let weights =
            normalized(&weights, DEFAULT_EPSILON).ok_or_else(|| PaxError::DegenerateSpectrum {
                label: "response",
                sum: stable_sum(&weights),
                epsilon: DEFAULT_EPSILON,
            })?;

        Ok(Self {
            spacing,
            weights,
            center,
        })
    }

    /// Single-sample kernel; convolution with it is the identity.
    pub fn impulse(spacing: f64) -> PaxResult<Self> {
        Self::with_center(spacing, vec![1.0], 0)
    }

    /// Uses a sampled spectrum directly as the kernel, centered on its peak.
    pub fn from_spectrum(spectrum: &Spectrum) -> PaxResult<Self> {
        Self::new(spectrum.grid().spacing(), spectrum.intensities().to_vec())
    }

    /// PAX impulse response: the photoemission spectrum reversed along the
    /// energy axis (binding energy maps to negative kinetic-energy offset)
    /// and normalized.
    pub fn from_photoemission(photoemission: &Spectrum) -> PaxResult<Self> {
        let reversed = photoemission
            .intensities()
            .iter()
            .rev()
            .copied()
            .collect::<Vec<_>>();
        Self::new(photoemission.grid().spacing(), reversed)
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn center(&self) -> usize {
        self.center
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Energy offset of every kernel sample relative to the center.
    pub fn offsets(&self) -> Vec<f64> {
        (0..self.weights.len())
            .map(|index| (index as f64 - self.center as f64) * self.spacing)
            .collect()
    }

    /// Kernel reversed about its center, used for the correlation step.
    pub fn flip(&self) -> Self {
        let (weights, center) = flip_kernel(&self.weights, self.center);
        Self {
            spacing: self.spacing,
            weights,
            center,
        }
    }
}
