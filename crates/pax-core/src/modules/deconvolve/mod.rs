//! Richardson–Lucy deconvolution of a measured PAX spectrum.

mod config;
mod convergence;
mod result;
mod selection;

pub use config::{
    ConfigLoadError, DeconvolutionConfig, DivergenceMetric, SeedStrategy,
    load_deconvolution_config,
};
pub use convergence::{ConvergenceMonitor, StopReason, should_stop};
pub use result::{IterationRecord, ResultPackage};
pub use selection::{RegularizerScore, RegularizerSelection, select_regularizer};

use crate::domain::{
    DimensionMismatch, PaxError, PaxResult, ResponseFunction, Spectrum, check_response_compatible,
};
use crate::numerics::{
    convolve_same, elementwise_divide_safe, gaussian_kernel, normalized, relative_change,
    sum_squared_difference,
};
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeconvolutionEngine {
    config: DeconvolutionConfig,
    validation: Option<Spectrum>,
    ground_truth: Option<Spectrum>,
}

impl DeconvolutionEngine {
    pub fn new(config: DeconvolutionConfig) -> Self {
        Self {
            config,
            validation: None,
            ground_truth: None,
        }
    }

    /// Held-out measurement of the same sample. Its fit residual is recorded
    /// every iteration and can drive the divergence rule.
    pub fn with_validation(mut self, validation: Spectrum) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Known truth, for simulations. Records the shape error per iteration.
    pub fn with_ground_truth(mut self, ground_truth: Spectrum) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    pub fn config(&self) -> &DeconvolutionConfig {
        &self.config
    }

    pub fn run(&self, measured: &Spectrum, response: &ResponseFunction) -> PaxResult<ResultPackage> {
        let config = self.config;
        config.validate()?;
        if config.divergence_metric == DivergenceMetric::Validation && self.validation.is_none() {
            return Err(PaxError::invalid_config(
                "divergenceMetric 'validation' needs a validation spectrum",
            ));
        }
        check_response_compatible(measured, response)?;

        let measured_total = measured.total();
        if !(measured_total > config.epsilon) {
            return Err(PaxError::DegenerateSpectrum {
                label: "measured",
                sum: measured_total,
                epsilon: config.epsilon,
            });
        }

        let validation = self
            .validation
            .as_ref()
            .map(|validation| scaled_validation(measured, validation, config.epsilon))
            .transpose()?;
        let ground_truth = self
            .ground_truth
            .as_ref()
            .map(|truth| normalized_truth(measured, truth, config.epsilon))
            .transpose()?;

        let data = measured.intensities();
        let grid = measured.shared_grid();
        let flipped = response.flip();
        let smoothing = config
            .regularizer_width
            .map(|width| gaussian_kernel(width, grid.spacing(), data.len().saturating_sub(1)));
        let monitor = ConvergenceMonitor::new(config);

        let mut estimate = match config.seed_strategy {
            SeedStrategy::Uniform => vec![measured_total / data.len() as f64; data.len()],
            SeedStrategy::Measured => data.to_vec(),
        };
        let mut history = Vec::with_capacity(config.max_iterations.min(1024));

        let stop_reason = loop {
            let blurred = convolve_same(&estimate, response.weights(), response.center());
            let ratio = elementwise_divide_safe(data, &blurred, config.epsilon);
            let correction = convolve_same(&ratio, flipped.weights(), flipped.center());

            let mut next = estimate
                .iter()
                .zip(&correction)
                .map(|(value, factor)| (value * factor).max(0.0))
                .collect::<Vec<_>>();
            if let Some((weights, center)) = &smoothing {
                next = convolve_same(&next, weights, *center)
                    .into_iter()
                    .map(|value| value.max(0.0))
                    .collect();
            }

            let residual = sum_squared_difference(&blurred, data);
            let change = relative_change(&estimate, &next);
            let validation_residual = validation
                .as_deref()
                .map(|validation| sum_squared_difference(&blurred, validation));
            let ground_truth_error = ground_truth.as_deref().and_then(|truth| {
                normalized(&next, config.epsilon)
                    .map(|shape| sum_squared_difference(&shape, truth))
            });

            let iteration = history.len() + 1;
            tracing::debug!(
                iteration,
                residual,
                relative_change = change,
                validation_residual,
                "richardson-lucy update"
            );

            history.push(
                IterationRecord::new(
                    iteration,
                    Spectrum::from_clamped(Arc::clone(grid), next.clone()),
                    residual,
                    change,
                )
                .with_validation_residual(validation_residual)
                .with_ground_truth_error(ground_truth_error),
            );
            estimate = next;

            if let Some(reason) = monitor.should_stop(&history) {
                break reason;
            }
        };

        match stop_reason {
            StopReason::Diverged => tracing::warn!(
                iterations = history.len(),
                metric = ?config.divergence_metric,
                "deconvolution stopped on a rising residual"
            ),
            _ => tracing::info!(
                iterations = history.len(),
                stop_reason = %stop_reason,
                "deconvolution finished"
            ),
        }

        Ok(ResultPackage::new(
            Spectrum::from_clamped(Arc::clone(grid), estimate),
            history,
            stop_reason,
            config,
        ))
    }
}

fn scaled_validation(
    measured: &Spectrum,
    validation: &Spectrum,
    epsilon: f64,
) -> PaxResult<Vec<f64>> {
    if !validation.same_grid(measured) {
        return Err(DimensionMismatch::DifferentGrid {
            label: "validation",
        }
        .into());
    }
    let shape = normalized(validation.intensities(), epsilon).ok_or_else(|| {
        PaxError::DegenerateSpectrum {
            label: "validation",
            sum: validation.total(),
            epsilon,
        }
    })?;
    let total = measured.total();
    Ok(shape.into_iter().map(|value| value * total).collect())
}

fn normalized_truth(measured: &Spectrum, truth: &Spectrum, epsilon: f64) -> PaxResult<Vec<f64>> {
    if !truth.same_grid(measured) {
        return Err(DimensionMismatch::DifferentGrid {
            label: "ground truth",
        }
        .into());
    }
    normalized(truth.intensities(), epsilon).ok_or_else(|| PaxError::DegenerateSpectrum {
        label: "ground truth",
        sum: truth.total(),
        epsilon,
    })
}

/// Single deconvolution with default diagnostics.
pub fn run(
    measured: &Spectrum,
    response: &ResponseFunction,
    config: DeconvolutionConfig,
) -> PaxResult<ResultPackage> {
    DeconvolutionEngine::new(config).run(measured, response)
}

/// Independent runs over many measurements; results follow input order.
pub fn run_batch(
    measurements: &[Spectrum],
    response: &ResponseFunction,
    config: DeconvolutionConfig,
) -> Vec<PaxResult<ResultPackage>> {
    measurements
        .par_iter()
        .map(|measured| run(measured, response, config))
        .collect()
}
