use super::config::DeconvolutionConfig;
use super::convergence::StopReason;
use crate::domain::Spectrum;

/// Snapshot of one multiplicative update. `estimate` is an independent copy.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    iteration: usize,
    estimate: Spectrum,
    residual: f64,
    relative_change: f64,
    validation_residual: Option<f64>,
    ground_truth_error: Option<f64>,
}

impl IterationRecord {
    pub fn new(iteration: usize, estimate: Spectrum, residual: f64, relative_change: f64) -> Self {
        Self {
            iteration,
            estimate,
            residual,
            relative_change,
            validation_residual: None,
            ground_truth_error: None,
        }
    }

    pub fn with_validation_residual(mut self, validation_residual: Option<f64>) -> Self {
        self.validation_residual = validation_residual;
        self
    }

    pub fn with_ground_truth_error(mut self, ground_truth_error: Option<f64>) -> Self {
        self.ground_truth_error = ground_truth_error;
        self
    }

    /// 1-based iteration index.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn estimate(&self) -> &Spectrum {
        &self.estimate
    }

    /// Squared fit residual of the estimate entering this iteration.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    pub fn relative_change(&self) -> f64 {
        self.relative_change
    }

    pub fn validation_residual(&self) -> Option<f64> {
        self.validation_residual
    }

    /// Squared distance between the normalized estimate and the normalized truth.
    pub fn ground_truth_error(&self) -> Option<f64> {
        self.ground_truth_error
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultPackage {
    estimate: Spectrum,
    history: Vec<IterationRecord>,
    stop_reason: StopReason,
    config: DeconvolutionConfig,
}

impl ResultPackage {
    pub(crate) fn new(
        estimate: Spectrum,
        history: Vec<IterationRecord>,
        stop_reason: StopReason,
        config: DeconvolutionConfig,
    ) -> Self {
        Self {
            estimate,
            history,
            stop_reason,
            config,
        }
    }

    pub fn estimate(&self) -> &Spectrum {
        &self.estimate
    }

    pub fn into_estimate(self) -> Spectrum {
        self.estimate
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    pub fn config(&self) -> &DeconvolutionConfig {
        &self.config
    }

    pub fn residuals(&self) -> Vec<f64> {
        self.history.iter().map(IterationRecord::residual).collect()
    }

    pub fn relative_changes(&self) -> Vec<f64> {
        self.history
            .iter()
            .map(IterationRecord::relative_change)
            .collect()
    }

    /// Iteration with the lowest validation residual, if one was tracked.
    pub fn best_validation_iteration(&self) -> Option<&IterationRecord> {
        best_by(&self.history, IterationRecord::validation_residual)
    }

    pub fn best_ground_truth_iteration(&self) -> Option<&IterationRecord> {
        best_by(&self.history, IterationRecord::ground_truth_error)
    }
}

fn best_by(
    history: &[IterationRecord],
    metric: impl Fn(&IterationRecord) -> Option<f64>,
) -> Option<&IterationRecord> {
    history
        .iter()
        .filter_map(|record| metric(record).map(|value| (value, record)))
        .min_by(|(lhs, _), (rhs, _)| lhs.total_cmp(rhs))
        .map(|(_, record)| record)
}

#[cfg(test)]
mod tests {
    use super::{IterationRecord, ResultPackage};
    use crate::domain::{EnergyGrid, Spectrum};
    use crate::modules::deconvolve::{DeconvolutionConfig, StopReason};
    use std::sync::Arc;

    fn record(iteration: usize, validation: Option<f64>) -> IterationRecord {
        let grid = Arc::new(EnergyGrid::uniform(0.0, 1.0, 2).expect("grid"));
        let estimate = Spectrum::new(grid, vec![iteration as f64, 1.0]).expect("estimate");
        IterationRecord::new(iteration, estimate, 10.0 / iteration as f64, 0.5)
            .with_validation_residual(validation)
    }

    #[test]
    fn accessors_expose_history_series() {
        let history = vec![record(1, Some(3.0)), record(2, Some(1.0)), record(3, Some(2.0))];
        let estimate = history[2].estimate().clone();
        let result = ResultPackage::new(
            estimate,
            history,
            StopReason::MaxIterationsReached,
            DeconvolutionConfig::default(),
        );

        assert_eq!(result.iterations(), 3);
        assert_eq!(result.residuals(), vec![10.0, 5.0, 10.0 / 3.0]);
        assert_eq!(result.relative_changes(), vec![0.5; 3]);
        assert_eq!(
            result
                .best_validation_iteration()
                .map(IterationRecord::iteration),
            Some(2)
        );
        assert!(result.best_ground_truth_iteration().is_none());
        assert_eq!(result.estimate().intensities(), &[3.0, 1.0]);
    }
}
