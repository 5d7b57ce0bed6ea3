use super::config::{DeconvolutionConfig, DivergenceMetric};
use super::result::IterationRecord;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    Converged,
    Diverged,
    MaxIterationsReached,
}

impl StopReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Diverged => "diverged",
            Self::MaxIterationsReached => "maxIterationsReached",
        }
    }
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Stop rules consulted after every iteration.
///
/// When several rules fire on the same iteration the reason is chosen in the
/// order converged, diverged, iteration cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceMonitor {
    config: DeconvolutionConfig,
}

impl ConvergenceMonitor {
    pub fn new(config: DeconvolutionConfig) -> Self {
        Self { config }
    }

    pub fn should_stop(&self, history: &[IterationRecord]) -> Option<StopReason> {
        should_stop(history, &self.config)
    }
}

/// `None` means keep iterating.
pub fn should_stop(
    history: &[IterationRecord],
    config: &DeconvolutionConfig,
) -> Option<StopReason> {
    let latest = history.last()?;

    if latest.relative_change() < config.relative_change_tolerance {
        return Some(StopReason::Converged);
    }
    if residual_keeps_increasing(history, config) {
        return Some(StopReason::Diverged);
    }
    if history.len() >= config.max_iterations {
        return Some(StopReason::MaxIterationsReached);
    }
    None
}

fn residual_keeps_increasing(history: &[IterationRecord], config: &DeconvolutionConfig) -> bool {
    let patience = config.residual_increase_patience;
    if patience == 0 || history.len() <= patience {
        return false;
    }

    let metric = |record: &IterationRecord| match config.divergence_metric {
        DivergenceMetric::Residual => Some(record.residual()),
        DivergenceMetric::Validation => record.validation_residual(),
    };

    history[history.len() - patience - 1..]
        .windows(2)
        .all(|pair| match (metric(&pair[0]), metric(&pair[1])) {
            (Some(previous), Some(current)) => current > previous,
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::{ConvergenceMonitor, StopReason, should_stop};
    use crate::domain::{EnergyGrid, Spectrum};
    use crate::modules::deconvolve::{DeconvolutionConfig, DivergenceMetric, IterationRecord};
    use std::sync::Arc;

    fn history(residuals: &[f64], changes: &[f64]) -> Vec<IterationRecord> {
        let grid = Arc::new(EnergyGrid::uniform(0.0, 1.0, 2).expect("grid"));
        residuals
            .iter()
            .zip(changes)
            .enumerate()
            .map(|(index, (residual, change))| {
                let estimate = Spectrum::new(Arc::clone(&grid), vec![1.0, 1.0]).expect("estimate");
                IterationRecord::new(index + 1, estimate, *residual, *change)
            })
            .collect()
    }

    fn config(max_iterations: usize, tolerance: f64, patience: usize) -> DeconvolutionConfig {
        DeconvolutionConfig::default()
            .with_max_iterations(max_iterations)
            .with_relative_change_tolerance(tolerance)
            .with_residual_increase_patience(patience)
    }

    #[test]
    fn empty_history_never_stops() {
        assert_eq!(should_stop(&[], &config(1, 1.0, 1)), None);
    }

    #[test]
    fn small_change_converges() {
        let records = history(&[5.0, 4.0], &[0.3, 1.0e-8]);
        assert_eq!(
            should_stop(&records, &config(100, 1.0e-6, 3)),
            Some(StopReason::Converged)
        );
        assert_eq!(should_stop(&records[..1], &config(100, 1.0e-6, 3)), None);
    }

    #[test]
    fn zero_tolerance_never_converges() {
        let records = history(&[5.0, 4.0], &[0.3, 0.0]);
        assert_eq!(should_stop(&records, &config(100, 0.0, 3)), None);
    }

    #[test]
    fn divergence_needs_patience_consecutive_increases() {
        let changes = [0.1; 5];
        let monitor = ConvergenceMonitor::new(config(100, 1.0e-9, 3));

        let rising = history(&[4.0, 3.0, 3.5, 3.6, 3.7], &changes);
        assert_eq!(monitor.should_stop(&rising), Some(StopReason::Diverged));

        let interrupted = history(&[4.0, 3.0, 3.5, 3.4, 3.7], &changes);
        assert_eq!(monitor.should_stop(&interrupted), None);

        let flat = history(&[4.0, 3.0, 3.5, 3.5, 3.7], &changes);
        assert_eq!(monitor.should_stop(&flat), None);

        let too_short = history(&[3.0, 3.5, 3.6], &changes);
        assert_eq!(monitor.should_stop(&too_short), None);
    }

    #[test]
    fn zero_patience_disables_divergence() {
        let records = history(&[1.0, 2.0, 3.0], &[0.1; 3]);
        assert_eq!(should_stop(&records, &config(100, 1.0e-9, 0)), None);
    }

    #[test]
    fn cap_applies_when_nothing_else_fires() {
        let records = history(&[3.0, 2.0, 1.0], &[0.1; 3]);
        assert_eq!(
            should_stop(&records, &config(3, 1.0e-9, 2)),
            Some(StopReason::MaxIterationsReached)
        );
        assert_eq!(should_stop(&records, &config(4, 1.0e-9, 2)), None);
    }

    #[test]
    fn precedence_is_converged_then_diverged_then_cap() {
        let records = history(&[1.0, 2.0, 3.0], &[0.1, 0.1, 1.0e-9]);
        assert_eq!(
            should_stop(&records, &config(3, 1.0e-6, 2)),
            Some(StopReason::Converged)
        );

        let records = history(&[1.0, 2.0, 3.0], &[0.1; 3]);
        assert_eq!(
            should_stop(&records, &config(3, 1.0e-6, 2)),
            Some(StopReason::Diverged)
        );
    }

    #[test]
    fn validation_metric_watches_validation_residuals() {
        let records = history(&[3.0, 2.0, 1.0], &[0.1; 3])
            .into_iter()
            .zip([1.0, 1.5, 2.0])
            .map(|(record, validation)| record.with_validation_residual(Some(validation)))
            .collect::<Vec<_>>();
        let residual_config = config(100, 1.0e-9, 2);
        let validation_config = residual_config.with_divergence_metric(DivergenceMetric::Validation);

        assert_eq!(should_stop(&records, &residual_config), None);
        assert_eq!(
            should_stop(&records, &validation_config),
            Some(StopReason::Diverged)
        );
    }
}
