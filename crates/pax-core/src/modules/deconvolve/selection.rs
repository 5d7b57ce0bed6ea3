use super::DeconvolutionEngine;
use super::config::DeconvolutionConfig;
use crate::domain::{PaxError, PaxResult, ResponseFunction, Spectrum, mean_spectrum};
use crate::numerics::{convolve_same, sum_squared_difference};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularizerScore {
    pub width: f64,
    /// Mean held-out residual over all folds.
    pub score: f64,
    pub fold_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularizerSelection {
    pub best_width: f64,
    pub scores: Vec<RegularizerScore>,
}

impl RegularizerSelection {
    pub fn best(&self) -> Option<&RegularizerScore> {
        self.scores
            .iter()
            .find(|score| score.width == self.best_width)
    }
}

/// K-fold cross-validation of the smoothing width.
///
/// Fold `f` holds out every measurement whose index is `f` modulo `folds`,
/// deconvolves the mean of the others and scores the re-blurred estimate
/// against the held-out mean rescaled to the training total.
pub fn select_regularizer(
    measurements: &[Spectrum],
    response: &ResponseFunction,
    widths: &[f64],
    folds: usize,
    config: DeconvolutionConfig,
) -> PaxResult<RegularizerSelection> {
    if folds < 2 {
        return Err(PaxError::invalid_config(format!(
            "cross-validation needs at least 2 folds, got {folds}"
        )));
    }
    if measurements.len() < folds {
        return Err(PaxError::invalid_config(format!(
            "{folds} folds need at least {folds} measurements, got {}",
            measurements.len()
        )));
    }
    if widths.is_empty() {
        return Err(PaxError::invalid_config(
            "at least one regularizer width is required",
        ));
    }
    if let Some(width) = widths
        .iter()
        .copied()
        .find(|width| !width.is_finite() || *width <= 0.0)
    {
        return Err(PaxError::invalid_config(format!(
            "regularizer widths must be finite and > 0, got {width}"
        )));
    }

    let splits = (0..folds)
        .map(|fold| split_fold(measurements, fold, folds))
        .collect::<PaxResult<Vec<_>>>()?;

    let scores = widths
        .par_iter()
        .map(|&width| {
            let engine = DeconvolutionEngine::new(config.with_regularizer_width(Some(width)));
            let fold_scores = splits
                .iter()
                .map(|(training, held_out)| score_fold(&engine, training, held_out, response))
                .collect::<PaxResult<Vec<_>>>()?;
            let score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            tracing::debug!(width, score, "regularizer candidate scored");
            Ok(RegularizerScore {
                width,
                score,
                fold_scores,
            })
        })
        .collect::<PaxResult<Vec<_>>>()?;

    let best_width = scores
        .iter()
        .min_by(|lhs, rhs| {
            lhs.score
                .total_cmp(&rhs.score)
                .then(lhs.width.total_cmp(&rhs.width))
        })
        .map(|score| score.width)
        .ok_or_else(|| PaxError::invalid_config("no regularizer width was scored"))?;
    tracing::info!(best_width, candidates = scores.len(), "regularizer selected");

    Ok(RegularizerSelection { best_width, scores })
}

fn split_fold(
    measurements: &[Spectrum],
    fold: usize,
    folds: usize,
) -> PaxResult<(Spectrum, Spectrum)> {
    let (held_out, training): (Vec<_>, Vec<_>) = measurements
        .iter()
        .enumerate()
        .partition(|(index, _)| index % folds == fold);
    let strip = |pairs: Vec<(usize, &Spectrum)>| {
        pairs
            .into_iter()
            .map(|(_, spectrum)| spectrum.clone())
            .collect::<Vec<_>>()
    };
    Ok((
        mean_spectrum(&strip(training))?,
        mean_spectrum(&strip(held_out))?,
    ))
}

fn score_fold(
    engine: &DeconvolutionEngine,
    training: &Spectrum,
    held_out: &Spectrum,
    response: &ResponseFunction,
) -> PaxResult<f64> {
    let result = engine.run(training, response)?;
    let held_total = held_out.total();
    let epsilon = engine.config().epsilon;
    if !(held_total > epsilon) {
        return Err(PaxError::DegenerateSpectrum {
            label: "held-out fold",
            sum: held_total,
            epsilon,
        });
    }

    let scale = training.total() / held_total;
    let target = held_out
        .intensities()
        .iter()
        .map(|value| value * scale)
        .collect::<Vec<_>>();
    let reblurred = convolve_same(
        result.estimate().intensities(),
        response.weights(),
        response.center(),
    );
    Ok(sum_squared_difference(&reblurred, &target))
}

#[cfg(test)]
mod tests {
    use super::select_regularizer;
    use crate::domain::{EnergyGrid, PaxError, ResponseFunction, Spectrum};
    use crate::modules::deconvolve::DeconvolutionConfig;
    use std::sync::Arc;

    fn measurements(count: usize) -> Vec<Spectrum> {
        let grid = Arc::new(EnergyGrid::uniform(0.0, 0.1, 16).expect("grid"));
        (0..count)
            .map(|offset| {
                let values = (0..16)
                    .map(|index| {
                        let x = index as f64 - 8.0;
                        100.0 * (-x * x / 8.0).exp() + ((index + offset) % 3) as f64
                    })
                    .collect();
                Spectrum::new(Arc::clone(&grid), values).expect("measurement")
            })
            .collect()
    }

    fn response() -> ResponseFunction {
        ResponseFunction::new(0.1, vec![0.25, 0.5, 0.25]).expect("response")
    }

    #[test]
    fn selection_is_deterministic_and_reports_every_width() {
        let config = DeconvolutionConfig::default().with_max_iterations(20);
        let widths = [0.3, 0.1, 0.2];
        let first =
            select_regularizer(&measurements(4), &response(), &widths, 2, config).expect("first");
        let second =
            select_regularizer(&measurements(4), &response(), &widths, 2, config).expect("second");

        assert_eq!(first, second);
        assert_eq!(
            first.scores.iter().map(|score| score.width).collect::<Vec<_>>(),
            widths.to_vec()
        );
        assert!(first.scores.iter().all(|score| score.fold_scores.len() == 2));
        let best = first.best().expect("best score");
        assert!(
            first
                .scores
                .iter()
                .all(|score| score.score >= best.score),
            "best width must have the lowest score"
        );
    }

    #[test]
    fn invalid_fold_setups_are_rejected() {
        let config = DeconvolutionConfig::default();
        let cases = [
            select_regularizer(&measurements(4), &response(), &[0.1], 1, config),
            select_regularizer(&measurements(2), &response(), &[0.1], 3, config),
            select_regularizer(&measurements(4), &response(), &[], 2, config),
            select_regularizer(&measurements(4), &response(), &[0.1, -0.2], 2, config),
        ];
        for case in cases {
            assert!(matches!(case, Err(PaxError::InvalidConfig { .. })));
        }
    }
}
