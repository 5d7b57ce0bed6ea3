//! Forward model: ground-truth RIXS spectrum ⊛ PAX response + counting noise.

mod model;
mod noise;

pub use model::{ModelPeak, PeakShape, model_spectrum};
pub use noise::{NoiseKind, NoiseModel};

use crate::domain::{
    PaxError, PaxResult, ResponseFunction, Spectrum, check_response_compatible, convolve,
};
use crate::numerics::{DEFAULT_EPSILON, normalized};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardSimulator {
    response: ResponseFunction,
    noise: NoiseModel,
}

impl ForwardSimulator {
    pub fn new(response: ResponseFunction, noise: NoiseModel) -> PaxResult<Self> {
        noise.validate()?;
        Ok(Self { response, noise })
    }

    pub fn response(&self) -> &ResponseFunction {
        &self.response
    }

    pub fn noise(&self) -> NoiseModel {
        self.noise
    }

    pub fn simulate(&self, ground_truth: &Spectrum, rng_seed: u64) -> PaxResult<Spectrum> {
        simulate(ground_truth, &self.response, self.noise, rng_seed)
    }

    pub fn simulate_repetitions(
        &self,
        ground_truth: &Spectrum,
        rng_seed: u64,
        repetitions: usize,
    ) -> PaxResult<Vec<Spectrum>> {
        simulate_repetitions(
            ground_truth,
            &self.response,
            self.noise,
            rng_seed,
            repetitions,
        )
    }
}

/// Expected counts per bin: the blurred truth as a distribution over bins,
/// scaled by the count budget.
pub fn expected_counts(
    ground_truth: &Spectrum,
    response: &ResponseFunction,
    total_counts: f64,
) -> PaxResult<Vec<f64>> {
    check_response_compatible(ground_truth, response)?;

    let mean = convolve(ground_truth, response);
    let distribution =
        normalized(mean.intensities(), DEFAULT_EPSILON).ok_or_else(|| {
            PaxError::DegenerateSpectrum {
                label: "noiseless measurement",
                sum: mean.total(),
                epsilon: DEFAULT_EPSILON,
            }
        })?;
    Ok(distribution
        .into_iter()
        .map(|probability| probability * total_counts)
        .collect())
}

/// One synthetic PAX measurement. The generator is seeded from `rng_seed`
/// only, so equal seeds give bit-identical spectra.
pub fn simulate(
    ground_truth: &Spectrum,
    response: &ResponseFunction,
    noise: NoiseModel,
    rng_seed: u64,
) -> PaxResult<Spectrum> {
    noise.validate()?;
    let expected = expected_counts(ground_truth, response, noise.total_counts)?;

    let mut rng = StdRng::seed_from_u64(rng_seed);
    let counts = noise::draw_counts(&expected, noise.kind, &mut rng)?;
    tracing::debug!(
        seed = rng_seed,
        noise = %noise.kind,
        budget = noise.total_counts,
        drawn = counts.iter().sum::<f64>(),
        "simulated PAX spectrum"
    );

    Spectrum::with_label(
        "simulated measurement",
        Arc::clone(ground_truth.shared_grid()),
        counts,
    )
}

/// `repetitions` independent measurements sharing the total count budget.
/// Repetition `i` is seeded with `rng_seed + i`; output order follows `i`.
pub fn simulate_repetitions(
    ground_truth: &Spectrum,
    response: &ResponseFunction,
    noise: NoiseModel,
    rng_seed: u64,
    repetitions: usize,
) -> PaxResult<Vec<Spectrum>> {
    if repetitions == 0 {
        return Err(PaxError::invalid_noise_config(
            "repetition count must be at least 1",
        ));
    }
    noise.validate()?;
    let per_repetition = noise.with_total_counts(noise.total_counts / repetitions as f64)?;

    (0..repetitions)
        .into_par_iter()
        .map(|index| {
            simulate(
                ground_truth,
                response,
                per_repetition,
                rng_seed.wrapping_add(index as u64),
            )
        })
        .collect()
}
