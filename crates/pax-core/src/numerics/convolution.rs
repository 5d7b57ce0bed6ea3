//! Same-length discrete convolution kernels used by the simulator and the
//! Richardson–Lucy update.
//!
//! A kernel is a weight slice plus the index of the sample that sits at zero
//! energy offset. Convolution with zero padding reads
//! `out[i] = sum_j kernel[j] * signal[i - j + center]`, keeping only the terms
//! whose signal index falls inside the signal.

/// Near-zero threshold used by the safe division and degeneracy checks.
pub const DEFAULT_EPSILON: f64 = 1.0e-12;

/// Gaussian smoothing kernels are truncated at this many standard deviations.
pub const GAUSSIAN_TRUNCATION_WIDTHS: f64 = 4.0;

pub fn convolve_same(signal: &[f64], kernel: &[f64], center: usize) -> Vec<f64> {
    let signal_len = signal.len();
    let mut output = vec![0.0; signal_len];
    if signal_len == 0 || kernel.is_empty() {
        return output;
    }

    for (index, value) in output.iter_mut().enumerate() {
        let shifted = index + center;
        let first = (shifted + 1).saturating_sub(signal_len);
        let last = shifted.min(kernel.len() - 1);
        if first > last {
            continue;
        }

        let mut accumulated = 0.0;
        for (offset, weight) in kernel.iter().enumerate().take(last + 1).skip(first) {
            accumulated += weight * signal[shifted - offset];
        }
        *value = accumulated;
    }

    output
}

/// Reverses a kernel about its center. Convolving with the result is the
/// adjoint (correlation) of convolving with the original kernel.
pub fn flip_kernel(kernel: &[f64], center: usize) -> (Vec<f64>, usize) {
    let flipped = kernel.iter().rev().copied().collect::<Vec<_>>();
    let flipped_center = kernel.len().saturating_sub(1).saturating_sub(center);
    (flipped, flipped_center)
}

/// `numerator[i] / denominator[i]` where the denominator exceeds `epsilon`, else 0.
pub fn elementwise_divide_safe(numerator: &[f64], denominator: &[f64], epsilon: f64) -> Vec<f64> {
    debug_assert_eq!(numerator.len(), denominator.len());
    numerator
        .iter()
        .zip(denominator)
        .map(|(top, bottom)| if *bottom > epsilon { top / bottom } else { 0.0 })
        .collect()
}

/// Index of the first maximum; the conventional center of a sampled kernel.
pub fn peak_index(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

/// Unit-sum Gaussian of standard deviation `width`, sampled at `spacing`
/// and centered on its middle sample. The half span never exceeds
/// `max_half_span`; samples further out cannot overlap a signal of
/// `max_half_span + 1` bins.
pub fn gaussian_kernel(width: f64, spacing: f64, max_half_span: usize) -> (Vec<f64>, usize) {
    let half_span = ((GAUSSIAN_TRUNCATION_WIDTHS * width / spacing).ceil() as usize)
        .max(1)
        .min(max_half_span);
    let mut weights = (0..=2 * half_span)
        .map(|index| {
            let offset = (index as f64 - half_span as f64) * spacing;
            (-0.5 * (offset / width).powi(2)).exp()
        })
        .collect::<Vec<_>>();
    let total = weights.iter().sum::<f64>();
    for weight in &mut weights {
        *weight /= total;
    }
    (weights, half_span)
}

#[cfg(test)]
mod tests {
    use super::{
        convolve_same, elementwise_divide_safe, flip_kernel, gaussian_kernel, peak_index,
    };

    #[test]
    fn convolution_with_impulse_is_identity() {
        let signal = [1.0, 4.0, 2.0, 0.5];
        assert_eq!(convolve_same(&signal, &[1.0], 0), signal.to_vec());
        assert_eq!(convolve_same(&signal, &[0.0, 1.0, 0.0], 1), signal.to_vec());
    }

    #[test]
    fn centered_kernel_spreads_without_shifting() {
        let signal = [0.0, 0.0, 1.0, 0.0, 0.0];
        let output = convolve_same(&signal, &[0.25, 0.5, 0.25], 1);
        assert_eq!(output, vec![0.0, 0.25, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn off_center_kernel_shifts_toward_higher_indices() {
        let signal = [0.0, 1.0, 0.0, 0.0];
        let output = convolve_same(&signal, &[0.5, 0.5], 0);
        assert_eq!(output, vec![0.0, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn edges_are_zero_padded_not_wrapped() {
        let signal = [2.0, 0.0, 0.0, 3.0];
        let output = convolve_same(&signal, &[0.25, 0.5, 0.25], 1);
        assert_eq!(output, vec![1.0, 0.5, 0.75, 1.5]);
    }

    #[test]
    fn flip_is_an_involution_and_moves_the_center() {
        let kernel = [0.1, 0.6, 0.2, 0.1];
        let (flipped, center) = flip_kernel(&kernel, 1);
        assert_eq!(flipped, vec![0.1, 0.2, 0.6, 0.1]);
        assert_eq!(center, 2);

        let (restored, restored_center) = flip_kernel(&flipped, center);
        assert_eq!(restored, kernel.to_vec());
        assert_eq!(restored_center, 1);
    }

    #[test]
    fn flipped_kernel_convolution_is_the_adjoint() {
        let kernel = [0.1, 0.6, 0.2, 0.1];
        let center = 1;
        let x = [0.3, 1.7, 0.0, 2.2, 0.9, 1.1];
        let y = [1.4, 0.2, 0.8, 0.0, 3.1, 0.5];
        let (flipped, flipped_center) = flip_kernel(&kernel, center);

        let hx = convolve_same(&x, &kernel, center);
        let hty = convolve_same(&y, &flipped, flipped_center);
        let lhs = hx.iter().zip(&y).map(|(a, b)| a * b).sum::<f64>();
        let rhs = x.iter().zip(&hty).map(|(a, b)| a * b).sum::<f64>();
        assert!(
            (lhs - rhs).abs() <= 1.0e-12,
            "adjoint mismatch lhs={lhs:.15e} rhs={rhs:.15e}"
        );
    }

    #[test]
    fn safe_divide_zeroes_near_zero_denominators() {
        let ratio = elementwise_divide_safe(&[1.0, 2.0, 3.0], &[2.0, 1.0e-15, 0.0], 1.0e-12);
        assert_eq!(ratio, vec![0.5, 0.0, 0.0]);
    }

    #[test]
    fn peak_index_prefers_first_maximum() {
        assert_eq!(peak_index(&[0.5, 0.5]), 0);
        assert_eq!(peak_index(&[0.1, 0.3, 0.6, 0.6]), 2);
        assert_eq!(peak_index(&[]), 0);
    }

    #[test]
    fn gaussian_kernel_is_symmetric_and_normalized() {
        let (weights, center) = gaussian_kernel(0.25, 0.125, 100);
        assert_eq!(center, 8);
        assert_eq!(weights.len(), 17);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() <= 1.0e-12);
        assert_eq!(peak_index(&weights), center);
        for offset in 1..=center {
            assert!((weights[center - offset] - weights[center + offset]).abs() <= 1.0e-15);
        }
    }

    #[test]
    fn wide_gaussian_kernel_is_truncated_to_the_signal() {
        let (weights, center) = gaussian_kernel(1.0e300, 0.005, 3);
        assert_eq!(center, 3);
        assert_eq!(weights.len(), 7);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() <= 1.0e-12);

        let (weights, center) = gaussian_kernel(1.0e6, 0.005, 0);
        assert_eq!((weights, center), (vec![1.0], 0));
    }
}
