pub mod convolution;

pub use convolution::{
    DEFAULT_EPSILON, GAUSSIAN_TRUNCATION_WIDTHS, convolve_same, elementwise_divide_safe,
    flip_kernel, gaussian_kernel, peak_index,
};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn l2_norm(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;
    for &value in values {
        kahan_add(&mut sum, &mut correction, value * value);
    }
    sum.sqrt()
}

pub fn sum_squared_difference(lhs: &[f64], rhs: &[f64]) -> f64 {
    debug_assert_eq!(lhs.len(), rhs.len());
    let mut sum = 0.0;
    let mut correction = 0.0;
    for (left, right) in lhs.iter().zip(rhs) {
        let delta = left - right;
        kahan_add(&mut sum, &mut correction, delta * delta);
    }
    sum
}

/// `||next - previous|| / ||previous||`; 0 when both vanish, infinite when
/// only `previous` does.
pub fn relative_change(previous: &[f64], next: &[f64]) -> f64 {
    let difference = sum_squared_difference(previous, next).sqrt();
    let reference = l2_norm(previous);
    if reference > 0.0 {
        difference / reference
    } else if difference == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

/// Rescales `values` to unit sum, or `None` when the sum does not exceed `epsilon`.
pub fn normalized(values: &[f64], epsilon: f64) -> Option<Vec<f64>> {
    let total = stable_sum(values);
    if !(total > epsilon) {
        return None;
    }
    Some(values.iter().map(|value| value / total).collect())
}

/// Cosine similarity of two equally long shapes; 0 if either is all zeros.
pub fn cosine_similarity(lhs: &[f64], rhs: &[f64]) -> f64 {
    debug_assert_eq!(lhs.len(), rhs.len());
    let dot = lhs.iter().zip(rhs).map(|(a, b)| a * b).sum::<f64>();
    let norms = l2_norm(lhs) * l2_norm(rhs);
    if norms > 0.0 { dot / norms } else { 0.0 }
}
