//! Sample statistics shared by the optimizer and the volatility estimator.
//!
//! Variance and covariance use Bessel's correction (divisor `n - 1`).

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance. NaN for fewer than two values.
///
/// Deviations are taken from the first value before squaring, so a constant
/// input gives exactly zero.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let shift = values[0];
    let (sum, sum_sq) = values.iter().fold((0.0, 0.0), |(s, sq), &v| {
        let d = v - shift;
        (s + d, sq + d * d)
    });
    let variance = (sum_sq - sum * sum / n as f64) / (n - 1) as f64;
    variance.max(0.0)
}

pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Sample covariance of two equal-length slices. NaN for fewer than two
/// pairs or mismatched lengths.
pub fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    if n < 2 || b.len() != n {
        return f64::NAN;
    }
    let mean_a = mean(a);
    let mean_b = mean(b);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Linear-interpolation quantile of already sorted values, `q` in [0, 1].
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
