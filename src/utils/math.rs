//! Numeric kernel for the service sentinel.
//!
//! Pure, side-effect-free statistics over `f64` series. Every function
//! validates its inputs: a NaN or infinite value aborts the computation
//! with [`SentinelError::Domain`] so that callers can downgrade the
//! offending metric to "insufficient data" instead of propagating poison
//! values into detector scores.

use crate::utils::error::{SentinelError, SentinelResult};

/// Result of a least-squares linear fit over (minute, value) pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionFit {
    /// Slope in value units per minute
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, clamped to [0, 1]
    pub r_squared: f64,
    /// slope / mean * 100, or 0 when the mean is 0
    pub growth_rate_percent: f64,
}

impl RegressionFit {
    const ZERO: RegressionFit = RegressionFit {
        slope: 0.0,
        intercept: 0.0,
        r_squared: 0.0,
        growth_rate_percent: 0.0,
    };
}

fn ensure_finite(function: &str, values: &[f64]) -> SentinelResult<()> {
    for v in values {
        if !v.is_finite() {
            return Err(SentinelError::Domain {
                function: function.to_string(),
                reason: format!("non-finite input value {v}"),
            });
        }
    }
    Ok(())
}

/// Arithmetic mean. Empty input yields 0.
pub fn mean(values: &[f64]) -> SentinelResult<f64> {
    ensure_finite("mean", values)?;
    if values.is_empty() {
        return Ok(0.0);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation. Fewer than two values yields 0.
pub fn stddev(values: &[f64]) -> SentinelResult<f64> {
    ensure_finite("stddev", values)?;
    if values.len() < 2 {
        return Ok(0.0);
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Ok(variance.sqrt())
}

/// Minimum and maximum of a series. Empty input yields (0, 0).
pub fn min_max(values: &[f64]) -> SentinelResult<(f64, f64)> {
    ensure_finite("min_max", values)?;
    if values.is_empty() {
        return Ok((0.0, 0.0));
    }
    let mut lo = values[0];
    let mut hi = values[0];
    for &v in &values[1..] {
        if v < lo {
            lo = v;
        }
        if v > hi {
            hi = v;
        }
    }
    Ok((lo, hi))
}

/// Percentile with linear interpolation between sorted neighbors.
///
/// `percentile(values, 0)` equals the minimum and `percentile(values, 100)`
/// the maximum. `p` outside [0, 100] is a domain error.
pub fn percentile(values: &[f64], p: f64) -> SentinelResult<f64> {
    ensure_finite("percentile", values)?;
    if !(0.0..=100.0).contains(&p) {
        return Err(SentinelError::Domain {
            function: "percentile".to_string(),
            reason: format!("percentile {p} outside [0, 100]"),
        });
    }
    if values.is_empty() {
        return Ok(0.0);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() == 1 {
        return Ok(sorted[0]);
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Ok(sorted[lower]);
    }
    let weight = rank - lower as f64;
    Ok(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

/// Least-squares linear regression over (minute, value) pairs.
///
/// The x axis is expected in minutes so the returned slope reads as units
/// per minute. Fewer than two points, or zero x-variance, yields a zero fit.
pub fn linear_regression(points: &[(f64, f64)]) -> SentinelResult<RegressionFit> {
    for (x, y) in points {
        if !x.is_finite() || !y.is_finite() {
            return Err(SentinelError::Domain {
                function: "linear_regression".to_string(),
                reason: "non-finite input point".to_string(),
            });
        }
    }
    let n = points.len() as f64;
    if points.len() < 2 {
        return Ok(RegressionFit::ZERO);
    }
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut ss_xx = 0.0;
    let mut ss_xy = 0.0;
    let mut ss_yy = 0.0;
    for (x, y) in points {
        ss_xx += (x - mean_x) * (x - mean_x);
        ss_xy += (x - mean_x) * (y - mean_y);
        ss_yy += (y - mean_y) * (y - mean_y);
    }
    if ss_xx == 0.0 {
        return Ok(RegressionFit::ZERO);
    }
    let slope = ss_xy / ss_xx;
    let intercept = mean_y - slope * mean_x;
    // A flat series fits itself perfectly.
    let r_squared = if ss_yy == 0.0 {
        1.0
    } else {
        ((ss_xy * ss_xy) / (ss_xx * ss_yy)).clamp(0.0, 1.0)
    };
    let growth_rate_percent = if mean_y == 0.0 {
        0.0
    } else {
        slope / mean_y * 100.0
    };
    Ok(RegressionFit {
        slope,
        intercept,
        r_squared,
        growth_rate_percent,
    })
}

/// Pearson correlation coefficient of two equal-length series.
///
/// Returns 0 for fewer than three points or when either series has zero
/// variance. The result is clamped into [-1, 1] to absorb rounding.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> SentinelResult<f64> {
    ensure_finite("pearson_correlation", xs)?;
    ensure_finite("pearson_correlation", ys)?;
    let n = xs.len().min(ys.len());
    if n < 3 {
        return Ok(0.0);
    }
    let xs = &xs[..n];
    let ys = &ys[..n];
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return Ok(0.0);
    }
    Ok((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Autocorrelation at lag `k`: lagged covariance over variance.
///
/// Returns 0 when the variance is 0 or `k >= n`.
pub fn autocorrelation(values: &[f64], lag: usize) -> SentinelResult<f64> {
    ensure_finite("autocorrelation", values)?;
    let n = values.len();
    if lag >= n || n < 2 {
        return Ok(0.0);
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    if variance == 0.0 {
        return Ok(0.0);
    }
    let mut cov = 0.0;
    for i in 0..n - lag {
        cov += (values[i] - m) * (values[i + lag] - m);
    }
    Ok(cov / variance)
}

/// Spikiness: coefficient of variation of successive absolute differences.
///
/// A bursty series produces large, uneven jumps between neighbors and
/// therefore a high spikiness score; a smooth ramp scores near zero.
pub fn spikiness(values: &[f64]) -> SentinelResult<f64> {
    ensure_finite("spikiness", values)?;
    if values.len() < 3 {
        return Ok(0.0);
    }
    let diffs: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let m = diffs.iter().sum::<f64>() / diffs.len() as f64;
    if m == 0.0 {
        return Ok(0.0);
    }
    let var = diffs.iter().map(|d| (d - m).powi(2)).sum::<f64>() / diffs.len() as f64;
    Ok(var.sqrt() / m)
}

/// Fraction of points whose Z-score magnitude exceeds `z_threshold`.
pub fn anomaly_fraction(values: &[f64], z_threshold: f64) -> SentinelResult<f64> {
    ensure_finite("anomaly_fraction", values)?;
    if values.len() < 3 {
        return Ok(0.0);
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let sd = stddev(values)?;
    if sd == 0.0 {
        return Ok(0.0);
    }
    let outliers = values
        .iter()
        .filter(|v| ((**v - m) / sd).abs() > z_threshold)
        .count();
    Ok(outliers as f64 / values.len() as f64)
}

/// Volatility: standard deviation over mean, 0 when the mean is 0.
pub fn volatility(values: &[f64]) -> SentinelResult<f64> {
    ensure_finite("volatility", values)?;
    if values.len() < 2 {
        return Ok(0.0);
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    if m == 0.0 {
        return Ok(0.0);
    }
    Ok(stddev(values)? / m.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() < eps, "expected {b}, got {a}");
    }

    #[test]
    fn test_mean_basic() {
        assert_close(mean(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5, 1e-12);
        assert_close(mean(&[]).unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn test_mean_rejects_nan() {
        assert!(mean(&[1.0, f64::NAN]).is_err());
        assert!(mean(&[f64::INFINITY]).is_err());
    }

    #[test]
    fn test_stddev_translation_invariant() {
        let base = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let shifted: Vec<f64> = base.iter().map(|v| v + 100.0).collect();
        assert_close(stddev(&base).unwrap(), 2.0, 1e-12);
        assert_close(stddev(&shifted).unwrap(), 2.0, 1e-9);
    }

    #[test]
    fn test_percentile_endpoints() {
        let values = [15.0, 20.0, 35.0, 40.0, 50.0];
        assert_close(percentile(&values, 0.0).unwrap(), 15.0, 1e-12);
        assert_close(percentile(&values, 100.0).unwrap(), 50.0, 1e-12);
        assert_close(percentile(&values, 50.0).unwrap(), 35.0, 1e-12);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [10.0, 20.0];
        assert_close(percentile(&values, 75.0).unwrap(), 17.5, 1e-12);
    }

    #[test]
    fn test_regression_perfect_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 3.0 * i as f64 + 7.0)).collect();
        let fit = linear_regression(&points).unwrap();
        assert_close(fit.slope, 3.0, 1e-9);
        assert_close(fit.intercept, 7.0, 1e-9);
        assert_close(fit.r_squared, 1.0, 1e-9);
    }

    #[test]
    fn test_regression_flat_series() {
        let points: Vec<(f64, f64)> = (0..5).map(|i| (i as f64, 42.0)).collect();
        let fit = linear_regression(&points).unwrap();
        assert_close(fit.slope, 0.0, 1e-12);
        assert_close(fit.r_squared, 1.0, 1e-12);
    }

    #[test]
    fn test_pearson_exact_linear() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let up: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        let down: Vec<f64> = xs.iter().map(|x| -0.5 * x + 3.0).collect();
        assert_close(pearson_correlation(&xs, &up).unwrap(), 1.0, 1e-9);
        assert_close(pearson_correlation(&xs, &down).unwrap(), -1.0, 1e-9);
    }

    #[test]
    fn test_pearson_short_input_is_zero() {
        assert_close(pearson_correlation(&[1.0, 2.0], &[2.0, 4.0]).unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn test_autocorrelation_constant_series() {
        assert_close(autocorrelation(&[5.0; 10], 1).unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn test_autocorrelation_lag_too_large() {
        assert_close(autocorrelation(&[1.0, 2.0, 3.0], 3).unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn test_spikiness_smooth_vs_bursty() {
        let smooth: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let bursty: Vec<f64> = (0..30)
            .map(|i| if i % 7 == 0 { 40.0 } else { 1.0 })
            .collect();
        let s_smooth = spikiness(&smooth).unwrap();
        let s_bursty = spikiness(&bursty).unwrap();
        assert_close(s_smooth, 0.0, 1e-9);
        assert!(s_bursty > 1.0, "bursty spikiness {s_bursty} should exceed 1");
    }

    #[test]
    fn test_volatility_zero_mean() {
        assert_close(volatility(&[1.0, -1.0, 1.0, -1.0]).unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn test_anomaly_fraction_detects_outlier() {
        let mut values = vec![10.0; 29];
        values.push(100.0);
        let frac = anomaly_fraction(&values, 2.0).unwrap();
        assert_close(frac, 1.0 / 30.0, 1e-9);
    }
}
