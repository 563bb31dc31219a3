//! Property tests for the numeric kernel laws.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::utils::math;

    fn finite_vec(min_len: usize) -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(-1.0e6_f64..1.0e6, min_len..60)
    }

    proptest! {
        #[test]
        fn mean_is_translation_equivariant(values in finite_vec(1), shift in -1.0e3_f64..1.0e3) {
            let shifted: Vec<f64> = values.iter().map(|v| v + shift).collect();
            let m1 = math::mean(&values).unwrap();
            let m2 = math::mean(&shifted).unwrap();
            prop_assert!((m2 - (m1 + shift)).abs() < 1e-6);
        }

        #[test]
        fn stddev_is_translation_invariant(values in finite_vec(2), shift in -1.0e3_f64..1.0e3) {
            let shifted: Vec<f64> = values.iter().map(|v| v + shift).collect();
            let s1 = math::stddev(&values).unwrap();
            let s2 = math::stddev(&shifted).unwrap();
            prop_assert!((s1 - s2).abs() < 1e-5);
        }

        #[test]
        fn stddev_is_scale_sensitive(values in finite_vec(2), scale in 0.1_f64..10.0) {
            let scaled: Vec<f64> = values.iter().map(|v| v * scale).collect();
            let s1 = math::stddev(&values).unwrap();
            let s2 = math::stddev(&scaled).unwrap();
            prop_assert!((s2 - s1 * scale).abs() < 1e-4 * (1.0 + s1 * scale));
        }

        #[test]
        fn percentile_endpoints_are_min_and_max(values in finite_vec(1)) {
            let (min, max) = math::min_max(&values).unwrap();
            let p0 = math::percentile(&values, 0.0).unwrap();
            let p100 = math::percentile(&values, 100.0).unwrap();
            prop_assert!((p0 - min).abs() < 1e-9);
            prop_assert!((p100 - max).abs() < 1e-9);
        }

        #[test]
        fn percentile_is_monotone_in_p(values in finite_vec(1), p1 in 0.0_f64..100.0, p2 in 0.0_f64..100.0) {
            let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
            let v_lo = math::percentile(&values, lo).unwrap();
            let v_hi = math::percentile(&values, hi).unwrap();
            prop_assert!(v_lo <= v_hi + 1e-9);
        }

        #[test]
        fn pearson_stays_in_unit_interval(
            xs in finite_vec(3),
            ys in finite_vec(3),
        ) {
            let r = math::pearson_correlation(&xs, &ys).unwrap();
            prop_assert!((-1.0..=1.0).contains(&r));
        }

        #[test]
        fn pearson_is_one_for_exact_linear(
            values in prop::collection::vec(-1.0e3_f64..1.0e3, 3..40),
            slope in 0.1_f64..50.0,
            intercept in -100.0_f64..100.0,
        ) {
            // Need some variance on the x side for the relation to be visible.
            let spread = {
                let m = values.iter().sum::<f64>() / values.len() as f64;
                values.iter().map(|v| (v - m).abs()).fold(0.0_f64, f64::max)
            };
            prop_assume!(spread > 1e-3);
            let ys: Vec<f64> = values.iter().map(|x| slope * x + intercept).collect();
            let r = math::pearson_correlation(&values, &ys).unwrap();
            prop_assert!((r - 1.0).abs() < 1e-6);
            let neg: Vec<f64> = values.iter().map(|x| -slope * x + intercept).collect();
            let r_neg = math::pearson_correlation(&values, &neg).unwrap();
            prop_assert!((r_neg + 1.0).abs() < 1e-6);
        }

        #[test]
        fn regression_recovers_a_perfect_line(
            slope in -100.0_f64..100.0,
            intercept in -1.0e3_f64..1.0e3,
            n in 3_usize..50,
        ) {
            let points: Vec<(f64, f64)> = (0..n)
                .map(|i| (i as f64, slope * i as f64 + intercept))
                .collect();
            let fit = math::linear_regression(&points).unwrap();
            prop_assert!((fit.slope - slope).abs() < 1e-6 * (1.0 + slope.abs()));
            prop_assert!((fit.r_squared - 1.0).abs() < 1e-6);
        }

        #[test]
        fn regression_r_squared_bounded(points in prop::collection::vec((-1.0e3_f64..1.0e3, -1.0e3_f64..1.0e3), 2..40)) {
            let fit = math::linear_regression(&points).unwrap();
            prop_assert!((0.0..=1.0).contains(&fit.r_squared));
        }

        #[test]
        fn autocorrelation_bounded_at_small_lags(values in finite_vec(4)) {
            let ac = math::autocorrelation(&values, 1).unwrap();
            prop_assert!(ac.abs() <= 1.0 + 1e-9);
        }

        #[test]
        fn volatility_non_negative(values in prop::collection::vec(0.1_f64..1.0e4, 2..40)) {
            let v = math::volatility(&values).unwrap();
            prop_assert!(v >= 0.0);
        }

        #[test]
        fn anomaly_fraction_is_a_fraction(values in finite_vec(3)) {
            let frac = math::anomaly_fraction(&values, 2.0).unwrap();
            prop_assert!((0.0..=1.0).contains(&frac));
        }
    }
}
