//! Statistical analysis: two-proportion z-test vs. control
//!
//! The primary metric is treated as a rate; the z-test compares each
//! variant's rate against the control using the pooled-proportion standard
//! error. The standard normal CDF is the Abramowitz–Stegun rational
//! approximation (7.1.26), accurate to about 1.5e-7.

use crate::experiment::MetricAggregate;

// Abramowitz–Stegun 7.1.26 erf coefficients.
const A1: f64 = 0.254_829_592;
const A2: f64 = -0.284_496_736;
const A3: f64 = 1.421_413_741;
const A4: f64 = -1.453_152_027;
const A5: f64 = 1.061_405_429;
const P: f64 = 0.327_591_1;

/// Standard normal CDF Φ(z).
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    let sign = if z < 0.0 { -1.0 } else { 1.0 };
    let x = z.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    let erf = 1.0 - poly * (-x * x).exp();
    0.5 * (1.0 + sign * erf)
}

/// Two-proportion z-score of `(p2, n2)` against `(p1, n1)` using the
/// pooled-proportion standard error. Zero when either sample is empty or
/// the standard error degenerates to zero.
#[must_use]
pub fn two_proportion_z(p1: f64, n1: u64, p2: f64, n2: u64) -> f64 {
    if n1 == 0 || n2 == 0 {
        return 0.0;
    }
    let n1 = n1 as f64;
    let n2 = n2 as f64;
    let pooled = (p1 * n1 + p2 * n2) / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se == 0.0 {
        return 0.0;
    }
    (p2 - p1) / se
}

/// Two-tailed p-value for a z-score: `2·(1 − Φ(|z|))`.
#[must_use]
pub fn two_tailed_p_value(z: f64) -> f64 {
    (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0)
}

/// Critical z-value for a confidence level: 1.65 at 90%, 1.96 at 95%,
/// 2.58 at 99%.
#[must_use]
pub fn critical_z(confidence: f64) -> f64 {
    if confidence >= 0.99 {
        2.58
    } else if confidence >= 0.95 {
        1.96
    } else {
        1.65
    }
}

/// Confidence interval for a mean: `mean ± z*·(std_dev/√n)`.
#[must_use]
pub fn confidence_interval(mean: f64, std_dev: f64, n: u64, confidence: f64) -> (f64, f64) {
    if n == 0 {
        return (mean, mean);
    }
    let half = critical_z(confidence) * std_dev / (n as f64).sqrt();
    (mean - half, mean + half)
}

/// Cohen's d effect size with pooled standard deviation. Zero when the
/// pooled deviation degenerates.
#[must_use]
pub fn cohens_d(mean1: f64, sd1: f64, n1: u64, mean2: f64, sd2: f64, n2: u64) -> f64 {
    if n1 + n2 < 3 {
        return 0.0;
    }
    let n1 = n1 as f64;
    let n2 = n2 as f64;
    let pooled_var = ((n1 - 1.0) * sd1 * sd1 + (n2 - 1.0) * sd2 * sd2) / (n1 + n2 - 2.0);
    let pooled_sd = pooled_var.sqrt();
    if pooled_sd == 0.0 {
        return 0.0;
    }
    (mean2 - mean1) / pooled_sd
}

/// Analyzer output for one variant vs. control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Two-proportion z-score vs. control.
    pub z_score: f64,
    /// Two-tailed p-value.
    pub p_value: f64,
    /// Cohen's d effect size.
    pub effect_size: f64,
    /// Percentage lift of the variant mean over the control mean.
    pub improvement: f64,
    /// Confidence interval for the variant mean at `1 − α`.
    pub confidence_interval: (f64, f64),
    /// Whether `p_value < α`.
    pub is_significant: bool,
}

/// Statistical analyzer at a fixed significance level.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    alpha: f64,
}

impl Analyzer {
    /// Create an analyzer with significance level `alpha`.
    #[must_use]
    pub const fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    /// Significance level α.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Compare a variant's primary-metric aggregate against the control's.
    ///
    /// Comparing the control against itself yields `z = 0`, `p = 1` and no
    /// significance, so the same path serves every variant row.
    #[must_use]
    pub fn compare(&self, control: &MetricAggregate, variant: &MetricAggregate) -> Comparison {
        let p1 = control.mean();
        let p2 = variant.mean();
        let n1 = control.count();
        let n2 = variant.count();

        let z = two_proportion_z(p1, n1, p2, n2);
        let p_value = two_tailed_p_value(z);
        let effect_size = cohens_d(p1, control.std_dev(), n1, p2, variant.std_dev(), n2);
        let improvement = if p1 == 0.0 { 0.0 } else { (p2 - p1) / p1 * 100.0 };
        let ci = confidence_interval(p2, variant.std_dev(), n2, 1.0 - self.alpha);

        Comparison {
            z_score: z,
            p_value,
            effect_size,
            improvement,
            confidence_interval: ci,
            is_significant: p_value < self.alpha,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_aggregate(successes: u64, total: u64) -> MetricAggregate {
        let mut agg = MetricAggregate::new();
        for i in 0..total {
            agg.update(if i < successes { 1.0 } else { 0.0 });
        }
        agg
    }

    #[test]
    fn cdf_at_zero_is_half() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn cdf_known_values() {
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-3);
        assert!((normal_cdf(2.58) - 0.995).abs() < 1e-3);
        assert!(normal_cdf(6.0) > 0.999_999);
    }

    #[test]
    fn cdf_is_symmetric() {
        for z in [0.3, 1.0, 1.7, 2.9] {
            assert!((normal_cdf(z) + normal_cdf(-z) - 1.0).abs() < 1e-7);
        }
    }

    #[test]
    fn five_point_lift_at_n1000_is_significant() {
        // Control 10% of 1000, variant 15% of 1000.
        let z = two_proportion_z(0.10, 1000, 0.15, 1000);
        assert!(z > 3.0 && z < 3.8, "z = {z}");
        let p = two_tailed_p_value(z);
        assert!(p < 0.01, "p = {p}");
    }

    #[test]
    fn degenerate_inputs_give_zero_z() {
        assert_eq!(two_proportion_z(0.1, 0, 0.2, 100), 0.0);
        assert_eq!(two_proportion_z(0.1, 100, 0.2, 0), 0.0);
        // Identical all-zero rates: SE is 0.
        assert_eq!(two_proportion_z(0.0, 100, 0.0, 100), 0.0);
    }

    #[test]
    fn zero_z_means_p_of_one() {
        assert!((two_tailed_p_value(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn critical_z_levels() {
        assert!((critical_z(0.90) - 1.65).abs() < f64::EPSILON);
        assert!((critical_z(0.95) - 1.96).abs() < f64::EPSILON);
        assert!((critical_z(0.99) - 2.58).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_interval_brackets_mean() {
        let (lo, hi) = confidence_interval(0.5, 0.2, 100, 0.95);
        assert!(lo < 0.5 && hi > 0.5);
        assert!((hi - lo - 2.0 * 1.96 * 0.2 / 10.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_interval_collapses_without_samples() {
        assert_eq!(confidence_interval(0.4, 0.3, 0, 0.95), (0.4, 0.4));
    }

    #[test]
    fn cohens_d_sign_follows_direction() {
        let d = cohens_d(0.10, 0.3, 1000, 0.15, 0.36, 1000);
        assert!(d > 0.0);
        let d = cohens_d(0.15, 0.36, 1000, 0.10, 0.3, 1000);
        assert!(d < 0.0);
    }

    #[test]
    fn analyzer_flags_significance() {
        let analyzer = Analyzer::new(0.05);
        let control = rate_aggregate(100, 1000);
        let variant = rate_aggregate(150, 1000);

        let cmp = analyzer.compare(&control, &variant);
        assert!(cmp.is_significant);
        assert!(cmp.p_value < 0.01);
        assert!((cmp.improvement - 50.0).abs() < 1e-6);
        assert!(cmp.effect_size > 0.0);
    }

    #[test]
    fn analyzer_control_vs_itself_is_null() {
        let analyzer = Analyzer::new(0.05);
        let control = rate_aggregate(100, 1000);

        let cmp = analyzer.compare(&control, &control);
        assert_eq!(cmp.z_score, 0.0);
        assert!((cmp.p_value - 1.0).abs() < 1e-9);
        assert!(!cmp.is_significant);
        assert_eq!(cmp.improvement, 0.0);
    }

    #[test]
    fn analyzer_small_difference_not_significant() {
        let analyzer = Analyzer::new(0.05);
        let control = rate_aggregate(100, 1000);
        let variant = rate_aggregate(104, 1000);

        let cmp = analyzer.compare(&control, &variant);
        assert!(!cmp.is_significant);
    }
}
