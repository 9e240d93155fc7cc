//! Descriptive statistics: simple linear regression and Pearson correlation.
//!
//! Significance uses a two-sided Student's t test with `n - 2` degrees of
//! freedom, so p-values need at least three observations.

use nalgebra::DVector;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::math::ols::{design_matrix, solve_least_squares};

/// Result of fitting `y = intercept + slope * x`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
    /// Absent when `y` is constant.
    pub r_squared: Option<f64>,
    pub slope_std_err: Option<f64>,
    pub p_value: Option<f64>,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub n: usize,
    pub r: f64,
    pub p_value: Option<f64>,
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

fn centered_sum_of_products(xs: &[f64], x_mean: f64, ys: &[f64], y_mean: f64) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum()
}

/// Ordinary least squares of `ys` on `xs`.
///
/// `None` when there are fewer than two points, the lengths differ, or `xs`
/// is constant.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len();
    if n < 2 || ys.len() != n {
        return None;
    }

    let x_mean = mean(xs);
    let y_mean = mean(ys);
    let sxx = centered_sum_of_products(xs, x_mean, xs, x_mean);
    if sxx <= f64::EPSILON * n as f64 {
        return None;
    }

    // Centering x keeps the system well conditioned when x is a year.
    let centered: Vec<f64> = xs.iter().map(|x| x - x_mean).collect();
    let beta = solve_least_squares(&design_matrix(&centered), &DVector::from_column_slice(ys))?;
    let slope = beta[1];
    let intercept = beta[0] - slope * x_mean;

    let sse: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let sst = centered_sum_of_products(ys, y_mean, ys, y_mean);
    let r_squared = (sst > 0.0).then(|| (1.0 - sse / sst).clamp(0.0, 1.0));

    let dof = n - 2;
    let (slope_std_err, p_value) = if dof > 0 {
        let se = (sse / dof as f64 / sxx).sqrt();
        (Some(se), t_test_p_value(slope, se, dof))
    } else {
        (None, None)
    };

    Some(LinearFit {
        n,
        slope,
        intercept,
        r_squared,
        slope_std_err,
        p_value,
    })
}

/// Pearson correlation of paired samples.
///
/// `None` with fewer than two pairs or when either side is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<Correlation> {
    let n = xs.len();
    if n < 2 || ys.len() != n {
        return None;
    }

    let x_mean = mean(xs);
    let y_mean = mean(ys);
    let sxx = centered_sum_of_products(xs, x_mean, xs, x_mean);
    let syy = centered_sum_of_products(ys, y_mean, ys, y_mean);
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }

    let r = (centered_sum_of_products(xs, x_mean, ys, y_mean) / (sxx * syy).sqrt()).clamp(-1.0, 1.0);

    let dof = n - 2;
    let p_value = if dof == 0 {
        None
    } else if (1.0 - r.abs()) <= f64::EPSILON {
        Some(0.0)
    } else {
        let t = r * (dof as f64 / (1.0 - r * r)).sqrt();
        t_test_p_value(t, 1.0, dof)
    };

    Some(Correlation { n, r, p_value })
}

/// Two-sided p-value of `estimate / std_err` under Student's t.
fn t_test_p_value(estimate: f64, std_err: f64, dof: usize) -> Option<f64> {
    if dof == 0 {
        return None;
    }
    let t = estimate / std_err;
    if t.is_nan() {
        return None;
    }
    if t.is_infinite() {
        return Some(0.0);
    }
    let dist = StudentsT::new(0.0, 1.0, dof as f64).ok()?;
    Some((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line_is_recovered() {
        let xs = [2000.0, 2001.0, 2002.0, 2003.0];
        let ys: Vec<f64> = xs.iter().map(|x| 1.5 * x - 2900.0).collect();
        let fit = linear_regression(&xs, &ys).unwrap();
        assert!((fit.slope - 1.5).abs() < 1e-9);
        assert!((fit.intercept + 2900.0).abs() < 1e-6);
        assert!((fit.r_squared.unwrap() - 1.0).abs() < 1e-12);
        assert!(fit.p_value.unwrap() < 1e-9);
    }

    #[test]
    fn noisy_fit_matches_textbook_values() {
        // y = 1 + 2x with residuals (+1, -1, -1, +1) around x = 0..3
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [2.0, 2.0, 4.0, 8.0];
        let fit = linear_regression(&xs, &ys).unwrap();
        // slope = Sxy/Sxx = 10 / 5, intercept = 4 - 2 * 1.5
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        // SSE = 4, SST = 24
        assert!((fit.r_squared.unwrap() - 5.0 / 6.0).abs() < 1e-12);
        // se = sqrt(4 / 2 / 5)
        assert!((fit.slope_std_err.unwrap() - 0.4f64.sqrt()).abs() < 1e-12);
        let p = fit.p_value.unwrap();
        assert!(p > 0.05 && p < 0.15, "p = {p}");
    }

    #[test]
    fn two_points_fit_without_significance() {
        let fit = linear_regression(&[1.0, 2.0], &[3.0, 5.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert_eq!(fit.slope_std_err, None);
        assert_eq!(fit.p_value, None);
    }

    #[test]
    fn degenerate_inputs_are_skipped() {
        assert!(linear_regression(&[1.0], &[1.0]).is_none());
        assert!(linear_regression(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(pearson(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0]).is_none());
        assert!(pearson(&[1.0], &[2.0]).is_none());
    }

    #[test]
    fn constant_response_has_no_r_squared() {
        let fit = linear_regression(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).unwrap();
        assert!(fit.slope.abs() < 1e-12);
        assert_eq!(fit.r_squared, None);
    }

    #[test]
    fn pearson_signs_and_bounds() {
        let up = pearson(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.1, 5.9, 8.2]).unwrap();
        assert!(up.r > 0.99 && up.r <= 1.0);
        let down = pearson(&[1.0, 2.0, 3.0, 4.0], &[8.0, 6.0, 4.0, 2.0]).unwrap();
        assert!((down.r + 1.0).abs() < 1e-12);
        assert_eq!(down.p_value, Some(0.0));
    }

    #[test]
    fn pearson_p_value_for_weak_correlation_is_large() {
        let c = pearson(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 1.0, 4.0, 3.0, 2.5]).unwrap();
        assert!(c.p_value.unwrap() > 0.3);
    }
}
