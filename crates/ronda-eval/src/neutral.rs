//! Cross-sectional neutralization.
//!
//! Residualizes a period's factor values against known confounders (log
//! market value and industry membership) via ordinary least squares, so
//! the ranker sees only the factor's incremental information.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use ronda_traits::{Result, RondaError};

/// Neutralization mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neutralization {
    /// Use raw factor values.
    None,
    /// Residualize against log market value and industry dummies.
    #[default]
    MarketValueAndIndustry,
}

impl FromStr for Neutralization {
    type Err = RondaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "market_value_and_industry" => Ok(Self::MarketValueAndIndustry),
            other => Err(RondaError::UnsupportedConfig(format!(
                "neutralization `{other}`"
            ))),
        }
    }
}

/// Residualize one period's factor cross-section.
///
/// Inputs are parallel slices over the period's universe. Rows need a
/// finite factor value and a positive market value to enter the
/// regression; rows that do not are degraded to missing in the output
/// (a missing confounder means the residual is undefined). Industries
/// enter as dummies with the first category as baseline; unclassified
/// instruments share an implicit category.
///
/// The solve uses normal equations. A singular design matrix (constant
/// market value, one instrument per industry, ...) falls back to
/// intercept-only residuals, i.e. plain demeaning, which keeps the period
/// rankable.
#[must_use]
pub fn residualize(
    factor: &[Option<f64>],
    market_values: &[Option<f64>],
    industries: &[Option<&str>],
) -> Vec<Option<f64>> {
    debug_assert_eq!(factor.len(), market_values.len());
    debug_assert_eq!(factor.len(), industries.len());

    let rows: Vec<usize> = (0..factor.len())
        .filter(|&i| {
            factor[i].is_some_and(f64::is_finite)
                && market_values[i].is_some_and(|mv| mv.is_finite() && mv > 0.0)
        })
        .collect();

    let mut result = vec![None; factor.len()];
    if rows.is_empty() {
        return result;
    }

    let y = Array1::from_iter(rows.iter().map(|&i| factor[i].unwrap()));

    let categories: BTreeSet<&str> = rows
        .iter()
        .map(|&i| industries[i].unwrap_or(""))
        .collect();
    let dummies: Vec<&str> = categories.iter().skip(1).copied().collect();

    let k = 2 + dummies.len();
    let mut x = Array2::zeros((rows.len(), k));
    for (row, &i) in rows.iter().enumerate() {
        x[[row, 0]] = 1.0;
        x[[row, 1]] = market_values[i].unwrap().ln();
        let industry = industries[i].unwrap_or("");
        if let Some(pos) = dummies.iter().position(|&d| d == industry) {
            x[[row, 2 + pos]] = 1.0;
        }
    }

    let residuals = if rows.len() > k {
        let xtx = x.t().dot(&x);
        let xty = x.t().dot(&y);
        solve(xtx, xty).map(|beta| &y - &x.dot(&beta))
    } else {
        None
    };

    let residuals = residuals.unwrap_or_else(|| {
        log::warn!(
            "singular neutralization design ({} rows, {} regressors); demeaning instead",
            rows.len(),
            k
        );
        let mean = y.sum() / y.len() as f64;
        &y - mean
    });

    for (row, &i) in rows.iter().enumerate() {
        result[i] = Some(residuals[row]);
    }
    result
}

/// Solve `a·x = b` by Gaussian elimination with partial pivoting.
/// `None` when the matrix is singular to working precision.
fn solve(a: Array2<f64>, b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| {
                aug[[a, col]]
                    .abs()
                    .partial_cmp(&aug[[b, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap();
        if aug[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[pivot_row, j]];
                aug[[pivot_row, j]] = tmp;
            }
        }
        for row in (col + 1)..n {
            let factor = aug[[row, col]] / aug[[col, col]];
            for j in col..=n {
                aug[[row, j]] -= factor * aug[[col, j]];
            }
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut sum = aug[[row, n]];
        for j in (row + 1)..n {
            sum -= aug[[row, j]] * x[j];
        }
        x[row] = sum / aug[[row, row]];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_removes_size_effect() {
        // Factor is exactly 2·ln(mv) + 1; residuals should vanish.
        let market_values: Vec<Option<f64>> =
            [1.0f64, 2.0, 3.0, 5.0, 8.0].iter().map(|&v| Some(v.exp())).collect();
        let factor: Vec<Option<f64>> =
            [1.0f64, 2.0, 3.0, 5.0, 8.0].iter().map(|&v| Some(2.0 * v + 1.0)).collect();
        let industries = vec![None; 5];

        let residuals = residualize(&factor, &market_values, &industries);
        for r in residuals {
            assert_relative_eq!(r.unwrap(), 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_removes_industry_effect() {
        // Factor = ln(mv) + 4·[industry B]; a perfect fit leaves zero
        // residuals.
        let market_values: Vec<Option<f64>> =
            [1.0f64, 2.0, 1.5, 1.0, 2.0, 1.5].iter().map(|&v| Some(v.exp())).collect();
        let factor: Vec<Option<f64>> = [1.0, 2.0, 1.5, 5.0, 6.0, 5.5]
            .iter()
            .map(|&v| Some(v))
            .collect();
        let industries = vec![Some("A"), Some("A"), Some("A"), Some("B"), Some("B"), Some("B")];

        let residuals = residualize(&factor, &market_values, &industries);
        for r in residuals {
            assert_relative_eq!(r.unwrap(), 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_missing_market_value_degrades_row() {
        let factor = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)];
        let market_values = vec![Some(10.0), None, Some(30.0), Some(40.0), Some(50.0)];
        let industries = vec![None; 5];

        let residuals = residualize(&factor, &market_values, &industries);
        assert!(residuals[1].is_none());
        assert!(residuals[0].is_some());
    }

    #[test]
    fn test_nonpositive_market_value_degrades_row() {
        let factor = vec![Some(1.0), Some(2.0)];
        let market_values = vec![Some(0.0), Some(-5.0)];
        let industries = vec![None; 2];
        let residuals = residualize(&factor, &market_values, &industries);
        assert_eq!(residuals, vec![None, None]);
    }

    #[test]
    fn test_singular_design_falls_back_to_demeaning() {
        // Constant market value makes ln(mv) collinear with the
        // intercept.
        let factor = vec![Some(1.0), Some(2.0), Some(3.0), Some(6.0)];
        let market_values = vec![Some(100.0); 4];
        let industries = vec![None; 4];

        let residuals = residualize(&factor, &market_values, &industries);
        let expected = [-2.0, -1.0, 0.0, 3.0];
        for (r, e) in residuals.iter().zip(expected) {
            assert_relative_eq!(r.unwrap(), e, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_solve_simple_system() {
        let a = Array2::from_shape_vec((2, 2), vec![2.0, 1.0, 1.0, 3.0]).unwrap();
        let b = Array1::from_vec(vec![5.0, 10.0]);
        let x = solve(a, b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_singular_returns_none() {
        let a = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 2.0, 4.0]).unwrap();
        let b = Array1::from_vec(vec![1.0, 2.0]);
        assert!(solve(a, b).is_none());
    }
}
