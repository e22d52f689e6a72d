//! Cross-sectional rank correlation (Rank-IC).
//!
//! The Rank-IC of a period is the Spearman rank correlation between the
//! factor cross-section and the forward-return cross-section. Pairs with a
//! missing side are dropped; too few surviving pairs or a degenerate rank
//! vector make the period's coefficient missing, never an error.

/// Rank correlation between a factor cross-section and forward returns.
///
/// Restricts to positions where both sides are present and finite, ranks
/// each side with average ranks for ties, and returns the Spearman
/// coefficient plus the number of valid pairs. The coefficient is `None`
/// when fewer than `min_count` pairs survive or when either rank vector
/// has zero variance.
///
/// Being a rank statistic, the result is invariant under any strictly
/// increasing transform of either input.
///
/// # Example
///
/// ```
/// use ronda_eval::rank_ic;
///
/// let factor = [Some(1.0), Some(2.0), Some(3.0), None];
/// let returns = [Some(0.01), Some(0.02), Some(0.03), Some(0.04)];
/// let (ic, n_valid) = rank_ic(&factor, &returns, 2);
/// assert_eq!(n_valid, 3);
/// assert!((ic.unwrap() - 1.0).abs() < 1e-10);
/// ```
#[must_use]
pub fn rank_ic(
    factor: &[Option<f64>],
    forward_returns: &[Option<f64>],
    min_count: usize,
) -> (Option<f64>, usize) {
    let pairs: Vec<(f64, f64)> = factor
        .iter()
        .zip(forward_returns.iter())
        .filter_map(|(&f, &r)| match (f, r) {
            (Some(f), Some(r)) if f.is_finite() && r.is_finite() => Some((f, r)),
            _ => None,
        })
        .collect();

    let n_valid = pairs.len();
    if n_valid < min_count || n_valid < 2 {
        return (None, n_valid);
    }

    let factor_ranks = compute_ranks(&pairs.iter().map(|(f, _)| *f).collect::<Vec<_>>());
    let return_ranks = compute_ranks(&pairs.iter().map(|(_, r)| *r).collect::<Vec<_>>());

    (spearman(&factor_ranks, &return_ranks), n_valid)
}

/// Compute ranks of values, handling ties with average rank.
fn compute_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indexed: Vec<(usize, f64)> = values.iter().enumerate().map(|(i, &v)| (i, v)).collect();

    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;

    while i < n {
        let mut j = i;
        // Find ties
        while j < n && (indexed[j].1 - indexed[i].1).abs() < f64::EPSILON {
            j += 1;
        }

        // Average rank for ties
        let avg_rank = (i + j - 1) as f64 / 2.0;
        for k in i..j {
            ranks[indexed[k].0] = avg_rank;
        }

        i = j;
    }

    ranks
}

/// Pearson correlation of two rank vectors.
fn spearman(ranks_x: &[f64], ranks_y: &[f64]) -> Option<f64> {
    let n = ranks_x.len() as f64;
    if n < 2.0 {
        return None;
    }

    let mean_x: f64 = ranks_x.iter().sum::<f64>() / n;
    let mean_y: f64 = ranks_y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for i in 0..ranks_x.len() {
        let dx = ranks_x[i] - mean_x;
        let dy = ranks_y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
