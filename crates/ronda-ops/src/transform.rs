//! Fiscal-axis transforms: cumulative-to-quarter conversion, trailing
//! aggregation, differencing and lagging.
//!
//! All lookups go through the fiscal-quarter axis, never through array
//! positions, so gaps in an instrument's reporting history produce missing
//! values instead of silently comparing the wrong periods.

use ronda_traits::FiscalQuarter;

/// Index of `quarter` in a sorted axis, if present.
pub(crate) fn index_of(axis: &[FiscalQuarter], quarter: FiscalQuarter) -> Option<usize> {
    axis.binary_search(&quarter).ok()
}

/// Value at `quarter` in a series aligned to `axis`.
pub(crate) fn value_at(
    values: &[Option<f64>],
    axis: &[FiscalQuarter],
    quarter: FiscalQuarter,
) -> Option<f64> {
    index_of(axis, quarter).and_then(|index| values[index])
}

/// Convert a cumulative-to-date series into single-quarter values.
///
/// A fiscal year's first quarter passes through unchanged (the cumulative
/// value resets at the fiscal-year boundary); later quarters subtract the
/// prior quarter's cumulative value. A missing or unreported prior quarter
/// yields missing.
///
/// # Example
///
/// ```
/// use ronda_ops::quarter;
/// use ronda_traits::FiscalQuarter;
///
/// let axis: Vec<FiscalQuarter> = (1..=3)
///     .map(|q| FiscalQuarter::new(2024, q).unwrap())
///     .collect();
/// let cumulative = [Some(10.0), Some(25.0), Some(45.0)];
/// assert_eq!(
///     quarter(&cumulative, &axis),
///     vec![Some(10.0), Some(15.0), Some(20.0)]
/// );
/// ```
#[must_use]
pub fn quarter(values: &[Option<f64>], axis: &[FiscalQuarter]) -> Vec<Option<f64>> {
    axis.iter()
        .enumerate()
        .map(|(index, &fq)| {
            let current = values[index]?;
            if fq.is_first_quarter() {
                Some(current)
            } else {
                let prior = value_at(values, axis, fq.pred())?;
                Some(current - prior)
            }
        })
        .collect()
}

/// Trailing-twelve-month sum: the four most recent single-quarter values.
///
/// The operand is expected to already be single-quarter (see [`quarter`]).
/// Missing if any of the four quarters is missing or absent from the axis.
#[must_use]
pub fn ttm(values: &[Option<f64>], axis: &[FiscalQuarter]) -> Vec<Option<f64>> {
    axis.iter()
        .enumerate()
        .map(|(index, &fq)| {
            let mut sum = values[index]?;
            for lag in 1..4 {
                sum += value_at(values, axis, fq.minus(lag))?;
            }
            Some(sum)
        })
        .collect()
}

/// Current single-quarter value minus the prior fiscal quarter's, with no
/// fiscal-year reset.
#[must_use]
pub fn diff(values: &[Option<f64>], axis: &[FiscalQuarter]) -> Vec<Option<f64>> {
    axis.iter()
        .enumerate()
        .map(|(index, &fq)| {
            let current = values[index]?;
            let prior = value_at(values, axis, fq.pred())?;
            Some(current - prior)
        })
        .collect()
}

/// Lag a series by `n` fiscal quarters.
///
/// Lookup is by fiscal quarter: a lag landing in a reporting gap is
/// missing, not the value `n` array slots back.
#[must_use]
pub fn refq(values: &[Option<f64>], axis: &[FiscalQuarter], n: usize) -> Vec<Option<f64>> {
    axis.iter()
        .map(|&fq| value_at(values, axis, fq.minus(n)))
        .collect()
}
