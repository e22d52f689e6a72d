//! Growth-rate operators: year-over-year and quarter-over-quarter.

use ronda_traits::FiscalQuarter;

use crate::transform::value_at;

/// Year-over-year growth: `(x[q] - x[q-4]) / |x[q-4]|`.
///
/// A zero base is an undefined ratio and yields missing, never infinity.
#[must_use]
pub fn yoy(values: &[Option<f64>], axis: &[FiscalQuarter]) -> Vec<Option<f64>> {
    growth(values, axis, 4)
}

/// Quarter-over-quarter growth: `(x[q] - x[q-1]) / |x[q-1]|`.
#[must_use]
pub fn qoq(values: &[Option<f64>], axis: &[FiscalQuarter]) -> Vec<Option<f64>> {
    growth(values, axis, 1)
}

fn growth(values: &[Option<f64>], axis: &[FiscalQuarter], lag: usize) -> Vec<Option<f64>> {
    axis.iter()
        .enumerate()
        .map(|(index, &fq)| {
            let current = values[index]?;
            let base = value_at(values, axis, fq.minus(lag))?;
            if base == 0.0 {
                None
            } else {
                Some((current - base) / base.abs())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn axis(quarters: &[(i32, u8)]) -> Vec<FiscalQuarter> {
        quarters
            .iter()
            .map(|&(y, q)| FiscalQuarter::new(y, q).unwrap())
            .collect()
    }

    #[test]
    fn test_yoy() {
        let axis = axis(&[(2023, 2), (2023, 3), (2024, 2)]);
        let values = [Some(10.0), Some(11.0), Some(15.0)];
        let result = yoy(&values, &axis);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_relative_eq!(result[2].unwrap(), 0.5);
    }

    #[test]
    fn test_yoy_negative_base_uses_abs() {
        let axis = axis(&[(2023, 2), (2024, 2)]);
        let values = [Some(-10.0), Some(5.0)];
        // (5 - (-10)) / |-10| = 1.5
        assert_relative_eq!(yoy(&values, &axis)[1].unwrap(), 1.5);
    }

    #[test]
    fn test_yoy_zero_base_is_missing() {
        let axis = axis(&[(2023, 2), (2024, 2)]);
        let values = [Some(0.0), Some(5.0)];
        assert_eq!(yoy(&values, &axis)[1], None);
    }

    #[test]
    fn test_qoq() {
        let axis = axis(&[(2024, 1), (2024, 2)]);
        let values = [Some(4.0), Some(5.0)];
        let result = qoq(&values, &axis);
        assert_eq!(result[0], None);
        assert_relative_eq!(result[1].unwrap(), 0.25);
    }

    #[test]
    fn test_qoq_missing_base() {
        let axis = axis(&[(2024, 1), (2024, 2)]);
        let values = [None, Some(5.0)];
        assert_eq!(qoq(&values, &axis), vec![None, None]);
    }
}
