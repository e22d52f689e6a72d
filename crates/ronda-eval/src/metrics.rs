//! Period statistics and the final metrics record.
//!
//! The aggregator reduces per-period rank correlations to the summary the
//! caller consumes: RankIC mean, its stability ratio (ICIR) and the
//! inferred factor direction, plus independently requested secondary
//! statistics. Metric labels serialize verbatim; they are domain labels,
//! not translated.

use serde::{Deserialize, Serialize};

use ronda_traits::stats::{MIN_STD_THRESHOLD, mean, sample_std};
use ronda_traits::{Date, Symbol};

use crate::ic::rank_ic;

/// Which secondary statistics to compute. Each is independently optional
/// and missing-safe; all are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRequest {
    /// Share of period ICs whose sign matches the factor direction.
    pub hit_rate: bool,
    /// Peak-to-trough drawdown of the cumulative direction-adjusted
    /// quintile spread return.
    pub max_drawdown: bool,
    /// Mean period-to-period instability of factor ranks.
    pub turnover: bool,
    /// Mean fraction of the universe with usable data.
    pub coverage: bool,
}

impl MetricsRequest {
    /// Request every secondary statistic.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            hit_rate: true,
            max_drawdown: true,
            turnover: true,
            coverage: true,
        }
    }
}

/// One rebalance period's statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodRecord {
    /// The rebalance date.
    pub date: Date,
    /// Spearman rank correlation for the period; `None` when the period
    /// was degraded (thin universe, constant cross-section, ...).
    pub ic: Option<f64>,
    /// Number of instruments with both a valid factor value and a valid
    /// forward return.
    pub n_valid: usize,
    /// Size of the period's universe before validity filtering.
    pub universe_size: usize,
    /// Top-minus-bottom quintile forward return, unadjusted for
    /// direction. Only populated when drawdown statistics were requested.
    pub spread_return: Option<f64>,
    /// Valid `(symbol, factor value)` pairs for turnover computation.
    /// Empty unless turnover was requested.
    pub factor_values: Vec<(Symbol, f64)>,
}

/// The final output of a backtest run. Created once per run, never
/// mutated after return.
///
/// Serializes as flat key/value JSON with the domain's verbatim UTF-8
/// metric labels; missing metrics are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Mean of the non-missing period rank correlations.
    #[serde(rename = "RankIC均值", skip_serializing_if = "Option::is_none", default)]
    pub rank_ic_mean: Option<f64>,

    /// RankIC mean divided by the standard deviation of the period ICs.
    #[serde(rename = "ICIR", skip_serializing_if = "Option::is_none", default)]
    pub icir: Option<f64>,

    /// Sign of the RankIC mean: `+1` or `-1`. Consumers negate the factor
    /// downstream when `-1`; the stored expression is never altered.
    #[serde(rename = "因子方向", skip_serializing_if = "Option::is_none", default)]
    pub direction: Option<i8>,

    /// Share of valid period ICs whose sign matches the direction.
    #[serde(rename = "胜率", skip_serializing_if = "Option::is_none", default)]
    pub hit_rate: Option<f64>,

    /// Maximum drawdown of the cumulative direction-adjusted quintile
    /// spread, reported as a non-positive number.
    #[serde(rename = "最大回撤", skip_serializing_if = "Option::is_none", default)]
    pub max_drawdown: Option<f64>,

    /// Mean period-to-period rank instability in `[0, 1]`.
    #[serde(rename = "换手率", skip_serializing_if = "Option::is_none", default)]
    pub turnover: Option<f64>,

    /// Mean fraction of the universe with a valid factor value and
    /// forward return.
    #[serde(rename = "因子覆盖度", skip_serializing_if = "Option::is_none", default)]
    pub coverage: Option<f64>,

    /// Total rebalance periods evaluated.
    pub n_periods: usize,

    /// Periods whose statistic was degraded to missing.
    pub degraded_periods: usize,
}

/// Aggregate period statistics into a [`MetricsRecord`].
///
/// Records are sorted by date first, so the result does not depend on the
/// completion order of parallel period evaluation.
#[must_use]
pub fn aggregate(mut records: Vec<PeriodRecord>, request: MetricsRequest) -> MetricsRecord {
    records.sort_by_key(|r| r.date);

    let valid_ics: Vec<f64> = records.iter().filter_map(|r| r.ic).collect();
    let n_periods = records.len();
    let degraded_periods = n_periods - valid_ics.len();

    let rank_ic_mean = mean(&valid_ics);
    let icir = rank_ic_mean.and_then(|m| {
        let std = sample_std(&valid_ics)?;
        if std > MIN_STD_THRESHOLD {
            Some(m / std)
        } else {
            None
        }
    });
    let direction = rank_ic_mean.map(|m| if m < 0.0 { -1i8 } else { 1 });

    let hit_rate = if request.hit_rate {
        direction.and_then(|d| {
            if valid_ics.is_empty() {
                None
            } else {
                let hits = valid_ics
                    .iter()
                    .filter(|&&ic| ic * f64::from(d) > 0.0)
                    .count();
                Some(hits as f64 / valid_ics.len() as f64)
            }
        })
    } else {
        None
    };

    let max_drawdown = if request.max_drawdown {
        direction.and_then(|d| spread_drawdown(&records, d))
    } else {
        None
    };

    let turnover = if request.turnover {
        mean_rank_turnover(&records)
    } else {
        None
    };

    let coverage = if request.coverage {
        let fractions: Vec<f64> = records
            .iter()
            .filter(|r| r.universe_size > 0)
            .map(|r| r.n_valid as f64 / r.universe_size as f64)
            .collect();
        mean(&fractions)
    } else {
        None
    };

    MetricsRecord {
        rank_ic_mean,
        icir,
        direction,
        hit_rate,
        max_drawdown,
        turnover,
        coverage,
        n_periods,
        degraded_periods,
    }
}

/// Drawdown of the compounded direction-adjusted spread return, as a
/// non-positive number.
fn spread_drawdown(records: &[PeriodRecord], direction: i8) -> Option<f64> {
    let spreads: Vec<f64> = records
        .iter()
        .filter_map(|r| r.spread_return)
        .map(|s| s * f64::from(direction))
        .collect();
    if spreads.is_empty() {
        return None;
    }

    let mut cumulative = Vec::with_capacity(spreads.len());
    let mut cum = 0.0;
    for spread in spreads {
        cum = (1.0 + cum) * (1.0 + spread) - 1.0;
        cumulative.push(cum);
    }

    let mut max_dd = 0.0;
    let mut peak = 0.0;
    for &cum_ret in &cumulative {
        if cum_ret > peak {
            peak = cum_ret;
        }
        let dd = (peak - cum_ret) / (1.0 + peak);
        if dd > max_dd {
            max_dd = dd;
        }
    }
    Some(-max_dd)
}

/// Mean of `(1 - ρ)/2` over consecutive-period rank correlations of
/// factor values on common instruments.
fn mean_rank_turnover(records: &[PeriodRecord]) -> Option<f64> {
    let mut turnovers = Vec::new();
    for window in records.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        if prev.factor_values.is_empty() || next.factor_values.is_empty() {
            continue;
        }
        let mut a = Vec::new();
        let mut b = Vec::new();
        for (symbol, value) in &prev.factor_values {
            if let Some((_, other)) = next.factor_values.iter().find(|(s, _)| s == symbol) {
                a.push(Some(*value));
                b.push(Some(*other));
            }
        }
        if let (Some(rho), _) = rank_ic(&a, &b, 2) {
            turnovers.push((1.0 - rho) / 2.0);
        }
    }
    mean(&turnovers)
}
