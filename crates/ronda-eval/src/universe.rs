//! Per-period instrument eligibility.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use ronda_traits::{Date, Panel, Result, RondaError, Symbol};

/// Which instruments are eligible for a period's cross-section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseRule {
    /// Exclude recently listed instruments and those flagged
    /// special-treatment as of the rebalance date.
    #[default]
    ExcludeNewListingsAndSpecialTreatment,
}

impl FromStr for UniverseRule {
    type Err = RondaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exclude_new_listings_and_special_treatment" => {
                Ok(Self::ExcludeNewListingsAndSpecialTreatment)
            }
            other => Err(RondaError::UnsupportedConfig(format!(
                "universe rule `{other}`"
            ))),
        }
    }
}

/// The eligible instruments at `date`.
///
/// Recomputed per rebalance date, never cached across periods. An
/// instrument is excluded when its listing date falls inside the trailing
/// `listing_window_days` window (unknown listing dates are kept) or when
/// its special-treatment flag is set as of `date`.
#[must_use]
pub fn universe_at(
    panel: &Panel,
    date: Date,
    rule: UniverseRule,
    listing_window_days: i64,
) -> Vec<Symbol> {
    let UniverseRule::ExcludeNewListingsAndSpecialTreatment = rule;
    let cutoff = date - chrono::Duration::days(listing_window_days);
    panel
        .symbols()
        .filter(|symbol| {
            if let Some(listed) = panel.list_date(symbol) {
                if listed > cutoff {
                    return false;
                }
            }
            !panel.is_special_treatment(symbol, date)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ronda_traits::ST_FLAG_FIELD;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    fn panel() -> Panel {
        let mut builder = Panel::builder();
        builder
            .market("OLD", date(2024, 6, 3), "close", 10.0)
            .list_date("OLD", date(2019, 5, 1))
            .market("IPO", date(2024, 6, 3), "close", 20.0)
            .list_date("IPO", date(2024, 5, 10))
            .market("FLAGGED", date(2024, 6, 3), ST_FLAG_FIELD, 1.0)
            .list_date("FLAGGED", date(2018, 1, 1))
            .market("UNKNOWN", date(2024, 6, 3), "close", 30.0);
        builder.build().unwrap()
    }

    #[test]
    fn test_excludes_recent_listings_and_flags() {
        let universe = universe_at(
            &panel(),
            date(2024, 6, 10),
            UniverseRule::default(),
            120,
        );
        assert_eq!(universe, vec!["OLD".to_string(), "UNKNOWN".to_string()]);
    }

    #[test]
    fn test_listing_window_rolls_off() {
        // A year later the May 2024 IPO is seasoned and the ST flag as-of
        // lookup still sees the flag.
        let universe = universe_at(
            &panel(),
            date(2025, 6, 10),
            UniverseRule::default(),
            120,
        );
        assert!(universe.contains(&"IPO".to_string()));
        assert!(!universe.contains(&"FLAGGED".to_string()));
    }

    #[test]
    fn test_rule_from_str() {
        assert!(
            "exclude_new_listings_and_special_treatment"
                .parse::<UniverseRule>()
                .is_ok()
        );
        assert!(matches!(
            "all".parse::<UniverseRule>(),
            Err(RondaError::UnsupportedConfig(_))
        ));
    }
}
