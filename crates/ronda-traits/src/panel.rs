//! The panel: the immutable dataset a backtest run consumes.
//!
//! A [`Panel`] holds two groups of observations per instrument:
//!
//! - **Fundamental** fields keyed by [`FiscalQuarter`] (reported income
//!   statement / balance sheet values), each observation optionally tagged
//!   with the date it became publicly available.
//! - **Market** fields keyed by trading [`Date`] (prices, volume-weighted
//!   average price, market value, status flags).
//!
//! Missing values are explicit (`Option<f64>`), never silently zero, and
//! every `(instrument, period)` key is unique; duplicates fail at
//! construction. A panel is never mutated after construction, which lets a
//! backtest share it read-only across worker threads.

use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{Result, RondaError};
use crate::types::{Date, FiscalQuarter, Symbol, UNIX_EPOCH_DAYS_FROM_CE};

/// Canonical market field holding total market value (float shares ×
/// price), used by size neutralization and the `op2` operator.
pub const MARKET_VALUE_FIELD: &str = "market_value";

/// Canonical market field flagging special-treatment status (nonzero =
/// flagged). Instruments without the field are treated as never flagged.
pub const ST_FLAG_FIELD: &str = "st";

/// Per-instrument observations. Axes are sorted; field vectors are
/// parallel to their axis.
#[derive(Debug, Clone, Default)]
struct Instrument {
    list_date: Option<Date>,
    industry: Option<String>,
    quarters: Vec<FiscalQuarter>,
    announce: Vec<Option<Date>>,
    fundamentals: HashMap<String, Vec<Option<f64>>>,
    dates: Vec<Date>,
    market: HashMap<String, Vec<Option<f64>>>,
}

/// Immutable panel of fundamental and market observations.
///
/// Build one with [`Panel::builder`] or [`Panel::from_frames`].
#[derive(Debug, Clone)]
pub struct Panel {
    trading_dates: Vec<Date>,
    instruments: BTreeMap<Symbol, Instrument>,
    fundamental_fields: BTreeSet<String>,
    market_fields: BTreeSet<String>,
}

impl Panel {
    /// Start building a panel row by row.
    #[must_use]
    pub fn builder() -> PanelBuilder {
        PanelBuilder::default()
    }

    /// Build a panel from Polars DataFrames.
    ///
    /// `fundamentals` must have `symbol` (string), `year` and `quarter`
    /// (integer) columns, an optional `announce_date` (date) column, and
    /// one numeric column per fundamental field. `market` must have
    /// `symbol` and `date` columns plus one numeric column per market
    /// field. The optional `instruments` frame carries per-instrument
    /// metadata: `symbol` plus optional `list_date` (date) and `industry`
    /// (string) columns.
    ///
    /// # Errors
    ///
    /// Fails on missing key columns, non-castable field columns, invalid
    /// quarter numbers, or duplicate `(symbol, quarter)` / `(symbol, date)`
    /// rows.
    pub fn from_frames(
        fundamentals: &DataFrame,
        market: &DataFrame,
        instruments: Option<&DataFrame>,
    ) -> Result<Self> {
        let mut builder = Self::builder();

        // Fundamental rows
        let symbols = str_column(fundamentals, "symbol")?;
        let years = int_column(fundamentals, "year")?;
        let quarters = int_column(fundamentals, "quarter")?;
        let announce = if has_column(fundamentals, "announce_date") {
            date_column(fundamentals, "announce_date")?
        } else {
            vec![None; fundamentals.height()]
        };
        let field_names: Vec<String> = fundamentals
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| !matches!(name.as_str(), "symbol" | "year" | "quarter" | "announce_date"))
            .collect();
        let mut fields = Vec::with_capacity(field_names.len());
        for name in &field_names {
            fields.push(float_column(fundamentals, name)?);
        }

        let mut seen_fundamental = HashSet::new();
        for row in 0..fundamentals.height() {
            let symbol = required(&symbols[row], "symbol", row)?;
            let year = required(&years[row], "year", row)?;
            let quarter = required(&quarters[row], "quarter", row)?;
            let fq = FiscalQuarter::new(
                year as i32,
                u8::try_from(quarter).map_err(|_| {
                    RondaError::InvalidDate(format!("quarter out of range: {quarter}"))
                })?,
            )?;
            if !seen_fundamental.insert((symbol.clone(), fq)) {
                return Err(RondaError::InvalidData(format!(
                    "duplicate fundamental key ({symbol}, {fq})"
                )));
            }
            builder.quarter_row(&symbol, fq, announce[row]);
            for (field, values) in field_names.iter().zip(&fields) {
                if let Some(value) = values[row] {
                    builder.fundamental(&symbol, fq, field, value);
                }
            }
        }

        // Market rows
        let symbols = str_column(market, "symbol")?;
        let dates = date_column(market, "date")?;
        let field_names: Vec<String> = market
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| !matches!(name.as_str(), "symbol" | "date"))
            .collect();
        let mut fields = Vec::with_capacity(field_names.len());
        for name in &field_names {
            fields.push(float_column(market, name)?);
        }

        let mut seen_market = HashSet::new();
        for row in 0..market.height() {
            let symbol = required(&symbols[row], "symbol", row)?;
            let date = required(&dates[row], "date", row)?;
            if !seen_market.insert((symbol.clone(), date)) {
                return Err(RondaError::InvalidData(format!(
                    "duplicate market key ({symbol}, {date})"
                )));
            }
            for (field, values) in field_names.iter().zip(&fields) {
                if let Some(value) = values[row] {
                    builder.market(&symbol, date, field, value);
                }
            }
        }

        // Instrument metadata
        if let Some(meta) = instruments {
            let symbols = str_column(meta, "symbol")?;
            let list_dates = if has_column(meta, "list_date") {
                date_column(meta, "list_date")?
            } else {
                vec![None; meta.height()]
            };
            let industries = if has_column(meta, "industry") {
                str_column(meta, "industry")?
            } else {
                vec![None; meta.height()]
            };
            for row in 0..meta.height() {
                let symbol = required(&symbols[row], "symbol", row)?;
                if let Some(date) = list_dates[row] {
                    builder.list_date(&symbol, date);
                }
                if let Some(ref industry) = industries[row] {
                    builder.industry(&symbol, industry);
                }
            }
        }

        builder.build()
    }

    /// All instrument symbols in the panel, in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.instruments.keys()
    }

    /// Number of instruments.
    #[must_use]
    pub fn n_instruments(&self) -> usize {
        self.instruments.len()
    }

    /// Whether the panel has no instruments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// The union of all instruments' trading dates, sorted ascending.
    #[must_use]
    pub fn trading_dates(&self) -> &[Date] {
        &self.trading_dates
    }

    /// Whether any instrument carries the named fundamental field.
    #[must_use]
    pub fn has_fundamental_field(&self, name: &str) -> bool {
        self.fundamental_fields.contains(name)
    }

    /// Whether any instrument carries the named market field.
    #[must_use]
    pub fn has_market_field(&self, name: &str) -> bool {
        self.market_fields.contains(name)
    }

    /// The sorted fiscal-quarter axis of an instrument's fundamentals.
    #[must_use]
    pub fn quarters(&self, symbol: &str) -> &[FiscalQuarter] {
        self.instruments
            .get(symbol)
            .map_or(&[], |inst| inst.quarters.as_slice())
    }

    /// An instrument's values for a fundamental field, parallel to
    /// [`Panel::quarters`]. `None` if the instrument never reports the
    /// field (callers treat that as an all-missing series).
    #[must_use]
    pub fn fundamental_series(&self, symbol: &str, field: &str) -> Option<&[Option<f64>]> {
        self.instruments
            .get(symbol)
            .and_then(|inst| inst.fundamentals.get(field))
            .map(Vec::as_slice)
    }

    /// The date each fundamental observation became publicly available:
    /// the announcement date when given, otherwise the quarter's end date.
    #[must_use]
    pub fn effective_announce(&self, symbol: &str, index: usize) -> Option<Date> {
        let inst = self.instruments.get(symbol)?;
        let quarter = *inst.quarters.get(index)?;
        Some(inst.announce[index].unwrap_or_else(|| quarter.end_date()))
    }

    /// Index of the most recent fundamental observation visible at `date`
    /// (announcement-date as-of semantics). `None` if nothing is visible
    /// yet.
    #[must_use]
    pub fn visible_quarter_index(&self, symbol: &str, date: Date) -> Option<usize> {
        let inst = self.instruments.get(symbol)?;
        let mut visible = None;
        for index in 0..inst.quarters.len() {
            let announce = inst.announce[index].unwrap_or_else(|| inst.quarters[index].end_date());
            if announce <= date {
                visible = Some(index);
            }
        }
        visible
    }

    /// Exact-date market lookup.
    #[must_use]
    pub fn market_at(&self, symbol: &str, field: &str, date: Date) -> Option<f64> {
        let inst = self.instruments.get(symbol)?;
        let index = inst.dates.binary_search(&date).ok()?;
        inst.market.get(field)?.get(index).copied().flatten()
    }

    /// Forward-filled market lookup: the latest non-missing value at or
    /// before `date`.
    #[must_use]
    pub fn market_asof(&self, symbol: &str, field: &str, date: Date) -> Option<f64> {
        let inst = self.instruments.get(symbol)?;
        let values = inst.market.get(field)?;
        let end = inst.dates.partition_point(|d| *d <= date);
        values[..end].iter().rev().find_map(|v| *v)
    }

    /// The instrument's listing date, if known.
    #[must_use]
    pub fn list_date(&self, symbol: &str) -> Option<Date> {
        self.instruments.get(symbol).and_then(|inst| inst.list_date)
    }

    /// The instrument's industry classification, if known.
    #[must_use]
    pub fn industry(&self, symbol: &str) -> Option<&str> {
        self.instruments
            .get(symbol)
            .and_then(|inst| inst.industry.as_deref())
    }

    /// Whether the instrument is flagged special-treatment as of `date`.
    #[must_use]
    pub fn is_special_treatment(&self, symbol: &str, date: Date) -> bool {
        self.market_asof(symbol, ST_FLAG_FIELD, date)
            .is_some_and(|flag| flag != 0.0)
    }
}

/// Incremental [`Panel`] construction.
///
/// Setters register axes implicitly; [`PanelBuilder::build`] sorts the
/// axes, aligns field vectors, and reports duplicate field writes.
#[derive(Debug, Default)]
pub struct PanelBuilder {
    instruments: BTreeMap<Symbol, InstrumentBuilder>,
    duplicates: Vec<String>,
}

#[derive(Debug, Default)]
struct InstrumentBuilder {
    list_date: Option<Date>,
    industry: Option<String>,
    fundamentals: BTreeMap<FiscalQuarter, (Option<Date>, HashMap<String, f64>)>,
    market: BTreeMap<Date, HashMap<String, f64>>,
}

impl PanelBuilder {
    /// Register a fundamental observation row (quarter axis entry plus its
    /// optional announcement date) without setting any field value.
    pub fn quarter_row(
        &mut self,
        symbol: &str,
        quarter: FiscalQuarter,
        announce: Option<Date>,
    ) -> &mut Self {
        let entry = self
            .instruments
            .entry(symbol.to_string())
            .or_default()
            .fundamentals
            .entry(quarter)
            .or_default();
        if announce.is_some() {
            entry.0 = announce;
        }
        self
    }

    /// Set one fundamental field value.
    pub fn fundamental(
        &mut self,
        symbol: &str,
        quarter: FiscalQuarter,
        field: &str,
        value: f64,
    ) -> &mut Self {
        let entry = self
            .instruments
            .entry(symbol.to_string())
            .or_default()
            .fundamentals
            .entry(quarter)
            .or_default();
        if entry.1.insert(field.to_string(), value).is_some() {
            self.duplicates
                .push(format!("fundamental ({symbol}, {quarter}, {field})"));
        }
        self
    }

    /// Set one market field value.
    pub fn market(&mut self, symbol: &str, date: Date, field: &str, value: f64) -> &mut Self {
        let entry = self
            .instruments
            .entry(symbol.to_string())
            .or_default()
            .market
            .entry(date)
            .or_default();
        if entry.insert(field.to_string(), value).is_some() {
            self.duplicates
                .push(format!("market ({symbol}, {date}, {field})"));
        }
        self
    }

    /// Set the instrument's listing date.
    pub fn list_date(&mut self, symbol: &str, date: Date) -> &mut Self {
        self.instruments
            .entry(symbol.to_string())
            .or_default()
            .list_date = Some(date);
        self
    }

    /// Set the instrument's industry classification.
    pub fn industry(&mut self, symbol: &str, industry: &str) -> &mut Self {
        self.instruments
            .entry(symbol.to_string())
            .or_default()
            .industry = Some(industry.to_string());
        self
    }

    /// Finalize the panel.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InvalidData`] if any field value was written
    /// twice for the same key.
    pub fn build(self) -> Result<Panel> {
        if !self.duplicates.is_empty() {
            return Err(RondaError::InvalidData(format!(
                "duplicate panel cells: {}",
                self.duplicates.join(", ")
            )));
        }

        let mut trading_dates = BTreeSet::new();
        let mut fundamental_fields = BTreeSet::new();
        let mut market_fields = BTreeSet::new();
        let mut instruments = BTreeMap::new();

        for (symbol, ib) in self.instruments {
            let quarters: Vec<FiscalQuarter> = ib.fundamentals.keys().copied().collect();
            let announce: Vec<Option<Date>> =
                ib.fundamentals.values().map(|(date, _)| *date).collect();

            let mut field_names: BTreeSet<&String> = BTreeSet::new();
            for (_, fields) in ib.fundamentals.values() {
                field_names.extend(fields.keys());
            }
            let mut fundamentals = HashMap::new();
            for name in field_names {
                let series: Vec<Option<f64>> = ib
                    .fundamentals
                    .values()
                    .map(|(_, fields)| fields.get(name).copied())
                    .collect();
                fundamental_fields.insert(name.clone());
                fundamentals.insert(name.clone(), series);
            }

            let dates: Vec<Date> = ib.market.keys().copied().collect();
            trading_dates.extend(dates.iter().copied());
            let mut field_names: BTreeSet<&String> = BTreeSet::new();
            for fields in ib.market.values() {
                field_names.extend(fields.keys());
            }
            let mut market = HashMap::new();
            for name in field_names {
                let series: Vec<Option<f64>> = ib
                    .market
                    .values()
                    .map(|fields| fields.get(name).copied())
                    .collect();
                market_fields.insert(name.clone());
                market.insert(name.clone(), series);
            }

            instruments.insert(
                symbol,
                Instrument {
                    list_date: ib.list_date,
                    industry: ib.industry,
                    quarters,
                    announce,
                    fundamentals,
                    dates,
                    market,
                },
            );
        }

        Ok(Panel {
            trading_dates: trading_dates.into_iter().collect(),
            instruments,
            fundamental_fields,
            market_fields,
        })
    }
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|s| s.as_str() == name)
}

fn required<T: Clone>(value: &Option<T>, column: &str, row: usize) -> Result<T> {
    value.clone().ok_or_else(|| {
        RondaError::InvalidData(format!("null in required column `{column}` at row {row}"))
    })
}

fn str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| RondaError::MissingColumn(name.to_string()))?;
    Ok(column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|s| s.map(|s| s.to_string()))
        .collect())
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let column = df
        .column(name)
        .map_err(|_| RondaError::MissingColumn(name.to_string()))?;
    let cast = column.as_materialized_series().cast(&DataType::Int64)?;
    Ok(cast.i64()?.into_iter().collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| RondaError::MissingColumn(name.to_string()))?;
    let cast = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

fn date_column(df: &DataFrame, name: &str) -> Result<Vec<Option<Date>>> {
    let column = df
        .column(name)
        .map_err(|_| RondaError::MissingColumn(name.to_string()))?;
    Ok(column
        .as_materialized_series()
        .date()?
        .into_iter()
        .map(|d: Option<i32>| {
            d.map(|d| Date::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE).unwrap())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter(year: i32, q: u8) -> FiscalQuarter {
        FiscalQuarter::new(year, q).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_builder_basic() {
        let mut builder = Panel::builder();
        builder
            .fundamental("A", quarter(2024, 1), "net_profit", 10.0)
            .fundamental("A", quarter(2024, 2), "net_profit", 25.0)
            .market("A", date(2024, 7, 1), "close", 3.5)
            .industry("A", "tech")
            .list_date("A", date(2020, 1, 1));
        let panel = builder.build().unwrap();

        assert_eq!(panel.n_instruments(), 1);
        assert!(panel.has_fundamental_field("net_profit"));
        assert!(panel.has_market_field("close"));
        assert_eq!(panel.quarters("A").len(), 2);
        assert_eq!(
            panel.fundamental_series("A", "net_profit").unwrap(),
            &[Some(10.0), Some(25.0)]
        );
        assert_eq!(panel.industry("A"), Some("tech"));
        assert_eq!(panel.list_date("A"), Some(date(2020, 1, 1)));
    }

    #[test]
    fn test_missing_cells_are_explicit() {
        let mut builder = Panel::builder();
        builder
            .fundamental("A", quarter(2024, 1), "net_profit", 10.0)
            .quarter_row("A", quarter(2024, 2), None)
            .fundamental("A", quarter(2024, 3), "net_profit", 30.0);
        let panel = builder.build().unwrap();

        assert_eq!(
            panel.fundamental_series("A", "net_profit").unwrap(),
            &[Some(10.0), None, Some(30.0)]
        );
    }

    #[test]
    fn test_duplicate_cell_fails() {
        let mut builder = Panel::builder();
        builder
            .fundamental("A", quarter(2024, 1), "net_profit", 10.0)
            .fundamental("A", quarter(2024, 1), "net_profit", 11.0);
        assert!(matches!(
            builder.build(),
            Err(RondaError::InvalidData(_))
        ));
    }

    #[test]
    fn test_market_asof_forward_fills() {
        let mut builder = Panel::builder();
        builder
            .market("A", date(2024, 1, 2), "market_value", 100.0)
            .market("A", date(2024, 1, 4), "market_value", 120.0);
        let panel = builder.build().unwrap();

        assert_eq!(panel.market_at("A", "market_value", date(2024, 1, 3)), None);
        assert_eq!(
            panel.market_asof("A", "market_value", date(2024, 1, 3)),
            Some(100.0)
        );
        assert_eq!(
            panel.market_asof("A", "market_value", date(2024, 1, 5)),
            Some(120.0)
        );
        assert_eq!(
            panel.market_asof("A", "market_value", date(2024, 1, 1)),
            None
        );
    }

    #[test]
    fn test_visible_quarter_index_uses_announce_dates() {
        let mut builder = Panel::builder();
        builder
            .quarter_row("A", quarter(2024, 1), Some(date(2024, 4, 25)))
            .fundamental("A", quarter(2024, 1), "net_profit", 10.0)
            .quarter_row("A", quarter(2024, 2), Some(date(2024, 8, 20)))
            .fundamental("A", quarter(2024, 2), "net_profit", 25.0);
        let panel = builder.build().unwrap();

        assert_eq!(panel.visible_quarter_index("A", date(2024, 4, 1)), None);
        assert_eq!(panel.visible_quarter_index("A", date(2024, 5, 1)), Some(0));
        assert_eq!(panel.visible_quarter_index("A", date(2024, 9, 1)), Some(1));
    }

    #[test]
    fn test_visible_quarter_index_falls_back_to_quarter_end() {
        let mut builder = Panel::builder();
        builder.fundamental("A", quarter(2024, 1), "net_profit", 10.0);
        let panel = builder.build().unwrap();

        assert_eq!(panel.visible_quarter_index("A", date(2024, 3, 30)), None);
        assert_eq!(panel.visible_quarter_index("A", date(2024, 3, 31)), Some(0));
    }

    #[test]
    fn test_special_treatment_flag() {
        let mut builder = Panel::builder();
        builder
            .market("A", date(2024, 1, 2), ST_FLAG_FIELD, 1.0)
            .market("B", date(2024, 1, 2), "close", 5.0);
        let panel = builder.build().unwrap();

        assert!(panel.is_special_treatment("A", date(2024, 1, 3)));
        assert!(!panel.is_special_treatment("B", date(2024, 1, 3)));
        assert!(!panel.is_special_treatment("A", date(2024, 1, 1)));
    }

    #[test]
    fn test_from_frames() {
        let fundamentals = df! {
            "symbol" => &["A", "A", "B"],
            "year" => &[2024i32, 2024, 2024],
            "quarter" => &[1i32, 2, 1],
            "net_profit" => &[Some(10.0), None, Some(7.0)],
        }
        .unwrap();
        let market = df! {
            "symbol" => &["A", "B"],
            "date" => &[date(2024, 7, 1), date(2024, 7, 1)],
            "close" => &[3.5, 8.0],
        }
        .unwrap();

        let panel = Panel::from_frames(&fundamentals, &market, None).unwrap();
        assert_eq!(panel.n_instruments(), 2);
        assert_eq!(
            panel.fundamental_series("A", "net_profit").unwrap(),
            &[Some(10.0), None]
        );
        assert_eq!(panel.trading_dates(), &[date(2024, 7, 1)]);
    }

    #[test]
    fn test_from_frames_rejects_duplicate_keys() {
        let fundamentals = df! {
            "symbol" => &["A", "A"],
            "year" => &[2024i32, 2024],
            "quarter" => &[1i32, 1],
            "net_profit" => &[10.0, 11.0],
        }
        .unwrap();
        let market = df! {
            "symbol" => &["A"],
            "date" => &[date(2024, 7, 1)],
            "close" => &[3.5],
        }
        .unwrap();

        assert!(matches!(
            Panel::from_frames(&fundamentals, &market, None),
            Err(RondaError::InvalidData(_))
        ));
    }
}
