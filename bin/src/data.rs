//! Data loading utilities for the Ronda CLI.
//!
//! Reads market, fundamental and instrument CSV files into DataFrames and
//! assembles the panel the engine consumes. Path resolution and file
//! formats live here; the engine itself only ever sees a [`Panel`].

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use ronda_traits::{Date, Panel, RondaError};

/// Load a panel from CSV files.
///
/// The market file is required; fundamentals and instrument metadata are
/// optional (a price-only panel still supports market-frequency factors).
pub(crate) fn load_panel(
    market: &Path,
    fundamentals: Option<&Path>,
    instruments: Option<&Path>,
) -> Result<Panel> {
    let market_df = read_csv(market)?;
    let fundamentals_df = match fundamentals {
        Some(path) => read_csv(path)?,
        None => empty_fundamentals()?,
    };
    let instruments_df = instruments.map(read_csv).transpose()?;

    let panel = Panel::from_frames(&fundamentals_df, &market_df, instruments_df.as_ref())?;
    Ok(panel)
}

/// Parse a date string in YYYY-MM-DD format.
pub(crate) fn parse_date(date_str: &str) -> std::result::Result<Date, RondaError> {
    Date::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| RondaError::InvalidDate(format!("{date_str}: {e}")))
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .map_parse_options(|parse| parse.with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("opening {}", path.display()))?
        .finish()
        .with_context(|| format!("reading {}", path.display()))
}

/// Schema-only fundamentals frame for price-only runs.
fn empty_fundamentals() -> Result<DataFrame> {
    Ok(df! {
        "symbol" => Vec::<String>::new(),
        "year" => Vec::<i32>::new(),
        "quarter" => Vec::<i32>::new(),
    }?)
}
