//! Backtest command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use ronda_eval::{
    Backtest, BacktestConfig, CancelToken, ExecutionPriceRule, LogObserver, MetricsRecord,
    MetricsRequest, Neutralization, RebalanceFrequency,
};
use ronda_expr::{FactorExpr, FactorProposal};

use crate::data;

/// Arguments for the `backtest` subcommand.
#[derive(Debug, Args)]
pub(crate) struct BacktestArgs {
    /// Factor expression text
    #[arg(long, conflicts_with = "proposal", required_unless_present = "proposal")]
    pub expression: Option<String>,

    /// Path to a factor proposal JSON file (因子名称/因子逻辑/因子表达式)
    #[arg(long)]
    pub proposal: Option<PathBuf>,

    /// Market data CSV: symbol,date plus numeric fields (open, vwap,
    /// market_value, st, ...)
    #[arg(long)]
    pub market: PathBuf,

    /// Fundamental data CSV: symbol,year,quarter[,announce_date] plus
    /// numeric fields
    #[arg(long)]
    pub fundamentals: Option<PathBuf>,

    /// Instrument metadata CSV: symbol[,list_date][,industry]
    #[arg(long)]
    pub instruments: Option<PathBuf>,

    /// Start date (YYYY-MM-DD); default is one year before the end
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD); default is the panel's last trading date
    #[arg(long)]
    pub end: Option<String>,

    /// Rebalance frequency (daily, weekly, monthly)
    #[arg(long, default_value = "weekly")]
    pub frequency: String,

    /// Neutralization (none, market_value_and_industry)
    #[arg(long, default_value = "market_value_and_industry")]
    pub neutralization: String,

    /// Execution price rule (next_period_open, next_period_vwap)
    #[arg(long, default_value = "next_period_vwap")]
    pub price_rule: String,

    /// Minimum valid instruments per period
    #[arg(long, default_value = "20")]
    pub min_universe: usize,

    /// Listing-age exclusion window in calendar days
    #[arg(long, default_value = "120")]
    pub listing_window: i64,

    /// Worker thread cap for period evaluation
    #[arg(long)]
    pub workers: Option<usize>,

    /// Compute all secondary statistics (hit rate, drawdown, turnover,
    /// coverage)
    #[arg(long)]
    pub full: bool,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run a backtest from CLI arguments.
pub(crate) fn run(args: &BacktestArgs) -> Result<()> {
    let (proposal, expr) = load_expression(args)?;

    let panel = data::load_panel(
        &args.market,
        args.fundamentals.as_deref(),
        args.instruments.as_deref(),
    )?;
    log::info!(
        "panel loaded: {} instruments, {} trading dates",
        panel.n_instruments(),
        panel.trading_dates().len()
    );

    let config = BacktestConfig {
        start_date: args.start.as_deref().map(data::parse_date).transpose()?,
        end_date: args.end.as_deref().map(data::parse_date).transpose()?,
        neutralization: args.neutralization.parse::<Neutralization>()?,
        rebalance_frequency: args.frequency.parse::<RebalanceFrequency>()?,
        execution_price_rule: args.price_rule.parse::<ExecutionPriceRule>()?,
        min_universe_size: args.min_universe,
        new_listing_window_days: args.listing_window,
        workers: args.workers,
        secondary: if args.full {
            MetricsRequest::all()
        } else {
            MetricsRequest::default()
        },
        ..Default::default()
    };

    let backtest = Backtest::new(config);
    let record = backtest.run_with(&expr, &panel, &LogObserver, &CancelToken::new())?;

    let rendered = match args.format.as_str() {
        "json" => render_json(proposal.as_ref(), &expr, &record)?,
        "text" => render_text(proposal.as_ref(), &expr, &record),
        other => anyhow::bail!("unknown output format `{other}` (expected text or json)"),
    };

    match &args.output {
        Some(path) => {
            fs::write(path, rendered.as_bytes())
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Result written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn load_expression(args: &BacktestArgs) -> Result<(Option<FactorProposal>, FactorExpr)> {
    if let Some(path) = &args.proposal {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let proposal = FactorProposal::extract(&text)?;
        let expr = proposal.parse_expression()?;
        return Ok((Some(proposal), expr));
    }
    let text = args
        .expression
        .as_deref()
        .context("either --expression or --proposal is required")?;
    Ok((None, FactorExpr::parse(text)?))
}

/// Merge the proposal fields (when present) with the metrics record into
/// one flat JSON object.
fn render_json(
    proposal: Option<&FactorProposal>,
    expr: &FactorExpr,
    record: &MetricsRecord,
) -> Result<String> {
    let mut merged = match proposal {
        Some(proposal) => serde_json::to_value(proposal)?,
        None => serde_json::json!({ "因子表达式": expr.to_string() }),
    };
    let metrics = serde_json::to_value(record)?;
    if let (Value::Object(base), Value::Object(extra)) = (&mut merged, metrics) {
        base.extend(extra);
    }
    Ok(serde_json::to_string_pretty(&merged)?)
}

fn render_text(
    proposal: Option<&FactorProposal>,
    expr: &FactorExpr,
    record: &MetricsRecord,
) -> String {
    let mut lines = Vec::new();
    if let Some(proposal) = proposal {
        lines.push(format!("因子名称:   {}", proposal.name));
    }
    lines.push(format!("因子表达式: {expr}"));
    lines.push(String::new());
    lines.push(format!("RankIC均值: {}", fmt_opt(record.rank_ic_mean)));
    lines.push(format!("ICIR:       {}", fmt_opt(record.icir)));
    lines.push(format!(
        "因子方向:   {}",
        record
            .direction
            .map_or_else(|| "n/a".to_string(), |d| format!("{d:+}"))
    ));
    if let Some(hit_rate) = record.hit_rate {
        lines.push(format!("胜率:       {hit_rate:.3}"));
    }
    if let Some(max_drawdown) = record.max_drawdown {
        lines.push(format!("最大回撤:   {max_drawdown:.3}"));
    }
    if let Some(turnover) = record.turnover {
        lines.push(format!("换手率:     {turnover:.3}"));
    }
    if let Some(coverage) = record.coverage {
        lines.push(format!("因子覆盖度: {coverage:.3}"));
    }
    lines.push(String::new());
    lines.push(format!(
        "periods: {} ({} degraded)",
        record.n_periods, record.degraded_periods
    ));
    lines.join("\n")
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}
