//! Compute spend summaries for every user in a data directory
//!
//! Outputs one CSV row per user with the month, forecast and rollup totals

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use spend_tracking::records::load_data_dir;
use spend_tracking::{
    EngineConfig, InMemoryCacheStore, InMemoryDataStore, SpendTrackingResponse,
    SpendTrackingService, SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "batch_summaries", about = "Spend summaries for all users in a data directory")]
struct Args {
    #[arg(long, default_value = "data/sample")]
    data_dir: PathBuf,

    /// Output CSV path
    #[arg(long, default_value = "spend_summaries.csv")]
    output: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,
}

/// One line of the report
#[derive(Debug, Serialize)]
struct SummaryRow {
    user_id: String,
    month: String,
    current_month_total: f64,
    last_month_total: f64,
    percentage_change: f64,
    forecast_total: f64,
    forecast_median: f64,
    three_year_subscriptions: f64,
    three_year_total: f64,
    recurring_next_month: usize,
}

impl SummaryRow {
    fn from_response(response: &SpendTrackingResponse) -> Self {
        let summary = &response.monthly_summary;
        Self {
            user_id: response.user_id.clone(),
            month: summary.month.format("%Y-%m").to_string(),
            current_month_total: round2(summary.current_month_total),
            last_month_total: round2(summary.last_month_total),
            percentage_change: round2(summary.percentage_change),
            forecast_total: round2(response.annual_forecast.total),
            forecast_median: round2(response.annual_forecast.median),
            three_year_subscriptions: round2(
                response.yearly_totals.iter().fold(0.0, |acc, t| acc + t.subscription_amount),
            ),
            three_year_total: round2(response.yearly_totals.iter().fold(0.0, |acc, t| acc + t.total_amount)),
            recurring_next_month: response.recurring_next_month.len(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let start = Instant::now();
    println!("Loading records from {}...", args.data_dir.display());
    let records = load_data_dir(&args.data_dir)
        .with_context(|| format!("reading {}", args.data_dir.display()))?;
    let users = records.user_ids();
    let service = SpendTrackingService::new(
        Arc::new(InMemoryDataStore::from_records(records)),
        Arc::new(InMemoryCacheStore::new()),
        Arc::new(SystemClock),
        config,
    )?;
    println!("Found {} users in {:?}", users.len(), start.elapsed());

    println!("Computing summaries...");
    let calc_start = Instant::now();
    let results = service.summaries_for_users(&users);
    println!("Summaries complete in {:?}", calc_start.elapsed());

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut failures = 0;
    for (user_id, result) in &results {
        match result {
            Ok(response) => writer.serialize(SummaryRow::from_response(response))?,
            Err(e) => {
                failures += 1;
                eprintln!("  {}: {}", user_id, e);
            }
        }
    }
    writer.flush()?;

    println!(
        "Output written to {} ({} users, {} failed)",
        args.output.display(),
        results.len() - failures,
        failures
    );
    println!("Total time: {:?}", start.elapsed());
    Ok(())
}
