//! Spend Tracking CLI
//!
//! Prints the spend summary for one user from a directory of CSV exports

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spend_tracking::calc::BucketSource;
use spend_tracking::{EngineConfig, SpendTrackingService};

#[derive(Parser, Debug)]
#[command(name = "spend_tracking", version, about = "Spend summary for a single user")]
struct Args {
    /// Directory holding purchases.csv, subscriptions.csv and the aggregate files
    #[arg(long, default_value = "data/sample")]
    data_dir: PathBuf,

    /// User to summarize
    #[arg(long)]
    user: String,

    /// Optional JSON engine config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also show the billing outlook for this subscription id
    #[arg(long)]
    subscription: Option<i64>,

    /// Print the raw response as JSON instead of tables
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let service = SpendTrackingService::from_data_dir(&args.data_dir, config)
        .with_context(|| format!("opening data directory {}", args.data_dir.display()))?;
    let response = service
        .get_spend_tracking_summary(&args.user)
        .with_context(|| format!("building summary for {}", args.user))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let summary = &response.monthly_summary;
    println!("Spend Tracking - {}", response.user_id);
    println!("======================\n");
    println!("{}", summary.month_label);
    println!("  This month:   ${:>10.2}", summary.current_month_total);
    println!("  Last month:   ${:>10.2}", summary.last_month_total);
    println!("  Change:        {:>+10.1}%", summary.percentage_change);
    println!("  One-time:     ${:>10.2}", summary.one_time_total);
    println!("  Subscription: ${:>10.2}", summary.subscription_total);
    println!();

    println!("{:<16} {:>12}", "Category", "Amount");
    println!("{}", "-".repeat(29));
    for (category, amount) in &summary.category_breakdown {
        println!("{:<16} {:>12.2}", category, amount);
    }
    println!();

    let forecast = &response.annual_forecast;
    println!("Forecast {}", forecast.date_range);
    println!("{:>5} {:>12} {:>11}", "Month", "Amount", "Source");
    println!("{}", "-".repeat(30));
    for bucket in &forecast.months {
        let source = match bucket.source {
            BucketSource::Historical => "actual",
            BucketSource::Projected => "projected",
            BucketSource::Fallback => "average",
        };
        println!("{:>5} {:>12.2} {:>11}", bucket.label, bucket.amount, source);
    }
    println!("Total: ${:.2}  Median: ${:.2}\n", forecast.total, forecast.median);

    println!("{:>6} {:>14} {:>12} {:>12}", "Year", "Subscriptions", "One-time", "Total");
    println!("{}", "-".repeat(47));
    for year in &response.yearly_totals {
        println!(
            "{:>6} {:>14.2} {:>12.2} {:>12.2}",
            year.year, year.subscription_amount, year.one_time_amount, year.total_amount
        );
    }
    println!();

    println!("Recurring next month:");
    if response.recurring_next_month.is_empty() {
        println!("  (none)");
    }
    for item in &response.recurring_next_month {
        println!("  {} {:<24} ${:>8.2}", item.date, item.title, item.amount);
    }

    if let Some(id) = args.subscription {
        let outlook = service
            .subscription_outlook(&args.user, id)
            .with_context(|| format!("subscription outlook for {}", id))?;
        println!();
        println!("Subscription {} ({}, {})", outlook.name, outlook.billing_cycle, outlook.subscription_id);
        println!("  Due this month:  {}", if outlook.due_this_month { "yes" } else { "no" });
        match outlook.next_billing_date {
            Some(next) => println!("  Next charge:     {}", next),
            None => println!("  Next charge:     -"),
        }
        println!("  Cost this year:  ${:.2}", outlook.cost_this_year);
        println!("  Annualized:      ${:.2}", outlook.annualized_cost);
    }

    Ok(())
}
