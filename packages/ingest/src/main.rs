#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the county case estimation tool.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use covid_track_cli_utils::IndicatifProgress;
use covid_track_database::{county_db, paths};
use covid_track_estimator::Kernel;
use covid_track_geography_models::CountyFips;
use covid_track_ingest::{UpdatePlan, run_update, seed};
use covid_track_notify::{DigestEntry, LogDigestSender, dispatch};
use covid_track_source::feed_def::FeedLayout;
use covid_track_source::fetch::HttpFeedFetcher;
use covid_track_source::registry;

#[derive(Parser)]
#[command(name = "covid_track_ingest", about = "County active-case estimation tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all feeds, estimate active cases, and update stored counties
    Update {
        /// TOML file overriding the kernel weights and undetected factor
        #[arg(long)]
        kernel: Option<PathBuf>,
        /// Compute snapshots but write nothing
        #[arg(long)]
        dry_run: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all configured feeds
    Feeds,
    /// Create the database schema
    Migrate,
    /// Insert or refresh counties from a `fips,name,state,population` CSV
    Seed {
        /// Path to the CSV file
        csv: PathBuf,
    },
    /// Print a stored county with its derived metrics
    Show {
        /// County FIPS code (e.g., "25019")
        fips: String,
    },
    /// Send every due subscription digest (to the log)
    Notify,
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = covid_track_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => {
            log::info!("Creating schema at {}...", paths::db_path().display());
            covid_track_database::open_default()?;
            log::info!("Schema ready.");
        }
        Commands::Feeds => {
            let feeds = registry::all_feeds();
            println!("{:<20} {:<10} {:<18} NAME", "ID", "ROLE", "LAYOUT");
            println!("{}", "-".repeat(80));
            for feed in &feeds {
                let layout = match &feed.layout {
                    FeedLayout::WideTimeSeries(_) => "wide_time_series",
                    FeedLayout::LineList(_) => "line_list",
                };
                println!(
                    "{:<20} {:<10} {:<18} {}",
                    feed.id, feed.role, layout, feed.name
                );
            }
        }
        Commands::Update {
            kernel,
            dry_run,
            json,
        } => {
            let kernel = match kernel {
                Some(path) => {
                    log::info!("Loading kernel from {}", path.display());
                    Kernel::from_path(&path)?
                }
                None => Kernel::default(),
            };
            let plan = UpdatePlan::from_registry()?;
            let fetcher = HttpFeedFetcher::from_env()?;

            let conn = if dry_run {
                None
            } else {
                Some(covid_track_database::open_default()?)
            };
            let store = conn
                .as_ref()
                .map(|c| c as &dyn covid_track_database::CountyStore);

            let progress = IndicatifProgress::counties_bar(&multi, "Syncing counties");
            let report = run_update(&fetcher, &plan, &kernel, store, Utc::now(), progress).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{}: {} counties read, {} snapshots ({} short history, {} secondary overrides, {} secondary missing)",
                    report.feed_date.map_or_else(|| "?".to_string(), |d| d.to_string()),
                    report.counties_read,
                    report.snapshots,
                    report.insufficient_history.len(),
                    report.secondary_overrides.len(),
                    report.secondary_missing.len(),
                );
                if let Some(sync) = &report.sync {
                    println!(
                        "{} updated, {} failed, {} not stored, in {:.1}s",
                        sync.updated,
                        sync.failed.len(),
                        sync.not_stored.len(),
                        report.duration.as_secs_f64()
                    );
                    for unit in &sync.failed {
                        println!("  FAILED {}: {}", unit.fips, unit.reason);
                    }
                }
            }
        }
        Commands::Seed { csv } => {
            let conn = covid_track_database::open_default()?;
            let bytes = std::fs::read(&csv)?;
            let counties = seed::read_seed_csv(&bytes)?;
            let written = seed::seed_counties(&conn, &counties)?;
            println!("Seeded {written} counties from {}", csv.display());
        }
        Commands::Show { fips } => {
            let fips = CountyFips::from_raw(&fips).ok_or_else(|| format!("Invalid FIPS: {fips}"))?;
            let conn = covid_track_database::open_default()?;
            let county = county_db::find_county(&conn, &fips)?
                .ok_or_else(|| format!("No county stored for {fips}"))?;

            println!("{} ({fips}), population {}", county.name, county.population);
            println!("{}", DigestEntry::from(&county));
            println!(
                "Last updated: {}",
                county
                    .last_updated
                    .map_or_else(|| "never".to_string(), |t| t.to_rfc3339())
            );
        }
        Commands::Notify => {
            let mut conn = covid_track_database::open_default()?;
            let report = dispatch(&mut conn, &LogDigestSender, Utc::now()).await?;
            println!(
                "{} due, {} sent, {} failed, {} skipped",
                report.due_subscriptions,
                report.sent,
                report.failed.len(),
                report.skipped.len()
            );
        }
    }

    Ok(())
}
