mod extract;
mod normalize;
mod paginate;
mod record;
mod scraper;
mod session;
mod store;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::record::CanonicalRecord;
use crate::scraper::{ScrapeConfig, Termination};
use crate::session::cdp::{self, CdpSession};
use crate::session::{BrowserSession, SessionConfig};

#[derive(Parser)]
#[command(name = "pg_scraper", about = "PropertyGuru listing scraper via Chrome DevTools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape listing pages from the tab already open in Chrome
    Scrape {
        /// Chrome remote debugging port
        #[arg(short, long, default_value = "9222")]
        port: u16,
        /// Attach to a specific tab id (see `tabs`)
        #[arg(long)]
        tab: Option<String>,
        /// Navigate the tab to this URL first (default: scrape where it is)
        #[arg(long)]
        url: Option<String>,
        /// Max pages to walk
        #[arg(short = 'n', long, default_value = "10")]
        pages: u32,
        /// Page number the tab is starting from
        #[arg(long, default_value = "1")]
        start_page: u32,
        /// Output file (default: data/pure_data_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seconds to allow the anti-bot check to clear
        #[arg(long, default_value = "90")]
        challenge_wait: u64,
    },
    /// Normalize a previously saved raw draft file offline
    Convert {
        /// Draft JSON array from an earlier extraction
        input: PathBuf,
        /// Output file (default: data/pure_data_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Distribution summary of a saved listing file
    Summary {
        input: PathBuf,
    },
    /// List attachable Chrome tabs
    Tabs {
        #[arg(short, long, default_value = "9222")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape {
            port,
            tab,
            url,
            pages,
            start_page,
            output,
            challenge_wait,
        } => {
            let session_config = SessionConfig {
                port,
                target_id: tab,
                ..SessionConfig::default()
            };
            let scrape_config = ScrapeConfig {
                max_pages: pages,
                start_page,
                challenge_wait: Duration::from_secs(challenge_wait),
                ..ScrapeConfig::default()
            };

            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        println!("\nStopping after the current page...");
                        cancel.cancel();
                    }
                });
            }

            let mut session = CdpSession::connect(&session_config).await?;
            if let Some(url) = &url {
                session.navigate(url).await?;
            }
            let outcome = scraper::run(&mut session, &scrape_config, &cancel).await;
            if let Err(e) = session.close().await {
                warn!("detach failed: {e}");
            }
            let outcome = outcome?;

            let path = output.unwrap_or_else(store::default_output_path);
            store::save_records(&path, &outcome.records)?;
            println!(
                "Done: {} listings from {} pages ({} drafts, {} rejected) -> {}",
                outcome.records.len(),
                outcome.pages_visited,
                outcome.drafts_seen,
                outcome.skipped,
                path.display()
            );
            match outcome.termination {
                Termination::Stalled { page } => {
                    anyhow::bail!("pagination stalled on page {page}; partial results saved")
                }
                Termination::LastPage => {
                    println!("Reached the end of the result set.");
                    Ok(())
                }
                Termination::Cancelled => {
                    println!("Interrupted; partial results saved.");
                    Ok(())
                }
                Termination::Completed => Ok(()),
            }
        }
        Commands::Convert { input, output } => {
            let drafts = store::load_drafts(&input)?;
            if drafts.is_empty() {
                println!("No drafts in {}.", input.display());
                return Ok(());
            }
            let mut records = Vec::new();
            let mut skipped = 0usize;
            for draft in &drafts {
                match normalize::normalize(draft) {
                    Some(record) => records.push(record),
                    None => skipped += 1,
                }
            }
            let path = output.unwrap_or_else(store::default_output_path);
            store::save_records(&path, &records)?;
            println!(
                "Converted {} of {} drafts ({} rejected) -> {}",
                records.len(),
                drafts.len(),
                skipped,
                path.display()
            );
            Ok(())
        }
        Commands::Summary { input } => {
            let records = store::load_records(&input)?;
            if records.is_empty() {
                println!("No listings in {}.", input.display());
                return Ok(());
            }
            print_summary(&records);
            Ok(())
        }
        Commands::Tabs { port } => {
            let config = SessionConfig {
                port,
                ..SessionConfig::default()
            };
            let targets = cdp::list_targets(&config).await?;
            let pages: Vec<_> = targets.iter().filter(|t| t.kind == "page").collect();
            if pages.is_empty() {
                println!("No page tabs on port {port}. Is Chrome running with --remote-debugging-port?");
                return Ok(());
            }
            println!("{:<36} | {:<30} | {}", "Tab id", "Title", "URL");
            println!("{}", "-".repeat(100));
            for t in pages {
                println!(
                    "{:<36} | {:<30} | {}",
                    t.id,
                    truncate(&t.title, 30),
                    truncate(&t.url, 60)
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_summary(records: &[CanonicalRecord]) {
    println!("{} listings", records.len());

    print_distribution("Price range", records.iter().map(|r| r.price_range.clone()));
    print_distribution(
        "Property type",
        records.iter().filter_map(|r| r.property_type.clone()),
    );
    print_distribution(
        "District",
        records.iter().filter_map(|r| r.district_code.clone()),
    );
    print_distribution(
        "MRT distance",
        records.iter().filter_map(|r| r.mrt_distance_category.clone()),
    );
    print_distribution(
        "Age",
        records.iter().filter_map(|r| r.age_category.clone()),
    );
}

fn print_distribution(label: &str, values: impl Iterator<Item = String>) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    if counts.is_empty() {
        return;
    }
    println!("\n--- {label} ---");
    let mut rows: Vec<_> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (value, count) in rows {
        println!("  {:<20} {}", value, count);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
