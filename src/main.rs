use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use laborstats::{Config, Dashboard, DateWindow, SeriesTable, SyncError};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "laborstats")]
#[command(about = "Keep a local copy of BLS labor statistics series", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pull for every series without a stored table
    Init {
        /// Re-pull and overwrite every series
        #[arg(long)]
        force: bool,
    },
    /// Pull the latest observations and merge them into stored tables
    Refresh,
    /// Print one series for a date window
    Show {
        code: String,
        /// First date shown (YYYY-MM-DD); defaults to 15 months before the newest data
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date shown (YYYY-MM-DD); defaults to the newest data
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Emit JSON rows instead of a text table
        #[arg(long)]
        json: bool,
    },
    /// Row counts and newest date per tracked series
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    info!(data_dir = %config.data_dir.display(), series = config.series.len(), "startup");
    let dashboard = Dashboard::from_config(&config)?;

    match cli.command {
        Commands::Init { force } => init(&dashboard, force).await,
        Commands::Refresh => refresh(&dashboard).await,
        Commands::Show {
            code,
            start,
            end,
            json,
        } => show(&dashboard, &code, start, end, json),
        Commands::Status => status(&dashboard),
    }
}

async fn init(dashboard: &Dashboard, force: bool) -> Result<()> {
    let report = dashboard.ensure_initialized(force).await?;
    for code in &report.already_present {
        println!("{:<15} already present", code);
    }
    for (code, rows) in &report.initialized {
        println!("{:<15} initialized with {} rows", code, rows);
    }
    for m in &report.missing {
        println!("{:<15} no data returned", m.series);
    }
    report_failures(&report.failed)
}

async fn refresh(dashboard: &Dashboard) -> Result<()> {
    let report = dashboard.refresh_all().await?;
    for (code, outcome) in &report.merged {
        println!(
            "{:<15} added {:>3}  replaced {:>3}  total {:>5}",
            code, outcome.added, outcome.replaced, outcome.total
        );
    }
    for m in &report.missing {
        println!("{:<15} no latest data returned", m.series);
    }
    report_failures(&report.failed)
}

fn report_failures(failed: &[(String, SyncError)]) -> Result<()> {
    for (code, err) in failed {
        eprintln!("{:<15} FAILED: {}", code, err);
    }
    if !failed.is_empty() {
        bail!("{} series failed", failed.len());
    }
    Ok(())
}

fn show(
    dashboard: &Dashboard,
    code: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let table = dashboard.load_series(code)?;

    let loaded: Vec<SeriesTable> = dashboard
        .load_all()
        .into_iter()
        .filter_map(|(c, t)| match t {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(series = %c, error = %e, "left out of default window");
                None
            }
        })
        .collect();
    let default = DateWindow::default_for(&loaded, Local::now().date_naive());
    let window = DateWindow::new(start.unwrap_or(default.start), end.unwrap_or(default.end))?;

    let rows = table.between(&window);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let name = dashboard
        .series()
        .iter()
        .find(|s| s.code == code)
        .map(|s| s.name.as_str())
        .unwrap_or(code);
    println!("{} ({})  {} .. {}", name, code, window.start, window.end);
    if rows.is_empty() {
        println!("no data in the selected date range");
        return Ok(());
    }
    println!(
        "{:<8} {:<7} {:<12} {:>12} {:<6} {}",
        "month", "period", "periodName", "value", "latest", "footnotes"
    );
    for r in rows {
        let o = &r.observation;
        println!(
            "{:<8} {:<7} {:<12} {:>12} {:<6} {}",
            r.year_month.as_deref().unwrap_or("-"),
            o.period,
            o.period_name,
            o.value,
            o.latest,
            o.footnotes
        );
    }
    Ok(())
}

fn status(dashboard: &Dashboard) -> Result<()> {
    for s in dashboard.status() {
        let rows = s
            .rows
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let latest = s
            .latest_date
            .map(|d| d.format("%Y-%m").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<15} {:>6} {:>8}  {}", s.code, rows, latest, s.name);
    }
    for code in dashboard.untracked_tables()? {
        println!("{:<15} (untracked table)", code);
    }
    Ok(())
}
