use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::info;

use crate::bot::run_bot;
use crate::cli_helpers::default_image_path;
use crate::config::{load_config, resolve_config_path};
use crate::metrics::OpenTsdbClient;
use crate::service::{RenderedReport, ReportFormat, ReportService};

#[derive(Parser)]
#[command(name = "twboard", version)]
#[command(about = "Follower-count leaderboards from a metrics store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a follower leaderboard once
    Report {
        /// Weeks to look back (defaults to report.weeks_ago from the config)
        #[arg(long = "weeks")]
        weeks: Option<i64>,
        /// Output format
        #[arg(long = "format", value_enum, default_value_t = ReportFormat::Table)]
        format: ReportFormat,
        /// Write the report here; images get an auto-generated name otherwise
        #[arg(long = "output", short = 'o')]
        output: Option<PathBuf>,
        /// Path to the TOML config (or set TWBOARD_CONFIG)
        #[arg(long = "config")]
        config_path: Option<PathBuf>,
        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Answer /followers and /followers_txt over Telegram
    Bot {
        /// Path to the TOML config (or set TWBOARD_CONFIG)
        #[arg(long = "config")]
        config_path: Option<PathBuf>,
        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },
}

fn configure_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    builder.format(|buf, record| writeln!(buf, "{}", record.args()));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    let _ = builder.try_init();
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    match cli.command {
        Commands::Report {
            weeks,
            format,
            output,
            config_path,
            verbose,
        } => {
            configure_logging(verbose);
            let config = load_config(&resolve_config_path(config_path.as_deref()))?;
            config.require_metrics()?;
            let weeks = weeks.unwrap_or(config.report.weeks_ago);

            let service = ReportService::new(OpenTsdbClient::new(&config.metrics)?)
                .with_font_family(&config.report.font_family);
            let report = runtime.block_on(service.build_report(weeks, format))?;

            match (report, output) {
                (RenderedReport::Text(text), None) => println!("{}", text.trim_end()),
                (RenderedReport::Text(text), Some(path)) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Saved report to {}", path.display());
                }
                (RenderedReport::Image(png), output) => {
                    let path = output.unwrap_or_else(|| {
                        default_image_path(&format!("{weeks}w"), None, Some(Local::now()))
                    });
                    std::fs::write(&path, png)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Saved image to {}", path.display());
                }
            }
        }
        Commands::Bot {
            config_path,
            verbose,
        } => {
            configure_logging(verbose);
            let config = load_config(&resolve_config_path(config_path.as_deref()))?;
            runtime.block_on(run_bot(&config))?;
        }
    }
    Ok(())
}
