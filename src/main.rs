use anyhow::Context;
use campaign_report::config::Config;
use campaign_report::loader::Section;
use campaign_report::logger;
use campaign_report::output::ReportSummary;
use campaign_report::{CampaignReport, ChartFormat, ChartRenderer, FunnelReport, Pipeline, ReportError, SeasonalityReport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "campaign-report")]
#[command(about = "Marketing and sales reports from tabular exports")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for charts, tables and the summary
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Chart image format
    #[arg(long, value_enum)]
    format: Option<ChartFormat>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare two periods (baseline first) of campaign orders
    Campaign {
        /// Source section as TAG=PATH, given twice
        #[arg(long = "section", value_parser = parse_section)]
        sections: Vec<Section>,
    },
    /// Monthly revenue story from an invoice export
    Seasonality {
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Purchase funnel channel coverage
    Funnel {
        /// CSV of Channel,Stage,Emphasis rows replacing the built-in funnel
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn parse_section(s: &str) -> Result<Section, String> {
    match s.split_once('=') {
        Some((tag, path)) if !tag.trim().is_empty() && !path.trim().is_empty() => Ok(Section::new(tag.trim(), path.trim())),
        _ => Err(format!("expected TAG=PATH, got `{}`", s)),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(dir) = &cli.output {
        config.output.directory = dir.clone();
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    match &cli.command {
        Command::Campaign { sections } if !sections.is_empty() => config.campaign.sections = sections.clone(),
        Command::Seasonality { data: Some(path) } => config.seasonality.data = Some(path.clone()),
        Command::Funnel { data: Some(path) } => config.funnel.data = Some(path.clone()),
        _ => {}
    }

    config.validate().context("validating configuration")?;
    Ok(config)
}

fn run(cli: &Cli) -> anyhow::Result<ReportSummary> {
    let config = load_config(cli)?;
    tracing::debug!("Config: {:?}", config);

    let renderer = ChartRenderer::new(&config.output.directory, config.output.format);
    let pipeline = Pipeline::new(renderer, config.output.preview_rows);

    let summary = match &cli.command {
        Command::Campaign { .. } => {
            let report = CampaignReport::new(config.campaign)?;
            pipeline.run(&report).context("campaign report")?
        }
        Command::Seasonality { .. } => {
            let report = SeasonalityReport::new(config.seasonality)?;
            pipeline.run(&report).context("seasonality report")?
        }
        Command::Funnel { .. } => pipeline.run(&FunnelReport::new(config.funnel)).context("funnel report")?,
    };
    Ok(summary)
}

fn main() {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting campaign-report");

    match run(&cli) {
        Ok(summary) => {
            summary.print();
            tracing::info!("Report completed, {} files written", summary.artifacts.len());
        }
        Err(e) => {
            tracing::error!("Report failed: {:#}", e);
            eprintln!("error: {:#}", e);
            let code = e.downcast_ref::<ReportError>().map(ReportError::exit_code).unwrap_or(1);
            std::process::exit(code);
        }
    }
}
