//! Load tabular sales exports, clean and aggregate them, and write chart,
//! table and summary artifacts for a handful of marketing reports.
pub mod aggregate;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod loader;
pub mod logger;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod reports;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::{LoadError, RenderError, ReportError, Result};
pub use pipeline::{Pipeline, Report, ReportPlan};
pub use render::{ChartFormat, ChartRenderer};
pub use reports::{CampaignReport, FunnelReport, SeasonalityReport};
