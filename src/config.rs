use crate::error::{ReportError, Result};
use crate::loader::Section;
use crate::render::ChartFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Run configuration, usually read from a TOML file. Every table and field
/// is optional; CLI flags override what the file provides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub campaign: CampaignConfig,
    pub seasonality: SeasonalityConfig,
    pub funnel: FunnelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub format: ChartFormat,
    pub preview_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from("reports"), format: ChartFormat::Png, preview_rows: 5 }
    }
}

/// Two-period marketing comparison. The first section is the baseline,
/// the second the period being evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    pub sections: Vec<Section>,
    pub provenance_column: String,
    pub currency: String,
    pub paid_channel: String,
    pub sales_objective_pct: f64,
    pub ad_spend_objective_pct: f64,
    pub age_order: Vec<String>,
    pub top_customers: usize,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            sections: Vec::new(),
            provenance_column: "Year".to_string(),
            currency: "$".to_string(),
            paid_channel: "Paid".to_string(),
            sales_objective_pct: 30.0,
            ad_spend_objective_pct: -30.0,
            age_order: ["18-25", "26-35", "36-45", "46-50", "51-55", "55+"].iter().map(|s| s.to_string()).collect(),
            top_customers: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    pub data: Option<PathBuf>,
    pub currency: String,
    pub highlight_months: usize,
    pub top_products: usize,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self { data: None, currency: "£".to_string(), highlight_months: 3, top_products: 10 }
    }
}

/// The funnel report ships with a built-in channel/stage mapping; `data`
/// replaces it with a CSV of `Channel,Stage,Emphasis` rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelConfig {
    pub data: Option<PathBuf>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReportError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ReportError::config(format!("TOML parsing error: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.directory.as_os_str().is_empty() {
            return Err(ReportError::config("output.directory must not be empty"));
        }
        let c = &self.campaign;
        if !c.sections.is_empty() && c.sections.len() != 2 {
            return Err(ReportError::config(format!(
                "campaign.sections needs exactly two entries (baseline and comparison), got {}",
                c.sections.len()
            )));
        }
        if c.sections.len() == 2 && c.sections[0].tag == c.sections[1].tag {
            return Err(ReportError::config("campaign.sections tags must differ"));
        }
        if c.provenance_column.trim().is_empty() {
            return Err(ReportError::config("campaign.provenance_column must not be empty"));
        }
        if c.top_customers == 0 || self.seasonality.top_products == 0 {
            return Err(ReportError::config("top-N sizes must be at least 1"));
        }
        if self.seasonality.highlight_months == 0 {
            return Err(ReportError::config("seasonality.highlight_months must be at least 1"));
        }
        Ok(())
    }
}
