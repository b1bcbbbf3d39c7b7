//! B2B purchase funnel: which channels are active at which stage.
use super::leader;
use crate::aggregate::{group_by, RankedList, Reduction};
use crate::cleaner::{clean, Rule};
use crate::config::FunnelConfig;
use crate::error::{ReportError, Result};
use crate::loader::load_csv;
use crate::output::{ReportSummary, SummarySection};
use crate::pipeline::{Report, ReportPlan, TableExport};
use crate::render::{ChartView, ValueFormat};
use crate::types::{ColumnSpec, Dataset, Record, Value};
use crate::util::format_int;
use std::collections::HashSet;
use tracing::{info, warn};

const CHANNEL: &str = "Channel";
const STAGE: &str = "Stage";
const EMPHASIS: &str = "Emphasis";

pub const STAGES: [&str; 5] = ["Awareness", "Interest", "Consideration", "Decision", "Post-Purchase"];

const PRIMARY: &str = "Primary";
const SECONDARY: &str = "Secondary";

/// (channel, stage, emphasis) for every active cell of the default funnel.
const DEFAULT_CELLS: [(&str, &str, &str); 21] = [
    ("Website/SEO", "Awareness", SECONDARY),
    ("Website/SEO", "Interest", PRIMARY),
    ("Industry Events", "Awareness", PRIMARY),
    ("Industry Events", "Interest", SECONDARY),
    ("Case Studies", "Interest", PRIMARY),
    ("Case Studies", "Consideration", SECONDARY),
    ("Demo Request", "Consideration", PRIMARY),
    ("Demo Request", "Decision", SECONDARY),
    ("Partner Network", "Interest", SECONDARY),
    ("Partner Network", "Consideration", PRIMARY),
    ("Direct Sales", "Consideration", SECONDARY),
    ("Direct Sales", "Decision", PRIMARY),
    ("Webinars", "Interest", PRIMARY),
    ("Webinars", "Consideration", SECONDARY),
    ("Trade Publications", "Awareness", SECONDARY),
    ("LinkedIn (B2B)", "Awareness", PRIMARY),
    ("LinkedIn (B2B)", "Interest", SECONDARY),
    ("Email Campaigns", "Interest", PRIMARY),
    ("Email Campaigns", "Consideration", SECONDARY),
    ("Pilot Program", "Decision", PRIMARY),
    ("Pilot Program", "Post-Purchase", SECONDARY),
];

/// A typical route through the funnel as (channel, stage) steps.
pub struct Journey {
    pub name: &'static str,
    pub steps: &'static [(&'static str, &'static str)],
}

pub const JOURNEYS: [Journey; 3] = [
    Journey {
        name: "Web -> Demo -> Pilot",
        steps: &[
            ("Website/SEO", "Awareness"),
            ("Website/SEO", "Interest"),
            ("Demo Request", "Consideration"),
            ("Demo Request", "Decision"),
            ("Pilot Program", "Post-Purchase"),
        ],
    },
    Journey {
        name: "Event -> Sales -> Pilot",
        steps: &[
            ("Industry Events", "Awareness"),
            ("Industry Events", "Interest"),
            ("Case Studies", "Consideration"),
            ("Direct Sales", "Decision"),
            ("Pilot Program", "Post-Purchase"),
        ],
    },
    Journey {
        name: "Social -> Webinar -> Partner",
        steps: &[
            ("LinkedIn (B2B)", "Awareness"),
            ("Webinars", "Interest"),
            ("Partner Network", "Consideration"),
            ("Pilot Program", "Decision"),
        ],
    },
];

pub struct FunnelReport {
    config: FunnelConfig,
}

impl FunnelReport {
    pub fn new(config: FunnelConfig) -> Self {
        Self { config }
    }

    fn columns() -> Vec<ColumnSpec> {
        vec![ColumnSpec::text(CHANNEL), ColumnSpec::text(STAGE), ColumnSpec::text(EMPHASIS)]
    }

    /// The default funnel as a dataset.
    pub fn default_cells() -> Dataset {
        let records = DEFAULT_CELLS
            .iter()
            .map(|(channel, stage, emphasis)| {
                Record::new(vec![
                    Value::Text(channel.to_string()),
                    Value::Text(stage.to_string()),
                    Value::Text(emphasis.to_string()),
                ])
            })
            .collect();
        Dataset::new(Self::columns().into_iter().map(|c| c.name).collect(), records)
    }
}

fn is_active(data: &Dataset, channel: &str, stage: &str) -> Result<bool> {
    let (c, s) = (data.column_index(CHANNEL)?, data.column_index(STAGE)?);
    Ok(data
        .records()
        .iter()
        .any(|r| r.get(c).as_text() == Some(channel) && r.get(s).as_text() == Some(stage)))
}

impl Report for FunnelReport {
    fn name(&self) -> &str {
        "funnel"
    }

    fn load(&self) -> Result<Dataset> {
        match &self.config.data {
            Some(path) => {
                let data = load_csv(path, &Self::columns())?;
                info!("Loaded {} channel-stage cells from {}", data.len(), path.display());
                Ok(data)
            }
            None => Ok(Self::default_cells()),
        }
    }

    fn prepare(&self, data: Dataset) -> Result<Dataset> {
        let data = clean(
            &data,
            &[Rule::require_present(CHANNEL), Rule::require_present(STAGE), Rule::require_present(EMPHASIS)],
        )?;
        let (c, s, e) = (data.column_index(CHANNEL)?, data.column_index(STAGE)?, data.column_index(EMPHASIS)?);
        let mut seen = HashSet::new();
        for record in data.records() {
            let channel = record.get(c).as_text().unwrap_or_default();
            let stage = record.get(s).as_text().unwrap_or_default();
            if !STAGES.contains(&stage) {
                return Err(ReportError::config(format!("unknown funnel stage `{}`", stage)));
            }
            let emphasis = record.get(e).as_text().unwrap_or_default();
            if emphasis != PRIMARY && emphasis != SECONDARY {
                return Err(ReportError::config(format!("emphasis must be Primary or Secondary, got `{}`", emphasis)));
            }
            if !seen.insert((channel.to_string(), stage.to_string())) {
                return Err(ReportError::config(format!("duplicate funnel cell `{}` / `{}`", channel, stage)));
            }
        }
        Ok(data)
    }

    fn build(&self, data: &Dataset) -> Result<ReportPlan> {
        let mut plan = ReportPlan {
            summary: ReportSummary::new("PURCHASE FUNNEL - CHANNEL COVERAGE"),
            views: Vec::new(),
            tables: Vec::new(),
        };

        let by_stage = group_by(data, &[STAGE, EMPHASIS], None, Reduction::Count)?;
        let stage_pivot = by_stage.pivot(Some(&STAGES[..]))?;
        let mut stages = SummarySection::new("CHANNELS PER STAGE");
        for stage in STAGES {
            let primary = by_stage.value(&[stage, PRIMARY]).unwrap_or(0.0);
            let secondary = by_stage.value(&[stage, SECONDARY]).unwrap_or(0.0);
            stages.entry(
                stage,
                format!("{} channels ({} primary)", format_int((primary + secondary) as u64), format_int(primary as u64)),
            );
        }
        plan.summary.push(stages);
        plan.views.push(
            ChartView::grouped("funnel_channels_per_stage", "Active Channels per Funnel Stage", &stage_pivot)
                .axes("Stage", "Channels")
                .format(ValueFormat::Count),
        );

        let per_channel = RankedList::from_table(&group_by(data, &[CHANNEL], None, Reduction::Count)?);
        let widest = leader(&per_channel)?;
        let mut channels = SummarySection::new("STAGES PER CHANNEL");
        channels
            .entry("Channels", format_int(per_channel.len()))
            .entry("Active Cells", format_int(data.len()))
            .entry("Widest Reach", format!("{} ({} stages)", widest.label, format_int(widest.value as u64)));
        plan.summary.push(channels);
        plan.views.push(
            ChartView::ranked("funnel_stages_per_channel", "Funnel Stages Covered per Channel", &per_channel)
                .axes("Stages", "")
                .format(ValueFormat::Count),
        );
        plan.tables.push(TableExport::Ranked {
            name: "stages_per_channel".to_string(),
            rows: per_channel.to_rows(|v| format_int(v as u64)),
        });

        let mut journeys = SummarySection::new("CUSTOMER JOURNEYS");
        for (i, journey) in JOURNEYS.iter().enumerate() {
            let mut active = true;
            for (channel, stage) in journey.steps {
                active &= is_active(data, channel, stage)?;
            }
            if !active {
                warn!("Journey `{}` passes through an inactive cell, skipping", journey.name);
                continue;
            }
            let route: Vec<String> = journey.steps.iter().map(|(c, s)| format!("{} ({})", c, s)).collect();
            journeys.entry(format!("Path {}: {}", i + 1, journey.name), route.join(" -> "));
        }
        plan.summary.push(journeys);
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_funnel_covers_every_stage() {
        let report = FunnelReport::new(FunnelConfig::default());
        let data = report.prepare(report.load().unwrap()).unwrap();
        assert_eq!(data.len(), 21);
        let plan = report.build(&data).unwrap();
        assert_eq!(plan.summary.find("Awareness").unwrap().value, "4 channels (2 primary)");
        assert_eq!(plan.summary.find("Interest").unwrap().value, "7 channels (4 primary)");
        assert_eq!(plan.summary.find("Post-Purchase").unwrap().value, "1 channels (0 primary)");
        assert_eq!(plan.summary.find("Channels").unwrap().value, "11");
        assert_eq!(plan.summary.find("Widest Reach").unwrap().value, "Website/SEO (2 stages)");
        assert_eq!(plan.summary.sections[2].entries.len(), 3);
        for view in &plan.views {
            view.validate().unwrap();
        }
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let data = Dataset::new(
            vec![CHANNEL.into(), STAGE.into(), EMPHASIS.into()],
            vec![Record::new(vec![Value::Text("Radio".into()), Value::Text("Loyalty".into()), Value::Text(PRIMARY.into())])],
        );
        let report = FunnelReport::new(FunnelConfig::default());
        assert!(matches!(report.prepare(data), Err(ReportError::Config { .. })));
    }

    #[test]
    fn duplicate_cell_is_rejected() {
        let cell = |emphasis: &str| {
            Record::new(vec![Value::Text("Webinars".into()), Value::Text("Interest".into()), Value::Text(emphasis.into())])
        };
        let data = Dataset::new(vec![CHANNEL.into(), STAGE.into(), EMPHASIS.into()], vec![cell(PRIMARY), cell(SECONDARY)]);
        let report = FunnelReport::new(FunnelConfig::default());
        match report.prepare(data) {
            Err(ReportError::Config { message }) => assert!(message.contains("duplicate funnel cell `Webinars` / `Interest`")),
            other => panic!("expected a config error, got {:?}", other.map(|d| d.len())),
        }
    }
}
