//! The concrete reports built on the shared pipeline.
mod campaign;
mod funnel;
mod seasonality;

pub use campaign::CampaignReport;
pub use funnel::FunnelReport;
pub use seasonality::SeasonalityReport;

use crate::aggregate::{AggregateTable, RankedEntry, RankedList};
use crate::error::{ReportError, Result};
use crate::metrics::ComparisonMetric;
use crate::render::{ChartView, ValueFormat};
use crate::util::format_change;

/// Value of one group; a group with no records cannot be reported on.
fn require(table: &AggregateTable, key: &[&str]) -> Result<f64> {
    table.value(key).ok_or_else(|| ReportError::EmptyAggregation {
        measure: format!("{} for {}", table.measure(), key.join(" / ")),
    })
}

fn leader(ranked: &RankedList) -> Result<&RankedEntry> {
    ranked.first().ok_or_else(|| ReportError::EmptyAggregation { measure: "ranking".to_string() })
}

/// Two bars, baseline then comparison, annotated with the change between them.
fn comparison_view(name: &str, title: &str, periods: (&str, &str), metric: &ComparisonMetric, format: ValueFormat) -> ChartView {
    ChartView::bar(
        name,
        title,
        vec![(periods.0.to_string(), metric.baseline), (periods.1.to_string(), metric.comparison)],
    )
    .format(format)
    .note(format!("Change: {}", format_change(metric.percent_change, 1)))
}
