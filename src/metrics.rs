//! Derived metrics. Each one checks its denominator and reports an
//! undefined metric instead of producing infinity or NaN.
use crate::aggregate::PivotTable;
use crate::error::{ReportError, Result};
use serde::Serialize;

/// Baseline and comparison values with the percent change between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonMetric {
    pub baseline: f64,
    pub comparison: f64,
    pub percent_change: f64,
}

impl ComparisonMetric {
    /// Fails when `baseline` is zero.
    pub fn new(baseline: f64, comparison: f64) -> Result<Self> {
        Ok(Self { baseline, comparison, percent_change: percent_change(baseline, comparison)? })
    }
}

pub fn percent_change(baseline: f64, comparison: f64) -> Result<f64> {
    if !baseline.is_finite() || !comparison.is_finite() {
        return Err(ReportError::undefined("percent change", "non-finite input"));
    }
    if baseline == 0.0 {
        return Err(ReportError::undefined("percent change", "baseline is zero"));
    }
    Ok((comparison - baseline) / baseline * 100.0)
}

/// `(revenue - cost) / cost * 100`. Undefined for zero or negative cost.
pub fn roi(revenue: f64, cost: f64) -> Result<f64> {
    if !(cost > 0.0) {
        return Err(ReportError::undefined("ROI", format!("cost must be positive, got {}", cost)));
    }
    Ok((revenue - cost) / cost * 100.0)
}

/// Spend divided by the number of acquired customers or orders.
pub fn cost_per_acquisition(spend: f64, acquisitions: usize) -> Result<f64> {
    if acquisitions == 0 {
        return Err(ReportError::undefined("CPA", "no acquisitions"));
    }
    Ok(spend / acquisitions as f64)
}

/// `part` as a percentage of `whole`.
pub fn share_of_total(part: f64, whole: f64) -> Result<f64> {
    if !(whole > 0.0) {
        return Err(ReportError::undefined("share of total", format!("total must be positive, got {}", whole)));
    }
    Ok(part / whole * 100.0)
}

/// Per-row percent change between two pivot columns, in row order.
/// A row missing either value is undefined.
pub fn change_by_row(pivot: &PivotTable, baseline: &str, comparison: &str) -> Result<Vec<(String, ComparisonMetric)>> {
    let base = pivot.column(baseline)?;
    let comp = pivot.column(comparison)?;
    pivot
        .rows
        .iter()
        .zip(base.into_iter().zip(comp))
        .map(|(label, pair)| match pair {
            (Some(b), Some(c)) => ComparisonMetric::new(b, c)
                .map(|m| (label.clone(), m))
                .map_err(|e| match e {
                    ReportError::UndefinedMetric { reason, .. } => ReportError::undefined(
                        format!("growth of `{}`", label),
                        if b == 0.0 { format!("{} value is zero", baseline) } else { reason },
                    ),
                    other => other,
                }),
            _ => Err(ReportError::undefined(
                format!("growth of `{}`", label),
                format!("no value for both {} and {}", baseline, comparison),
            )),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    AtLeast,
    AtMost,
}

/// A numeric target on a percent change, e.g. "increase by 30%".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Objective {
    pub description: String,
    pub threshold: f64,
    pub direction: Direction,
}

impl Objective {
    pub fn at_least(description: &str, threshold: f64) -> Self {
        Self { description: description.to_string(), threshold, direction: Direction::AtLeast }
    }

    pub fn at_most(description: &str, threshold: f64) -> Self {
        Self { description: description.to_string(), threshold, direction: Direction::AtMost }
    }

    pub fn evaluate(&self, metric: &ComparisonMetric) -> ObjectiveOutcome {
        let met = match self.direction {
            Direction::AtLeast => metric.percent_change >= self.threshold,
            Direction::AtMost => metric.percent_change <= self.threshold,
        };
        ObjectiveOutcome { objective: self.clone(), metric: *metric, met }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectiveOutcome {
    pub objective: Objective,
    pub metric: ComparisonMetric,
    pub met: bool,
}

impl ObjectiveOutcome {
    pub fn status(&self) -> &'static str {
        if self.met {
            "MET"
        } else {
            "NOT MET"
        }
    }
}
