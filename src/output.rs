use crate::error::RenderError;
use crate::metrics::ObjectiveOutcome;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

/// One label/value line of a report summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarySection {
    pub heading: String,
    pub entries: Vec<SummaryEntry>,
}

impl SummarySection {
    pub fn new(heading: &str) -> Self {
        Self { heading: heading.to_string(), entries: Vec::new() }
    }

    pub fn entry(&mut self, label: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push(SummaryEntry { label: label.into(), value: value.into(), status: None });
        self
    }

    pub fn objective(&mut self, outcome: &ObjectiveOutcome, value: impl Into<String>) -> &mut Self {
        self.entries.push(SummaryEntry {
            label: outcome.objective.description.clone(),
            value: value.into(),
            status: Some(outcome.status().to_string()),
        });
        self
    }
}

/// Structured result of one report run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub title: String,
    pub sections: Vec<SummarySection>,
    pub artifacts: Vec<PathBuf>,
}

impl ReportSummary {
    pub fn new(title: &str) -> Self {
        Self { title: title.to_string(), sections: Vec::new(), artifacts: Vec::new() }
    }

    pub fn push(&mut self, section: SummarySection) {
        self.sections.push(section);
    }

    pub fn find(&self, label: &str) -> Option<&SummaryEntry> {
        self.sections.iter().flat_map(|s| &s.entries).find(|e| e.label == label)
    }

    /// Print to the console and mirror every line into the log.
    pub fn print(&self) {
        let rule = "=".repeat(80);
        println!("\n{}\n{}\n{}", rule, self.title, rule);
        for section in &self.sections {
            println!("\n{}\n{}", section.heading, "-".repeat(80));
            for e in &section.entries {
                match &e.status {
                    Some(status) => println!("{}: {} [{}]", e.label, e.value, status),
                    None => println!("{}: {}", e.label, e.value),
                }
                info!(section = %section.heading, label = %e.label, value = %e.value, status = ?e.status, "summary");
            }
        }
        if !self.artifacts.is_empty() {
            println!("\nGenerated files:");
            for (i, a) in self.artifacts.iter().enumerate() {
                println!("  {}. {}", i + 1, a.display());
            }
        }
        println!("{}", rule);
    }
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), RenderError> {
    let fail = |message: String| RenderError::Write { path: path.to_path_buf(), message };
    let mut wtr = csv::Writer::from_path(path).map_err(|e| fail(e.to_string()))?;
    for r in rows {
        wtr.serialize(r).map_err(|e| fail(e.to_string()))?;
    }
    wtr.flush().map_err(|e| fail(e.to_string()))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RenderError> {
    let fail = |message: String| RenderError::Write { path: path.to_path_buf(), message };
    let s = serde_json::to_string_pretty(value).map_err(|e| fail(e.to_string()))?;
    std::fs::write(path, s).map_err(|e| fail(e.to_string()))?;
    Ok(())
}

pub fn preview_table_rows<T>(title: &str, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
