use crate::error::{LoadError, ReportError, Result};
use crate::types::{ColumnKind, ColumnSpec, Dataset, Record, Value};
use crate::util::{parse_date_safe, parse_f64_safe};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One logical section of a source (a spreadsheet sheet exported to CSV),
/// tagged with the provenance value stamped onto each of its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub tag: String,
    pub path: PathBuf,
}

impl Section {
    pub fn new(tag: &str, path: impl Into<PathBuf>) -> Self {
        Self { tag: tag.to_string(), path: path.into() }
    }
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub rows_per_section: Vec<(String, usize)>,
}

/// Read the declared columns of a CSV file, coercing each cell to its kind.
///
/// Empty cells become [`Value::Missing`]; a non-empty cell that cannot be
/// coerced fails the whole load.
pub fn load_csv(path: &Path, columns: &[ColumnSpec]) -> std::result::Result<Dataset, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing { path: path.to_path_buf() });
    }
    let unreadable = |source| LoadError::Unreadable { path: path.to_path_buf(), source };

    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path).map_err(unreadable)?;
    let headers = rdr.headers().map_err(unreadable)?.clone();

    let mut positions = Vec::with_capacity(columns.len());
    for spec in columns {
        let pos = headers
            .iter()
            .position(|h| h.trim() == spec.name)
            .ok_or_else(|| LoadError::MissingColumn { path: path.to_path_buf(), column: spec.name.clone() })?;
        positions.push(pos);
    }

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(unreadable)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let mut values = Vec::with_capacity(columns.len());
        for (spec, &pos) in columns.iter().zip(&positions) {
            values.push(coerce(row.get(pos), spec, path, line)?);
        }
        records.push(Record::new(values));
    }

    debug!("Loaded {} rows from {}", records.len(), path.display());
    let names = columns.iter().map(|c| c.name.clone()).collect();
    Ok(Dataset::new(names, records))
}

fn coerce(raw: Option<&str>, spec: &ColumnSpec, path: &Path, line: u64) -> std::result::Result<Value, LoadError> {
    let text = raw.map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Ok(Value::Missing);
    }
    let parsed = match spec.kind {
        ColumnKind::Text => Some(Value::Text(text.to_string())),
        ColumnKind::Number => parse_f64_safe(Some(text)).map(Value::Number),
        ColumnKind::Date => parse_date_safe(Some(text)).map(Value::Date),
    };
    parsed.ok_or_else(|| LoadError::Malformed {
        path: path.to_path_buf(),
        line,
        column: spec.name.clone(),
        kind: spec.kind.as_str(),
        value: text.to_string(),
    })
}

/// Load every section, stamp its tag into `provenance_column`, and union
/// them in section order.
pub fn load_sections(sections: &[Section], columns: &[ColumnSpec], provenance_column: &str) -> Result<(Dataset, LoadReport)> {
    if sections.is_empty() {
        return Err(ReportError::config("at least one data section is required"));
    }
    let mut parts = Vec::with_capacity(sections.len());
    let mut rows_per_section = Vec::with_capacity(sections.len());
    for section in sections {
        let part = load_csv(&section.path, columns)?;
        info!("Section {}: {} rows from {}", section.tag, part.len(), section.path.display());
        rows_per_section.push((section.tag.clone(), part.len()));
        let tag = section.tag.clone();
        parts.push(part.with_column(provenance_column, |_| Value::Text(tag.clone()))?);
    }
    let data = Dataset::union(parts)?;
    let report = LoadReport { total_rows: data.len(), rows_per_section };
    Ok((data, report))
}
