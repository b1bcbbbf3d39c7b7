use crate::error::{ReportError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Declared type of a loaded column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Number,
    Date,
}

impl ColumnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Number => "number",
            ColumnKind::Date => "date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn text(name: &str) -> Self {
        Self { name: name.to_string(), kind: ColumnKind::Text }
    }

    pub fn number(name: &str) -> Self {
        Self { name: name.to_string(), kind: ColumnKind::Number }
    }

    pub fn date(name: &str) -> Self {
        Self { name: name.to_string(), kind: ColumnKind::Date }
    }
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Missing,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Render the cell as a grouping key. Missing cells have no key.
    pub fn key(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            // Identifiers such as `1000001` load as numbers but group as labels.
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Value::Number(n) => Some(n.to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Missing => None,
        }
    }
}

/// One loaded row. Cells are positional and follow the owning dataset's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Missing)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn with_value(&self, value: Value) -> Record {
        let mut values = self.values.clone();
        values.push(value);
        Record { values }
    }
}

/// Immutable in-memory table. Cleaning and deriving return new datasets.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ReportError::UnknownColumn(name.to_string()))
    }

    /// Keep the records matching `keep`, preserving their relative order.
    pub fn filter<F>(&self, keep: F) -> Dataset
    where
        F: Fn(&Record) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Append a computed column; `compute` sees each record before the new cell.
    pub fn with_column<F>(&self, name: &str, compute: F) -> Result<Dataset>
    where
        F: Fn(&Record) -> Value,
    {
        if self.columns.iter().any(|c| c == name) {
            return Err(ReportError::config(format!("column `{}` already exists", name)));
        }
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let records = self.records.iter().map(|r| r.with_value(compute(r))).collect();
        Ok(Dataset { columns, records })
    }

    /// Concatenate datasets sharing the same column layout.
    pub fn union(parts: Vec<Dataset>) -> Result<Dataset> {
        let mut iter = parts.into_iter();
        let Some(mut first) = iter.next() else {
            return Err(ReportError::config("cannot union zero datasets"));
        };
        for part in iter {
            if part.columns != first.columns {
                return Err(ReportError::config(format!(
                    "cannot union datasets with different columns: {:?} vs {:?}",
                    first.columns, part.columns
                )));
            }
            first.records.extend(part.records);
        }
        Ok(first)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct AggregateRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct RankedRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Label")]
    #[tabled(rename = "Label")]
    pub label: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["Channel".to_string(), "Amount".to_string()],
            vec![
                Record::new(vec![Value::Text("Paid".into()), Value::Number(10.0)]),
                Record::new(vec![Value::Text("Organic".into()), Value::Number(20.0)]),
            ],
        )
    }

    #[test]
    fn integral_numbers_key_without_decimals() {
        assert_eq!(Value::Number(1000001.0).key().as_deref(), Some("1000001"));
        assert_eq!(Value::Number(2.5).key().as_deref(), Some("2.5"));
        assert_eq!(Value::Missing.key(), None);
    }

    #[test]
    fn unknown_column_is_reported() {
        let ds = sample();
        assert_eq!(ds.column_index("Amount").unwrap(), 1);
        assert!(matches!(ds.column_index("Nope"), Err(ReportError::UnknownColumn(c)) if c == "Nope"));
    }

    #[test]
    fn with_column_appends_and_rejects_duplicates() {
        let ds = sample();
        let doubled = ds
            .with_column("Double", |r| Value::Number(r.get(1).as_f64().unwrap() * 2.0))
            .unwrap();
        assert_eq!(doubled.columns().len(), 3);
        assert_eq!(doubled.records()[1].get(2), &Value::Number(40.0));
        assert_eq!(ds.columns().len(), 2);
        assert!(doubled.with_column("Amount", |_| Value::Missing).is_err());
    }

    #[test]
    fn union_requires_matching_columns() {
        let merged = Dataset::union(vec![sample(), sample()]).unwrap();
        assert_eq!(merged.len(), 4);

        let other = Dataset::new(vec!["X".to_string()], vec![]);
        assert!(Dataset::union(vec![sample(), other]).is_err());
        assert!(Dataset::union(vec![]).is_err());
    }
}
