use crate::error::Result;
use crate::types::{Dataset, Record, Value};
use tracing::info;

/// Row predicate applied by [`clean`]. A record survives only if every rule keeps it.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Drop rows whose text starts with `prefix` (e.g. cancelled invoices `C…`).
    ExcludePrefix { column: String, prefix: String },
    /// Drop rows whose number is missing, zero or negative.
    RequirePositive { column: String },
    RequirePresent { column: String },
    KeepEqual { column: String, value: String },
    ExcludeEqual { column: String, value: String },
}

impl Rule {
    pub fn exclude_prefix(column: &str, prefix: &str) -> Self {
        Rule::ExcludePrefix { column: column.to_string(), prefix: prefix.to_string() }
    }

    pub fn require_positive(column: &str) -> Self {
        Rule::RequirePositive { column: column.to_string() }
    }

    pub fn require_present(column: &str) -> Self {
        Rule::RequirePresent { column: column.to_string() }
    }

    pub fn keep_equal(column: &str, value: &str) -> Self {
        Rule::KeepEqual { column: column.to_string(), value: value.to_string() }
    }

    pub fn exclude_equal(column: &str, value: &str) -> Self {
        Rule::ExcludeEqual { column: column.to_string(), value: value.to_string() }
    }

    fn column(&self) -> &str {
        match self {
            Rule::ExcludePrefix { column, .. }
            | Rule::RequirePositive { column }
            | Rule::RequirePresent { column }
            | Rule::KeepEqual { column, .. }
            | Rule::ExcludeEqual { column, .. } => column,
        }
    }

    fn keeps(&self, value: &Value) -> bool {
        match self {
            // Identifiers may load as numbers, so compare on the key form.
            Rule::ExcludePrefix { prefix, .. } => !value.key().is_some_and(|k| k.starts_with(prefix.as_str())),
            Rule::RequirePositive { .. } => value.as_f64().is_some_and(|v| v > 0.0),
            Rule::RequirePresent { .. } => !value.is_missing(),
            Rule::KeepEqual { value: want, .. } => value.key().as_deref() == Some(want.as_str()),
            Rule::ExcludeEqual { value: unwanted, .. } => value.key().as_deref() != Some(unwanted.as_str()),
        }
    }
}

/// Apply `rules` to `data`, returning a new dataset. The input is untouched
/// and an empty result is not an error.
pub fn clean(data: &Dataset, rules: &[Rule]) -> Result<Dataset> {
    let bound = rules
        .iter()
        .map(|rule| Ok((data.column_index(rule.column())?, rule)))
        .collect::<Result<Vec<_>>>()?;
    let cleaned = data.filter(|record: &Record| bound.iter().all(|(idx, rule)| rule.keeps(record.get(*idx))));
    info!(
        "Cleaning kept {} of {} rows ({} dropped)",
        cleaned.len(),
        data.len(),
        data.len() - cleaned.len()
    );
    Ok(cleaned)
}

/// Computed column appended by [`derive`].
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// `name = left * right`; missing when either side is missing.
    Product { name: String, left: String, right: String },
    /// `YYYY-MM` of a date column, which sorts chronologically as text.
    Month { name: String, column: String },
}

pub fn derive(data: &Dataset, derivation: &Derivation) -> Result<Dataset> {
    match derivation {
        Derivation::Product { name, left, right } => {
            let (l, r) = (data.column_index(left)?, data.column_index(right)?);
            data.with_column(name, |rec| match (rec.get(l).as_f64(), rec.get(r).as_f64()) {
                (Some(a), Some(b)) => Value::Number(a * b),
                _ => Value::Missing,
            })
        }
        Derivation::Month { name, column } => {
            let idx = data.column_index(column)?;
            data.with_column(name, |rec| match rec.get(idx).as_date() {
                Some(d) => Value::Text(d.format("%Y-%m").to_string()),
                None => Value::Missing,
            })
        }
    }
}
