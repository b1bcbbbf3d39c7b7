//! Group-by reduction over a [`Dataset`] and the tables it produces.
//!
//! Every table keeps its groups in first-seen order. Anything that picks a
//! single group (argmin, argmax, ranking ties) resolves exact ties in favour
//! of the group seen first.
use crate::error::{ReportError, Result};
use crate::types::{AggregateRow, Dataset, RankedRow};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

pub type GroupKey = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reduction::Sum => "sum",
            Reduction::Mean => "mean",
            Reduction::Count => "count",
            Reduction::Min => "min",
            Reduction::Max => "max",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
struct Acc {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl Acc {
    fn new() -> Self {
        Self { sum: 0.0, count: 0, min: f64::INFINITY, max: f64::NEG_INFINITY }
    }

    fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn reduce(&self, reduction: Reduction) -> f64 {
        match reduction {
            Reduction::Sum => self.sum,
            Reduction::Mean => self.sum / self.count as f64,
            Reduction::Count => self.count as f64,
            Reduction::Min => self.min,
            Reduction::Max => self.max,
        }
    }
}

/// Group `data` by the `keys` columns and reduce `measure` in each group.
///
/// With `measure == None` every record counts as one value, so
/// `Reduction::Count` yields row counts. Records with a missing key are
/// skipped, as are missing measure cells; a group left without any value
/// does not appear in the table. Reducing zero values overall fails with
/// [`ReportError::EmptyAggregation`].
pub fn group_by(data: &Dataset, keys: &[&str], measure: Option<&str>, reduction: Reduction) -> Result<AggregateTable> {
    let key_idx = keys.iter().map(|k| data.column_index(k)).collect::<Result<Vec<_>>>()?;
    let measure_idx = measure.map(|m| data.column_index(m)).transpose()?;
    let measure_name = measure.unwrap_or("rows").to_string();

    let mut order: Vec<GroupKey> = Vec::new();
    let mut accs: HashMap<GroupKey, Acc> = HashMap::new();
    let mut skipped_keys = 0usize;

    'rows: for record in data.records() {
        let mut key = Vec::with_capacity(key_idx.len());
        for &idx in &key_idx {
            match record.get(idx).key() {
                Some(k) => key.push(k),
                None => {
                    skipped_keys += 1;
                    continue 'rows;
                }
            }
        }
        let value = match measure_idx {
            Some(idx) => match record.get(idx).as_f64() {
                Some(v) => v,
                None => continue,
            },
            None => 1.0,
        };
        if !accs.contains_key(&key) {
            order.push(key.clone());
        }
        accs.entry(key).or_insert_with(Acc::new).push(value);
    }

    if skipped_keys > 0 {
        debug!("group_by {:?}: skipped {} rows with a missing key", keys, skipped_keys);
    }
    if order.is_empty() {
        return Err(ReportError::EmptyAggregation { measure: measure_name });
    }

    let entries = order
        .into_iter()
        .map(|key| {
            let value = accs[&key].reduce(reduction);
            (key, value)
        })
        .collect();
    Ok(AggregateTable::from_entries(
        keys.iter().map(|k| k.to_string()).collect(),
        format!("{}({})", reduction, measure_name),
        entries,
    ))
}

/// Mapping from a tuple of dimension values to one reduced number.
/// Never empty; keys are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    dimensions: Vec<String>,
    measure: String,
    entries: Vec<(GroupKey, f64)>,
}

impl AggregateTable {
    fn from_entries(dimensions: Vec<String>, measure: String, entries: Vec<(GroupKey, f64)>) -> Self {
        Self { dimensions, measure, entries }
    }

    fn non_empty(self) -> Result<Self> {
        if self.entries.is_empty() {
            Err(ReportError::EmptyAggregation { measure: self.measure })
        } else {
            Ok(self)
        }
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn measure(&self) -> &str {
        &self.measure
    }

    pub fn entries(&self) -> &[(GroupKey, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn value(&self, key: &[&str]) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k.len() == key.len() && k.iter().zip(key).all(|(a, b)| a == b))
            .map(|(_, v)| *v)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    fn extreme(&self, better: Ordering) -> (&GroupKey, f64) {
        let mut best = &self.entries[0];
        for entry in &self.entries[1..] {
            // Strict comparison: the first group wins an exact tie.
            if entry.1.partial_cmp(&best.1) == Some(better) {
                best = entry;
            }
        }
        (&best.0, best.1)
    }

    pub fn argmin(&self) -> (&GroupKey, f64) {
        self.extreme(Ordering::Less)
    }

    pub fn argmax(&self) -> (&GroupKey, f64) {
        self.extreme(Ordering::Greater)
    }

    /// Keep the groups whose `dimension` equals `value` and drop that dimension.
    pub fn slice(&self, dimension: &str, value: &str) -> Result<AggregateTable> {
        let pos = self
            .dimensions
            .iter()
            .position(|d| d == dimension)
            .ok_or_else(|| ReportError::UnknownColumn(dimension.to_string()))?;
        let mut dimensions = self.dimensions.clone();
        dimensions.remove(pos);
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| k[pos] == value)
            .map(|(k, v)| {
                let mut k = k.clone();
                k.remove(pos);
                (k, *v)
            })
            .collect();
        AggregateTable::from_entries(dimensions, format!("{} [{}={}]", self.measure, dimension, value), entries)
            .non_empty()
    }

    pub fn filter<F>(&self, keep: F) -> Result<AggregateTable>
    where
        F: Fn(&GroupKey, f64) -> bool,
    {
        let entries = self.entries.iter().filter(|(k, v)| keep(k, *v)).cloned().collect();
        AggregateTable::from_entries(self.dimensions.clone(), self.measure.clone(), entries).non_empty()
    }

    pub fn count_where<F>(&self, pred: F) -> usize
    where
        F: Fn(f64) -> bool,
    {
        self.entries.iter().filter(|(_, v)| pred(*v)).count()
    }

    pub fn sorted_by_key(&self) -> AggregateTable {
        let mut sorted = self.clone();
        sorted.entries.sort_by(|a, b| a.0.cmp(&b.0));
        sorted
    }

    /// Spread a two-dimension table into rows × columns. Rows follow
    /// `row_order` when given (unlisted rows are dropped), otherwise
    /// first-seen order; columns always follow first-seen order.
    pub fn pivot(&self, row_order: Option<&[&str]>) -> Result<PivotTable> {
        if self.dimensions.len() != 2 {
            return Err(ReportError::config(format!(
                "pivot needs exactly two dimensions, `{}` has {}",
                self.measure,
                self.dimensions.len()
            )));
        }
        let mut rows: Vec<String> = match row_order {
            Some(order) => order.iter().map(|s| s.to_string()).collect(),
            None => Vec::new(),
        };
        let mut columns: Vec<String> = Vec::new();
        for (k, _) in &self.entries {
            if row_order.is_none() && !rows.contains(&k[0]) {
                rows.push(k[0].clone());
            }
            if !columns.contains(&k[1]) {
                columns.push(k[1].clone());
            }
        }
        let cells = rows
            .iter()
            .map(|r| columns.iter().map(|c| self.value(&[r.as_str(), c.as_str()])).collect())
            .collect();
        Ok(PivotTable { row_dimension: self.dimensions[0].clone(), rows, columns, cells })
    }

    pub fn to_rows(&self, format: impl Fn(f64) -> String) -> Vec<AggregateRow> {
        self.entries
            .iter()
            .map(|(k, v)| AggregateRow { group: k.join(" / "), value: format(*v) })
            .collect()
    }
}

/// Rows × columns view of a two-dimension aggregate. A cell is `None`
/// when that combination had no values.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub row_dimension: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ReportError::UnknownColumn(name.to_string()))?;
        Ok(self.cells.iter().map(|row| row[idx]).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub label: String,
    pub value: f64,
}

/// Labels sorted by value, largest first; ties keep table order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    entries: Vec<RankedEntry>,
}

impl RankedList {
    pub fn from_table(table: &AggregateTable) -> Self {
        Self::from_pairs(table.entries().iter().map(|(k, v)| (k.join(" / "), *v)))
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut entries: Vec<RankedEntry> = pairs.into_iter().map(|(label, value)| RankedEntry { label, value }).collect();
        // `sort_by` is stable, so equal values stay in first-seen order.
        entries.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
        Self { entries }
    }

    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }

    pub fn top(&self, n: usize) -> RankedList {
        Self { entries: self.entries.iter().take(n).cloned().collect() }
    }

    pub fn to_rows(&self, format: impl Fn(f64) -> String) -> Vec<RankedRow> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| RankedRow { rank: i + 1, label: e.label.clone(), value: format(e.value) })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Record, Value};

    fn dataset(rows: &[(&str, &str, Option<f64>)]) -> Dataset {
        Dataset::new(
            vec!["Group".into(), "Year".into(), "Amount".into()],
            rows.iter()
                .map(|(g, y, a)| {
                    Record::new(vec![
                        Value::Text(g.to_string()),
                        Value::Text(y.to_string()),
                        a.map(Value::Number).unwrap_or(Value::Missing),
                    ])
                })
                .collect(),
        )
    }

    fn abc() -> Dataset {
        dataset(&[("A", "2017", Some(100.0)), ("A", "2018", Some(200.0)), ("B", "2018", Some(300.0))])
    }

    #[test]
    fn sum_and_mean_per_group() {
        let data = abc();
        let sum = group_by(&data, &["Group"], Some("Amount"), Reduction::Sum).unwrap();
        assert_eq!(sum.value(&["A"]), Some(300.0));
        assert_eq!(sum.value(&["B"]), Some(300.0));
        let mean = group_by(&data, &["Group"], Some("Amount"), Reduction::Mean).unwrap();
        assert_eq!(mean.value(&["A"]), Some(150.0));
        assert_eq!(mean.value(&["B"]), Some(300.0));
    }

    #[test]
    fn tied_ranking_keeps_first_seen_group() {
        let sum = group_by(&abc(), &["Group"], Some("Amount"), Reduction::Sum).unwrap();
        let ranked = RankedList::from_table(&sum);
        let labels: Vec<_> = ranked.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B"]);
        assert_eq!(sum.argmax().0, &vec!["A".to_string()]);
        assert_eq!(sum.argmin().0, &vec!["A".to_string()]);
    }

    #[test]
    fn groups_partition_the_total() {
        let data = dataset(&[
            ("A", "2017", Some(12.5)),
            ("B", "2017", Some(7.25)),
            ("C", "2018", Some(3.0)),
            ("A", "2018", Some(41.0)),
            ("B", "2018", Some(0.5)),
        ]);
        let whole = group_by(&data, &[], Some("Amount"), Reduction::Sum).unwrap();
        assert_eq!(whole.len(), 1);
        for keys in [&["Group"][..], &["Year"][..], &["Group", "Year"][..]] {
            let parts = group_by(&data, keys, Some("Amount"), Reduction::Sum).unwrap();
            assert!((parts.total() - whole.total()).abs() < 1e-9);
        }
    }

    #[test]
    fn ranked_list_has_every_group_sorted_descending() {
        let data = dataset(&[("A", "x", Some(5.0)), ("B", "x", Some(9.0)), ("C", "x", Some(1.0)), ("D", "x", Some(7.0))]);
        let table = group_by(&data, &["Group"], Some("Amount"), Reduction::Sum).unwrap();
        let ranked = RankedList::from_table(&table);
        assert_eq!(ranked.len(), table.len());
        assert!(ranked.entries().windows(2).all(|w| w[0].value >= w[1].value));
        assert_eq!(ranked.first().unwrap().value, table.argmax().1);
        assert_eq!(ranked.top(2).len(), 2);
    }

    #[test]
    fn count_and_extremes() {
        let data = abc();
        let counts = group_by(&data, &["Group"], None, Reduction::Count).unwrap();
        assert_eq!(counts.value(&["A"]), Some(2.0));
        assert_eq!(counts.count_where(|v| v > 1.0), 1);
        let min = group_by(&data, &["Group"], Some("Amount"), Reduction::Min).unwrap();
        let max = group_by(&data, &["Group"], Some("Amount"), Reduction::Max).unwrap();
        assert_eq!(min.value(&["A"]), Some(100.0));
        assert_eq!(max.value(&["A"]), Some(200.0));
    }

    #[test]
    fn empty_input_fails_explicitly() {
        let empty = dataset(&[]);
        let err = group_by(&empty, &["Group"], Some("Amount"), Reduction::Mean).unwrap_err();
        assert!(matches!(err, ReportError::EmptyAggregation { measure } if measure == "Amount"));

        let all_missing = dataset(&[("A", "2017", None)]);
        assert!(matches!(
            group_by(&all_missing, &["Group"], Some("Amount"), Reduction::Sum),
            Err(ReportError::EmptyAggregation { .. })
        ));
    }

    #[test]
    fn missing_measures_are_skipped_per_group() {
        let data = dataset(&[("A", "2017", Some(10.0)), ("A", "2017", None), ("B", "2017", None)]);
        let mean = group_by(&data, &["Group"], Some("Amount"), Reduction::Mean).unwrap();
        assert_eq!(mean.value(&["A"]), Some(10.0));
        assert_eq!(mean.value(&["B"]), None);
    }

    #[test]
    fn slice_and_pivot() {
        let table = group_by(&abc(), &["Year", "Group"], Some("Amount"), Reduction::Sum).unwrap();
        let y2018 = table.slice("Year", "2018").unwrap();
        assert_eq!(y2018.dimensions(), &["Group"]);
        assert_eq!(y2018.value(&["B"]), Some(300.0));
        assert!(matches!(table.slice("Year", "2019"), Err(ReportError::EmptyAggregation { .. })));

        let by_group = group_by(&abc(), &["Group", "Year"], Some("Amount"), Reduction::Sum).unwrap();
        let pivot = by_group.pivot(Some(&["B", "A", "C"])).unwrap();
        assert_eq!(pivot.rows, vec!["B", "A", "C"]);
        assert_eq!(pivot.columns, vec!["2017", "2018"]);
        assert_eq!(pivot.column("2017").unwrap(), vec![None, Some(100.0), None]);
        assert_eq!(pivot.column("2018").unwrap(), vec![Some(300.0), Some(200.0), None]);
        assert!(y2018.pivot(None).is_err());
    }

    #[test]
    fn filter_and_sort_by_key() {
        let table = group_by(&abc(), &["Group"], Some("Amount"), Reduction::Sum).unwrap();
        let without_a = table.filter(|k, _| k[0] != "A").unwrap();
        assert_eq!(without_a.len(), 1);
        assert!(table.filter(|_, v| v > 1000.0).is_err());

        let data = dataset(&[("2011-11", "x", Some(1.0)), ("2010-12", "x", Some(2.0))]);
        let months = group_by(&data, &["Group"], Some("Amount"), Reduction::Sum).unwrap().sorted_by_key();
        assert_eq!(months.entries()[0].0, vec!["2010-12".to_string()]);
    }
}
