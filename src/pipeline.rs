//! The load → clean → aggregate → render flow shared by every report.
use crate::error::Result;
use crate::output::{preview_table_rows, write_csv, write_json, ReportSummary};
use crate::render::{ChartRenderer, ChartView};
use crate::types::{AggregateRow, Dataset, RankedRow};
use tracing::info;

/// A table exported next to the charts as `<report>_<name>.csv`.
#[derive(Debug, Clone)]
pub enum TableExport {
    Aggregate { name: String, rows: Vec<AggregateRow> },
    Ranked { name: String, rows: Vec<RankedRow> },
}

/// Everything a report computed, ready to be written. Building a plan must
/// not touch the filesystem, so a failed computation leaves no artifacts.
#[derive(Debug, Clone)]
pub struct ReportPlan {
    pub summary: ReportSummary,
    pub views: Vec<ChartView>,
    pub tables: Vec<TableExport>,
}

pub trait Report {
    /// Short name used for log fields and artifact file names.
    fn name(&self) -> &str;

    fn load(&self) -> Result<Dataset>;

    /// Row filtering and derived columns. The default keeps the data as loaded.
    fn prepare(&self, data: Dataset) -> Result<Dataset> {
        Ok(data)
    }

    fn build(&self, data: &Dataset) -> Result<ReportPlan>;
}

pub struct Pipeline {
    renderer: ChartRenderer,
    preview_rows: usize,
}

impl Pipeline {
    pub fn new(renderer: ChartRenderer, preview_rows: usize) -> Self {
        Self { renderer, preview_rows }
    }

    /// Run one report to completion. Any stage failure aborts the run.
    pub fn run<R: Report>(&self, report: &R) -> Result<ReportSummary> {
        let name = report.name();
        info!(report = name, "Loading data");
        let loaded = report.load()?;
        info!(report = name, rows = loaded.len(), "Loaded");

        let data = report.prepare(loaded)?;
        info!(report = name, rows = data.len(), "Prepared");

        let plan = report.build(&data)?;
        info!(report = name, views = plan.views.len(), tables = plan.tables.len(), "Aggregates computed");

        // Reject the whole plan before the first file is written.
        for view in &plan.views {
            view.validate()?;
        }
        self.renderer.ensure_output_dir()?;
        let mut summary = plan.summary;
        for view in &plan.views {
            summary.artifacts.push(self.renderer.render(view)?);
        }

        let dir = self.renderer.output_dir();
        for table in &plan.tables {
            let path = match table {
                TableExport::Aggregate { name: table_name, rows } => {
                    let path = dir.join(format!("{}_{}.csv", name, table_name));
                    write_csv(&path, rows)?;
                    preview_table_rows(table_name, rows, self.preview_rows);
                    path
                }
                TableExport::Ranked { name: table_name, rows } => {
                    let path = dir.join(format!("{}_{}.csv", name, table_name));
                    write_csv(&path, rows)?;
                    preview_table_rows(table_name, rows, self.preview_rows);
                    path
                }
            };
            summary.artifacts.push(path);
        }

        let summary_path = dir.join(format!("{}_summary.json", name));
        summary.artifacts.push(summary_path.clone());
        write_json(&summary_path, &summary)?;
        info!(report = name, artifacts = summary.artifacts.len(), "Report written");
        Ok(summary)
    }
}
