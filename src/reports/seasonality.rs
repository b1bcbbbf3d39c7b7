//! Monthly revenue story for an online retail invoice export.
use super::leader;
use crate::aggregate::{group_by, RankedList, Reduction};
use crate::cleaner::{clean, derive, Derivation, Rule};
use crate::config::SeasonalityConfig;
use crate::error::{ReportError, Result};
use crate::loader::load_csv;
use crate::metrics::share_of_total;
use crate::output::{ReportSummary, SummarySection};
use crate::pipeline::{Report, ReportPlan, TableExport};
use crate::render::{ChartView, ValueFormat};
use crate::types::{ColumnSpec, Dataset};
use crate::util::{format_currency, format_int};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

const INVOICE: &str = "InvoiceNo";
const DESCRIPTION: &str = "Description";
const QUANTITY: &str = "Quantity";
const DATE: &str = "InvoiceDate";
const PRICE: &str = "UnitPrice";
const TOTAL: &str = "TotalAmount";
const MONTH: &str = "Month";

pub struct SeasonalityReport {
    config: SeasonalityConfig,
    data: PathBuf,
}

impl SeasonalityReport {
    pub fn new(config: SeasonalityConfig) -> Result<Self> {
        let data = config
            .data
            .clone()
            .ok_or_else(|| ReportError::config("seasonality.data is not set (use --data)"))?;
        Ok(Self { config, data })
    }

    pub fn data_path(&self) -> &Path {
        &self.data
    }

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text(INVOICE),
            ColumnSpec::text(DESCRIPTION),
            ColumnSpec::number(QUANTITY),
            ColumnSpec::date(DATE),
            ColumnSpec::number(PRICE),
        ]
    }

    fn money(&self, v: f64) -> String {
        format_currency(&self.config.currency, v, 2)
    }
}

/// `2011-11` → `Nov 2011`; anything else is shown as is.
pub(crate) fn month_label(month: &str) -> String {
    NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|_| month.to_string())
}

impl Report for SeasonalityReport {
    fn name(&self) -> &str {
        "seasonality"
    }

    fn load(&self) -> Result<Dataset> {
        let data = load_csv(&self.data, &Self::columns())?;
        info!("Loaded {} invoice lines from {}", format_int(data.len()), self.data.display());
        Ok(data)
    }

    fn prepare(&self, data: Dataset) -> Result<Dataset> {
        let cleaned = clean(
            &data,
            &[
                Rule::exclude_prefix(INVOICE, "C"),
                Rule::require_positive(QUANTITY),
                Rule::require_positive(PRICE),
                Rule::require_present(DATE),
            ],
        )?;
        let with_total = derive(
            &cleaned,
            &Derivation::Product { name: TOTAL.to_string(), left: QUANTITY.to_string(), right: PRICE.to_string() },
        )?;
        derive(&with_total, &Derivation::Month { name: MONTH.to_string(), column: DATE.to_string() })
    }

    fn build(&self, data: &Dataset) -> Result<ReportPlan> {
        let mut plan = ReportPlan {
            summary: ReportSummary::new("SEASONALITY REPORT - MONTHLY REVENUE"),
            views: Vec::new(),
            tables: Vec::new(),
        };
        let currency = self.config.currency.clone();

        let monthly = group_by(data, &[MONTH], Some(TOTAL), Reduction::Sum)?.sorted_by_key();
        let trend: Vec<(String, f64)> = monthly.entries().iter().map(|(k, v)| (month_label(&k[0]), *v)).collect();
        let peaks = RankedList::from_table(&monthly).top(self.config.highlight_months);

        let date_idx = data.column_index(DATE)?;
        let dates: Vec<_> = data.records().iter().filter_map(|r| r.get(date_idx).as_date()).collect();
        let invoices = group_by(data, &[INVOICE], None, Reduction::Count)?;
        let total = monthly.total();

        let mut overview = SummarySection::new("OVERVIEW");
        if let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) {
            overview.entry("Period", format!("{} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d")));
        }
        overview
            .entry("Total Revenue", self.money(total))
            .entry("Transactions", format_int(invoices.len()))
            .entry("Line Items", format_int(data.len()))
            .entry("Average Monthly Revenue", self.money(total / monthly.len() as f64));
        plan.summary.push(overview);

        let mut months = SummarySection::new("PEAK MONTHS");
        for (i, peak) in peaks.entries().iter().enumerate() {
            let label = month_label(&peak.label);
            months.entry(format!("Peak Month #{}", i + 1), format!("{} ({})", label, self.money(peak.value)));
            plan.views.push(
                ChartView::bar(&format!("story_visual_{}", i + 1), &format!("Monthly Revenue - Peak #{}: {}", i + 1, label), trend.clone())
                    .axes("Month", "Revenue")
                    .format(ValueFormat::Thousands(currency.clone()))
                    .highlight(&label)
                    .note(format!("{}: {}", label, self.money(peak.value))),
            );
        }
        let peak_total: f64 = peaks.entries().iter().map(|e| e.value).sum();
        let share = share_of_total(peak_total, total)?;
        months.entry(format!("Top {} Months Share of Revenue", peaks.len()), format!("{:.1}%", share));
        plan.summary.push(months);

        let by_revenue =
            RankedList::from_table(&group_by(data, &[DESCRIPTION], Some(TOTAL), Reduction::Sum)?).top(self.config.top_products);
        let by_quantity =
            RankedList::from_table(&group_by(data, &[DESCRIPTION], Some(QUANTITY), Reduction::Sum)?).top(self.config.top_products);
        let best_seller = leader(&by_revenue)?;
        let most_sold = leader(&by_quantity)?;

        let mut products = SummarySection::new("PRODUCTS");
        products
            .entry("Top Product by Revenue", format!("{} ({})", best_seller.label, self.money(best_seller.value)))
            .entry("Top Product by Quantity", format!("{} ({} units)", most_sold.label, format_int(most_sold.value as u64)));
        plan.summary.push(products);

        plan.views.push(
            ChartView::ranked("top_products_revenue", &format!("Top {} Products by Revenue", by_revenue.len()), &by_revenue)
                .axes("Revenue", "")
                .format(ValueFormat::Currency(currency.clone()))
                .highlight(&best_seller.label),
        );
        plan.views.push(
            ChartView::ranked("top_products_quantity", &format!("Top {} Products by Quantity Sold", by_quantity.len()), &by_quantity)
                .axes("Units Sold", "")
                .format(ValueFormat::Count)
                .highlight(&most_sold.label),
        );

        plan.tables.push(TableExport::Aggregate { name: "monthly_revenue".to_string(), rows: monthly.to_rows(|v| self.money(v)) });
        plan.tables.push(TableExport::Ranked { name: "top_products".to_string(), rows: by_revenue.to_rows(|v| self.money(v)) });
        Ok(plan)
    }
}
