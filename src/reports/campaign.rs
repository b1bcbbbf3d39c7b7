//! Two-period marketing comparison (e.g. Black Friday 2017 vs 2018):
//! objectives, audience, marketing, sales and product views.
use super::{comparison_view, leader, require};
use crate::aggregate::{group_by, PivotTable, RankedList, Reduction};
use crate::cleaner::{clean, Rule};
use crate::config::CampaignConfig;
use crate::error::{ReportError, Result};
use crate::loader::load_sections;
use crate::metrics::{change_by_row, cost_per_acquisition, roi, share_of_total, ComparisonMetric, Objective};
use crate::output::{ReportSummary, SummarySection};
use crate::pipeline::{Report, ReportPlan, TableExport};
use crate::render::{ChartView, ValueFormat};
use crate::types::{ColumnSpec, Dataset};
use crate::util::{format_change, format_currency, format_int, format_number};
use tracing::info;

const USER: &str = "User ID";
const AGE: &str = "Age Range";
const SOURCE: &str = "Customer Source";
const CATEGORY: &str = "Product Category";
const AMOUNT: &str = "Order Amount";
const CPA: &str = "CPA";

pub struct CampaignReport {
    config: CampaignConfig,
}

impl CampaignReport {
    pub fn new(config: CampaignConfig) -> Result<Self> {
        if config.sections.len() != 2 {
            return Err(ReportError::config(format!(
                "the campaign report compares exactly two sections, got {}",
                config.sections.len()
            )));
        }
        Ok(Self { config })
    }

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text(USER),
            ColumnSpec::text(AGE),
            ColumnSpec::text(SOURCE),
            ColumnSpec::text(CATEGORY),
            ColumnSpec::number(AMOUNT),
            ColumnSpec::number(CPA),
        ]
    }

    fn periods(&self) -> (&str, &str) {
        (self.config.sections[0].tag.as_str(), self.config.sections[1].tag.as_str())
    }

    fn period_column(&self) -> &str {
        &self.config.provenance_column
    }

    fn money(&self, v: f64) -> String {
        format_currency(&self.config.currency, v, 2)
    }

    fn age_order(&self) -> Option<Vec<&str>> {
        if self.config.age_order.is_empty() {
            None
        } else {
            Some(self.config.age_order.iter().map(String::as_str).collect())
        }
    }

    fn period_metric(&self, data: &Dataset, measure: Option<&str>, reduction: Reduction) -> Result<ComparisonMetric> {
        let (base, comp) = self.periods();
        let table = group_by(data, &[self.period_column()], measure, reduction)?;
        ComparisonMetric::new(require(&table, &[base])?, require(&table, &[comp])?)
    }

    fn objectives(&self, data: &Dataset, paid: &Dataset, plan: &mut ReportPlan) -> Result<()> {
        let periods = self.periods();
        let sales = self.period_metric(data, Some(AMOUNT), Reduction::Sum)?;
        let spend = self.period_metric(paid, Some(CPA), Reduction::Sum)?;

        let sales_goal = Objective::at_least(
            &format!("Sales Objective ({:+}%)", self.config.sales_objective_pct),
            self.config.sales_objective_pct,
        )
        .evaluate(&sales);
        let spend_goal = Objective::at_most(
            &format!("Ad Spend Objective ({:+}%)", self.config.ad_spend_objective_pct),
            self.config.ad_spend_objective_pct,
        )
        .evaluate(&spend);

        let mut section = SummarySection::new("PART 1: OBJECTIVES");
        section
            .objective(&sales_goal, format_change(sales.percent_change, 2))
            .entry(format!("Total Sales {}", periods.0), self.money(sales.baseline))
            .entry(format!("Total Sales {}", periods.1), self.money(sales.comparison))
            .objective(&spend_goal, format_change(spend.percent_change, 2))
            .entry(format!("Total Ad Spend {}", periods.0), self.money(spend.baseline))
            .entry(format!("Total Ad Spend {}", periods.1), self.money(spend.comparison));
        plan.summary.push(section);

        let currency = ValueFormat::Currency(self.config.currency.clone());
        plan.views.push(
            comparison_view(
                "objectives_sales",
                &format!("Total Sales: {} vs {}", periods.0, periods.1),
                periods,
                &sales,
                currency.clone(),
            )
            .axes("Period", "Total Sales")
            .note(format!("OBJECTIVE {}", sales_goal.status())),
        );
        plan.views.push(
            comparison_view(
                "objectives_ad_spend",
                &format!("Total Ad Spend ({} Channel): {} vs {}", self.config.paid_channel, periods.0, periods.1),
                periods,
                &spend,
                currency,
            )
            .axes("Period", "Total Ad Spend")
            .note(format!("OBJECTIVE {}", spend_goal.status())),
        );
        Ok(())
    }

    fn audience(&self, data: &Dataset, plan: &mut ReportPlan) -> Result<()> {
        let (base, comp) = self.periods();
        let period = self.period_column();
        let mut section = SummarySection::new("PART 2: AUDIENCE INSIGHTS");

        let by_age = group_by(data, &[AGE, period], Some(AMOUNT), Reduction::Sum)?;
        let order = self.age_order();
        let by_age = by_age.pivot(order.as_deref())?;
        plan.views.push(
            ChartView::grouped("audience_sales_by_age", &format!("Sales by Age Range: {} vs {}", base, comp), &by_age)
                .axes(AGE, "Total Sales")
                .format(ValueFormat::Thousands(self.config.currency.clone())),
        );

        let total_by_age = RankedList::from_table(&group_by(data, &[AGE], Some(AMOUNT), Reduction::Sum)?);
        let winner = leader(&total_by_age)?;
        section.entry("Top Age Range by Sales", format!("{} ({})", winner.label, self.money(winner.value)));
        plan.views.push(
            ChartView::ranked("audience_total_by_age", "Total Sales by Age Range (all periods)", &total_by_age)
                .axes("Total Sales", AGE)
                .format(ValueFormat::Currency(self.config.currency.clone()))
                .highlight(&winner.label)
                .note(format!("Winner: {}", winner.label)),
        );
        plan.tables.push(TableExport::Ranked {
            name: "sales_by_age".to_string(),
            rows: total_by_age.to_rows(|v| self.money(v)),
        });

        let mut customer_cells = vec![vec![None; 2]; 2];
        let mut avg_orders = Vec::with_capacity(2);
        for (c, tag) in [base, comp].into_iter().enumerate() {
            let orders = clean(data, &[Rule::keep_equal(period, tag)])?;
            let per_user = group_by(&orders, &[USER], None, Reduction::Count)?;
            let unique = per_user.len();
            let repeat = per_user.count_where(|n| n > 1.0);
            customer_cells[0][c] = Some((unique - repeat) as f64);
            customer_cells[1][c] = Some(repeat as f64);
            let share = share_of_total(repeat as f64, unique as f64)?;
            section.entry(
                format!("Repeat Customers {}", tag),
                format!("{} of {} ({:.1}%)", format_int(repeat), format_int(unique), share),
            );
            avg_orders.push(per_user.total() / unique as f64);
        }
        let customers = PivotTable {
            row_dimension: "Customers".to_string(),
            rows: vec!["One-Time".to_string(), "Repeat".to_string()],
            columns: vec![base.to_string(), comp.to_string()],
            cells: customer_cells,
        };
        plan.views.push(
            ChartView::grouped("audience_repeat_customers", &format!("Repeat vs One-Time Customers: {} vs {}", base, comp), &customers)
                .axes("", "Number of Customers")
                .format(ValueFormat::Count),
        );

        let orders_per_customer = ComparisonMetric::new(avg_orders[0], avg_orders[1])?;
        section
            .entry(format!("Avg Orders per Customer {}", base), format_number(orders_per_customer.baseline, 2))
            .entry(format!("Avg Orders per Customer {}", comp), format_number(orders_per_customer.comparison, 2));
        plan.views.push(
            comparison_view("audience_avg_orders", "Average Orders per Customer", (base, comp), &orders_per_customer, ValueFormat::Plain(2))
                .axes("Period", "Orders per Customer"),
        );

        plan.summary.push(section);
        Ok(())
    }

    fn marketing(&self, data: &Dataset, paid: &Dataset, plan: &mut ReportPlan) -> Result<()> {
        let (base, comp) = self.periods();
        let period = self.period_column();
        let channel = &self.config.paid_channel;
        let mut section = SummarySection::new("PART 3: MARKETING PERFORMANCE");

        let revenue = group_by(paid, &[period], Some(AMOUNT), Reduction::Sum)?;
        let cost = group_by(paid, &[period], Some(CPA), Reduction::Sum)?;
        let orders = group_by(paid, &[period], None, Reduction::Count)?;
        let mut rois = Vec::with_capacity(2);
        for tag in [base, comp] {
            let spend = require(&cost, &[tag])?;
            let value = roi(require(&revenue, &[tag])?, spend)?;
            let per_order = cost_per_acquisition(spend, require(&orders, &[tag])? as usize)?;
            section
                .entry(format!("{} Channel ROI {}", channel, tag), format!("{:.2}%", value))
                .entry(format!("{} Spend per Order {}", channel, tag), self.money(per_order));
            rois.push((tag.to_string(), value));
        }
        let latest = rois[1].1;
        section.entry("ROI Status", if latest > 0.0 { "POSITIVE" } else { "NEGATIVE" });
        plan.views.push(
            ChartView::bar("marketing_roi", &format!("Return on Investment - {} Channel", channel), rois)
                .axes("Period", "ROI (%)")
                .format(ValueFormat::Percent)
                .sign_colors()
                .note("ROI = (Revenue - Cost) / Cost x 100"),
        );

        let order = self.age_order();
        let cpa_by_age = group_by(paid, &[AGE, period], Some(CPA), Reduction::Mean)?.pivot(order.as_deref())?;
        plan.views.push(
            ChartView::grouped("marketing_cpa_by_age", "Cost Per Acquisition by Age Range (lower is better)", &cpa_by_age)
                .axes(AGE, "Average CPA")
                .format(ValueFormat::Currency(self.config.currency.clone())),
        );
        let cpa_by_period = group_by(paid, &[period, AGE], Some(CPA), Reduction::Mean)?;
        for tag in [base, comp] {
            let slice = cpa_by_period.slice(period, tag)?;
            let (best, value) = slice.argmin();
            section.entry(format!("Best CPA Age Range {}", tag), format!("{} ({})", best.join(" / "), self.money(value)));
        }

        let by_channel = group_by(data, &[SOURCE, period], Some(AMOUNT), Reduction::Sum)?;
        let channel_pivot = by_channel.pivot(None)?;
        plan.views.push(
            ChartView::grouped("marketing_sales_by_channel", &format!("Total Sales by Marketing Channel: {} vs {}", base, comp), &channel_pivot)
                .axes(SOURCE, "Total Sales")
                .format(ValueFormat::Thousands(self.config.currency.clone())),
        );
        let growth = change_by_row(&channel_pivot, base, comp)?;
        plan.views.push(
            ChartView::bar(
                "marketing_channel_growth",
                &format!("Channel Growth Rate: {} to {}", base, comp),
                growth.iter().map(|(label, m)| (label.clone(), m.percent_change)),
            )
            .horizontal()
            .axes("Growth Rate (%)", SOURCE)
            .format(ValueFormat::Percent)
            .sign_colors(),
        );
        let latest_channels = by_channel.slice(period, comp)?;
        let (top, value) = latest_channels.argmax();
        section.entry(format!("Top Channel by Sales {}", comp), format!("{} ({})", top.join(" / "), self.money(value)));

        plan.summary.push(section);
        Ok(())
    }

    fn sales(&self, data: &Dataset, plan: &mut ReportPlan) -> Result<()> {
        let (base, comp) = self.periods();
        let period = self.period_column();
        let mut section = SummarySection::new("PART 4: SALES ANALYSIS");

        let revenue = self.period_metric(data, Some(AMOUNT), Reduction::Sum)?;
        let avg_order = self.period_metric(data, Some(AMOUNT), Reduction::Mean)?;
        let transactions = self.period_metric(data, None, Reduction::Count)?;
        section
            .entry(format!("Total Revenue {}", base), self.money(revenue.baseline))
            .entry(format!("Total Revenue {}", comp), self.money(revenue.comparison))
            .entry("Revenue Growth", format_change(revenue.percent_change, 2))
            .entry(format!("Avg Order Amount {}", base), self.money(avg_order.baseline))
            .entry(format!("Avg Order Amount {}", comp), self.money(avg_order.comparison))
            .entry(format!("Transactions {}", base), format_int(transactions.baseline as u64))
            .entry(format!("Transactions {}", comp), format_int(transactions.comparison as u64));

        plan.views.push(
            comparison_view("sales_revenue", "Total Revenue", (base, comp), &revenue, ValueFormat::Currency(self.config.currency.clone()))
                .axes("Period", "Revenue"),
        );
        plan.views.push(
            comparison_view("sales_avg_order", "Average Order Amount", (base, comp), &avg_order, ValueFormat::Plain(2))
                .axes("Period", "Average Order Amount"),
        );

        let key_metrics = PivotTable {
            row_dimension: "Metric".to_string(),
            rows: vec!["Transactions".to_string(), "Avg Order".to_string(), "Revenue (K)".to_string()],
            columns: vec![base.to_string(), comp.to_string()],
            cells: vec![
                vec![Some(transactions.baseline), Some(transactions.comparison)],
                vec![Some(avg_order.baseline), Some(avg_order.comparison)],
                vec![Some(revenue.baseline / 1000.0), Some(revenue.comparison / 1000.0)],
            ],
        };
        plan.views.push(
            ChartView::grouped("sales_key_metrics", "Key Sales Metrics Comparison", &key_metrics)
                .axes("", "Value")
                .format(ValueFormat::Plain(1))
                .note(format!("Revenue in thousands of {}", self.config.currency)),
        );

        let spend_by_user = group_by(data, &[USER], Some(AMOUNT), Reduction::Sum)?;
        let top = RankedList::from_table(&spend_by_user).top(self.config.top_customers);
        let top = RankedList::from_pairs(top.entries().iter().map(|e| (format!("User {}", e.label), e.value)));
        let first = leader(&top)?;
        section.entry("Top Customer Overall", format!("{} ({})", first.label, self.money(first.value)));
        plan.views.push(
            ChartView::ranked("sales_top_customers", &format!("Top {} Customers by Total Spending", top.len()), &top)
                .axes("Total Spending", "")
                .format(ValueFormat::Currency(self.config.currency.clone()))
                .highlight(&first.label)
                .note(format!("Top Spender: {}", first.label)),
        );
        plan.tables.push(TableExport::Ranked { name: "top_customers".to_string(), rows: top.to_rows(|v| self.money(v)) });

        let by_period_user = group_by(data, &[period, USER], Some(AMOUNT), Reduction::Sum)?;
        for tag in [base, comp] {
            let slice = by_period_user.slice(period, tag)?;
            let (user, value) = slice.argmax();
            section.entry(format!("Top Customer {}", tag), format!("User {} ({})", user.join(" / "), self.money(value)));
        }

        plan.summary.push(section);
        Ok(())
    }

    fn products(&self, data: &Dataset, paid: &Dataset, plan: &mut ReportPlan) -> Result<()> {
        let (base, comp) = self.periods();
        let period = self.period_column();
        let mut section = SummarySection::new("PART 5: PRODUCT CATEGORIES");

        let product_sales = group_by(data, &[CATEGORY, period], Some(AMOUNT), Reduction::Sum)?;
        let product_orders = group_by(data, &[CATEGORY, period], None, Reduction::Count)?;
        for tag in [base, comp] {
            let by_sales = product_sales.slice(period, tag)?;
            let by_orders = product_orders.slice(period, tag)?;
            let (top_sales, sales) = by_sales.argmax();
            let (top_orders, orders) = by_orders.argmax();
            section
                .entry(format!("Most Popular by Sales {}", tag), format!("{} ({})", top_sales.join(" / "), self.money(sales)))
                .entry(
                    format!("Most Popular by Transactions {}", tag),
                    format!("{} ({} orders)", top_orders.join(" / "), format_int(orders as u64)),
                );
        }

        let sales_pivot = product_sales.pivot(None)?;
        plan.views.push(
            ChartView::grouped("products_sales", &format!("Sales by Product Category: {} vs {}", base, comp), &sales_pivot)
                .axes(CATEGORY, "Total Sales")
                .format(ValueFormat::Thousands(self.config.currency.clone())),
        );
        plan.views.push(
            ChartView::grouped("products_transactions", "Transactions by Product Category", &product_orders.pivot(None)?)
                .axes(CATEGORY, "Transactions")
                .format(ValueFormat::Count),
        );
        let cpa_by_product = group_by(paid, &[CATEGORY, period], Some(CPA), Reduction::Mean)?.pivot(None)?;
        plan.views.push(
            ChartView::grouped("products_cpa", "CPA by Product Category (lower is better)", &cpa_by_product)
                .axes(CATEGORY, "Average CPA")
                .format(ValueFormat::Currency(self.config.currency.clone())),
        );

        let growth = RankedList::from_pairs(
            change_by_row(&sales_pivot, base, comp)?.into_iter().map(|(label, m)| (label, m.percent_change)),
        );
        let fastest = leader(&growth)?;
        section.entry("Fastest Growing Category", format!("{} ({})", fastest.label, format_change(fastest.value, 1)));
        plan.views.push(
            ChartView::ranked("products_growth", &format!("Product Category Growth: {} to {}", base, comp), &growth)
                .axes("Growth Rate (%)", CATEGORY)
                .format(ValueFormat::Percent)
                .sign_colors()
                .highlight(&fastest.label),
        );
        plan.tables.push(TableExport::Aggregate {
            name: "product_sales".to_string(),
            rows: product_sales.to_rows(|v| self.money(v)),
        });

        plan.summary.push(section);
        Ok(())
    }
}

impl Report for CampaignReport {
    fn name(&self) -> &str {
        "campaign"
    }

    fn load(&self) -> Result<Dataset> {
        let (data, report) = load_sections(&self.config.sections, &Self::columns(), self.period_column())?;
        for (tag, rows) in &report.rows_per_section {
            info!("{} data: {} rows", tag, format_int(*rows));
        }
        info!("Combined data: {} rows", format_int(report.total_rows));
        Ok(data)
    }

    fn prepare(&self, data: Dataset) -> Result<Dataset> {
        // Orders without an amount still count as transactions.
        clean(&data, &[Rule::require_present(USER)])
    }

    fn build(&self, data: &Dataset) -> Result<ReportPlan> {
        let (base, comp) = self.periods();
        let mut plan = ReportPlan {
            summary: ReportSummary::new(&format!("CAMPAIGN REPORT - {} vs {}", base, comp)),
            views: Vec::new(),
            tables: Vec::new(),
        };
        let paid = clean(data, &[Rule::keep_equal(SOURCE, &self.config.paid_channel)])?;
        self.objectives(data, &paid, &mut plan)?;
        self.audience(data, &mut plan)?;
        self.marketing(data, &paid, &mut plan)?;
        self.sales(data, &mut plan)?;
        self.products(data, &paid, &mut plan)?;
        Ok(plan)
    }
}
