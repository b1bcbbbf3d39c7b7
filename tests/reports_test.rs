use campaign_report::aggregate::{group_by, Reduction};
use campaign_report::config::{CampaignConfig, Config, SeasonalityConfig};
use campaign_report::loader::Section;
use campaign_report::output::{ReportSummary, SummarySection};
use campaign_report::pipeline::TableExport;
use campaign_report::types::{AggregateRow, Dataset, Record, Value};
use campaign_report::{
    CampaignReport, ChartFormat, ChartRenderer, LoadError, Pipeline, Report, ReportError, ReportPlan, SeasonalityReport,
};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

const HEADER: &str = "User ID,Age Range,Customer Source,Product Category,Order Amount,CPA\n";

fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

fn campaign_fixture(dir: &TempDir, cpa_2017: (f64, f64)) -> CampaignConfig {
    let y2017 = write(
        dir,
        "bf_2017.csv",
        &format!(
            "{HEADER}u1,18-25,Paid,Electronics,100,{}\nu1,18-25,Organic,Books,50,\nu2,26-35,Paid,Books,150,{}\nu3,26-35,Organic,Electronics,200,\n",
            cpa_2017.0, cpa_2017.1
        ),
    );
    let y2018 = write(
        dir,
        "bf_2018.csv",
        &format!(
            "{HEADER}u1,18-25,Paid,Electronics,300,10\nu4,36-45,Paid,Books,250,5\nu4,36-45,Organic,Books,100,\nu5,26-35,Organic,Electronics,50,\n"
        ),
    );
    CampaignConfig { sections: vec![Section::new("2017", y2017), Section::new("2018", y2018)], ..CampaignConfig::default() }
}

fn plan_for<R: Report>(report: &R) -> campaign_report::Result<ReportPlan> {
    let data = report.prepare(report.load()?)?;
    report.build(&data)
}

fn value<'a>(summary: &'a ReportSummary, label: &str) -> &'a str {
    summary.find(label).unwrap_or_else(|| panic!("no summary entry `{}`", label)).value.as_str()
}

#[test]
fn campaign_objectives_and_metrics() {
    let dir = TempDir::new().unwrap();
    let report = CampaignReport::new(campaign_fixture(&dir, (10.0, 20.0))).unwrap();
    let plan = plan_for(&report).unwrap();
    let s = &plan.summary;

    let sales = s.find("Sales Objective (+30%)").unwrap();
    assert_eq!(sales.value, "+40.00%");
    assert_eq!(sales.status.as_deref(), Some("MET"));
    let spend = s.find("Ad Spend Objective (-30%)").unwrap();
    assert_eq!(spend.value, "-50.00%");
    assert_eq!(spend.status.as_deref(), Some("MET"));
    assert_eq!(value(s, "Total Sales 2017"), "$500.00");
    assert_eq!(value(s, "Total Sales 2018"), "$700.00");

    assert_eq!(value(s, "Top Age Range by Sales"), "18-25 ($450.00)");
    assert_eq!(value(s, "Repeat Customers 2017"), "1 of 3 (33.3%)");
    assert_eq!(value(s, "Paid Channel ROI 2017"), "733.33%");
    assert_eq!(value(s, "ROI Status"), "POSITIVE");
    assert_eq!(value(s, "Paid Spend per Order 2017"), "$15.00");
    assert_eq!(value(s, "Best CPA Age Range 2017"), "18-25 ($10.00)");
    assert_eq!(value(s, "Best CPA Age Range 2018"), "36-45 ($5.00)");
    assert_eq!(value(s, "Top Channel by Sales 2018"), "Paid ($550.00)");
    assert_eq!(value(s, "Top Customer Overall"), "User u1 ($450.00)");
    assert_eq!(value(s, "Transactions 2018"), "4");
    assert_eq!(value(s, "Fastest Growing Category"), "Books (+75.0%)");

    assert_eq!(s.sections.len(), 5);
    for view in &plan.views {
        view.validate().unwrap();
    }
    assert!(plan.views.iter().any(|v| v.name == "marketing_channel_growth"));
}

#[test]
fn campaign_key_sales_metrics_view() {
    let dir = TempDir::new().unwrap();
    let report = CampaignReport::new(campaign_fixture(&dir, (10.0, 20.0))).unwrap();
    let plan = plan_for(&report).unwrap();
    let view = plan.views.iter().find(|v| v.name == "sales_key_metrics").unwrap();
    assert_eq!(view.title, "Key Sales Metrics Comparison");
    assert_eq!(view.categories, vec!["Transactions", "Avg Order", "Revenue (K)"]);
    assert_eq!(view.series[0].name, "2017");
    assert_eq!(view.series[0].values, vec![Some(4.0), Some(125.0), Some(0.5)]);
    assert_eq!(view.series[1].values, vec![Some(4.0), Some(175.0), Some(0.7)]);
}

#[test]
fn orders_without_amount_still_count_per_customer() {
    let dir = TempDir::new().unwrap();
    let mut config = campaign_fixture(&dir, (10.0, 20.0));
    config.sections[0].path = write(
        &dir,
        "bf_2017_gap.csv",
        &format!(
            "{HEADER}u1,18-25,Paid,Electronics,100,10\nu1,18-25,Organic,Books,50,\nu2,26-35,Paid,Books,150,20\nu3,26-35,Organic,Electronics,200,\nu2,26-35,Organic,Books,,\n"
        ),
    );
    let plan = plan_for(&CampaignReport::new(config).unwrap()).unwrap();
    let s = &plan.summary;
    assert_eq!(value(s, "Repeat Customers 2017"), "2 of 3 (66.7%)");
    assert_eq!(value(s, "Avg Orders per Customer 2017"), "1.67");
    assert_eq!(value(s, "Transactions 2017"), "5");
    assert_eq!(value(s, "Total Sales 2017"), "$500.00");
    assert_eq!(value(s, "Avg Order Amount 2017"), "$125.00");
}

#[test]
fn campaign_pipeline_draws_every_chart() {
    let dir = TempDir::new().unwrap();
    let report = CampaignReport::new(campaign_fixture(&dir, (10.0, 20.0))).unwrap();
    let out = dir.path().join("out");
    let summary = Pipeline::new(ChartRenderer::new(&out, ChartFormat::Svg), 5).run(&report).unwrap();

    for chart in ["objectives_sales", "audience_repeat_customers", "marketing_channel_growth", "sales_key_metrics", "products_growth"] {
        assert!(summary.artifacts.contains(&out.join(format!("{}.svg", chart))), "no artifact for {}", chart);
    }
    let charts: Vec<_> = summary.artifacts.iter().filter(|p| p.extension().is_some_and(|e| e == "svg")).collect();
    assert_eq!(charts.len(), plan_for(&report).unwrap().views.len());
    for path in &summary.artifacts {
        assert!(std::fs::metadata(path).unwrap().len() > 0, "{} is empty", path.display());
    }
    assert!(summary.artifacts.contains(&out.join("campaign_summary.json")));
}

#[test]
fn campaign_age_chart_keeps_configured_order_with_gaps() {
    let dir = TempDir::new().unwrap();
    let report = CampaignReport::new(campaign_fixture(&dir, (10.0, 20.0))).unwrap();
    let plan = plan_for(&report).unwrap();
    let cpa = plan.views.iter().find(|v| v.name == "marketing_cpa_by_age").unwrap();
    assert_eq!(cpa.categories, vec!["18-25", "26-35", "36-45", "46-50", "51-55", "55+"]);
    assert_eq!(cpa.series[0].name, "2017");
    assert_eq!(cpa.series[0].values[2], None);
    assert_eq!(cpa.series[1].values[2], Some(5.0));
}

#[test]
fn zero_ad_spend_aborts_before_any_artifact() {
    let dir = TempDir::new().unwrap();
    let report = CampaignReport::new(campaign_fixture(&dir, (0.0, 0.0))).unwrap();
    let out = dir.path().join("out");
    let pipeline = Pipeline::new(ChartRenderer::new(&out, ChartFormat::Png), 5);
    let err = pipeline.run(&report).unwrap_err();
    assert!(matches!(err, ReportError::UndefinedMetric { .. }));
    assert!(!out.exists());
}

#[test]
fn missing_section_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let mut config = campaign_fixture(&dir, (10.0, 20.0));
    config.sections[1].path = dir.path().join("bf_2019.csv");
    let report = CampaignReport::new(config).unwrap();
    let err = plan_for(&report).unwrap_err();
    assert!(matches!(err, ReportError::Load(LoadError::Missing { .. })));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn malformed_amount_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = campaign_fixture(&dir, (10.0, 20.0));
    config.sections[0].path = write(&dir, "bad.csv", &format!("{HEADER}u1,18-25,Paid,Books,lots,10\n"));
    let err = plan_for(&CampaignReport::new(config).unwrap()).unwrap_err();
    assert!(matches!(err, ReportError::Load(LoadError::Malformed { line: 2, .. })));
}

#[test]
fn campaign_needs_two_sections() {
    let err = CampaignReport::new(CampaignConfig::default()).err().unwrap();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn seasonality_cleans_and_ranks_months() {
    let dir = TempDir::new().unwrap();
    let data = write(
        &dir,
        "retail.csv",
        "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,Country\n\
         536365,85123A,WHITE MUG,6,12/1/2010 8:26,2.55,United Kingdom\n\
         C536379,D,WHITE MUG,-1,12/1/2010 9:41,27.50,United Kingdom\n\
         536366,22633,LANTERN,2,11/9/2011 10:00,10.00,France\n\
         536367,22633,LANTERN,0,11/9/2011 10:00,10.00,France\n\
         536368,84879,CANDLE,10,1/4/2011 12:00,1.00,United Kingdom\n\
         536369,84879,CANDLE,5,11/20/2011 12:00,1.00,United Kingdom\n",
    );
    let report = SeasonalityReport::new(SeasonalityConfig { data: Some(data), ..SeasonalityConfig::default() }).unwrap();
    let prepared = report.prepare(report.load().unwrap()).unwrap();
    assert_eq!(prepared.len(), 4);

    let plan = report.build(&prepared).unwrap();
    let s = &plan.summary;
    assert_eq!(value(s, "Peak Month #1"), "Nov 2011 (£25.00)");
    assert_eq!(value(s, "Peak Month #2"), "Dec 2010 (£15.30)");
    assert_eq!(value(s, "Peak Month #3"), "Jan 2011 (£10.00)");
    assert_eq!(value(s, "Top 3 Months Share of Revenue"), "100.0%");
    assert_eq!(value(s, "Top Product by Revenue"), "LANTERN (£20.00)");
    assert_eq!(value(s, "Top Product by Quantity"), "CANDLE (15 units)");
    assert_eq!(value(s, "Transactions"), "4");
    assert_eq!(value(s, "Period"), "2010-12-01 to 2011-11-20");

    let stories: Vec<_> = plan.views.iter().filter(|v| v.name.starts_with("story_visual_")).collect();
    assert_eq!(stories.len(), 3);
    assert_eq!(stories[0].categories, vec!["Dec 2010", "Jan 2011", "Nov 2011"]);
    assert_eq!(stories[0].highlight.as_deref(), Some("Nov 2011"));
    assert_eq!(stories[1].highlight.as_deref(), Some("Dec 2010"));
    for view in &plan.views {
        view.validate().unwrap();
    }
}

#[test]
fn seasonality_with_nothing_left_after_cleaning_fails() {
    let dir = TempDir::new().unwrap();
    let data = write(
        &dir,
        "retail.csv",
        "InvoiceNo,Description,Quantity,InvoiceDate,UnitPrice\nC1,MUG,-2,12/1/2010 8:26,2.55\n",
    );
    let report = SeasonalityReport::new(SeasonalityConfig { data: Some(data), ..SeasonalityConfig::default() }).unwrap();
    let prepared = report.prepare(report.load().unwrap()).unwrap();
    assert!(prepared.is_empty());
    assert!(matches!(report.build(&prepared), Err(ReportError::EmptyAggregation { .. })));
}

/// Tables only, no charts.
struct TableOnly;

impl Report for TableOnly {
    fn name(&self) -> &str {
        "channels"
    }

    fn load(&self) -> campaign_report::Result<Dataset> {
        let row = |c: &str, v: f64| Record::new(vec![Value::Text(c.to_string()), Value::Number(v)]);
        Ok(Dataset::new(vec!["Channel".into(), "Amount".into()], vec![row("Paid", 10.0), row("Organic", 4.0), row("Paid", 2.5)]))
    }

    fn build(&self, data: &Dataset) -> campaign_report::Result<ReportPlan> {
        let table = group_by(data, &["Channel"], Some("Amount"), Reduction::Sum)?;
        let mut summary = ReportSummary::new("Channels");
        let mut section = SummarySection::new("Totals");
        section.entry("Total", format!("{}", table.total()));
        summary.push(section);
        Ok(ReportPlan {
            summary,
            views: Vec::new(),
            tables: vec![TableExport::Aggregate { name: "sales".into(), rows: table.to_rows(|v| format!("{:.1}", v)) }],
        })
    }
}

#[test]
fn pipeline_writes_tables_and_summary() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("reports");
    let pipeline = Pipeline::new(ChartRenderer::new(&out, ChartFormat::Svg), 5);
    let summary = pipeline.run(&TableOnly).unwrap();

    assert_eq!(summary.artifacts, vec![out.join("channels_sales.csv"), out.join("channels_summary.json")]);
    let mut rdr = csv::Reader::from_path(out.join("channels_sales.csv")).unwrap();
    let rows: Vec<AggregateRow> = rdr
        .records()
        .map(|r| {
            let r = r.unwrap();
            AggregateRow { group: r[0].to_string(), value: r[1].to_string() }
        })
        .collect();
    assert_eq!(rows[0], AggregateRow { group: "Paid".into(), value: "12.5".into() });

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(out.join("channels_summary.json")).unwrap()).unwrap();
    assert_eq!(json["title"], "Channels");
    assert_eq!(json["sections"][0]["entries"][0]["value"], "16.5");
}

#[test]
fn config_file_round_trip_into_reports() {
    let dir = TempDir::new().unwrap();
    let campaign = campaign_fixture(&dir, (10.0, 20.0));
    let body = format!(
        "[output]\ndirectory = \"{}\"\n\n[campaign]\ncurrency = \"€\"\nsections = [\n  {{ tag = \"2017\", path = \"{}\" }},\n  {{ tag = \"2018\", path = \"{}\" }},\n]\n",
        dir.path().join("out").display(),
        campaign.sections[0].path.display(),
        campaign.sections[1].path.display(),
    );
    let config = Config::from_file(write(&dir, "report.toml", &body)).unwrap();
    config.validate().unwrap();
    let plan = plan_for(&CampaignReport::new(config.campaign).unwrap()).unwrap();
    assert_eq!(value(&plan.summary, "Total Sales 2017"), "€500.00");
}
