//! Chart views and the plotters-backed renderer that writes them to disk.
use crate::aggregate::{PivotTable, RankedList};
use crate::error::RenderError;
use crate::util::{format_currency, format_int, format_number, format_thousands};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PRIMARY: RGBColor = RGBColor(0x00, 0x99, 0x99);
const NEUTRAL: RGBColor = RGBColor(0x34, 0x98, 0xdb);
const HIGHLIGHT: RGBColor = RGBColor(0x66, 0x33, 0x99);
const SUCCESS: RGBColor = RGBColor(0x2e, 0xcc, 0x71);
const WARNING: RGBColor = RGBColor(0xe7, 0x4c, 0x3c);
const SERIES: [RGBColor; 4] = [NEUTRAL, PRIMARY, RGBColor(0xcc, 0x66, 0x00), RGBColor(0x00, 0x66, 0x66)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartFormat {
    #[default]
    Png,
    Svg,
}

impl ChartFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ChartFormat::Png => "png",
            ChartFormat::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    GroupedBar,
}

/// How bar values and the value axis are printed.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueFormat {
    Currency(String),
    /// Currency in thousands, e.g. `$120K`.
    Thousands(String),
    Percent,
    Count,
    Plain(usize),
}

impl ValueFormat {
    pub fn label(&self, v: f64) -> String {
        match self {
            ValueFormat::Currency(sym) => format_currency(sym, v, 0),
            ValueFormat::Thousands(sym) => format_thousands(sym, v),
            ValueFormat::Percent => format!("{:+.1}%", v),
            ValueFormat::Count => format_int(v.round() as i64),
            ValueFormat::Plain(d) => format_number(v, *d),
        }
    }

    fn axis(&self, v: f64) -> String {
        match self {
            ValueFormat::Percent => format!("{:.0}%", v),
            other => other.label(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Declarative description of one chart: what to draw, not how.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    /// File stem of the rendered artifact.
    pub name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub kind: ChartKind,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
    pub highlight: Option<String>,
    /// Color bars by sign instead of a flat color.
    pub sign_colors: bool,
    pub value_format: ValueFormat,
    pub notes: Vec<String>,
}

impl ChartView {
    pub fn bar<I>(name: &str, title: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let (categories, values): (Vec<String>, Vec<Option<f64>>) =
            pairs.into_iter().map(|(label, v)| (label, Some(v))).unzip();
        Self {
            name: name.to_string(),
            title: title.to_string(),
            x_label: String::new(),
            y_label: String::new(),
            kind: ChartKind::Bar,
            categories,
            series: vec![Series { name: String::new(), values }],
            highlight: None,
            sign_colors: false,
            value_format: ValueFormat::Plain(2),
            notes: Vec::new(),
        }
    }

    /// Horizontal bars in rank order, largest at the top.
    pub fn ranked(name: &str, title: &str, ranked: &RankedList) -> Self {
        let mut view = Self::bar(name, title, ranked.entries().iter().map(|e| (e.label.clone(), e.value)));
        view.kind = ChartKind::HorizontalBar;
        view
    }

    /// One bar group per pivot row, one bar per pivot column.
    pub fn grouped(name: &str, title: &str, pivot: &PivotTable) -> Self {
        let series = pivot
            .columns
            .iter()
            .enumerate()
            .map(|(c, col)| Series { name: col.clone(), values: pivot.cells.iter().map(|row| row[c]).collect() })
            .collect();
        Self {
            kind: ChartKind::GroupedBar,
            categories: pivot.rows.clone(),
            series,
            x_label: pivot.row_dimension.clone(),
            ..Self::bar(name, title, Vec::<(String, f64)>::new())
        }
    }

    pub fn horizontal(mut self) -> Self {
        self.kind = ChartKind::HorizontalBar;
        self
    }

    pub fn axes(mut self, x_label: &str, y_label: &str) -> Self {
        self.x_label = x_label.to_string();
        self.y_label = y_label.to_string();
        self
    }

    pub fn format(mut self, value_format: ValueFormat) -> Self {
        self.value_format = value_format;
        self
    }

    pub fn highlight(mut self, label: &str) -> Self {
        self.highlight = Some(label.to_string());
        self
    }

    pub fn sign_colors(mut self) -> Self {
        self.sign_colors = true;
        self
    }

    pub fn note(mut self, text: impl Into<String>) -> Self {
        self.notes.push(text.into());
        self
    }

    /// Reject views that would draw from missing or invalid data.
    ///
    /// Single-series charts need every value. Grouped charts may leave a
    /// cell empty (that combination had no records) and skip the bar.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.categories.is_empty() || self.series.is_empty() {
            return Err(RenderError::EmptyView { title: self.title.clone() });
        }
        for series in &self.series {
            if series.values.len() != self.categories.len() {
                return Err(RenderError::EmptyView { title: self.title.clone() });
            }
            for (label, value) in self.categories.iter().zip(&series.values) {
                match value {
                    Some(v) if !v.is_finite() => {
                        return Err(RenderError::NonFinite { title: self.title.clone(), label: label.clone() })
                    }
                    None if self.kind != ChartKind::GroupedBar => {
                        return Err(RenderError::MissingValue { title: self.title.clone(), label: label.clone() })
                    }
                    _ => {}
                }
            }
        }
        if self.series.iter().all(|s| s.values.iter().all(Option::is_none)) {
            return Err(RenderError::EmptyView { title: self.title.clone() });
        }
        Ok(())
    }

    fn value_range(&self) -> (f64, f64) {
        let values = self.series.iter().flat_map(|s| s.values.iter().flatten().copied());
        let (lo, hi) = values.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo == 0.0 && hi == 0.0 {
            return (0.0, 1.0);
        }
        // Headroom for the value labels.
        (lo * 1.15, hi * 1.15)
    }

    fn bar_color(&self, series: usize, category: &str, value: f64) -> RGBColor {
        if self.highlight.as_deref() == Some(category) {
            HIGHLIGHT
        } else if self.sign_colors {
            if value >= 0.0 {
                SUCCESS
            } else {
                WARNING
            }
        } else if self.kind == ChartKind::GroupedBar {
            SERIES[series % SERIES.len()]
        } else {
            PRIMARY
        }
    }
}

/// Writes chart views as image files under one output directory.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    output_dir: PathBuf,
    format: ChartFormat,
    size: (u32, u32),
}

impl ChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, format: ChartFormat) -> Self {
        Self { output_dir: output_dir.into(), format, size: (1200, 700) }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn ensure_output_dir(&self) -> Result<(), RenderError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|source| RenderError::OutputDir { path: self.output_dir.clone(), source })
    }

    pub fn render(&self, view: &ChartView) -> Result<PathBuf, RenderError> {
        view.validate()?;
        self.ensure_output_dir()?;
        let path = self.output_dir.join(format!("{}.{}", view.name, self.format.extension()));
        debug!("Drawing `{}` to {}", view.title, path.display());

        let drawn = match self.format {
            ChartFormat::Png => draw(BitMapBackend::new(&path, self.size).into_drawing_area(), view),
            ChartFormat::Svg => draw(SVGBackend::new(&path, self.size).into_drawing_area(), view),
        };
        drawn.map_err(|e| RenderError::Backend { path: path.clone(), message: e.to_string() })?;
        info!("Saved chart {}", path.display());
        Ok(path)
    }
}

fn draw<DB>(root: DrawingArea<DB, Shift>, view: &ChartView) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    match view.kind {
        ChartKind::HorizontalBar => draw_horizontal(&root, view)?,
        ChartKind::Bar | ChartKind::GroupedBar => draw_vertical(&root, view)?,
    }
    let (width, _) = root.dim_in_pixel();
    let style = TextStyle::from(("sans-serif", 16).into_font()).pos(Pos::new(HPos::Right, VPos::Top));
    for (i, note) in view.notes.iter().enumerate() {
        root.draw(&Text::new(note.clone(), (width as i32 - 30, 50 + 22 * i as i32), style.clone()))?;
    }
    root.present()?;
    Ok(())
}

/// Categories sit on integer positions; anything between them gets no label.
fn category_at(categories: &[String], position: f64) -> String {
    let nearest = position.round();
    if nearest < 0.0 || (position - nearest).abs() > 1e-6 {
        return String::new();
    }
    categories.get(nearest as usize).cloned().unwrap_or_default()
}

fn draw_vertical<DB>(root: &DrawingArea<DB, Shift>, view: &ChartView) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let n = view.categories.len();
    let (lo, hi) = view.value_range();
    let span = -0.5..n as f64 - 0.5;

    let mut chart = ChartBuilder::on(root)
        .caption(&view.title, ("sans-serif", 26))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(span.clone(), lo..hi)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_desc(view.x_label.as_str())
        .y_desc(view.y_label.as_str())
        .x_label_formatter(&|x| category_at(&view.categories, *x))
        .y_label_formatter(&|y| view.value_format.axis(*y))
        .draw()?;

    let groups = view.series.len();
    let width = 0.8 / groups as f64;
    let label_style = TextStyle::from(("sans-serif", 13).into_font());
    for (s, series) in view.series.iter().enumerate() {
        let bars: Vec<(f64, &String, f64)> = view
            .categories
            .iter()
            .zip(&series.values)
            .enumerate()
            .filter_map(|(i, (cat, v))| v.map(|v| (i as f64 - 0.4 + s as f64 * width, cat, v)))
            .collect();

        let anno = chart.draw_series(bars.iter().map(|&(x0, cat, v)| {
            Rectangle::new([(x0, 0.0), (x0 + width, v)], view.bar_color(s, cat, v).filled())
        }))?;
        if view.kind == ChartKind::GroupedBar {
            let color = SERIES[s % SERIES.len()];
            anno.label(series.name.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 14, y + 6)], color.filled()));
        }

        chart.draw_series(bars.iter().map(|&(x0, _, v)| {
            let anchor = if v >= 0.0 { VPos::Bottom } else { VPos::Top };
            Text::new(
                view.value_format.label(v),
                (x0 + width / 2.0, v),
                label_style.clone().pos(Pos::new(HPos::Center, anchor)),
            )
        }))?;
    }

    if lo < 0.0 {
        chart.draw_series(LineSeries::new(vec![(span.start, 0.0), (span.end, 0.0)], &BLACK))?;
    }
    if view.kind == ChartKind::GroupedBar {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_horizontal<DB>(root: &DrawingArea<DB, Shift>, view: &ChartView) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let n = view.categories.len();
    let (lo, hi) = view.value_range();
    let span = -0.5..n as f64 - 0.5;
    // First category sits at the top of the chart.
    let row_y = |i: usize| (n - 1 - i) as f64;

    let mut chart = ChartBuilder::on(root)
        .caption(&view.title, ("sans-serif", 26))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(180)
        .build_cartesian_2d(lo..hi, span.clone())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .x_desc(view.x_label.as_str())
        .y_desc(view.y_label.as_str())
        .y_label_formatter(&|y| category_at(&view.categories, n as f64 - 1.0 - *y))
        .x_label_formatter(&|x| view.value_format.axis(*x))
        .draw()?;

    let series = &view.series[0];
    let bars: Vec<(f64, &String, f64)> = view
        .categories
        .iter()
        .zip(&series.values)
        .enumerate()
        .filter_map(|(i, (cat, v))| v.map(|v| (row_y(i), cat, v)))
        .collect();

    chart.draw_series(bars.iter().map(|&(y, cat, v)| {
        Rectangle::new([(0.0, y - 0.4), (v, y + 0.4)], view.bar_color(0, cat, v).filled())
    }))?;

    let label_style = TextStyle::from(("sans-serif", 13).into_font());
    chart.draw_series(bars.iter().map(|&(y, _, v)| {
        let anchor = if v >= 0.0 { HPos::Left } else { HPos::Right };
        Text::new(
            format!(" {} ", view.value_format.label(v)),
            (v, y),
            label_style.clone().pos(Pos::new(anchor, VPos::Center)),
        )
    }))?;

    if lo < 0.0 {
        chart.draw_series(LineSeries::new(vec![(0.0, span.start), (0.0, span.end)], &BLACK))?;
    }
    Ok(())
}
