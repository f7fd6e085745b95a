//! Font-independent description of the KPI report layout.
//!
//! The layout is assembled from the computed KPIs and the chart artifacts before any PDF
//! machinery is involved, which keeps the section order and the formatted values testable
//! without fonts. [`crate::report`] turns the layout into a `genpdf` document.

use std::path::{Path, PathBuf};

use num_format::{Locale, ToFormattedString};

use crate::chart::ChartArtifact;
use crate::error::ReportError;
use crate::kpi::{KpiMetric, KpiTable};

/// Text shown in place of an undefined KPI value.
pub const UNDEFINED_VALUE: &str = "n/a";

/// Rendered chart width in millimetres; fills an A4 page inside 10 mm side margins.
pub const DEFAULT_CHART_WIDTH_MM: f64 = 190.0;

/// One row of the value table printed underneath a chart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueRow {
    pub label: String,
    pub value: String,
}

/// Heading, chart image and value table for a single KPI.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSection {
    metric: KpiMetric,
    heading: String,
    image_path: PathBuf,
    width_mm: Option<f64>,
    rows: Vec<ValueRow>,
    start_on_new_page: bool,
}

impl ChartSection {
    pub fn new(metric: KpiMetric, image_path: impl Into<PathBuf>) -> Self {
        Self {
            metric,
            heading: format!("{}:", metric.title()),
            image_path: image_path.into(),
            width_mm: Some(DEFAULT_CHART_WIDTH_MM),
            rows: Vec::new(),
            start_on_new_page: false,
        }
    }

    pub fn metric(&self) -> KpiMetric {
        self.metric
    }

    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn width_mm(&self) -> Option<f64> {
        self.width_mm
    }

    pub fn rows(&self) -> &[ValueRow] {
        &self.rows
    }

    pub fn starts_on_new_page(&self) -> bool {
        self.start_on_new_page
    }

    /// Constrains the rendered width (in millimetres) and returns the updated section.
    pub fn with_width_mm(mut self, width_mm: impl Into<Option<f64>>) -> Self {
        self.width_mm = width_mm.into();
        self
    }

    pub fn with_rows<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = ValueRow>,
    {
        self.rows.extend(rows);
        self
    }

    /// Marks the section to begin on a fresh page.
    pub fn start_on_new_page(mut self, start_on_new_page: bool) -> Self {
        self.start_on_new_page = start_on_new_page;
        self
    }
}

/// Complete report: title block followed by one section per KPI.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportLayout {
    title: String,
    subtitle: Option<String>,
    sections: Vec<ChartSection>,
}

impl ReportLayout {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            sections: Vec::new(),
        }
    }

    /// Lays out every KPI in report order, pairing each with its rendered chart.
    ///
    /// The first section shares the page with the title; every later section starts on a
    /// new page.
    pub fn from_kpis(
        title: impl Into<String>,
        table: &KpiTable,
        charts: &[ChartArtifact],
    ) -> Result<Self, ReportError> {
        let mut layout = Self::new(title);
        for (index, metric) in KpiMetric::ALL.into_iter().enumerate() {
            let chart = charts
                .iter()
                .find(|chart| chart.metric == metric)
                .ok_or(ReportError::MissingChart(metric))?;
            let rows = table.series(metric).into_iter().map(|(label, value)| ValueRow {
                label,
                value: format_value(metric, value),
            });
            layout.sections.push(
                ChartSection::new(metric, &chart.path)
                    .with_rows(rows)
                    .start_on_new_page(index > 0),
            );
        }
        Ok(layout)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn sections(&self) -> &[ChartSection] {
        &self.sections
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<Option<String>>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_section(mut self, section: ChartSection) -> Self {
        self.sections.push(section);
        self
    }
}

/// Formats a KPI value for the report table.
pub fn format_value(metric: KpiMetric, value: Option<f64>) -> String {
    let Some(value) = value.filter(|value| value.is_finite()) else {
        return UNDEFINED_VALUE.to_owned();
    };
    match metric {
        KpiMetric::TotalSales | KpiMetric::AverageOrderValue => group_thousands(value),
        KpiMetric::MarketingReturn | KpiMetric::YearOverYearGrowth => format!("{:.2}%", value),
    }
}

/// Two decimal places with `,` between thousands, e.g. `-12,345.60`.
pub fn group_thousands(value: f64) -> String {
    let cents = (value.abs() * 100.0).round();
    let whole = (cents / 100.0).trunc() as u64;
    let fraction = (cents % 100.0) as u8;
    let sign = if value < 0.0 && cents > 0.0 { "-" } else { "" };
    format!(
        "{}{}.{:02}",
        sign,
        whole.to_formatted_string(&Locale::en),
        fraction
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::chart_path;
    use crate::config::GrowthPeriod;
    use crate::kpi::KpiCalculator;
    use crate::loader::SalesRecord;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn table() -> KpiTable {
        let date = |year| NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        let records = vec![
            SalesRecord::new(date(2022), "A", 10, 100.0),
            SalesRecord::new(date(2023), "A", 10, 150.0),
            SalesRecord::new(date(2022), "B", 0, 200.0),
        ];
        KpiCalculator::new(10_000.0, GrowthPeriod::Row)
            .unwrap()
            .compute(&records)
            .unwrap()
    }

    fn charts() -> Vec<ChartArtifact> {
        KpiMetric::ALL
            .into_iter()
            .rev()
            .map(|metric| ChartArtifact {
                metric,
                path: chart_path(Path::new("out"), metric),
            })
            .collect()
    }

    #[test]
    fn sections_follow_report_order() {
        let layout = ReportLayout::from_kpis("KPI Dashboard", &table(), &charts()).unwrap();
        let metrics: Vec<_> = layout.sections().iter().map(ChartSection::metric).collect();
        assert_eq!(metrics, KpiMetric::ALL.to_vec());
        assert_eq!(
            layout.sections()[0].image_path(),
            Path::new("out/total_sales_per_category.png")
        );
        assert!(!layout.sections()[0].starts_on_new_page());
        assert!(layout.sections()[1..].iter().all(ChartSection::starts_on_new_page));
    }

    #[test]
    fn undefined_values_print_as_not_available() {
        let layout = ReportLayout::from_kpis("KPI Dashboard", &table(), &charts()).unwrap();
        let aov = &layout.sections()[2];
        assert_eq!(aov.heading(), "Average Order Value (AOV) per Category:");
        assert_eq!(
            aov.rows(),
            &[
                ValueRow {
                    label: "A".into(),
                    value: "12.50".into()
                },
                ValueRow {
                    label: "B".into(),
                    value: UNDEFINED_VALUE.into()
                },
            ]
        );
        let growth = &layout.sections()[3];
        assert_eq!(growth.rows()[0].value, "50.00%");
        assert_eq!(growth.rows()[1].value, UNDEFINED_VALUE);
    }

    #[test]
    fn missing_chart_is_an_error() {
        let mut charts = charts();
        charts.retain(|chart| chart.metric != KpiMetric::MarketingReturn);
        assert!(matches!(
            ReportLayout::from_kpis("KPI Dashboard", &table(), &charts),
            Err(ReportError::MissingChart(KpiMetric::MarketingReturn))
        ));
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(0.0), "0.00");
        assert_eq!(group_thousands(999.999), "1,000.00");
        assert_eq!(group_thousands(1234567.891), "1,234,567.89");
        assert_eq!(group_thousands(-12345.6), "-12,345.60");
        assert_eq!(group_thousands(-0.001), "0.00");
    }
}
