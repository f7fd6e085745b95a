//! Per-category KPI computation.
//!
//! The calculator groups sales rows by category and derives four metrics for each group:
//! total sales, return on marketing spend, average order value, and sales growth. Undefined
//! metrics (no units sold, no prior period) are represented as `None` and never abort the run.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::{GrowthPeriod, ReportConfig};
use crate::error::ReportError;
use crate::loader::SalesRecord;

/// KPI dimensions in the order they appear in the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KpiMetric {
    TotalSales,
    MarketingReturn,
    AverageOrderValue,
    YearOverYearGrowth,
}

impl KpiMetric {
    pub const ALL: [KpiMetric; 4] = [
        KpiMetric::TotalSales,
        KpiMetric::MarketingReturn,
        KpiMetric::AverageOrderValue,
        KpiMetric::YearOverYearGrowth,
    ];

    /// Heading used for the chart and its report section.
    pub fn title(self) -> &'static str {
        match self {
            KpiMetric::TotalSales => "Total Sales per Category",
            KpiMetric::MarketingReturn => "Return on Marketing Spend (ROMS) per Category",
            KpiMetric::AverageOrderValue => "Average Order Value (AOV) per Category",
            KpiMetric::YearOverYearGrowth => "Year-over-Year Sales Growth per Category",
        }
    }

    /// Label of the value axis.
    pub fn axis_label(self) -> &'static str {
        match self {
            KpiMetric::TotalSales => "Total Sales ($)",
            KpiMetric::MarketingReturn => "ROMS (%)",
            KpiMetric::AverageOrderValue => "AOV ($)",
            KpiMetric::YearOverYearGrowth => "YoY Growth (%)",
        }
    }

    /// File name (without extension) of the chart image.
    pub fn file_stem(self) -> &'static str {
        match self {
            KpiMetric::TotalSales => "total_sales_per_category",
            KpiMetric::MarketingReturn => "roms_per_category",
            KpiMetric::AverageOrderValue => "aov_per_category",
            KpiMetric::YearOverYearGrowth => "yoy_growth_per_category",
        }
    }
}

/// KPIs for a single category.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryKpi {
    pub category: String,
    pub row_count: usize,
    pub quantity_sold: u64,
    pub total_sales: f64,
    /// Total sales as a percentage of the marketing spend.
    pub marketing_return: f64,
    /// `None` when the category sold no units.
    pub average_order_value: Option<f64>,
    /// Mean percentage change; `None` when no prior period exists.
    pub growth: Option<f64>,
}

impl CategoryKpi {
    pub fn value(&self, metric: KpiMetric) -> Option<f64> {
        match metric {
            KpiMetric::TotalSales => Some(self.total_sales),
            KpiMetric::MarketingReturn => Some(self.marketing_return),
            KpiMetric::AverageOrderValue => self.average_order_value,
            KpiMetric::YearOverYearGrowth => self.growth,
        }
    }
}

/// One value per category for a single metric, in category order.
pub type KpiSeries = Vec<(String, Option<f64>)>;

/// Computed KPIs, ordered by category name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KpiTable {
    records: Vec<CategoryKpi>,
}

impl KpiTable {
    pub fn records(&self) -> &[CategoryKpi] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, category: &str) -> Option<&CategoryKpi> {
        self.records
            .binary_search_by(|record| record.category.as_str().cmp(category))
            .ok()
            .map(|index| &self.records[index])
    }

    pub fn series(&self, metric: KpiMetric) -> KpiSeries {
        self.records
            .iter()
            .map(|record| (record.category.clone(), record.value(metric)))
            .collect()
    }
}

#[derive(Default)]
struct CategoryTotals {
    row_count: usize,
    quantity_sold: u64,
    total_sales: f64,
}

/// Derives [`KpiTable`] values from loaded sales rows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KpiCalculator {
    marketing_spend: f64,
    growth_period: GrowthPeriod,
}

impl KpiCalculator {
    pub fn new(marketing_spend: f64, growth_period: GrowthPeriod) -> Result<Self, ReportError> {
        if !marketing_spend.is_finite() || marketing_spend <= 0.0 {
            return Err(ReportError::InvalidConfig(format!(
                "marketing spend must be a positive number, got {}",
                marketing_spend
            )));
        }
        Ok(Self {
            marketing_spend,
            growth_period,
        })
    }

    pub fn from_config(config: &ReportConfig) -> Result<Self, ReportError> {
        Self::new(config.marketing_spend(), config.growth_period())
    }

    pub fn compute(&self, records: &[SalesRecord]) -> Result<KpiTable, ReportError> {
        if records.is_empty() {
            return Err(ReportError::EmptyDataset);
        }

        let ordered = order_for_growth(records);

        let mut totals: BTreeMap<&str, CategoryTotals> = BTreeMap::new();
        for record in &ordered {
            let entry = totals.entry(record.category()).or_default();
            entry.row_count += 1;
            entry.quantity_sold = entry
                .quantity_sold
                .checked_add(record.quantity_sold())
                .ok_or_else(|| ReportError::QuantityOverflow(record.category().to_owned()))?;
            entry.total_sales += record.total_sales();
        }

        let growth = match self.growth_period {
            GrowthPeriod::Row => row_growth(&ordered),
            GrowthPeriod::Year => calendar_year_growth(&ordered),
        };

        let records: Vec<CategoryKpi> = totals
            .into_iter()
            .map(|(category, totals)| {
                let aov = average_order_value(totals.total_sales, totals.quantity_sold);
                if aov.is_none() {
                    warn!(
                        "category '{}' sold no units; average order value is undefined",
                        category
                    );
                }
                let kpi = CategoryKpi {
                    category: category.to_owned(),
                    row_count: totals.row_count,
                    quantity_sold: totals.quantity_sold,
                    total_sales: totals.total_sales,
                    marketing_return: marketing_return(totals.total_sales, self.marketing_spend),
                    average_order_value: aov,
                    growth: growth.get(category).copied().flatten(),
                };
                debug!("{:?}", kpi);
                kpi
            })
            .collect();

        info!(
            "computed KPIs for {} categories ({} growth)",
            records.len(),
            self.growth_period
        );
        Ok(KpiTable { records })
    }
}

/// Orders rows by category, then by date; rows sharing a date keep their input order.
pub fn order_for_growth(records: &[SalesRecord]) -> Vec<&SalesRecord> {
    let mut ordered: Vec<&SalesRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.category()
            .cmp(b.category())
            .then_with(|| a.date().cmp(&b.date()))
    });
    ordered
}

pub fn marketing_return(total_sales: f64, marketing_spend: f64) -> f64 {
    total_sales / marketing_spend * 100.0
}

pub fn average_order_value(total_sales: f64, quantity_sold: u64) -> Option<f64> {
    if quantity_sold == 0 {
        None
    } else {
        Some(total_sales / quantity_sold as f64)
    }
}

/// Percentage change from `previous` to `current`; undefined when `previous` is zero.
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean change between consecutive rows of each category. Expects [`order_for_growth`] order.
fn row_growth<'a>(ordered: &[&'a SalesRecord]) -> BTreeMap<&'a str, Option<f64>> {
    let mut changes: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in ordered {
        changes.entry(record.category()).or_default();
    }
    for pair in ordered.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        if previous.category() != current.category() {
            continue;
        }
        if let Some(change) = percent_change(previous.total_sales(), current.total_sales()) {
            if let Some(values) = changes.get_mut(current.category()) {
                values.push(change);
            }
        }
    }
    changes
        .into_iter()
        .map(|(category, values)| (category, mean(&values)))
        .collect()
}

/// Mean change between each calendar year's total and the total of the year right before it.
fn calendar_year_growth<'a>(ordered: &[&'a SalesRecord]) -> BTreeMap<&'a str, Option<f64>> {
    let mut yearly: BTreeMap<&str, BTreeMap<i32, f64>> = BTreeMap::new();
    for record in ordered {
        *yearly
            .entry(record.category())
            .or_default()
            .entry(record.year())
            .or_default() += record.total_sales();
    }
    yearly
        .into_iter()
        .map(|(category, years)| {
            let changes: Vec<f64> = years
                .iter()
                .filter_map(|(year, total)| {
                    let previous = years.get(&(year - 1))?;
                    percent_change(*previous, *total)
                })
                .collect();
            (category, mean(&changes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(category: &str, date: (i32, u32, u32), quantity: u64, sales: f64) -> SalesRecord {
        let (year, month, day) = date;
        SalesRecord::new(
            NaiveDate::from_ymd_opt(year, month, day).unwrap(),
            category,
            quantity,
            sales,
        )
    }

    fn calculator() -> KpiCalculator {
        KpiCalculator::new(10_000.0, GrowthPeriod::Row).unwrap()
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be defined");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn scenario_a() -> Vec<SalesRecord> {
        vec![
            record("B", (2022, 3, 1), 20, 200.0),
            record("A", (2023, 3, 1), 10, 150.0),
            record("A", (2022, 3, 1), 10, 100.0),
        ]
    }

    #[test]
    fn two_category_scenario() {
        let table = calculator().compute(&scenario_a()).unwrap();

        let categories: Vec<_> = table.records().iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["A", "B"]);

        let a = table.get("A").unwrap();
        let b = table.get("B").unwrap();
        assert_eq!(a.total_sales, 250.0);
        assert_eq!(b.total_sales, 200.0);
        assert_close(a.average_order_value, 12.5);
        assert_close(b.average_order_value, 10.0);
        assert_close(a.growth, 50.0);
        assert_eq!(b.growth, None);
        assert_close(Some(a.marketing_return), 2.5);
        assert_close(Some(b.marketing_return), 2.0);
    }

    #[test]
    fn calendar_year_growth_matches_row_growth_for_yearly_rows() {
        let calculator = KpiCalculator::new(10_000.0, GrowthPeriod::Year).unwrap();
        let table = calculator.compute(&scenario_a()).unwrap();
        assert_close(table.get("A").unwrap().growth, 50.0);
        assert_eq!(table.get("B").unwrap().growth, None);
    }

    #[test]
    fn calendar_year_growth_aggregates_within_year() {
        let records = vec![
            record("A", (2022, 1, 1), 1, 50.0),
            record("A", (2022, 6, 1), 1, 50.0),
            record("A", (2023, 1, 1), 1, 80.0),
            record("A", (2023, 6, 1), 1, 40.0),
            // 2025 has no 2024 to compare with.
            record("A", (2025, 6, 1), 1, 500.0),
        ];
        let calculator = KpiCalculator::new(10_000.0, GrowthPeriod::Year).unwrap();
        let table = calculator.compute(&records).unwrap();
        assert_close(table.get("A").unwrap().growth, 20.0);
    }

    #[test]
    fn zero_quantity_yields_undefined_aov_without_affecting_others() {
        let records = vec![
            record("Free", (2022, 1, 1), 0, 300.0),
            record("Paid", (2022, 1, 1), 4, 100.0),
        ];
        let table = calculator().compute(&records).unwrap();

        assert_eq!(table.get("Free").unwrap().average_order_value, None);
        assert_eq!(table.get("Free").unwrap().total_sales, 300.0);
        assert_close(table.get("Paid").unwrap().average_order_value, 25.0);
    }

    #[test]
    fn growth_follows_dates_not_input_order() {
        let records = vec![
            record("A", (2024, 1, 1), 1, 400.0),
            record("A", (2022, 1, 1), 1, 100.0),
            record("A", (2023, 1, 1), 1, 200.0),
        ];
        let table = calculator().compute(&records).unwrap();
        // +100% then +100%.
        assert_close(table.get("A").unwrap().growth, 100.0);
    }

    #[test]
    fn single_row_category_has_undefined_growth() {
        let table = calculator()
            .compute(&[record("Solo", (2022, 1, 1), 1, 10.0)])
            .unwrap();
        assert_eq!(table.get("Solo").unwrap().growth, None);
    }

    #[test]
    fn change_from_zero_sales_is_excluded() {
        let records = vec![
            record("A", (2021, 1, 1), 1, 0.0),
            record("A", (2022, 1, 1), 1, 100.0),
            record("A", (2023, 1, 1), 1, 150.0),
        ];
        let table = calculator().compute(&records).unwrap();
        assert_close(table.get("A").unwrap().growth, 50.0);
    }

    #[test]
    fn one_record_per_category_and_totals_add_up() {
        let records = vec![
            record("C", (2022, 1, 1), 3, 30.0),
            record("A", (2022, 1, 2), 1, -5.0),
            record("B", (2022, 1, 3), 2, 12.5),
            record("C", (2022, 1, 4), 3, 45.0),
            record("A", (2022, 1, 5), 1, 7.25),
        ];
        let table = calculator().compute(&records).unwrap();

        assert_eq!(table.len(), 3);
        let grand_total: f64 = table.records().iter().map(|r| r.total_sales).sum();
        let input_total: f64 = records.iter().map(SalesRecord::total_sales).sum();
        assert!((grand_total - input_total).abs() < 1e-9);
        assert_eq!(table.get("A").unwrap().row_count, 2);
        assert_eq!(table.get("C").unwrap().quantity_sold, 6);
    }

    #[test]
    fn marketing_return_is_monotonic_in_sales() {
        let mut previous = f64::NEG_INFINITY;
        for sales in [-100.0, 0.0, 1.0, 250.0, 10_000.0] {
            let ratio = marketing_return(sales, 10_000.0);
            assert!(ratio >= previous);
            previous = ratio;
        }
        assert_eq!(marketing_return(0.0, 10_000.0), 0.0);
        assert!(marketing_return(-100.0, 10_000.0) < 0.0);
    }

    #[test]
    fn quantity_sum_beyond_u64_is_rejected() {
        let huge = 10_000_000_000_000_000_000;
        let records = vec![
            record("A", (2022, 1, 1), huge, 1.0),
            record("A", (2023, 1, 1), huge, 2.0),
        ];
        let err = calculator().compute(&records).unwrap_err();
        assert!(matches!(err, ReportError::QuantityOverflow(ref category) if category == "A"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            calculator().compute(&[]),
            Err(ReportError::EmptyDataset)
        ));
    }

    #[test]
    fn invalid_marketing_spend_is_rejected() {
        assert!(KpiCalculator::new(0.0, GrowthPeriod::Row).is_err());
        assert!(KpiCalculator::new(f64::NAN, GrowthPeriod::Row).is_err());
    }

    #[test]
    fn computation_is_deterministic() {
        let first = calculator().compute(&scenario_a()).unwrap();
        let second = calculator().compute(&scenario_a()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn series_follow_category_order() {
        let table = calculator().compute(&scenario_a()).unwrap();
        assert_eq!(
            table.series(KpiMetric::YearOverYearGrowth),
            vec![("A".to_owned(), Some(50.0)), ("B".to_owned(), None)]
        );
    }
}
