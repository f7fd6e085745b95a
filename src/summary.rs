//! CSV export of the computed KPIs.

use std::io;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::ReportError;
use crate::kpi::{CategoryKpi, KpiTable};

pub const SUMMARY_FILE_NAME: &str = "kpi_summary.csv";

/// One line of the summary file. Undefined values serialize as empty fields.
#[derive(Debug, Serialize)]
pub struct KpiSummaryRecord<'a> {
    pub category: &'a str,
    pub total_sales: f64,
    pub roms_pct: f64,
    pub aov: Option<f64>,
    pub yoy_growth_pct: Option<f64>,
}

impl<'a> From<&'a CategoryKpi> for KpiSummaryRecord<'a> {
    fn from(kpi: &'a CategoryKpi) -> Self {
        Self {
            category: &kpi.category,
            total_sales: kpi.total_sales,
            roms_pct: kpi.marketing_return,
            aov: kpi.average_order_value,
            yoy_growth_pct: kpi.growth,
        }
    }
}

pub fn summary_path(output_dir: &Path) -> PathBuf {
    output_dir.join(SUMMARY_FILE_NAME)
}

/// Serializes `table` as CSV into `writer`.
pub fn write_summary<W: io::Write>(table: &KpiTable, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    for kpi in table.records() {
        csv_writer.serialize(KpiSummaryRecord::from(kpi))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the summary file into `output_dir` and returns its path.
pub fn export_summary(table: &KpiTable, output_dir: &Path) -> Result<PathBuf, ReportError> {
    let path = summary_path(output_dir);
    let mut bytes = Vec::new();
    write_summary(table, &mut bytes).map_err(|source| ReportError::Summary {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, &bytes).map_err(|err| ReportError::output(&path, err))?;
    info!("wrote KPI summary {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrowthPeriod;
    use crate::kpi::KpiCalculator;
    use crate::loader::SalesRecord;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn undefined_values_are_empty_fields() {
        let date = |year| NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        let records = vec![
            SalesRecord::new(date(2022), "A", 10, 100.0),
            SalesRecord::new(date(2023), "A", 10, 150.0),
            SalesRecord::new(date(2022), "B", 0, 200.0),
        ];
        let table = KpiCalculator::new(10_000.0, GrowthPeriod::Row)
            .unwrap()
            .compute(&records)
            .unwrap();

        let mut bytes = Vec::new();
        write_summary(&table, &mut bytes).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "category,total_sales,roms_pct,aov,yoy_growth_pct");
        assert_eq!(lines[1], "A,250.0,2.5,12.5,50.0");
        assert_eq!(lines[2], "B,200.0,2.0,,");
    }
}
