use std::fs;
use std::path::{Path, PathBuf};

use kpi_report::chart::render_charts;
use kpi_report::fonts;
use kpi_report::kpi::KpiMetric;
use kpi_report::pipeline::{compute_kpis, run};
use kpi_report::summary::export_summary;
use kpi_report::{ReportConfig, ReportError};
use pretty_assertions::assert_eq;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

const SCENARIO_A: &str = "Date,Category,QuantitySold,TotalSales\n\
2023-03-01,A,10,150\n\
2022-03-01,B,20,200\n\
2022-03-01,A,10,100\n";

fn write_input(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write input file");
    path
}

fn sha256(path: &Path) -> [u8; 32] {
    Sha256::digest(fs::read(path).expect("read artifact")).into()
}

#[test]
fn computes_expected_kpis_from_csv() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "sales.csv", SCENARIO_A);

    let kpis = compute_kpis(&ReportConfig::new(input)).unwrap();

    assert_eq!(kpis.len(), 2);
    let a = kpis.get("A").unwrap();
    let b = kpis.get("B").unwrap();
    assert_eq!(a.total_sales, 250.0);
    assert_eq!(b.total_sales, 200.0);
    assert_eq!(a.average_order_value, Some(12.5));
    assert_eq!(b.average_order_value, Some(10.0));
    assert_eq!(a.growth, Some(50.0));
    assert_eq!(b.growth, None);
}

#[test]
fn zero_quantity_category_does_not_abort() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        dir.path(),
        "sales.csv",
        "Date,Category,QuantitySold,TotalSales\n\
         2022-01-01,Gift Cards,0,500\n\
         2022-01-01,Books,5,50\n",
    );

    let kpis = compute_kpis(&ReportConfig::new(input)).unwrap();

    assert_eq!(kpis.get("Gift Cards").unwrap().average_order_value, None);
    assert_eq!(kpis.get("Books").unwrap().average_order_value, Some(10.0));
}

#[test]
fn missing_column_fails_before_any_output() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        dir.path(),
        "sales.csv",
        "Date,Category,QuantitySold\n2022-01-01,A,1\n",
    );
    let output_dir = dir.path().join("outputs");

    let err = run(&ReportConfig::new(input).with_output_dir(&output_dir)).unwrap_err();

    assert!(matches!(err, ReportError::MissingColumn("TotalSales")));
    assert_eq!(err.exit_code(), 2);
    assert!(!output_dir.exists(), "no output directory may be created");
}

#[test]
fn empty_input_fails_before_any_output() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "sales.csv", "Date,Category,QuantitySold,TotalSales\n");
    let output_dir = dir.path().join("outputs");

    let err = run(&ReportConfig::new(input).with_output_dir(&output_dir)).unwrap_err();

    assert!(matches!(err, ReportError::EmptyDataset));
    assert!(!output_dir.exists());
}

#[test]
fn missing_input_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = run(&ReportConfig::new(dir.path().join("absent.xls"))).unwrap_err();
    assert!(matches!(err, ReportError::InputNotFound(_)));
}

#[test]
fn artifacts_are_identical_across_reruns() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "sales.csv", SCENARIO_A);
    let config = ReportConfig::new(input);

    let mut digests = Vec::new();
    for attempt in 0..2 {
        let output_dir = dir.path().join(format!("run{attempt}"));
        fs::create_dir_all(&output_dir).unwrap();
        let kpis = compute_kpis(&config).unwrap();
        let summary = export_summary(&kpis, &output_dir).unwrap();
        let charts = render_charts(&kpis, &output_dir, None).unwrap();

        let mut hashes = vec![sha256(&summary)];
        hashes.extend(charts.iter().map(|chart| sha256(&chart.path)));
        digests.push((kpis, hashes));
    }

    assert_eq!(digests[0], digests[1]);
}

#[test]
fn computes_expected_kpis_from_xlsx() {
    let input = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sales.xlsx");

    let kpis = compute_kpis(&ReportConfig::new(input)).unwrap();

    let a = kpis.get("A").unwrap();
    let b = kpis.get("B").unwrap();
    assert_eq!(a.total_sales, 250.5);
    assert_eq!(a.quantity_sold, 20);
    assert_eq!(b.total_sales, 200.0);
    assert_eq!(b.average_order_value, Some(10.0));
    let growth = a.growth.expect("A has two yearly rows");
    assert!((growth - 49.253_731_343_283_58).abs() < 1e-9);
    assert_eq!(b.growth, None);
}

#[test]
fn missing_fonts_fail_before_any_output() {
    if fonts::default_fonts_available() {
        eprintln!("Skipping missing-font run: a font family is available");
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "sales.csv", SCENARIO_A);
    let output_dir = dir.path().join("outputs");

    let err = run(&ReportConfig::new(input).with_output_dir(&output_dir)).unwrap_err();

    assert!(matches!(err, ReportError::Document(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(!output_dir.exists(), "no artifacts may be left behind");
}

#[test]
fn full_run_writes_every_artifact() {
    if !fonts::default_fonts_available() {
        eprintln!("Skipping full report run: no font family available");
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "sales.csv", SCENARIO_A);
    let output_dir = dir.path().join("kpi_dashboard_outputs");

    let outcome = run(&ReportConfig::new(input).with_output_dir(&output_dir)).unwrap();

    let metrics: Vec<_> = outcome.charts.iter().map(|chart| chart.metric).collect();
    assert_eq!(metrics, KpiMetric::ALL.to_vec());
    for chart in &outcome.charts {
        assert!(chart.path.is_file(), "{} missing", chart.path.display());
    }
    assert!(outcome.summary_path.is_file());
    assert_eq!(outcome.document_path, output_dir.join("kpi_dashboard.pdf"));
    let pdf = fs::read(&outcome.document_path).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}
