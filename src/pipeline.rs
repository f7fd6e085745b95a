//! End-to-end report run: load, compute, then write every artifact.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::chart::{load_chart_font, render_charts, ChartArtifact};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::fonts;
use crate::kpi::{KpiCalculator, KpiTable};
use crate::loader::load_sales;
use crate::model::{group_thousands, ReportLayout};
use crate::report::{report_path, write_report};
use crate::summary::export_summary;

/// Everything a successful run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportOutcome {
    pub kpis: KpiTable,
    pub summary_path: PathBuf,
    pub charts: Vec<ChartArtifact>,
    pub document_path: PathBuf,
}

/// Loads the input and computes the KPIs without touching the output directory.
pub fn compute_kpis(config: &ReportConfig) -> Result<KpiTable, ReportError> {
    config.validate()?;
    let calculator = KpiCalculator::from_config(config)?;
    let records = load_sales(config.input_path())?;
    calculator.compute(&records)
}

/// Runs the whole report. Nothing is written unless loading, computation and font lookup
/// succeed.
pub fn run(config: &ReportConfig) -> Result<ReportOutcome, ReportError> {
    let kpis = compute_kpis(config)?;

    let font_candidate = fonts::resolve_font_candidate()?;
    let chart_font = load_chart_font(&font_candidate.regular_path())?;
    debug!("chart text uses {}", font_candidate.family.name);

    let output_dir = config.output_dir();
    prepare_output_dir(output_dir)?;

    let summary_path = export_summary(&kpis, output_dir)?;
    let charts = render_charts(&kpis, output_dir, Some(&chart_font))?;

    let layout = ReportLayout::from_kpis(config.title(), &kpis, &charts)?.with_subtitle(Some(
        format!(
            "Marketing spend assumption: {} | Growth basis: {}",
            group_thousands(config.marketing_spend()),
            config.growth_period()
        ),
    ));
    let document_path = report_path(output_dir);
    write_report(&layout, &document_path)?;

    info!("report run finished for {} categories", kpis.len());
    Ok(ReportOutcome {
        kpis,
        summary_path,
        charts,
        document_path,
    })
}

fn prepare_output_dir(output_dir: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(output_dir).map_err(|err| ReportError::output(output_dir, err))
}
