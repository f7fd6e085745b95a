use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use kpi_report::config::{DEFAULT_MARKETING_SPEND, DEFAULT_OUTPUT_DIR, DEFAULT_TITLE};
use kpi_report::{GrowthPeriod, ReportConfig};

/// Builds the sales KPI dashboard from a spreadsheet or CSV export.
///
/// Charts, a CSV summary and the PDF report are written to the output directory. A complete
/// TrueType font family is required for the PDF; point `KPI_REPORT_FONTS_DIR` at one if the
/// bundled or system fonts cannot be found.
#[derive(Parser)]
#[command(author, version, about = "Generate the sales KPI dashboard")]
struct Cli {
    /// Sales data file (.csv, .xls, .xlsx, .xlsm, .xlsb or .ods).
    #[arg(short, long)]
    input: PathBuf,

    /// Directory receiving the charts, the summary and the report.
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Marketing budget used for the return-on-marketing-spend KPI.
    #[arg(short, long, default_value_t = DEFAULT_MARKETING_SPEND)]
    marketing_spend: f64,

    /// Growth basis: `row` compares consecutive rows, `year` compares calendar years.
    #[arg(short, long, default_value = "row", value_parser = parse_growth_period)]
    growth_period: GrowthPeriod,

    /// Title printed at the top of the report.
    #[arg(long, default_value = DEFAULT_TITLE)]
    title: String,

    /// Log per-category details.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_growth_period(value: &str) -> Result<GrowthPeriod, String> {
    value.parse().map_err(|err: kpi_report::ReportError| err.to_string())
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = ReportConfig::new(cli.input)
        .with_output_dir(cli.output_dir)
        .with_marketing_spend(cli.marketing_spend)
        .with_growth_period(cli.growth_period)
        .with_title(cli.title);

    match kpi_report::run(&config) {
        Ok(outcome) => {
            log::debug!("charts: {:?}", outcome.charts);
            println!(
                "Dashboard successfully saved as a PDF at: {}",
                outcome.document_path.display()
            );
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            print_error_sources(&err);
            std::process::exit(err.exit_code());
        }
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
