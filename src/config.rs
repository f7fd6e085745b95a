//! Run configuration for the KPI report.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ReportError;

/// Marketing budget assumed when none is supplied, in the same currency as `TotalSales`.
pub const DEFAULT_MARKETING_SPEND: f64 = 10_000.0;

/// Directory that receives the charts, the summary, and the report.
pub const DEFAULT_OUTPUT_DIR: &str = "kpi_dashboard_outputs";

/// Title printed at the top of the report.
pub const DEFAULT_TITLE: &str = "KPI Dashboard";

/// Period boundary used for the growth KPI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GrowthPeriod {
    /// Change between consecutive rows of a category once they are ordered by date.
    #[default]
    Row,
    /// Change between a calendar year's total and the preceding calendar year's total.
    Year,
}

impl FromStr for GrowthPeriod {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "row" | "rows" => Ok(Self::Row),
            "year" | "years" | "calendar-year" => Ok(Self::Year),
            other => Err(ReportError::InvalidConfig(format!(
                "unknown growth period '{}' (expected 'row' or 'year')",
                other
            ))),
        }
    }
}

impl fmt::Display for GrowthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row => f.write_str("row"),
            Self::Year => f.write_str("year"),
        }
    }
}

/// Everything a single report run needs to know.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportConfig {
    input_path: PathBuf,
    output_dir: PathBuf,
    marketing_spend: f64,
    growth_period: GrowthPeriod,
    title: String,
}

impl ReportConfig {
    /// Creates a configuration reading from `input_path` with default settings otherwise.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            marketing_spend: DEFAULT_MARKETING_SPEND,
            growth_period: GrowthPeriod::default(),
            title: DEFAULT_TITLE.to_owned(),
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn marketing_spend(&self) -> f64 {
        self.marketing_spend
    }

    pub fn growth_period(&self) -> GrowthPeriod {
        self.growth_period
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sets the output directory and returns the updated configuration.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Sets the marketing spend and returns the updated configuration.
    pub fn with_marketing_spend(mut self, marketing_spend: f64) -> Self {
        self.marketing_spend = marketing_spend;
        self
    }

    /// Sets the growth period and returns the updated configuration.
    pub fn with_growth_period(mut self, growth_period: GrowthPeriod) -> Self {
        self.growth_period = growth_period;
        self
    }

    /// Sets the report title and returns the updated configuration.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Rejects settings that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.input_path.as_os_str().is_empty() {
            return Err(ReportError::InvalidConfig(
                "input path must not be empty".to_owned(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ReportError::InvalidConfig(
                "output directory must not be empty".to_owned(),
            ));
        }
        if !self.marketing_spend.is_finite() || self.marketing_spend <= 0.0 {
            return Err(ReportError::InvalidConfig(format!(
                "marketing spend must be a positive number, got {}",
                self.marketing_spend
            )));
        }
        Ok(())
    }
}
