//! Sales KPI dashboard generator.
//!
//! Reads a sales table, computes per-category KPIs, renders a bar chart for each KPI and
//! assembles the charts into a PDF report. [`pipeline::run`] drives the whole job.

pub mod builder;
pub mod chart;
pub mod config;
pub mod elements;
pub mod error;
pub mod fonts;
pub mod kpi;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod summary;

pub use config::{GrowthPeriod, ReportConfig};
pub use error::ReportError;
pub use pipeline::{run, ReportOutcome};
