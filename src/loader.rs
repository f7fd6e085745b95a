//! Reads the sales table from a CSV file or a spreadsheet workbook.
//!
//! Both formats are first flattened into a [`RawTable`] of loosely typed cells; the typed
//! [`SalesRecord`] values are then built from the required columns only, so extra columns in
//! the source are ignored.

use std::fs::File;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use log::{debug, info};

use crate::error::ReportError;

pub const DATE_COLUMN: &str = "Date";
pub const CATEGORY_COLUMN: &str = "Category";
pub const QUANTITY_COLUMN: &str = "QuantitySold";
pub const TOTAL_SALES_COLUMN: &str = "TotalSales";

const REQUIRED_COLUMNS: [&str; 4] = [
    DATE_COLUMN,
    CATEGORY_COLUMN,
    QUANTITY_COLUMN,
    TOTAL_SALES_COLUMN,
];

const TEXT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const TEXT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

/// A single transaction row with its calendar fields already derived.
#[derive(Clone, Debug, PartialEq)]
pub struct SalesRecord {
    date: NaiveDate,
    year: i32,
    month: u32,
    category: String,
    quantity_sold: u64,
    total_sales: f64,
}

impl SalesRecord {
    pub fn new(
        date: NaiveDate,
        category: impl Into<String>,
        quantity_sold: u64,
        total_sales: f64,
    ) -> Self {
        Self {
            date,
            year: date.year(),
            month: date.month(),
            category: category.into(),
            quantity_sold,
            total_sales,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn quantity_sold(&self) -> u64 {
        self.quantity_sold
    }

    pub fn total_sales(&self) -> f64 {
        self.total_sales
    }
}

/// Loosely typed cell value shared by the CSV and workbook readers.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    /// Spreadsheet date stored as a serial day number.
    DateSerial(f64),
}

impl Cell {
    fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(value) | Cell::DateSerial(value) => value.to_string(),
            Cell::Text(text) => text.clone(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(value) => Cell::Number(*value as f64),
            Data::Float(value) => Cell::Number(*value),
            Data::Bool(value) => Cell::Text(value.to_string()),
            Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
                Cell::Text(text.trim().to_owned())
            }
            Data::DateTime(value) => Cell::DateSerial(value.as_f64()),
            Data::Error(err) => Cell::Text(format!("#{:?}", err)),
        }
    }
}

/// Header row plus data rows as read from the source file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    fn column_index(&self, name: &'static str) -> Result<usize, ReportError> {
        self.headers
            .iter()
            .position(|header| header == name)
            .ok_or(ReportError::MissingColumn(name))
    }
}

/// Reads a tabular file into a [`RawTable`].
pub trait SheetParser {
    fn parse(&self, path: &Path) -> Result<RawTable, ReportError>;
}

/// Parser for comma separated files with a header row.
pub struct CsvSheetParser;

impl SheetParser for CsvSheetParser {
    fn parse(&self, path: &Path) -> Result<RawTable, ReportError> {
        let csv_error = |source: csv::Error| ReportError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|err| csv_error(err.into()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(|header| header.trim().trim_start_matches('\u{feff}').to_owned())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            rows.push(
                record
                    .iter()
                    .map(|value| {
                        if value.is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(value.to_owned())
                        }
                    })
                    .collect(),
            );
        }

        Ok(RawTable { headers, rows })
    }
}

/// Parser for `.xls`, `.xlsx`, `.xlsm`, `.xlsb` and `.ods` workbooks; reads the first sheet.
pub struct WorkbookSheetParser;

impl SheetParser for WorkbookSheetParser {
    fn parse(&self, path: &Path) -> Result<RawTable, ReportError> {
        let spreadsheet_error = |source: calamine::Error| ReportError::Spreadsheet {
            path: path.to_path_buf(),
            source,
        };
        let mut workbook = open_workbook_auto(path).map_err(spreadsheet_error)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ReportError::MissingHeader(path.to_path_buf()))?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(spreadsheet_error)?;
        debug!("reading worksheet '{}' from {}", sheet_name, path.display());

        let mut rows = range.rows();
        let headers = rows
            .next()
            .ok_or_else(|| ReportError::MissingHeader(path.to_path_buf()))?
            .iter()
            .map(|cell| cell.to_string().trim().to_owned())
            .collect();
        let rows = rows
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();

        Ok(RawTable { headers, rows })
    }
}

/// Picks the parser matching the file extension.
pub fn parser_for(path: &Path) -> Result<Box<dyn SheetParser>, ReportError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "csv" => Ok(Box::new(CsvSheetParser)),
        "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Ok(Box::new(WorkbookSheetParser)),
        _ => Err(ReportError::UnsupportedFormat(extension)),
    }
}

/// Loads and validates every sales row in `path`.
pub fn load_sales(path: &Path) -> Result<Vec<SalesRecord>, ReportError> {
    if !path.is_file() {
        return Err(ReportError::InputNotFound(path.to_path_buf()));
    }
    let table = parser_for(path)?.parse(path)?;
    let records = records_from_table(&table)?;
    info!("loaded {} sales rows from {}", records.len(), path.display());
    Ok(records)
}

/// Converts a raw table into typed records, checking all required columns up front.
pub fn records_from_table(table: &RawTable) -> Result<Vec<SalesRecord>, ReportError> {
    let mut indices = [0usize; 4];
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = table.column_index(column)?;
    }
    let [date_idx, category_idx, quantity_idx, sales_idx] = indices;

    let mut records = Vec::with_capacity(table.rows.len());
    for (offset, row) in table.rows.iter().enumerate() {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        // Spreadsheet row number: one for the header, one for 1-based counting.
        let row_number = offset + 2;
        let cell = |index: usize| row.get(index).unwrap_or(&Cell::Empty);

        let date = parse_date(row_number, cell(date_idx))?;
        let category = parse_category(row_number, cell(category_idx))?;
        let quantity_sold = parse_quantity(row_number, cell(quantity_idx))?;
        let total_sales = parse_amount(row_number, TOTAL_SALES_COLUMN, cell(sales_idx))?;
        records.push(SalesRecord::new(date, category, quantity_sold, total_sales));
    }

    Ok(records)
}

fn invalid(row: usize, column: &'static str, cell: &Cell, reason: impl Into<String>) -> ReportError {
    ReportError::InvalidValue {
        row,
        column,
        value: cell.display(),
        reason: reason.into(),
    }
}

fn parse_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(value) => Some(*value),
        Cell::Text(text) => text.trim().replace(',', "").parse().ok(),
        Cell::Empty | Cell::DateSerial(_) => None,
    }
}

fn parse_amount(row: usize, column: &'static str, cell: &Cell) -> Result<f64, ReportError> {
    match parse_number(cell) {
        Some(value) if value.is_finite() => Ok(value),
        Some(_) => Err(invalid(row, column, cell, "value is not finite")),
        None => Err(invalid(row, column, cell, "expected a number")),
    }
}

fn parse_quantity(row: usize, cell: &Cell) -> Result<u64, ReportError> {
    let value = parse_amount(row, QUANTITY_COLUMN, cell)?;
    if value < 0.0 {
        return Err(invalid(row, QUANTITY_COLUMN, cell, "quantity must not be negative"));
    }
    if value.fract() != 0.0 || value >= u64::MAX as f64 {
        return Err(invalid(row, QUANTITY_COLUMN, cell, "quantity must be a whole number"));
    }
    Ok(value as u64)
}

fn parse_category(row: usize, cell: &Cell) -> Result<String, ReportError> {
    let category = match cell {
        Cell::Text(text) => text.trim().to_owned(),
        Cell::Number(value) => value.to_string(),
        Cell::Empty | Cell::DateSerial(_) => String::new(),
    };
    if category.is_empty() {
        return Err(invalid(row, CATEGORY_COLUMN, cell, "category must not be empty"));
    }
    Ok(category)
}

fn parse_date(row: usize, cell: &Cell) -> Result<NaiveDate, ReportError> {
    let parsed = match cell {
        Cell::DateSerial(serial) | Cell::Number(serial) => date_from_serial(*serial),
        Cell::Text(text) => date_from_text(text.trim()),
        Cell::Empty => None,
    };
    parsed.ok_or_else(|| invalid(row, DATE_COLUMN, cell, "expected a date"))
}

/// Converts a spreadsheet serial day number (1900 date system) into a calendar date.
pub fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    // Day zero sits on 1899-12-30 so that the phantom 1900-02-29 lines up.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

fn date_from_text(text: &str) -> Option<NaiveDate> {
    TEXT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            TEXT_DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|datetime| datetime.date())
        })
}
