//! Turns a [`ReportLayout`] into the final PDF document.

use std::fs;
use std::path::{Path, PathBuf};

use genpdf::elements::{Break, FrameCellDecorator, PageBreak, Paragraph, TableLayout};
use genpdf::style::Style;
use genpdf::{Alignment, Element};
use log::info;

use crate::builder::ReportDocumentBuilder;
use crate::elements::ChartFigure;
use crate::error::ReportError;
use crate::model::{ChartSection, ReportLayout};

/// File name of the assembled report inside the output directory.
pub const REPORT_FILE_NAME: &str = "kpi_dashboard.pdf";

const TITLE_FONT_SIZE: u8 = 16;
const SUBTITLE_FONT_SIZE: u8 = 10;
const TABLE_COLUMN_WEIGHTS: [usize; 2] = [3, 2];

pub fn report_path(output_dir: &Path) -> PathBuf {
    output_dir.join(REPORT_FILE_NAME)
}

/// Renders `layout` into PDF bytes.
pub fn render_report(layout: &ReportLayout) -> Result<Vec<u8>, ReportError> {
    let mut document = ReportDocumentBuilder::report_defaults()
        .with_title(layout.title())
        .build()?;

    document.push(
        Paragraph::new(layout.title())
            .aligned(Alignment::Center)
            .styled(Style::new().bold().with_font_size(TITLE_FONT_SIZE)),
    );
    if let Some(subtitle) = layout.subtitle() {
        document.push(
            Paragraph::new(subtitle)
                .aligned(Alignment::Center)
                .styled(Style::new().italic().with_font_size(SUBTITLE_FONT_SIZE)),
        );
    }
    document.push(Break::new(1.5));

    for section in layout.sections() {
        if section.starts_on_new_page() {
            document.push(PageBreak::new());
        }
        let figure = ChartFigure::from_path(section.image_path(), Paragraph::new(section.heading()))?
            .with_width_mm(section.width_mm());
        document.push(figure);
        document.push(Break::new(1));
        document.push(value_table(section)?);
    }

    let mut bytes = Vec::new();
    document.render(&mut bytes)?;
    Ok(bytes)
}

/// Renders `layout` and writes the document to `path`.
pub fn write_report(layout: &ReportLayout, path: &Path) -> Result<(), ReportError> {
    let bytes = render_report(layout)?;
    fs::write(path, &bytes).map_err(|err| ReportError::output(path, err))?;
    info!("wrote report {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn value_table(section: &ChartSection) -> Result<TableLayout, genpdf::error::Error> {
    let mut table = TableLayout::new(TABLE_COLUMN_WEIGHTS.to_vec());
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    let header = Style::new().bold();
    table
        .row()
        .element(Paragraph::new("Category").styled(header).padded(1))
        .element(
            Paragraph::new(section.metric().axis_label())
                .aligned(Alignment::Right)
                .styled(header)
                .padded(1),
        )
        .push()?;

    for row in section.rows() {
        table
            .row()
            .element(Paragraph::new(row.label.as_str()).padded(1))
            .element(
                Paragraph::new(row.value.as_str())
                    .aligned(Alignment::Right)
                    .padded(1),
            )
            .push()?;
    }
    Ok(table)
}
