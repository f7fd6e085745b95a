//! Construction of the `genpdf` document that carries the KPI report.

use genpdf::elements::Paragraph;
use genpdf::error::{Error, ErrorKind};
use genpdf::style;
use genpdf::{self, Alignment, Element, Margins, Mm, PageDecorator, PaperSize, Position, Size};

use crate::fonts;

/// Top and bottom page margin in millimetres.
pub const PAGE_MARGIN_VERTICAL_MM: f64 = 15.0;
/// Left and right page margin in millimetres.
pub const PAGE_MARGIN_HORIZONTAL_MM: f64 = 10.0;
/// Height reserved for the page-number footer.
pub const FOOTER_HEIGHT_MM: f64 = 8.0;

const DEFAULT_FONT_SIZE: u8 = 12;

type FooterFactory = dyn Fn(usize) -> Box<dyn Element>;

/// Builder for `genpdf::Document` instances configured for the KPI report.
#[derive(Default)]
pub struct ReportDocumentBuilder {
    title: Option<String>,
    paper_size: Option<Size>,
    margins: Option<Margins>,
    font_size: Option<u8>,
    footer: Option<FooterSpec>,
}

impl ReportDocumentBuilder {
    /// Creates a builder with no title, no footer and `genpdf` defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A4 pages, report margins and a centered page-number footer.
    pub fn report_defaults() -> Self {
        Self::new()
            .with_paper_size(PaperSize::A4)
            .with_margins(Margins::trbl(
                PAGE_MARGIN_VERTICAL_MM,
                PAGE_MARGIN_HORIZONTAL_MM,
                PAGE_MARGIN_VERTICAL_MM,
                PAGE_MARGIN_HORIZONTAL_MM,
            ))
            .with_font_size(DEFAULT_FONT_SIZE)
            .with_page_numbers()
    }

    /// Sets the document title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = Some(font_size);
        self
    }

    /// Configures a footer callback with a fixed height that is invoked for every page.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.footer = Some(FooterSpec::new(height, footer));
        self
    }

    /// Prints `Page N` centered at the bottom of every page.
    pub fn with_page_numbers(self) -> Self {
        self.with_footer(FOOTER_HEIGHT_MM, |page| {
            Paragraph::new(format!("Page {}", page))
                .aligned(Alignment::Center)
                .styled(style::Style::new().with_font_size(9))
        })
    }

    /// Loads the fonts and builds the configured document.
    pub fn build(self) -> Result<genpdf::Document, Error> {
        let font_family = fonts::default_font_family()?;
        let mut document = genpdf::Document::new(font_family);

        if let Some(title) = self.title {
            document.set_title(title);
        }
        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }
        if let Some(font_size) = self.font_size {
            document.set_font_size(font_size);
        }

        document.set_page_decorator(ReportPageDecorator::new(self.margins, self.footer));
        Ok(document)
    }
}

/// Definition of a footer rendered through the page decorator.
pub struct FooterSpec {
    height: Mm,
    factory: Box<FooterFactory>,
}

impl FooterSpec {
    pub fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }
}

struct ReportPageDecorator {
    page: usize,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
}

impl ReportPageDecorator {
    fn new(margins: Option<Margins>, footer: Option<FooterSpec>) -> Self {
        Self {
            page: 0,
            margins,
            footer,
        }
    }
}

impl PageDecorator for ReportPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: style::Style,
    ) -> Result<genpdf::render::Area<'a>, Error> {
        self.page += 1;

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(Error::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            let mut footer_area = area.clone();
            footer_area.add_offset(Position::new(0, available - footer.height));
            let mut element = (footer.factory)(self.page);
            let result = element.render(context, footer_area, style)?;
            if result.has_more {
                return Err(Error::new(
                    "Footer does not fit into the reserved space",
                    ErrorKind::PageSizeExceeded,
                ));
            }

            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}
