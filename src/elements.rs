//! Custom `genpdf` elements used by the report.
//!
//! The chart figure reads a rendered chart back from disk with the [`image`] crate, scales it
//! to the requested width and stacks a heading above it.

use std::path::Path;

use image::GenericImageView;

use genpdf::elements::{Image, Paragraph};
use genpdf::error::{Context as _, Error};
use genpdf::style::Style;
use genpdf::{render, Element, Mm, Position, RenderResult, Scale, Size};

const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const DEFAULT_HEADING_SPACING_MM: f64 = 2.0;

fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

/// Physical size of `image` when printed at `dpi`.
pub fn estimated_image_size(image: &image::DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * (px_width as f64) / dpi;
    let height_mm = MM_PER_INCH * (px_height as f64) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an image from `path`, guessing the format from its contents.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<image::DynamicImage, Error> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .with_context(|| format!("Failed to open chart image {}", path.display()))?;
    reader
        .with_guessed_format()
        .context("Unable to determine chart image format")?
        .decode()
        .with_context(|| format!("Failed to decode chart image {}", path.display()))
}

/// A chart image with a heading printed above it.
///
/// When the image does not fit on the current page the heading is not repeated on the next
/// one.
pub struct ChartFigure {
    heading: Paragraph,
    image: Image,
    natural_size: Size,
    requested_width: Option<Mm>,
    spacing: Mm,
    heading_rendered: bool,
}

impl ChartFigure {
    /// Creates a figure from an already decoded image.
    pub fn from_dynamic_image(image: image::DynamicImage, heading: Paragraph) -> Result<Self, Error> {
        let natural_size = estimated_image_size(&image, DEFAULT_IMAGE_DPI);
        let image = Image::from_dynamic_image(image)?;
        Ok(Self {
            heading,
            image,
            natural_size,
            requested_width: None,
            spacing: mm_from_f64(DEFAULT_HEADING_SPACING_MM),
            heading_rendered: false,
        })
    }

    /// Creates a figure from the chart image stored at `path`.
    pub fn from_path(path: impl AsRef<Path>, heading: Paragraph) -> Result<Self, Error> {
        Self::from_dynamic_image(decode_image_from_path(path)?, heading)
    }

    /// Constrains the rendered width (in millimetres) while preserving the aspect ratio.
    pub fn with_width_mm(mut self, width_mm: Option<f64>) -> Self {
        self.requested_width = width_mm.map(mm_from_f64);
        self.apply_width();
        self
    }

    fn apply_width(&mut self) {
        let scale = match self.requested_width {
            Some(width) => {
                let natural = mm_to_f64(self.natural_size.width);
                if natural > f64::EPSILON {
                    mm_to_f64(width) / natural
                } else {
                    1.0
                }
            }
            None => 1.0,
        };
        self.image.set_scale(Scale::new(scale, scale));
    }
}

impl Element for ChartFigure {
    fn render(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();

        if !self.heading_rendered {
            let heading_result = self.heading.render(context, area.clone(), style)?;
            if heading_result.has_more {
                result.has_more = true;
                return Ok(result);
            }
            self.heading_rendered = true;
            let offset = heading_result.size.height + self.spacing;
            result.size = result
                .size
                .stack_vertical(heading_result.size)
                .stack_vertical(Size::new(0, self.spacing));
            area.add_offset(Position::new(0, offset));
        }

        let image_result = self.image.render(context, area, style)?;
        result.size = result.size.stack_vertical(image_result.size);
        result.has_more |= image_result.has_more;
        Ok(result)
    }
}
