//! Bar chart rendering on top of the [`image`] crate.
//!
//! Each chart is a raster with a plot area, gridlines, a zero baseline and one bar per
//! category. When a font is supplied, the title, axis labels, value ticks and category names
//! are drawn into the image with `imageproc`; without one the chart carries shapes only.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{imageops, DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use log::{debug, info};
use num_format::{Locale, ToFormattedString};
use rusttype::{point, Font, Scale};

use crate::error::ReportError;
use crate::kpi::{KpiMetric, KpiSeries, KpiTable};

pub const DEFAULT_CHART_WIDTH: u32 = 1000;
pub const DEFAULT_CHART_HEIGHT: u32 = 600;

const MARGIN_LEFT: u32 = 110;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 60;
const MARGIN_BOTTOM: u32 = 90;
const GRID_LINES: u32 = 4;
const BAR_FILL_RATIO: f64 = 0.7;
const HEADROOM_RATIO: f64 = 0.05;
const UNDEFINED_MARKER_HEIGHT: u32 = 10;
const TICK_LENGTH: u32 = 6;

const TITLE_SCALE: f32 = 26.0;
const AXIS_LABEL_SCALE: f32 = 19.0;
const TICK_LABEL_SCALE: f32 = 15.0;
const TITLE_TOP: u32 = 16;
const LABEL_GAP: u32 = 6;
const X_AXIS_LABEL: &str = "Category";

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([228, 228, 228]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const UNDEFINED: Rgb<u8> = Rgb([150, 150, 150]);
const TEXT: Rgb<u8> = Rgb([33, 33, 33]);

/// Colour ramps applied across the bars of a chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Palette {
    Blues,
    YellowGreenBlue,
    Purples,
    RedYellowGreen,
}

impl Palette {
    pub fn for_metric(metric: KpiMetric) -> Self {
        match metric {
            KpiMetric::TotalSales => Palette::Blues,
            KpiMetric::MarketingReturn => Palette::YellowGreenBlue,
            KpiMetric::AverageOrderValue => Palette::Purples,
            KpiMetric::YearOverYearGrowth => Palette::RedYellowGreen,
        }
    }

    fn anchors(self) -> &'static [[u8; 3]] {
        match self {
            Palette::Blues => &[[158, 202, 225], [66, 146, 198], [8, 81, 156], [8, 48, 107]],
            Palette::YellowGreenBlue => &[[237, 248, 177], [127, 205, 187], [44, 127, 184]],
            Palette::Purples => &[[218, 218, 235], [158, 154, 200], [106, 81, 163], [63, 0, 125]],
            Palette::RedYellowGreen => &[[215, 48, 39], [254, 224, 139], [26, 152, 80]],
        }
    }

    /// Colour at position `t` in `[0, 1]` along the ramp.
    pub fn color_at(self, t: f64) -> Rgb<u8> {
        let anchors = self.anchors();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (anchors.len() - 1) as f64;
        let index = (scaled.floor() as usize).min(anchors.len() - 2);
        let mix = scaled - index as f64;
        let (start, end) = (anchors[index], anchors[index + 1]);

        let mut channels = [0u8; 3];
        for (channel, (a, b)) in channels.iter_mut().zip(start.iter().zip(end.iter())) {
            let value = *a as f64 + (*b as f64 - *a as f64) * mix;
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(channels)
    }

    /// Evenly spaced colours for `count` bars.
    pub fn colors(self, count: usize) -> Vec<Rgb<u8>> {
        match count {
            0 => Vec::new(),
            1 => vec![self.color_at(0.5)],
            _ => (0..count)
                .map(|index| self.color_at(index as f64 / (count - 1) as f64))
                .collect(),
        }
    }
}

/// Value range covered by the vertical axis; always includes zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn from_series(series: &KpiSeries) -> Self {
        let (mut min, mut max) = series
            .iter()
            .filter_map(|(_, value)| *value)
            .filter(|value| value.is_finite())
            .fold((0.0f64, 0.0f64), |(min, max), value| (min.min(value), max.max(value)));

        if max - min <= f64::EPSILON {
            max = 1.0;
        }
        let headroom = (max - min) * HEADROOM_RATIO;
        if max > 0.0 {
            max += headroom;
        }
        if min < 0.0 {
            min -= headroom;
        }
        Self { min, max }
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Reads the TrueType file used for chart text.
pub fn load_chart_font(path: &Path) -> Result<Font<'static>, ReportError> {
    let font_error = |reason: String| ReportError::ChartFont {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|err| font_error(err.to_string()))?;
    Font::try_from_vec(bytes).ok_or_else(|| font_error("not a usable TrueType font".to_owned()))
}

/// A single-series bar chart for one KPI.
#[derive(Clone)]
pub struct BarChart {
    metric: KpiMetric,
    series: KpiSeries,
    palette: Palette,
    width: u32,
    height: u32,
    font: Option<Font<'static>>,
}

impl BarChart {
    pub fn new(metric: KpiMetric, series: KpiSeries) -> Self {
        Self {
            metric,
            series,
            palette: Palette::for_metric(metric),
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
            font: None,
        }
    }

    /// Overrides the raster size; sizes smaller than the margins are widened to fit them.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(MARGIN_LEFT + MARGIN_RIGHT + 1);
        self.height = height.max(MARGIN_TOP + MARGIN_BOTTOM + 1);
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Enables the title, axis labels, value ticks and category names.
    pub fn with_font(mut self, font: Font<'static>) -> Self {
        self.font = Some(font);
        self
    }

    pub fn metric(&self) -> KpiMetric {
        self.metric
    }

    pub fn series(&self) -> &KpiSeries {
        &self.series
    }

    pub fn render(&self) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let plot = PlotArea::new(self.width, self.height);
        let range = ValueRange::from_series(&self.series);

        for step in 0..=GRID_LINES {
            let value = range.min + range.span() * step as f64 / GRID_LINES as f64;
            let y = plot.y_for(value, &range);
            fill_rect(&mut canvas, plot.left, y, plot.right, y + 1, GRID);
        }

        let baseline = plot.y_for(0.0, &range);
        let count = self.series.len();
        if count > 0 {
            let slot = plot.slot_width(count);
            let bar_width = ((slot * BAR_FILL_RATIO).round() as u32).max(1);
            let colors = self.palette.colors(count);

            for (index, ((_, value), color)) in self.series.iter().zip(colors).enumerate() {
                let center = plot.slot_center(count, index);
                let x0 = (center - bar_width as f64 / 2.0).round().max(plot.left as f64) as u32;
                let x1 = (x0 + bar_width).min(plot.right);

                match value.filter(|value| value.is_finite()) {
                    Some(value) => {
                        let y = plot.y_for(value, &range);
                        let (top, bottom) = if y <= baseline {
                            (y, baseline.max(y + 1))
                        } else {
                            (baseline, y)
                        };
                        fill_rect(&mut canvas, x0, top, x1, bottom, color);
                        outline_rect(&mut canvas, x0, top, x1, bottom, darken(color), false);
                    }
                    None => {
                        let top = baseline.saturating_sub(UNDEFINED_MARKER_HEIGHT);
                        outline_rect(&mut canvas, x0, top, x1, baseline, UNDEFINED, true);
                    }
                }

                let tick_x = center.round() as u32;
                fill_rect(
                    &mut canvas,
                    tick_x,
                    plot.bottom,
                    tick_x + 1,
                    plot.bottom + TICK_LENGTH,
                    AXIS,
                );
            }
        }

        fill_rect(&mut canvas, plot.left, baseline, plot.right, baseline + 1, AXIS);
        fill_rect(&mut canvas, plot.left, plot.top, plot.left + 1, plot.bottom, AXIS);
        fill_rect(&mut canvas, plot.left, plot.bottom, plot.right, plot.bottom + 1, AXIS);

        if let Some(font) = &self.font {
            self.draw_labels(&mut canvas, font, &plot, &range);
        }
        canvas
    }

    fn draw_labels(
        &self,
        canvas: &mut RgbImage,
        font: &Font<'static>,
        plot: &PlotArea,
        range: &ValueRange,
    ) {
        let title_scale = Scale::uniform(TITLE_SCALE);
        let title = self.metric.title();
        let title_x = (self.width / 2).saturating_sub(text_width(font, title_scale, title) / 2);
        draw_text_mut(canvas, TEXT, title_x, TITLE_TOP, title_scale, font, title);

        let tick_scale = Scale::uniform(TICK_LABEL_SCALE);
        let whole_numbers = range.span() >= 10.0;
        for step in 0..=GRID_LINES {
            let value = range.min + range.span() * step as f64 / GRID_LINES as f64;
            let y = plot.y_for(value, range);
            fill_rect(canvas, plot.left - TICK_LENGTH, y, plot.left, y + 1, AXIS);

            let label = tick_label(value, whole_numbers);
            let right = plot.left - TICK_LENGTH - LABEL_GAP;
            let x = right.saturating_sub(text_width(font, tick_scale, &label));
            let top = y.saturating_sub(TICK_LABEL_SCALE as u32 / 2);
            draw_text_mut(canvas, TEXT, x, top, tick_scale, font, &label);
        }

        let label_scale = Scale::uniform(AXIS_LABEL_SCALE);
        let count = self.series.len();
        for (index, (category, _)) in self.series.iter().enumerate() {
            let slot = plot.slot_width(count);
            let natural = text_width(font, label_scale, category).max(1);
            let fit = ((slot * 0.95) / natural as f64).min(1.0) as f32;
            let scale = Scale::uniform(AXIS_LABEL_SCALE * fit);
            let width = text_width(font, scale, category);
            let x = (plot.slot_center(count, index).round() as u32).saturating_sub(width / 2);
            let top = plot.bottom + TICK_LENGTH + LABEL_GAP;
            draw_text_mut(canvas, TEXT, x, top, scale, font, category);
        }

        let x_label_width = text_width(font, label_scale, X_AXIS_LABEL);
        let x_label_x = (plot.left + plot.width() / 2).saturating_sub(x_label_width / 2);
        let x_label_top = self.height.saturating_sub(AXIS_LABEL_SCALE as u32 + LABEL_GAP * 2);
        draw_text_mut(canvas, TEXT, x_label_x, x_label_top, label_scale, font, X_AXIS_LABEL);

        let y_label = self.metric.axis_label();
        let y_label_width = text_width(font, label_scale, y_label);
        let mut horizontal = RgbImage::from_pixel(
            y_label_width + LABEL_GAP,
            AXIS_LABEL_SCALE as u32 + LABEL_GAP,
            BACKGROUND,
        );
        draw_text_mut(&mut horizontal, TEXT, 0, 0, label_scale, font, y_label);
        let vertical = imageops::rotate270(&horizontal);
        let y_label_top = (plot.top + plot.height() / 2).saturating_sub(vertical.height() / 2);
        imageops::overlay(canvas, &vertical, LABEL_GAP, y_label_top);
    }

    /// Renders the chart and encodes it as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(self.render())
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
        Ok(bytes)
    }
}

struct PlotArea {
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
}

impl PlotArea {
    fn new(width: u32, height: u32) -> Self {
        Self {
            left: MARGIN_LEFT,
            right: width - MARGIN_RIGHT,
            top: MARGIN_TOP,
            bottom: height - MARGIN_BOTTOM,
        }
    }

    fn width(&self) -> u32 {
        self.right - self.left
    }

    fn height(&self) -> u32 {
        self.bottom - self.top
    }

    fn slot_width(&self, count: usize) -> f64 {
        self.width() as f64 / count.max(1) as f64
    }

    fn slot_center(&self, count: usize, index: usize) -> f64 {
        self.left as f64 + self.slot_width(count) * (index as f64 + 0.5)
    }

    fn y_for(&self, value: f64, range: &ValueRange) -> u32 {
        let fraction = ((range.max - value) / range.span()).clamp(0.0, 1.0);
        let y = self.top as f64 + fraction * self.height() as f64;
        (y.round() as u32).min(self.bottom)
    }
}

/// Horizontal advance of `text` in pixels.
fn text_width(font: &Font<'_>, scale: Scale, text: &str) -> u32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map_or(0.0, |glyph| {
            glyph.position().x + glyph.unpositioned().h_metrics().advance_width
        })
        .ceil()
        .max(0.0) as u32
}

fn tick_label(value: f64, whole_numbers: bool) -> String {
    if whole_numbers {
        (value.round() as i64).to_formatted_string(&Locale::en)
    } else {
        format!("{:.2}", value)
    }
}

fn darken(color: Rgb<u8>) -> Rgb<u8> {
    let Rgb([r, g, b]) = color;
    Rgb([
        (r as f32 * 0.7) as u8,
        (g as f32 * 0.7) as u8,
        (b as f32 * 0.7) as u8,
    ])
}

/// Fills the half-open rectangle `[x0, x1) x [y0, y1)`, clipped to the canvas.
fn fill_rect(canvas: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    let x1 = x1.min(canvas.width());
    let y1 = y1.min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}

fn outline_rect(
    canvas: &mut RgbImage,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    color: Rgb<u8>,
    dashed: bool,
) {
    let x1 = x1.min(canvas.width());
    let y1 = y1.min(canvas.height());
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    let visible = |offset: u32| !dashed || (offset / 4) % 2 == 0;
    for x in x0..x1 {
        if visible(x - x0) {
            canvas.put_pixel(x, y0, color);
            canvas.put_pixel(x, y1 - 1, color);
        }
    }
    for y in y0..y1 {
        if visible(y - y0) {
            canvas.put_pixel(x0, y, color);
            canvas.put_pixel(x1 - 1, y, color);
        }
    }
}

/// A chart image written to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartArtifact {
    pub metric: KpiMetric,
    pub path: PathBuf,
}

/// Path of the chart image for `metric` inside `output_dir`.
pub fn chart_path(output_dir: &Path, metric: KpiMetric) -> PathBuf {
    output_dir.join(format!("{}.png", metric.file_stem()))
}

/// Renders one chart per KPI into `output_dir`, in report order.
///
/// Text is drawn only when `font` is given.
pub fn render_charts(
    table: &KpiTable,
    output_dir: &Path,
    font: Option<&Font<'static>>,
) -> Result<Vec<ChartArtifact>, ReportError> {
    let mut artifacts = Vec::with_capacity(KpiMetric::ALL.len());
    for metric in KpiMetric::ALL {
        let path = chart_path(output_dir, metric);
        let mut chart = BarChart::new(metric, table.series(metric));
        if let Some(font) = font {
            chart = chart.with_font(font.clone());
        }
        let bytes = chart
            .to_png()
            .map_err(|source| ReportError::Chart {
                path: path.clone(),
                source,
            })?;
        fs::write(&path, &bytes).map_err(|err| ReportError::output(&path, err))?;
        debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        artifacts.push(ChartArtifact { metric, path });
    }
    info!("rendered {} charts into {}", artifacts.len(), output_dir.display());
    Ok(artifacts)
}
