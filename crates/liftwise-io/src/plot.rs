//! PNG plots for the report: importance bars and a confusion heatmap.
//!
//! Plots carry no text. Tick marks in the margins sit at every bar and at
//! every class row and column, in the order the report's tables list them.

use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::{info, instrument};

use crate::IoError;
use crate::summary::ImportanceRow;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const LIGHT_GRAY: Rgb<u8> = Rgb([220, 220, 220]);
const DARK_GRAY: Rgb<u8> = Rgb([60, 60, 60]);
const PALE_BLUE: Rgb<u8> = Rgb([222, 235, 247]);
const DEEP_BLUE: Rgb<u8> = Rgb([8, 48, 107]);
const TEAL: Rgb<u8> = Rgb([102, 194, 165]);

const TICK_LEN: u32 = 4;

/// Linear blend of two colors, `t` clamped to [0, 1].
fn interpolate_color(from: Rgb<u8>, to: Rgb<u8>, t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let channel = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    Rgb([
        channel(from[0], to[0]),
        channel(from[1], to[1]),
        channel(from[2], to[2]),
    ])
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for py in y..y.saturating_add(h).min(img.height()) {
        for px in x..x.saturating_add(w).min(img.width()) {
            img.put_pixel(px, py, color);
        }
    }
}

fn save_png(img: &RgbImage, path: &Path) -> Result<(), IoError> {
    img.save(path).map_err(|e| IoError::RenderPlot {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Horizontal bar chart of the most important predictors.
///
/// Bars run top to bottom in rank order; length and shade scale with
/// importance relative to the top predictor. The left axis carries one tick
/// per bar; the bottom margin carries ticks at each quarter of the top bar.
#[derive(Debug, Clone)]
pub struct ImportanceChart {
    width: u32,
    bar_height: u32,
    gap: u32,
    margin: u32,
    top_n: usize,
}

impl ImportanceChart {
    #[must_use]
    pub fn new() -> Self {
        Self {
            width: 640,
            bar_height: 18,
            gap: 6,
            margin: 12,
            top_n: 20,
        }
    }

    /// Plot at most `top_n` bars.
    #[must_use]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    #[must_use]
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    #[must_use]
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Draw the chart.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::EmptyPlot`] when there is nothing to draw.
    pub fn render(&self, importances: &[ImportanceRow]) -> Result<RgbImage, IoError> {
        let mut rows: Vec<&ImportanceRow> = importances.iter().collect();
        rows.sort_by_key(|r| r.rank);
        rows.truncate(self.top_n);
        if rows.is_empty() || self.width <= 2 * self.margin {
            return Err(IoError::EmptyPlot {
                what: "feature importance",
            });
        }

        let n = rows.len() as u32;
        let height = 2 * self.margin + n * self.bar_height + (n - 1) * self.gap;
        let mut img = RgbImage::from_pixel(self.width, height, WHITE);

        let span = self.width - 2 * self.margin;
        let max = rows
            .iter()
            .map(|r| r.importance)
            .fold(0.0_f64, f64::max);

        // Axis at the bar origin.
        fill_rect(&mut img, self.margin - 1, 0, 1, height, DARK_GRAY);

        for (i, row) in rows.iter().enumerate() {
            let share = if max > 0.0 { row.importance.max(0.0) / max } else { 0.0 };
            let len = ((f64::from(span) * share).round() as u32).max(1);
            let y = self.margin + i as u32 * (self.bar_height + self.gap);
            let color = interpolate_color(TEAL, DEEP_BLUE, share);
            fill_rect(&mut img, self.margin, y, len, self.bar_height, color);
            let tick_x = self.margin.saturating_sub(1 + TICK_LEN);
            fill_rect(&mut img, tick_x, y + self.bar_height / 2, TICK_LEN, 1, DARK_GRAY);
        }

        let bottom = height - self.margin;
        for quarter in 1..=4 {
            let x = self.margin + span * quarter / 4 - 1;
            fill_rect(&mut img, x, bottom + 1, 1, TICK_LEN, DARK_GRAY);
        }
        Ok(img)
    }

    /// Draw the chart and save it as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::EmptyPlot`] or [`IoError::RenderPlot`].
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(&self, importances: &[ImportanceRow], path: &Path) -> Result<(), IoError> {
        let img = self.render(importances)?;
        save_png(&img, path)?;
        info!(width = img.width(), height = img.height(), "importance chart written");
        Ok(())
    }
}

impl Default for ImportanceChart {
    fn default() -> Self {
        Self::new()
    }
}

/// Confusion matrix heatmap, rows = actual class, columns = predicted class.
///
/// Each cell is shaded by its share of the row total, so the diagonal shows
/// per-class recall. The top and left margins carry one tick per class,
/// centered on its column and row.
#[derive(Debug, Clone)]
pub struct ConfusionHeatmap {
    cell_size: u32,
    margin: u32,
}

impl ConfusionHeatmap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell_size: 64,
            margin: 8,
        }
    }

    #[must_use]
    pub fn with_cell_size(mut self, cell_size: u32) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Draw the heatmap. Missing cells of ragged rows count as zero.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::EmptyPlot`] for an empty matrix or a zero cell size.
    pub fn render(&self, matrix: &[Vec<usize>]) -> Result<RgbImage, IoError> {
        let n = matrix.len() as u32;
        if n == 0 || self.cell_size == 0 {
            return Err(IoError::EmptyPlot {
                what: "confusion matrix",
            });
        }

        let side = 2 * self.margin + n * self.cell_size;
        let mut img = RgbImage::from_pixel(side, side, WHITE);

        for (i, row) in matrix.iter().enumerate() {
            let row_total: usize = row.iter().sum();
            for j in 0..matrix.len() {
                let count = row.get(j).copied().unwrap_or(0);
                let share = if row_total > 0 {
                    count as f64 / row_total as f64
                } else {
                    0.0
                };
                let color = if count == 0 {
                    WHITE
                } else {
                    interpolate_color(PALE_BLUE, DEEP_BLUE, share)
                };
                let x = self.margin + j as u32 * self.cell_size;
                let y = self.margin + i as u32 * self.cell_size;
                fill_rect(&mut img, x, y, self.cell_size, self.cell_size, color);
            }
        }

        // Grid.
        for k in 0..=n {
            let offset = self.margin + k * self.cell_size;
            let inner = n * self.cell_size + 1;
            fill_rect(&mut img, offset.min(side - 1), self.margin, 1, inner, LIGHT_GRAY);
            fill_rect(&mut img, self.margin, offset.min(side - 1), inner, 1, LIGHT_GRAY);
        }

        let tick_len = TICK_LEN.min(self.margin);
        for k in 0..n {
            let center = self.margin + k * self.cell_size + self.cell_size / 2;
            fill_rect(&mut img, center, self.margin - tick_len, 1, tick_len, DARK_GRAY);
            fill_rect(&mut img, self.margin - tick_len, center, tick_len, 1, DARK_GRAY);
        }
        Ok(img)
    }

    /// Draw the heatmap and save it as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::EmptyPlot`] or [`IoError::RenderPlot`].
    #[instrument(skip_all, fields(path = %path.display(), n_classes = matrix.len()))]
    pub fn save(&self, matrix: &[Vec<usize>], path: &Path) -> Result<(), IoError> {
        let img = self.render(matrix)?;
        save_png(&img, path)?;
        info!(side = img.width(), "confusion heatmap written");
        Ok(())
    }
}

impl Default for ConfusionHeatmap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::fixtures;
    use tempfile::TempDir;

    #[test]
    fn color_interpolation_endpoints() {
        assert_eq!(interpolate_color(WHITE, DEEP_BLUE, 0.0), WHITE);
        assert_eq!(interpolate_color(WHITE, DEEP_BLUE, 1.0), DEEP_BLUE);
        assert_eq!(interpolate_color(WHITE, DEEP_BLUE, 7.0), DEEP_BLUE);
        assert_eq!(
            interpolate_color(Rgb([0, 0, 0]), Rgb([200, 100, 50]), 0.5),
            Rgb([100, 50, 25])
        );
    }

    #[test]
    fn importance_bars_scale_with_importance() {
        let chart = ImportanceChart::new().with_width(112);
        let rows = fixtures::model("random forest", 0.9).importances;
        let img = chart.render(&rows).unwrap();

        // 2 bars of 18 px, 1 gap of 6 px, 12 px margins.
        assert_eq!(img.dimensions(), (112, 2 * 12 + 2 * 18 + 6));

        // Top bar spans the full 88 px, second bar 0.3 / 0.7 of it.
        let top_y = 12 + 9;
        let second_y = 12 + 18 + 6 + 9;
        assert_ne!(*img.get_pixel(12 + 87, top_y), WHITE);
        assert_eq!(*img.get_pixel(12 + 87, second_y), WHITE);
        assert_ne!(*img.get_pixel(12 + 37, second_y), WHITE);
        assert_eq!(*img.get_pixel(12 + 39, second_y), WHITE);
    }

    #[test]
    fn importance_ticks_mark_bars_and_quarters() {
        let chart = ImportanceChart::new().with_width(112);
        let rows = fixtures::model("random forest", 0.9).importances;
        let img = chart.render(&rows).unwrap();

        // One tick left of the axis per bar, at the bar's middle row.
        assert_eq!(*img.get_pixel(8, 12 + 9), DARK_GRAY);
        assert_eq!(*img.get_pixel(8, 12 + 18 + 6 + 9), DARK_GRAY);
        assert_eq!(*img.get_pixel(8, 12 + 18 + 3), WHITE);

        // Quarter ticks below the bars: 88 px span.
        let below = img.height() - 12 + 2;
        for x in [12 + 21, 12 + 43, 12 + 65, 12 + 87] {
            assert_eq!(*img.get_pixel(x, below), DARK_GRAY, "x = {x}");
        }
        assert_eq!(*img.get_pixel(12 + 30, below), WHITE);
    }

    #[test]
    fn heatmap_ticks_center_on_classes() {
        let img = ConfusionHeatmap::new()
            .with_cell_size(10)
            .render(&[vec![9, 1], vec![0, 5]])
            .unwrap();
        for k in 0..2 {
            let center = 8 + k * 10 + 5;
            assert_eq!(*img.get_pixel(center, 6), DARK_GRAY);
            assert_eq!(*img.get_pixel(6, center), DARK_GRAY);
        }
        assert_eq!(*img.get_pixel(8 + 2, 6), WHITE);
    }

    #[test]
    fn importance_chart_respects_top_n() {
        let chart = ImportanceChart::new().with_top_n(1);
        let rows = fixtures::model("random forest", 0.9).importances;
        let img = chart.render(&rows).unwrap();
        assert_eq!(img.height(), 2 * 12 + 18);
    }

    #[test]
    fn empty_importances_rejected() {
        let err = ImportanceChart::new().render(&[]).unwrap_err();
        assert!(matches!(err, IoError::EmptyPlot { .. }));
    }

    #[test]
    fn heatmap_diagonal_is_darkest() {
        let heatmap = ConfusionHeatmap::new().with_cell_size(10);
        let img = heatmap.render(&[vec![9, 1], vec![0, 5]]).unwrap();
        assert_eq!(img.dimensions(), (36, 36));

        let center = |i: u32, j: u32| *img.get_pixel(8 + j * 10 + 5, 8 + i * 10 + 5);
        assert_eq!(center(1, 0), WHITE);
        assert_eq!(center(1, 1), DEEP_BLUE);
        let dark = |c: Rgb<u8>| u32::from(c[0]) + u32::from(c[1]) + u32::from(c[2]);
        assert!(dark(center(0, 0)) < dark(center(0, 1)));
    }

    #[test]
    fn empty_matrix_rejected() {
        let err = ConfusionHeatmap::new().render(&[]).unwrap_err();
        assert!(matches!(err, IoError::EmptyPlot { what: "confusion matrix" }));
    }

    #[test]
    fn plots_saved_as_png() {
        let dir = TempDir::new().unwrap();
        let bars = dir.path().join("pml_importance.png");
        let cells = dir.path().join("pml_confusion.png");
        ImportanceChart::new()
            .save(&fixtures::model("decision tree", 0.8).importances, &bars)
            .unwrap();
        ConfusionHeatmap::new()
            .save(&[vec![3, 0], vec![1, 2]], &cells)
            .unwrap();

        let decoded = image::open(&bars).unwrap().to_rgb8();
        assert_eq!(decoded.width(), 640);
        assert!(image::open(&cells).is_ok());
    }

    #[test]
    fn unwritable_path_is_render_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("plot.png");
        let err = ConfusionHeatmap::new().save(&[vec![1]], &path).unwrap_err();
        assert!(matches!(err, IoError::RenderPlot { .. }));
    }
}
