#![cfg(feature = "web")]
use crate::dashboard::{ViewKind, format_thousands};
use crate::error::{DashboardError, Result};
use crate::ranking::Metric;
use crate::summary::ItemSummary;
use plotters::coord::ranged1d::SegmentValue;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::io::Cursor;

/// Longest item name printed on the category axis.
const MAX_LABEL_CHARS: usize = 28;

/// Tallest chart a pixel buffer is allocated for.
const MAX_HEIGHT: u32 = 16_384;

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for DashboardError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        DashboardError::Chart(err.to_string())
    }
}

/// Configuration options for bar chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Vertical space per bar in pixels
    pub bar_height: u32,

    /// Smallest chart height in pixels, used for short lists
    pub min_height: u32,

    /// Bar fill colour
    pub color: RGBColor,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            width: 1000,
            bar_height: 22,
            min_height: 320,
            color: RGBColor(49, 130, 189),
        }
    }
}

impl ChartOptions {
    /// Options for one of the dashboard views, coloured per view.
    pub fn for_view(kind: ViewKind, top_n: usize) -> Self {
        let color = match kind {
            ViewKind::TopSales => RGBColor(49, 130, 189),
            ViewKind::TopProfit => RGBColor(49, 163, 84),
            ViewKind::TopQty => RGBColor(230, 85, 13),
            ViewKind::HighQtyLowProfit => RGBColor(222, 45, 38),
        };
        Self {
            title: kind.title(top_n),
            color,
            ..Self::default()
        }
    }

    /// Chart height for `bars` bars.
    ///
    /// # Arguments
    /// * `bars` - Number of bars to fit
    ///
    /// # Returns
    /// * `Result<u32>` - Height in pixels, at least `min_height`, or a chart
    ///   error when the bars would need more than `MAX_HEIGHT` pixels
    pub fn height_for(&self, bars: usize) -> Result<u32> {
        let height = (bars as u64)
            .checked_mul(u64::from(self.bar_height))
            .and_then(|h| h.checked_add(80))
            .filter(|h| *h <= u64::from(MAX_HEIGHT))
            .ok_or_else(|| {
                DashboardError::Chart(format!(
                    "{} bars do not fit in a {} px chart",
                    bars, MAX_HEIGHT
                ))
            })?;
        Ok((height as u32).max(self.min_height))
    }
}

/// Value axis range: always includes zero, leaves room on the right for
/// the value labels and never collapses to an empty span.
fn value_axis(values: &[f64]) -> (f64, f64) {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (mut lo, mut hi) = finite.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));

    let span = hi - lo;
    if span == 0.0 {
        return (lo, lo + 1.0);
    }
    hi += span * 0.15;
    if lo < 0.0 {
        lo -= span * 0.05;
    }
    (lo, hi)
}

fn truncate_label(name: &str) -> String {
    if name.chars().count() <= MAX_LABEL_CHARS {
        return name.to_string();
    }
    let mut short: String = name.chars().take(MAX_LABEL_CHARS - 1).collect();
    short.push('…');
    short
}

/// Encode an RGB pixel buffer as PNG.
fn encode_png(pixels: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let image = image::RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| DashboardError::Chart("pixel buffer size mismatch".to_string()))?;
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, image::ImageOutputFormat::Png)
        .map_err(|e| DashboardError::Chart(e.to_string()))?;
    Ok(png.into_inner())
}

/// Render a horizontal bar chart of `rows` by `metric` as PNG.
///
/// One bar per item, first row at the top, each bar labelled with its
/// value. An empty slice renders a "No data" placeholder.
///
/// # Examples
/// ```no_run
/// use sales_dashboard::dashboard::ViewKind;
/// use sales_dashboard::graph::{ChartOptions, render_bar_chart};
/// use sales_dashboard::ranking::Metric;
///
/// let options = ChartOptions::for_view(ViewKind::TopSales, 50);
/// let png = render_bar_chart(&[], Metric::TotalSales, &options).unwrap();
/// std::fs::write("top_sales.png", png).unwrap();
/// ```
pub fn render_bar_chart(
    rows: &[ItemSummary],
    metric: Metric,
    options: &ChartOptions,
) -> Result<Vec<u8>> {
    let width = options.width;
    let height = options.height_for(rows.len())?;
    let buffer_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| DashboardError::Chart(format!("{}x{} chart is too large", width, height)))?;
    let mut pixels = vec![0u8; buffer_len];

    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        if rows.is_empty() {
            let style = TextStyle::from(("sans-serif", 24).into_font())
                .pos(Pos::new(HPos::Center, VPos::Center));
            root.draw(&Text::new(
                "No data",
                (width as i32 / 2, height as i32 / 2),
                style,
            ))?;
            root.present()?;
        } else {
            let bars = rows.len() as i32;
            let values: Vec<f64> = rows.iter().map(|row| row.metric(metric)).collect();
            let (lo, hi) = value_axis(&values);
            let names: Vec<String> = rows.iter().map(|row| truncate_label(&row.item_name)).collect();

            // Slot 0 is the bottom of the plot, so rank r lives in slot bars - 1 - r.
            let label_for = |slot: &SegmentValue<i32>| match slot {
                SegmentValue::CenterOf(s) | SegmentValue::Exact(s) => names
                    .get((bars - 1 - *s) as usize)
                    .cloned()
                    .unwrap_or_default(),
                SegmentValue::Last => String::new(),
            };

            let mut chart = ChartBuilder::on(&root)
                .caption(&options.title, ("sans-serif", 24).into_font())
                .margin(10)
                .x_label_area_size(30)
                .y_label_area_size(220)
                .build_cartesian_2d(lo..hi, (0..bars).into_segmented())?;

            chart
                .configure_mesh()
                .disable_y_mesh()
                .y_labels(rows.len())
                .y_label_formatter(&label_for)
                .x_label_formatter(&|x| format_thousands(*x))
                .x_desc(metric.column())
                .draw()?;

            chart.draw_series(values.iter().enumerate().map(|(rank, &value)| {
                let slot = bars - 1 - rank as i32;
                let value = if value.is_finite() { value } else { 0.0 };
                let mut bar = Rectangle::new(
                    [
                        (value.min(0.0), SegmentValue::Exact(slot + 1)),
                        (value.max(0.0), SegmentValue::Exact(slot)),
                    ],
                    options.color.filled(),
                );
                bar.set_margin(2, 2, 0, 0);
                bar
            }))?;

            let label_style = TextStyle::from(("sans-serif", 12).into_font())
                .pos(Pos::new(HPos::Left, VPos::Center));
            chart.draw_series(values.iter().enumerate().map(|(rank, &value)| {
                let slot = bars - 1 - rank as i32;
                Text::new(
                    format!(" {}", format_thousands(value)),
                    (value.max(0.0), SegmentValue::CenterOf(slot)),
                    label_style.clone(),
                )
            }))?;

            root.present()?;
        }
    }

    encode_png(pixels, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_axis_includes_zero_and_headroom() {
        let (lo, hi) = value_axis(&[10.0, 100.0]);
        assert_eq!(lo, 0.0);
        assert!((hi - 115.0).abs() < 1e-9);

        let (lo, hi) = value_axis(&[-50.0, 50.0]);
        assert!(lo < -50.0);
        assert!(hi > 50.0);
    }

    #[test]
    fn value_axis_never_collapses() {
        assert_eq!(value_axis(&[]), (0.0, 1.0));
        assert_eq!(value_axis(&[0.0, 0.0]), (0.0, 1.0));
        assert_eq!(value_axis(&[f64::NAN]), (0.0, 1.0));
    }

    fn item(name: &str, profit: f64) -> ItemSummary {
        ItemSummary {
            item_code: name.to_uppercase(),
            item_name: name.to_string(),
            qty_sold: 1.0,
            total_sales: 10.0,
            total_profit: profit,
            gp_pct: profit * 10.0,
        }
    }

    fn is_png(bytes: &[u8]) -> bool {
        bytes.starts_with(&[0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn chart_grows_with_bar_count() {
        let options = ChartOptions::default();
        assert_eq!(options.height_for(0).unwrap(), options.min_height);
        assert_eq!(options.height_for(50).unwrap(), 80 + 50 * options.bar_height);
    }

    #[test]
    fn oversized_chart_is_an_error() {
        let options = ChartOptions::default();
        assert!(matches!(options.height_for(70_000), Err(DashboardError::Chart(_))));
        assert!(matches!(options.height_for(usize::MAX), Err(DashboardError::Chart(_))));

        let rows = vec![item("apples", 1.0); 70_000];
        assert!(render_bar_chart(&rows, Metric::TotalProfit, &options).is_err());
    }

    #[test]
    fn renders_bars_with_negative_values() {
        let rows = vec![item("Apples", -6.0), item("Bananas", 5.0)];
        let options = ChartOptions::for_view(ViewKind::TopProfit, 50);
        let png = render_bar_chart(&rows, Metric::TotalProfit, &options).unwrap();
        assert!(is_png(&png));
    }

    #[test]
    fn renders_placeholder_for_empty_input() {
        let options = ChartOptions::for_view(ViewKind::HighQtyLowProfit, 50);
        let png = render_bar_chart(&[], Metric::QtySold, &options).unwrap();
        assert!(is_png(&png));
    }

    #[test]
    fn long_labels_are_truncated() {
        assert_eq!(truncate_label("Apples"), "Apples");
        let long = "A very long product description that goes on";
        let short = truncate_label(long);
        assert_eq!(short.chars().count(), MAX_LABEL_CHARS);
        assert!(short.ends_with('…'));
    }

    #[test]
    fn png_encoding_checks_buffer_size() {
        let png = encode_png(vec![255; 4 * 3 * 3], 4, 3).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        assert!(encode_png(vec![0; 5], 4, 3).is_err());
    }

    #[test]
    fn view_options_carry_title() {
        let options = ChartOptions::for_view(ViewKind::TopQty, 50);
        assert_eq!(options.title, "Top 50 Items by Quantity Sold");
    }
}
