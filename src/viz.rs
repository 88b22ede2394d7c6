//! Figure generation using plotters.
//!
//! The backend follows the file extension: `.svg` renders through the SVG
//! backend with captions, axis labels and a legend; anything else renders a
//! PNG bitmap. Bitmaps carry no text because the crate is built without a
//! font backend.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use crate::data::Position;
use crate::error::{Result, TrafficError};
use crate::train::TrainingHistory;

/// Default file for [`plot_training_progress`].
pub const TRAINING_PLOT: &str = "training_progress.png";

/// Default file for [`plot_predictions`].
pub const PREDICTION_PLOT: &str = "traffic_predictions.png";

const TRAINING_SIZE: (u32, u32) = (1200, 400);
const PREDICTION_SIZE: (u32, u32) = (1200, 800);

/// `RdYlGn` color stops, reversed so low congestion is green.
const RD_YL_GN_R: [(u8, u8, u8); 11] = [
    (0, 104, 55),
    (26, 152, 80),
    (102, 189, 99),
    (166, 217, 106),
    (217, 239, 139),
    (255, 255, 191),
    (254, 224, 139),
    (253, 174, 97),
    (244, 109, 67),
    (215, 48, 39),
    (165, 0, 38),
];

type DrawResult<DB> = std::result::Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

fn plot_error<E: std::fmt::Display>(e: E) -> TrafficError {
    TrafficError::Plot(e.to_string())
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Render loss and test-accuracy curves side by side.
///
/// # Errors
///
/// [`TrafficError::Plot`] when rendering or writing the image fails.
pub fn plot_training_progress<P: AsRef<Path>>(history: &TrainingHistory, path: P) -> Result<()> {
    let path = path.as_ref();
    if is_svg(path) {
        let root = SVGBackend::new(path, TRAINING_SIZE).into_drawing_area();
        draw_training(&root, history, true).map_err(plot_error)?;
        root.present().map_err(plot_error)?;
    } else {
        let root = BitMapBackend::new(path, TRAINING_SIZE).into_drawing_area();
        draw_training(&root, history, false).map_err(plot_error)?;
        root.present().map_err(plot_error)?;
    }
    info!(path = %path.display(), "saved training plot");
    Ok(())
}

/// Scatter intersections by position, colored by predicted level.
///
/// # Errors
///
/// [`TrafficError::Plot`] when the counts differ or rendering fails.
pub fn plot_predictions<P: AsRef<Path>>(
    positions: &[Position],
    predictions: &[usize],
    path: P,
) -> Result<()> {
    if positions.len() != predictions.len() {
        return Err(TrafficError::Plot(format!(
            "{} positions for {} predictions",
            positions.len(),
            predictions.len()
        )));
    }

    let path = path.as_ref();
    if is_svg(path) {
        let root = SVGBackend::new(path, PREDICTION_SIZE).into_drawing_area();
        draw_predictions(&root, positions, predictions, true).map_err(plot_error)?;
        root.present().map_err(plot_error)?;
    } else {
        let root = BitMapBackend::new(path, PREDICTION_SIZE).into_drawing_area();
        draw_predictions(&root, positions, predictions, false).map_err(plot_error)?;
        root.present().map_err(plot_error)?;
    }
    info!(path = %path.display(), nodes = predictions.len(), "saved prediction map");
    Ok(())
}

fn draw_training<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    history: &TrainingHistory,
    labeled: bool,
) -> DrawResult<DB> {
    root.fill(&WHITE)?;
    let (left, right) = root.split_horizontally(TRAINING_SIZE.0 / 2);

    let losses: Vec<f64> = history.train_losses.iter().map(|&l| f64::from(l)).collect();
    draw_curve(
        &left,
        &losses,
        padded_range(&losses),
        &BLUE,
        labeled.then_some(("Training Loss over Time", "Loss", "Training Loss")),
    )?;
    draw_curve(
        &right,
        &history.test_accuracies,
        (0.0, 1.0),
        &RED,
        labeled.then_some(("Test Accuracy over Time", "Accuracy", "Test Accuracy")),
    )
}

/// One per-epoch series; `labels` is `(caption, y axis, legend)`.
fn draw_curve<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    values: &[f64],
    (y_min, y_max): (f64, f64),
    color: &RGBColor,
    labels: Option<(&str, &str, &str)>,
) -> DrawResult<DB> {
    let x_max = values.len().max(1) as f64;
    let mut builder = ChartBuilder::on(area);
    builder.margin(20);
    if let Some((caption, _, _)) = labels {
        builder
            .caption(caption, ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut chart = builder.build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    let series = chart.draw_series(LineSeries::new(
        values.iter().enumerate().map(|(i, &v)| (i as f64, v)),
        color,
    ))?;

    if let Some((_, y_desc, legend)) = labels {
        let color = *color;
        series
            .label(legend)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], ShapeStyle::from(&color))
            });
        chart
            .configure_mesh()
            .x_desc("Epoch")
            .y_desc(y_desc)
            .draw()?;
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_predictions<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    positions: &[Position],
    predictions: &[usize],
    labeled: bool,
) -> DrawResult<DB> {
    root.fill(&WHITE)?;

    let longitudes: Vec<f64> = positions.iter().map(|p| p.longitude).collect();
    let latitudes: Vec<f64> = positions.iter().map(|p| p.latitude).collect();
    let (x_min, x_max) = padded_range(&longitudes);
    let (y_min, y_max) = padded_range(&latitudes);
    let max_level = predictions.iter().max().copied().unwrap_or(0);

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if labeled {
        builder
            .caption("Traffic Congestion Predictions", ("sans-serif", 24))
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    if labeled {
        chart
            .configure_mesh()
            .x_desc("Longitude")
            .y_desc("Latitude")
            .draw()?;
    }

    for level in 0..=max_level {
        let color = level_color(level, max_level).mix(0.6);
        let points = positions
            .iter()
            .zip(predictions)
            .filter(|(_, p)| **p == level)
            .map(|(pos, _)| (pos.longitude, pos.latitude))
            .collect::<Vec<_>>();
        if points.is_empty() {
            continue;
        }
        let series = chart.draw_series(
            points
                .into_iter()
                .map(|xy| Circle::new(xy, 6, color.filled())),
        )?;
        if labeled {
            series
                .label(format!("Level {level}"))
                .legend(move |(x, y)| Circle::new((x + 10, y), 5, color.filled()));
        }
    }

    if labeled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Color for `level` on a reversed red-yellow-green scale spanning
/// `0..=max_level`.
#[must_use]
pub fn level_color(level: usize, max_level: usize) -> RGBColor {
    let t = if max_level == 0 {
        0.0
    } else {
        (level.min(max_level) as f64) / (max_level as f64)
    };
    let scaled = t * (RD_YL_GN_R.len() - 1) as f64;
    let lo = scaled.floor() as usize;
    let hi = (lo + 1).min(RD_YL_GN_R.len() - 1);
    let frac = scaled - lo as f64;

    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;
    let (a, b) = (RD_YL_GN_R[lo], RD_YL_GN_R[hi]);
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// `[min, max]` widened by 5% (or by 1 for a constant series).
fn padded_range(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return (0.0, 1.0);
    }
    let pad = if hi - lo > f64::EPSILON {
        0.05 * (hi - lo)
    } else {
        1.0
    };
    (lo - pad, hi + pad)
}
