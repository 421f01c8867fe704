use ndarray::{ArrayView2, Axis};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{GanvizError, GanvizResult};

/// How wide the shaded band around the mean curve is.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ShadeBand {
    /// Standard error of the mean, `sqrt(var / n)`.
    StdErr,
    /// Population standard deviation.
    StdDev,
    /// Student-t confidence interval at the given level, e.g. `0.95`.
    Confidence(f64),
}

/// A mean curve with per-point band bounds, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadedSeries {
    pub x: Vec<f64>,
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub label: String,
}

/// Reduce a `[runs, points]` matrix to a mean curve and ± band.
pub fn shaded_series(
    x: &[f64],
    ys: ArrayView2<'_, f64>,
    band: ShadeBand,
    label: impl Into<String>,
) -> GanvizResult<ShadedSeries> {
    let (n, points) = ys.dim();
    if n == 0 {
        return Err(GanvizError::validation("need at least one run to shade"));
    }
    if points != x.len() {
        return Err(GanvizError::shape_mismatch(format!(
            "x has {} points but each run has {points}",
            x.len()
        )));
    }

    let scale = match band {
        ShadeBand::StdErr | ShadeBand::StdDev => 1.0,
        ShadeBand::Confidence(p) => {
            if !(0.0..1.0).contains(&p) || p <= 0.0 {
                return Err(GanvizError::validation(
                    "confidence level must lie in (0, 1)",
                ));
            }
            if n < 2 {
                return Err(GanvizError::validation(
                    "confidence bands need at least two runs",
                ));
            }
            let t = StudentsT::new(0.0, 1.0, (n - 1) as f64)
                .map_err(|e| GanvizError::validation(format!("bad t-distribution: {e}")))?;
            t.inverse_cdf((1.0 + p) / 2.0)
        }
    };

    let nf = n as f64;
    let mut mean = Vec::with_capacity(points);
    let mut lower = Vec::with_capacity(points);
    let mut upper = Vec::with_capacity(points);
    for col in ys.axis_iter(Axis(1)) {
        let m = col.sum() / nf;
        let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
        let err = match band {
            ShadeBand::StdDev => var.sqrt(),
            ShadeBand::StdErr | ShadeBand::Confidence(_) => (var / nf).sqrt() * scale,
        };
        mean.push(m);
        lower.push(m - err);
        upper.push(m + err);
    }

    Ok(ShadedSeries {
        x: x.to_vec(),
        mean,
        lower,
        upper,
        label: label.into(),
    })
}

/// Draw a shaded series onto an existing f64/f64 chart: the band as a
/// translucent polygon, the mean as a line carrying the legend label.
pub fn plot_with_shade<DB>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    series: &ShadedSeries,
    color: RGBColor,
) -> GanvizResult<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut band: Vec<(f64, f64)> = series
        .x
        .iter()
        .zip(&series.upper)
        .map(|(&x, &y)| (x, y))
        .collect();
    band.extend(
        series
            .x
            .iter()
            .zip(&series.lower)
            .rev()
            .map(|(&x, &y)| (x, y)),
    );

    chart
        .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2))))
        .map_err(|e| GanvizError::render(format!("failed to draw shade band: {e}")))?;

    let line_color = color;
    chart
        .draw_series(LineSeries::new(
            series.x.iter().zip(&series.mean).map(|(&x, &y)| (x, y)),
            &color,
        ))
        .map_err(|e| GanvizError::render(format!("failed to draw mean line: {e}")))?
        .label(&series.label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line_color));

    Ok(())
}
