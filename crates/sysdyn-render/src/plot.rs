//! Time-series plot of simulation results.

use plotters::prelude::*;
use tracing::debug;

use sysdyn_common::error::{Result, SdError};
use sysdyn_engine::SimulationResults;

/// Render every recorded column against time into a PNG.
pub fn render_results_png(
    results: &SimulationResults,
    title: &str,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    if results.is_empty() {
        return Err(SdError::Render("no simulation rows to plot".to_string()));
    }

    let (x_min, x_max) = padded_range(results.time.iter().copied());
    let (y_min, y_max) = padded_range(
        results
            .columns
            .values()
            .flat_map(|col| col.iter().copied())
            .filter(|v| v.is_finite()),
    );

    let file = tempfile::Builder::new()
        .prefix("sysdyn-plot-")
        .suffix(".png")
        .tempfile()?;
    let path = file.path().to_path_buf();

    {
        let root = BitMapBackend::new(&path, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(56)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .x_desc("Time")
            .label_style(("sans-serif", 13))
            .draw()
            .map_err(render_err)?;

        for (idx, (name, column)) in results.columns.iter().enumerate() {
            let color = Palette99::pick(idx).to_rgba();
            let series = results
                .time
                .iter()
                .zip(column.iter())
                .filter(|(_, v)| v.is_finite())
                .map(|(t, v)| (*t, *v));
            chart
                .draw_series(LineSeries::new(series, color.stroke_width(2)))
                .map_err(render_err)?
                .label(name.clone())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
                });
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK.mix(0.4))
            .label_font(("sans-serif", 13))
            .draw()
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
    }

    let bytes = std::fs::read(&path)?;
    debug!(bytes = bytes.len(), "rendered results plot");
    Ok(bytes)
}

/// Min/max with a margin; degenerate ranges widen to stay drawable.
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

fn render_err<E: std::fmt::Display>(err: E) -> SdError {
    SdError::Render(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn sample_results() -> SimulationResults {
        let mut columns = IndexMap::new();
        columns.insert("level".to_string(), vec![100.0, 60.7, 36.8]);
        columns.insert("drain".to_string(), vec![50.0, 30.3, 18.4]);
        SimulationResults { time: vec![0.0, 1.0, 2.0], columns }
    }

    #[test]
    fn padded_range_handles_degenerate_input() {
        assert_eq!(padded_range([5.0, 5.0].into_iter()), (4.0, 6.0));
        assert_eq!(padded_range(std::iter::empty()), (0.0, 1.0));
        let (lo, hi) = padded_range([0.0, 10.0].into_iter());
        assert!(lo < 0.0 && hi > 10.0);
    }

    #[test]
    fn empty_results_are_an_error() {
        let empty = SimulationResults { time: vec![], columns: IndexMap::new() };
        assert!(render_results_png(&empty, "t", 300, 200).is_err());
    }

    #[test]
    #[ignore] // Requires system fonts for text rendering
    fn renders_a_png() {
        let bytes = render_results_png(&sample_results(), "decay", 640, 480).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
