//! Self-contained interactive HTML report.
//!
//! The document needs no network access: the chart is an inline SVG, the raw
//! arrays are embedded as JSON and a short inline script shows the sample under
//! the cursor.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::fmt::Write as _;
use std::path::Path;

use chrono::Local;
use memtrail_core::{Error, Result, Series, SeriesSummary};
use tracing::info;

use crate::output::{require_samples, write_atomic};

/// SVG viewport
const CHART_WIDTH: f64 = 1000.0;
const CHART_HEIGHT: f64 = 400.0;
const CHART_PAD: f64 = 40.0;

const STYLE: &str = r"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
       background: #0d1117; color: #c9d1d9; padding: 2rem; }
.container { max-width: 1200px; margin: 0 auto; }
h1, h2 { color: #58a6ff; margin-bottom: 0.5rem; }
.meta { color: #8b949e; margin-bottom: 2rem; font-size: 0.9rem; }
.stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
         gap: 1rem; margin-bottom: 2rem; }
.stat-card { background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; }
.stat-label { color: #8b949e; font-size: 0.875rem; margin-bottom: 0.25rem; }
.stat-value { color: #58a6ff; font-size: 1.5rem; font-weight: 600; }
#chart { width: 100%; background: #161b22; border: 1px solid #30363d; border-radius: 6px; }
#readout { color: #8b949e; margin: 0.5rem 0 2rem; min-height: 1.2rem; }
table { width: 100%; border-collapse: collapse; background: #161b22; border: 1px solid #30363d; }
th, td { padding: 0.75rem; text-align: left; border-bottom: 1px solid #30363d; }
th { background: #0d1117; color: #58a6ff; }
.up { color: #f85149; } .down { color: #3fb950; } .flat { color: #8b949e; }
";

const SCRIPT: &str = r"
const chart = document.getElementById('chart');
const marker = document.getElementById('marker');
const readout = document.getElementById('readout');
chart.addEventListener('mousemove', (event) => {
  const box = chart.getBoundingClientRect();
  const x = (event.clientX - box.left) / box.width * VIEW.width;
  let best = 0;
  for (let i = 1; i < POINTS.length; i++) {
    if (Math.abs(POINTS[i][0] - x) < Math.abs(POINTS[best][0] - x)) { best = i; }
  }
  marker.setAttribute('cx', POINTS[best][0]);
  marker.setAttribute('cy', POINTS[best][1]);
  marker.setAttribute('visibility', 'visible');
  readout.textContent = DATA.timestamps[best].toFixed(2) + ' s  →  ' +
    DATA.memories[best].toFixed(2) + ' MB';
});
";

/// Export a series as an interactive HTML report.
///
/// # Errors
///
/// Returns error if:
/// - The series is empty (`EmptyInput`)
/// - The destination cannot be written (`IoFailure`)
pub fn export_html(series: &Series, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    require_samples(series)?;
    let document = render_html(series)?;

    write_atomic(path, |w| w.write_all(document.as_bytes()))?;

    info!(path = %path.display(), samples = series.len(), "Interactive HTML report exported");
    Ok(())
}

/// Render the report document for a non-empty series.
///
/// # Errors
///
/// Returns error if the series is empty or the embedded data cannot be serialized
pub fn render_html(series: &Series) -> Result<String> {
    let summary = series.summary().ok_or(Error::EmptyInput)?;
    let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let points = chart_points(series, &summary);

    let data = serde_json::json!({
        "timestamps": series.timestamps(),
        "memories": series.footprints(),
        "deltas": series.deltas(),
        "summary": summary,
    });
    let data = serde_json::to_string(&data).map_err(|e| Error::Serialization(e.to_string()))?;
    let point_data =
        serde_json::to_string(&points).map_err(|e| Error::Serialization(e.to_string()))?;

    let mut html = String::with_capacity(8 * 1024 + series.len() * 160);
    render_document(&mut html, series, &summary, &generated, &points, &data, &point_data)
        .map_err(Error::render)?;
    Ok(html)
}

fn render_document(
    html: &mut String,
    series: &Series,
    summary: &SeriesSummary,
    generated: &str,
    points: &[(f64, f64)],
    data: &str,
    point_data: &str,
) -> std::fmt::Result {
    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"en\">\n<head>")?;
    writeln!(html, "<meta charset=\"UTF-8\">")?;
    writeln!(
        html,
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">"
    )?;
    writeln!(html, "<title>Memory Profile Report - {generated}</title>")?;
    writeln!(html, "<style>{STYLE}</style>\n</head>\n<body>")?;
    writeln!(html, "<div class=\"container\">")?;
    writeln!(html, "<h1>Memory Profile Report</h1>")?;
    writeln!(html, "<div class=\"meta\">Generated at {generated}</div>")?;

    writeln!(html, "<div class=\"stats\">")?;
    for (label, value) in [
        ("Peak Memory", format!("{:.2} MB", summary.peak)),
        ("Average Memory", format!("{:.2} MB", summary.average)),
        ("Min Memory", format!("{:.2} MB", summary.minimum)),
        ("Duration", format!("{:.2} s", summary.duration)),
        ("Samples", summary.sample_count.to_string()),
    ] {
        writeln!(
            html,
            "<div class=\"stat-card\"><div class=\"stat-label\">{label}</div>\
             <div class=\"stat-value\">{value}</div></div>"
        )?;
    }
    writeln!(html, "</div>")?;

    write_chart(html, points)?;
    writeln!(html, "<div id=\"readout\"></div>")?;

    writeln!(html, "<h2>Memory Timeline</h2>")?;
    writeln!(
        html,
        "<table>\n<thead><tr><th>Timestamp (s)</th><th>Memory (MB)</th><th>Delta (MB)</th></tr></thead>\n<tbody>"
    )?;
    for (sample, delta) in series.iter().zip(series.deltas()) {
        let class = if delta > 0.0 {
            "up"
        } else if delta < 0.0 {
            "down"
        } else {
            "flat"
        };
        writeln!(
            html,
            "<tr><td>{:.2}</td><td>{:.2}</td><td class=\"{class}\">{delta:+.2}</td></tr>",
            sample.timestamp(),
            sample.footprint_mb()
        )?;
    }
    writeln!(html, "</tbody>\n</table>\n</div>")?;

    writeln!(html, "<script>")?;
    writeln!(html, "const DATA = {data};")?;
    writeln!(html, "const POINTS = {point_data};")?;
    writeln!(
        html,
        "const VIEW = {{ width: {CHART_WIDTH}, height: {CHART_HEIGHT} }};"
    )?;
    writeln!(html, "{SCRIPT}</script>\n</body>\n</html>")
}

fn write_chart(html: &mut String, points: &[(f64, f64)]) -> std::fmt::Result {
    writeln!(
        html,
        "<svg id=\"chart\" viewBox=\"0 0 {CHART_WIDTH} {CHART_HEIGHT}\" preserveAspectRatio=\"none\">"
    )?;
    for i in 0..=4_u32 {
        let y = CHART_PAD + (CHART_HEIGHT - 2.0 * CHART_PAD) * f64::from(i) / 4.0;
        writeln!(
            html,
            "<line x1=\"{CHART_PAD}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#30363d\"/>",
            CHART_WIDTH - CHART_PAD
        )?;
    }
    let polyline = points
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(
        html,
        "<polyline points=\"{polyline}\" fill=\"none\" stroke=\"#58a6ff\" stroke-width=\"2\"/>"
    )?;
    for (x, y) in points {
        writeln!(
            html,
            "<circle cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"3\" fill=\"#58a6ff\"/>"
        )?;
    }
    writeln!(
        html,
        "<circle id=\"marker\" r=\"6\" fill=\"none\" stroke=\"#f0f6fc\" visibility=\"hidden\"/>"
    )?;
    writeln!(html, "</svg>")
}

/// Map samples into SVG viewport coordinates
fn chart_points(series: &Series, summary: &SeriesSummary) -> Vec<(f64, f64)> {
    let plot_width = CHART_WIDTH - 2.0 * CHART_PAD;
    let plot_height = CHART_HEIGHT - 2.0 * CHART_PAD;
    let x_span = if summary.duration > 0.0 {
        summary.duration
    } else {
        1.0
    };
    let y_span = summary.peak - summary.minimum;

    series
        .iter()
        .map(|s| {
            let x = CHART_PAD + s.timestamp() / x_span * plot_width;
            let y = if y_span > f64::EPSILON {
                CHART_PAD + plot_height - (s.footprint_mb() - summary.minimum) / y_span * plot_height
            } else {
                CHART_PAD + plot_height / 2.0
            };
            (x, y)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use memtrail_core::Sample;

    fn sample_series() -> Series {
        vec![
            Sample::new(0.0, 23.1),
            Sample::new(1.0, 130.5),
            Sample::new(2.0, 135.2),
        ]
        .into()
    }

    #[test]
    fn test_render_embeds_data_and_summary() {
        let html = render_html(&sample_series()).unwrap();

        assert!(html.contains("\"timestamps\":[0.0,1.0,2.0]"));
        assert!(html.contains("\"memories\":[23.1,130.5,135.2]"));
        assert!(html.contains("135.20 MB"));
        assert!(html.contains("23.10 MB"));
        assert!(html.contains("2.00 s"));
        assert!(html.contains("<td class=\"flat\">+0.00</td>"));
        assert!(html.contains("<td class=\"up\">+107.40</td>"));
        assert!(!html.contains("https://"));
    }

    #[test]
    fn test_chart_points_stay_in_viewport() {
        let series = sample_series();
        let summary = series.summary().unwrap();
        for (x, y) in chart_points(&series, &summary) {
            assert!((0.0..=CHART_WIDTH).contains(&x));
            assert!((0.0..=CHART_HEIGHT).contains(&y));
        }
    }

    #[test]
    fn test_single_sample_is_centered() {
        let series: Series = vec![Sample::new(0.0, 42.0)].into();
        let summary = series.summary().unwrap();
        let points = chart_points(&series, &summary);

        assert_eq!(points.len(), 1);
        assert!((points[0].1 - CHART_HEIGHT / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_export_html_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");

        assert_eq!(export_html(&Series::new(), &path), Err(Error::EmptyInput));
        assert!(!path.exists());
    }
}
