//! Console summary of the finalized histograms.

use std::fmt::Write;
use std::path::Path;

use ns_frame::AnalysisResult;

/// Render the run summary: output path, event count, then mean/rms per histogram.
pub fn render(output: &Path, n_events: usize, result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Wrote {} with {} events.", output.display(), n_events);
    let labels = ["Mass", "Pt", "Rap", "ΔE"];
    for (label, h) in labels.iter().zip(result.histograms()) {
        let _ = writeln!(out, "{label} mean={} rms={}", h.mean(), h.rms());
    }
    out
}
