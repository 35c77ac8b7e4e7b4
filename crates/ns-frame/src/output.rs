//! Histogram output containers.
//!
//! [`JsonContainer`] writes a single JSON document:
//!
//! ```text
//! {
//!   "format": "ns-frame-histograms",
//!   "version": 1,
//!   "objects": [ { "key": "h_mass", "title": ..., "bin_counts": [...], ... }, ... ]
//! }
//! ```
//!
//! Objects keep insertion order. Non-finite statistics (mean/rms of an empty
//! histogram, sums that overflowed `f64`) are written as `null`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};
use crate::histogram::Histogram1D;

/// Container format tag.
pub const CONTAINER_FORMAT: &str = "ns-frame-histograms";
/// Container format version.
pub const CONTAINER_VERSION: u32 = 1;

/// Sink for finalized histograms.
pub trait HistogramWriter {
    /// Store `histogram` under `name`.
    fn write(&mut self, name: &str, histogram: &Histogram1D) -> Result<()>;

    /// Finalize the container.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// One stored histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHistogram {
    /// Container key.
    pub key: String,
    /// Histogram title.
    pub title: String,
    /// X axis label.
    pub x_label: String,
    /// Y axis label.
    pub y_label: String,
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub x_min: f64,
    /// Upper edge of the last bin.
    pub x_max: f64,
    /// Bin edges (length `n_bins + 1`).
    pub bin_edges: Vec<f64>,
    /// Per-bin counts.
    pub bin_counts: Vec<u64>,
    /// Underflow count.
    pub underflow: u64,
    /// Overflow count.
    pub overflow: u64,
    /// Non-finite entries.
    pub non_finite: u64,
    /// Total entries.
    pub entries: u64,
    /// Sum of finite values (null when it overflowed).
    pub sum: Option<f64>,
    /// Sum of squares of finite values (null when it overflowed).
    pub sum_sq: Option<f64>,
    /// Mean (null when undefined).
    pub mean: Option<f64>,
    /// RMS (null when undefined).
    pub rms: Option<f64>,
}

impl StoredHistogram {
    fn from_histogram(key: &str, h: &Histogram1D) -> Self {
        let finite = |x: f64| if x.is_finite() { Some(x) } else { None };
        Self {
            key: key.to_string(),
            title: h.title().to_string(),
            x_label: h.x_label().to_string(),
            y_label: h.y_label().to_string(),
            n_bins: h.n_bins(),
            x_min: h.x_min(),
            x_max: h.x_max(),
            bin_edges: h.bin_edges(),
            bin_counts: h.bin_counts().to_vec(),
            underflow: h.underflow(),
            overflow: h.overflow(),
            non_finite: h.non_finite(),
            entries: h.entries(),
            sum: finite(h.sum()),
            sum_sq: finite(h.sum_sq()),
            mean: finite(h.mean()),
            rms: finite(h.rms()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ContainerDocument {
    format: String,
    version: u32,
    objects: Vec<StoredHistogram>,
}

/// JSON histogram container, opened in create/overwrite mode.
pub struct JsonContainer {
    path: PathBuf,
    writer: BufWriter<File>,
    objects: Vec<StoredHistogram>,
}

impl JsonContainer {
    /// Create (or truncate) the container file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            FrameError::Persistence(format!("cannot create {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "opened histogram container");
        Ok(Self { path, writer: BufWriter::new(file), objects: Vec::new() })
    }

    /// Path of the container file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every histogram stored in a container file.
    pub fn read(path: impl AsRef<Path>) -> Result<Vec<StoredHistogram>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            FrameError::Persistence(format!("cannot read {}: {e}", path.display()))
        })?;
        let doc: ContainerDocument = serde_json::from_slice(&bytes).map_err(|e| {
            FrameError::Persistence(format!("malformed container {}: {e}", path.display()))
        })?;
        if doc.format != CONTAINER_FORMAT {
            return Err(FrameError::Persistence(format!(
                "{}: unexpected container format '{}'",
                path.display(),
                doc.format
            )));
        }
        Ok(doc.objects)
    }
}

impl HistogramWriter for JsonContainer {
    fn write(&mut self, name: &str, histogram: &Histogram1D) -> Result<()> {
        if !histogram.is_finalized() {
            return Err(FrameError::Persistence(format!(
                "histogram '{}' is not finalized",
                histogram.name()
            )));
        }
        if self.objects.iter().any(|o| o.key == name) {
            return Err(FrameError::Persistence(format!(
                "key '{name}' already written to {}",
                self.path.display()
            )));
        }
        self.objects.push(StoredHistogram::from_histogram(name, histogram));
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        let doc = ContainerDocument {
            format: CONTAINER_FORMAT.to_string(),
            version: CONTAINER_VERSION,
            objects: std::mem::take(&mut self.objects),
        };
        let path = self.path;
        let fail = |e: &dyn std::fmt::Display| {
            FrameError::Persistence(format!("cannot write {}: {e}", path.display()))
        };

        serde_json::to_writer_pretty(&mut self.writer, &doc).map_err(|e| fail(&e))?;
        self.writer.write_all(b"\n").map_err(|e| fail(&e))?;
        let file = self.writer.into_inner().map_err(|e| fail(&e))?;
        file.sync_all().map_err(|e| fail(&e))?;

        tracing::info!(path = %path.display(), objects = doc.objects.len(), "closed histogram container");
        Ok(())
    }
}
