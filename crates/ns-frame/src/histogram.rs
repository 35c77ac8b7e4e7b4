//! Fixed-binning 1D histogram accumulator.
//!
//! Binning is uniform over the half-open range `[x_min, x_max)`. Out-of-range
//! entries are counted in `underflow`/`overflow` and still contribute to the
//! running sums, so [`Histogram1D::mean`] and [`Histogram1D::rms`] reflect
//! every finite value seen.
//!
//! Non-finite values are counted in `entries` and `non_finite` and never
//! enter the running sums: `-inf` also counts as underflow, `+inf` as
//! overflow, and NaN lands in no bin at all.

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Booking parameters for one histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSpec {
    /// Histogram name (container key).
    pub name: String,
    /// Histogram title.
    pub title: String,
    /// X axis label.
    #[serde(default)]
    pub x_label: String,
    /// Y axis label.
    #[serde(default)]
    pub y_label: String,
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge of the first bin (inclusive).
    pub x_min: f64,
    /// Upper edge of the last bin (exclusive).
    pub x_max: f64,
}

impl HistogramSpec {
    /// Build a spec from a ROOT-style title, `"title;x label;y label"`.
    ///
    /// Missing label fields are left empty.
    pub fn new(
        name: impl Into<String>,
        title: &str,
        n_bins: usize,
        x_min: f64,
        x_max: f64,
    ) -> Self {
        let mut parts = title.splitn(3, ';');
        let title = parts.next().unwrap_or_default().to_string();
        let x_label = parts.next().unwrap_or_default().to_string();
        let y_label = parts.next().unwrap_or_default().to_string();
        Self { name: name.into(), title, x_label, y_label, n_bins, x_min, x_max }
    }

    /// Check binning: at least one bin, finite `x_min < x_max`.
    pub fn validate(&self) -> Result<()> {
        if self.n_bins == 0 {
            return Err(FrameError::InvalidArgument(format!(
                "histogram '{}' needs at least one bin",
                self.name
            )));
        }
        if !self.x_min.is_finite() || !self.x_max.is_finite() || self.x_min >= self.x_max {
            return Err(FrameError::InvalidArgument(format!(
                "histogram '{}' needs finite x_min < x_max, got [{}, {})",
                self.name, self.x_min, self.x_max
            )));
        }
        Ok(())
    }
}

/// A 1D histogram being filled (or already finalized).
///
/// Contents are read through accessors; only [`Histogram1D::fill`] and
/// [`Histogram1D::merge`] change them, and both refuse once finalized.
#[derive(Debug, Clone, Serialize)]
pub struct Histogram1D {
    name: String,
    title: String,
    x_label: String,
    y_label: String,
    n_bins: usize,
    x_min: f64,
    x_max: f64,
    bin_counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
    non_finite: u64,
    entries: u64,
    sum: f64,
    sum_sq: f64,
    #[serde(skip)]
    finalized: bool,
}

impl Histogram1D {
    /// Create an empty histogram.
    pub fn new(spec: HistogramSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            name: spec.name,
            title: spec.title,
            x_label: spec.x_label,
            y_label: spec.y_label,
            n_bins: spec.n_bins,
            x_min: spec.x_min,
            x_max: spec.x_max,
            bin_counts: vec![0; spec.n_bins],
            underflow: 0,
            overflow: 0,
            non_finite: 0,
            entries: 0,
            sum: 0.0,
            sum_sq: 0.0,
            finalized: false,
        })
    }

    /// Histogram name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Histogram title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// X axis label.
    pub fn x_label(&self) -> &str {
        &self.x_label
    }

    /// Y axis label.
    pub fn y_label(&self) -> &str {
        &self.y_label
    }

    /// Number of bins (excluding under/overflow).
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Lower edge of the first bin.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Upper edge of the last bin.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Per-bin entry counts.
    pub fn bin_counts(&self) -> &[u64] {
        &self.bin_counts
    }

    /// Entries below `x_min` (including `-inf`).
    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    /// Entries at or above `x_max` (including `+inf`).
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// NaN and infinite entries (excluded from the running sums).
    pub fn non_finite(&self) -> u64 {
        self.non_finite
    }

    /// Total number of fills.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of finite filled values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Sum of squares of finite filled values.
    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }

    /// Booking parameters of this histogram.
    pub fn spec(&self) -> HistogramSpec {
        HistogramSpec {
            name: self.name.clone(),
            title: self.title.clone(),
            x_label: self.x_label.clone(),
            y_label: self.y_label.clone(),
            n_bins: self.n_bins,
            x_min: self.x_min,
            x_max: self.x_max,
        }
    }

    /// Bin index for `value`, or `None` for underflow/overflow/NaN.
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        if value.is_nan() || value < self.x_min || value >= self.x_max {
            return None;
        }
        let frac = (value - self.x_min) / (self.x_max - self.x_min);
        let bin = (frac * self.n_bins as f64).floor() as usize;
        // `frac * n_bins` can round up to `n_bins` just below `x_max`.
        Some(bin.min(self.n_bins - 1))
    }

    /// Add one entry.
    ///
    /// Fails only when the histogram has been finalized.
    pub fn fill(&mut self, value: f64) -> Result<()> {
        if self.finalized {
            return Err(FrameError::Pipeline(format!(
                "histogram '{}' is finalized and cannot be filled",
                self.name
            )));
        }

        self.entries += 1;
        if value.is_finite() {
            self.sum += value;
            self.sum_sq += value * value;
        } else {
            self.non_finite += 1;
        }

        match self.find_bin(value) {
            Some(bin) => self.bin_counts[bin] += 1,
            None if value < self.x_min => self.underflow += 1,
            None if value >= self.x_max => self.overflow += 1,
            None => {} // NaN
        }
        Ok(())
    }

    /// Freeze the histogram; later fills are rejected.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// Whether [`finalize`](Self::finalize) has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of entries entering the running sums.
    pub fn stat_entries(&self) -> u64 {
        self.entries - self.non_finite
    }

    /// Entries inside `[x_min, x_max)`.
    pub fn in_range_entries(&self) -> u64 {
        self.bin_counts.iter().sum()
    }

    /// Arithmetic mean of the finite entries (NaN when there are none).
    pub fn mean(&self) -> f64 {
        let n = self.stat_entries();
        if n == 0 {
            return f64::NAN;
        }
        self.sum / n as f64
    }

    /// Root mean square deviation from the mean (NaN when there are no finite entries).
    ///
    /// A negative radicand from cancellation is clamped to 0.
    pub fn rms(&self) -> f64 {
        let n = self.stat_entries();
        if n == 0 {
            return f64::NAN;
        }
        let mean = self.mean();
        let var = self.sum_sq / n as f64 - mean * mean;
        if var > 0.0 { var.sqrt() } else { 0.0 }
    }

    /// Bin width.
    pub fn bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.n_bins as f64
    }

    /// Bin edges (length `n_bins + 1`).
    pub fn bin_edges(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..=self.n_bins)
            .map(|i| if i == self.n_bins { self.x_max } else { self.x_min + i as f64 * width })
            .collect()
    }

    /// Center of bin `i` (0-based).
    pub fn bin_center(&self, i: usize) -> f64 {
        self.x_min + (i as f64 + 0.5) * self.bin_width()
    }

    /// Add another histogram with identical binning.
    ///
    /// Pure summation of counts and running sums; the result does not depend
    /// on merge order up to floating-point addition of the sums.
    pub fn merge(&mut self, other: &Histogram1D) -> Result<()> {
        if self.finalized {
            return Err(FrameError::Pipeline(format!(
                "histogram '{}' is finalized and cannot be merged into",
                self.name
            )));
        }
        if self.n_bins != other.n_bins || self.x_min != other.x_min || self.x_max != other.x_max
        {
            return Err(FrameError::InvalidArgument(format!(
                "cannot merge '{}' ({} bins on [{}, {})) with '{}' ({} bins on [{}, {}))",
                self.name,
                self.n_bins,
                self.x_min,
                self.x_max,
                other.name,
                other.n_bins,
                other.x_min,
                other.x_max
            )));
        }

        for (a, b) in self.bin_counts.iter_mut().zip(&other.bin_counts) {
            *a += *b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.non_finite += other.non_finite;
        self.entries += other.entries;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        Ok(())
    }
}
