//! # ns-frame
//!
//! Lazy columnar event pipeline for NextStat.
//!
//! Columns are declared as named nodes of a [`ColumnGraph`]: index-sourced
//! columns read event storage by row, derived columns are pure functions of
//! other columns. A [`LazyPipeline`] books histogram sinks on columns and
//! evaluates nothing until a result is requested; then a single pass over all
//! rows computes each required column once per row and fills every sink.
//!
//! ## Example
//!
//! ```
//! use ns_frame::{AnalysisConfig, EventStore, SeededDeviates, run_analysis};
//!
//! let config = AnalysisConfig::default();
//! let events = EventStore::generate(1000, &mut SeededDeviates::new(config.seed)).unwrap();
//! let result = run_analysis(&events, &config).unwrap();
//! assert_eq!(result.mass.entries(), 1000);
//! println!("mass mean={} rms={}", result.mass.mean(), result.mass.rms());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod column;
pub mod error;
pub mod event;
pub mod histogram;
pub mod lorentz;
pub mod output;
pub mod pipeline;

pub use analysis::{
    AnalysisConfig, AnalysisHistograms, AnalysisResult, RecoilConfig, ReferenceFrame,
    build_graph, run_analysis,
};
pub use column::{ColumnGraph, ColumnKind, ColumnValue, EvaluationPlan};
pub use error::{FrameError, GraphError, Result};
pub use event::{DeviateSource, EventRecord, EventStore, SeededDeviates, event_count};
pub use histogram::{Histogram1D, HistogramSpec};
pub use lorentz::{BoostTransform, LorentzVector};
pub use output::{HistogramWriter, JsonContainer, StoredHistogram};
pub use pipeline::{HistoHandle, LazyPipeline, RunSummary};
