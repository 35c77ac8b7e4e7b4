//! Lazy single-pass execution over a [`ColumnGraph`].
//!
//! Lifecycle:
//!
//! 1. [`LazyPipeline::new`] takes the row count and a graph, validates the
//!    graph, evaluates nothing;
//! 2. [`LazyPipeline::histo1d`] books histogram sinks on named columns;
//! 3. the first of [`LazyPipeline::run`], [`LazyPipeline::histogram`] or
//!    [`LazyPipeline::into_histograms`] performs the single pass.
//!
//! A pass that fails on some row leaves the pipeline failed: the sinks hold a
//! partial fill and every later request returns [`FrameError::Pipeline`].
//!
//! The pass evaluates, for each row, the union of the columns required by all
//! sinks, each column exactly once, and feeds every sink. Intermediate columns
//! live in a per-row slot buffer only.

use crate::column::{ColumnGraph, ColumnValue};
use crate::error::{FrameError, GraphError, Result};
use crate::histogram::{Histogram1D, HistogramSpec};

/// Handle to a booked histogram sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoHandle(usize);

/// Outcome of the single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows processed.
    pub rows: usize,
    /// Columns evaluated per row.
    pub columns_evaluated: usize,
    /// Number of sinks fed.
    pub sinks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Booking,
    Executed(RunSummary),
    Failed(String),
}

struct Sink {
    column: String,
    histogram: Histogram1D,
}

/// Deferred pipeline over rows `0..n_rows`.
pub struct LazyPipeline<'a> {
    n_rows: usize,
    graph: ColumnGraph<'a>,
    sinks: Vec<Sink>,
    state: State,
}

impl<'a> LazyPipeline<'a> {
    /// Wrap a graph. Fails on unknown dependencies or cycles.
    pub fn new(n_rows: usize, graph: ColumnGraph<'a>) -> Result<Self> {
        graph.validate()?;
        Ok(Self { n_rows, graph, sinks: Vec::new(), state: State::Booking })
    }

    /// Number of rows the pass will cover.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// The underlying column graph.
    pub fn graph(&self) -> &ColumnGraph<'a> {
        &self.graph
    }

    /// Whether the single pass has happened.
    pub fn is_executed(&self) -> bool {
        matches!(self.state, State::Executed(_))
    }

    /// Rows processed so far (0 before the pass, `n_rows` after).
    pub fn rows_processed(&self) -> usize {
        match self.state {
            State::Executed(summary) => summary.rows,
            State::Booking | State::Failed(_) => 0,
        }
    }

    /// Book a histogram of `column`. Nothing is evaluated yet.
    pub fn histo1d(&mut self, spec: HistogramSpec, column: &str) -> Result<HistoHandle> {
        if self.state != State::Booking {
            return Err(FrameError::Pipeline(format!(
                "cannot book '{}' on column '{column}': pipeline already executed",
                spec.name
            )));
        }
        if !self.graph.contains(column) {
            return Err(GraphError::UnknownColumn(column.to_string()).into());
        }
        let histogram = Histogram1D::new(spec)?;
        tracing::debug!(histogram = %histogram.name(), column, "booked histogram");
        self.sinks.push(Sink { column: column.to_string(), histogram });
        Ok(HistoHandle(self.sinks.len() - 1))
    }

    /// Perform the single pass.
    ///
    /// Fails if the pass has already happened or has failed before.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.ensure_booking()?;
        match self.single_pass() {
            Ok(summary) => {
                self.state = State::Executed(summary);
                tracing::info!(rows = summary.rows, "single pass complete");
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, "single pass failed");
                self.state = State::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn ensure_booking(&self) -> Result<()> {
        match &self.state {
            State::Booking => Ok(()),
            State::Executed(_) => Err(FrameError::Pipeline("pipeline already executed".into())),
            State::Failed(cause) => {
                Err(FrameError::Pipeline(format!("pipeline failed during its pass: {cause}")))
            }
        }
    }

    fn single_pass(&mut self) -> Result<RunSummary> {
        let requested: Vec<&str> = self.sinks.iter().map(|s| s.column.as_str()).collect();
        let plan = self.graph.plan(&requested)?;
        tracing::debug!(
            columns = ?plan.steps().iter().map(|s| self.graph.name_of(s)).collect::<Vec<_>>(),
            "evaluation plan"
        );
        tracing::info!(
            rows = self.n_rows,
            columns = plan.len(),
            sinks = self.sinks.len(),
            "starting single pass"
        );

        let mut slots = vec![ColumnValue::Scalar(0.0); plan.len()];
        let mut scratch = Vec::new();
        if !plan.is_empty() {
            for row in 0..self.n_rows {
                for (slot, step) in plan.steps().iter().enumerate() {
                    slots[slot] = self.graph.evaluate_step(step, row, &slots, &mut scratch)?;
                }
                for (sink, &slot) in self.sinks.iter_mut().zip(plan.outputs()) {
                    let value = slots[slot].as_scalar().map_err(|e| {
                        FrameError::Evaluation(format!(
                            "histogram '{}' bound to column '{}': {e}",
                            sink.histogram.name(), sink.column
                        ))
                    })?;
                    sink.histogram.fill(value)?;
                }
            }
        }

        for sink in &mut self.sinks {
            sink.histogram.finalize();
        }

        Ok(RunSummary {
            rows: self.n_rows,
            columns_evaluated: plan.len(),
            sinks: self.sinks.len(),
        })
    }

    /// Result of a booked histogram, running the pass first if needed.
    pub fn histogram(&mut self, handle: HistoHandle) -> Result<&Histogram1D> {
        if handle.0 >= self.sinks.len() {
            return Err(FrameError::Pipeline(format!("unknown histogram handle {}", handle.0)));
        }
        if !self.is_executed() {
            self.run()?;
        }
        Ok(&self.sinks[handle.0].histogram)
    }

    /// All booked histograms in booking order, running the pass first if needed.
    pub fn into_histograms(mut self) -> Result<Vec<Histogram1D>> {
        if !self.is_executed() {
            self.run()?;
        }
        Ok(self.sinks.into_iter().map(|s| s.histogram).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn spec(name: &str) -> HistogramSpec {
        HistogramSpec::new(name, name, 10, 0.0, 10.0)
    }

    fn counted_graph<'a>(data: &'a [f64], calls: &'a Cell<usize>) -> ColumnGraph<'a> {
        let mut g = ColumnGraph::new();
        g.define_indexed("x", move |i| {
            calls.set(calls.get() + 1);
            Ok(data[i].into())
        })
        .unwrap();
        g.define("double", &["x"], |v| Ok((v[0].as_scalar()? * 2.0).into())).unwrap();
        g
    }

    #[test]
    fn construction_and_booking_are_lazy() {
        let data = [1.0, 2.0, 3.0];
        let calls = Cell::new(0);
        let mut p = LazyPipeline::new(data.len(), counted_graph(&data, &calls)).unwrap();
        let _h = p.histo1d(spec("h"), "double").unwrap();
        assert_eq!(calls.get(), 0);
        assert!(!p.is_executed());
        assert_eq!(p.rows_processed(), 0);
    }

    #[test]
    fn histogram_request_triggers_single_pass() {
        let data = [1.0, 2.0, 3.0, 12.0];
        let calls = Cell::new(0);
        let mut p = LazyPipeline::new(data.len(), counted_graph(&data, &calls)).unwrap();
        let hx = p.histo1d(spec("hx"), "x").unwrap();
        let hd = p.histo1d(spec("hd"), "double").unwrap();

        let h = p.histogram(hd).unwrap();
        assert_eq!(h.entries(), 4);
        assert_eq!(h.bin_counts()[2], 1);
        assert_eq!(h.bin_counts()[4], 1);
        assert_eq!(h.bin_counts()[6], 1);
        assert_eq!(h.overflow(), 1);
        assert!(h.is_finalized());

        // Second request reads the cached result.
        let h = p.histogram(hx).unwrap();
        assert_eq!(h.entries(), 4);
        assert_eq!(calls.get(), data.len());
        assert_eq!(p.rows_processed(), 4);
    }

    #[test]
    fn second_run_is_rejected() {
        let data = [1.0];
        let calls = Cell::new(0);
        let mut p = LazyPipeline::new(1, counted_graph(&data, &calls)).unwrap();
        p.histo1d(spec("h"), "x").unwrap();
        p.run().unwrap();
        assert!(matches!(p.run().unwrap_err(), FrameError::Pipeline(_)));
        assert!(matches!(p.histo1d(spec("late"), "x").unwrap_err(), FrameError::Pipeline(_)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn failed_pass_is_terminal() {
        let data = [1.0, 2.0, 3.0];
        let calls = Cell::new(0);
        let broken = Cell::new(true);
        let mut g = counted_graph(&data, &calls);
        g.define("y", &["x"], |v| {
            let x = v[0].as_scalar()?;
            if broken.get() && x == 2.0 {
                return Err(FrameError::Evaluation("bad value".into()));
            }
            Ok(x.into())
        })
        .unwrap();
        let mut p = LazyPipeline::new(data.len(), g).unwrap();
        let hx = p.histo1d(spec("hx"), "x").unwrap();
        p.histo1d(spec("hy"), "y").unwrap();

        let err = p.run().unwrap_err();
        assert!(err.to_string().contains("column 'y' (row 1)"));
        assert!(!p.is_executed());
        assert_eq!(p.rows_processed(), 0);

        broken.set(false);
        assert!(matches!(p.run().unwrap_err(), FrameError::Pipeline(_)));
        let err = p.histogram(hx).unwrap_err();
        assert!(matches!(err, FrameError::Pipeline(ref m) if m.contains("bad value")));
        assert!(matches!(p.histo1d(spec("late"), "x").unwrap_err(), FrameError::Pipeline(_)));
        assert!(matches!(p.into_histograms().unwrap_err(), FrameError::Pipeline(_)));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn shared_column_evaluated_once_per_row() {
        let n = 50;
        let data: Vec<f64> = (0..n).map(|i| i as f64 * 0.1).collect();
        let calls = Cell::new(0);
        let mut g = counted_graph(&data, &calls);
        g.define("plus", &["x"], |v| Ok((v[0].as_scalar()? + 1.0).into())).unwrap();
        g.define("minus", &["x"], |v| Ok((v[0].as_scalar()? - 1.0).into())).unwrap();

        let mut p = LazyPipeline::new(n, g).unwrap();
        p.histo1d(spec("a"), "plus").unwrap();
        p.histo1d(spec("b"), "minus").unwrap();
        p.histo1d(spec("c"), "double").unwrap();
        p.histo1d(spec("d"), "x").unwrap();
        let summary = p.run().unwrap();

        assert_eq!(calls.get(), n);
        assert_eq!(summary, RunSummary { rows: n, columns_evaluated: 4, sinks: 4 });
    }

    #[test]
    fn unrequested_columns_are_not_evaluated() {
        let data = [1.0, 2.0];
        let calls = Cell::new(0);
        let other = Cell::new(0);
        let mut g = counted_graph(&data, &calls);
        g.define_indexed("other", |_| {
            other.set(other.get() + 1);
            Ok(0.0.into())
        })
        .unwrap();
        let mut p = LazyPipeline::new(2, g).unwrap();
        p.histo1d(spec("h"), "double").unwrap();
        p.run().unwrap();
        assert_eq!(other.get(), 0);
    }

    #[test]
    fn cycle_fails_before_any_row() {
        let calls = Cell::new(0);
        let data = [1.0];
        let mut g = counted_graph(&data, &calls);
        g.define("a", &["b"], |v| Ok(v[0])).unwrap();
        g.define("b", &["a", "x"], |v| Ok(v[0])).unwrap();
        let err = LazyPipeline::new(1, g).err().unwrap();
        assert!(matches!(err, FrameError::Graph(GraphError::CyclicDependency(_))));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn booking_unknown_column_fails() {
        let calls = Cell::new(0);
        let data = [1.0];
        let mut p = LazyPipeline::new(1, counted_graph(&data, &calls)).unwrap();
        let err = p.histo1d(spec("h"), "missing").unwrap_err();
        assert!(matches!(err, FrameError::Graph(GraphError::UnknownColumn(_))));
    }

    #[test]
    fn vector_column_bound_to_histogram_fails() {
        use crate::lorentz::LorentzVector;
        let mut g = ColumnGraph::new();
        g.define_indexed("v", |_| Ok(LorentzVector::default().into())).unwrap();
        let mut p = LazyPipeline::new(3, g).unwrap();
        p.histo1d(spec("h"), "v").unwrap();
        let err = p.run().unwrap_err();
        assert!(matches!(err, FrameError::Evaluation(_)));
        assert!(err.to_string().contains("bound to column 'v'"));
    }

    #[test]
    fn zero_rows_and_no_sinks() {
        let calls = Cell::new(0);
        let data: [f64; 0] = [];
        let mut p = LazyPipeline::new(0, counted_graph(&data, &calls)).unwrap();
        let h = p.histo1d(spec("h"), "x").unwrap();
        assert_eq!(p.histogram(h).unwrap().entries(), 0);

        let mut empty = LazyPipeline::new(5, ColumnGraph::new()).unwrap();
        let summary = empty.run().unwrap();
        assert_eq!(summary.columns_evaluated, 0);
        assert_eq!(empty.rows_processed(), 5);
        assert!(empty.into_histograms().unwrap().is_empty());
    }
}
