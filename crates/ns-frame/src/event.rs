//! In-memory event generation.
//!
//! An [`EventStore`] is a row-ordered sequence of fixed-size [`EventRecord`]s,
//! generated once from a [`DeviateSource`] and read-only afterwards.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Upper bound (exclusive) of the uniform mass draw.
pub const MASS_UPPER: f64 = 0.3;

/// Source of random deviates.
///
/// Implementations must be deterministic for a given construction seed and
/// call order.
pub trait DeviateSource {
    /// Draw from a normal distribution.
    fn gaussian(&mut self, mean: f64, stddev: f64) -> f64;

    /// Draw from the half-open interval `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

/// Explicitly seeded [`DeviateSource`] backed by `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededDeviates {
    rng: StdRng,
}

impl SeededDeviates {
    /// Create a source from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl DeviateSource for SeededDeviates {
    fn gaussian(&mut self, mean: f64, stddev: f64) -> f64 {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        mean + stddev * z
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        let u: f64 = self.rng.random();
        let x = low + (high - low) * u;
        // Rounding can land exactly on `high` for tiny intervals.
        if x < high { x } else { low }
    }
}

/// One generated event: momentum components and mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
    /// Momentum z component.
    pub pz: f64,
    /// Mass.
    pub m: f64,
}

/// Row-ordered, immutable event storage.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<EventRecord>,
}

impl EventStore {
    /// Generate `n_events` events.
    ///
    /// Per event the draws are made in the order px, py, pz (Normal(0, 1))
    /// then m (Uniform[0, 0.3)).
    pub fn generate(n_events: usize, rng: &mut dyn DeviateSource) -> Result<Self> {
        let mut events = Vec::new();
        events.try_reserve_exact(n_events).map_err(|e| {
            FrameError::InvalidArgument(format!("cannot allocate {n_events} events: {e}"))
        })?;

        for _ in 0..n_events {
            let px = rng.gaussian(0.0, 1.0);
            let py = rng.gaussian(0.0, 1.0);
            let pz = rng.gaussian(0.0, 1.0);
            let m = rng.uniform(0.0, MASS_UPPER);
            events.push(EventRecord { px, py, pz, m });
        }

        tracing::debug!(n_events, "generated event store");
        Ok(Self { events })
    }

    /// Wrap already materialized records.
    pub fn from_records(events: Vec<EventRecord>) -> Self {
        Self { events }
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the store holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Record at `row`.
    ///
    /// Panics if `row` is out of range; callers iterate `0..len()`.
    #[inline]
    pub fn record(&self, row: usize) -> &EventRecord {
        &self.events[row]
    }

    /// Record at `row`, or an evaluation error when the row is past the end.
    pub fn get(&self, row: usize) -> Result<&EventRecord> {
        self.events.get(row).ok_or_else(|| {
            FrameError::Evaluation(format!(
                "row {row} out of range for {} events",
                self.events.len()
            ))
        })
    }

    /// All records in row order.
    pub fn records(&self) -> &[EventRecord] {
        &self.events
    }
}

/// Validate a signed event count coming from user input.
///
/// Negative counts and counts that do not fit a row index are rejected
/// before anything is allocated.
pub fn event_count(n: i64) -> Result<usize> {
    if n < 0 {
        return Err(FrameError::InvalidArgument(format!(
            "event count must be non-negative, got {n}"
        )));
    }
    usize::try_from(n).map_err(|_| {
        FrameError::InvalidArgument(format!("event count {n} does not fit a row index"))
    })
}
