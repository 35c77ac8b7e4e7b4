//! The recoil analysis: event columns, derived kinematics and four histograms.
//!
//! Column graph:
//!
//! ```text
//! px, py, pz, m  (index-sourced from the EventStore)
//!   └─ v        on-shell four-vector
//!        ├─ sum      v + recoil
//!        │    ├─ mass
//!        │    ├─ pt
//!        │    └─ rap
//!        └─ deltaE   E(v boosted into the recoil rest frame) - E(v)
//! ```

use serde::{Deserialize, Serialize};

use crate::column::{ColumnGraph, ColumnValue};
use crate::error::{FrameError, Result};
use crate::event::EventStore;
use crate::histogram::{Histogram1D, HistogramSpec};
use crate::lorentz::{BoostTransform, LorentzVector};
use crate::pipeline::{LazyPipeline, RunSummary};

/// Fixed recoil particle, given as momentum and mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoilConfig {
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
    /// Momentum z component.
    pub pz: f64,
    /// Mass.
    pub m: f64,
}

impl Default for RecoilConfig {
    fn default() -> Self {
        Self { px: 2.0, py: -1.0, pz: 1.5, m: 0.5 }
    }
}

impl RecoilConfig {
    /// On-shell four-vector of the recoil.
    pub fn vector(&self) -> LorentzVector {
        LorentzVector::from_mass(self.px, self.py, self.pz, self.m)
    }
}

/// Histogram bookings of the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisHistograms {
    /// Invariant mass of `sum`.
    pub mass: HistogramSpec,
    /// Transverse momentum of `sum`.
    pub pt: HistogramSpec,
    /// Rapidity of `sum`.
    pub rap: HistogramSpec,
    /// Energy change under the recoil rest-frame boost.
    pub delta_e: HistogramSpec,
}

impl Default for AnalysisHistograms {
    fn default() -> Self {
        Self {
            mass: HistogramSpec::new("h_mass", "Invariant mass;M [GeV];Entries", 100, 0.0, 10.0),
            pt: HistogramSpec::new(
                "h_pt",
                "Transverse momentum;p_{T} [GeV];Entries",
                100,
                0.0,
                10.0,
            ),
            rap: HistogramSpec::new("h_rap", "Rapidity;y;Entries", 100, -5.0, 5.0),
            delta_e: HistogramSpec::new(
                "h_deltaE",
                "Energy change;ΔE [GeV];Entries",
                100,
                -5.0,
                5.0,
            ),
        }
    }
}

/// Analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Seed for event generation.
    pub seed: u64,
    /// Recoil particle.
    pub recoil: RecoilConfig,
    /// Histogram bookings.
    pub histograms: AnalysisHistograms,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { seed: 0, recoil: RecoilConfig::default(), histograms: AnalysisHistograms::default() }
    }
}

/// Immutable reference frame shared by every row: the recoil vector and the
/// boost into its rest frame, built once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    recoil: LorentzVector,
    boost: BoostTransform,
}

impl ReferenceFrame {
    /// Build the frame of `recoil`. Fails for non-time-like vectors.
    pub fn new(recoil: LorentzVector) -> Result<Self> {
        let boost = BoostTransform::to_rest_frame_of(&recoil)?;
        Ok(Self { recoil, boost })
    }

    /// The recoil four-vector.
    pub fn recoil(&self) -> &LorentzVector {
        &self.recoil
    }

    /// Boost into the recoil rest frame.
    pub fn boost(&self) -> &BoostTransform {
        &self.boost
    }
}

/// Build the analysis column graph over `events`.
pub fn build_graph<'a>(
    events: &'a EventStore,
    frame: &'a ReferenceFrame,
) -> Result<ColumnGraph<'a>> {
    let mut g = ColumnGraph::new();

    g.define_indexed("px", move |i| Ok(events.get(i)?.px.into()))?;
    g.define_indexed("py", move |i| Ok(events.get(i)?.py.into()))?;
    g.define_indexed("pz", move |i| Ok(events.get(i)?.pz.into()))?;
    g.define_indexed("m", move |i| Ok(events.get(i)?.m.into()))?;

    g.define("v", &["px", "py", "pz", "m"], |c| {
        let v = LorentzVector::from_mass(
            c[0].as_scalar()?,
            c[1].as_scalar()?,
            c[2].as_scalar()?,
            c[3].as_scalar()?,
        );
        Ok(v.into())
    })?;
    g.define("sum", &["v"], move |c| Ok((c[0].as_vector()? + *frame.recoil()).into()))?;
    g.define("mass", &["sum"], |c| Ok(c[0].as_vector()?.mass().into()))?;
    g.define("pt", &["sum"], |c| Ok(c[0].as_vector()?.pt().into()))?;
    g.define("rap", &["sum"], |c| Ok(c[0].as_vector()?.rapidity().into()))?;
    g.define("deltaE", &["v"], move |c| {
        let v = c[0].as_vector()?;
        let boosted = frame.boost().apply(&v);
        Ok(ColumnValue::Scalar(boosted.e - v.e))
    })?;

    Ok(g)
}

/// Finalized analysis histograms.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Pass summary.
    pub summary: RunSummary,
    /// Invariant mass histogram.
    pub mass: Histogram1D,
    /// Transverse momentum histogram.
    pub pt: Histogram1D,
    /// Rapidity histogram.
    pub rap: Histogram1D,
    /// Energy change histogram.
    pub delta_e: Histogram1D,
}

impl AnalysisResult {
    /// Histograms in output order: mass, pt, rap, deltaE.
    pub fn histograms(&self) -> [&Histogram1D; 4] {
        [&self.mass, &self.pt, &self.rap, &self.delta_e]
    }
}

/// Run the analysis over `events` in a single pass.
pub fn run_analysis(events: &EventStore, config: &AnalysisConfig) -> Result<AnalysisResult> {
    let frame = ReferenceFrame::new(config.recoil.vector())?;
    let graph = build_graph(events, &frame)?;

    let mut pipeline = LazyPipeline::new(events.len(), graph)?;
    let h = &config.histograms;
    pipeline.histo1d(h.mass.clone(), "mass")?;
    pipeline.histo1d(h.pt.clone(), "pt")?;
    pipeline.histo1d(h.rap.clone(), "rap")?;
    pipeline.histo1d(h.delta_e.clone(), "deltaE")?;

    let summary = pipeline.run()?;
    let mut hists = pipeline.into_histograms()?.into_iter();
    match (hists.next(), hists.next(), hists.next(), hists.next()) {
        (Some(mass), Some(pt), Some(rap), Some(delta_e)) => {
            Ok(AnalysisResult { summary, mass, pt, rap, delta_e })
        }
        _ => Err(FrameError::Pipeline("expected four analysis histograms".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventRecord, SeededDeviates};
    use approx::assert_relative_eq;

    #[test]
    fn default_config_matches_recoil_setup() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.recoil, RecoilConfig { px: 2.0, py: -1.0, pz: 1.5, m: 0.5 });
        assert_eq!(cfg.histograms.mass.name, "h_mass");
        assert_eq!(cfg.histograms.delta_e.x_label, "ΔE [GeV]");
        assert_eq!(cfg.histograms.rap.x_min, -5.0);
    }

    #[test]
    fn config_partial_json_uses_defaults() {
        let cfg: AnalysisConfig = serde_json::from_str(r#"{"seed": 9}"#).unwrap();
        assert_eq!(cfg.seed, 9);
        assert_eq!(cfg.histograms, AnalysisHistograms::default());
    }

    #[test]
    fn graph_has_expected_columns() {
        let events = EventStore::default();
        let frame = ReferenceFrame::new(RecoilConfig::default().vector()).unwrap();
        let g = build_graph(&events, &frame).unwrap();
        assert_eq!(
            g.column_names(),
            vec!["px", "py", "pz", "m", "v", "sum", "mass", "pt", "rap", "deltaE"]
        );
        g.validate().unwrap();
    }

    #[test]
    fn single_event_columns() {
        let ev = EventRecord { px: 0.3, py: -0.4, pz: 1.2, m: 0.1 };
        let events = EventStore::from_records(vec![ev]);
        let cfg = AnalysisConfig::default();
        let r = run_analysis(&events, &cfg).unwrap();

        let v = LorentzVector::from_mass(ev.px, ev.py, ev.pz, ev.m);
        let sum = v + cfg.recoil.vector();
        assert_relative_eq!(r.mass.sum(), sum.mass(), epsilon = 1e-12);
        assert_relative_eq!(r.pt.sum(), sum.pt(), epsilon = 1e-12);
        assert_relative_eq!(r.rap.sum(), sum.rapidity(), epsilon = 1e-12);

        let boost = BoostTransform::to_rest_frame_of(&cfg.recoil.vector()).unwrap();
        assert_relative_eq!(r.delta_e.sum(), boost.apply(&v).e - v.e, epsilon = 1e-12);
    }

    #[test]
    fn every_event_reaches_every_histogram() {
        let events = EventStore::generate(1000, &mut SeededDeviates::new(5)).unwrap();
        let r = run_analysis(&events, &AnalysisConfig::default()).unwrap();
        assert_eq!(r.summary.rows, 1000);
        for h in r.histograms() {
            assert_eq!(h.entries(), 1000, "{}", h.name());
            assert_eq!(h.non_finite(), 0, "{}", h.name());
            assert_eq!(h.in_range_entries() + h.underflow() + h.overflow(), 1000);
            assert!(h.is_finalized());
        }
        // The sum always carries the recoil mass, so its invariant mass is at least 0.5.
        assert!(r.mass.mean() > 0.5);
    }

    #[test]
    fn rows_past_the_store_fail_the_pass() {
        let events = EventStore::generate(3, &mut SeededDeviates::new(8)).unwrap();
        let frame = ReferenceFrame::new(RecoilConfig::default().vector()).unwrap();
        let graph = build_graph(&events, &frame).unwrap();
        let mut p = LazyPipeline::new(5, graph).unwrap();
        p.histo1d(AnalysisHistograms::default().mass, "mass").unwrap();
        let err = p.run().unwrap_err();
        assert!(matches!(err, FrameError::Evaluation(_)));
        assert!(err.to_string().contains("row 3 out of range for 3 events"));
    }

    #[test]
    fn invalid_recoil_rejected() {
        let events = EventStore::default();
        let mut cfg = AnalysisConfig::default();
        cfg.recoil = RecoilConfig { px: 0.0, py: 0.0, pz: 0.0, m: 0.0 };
        assert!(run_analysis(&events, &cfg).is_err());
    }
}
