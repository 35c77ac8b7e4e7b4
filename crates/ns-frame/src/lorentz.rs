//! Four-momenta and Lorentz boosts.
//!
//! Component order is always `(px, py, pz, e)`, matching the PxPyPzE
//! coordinate system used by ROOT's `LorentzVector`.

use std::ops::Add;

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// A relativistic four-momentum in `(px, py, pz, e)` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LorentzVector {
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
    /// Momentum z component.
    pub pz: f64,
    /// Energy.
    pub e: f64,
}

impl LorentzVector {
    /// Build from explicit components.
    pub const fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Build an on-shell vector from momentum and mass: `e = sqrt(p² + m²)`.
    pub fn from_mass(px: f64, py: f64, pz: f64, m: f64) -> Self {
        let e = (px * px + py * py + pz * pz + m * m).sqrt();
        Self { px, py, pz, e }
    }

    /// Squared magnitude of the spatial momentum.
    #[inline]
    pub fn p2(&self) -> f64 {
        self.px * self.px + self.py * self.py + self.pz * self.pz
    }

    /// Invariant mass `sqrt(e² - p²)`.
    ///
    /// Space-like vectors (negative radicand from rounding or otherwise) give 0.
    pub fn mass(&self) -> f64 {
        let mm = self.e * self.e - self.p2();
        if mm > 0.0 {
            mm.sqrt()
        } else if mm.is_nan() {
            f64::NAN
        } else {
            0.0
        }
    }

    /// Transverse momentum `sqrt(px² + py²)`.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Rapidity `0.5 * ln((e + pz) / (e - pz))`.
    ///
    /// When `e <= |pz|` the logarithm is undefined; the result is then
    /// `+inf`/`-inf` following the sign of `pz`, or `0` for `pz == 0`.
    pub fn rapidity(&self) -> f64 {
        if self.e.is_nan() || self.pz.is_nan() {
            return f64::NAN;
        }
        let num = self.e + self.pz;
        let den = self.e - self.pz;
        if num > 0.0 && den > 0.0 {
            0.5 * (num / den).ln()
        } else if self.pz == 0.0 {
            0.0
        } else if self.pz > 0.0 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        }
    }

    #[inline]
    fn to_column(self) -> Vector4<f64> {
        Vector4::new(self.px, self.py, self.pz, self.e)
    }

    #[inline]
    fn from_column(v: Vector4<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl Add for LorentzVector {
    type Output = LorentzVector;

    fn add(self, rhs: LorentzVector) -> LorentzVector {
        LorentzVector::new(self.px + rhs.px, self.py + rhs.py, self.pz + rhs.pz, self.e + rhs.e)
    }
}

/// A precomputed pure Lorentz boost.
///
/// Built once from a velocity `beta` (in units of c) and applied as a 4x4
/// matrix product. Boosting a particle at rest by `beta` gives it velocity
/// `beta`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostTransform {
    matrix: Matrix4<f64>,
    beta: [f64; 3],
    gamma: f64,
}

impl BoostTransform {
    /// Build a boost from a velocity vector with `|beta| < 1`.
    pub fn from_beta(bx: f64, by: f64, bz: f64) -> Result<Self> {
        let b2 = bx * bx + by * by + bz * bz;
        if !b2.is_finite() || b2 >= 1.0 {
            return Err(FrameError::InvalidArgument(format!(
                "boost velocity must satisfy |beta| < 1 (beta^2 = {b2})"
            )));
        }
        let gamma = 1.0 / (1.0 - b2).sqrt();
        let g2 = if b2 > 0.0 { (gamma - 1.0) / b2 } else { 0.0 };

        #[rustfmt::skip]
        let matrix = Matrix4::new(
            1.0 + g2 * bx * bx, g2 * bx * by,       g2 * bx * bz,       gamma * bx,
            g2 * by * bx,       1.0 + g2 * by * by, g2 * by * bz,       gamma * by,
            g2 * bz * bx,       g2 * bz * by,       1.0 + g2 * bz * bz, gamma * bz,
            gamma * bx,         gamma * by,         gamma * bz,         gamma,
        );

        Ok(Self { matrix, beta: [bx, by, bz], gamma })
    }

    /// Boost into the rest frame of `reference`.
    ///
    /// `reference` must be time-like with positive energy; applying the result
    /// to `reference` itself gives `(0, 0, 0, mass)`.
    pub fn to_rest_frame_of(reference: &LorentzVector) -> Result<Self> {
        let e = reference.e;
        if e.is_nan() || e <= 0.0 || reference.p2() >= e * e {
            return Err(FrameError::InvalidArgument(format!(
                "reference four-vector must be time-like with e > 0, got {reference:?}"
            )));
        }
        let inv_e = 1.0 / reference.e;
        Self::from_beta(-reference.px * inv_e, -reference.py * inv_e, -reference.pz * inv_e)
    }

    /// Apply the boost.
    #[inline]
    pub fn apply(&self, v: &LorentzVector) -> LorentzVector {
        LorentzVector::from_column(self.matrix * v.to_column())
    }

    /// Boost velocity.
    pub fn beta(&self) -> [f64; 3] {
        self.beta
    }

    /// Lorentz factor `1 / sqrt(1 - beta²)`.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn recoil() -> LorentzVector {
        LorentzVector::from_mass(2.0, -1.0, 1.5, 0.5)
    }

    #[test]
    fn on_shell_energy() {
        let v = LorentzVector::from_mass(3.0, 0.0, 4.0, 0.0);
        assert_eq!(v.e, 5.0);
        assert_eq!(v.mass(), 0.0);
    }

    #[test]
    fn invariant_mass_of_recoil() {
        assert_relative_eq!(recoil().mass(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(recoil().pt(), 5.0f64.sqrt(), epsilon = 1e-15);
    }

    #[test]
    fn mass_clamps_space_like() {
        let v = LorentzVector::new(1.0, 0.0, 0.0, 0.5);
        assert_eq!(v.mass(), 0.0);
    }

    #[test]
    fn rapidity_values() {
        let v = LorentzVector::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(v.rapidity(), 0.0);

        let v = LorentzVector::new(0.0, 0.0, 0.6, 1.0);
        assert_relative_eq!(v.rapidity(), 0.5 * (1.6f64 / 0.4).ln(), epsilon = 1e-15);

        let v = LorentzVector::new(0.0, 0.0, -0.6, 1.0);
        assert_relative_eq!(v.rapidity(), -0.5 * (1.6f64 / 0.4).ln(), epsilon = 1e-15);
    }

    #[test]
    fn rapidity_sentinels() {
        assert_eq!(LorentzVector::new(0.0, 0.0, 2.0, 2.0).rapidity(), f64::INFINITY);
        assert_eq!(LorentzVector::new(0.0, 0.0, -2.0, 2.0).rapidity(), f64::NEG_INFINITY);
        assert_eq!(LorentzVector::default().rapidity(), 0.0);
        assert!(LorentzVector::new(0.0, 0.0, f64::NAN, 1.0).rapidity().is_nan());
    }

    #[test]
    fn addition_is_component_wise() {
        let s = LorentzVector::new(1.0, 2.0, 3.0, 4.0) + LorentzVector::new(0.5, -2.0, 1.0, 1.0);
        assert_eq!(s, LorentzVector::new(1.5, 0.0, 4.0, 5.0));
    }

    #[test]
    fn rest_frame_of_reference() {
        let v2 = recoil();
        let boost = BoostTransform::to_rest_frame_of(&v2).unwrap();
        let at_rest = boost.apply(&v2);
        assert_abs_diff_eq!(at_rest.px, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(at_rest.py, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(at_rest.pz, 0.0, epsilon = 1e-12);
        assert_relative_eq!(at_rest.e, 0.5, epsilon = 1e-10);
        assert_relative_eq!(boost.gamma(), v2.e / 0.5, epsilon = 1e-10);
    }

    #[test]
    fn boost_preserves_mass() {
        let boost = BoostTransform::to_rest_frame_of(&recoil()).unwrap();
        let v = LorentzVector::from_mass(0.3, -1.2, 0.7, 0.2);
        assert_relative_eq!(boost.apply(&v).mass(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn boost_of_zero_vector_is_zero() {
        let boost = BoostTransform::to_rest_frame_of(&recoil()).unwrap();
        assert_eq!(boost.apply(&LorentzVector::default()), LorentzVector::default());
    }

    #[test]
    fn zero_velocity_is_identity() {
        let boost = BoostTransform::from_beta(0.0, 0.0, 0.0).unwrap();
        let v = LorentzVector::new(1.0, 2.0, 3.0, 10.0);
        assert_eq!(boost.apply(&v), v);
    }

    #[test]
    fn rejects_superluminal_and_light_like() {
        assert!(BoostTransform::from_beta(1.0, 0.0, 0.0).is_err());
        assert!(BoostTransform::from_beta(f64::NAN, 0.0, 0.0).is_err());
        let photon = LorentzVector::new(0.0, 0.0, 1.0, 1.0);
        assert!(BoostTransform::to_rest_frame_of(&photon).is_err());
        assert!(BoostTransform::to_rest_frame_of(&LorentzVector::default()).is_err());
    }
}
