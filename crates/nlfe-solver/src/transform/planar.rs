//! Planar two-node transformation (ux, uy, rz per node).

use nalgebra::{Matrix3, Vector2};
use tracing::debug;

use super::{CoordTransform, Formulation};
use crate::error::{Error, Result};
use crate::linalg::{LENGTH_TOL, Mat6, Vec6, block_diagonal, triple_product};

type Vec2 = Vector2<f64>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Chord {
    cos: f64,
    sin: f64,
    length: f64,
}

impl Chord {
    fn undefined() -> Self {
        Self {
            cos: 1.0,
            sin: 0.0,
            length: 0.0,
        }
    }

    fn new(tag: i32, dx: &Vec2) -> Result<Self> {
        let length = dx.norm();
        if !(length >= LENGTH_TOL) {
            return Err(Error::ZeroLength(tag));
        }
        Ok(Self {
            cos: dx.x / length,
            sin: dx.y / length,
            length,
        })
    }

    /// Per-node rotation, rows are the local axes.
    fn node_rotation(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.cos, self.sin, 0.0, //
            -self.sin, self.cos, 0.0, //
            0.0, 0.0, 1.0,
        )
    }

    fn rotation(&self) -> Mat6 {
        block_diagonal(&self.node_rotation())
    }
}

/// Coordinate transformation for a two-node planar element.
#[derive(Debug, Clone, PartialEq)]
pub struct CrdTransf2d {
    tag: i32,
    formulation: Formulation,
    xi: Vec2,
    xj: Vec2,
    trial: Chord,
    committed: Chord,
    initial: Chord,
    ug_trial: Vec6,
    ug_committed: Vec6,
}

impl CrdTransf2d {
    pub fn new(tag: i32, formulation: Formulation) -> Self {
        Self {
            tag,
            formulation,
            xi: Vec2::zeros(),
            xj: Vec2::zeros(),
            trial: Chord::undefined(),
            committed: Chord::undefined(),
            initial: Chord::undefined(),
            ug_trial: Vec6::zeros(),
            ug_committed: Vec6::zeros(),
        }
    }

    /// Trial `(cos, sin)` of the chord angle.
    pub fn direction(&self) -> (f64, f64) {
        (self.trial.cos, self.trial.sin)
    }

    pub fn trial_displacement(&self) -> &Vec6 {
        &self.ug_trial
    }

    /// `T` (6 × 6) of the trial frame.
    pub fn rotation(&self) -> Mat6 {
        self.trial.rotation()
    }

    pub fn global_to_local(&self, ug: &Vec6) -> Vec6 {
        self.trial.rotation() * ug
    }

    pub fn local_to_global_force(&self, ql: &Vec6) -> Vec6 {
        self.trial.rotation().transpose() * ql
    }

    pub fn local_to_global_stiff(&self, kl: &Mat6) -> Mat6 {
        triple_product(&self.trial.rotation(), kl)
    }

    pub fn initial_local_to_global_stiff(&self, kl: &Mat6) -> Mat6 {
        triple_product(&self.initial.rotation(), kl)
    }
}

impl CoordTransform for CrdTransf2d {
    fn tag(&self) -> i32 {
        self.tag
    }

    fn formulation(&self) -> Formulation {
        self.formulation
    }

    fn initialize(&mut self, xi: &[f64], xj: &[f64]) -> Result<()> {
        if xi.len() < 2 || xj.len() < 2 {
            return Err(Error::Construction(format!(
                "transform {}: planar transform requires 2 coordinates per node",
                self.tag
            )));
        }
        self.xi = Vec2::new(xi[0], xi[1]);
        self.xj = Vec2::new(xj[0], xj[1]);

        let chord = Chord::new(self.tag, &(self.xj - self.xi))?;
        self.trial = chord;
        self.committed = chord;
        self.initial = chord;
        self.ug_trial = Vec6::zeros();
        self.ug_committed = Vec6::zeros();
        Ok(())
    }

    fn update(&mut self, ug: &[f64]) -> Result<()> {
        if ug.len() != 6 {
            return Err(Error::Construction(format!(
                "transform {}: expected 6 displacement components, got {}",
                self.tag,
                ug.len()
            )));
        }
        let ug = Vec6::from_column_slice(ug);

        if self.formulation == Formulation::Corotational {
            let dx = (self.xj + Vec2::new(ug[3], ug[4])) - (self.xi + Vec2::new(ug[0], ug[1]));
            self.trial = Chord::new(self.tag, &dx)?;
        }
        self.ug_trial = ug;
        Ok(())
    }

    fn length(&self) -> f64 {
        self.trial.length
    }

    fn initial_length(&self) -> f64 {
        self.initial.length
    }

    fn commit_state(&mut self) {
        self.committed = self.trial;
        self.ug_committed = self.ug_trial;
    }

    fn revert_to_last_commit(&mut self) {
        self.trial = self.committed;
        self.ug_trial = self.ug_committed;
    }

    fn revert_to_start(&mut self) {
        debug!(transform = self.tag, "revert to start");
        self.trial = self.initial;
        self.committed = self.initial;
        self.ug_trial = Vec6::zeros();
        self.ug_committed = Vec6::zeros();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn inclined_chord() {
        let mut t = CrdTransf2d::new(2, Formulation::Linear);
        t.initialize(&[1.0, 1.0], &[4.0, 5.0]).unwrap();
        assert_relative_eq!(t.length(), 5.0);
        let (c, s) = t.direction();
        assert_relative_eq!(c, 0.6);
        assert_relative_eq!(s, 0.8);

        let r = t.rotation();
        assert_relative_eq!(r * r.transpose(), Mat6::identity(), epsilon = 1e-14);
    }

    #[test]
    fn global_axial_displacement_maps_to_local_x() {
        let mut t = CrdTransf2d::new(2, Formulation::Linear);
        t.initialize(&[0.0, 0.0], &[0.0, 2.0]).unwrap();
        let ul = t.global_to_local(&Vec6::new(0.0, 0.0, 0.0, 0.0, 0.1, 0.0));
        assert_relative_eq!(ul, Vec6::new(0.0, 0.0, 0.0, 0.1, 0.0, 0.0), epsilon = 1e-14);
    }

    #[test]
    fn coincident_nodes_are_rejected() {
        let mut t = CrdTransf2d::new(9, Formulation::Linear);
        assert_eq!(
            t.initialize(&[3.0, 3.0], &[3.0, 3.0]).unwrap_err(),
            Error::ZeroLength(9)
        );
    }

    #[test]
    fn corotational_follows_nodes_and_reverts() {
        let mut t = CrdTransf2d::new(1, Formulation::Corotational);
        t.initialize(&[0.0, 0.0], &[1.0, 0.0]).unwrap();

        t.update(&[0.0, 0.0, 0.0, -1.0, 1.0, 0.0]).unwrap();
        let (c, s) = t.direction();
        assert_relative_eq!(c, 0.0, epsilon = 1e-14);
        assert_relative_eq!(s, 1.0, epsilon = 1e-14);

        t.revert_to_last_commit();
        assert_eq!(t.direction(), (1.0, 0.0));
        assert_eq!(t.trial_displacement(), &Vec6::zeros());
    }

    #[test]
    fn linear_formulation_ignores_displacements() {
        let mut t = CrdTransf2d::new(1, Formulation::Linear);
        t.initialize(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        t.update(&[0.0, 0.0, 0.0, -1.0, 1.0, 0.0]).unwrap();
        assert_eq!(t.direction(), (1.0, 0.0));
        assert_eq!(t.length(), 1.0);
    }
}
