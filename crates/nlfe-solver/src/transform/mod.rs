//! Coordinate transformations for two-node elements.
//!
//! Three systems are involved:
//! - **global**: nodal DOFs in the fixed structural frame
//! - **local**: element-aligned frame, local x along the chord
//! - **basic**: deformations with rigid-body modes removed
//!
//! A transform owns the rotation `R` (rows are the local axes in global
//! coordinates) and the element length, with trial, committed and initial
//! copies so that elements can commit and revert it with the rest of their
//! state.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod frame3d;
pub mod planar;

pub use frame3d::CrdTransf3d;
pub use planar::CrdTransf2d;

/// How the local frame follows the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formulation {
    /// Frame fixed at its initial orientation (small displacements).
    #[default]
    Linear,
    /// Chord re-evaluated from trial coordinates every iteration.
    Corotational,
}

impl Formulation {
    pub(crate) fn code(self) -> i32 {
        match self {
            Formulation::Linear => 0,
            Formulation::Corotational => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Formulation::Linear),
            1 => Ok(Formulation::Corotational),
            other => Err(Error::SerializationMismatch(format!(
                "unknown transform formulation code {other}"
            ))),
        }
    }
}

/// Lifecycle shared by all coordinate transforms.
pub trait CoordTransform {
    fn tag(&self) -> i32;

    fn formulation(&self) -> Formulation;

    /// Compute the initial frame and length from the reference coordinates
    /// of node I and node J.
    fn initialize(&mut self, xi: &[f64], xj: &[f64]) -> Result<()>;

    /// Refresh the trial frame from global trial displacements
    /// (node I DOFs followed by node J DOFs).
    fn update(&mut self, ug: &[f64]) -> Result<()>;

    /// Trial element length.
    fn length(&self) -> f64;

    /// Length at initialization.
    fn initial_length(&self) -> f64;

    fn commit_state(&mut self);

    fn revert_to_last_commit(&mut self);

    fn revert_to_start(&mut self);
}
