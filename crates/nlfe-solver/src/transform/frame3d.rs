//! Three-dimensional two-node frame transformation.
//!
//! Each node carries 6 DOFs (ux, uy, uz, θx, θy, θz); the element has 12
//! local DOFs and 6 natural (basic) deformations:
//!
//! ```text
//! ub = [ axial, θz_i, θz_j, θy_i, θy_j, twist ]
//! ```
//!
//! The natural-to-local matrix λ removes the rigid-body chord rotation:
//!
//! ```text
//! axial = ul6 - ul0
//! θz_i  = ul5  + (ul1 - ul7) / L        θz_j = ul11 + (ul1 - ul7) / L
//! θy_i  = ul4  + (ul8 - ul2) / L        θy_j = ul10 + (ul8 - ul2) / L
//! twist = ul9 - ul3
//! ```

use nalgebra::SMatrix;
use tracing::{debug, warn};

use super::{CoordTransform, Formulation};
use crate::error::{Error, Result};
use crate::linalg::{LENGTH_TOL, Mat3, Mat6, Mat12, Vec3, Vec6, Vec12, block_diagonal, triple_product};

/// Minimum |reference × chord| before the orientation is degenerate.
const ORIENTATION_TOL: f64 = 1e-12;

/// Natural-to-local matrix λ (6 × 12).
pub type NaturalToLocal = SMatrix<f64, 6, 12>;

/// Rotation and length snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    r: Mat3,
    length: f64,
}

impl Frame {
    fn undefined() -> Self {
        Self {
            r: Mat3::identity(),
            length: 0.0,
        }
    }

    /// Local x along `chord`, `vecxz` lying in the local x-z plane.
    fn from_xz_plane(tag: i32, chord: &Vec3, vecxz: &Vec3) -> Result<Self> {
        let (ex, length) = unit_chord(tag, chord)?;

        let y = vecxz.cross(&ex);
        let norm = y.norm();
        if norm < ORIENTATION_TOL {
            return Err(Error::DegenerateOrientation(tag));
        }
        let ey = y / norm;
        let ez = ex.cross(&ey);

        Ok(Self {
            r: Mat3::from_rows(&[ex.transpose(), ey.transpose(), ez.transpose()]),
            length,
        })
    }

    /// Local x along `chord`, `y_ref` lying in the local x-y plane.
    fn from_xy_plane(tag: i32, chord: &Vec3, y_ref: &Vec3) -> Result<Self> {
        let (ex, length) = unit_chord(tag, chord)?;

        let z = ex.cross(y_ref);
        let norm = z.norm();
        if norm < ORIENTATION_TOL {
            return Err(Error::DegenerateOrientation(tag));
        }
        let ez = z / norm;
        let ey = ez.cross(&ex);

        Ok(Self {
            r: Mat3::from_rows(&[ex.transpose(), ey.transpose(), ez.transpose()]),
            length,
        })
    }

    fn axis(&self, i: usize) -> Vec3 {
        self.r.row(i).transpose()
    }

    fn block_rotation(&self) -> Mat12 {
        block_diagonal(&self.r)
    }
}

fn unit_chord(tag: i32, chord: &Vec3) -> Result<(Vec3, f64)> {
    let length = chord.norm();
    if !(length >= LENGTH_TOL) {
        return Err(Error::ZeroLength(tag));
    }
    Ok((chord / length, length))
}

/// λ for a given length; zero when the length is degenerate.
fn natural_to_local_for(length: f64) -> NaturalToLocal {
    let mut lambda = NaturalToLocal::zeros();
    if length < LENGTH_TOL {
        return lambda;
    }
    let one_over_l = 1.0 / length;

    lambda[(0, 0)] = -1.0;
    lambda[(0, 6)] = 1.0;

    for (row, rot) in [(1, 5), (2, 11)] {
        lambda[(row, 1)] = one_over_l;
        lambda[(row, 7)] = -one_over_l;
        lambda[(row, rot)] = 1.0;
    }

    for (row, rot) in [(3, 4), (4, 10)] {
        lambda[(row, 2)] = -one_over_l;
        lambda[(row, 8)] = one_over_l;
        lambda[(row, rot)] = 1.0;
    }

    lambda[(5, 3)] = -1.0;
    lambda[(5, 9)] = 1.0;

    lambda
}

/// Coordinate transformation for a two-node 3D frame element.
///
/// The local coordinate system is defined with:
/// - x-axis along the chord (node I → node J)
/// - y-axis = `vecxz × x`, so `vecxz` lies in the local x-z plane
/// - z-axis = `x × y` (right handed)
#[derive(Debug, Clone, PartialEq)]
pub struct CrdTransf3d {
    tag: i32,
    vecxz: Vec3,
    formulation: Formulation,
    xi: Vec3,
    xj: Vec3,
    trial: Frame,
    committed: Frame,
    initial: Frame,
    ug_trial: Vec12,
    ug_committed: Vec12,
}

impl CrdTransf3d {
    /// Create a transform with the given orientation vector.
    ///
    /// # Errors
    /// `Construction` when `vecxz` is zero or not finite.
    pub fn new(tag: i32, vecxz: Vec3, formulation: Formulation) -> Result<Self> {
        let norm = vecxz.norm();
        if !norm.is_finite() || norm < LENGTH_TOL {
            return Err(Error::Construction(format!(
                "transform {tag}: orientation vector must be finite and nonzero"
            )));
        }

        Ok(Self {
            tag,
            vecxz: vecxz / norm,
            formulation,
            xi: Vec3::zeros(),
            xj: Vec3::zeros(),
            trial: Frame::undefined(),
            committed: Frame::undefined(),
            initial: Frame::undefined(),
            ug_trial: Vec12::zeros(),
            ug_committed: Vec12::zeros(),
        })
    }

    /// Normalized orientation vector.
    pub fn vecxz(&self) -> &Vec3 {
        &self.vecxz
    }

    /// Trial rotation, rows are the local axes.
    pub fn rotation(&self) -> &Mat3 {
        &self.trial.r
    }

    pub fn initial_rotation(&self) -> &Mat3 {
        &self.initial.r
    }

    /// Trial local (x, y, z) axes in global coordinates.
    pub fn local_axes(&self) -> (Vec3, Vec3, Vec3) {
        (self.trial.axis(0), self.trial.axis(1), self.trial.axis(2))
    }

    /// Global displacements last passed to `update`.
    pub fn trial_displacement(&self) -> &Vec12 {
        &self.ug_trial
    }

    pub fn global_to_local(&self, ug: &Vec12) -> Vec12 {
        self.trial.block_rotation() * ug
    }

    pub fn local_to_global_force(&self, ql: &Vec12) -> Vec12 {
        self.trial.block_rotation().transpose() * ql
    }

    pub fn local_to_global_stiff(&self, kl: &Mat12) -> Mat12 {
        triple_product(&self.trial.block_rotation(), kl)
    }

    /// Same as [`local_to_global_stiff`](Self::local_to_global_stiff) with
    /// the initial frame.
    pub fn initial_local_to_global_stiff(&self, kl: &Mat12) -> Mat12 {
        triple_product(&self.initial.block_rotation(), kl)
    }

    /// λ at the trial length.
    pub fn natural_to_local(&self) -> NaturalToLocal {
        natural_to_local_for(self.trial.length)
    }

    /// Basic deformations for `ug` through the trial frame.
    ///
    /// With the corotational formulation the axial slot is the chord
    /// elongation `L - L0`.
    pub fn transform_to_basic(&self, ug: &Vec12) -> Vec6 {
        let ul = self.global_to_local(ug);
        let mut ub = self.natural_to_local() * ul;
        if self.formulation == Formulation::Corotational {
            ub[0] = self.trial.length - self.initial.length;
        }
        ub
    }

    /// Basic deformations for the last `update`.
    pub fn basic_trial_disp(&self) -> Vec6 {
        self.transform_to_basic(&self.ug_trial)
    }

    /// `Tᵗ λᵗ qb`
    pub fn basic_to_global_force(&self, qb: &Vec6) -> Vec12 {
        let ql = self.natural_to_local().transpose() * qb;
        self.local_to_global_force(&ql)
    }

    /// `Tᵗ (λᵗ kb λ) T`
    pub fn basic_to_global_stiff(&self, kb: &Mat6) -> Mat12 {
        let kl = triple_product(&self.natural_to_local(), kb);
        self.local_to_global_stiff(&kl)
    }

    /// Basic-to-global stiffness through the initial frame and length.
    pub fn initial_basic_to_global_stiff(&self, kb: &Mat6) -> Mat12 {
        let kl = triple_product(&natural_to_local_for(self.initial.length), kb);
        self.initial_local_to_global_stiff(&kl)
    }

    fn corotational_frame(&self, ug: &Vec12) -> Result<Frame> {
        let ui = Vec3::new(ug[0], ug[1], ug[2]);
        let uj = Vec3::new(ug[6], ug[7], ug[8]);
        let chord = (self.xj + uj) - (self.xi + ui);

        // incremental nodal rotations since the last commit, projected on
        // the committed local x axis
        let ex = self.committed.axis(0);
        let dtheta_i = Vec3::new(
            ug[3] - self.ug_committed[3],
            ug[4] - self.ug_committed[4],
            ug[5] - self.ug_committed[5],
        );
        let dtheta_j = Vec3::new(
            ug[9] - self.ug_committed[9],
            ug[10] - self.ug_committed[10],
            ug[11] - self.ug_committed[11],
        );
        let theta = 0.5 * (ex.dot(&dtheta_i) + ex.dot(&dtheta_j));

        // small-angle tangent perturbation of the committed y axis
        let y_ref = self.committed.axis(1) + self.committed.axis(2) * theta.tan();

        Frame::from_xy_plane(self.tag, &chord, &y_ref)
    }
}

impl CoordTransform for CrdTransf3d {
    fn tag(&self) -> i32 {
        self.tag
    }

    fn formulation(&self) -> Formulation {
        self.formulation
    }

    fn initialize(&mut self, xi: &[f64], xj: &[f64]) -> Result<()> {
        if xi.len() < 3 || xj.len() < 3 {
            return Err(Error::Construction(format!(
                "transform {}: 3D transform requires 3 coordinates per node",
                self.tag
            )));
        }
        self.xi = Vec3::new(xi[0], xi[1], xi[2]);
        self.xj = Vec3::new(xj[0], xj[1], xj[2]);

        let frame = Frame::from_xz_plane(self.tag, &(self.xj - self.xi), &self.vecxz)
            .inspect_err(|err| warn!(transform = self.tag, error = %err, "cannot initialize frame"))?;

        self.trial = frame;
        self.committed = frame;
        self.initial = frame;
        self.ug_trial = Vec12::zeros();
        self.ug_committed = Vec12::zeros();
        Ok(())
    }

    fn update(&mut self, ug: &[f64]) -> Result<()> {
        if ug.len() != 12 {
            return Err(Error::Construction(format!(
                "transform {}: expected 12 displacement components, got {}",
                self.tag,
                ug.len()
            )));
        }
        let ug = Vec12::from_column_slice(ug);

        if self.formulation == Formulation::Corotational {
            self.trial = self.corotational_frame(&ug)?;
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
        self.ug_trial = Vec12::zeros();
        self.ug_committed = Vec12::zeros();
    }
}
