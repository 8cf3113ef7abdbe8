//! Local-to-basic kinematics shared by the two-node elements.
//!
//! A bearing has as many basic deformations as DOFs per node: each basic
//! component is the relative displacement of node J with respect to node I
//! in the local frame. The shear components are additionally corrected by
//! the end rotations, weighted by the shear-distribution ratio `sd`
//! (`0` puts the shear at node J, `1` at node I):
//!
//! ```text
//! ub_shear = ul_j - ul_i + sign · L · (sd · θ_i + (1 - sd) · θ_j)
//! ```
//!
//! The same shear couplings place the P-Δ moments: see [`p_delta_stiffness`].

use nalgebra::{SMatrix, SVector};

use crate::linalg::{LENGTH_TOL, triple_product};
use crate::transform::Formulation;

/// Shear slot coupled to an end rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShearCoupling {
    /// Basic (and local translation) index of the shear component.
    pub slot: usize,
    /// Local rotation DOF at node I; node J is `rotation + ndf`.
    pub rotation: usize,
    pub sign: f64,
}

/// DOF layout of a two-node element with one basic component per DOF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicLayout {
    pub ndf: usize,
    pub shear: &'static [ShearCoupling],
}

/// `[N, V, M]` with 3 DOFs per node.
pub const PLANAR: BasicLayout = BasicLayout {
    ndf: 3,
    shear: &[ShearCoupling {
        slot: 1,
        rotation: 2,
        sign: -1.0,
    }],
};

/// `[N, Vy, Vz, T, My, Mz]` with 6 DOFs per node.
pub const SPATIAL: BasicLayout = BasicLayout {
    ndf: 6,
    shear: &[
        ShearCoupling {
            slot: 1,
            rotation: 5,
            sign: -1.0,
        },
        ShearCoupling {
            slot: 2,
            rotation: 4,
            sign: 1.0,
        },
    ],
};

/// Basic deformation, force and stiffness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicState<const NB: usize> {
    pub ub: SVector<f64, NB>,
    pub qb: SVector<f64, NB>,
    pub kb: SMatrix<f64, NB, NB>,
}

impl<const NB: usize> BasicState<NB> {
    /// Undeformed state with stiffness `kb`.
    pub fn at_rest(kb: SMatrix<f64, NB, NB>) -> Self {
        Self {
            ub: SVector::zeros(),
            qb: SVector::zeros(),
            kb,
        }
    }

    /// Basic stiffness flattened row by row.
    pub fn kb_row_major(&self) -> Vec<f64> {
        (0..NB)
            .flat_map(|i| (0..NB).map(move |j| (i, j)))
            .map(|ij| self.kb[ij])
            .collect()
    }
}

/// Local-to-basic matrix (`NB × NL`) for `layout`.
pub fn local_to_basic<const NB: usize, const NL: usize>(
    layout: &BasicLayout,
    length: f64,
    shear_dist: f64,
) -> SMatrix<f64, NB, NL> {
    debug_assert_eq!(NB, layout.ndf);
    debug_assert_eq!(NL, 2 * layout.ndf);

    let mut tlb = SMatrix::<f64, NB, NL>::zeros();
    for i in 0..NB {
        tlb[(i, i)] = -1.0;
        tlb[(i, i + layout.ndf)] = 1.0;
    }
    for c in layout.shear {
        tlb[(c.slot, c.rotation)] = c.sign * shear_dist * length;
        tlb[(c.slot, c.rotation + layout.ndf)] = c.sign * (1.0 - shear_dist) * length;
    }
    tlb
}

/// Geometric (P-Δ) correction in local coordinates.
///
/// Half the axial force `P` acts on each end moment through the lateral
/// offset of the nodes. The end rotations carry `P/2 · sd · L` at node I and
/// `P/2 · (1 - sd) · L` at node J, matching where the shear is applied. The
/// translation rows are untouched, so the correction is unsymmetric unless
/// `P` vanishes.
pub fn p_delta_stiffness<const NL: usize>(
    layout: &BasicLayout,
    axial: f64,
    length: f64,
    shear_dist: f64,
) -> SMatrix<f64, NL, NL> {
    debug_assert_eq!(NL, 2 * layout.ndf);

    let mut kg = SMatrix::<f64, NL, NL>::zeros();
    if length < LENGTH_TOL || axial == 0.0 {
        return kg;
    }
    let n = layout.ndf;
    let half = 0.5 * axial;
    let k_i = half * shear_dist * length;
    let k_j = half * (1.0 - shear_dist) * length;
    for c in layout.shear {
        let (ti, tj) = (c.slot, c.slot + n);
        let (ri, rj) = (c.rotation, c.rotation + n);
        for r in [ri, rj] {
            kg[(r, ti)] += c.sign * half;
            kg[(r, tj)] -= c.sign * half;
        }
        kg[(ri, ri)] += k_i;
        kg[(rj, ri)] -= k_i;
        kg[(ri, rj)] -= k_j;
        kg[(rj, rj)] += k_j;
    }
    kg
}

/// Local stiffness and force of a basic state, including P-Δ.
///
/// A corotational frame already rotates with the chord, so only the linear
/// formulation adds the P-Δ moments to the force.
pub fn basic_to_local<const NB: usize, const NL: usize>(
    layout: &BasicLayout,
    tlb: &SMatrix<f64, NB, NL>,
    basic: &BasicState<NB>,
    length: f64,
    shear_dist: f64,
    ul: &SVector<f64, NL>,
    formulation: Formulation,
) -> (SMatrix<f64, NL, NL>, SVector<f64, NL>) {
    let kg = p_delta_stiffness::<NL>(layout, basic.qb[0], length, shear_dist);
    let kl = triple_product(tlb, &basic.kb) + kg;
    let mut ql = tlb.transpose() * basic.qb;
    if formulation == Formulation::Linear {
        ql += kg * ul;
    }
    (kl, ql)
}
