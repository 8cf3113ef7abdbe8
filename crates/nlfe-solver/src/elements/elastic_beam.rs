//! Elastic 3D beam-column in the natural basic system.
//!
//! Basic deformations come straight from [`CrdTransf3d`]. The P-Δ moments
//! use the bearings' shared correction with the shear split evenly between
//! the ends.

use nalgebra::{DMatrix, DVector};
use nlfe_io::Channel;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::kinematics::{BasicState, SPATIAL, basic_to_local};
use super::{
    ELASTIC_BEAM_3D_CLASS_TAG, Element, ElementHeader, ElementPhase, Lifecycle, ResponseKind,
    gather_displacements, resolve_nodes,
};
use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::linalg::{LENGTH_TOL, Mat6, Mat12, Vec3, Vec12, to_dmatrix, to_dvector};
use crate::transform::{CoordTransform, CrdTransf3d, Formulation};

/// Orientation vector followed by the six section constants.
const DATA_LEN: usize = 9;

const SHEAR_DIST: f64 = 0.5;

/// Section constants of an elastic beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticSection3d {
    /// Young's modulus
    pub e: f64,
    /// Shear modulus
    pub g: f64,
    pub a: f64,
    /// Second moment of area about local y
    pub iy: f64,
    /// Second moment of area about local z
    pub iz: f64,
    /// Torsional constant
    pub j: f64,
}

impl ElasticSection3d {
    pub fn validate(&self) -> Result<()> {
        let values = [self.e, self.g, self.a, self.iy, self.iz, self.j];
        if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(Error::Construction(
                "section constants must be finite and positive".into(),
            ));
        }
        Ok(())
    }

    /// Natural stiffness for basic order `[axial, θz_i, θz_j, θy_i, θy_j, twist]`.
    pub fn natural_stiffness(&self, length: f64) -> Mat6 {
        let mut kb = Mat6::zeros();
        if length < LENGTH_TOL {
            return kb;
        }
        let ei_z = self.e * self.iz / length;
        let ei_y = self.e * self.iy / length;

        kb[(0, 0)] = self.e * self.a / length;

        kb[(1, 1)] = 4.0 * ei_z;
        kb[(2, 2)] = 4.0 * ei_z;
        kb[(1, 2)] = 2.0 * ei_z;
        kb[(2, 1)] = 2.0 * ei_z;

        kb[(3, 3)] = 4.0 * ei_y;
        kb[(4, 4)] = 4.0 * ei_y;
        kb[(3, 4)] = 2.0 * ei_y;
        kb[(4, 3)] = 2.0 * ei_y;

        kb[(5, 5)] = self.g * self.j / length;
        kb
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElasticBeam3d {
    tag: i32,
    nodes: [i32; 2],
    section: ElasticSection3d,
    transform: CrdTransf3d,
    life: Lifecycle,
    trial: BasicState<6>,
    committed: BasicState<6>,
}

impl ElasticBeam3d {
    pub fn new(
        tag: i32,
        nodes: [i32; 2],
        section: ElasticSection3d,
        vecxz: Vec3,
        formulation: Formulation,
    ) -> Result<Self> {
        section.validate()?;
        let transform = CrdTransf3d::new(tag, vecxz, formulation)?;
        let at_rest = BasicState::at_rest(Mat6::zeros());
        Ok(Self {
            tag,
            nodes,
            section,
            transform,
            life: Lifecycle::new(tag),
            trial: at_rest,
            committed: at_rest,
        })
    }

    pub fn section(&self) -> &ElasticSection3d {
        &self.section
    }

    pub fn transform(&self) -> &CrdTransf3d {
        &self.transform
    }

    pub fn basic(&self) -> &BasicState<6> {
        &self.trial
    }

    fn initial_kb(&self) -> Mat6 {
        self.section
            .natural_stiffness(self.transform.initial_length())
    }

    fn local_response(&self) -> (Mat12, Vec12) {
        let ul = self
            .transform
            .global_to_local(self.transform.trial_displacement());
        basic_to_local(
            &SPATIAL,
            &self.transform.natural_to_local(),
            &self.trial,
            self.transform.length(),
            SHEAR_DIST,
            &ul,
            self.transform.formulation(),
        )
    }

    fn global_stiffness(&self) -> Mat12 {
        if !self.life.is_active() {
            return Mat12::zeros();
        }
        self.transform.local_to_global_stiff(&self.local_response().0)
    }

    fn global_force(&self) -> Vec12 {
        if !self.life.is_active() {
            return Vec12::zeros();
        }
        self.transform.local_to_global_force(&self.local_response().1)
    }

    pub(crate) fn recv_body(
        header: ElementHeader,
        commit_tag: i32,
        channel: &mut dyn Channel,
    ) -> Result<Self> {
        let data = header.recv_data(DATA_LEN, commit_tag, channel)?;
        let section = ElasticSection3d {
            e: data[3],
            g: data[4],
            a: data[5],
            iy: data[6],
            iz: data[7],
            j: data[8],
        };
        Self::new(
            header.tag,
            header.nodes,
            section,
            Vec3::new(data[0], data[1], data[2]),
            header.formulation,
        )
    }
}

impl Element for ElasticBeam3d {
    fn tag(&self) -> i32 {
        self.tag
    }

    fn class_tag(&self) -> i32 {
        ELASTIC_BEAM_3D_CLASS_TAG
    }

    fn node_tags(&self) -> [i32; 2] {
        self.nodes
    }

    fn dofs_per_node(&self) -> usize {
        6
    }

    fn phase(&self) -> ElementPhase {
        self.life.phase()
    }

    fn set_domain(&mut self, domain: &Domain) -> Result<()> {
        let [ni, nj] = resolve_nodes(domain, self.nodes, 6, 3)?;
        let geometry = self
            .transform
            .initialize(ni.coordinates(), nj.coordinates());

        let at_rest = BasicState::at_rest(if geometry.is_ok() {
            self.initial_kb()
        } else {
            Mat6::zeros()
        });
        self.trial = at_rest;
        self.committed = at_rest;
        self.life.bind(geometry)
    }

    fn update(&mut self, domain: &Domain) -> Result<()> {
        self.life.check_active()?;

        let ug = gather_displacements::<12>(domain, self.nodes)?;
        if let Err(err) = self.transform.update(ug.as_slice()) {
            self.revert_to_last_commit();
            return Err(err);
        }

        let ub = self.transform.basic_trial_disp();
        let kb = self.initial_kb();
        let qb = kb * ub;

        self.trial = BasicState { ub, qb, kb };
        self.life.trial_set();
        Ok(())
    }

    fn commit_state(&mut self) {
        self.transform.commit_state();
        self.committed = self.trial;
        self.life.commit();
    }

    fn revert_to_last_commit(&mut self) {
        self.transform.revert_to_last_commit();
        self.trial = self.committed;
        self.life.revert();
    }

    fn revert_to_start(&mut self) {
        debug!(element = self.tag, "revert to start");
        self.transform.revert_to_start();
        let at_rest = BasicState::at_rest(if self.life.is_active() {
            self.initial_kb()
        } else {
            Mat6::zeros()
        });
        self.trial = at_rest;
        self.committed = at_rest;
        self.life.reset();
    }

    fn tangent_stiff(&self) -> DMatrix<f64> {
        to_dmatrix(&self.global_stiffness())
    }

    fn initial_stiff(&self) -> DMatrix<f64> {
        if !self.life.is_active() {
            return DMatrix::zeros(12, 12);
        }
        to_dmatrix(&self.transform.initial_basic_to_global_stiff(&self.initial_kb()))
    }

    fn resisting_force(&self) -> DVector<f64> {
        to_dvector(&self.global_force())
    }

    fn response(&self, kind: ResponseKind) -> Result<Vec<f64>> {
        let values = match kind {
            ResponseKind::GlobalForce => self.global_force().as_slice().to_vec(),
            ResponseKind::LocalForce => self.local_response().1.as_slice().to_vec(),
            ResponseKind::BasicForce => self.trial.qb.as_slice().to_vec(),
            ResponseKind::LocalDisplacement => self
                .transform
                .global_to_local(self.transform.trial_displacement())
                .as_slice()
                .to_vec(),
            ResponseKind::BasicDisplacement => self.trial.ub.as_slice().to_vec(),
            ResponseKind::BasicStiffness => self.trial.kb_row_major(),
            ResponseKind::HystereticVariables => {
                return Err(Error::UnknownResponse(kind.id()));
            }
        };
        Ok(values)
    }

    fn send_self(&self, commit_tag: i32, channel: &mut dyn Channel) -> Result<()> {
        let v = self.transform.vecxz();
        let s = &self.section;
        let header = ElementHeader {
            class_tag: ELASTIC_BEAM_3D_CLASS_TAG,
            tag: self.tag,
            nodes: self.nodes,
            formulation: self.transform.formulation(),
            data_len: DATA_LEN,
        };
        header.send(
            &[v.x, v.y, v.z, s.e, s.g, s.a, s.iy, s.iz, s.j],
            commit_tag,
            channel,
        )
    }
}
