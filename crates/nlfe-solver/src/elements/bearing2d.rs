//! Two-node planar bearing, basic system `[N, V, M]`.

use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, Vector3};
use nlfe_io::Channel;
use tracing::debug;

use super::kinematics::{BasicState, PLANAR, basic_to_local, local_to_basic};
use super::{
    BEARING_2D_CLASS_TAG, Element, ElementHeader, ElementPhase, Lifecycle, ResponseKind,
    check_shear_dist, gather_displacements, resolve_nodes,
};
use crate::domain::Domain;
use crate::error::Result;
use crate::linalg::{Mat6, Vec6, to_dmatrix, to_dvector, triple_product};
use crate::materials::{HystereticState, UniaxialMaterial};
use crate::transform::{CoordTransform, CrdTransf2d, Formulation};

/// Shear distribution ratio.
const DATA_LEN: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Bearing2dMaterials {
    pub axial: UniaxialMaterial,
    pub shear: UniaxialMaterial,
    pub moment: UniaxialMaterial,
}

impl Bearing2dMaterials {
    fn iter(&self) -> impl Iterator<Item = &UniaxialMaterial> {
        [&self.axial, &self.shear, &self.moment].into_iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut UniaxialMaterial> {
        [&mut self.axial, &mut self.shear, &mut self.moment].into_iter()
    }

    fn initial_stiffness(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::new(
            self.axial.initial_tangent(),
            self.shear.initial_tangent(),
            self.moment.initial_tangent(),
        ))
    }
}

/// Planar bearing element (3 DOFs per node).
#[derive(Debug, Clone, PartialEq)]
pub struct Bearing2d {
    tag: i32,
    nodes: [i32; 2],
    materials: Bearing2dMaterials,
    shear_dist: f64,
    transform: CrdTransf2d,
    life: Lifecycle,
    trial: BasicState<3>,
    committed: BasicState<3>,
}

impl Bearing2d {
    pub fn new(
        tag: i32,
        nodes: [i32; 2],
        materials: Bearing2dMaterials,
        shear_dist: f64,
        formulation: Formulation,
    ) -> Result<Self> {
        check_shear_dist(tag, shear_dist)?;
        let at_rest = BasicState::at_rest(materials.initial_stiffness());
        Ok(Self {
            tag,
            nodes,
            materials,
            shear_dist,
            transform: CrdTransf2d::new(tag, formulation),
            life: Lifecycle::new(tag),
            trial: at_rest,
            committed: at_rest,
        })
    }

    pub fn materials(&self) -> &Bearing2dMaterials {
        &self.materials
    }

    pub fn transform(&self) -> &CrdTransf2d {
        &self.transform
    }

    pub fn basic(&self) -> &BasicState<3> {
        &self.trial
    }

    fn tlb(&self, length: f64) -> SMatrix<f64, 3, 6> {
        local_to_basic::<3, 6>(&PLANAR, length, self.shear_dist)
    }

    fn local_displacement(&self) -> Vec6 {
        self.transform
            .global_to_local(self.transform.trial_displacement())
    }

    fn local_response(&self) -> (Mat6, Vec6) {
        if !self.life.is_active() {
            return (Mat6::zeros(), Vec6::zeros());
        }
        let length = self.transform.length();
        basic_to_local(
            &PLANAR,
            &self.tlb(length),
            &self.trial,
            length,
            self.shear_dist,
            &self.local_displacement(),
            self.transform.formulation(),
        )
    }

    /// Transform, material and basic trial update. May leave the trial
    /// slots partially advanced on error.
    fn trial_update(&mut self, domain: &Domain) -> Result<()> {
        let ug = gather_displacements::<6>(domain, self.nodes)?;
        self.transform.update(ug.as_slice())?;

        let length = self.transform.length();
        let ul = self.transform.global_to_local(&ug);
        let mut ub = self.tlb(length) * ul;
        if self.transform.formulation() == Formulation::Corotational {
            ub[0] = length - self.transform.initial_length();
        }

        for (material, u) in self.materials.iter_mut().zip(ub.iter()) {
            material.set_trial_strain(*u)?;
        }

        let m = &self.materials;
        let qb = Vector3::new(m.axial.stress(), m.shear.stress(), m.moment.stress());
        let kb = Matrix3::from_diagonal(&Vector3::new(
            m.axial.tangent(),
            m.shear.tangent(),
            m.moment.tangent(),
        ));

        self.trial = BasicState { ub, qb, kb };
        self.life.trial_set();
        Ok(())
    }

    pub(crate) fn recv_body(
        header: ElementHeader,
        commit_tag: i32,
        channel: &mut dyn Channel,
    ) -> Result<Self> {
        let data = header.recv_data(DATA_LEN, commit_tag, channel)?;
        let materials = Bearing2dMaterials {
            axial: UniaxialMaterial::recv_self(commit_tag, channel)?,
            shear: UniaxialMaterial::recv_self(commit_tag, channel)?,
            moment: UniaxialMaterial::recv_self(commit_tag, channel)?,
        };
        Self::new(
            header.tag,
            header.nodes,
            materials,
            data[0],
            header.formulation,
        )
    }
}

impl Element for Bearing2d {
    fn tag(&self) -> i32 {
        self.tag
    }

    fn class_tag(&self) -> i32 {
        BEARING_2D_CLASS_TAG
    }

    fn node_tags(&self) -> [i32; 2] {
        self.nodes
    }

    fn dofs_per_node(&self) -> usize {
        3
    }

    fn phase(&self) -> ElementPhase {
        self.life.phase()
    }

    fn set_domain(&mut self, domain: &Domain) -> Result<()> {
        let [ni, nj] = resolve_nodes(domain, self.nodes, 3, 2)?;
        let geometry = self
            .transform
            .initialize(ni.coordinates(), nj.coordinates());

        let at_rest = BasicState::at_rest(self.materials.initial_stiffness());
        self.trial = at_rest;
        self.committed = at_rest;
        self.life.bind(geometry)
    }

    fn update(&mut self, domain: &Domain) -> Result<()> {
        self.life.check_active()?;
        let result = self.trial_update(domain);
        if result.is_err() {
            self.revert_to_last_commit();
        }
        result
    }

    fn commit_state(&mut self) {
        self.materials.iter_mut().for_each(|m| m.commit_state());
        self.transform.commit_state();
        self.committed = self.trial;
        self.life.commit();
    }

    fn revert_to_last_commit(&mut self) {
        self.materials
            .iter_mut()
            .for_each(|m| m.revert_to_last_commit());
        self.transform.revert_to_last_commit();
        self.trial = self.committed;
        self.life.revert();
    }

    fn revert_to_start(&mut self) {
        debug!(element = self.tag, "revert to start");
        self.materials.iter_mut().for_each(|m| m.revert_to_start());
        self.transform.revert_to_start();
        let at_rest = BasicState::at_rest(self.materials.initial_stiffness());
        self.trial = at_rest;
        self.committed = at_rest;
        self.life.reset();
    }

    fn tangent_stiff(&self) -> DMatrix<f64> {
        if !self.life.is_active() {
            return DMatrix::zeros(6, 6);
        }
        to_dmatrix(&self.transform.local_to_global_stiff(&self.local_response().0))
    }

    fn initial_stiff(&self) -> DMatrix<f64> {
        if !self.life.is_active() {
            return DMatrix::zeros(6, 6);
        }
        let length = self.transform.initial_length();
        let kl = triple_product(&self.tlb(length), &self.materials.initial_stiffness());
        to_dmatrix(&self.transform.initial_local_to_global_stiff(&kl))
    }

    fn resisting_force(&self) -> DVector<f64> {
        if !self.life.is_active() {
            return DVector::zeros(6);
        }
        to_dvector(&self.transform.local_to_global_force(&self.local_response().1))
    }

    fn response(&self, kind: ResponseKind) -> Result<Vec<f64>> {
        let values = match kind {
            ResponseKind::GlobalForce => self.resisting_force().as_slice().to_vec(),
            ResponseKind::LocalForce => self.local_response().1.as_slice().to_vec(),
            ResponseKind::BasicForce => self.trial.qb.as_slice().to_vec(),
            ResponseKind::LocalDisplacement => self.local_displacement().as_slice().to_vec(),
            ResponseKind::BasicDisplacement => self.trial.ub.as_slice().to_vec(),
            ResponseKind::HystereticVariables => self.materials.shear.hysteretic_variables(),
            ResponseKind::BasicStiffness => self.trial.kb_row_major(),
        };
        Ok(values)
    }

    fn send_self(&self, commit_tag: i32, channel: &mut dyn Channel) -> Result<()> {
        let header = ElementHeader {
            class_tag: BEARING_2D_CLASS_TAG,
            tag: self.tag,
            nodes: self.nodes,
            formulation: self.transform.formulation(),
            data_len: DATA_LEN,
        };
        header.send(&[self.shear_dist], commit_tag, channel)?;
        for material in self.materials.iter() {
            material.send_self(commit_tag, channel)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;
    use crate::elements::ElementKind;
    use crate::error::Error;
    use crate::materials::BoucWenParams;
    use approx::assert_relative_eq;
    use nlfe_io::MemoryChannel;

    fn bearing(formulation: Formulation) -> Bearing2d {
        let materials = Bearing2dMaterials {
            axial: UniaxialMaterial::elastic(1000.0).unwrap(),
            shear: UniaxialMaterial::bouc_wen(BoucWenParams {
                k0: 100.0,
                q_yield: 10.0,
                k2: 5.0,
                ..Default::default()
            })
            .unwrap(),
            moment: UniaxialMaterial::elastic(10.0).unwrap(),
        };
        Bearing2d::new(5, [1, 2], materials, 0.0, formulation).unwrap()
    }

    fn vertical_domain() -> Domain {
        let mut domain = Domain::new();
        domain.add_node(Node::new(1, &[0.0, 0.0], 3)).unwrap();
        domain.add_node(Node::new(2, &[0.0, 0.5], 3)).unwrap();
        domain
    }

    #[test]
    fn vertical_bearing_shears_along_global_x() {
        let mut b = bearing(Formulation::Linear);
        let mut d = vertical_domain();
        b.set_domain(&d).unwrap();

        // local y of a vertical bearing points along global -x
        d.node_mut(2)
            .unwrap()
            .set_trial_displacement(&[-0.02, 0.0, 0.0])
            .unwrap();
        b.update(&d).unwrap();

        let basic = b.basic();
        assert_relative_eq!(basic.ub[1], 0.02, epsilon = 1e-15);
        assert_eq!(basic.ub[0], 0.0);
        assert!(basic.qb[1] > 0.0);

        // equilibrium: end forces balance
        let f = b.resisting_force();
        assert_relative_eq!(f[0] + f[3], 0.0, epsilon = 1e-12);
        assert_relative_eq!(f[1] + f[4], 0.0, epsilon = 1e-12);
        // sd = 0: shear moment carried at node J
        assert_relative_eq!(f[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(f[5], -basic.qb[1] * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn bouc_wen_shear_history_reverts() {
        let mut b = bearing(Formulation::Linear);
        let mut d = vertical_domain();
        b.set_domain(&d).unwrap();

        d.node_mut(2).unwrap().set_trial_displacement(&[-0.05, 0.0, 0.0]).unwrap();
        b.update(&d).unwrap();
        b.commit_state();
        let committed = b.clone();

        d.node_mut(2).unwrap().set_trial_displacement(&[0.05, 0.0, 0.0]).unwrap();
        b.update(&d).unwrap();
        b.revert_to_last_commit();
        assert_eq!(b, committed);

        let z = b.response(ResponseKind::HystereticVariables).unwrap();
        assert_eq!(z.len(), 1);
        assert!(z[0] > 0.0 && z[0] <= 1.0);
    }

    #[test]
    fn coincident_nodes_are_degenerate() {
        let mut b = bearing(Formulation::Linear);
        let mut d = Domain::new();
        d.add_node(Node::new(1, &[1.0, 1.0], 3)).unwrap();
        d.add_node(Node::new(2, &[1.0, 1.0], 3)).unwrap();

        assert_eq!(b.set_domain(&d).unwrap_err(), Error::ZeroLength(5));
        assert!(b.tangent_stiff().iter().all(|v| *v == 0.0));
        assert!(b.resisting_force().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn corotational_axial_uses_chord_elongation() {
        let mut b = bearing(Formulation::Corotational);
        let mut d = vertical_domain();
        b.set_domain(&d).unwrap();
        d.node_mut(2).unwrap().set_trial_displacement(&[0.0, 0.01, 0.0]).unwrap();
        b.update(&d).unwrap();
        assert_relative_eq!(b.basic().ub[0], 0.01, epsilon = 1e-14);
        assert_relative_eq!(b.basic().qb[0], 10.0, epsilon = 1e-10);
    }

    #[test]
    fn roundtrip_through_channel() {
        let b = bearing(Formulation::Corotational);
        let mut channel = MemoryChannel::new();
        b.send_self(0, &mut channel).unwrap();
        let copy = ElementKind::recv_self(5, 0, &mut channel).unwrap();
        assert_eq!(copy, ElementKind::Bearing2d(b));

        let mut channel = MemoryChannel::new();
        bearing(Formulation::Linear).send_self(0, &mut channel).unwrap();
        assert!(matches!(
            ElementKind::recv_self(6, 0, &mut channel),
            Err(Error::SerializationMismatch(_))
        ));
    }
}
