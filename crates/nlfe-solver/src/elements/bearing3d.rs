//! Two-node 3D bearing with coupled shear hysteresis.
//!
//! Basic system `[N, Vy, Vz, T, My, Mz]`:
//! - axial, torsion and the two rotations each use a [`UniaxialMaterial`]
//! - the two shear components share one [`ShearModel`]

use nalgebra::{DMatrix, DVector, SMatrix, Vector2};
use nlfe_io::Channel;
use tracing::debug;

use super::kinematics::{BasicState, SPATIAL, basic_to_local, local_to_basic};
use super::{
    BEARING_3D_CLASS_TAG, Element, ElementHeader, ElementPhase, Lifecycle, ResponseKind,
    check_shear_dist, gather_displacements, resolve_nodes,
};
use crate::domain::Domain;
use crate::error::Result;
use crate::linalg::{Mat6, Mat12, Vec3, Vec6, Vec12, to_dmatrix, to_dvector, triple_product};
use crate::materials::{HystereticState, ShearModel, UniaxialMaterial};
use crate::transform::{CoordTransform, CrdTransf3d, Formulation};

/// Orientation vector followed by the shear distribution ratio.
const DATA_LEN: usize = 4;

/// Materials of the non-shear directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Bearing3dMaterials {
    pub axial: UniaxialMaterial,
    pub torsion: UniaxialMaterial,
    pub moment_y: UniaxialMaterial,
    pub moment_z: UniaxialMaterial,
}

impl Bearing3dMaterials {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut UniaxialMaterial> {
        [
            &mut self.axial,
            &mut self.torsion,
            &mut self.moment_y,
            &mut self.moment_z,
        ]
        .into_iter()
    }

    fn iter(&self) -> impl Iterator<Item = &UniaxialMaterial> {
        [&self.axial, &self.torsion, &self.moment_y, &self.moment_z].into_iter()
    }
}

/// 3D elastomeric/sliding bearing element.
#[derive(Debug, Clone, PartialEq)]
pub struct Bearing3d {
    tag: i32,
    nodes: [i32; 2],
    shear: ShearModel,
    materials: Bearing3dMaterials,
    shear_dist: f64,
    transform: CrdTransf3d,
    life: Lifecycle,
    trial: BasicState<6>,
    committed: BasicState<6>,
}

impl Bearing3d {
    /// # Errors
    /// `Construction` for a zero orientation vector or a shear distribution
    /// outside `[0, 1]`.
    pub fn new(
        tag: i32,
        nodes: [i32; 2],
        shear: ShearModel,
        materials: Bearing3dMaterials,
        vecxz: Vec3,
        shear_dist: f64,
        formulation: Formulation,
    ) -> Result<Self> {
        check_shear_dist(tag, shear_dist)?;
        let transform = CrdTransf3d::new(tag, vecxz, formulation)?;
        let mut bearing = Self {
            tag,
            nodes,
            shear,
            materials,
            shear_dist,
            transform,
            life: Lifecycle::new(tag),
            trial: BasicState::at_rest(Mat6::zeros()),
            committed: BasicState::at_rest(Mat6::zeros()),
        };
        let at_rest = BasicState::at_rest(bearing.initial_basic_stiffness());
        bearing.trial = at_rest;
        bearing.committed = at_rest;
        Ok(bearing)
    }

    pub fn shear_model(&self) -> &ShearModel {
        &self.shear
    }

    pub fn materials(&self) -> &Bearing3dMaterials {
        &self.materials
    }

    pub fn transform(&self) -> &CrdTransf3d {
        &self.transform
    }

    /// Trial basic deformation, force and stiffness.
    pub fn basic(&self) -> &BasicState<6> {
        &self.trial
    }

    fn initial_basic_stiffness(&self) -> Mat6 {
        let mut kb = Mat6::zeros();
        kb[(0, 0)] = self.materials.axial.initial_tangent();
        kb.fixed_view_mut::<2, 2>(1, 1)
            .copy_from(&self.shear.initial_tangent());
        kb[(3, 3)] = self.materials.torsion.initial_tangent();
        kb[(4, 4)] = self.materials.moment_y.initial_tangent();
        kb[(5, 5)] = self.materials.moment_z.initial_tangent();
        kb
    }

    fn tlb(&self, length: f64) -> SMatrix<f64, 6, 12> {
        local_to_basic::<6, 12>(&SPATIAL, length, self.shear_dist)
    }

    fn local_displacement(&self) -> Vec12 {
        self.transform
            .global_to_local(self.transform.trial_displacement())
    }

    /// Trial local stiffness and force.
    fn local_response(&self) -> (Mat12, Vec12) {
        let length = self.transform.length();
        basic_to_local(
            &SPATIAL,
            &self.tlb(length),
            &self.trial,
            length,
            self.shear_dist,
            &self.local_displacement(),
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

    fn set_material_trials(&mut self, ub: &Vec6) -> Result<()> {
        self.materials.axial.set_trial_strain(ub[0])?;
        self.shear
            .set_trial_deformation(&Vector2::new(ub[1], ub[2]))?;
        self.materials.torsion.set_trial_strain(ub[3])?;
        self.materials.moment_y.set_trial_strain(ub[4])?;
        self.materials.moment_z.set_trial_strain(ub[5])?;
        Ok(())
    }

    /// Transform, material and basic trial update. May leave the trial
    /// slots partially advanced on error.
    fn trial_update(&mut self, domain: &Domain) -> Result<()> {
        let ug = gather_displacements::<12>(domain, self.nodes)?;
        self.transform.update(ug.as_slice())?;

        let length = self.transform.length();
        let ul = self.transform.global_to_local(&ug);
        let mut ub = self.tlb(length) * ul;
        if self.transform.formulation() == Formulation::Corotational {
            ub[0] = length - self.transform.initial_length();
        }

        self.set_material_trials(&ub)?;

        let shear_force = self.shear.force();
        let qb = Vec6::new(
            self.materials.axial.stress(),
            shear_force[0],
            shear_force[1],
            self.materials.torsion.stress(),
            self.materials.moment_y.stress(),
            self.materials.moment_z.stress(),
        );

        let mut kb = Mat6::zeros();
        kb[(0, 0)] = self.materials.axial.tangent();
        kb.fixed_view_mut::<2, 2>(1, 1)
            .copy_from(&self.shear.tangent());
        kb[(3, 3)] = self.materials.torsion.tangent();
        kb[(4, 4)] = self.materials.moment_y.tangent();
        kb[(5, 5)] = self.materials.moment_z.tangent();

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
        let shear = ShearModel::recv_self(commit_tag, channel)?;
        let materials = Bearing3dMaterials {
            axial: UniaxialMaterial::recv_self(commit_tag, channel)?,
            torsion: UniaxialMaterial::recv_self(commit_tag, channel)?,
            moment_y: UniaxialMaterial::recv_self(commit_tag, channel)?,
            moment_z: UniaxialMaterial::recv_self(commit_tag, channel)?,
        };
        Self::new(
            header.tag,
            header.nodes,
            shear,
            materials,
            Vec3::new(data[0], data[1], data[2]),
            data[3],
            header.formulation,
        )
    }
}

impl Element for Bearing3d {
    fn tag(&self) -> i32 {
        self.tag
    }

    fn class_tag(&self) -> i32 {
        BEARING_3D_CLASS_TAG
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

        let at_rest = BasicState::at_rest(self.initial_basic_stiffness());
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
        self.shear.commit_state();
        self.materials.iter_mut().for_each(|m| m.commit_state());
        self.transform.commit_state();
        self.committed = self.trial;
        self.life.commit();
    }

    fn revert_to_last_commit(&mut self) {
        self.shear.revert_to_last_commit();
        self.materials
            .iter_mut()
            .for_each(|m| m.revert_to_last_commit());
        self.transform.revert_to_last_commit();
        self.trial = self.committed;
        self.life.revert();
    }

    fn revert_to_start(&mut self) {
        debug!(element = self.tag, "revert to start");
        self.shear.revert_to_start();
        self.materials.iter_mut().for_each(|m| m.revert_to_start());
        self.transform.revert_to_start();
        let at_rest = BasicState::at_rest(self.initial_basic_stiffness());
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
        let length = self.transform.initial_length();
        let kl = triple_product(&self.tlb(length), &self.initial_basic_stiffness());
        to_dmatrix(&self.transform.initial_local_to_global_stiff(&kl))
    }

    fn resisting_force(&self) -> DVector<f64> {
        to_dvector(&self.global_force())
    }

    fn response(&self, kind: ResponseKind) -> Result<Vec<f64>> {
        let values = match kind {
            ResponseKind::GlobalForce => self.global_force().as_slice().to_vec(),
            ResponseKind::LocalForce => {
                if self.life.is_active() {
                    self.local_response().1.as_slice().to_vec()
                } else {
                    vec![0.0; 12]
                }
            }
            ResponseKind::BasicForce => self.trial.qb.as_slice().to_vec(),
            ResponseKind::LocalDisplacement => self.local_displacement().as_slice().to_vec(),
            ResponseKind::BasicDisplacement => self.trial.ub.as_slice().to_vec(),
            ResponseKind::HystereticVariables => {
                self.shear.hysteretic_variables().as_slice().to_vec()
            }
            ResponseKind::BasicStiffness => self.trial.kb_row_major(),
        };
        Ok(values)
    }

    fn send_self(&self, commit_tag: i32, channel: &mut dyn Channel) -> Result<()> {
        let vecxz = self.transform.vecxz();
        let header = ElementHeader {
            class_tag: BEARING_3D_CLASS_TAG,
            tag: self.tag,
            nodes: self.nodes,
            formulation: self.transform.formulation(),
            data_len: DATA_LEN,
        };
        header.send(
            &[vecxz.x, vecxz.y, vecxz.z, self.shear_dist],
            commit_tag,
            channel,
        )?;
        self.shear.send_self(commit_tag, channel)?;
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
    use crate::elements::kinematics::p_delta_stiffness;
    use crate::materials::{BoucWenParams, PlasticityParams};
    use approx::assert_relative_eq;
    use nlfe_io::MemoryChannel;

    fn elastic_materials() -> Bearing3dMaterials {
        Bearing3dMaterials {
            axial: UniaxialMaterial::elastic(1000.0).unwrap(),
            torsion: UniaxialMaterial::elastic(50.0).unwrap(),
            moment_y: UniaxialMaterial::elastic(20.0).unwrap(),
            moment_z: UniaxialMaterial::elastic(30.0).unwrap(),
        }
    }

    fn bearing(formulation: Formulation) -> Bearing3d {
        let shear = ShearModel::plasticity(PlasticityParams {
            k0: 100.0,
            q_yield: 10.0,
            k2: 5.0,
            ..Default::default()
        })
        .unwrap();
        Bearing3d::new(
            1,
            [1, 2],
            shear,
            elastic_materials(),
            Vec3::new(0.0, 0.0, 1.0),
            0.5,
            formulation,
        )
        .unwrap()
    }

    fn domain(xj: [f64; 3]) -> Domain {
        let mut domain = Domain::new();
        domain.add_node(Node::new(1, &[0.0, 0.0, 0.0], 6)).unwrap();
        domain.add_node(Node::new(2, &xj, 6)).unwrap();
        domain
    }

    fn displace(domain: &mut Domain, disp: [f64; 6]) {
        domain
            .node_mut(2)
            .unwrap()
            .set_trial_displacement(&disp)
            .unwrap();
    }

    #[test]
    fn update_before_binding_fails() {
        let mut b = bearing(Formulation::Linear);
        let d = domain([1.0, 0.0, 0.0]);
        assert_eq!(b.update(&d).unwrap_err(), Error::NotBound(1));
        assert_eq!(b.phase(), ElementPhase::Unbuilt);
    }

    #[test]
    fn missing_node_keeps_element_unbuilt() {
        let mut b = bearing(Formulation::Linear);
        let mut d = Domain::new();
        d.add_node(Node::new(1, &[0.0, 0.0, 0.0], 6)).unwrap();
        assert_eq!(b.set_domain(&d).unwrap_err(), Error::NodeNotFound(2));
        assert_eq!(b.phase(), ElementPhase::Unbuilt);
    }

    #[test]
    fn wrong_dof_count_is_rejected() {
        let mut b = bearing(Formulation::Linear);
        let mut d = Domain::new();
        d.add_node(Node::new(1, &[0.0, 0.0, 0.0], 6)).unwrap();
        d.add_node(Node::new(2, &[1.0, 0.0, 0.0], 3)).unwrap();
        assert!(matches!(
            b.set_domain(&d),
            Err(Error::IncompatibleDof { node: 2, expected: 6, found: 3 })
        ));
    }

    #[test]
    fn coincident_nodes_give_zero_output() {
        let mut b = bearing(Formulation::Linear);
        let d = domain([0.0, 0.0, 0.0]);
        assert_eq!(b.set_domain(&d).unwrap_err(), Error::ZeroLength(1));
        assert_eq!(b.phase(), ElementPhase::Bound);
        assert_eq!(b.update(&d).unwrap_err(), Error::ZeroLength(1));

        let k = b.tangent_stiff();
        assert!(k.iter().all(|v| *v == 0.0));
        assert!(b.initial_stiff().iter().all(|v| *v == 0.0));
        assert!(b.resisting_force().iter().all(|v| v.is_finite() && *v == 0.0));
    }

    #[test]
    fn parallel_orientation_is_degenerate() {
        let mut b = bearing(Formulation::Linear);
        let d = domain([0.0, 0.0, 2.0]);
        assert_eq!(b.set_domain(&d).unwrap_err(), Error::DegenerateOrientation(1));
        assert!(b.tangent_stiff().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn shear_yields_through_plasticity() {
        let mut b = bearing(Formulation::Linear);
        let mut d = domain([1.0, 0.0, 0.0]);
        b.set_domain(&d).unwrap();

        displace(&mut d, [0.0, 0.3, 0.0, 0.0, 0.0, 0.0]);
        b.update(&d).unwrap();
        assert_eq!(b.phase(), ElementPhase::TrialSet);

        let basic = b.basic();
        assert_relative_eq!(basic.ub[1], 0.3, epsilon = 1e-14);
        assert_relative_eq!(basic.qb[1], 11.5, epsilon = 1e-12);
        assert_relative_eq!(basic.kb[(1, 1)], 5.0, epsilon = 1e-12);

        let f = b.resisting_force();
        assert_relative_eq!(f[7], 11.5, epsilon = 1e-12);
        assert_relative_eq!(f[1], -11.5, epsilon = 1e-12);
        // shear distributed half to each node: moment 11.5 * L / 2 at both ends
        assert_relative_eq!(f[5], -5.75, epsilon = 1e-12);
        assert_relative_eq!(f[11], -5.75, epsilon = 1e-12);
    }

    #[test]
    fn converged_tangent_is_symmetric() {
        let mut b = bearing(Formulation::Linear);
        let mut d = domain([0.3, 1.0, -0.5]);
        b.set_domain(&d).unwrap();
        displace(&mut d, [0.05, 0.4, -0.2, 0.01, 0.02, -0.03]);
        b.update(&d).unwrap();
        b.commit_state();

        // Symmetric once the P-Δ moments are taken out.
        let axial = b.basic().qb[0];
        assert!(axial != 0.0);
        let kg = p_delta_stiffness::<12>(&SPATIAL, axial, b.transform().length(), 0.5);
        let k = b.tangent_stiff() - to_dmatrix(&b.transform().local_to_global_stiff(&kg));
        assert_relative_eq!(k, k.transpose(), epsilon = 1e-9);
    }

    #[test]
    fn failed_update_rolls_back_to_committed_state() {
        let shear = ShearModel::bouc_wen(BoucWenParams {
            k0: 100.0,
            q_yield: 10.0,
            k2: 5.0,
            max_iter: 1,
            ..Default::default()
        })
        .unwrap();
        let mut b = Bearing3d::new(
            2,
            [1, 2],
            shear,
            elastic_materials(),
            Vec3::new(0.0, 0.0, 1.0),
            0.5,
            Formulation::Corotational,
        )
        .unwrap();
        let mut d = domain([1.0, 0.0, 0.0]);
        b.set_domain(&d).unwrap();
        b.update(&d).unwrap();
        b.commit_state();
        let committed = b.clone();

        displace(&mut d, [0.02, 0.5, 0.3, 0.0, 0.0, 0.1]);
        assert!(matches!(
            b.update(&d),
            Err(Error::ConvergenceFailure { .. })
        ));
        assert_eq!(b, committed);
        assert_eq!(b.tangent_stiff(), committed.tangent_stiff());
    }

    #[test]
    fn zero_displacement_gives_zero_force() {
        for formulation in [Formulation::Linear, Formulation::Corotational] {
            let mut b = bearing(formulation);
            let d = domain([0.3, 1.0, -0.5]);
            b.set_domain(&d).unwrap();
            b.update(&d).unwrap();
            assert_eq!(b.basic().ub, Vec6::zeros());
            assert!(b.resisting_force().iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn revert_restores_committed_state_exactly() {
        let mut b = bearing(Formulation::Corotational);
        let mut d = domain([1.0, 0.0, 0.0]);
        b.set_domain(&d).unwrap();

        displace(&mut d, [0.0, 0.2, 0.1, 0.0, 0.0, 0.0]);
        b.update(&d).unwrap();
        b.commit_state();
        let committed = b.clone();

        displace(&mut d, [0.01, 0.6, -0.3, 0.02, 0.0, 0.1]);
        b.update(&d).unwrap();
        assert_ne!(b, committed);

        b.revert_to_last_commit();
        assert_eq!(b, committed);
        b.revert_to_last_commit();
        assert_eq!(b, committed);

        b.revert_to_start();
        assert_eq!(b.phase(), ElementPhase::Bound);
        assert_eq!(b.basic().ub, Vec6::zeros());
        assert_eq!(b.shear_model().hysteretic_variables(), Vector2::zeros());
    }

    #[test]
    fn responses_by_id() {
        let mut b = bearing(Formulation::Linear);
        let mut d = domain([1.0, 0.0, 0.0]);
        b.set_domain(&d).unwrap();
        displace(&mut d, [0.0, 0.3, 0.0, 0.0, 0.0, 0.0]);
        b.update(&d).unwrap();

        assert_eq!(b.response_by_id(1).unwrap().len(), 12);
        assert_eq!(b.response_by_id(3).unwrap().len(), 6);
        let hyst = b.response_by_id(6).unwrap();
        assert_relative_eq!(hyst[0], 0.2, epsilon = 1e-12);
        assert_eq!(b.response_by_id(7).unwrap().len(), 36);
        assert_eq!(b.response_by_id(42).unwrap_err(), Error::UnknownResponse(42));
    }

    #[test]
    fn send_and_receive_restore_committed_history() {
        let mut b = bearing(Formulation::Linear);
        let mut d = domain([1.0, 0.0, 0.0]);
        b.set_domain(&d).unwrap();
        displace(&mut d, [0.0, 0.3, 0.0, 0.0, 0.0, 0.0]);
        b.update(&d).unwrap();
        b.commit_state();

        let mut channel = MemoryChannel::new();
        b.send_self(7, &mut channel).unwrap();
        let received = ElementKind::recv_self(1, 7, &mut channel).unwrap();
        assert!(channel.is_empty());

        let ElementKind::Bearing3d(mut copy) = received else {
            panic!("wrong element kind");
        };
        assert_eq!(copy.phase(), ElementPhase::Unbuilt);
        copy.set_domain(&d).unwrap();
        assert_eq!(copy.shear_model(), b.shear_model());
        assert_eq!(copy.materials(), b.materials());

        displace(&mut d, [0.0, 0.5, 0.1, 0.0, 0.0, 0.0]);
        b.update(&d).unwrap();
        copy.update(&d).unwrap();
        assert_eq!(copy.resisting_force(), b.resisting_force());
    }
}
