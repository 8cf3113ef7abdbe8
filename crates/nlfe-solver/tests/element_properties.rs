//! Invariants that every transform, material and element must satisfy.
//!
//! Each test builds its objects through the public API only.

use approx::assert_relative_eq;
use nalgebra::{SVector, Vector2};
use nlfe_solver::linalg::{Vec3, Vec6, Vec12, is_orthonormal};
use nlfe_solver::{
    Bearing2d, Bearing2dMaterials, Bearing3d, Bearing3dMaterials, BoucWen, BoucWenParams,
    CoordTransform, CrdTransf3d, Domain, Element, ElementPhase, Error, Formulation,
    HystereticState, Node, Plasticity, PlasticityParams, ResponseKind, ShearModel,
    UniaxialMaterial,
};

fn elastic_set() -> Bearing3dMaterials {
    Bearing3dMaterials {
        axial: UniaxialMaterial::elastic(1000.0).unwrap(),
        torsion: UniaxialMaterial::elastic(50.0).unwrap(),
        moment_y: UniaxialMaterial::elastic(20.0).unwrap(),
        moment_z: UniaxialMaterial::elastic(30.0).unwrap(),
    }
}

fn plastic_shear() -> ShearModel {
    ShearModel::plasticity(PlasticityParams {
        k0: 100.0,
        q_yield: 10.0,
        k2: 5.0,
        ..Default::default()
    })
    .unwrap()
}

/// Yield displacement 1.0, so the test increments stay well inside it.
fn bouc_wen_shear() -> ShearModel {
    ShearModel::bouc_wen(BoucWenParams {
        k0: 10.0,
        q_yield: 10.0,
        k2: 5.0,
        ..Default::default()
    })
    .unwrap()
}

fn spatial_domain(xi: [f64; 3], xj: [f64; 3]) -> Domain {
    let mut domain = Domain::new();
    domain.add_node(Node::new(1, &xi, 6)).unwrap();
    domain.add_node(Node::new(2, &xj, 6)).unwrap();
    domain
}

fn bearing3d(shear: ShearModel, vecxz: Vec3, formulation: Formulation) -> Bearing3d {
    Bearing3d::new(7, [1, 2], shear, elastic_set(), vecxz, 0.5, formulation).unwrap()
}

#[test]
fn rotation_is_orthonormal_for_any_orientation() {
    let cases = [
        ([0.0, 0.0, 0.0], [3.0, -1.0, 2.0], Vec3::new(0.0, 0.0, 1.0)),
        ([1.0, 1.0, 0.0], [1.0, 1.0, 4.0], Vec3::new(1.0, 0.0, 0.0)),
        ([-2.0, 0.5, 1.0], [0.3, 0.2, -0.7], Vec3::new(0.2, 1.0, 0.4)),
    ];
    for formulation in [Formulation::Linear, Formulation::Corotational] {
        for (xi, xj, vecxz) in cases {
            let mut t = CrdTransf3d::new(1, vecxz, formulation).unwrap();
            t.initialize(&xi, &xj).unwrap();
            assert!(is_orthonormal(t.rotation(), 1e-10));

            let chord = Vec3::from(xj) - Vec3::from(xi);
            assert_relative_eq!(t.length(), chord.norm(), epsilon = 1e-12);
            let (ex, _, ez) = t.local_axes();
            assert_relative_eq!(ex, chord / chord.norm(), epsilon = 1e-12);
            // Local z lies in the plane of the chord and vecxz.
            assert_relative_eq!(ez.dot(&chord.cross(&vecxz)), 0.0, epsilon = 1e-10);
        }
    }
}

#[test]
fn corotational_frame_stays_orthonormal_under_large_motion() {
    let mut t = CrdTransf3d::new(1, Vec3::new(0.0, 0.0, 1.0), Formulation::Corotational).unwrap();
    t.initialize(&[0.0, 0.0, 0.0], &[2.0, 0.0, 0.0]).unwrap();

    let mut ug = Vec12::zeros();
    for step in 1..=10 {
        let s = step as f64 * 0.05;
        ug[6] = -0.3 * s;
        ug[7] = 0.8 * s;
        ug[8] = 0.2 * s;
        ug[9] = 0.1 * s;
        ug[3] = -0.05 * s;
        t.update(ug.as_slice()).unwrap();
        assert!(is_orthonormal(t.rotation(), 1e-10));
    }
}

#[test]
fn zero_motion_maps_to_zero() {
    for formulation in [Formulation::Linear, Formulation::Corotational] {
        let mut t = CrdTransf3d::new(3, Vec3::new(0.0, 1.0, 1.0), formulation).unwrap();
        t.initialize(&[0.0, 0.0, 0.0], &[1.0, 2.0, 0.5]).unwrap();
        t.update(Vec12::zeros().as_slice()).unwrap();
        assert_eq!(t.transform_to_basic(&Vec12::zeros()), Vec6::zeros());
        assert_eq!(t.basic_to_global_force(&Vec6::zeros()), Vec12::zeros());
    }

    let mut b = bearing3d(plastic_shear(), Vec3::new(0.0, 0.0, 1.0), Formulation::Linear);
    let domain = spatial_domain([0.0; 3], [1.0, 0.0, 0.0]);
    b.set_domain(&domain).unwrap();
    b.update(&domain).unwrap();
    assert!(b.resisting_force().iter().all(|f| *f == 0.0));
    assert!(b
        .response(ResponseKind::BasicDisplacement)
        .unwrap()
        .iter()
        .all(|u| *u == 0.0));
}

#[test]
fn revert_after_commit_is_bit_identical() {
    for shear in [plastic_shear(), bouc_wen_shear()] {
        for formulation in [Formulation::Linear, Formulation::Corotational] {
            let mut b = bearing3d(shear.clone(), Vec3::new(0.0, 0.0, 1.0), formulation);
            let mut domain = spatial_domain([0.0; 3], [0.5, 0.0, 0.0]);
            b.set_domain(&domain).unwrap();

            domain
                .node_mut(2)
                .unwrap()
                .set_trial_displacement(&[0.01, 0.15, -0.05, 0.0, 0.01, 0.0])
                .unwrap();
            b.update(&domain).unwrap();
            b.commit_state();
            let committed = b.clone();
            let force = b.resisting_force();
            let stiffness = b.tangent_stiff();

            domain
                .node_mut(2)
                .unwrap()
                .set_trial_displacement(&[0.0, 0.4, 0.3, 0.05, 0.0, -0.02])
                .unwrap();
            b.update(&domain).unwrap();
            b.revert_to_last_commit();

            assert_eq!(b, committed);
            assert_eq!(b.phase(), ElementPhase::Committed);
            assert_eq!(b.resisting_force(), force);
            assert_eq!(b.tangent_stiff(), stiffness);
        }
    }
}

#[test]
fn plasticity_reference_point() {
    let mut m = Plasticity::<1>::new(PlasticityParams {
        k0: 100.0,
        q_yield: 10.0,
        k2: 5.0,
        ..Default::default()
    })
    .unwrap();
    m.set_trial_deformation(&SVector::from([0.3]));
    assert_relative_eq!(m.plastic_offset()[0], 0.2, epsilon = 1e-12);
    assert_relative_eq!(m.force()[0], 11.5, epsilon = 1e-12);
    assert_relative_eq!(m.tangent()[(0, 0)], 5.0, epsilon = 1e-12);

    m.revert_to_last_commit();
    assert_eq!(m.force()[0], 0.0);
}

#[test]
fn coincident_nodes_report_zero_length_without_nan() {
    let mut b = bearing3d(plastic_shear(), Vec3::new(0.0, 0.0, 1.0), Formulation::Linear);
    let domain = spatial_domain([1.0, 1.0, 1.0], [1.0, 1.0, 1.0]);
    let err = b.set_domain(&domain).unwrap_err();
    assert_eq!(err, Error::ZeroLength(7));
    assert!(err.is_geometric());

    assert_eq!(b.update(&domain).unwrap_err(), Error::ZeroLength(7));
    for v in b.tangent_stiff().iter().chain(b.initial_stiff().iter()) {
        assert_eq!(*v, 0.0);
    }
    assert!(b.resisting_force().iter().all(|f| *f == 0.0));

    let mut planar = Bearing2d::new(
        8,
        [1, 2],
        Bearing2dMaterials {
            axial: UniaxialMaterial::elastic(10.0).unwrap(),
            shear: UniaxialMaterial::elastic(10.0).unwrap(),
            moment: UniaxialMaterial::elastic(10.0).unwrap(),
        },
        0.0,
        Formulation::Corotational,
    )
    .unwrap();
    let mut d2 = Domain::new();
    d2.add_node(Node::new(1, &[2.0, 3.0], 3)).unwrap();
    d2.add_node(Node::new(2, &[2.0, 3.0], 3)).unwrap();
    assert_eq!(planar.set_domain(&d2).unwrap_err(), Error::ZeroLength(8));
    assert!(planar.tangent_stiff().iter().all(|v| v.is_finite() && *v == 0.0));
}

#[test]
fn bouc_wen_monotonic_loading_stays_bounded() {
    let mut m = BoucWen::<1>::new(BoucWenParams {
        k0: 100.0,
        q_yield: 10.0,
        k2: 5.0,
        eta: 1.0,
        beta: 0.5,
        gamma: 0.5,
        max_iter: 25,
        ..Default::default()
    })
    .unwrap();

    let mut previous = 0.0;
    for step in 1..=100 {
        let u = step as f64 * 0.01;
        m.set_trial_deformation(&SVector::from([u])).unwrap();
        m.commit_state();
        let z = m.z()[0];
        assert!(z.abs() <= 1.0 + 1e-12);
        assert!(z >= previous);
        previous = z;
    }
    // Ten yield displacements in, the loop is close to saturation.
    assert!(previous > 0.99);
}

#[test]
fn plasticity_bearing_tangent_is_symmetric_when_converged() {
    let mut b = bearing3d(plastic_shear(), Vec3::new(0.0, 1.0, 1.0), Formulation::Linear);
    let mut domain = spatial_domain([0.0; 3], [1.0, 0.0, 0.0]);
    b.set_domain(&domain).unwrap();

    for disp in [
        [0.0, 0.2, 0.1, 0.0, 0.0, 0.0],
        [0.0, 0.5, 0.4, 0.01, 0.02, -0.01],
        [0.0, -0.1, 0.6, 0.0, 0.0, 0.0],
    ] {
        domain.node_mut(2).unwrap().set_trial_displacement(&disp).unwrap();
        b.update(&domain).unwrap();
        b.commit_state();
        let k = b.tangent_stiff();
        assert_relative_eq!(k.clone(), k.transpose(), epsilon = 1e-9);
    }

    let hyst = b.response(ResponseKind::HystereticVariables).unwrap();
    assert_eq!(hyst.len(), 2);
    assert!(Vector2::new(hyst[0], hyst[1]).norm() > 0.0);
}
