//! Nonlinear two-node element core.
//!
//! The crate is organised bottom-up:
//! - [`linalg`]: fixed-size nalgebra glue
//! - [`transform`]: global/local/basic coordinate transforms
//! - [`materials`]: hysteretic constitutive models with commit/revert
//! - [`elements`]: bearing and beam elements with a shared lifecycle
//! - [`domain`] and [`model`]: node and element containers
//! - [`nonlinear_solver`]: load-controlled Newton-Raphson on a model
//!
//! State objects are serialised through [`nlfe_io::Channel`].

pub mod domain;
pub mod elements;
pub mod error;
pub mod linalg;
pub mod materials;
pub mod model;
pub mod nonlinear_solver;
pub mod transform;

pub use domain::{Domain, Node};
pub use elements::{
    Bearing2d, Bearing2dMaterials, Bearing3d, Bearing3dMaterials, ElasticBeam3d,
    ElasticSection3d, Element, ElementKind, ElementPhase, ResponseKind,
};
pub use error::{Error, Result};
pub use materials::{
    BoucWen, BoucWenParams, ElasticSpring, HystereticState, Plasticity, PlasticityParams,
    ShearConfig, ShearModel, UniaxialConfig, UniaxialMaterial,
};
pub use model::{DofMap, Model};
pub use nonlinear_solver::{
    Fixity, LoadCase, NodalLoad, NonlinearConfig, NonlinearResults, NonlinearSolver, StepReport,
};
pub use transform::{CoordTransform, CrdTransf2d, CrdTransf3d, Formulation};
