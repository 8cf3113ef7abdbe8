//! Constitutive models for bearing and frame elements.
//!
//! Every model keeps a trial and a committed state. Setting a trial
//! deformation only touches the trial slot; the [`HystereticState`]
//! operations move data between slots.
//!
//! Elements hold materials through two closed sum types:
//! - [`UniaxialMaterial`]: one deformation component (axial, torsion,
//!   bending, planar shear)
//! - [`ShearModel`]: the two coupled shear components of a 3D bearing

use nalgebra::{Matrix2, SMatrix, SVector, Vector1, Vector2};
use nlfe_io::Channel;
use serde::{Deserialize, Serialize};

pub mod bouc_wen;
pub mod elastic;
pub mod plasticity;

pub use bouc_wen::{BoucWen, BoucWenParams};
pub use elastic::ElasticSpring;
pub use plasticity::{Plasticity, PlasticityParams};

use crate::error::{Error, Result};

pub const ELASTIC_CLASS_TAG: i32 = 1;
pub const PLASTICITY_CLASS_TAG: i32 = 2;
pub const BOUC_WEN_CLASS_TAG: i32 = 3;

/// Channel tag used by material messages.
const MATERIAL_DB_TAG: i32 = 0;

/// Commit/revert capability shared by all stateful models.
pub trait HystereticState {
    fn commit_state(&mut self);

    /// Restore the trial state from the committed one. Idempotent.
    fn revert_to_last_commit(&mut self);

    fn revert_to_start(&mut self);
}

/// Add `k3 sgn(u)|u|^mu` per component, with tangent `k3 mu |u|^(mu-1)`.
pub(crate) fn add_hardening<const N: usize>(
    k3: f64,
    mu: f64,
    u: &SVector<f64, N>,
    q: &mut SVector<f64, N>,
    k: &mut SMatrix<f64, N, N>,
) {
    if k3 == 0.0 {
        return;
    }
    for i in 0..N {
        let ui = u[i];
        if ui == 0.0 {
            continue;
        }
        let magnitude = ui.abs();
        q[i] += k3 * ui.signum() * magnitude.powf(mu);
        k[(i, i)] += k3 * mu * magnitude.powf(mu - 1.0);
    }
}

fn send_packed(
    class_tag: i32,
    data: &[f64],
    commit_tag: i32,
    channel: &mut dyn Channel,
) -> Result<()> {
    channel.send_id(MATERIAL_DB_TAG, commit_tag, &[class_tag, data.len() as i32])?;
    channel.send_vector(MATERIAL_DB_TAG, commit_tag, data)?;
    Ok(())
}

/// Read the `[class_tag, data_len]` header and the data vector, checking the
/// declared length against the one implied by the class.
fn recv_packed(
    commit_tag: i32,
    channel: &mut dyn Channel,
    expected_len: impl Fn(i32) -> Option<usize>,
) -> Result<(i32, Vec<f64>)> {
    let id = channel.recv_id(MATERIAL_DB_TAG, commit_tag, 2)?;
    let class_tag = id[0];
    let expected = expected_len(class_tag).ok_or_else(|| {
        Error::SerializationMismatch(format!("unexpected material class tag {class_tag}"))
    })?;
    if usize::try_from(id[1]).ok() != Some(expected) {
        return Err(Error::SerializationMismatch(format!(
            "material class {class_tag} declares {} entries, expected {expected}",
            id[1]
        )));
    }
    let data = channel.recv_vector(MATERIAL_DB_TAG, commit_tag, expected)?;
    Ok((class_tag, data))
}

/// Single-component constitutive model.
#[derive(Debug, Clone, PartialEq)]
pub enum UniaxialMaterial {
    Elastic(ElasticSpring),
    Plasticity(Plasticity<1>),
    BoucWen(BoucWen<1>),
}

impl UniaxialMaterial {
    pub fn elastic(k: f64) -> Result<Self> {
        ElasticSpring::new(k).map(Self::Elastic)
    }

    pub fn plasticity(params: PlasticityParams) -> Result<Self> {
        Plasticity::new(params).map(Self::Plasticity)
    }

    pub fn bouc_wen(params: BoucWenParams) -> Result<Self> {
        BoucWen::new(params).map(Self::BoucWen)
    }

    pub fn class_tag(&self) -> i32 {
        match self {
            Self::Elastic(_) => ELASTIC_CLASS_TAG,
            Self::Plasticity(_) => PLASTICITY_CLASS_TAG,
            Self::BoucWen(_) => BOUC_WEN_CLASS_TAG,
        }
    }

    pub fn set_trial_strain(&mut self, u: f64) -> Result<()> {
        match self {
            Self::Elastic(m) => m.set_trial_strain(u),
            Self::Plasticity(m) => m.set_trial_deformation(&Vector1::new(u)),
            Self::BoucWen(m) => m.set_trial_deformation(&Vector1::new(u))?,
        }
        Ok(())
    }

    pub fn strain(&self) -> f64 {
        match self {
            Self::Elastic(m) => m.strain(),
            Self::Plasticity(m) => m.deformation()[0],
            Self::BoucWen(m) => m.deformation()[0],
        }
    }

    pub fn stress(&self) -> f64 {
        match self {
            Self::Elastic(m) => m.stress(),
            Self::Plasticity(m) => m.force()[0],
            Self::BoucWen(m) => m.force()[0],
        }
    }

    pub fn tangent(&self) -> f64 {
        match self {
            Self::Elastic(m) => m.tangent(),
            Self::Plasticity(m) => m.tangent()[(0, 0)],
            Self::BoucWen(m) => m.tangent()[(0, 0)],
        }
    }

    pub fn initial_tangent(&self) -> f64 {
        match self {
            Self::Elastic(m) => m.tangent(),
            Self::Plasticity(m) => m.initial_tangent()[(0, 0)],
            Self::BoucWen(m) => m.initial_tangent()[(0, 0)],
        }
    }

    /// Plastic offset or Bouc-Wen `z`; empty for elastic springs.
    pub fn hysteretic_variables(&self) -> Vec<f64> {
        match self {
            Self::Elastic(_) => Vec::new(),
            Self::Plasticity(m) => vec![m.plastic_offset()[0]],
            Self::BoucWen(m) => vec![m.z()[0]],
        }
    }

    fn data(&self) -> Vec<f64> {
        match self {
            Self::Elastic(m) => m.to_data(),
            Self::Plasticity(m) => m.to_data(),
            Self::BoucWen(m) => m.to_data(),
        }
    }

    pub fn send_self(&self, commit_tag: i32, channel: &mut dyn Channel) -> Result<()> {
        send_packed(self.class_tag(), &self.data(), commit_tag, channel)
    }

    pub fn recv_self(commit_tag: i32, channel: &mut dyn Channel) -> Result<Self> {
        let (class_tag, data) = recv_packed(commit_tag, channel, |class| match class {
            ELASTIC_CLASS_TAG => Some(ElasticSpring::DATA_LEN),
            PLASTICITY_CLASS_TAG => Some(Plasticity::<1>::DATA_LEN),
            BOUC_WEN_CLASS_TAG => Some(BoucWen::<1>::DATA_LEN),
            _ => None,
        })?;
        match class_tag {
            ELASTIC_CLASS_TAG => ElasticSpring::from_data(&data).map(Self::Elastic),
            PLASTICITY_CLASS_TAG => Plasticity::from_data(&data).map(Self::Plasticity),
            _ => BoucWen::from_data(&data).map(Self::BoucWen),
        }
    }
}

impl HystereticState for UniaxialMaterial {
    fn commit_state(&mut self) {
        match self {
            Self::Elastic(m) => m.commit_state(),
            Self::Plasticity(m) => m.commit_state(),
            Self::BoucWen(m) => m.commit_state(),
        }
    }

    fn revert_to_last_commit(&mut self) {
        match self {
            Self::Elastic(m) => m.revert_to_last_commit(),
            Self::Plasticity(m) => m.revert_to_last_commit(),
            Self::BoucWen(m) => m.revert_to_last_commit(),
        }
    }

    fn revert_to_start(&mut self) {
        match self {
            Self::Elastic(m) => m.revert_to_start(),
            Self::Plasticity(m) => m.revert_to_start(),
            Self::BoucWen(m) => m.revert_to_start(),
        }
    }
}

/// Coupled two-component shear model of a 3D bearing.
#[derive(Debug, Clone, PartialEq)]
pub enum ShearModel {
    Plasticity(Plasticity<2>),
    BoucWen(BoucWen<2>),
}

impl ShearModel {
    pub fn plasticity(params: PlasticityParams) -> Result<Self> {
        Plasticity::new(params).map(Self::Plasticity)
    }

    pub fn bouc_wen(params: BoucWenParams) -> Result<Self> {
        BoucWen::new(params).map(Self::BoucWen)
    }

    pub fn class_tag(&self) -> i32 {
        match self {
            Self::Plasticity(_) => PLASTICITY_CLASS_TAG,
            Self::BoucWen(_) => BOUC_WEN_CLASS_TAG,
        }
    }

    pub fn set_trial_deformation(&mut self, u: &Vector2<f64>) -> Result<()> {
        match self {
            Self::Plasticity(m) => m.set_trial_deformation(u),
            Self::BoucWen(m) => m.set_trial_deformation(u)?,
        }
        Ok(())
    }

    pub fn deformation(&self) -> Vector2<f64> {
        match self {
            Self::Plasticity(m) => *m.deformation(),
            Self::BoucWen(m) => *m.deformation(),
        }
    }

    pub fn force(&self) -> Vector2<f64> {
        match self {
            Self::Plasticity(m) => *m.force(),
            Self::BoucWen(m) => *m.force(),
        }
    }

    pub fn tangent(&self) -> Matrix2<f64> {
        match self {
            Self::Plasticity(m) => *m.tangent(),
            Self::BoucWen(m) => *m.tangent(),
        }
    }

    pub fn initial_tangent(&self) -> Matrix2<f64> {
        match self {
            Self::Plasticity(m) => m.initial_tangent(),
            Self::BoucWen(m) => m.initial_tangent(),
        }
    }

    /// Plastic offset or Bouc-Wen `z`.
    pub fn hysteretic_variables(&self) -> Vector2<f64> {
        match self {
            Self::Plasticity(m) => *m.plastic_offset(),
            Self::BoucWen(m) => *m.z(),
        }
    }

    pub fn send_self(&self, commit_tag: i32, channel: &mut dyn Channel) -> Result<()> {
        let data = match self {
            Self::Plasticity(m) => m.to_data(),
            Self::BoucWen(m) => m.to_data(),
        };
        send_packed(self.class_tag(), &data, commit_tag, channel)
    }

    pub fn recv_self(commit_tag: i32, channel: &mut dyn Channel) -> Result<Self> {
        let (class_tag, data) = recv_packed(commit_tag, channel, |class| match class {
            PLASTICITY_CLASS_TAG => Some(Plasticity::<2>::DATA_LEN),
            BOUC_WEN_CLASS_TAG => Some(BoucWen::<2>::DATA_LEN),
            _ => None,
        })?;
        match class_tag {
            PLASTICITY_CLASS_TAG => Plasticity::from_data(&data).map(Self::Plasticity),
            _ => BoucWen::from_data(&data).map(Self::BoucWen),
        }
    }
}

impl HystereticState for ShearModel {
    fn commit_state(&mut self) {
        match self {
            Self::Plasticity(m) => m.commit_state(),
            Self::BoucWen(m) => m.commit_state(),
        }
    }

    fn revert_to_last_commit(&mut self) {
        match self {
            Self::Plasticity(m) => m.revert_to_last_commit(),
            Self::BoucWen(m) => m.revert_to_last_commit(),
        }
    }

    fn revert_to_start(&mut self) {
        match self {
            Self::Plasticity(m) => m.revert_to_start(),
            Self::BoucWen(m) => m.revert_to_start(),
        }
    }
}

/// Serializable description of a [`UniaxialMaterial`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum UniaxialConfig {
    Elastic { k: f64 },
    Plasticity(PlasticityParams),
    BoucWen(BoucWenParams),
}

impl UniaxialConfig {
    pub fn build(&self) -> Result<UniaxialMaterial> {
        match self {
            Self::Elastic { k } => UniaxialMaterial::elastic(*k),
            Self::Plasticity(params) => UniaxialMaterial::plasticity(*params),
            Self::BoucWen(params) => UniaxialMaterial::bouc_wen(*params),
        }
    }
}

/// Serializable description of a [`ShearModel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ShearConfig {
    Plasticity(PlasticityParams),
    BoucWen(BoucWenParams),
}

impl ShearConfig {
    pub fn build(&self) -> Result<ShearModel> {
        match self {
            Self::Plasticity(params) => ShearModel::plasticity(*params),
            Self::BoucWen(params) => ShearModel::bouc_wen(*params),
        }
    }
}
