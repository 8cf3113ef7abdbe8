use super::HystereticState;
use crate::error::{Error, Result};

/// Linear spring `q = k u`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticSpring {
    k: f64,
    trial_u: f64,
    committed_u: f64,
}

impl ElasticSpring {
    /// Stiffness and committed deformation.
    pub const DATA_LEN: usize = 2;

    pub fn new(k: f64) -> Result<Self> {
        if !k.is_finite() || k < 0.0 {
            return Err(Error::Construction(format!(
                "elastic stiffness must be finite and non-negative, got {k}"
            )));
        }
        Ok(Self {
            k,
            trial_u: 0.0,
            committed_u: 0.0,
        })
    }

    pub fn stiffness(&self) -> f64 {
        self.k
    }

    pub fn set_trial_strain(&mut self, u: f64) {
        self.trial_u = u;
    }

    pub fn strain(&self) -> f64 {
        self.trial_u
    }

    pub fn stress(&self) -> f64 {
        self.k * self.trial_u
    }

    pub fn tangent(&self) -> f64 {
        self.k
    }

    pub(crate) fn to_data(&self) -> Vec<f64> {
        vec![self.k, self.committed_u]
    }

    pub(crate) fn from_data(data: &[f64]) -> Result<Self> {
        match data {
            &[k, u] => {
                let mut spring = Self::new(k)?;
                spring.trial_u = u;
                spring.committed_u = u;
                Ok(spring)
            }
            _ => Err(Error::SerializationMismatch(format!(
                "elastic data has {} entries, expected {}",
                data.len(),
                Self::DATA_LEN
            ))),
        }
    }
}

impl HystereticState for ElasticSpring {
    fn commit_state(&mut self) {
        self.committed_u = self.trial_u;
    }

    fn revert_to_last_commit(&mut self) {
        self.trial_u = self.committed_u;
    }

    fn revert_to_start(&mut self) {
        self.trial_u = 0.0;
        self.committed_u = 0.0;
    }
}
