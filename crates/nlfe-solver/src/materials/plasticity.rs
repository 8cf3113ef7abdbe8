//! Rate-independent plasticity with linear post-yield stiffness.
//!
//! One closed-form radial return per call; nothing iterates, so
//! [`Plasticity::set_trial_deformation`] cannot fail. `N = 1` gives the
//! uniaxial model, `N = 2` couples the two shear directions of a bearing
//! through a circular yield surface.

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};

use super::{HystereticState, add_hardening};
use crate::error::{Error, Result};

/// Plasticity parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlasticityParams {
    /// Initial elastic stiffness.
    pub k0: f64,
    /// Yield force.
    pub q_yield: f64,
    /// Post-yield stiffness ratio term (added in parallel).
    pub k2: f64,
    /// Nonlinear hardening coefficient, `0` disables the term.
    pub k3: f64,
    /// Nonlinear hardening exponent.
    pub mu: f64,
}

impl Default for PlasticityParams {
    fn default() -> Self {
        Self {
            k0: 1.0,
            q_yield: 1.0,
            k2: 0.0,
            k3: 0.0,
            mu: 2.0,
        }
    }
}

impl PlasticityParams {
    pub fn validate(&self) -> Result<()> {
        let finite = [self.k0, self.q_yield, self.k2, self.k3, self.mu]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(Error::Construction(
                "plasticity parameters must be finite".into(),
            ));
        }
        if self.k0 <= 0.0 {
            return Err(Error::Construction(format!(
                "plasticity k0 must be positive, got {}",
                self.k0
            )));
        }
        if self.q_yield <= 0.0 {
            return Err(Error::Construction(format!(
                "plasticity q_yield must be positive, got {}",
                self.q_yield
            )));
        }
        if self.k2 < 0.0 || self.k3 < 0.0 {
            return Err(Error::Construction(
                "plasticity k2 and k3 must be non-negative".into(),
            ));
        }
        if self.mu < 1.0 {
            return Err(Error::Construction(format!(
                "plasticity mu must be at least 1, got {}",
                self.mu
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct State<const N: usize> {
    u: SVector<f64, N>,
    u_plastic: SVector<f64, N>,
    q: SVector<f64, N>,
    k: SMatrix<f64, N, N>,
}

impl<const N: usize> State<N> {
    fn at_rest(params: &PlasticityParams) -> Self {
        Self {
            u: SVector::zeros(),
            u_plastic: SVector::zeros(),
            q: SVector::zeros(),
            k: SMatrix::identity() * (params.k0 + params.k2),
        }
    }
}

/// Elastic-plastic model over `N` coupled components.
#[derive(Debug, Clone, PartialEq)]
pub struct Plasticity<const N: usize> {
    params: PlasticityParams,
    trial: State<N>,
    committed: State<N>,
}

impl<const N: usize> Plasticity<N> {
    /// Parameters followed by committed `u`, `u_plastic`, `q` and `k`.
    pub const DATA_LEN: usize = 5 + 3 * N + N * N;

    pub fn new(params: PlasticityParams) -> Result<Self> {
        params.validate()?;
        let state = State::at_rest(&params);
        Ok(Self {
            params,
            trial: state,
            committed: state,
        })
    }

    pub fn params(&self) -> &PlasticityParams {
        &self.params
    }

    pub fn set_trial_deformation(&mut self, u: &SVector<f64, N>) {
        let PlasticityParams {
            k0, q_yield, k2, ..
        } = self.params;
        let u_plastic_committed = self.committed.u_plastic;

        let q_trial = (u - u_plastic_committed) * k0;
        let q_norm = q_trial.norm();
        let yield_fn = q_norm - q_yield;

        let mut trial = if yield_fn <= 0.0 {
            State {
                u: *u,
                u_plastic: u_plastic_committed,
                q: q_trial + u * k2,
                k: SMatrix::identity() * (k0 + k2),
            }
        } else {
            let n = q_trial / q_norm;
            let dgamma = yield_fn / k0;
            let projector = SMatrix::<f64, N, N>::identity() - n * n.transpose();
            State {
                u: *u,
                u_plastic: u_plastic_committed + n * dgamma,
                q: n * q_yield + u * k2,
                k: projector * (q_yield * k0 / q_norm) + SMatrix::identity() * k2,
            }
        };

        add_hardening(
            self.params.k3,
            self.params.mu,
            u,
            &mut trial.q,
            &mut trial.k,
        );
        self.trial = trial;
    }

    pub fn deformation(&self) -> &SVector<f64, N> {
        &self.trial.u
    }

    pub fn force(&self) -> &SVector<f64, N> {
        &self.trial.q
    }

    pub fn tangent(&self) -> &SMatrix<f64, N, N> {
        &self.trial.k
    }

    pub fn initial_tangent(&self) -> SMatrix<f64, N, N> {
        SMatrix::identity() * (self.params.k0 + self.params.k2)
    }

    /// Trial plastic offset.
    pub fn plastic_offset(&self) -> &SVector<f64, N> {
        &self.trial.u_plastic
    }

    pub(crate) fn to_data(&self) -> Vec<f64> {
        let p = &self.params;
        let c = &self.committed;
        let mut data = Vec::with_capacity(Self::DATA_LEN);
        data.extend_from_slice(&[p.k0, p.q_yield, p.k2, p.k3, p.mu]);
        data.extend_from_slice(c.u.as_slice());
        data.extend_from_slice(c.u_plastic.as_slice());
        data.extend_from_slice(c.q.as_slice());
        data.extend_from_slice(c.k.as_slice());
        data
    }

    pub(crate) fn from_data(data: &[f64]) -> Result<Self> {
        if data.len() != Self::DATA_LEN {
            return Err(Error::SerializationMismatch(format!(
                "plasticity data has {} entries, expected {}",
                data.len(),
                Self::DATA_LEN
            )));
        }
        let params = PlasticityParams {
            k0: data[0],
            q_yield: data[1],
            k2: data[2],
            k3: data[3],
            mu: data[4],
        };
        params.validate()?;

        let (u, rest) = data[5..].split_at(N);
        let (u_plastic, rest) = rest.split_at(N);
        let (q, k) = rest.split_at(N);
        let state = State {
            u: SVector::from_column_slice(u),
            u_plastic: SVector::from_column_slice(u_plastic),
            q: SVector::from_column_slice(q),
            k: SMatrix::from_column_slice(k),
        };
        Ok(Self {
            params,
            trial: state,
            committed: state,
        })
    }
}

impl<const N: usize> HystereticState for Plasticity<N> {
    fn commit_state(&mut self) {
        self.committed = self.trial;
    }

    fn revert_to_last_commit(&mut self) {
        self.trial = self.committed;
    }

    fn revert_to_start(&mut self) {
        let state = State::at_rest(&self.params);
        self.trial = state;
        self.committed = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Vector1, Vector2};

    fn params() -> PlasticityParams {
        PlasticityParams {
            k0: 100.0,
            q_yield: 10.0,
            k2: 5.0,
            ..Default::default()
        }
    }

    #[test]
    fn elastic_branch() {
        let mut m = Plasticity::<1>::new(params()).unwrap();
        m.set_trial_deformation(&Vector1::new(0.05));
        assert_relative_eq!(m.force()[0], 5.25);
        assert_relative_eq!(m.tangent()[(0, 0)], 105.0);
        assert_eq!(m.plastic_offset()[0], 0.0);
    }

    #[test]
    fn uniaxial_radial_return() {
        let mut m = Plasticity::<1>::new(params()).unwrap();
        m.set_trial_deformation(&Vector1::new(0.3));
        assert_relative_eq!(m.plastic_offset()[0], 0.2, epsilon = 1e-12);
        assert_relative_eq!(m.force()[0], 11.5, epsilon = 1e-12);
        assert_relative_eq!(m.tangent()[(0, 0)], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn unloading_is_elastic_from_plastic_offset() {
        let mut m = Plasticity::<1>::new(params()).unwrap();
        m.set_trial_deformation(&Vector1::new(0.3));
        m.commit_state();

        m.set_trial_deformation(&Vector1::new(0.25));
        // 100 * (0.25 - 0.2) + 5 * 0.25
        assert_relative_eq!(m.force()[0], 6.25, epsilon = 1e-12);
        assert_relative_eq!(m.tangent()[(0, 0)], 105.0);
    }

    #[test]
    fn biaxial_return_is_radial() {
        let mut m = Plasticity::<2>::new(params()).unwrap();
        m.set_trial_deformation(&Vector2::new(0.3, 0.4));

        // |q_trial| = 50, n = (0.6, 0.8)
        assert_relative_eq!(*m.plastic_offset(), Vector2::new(0.24, 0.32), epsilon = 1e-12);
        assert_relative_eq!(*m.force(), Vector2::new(7.5, 10.0), epsilon = 1e-12);

        let k = m.tangent();
        assert_relative_eq!(*k, k.transpose(), epsilon = 1e-12);
        // stiffness along n is k2 only
        let n = Vector2::new(0.6, 0.8);
        assert_relative_eq!((k * n).dot(&n), 5.0, epsilon = 1e-12);
        // perpendicular to n: q_yield * k0 / |q_trial| + k2
        let t = Vector2::new(-0.8, 0.6);
        assert_relative_eq!((k * t).dot(&t), 25.0, epsilon = 1e-12);
    }

    #[test]
    fn hardening_term_adds_force_and_stiffness() {
        let mut m = Plasticity::<1>::new(PlasticityParams {
            k3: 2.0,
            mu: 3.0,
            ..params()
        })
        .unwrap();
        m.set_trial_deformation(&Vector1::new(-0.5));
        // -10 + 5 * -0.5 + 2 * -(0.5^3)
        assert_relative_eq!(m.force()[0], -12.75, epsilon = 1e-12);
        // 5 + 2 * 3 * 0.5^2
        assert_relative_eq!(m.tangent()[(0, 0)], 6.5, epsilon = 1e-12);
    }

    #[test]
    fn revert_is_bit_identical() {
        let mut m = Plasticity::<2>::new(params()).unwrap();
        m.set_trial_deformation(&Vector2::new(0.2, -0.1));
        m.commit_state();
        let committed = m.clone();

        m.set_trial_deformation(&Vector2::new(0.7, 0.3));
        assert_ne!(m, committed);
        m.revert_to_last_commit();
        assert_eq!(m, committed);
        m.revert_to_last_commit();
        assert_eq!(m, committed);

        m.revert_to_start();
        assert_eq!(m, Plasticity::<2>::new(params()).unwrap());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        for bad in [
            PlasticityParams { k0: 0.0, ..params() },
            PlasticityParams { q_yield: -1.0, ..params() },
            PlasticityParams { k2: f64::NAN, ..params() },
        ] {
            assert!(matches!(
                Plasticity::<1>::new(bad),
                Err(Error::Construction(_))
            ));
        }
    }

    #[test]
    fn data_restores_committed_state() {
        let mut m = Plasticity::<2>::new(params()).unwrap();
        m.set_trial_deformation(&Vector2::new(0.3, 0.4));
        m.commit_state();

        let restored = Plasticity::<2>::from_data(&m.to_data()).unwrap();
        assert_eq!(restored, m);
        assert!(matches!(
            Plasticity::<1>::from_data(&m.to_data()),
            Err(Error::SerializationMismatch(_))
        ));
    }
}
