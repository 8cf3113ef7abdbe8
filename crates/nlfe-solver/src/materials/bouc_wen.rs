//! Smooth Bouc-Wen hysteresis over `N` coupled components.
//!
//! The evolution variable `z` is integrated with a backward-Euler step over
//! the deformation increment `du = u - u_committed`:
//!
//! ```text
//! F_i(z) = z_i - zC_i - (A du_i - z_i s) / uy
//! s      = |z|^(eta-2) Σ_j z_j du_j (beta + gamma sgn(z_j du_j))
//! ```
//!
//! solved by Newton-Raphson starting from the committed `z`.

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{HystereticState, add_hardening};
use crate::error::{Error, Result};
use crate::linalg::sgn;

/// Bouc-Wen parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoucWenParams {
    pub k0: f64,
    pub q_yield: f64,
    pub k2: f64,
    pub k3: f64,
    pub mu: f64,
    /// Sharpness of the elastic-plastic transition, at least 1.
    pub eta: f64,
    pub beta: f64,
    pub gamma: f64,
    pub a: f64,
    /// Newton-Raphson tolerance on `|Δz|`.
    pub tol: f64,
    pub max_iter: usize,
}

impl Default for BoucWenParams {
    fn default() -> Self {
        Self {
            k0: 1.0,
            q_yield: 1.0,
            k2: 0.0,
            k3: 0.0,
            mu: 2.0,
            eta: 1.0,
            beta: 0.5,
            gamma: 0.5,
            a: 1.0,
            tol: 1e-12,
            max_iter: 25,
        }
    }
}

impl BoucWenParams {
    pub fn validate(&self) -> Result<()> {
        let reals = [
            self.k0,
            self.q_yield,
            self.k2,
            self.k3,
            self.mu,
            self.eta,
            self.beta,
            self.gamma,
            self.a,
            self.tol,
        ];
        if !reals.iter().all(|v| v.is_finite()) {
            return Err(Error::Construction(
                "Bouc-Wen parameters must be finite".into(),
            ));
        }
        if self.k0 <= 0.0 || self.q_yield <= 0.0 {
            return Err(Error::Construction(
                "Bouc-Wen k0 and q_yield must be positive".into(),
            ));
        }
        if self.k2 < 0.0 || self.k3 < 0.0 {
            return Err(Error::Construction(
                "Bouc-Wen k2 and k3 must be non-negative".into(),
            ));
        }
        if self.mu < 1.0 {
            return Err(Error::Construction(format!(
                "Bouc-Wen mu must be at least 1, got {}",
                self.mu
            )));
        }
        if self.eta < 1.0 {
            return Err(Error::Construction(format!(
                "Bouc-Wen eta must be at least 1, got {}",
                self.eta
            )));
        }
        if self.tol <= 0.0 || self.max_iter == 0 {
            return Err(Error::Construction(
                "Bouc-Wen tol must be positive and max_iter nonzero".into(),
            ));
        }
        Ok(())
    }

    fn yield_displacement(&self) -> f64 {
        self.q_yield / self.k0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct State<const N: usize> {
    u: SVector<f64, N>,
    z: SVector<f64, N>,
    q: SVector<f64, N>,
    k: SMatrix<f64, N, N>,
}

impl<const N: usize> State<N> {
    fn at_rest(params: &BoucWenParams) -> Self {
        Self {
            u: SVector::zeros(),
            z: SVector::zeros(),
            q: SVector::zeros(),
            k: initial_tangent(params),
        }
    }
}

fn initial_tangent<const N: usize>(params: &BoucWenParams) -> SMatrix<f64, N, N> {
    SMatrix::identity() * (params.a * params.k0 + params.k2)
}

/// `|z|^(eta-2)`, zero at the origin where `z_i z_k |z|^(eta-2)` vanishes.
fn norm_power<const N: usize>(z: &SVector<f64, N>, exponent: f64) -> f64 {
    let norm = z.norm();
    if norm == 0.0 { 0.0 } else { norm.powf(exponent) }
}

/// `beta + gamma sgn(z_j du_j)` per component.
fn shape<const N: usize>(params: &BoucWenParams, z: &SVector<f64, N>, du: &SVector<f64, N>) -> SVector<f64, N> {
    SVector::from_fn(|j, _| params.beta + params.gamma * sgn(z[j] * du[j]))
}

/// Bouc-Wen model over `N` coupled components.
#[derive(Debug, Clone, PartialEq)]
pub struct BoucWen<const N: usize> {
    params: BoucWenParams,
    trial: State<N>,
    committed: State<N>,
}

impl<const N: usize> BoucWen<N> {
    /// 11 parameters followed by committed `u`, `z`, `q` and `k`.
    pub const DATA_LEN: usize = 11 + 3 * N + N * N;

    pub fn new(params: BoucWenParams) -> Result<Self> {
        params.validate()?;
        let state = State::at_rest(&params);
        Ok(Self {
            params,
            trial: state,
            committed: state,
        })
    }

    pub fn params(&self) -> &BoucWenParams {
        &self.params
    }

    /// Integrate `z` to the trial deformation `u`.
    ///
    /// # Errors
    /// `SingularJacobian` for a vanishing Jacobian pivot and
    /// `ConvergenceFailure` once `max_iter` is exhausted. The trial state is
    /// left untouched on failure.
    pub fn set_trial_deformation(&mut self, u: &SVector<f64, N>) -> Result<()> {
        let p = self.params;
        let uy = p.yield_displacement();
        let du = u - self.committed.u;

        let z = if du.iter().all(|v| *v == 0.0) {
            self.committed.z
        } else {
            self.solve_evolution(&du, uy)?
        };

        // tangent of the evolution law at the converged z
        let g = norm_power(&z, p.eta - 2.0);
        let t = shape(&p, &z, &du);
        let dzdu = SMatrix::<f64, N, N>::from_fn(|i, k| {
            let delta = if i == k { p.a } else { 0.0 };
            (delta - z[i] * g * z[k] * t[k]) / uy
        });

        let mut q = z * p.q_yield + u * p.k2;
        let mut k = dzdu * p.q_yield + SMatrix::identity() * p.k2;
        add_hardening(p.k3, p.mu, u, &mut q, &mut k);

        self.trial = State { u: *u, z, q, k };
        Ok(())
    }

    fn solve_evolution(&self, du: &SVector<f64, N>, uy: f64) -> Result<SVector<f64, N>> {
        let p = &self.params;
        let z_committed = self.committed.z;
        let mut z = z_committed;
        let mut norm = f64::INFINITY;

        for _ in 0..p.max_iter {
            let t = shape(p, &z, du);
            let g = norm_power(&z, p.eta - 2.0);
            let dg = norm_power(&z, p.eta - 4.0) * (p.eta - 2.0);
            let weighted = du.component_mul(&t);
            let proj = z.dot(&weighted);
            let s = g * proj;

            let f = SVector::<f64, N>::from_fn(|i, _| {
                z[i] - z_committed[i] - (p.a * du[i] - z[i] * s) / uy
            });
            let jac = SMatrix::<f64, N, N>::from_fn(|i, k| {
                let ds_dzk = g * weighted[k] + proj * dg * z[k];
                let delta = if i == k { 1.0 + s / uy } else { 0.0 };
                delta + z[i] * ds_dzk / uy
            });

            if (0..N).any(|i| jac[(i, i)].abs() <= f64::EPSILON) {
                return Err(Error::SingularJacobian);
            }
            let inv = jac.try_inverse().ok_or(Error::SingularJacobian)?;

            let dz = inv * f;
            z -= dz;
            norm = dz.norm();
            if norm < p.tol {
                return Ok(z);
            }
        }

        warn!(
            iterations = p.max_iter,
            norm, "Bouc-Wen evolution did not converge"
        );
        Err(Error::ConvergenceFailure {
            iterations: p.max_iter,
            norm,
        })
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
        initial_tangent(&self.params)
    }

    /// Trial evolution variable.
    pub fn z(&self) -> &SVector<f64, N> {
        &self.trial.z
    }

    pub(crate) fn to_data(&self) -> Vec<f64> {
        let p = &self.params;
        let c = &self.committed;
        let mut data = Vec::with_capacity(Self::DATA_LEN);
        data.extend_from_slice(&[
            p.k0,
            p.q_yield,
            p.k2,
            p.k3,
            p.mu,
            p.eta,
            p.beta,
            p.gamma,
            p.a,
            p.tol,
            p.max_iter as f64,
        ]);
        data.extend_from_slice(c.u.as_slice());
        data.extend_from_slice(c.z.as_slice());
        data.extend_from_slice(c.q.as_slice());
        data.extend_from_slice(c.k.as_slice());
        data
    }

    pub(crate) fn from_data(data: &[f64]) -> Result<Self> {
        if data.len() != Self::DATA_LEN {
            return Err(Error::SerializationMismatch(format!(
                "Bouc-Wen data has {} entries, expected {}",
                data.len(),
                Self::DATA_LEN
            )));
        }
        let params = BoucWenParams {
            k0: data[0],
            q_yield: data[1],
            k2: data[2],
            k3: data[3],
            mu: data[4],
            eta: data[5],
            beta: data[6],
            gamma: data[7],
            a: data[8],
            tol: data[9],
            max_iter: data[10] as usize,
        };
        params.validate()?;

        let (u, rest) = data[11..].split_at(N);
        let (z, rest) = rest.split_at(N);
        let (q, k) = rest.split_at(N);
        let state = State {
            u: SVector::from_column_slice(u),
            z: SVector::from_column_slice(z),
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

impl<const N: usize> HystereticState for BoucWen<N> {
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

    fn params() -> BoucWenParams {
        BoucWenParams {
            k0: 100.0,
            q_yield: 10.0,
            k2: 5.0,
            ..Default::default()
        }
    }

    #[test]
    fn biaxial_monotonic_loading_stays_bounded() {
        let mut m = BoucWen::<2>::new(params()).unwrap();
        let dir = Vector2::new(30f64.to_radians().cos(), 30f64.to_radians().sin());

        let mut previous = 0.0;
        for step in 1..=200 {
            let u = dir * (0.01 * step as f64);
            m.set_trial_deformation(&u).unwrap();
            m.commit_state();

            let z_norm = m.z().norm();
            assert!(z_norm <= 1.0 + 1e-12, "|z| = {z_norm} at step {step}");
            assert!(z_norm >= previous);
            previous = z_norm;

            // z stays aligned with the loading direction
            assert_relative_eq!(m.z().normalize(), dir, epsilon = 1e-9);
        }
        assert!(previous > 0.99);
    }

    #[test]
    fn first_increment_matches_backward_euler() {
        let mut m = BoucWen::<1>::new(params()).unwrap();
        m.set_trial_deformation(&Vector1::new(0.05)).unwrap();
        // eta = 1: z = h / (1 + h) with h = du / uy = 0.5
        assert_relative_eq!(m.z()[0], 1.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(m.force()[0], 10.0 / 3.0 + 0.25, epsilon = 1e-9);
    }

    #[test]
    fn uniaxial_tangent_matches_rate_form() {
        let mut m = BoucWen::<1>::new(params()).unwrap();
        m.set_trial_deformation(&Vector1::new(0.05)).unwrap();
        let z = m.z()[0];
        // q_yield * (A - |z|^eta (beta + gamma)) / uy + k2
        let expected = 10.0 * (1.0 - z) / 0.1 + 5.0;
        assert_relative_eq!(m.tangent()[(0, 0)], expected, epsilon = 1e-9);
    }

    #[test]
    fn zero_increment_keeps_committed_z() {
        let mut m = BoucWen::<2>::new(params()).unwrap();
        m.set_trial_deformation(&Vector2::new(0.02, 0.01)).unwrap();
        m.commit_state();
        let z = *m.z();

        m.set_trial_deformation(&Vector2::new(0.02, 0.01)).unwrap();
        assert_eq!(*m.z(), z);
    }

    #[test]
    fn initial_tangent() {
        let m = BoucWen::<2>::new(params()).unwrap();
        assert_eq!(m.initial_tangent(), SMatrix::<f64, 2, 2>::identity() * 105.0);
        assert_eq!(*m.tangent(), m.initial_tangent());
    }

    #[test]
    fn iteration_limit_reports_convergence_failure() {
        let mut m = BoucWen::<1>::new(BoucWenParams {
            max_iter: 1,
            ..params()
        })
        .unwrap();
        let err = m.set_trial_deformation(&Vector1::new(0.5)).unwrap_err();
        assert!(matches!(err, Error::ConvergenceFailure { iterations: 1, .. }));
        // trial state untouched
        assert_eq!(m.z()[0], 0.0);
    }

    #[test]
    fn vanishing_jacobian_pivot_is_singular() {
        // eta = 2, gamma = 0: F'(z) = 1 + 2 beta z du / uy, zero for
        // beta = 0.5, z = 0.5, du = -2, uy = 1
        let data = [
            1.0, 1.0, 0.0, 0.0, 2.0, 2.0, 0.5, 0.0, 1.0, 1e-12, 25.0, // params
            0.0, 0.5, 0.5, 1.0, // committed u, z, q, k
        ];
        let mut m = BoucWen::<1>::from_data(&data).unwrap();
        let err = m.set_trial_deformation(&Vector1::new(-2.0)).unwrap_err();
        assert_eq!(err, Error::SingularJacobian);
    }

    #[test]
    fn eta_below_one_is_rejected() {
        assert!(matches!(
            BoucWen::<2>::new(BoucWenParams { eta: 0.5, ..params() }),
            Err(Error::Construction(_))
        ));
    }

    #[test]
    fn revert_and_restore() {
        let mut m = BoucWen::<2>::new(params()).unwrap();
        m.set_trial_deformation(&Vector2::new(0.05, -0.02)).unwrap();
        m.commit_state();
        let committed = m.clone();

        m.set_trial_deformation(&Vector2::new(0.2, 0.1)).unwrap();
        m.revert_to_last_commit();
        assert_eq!(m, committed);

        let restored = BoucWen::<2>::from_data(&m.to_data()).unwrap();
        assert_eq!(restored, m);

        m.revert_to_start();
        assert_eq!(m, BoucWen::<2>::new(params()).unwrap());
    }
}
