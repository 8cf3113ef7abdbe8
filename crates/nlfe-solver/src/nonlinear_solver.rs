//! Nonlinear static analysis using load-controlled Newton-Raphson.
//!
//! Solves the equilibrium equation on the free DOFs:
//! R(u) = λ F_ref - F_int(u) = 0
//!
//! where:
//! - λ = load factor, advanced from 0 to 1 in `num_steps` increments
//! - F_ref = reference nodal loads
//! - F_int = assembled element resisting forces (function of u)
//!
//! # Newton-Raphson Method
//!
//! For each load increment:
//! 1. Update elements and compute residual: R_i = λ F_ref - F_int(u_i)
//! 2. Check convergence: ||R_i|| < tol_force · max(||λ F_ref||, 1)
//! 3. Assemble tangent stiffness K_T and solve K_T · Δu = R_i (dense LU)
//! 4. Update trial displacements: u_{i+1} = u_i + Δu
//!
//! # Step subdivision
//!
//! An element failure (hysteretic Newton breakdown, degenerate geometry) or
//! an unconverged increment reverts the model to the last committed state
//! and halves the load increment, at most `max_subdivisions` times.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::elements::{Element, ElementPhase};
use crate::error::{Error, Result};
use crate::model::{DofMap, Model};

/// Nonlinear solver configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearConfig {
    /// Maximum Newton iterations per load increment
    pub max_iterations: usize,
    /// Force residual tolerance (relative to the applied load)
    pub tol_force: f64,
    /// Number of equal load increments
    pub num_steps: usize,
    /// How many times a failed increment may be halved
    pub max_subdivisions: usize,
    /// Residual growth (relative to the first iteration) treated as divergence
    pub divergence_factor: f64,
}

impl Default for NonlinearConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tol_force: 1e-8,
            num_steps: 1,
            max_subdivisions: 4,
            divergence_factor: 1e6,
        }
    }
}

impl NonlinearConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 || self.num_steps == 0 {
            return Err(Error::Solver(
                "max_iterations and num_steps must be at least 1".into(),
            ));
        }
        if !(self.tol_force > 0.0) || !(self.divergence_factor > 1.0) {
            return Err(Error::Solver(
                "tol_force must be positive and divergence_factor greater than 1".into(),
            ));
        }
        Ok(())
    }
}

/// Reference load on one nodal DOF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodalLoad {
    pub node: i32,
    pub dof: usize,
    pub value: f64,
}

/// Homogeneous support on one nodal DOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixity {
    pub node: i32,
    pub dof: usize,
}

/// Reference loads and supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadCase {
    pub loads: Vec<NodalLoad>,
    pub fixed: Vec<Fixity>,
}

impl LoadCase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(mut self, node: i32, dof: usize, value: f64) -> Self {
        self.loads.push(NodalLoad { node, dof, value });
        self
    }

    pub fn fix(mut self, node: i32, dofs: &[usize]) -> Self {
        self.fixed
            .extend(dofs.iter().map(|&dof| Fixity { node, dof }));
        self
    }

    fn reference_vector(&self, dofs: &DofMap) -> Result<DVector<f64>> {
        let mut f = DVector::zeros(dofs.num_dofs());
        for load in &self.loads {
            f[dofs.dof(load.node, load.dof)?] += load.value;
        }
        Ok(f)
    }

    fn free_dofs(&self, dofs: &DofMap) -> Result<Vec<usize>> {
        let mut free = vec![true; dofs.num_dofs()];
        for fixity in &self.fixed {
            free[dofs.dof(fixity.node, fixity.dof)?] = false;
        }
        Ok((0..dofs.num_dofs()).filter(|&i| free[i]).collect())
    }
}

/// Converged load increment.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Load factor reached at the end of the increment
    pub load_factor: f64,
    /// Newton iterations used
    pub iterations: usize,
    /// Residual norm at each iteration
    pub residual_history: Vec<f64>,
}

impl StepReport {
    pub fn residual_norm(&self) -> f64 {
        self.residual_history.last().copied().unwrap_or(0.0)
    }
}

/// Nonlinear analysis results
#[derive(Debug, Clone)]
pub struct NonlinearResults {
    /// Converged global displacement vector (DofMap numbering)
    pub displacement: DVector<f64>,
    /// Converged increments in order
    pub steps: Vec<StepReport>,
    /// Number of times an increment was halved
    pub subdivisions: usize,
}

impl NonlinearResults {
    pub fn num_iterations(&self) -> usize {
        self.steps.iter().map(|s| s.iterations).sum()
    }

    pub fn load_factor(&self) -> f64 {
        self.steps.last().map_or(0.0, |s| s.load_factor)
    }
}

/// Load-controlled nonlinear static solver.
pub struct NonlinearSolver {
    config: NonlinearConfig,
    load_case: LoadCase,
}

impl NonlinearSolver {
    pub fn new(config: NonlinearConfig, load_case: LoadCase) -> Self {
        Self { config, load_case }
    }

    pub fn config(&self) -> &NonlinearConfig {
        &self.config
    }

    /// Apply the load case to `model`, committing every converged increment.
    ///
    /// Elements must already be bound with [`Model::set_domain_all`]. On
    /// error the model is left at the last converged increment.
    pub fn solve(&self, model: &mut Model) -> Result<NonlinearResults> {
        self.config.validate()?;
        if let Some(element) = model
            .elements()
            .iter()
            .find(|e| e.as_element().phase() == ElementPhase::Unbuilt)
        {
            return Err(Error::element(element.tag(), Error::NotBound(element.tag())));
        }

        let dofs = model.dof_map();
        let f_ref = self.load_case.reference_vector(&dofs)?;
        let free = self.load_case.free_dofs(&dofs)?;

        let mut steps = Vec::new();
        let mut subdivisions = 0usize;
        let mut increment = 1.0 / self.config.num_steps as f64;
        let mut committed = 0.0f64;

        while committed < 1.0 - 1e-12 {
            let target = (committed + increment).min(1.0);
            match self.newton(model, &dofs, &f_ref, &free, target) {
                Ok(report) => {
                    model.commit_state();
                    info!(
                        load_factor = target,
                        iterations = report.iterations,
                        residual = report.residual_norm(),
                        "load increment converged"
                    );
                    committed = target;
                    steps.push(report);
                }
                Err(err) => {
                    model.revert_to_last_commit();
                    if subdivisions >= self.config.max_subdivisions {
                        warn!(load_factor = target, error = %err, "giving up on load increment");
                        return Err(Error::Solver(format!(
                            "load factor {target:.6} not reached after {subdivisions} subdivisions: {err}"
                        )));
                    }
                    subdivisions += 1;
                    increment *= 0.5;
                    warn!(
                        load_factor = target,
                        increment,
                        error = %err,
                        "load increment failed, subdividing"
                    );
                }
            }
        }

        Ok(NonlinearResults {
            displacement: model.trial_displacements(&dofs)?,
            steps,
            subdivisions,
        })
    }

    fn newton(
        &self,
        model: &mut Model,
        dofs: &DofMap,
        f_ref: &DVector<f64>,
        free: &[usize],
        load_factor: f64,
    ) -> Result<StepReport> {
        let f_ext = f_ref * load_factor;
        let reference = f_ext.norm().max(1.0);
        let mut residual_history = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            model.update_all()?;

            let f_int = model.assemble_resisting_force(dofs)?;
            let r = (&f_ext - f_int).select_rows(free);
            let r_norm = r.norm();
            residual_history.push(r_norm);
            debug!(iteration, residual = r_norm, "newton iteration");

            if r_norm <= self.config.tol_force * reference {
                return Ok(StepReport {
                    load_factor,
                    iterations: iteration,
                    residual_history,
                });
            }
            if r_norm > self.config.divergence_factor * residual_history[0].max(reference) {
                return Err(Error::Solver(format!(
                    "Newton-Raphson diverged at iteration {iteration} (residual = {r_norm:.3e})"
                )));
            }

            let k = model.assemble_tangent(dofs)?;
            let du = solve_free(&k, &r, free)?;

            let mut u = model.trial_displacements(dofs)?;
            for (&i, value) in free.iter().zip(du.iter()) {
                u[i] += value;
            }
            model.set_trial_displacements(dofs, &u)?;
        }

        Err(Error::Solver(format!(
            "Newton-Raphson failed to converge in {} iterations (final residual = {:.3e})",
            self.config.max_iterations,
            residual_history.last().copied().unwrap_or(0.0)
        )))
    }
}

/// Solve `K_ff · Δu_f = r_f` on the free DOFs.
fn solve_free(k: &DMatrix<f64>, r: &DVector<f64>, free: &[usize]) -> Result<DVector<f64>> {
    let k_ff = k.select_rows(free).select_columns(free);
    k_ff.lu()
        .solve(r)
        .ok_or_else(|| Error::Solver("singular tangent stiffness".into()))
}
