//! JSON description of a quasi-static cyclic bearing test.

use std::fs;
use std::path::Path;

use nlfe_solver::{BoucWenParams, Formulation, UniaxialConfig};
use serde::{Deserialize, Serialize};

/// Planar bearing standing on a fixed base node, sheared at the top node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CyclicTestConfig {
    /// Free-text job name, stored in checkpoint metadata
    pub name: String,
    /// Bearing height (distance between the nodes)
    pub height: f64,
    pub shear: UniaxialConfig,
    pub axial: UniaxialConfig,
    pub moment: UniaxialConfig,
    pub shear_dist: f64,
    pub formulation: Formulation,
    /// Peak shear displacement of each cycle
    pub amplitudes: Vec<f64>,
    /// Increments between two turning points
    pub steps_per_leg: usize,
}

impl Default for CyclicTestConfig {
    fn default() -> Self {
        Self {
            name: "cyclic".to_string(),
            height: 0.2,
            shear: UniaxialConfig::BoucWen(BoucWenParams {
                k0: 100.0,
                q_yield: 10.0,
                k2: 5.0,
                ..Default::default()
            }),
            axial: UniaxialConfig::Elastic { k: 1.0e4 },
            moment: UniaxialConfig::Elastic { k: 100.0 },
            shear_dist: 0.5,
            formulation: Formulation::Linear,
            amplitudes: vec![0.05, 0.1, 0.2],
            steps_per_leg: 25,
        }
    }
}

impl CyclicTestConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.height > 0.0) {
            return Err(format!("height must be positive, got {}", self.height));
        }
        if self.steps_per_leg == 0 {
            return Err("steps_per_leg must be at least 1".to_string());
        }
        if self.amplitudes.iter().any(|a| !a.is_finite() || *a <= 0.0) {
            return Err("amplitudes must be finite and positive".to_string());
        }
        Ok(())
    }

    /// Imposed shear displacements, each cycle `0 → A → 0 → -A → 0`.
    pub fn protocol(&self) -> Vec<f64> {
        let n = self.steps_per_leg;
        let mut path = Vec::with_capacity(4 * n * self.amplitudes.len());
        for &amplitude in &self.amplitudes {
            for (from, to) in [
                (0.0, amplitude),
                (amplitude, 0.0),
                (0.0, -amplitude),
                (-amplitude, 0.0),
            ] {
                path.extend((1..=n).map(|i| from + (to - from) * i as f64 / n as f64));
            }
        }
        path
    }
}
