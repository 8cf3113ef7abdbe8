//! Displacement-controlled cyclic test of a single planar bearing.

use nlfe_io::{Checkpoint, MemoryChannel};
use nlfe_solver::{
    Bearing2d, Bearing2dMaterials, Element, Model, Node, ResponseKind, Result,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CyclicTestConfig;

const BASE: i32 = 1;
const TOP: i32 = 2;
const BEARING: i32 = 1;

/// One converged point of the hysteresis loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopPoint {
    pub step: usize,
    /// Imposed shear deformation
    pub u: f64,
    /// Basic shear force
    pub q: f64,
    /// Hysteretic variable of the shear material, if it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

/// Vertical bearing from the base node to the top node.
pub fn build_model(config: &CyclicTestConfig) -> Result<Model> {
    let mut model = Model::new();
    model.add_node(Node::new(BASE, &[0.0, 0.0], 3))?;
    model.add_node(Node::new(TOP, &[0.0, config.height], 3))?;

    let materials = Bearing2dMaterials {
        axial: config.axial.build()?,
        shear: config.shear.build()?,
        moment: config.moment.build()?,
    };
    let bearing = Bearing2d::new(
        BEARING,
        [BASE, TOP],
        materials,
        config.shear_dist,
        config.formulation,
    )?;
    model.add_element(bearing)?;
    model.set_domain_all()?;
    Ok(model)
}

/// Drive the top node through the protocol, committing every increment.
pub fn run(config: &CyclicTestConfig, model: &mut Model) -> Result<Vec<LoopPoint>> {
    let protocol = config.protocol();
    info!(steps = protocol.len(), name = %config.name, "cyclic test started");

    let mut points = Vec::with_capacity(protocol.len());
    for (step, u) in protocol.into_iter().enumerate() {
        // Local y of a vertical bearing is global -x.
        model
            .domain_mut()
            .node_mut(TOP)?
            .set_trial_displacement(&[-u, 0.0, 0.0])?;
        model.update_all()?;
        model.commit_state();

        let bearing = model.element(BEARING)?.as_element();
        let q = bearing.response(ResponseKind::BasicForce)?[1];
        let z = bearing
            .response(ResponseKind::HystereticVariables)?
            .first()
            .copied();
        debug!(step, u, q, "increment committed");
        points.push(LoopPoint { step, u, q, z });
    }
    Ok(points)
}

/// Pack the committed element state for a checkpoint file.
pub fn checkpoint(config: &CyclicTestConfig, model: &Model, step: usize) -> Result<Checkpoint> {
    let mut channel = MemoryChannel::new();
    let commit_tag = i32::try_from(step).unwrap_or(i32::MAX);
    model.send_elements(commit_tag, &mut channel)?;
    let mut checkpoint = Checkpoint::from_channel(step, step as f64, channel);
    checkpoint
        .metadata
        .insert("job".to_string(), config.name.clone());
    checkpoint
        .metadata
        .insert("commit_tag".to_string(), commit_tag.to_string());
    Ok(checkpoint)
}
