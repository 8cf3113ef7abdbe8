//! Nodes and the domain container elements resolve them from.
//!
//! Elements never own nodes. They keep node tags and look nodes up in the
//! [`Domain`] on `set_domain` and on every `update`. During element update
//! the domain is only read, so elements can be updated in parallel.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A node with trial and committed response.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    tag: i32,
    coords: Vec<f64>,
    ndf: usize,
    trial_disp: Vec<f64>,
    trial_vel: Vec<f64>,
    trial_accel: Vec<f64>,
    commit_disp: Vec<f64>,
    commit_vel: Vec<f64>,
    commit_accel: Vec<f64>,
}

impl Node {
    /// Create a node at rest.
    pub fn new(tag: i32, coords: &[f64], ndf: usize) -> Self {
        Self {
            tag,
            coords: coords.to_vec(),
            ndf,
            trial_disp: vec![0.0; ndf],
            trial_vel: vec![0.0; ndf],
            trial_accel: vec![0.0; ndf],
            commit_disp: vec![0.0; ndf],
            commit_vel: vec![0.0; ndf],
            commit_accel: vec![0.0; ndf],
        }
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    /// Reference coordinates, fixed after the model is built.
    pub fn coordinates(&self) -> &[f64] {
        &self.coords
    }

    pub fn number_of_dof(&self) -> usize {
        self.ndf
    }

    pub fn trial_displacement(&self) -> &[f64] {
        &self.trial_disp
    }

    pub fn trial_velocity(&self) -> &[f64] {
        &self.trial_vel
    }

    pub fn trial_acceleration(&self) -> &[f64] {
        &self.trial_accel
    }

    pub fn committed_displacement(&self) -> &[f64] {
        &self.commit_disp
    }

    pub fn set_trial_displacement(&mut self, disp: &[f64]) -> Result<()> {
        self.check_len(disp.len())?;
        self.trial_disp.copy_from_slice(disp);
        Ok(())
    }

    pub fn incr_trial_displacement(&mut self, incr: &[f64]) -> Result<()> {
        self.check_len(incr.len())?;
        for (u, du) in self.trial_disp.iter_mut().zip(incr) {
            *u += du;
        }
        Ok(())
    }

    pub fn set_trial_velocity(&mut self, vel: &[f64]) -> Result<()> {
        self.check_len(vel.len())?;
        self.trial_vel.copy_from_slice(vel);
        Ok(())
    }

    pub fn set_trial_acceleration(&mut self, accel: &[f64]) -> Result<()> {
        self.check_len(accel.len())?;
        self.trial_accel.copy_from_slice(accel);
        Ok(())
    }

    pub fn commit_state(&mut self) {
        self.commit_disp.clone_from(&self.trial_disp);
        self.commit_vel.clone_from(&self.trial_vel);
        self.commit_accel.clone_from(&self.trial_accel);
    }

    pub fn revert_to_last_commit(&mut self) {
        self.trial_disp.clone_from(&self.commit_disp);
        self.trial_vel.clone_from(&self.commit_vel);
        self.trial_accel.clone_from(&self.commit_accel);
    }

    pub fn revert_to_start(&mut self) {
        for values in [
            &mut self.trial_disp,
            &mut self.trial_vel,
            &mut self.trial_accel,
            &mut self.commit_disp,
            &mut self.commit_vel,
            &mut self.commit_accel,
        ] {
            values.fill(0.0);
        }
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.ndf {
            return Err(Error::IncompatibleDof {
                node: self.tag,
                expected: self.ndf,
                found: len,
            });
        }
        Ok(())
    }
}

/// Owning container of nodes, keyed by tag.
#[derive(Debug, Clone, Default)]
pub struct Domain {
    nodes: BTreeMap<i32, Node>,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.tag) {
            return Err(Error::DuplicateTag {
                kind: "node",
                tag: node.tag,
            });
        }
        self.nodes.insert(node.tag, node);
        Ok(())
    }

    pub fn node(&self, tag: i32) -> Result<&Node> {
        self.nodes.get(&tag).ok_or(Error::NodeNotFound(tag))
    }

    pub fn node_mut(&mut self, tag: i32) -> Result<&mut Node> {
        self.nodes.get_mut(&tag).ok_or(Error::NodeNotFound(tag))
    }

    /// Nodes in ascending tag order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn commit_state(&mut self) {
        self.nodes.values_mut().for_each(Node::commit_state);
    }

    pub fn revert_to_last_commit(&mut self) {
        self.nodes.values_mut().for_each(Node::revert_to_last_commit);
    }

    pub fn revert_to_start(&mut self) {
        self.nodes.values_mut().for_each(Node::revert_to_start);
    }
}
