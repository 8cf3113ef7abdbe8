//! Model container: the domain plus the elements attached to it.
//!
//! Elements are kept in insertion order with a tag index on the side.
//! Element updates run in parallel with rayon once every element has been
//! bound; the domain is only read while they run.

use std::collections::{BTreeMap, HashMap};

use nalgebra::{DMatrix, DVector};
use nlfe_io::Channel;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{Domain, Node};
use crate::elements::{Element, ElementKind};
use crate::error::{Error, Result};

/// Global equation numbering.
///
/// Nodes are numbered in ascending tag order and each node owns a
/// contiguous block of `ndf` equations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    blocks: BTreeMap<i32, (usize, usize)>,
    num_dofs: usize,
}

impl DofMap {
    pub fn new(domain: &Domain) -> Self {
        let mut blocks = BTreeMap::new();
        let mut next = 0usize;
        for node in domain.nodes() {
            blocks.insert(node.tag(), (next, node.number_of_dof()));
            next += node.number_of_dof();
        }
        Self {
            blocks,
            num_dofs: next,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Global equation of local DOF `dof` of `node`.
    pub fn dof(&self, node: i32, dof: usize) -> Result<usize> {
        let &(offset, ndf) = self.blocks.get(&node).ok_or(Error::NodeNotFound(node))?;
        if dof >= ndf {
            return Err(Error::IncompatibleDof {
                node,
                expected: ndf,
                found: dof + 1,
            });
        }
        Ok(offset + dof)
    }

    /// Equations of an element, node I DOFs then node J DOFs.
    pub fn element_dofs(&self, element: &dyn Element) -> Result<Vec<usize>> {
        let ndf = element.dofs_per_node();
        let mut dofs = Vec::with_capacity(element.num_dofs());
        for node in element.node_tags() {
            let &(offset, found) = self.blocks.get(&node).ok_or(Error::NodeNotFound(node))?;
            if found != ndf {
                return Err(Error::IncompatibleDof {
                    node,
                    expected: ndf,
                    found,
                });
            }
            dofs.extend(offset..offset + ndf);
        }
        Ok(dofs)
    }
}

/// Owning container for nodes and elements.
#[derive(Debug, Clone, Default)]
pub struct Model {
    domain: Domain,
    elements: Vec<ElementKind>,
    index: HashMap<i32, usize>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut Domain {
        &mut self.domain
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        self.domain.add_node(node)
    }

    pub fn add_element(&mut self, element: impl Into<ElementKind>) -> Result<()> {
        let element = element.into();
        let tag = element.tag();
        if self.index.contains_key(&tag) {
            return Err(Error::DuplicateTag {
                kind: "element",
                tag,
            });
        }
        self.index.insert(tag, self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    /// Remove an element, keeping the order of the others.
    pub fn remove_element(&mut self, tag: i32) -> Result<ElementKind> {
        let position = self.index.remove(&tag).ok_or(Error::ElementNotFound(tag))?;
        let element = self.elements.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Ok(element)
    }

    pub fn element(&self, tag: i32) -> Result<&ElementKind> {
        self.index
            .get(&tag)
            .map(|&i| &self.elements[i])
            .ok_or(Error::ElementNotFound(tag))
    }

    pub fn element_mut(&mut self, tag: i32) -> Result<&mut ElementKind> {
        match self.index.get(&tag) {
            Some(&i) => Ok(&mut self.elements[i]),
            None => Err(Error::ElementNotFound(tag)),
        }
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> &[ElementKind] {
        &self.elements
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn dof_map(&self) -> DofMap {
        DofMap::new(&self.domain)
    }

    /// Bind every element to the domain.
    ///
    /// All elements are attempted; the first failure is returned with its
    /// element tag. Degenerate geometry does not count as a failure here.
    pub fn set_domain_all(&mut self) -> Result<()> {
        let mut first = None;
        for element in &mut self.elements {
            let tag = element.tag();
            if let Err(err) = element.as_element_mut().set_domain(&self.domain) {
                warn!(element = tag, error = %err, "element could not be bound");
                first.get_or_insert(Error::element(tag, err));
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Update all elements from the trial displacements of the domain.
    pub fn update_all(&mut self) -> Result<()> {
        let domain = &self.domain;
        self.elements.par_iter_mut().try_for_each(|element| {
            let tag = element.tag();
            element.as_element_mut().update(domain).map_err(|err| {
                warn!(element = tag, error = %err, "element update failed");
                Error::element(tag, err)
            })
        })
    }

    pub fn commit_state(&mut self) {
        self.domain.commit_state();
        for element in &mut self.elements {
            element.as_element_mut().commit_state();
        }
        debug!(elements = self.elements.len(), "model committed");
    }

    pub fn revert_to_last_commit(&mut self) {
        self.domain.revert_to_last_commit();
        for element in &mut self.elements {
            element.as_element_mut().revert_to_last_commit();
        }
        debug!(elements = self.elements.len(), "model reverted to last commit");
    }

    pub fn revert_to_start(&mut self) {
        self.domain.revert_to_start();
        for element in &mut self.elements {
            element.as_element_mut().revert_to_start();
        }
        debug!(elements = self.elements.len(), "model reverted to start");
    }

    /// Trial displacements of every node as one global vector.
    pub fn trial_displacements(&self, dofs: &DofMap) -> Result<DVector<f64>> {
        let mut u = DVector::zeros(dofs.num_dofs());
        for node in self.domain.nodes() {
            let start = dofs.dof(node.tag(), 0)?;
            u.rows_mut(start, node.number_of_dof())
                .copy_from_slice(node.trial_displacement());
        }
        Ok(u)
    }

    /// Scatter a global vector into the nodal trial displacements.
    pub fn set_trial_displacements(&mut self, dofs: &DofMap, u: &DVector<f64>) -> Result<()> {
        if u.len() != dofs.num_dofs() {
            return Err(Error::Solver(format!(
                "displacement vector has {} entries, model has {} equations",
                u.len(),
                dofs.num_dofs()
            )));
        }
        let tags: Vec<i32> = self.domain.nodes().map(Node::tag).collect();
        for tag in tags {
            let start = dofs.dof(tag, 0)?;
            let node = self.domain.node_mut(tag)?;
            let ndf = node.number_of_dof();
            node.set_trial_displacement(&u.as_slice()[start..start + ndf])?;
        }
        Ok(())
    }

    /// Dense global tangent from the current trial state.
    pub fn assemble_tangent(&self, dofs: &DofMap) -> Result<DMatrix<f64>> {
        let n = dofs.num_dofs();
        let mut k = DMatrix::zeros(n, n);
        for element in &self.elements {
            let element = element.as_element();
            let map = dofs.element_dofs(element)?;
            let ke = element.tangent_stiff();
            for (a, &ga) in map.iter().enumerate() {
                for (b, &gb) in map.iter().enumerate() {
                    k[(ga, gb)] += ke[(a, b)];
                }
            }
        }
        Ok(k)
    }

    /// Dense global resisting force from the current trial state.
    pub fn assemble_resisting_force(&self, dofs: &DofMap) -> Result<DVector<f64>> {
        let mut f = DVector::zeros(dofs.num_dofs());
        for element in &self.elements {
            let element = element.as_element();
            let map = dofs.element_dofs(element)?;
            let fe = element.resisting_force();
            for (a, &ga) in map.iter().enumerate() {
                f[ga] += fe[a];
            }
        }
        Ok(f)
    }

    /// Send every element, in model order.
    pub fn send_elements(&self, commit_tag: i32, channel: &mut dyn Channel) -> Result<()> {
        for element in &self.elements {
            let tag = element.tag();
            element
                .as_element()
                .send_self(commit_tag, channel)
                .map_err(|err| Error::element(tag, err))?;
        }
        Ok(())
    }

    /// Replace every element with the copy read from `channel` and bind it.
    ///
    /// The channel must hold the payload of [`Model::send_elements`] for a
    /// model with the same element tags in the same order.
    pub fn recv_elements(&mut self, commit_tag: i32, channel: &mut dyn Channel) -> Result<()> {
        for element in &mut self.elements {
            let tag = element.tag();
            let mut received = ElementKind::recv_self(tag, commit_tag, channel)
                .map_err(|err| Error::element(tag, err))?;
            received
                .as_element_mut()
                .set_domain(&self.domain)
                .map_err(|err| Error::element(tag, err))?;
            *element = received;
        }
        debug!(elements = self.elements.len(), commit_tag, "model restored");
        Ok(())
    }
}
