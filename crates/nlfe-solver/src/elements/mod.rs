//! Nonlinear two-node elements.
//!
//! Every element moves through the same [`ElementPhase`] lifecycle:
//!
//! ```text
//! Unbuilt --set_domain--> Bound --update--> TrialSet --commit_state--> Committed
//!                           ^                  |                          |
//!                           +-- revert_to_start+-- revert_to_last_commit--+
//! ```
//!
//! Trial quantities (`ub`, `qb`, `kb`, transform frame, material trial
//! slots) are only written by `update`. Stiffness and force accessors are
//! pure reads of the trial state.

use nalgebra::{DMatrix, DVector, SVector};
use nlfe_io::Channel;
use tracing::warn;

use crate::domain::{Domain, Node};
use crate::error::{Error, Result};
use crate::transform::Formulation;

pub mod bearing2d;
pub mod bearing3d;
pub mod elastic_beam;
pub mod kinematics;
mod response;

pub use bearing2d::{Bearing2d, Bearing2dMaterials};
pub use bearing3d::{Bearing3d, Bearing3dMaterials};
pub use elastic_beam::{ElasticBeam3d, ElasticSection3d};
pub use kinematics::{BasicLayout, BasicState};
pub use response::ResponseKind;

pub const BEARING_2D_CLASS_TAG: i32 = 11;
pub const BEARING_3D_CLASS_TAG: i32 = 12;
pub const ELASTIC_BEAM_3D_CLASS_TAG: i32 = 13;

/// Element ID header: class tag, element tag, node I, node J, formulation
/// code, data vector length.
pub(crate) const ELEMENT_ID_LEN: usize = 6;

/// Element lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementPhase {
    Unbuilt,
    Bound,
    TrialSet,
    Committed,
}

/// Element interface used by the model and the nonlinear driver.
///
/// Vectors and matrices are ordered node I DOFs then node J DOFs.
pub trait Element {
    fn tag(&self) -> i32;

    fn class_tag(&self) -> i32;

    fn node_tags(&self) -> [i32; 2];

    fn dofs_per_node(&self) -> usize;

    fn num_dofs(&self) -> usize {
        2 * self.dofs_per_node()
    }

    fn phase(&self) -> ElementPhase;

    /// Resolve and validate the end nodes and initialize the transform.
    ///
    /// # Errors
    /// `NodeNotFound`, `IncompatibleDof` or `IncompatibleDimension` leave
    /// the element unbuilt. `ZeroLength`/`DegenerateOrientation` leave it
    /// bound but degenerate: `update` keeps reporting the error and all
    /// outputs are zero.
    fn set_domain(&mut self, domain: &Domain) -> Result<()>;

    /// Recompute the trial state from the nodes' trial displacements.
    ///
    /// # Errors
    /// A transform or constitutive failure rolls the element back to its
    /// last committed state before the error is returned.
    fn update(&mut self, domain: &Domain) -> Result<()>;

    fn commit_state(&mut self);

    fn revert_to_last_commit(&mut self);

    fn revert_to_start(&mut self);

    fn tangent_stiff(&self) -> DMatrix<f64>;

    fn initial_stiff(&self) -> DMatrix<f64>;

    fn resisting_force(&self) -> DVector<f64>;

    fn response(&self, kind: ResponseKind) -> Result<Vec<f64>>;

    fn response_by_id(&self, id: i32) -> Result<Vec<f64>> {
        let kind = ResponseKind::from_id(id).ok_or(Error::UnknownResponse(id))?;
        self.response(kind)
    }

    fn send_self(&self, commit_tag: i32, channel: &mut dyn Channel) -> Result<()>;
}

/// Phase bookkeeping shared by all elements.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lifecycle {
    tag: i32,
    phase: ElementPhase,
    last_commit: ElementPhase,
    degenerate: Option<Error>,
}

impl Lifecycle {
    pub(crate) fn new(tag: i32) -> Self {
        Self {
            tag,
            phase: ElementPhase::Unbuilt,
            last_commit: ElementPhase::Unbuilt,
            degenerate: None,
        }
    }

    pub(crate) fn phase(&self) -> ElementPhase {
        self.phase
    }

    /// Bound with a valid geometry.
    pub(crate) fn is_active(&self) -> bool {
        self.phase != ElementPhase::Unbuilt && self.degenerate.is_none()
    }

    pub(crate) fn check_active(&self) -> Result<()> {
        if self.phase == ElementPhase::Unbuilt {
            return Err(Error::NotBound(self.tag));
        }
        match &self.degenerate {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Record the outcome of the geometric initialization.
    pub(crate) fn bind(&mut self, geometry: Result<()>) -> Result<()> {
        self.phase = ElementPhase::Bound;
        self.last_commit = ElementPhase::Bound;
        match geometry {
            Ok(()) => {
                self.degenerate = None;
                Ok(())
            }
            Err(err) => {
                warn!(element = self.tag, error = %err, "degenerate element geometry");
                self.degenerate = Some(err.clone());
                Err(err)
            }
        }
    }

    pub(crate) fn trial_set(&mut self) {
        self.phase = ElementPhase::TrialSet;
    }

    pub(crate) fn commit(&mut self) {
        if self.phase != ElementPhase::Unbuilt {
            self.phase = ElementPhase::Committed;
            self.last_commit = ElementPhase::Committed;
        }
    }

    pub(crate) fn revert(&mut self) {
        if self.phase != ElementPhase::Unbuilt {
            self.phase = self.last_commit;
        }
    }

    pub(crate) fn reset(&mut self) {
        if self.phase != ElementPhase::Unbuilt {
            self.phase = ElementPhase::Bound;
            self.last_commit = ElementPhase::Bound;
        }
    }
}

fn check_node(node: &Node, ndf: usize, dim: usize) -> Result<&Node> {
    if node.number_of_dof() != ndf {
        return Err(Error::IncompatibleDof {
            node: node.tag(),
            expected: ndf,
            found: node.number_of_dof(),
        });
    }
    if node.coordinates().len() < dim {
        return Err(Error::IncompatibleDimension {
            node: node.tag(),
            expected: dim,
            found: node.coordinates().len(),
        });
    }
    Ok(node)
}

/// Look up both end nodes and check their DOF count and dimension.
pub(crate) fn resolve_nodes(
    domain: &Domain,
    nodes: [i32; 2],
    ndf: usize,
    dim: usize,
) -> Result<[&Node; 2]> {
    let ni = check_node(domain.node(nodes[0])?, ndf, dim)?;
    let nj = check_node(domain.node(nodes[1])?, ndf, dim)?;
    Ok([ni, nj])
}

/// Trial displacements of both end nodes, node I first.
pub(crate) fn gather_displacements<const NL: usize>(
    domain: &Domain,
    nodes: [i32; 2],
) -> Result<SVector<f64, NL>> {
    let ndf = NL / 2;
    let mut ug = SVector::<f64, NL>::zeros();
    for (k, &tag) in nodes.iter().enumerate() {
        let node = domain.node(tag)?;
        let disp = node.trial_displacement();
        if disp.len() != ndf {
            return Err(Error::IncompatibleDof {
                node: tag,
                expected: ndf,
                found: disp.len(),
            });
        }
        ug.rows_mut(k * ndf, ndf).copy_from_slice(disp);
    }
    Ok(ug)
}

/// Fixed part of every element's serialized form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ElementHeader {
    pub class_tag: i32,
    pub tag: i32,
    pub nodes: [i32; 2],
    pub formulation: Formulation,
    pub data_len: usize,
}

impl ElementHeader {
    fn to_id(self) -> [i32; ELEMENT_ID_LEN] {
        [
            self.class_tag,
            self.tag,
            self.nodes[0],
            self.nodes[1],
            self.formulation.code(),
            self.data_len as i32,
        ]
    }

    fn from_id(id: &[i32]) -> Result<Self> {
        if id.len() != ELEMENT_ID_LEN {
            return Err(Error::SerializationMismatch(format!(
                "element ID has {} entries, expected {ELEMENT_ID_LEN}",
                id.len()
            )));
        }
        let data_len = usize::try_from(id[5]).map_err(|_| {
            Error::SerializationMismatch(format!("negative data length {}", id[5]))
        })?;
        Ok(Self {
            class_tag: id[0],
            tag: id[1],
            nodes: [id[2], id[3]],
            formulation: Formulation::from_code(id[4])?,
            data_len,
        })
    }

    /// Send the header and the data vector; the element tag is the channel
    /// tag.
    pub(crate) fn send(self, data: &[f64], commit_tag: i32, channel: &mut dyn Channel) -> Result<()> {
        debug_assert_eq!(data.len(), self.data_len);
        channel.send_id(self.tag, commit_tag, &self.to_id())?;
        channel.send_vector(self.tag, commit_tag, data)?;
        Ok(())
    }

    /// Receive the data vector announced by this header, checking it has
    /// `expected` entries.
    pub(crate) fn recv_data(
        self,
        expected: usize,
        commit_tag: i32,
        channel: &mut dyn Channel,
    ) -> Result<Vec<f64>> {
        if self.data_len != expected {
            return Err(Error::SerializationMismatch(format!(
                "element {} declares {} data entries, expected {expected}",
                self.tag, self.data_len
            )));
        }
        Ok(channel.recv_vector(self.tag, commit_tag, expected)?)
    }
}

/// Closed set of element types.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Bearing2d(Bearing2d),
    Bearing3d(Bearing3d),
    ElasticBeam3d(ElasticBeam3d),
}

impl ElementKind {
    pub fn as_element(&self) -> &dyn Element {
        match self {
            ElementKind::Bearing2d(e) => e,
            ElementKind::Bearing3d(e) => e,
            ElementKind::ElasticBeam3d(e) => e,
        }
    }

    pub fn as_element_mut(&mut self) -> &mut dyn Element {
        match self {
            ElementKind::Bearing2d(e) => e,
            ElementKind::Bearing3d(e) => e,
            ElementKind::ElasticBeam3d(e) => e,
        }
    }

    pub fn tag(&self) -> i32 {
        self.as_element().tag()
    }

    /// Rebuild an element sent with [`Element::send_self`].
    ///
    /// The element comes back unbuilt with its committed material history;
    /// call `set_domain` before using it.
    pub fn recv_self(tag: i32, commit_tag: i32, channel: &mut dyn Channel) -> Result<Self> {
        let id = channel.recv_id(tag, commit_tag, ELEMENT_ID_LEN)?;
        let header = ElementHeader::from_id(&id)?;
        if header.tag != tag {
            return Err(Error::SerializationMismatch(format!(
                "expected element {tag}, received {}",
                header.tag
            )));
        }
        match header.class_tag {
            BEARING_2D_CLASS_TAG => {
                Bearing2d::recv_body(header, commit_tag, channel).map(ElementKind::Bearing2d)
            }
            BEARING_3D_CLASS_TAG => {
                Bearing3d::recv_body(header, commit_tag, channel).map(ElementKind::Bearing3d)
            }
            ELASTIC_BEAM_3D_CLASS_TAG => ElasticBeam3d::recv_body(header, commit_tag, channel)
                .map(ElementKind::ElasticBeam3d),
            other => Err(Error::SerializationMismatch(format!(
                "unknown element class tag {other}"
            ))),
        }
    }
}

impl From<Bearing2d> for ElementKind {
    fn from(e: Bearing2d) -> Self {
        ElementKind::Bearing2d(e)
    }
}

impl From<Bearing3d> for ElementKind {
    fn from(e: Bearing3d) -> Self {
        ElementKind::Bearing3d(e)
    }
}

impl From<ElasticBeam3d> for ElementKind {
    fn from(e: ElasticBeam3d) -> Self {
        ElementKind::ElasticBeam3d(e)
    }
}

/// Shear distribution ratio in `[0, 1]`.
pub(crate) fn check_shear_dist(tag: i32, shear_dist: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&shear_dist) {
        return Err(Error::Construction(format!(
            "element {tag}: shear distribution {shear_dist} outside [0, 1]"
        )));
    }
    Ok(())
}
