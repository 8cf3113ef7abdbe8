//! Error types for element, material and transform operations.

use nlfe_io::ChannelError;
use thiserror::Error;

/// Result type alias using the solver [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the element core.
///
/// Construction and binding problems are recoverable by the model builder
/// (drop the offending element). Geometric and constitutive failures are
/// reported to the analysis driver, which decides whether to cut the step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid constructor arguments.
    #[error("construction error: {0}")]
    Construction(String),

    /// A node referenced by an element is not in the domain.
    #[error("node {0} not found")]
    NodeNotFound(i32),

    /// A node or element tag was registered twice.
    #[error("duplicate {kind} tag {tag}")]
    DuplicateTag { kind: &'static str, tag: i32 },

    /// Node DOF count does not match what the element expects.
    #[error("node {node} has {found} DOFs, element requires {expected}")]
    IncompatibleDof {
        node: i32,
        expected: usize,
        found: usize,
    },

    /// Node has fewer coordinates than the element's space dimension.
    #[error("node {node} has {found} coordinates, element requires {expected}")]
    IncompatibleDimension {
        node: i32,
        expected: usize,
        found: usize,
    },

    /// No element with this tag in the model.
    #[error("element {0} not found")]
    ElementNotFound(i32),

    /// Element used before `set_domain`.
    #[error("element {0} is not bound to a domain")]
    NotBound(i32),

    /// Coincident end nodes (transform tag).
    #[error("zero-length element in transform {0}")]
    ZeroLength(i32),

    /// Orientation vector parallel to the element chord (transform tag).
    #[error("orientation vector parallel to element axis in transform {0}")]
    DegenerateOrientation(i32),

    /// Newton-Raphson Jacobian of a hysteretic update has a zero pivot.
    #[error("singular Jacobian in hysteretic evolution update")]
    SingularJacobian,

    /// Newton-Raphson of a hysteretic update ran out of iterations.
    #[error("hysteretic evolution did not converge after {iterations} iterations (norm {norm:.3e})")]
    ConvergenceFailure { iterations: usize, norm: f64 },

    /// Sent and received layouts disagree.
    #[error("serialization mismatch: {0}")]
    SerializationMismatch(String),

    /// Response ID not provided by this element type.
    #[error("unknown response id {0}")]
    UnknownResponse(i32),

    /// Failure attributed to a specific element.
    #[error("element {tag}: {source}")]
    Element {
        tag: i32,
        #[source]
        source: Box<Error>,
    },

    /// Global equilibrium iteration failure.
    #[error("solver error: {0}")]
    Solver(String),
}

impl Error {
    /// Attach the element tag to a failure.
    pub fn element(tag: i32, source: Error) -> Self {
        Error::Element {
            tag,
            source: Box::new(source),
        }
    }

    /// The innermost error, with element wrappers removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Element { source, .. } => source.root(),
            other => other,
        }
    }

    /// Geometric degeneracy (zero length or parallel orientation).
    pub fn is_geometric(&self) -> bool {
        matches!(
            self.root(),
            Error::ZeroLength(_) | Error::DegenerateOrientation(_)
        )
    }
}

impl From<ChannelError> for Error {
    fn from(err: ChannelError) -> Self {
        Error::SerializationMismatch(err.to_string())
    }
}
