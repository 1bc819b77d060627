//! Error types for graph construction and evaluation.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Closed set of failure kinds that graph construction can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ShapeMismatch,
    NonBroadcastable,
    InvalidAxis,
    InvalidDtype,
    NonSquareOperator,
    NonHermitian,
    NonPartialIsometry,
    NonOrthogonalProjection,
    DurationMismatch,
    NonPositiveDuration,
    NonPositiveInteger,
    OutOfBounds,
    InvalidEinsumEquation,
    NameCollision,
    NameOnStfForbidden,
    MixedPwcStfForbidden,
    InvalidAttributeAccess,
    InvalidFrequencyGrid,
    UndefinedOperation,
    EmptyList,
    InvalidValue,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ShapeMismatch => "shape-mismatch",
            ErrorCode::NonBroadcastable => "non-broadcastable",
            ErrorCode::InvalidAxis => "invalid-axis",
            ErrorCode::InvalidDtype => "invalid-dtype",
            ErrorCode::NonSquareOperator => "non-square-operator",
            ErrorCode::NonHermitian => "non-hermitian",
            ErrorCode::NonPartialIsometry => "non-partial-isometry",
            ErrorCode::NonOrthogonalProjection => "non-orthogonal-projection",
            ErrorCode::DurationMismatch => "duration-mismatch",
            ErrorCode::NonPositiveDuration => "non-positive-duration",
            ErrorCode::NonPositiveInteger => "non-positive-integer",
            ErrorCode::OutOfBounds => "out-of-bounds",
            ErrorCode::InvalidEinsumEquation => "invalid-einsum-equation",
            ErrorCode::NameCollision => "name-collision",
            ErrorCode::NameOnStfForbidden => "name-on-stf-forbidden",
            ErrorCode::MixedPwcStfForbidden => "mixed-pwc-stf-forbidden",
            ErrorCode::InvalidAttributeAccess => "invalid-attribute-access",
            ErrorCode::InvalidFrequencyGrid => "invalid-frequency-grid",
            ErrorCode::UndefinedOperation => "undefined-operation",
            ErrorCode::EmptyList => "empty-list",
            ErrorCode::InvalidValue => "invalid-value",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure raised synchronously while appending an operation to a graph.
///
/// Every validation path produces one of the [`ErrorCode`] kinds; the
/// detail string names the offending argument and the observed values.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {}", .detail.as_deref().unwrap_or("invalid graph operation"))]
pub struct GraphError {
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl GraphError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        GraphError {
            code,
            detail: Some(detail.into()),
        }
    }

    pub fn code(code: ErrorCode) -> Self {
        GraphError { code, detail: None }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Failure surfaced while driving a remote evaluation.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The request failed validation before submission.
    #[error("invalid evaluation request: {0}")]
    InvalidRequest(String),
    /// An optimization cost depends on a node that disables gradients.
    #[error("node `{0}` does not support gradients")]
    UnsupportedGradient(String),
    /// The backend reported a remote failure.
    #[error("backend failure ({status}): {message}")]
    Backend { status: String, message: String },
    /// A poll deadline elapsed; the job handle remains valid.
    #[error("poll deadline of {0:?} elapsed")]
    Timeout(Duration),
}

/// Fails the enclosing function with a [`GraphError`] unless the condition holds.
macro_rules! ensure {
    ($cond:expr, $code:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::error::GraphError::new($code, format!($($arg)+)));
        }
    };
}
pub(crate) use ensure;
