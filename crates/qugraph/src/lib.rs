//! Client-side symbolic computation graphs for quantum control.
//!
//! A [`Graph`] records operations without executing them; factories
//! validate shapes, kinds and bounds eagerly, so most mistakes surface
//! at construction time. The finished graph serialises to a request
//! that an [`EvaluationBackend`](backend::EvaluationBackend) executes
//! remotely, and [`evaluate`]/[`optimize`] bind the fetched payload
//! back to typed values.

pub mod backend;
pub mod error;
pub mod graph;
pub mod literal;
pub mod node;
pub mod ops;
pub mod result;
pub mod shape;
pub mod toolkit;

pub use backend::{EvaluationBackend, EvaluationOptions, JobHandle, JobPoll, JobStatus, Verbosity};
pub use error::{ErrorCode, EvaluationError, GraphError, GraphResult};
pub use graph::{Argument, EvaluationRequest, Graph, NodeMetadata, WireOperation};
pub use literal::{ArrayLiteral, CooMatrix};
pub use node::{
    ConvolutionKernel, FilterFunction, NodeValue, Pwc, Sequence, SparsePwc, Stf, Target, Tensor,
    TensorLike, Value,
};
pub use ops::{
    ComplexParameter, FourierFrequencies, OperatorInput, PwcNoiseOperator, PwcOperator, Repeats,
    SliceIndex, SteadyStateMethod, StfNoiseOperator, SumOperand,
};
pub use result::{
    evaluate, optimize, EvaluationResult, FilterFunctionResult, OutputValue, PwcResult, PwcSegment,
};
pub use toolkit::{Toolkit, UtilsToolkit};
