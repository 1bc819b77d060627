//! The append-only operation graph.
//!
//! A [`Graph`] is a cheap-to-clone handle over shared interior state.
//! Construction is single-threaded: factories validate their arguments,
//! compute the output metadata, and append an immutable [`Operation`]
//! record. Nodes are referenced by insertion index, so the serialized
//! operation list is already in dependency order.

mod serialize;

pub use serialize::{EvaluationRequest, WireOperation};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use num_complex::Complex64;

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::literal::{ArrayLiteral, CooMatrix};
use crate::shape::Dims;

/// Identity of a node within its graph: the insertion index of the
/// operation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A serializable operation argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
    Str(String),
    Node(NodeId),
    Array(ArrayLiteral),
    Sparse(CooMatrix),
    Ints(Vec<i64>),
    Reals(Vec<f64>),
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    List(Vec<Argument>),
}

/// Structural metadata of a node, tagged by value kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeMetadata {
    Tensor {
        shape: Dims,
    },
    Pwc {
        value_shape: Dims,
        durations: Vec<f64>,
        batch_shape: Dims,
    },
    Stf {
        value_shape: Dims,
        batch_shape: Dims,
    },
    SparsePwc {
        value_shape: Dims,
        durations: Vec<f64>,
    },
    ConvolutionKernel,
    Target {
        value_shape: Dims,
    },
    FilterFunction {
        frequencies: Vec<f64>,
        exact: bool,
    },
    Sequence {
        item_shapes: Vec<Dims>,
    },
}

impl NodeMetadata {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeMetadata::Tensor { .. } => "Tensor",
            NodeMetadata::Pwc { .. } => "Pwc",
            NodeMetadata::Stf { .. } => "Stf",
            NodeMetadata::SparsePwc { .. } => "SparsePwc",
            NodeMetadata::ConvolutionKernel => "ConvolutionKernel",
            NodeMetadata::Target { .. } => "Target",
            NodeMetadata::FilterFunction { .. } => "FilterFunction",
            NodeMetadata::Sequence { .. } => "Sequence",
        }
    }

    /// Whether the node can be named and fetched as an evaluation output.
    pub fn is_fetchable(&self) -> bool {
        matches!(
            self,
            NodeMetadata::Tensor { .. }
                | NodeMetadata::Pwc { .. }
                | NodeMetadata::FilterFunction { .. }
                | NodeMetadata::Sequence { .. }
        )
    }
}

/// One appended operation.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: NodeId,
    pub name: &'static str,
    pub args: Vec<Argument>,
    pub output_name: Option<String>,
    pub metadata: NodeMetadata,
    pub supports_gradient: bool,
    pub is_optimization_variable: bool,
}

#[derive(Default)]
pub(crate) struct GraphBody {
    pub(crate) operations: Vec<Operation>,
    pub(crate) names: HashMap<String, NodeId>,
}

/// A symbolic computation graph under construction.
#[derive(Clone, Default)]
pub struct Graph {
    body: Rc<RefCell<GraphBody>>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn operation_count(&self) -> usize {
        self.body.borrow().operations.len()
    }

    /// Appends an operation with default attributes (differentiable,
    /// not an optimization variable).
    pub(crate) fn emit(
        &self,
        op_name: &'static str,
        args: Vec<Argument>,
        name: Option<&str>,
        metadata: NodeMetadata,
    ) -> GraphResult<(NodeId, Option<String>)> {
        self.emit_full(op_name, args, name, metadata, true, false)
    }

    pub(crate) fn emit_full(
        &self,
        op_name: &'static str,
        args: Vec<Argument>,
        name: Option<&str>,
        metadata: NodeMetadata,
        supports_gradient: bool,
        is_optimization_variable: bool,
    ) -> GraphResult<(NodeId, Option<String>)> {
        if name.is_some() {
            ensure!(
                !matches!(metadata, NodeMetadata::Stf { .. }),
                ErrorCode::NameOnStfForbidden,
                "an Stf node cannot be assigned a name"
            );
            ensure!(
                metadata.is_fetchable(),
                ErrorCode::InvalidValue,
                "a {} node cannot be assigned a name",
                metadata.kind_name()
            );
        }
        let mut body = self.body.borrow_mut();
        let id = NodeId(body.operations.len());
        let output_name = if metadata.is_fetchable() {
            let resolved = match name {
                Some(name) => name.to_owned(),
                None => format!("{op_name}_#{}", id.0),
            };
            ensure!(
                !body.names.contains_key(&resolved),
                ErrorCode::NameCollision,
                "the name `{resolved}` is already assigned to another node"
            );
            body.names.insert(resolved.clone(), id);
            Some(resolved)
        } else {
            None
        };
        body.operations.push(Operation {
            id,
            name: op_name,
            args,
            output_name: output_name.clone(),
            metadata,
            supports_gradient,
            is_optimization_variable,
        });
        Ok((id, output_name))
    }

    pub(crate) fn lookup_name(&self, name: &str) -> Option<(NodeId, NodeMetadata)> {
        let body = self.body.borrow();
        let id = *body.names.get(name)?;
        Some((id, body.operations[id.0].metadata.clone()))
    }

    /// Assigned node name of `id`, when the node is fetchable.
    pub fn node_name(&self, id: NodeId) -> Option<String> {
        self.body.borrow().operations[id.0].output_name.clone()
    }

    pub(crate) fn with_operations<R>(&self, f: impl FnOnce(&[Operation]) -> R) -> R {
        f(&self.body.borrow().operations)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self.body.borrow();
        f.debug_struct("Graph")
            .field("operations", &body.operations.len())
            .field("named_nodes", &body.names.len())
            .finish()
    }
}
