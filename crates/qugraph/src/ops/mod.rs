//! The operation catalog, one module per family.
//!
//! Every factory follows the same sequence: validate argument kinds and
//! shapes, compute the output metadata, append the operation record, and
//! wrap the new node in its handle. The flexible cores in this module
//! implement the kind-mixing rules shared by the arithmetic family:
//! tensors with tensors give tensors, a time-dependent operand makes the
//! result time-dependent, and Pwc never mixes with Stf.

pub(crate) mod access;
pub(crate) mod arithmetic;
pub(crate) mod evolution;
pub(crate) mod filter;
pub(crate) mod fock;
pub(crate) mod infidelity;
pub(crate) mod linalg;
pub(crate) mod ms;
pub(crate) mod oqs;
pub(crate) mod optimization;
pub(crate) mod pwc;
pub(crate) mod sparse;
pub(crate) mod stf;
pub(crate) mod stochastic;
pub(crate) mod tensor;
pub(crate) mod unary;

pub use access::SliceIndex;
pub use evolution::{OperatorInput, PwcOperator};
pub use fock::ComplexParameter;
pub use infidelity::{PwcNoiseOperator, StfNoiseOperator};
pub use optimization::FourierFrequencies;
pub use oqs::SteadyStateMethod;
pub use tensor::{Repeats, SumOperand};

use std::rc::Rc;

use crate::error::{ensure, ErrorCode, GraphError, GraphResult};
use crate::graph::{Argument, Graph, NodeMetadata};
use crate::node::{
    ConvolutionKernel, FilterFunction, NodeValue, Pwc, Sequence, SparsePwc, Stf, Target, Tensor,
    Value,
};
use crate::shape::{dims, is_close, mesh_durations, total_duration, validate_broadcast, Dims};

pub(crate) fn tensor_node(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
    name: Option<&str>,
    shape: Dims,
) -> GraphResult<Tensor> {
    tensor_node_full(graph, op, args, name, shape, true, false)
}

pub(crate) fn tensor_node_full(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
    name: Option<&str>,
    shape: Dims,
    supports_gradient: bool,
    is_optimization_variable: bool,
) -> GraphResult<Tensor> {
    let (id, output_name) = graph.emit_full(
        op,
        args,
        name,
        NodeMetadata::Tensor {
            shape: shape.clone(),
        },
        supports_gradient,
        is_optimization_variable,
    )?;
    Ok(Tensor {
        graph: graph.clone(),
        id,
        shape,
        name: output_name.expect("tensor nodes are always named"),
    })
}

pub(crate) fn pwc_node(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
    name: Option<&str>,
    value_shape: Dims,
    durations: Vec<f64>,
    batch_shape: Dims,
) -> GraphResult<Pwc> {
    let (id, output_name) = graph.emit(
        op,
        args,
        name,
        NodeMetadata::Pwc {
            value_shape: value_shape.clone(),
            durations: durations.clone(),
            batch_shape: batch_shape.clone(),
        },
    )?;
    Ok(Pwc {
        graph: graph.clone(),
        id,
        value_shape,
        batch_shape,
        durations: Rc::from(durations),
        name: output_name.expect("pwc nodes are always named"),
    })
}

pub(crate) fn stf_node(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
    name: Option<&str>,
    value_shape: Dims,
    batch_shape: Dims,
) -> GraphResult<Stf> {
    let (id, _) = graph.emit(
        op,
        args,
        name,
        NodeMetadata::Stf {
            value_shape: value_shape.clone(),
            batch_shape: batch_shape.clone(),
        },
    )?;
    Ok(Stf {
        graph: graph.clone(),
        id,
        value_shape,
        batch_shape,
    })
}

pub(crate) fn sparse_pwc_node(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
    value_shape: Dims,
    durations: Vec<f64>,
) -> GraphResult<SparsePwc> {
    let (id, _) = graph.emit(
        op,
        args,
        None,
        NodeMetadata::SparsePwc {
            value_shape: value_shape.clone(),
            durations: durations.clone(),
        },
    )?;
    Ok(SparsePwc {
        graph: graph.clone(),
        id,
        value_shape,
        durations: Rc::from(durations),
    })
}

pub(crate) fn kernel_node(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
) -> GraphResult<ConvolutionKernel> {
    let (id, _) = graph.emit(op, args, None, NodeMetadata::ConvolutionKernel)?;
    Ok(ConvolutionKernel {
        graph: graph.clone(),
        id,
    })
}

pub(crate) fn target_node(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
    value_shape: Dims,
) -> GraphResult<Target> {
    let (id, _) = graph.emit(
        op,
        args,
        None,
        NodeMetadata::Target {
            value_shape: value_shape.clone(),
        },
    )?;
    Ok(Target {
        graph: graph.clone(),
        id,
        value_shape,
    })
}

pub(crate) fn filter_function_node(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
    name: Option<&str>,
    frequencies: Vec<f64>,
    exact: bool,
) -> GraphResult<FilterFunction> {
    let (id, output_name) = graph.emit(
        op,
        args,
        name,
        NodeMetadata::FilterFunction {
            frequencies: frequencies.clone(),
            exact,
        },
    )?;
    Ok(FilterFunction {
        graph: graph.clone(),
        id,
        frequencies: Rc::from(frequencies),
        exact,
        name: output_name.expect("filter function nodes are always named"),
    })
}

pub(crate) fn sequence_node(
    graph: &Graph,
    op: &'static str,
    args: Vec<Argument>,
    name: Option<&str>,
    item_shapes: Vec<Dims>,
) -> GraphResult<Sequence> {
    let (id, output_name) = graph.emit(
        op,
        args,
        name,
        NodeMetadata::Sequence {
            item_shapes: item_shapes.clone(),
        },
    )?;
    Ok(Sequence {
        graph: graph.clone(),
        id,
        item_shapes: Rc::new(item_shapes),
        name: output_name.expect("sequence nodes are always named"),
    })
}

/// Shape of a tensor-like operand (literal scalars are rank 0).
fn operand_shape(value: &Value) -> Dims {
    match value {
        Value::Real(_) | Value::Complex(_) => Dims::new(),
        Value::Array(a) => dims(a.shape()),
        Value::Tensor(t) => t.shape.clone(),
        Value::Pwc(p) => p.value_shape.clone(),
        Value::Stf(s) => s.value_shape.clone(),
    }
}

fn mixed_kinds_error(op: &str) -> GraphError {
    GraphError::new(
        ErrorCode::MixedPwcStfForbidden,
        format!("the operands of {op} must not mix Pwc and Stf values"),
    )
}

/// Kind-mixing core of the binary arithmetic family. `validate` receives
/// the two value shapes in operand order and returns the output value
/// shape.
pub(crate) fn flexible_binary(
    graph: &Graph,
    op: &'static str,
    lhs: Value,
    rhs: Value,
    name: Option<&str>,
    validate: impl Fn(&[usize], &[usize]) -> GraphResult<Dims>,
) -> GraphResult<NodeValue> {
    if matches!(
        (&lhs, &rhs),
        (Value::Pwc(_), Value::Stf(_)) | (Value::Stf(_), Value::Pwc(_))
    ) {
        return Err(mixed_kinds_error(op));
    }
    let args = vec![lhs.argument(), rhs.argument()];
    let lhs_shape = operand_shape(&lhs);
    let rhs_shape = operand_shape(&rhs);
    let value_shape = validate(&lhs_shape, &rhs_shape)?;
    match (&lhs, &rhs) {
        (Value::Stf(x), Value::Stf(y)) => {
            let batch_shape =
                validate_broadcast(&x.batch_shape, &y.batch_shape, "x (batch)", "y (batch)")?;
            stf_node(graph, op, args, name, value_shape, batch_shape).map(NodeValue::Stf)
        }
        (Value::Stf(f), _) | (_, Value::Stf(f)) => {
            stf_node(graph, op, args, name, value_shape, f.batch_shape.clone())
                .map(NodeValue::Stf)
        }
        (Value::Pwc(x), Value::Pwc(y)) => {
            ensure!(
                is_close(total_duration(&x.durations), total_duration(&y.durations)),
                ErrorCode::DurationMismatch,
                "the operands of {op} must have equal total duration, got {} and {}",
                total_duration(&x.durations),
                total_duration(&y.durations)
            );
            let batch_shape =
                validate_broadcast(&x.batch_shape, &y.batch_shape, "x (batch)", "y (batch)")?;
            let durations = mesh_durations([&*x.durations, &*y.durations]);
            pwc_node(graph, op, args, name, value_shape, durations, batch_shape)
                .map(NodeValue::Pwc)
        }
        (Value::Pwc(f), _) | (_, Value::Pwc(f)) => pwc_node(
            graph,
            op,
            args,
            name,
            value_shape,
            f.durations.to_vec(),
            f.batch_shape.clone(),
        )
        .map(NodeValue::Pwc),
        _ => tensor_node(graph, op, args, name, value_shape).map(NodeValue::Tensor),
    }
}

/// Kind-preserving core of the unary family. `change_value_shape` maps an
/// input value shape to the output value shape.
pub(crate) fn flexible_unary(
    graph: &Graph,
    op: &'static str,
    x: Value,
    name: Option<&str>,
    change_value_shape: impl Fn(&[usize]) -> GraphResult<Dims>,
) -> GraphResult<NodeValue> {
    let args = vec![x.argument()];
    let value_shape = change_value_shape(&operand_shape(&x))?;
    match &x {
        Value::Stf(f) => stf_node(graph, op, args, name, value_shape, f.batch_shape.clone())
            .map(NodeValue::Stf),
        Value::Pwc(f) => pwc_node(
            graph,
            op,
            args,
            name,
            value_shape,
            f.durations.to_vec(),
            f.batch_shape.clone(),
        )
        .map(NodeValue::Pwc),
        _ => tensor_node(graph, op, args, name, value_shape).map(NodeValue::Tensor),
    }
}

/// Checks that the last two dims of a value shape are square.
pub(crate) fn check_square(shape: &[usize], name: &str) -> GraphResult<usize> {
    ensure!(
        shape.len() >= 2 && shape[shape.len() - 1] == shape[shape.len() - 2],
        ErrorCode::NonSquareOperator,
        "{name} must be a square operator, got shape {}",
        crate::shape::format_dims(shape)
    );
    Ok(shape[shape.len() - 1])
}

/// Equal-total-duration check followed by meshing, for sum-style ops.
pub(crate) fn mesh_equal_durations<'a>(
    duration_lists: impl IntoIterator<Item = &'a [f64]> + Clone,
    op: &str,
) -> GraphResult<Vec<f64>> {
    let mut totals = duration_lists
        .clone()
        .into_iter()
        .map(total_duration);
    let first = totals.next().ok_or_else(|| {
        GraphError::new(
            ErrorCode::EmptyList,
            format!("{op} requires at least one term"),
        )
    })?;
    for total in totals {
        ensure!(
            is_close(total, first),
            ErrorCode::DurationMismatch,
            "the terms of {op} must have equal total duration, got {total} and {first}"
        );
    }
    Ok(mesh_durations(duration_lists))
}

pub(crate) fn positive_count(value: i64, name: &str) -> GraphResult<usize> {
    ensure!(
        value > 0,
        ErrorCode::NonPositiveInteger,
        "{name} must be a positive integer, got {value}"
    );
    Ok(value as usize)
}
