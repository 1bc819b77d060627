//! Linear-algebra operations.
//!
//! The matrix-shaped unary and binary operations accept time-dependent
//! operands; the state/operator pairings are tensor-only.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::node::{NodeValue, TensorLike, Tensor, Value};
use crate::ops::{check_square, flexible_binary, flexible_unary, tensor_node};
use crate::shape::{dims, format_dims, kron_value_shape, matmul_value_shape, validate_broadcast};

impl Graph {
    /// Conjugate transpose over the last two dimensions.
    pub fn adjoint(&self, x: impl Into<Value>, name: Option<&str>) -> GraphResult<NodeValue> {
        flexible_unary(self, "adjoint", x.into(), name, |shape| {
            ensure!(
                shape.len() >= 2,
                ErrorCode::ShapeMismatch,
                "the value shape {} of x must have at least two dimensions",
                format_dims(shape)
            );
            let mut out = dims(shape);
            out.swap(shape.len() - 2, shape.len() - 1);
            Ok(out)
        })
    }

    /// Trace over the last two dimensions.
    pub fn trace(&self, x: impl Into<Value>, name: Option<&str>) -> GraphResult<NodeValue> {
        flexible_unary(self, "trace", x.into(), name, |shape| {
            check_square(shape, "x")?;
            Ok(dims(&shape[..shape.len() - 2]))
        })
    }

    /// `(A + A†) / 2` over the last two dimensions, elementwise in time
    /// for Pwc and Stf operands.
    pub fn hermitian_part(
        &self,
        x: impl Into<Value>,
        name: Option<&str>,
    ) -> GraphResult<NodeValue> {
        flexible_unary(self, "hermitian_part", x.into(), name, |shape| {
            check_square(shape, "x")?;
            Ok(dims(shape))
        })
    }

    /// Matrix product over the last two dimensions, with broadcast batch
    /// dimensions.
    pub fn matmul(
        &self,
        x: impl Into<Value>,
        y: impl Into<Value>,
        name: Option<&str>,
    ) -> GraphResult<NodeValue> {
        flexible_binary(self, "matmul", x.into(), y.into(), name, |a, b| {
            matmul_value_shape(a, b, "x", "y")
        })
    }

    /// Kronecker product over the last two dimensions, with broadcast
    /// batch dimensions.
    pub fn kron(
        &self,
        x: impl Into<Value>,
        y: impl Into<Value>,
        name: Option<&str>,
    ) -> GraphResult<NodeValue> {
        flexible_binary(self, "kron", x.into(), y.into(), name, |a, b| {
            kron_value_shape(a, b, "x", "y")
        })
    }

    /// `⟨ψ| A |ψ⟩` for a batched state and operator.
    pub fn expectation_value(
        &self,
        state: impl Into<TensorLike>,
        operator: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let state = state.into();
        let operator = operator.into();
        let state_shape = state.shape();
        let operator_shape = operator.shape();
        ensure!(
            !state_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "state must have at least one dimension"
        );
        let dimension = check_square(&operator_shape, "operator")?;
        ensure!(
            state_shape[state_shape.len() - 1] == dimension,
            ErrorCode::ShapeMismatch,
            "the last dimension of state (shape {}) must match the operator dimension {dimension}",
            format_dims(&state_shape)
        );
        let batch_shape = validate_broadcast(
            &state_shape[..state_shape.len() - 1],
            &operator_shape[..operator_shape.len() - 2],
            "state (batch)",
            "operator (batch)",
        )?;
        tensor_node(
            self,
            "expectation_value",
            vec![state.argument(), operator.argument()],
            name,
            batch_shape,
        )
    }

    /// `Tr(ρ A)` for a batched density matrix and operator.
    pub fn density_matrix_expectation_value(
        &self,
        density_matrix: impl Into<TensorLike>,
        operator: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let density_matrix = density_matrix.into();
        let operator = operator.into();
        let dm_shape = density_matrix.shape();
        let operator_shape = operator.shape();
        let dm_dimension = check_square(&dm_shape, "density_matrix")?;
        let operator_dimension = check_square(&operator_shape, "operator")?;
        ensure!(
            dm_dimension == operator_dimension,
            ErrorCode::ShapeMismatch,
            "the dimensions of density_matrix ({dm_dimension}) and operator \
             ({operator_dimension}) must match"
        );
        let batch_shape = validate_broadcast(
            &dm_shape[..dm_shape.len() - 2],
            &operator_shape[..operator_shape.len() - 2],
            "density_matrix (batch)",
            "operator (batch)",
        )?;
        tensor_node(
            self,
            "density_matrix_expectation_value",
            vec![density_matrix.argument(), operator.argument()],
            name,
            batch_shape,
        )
    }

    /// `⟨x|y⟩` over the last dimension, with broadcast batch dimensions.
    pub fn inner_product(
        &self,
        x: impl Into<TensorLike>,
        y: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let x = x.into();
        let y = y.into();
        let x_shape = x.shape();
        let y_shape = y.shape();
        ensure!(
            !x_shape.is_empty() && !y_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "the operands of inner_product must have at least one dimension"
        );
        ensure!(
            x_shape[x_shape.len() - 1] == y_shape[y_shape.len() - 1],
            ErrorCode::ShapeMismatch,
            "the last dimensions of x (shape {}) and y (shape {}) must match",
            format_dims(&x_shape),
            format_dims(&y_shape)
        );
        let batch_shape = validate_broadcast(
            &x_shape[..x_shape.len() - 1],
            &y_shape[..y_shape.len() - 1],
            "x (batch)",
            "y (batch)",
        )?;
        tensor_node(
            self,
            "inner_product",
            vec![x.argument(), y.argument()],
            name,
            batch_shape,
        )
    }

    /// `|x⟩⟨y|` over the last dimensions, with broadcast batch dimensions.
    pub fn outer_product(
        &self,
        x: impl Into<TensorLike>,
        y: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let x = x.into();
        let y = y.into();
        let x_shape = x.shape();
        let y_shape = y.shape();
        ensure!(
            !x_shape.is_empty() && !y_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "the operands of outer_product must have at least one dimension"
        );
        let mut shape = validate_broadcast(
            &x_shape[..x_shape.len() - 1],
            &y_shape[..y_shape.len() - 1],
            "x (batch)",
            "y (batch)",
        )?;
        shape.push(x_shape[x_shape.len() - 1]);
        shape.push(y_shape[y_shape.len() - 1]);
        tensor_node(
            self,
            "outer_product",
            vec![x.argument(), y.argument()],
            name,
            shape,
        )
    }

    /// Traces out the named subsystems of a composite density matrix.
    /// `subsystem_dimensions` factorises the operator dimension;
    /// `traced_subsystems` are indices into that list.
    pub fn partial_trace(
        &self,
        density_matrix: impl Into<TensorLike>,
        subsystem_dimensions: &[usize],
        traced_subsystems: &[usize],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let density_matrix = density_matrix.into();
        let dm_shape = density_matrix.shape();
        let dimension = check_square(&dm_shape, "density_matrix")?;
        let product: usize = subsystem_dimensions.iter().product();
        ensure!(
            !subsystem_dimensions.is_empty() && product == dimension,
            ErrorCode::ShapeMismatch,
            "the product of subsystem_dimensions must equal the dimension {dimension} of \
             density_matrix"
        );
        ensure!(
            !traced_subsystems.is_empty(),
            ErrorCode::EmptyList,
            "traced_subsystems must not be empty"
        );
        let mut seen = Vec::with_capacity(traced_subsystems.len());
        for &subsystem in traced_subsystems {
            ensure!(
                subsystem < subsystem_dimensions.len(),
                ErrorCode::OutOfBounds,
                "traced subsystem {subsystem} is out of range for {} subsystems",
                subsystem_dimensions.len()
            );
            ensure!(
                !seen.contains(&subsystem),
                ErrorCode::InvalidValue,
                "traced_subsystems must be unique, {subsystem} appears twice"
            );
            seen.push(subsystem);
        }
        let remaining: usize = subsystem_dimensions
            .iter()
            .enumerate()
            .filter(|(index, _)| !traced_subsystems.contains(index))
            .map(|(_, &dimension)| dimension)
            .product();
        let mut shape = dims(&dm_shape[..dm_shape.len() - 2]);
        shape.push(remaining);
        shape.push(remaining);
        tensor_node(
            self,
            "partial_trace",
            vec![
                density_matrix.argument(),
                Argument::Ints(subsystem_dimensions.iter().map(|&d| d as i64).collect()),
                Argument::Ints(traced_subsystems.iter().map(|&s| s as i64).collect()),
            ],
            name,
            shape,
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use crate::error::ErrorCode;
    use crate::graph::Graph;

    #[test]
    fn adjoint_swaps_the_last_two_dims_and_is_an_involution() {
        let graph = Graph::new();
        let x = graph
            .tensor(ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[4, 2, 3])), None)
            .unwrap();
        let once = graph.adjoint(x, None).unwrap().into_tensor().unwrap();
        assert_eq!(once.shape(), &[4, 3, 2]);
        let twice = graph.adjoint(once, None).unwrap().into_tensor().unwrap();
        assert_eq!(twice.shape(), &[4, 2, 3]);
    }

    #[test]
    fn matmul_requires_inner_dimension_agreement() {
        let graph = Graph::new();
        let x = graph
            .tensor(ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[2, 3])), None)
            .unwrap();
        let y = graph
            .tensor(ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[3, 5])), None)
            .unwrap();
        let out = graph.matmul(x.clone(), y, None).unwrap().into_tensor().unwrap();
        assert_eq!(out.shape(), &[2, 5]);
        let bad = graph
            .tensor(ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[4, 5])), None)
            .unwrap();
        let err = graph.matmul(x, bad, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeMismatch);
    }

    #[test]
    fn partial_trace_reduces_to_the_kept_subsystems() {
        let graph = Graph::new();
        let rho = graph.tensor(Array2::<f64>::eye(6), None).unwrap();
        let reduced = graph
            .partial_trace(rho, &[2, 3], &[1], None)
            .unwrap();
        assert_eq!(reduced.shape(), &[2, 2]);
    }

    #[test]
    fn expectation_value_broadcasts_batches() {
        let graph = Graph::new();
        let state = graph
            .tensor(ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[5, 2])), None)
            .unwrap();
        let operator = graph.tensor(Array2::<f64>::eye(2), None).unwrap();
        let value = graph.expectation_value(state, operator, None).unwrap();
        assert_eq!(value.shape(), &[5]);
    }
}
