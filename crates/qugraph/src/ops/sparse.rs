//! Sparse piecewise-constant operators.
//!
//! Sparse operators are square, never batched, and never fetchable; the
//! client only ever forwards their COO payloads to the backend.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::literal::CooMatrix;
use crate::node::{Pwc, SparsePwc};
use crate::ops::{mesh_equal_durations, sparse_pwc_node};
use crate::shape::{check_duration, dims, format_dims};

fn check_square_coo(operator: &CooMatrix, name: &str) -> GraphResult<usize> {
    ensure!(
        operator.is_square(),
        ErrorCode::NonSquareOperator,
        "{name} must be square, got shape ({}, {})",
        operator.shape[0],
        operator.shape[1]
    );
    Ok(operator.shape[0])
}

impl Graph {
    /// Modulates a constant sparse operator by a scalar-valued,
    /// unbatched signal.
    pub fn sparse_pwc_operator(
        &self,
        signal: &Pwc,
        operator: CooMatrix,
    ) -> GraphResult<SparsePwc> {
        ensure!(
            signal.value_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "signal must be scalar-valued, got value shape {}",
            format_dims(&signal.value_shape)
        );
        ensure!(
            signal.batch_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "signal must not have batch dimensions, got batch shape {}",
            format_dims(&signal.batch_shape)
        );
        let dimension = check_square_coo(&operator, "operator")?;
        let durations = signal.durations.to_vec();
        sparse_pwc_node(
            self,
            "sparse_pwc_operator",
            vec![Argument::Node(signal.id), Argument::Sparse(operator)],
            dims(&[dimension, dimension]),
            durations,
        )
    }

    /// A time-independent sparse operator over a single segment.
    pub fn constant_sparse_pwc_operator(
        &self,
        duration: f64,
        operator: CooMatrix,
    ) -> GraphResult<SparsePwc> {
        check_duration(duration, "duration")?;
        let dimension = check_square_coo(&operator, "operator")?;
        sparse_pwc_node(
            self,
            "constant_sparse_pwc_operator",
            vec![Argument::Float(duration), Argument::Sparse(operator)],
            dims(&[dimension, dimension]),
            vec![duration],
        )
    }

    /// Sums sparse operators of equal shape over the meshed segment
    /// boundaries.
    pub fn sparse_pwc_sum(&self, terms: Vec<SparsePwc>) -> GraphResult<SparsePwc> {
        ensure!(
            !terms.is_empty(),
            ErrorCode::EmptyList,
            "sparse_pwc_sum requires at least one term"
        );
        let value_shape = terms[0].value_shape.clone();
        for (index, term) in terms.iter().enumerate().skip(1) {
            ensure!(
                term.value_shape == value_shape,
                ErrorCode::ShapeMismatch,
                "terms[{index}] (value shape {}) must match value shape {}",
                format_dims(&term.value_shape),
                format_dims(&value_shape)
            );
        }
        let durations = mesh_equal_durations(
            terms.iter().map(|term| &*term.durations),
            "sparse_pwc_sum",
        )?;
        let args = vec![Argument::List(
            terms.iter().map(|term| Argument::Node(term.id)).collect(),
        )];
        sparse_pwc_node(self, "sparse_pwc_sum", args, value_shape, durations)
    }

    /// `(A + A†) / 2` segment by segment.
    pub fn sparse_pwc_hermitian_part(&self, pwc: &SparsePwc) -> GraphResult<SparsePwc> {
        sparse_pwc_node(
            self,
            "sparse_pwc_hermitian_part",
            vec![Argument::Node(pwc.id)],
            pwc.value_shape.clone(),
            pwc.durations.to_vec(),
        )
    }
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64;

    use crate::error::ErrorCode;
    use crate::graph::Graph;
    use crate::literal::CooMatrix;

    fn sigma_plus() -> CooMatrix {
        CooMatrix::new([2, 2], &[(0, 1, Complex64::new(1.0, 0.0))]).unwrap()
    }

    #[test]
    fn sparse_operators_reject_batched_signals() {
        let graph = Graph::new();
        let batched = graph
            .pwc_signal(ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[4, 3])), 1.0, None)
            .unwrap();
        let err = graph.sparse_pwc_operator(&batched, sigma_plus()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeMismatch);
    }

    #[test]
    fn sparse_sum_meshes_durations() {
        let graph = Graph::new();
        let slow = graph.pwc_signal(vec![1.0, 2.0], 0.4, None).unwrap();
        let fast = graph.pwc_signal(vec![1.0, 2.0, 3.0, 4.0], 0.4, None).unwrap();
        let a = graph.sparse_pwc_operator(&slow, sigma_plus()).unwrap();
        let b = graph.sparse_pwc_operator(&fast, sigma_plus()).unwrap();
        let total = graph.sparse_pwc_sum(vec![a, b]).unwrap();
        assert_eq!(total.durations().len(), 4);
        assert_eq!(total.value_shape(), &[2, 2]);
    }

    #[test]
    fn hermitian_part_preserves_metadata() {
        let graph = Graph::new();
        let constant = graph
            .constant_sparse_pwc_operator(1.0, sigma_plus())
            .unwrap();
        let hermitian = graph.sparse_pwc_hermitian_part(&constant).unwrap();
        assert_eq!(hermitian.durations(), constant.durations());
        assert_eq!(hermitian.value_shape(), &[2, 2]);
    }
}
