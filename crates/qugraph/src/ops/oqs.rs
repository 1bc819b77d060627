//! Open-quantum-system evolution under a Lindblad master equation.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::node::{Tensor, TensorLike};
use crate::ops::evolution::{OperatorInput, PwcOperator};
use crate::ops::{check_square, tensor_node_full};
use crate::shape::{check_sample_times_with_bounds, dims, format_dims, Dims};

/// Solver selection for `steady_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteadyStateMethod {
    Qr,
    EigenDense,
    EigenSparse,
}

impl SteadyStateMethod {
    fn tag(self) -> &'static str {
        match self {
            SteadyStateMethod::Qr => "QR",
            SteadyStateMethod::EigenDense => "EIGEN_DENSE",
            SteadyStateMethod::EigenSparse => "EIGEN_SPARSE",
        }
    }
}

/// Upper bound accepted for the adaptive-solver error tolerance.
const MAX_ERROR_TOLERANCE: f64 = 1e-2;

fn validate_lindblad_terms(
    lindblad_terms: &[(f64, OperatorInput)],
    dimension: usize,
) -> GraphResult<(Argument, bool)> {
    ensure!(
        !lindblad_terms.is_empty(),
        ErrorCode::EmptyList,
        "lindblad_terms must not be empty"
    );
    let mut any_sparse = false;
    let mut encoded = Vec::with_capacity(lindblad_terms.len());
    for (index, (rate, operator)) in lindblad_terms.iter().enumerate() {
        ensure!(
            *rate > 0.0 && rate.is_finite(),
            ErrorCode::InvalidValue,
            "the rate of lindblad_terms[{index}] must be positive, got {rate}"
        );
        let operator_dimension = match operator {
            OperatorInput::Dense(operator) => {
                let shape = operator.shape();
                ensure!(
                    shape.len() == 2 && shape[0] == shape[1],
                    ErrorCode::NonSquareOperator,
                    "the operator of lindblad_terms[{index}] must be a 2D square operator, got \
                     shape {}",
                    format_dims(&shape)
                );
                shape[0]
            }
            OperatorInput::Sparse(operator) => {
                any_sparse = true;
                ensure!(
                    operator.is_square(),
                    ErrorCode::NonSquareOperator,
                    "the operator of lindblad_terms[{index}] must be square"
                );
                operator.shape[0]
            }
        };
        ensure!(
            operator_dimension == dimension,
            ErrorCode::ShapeMismatch,
            "the operator of lindblad_terms[{index}] has dimension {operator_dimension} but the \
             system has dimension {dimension}"
        );
        encoded.push(Argument::List(vec![
            Argument::Float(*rate),
            operator.argument(),
        ]));
    }
    Ok((Argument::List(encoded), any_sparse))
}

impl Graph {
    /// Evolves a density matrix under a Pwc Hamiltonian and a set of
    /// `(rate, operator)` Lindblad terms. The density matrix may carry
    /// one leading batch axis. With `sample_times` the result gains a
    /// time axis; otherwise only the final state is returned. Gradients
    /// are unavailable when any operator is sparse.
    pub fn density_matrix_evolution_pwc(
        &self,
        initial_density_matrix: impl Into<TensorLike>,
        hamiltonian: impl Into<PwcOperator>,
        lindblad_terms: Vec<(f64, OperatorInput)>,
        sample_times: Option<&[f64]>,
        error_tolerance: Option<f64>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let initial_density_matrix = initial_density_matrix.into();
        let hamiltonian = hamiltonian.into();
        let dm_shape = initial_density_matrix.shape();
        ensure!(
            dm_shape.len() == 2 || dm_shape.len() == 3,
            ErrorCode::ShapeMismatch,
            "initial_density_matrix must be 2D or have one leading batch axis, got shape {}",
            format_dims(&dm_shape)
        );
        let dimension = check_square(&dm_shape, "initial_density_matrix")?;
        let hamiltonian_dimension = check_square(hamiltonian.value_shape(), "hamiltonian")?;
        ensure!(
            hamiltonian_dimension == dimension,
            ErrorCode::ShapeMismatch,
            "the Hamiltonian dimension {hamiltonian_dimension} must match the density matrix \
             dimension {dimension}"
        );
        ensure!(
            hamiltonian.batch_shape().is_empty(),
            ErrorCode::ShapeMismatch,
            "hamiltonian must not have batch dimensions, got batch shape {}",
            format_dims(hamiltonian.batch_shape())
        );
        let (lindblad_arg, sparse_lindblad) =
            validate_lindblad_terms(&lindblad_terms, dimension)?;
        if let Some(sample_times) = sample_times {
            check_sample_times_with_bounds(
                sample_times,
                "sample_times",
                hamiltonian.durations(),
                "hamiltonian",
            )?;
        }
        if let Some(error_tolerance) = error_tolerance {
            ensure!(
                error_tolerance > 0.0 && error_tolerance <= MAX_ERROR_TOLERANCE,
                ErrorCode::InvalidValue,
                "error_tolerance must be in (0, {MAX_ERROR_TOLERANCE}], got {error_tolerance}"
            );
        }
        let mut shape: Dims = dims(&dm_shape[..dm_shape.len() - 2]);
        if let Some(sample_times) = sample_times {
            shape.push(sample_times.len());
        }
        shape.push(dimension);
        shape.push(dimension);
        let supports_gradient = !hamiltonian.is_sparse() && !sparse_lindblad;
        tensor_node_full(
            self,
            "density_matrix_evolution_pwc",
            vec![
                initial_density_matrix.argument(),
                hamiltonian.argument(),
                lindblad_arg,
                match sample_times {
                    Some(sample_times) => Argument::Reals(sample_times.to_vec()),
                    None => Argument::None,
                },
                match error_tolerance {
                    Some(error_tolerance) => Argument::Float(error_tolerance),
                    None => Argument::None,
                },
            ],
            name,
            shape,
            supports_gradient,
            false,
        )
    }

    /// The steady state of the Lindbladian built from a constant
    /// Hamiltonian and Lindblad terms. Never differentiable.
    pub fn steady_state(
        &self,
        hamiltonian: impl Into<PwcOperator>,
        lindblad_terms: Vec<(f64, OperatorInput)>,
        method: SteadyStateMethod,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let hamiltonian = hamiltonian.into();
        let dimension = check_square(hamiltonian.value_shape(), "hamiltonian")?;
        ensure!(
            hamiltonian.batch_shape().is_empty(),
            ErrorCode::ShapeMismatch,
            "hamiltonian must not have batch dimensions, got batch shape {}",
            format_dims(hamiltonian.batch_shape())
        );
        let (lindblad_arg, _) = validate_lindblad_terms(&lindblad_terms, dimension)?;
        tensor_node_full(
            self,
            "steady_state",
            vec![
                hamiltonian.argument(),
                lindblad_arg,
                Argument::Str(method.tag().to_owned()),
            ],
            name,
            dims(&[dimension, dimension]),
            false,
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, ArrayD, IxDyn};

    use super::SteadyStateMethod;
    use crate::error::ErrorCode;
    use crate::graph::Graph;
    use crate::node::TensorLike;
    use crate::ops::evolution::OperatorInput;

    fn decay_term(graph: &Graph) -> (f64, OperatorInput) {
        let operator = graph.tensor(Array2::<f64>::eye(2), None).unwrap();
        (0.5, operator.into())
    }

    #[test]
    fn batched_density_matrices_keep_their_batch_axis() {
        let graph = Graph::new();
        let hamiltonian = graph
            .constant_pwc_operator(1.0, Array2::<f64>::eye(2), None)
            .unwrap();
        let term = decay_term(&graph);
        let rho: TensorLike = ArrayD::<f64>::zeros(IxDyn(&[4, 2, 2])).into();
        let evolved = graph
            .density_matrix_evolution_pwc(
                rho,
                &hamiltonian,
                vec![term],
                Some(&[0.5, 1.0]),
                None,
                None,
            )
            .unwrap();
        assert_eq!(evolved.shape(), &[4, 2, 2, 2]);
    }

    #[test]
    fn error_tolerance_has_an_upper_bound() {
        let graph = Graph::new();
        let hamiltonian = graph
            .constant_pwc_operator(1.0, Array2::<f64>::eye(2), None)
            .unwrap();
        let term = decay_term(&graph);
        let rho: TensorLike = Array2::<f64>::eye(2).into();
        let err = graph
            .density_matrix_evolution_pwc(rho, &hamiltonian, vec![term], None, Some(0.5), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }

    #[test]
    fn lindblad_terms_must_be_present_and_positive() {
        let graph = Graph::new();
        let hamiltonian = graph
            .constant_pwc_operator(1.0, Array2::<f64>::eye(2), None)
            .unwrap();
        let err = graph
            .steady_state(&hamiltonian, Vec::new(), SteadyStateMethod::Qr, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyList);
        let operator = graph.tensor(Array2::<f64>::eye(2), None).unwrap();
        let err = graph
            .steady_state(
                &hamiltonian,
                vec![(-1.0, operator.into())],
                SteadyStateMethod::Qr,
                None,
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }
}
