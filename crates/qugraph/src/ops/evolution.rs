//! Time evolution of closed systems, plus the sparse-solver sizing
//! helpers.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::literal::{ArrayLiteral, CooMatrix};
use crate::node::{Pwc, SparsePwc, Stf, Tensor, TensorLike};
use crate::ops::{check_square, positive_count, tensor_node};
use crate::shape::{
    check_duration, check_sample_times, check_sample_times_with_bounds, dims, format_dims,
};

/// A Hamiltonian operand that is either dense or sparse.
#[derive(Debug, Clone)]
pub enum PwcOperator {
    Dense(Pwc),
    Sparse(SparsePwc),
}

impl PwcOperator {
    pub(crate) fn argument(&self) -> Argument {
        match self {
            PwcOperator::Dense(pwc) => Argument::Node(pwc.id),
            PwcOperator::Sparse(pwc) => Argument::Node(pwc.id),
        }
    }

    pub(crate) fn is_sparse(&self) -> bool {
        matches!(self, PwcOperator::Sparse(_))
    }

    pub(crate) fn value_shape(&self) -> &[usize] {
        match self {
            PwcOperator::Dense(pwc) => &pwc.value_shape,
            PwcOperator::Sparse(pwc) => &pwc.value_shape,
        }
    }

    pub(crate) fn batch_shape(&self) -> &[usize] {
        match self {
            PwcOperator::Dense(pwc) => &pwc.batch_shape,
            PwcOperator::Sparse(_) => &[],
        }
    }

    pub(crate) fn durations(&self) -> &[f64] {
        match self {
            PwcOperator::Dense(pwc) => &pwc.durations,
            PwcOperator::Sparse(pwc) => &pwc.durations,
        }
    }
}

impl From<Pwc> for PwcOperator {
    fn from(value: Pwc) -> Self {
        PwcOperator::Dense(value)
    }
}

impl From<&Pwc> for PwcOperator {
    fn from(value: &Pwc) -> Self {
        PwcOperator::Dense(value.clone())
    }
}

impl From<SparsePwc> for PwcOperator {
    fn from(value: SparsePwc) -> Self {
        PwcOperator::Sparse(value)
    }
}

impl From<&SparsePwc> for PwcOperator {
    fn from(value: &SparsePwc) -> Self {
        PwcOperator::Sparse(value.clone())
    }
}

/// A constant operator that is either a dense literal/tensor or sparse.
#[derive(Debug, Clone)]
pub enum OperatorInput {
    Dense(TensorLike),
    Sparse(CooMatrix),
}

impl OperatorInput {
    pub(crate) fn argument(&self) -> Argument {
        match self {
            OperatorInput::Dense(operator) => operator.argument(),
            OperatorInput::Sparse(operator) => Argument::Sparse(operator.clone()),
        }
    }

    fn dimension(&self, name: &str) -> GraphResult<usize> {
        match self {
            OperatorInput::Dense(operator) => {
                let shape = operator.shape();
                ensure!(
                    shape.len() == 2 && shape[0] == shape[1],
                    ErrorCode::NonSquareOperator,
                    "{name} must be a 2D square operator, got shape {}",
                    format_dims(&shape)
                );
                Ok(shape[0])
            }
            OperatorInput::Sparse(operator) => {
                ensure!(
                    operator.is_square(),
                    ErrorCode::NonSquareOperator,
                    "{name} must be square, got shape ({}, {})",
                    operator.shape[0],
                    operator.shape[1]
                );
                Ok(operator.shape[0])
            }
        }
    }

    fn literal(&self) -> Option<&ArrayLiteral> {
        match self {
            OperatorInput::Dense(TensorLike::Array(literal)) => Some(literal),
            _ => None,
        }
    }

    fn is_hermitian_literal(&self) -> Option<bool> {
        match self {
            OperatorInput::Dense(TensorLike::Array(literal)) => Some(literal.is_hermitian()),
            OperatorInput::Sparse(operator) => Some(operator.is_hermitian()),
            _ => None,
        }
    }
}

impl From<Tensor> for OperatorInput {
    fn from(value: Tensor) -> Self {
        OperatorInput::Dense(TensorLike::Tensor(value))
    }
}

impl From<ArrayLiteral> for OperatorInput {
    fn from(value: ArrayLiteral) -> Self {
        OperatorInput::Dense(TensorLike::Array(value))
    }
}

impl From<CooMatrix> for OperatorInput {
    fn from(value: CooMatrix) -> Self {
        OperatorInput::Sparse(value)
    }
}

impl Graph {
    /// Unitaries of the evolution under a Pwc Hamiltonian, sampled at
    /// the given times.
    pub fn time_evolution_operators_pwc(
        &self,
        hamiltonian: &Pwc,
        sample_times: &[f64],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let dimension = check_square(&hamiltonian.value_shape, "hamiltonian")?;
        check_sample_times_with_bounds(
            sample_times,
            "sample_times",
            &hamiltonian.durations,
            "hamiltonian",
        )?;
        let mut shape = hamiltonian.batch_shape.clone();
        shape.push(sample_times.len());
        shape.push(dimension);
        shape.push(dimension);
        tensor_node(
            self,
            "time_evolution_operators_pwc",
            vec![
                Argument::Node(hamiltonian.id),
                Argument::Reals(sample_times.to_vec()),
            ],
            name,
            shape,
        )
    }

    /// Unitaries of the evolution under an Stf Hamiltonian, integrated
    /// over `evolution_times` and sampled at `sample_times`. When the
    /// first sample is not at 0, the integration grid must start at 0.
    pub fn time_evolution_operators_stf(
        &self,
        hamiltonian: &Stf,
        sample_times: &[f64],
        evolution_times: &[f64],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let dimension = check_square(&hamiltonian.value_shape, "hamiltonian")?;
        check_sample_times(sample_times, "sample_times")?;
        check_sample_times(evolution_times, "evolution_times")?;
        ensure!(
            !evolution_times.is_empty(),
            ErrorCode::EmptyList,
            "evolution_times must not be empty"
        );
        let samples_start_at_zero = sample_times.first().is_some_and(|&t| t == 0.0);
        ensure!(
            samples_start_at_zero || evolution_times[0] == 0.0,
            ErrorCode::OutOfBounds,
            "evolution_times must start at 0 when sample_times does not"
        );
        let mut shape = hamiltonian.batch_shape.clone();
        shape.push(sample_times.len());
        shape.push(dimension);
        shape.push(dimension);
        tensor_node(
            self,
            "time_evolution_operators_stf",
            vec![
                Argument::Node(hamiltonian.id),
                Argument::Reals(sample_times.to_vec()),
                Argument::Reals(evolution_times.to_vec()),
            ],
            name,
            shape,
        )
    }

    /// Evolves a pure state under a (dense or sparse) Pwc Hamiltonian.
    /// With `sample_times` the result gains a leading time axis;
    /// otherwise only the final state is returned.
    pub fn state_evolution_pwc(
        &self,
        initial_state: impl Into<TensorLike>,
        hamiltonian: impl Into<PwcOperator>,
        krylov_subspace_dimension: Option<i64>,
        sample_times: Option<&[f64]>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let initial_state = initial_state.into();
        let hamiltonian = hamiltonian.into();
        let state_shape = initial_state.shape();
        ensure!(
            state_shape.len() == 1,
            ErrorCode::ShapeMismatch,
            "initial_state must be a 1D state vector, got shape {}",
            format_dims(&state_shape)
        );
        let dimension = check_square(hamiltonian.value_shape(), "hamiltonian")?;
        ensure!(
            state_shape[0] == dimension,
            ErrorCode::ShapeMismatch,
            "the dimension {} of initial_state must match the Hamiltonian dimension {dimension}",
            state_shape[0]
        );
        ensure!(
            hamiltonian.batch_shape().is_empty(),
            ErrorCode::ShapeMismatch,
            "hamiltonian must not have batch dimensions, got batch shape {}",
            format_dims(hamiltonian.batch_shape())
        );
        if let Some(krylov_subspace_dimension) = krylov_subspace_dimension {
            positive_count(krylov_subspace_dimension, "krylov_subspace_dimension")?;
        }
        if let Some(sample_times) = sample_times {
            check_sample_times_with_bounds(
                sample_times,
                "sample_times",
                hamiltonian.durations(),
                "hamiltonian",
            )?;
        }
        let shape = match sample_times {
            Some(sample_times) => dims(&[sample_times.len(), dimension]),
            None => dims(&[dimension]),
        };
        tensor_node(
            self,
            "state_evolution_pwc",
            vec![
                initial_state.argument(),
                hamiltonian.argument(),
                match krylov_subspace_dimension {
                    Some(dimension) => Argument::Int(dimension),
                    None => Argument::None,
                },
                match sample_times {
                    Some(sample_times) => Argument::Reals(sample_times.to_vec()),
                    None => Argument::None,
                },
            ],
            name,
            shape,
        )
    }

    /// Estimates the spectral range of a Hermitian operator by a given
    /// number of power iterations.
    pub fn spectral_range(
        &self,
        operator: impl Into<OperatorInput>,
        iteration_count: i64,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let operator = operator.into();
        operator.dimension("operator")?;
        positive_count(iteration_count, "iteration_count")?;
        if let Some(false) = operator.is_hermitian_literal() {
            return Err(crate::error::GraphError::new(
                ErrorCode::NonHermitian,
                "operator must be Hermitian".to_owned(),
            ));
        }
        if let Some(literal) = operator.literal() {
            ensure!(
                !literal.is_empty(),
                ErrorCode::ShapeMismatch,
                "operator must not be empty"
            );
        }
        tensor_node(
            self,
            "spectral_range",
            vec![operator.argument(), Argument::Int(iteration_count)],
            name,
            dims(&[]),
        )
    }

    /// Estimates the Krylov subspace dimension needed by the Lanczos
    /// integrator for a given spectral range and error tolerance.
    pub fn estimated_krylov_subspace_dimension_lanczos(
        &self,
        spectral_range: impl Into<TensorLike>,
        duration: f64,
        maximum_segment_duration: f64,
        error_tolerance: f64,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let spectral_range = spectral_range.into();
        ensure!(
            spectral_range.shape().is_empty(),
            ErrorCode::ShapeMismatch,
            "spectral_range must be a scalar"
        );
        check_duration(duration, "duration")?;
        check_duration(maximum_segment_duration, "maximum_segment_duration")?;
        ensure!(
            maximum_segment_duration <= duration,
            ErrorCode::OutOfBounds,
            "maximum_segment_duration must not exceed duration"
        );
        ensure!(
            error_tolerance > 0.0,
            ErrorCode::InvalidValue,
            "error_tolerance must be positive, got {error_tolerance}"
        );
        tensor_node(
            self,
            "estimated_krylov_subspace_dimension_lanczos",
            vec![
                spectral_range.argument(),
                Argument::Float(duration),
                Argument::Float(maximum_segment_duration),
                Argument::Float(error_tolerance),
            ],
            name,
            dims(&[]),
        )
    }
}
