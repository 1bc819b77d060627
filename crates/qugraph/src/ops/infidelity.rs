//! Targets and infidelity measures.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::literal::ArrayLiteral;
use crate::node::{Pwc, Stf, Target, Tensor, TensorLike};
use crate::ops::{check_square, tensor_node};
use crate::shape::{
    check_sample_times, dims, format_dims, is_close, total_duration, validate_broadcast, Dims,
};

/// Noise operand of `infidelity_pwc`: a constant operator or a Pwc.
#[derive(Debug, Clone)]
pub enum PwcNoiseOperator {
    Constant(TensorLike),
    Pwc(Pwc),
}

impl From<Pwc> for PwcNoiseOperator {
    fn from(value: Pwc) -> Self {
        PwcNoiseOperator::Pwc(value)
    }
}

impl From<&Pwc> for PwcNoiseOperator {
    fn from(value: &Pwc) -> Self {
        PwcNoiseOperator::Pwc(value.clone())
    }
}

impl From<Tensor> for PwcNoiseOperator {
    fn from(value: Tensor) -> Self {
        PwcNoiseOperator::Constant(TensorLike::Tensor(value))
    }
}

impl From<ArrayLiteral> for PwcNoiseOperator {
    fn from(value: ArrayLiteral) -> Self {
        PwcNoiseOperator::Constant(TensorLike::Array(value))
    }
}

/// Noise operand of `infidelity_stf`: a constant operator or an Stf.
#[derive(Debug, Clone)]
pub enum StfNoiseOperator {
    Constant(TensorLike),
    Stf(Stf),
}

impl From<Stf> for StfNoiseOperator {
    fn from(value: Stf) -> Self {
        StfNoiseOperator::Stf(value)
    }
}

impl From<&Stf> for StfNoiseOperator {
    fn from(value: &Stf) -> Self {
        StfNoiseOperator::Stf(value.clone())
    }
}

impl From<Tensor> for StfNoiseOperator {
    fn from(value: Tensor) -> Self {
        StfNoiseOperator::Constant(TensorLike::Tensor(value))
    }
}

impl From<ArrayLiteral> for StfNoiseOperator {
    fn from(value: ArrayLiteral) -> Self {
        StfNoiseOperator::Constant(TensorLike::Array(value))
    }
}

impl Graph {
    /// Declares a target gate. A literal operator must be a nonzero
    /// partial isometry; a symbolic one must be a square matrix. The
    /// optional projector enters filter-function-style infidelities and
    /// must satisfy `P = P† = P²`.
    pub fn target(
        &self,
        operator: impl Into<TensorLike>,
        filter_function_projector: Option<ArrayLiteral>,
    ) -> GraphResult<Target> {
        let operator = operator.into();
        let shape = operator.shape();
        ensure!(
            shape.len() == 2,
            ErrorCode::ShapeMismatch,
            "operator must be a 2D matrix, got shape {}",
            format_dims(&shape)
        );
        if let Some(literal) = operator.literal() {
            ensure!(
                !literal.is_all_zero(),
                ErrorCode::InvalidValue,
                "operator must be nonzero"
            );
            ensure!(
                literal.is_partial_isometry(),
                ErrorCode::NonPartialIsometry,
                "operator must be a partial isometry (V V† V = V)"
            );
        }
        if let Some(projector) = &filter_function_projector {
            ensure!(
                projector.is_orthogonal_projection(),
                ErrorCode::NonOrthogonalProjection,
                "filter_function_projector must satisfy P = P† = P²"
            );
            ensure!(
                projector.shape() == [shape[1], shape[1]],
                ErrorCode::ShapeMismatch,
                "filter_function_projector must act on the {}-dimensional system",
                shape[1]
            );
        }
        super::target_node(
            self,
            "target",
            vec![
                operator.argument(),
                match filter_function_projector {
                    Some(projector) => Argument::Array(projector),
                    None => Argument::None,
                },
            ],
            shape,
        )
    }

    /// Operational infidelity of the evolution under a Pwc Hamiltonian
    /// against a target gate, optionally with quasi-static noise
    /// operators. The output batch shape is the broadcast of the
    /// Hamiltonian and noise batch shapes.
    pub fn infidelity_pwc(
        &self,
        hamiltonian: &Pwc,
        target: &Target,
        noise_operators: Vec<PwcNoiseOperator>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let dimension = check_square(&hamiltonian.value_shape, "hamiltonian")?;
        ensure!(
            hamiltonian.value_shape == target.value_shape,
            ErrorCode::ShapeMismatch,
            "the value shape {} of hamiltonian must match the target shape {}",
            format_dims(&hamiltonian.value_shape),
            format_dims(&target.value_shape)
        );
        let mut batch_shape = hamiltonian.batch_shape.clone();
        let mut noise_args = Vec::with_capacity(noise_operators.len());
        for (index, noise) in noise_operators.iter().enumerate() {
            let noise_name = format!("noise_operators[{index}]");
            let (value_shape, noise_batch): (Dims, Dims) = match noise {
                PwcNoiseOperator::Constant(operator) => {
                    let shape = operator.shape();
                    check_square(&shape, &noise_name)?;
                    (
                        dims(&shape[shape.len() - 2..]),
                        dims(&shape[..shape.len() - 2]),
                    )
                }
                PwcNoiseOperator::Pwc(pwc) => {
                    check_square(&pwc.value_shape, &noise_name)?;
                    ensure!(
                        is_close(
                            total_duration(&pwc.durations),
                            total_duration(&hamiltonian.durations)
                        ),
                        ErrorCode::DurationMismatch,
                        "{noise_name} must span the Hamiltonian duration"
                    );
                    (pwc.value_shape.clone(), pwc.batch_shape.clone())
                }
            };
            ensure!(
                value_shape[value_shape.len() - 1] == dimension,
                ErrorCode::ShapeMismatch,
                "{noise_name} must act on the {dimension}-dimensional system"
            );
            batch_shape = validate_broadcast(
                &batch_shape,
                &noise_batch,
                "hamiltonian (batch)",
                &format!("{noise_name} (batch)"),
            )?;
            noise_args.push(match noise {
                PwcNoiseOperator::Constant(operator) => operator.argument(),
                PwcNoiseOperator::Pwc(pwc) => Argument::Node(pwc.id),
            });
        }
        tensor_node(
            self,
            "infidelity_pwc",
            vec![
                Argument::Node(hamiltonian.id),
                Argument::Node(target.id),
                Argument::List(noise_args),
            ],
            name,
            batch_shape,
        )
    }

    /// Operational infidelity of the evolution under an Stf Hamiltonian.
    /// The sample grid must start at 0.
    pub fn infidelity_stf(
        &self,
        sample_times: &[f64],
        hamiltonian: &Stf,
        target: &Target,
        noise_operators: Vec<StfNoiseOperator>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        check_sample_times(sample_times, "sample_times")?;
        ensure!(
            sample_times.first().is_some_and(|&t| t == 0.0),
            ErrorCode::OutOfBounds,
            "sample_times must start at 0"
        );
        let dimension = check_square(&hamiltonian.value_shape, "hamiltonian")?;
        ensure!(
            hamiltonian.value_shape == target.value_shape,
            ErrorCode::ShapeMismatch,
            "the value shape {} of hamiltonian must match the target shape {}",
            format_dims(&hamiltonian.value_shape),
            format_dims(&target.value_shape)
        );
        let mut batch_shape = hamiltonian.batch_shape.clone();
        let mut noise_args = Vec::with_capacity(noise_operators.len());
        for (index, noise) in noise_operators.iter().enumerate() {
            let noise_name = format!("noise_operators[{index}]");
            let (value_shape, noise_batch): (Dims, Dims) = match noise {
                StfNoiseOperator::Constant(operator) => {
                    let shape = operator.shape();
                    check_square(&shape, &noise_name)?;
                    (
                        dims(&shape[shape.len() - 2..]),
                        dims(&shape[..shape.len() - 2]),
                    )
                }
                StfNoiseOperator::Stf(stf) => {
                    check_square(&stf.value_shape, &noise_name)?;
                    (stf.value_shape.clone(), stf.batch_shape.clone())
                }
            };
            ensure!(
                value_shape[value_shape.len() - 1] == dimension,
                ErrorCode::ShapeMismatch,
                "{noise_name} must act on the {dimension}-dimensional system"
            );
            batch_shape = validate_broadcast(
                &batch_shape,
                &noise_batch,
                "hamiltonian (batch)",
                &format!("{noise_name} (batch)"),
            )?;
            noise_args.push(match noise {
                StfNoiseOperator::Constant(operator) => operator.argument(),
                StfNoiseOperator::Stf(stf) => Argument::Node(stf.id),
            });
        }
        tensor_node(
            self,
            "infidelity_stf",
            vec![
                Argument::Reals(sample_times.to_vec()),
                Argument::Node(hamiltonian.id),
                Argument::Node(target.id),
                Argument::List(noise_args),
            ],
            name,
            batch_shape,
        )
    }

    /// `1 - |⟨x|y⟩|²` for batched state vectors.
    pub fn state_infidelity(
        &self,
        x: impl Into<TensorLike>,
        y: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.pairwise_infidelity("state_infidelity", x.into(), y.into(), 1, name)
    }

    /// Infidelity of two batched density matrices.
    pub fn density_matrix_infidelity(
        &self,
        x: impl Into<TensorLike>,
        y: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.pairwise_infidelity("density_matrix_infidelity", x.into(), y.into(), 2, name)
    }

    /// Gate infidelity of a batched unitary against a target operator.
    pub fn unitary_infidelity(
        &self,
        unitary_operator: impl Into<TensorLike>,
        target_operator: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let unitary_operator = unitary_operator.into();
        let target_operator = target_operator.into();
        check_square(&unitary_operator.shape(), "unitary_operator")?;
        check_square(&target_operator.shape(), "target_operator")?;
        self.pairwise_infidelity(
            "unitary_infidelity",
            unitary_operator,
            target_operator,
            2,
            name,
        )
    }

    /// Shared batch/value split: the trailing `value_rank` dims must
    /// agree, everything before them broadcasts.
    fn pairwise_infidelity(
        &self,
        op: &'static str,
        x: TensorLike,
        y: TensorLike,
        value_rank: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let x_shape = x.shape();
        let y_shape = y.shape();
        ensure!(
            x_shape.len() >= value_rank && y_shape.len() >= value_rank,
            ErrorCode::ShapeMismatch,
            "the operands of {op} must have at least {value_rank} dimensions"
        );
        ensure!(
            x_shape[x_shape.len() - value_rank..] == y_shape[y_shape.len() - value_rank..],
            ErrorCode::ShapeMismatch,
            "the trailing dimensions of x (shape {}) and y (shape {}) must match",
            format_dims(&x_shape),
            format_dims(&y_shape)
        );
        let batch_shape = validate_broadcast(
            &x_shape[..x_shape.len() - value_rank],
            &y_shape[..y_shape.len() - value_rank],
            "x (batch)",
            "y (batch)",
        )?;
        tensor_node(self, op, vec![x.argument(), y.argument()], name, batch_shape)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, ArrayD, IxDyn};

    use crate::error::ErrorCode;
    use crate::graph::Graph;
    use crate::literal::ArrayLiteral;

    fn identity() -> ArrayLiteral {
        Array2::<f64>::eye(2).into()
    }

    #[test]
    fn target_accepts_the_identity_and_rejects_a_zero_operator() {
        let graph = Graph::new();
        let target = graph.target(identity(), None).unwrap();
        assert_eq!(target.value_shape(), &[2, 2]);
        let zero: ArrayLiteral = Array2::<f64>::zeros((2, 2)).into();
        let err = graph.target(zero, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
        let stretched: ArrayLiteral = (Array2::<f64>::eye(2) * 2.0).into();
        let err = graph.target(stretched, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::NonPartialIsometry);
    }

    #[test]
    fn infidelity_pwc_of_a_scalar_hamiltonian_is_scalar() {
        let graph = Graph::new();
        let hamiltonian = graph
            .pwc(
                &[0.1, 0.1],
                ndarray::array![[[1.0, 0.0], [0.0, -1.0]], [[-1.0, 0.0], [0.0, 1.0]]]
                    .into_dyn(),
                0,
                None,
            )
            .unwrap();
        let target = graph.target(identity(), None).unwrap();
        let infidelity = graph
            .infidelity_pwc(&hamiltonian, &target, Vec::new(), None)
            .unwrap();
        assert!(infidelity.shape().is_empty());
    }

    #[test]
    fn noise_batches_broadcast_into_the_output() {
        let graph = Graph::new();
        let hamiltonian = graph
            .pwc(&[0.2], ArrayD::<f64>::zeros(IxDyn(&[1, 2, 2])), 0, None)
            .unwrap();
        let target = graph.target(identity(), None).unwrap();
        let noise = graph
            .pwc(&[0.2], ArrayD::<f64>::zeros(IxDyn(&[5, 1, 2, 2])), 1, None)
            .unwrap();
        let infidelity = graph
            .infidelity_pwc(&hamiltonian, &target, vec![noise.into()], None)
            .unwrap();
        assert_eq!(infidelity.shape(), &[5]);
    }

    #[test]
    fn stf_infidelity_requires_samples_from_time_zero() {
        let graph = Graph::new();
        let hamiltonian = graph.constant_stf_operator(identity()).unwrap();
        let target = graph.target(identity(), None).unwrap();
        let err = graph
            .infidelity_stf(&[0.5, 1.0], &hamiltonian, &target, Vec::new(), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfBounds);
    }

    #[test]
    fn state_infidelity_broadcasts_batches() {
        let graph = Graph::new();
        let x = graph
            .tensor(ArrayD::<f64>::zeros(IxDyn(&[5, 1, 2])), None)
            .unwrap();
        let y = graph
            .tensor(ArrayD::<f64>::zeros(IxDyn(&[4, 2])), None)
            .unwrap();
        let infidelity = graph.state_infidelity(x, y, None).unwrap();
        assert_eq!(infidelity.shape(), &[5, 4]);
    }
}
