//! Filter functions in the frequency domain.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::literal::ArrayLiteral;
use crate::node::{FilterFunction, Pwc, Tensor};
use crate::ops::{check_square, filter_function_node, positive_count, tensor_node};
use crate::shape::{format_dims, is_close, total_duration, Dims};

fn validate_frequencies(frequencies: &[f64]) -> GraphResult<()> {
    ensure!(
        !frequencies.is_empty(),
        ErrorCode::InvalidFrequencyGrid,
        "frequencies must not be empty"
    );
    ensure!(
        frequencies.iter().all(|f| f.is_finite()),
        ErrorCode::InvalidFrequencyGrid,
        "frequencies must be finite"
    );
    Ok(())
}

fn validate_control_and_noise(
    control_hamiltonian: &Pwc,
    noise_operator: &Pwc,
) -> GraphResult<usize> {
    let dimension = check_square(&control_hamiltonian.value_shape, "control_hamiltonian")?;
    ensure!(
        control_hamiltonian.batch_shape.is_empty(),
        ErrorCode::ShapeMismatch,
        "control_hamiltonian must not have batch dimensions, got batch shape {}",
        format_dims(&control_hamiltonian.batch_shape)
    );
    ensure!(
        noise_operator.batch_shape.is_empty(),
        ErrorCode::ShapeMismatch,
        "noise_operator must not have batch dimensions, got batch shape {}",
        format_dims(&noise_operator.batch_shape)
    );
    ensure!(
        noise_operator.value_shape == control_hamiltonian.value_shape,
        ErrorCode::ShapeMismatch,
        "the value shape {} of noise_operator must match the control Hamiltonian shape {}",
        format_dims(&noise_operator.value_shape),
        format_dims(&control_hamiltonian.value_shape)
    );
    ensure!(
        is_close(
            total_duration(&noise_operator.durations),
            total_duration(&control_hamiltonian.durations)
        ),
        ErrorCode::DurationMismatch,
        "noise_operator must span the control Hamiltonian duration"
    );
    Ok(dimension)
}

fn validate_projector(
    projection_operator: &Option<ArrayLiteral>,
    dimension: usize,
) -> GraphResult<()> {
    if let Some(projector) = projection_operator {
        ensure!(
            projector.is_orthogonal_projection(),
            ErrorCode::NonOrthogonalProjection,
            "projection_operator must satisfy P = P† = P²"
        );
        ensure!(
            projector.shape() == [dimension, dimension],
            ErrorCode::ShapeMismatch,
            "projection_operator must act on the {dimension}-dimensional system"
        );
    }
    Ok(())
}

impl Graph {
    /// The filter function of a controlled system with respect to a
    /// noise operator, sampled on the given frequency grid.
    /// `sample_count = None` selects the exact method, which carries no
    /// uncertainty channel.
    pub fn filter_function(
        &self,
        control_hamiltonian: &Pwc,
        noise_operator: &Pwc,
        frequencies: &[f64],
        sample_count: Option<i64>,
        projection_operator: Option<ArrayLiteral>,
        name: Option<&str>,
    ) -> GraphResult<FilterFunction> {
        validate_frequencies(frequencies)?;
        let dimension = validate_control_and_noise(control_hamiltonian, noise_operator)?;
        if let Some(sample_count) = sample_count {
            positive_count(sample_count, "sample_count")?;
        }
        validate_projector(&projection_operator, dimension)?;
        let exact = sample_count.is_none();
        filter_function_node(
            self,
            "filter_function",
            vec![
                Argument::Node(control_hamiltonian.id),
                Argument::Node(noise_operator.id),
                Argument::Reals(frequencies.to_vec()),
                match sample_count {
                    Some(count) => Argument::Int(count),
                    None => Argument::None,
                },
                match projection_operator {
                    Some(projector) => Argument::Array(projector),
                    None => Argument::None,
                },
            ],
            name,
            frequencies.to_vec(),
            exact,
        )
    }

    /// The frequency-domain noise operator underlying the filter
    /// function, as a complex tensor of shape `(F, D, D)`.
    pub fn frequency_domain_noise_operator(
        &self,
        control_hamiltonian: &Pwc,
        noise_operator: &Pwc,
        frequencies: &[f64],
        sample_count: Option<i64>,
        projection_operator: Option<ArrayLiteral>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        validate_frequencies(frequencies)?;
        let dimension = validate_control_and_noise(control_hamiltonian, noise_operator)?;
        if let Some(sample_count) = sample_count {
            positive_count(sample_count, "sample_count")?;
        }
        validate_projector(&projection_operator, dimension)?;
        let mut shape = Dims::new();
        shape.push(frequencies.len());
        shape.push(dimension);
        shape.push(dimension);
        tensor_node(
            self,
            "frequency_domain_noise_operator",
            vec![
                Argument::Node(control_hamiltonian.id),
                Argument::Node(noise_operator.id),
                Argument::Reals(frequencies.to_vec()),
                match sample_count {
                    Some(count) => Argument::Int(count),
                    None => Argument::None,
                },
                match projection_operator {
                    Some(projector) => Argument::Array(projector),
                    None => Argument::None,
                },
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
    use crate::node::Pwc;

    fn hamiltonian_and_noise(graph: &Graph) -> (Pwc, Pwc) {
        let signal = graph.pwc_signal(vec![1.0, 0.5], 1.0, None).unwrap();
        let hamiltonian = graph
            .pwc_operator(&signal, Array2::<f64>::eye(2), None)
            .unwrap();
        let noise = graph
            .constant_pwc_operator(1.0, ndarray::array![[1.0, 0.0], [0.0, -1.0]], None)
            .unwrap();
        (hamiltonian, noise)
    }

    #[test]
    fn sampled_filter_functions_carry_uncertainties() {
        let graph = Graph::new();
        let (hamiltonian, noise) = hamiltonian_and_noise(&graph);
        let frequencies = [0.0, 1.0, 2.0];
        let ff = graph
            .filter_function(&hamiltonian, &noise, &frequencies, Some(100), None, None)
            .unwrap();
        assert_eq!(ff.frequencies(), &frequencies);
        assert!(!ff.exact());

        let exact = graph
            .filter_function(&hamiltonian, &noise, &frequencies, None, None, None)
            .unwrap();
        assert!(exact.exact());
    }

    #[test]
    fn empty_frequency_grids_are_rejected() {
        let graph = Graph::new();
        let (hamiltonian, noise) = hamiltonian_and_noise(&graph);
        let err = graph
            .filter_function(&hamiltonian, &noise, &[], Some(10), None, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFrequencyGrid);
    }

    #[test]
    fn noise_operator_shape_must_match() {
        let graph = Graph::new();
        let (hamiltonian, _) = hamiltonian_and_noise(&graph);
        let big_noise = graph
            .constant_pwc_operator(1.0, Array2::<f64>::eye(3), None)
            .unwrap();
        let err = graph
            .frequency_domain_noise_operator(
                &hamiltonian,
                &big_noise,
                &[1.0],
                Some(10),
                None,
                None,
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeMismatch);
    }

    #[test]
    fn noise_operator_tensor_has_frequency_leading_axis() {
        let graph = Graph::new();
        let (hamiltonian, noise) = hamiltonian_and_noise(&graph);
        let operator = graph
            .frequency_domain_noise_operator(
                &hamiltonian,
                &noise,
                &[0.5, 1.5],
                Some(10),
                None,
                None,
            )
            .unwrap();
        assert_eq!(operator.shape(), &[2, 2, 2]);
    }
}
