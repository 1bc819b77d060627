//! Mølmer–Sørensen gate modelling for trapped ions.
//!
//! The drive list fixes the ion count N; Lamb–Dicke parameters and
//! relative detunings are per-axis, per-mode, per-ion arrays of shape
//! `(3, N, N)` and `(3, N)` (with a leading tone axis in the multitone
//! variants).

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::literal::ArrayLiteral;
use crate::node::{Pwc, Tensor, TensorLike};
use crate::ops::tensor_node;
use crate::shape::{
    check_sample_times_with_bounds, dims, format_dims, is_close, total_duration, Dims,
};

fn validate_drives(drives: &[Pwc], minimum: usize, op: &str) -> GraphResult<usize> {
    ensure!(
        drives.len() >= minimum,
        ErrorCode::EmptyList,
        "{op} requires at least {minimum} drives, got {}",
        drives.len()
    );
    let total = total_duration(&drives[0].durations);
    for (index, drive) in drives.iter().enumerate() {
        ensure!(
            drive.value_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "drives[{index}] must be scalar-valued, got value shape {}",
            format_dims(&drive.value_shape)
        );
        ensure!(
            drive.batch_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "drives[{index}] must not have batch dimensions"
        );
        ensure!(
            is_close(total_duration(&drive.durations), total),
            ErrorCode::DurationMismatch,
            "drives[{index}] must span the same duration as drives[0]"
        );
    }
    Ok(drives.len())
}

fn check_literal_shape(
    literal: &ArrayLiteral,
    expected: &[usize],
    name: &str,
) -> GraphResult<()> {
    ensure!(
        literal.shape() == expected,
        ErrorCode::ShapeMismatch,
        "{name} must have shape {}, got {}",
        format_dims(expected),
        format_dims(literal.shape())
    );
    Ok(())
}

fn drives_argument(drives: &[Pwc]) -> Argument {
    Argument::List(drives.iter().map(|drive| Argument::Node(drive.id)).collect())
}

fn optional_sample_times(
    drives: &[Pwc],
    sample_times: Option<&[f64]>,
) -> GraphResult<Argument> {
    match sample_times {
        Some(times) => {
            check_sample_times_with_bounds(times, "sample_times", &drives[0].durations, "drives")?;
            Ok(Argument::Reals(times.to_vec()))
        }
        None => Ok(Argument::None),
    }
}

impl Graph {
    /// The relative phases accumulated between each ion pair, stored in
    /// the strictly lower triangular half of an `(N, N)` tensor (with a
    /// leading time axis when `sample_times` is given).
    pub fn ms_phases(
        &self,
        drives: Vec<Pwc>,
        lamb_dicke_parameters: ArrayLiteral,
        relative_detunings: ArrayLiteral,
        sample_times: Option<&[f64]>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let ion_count = validate_drives(&drives, 2, "ms_phases")?;
        check_literal_shape(
            &lamb_dicke_parameters,
            &[3, ion_count, ion_count],
            "lamb_dicke_parameters",
        )?;
        check_literal_shape(&relative_detunings, &[3, ion_count], "relative_detunings")?;
        let times_arg = optional_sample_times(&drives, sample_times)?;
        let mut shape = Dims::new();
        if let Some(times) = sample_times {
            shape.push(times.len());
        }
        shape.push(ion_count);
        shape.push(ion_count);
        tensor_node(
            self,
            "ms_phases",
            vec![
                drives_argument(&drives),
                Argument::Array(lamb_dicke_parameters),
                Argument::Array(relative_detunings),
                times_arg,
            ],
            name,
            shape,
        )
    }

    /// Multitone variant of [`ms_phases`](Graph::ms_phases); the leading
    /// axis of the parameter arrays enumerates the tones.
    pub fn ms_phases_multitone(
        &self,
        drives: Vec<Pwc>,
        lamb_dicke_parameters: ArrayLiteral,
        relative_detunings: ArrayLiteral,
        sample_times: Option<&[f64]>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let ion_count = validate_drives(&drives, 2, "ms_phases_multitone")?;
        let ld_shape = lamb_dicke_parameters.shape();
        ensure!(
            ld_shape.len() == 4
                && ld_shape[1] == 3
                && ld_shape[2] == ion_count
                && ld_shape[3] == ion_count,
            ErrorCode::ShapeMismatch,
            "lamb_dicke_parameters must have shape (M, 3, {ion_count}, {ion_count}), got {}",
            format_dims(ld_shape)
        );
        let tone_count = ld_shape[0];
        check_literal_shape(
            &relative_detunings,
            &[tone_count, 3, ion_count],
            "relative_detunings",
        )?;
        let times_arg = optional_sample_times(&drives, sample_times)?;
        let mut shape = Dims::new();
        if let Some(times) = sample_times {
            shape.push(times.len());
        }
        shape.push(ion_count);
        shape.push(ion_count);
        tensor_node(
            self,
            "ms_phases_multitone",
            vec![
                drives_argument(&drives),
                Argument::Array(lamb_dicke_parameters),
                Argument::Array(relative_detunings),
                times_arg,
            ],
            name,
            shape,
        )
    }

    /// The phase-space displacement of each mode, per axis and ion.
    pub fn ms_displacements(
        &self,
        drives: Vec<Pwc>,
        lamb_dicke_parameters: ArrayLiteral,
        relative_detunings: ArrayLiteral,
        sample_times: Option<&[f64]>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let ion_count = validate_drives(&drives, 1, "ms_displacements")?;
        check_literal_shape(
            &lamb_dicke_parameters,
            &[3, ion_count, ion_count],
            "lamb_dicke_parameters",
        )?;
        check_literal_shape(&relative_detunings, &[3, ion_count], "relative_detunings")?;
        let times_arg = optional_sample_times(&drives, sample_times)?;
        let mut shape = Dims::new();
        if let Some(times) = sample_times {
            shape.push(times.len());
        }
        shape.push(3);
        shape.push(ion_count);
        shape.push(ion_count);
        tensor_node(
            self,
            "ms_displacements",
            vec![
                drives_argument(&drives),
                Argument::Array(lamb_dicke_parameters),
                Argument::Array(relative_detunings),
                times_arg,
            ],
            name,
            shape,
        )
    }

    /// The infidelity of the realised relative phases and residual
    /// displacements against target phases. `target_phases` must be
    /// strictly lower triangular. The optional `mean_phonon_numbers`
    /// weigh the displacement contribution per mode.
    pub fn ms_infidelity(
        &self,
        phases: impl Into<TensorLike>,
        displacements: impl Into<TensorLike>,
        target_phases: ArrayLiteral,
        mean_phonon_numbers: Option<ArrayLiteral>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let phases = phases.into();
        let displacements = displacements.into();
        let phases_shape = phases.shape();
        let displacements_shape = displacements.shape();
        ensure!(
            (2..=3).contains(&phases_shape.len()),
            ErrorCode::ShapeMismatch,
            "phases must have shape (N, N) or (T, N, N), got {}",
            format_dims(&phases_shape)
        );
        let ion_count = phases_shape[phases_shape.len() - 1];
        ensure!(
            phases_shape[phases_shape.len() - 2] == ion_count,
            ErrorCode::NonSquareOperator,
            "the trailing dimensions of phases must be square, got {}",
            format_dims(&phases_shape)
        );
        ensure!(
            displacements_shape.len() == phases_shape.len() + 1
                && displacements_shape[displacements_shape.len() - 3..]
                    == [3, ion_count, ion_count],
            ErrorCode::ShapeMismatch,
            "displacements must have shape (..., 3, {ion_count}, {ion_count}) matching phases, \
             got {}",
            format_dims(&displacements_shape)
        );
        ensure!(
            phases_shape[..phases_shape.len() - 2]
                == displacements_shape[..displacements_shape.len() - 3],
            ErrorCode::ShapeMismatch,
            "the leading dimensions of phases (shape {}) and displacements (shape {}) must match",
            format_dims(&phases_shape),
            format_dims(&displacements_shape)
        );
        check_strictly_lower_triangular(&target_phases, ion_count)?;
        if let Some(mean_phonon_numbers) = &mean_phonon_numbers {
            check_literal_shape(mean_phonon_numbers, &[3, ion_count], "mean_phonon_numbers")?;
        }
        tensor_node(
            self,
            "ms_infidelity",
            vec![
                phases.argument(),
                displacements.argument(),
                Argument::Array(target_phases),
                match mean_phonon_numbers {
                    Some(numbers) => Argument::Array(numbers),
                    None => Argument::None,
                },
            ],
            name,
            dims(&phases_shape[..phases_shape.len() - 2]),
        )
    }

    /// A scalar cost promoting robustness of the accumulated phase to
    /// dephasing noise.
    pub fn ms_dephasing_robust_cost(
        &self,
        drives: Vec<Pwc>,
        lamb_dicke_parameters: ArrayLiteral,
        relative_detunings: ArrayLiteral,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let ion_count = validate_drives(&drives, 1, "ms_dephasing_robust_cost")?;
        check_literal_shape(
            &lamb_dicke_parameters,
            &[3, ion_count, ion_count],
            "lamb_dicke_parameters",
        )?;
        check_literal_shape(&relative_detunings, &[3, ion_count], "relative_detunings")?;
        tensor_node(
            self,
            "ms_dephasing_robust_cost",
            vec![
                drives_argument(&drives),
                Argument::Array(lamb_dicke_parameters),
                Argument::Array(relative_detunings),
            ],
            name,
            Dims::new(),
        )
    }
}

/// The target phase matrix lives in the strictly lower triangle; the
/// diagonal and upper triangle must be exactly zero.
fn check_strictly_lower_triangular(
    target_phases: &ArrayLiteral,
    ion_count: usize,
) -> GraphResult<()> {
    check_literal_shape(target_phases, &[ion_count, ion_count], "target_phases")?;
    let strictly_lower = match target_phases {
        ArrayLiteral::Real(array) => array
            .indexed_iter()
            .all(|(index, &value)| index[0] > index[1] || value == 0.0),
        ArrayLiteral::Complex(_) => false,
    };
    ensure!(
        strictly_lower,
        ErrorCode::InvalidValue,
        "target_phases must be real and strictly lower triangular"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::ArrayD;

    use crate::error::ErrorCode;
    use crate::graph::Graph;
    use crate::literal::ArrayLiteral;
    use crate::node::Pwc;

    fn drives(graph: &Graph, count: usize) -> Vec<Pwc> {
        (0..count)
            .map(|_| graph.pwc_signal(vec![1.0, 2.0], 1.0, None).unwrap())
            .collect()
    }

    fn lamb_dicke(n: usize) -> ArrayLiteral {
        ArrayLiteral::Real(ArrayD::zeros(ndarray::IxDyn(&[3, n, n])))
    }

    fn detunings(n: usize) -> ArrayLiteral {
        ArrayLiteral::Real(ArrayD::zeros(ndarray::IxDyn(&[3, n])))
    }

    #[test]
    fn phase_matrix_shape_follows_the_drive_count() {
        let graph = Graph::new();
        let phases = graph
            .ms_phases(drives(&graph, 3), lamb_dicke(3), detunings(3), None, None)
            .unwrap();
        assert_eq!(phases.shape(), &[3, 3]);
        let sampled = graph
            .ms_phases(
                drives(&graph, 3),
                lamb_dicke(3),
                detunings(3),
                Some(&[0.0, 0.5, 1.0]),
                None,
            )
            .unwrap();
        assert_eq!(sampled.shape(), &[3, 3, 3]);
    }

    #[test]
    fn parameter_arrays_must_match_the_ion_count() {
        let graph = Graph::new();
        let err = graph
            .ms_phases(drives(&graph, 2), lamb_dicke(3), detunings(2), None, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeMismatch);
    }

    #[test]
    fn infidelity_validates_the_target_triangle() {
        let graph = Graph::new();
        let phases = graph
            .ms_phases(drives(&graph, 2), lamb_dicke(2), detunings(2), None, None)
            .unwrap();
        let displacements = graph
            .ms_displacements(drives(&graph, 2), lamb_dicke(2), detunings(2), None, None)
            .unwrap();
        let target = ArrayLiteral::Real(
            ndarray::array![[0.0, 0.0], [1.57, 0.0]].into_dyn(),
        );
        let infidelity = graph
            .ms_infidelity(phases.clone(), displacements.clone(), target, None, None)
            .unwrap();
        assert!(infidelity.shape().is_empty());

        let not_lower = ArrayLiteral::Real(
            ndarray::array![[0.0, 1.57], [0.0, 0.0]].into_dyn(),
        );
        let err = graph
            .ms_infidelity(phases, displacements, not_lower, None, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }
}
