//! Piecewise-constant function constructors and combinators.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::node::{Pwc, Tensor, TensorLike};
use crate::ops::{check_square, mesh_equal_durations, pwc_node, tensor_node};
use crate::shape::{
    check_duration, check_durations, check_sample_times_with_bounds, dims, format_dims,
    normalize_axis, validate_broadcast, Dims,
};

impl Graph {
    /// Builds a Pwc from explicit segment durations and a value array.
    /// `time_dimension` selects the segment axis of `values`; axes before
    /// it are batch dimensions, axes after it are value dimensions.
    pub fn pwc(
        &self,
        durations: &[f64],
        values: impl Into<TensorLike>,
        time_dimension: i64,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        check_durations(durations, "durations")?;
        let values = values.into();
        let shape = values.shape();
        ensure!(
            !shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "values must have at least one dimension"
        );
        let time_dimension = normalize_axis(time_dimension, shape.len(), "values")?;
        ensure!(
            shape[time_dimension] == durations.len(),
            ErrorCode::ShapeMismatch,
            "dimension {time_dimension} of values (shape {}) must match the {} segments of \
             durations",
            format_dims(&shape),
            durations.len()
        );
        pwc_node(
            self,
            "pwc",
            vec![
                Argument::Reals(durations.to_vec()),
                values.argument(),
                Argument::Int(time_dimension as i64),
            ],
            name,
            dims(&shape[time_dimension + 1..]),
            durations.to_vec(),
            dims(&shape[..time_dimension]),
        )
    }

    /// Builds a scalar-valued signal of equal segments spanning
    /// `duration`. Leading axes of `values` are batch dimensions.
    pub fn pwc_signal(
        &self,
        values: impl Into<TensorLike>,
        duration: f64,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        check_duration(duration, "duration")?;
        let values = values.into();
        let shape = values.shape();
        ensure!(
            !shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "values must have at least one dimension"
        );
        let segment_count = shape[shape.len() - 1];
        ensure!(
            segment_count > 0,
            ErrorCode::ShapeMismatch,
            "values must contain at least one segment"
        );
        pwc_node(
            self,
            "pwc_signal",
            vec![values.argument(), Argument::Float(duration)],
            name,
            Dims::new(),
            vec![duration / segment_count as f64; segment_count],
            dims(&shape[..shape.len() - 1]),
        )
    }

    /// Builds a complex signal `moduli * exp(i * phases)` of equal
    /// segments. Both parts must be real and of equal shape.
    pub fn complex_pwc_signal(
        &self,
        moduli: impl Into<TensorLike>,
        phases: impl Into<TensorLike>,
        duration: f64,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        check_duration(duration, "duration")?;
        let moduli = moduli.into();
        let phases = phases.into();
        for (part, part_name) in [(&moduli, "moduli"), (&phases, "phases")] {
            if let Some(literal) = part.literal() {
                ensure!(
                    !literal.is_complex(),
                    ErrorCode::InvalidDtype,
                    "{part_name} must be real-valued"
                );
            }
        }
        let shape = moduli.shape();
        ensure!(
            shape == phases.shape(),
            ErrorCode::ShapeMismatch,
            "the shapes {} of moduli and {} of phases must be equal",
            format_dims(&shape),
            format_dims(&phases.shape())
        );
        ensure!(
            !shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "moduli must have at least one dimension"
        );
        let segment_count = shape[shape.len() - 1];
        ensure!(
            segment_count > 0,
            ErrorCode::ShapeMismatch,
            "moduli must contain at least one segment"
        );
        pwc_node(
            self,
            "complex_pwc_signal",
            vec![
                moduli.argument(),
                phases.argument(),
                Argument::Float(duration),
            ],
            name,
            Dims::new(),
            vec![duration / segment_count as f64; segment_count],
            dims(&shape[..shape.len() - 1]),
        )
    }

    /// Modulates a constant operator by a scalar-valued signal.
    pub fn pwc_operator(
        &self,
        signal: &Pwc,
        operator: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        ensure!(
            signal.value_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "signal must be scalar-valued, got value shape {}",
            format_dims(&signal.value_shape)
        );
        let operator = operator.into();
        let operator_shape = operator.shape();
        check_square(&operator_shape, "operator")?;
        ensure!(
            operator_shape.len() == 2,
            ErrorCode::ShapeMismatch,
            "operator must be a 2D matrix, got shape {}",
            format_dims(&operator_shape)
        );
        pwc_node(
            self,
            "pwc_operator",
            vec![Argument::Node(signal.id), operator.argument()],
            name,
            operator_shape,
            signal.durations.to_vec(),
            signal.batch_shape.clone(),
        )
    }

    /// A time-independent operator over a single segment of `duration`.
    /// Leading dimensions of `operator` are batch dimensions.
    pub fn constant_pwc_operator(
        &self,
        duration: f64,
        operator: impl Into<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        check_duration(duration, "duration")?;
        let operator = operator.into();
        let shape = operator.shape();
        let dimension = check_square(&shape, "operator")?;
        pwc_node(
            self,
            "constant_pwc_operator",
            vec![Argument::Float(duration), operator.argument()],
            name,
            dims(&[dimension, dimension]),
            vec![duration],
            dims(&shape[..shape.len() - 2]),
        )
    }

    /// A time-independent Pwc over a single segment. The leading
    /// `batch_dimension_count` axes of `constant` are batch dimensions.
    pub fn constant_pwc(
        &self,
        constant: impl Into<TensorLike>,
        duration: f64,
        batch_dimension_count: usize,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        check_duration(duration, "duration")?;
        let constant = constant.into();
        let shape = constant.shape();
        ensure!(
            batch_dimension_count <= shape.len(),
            ErrorCode::OutOfBounds,
            "batch_dimension_count {batch_dimension_count} exceeds the rank of constant \
             (shape {})",
            format_dims(&shape)
        );
        pwc_node(
            self,
            "constant_pwc",
            vec![
                constant.argument(),
                Argument::Float(duration),
                Argument::Int(batch_dimension_count as i64),
            ],
            name,
            dims(&shape[batch_dimension_count..]),
            vec![duration],
            dims(&shape[..batch_dimension_count]),
        )
    }

    /// Sums Pwcs of equal value and batch shape over the meshed segment
    /// boundaries.
    pub fn pwc_sum(&self, terms: Vec<Pwc>, name: Option<&str>) -> GraphResult<Pwc> {
        ensure!(
            !terms.is_empty(),
            ErrorCode::EmptyList,
            "pwc_sum requires at least one term"
        );
        let value_shape = terms[0].value_shape.clone();
        let batch_shape = terms[0].batch_shape.clone();
        for (index, term) in terms.iter().enumerate().skip(1) {
            ensure!(
                term.value_shape == value_shape && term.batch_shape == batch_shape,
                ErrorCode::ShapeMismatch,
                "terms[{index}] (value shape {}, batch shape {}) must match value shape {} and \
                 batch shape {}",
                format_dims(&term.value_shape),
                format_dims(&term.batch_shape),
                format_dims(&value_shape),
                format_dims(&batch_shape)
            );
        }
        let durations =
            mesh_equal_durations(terms.iter().map(|term| &*term.durations), "pwc_sum")?;
        let args = vec![Argument::List(
            terms.iter().map(|term| Argument::Node(term.id)).collect(),
        )];
        pwc_node(self, "pwc_sum", args, name, value_shape, durations, batch_shape)
    }

    /// Reverses a Pwc in time.
    pub fn time_reverse_pwc(&self, pwc: &Pwc, name: Option<&str>) -> GraphResult<Pwc> {
        let durations: Vec<f64> = pwc.durations.iter().rev().copied().collect();
        pwc_node(
            self,
            "time_reverse_pwc",
            vec![Argument::Node(pwc.id)],
            name,
            pwc.value_shape.clone(),
            durations,
            pwc.batch_shape.clone(),
        )
    }

    /// Appends the time-reverse, doubling the total duration.
    pub fn symmetrize_pwc(&self, pwc: &Pwc, name: Option<&str>) -> GraphResult<Pwc> {
        let mut durations = pwc.durations.to_vec();
        durations.extend(pwc.durations.iter().rev());
        pwc_node(
            self,
            "symmetrize_pwc",
            vec![Argument::Node(pwc.id)],
            name,
            pwc.value_shape.clone(),
            durations,
            pwc.batch_shape.clone(),
        )
    }

    /// Concatenates Pwcs in time; durations are concatenated in order
    /// and batch shapes broadcast.
    pub fn time_concatenate_pwc(
        &self,
        terms: Vec<Pwc>,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        ensure!(
            !terms.is_empty(),
            ErrorCode::EmptyList,
            "time_concatenate_pwc requires at least one term"
        );
        let value_shape = terms[0].value_shape.clone();
        let mut batch_shape = Dims::new();
        let mut durations = Vec::new();
        for (index, term) in terms.iter().enumerate() {
            ensure!(
                term.value_shape == value_shape,
                ErrorCode::ShapeMismatch,
                "terms[{index}] (value shape {}) must match value shape {}",
                format_dims(&term.value_shape),
                format_dims(&value_shape)
            );
            batch_shape = validate_broadcast(
                &batch_shape,
                &term.batch_shape,
                "terms (batch)",
                &format!("terms[{index}] (batch)"),
            )?;
            durations.extend_from_slice(&term.durations);
        }
        let args = vec![Argument::List(
            terms.iter().map(|term| Argument::Node(term.id)).collect(),
        )];
        pwc_node(
            self,
            "time_concatenate_pwc",
            args,
            name,
            value_shape,
            durations,
            batch_shape,
        )
    }

    /// Samples a Pwc at the given times; the result gains a leading time
    /// axis after the batch dimensions.
    pub fn sample_pwc(
        &self,
        pwc: &Pwc,
        sample_times: &[f64],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        check_sample_times_with_bounds(sample_times, "sample_times", &pwc.durations, "pwc")?;
        let mut shape = pwc.batch_shape.clone();
        shape.push(sample_times.len());
        shape.extend_from_slice(&pwc.value_shape);
        tensor_node(
            self,
            "sample_pwc",
            vec![
                Argument::Node(pwc.id),
                Argument::Reals(sample_times.to_vec()),
            ],
            name,
            shape,
        )
    }
}
