//! Sampleable-function constructors and combinators.
//!
//! Stf nodes have no materialised segments and can never be named; the
//! factories therefore take no `name` argument.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::node::{ConvolutionKernel, Pwc, Stf, Tensor, TensorLike};
use crate::ops::{check_square, kernel_node, positive_count, pwc_node, stf_node, tensor_node};
use crate::shape::{check_duration, check_sample_times, dims, format_dims, Dims};

impl Graph {
    /// A time-independent Stf.
    pub fn constant_stf(&self, constant: impl Into<TensorLike>) -> GraphResult<Stf> {
        let constant = constant.into();
        let shape = constant.shape();
        stf_node(
            self,
            "constant_stf",
            vec![constant.argument()],
            None,
            shape,
            Dims::new(),
        )
    }

    /// A time-independent operator-valued Stf. Leading dimensions of
    /// `operator` are batch dimensions.
    pub fn constant_stf_operator(&self, operator: impl Into<TensorLike>) -> GraphResult<Stf> {
        let operator = operator.into();
        let shape = operator.shape();
        let dimension = check_square(&shape, "operator")?;
        stf_node(
            self,
            "constant_stf_operator",
            vec![operator.argument()],
            None,
            dims(&[dimension, dimension]),
            dims(&shape[..shape.len() - 2]),
        )
    }

    /// Modulates a constant operator by a scalar-valued Stf signal.
    pub fn stf_operator(
        &self,
        signal: &Stf,
        operator: impl Into<TensorLike>,
    ) -> GraphResult<Stf> {
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
        stf_node(
            self,
            "stf_operator",
            vec![Argument::Node(signal.id), operator.argument()],
            None,
            operator_shape,
            signal.batch_shape.clone(),
        )
    }

    /// Sums Stfs of equal value and batch shape.
    pub fn stf_sum(&self, terms: Vec<Stf>) -> GraphResult<Stf> {
        ensure!(
            !terms.is_empty(),
            ErrorCode::EmptyList,
            "stf_sum requires at least one term"
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
        let args = vec![Argument::List(
            terms.iter().map(|term| Argument::Node(term.id)).collect(),
        )];
        stf_node(self, "stf_sum", args, None, value_shape, batch_shape)
    }

    /// The scalar identity function `f(t) = t`.
    pub fn identity_stf(&self) -> GraphResult<Stf> {
        stf_node(self, "identity_stf", Vec::new(), None, Dims::new(), Dims::new())
    }

    /// Samples an Stf at the given times; the result gains a leading
    /// time axis after the batch dimensions.
    pub fn sample_stf(
        &self,
        stf: &Stf,
        sample_times: &[f64],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        check_sample_times(sample_times, "sample_times")?;
        let mut shape = stf.batch_shape.clone();
        shape.push(sample_times.len());
        shape.extend_from_slice(&stf.value_shape);
        tensor_node(
            self,
            "sample_stf",
            vec![
                Argument::Node(stf.id),
                Argument::Reals(sample_times.to_vec()),
            ],
            name,
            shape,
        )
    }

    /// Discretises an Stf into a Pwc of `segment_count` equal segments;
    /// each segment value is the mean of `samples_per_segment` midpoint
    /// samples.
    pub fn discretize_stf(
        &self,
        stf: &Stf,
        duration: f64,
        segment_count: i64,
        samples_per_segment: i64,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        check_duration(duration, "duration")?;
        let segment_count = positive_count(segment_count, "segment_count")?;
        positive_count(samples_per_segment, "samples_per_segment")?;
        pwc_node(
            self,
            "discretize_stf",
            vec![
                Argument::Node(stf.id),
                Argument::Float(duration),
                Argument::Int(segment_count as i64),
                Argument::Int(samples_per_segment),
            ],
            name,
            stf.value_shape.clone(),
            vec![duration / segment_count as f64; segment_count],
            stf.batch_shape.clone(),
        )
    }

    /// Filters a Pwc through a convolution kernel, producing an Stf.
    pub fn convolve_pwc(
        &self,
        pwc: &Pwc,
        kernel: &ConvolutionKernel,
    ) -> GraphResult<Stf> {
        stf_node(
            self,
            "convolve_pwc",
            vec![Argument::Node(pwc.id), Argument::Node(kernel.id)],
            None,
            pwc.value_shape.clone(),
            pwc.batch_shape.clone(),
        )
    }

    /// A sinc low-pass kernel with the given cutoff frequency.
    pub fn sinc_convolution_kernel(
        &self,
        cutoff_frequency: impl Into<TensorLike>,
    ) -> GraphResult<ConvolutionKernel> {
        let cutoff_frequency = cutoff_frequency.into();
        ensure!(
            cutoff_frequency.shape().is_empty(),
            ErrorCode::ShapeMismatch,
            "cutoff_frequency must be a scalar"
        );
        kernel_node(
            self,
            "sinc_convolution_kernel",
            vec![cutoff_frequency.argument()],
        )
    }

    /// A Gaussian kernel with the given standard deviation and offset.
    pub fn gaussian_convolution_kernel(
        &self,
        std: impl Into<TensorLike>,
        offset: impl Into<TensorLike>,
    ) -> GraphResult<ConvolutionKernel> {
        let std = std.into();
        let offset = offset.into();
        ensure!(
            std.shape().is_empty() && offset.shape().is_empty(),
            ErrorCode::ShapeMismatch,
            "std and offset must be scalars"
        );
        if let TensorLike::Real(value) = &std {
            ensure!(
                *value > 0.0,
                ErrorCode::InvalidValue,
                "std must be positive, got {value}"
            );
        }
        kernel_node(
            self,
            "gaussian_convolution_kernel",
            vec![std.argument(), offset.argument()],
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use crate::error::ErrorCode;
    use crate::graph::Graph;

    #[test]
    fn stf_nodes_cannot_be_named() {
        let graph = Graph::new();
        let stf = graph.constant_stf(1.0).unwrap();
        assert!(stf.value_shape().is_empty());
        // Sampling an Stf produces a nameable tensor.
        let sampled = graph.sample_stf(&stf, &[0.0, 1.0], Some("samples")).unwrap();
        assert_eq!(sampled.shape(), &[2]);
        assert_eq!(sampled.name(), "samples");
    }

    #[test]
    fn discretisation_produces_equal_segments() {
        let graph = Graph::new();
        let signal = graph.identity_stf().unwrap();
        let pwc = graph.discretize_stf(&signal, 1.0, 4, 2, None).unwrap();
        assert_eq!(pwc.durations(), &[0.25, 0.25, 0.25, 0.25]);
        let err = graph.discretize_stf(&signal, 1.0, 0, 1, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::NonPositiveInteger);
    }

    #[test]
    fn convolution_keeps_the_pwc_shape() {
        let graph = Graph::new();
        let signal = graph.pwc_signal(vec![1.0, 0.0, 1.0], 3.0, None).unwrap();
        let kernel = graph.sinc_convolution_kernel(5.0).unwrap();
        let operator = graph.pwc_operator(&signal, Array2::<f64>::eye(2), None).unwrap();
        let filtered = graph.convolve_pwc(&operator, &kernel).unwrap();
        assert_eq!(filtered.value_shape(), &[2, 2]);
    }

    #[test]
    fn operator_signal_must_be_scalar_valued() {
        let graph = Graph::new();
        let operator_stf = graph
            .constant_stf_operator(Array2::<f64>::eye(2))
            .unwrap();
        let err = graph
            .stf_operator(&operator_stf, Array2::<f64>::eye(2))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeMismatch);
    }
}
