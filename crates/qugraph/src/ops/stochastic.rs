//! Stochastic sampling nodes.
//!
//! Every factory carries an explicit seed on the wire. When the caller
//! does not provide one, a fresh seed is drawn at construction, so a
//! built graph always serialises to a deterministic request.

use rand::Rng;

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::literal::ArrayLiteral;
use crate::node::{Sequence, Stf, Tensor, TensorLike};
use crate::ops::{positive_count, sequence_node, stf_node, tensor_node};
use crate::shape::{dims, format_dims, Dims};

// The wire carries seeds as signed integers, so draw within i64 range.
fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::thread_rng().gen_range(0..=i64::MAX as u64))
}

impl Graph {
    /// Normally distributed samples of the given shape.
    pub fn random_normal(
        &self,
        shape: &[usize],
        mean: f64,
        standard_deviation: f64,
        seed: Option<u64>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            standard_deviation > 0.0,
            ErrorCode::InvalidValue,
            "standard_deviation must be positive, got {standard_deviation}"
        );
        tensor_node(
            self,
            "random_normal",
            vec![
                Argument::Ints(shape.iter().map(|&d| d as i64).collect()),
                Argument::Float(mean),
                Argument::Float(standard_deviation),
                Argument::Int(resolve_seed(seed) as i64),
            ],
            name,
            dims(shape),
        )
    }

    /// Uniformly distributed samples in `[lower_bound, upper_bound)`.
    pub fn random_uniform(
        &self,
        shape: &[usize],
        lower_bound: f64,
        upper_bound: f64,
        seed: Option<u64>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            lower_bound < upper_bound,
            ErrorCode::InvalidValue,
            "lower_bound ({lower_bound}) must be below upper_bound ({upper_bound})"
        );
        tensor_node(
            self,
            "random_uniform",
            vec![
                Argument::Ints(shape.iter().map(|&d| d as i64).collect()),
                Argument::Float(lower_bound),
                Argument::Float(upper_bound),
                Argument::Int(resolve_seed(seed) as i64),
            ],
            name,
            dims(shape),
        )
    }

    /// Draws `sample_count` joint samples (without replacement) from a
    /// set of arrays sharing their first dimension. The result is a
    /// sequence whose i-th element has shape
    /// `(sample_count,) + data[i].shape[1:]`.
    pub fn random_choices(
        &self,
        data: Vec<TensorLike>,
        sample_count: i64,
        seed: Option<u64>,
        name: Option<&str>,
    ) -> GraphResult<Sequence> {
        ensure!(
            !data.is_empty(),
            ErrorCode::EmptyList,
            "data must not be empty"
        );
        let sample_count = positive_count(sample_count, "sample_count")?;
        let first_shape = data[0].shape();
        ensure!(
            !first_shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "data[0] must have at least one dimension"
        );
        let data_size = first_shape[0];
        let mut item_shapes = Vec::with_capacity(data.len());
        for (index, entry) in data.iter().enumerate() {
            let shape = entry.shape();
            ensure!(
                !shape.is_empty() && shape[0] == data_size,
                ErrorCode::ShapeMismatch,
                "data[{index}] (shape {}) must share the first dimension {data_size}",
                format_dims(&shape)
            );
            let mut item_shape = dims(&[sample_count]);
            item_shape.extend_from_slice(&shape[1..]);
            item_shapes.push(item_shape);
        }
        ensure!(
            sample_count <= data_size,
            ErrorCode::OutOfBounds,
            "sample_count ({sample_count}) must not exceed the {data_size} data entries"
        );
        sequence_node(
            self,
            "random_choices",
            vec![
                Argument::List(data.iter().map(TensorLike::argument).collect()),
                Argument::Int(sample_count as i64),
                Argument::Int(resolve_seed(seed) as i64),
            ],
            name,
            item_shapes,
        )
    }

    /// A scalar noise Stf sampled from a one-sided power spectral
    /// density on a uniform frequency grid.
    pub fn random_colored_noise_stf_signal(
        &self,
        power_spectral_density: ArrayLiteral,
        frequency_step: f64,
        batch_shape: &[usize],
        seed: Option<u64>,
    ) -> GraphResult<Stf> {
        let psd = power_spectral_density.as_real_vector("power_spectral_density")?;
        ensure!(
            !psd.is_empty(),
            ErrorCode::EmptyList,
            "power_spectral_density must not be empty"
        );
        ensure!(
            psd.iter().all(|&density| density >= 0.0 && density.is_finite()),
            ErrorCode::InvalidValue,
            "power_spectral_density must be non-negative and finite"
        );
        ensure!(
            frequency_step > 0.0 && frequency_step.is_finite(),
            ErrorCode::InvalidFrequencyGrid,
            "frequency_step must be positive, got {frequency_step}"
        );
        ensure!(
            batch_shape.iter().all(|&dimension| dimension > 0),
            ErrorCode::NonPositiveInteger,
            "batch_shape dimensions must be positive"
        );
        stf_node(
            self,
            "random_colored_noise_stf_signal",
            vec![
                Argument::Array(power_spectral_density),
                Argument::Float(frequency_step),
                Argument::Ints(batch_shape.iter().map(|&d| d as i64).collect()),
                Argument::Int(resolve_seed(seed) as i64),
            ],
            None,
            Dims::new(),
            dims(batch_shape),
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use crate::error::ErrorCode;
    use crate::graph::Graph;

    #[test]
    fn random_normal_requires_a_positive_spread() {
        let graph = Graph::new();
        let samples = graph
            .random_normal(&[2, 3], 0.0, 1.0, Some(7), Some("noise"))
            .unwrap();
        assert_eq!(samples.shape(), &[2, 3]);
        let err = graph
            .random_normal(&[2], 0.0, 0.0, None, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }

    #[test]
    fn random_choices_builds_a_sequence_of_minibatches() {
        let graph = Graph::new();
        let features = ArrayD::<f64>::zeros(IxDyn(&[10, 4]));
        let labels = ArrayD::<f64>::zeros(IxDyn(&[10]));
        let batch = graph
            .random_choices(vec![features.into(), labels.into()], 3, Some(1), None)
            .unwrap();
        assert_eq!(batch.len(), 2);
        let err = graph
            .random_choices(
                vec![ArrayD::<f64>::zeros(IxDyn(&[4])).into()],
                5,
                None,
                None,
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfBounds);
    }

    #[test]
    fn drawn_seeds_encode_as_non_negative_wire_integers() {
        let graph = Graph::new();
        for _ in 0..32 {
            graph.random_normal(&[1], 0.0, 1.0, None, None).unwrap();
        }
        for op in graph.wire_operations() {
            let args = serde_json::to_value(&op.args).unwrap();
            let seed = args.as_array().unwrap()[3].as_i64().unwrap();
            assert!(seed >= 0);
        }
    }

    #[test]
    fn colored_noise_carries_its_batch_shape() {
        let graph = Graph::new();
        let noise = graph
            .random_colored_noise_stf_signal(
                vec![1.0, 0.5, 0.25].into(),
                0.1,
                &[4, 2],
                None,
            )
            .unwrap();
        assert!(noise.value_shape().is_empty());
        assert_eq!(noise.batch_shape(), &[4, 2]);
        let err = graph
            .random_colored_noise_stf_signal(vec![1.0].into(), 0.0, &[], None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFrequencyGrid);
    }
}
