//! Optimization-variable declarations and derivative requests.

use rand::Rng;

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::node::{Pwc, Stf, Tensor};
use crate::ops::{positive_count, tensor_node_full};
use crate::shape::{check_duration, dims, Dims};

/// Frequency specification of the Fourier signal factories. Exactly one
/// of the three modes applies, which the type enforces.
#[derive(Debug, Clone)]
pub enum FourierFrequencies {
    /// Use the given frequencies as they are.
    Fixed(Vec<f64>),
    /// Optimize this many frequencies alongside the coefficients.
    OptimizableCount(usize),
    /// Draw this many frequencies at random.
    RandomizedCount { count: usize, seed: Option<u64> },
}

impl FourierFrequencies {
    fn validate(&self) -> GraphResult<()> {
        match self {
            FourierFrequencies::Fixed(frequencies) => {
                ensure!(
                    !frequencies.is_empty(),
                    ErrorCode::InvalidFrequencyGrid,
                    "fixed_frequencies must not be empty"
                );
                ensure!(
                    frequencies.iter().all(|f| f.is_finite()),
                    ErrorCode::InvalidFrequencyGrid,
                    "fixed_frequencies must be finite"
                );
            }
            FourierFrequencies::OptimizableCount(count)
            | FourierFrequencies::RandomizedCount { count, .. } => {
                ensure!(
                    *count > 0,
                    ErrorCode::NonPositiveInteger,
                    "the frequency count must be positive"
                );
            }
        }
        Ok(())
    }

    fn arguments(&self) -> [Argument; 3] {
        match self {
            FourierFrequencies::Fixed(frequencies) => [
                Argument::Reals(frequencies.clone()),
                Argument::None,
                Argument::None,
            ],
            FourierFrequencies::OptimizableCount(count) => {
                [Argument::None, Argument::Int(*count as i64), Argument::None]
            }
            FourierFrequencies::RandomizedCount { count, seed } => {
                let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
                [
                    Argument::None,
                    Argument::None,
                    Argument::List(vec![
                        Argument::Int(*count as i64),
                        Argument::Int(seed as i64),
                    ]),
                ]
            }
        }
    }
}

fn validate_bounds(lower_bound: f64, upper_bound: f64) -> GraphResult<()> {
    ensure!(
        lower_bound.is_finite() && upper_bound.is_finite() && lower_bound < upper_bound,
        ErrorCode::InvalidValue,
        "lower_bound ({lower_bound}) must be below upper_bound ({upper_bound})"
    );
    Ok(())
}

fn validate_initial_values(
    initial_values: &Option<Vec<f64>>,
    count: usize,
    lower_bound: f64,
    upper_bound: f64,
) -> GraphResult<Argument> {
    let Some(values) = initial_values else {
        return Ok(Argument::None);
    };
    ensure!(
        values.len() == count,
        ErrorCode::ShapeMismatch,
        "initial_values must have {count} entries, got {}",
        values.len()
    );
    ensure!(
        values
            .iter()
            .all(|&value| value >= lower_bound && value <= upper_bound),
        ErrorCode::OutOfBounds,
        "initial_values must lie within [{lower_bound}, {upper_bound}]"
    );
    Ok(Argument::Reals(values.clone()))
}

impl Graph {
    /// Declares a bounded 1D optimization variable of `count` scalars.
    /// The unbounded flags relax the corresponding side after the
    /// initial value check.
    #[allow(clippy::too_many_arguments)]
    pub fn optimization_variable(
        &self,
        count: i64,
        lower_bound: f64,
        upper_bound: f64,
        is_lower_unbounded: bool,
        is_upper_unbounded: bool,
        initial_values: Option<Vec<f64>>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let count = positive_count(count, "count")?;
        validate_bounds(lower_bound, upper_bound)?;
        let initial_arg =
            validate_initial_values(&initial_values, count, lower_bound, upper_bound)?;
        tensor_node_full(
            self,
            "optimization_variable",
            vec![
                Argument::Int(count as i64),
                Argument::Float(lower_bound),
                Argument::Float(upper_bound),
                Argument::Bool(is_lower_unbounded),
                Argument::Bool(is_upper_unbounded),
                initial_arg,
            ],
            name,
            dims(&[count]),
            true,
            true,
        )
    }

    /// Declares optimization variables whose first and last entries are
    /// anchored and whose successive differences are bounded.
    pub fn anchored_difference_bounded_variables(
        &self,
        count: i64,
        lower_bound: f64,
        upper_bound: f64,
        difference_bound: f64,
        initial_values: Option<Vec<f64>>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let count = positive_count(count, "count")?;
        validate_bounds(lower_bound, upper_bound)?;
        ensure!(
            difference_bound > 0.0 && difference_bound.is_finite(),
            ErrorCode::InvalidValue,
            "difference_bound must be positive, got {difference_bound}"
        );
        let initial_arg =
            validate_initial_values(&initial_values, count, lower_bound, upper_bound)?;
        tensor_node_full(
            self,
            "anchored_difference_bounded_variables",
            vec![
                Argument::Int(count as i64),
                Argument::Float(lower_bound),
                Argument::Float(upper_bound),
                Argument::Float(difference_bound),
                initial_arg,
            ],
            name,
            dims(&[count]),
            true,
            true,
        )
    }

    /// An optimizable real signal built from a truncated Fourier basis,
    /// discretised into equal segments.
    pub fn real_fourier_pwc_signal(
        &self,
        duration: f64,
        segment_count: i64,
        frequencies: FourierFrequencies,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        check_duration(duration, "duration")?;
        let segment_count = positive_count(segment_count, "segment_count")?;
        frequencies.validate()?;
        let [fixed, optimizable, randomized] = frequencies.arguments();
        let (id, output_name) = self.emit_full(
            "real_fourier_pwc_signal",
            vec![
                Argument::Float(duration),
                Argument::Int(segment_count as i64),
                fixed,
                optimizable,
                randomized,
            ],
            name,
            crate::graph::NodeMetadata::Pwc {
                value_shape: Dims::new(),
                durations: vec![duration / segment_count as f64; segment_count],
                batch_shape: Dims::new(),
            },
            true,
            true,
        )?;
        Ok(Pwc {
            graph: self.clone(),
            id,
            value_shape: Dims::new(),
            batch_shape: Dims::new(),
            durations: std::rc::Rc::from(vec![duration / segment_count as f64; segment_count]),
            name: output_name.expect("pwc nodes are always named"),
        })
    }

    /// The Stf counterpart of
    /// [`real_fourier_pwc_signal`](Graph::real_fourier_pwc_signal);
    /// `duration` fixes the base frequency of the basis.
    pub fn real_fourier_stf_signal(
        &self,
        duration: f64,
        frequencies: FourierFrequencies,
    ) -> GraphResult<Stf> {
        check_duration(duration, "duration")?;
        frequencies.validate()?;
        let [fixed, optimizable, randomized] = frequencies.arguments();
        let (id, _) = self.emit_full(
            "real_fourier_stf_signal",
            vec![Argument::Float(duration), fixed, optimizable, randomized],
            None,
            crate::graph::NodeMetadata::Stf {
                value_shape: Dims::new(),
                batch_shape: Dims::new(),
            },
            true,
            true,
        )?;
        Ok(Stf {
            graph: self.clone(),
            id,
            value_shape: Dims::new(),
            batch_shape: Dims::new(),
        })
    }

    /// Requests the Hessian of a real scalar tensor with respect to the
    /// given optimization variables. The result is `(K, K)` with K the
    /// total scalar count of the variables, flattened in order.
    pub fn hessian(
        &self,
        tensor: &Tensor,
        variables: Vec<Tensor>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            tensor.shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "tensor must be a scalar"
        );
        ensure!(
            !variables.is_empty(),
            ErrorCode::EmptyList,
            "variables must not be empty"
        );
        let mut total = 0usize;
        for (index, variable) in variables.iter().enumerate() {
            let is_variable = self.with_operations(|operations| {
                operations[variable.id.index()].is_optimization_variable
            });
            ensure!(
                is_variable,
                ErrorCode::InvalidValue,
                "variables[{index}] must be an optimization variable"
            );
            total += variable.shape.iter().product::<usize>();
        }
        let args = vec![
            Argument::Node(tensor.id),
            Argument::List(
                variables
                    .iter()
                    .map(|variable| Argument::Node(variable.id))
                    .collect(),
            ),
        ];
        tensor_node_full(self, "hessian", args, name, dims(&[total, total]), true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::FourierFrequencies;
    use crate::error::ErrorCode;
    use crate::graph::Graph;

    #[test]
    fn variables_validate_bounds_and_initial_values() {
        let graph = Graph::new();
        let variable = graph
            .optimization_variable(3, -1.0, 1.0, false, false, Some(vec![0.0, 0.5, -0.5]), None)
            .unwrap();
        assert_eq!(variable.shape(), &[3]);
        let err = graph
            .optimization_variable(3, -1.0, 1.0, false, false, Some(vec![0.0, 2.0, 0.0]), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfBounds);
        let err = graph
            .optimization_variable(0, -1.0, 1.0, false, false, None, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NonPositiveInteger);
    }

    #[test]
    fn fourier_signal_segments_are_equal() {
        let graph = Graph::new();
        let signal = graph
            .real_fourier_pwc_signal(
                1.0,
                4,
                FourierFrequencies::Fixed(vec![1.0, 2.0]),
                None,
            )
            .unwrap();
        assert_eq!(signal.durations(), &[0.25, 0.25, 0.25, 0.25]);
        let err = graph
            .real_fourier_pwc_signal(1.0, 4, FourierFrequencies::OptimizableCount(0), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NonPositiveInteger);
    }

    #[test]
    fn hessian_counts_the_flattened_variables() {
        let graph = Graph::new();
        let a = graph
            .optimization_variable(2, -1.0, 1.0, false, false, None, None)
            .unwrap();
        let b = graph
            .optimization_variable(3, -1.0, 1.0, false, false, None, None)
            .unwrap();
        let cost = graph
            .sum(a.clone(), None, false, Some("cost"))
            .unwrap();
        let hessian = graph.hessian(&cost, vec![a, b], None).unwrap();
        assert_eq!(hessian.shape(), &[5, 5]);
    }

    #[test]
    fn hessian_rejects_plain_tensors_as_variables() {
        let graph = Graph::new();
        let x = graph.tensor(vec![1.0, 2.0], None).unwrap();
        let cost = graph.sum(x.clone(), None, false, None).unwrap();
        let err = graph.hessian(&cost, vec![x], None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }
}
