//! Fock-space primitives over a truncated oscillator basis.
//!
//! All factories act on the truncation window `[offset, offset + dim)`.

use num_complex::Complex64;

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::node::{Tensor, TensorLike};
use crate::ops::{check_square, tensor_node, tensor_node_full};
use crate::shape::{dims, format_dims, Dims};

/// A scalar or batched complex parameter (`alpha`, `zeta`).
#[derive(Debug, Clone)]
pub enum ComplexParameter {
    Scalar(Complex64),
    Batch(Vec<Complex64>),
}

impl ComplexParameter {
    fn batch_shape(&self, name: &str) -> GraphResult<Dims> {
        match self {
            ComplexParameter::Scalar(_) => Ok(Dims::new()),
            ComplexParameter::Batch(values) => {
                ensure!(
                    !values.is_empty(),
                    ErrorCode::EmptyList,
                    "{name} must not be an empty batch"
                );
                Ok(dims(&[values.len()]))
            }
        }
    }

    fn argument(&self) -> Argument {
        match self {
            ComplexParameter::Scalar(value) => Argument::Complex(*value),
            ComplexParameter::Batch(values) => {
                Argument::List(values.iter().map(|&v| Argument::Complex(v)).collect())
            }
        }
    }
}

impl From<f64> for ComplexParameter {
    fn from(value: f64) -> Self {
        ComplexParameter::Scalar(Complex64::new(value, 0.0))
    }
}

impl From<Complex64> for ComplexParameter {
    fn from(value: Complex64) -> Self {
        ComplexParameter::Scalar(value)
    }
}

impl From<Vec<Complex64>> for ComplexParameter {
    fn from(value: Vec<Complex64>) -> Self {
        ComplexParameter::Batch(value)
    }
}

fn check_dimension(dimension: usize, name: &str) -> GraphResult<()> {
    ensure!(
        dimension > 0,
        ErrorCode::NonPositiveInteger,
        "{name} must be positive"
    );
    Ok(())
}

impl Graph {
    /// A Fock basis state. With a single subsystem, `levels` is a batch
    /// of occupation numbers and a multi-element batch adds a leading
    /// axis; with several subsystems, `levels` gives one occupation per
    /// subsystem and the output dimension is the product of the
    /// subsystem dimensions.
    pub fn fock_state(
        &self,
        dimensions: &[usize],
        levels: &[usize],
        offsets: Option<&[usize]>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            !dimensions.is_empty(),
            ErrorCode::EmptyList,
            "dimensions must not be empty"
        );
        ensure!(
            !levels.is_empty(),
            ErrorCode::EmptyList,
            "levels must not be empty"
        );
        for (index, &dimension) in dimensions.iter().enumerate() {
            check_dimension(dimension, &format!("dimensions[{index}]"))?;
        }
        let default_offsets = vec![0; dimensions.len()];
        let offsets = offsets.unwrap_or(&default_offsets);
        ensure!(
            offsets.len() == dimensions.len(),
            ErrorCode::ShapeMismatch,
            "offsets must have one entry per subsystem, expected {} got {}",
            dimensions.len(),
            offsets.len()
        );
        let shape = if dimensions.len() == 1 {
            let (dimension, offset) = (dimensions[0], offsets[0]);
            for &level in levels {
                ensure!(
                    level >= offset && level < dimension + offset,
                    ErrorCode::OutOfBounds,
                    "level {level} is outside the window [{offset}, {})",
                    dimension + offset
                );
            }
            if levels.len() == 1 {
                dims(&[dimension])
            } else {
                dims(&[levels.len(), dimension])
            }
        } else {
            ensure!(
                levels.len() == dimensions.len(),
                ErrorCode::ShapeMismatch,
                "levels must have one entry per subsystem, expected {} got {}",
                dimensions.len(),
                levels.len()
            );
            for (index, ((&level, &dimension), &offset)) in
                levels.iter().zip(dimensions).zip(offsets).enumerate()
            {
                ensure!(
                    level >= offset && level < dimension + offset,
                    ErrorCode::OutOfBounds,
                    "levels[{index}] = {level} is outside the window [{offset}, {})",
                    dimension + offset
                );
            }
            dims(&[dimensions.iter().product()])
        };
        tensor_node(
            self,
            "fock_state",
            vec![
                Argument::Ints(dimensions.iter().map(|&d| d as i64).collect()),
                Argument::Ints(levels.iter().map(|&l| l as i64).collect()),
                Argument::Ints(offsets.iter().map(|&o| o as i64).collect()),
            ],
            name,
            shape,
        )
    }

    /// The creation operator `a†` on the truncated basis.
    pub fn creation_operator(
        &self,
        dimension: usize,
        offset: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.ladder_operator("creation_operator", dimension, offset, name)
    }

    /// The annihilation operator `a` on the truncated basis.
    pub fn annihilation_operator(
        &self,
        dimension: usize,
        offset: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.ladder_operator("annihilation_operator", dimension, offset, name)
    }

    /// The number operator `a† a` on the truncated basis.
    pub fn number_operator(
        &self,
        dimension: usize,
        offset: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.ladder_operator("number_operator", dimension, offset, name)
    }

    fn ladder_operator(
        &self,
        op: &'static str,
        dimension: usize,
        offset: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        check_dimension(dimension, "dimension")?;
        tensor_node(
            self,
            op,
            vec![
                Argument::Int(dimension as i64),
                Argument::Int(offset as i64),
            ],
            name,
            dims(&[dimension, dimension]),
        )
    }

    /// A coherent state `|α⟩`, built from the displacement operator or
    /// from the analytic series. A batched `alpha` adds a leading axis.
    pub fn coherent_state(
        &self,
        alpha: impl Into<ComplexParameter>,
        dimension: usize,
        offset: usize,
        from_displacement: bool,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        check_dimension(dimension, "dimension")?;
        let alpha = alpha.into();
        let mut shape = alpha.batch_shape("alpha")?;
        shape.push(dimension);
        tensor_node(
            self,
            "coherent_state",
            vec![
                alpha.argument(),
                Argument::Int(dimension as i64),
                Argument::Int(offset as i64),
                Argument::Bool(from_displacement),
            ],
            name,
            shape,
        )
    }

    /// The displacement operator `D(α)`.
    pub fn displacement_operator(
        &self,
        alpha: impl Into<ComplexParameter>,
        dimension: usize,
        offset: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.gaussian_unitary("displacement_operator", alpha.into(), dimension, offset, name)
    }

    /// The squeeze operator `S(ζ)`.
    pub fn squeeze_operator(
        &self,
        zeta: impl Into<ComplexParameter>,
        dimension: usize,
        offset: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.gaussian_unitary("squeeze_operator", zeta.into(), dimension, offset, name)
    }

    fn gaussian_unitary(
        &self,
        op: &'static str,
        parameter: ComplexParameter,
        dimension: usize,
        offset: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        check_dimension(dimension, "dimension")?;
        let mut shape = parameter.batch_shape("parameter")?;
        shape.push(dimension);
        shape.push(dimension);
        tensor_node(
            self,
            op,
            vec![
                parameter.argument(),
                Argument::Int(dimension as i64),
                Argument::Int(offset as i64),
            ],
            name,
            shape,
        )
    }

    /// The Wigner quasi-probability distribution of a density matrix on
    /// a position/momentum grid. One leading batch axis is allowed.
    /// Never differentiable.
    pub fn wigner_transform(
        &self,
        density_matrix: impl Into<TensorLike>,
        position: &[f64],
        momentum: &[f64],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let density_matrix = density_matrix.into();
        let dm_shape = density_matrix.shape();
        ensure!(
            dm_shape.len() == 2 || dm_shape.len() == 3,
            ErrorCode::ShapeMismatch,
            "density_matrix must be 2D or have one leading batch axis, got shape {}",
            format_dims(&dm_shape)
        );
        check_square(&dm_shape, "density_matrix")?;
        ensure!(
            !position.is_empty() && !momentum.is_empty(),
            ErrorCode::EmptyList,
            "position and momentum must not be empty"
        );
        let mut shape = dims(&dm_shape[..dm_shape.len() - 2]);
        shape.push(position.len());
        shape.push(momentum.len());
        tensor_node_full(
            self,
            "wigner_transform",
            vec![
                density_matrix.argument(),
                Argument::Reals(position.to_vec()),
                Argument::Reals(momentum.to_vec()),
            ],
            name,
            shape,
            false,
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64;

    use crate::error::ErrorCode;
    use crate::graph::Graph;

    #[test]
    fn fock_state_batches_levels_in_a_single_subsystem() {
        let graph = Graph::new();
        let single = graph.fock_state(&[4], &[2], None, None).unwrap();
        assert_eq!(single.shape(), &[4]);
        let batched = graph.fock_state(&[4], &[0, 1, 2], None, None).unwrap();
        assert_eq!(batched.shape(), &[3, 4]);
        let err = graph.fock_state(&[4], &[4], None, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfBounds);
    }

    #[test]
    fn fock_state_multiplies_subsystem_dimensions() {
        let graph = Graph::new();
        let composite = graph.fock_state(&[2, 3], &[1, 2], None, None).unwrap();
        assert_eq!(composite.shape(), &[6]);
        let err = graph.fock_state(&[2, 3], &[1], None, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeMismatch);
    }

    #[test]
    fn offsets_shift_the_truncation_window() {
        let graph = Graph::new();
        let state = graph.fock_state(&[3], &[5], Some(&[4]), None).unwrap();
        assert_eq!(state.shape(), &[3]);
        let err = graph.fock_state(&[3], &[3], Some(&[4]), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfBounds);
    }

    #[test]
    fn coherent_state_batches_alpha() {
        let graph = Graph::new();
        let batched = graph
            .coherent_state(
                vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)],
                5,
                0,
                true,
                None,
            )
            .unwrap();
        assert_eq!(batched.shape(), &[2, 5]);
        let single = graph.coherent_state(0.5, 5, 0, false, None).unwrap();
        assert_eq!(single.shape(), &[5]);
    }

    #[test]
    fn wigner_transform_spans_the_grid_and_disables_gradients() {
        let graph = Graph::new();
        let rho = graph
            .tensor(ndarray::Array2::<f64>::eye(4), None)
            .unwrap();
        let wigner = graph
            .wigner_transform(rho, &[-1.0, 0.0, 1.0], &[-0.5, 0.5], None)
            .unwrap();
        assert_eq!(wigner.shape(), &[3, 2]);
    }
}
