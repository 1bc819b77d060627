//! Structural access into nodes: indexing and attribute extraction.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::{Argument, Graph};
use crate::node::{FilterFunction, Pwc, Sequence, Tensor};
use crate::ops::tensor_node;
use crate::shape::{dims, Dims};

/// One entry of a `getitem` key, mirroring NumPy basic indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceIndex {
    /// Select a single entry along an axis, dropping the axis.
    Index(i64),
    /// A `start:stop:step` range along an axis. `None` bounds take the
    /// axis defaults for the sign of `step`.
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
    /// Expand to full slices over the axes no other entry consumes.
    Ellipsis,
    /// Insert an axis of length one.
    NewAxis,
}

impl SliceIndex {
    /// The full slice `::1`.
    pub fn full() -> Self {
        SliceIndex::Slice {
            start: None,
            stop: None,
            step: 1,
        }
    }

    fn argument(&self) -> Argument {
        match *self {
            SliceIndex::Index(index) => Argument::Int(index),
            SliceIndex::Slice { start, stop, step } => Argument::Slice {
                start,
                stop,
                step: Some(step),
            },
            SliceIndex::Ellipsis => Argument::Str("...".to_owned()),
            SliceIndex::NewAxis => Argument::None,
        }
    }
}

impl From<i64> for SliceIndex {
    fn from(index: i64) -> Self {
        SliceIndex::Index(index)
    }
}

/// The number of entries a `start:stop:step` slice selects on an axis of
/// the given length, following Python slice semantics.
fn slice_length(
    start: Option<i64>,
    stop: Option<i64>,
    step: i64,
    dimension: usize,
) -> GraphResult<usize> {
    ensure!(step != 0, ErrorCode::InvalidValue, "slice step must not be zero");
    let dimension = dimension as i64;
    let (lower, upper) = if step > 0 {
        (0, dimension)
    } else {
        (-1, dimension - 1)
    };
    let clamp = |bound: Option<i64>, default: i64| match bound {
        None => default,
        Some(value) if value < 0 => (value + dimension).max(lower),
        Some(value) => value.min(upper),
    };
    let start = clamp(start, if step > 0 { lower } else { upper });
    let stop = clamp(stop, if step > 0 { upper } else { lower });
    let length = if step > 0 {
        if stop > start {
            (stop - start - 1) / step + 1
        } else {
            0
        }
    } else if start > stop {
        (start - stop - 1) / (-step) + 1
    } else {
        0
    };
    Ok(length as usize)
}

/// The shape NumPy basic indexing produces for `key` on `shape`.
fn indexed_shape(shape: &[usize], key: &[SliceIndex]) -> GraphResult<Dims> {
    let consumed = key
        .iter()
        .filter(|entry| matches!(entry, SliceIndex::Index(_) | SliceIndex::Slice { .. }))
        .count();
    ensure!(
        consumed <= shape.len(),
        ErrorCode::OutOfBounds,
        "too many indices: {consumed} for a rank-{} tensor",
        shape.len()
    );
    ensure!(
        key.iter()
            .filter(|entry| matches!(entry, SliceIndex::Ellipsis))
            .count()
            <= 1,
        ErrorCode::InvalidValue,
        "a key may contain at most one ellipsis"
    );

    let mut result = Dims::new();
    let mut axis = 0usize;
    for entry in key {
        match *entry {
            SliceIndex::Index(index) => {
                let dimension = shape[axis] as i64;
                let normalized = if index < 0 { index + dimension } else { index };
                ensure!(
                    (0..dimension).contains(&normalized),
                    ErrorCode::OutOfBounds,
                    "index {index} is out of bounds for axis {axis} with size {dimension}"
                );
                axis += 1;
            }
            SliceIndex::Slice { start, stop, step } => {
                result.push(slice_length(start, stop, step, shape[axis])?);
                axis += 1;
            }
            SliceIndex::Ellipsis => {
                let remaining = shape.len() - consumed;
                result.extend_from_slice(&shape[axis..axis + remaining]);
                axis += remaining;
            }
            SliceIndex::NewAxis => result.push(1),
        }
    }
    result.extend_from_slice(&shape[axis..]);
    Ok(result)
}

impl Graph {
    /// Indexes into a tensor with NumPy basic-indexing semantics.
    pub fn getitem(
        &self,
        tensor: &Tensor,
        key: &[SliceIndex],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let shape = indexed_shape(&tensor.shape, key)?;
        tensor_node(
            self,
            "getitem",
            vec![
                Argument::Node(tensor.id),
                Argument::List(key.iter().map(SliceIndex::argument).collect()),
            ],
            name,
            shape,
        )
    }
}

fn getattr_node(
    graph: &Graph,
    node: crate::graph::NodeId,
    attribute: &str,
    name: Option<&str>,
    shape: Dims,
) -> GraphResult<Tensor> {
    tensor_node(
        graph,
        "getattr",
        vec![Argument::Node(node), Argument::Str(attribute.to_owned())],
        name,
        shape,
    )
}

impl Pwc {
    /// The segment values as a tensor of shape
    /// `batch_shape + (segment_count,) + value_shape`.
    pub fn values(&self, name: Option<&str>) -> GraphResult<Tensor> {
        self.attribute("values", name)
    }

    /// Extracts a whitelisted attribute by name. Only `"values"` exists
    /// on a Pwc.
    pub fn attribute(&self, attribute: &str, name: Option<&str>) -> GraphResult<Tensor> {
        ensure!(
            attribute == "values",
            ErrorCode::InvalidAttributeAccess,
            "a Pwc has no attribute {attribute:?}"
        );
        let mut shape = self.batch_shape.clone();
        shape.push(self.durations.len());
        shape.extend_from_slice(&self.value_shape);
        getattr_node(&self.graph, self.id, attribute, name, shape)
    }
}

impl FilterFunction {
    /// The filter function values on the frequency grid, shape `(F,)`.
    pub fn inverse_powers(&self, name: Option<&str>) -> GraphResult<Tensor> {
        self.attribute("inverse_powers", name)
    }

    /// The statistical uncertainty of each value, shape `(F,)`. Only
    /// present for sampled (non-exact) filter functions.
    pub fn uncertainties(&self, name: Option<&str>) -> GraphResult<Tensor> {
        self.attribute("uncertainties", name)
    }

    /// Extracts a whitelisted attribute by name.
    pub fn attribute(&self, attribute: &str, name: Option<&str>) -> GraphResult<Tensor> {
        match attribute {
            "inverse_powers" => {}
            "uncertainties" => {
                ensure!(
                    !self.exact,
                    ErrorCode::InvalidAttributeAccess,
                    "an exact filter function has no uncertainties"
                );
            }
            _ => {
                return Err(crate::error::GraphError::new(
                    ErrorCode::InvalidAttributeAccess,
                    format!("a filter function has no attribute {attribute:?}"),
                ))
            }
        }
        getattr_node(
            &self.graph,
            self.id,
            attribute,
            name,
            dims(&[self.frequencies.len()]),
        )
    }
}

impl Sequence {
    /// The `index`-th element of the sequence.
    pub fn get(&self, index: usize, name: Option<&str>) -> GraphResult<Tensor> {
        ensure!(
            index < self.item_shapes.len(),
            ErrorCode::OutOfBounds,
            "index {index} is out of bounds for a sequence of {} elements",
            self.item_shapes.len()
        );
        tensor_node(
            &self.graph,
            "getitem",
            vec![Argument::Node(self.id), Argument::Int(index as i64)],
            name,
            self.item_shapes[index].clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::SliceIndex;
    use crate::error::ErrorCode;
    use crate::graph::Graph;

    fn tensor(graph: &Graph, shape: &[usize]) -> crate::node::Tensor {
        graph
            .tensor(ArrayD::<f64>::zeros(IxDyn(shape)), None)
            .unwrap()
    }

    #[test]
    fn full_slices_preserve_the_shape() {
        let graph = Graph::new();
        let x = tensor(&graph, &[2, 3, 4]);
        let sliced = graph
            .getitem(&x, &[SliceIndex::full(), SliceIndex::full()], None)
            .unwrap();
        assert_eq!(sliced.shape(), &[2, 3, 4]);
        let via_ellipsis = graph.getitem(&x, &[SliceIndex::Ellipsis], None).unwrap();
        assert_eq!(via_ellipsis.shape(), &[2, 3, 4]);
    }

    #[test]
    fn indices_drop_axes_and_newaxis_inserts_them() {
        let graph = Graph::new();
        let x = tensor(&graph, &[2, 3, 4]);
        let picked = graph
            .getitem(
                &x,
                &[
                    SliceIndex::Index(-1),
                    SliceIndex::NewAxis,
                    SliceIndex::Ellipsis,
                ],
                None,
            )
            .unwrap();
        assert_eq!(picked.shape(), &[1, 3, 4]);
        let err = graph.getitem(&x, &[SliceIndex::Index(2)], None).unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfBounds);
    }

    #[test]
    fn negative_steps_reverse_the_axis() {
        let graph = Graph::new();
        let x = tensor(&graph, &[5]);
        let reversed = graph
            .getitem(
                &x,
                &[SliceIndex::Slice {
                    start: None,
                    stop: None,
                    step: -1,
                }],
                None,
            )
            .unwrap();
        assert_eq!(reversed.shape(), &[5]);
        let strided = graph
            .getitem(
                &x,
                &[SliceIndex::Slice {
                    start: Some(1),
                    stop: Some(4),
                    step: 2,
                }],
                None,
            )
            .unwrap();
        assert_eq!(strided.shape(), &[2]);
    }

    #[test]
    fn pwc_values_stack_segments_between_batch_and_value_axes() {
        let graph = Graph::new();
        let signal = graph
            .pwc_signal(ArrayD::<f64>::zeros(IxDyn(&[4, 6])), 1.0, None)
            .unwrap();
        let values = signal.values(Some("values")).unwrap();
        assert_eq!(values.shape(), &[4, 6]);
        let err = signal.attribute("durations", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAttributeAccess);
    }

    #[test]
    fn exact_filter_functions_have_no_uncertainties() {
        let graph = Graph::new();
        let signal = graph.pwc_signal(vec![1.0, 0.5], 1.0, None).unwrap();
        let hamiltonian = graph
            .pwc_operator(&signal, ndarray::Array2::<f64>::eye(2), None)
            .unwrap();
        let noise = graph
            .constant_pwc_operator(1.0, ndarray::Array2::<f64>::eye(2), None)
            .unwrap();
        let exact = graph
            .filter_function(&hamiltonian, &noise, &[0.0, 1.0], None, None, None)
            .unwrap();
        assert!(exact.inverse_powers(None).is_ok());
        let err = exact.uncertainties(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAttributeAccess);

        let sampled = graph
            .filter_function(&hamiltonian, &noise, &[0.0, 1.0], Some(50), None, None)
            .unwrap();
        let uncertainties = sampled.uncertainties(None).unwrap();
        assert_eq!(uncertainties.shape(), &[2]);
    }
}
