//! Tensor constructors and shape manipulation.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::error::{ensure, ErrorCode, GraphError, GraphResult};
use crate::graph::{Argument, Graph};
use crate::node::{Tensor, TensorLike};
use crate::ops::{check_square, tensor_node};
use crate::shape::{dims, format_dims, normalize_axes, normalize_axis, reduced_shape, validate_broadcast, Dims};

/// The Pauli labels, with M/P the lowering/raising operators in the
/// |↓⟩ = (1, 0)ᵀ convention.
static PAULI_LABELS: Lazy<Vec<char>> = Lazy::new(|| vec!['I', 'X', 'Y', 'Z', 'M', 'P']);

/// Operand of `sum`: a single value or a list of equally shaped tensors,
/// which sums over the implicit stacking axis.
#[derive(Debug, Clone)]
pub enum SumOperand {
    Value(TensorLike),
    List(Vec<Tensor>),
}

impl From<Tensor> for SumOperand {
    fn from(value: Tensor) -> Self {
        SumOperand::Value(TensorLike::Tensor(value))
    }
}

impl From<TensorLike> for SumOperand {
    fn from(value: TensorLike) -> Self {
        SumOperand::Value(value)
    }
}

impl From<Vec<Tensor>> for SumOperand {
    fn from(value: Vec<Tensor>) -> Self {
        SumOperand::List(value)
    }
}

/// `repeats` argument of `repeat`.
#[derive(Debug, Clone)]
pub enum Repeats {
    Uniform(usize),
    PerEntry(Vec<usize>),
}

impl From<usize> for Repeats {
    fn from(value: usize) -> Self {
        Repeats::Uniform(value)
    }
}

impl From<Vec<usize>> for Repeats {
    fn from(value: Vec<usize>) -> Self {
        Repeats::PerEntry(value)
    }
}

impl Graph {
    /// Wraps a literal array (or an existing tensor) as a tensor node.
    pub fn tensor(&self, value: impl Into<TensorLike>, name: Option<&str>) -> GraphResult<Tensor> {
        let value = value.into();
        let shape = value.shape();
        tensor_node(self, "tensor", vec![value.argument()], name, shape)
    }

    /// Concatenates tensors along `axis`. All operands must have equal
    /// shape except along the concatenation axis.
    pub fn concatenate(
        &self,
        tensors: Vec<TensorLike>,
        axis: i64,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            !tensors.is_empty(),
            ErrorCode::EmptyList,
            "concatenate requires at least one tensor"
        );
        let first_shape = tensors[0].shape();
        let axis = normalize_axis(axis, first_shape.len(), "tensors[0]")?;
        let mut concatenated = first_shape.clone();
        for (index, tensor) in tensors.iter().enumerate().skip(1) {
            let shape = tensor.shape();
            ensure!(
                shape.len() == first_shape.len()
                    && shape
                        .iter()
                        .zip(first_shape.iter())
                        .enumerate()
                        .all(|(dim, (a, b))| dim == axis || a == b),
                ErrorCode::ShapeMismatch,
                "tensors[{index}] (shape {}) must match shape {} on all axes except {axis}",
                format_dims(&shape),
                format_dims(&first_shape)
            );
            concatenated[axis] += shape[axis];
        }
        let args = vec![
            Argument::List(tensors.iter().map(TensorLike::argument).collect()),
            Argument::Int(axis as i64),
        ];
        tensor_node(self, "concatenate", args, name, concatenated)
    }

    /// Sums over the given axes (`None` sums everything). A list operand
    /// is summed over its stacking axis as well.
    pub fn sum(
        &self,
        x: impl Into<SumOperand>,
        axis: Option<&[i64]>,
        keepdims: bool,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let (shape, argument) = match x.into() {
            SumOperand::Value(value) => (value.shape(), value.argument()),
            SumOperand::List(terms) => {
                ensure!(
                    !terms.is_empty(),
                    ErrorCode::EmptyList,
                    "sum requires at least one term"
                );
                let element_shape = terms[0].shape.clone();
                for (index, term) in terms.iter().enumerate().skip(1) {
                    ensure!(
                        term.shape == element_shape,
                        ErrorCode::ShapeMismatch,
                        "terms[{index}] (shape {}) must match shape {}",
                        format_dims(&term.shape),
                        format_dims(&element_shape)
                    );
                }
                let mut shape = dims(&[terms.len()]);
                shape.extend_from_slice(&element_shape);
                let argument =
                    Argument::List(terms.iter().map(|term| Argument::Node(term.id)).collect());
                (shape, argument)
            }
        };
        let axes = normalize_axes(axis, shape.len(), "x")?;
        let args = vec![
            argument,
            match axis {
                Some(axis) => Argument::Ints(axis.to_vec()),
                None => Argument::None,
            },
            Argument::Bool(keepdims),
        ];
        tensor_node(self, "sum", args, name, reduced_shape(&shape, &axes, keepdims))
    }

    /// Minimum over the given axes (`None` reduces everything).
    pub fn min(
        &self,
        x: impl Into<TensorLike>,
        axis: Option<&[i64]>,
        keepdims: bool,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.reduction("min", x.into(), axis, keepdims, name)
    }

    /// Maximum over the given axes (`None` reduces everything).
    pub fn max(
        &self,
        x: impl Into<TensorLike>,
        axis: Option<&[i64]>,
        keepdims: bool,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        self.reduction("max", x.into(), axis, keepdims, name)
    }

    fn reduction(
        &self,
        op: &'static str,
        x: TensorLike,
        axis: Option<&[i64]>,
        keepdims: bool,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let shape = x.shape();
        let axes = normalize_axes(axis, shape.len(), "x")?;
        let args = vec![
            x.argument(),
            match axis {
                Some(axis) => Argument::Ints(axis.to_vec()),
                None => Argument::None,
            },
            Argument::Bool(keepdims),
        ];
        tensor_node(self, op, args, name, reduced_shape(&shape, &axes, keepdims))
    }

    /// Cumulative sum along `axis`.
    pub fn cumulative_sum(
        &self,
        x: impl Into<TensorLike>,
        axis: i64,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let x = x.into();
        let shape = x.shape();
        ensure!(
            !shape.is_empty(),
            ErrorCode::ShapeMismatch,
            "x must have at least one dimension"
        );
        let axis = normalize_axis(axis, shape.len(), "x")?;
        let args = vec![x.argument(), Argument::Int(axis as i64)];
        tensor_node(self, "cumulative_sum", args, name, shape)
    }

    /// Reverses the tensor along the given axes.
    pub fn reverse(
        &self,
        x: impl Into<TensorLike>,
        axis: &[i64],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let x = x.into();
        let shape = x.shape();
        let axes = normalize_axes(Some(axis), shape.len(), "x")?;
        let args = vec![
            x.argument(),
            Argument::Ints(axes.iter().map(|&axis| axis as i64).collect()),
        ];
        tensor_node(self, "reverse", args, name, shape)
    }

    /// Repeats entries along `axis`; `axis = None` operates on the
    /// flattened tensor.
    pub fn repeat(
        &self,
        x: impl Into<TensorLike>,
        repeats: impl Into<Repeats>,
        axis: Option<i64>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let x = x.into();
        let repeats = repeats.into();
        let shape = x.shape();
        let (axis_index, axis_length, mut output) = match axis {
            Some(axis) => {
                let axis = normalize_axis(axis, shape.len(), "x")?;
                (Some(axis), shape[axis], shape.clone())
            }
            None => {
                let total = shape.iter().product();
                (None, total, dims(&[total]))
            }
        };
        let position = axis_index.unwrap_or(0);
        match &repeats {
            Repeats::Uniform(count) => {
                ensure!(
                    *count > 0,
                    ErrorCode::NonPositiveInteger,
                    "repeats must be positive"
                );
                output[position] = axis_length * count;
            }
            Repeats::PerEntry(counts) => {
                ensure!(
                    counts.len() == axis_length,
                    ErrorCode::ShapeMismatch,
                    "repeats must have one entry per repeated element, expected {axis_length} \
                     got {}",
                    counts.len()
                );
                output[position] = counts.iter().sum();
            }
        }
        let repeats_arg = match repeats {
            Repeats::Uniform(count) => Argument::Int(count as i64),
            Repeats::PerEntry(counts) => {
                Argument::Ints(counts.iter().map(|&count| count as i64).collect())
            }
        };
        let args = vec![
            x.argument(),
            repeats_arg,
            match axis {
                Some(axis) => Argument::Int(axis),
                None => Argument::None,
            },
        ];
        tensor_node(self, "repeat", args, name, output)
    }

    /// Reshapes the tensor. One entry may be `-1` and is inferred.
    pub fn reshape(
        &self,
        x: impl Into<TensorLike>,
        shape: &[i64],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let x = x.into();
        let input_shape = x.shape();
        let element_count: usize = input_shape.iter().product();
        let mut inferred = None;
        let mut known_product: usize = 1;
        for (index, &entry) in shape.iter().enumerate() {
            if entry == -1 {
                ensure!(
                    inferred.is_none(),
                    ErrorCode::InvalidValue,
                    "shape may contain at most one -1 entry"
                );
                inferred = Some(index);
            } else {
                ensure!(
                    entry > 0,
                    ErrorCode::InvalidValue,
                    "shape entries must be positive or -1, got {entry}"
                );
                known_product *= entry as usize;
            }
        }
        let mut output: Dims = shape
            .iter()
            .map(|&entry| if entry == -1 { 0 } else { entry as usize })
            .collect();
        if let Some(index) = inferred {
            ensure!(
                known_product > 0 && element_count % known_product == 0,
                ErrorCode::ShapeMismatch,
                "cannot infer the -1 entry of shape {shape:?} for {element_count} elements"
            );
            output[index] = element_count / known_product;
        } else {
            ensure!(
                known_product == element_count,
                ErrorCode::ShapeMismatch,
                "shape {shape:?} does not match the {element_count} elements of x"
            );
        }
        let args = vec![x.argument(), Argument::Ints(shape.to_vec())];
        tensor_node(self, "reshape", args, name, output)
    }

    /// Permutes the dimensions. `None` reverses them.
    pub fn transpose(
        &self,
        x: impl Into<TensorLike>,
        perm: Option<&[i64]>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        let x = x.into();
        let shape = x.shape();
        let output: Dims = match perm {
            None => shape.iter().rev().copied().collect(),
            Some(perm) => {
                let axes = normalize_axes(Some(perm), shape.len(), "x")?;
                ensure!(
                    axes.len() == shape.len(),
                    ErrorCode::InvalidAxis,
                    "perm must be a permutation of the {} dimensions of x",
                    shape.len()
                );
                axes.iter().map(|&axis| shape[axis]).collect()
            }
        };
        let args = vec![
            x.argument(),
            match perm {
                Some(perm) => Argument::Ints(perm.to_vec()),
                None => Argument::None,
            },
        ];
        tensor_node(self, "transpose", args, name, output)
    }

    /// Einstein summation. The equation is validated against the operand
    /// shapes, with `...` broadcasting supported.
    pub fn einsum(
        &self,
        equation: &str,
        tensors: Vec<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            !tensors.is_empty(),
            ErrorCode::EmptyList,
            "einsum requires at least one tensor"
        );
        let shapes: Vec<Dims> = tensors.iter().map(TensorLike::shape).collect();
        let output = einsum_output_shape(equation, &shapes)?;
        let args = vec![
            Argument::Str(equation.to_owned()),
            Argument::List(tensors.iter().map(TensorLike::argument).collect()),
        ];
        tensor_node(self, "einsum", args, name, output)
    }

    /// One of the 2×2 Pauli matrices `I X Y Z M P`.
    pub fn pauli_matrix(&self, label: char, name: Option<&str>) -> GraphResult<Tensor> {
        ensure!(
            PAULI_LABELS.contains(&label),
            ErrorCode::InvalidValue,
            "label must be one of I, X, Y, Z, M, P, got {label}"
        );
        let args = vec![Argument::Str(label.to_string())];
        tensor_node(self, "pauli_matrix", args, name, dims(&[2, 2]))
    }

    /// Kronecker product of single-qubit Pauli operators embedded at the
    /// given positions, identity elsewhere.
    pub fn pauli_kronecker_product(
        &self,
        labels: &[(char, usize)],
        subsystem_count: usize,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            !labels.is_empty(),
            ErrorCode::EmptyList,
            "labels must not be empty"
        );
        ensure!(
            labels.len() <= subsystem_count,
            ErrorCode::OutOfBounds,
            "labels must not name more operators than the {subsystem_count} subsystems"
        );
        let mut positions = Vec::with_capacity(labels.len());
        for &(label, position) in labels {
            ensure!(
                PAULI_LABELS.contains(&label),
                ErrorCode::InvalidValue,
                "label must be one of I, X, Y, Z, M, P, got {label}"
            );
            ensure!(
                position < subsystem_count,
                ErrorCode::OutOfBounds,
                "position {position} is out of range for {subsystem_count} subsystems"
            );
            ensure!(
                !positions.contains(&position),
                ErrorCode::InvalidValue,
                "positions must be unique, {position} appears twice"
            );
            positions.push(position);
        }
        let dimension = 1usize << subsystem_count;
        let args = vec![
            Argument::List(
                labels
                    .iter()
                    .map(|&(label, position)| {
                        Argument::List(vec![
                            Argument::Str(label.to_string()),
                            Argument::Int(position as i64),
                        ])
                    })
                    .collect(),
            ),
            Argument::Int(subsystem_count as i64),
        ];
        tensor_node(
            self,
            "pauli_kronecker_product",
            args,
            name,
            dims(&[dimension, dimension]),
        )
    }

    /// Embeds operators into a composite space, identity on every
    /// unnamed subsystem. Each operator's dimension must match
    /// `dimensions[position]`.
    pub fn embed_operators(
        &self,
        operators: Vec<(TensorLike, usize)>,
        dimensions: &[usize],
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            !operators.is_empty(),
            ErrorCode::EmptyList,
            "operators must not be empty"
        );
        ensure!(
            !dimensions.is_empty(),
            ErrorCode::EmptyList,
            "dimensions must not be empty"
        );
        let mut batch_shape = Dims::new();
        for (index, (operator, position)) in operators.iter().enumerate() {
            ensure!(
                *position < dimensions.len(),
                ErrorCode::OutOfBounds,
                "position {position} is out of range for {} subsystems",
                dimensions.len()
            );
            let shape = operator.shape();
            let dimension = check_square(&shape, &format!("operators[{index}]"))?;
            ensure!(
                dimension == dimensions[*position],
                ErrorCode::ShapeMismatch,
                "operators[{index}] has dimension {dimension} but subsystem {position} has \
                 dimension {}",
                dimensions[*position]
            );
            batch_shape = validate_broadcast(
                &batch_shape,
                &shape[..shape.len() - 2],
                "operators (batch)",
                &format!("operators[{index}] (batch)"),
            )?;
        }
        let total: usize = dimensions.iter().product();
        let mut shape = batch_shape;
        shape.push(total);
        shape.push(total);
        let args = vec![
            Argument::List(
                operators
                    .iter()
                    .map(|(operator, position)| {
                        Argument::List(vec![
                            operator.argument(),
                            Argument::Int(*position as i64),
                        ])
                    })
                    .collect(),
            ),
            Argument::Ints(dimensions.iter().map(|&d| d as i64).collect()),
        ];
        tensor_node(self, "embed_operators", args, name, shape)
    }

    /// Kronecker product of a list of matrices, batches broadcast.
    pub fn kronecker_product_list(
        &self,
        operators: Vec<TensorLike>,
        name: Option<&str>,
    ) -> GraphResult<Tensor> {
        ensure!(
            !operators.is_empty(),
            ErrorCode::EmptyList,
            "operators must not be empty"
        );
        let mut batch_shape = Dims::new();
        let mut rows = 1usize;
        let mut cols = 1usize;
        for (index, operator) in operators.iter().enumerate() {
            let shape = operator.shape();
            ensure!(
                shape.len() >= 2,
                ErrorCode::ShapeMismatch,
                "operators[{index}] (shape {}) must have at least two dimensions",
                format_dims(&shape)
            );
            batch_shape = validate_broadcast(
                &batch_shape,
                &shape[..shape.len() - 2],
                "operators (batch)",
                &format!("operators[{index}] (batch)"),
            )?;
            rows *= shape[shape.len() - 2];
            cols *= shape[shape.len() - 1];
        }
        let mut shape = batch_shape;
        shape.push(rows);
        shape.push(cols);
        let args = vec![Argument::List(
            operators.iter().map(TensorLike::argument).collect(),
        )];
        tensor_node(self, "kronecker_product_list", args, name, shape)
    }
}

fn einsum_error(equation: &str, detail: &str) -> GraphError {
    GraphError::new(
        ErrorCode::InvalidEinsumEquation,
        format!("invalid einsum equation `{equation}`: {detail}"),
    )
}

/// Validates an einsum equation against the operand shapes and returns
/// the output shape. Supports a single `...` per term.
fn einsum_output_shape(equation: &str, shapes: &[Dims]) -> GraphResult<Dims> {
    let stripped: String = equation.chars().filter(|c| !c.is_whitespace()).collect();
    let (input_spec, output_spec) = match stripped.split_once("->") {
        Some((inputs, output)) => (inputs.to_owned(), Some(output.to_owned())),
        None => (stripped.clone(), None),
    };
    let terms: Vec<&str> = input_spec.split(',').collect();
    if terms.len() != shapes.len() {
        return Err(einsum_error(
            equation,
            &format!("{} terms for {} operands", terms.len(), shapes.len()),
        ));
    }

    let mut label_sizes: BTreeMap<char, usize> = BTreeMap::new();
    let mut label_counts: BTreeMap<char, usize> = BTreeMap::new();
    let mut ellipsis_shape = Dims::new();
    let mut saw_ellipsis = false;

    for (term, shape) in terms.iter().zip(shapes) {
        let (head, tail) = match term.find("...") {
            Some(position) => {
                if term[position + 3..].contains("...") {
                    return Err(einsum_error(equation, "more than one ellipsis in a term"));
                }
                saw_ellipsis = true;
                (&term[..position], &term[position + 3..])
            }
            None => (*term, ""),
        };
        let labelled = head.len() + tail.len();
        for label in head.chars().chain(tail.chars()) {
            if !label.is_ascii_alphabetic() {
                return Err(einsum_error(equation, &format!("bad subscript `{label}`")));
            }
        }
        if term.contains("...") {
            if labelled > shape.len() {
                return Err(einsum_error(
                    equation,
                    &format!(
                        "term `{term}` names {labelled} dimensions but the operand has {}",
                        shape.len()
                    ),
                ));
            }
        } else if labelled != shape.len() {
            return Err(einsum_error(
                equation,
                &format!(
                    "term `{term}` names {labelled} dimensions but the operand has {}",
                    shape.len()
                ),
            ));
        }
        let broadcast_rank = shape.len() - labelled;
        let term_ellipsis = &shape[head.len()..head.len() + broadcast_rank];
        if term.contains("...") {
            ellipsis_shape = crate::shape::broadcast(&ellipsis_shape, term_ellipsis)
                .ok_or_else(|| einsum_error(equation, "incompatible broadcast dimensions"))?;
        }
        let mut sized: Vec<(char, usize)> = head
            .chars()
            .enumerate()
            .map(|(i, label)| (label, shape[i]))
            .collect();
        sized.extend(
            tail.chars()
                .enumerate()
                .map(|(i, label)| (label, shape[shape.len() - tail.len() + i])),
        );
        for (label, size) in sized {
            *label_counts.entry(label).or_insert(0) += 1;
            match label_sizes.get(&label) {
                None => {
                    label_sizes.insert(label, size);
                }
                Some(&existing) if existing == size => {}
                Some(&1) => {
                    label_sizes.insert(label, size);
                }
                Some(_) if size == 1 => {}
                Some(&existing) => {
                    return Err(einsum_error(
                        equation,
                        &format!(
                            "subscript `{label}` has conflicting sizes {existing} and {size}"
                        ),
                    ));
                }
            }
        }
    }

    match output_spec {
        Some(output) => {
            let (head, tail) = match output.find("...") {
                Some(position) => {
                    if output[position + 3..].contains("...") {
                        return Err(einsum_error(equation, "more than one ellipsis in output"));
                    }
                    (&output[..position], &output[position + 3..])
                }
                None => (output.as_str(), ""),
            };
            if !output.contains("...") && saw_ellipsis && !ellipsis_shape.is_empty() {
                return Err(einsum_error(
                    equation,
                    "output omits the broadcast dimensions",
                ));
            }
            let mut shape = Dims::new();
            let mut seen = Vec::new();
            let mut push_labels = |labels: &str, shape: &mut Dims| -> GraphResult<()> {
                for label in labels.chars() {
                    if seen.contains(&label) {
                        return Err(einsum_error(
                            equation,
                            &format!("subscript `{label}` repeats in the output"),
                        ));
                    }
                    seen.push(label);
                    let size = label_sizes.get(&label).ok_or_else(|| {
                        einsum_error(
                            equation,
                            &format!("output subscript `{label}` is not an input subscript"),
                        )
                    })?;
                    shape.push(*size);
                }
                Ok(())
            };
            push_labels(head, &mut shape)?;
            if output.contains("...") {
                shape.extend_from_slice(&ellipsis_shape);
            }
            push_labels(tail, &mut shape)?;
            Ok(shape)
        }
        None => {
            // Implicit mode: broadcast dims first, then the subscripts
            // that appear exactly once, alphabetically.
            let mut shape = ellipsis_shape;
            for (label, count) in &label_counts {
                if *count == 1 {
                    shape.push(label_sizes[label]);
                }
            }
            Ok(shape)
        }
    }
}
