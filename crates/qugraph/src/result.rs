//! Evaluation driving and result binding.
//!
//! [`evaluate`] and [`optimize`] validate the requested outputs against
//! the graph, submit a serialized request through an
//! [`EvaluationBackend`], poll the job to a terminal status, and decode
//! the fetched payload into typed output values using each node's
//! recorded metadata.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde_json::Value as Json;

use crate::backend::{EvaluationBackend, EvaluationOptions, JobStatus, Verbosity};
use crate::error::EvaluationError;
use crate::graph::{Argument, EvaluationRequest, Graph, NodeId, NodeMetadata};
use crate::literal::ArrayLiteral;

const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(30);

/// One segment of a fetched Pwc.
#[derive(Debug, Clone, PartialEq)]
pub struct PwcSegment {
    pub duration: f64,
    pub value: ArrayLiteral,
}

/// A fetched Pwc: segment lists at the leaves, nested once per batch
/// dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum PwcResult {
    Segments(Vec<PwcSegment>),
    Batch(Vec<PwcResult>),
}

/// A fetched filter function.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterFunctionResult {
    pub frequencies: Vec<f64>,
    pub inverse_powers: Vec<f64>,
    /// Absent for filter functions computed with the exact method.
    pub uncertainties: Option<Vec<f64>>,
}

/// One decoded output, in the container its node kind dictates.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Tensor(ArrayLiteral),
    Pwc(PwcResult),
    FilterFunction(FilterFunctionResult),
    Sequence(Vec<ArrayLiteral>),
}

/// Decoded outputs of one evaluation, keyed by output name.
#[derive(Debug, Clone, Default)]
pub struct EvaluationResult {
    pub outputs: HashMap<String, OutputValue>,
}

impl EvaluationResult {
    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.outputs.get(name)
    }
}

fn invalid(message: impl Into<String>) -> EvaluationError {
    EvaluationError::InvalidRequest(message.into())
}

fn malformed(name: &str, message: impl std::fmt::Display) -> EvaluationError {
    EvaluationError::Backend {
        status: "SUCCESS".to_owned(),
        message: format!("malformed payload for output `{name}`: {message}"),
    }
}

fn resolve_outputs(
    graph: &Graph,
    outputs: &[&str],
) -> Result<Vec<(String, NodeMetadata)>, EvaluationError> {
    outputs
        .iter()
        .map(|&name| {
            let (_, metadata) = graph
                .lookup_name(name)
                .ok_or_else(|| invalid(format!("no node is named `{name}`")))?;
            if !metadata.is_fetchable() {
                return Err(invalid(format!(
                    "`{name}` is a {} node and cannot be fetched",
                    metadata.kind_name()
                )));
            }
            Ok((name.to_owned(), metadata))
        })
        .collect()
}

/// The cost must name a real scalar tensor.
fn resolve_cost(graph: &Graph, cost: &str) -> Result<NodeId, EvaluationError> {
    let (id, metadata) = graph
        .lookup_name(cost)
        .ok_or_else(|| invalid(format!("no node is named `{cost}`")))?;
    match metadata {
        NodeMetadata::Tensor { shape } if shape.is_empty() => Ok(id),
        NodeMetadata::Tensor { shape } => Err(invalid(format!(
            "cost node `{cost}` must be a scalar, got shape ({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
        other => Err(invalid(format!(
            "cost node `{cost}` must be a Tensor, got {}",
            other.kind_name()
        ))),
    }
}

fn collect_node_arguments(argument: &Argument, into: &mut Vec<NodeId>) {
    match argument {
        Argument::Node(id) => into.push(*id),
        Argument::List(items) => {
            for item in items {
                collect_node_arguments(item, into);
            }
        }
        _ => {}
    }
}

/// Walks the dependency closure of the cost node. Every reachable node
/// must support gradients, and at least one reachable node must be an
/// optimization variable.
fn check_differentiable(graph: &Graph, cost: NodeId) -> Result<(), EvaluationError> {
    graph.with_operations(|operations| {
        let mut stack = vec![cost];
        let mut seen = HashSet::new();
        let mut has_variable = false;
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let operation = &operations[id.index()];
            if !operation.supports_gradient {
                let label = operation
                    .output_name
                    .clone()
                    .unwrap_or_else(|| operation.name.to_owned());
                return Err(EvaluationError::UnsupportedGradient(label));
            }
            has_variable |= operation.is_optimization_variable;
            for argument in &operation.args {
                collect_node_arguments(argument, &mut stack);
            }
        }
        if !has_variable {
            return Err(invalid(
                "the cost node does not depend on any optimization variable",
            ));
        }
        Ok(())
    })
}

fn drive(
    graph: &Graph,
    outputs: Vec<(String, NodeMetadata)>,
    cost: Option<String>,
    backend: &dyn EvaluationBackend,
    options: &EvaluationOptions,
) -> Result<EvaluationResult, EvaluationError> {
    let request = EvaluationRequest {
        operations: graph.wire_operations(),
        outputs: outputs.iter().map(|(name, _)| name.clone()).collect(),
        cost,
        seed: options.seed,
    };
    let handle = backend.submit(&request)?;
    let deadline = options.poll_deadline.unwrap_or(DEFAULT_POLL_DEADLINE);
    loop {
        let polls = backend.poll(std::slice::from_ref(&handle), deadline)?;
        let poll = polls.into_iter().next().ok_or_else(|| {
            EvaluationError::Backend {
                status: "UNKNOWN".to_owned(),
                message: format!("no poll entry for handle `{}`", handle.0),
            }
        })?;
        if options.verbosity == Verbosity::Verbose {
            match poll.progress {
                Some(progress) => eprintln!(
                    "job {}: {:?} ({:.0}%)",
                    handle.0,
                    poll.status,
                    progress * 100.0
                ),
                None => eprintln!("job {}: {:?}", handle.0, poll.status),
            }
        }
        match poll.status {
            JobStatus::Success => break,
            JobStatus::Failure => {
                return Err(EvaluationError::Backend {
                    status: "FAILURE".to_owned(),
                    message: poll.error.unwrap_or_else(|| "remote failure".to_owned()),
                });
            }
            JobStatus::Revoked => {
                return Err(EvaluationError::Backend {
                    status: "REVOKED".to_owned(),
                    message: "the job was cancelled".to_owned(),
                });
            }
            JobStatus::Pending | JobStatus::Running | JobStatus::Unknown => {}
        }
    }
    let payload = backend.fetch(&handle)?;
    let mut result = EvaluationResult::default();
    for (name, metadata) in outputs {
        let entry = payload
            .get(&name)
            .ok_or_else(|| malformed(&name, "missing from the payload"))?;
        let value = decode_output(&name, &metadata, entry)?;
        result.outputs.insert(name, value);
    }
    Ok(result)
}

/// Evaluates the named outputs of a graph on a backend.
pub fn evaluate(
    graph: &Graph,
    outputs: &[&str],
    backend: &dyn EvaluationBackend,
    options: &EvaluationOptions,
) -> Result<EvaluationResult, EvaluationError> {
    let outputs = resolve_outputs(graph, outputs)?;
    drive(graph, outputs, None, backend, options)
}

/// Runs an optimization over a graph's optimization variables, driving
/// the named scalar cost down, and fetches the named outputs at the
/// optimum.
pub fn optimize(
    graph: &Graph,
    cost: &str,
    outputs: &[&str],
    backend: &dyn EvaluationBackend,
    options: &EvaluationOptions,
) -> Result<EvaluationResult, EvaluationError> {
    let cost_id = resolve_cost(graph, cost)?;
    check_differentiable(graph, cost_id)?;
    let outputs = resolve_outputs(graph, outputs)?;
    drive(graph, outputs, Some(cost.to_owned()), backend, options)
}

fn decode_output(
    name: &str,
    metadata: &NodeMetadata,
    entry: &Json,
) -> Result<OutputValue, EvaluationError> {
    let value = entry
        .get("value")
        .ok_or_else(|| malformed(name, "missing `value` field"))?;
    match metadata {
        NodeMetadata::Tensor { .. } => {
            let array: ArrayLiteral =
                serde_json::from_value(value.clone()).map_err(|err| malformed(name, err))?;
            Ok(OutputValue::Tensor(array))
        }
        NodeMetadata::Pwc { .. } => Ok(OutputValue::Pwc(decode_pwc(name, value)?)),
        NodeMetadata::FilterFunction { frequencies, exact } => {
            let inverse_powers = decode_real_vector(name, value.get("inverse_powers"))?;
            let uncertainties = if *exact {
                None
            } else {
                Some(decode_real_vector(name, value.get("uncertainties"))?)
            };
            Ok(OutputValue::FilterFunction(FilterFunctionResult {
                frequencies: frequencies.clone(),
                inverse_powers,
                uncertainties,
            }))
        }
        NodeMetadata::Sequence { .. } => {
            let items = value
                .as_array()
                .ok_or_else(|| malformed(name, "sequence payload is not a list"))?;
            let decoded = items
                .iter()
                .map(|item| serde_json::from_value(item.clone()))
                .collect::<Result<Vec<ArrayLiteral>, _>>()
                .map_err(|err| malformed(name, err))?;
            Ok(OutputValue::Sequence(decoded))
        }
        other => Err(malformed(
            name,
            format!("{} nodes are never returned as values", other.kind_name()),
        )),
    }
}

fn decode_real_vector(name: &str, value: Option<&Json>) -> Result<Vec<f64>, EvaluationError> {
    value
        .and_then(Json::as_array)
        .ok_or_else(|| malformed(name, "missing real vector"))?
        .iter()
        .map(|entry| {
            entry
                .as_f64()
                .ok_or_else(|| malformed(name, "non-numeric vector entry"))
        })
        .collect()
}

/// Pwcs arrive as nested lists whose leaves are `{duration, value}`
/// records; one nesting level per batch dimension.
fn decode_pwc(name: &str, value: &Json) -> Result<PwcResult, EvaluationError> {
    let items = value
        .as_array()
        .ok_or_else(|| malformed(name, "pwc payload is not a list"))?;
    if items.is_empty() {
        return Err(malformed(name, "pwc payload is empty"));
    }
    if items[0].get("duration").is_some() {
        let segments = items
            .iter()
            .map(|item| {
                let duration = item
                    .get("duration")
                    .and_then(Json::as_f64)
                    .ok_or_else(|| malformed(name, "segment without duration"))?;
                let value = item
                    .get("value")
                    .ok_or_else(|| malformed(name, "segment without value"))?;
                let value: ArrayLiteral =
                    serde_json::from_value(value.clone()).map_err(|err| malformed(name, err))?;
                Ok(PwcSegment { duration, value })
            })
            .collect::<Result<Vec<_>, EvaluationError>>()?;
        Ok(PwcResult::Segments(segments))
    } else {
        let batch = items
            .iter()
            .map(|item| decode_pwc(name, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PwcResult::Batch(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn unnamed_outputs_are_rejected() {
        let graph = Graph::new();
        graph.tensor(vec![1.0, 2.0], Some("x")).unwrap();
        assert!(resolve_outputs(&graph, &["x"]).is_ok());
        let err = resolve_outputs(&graph, &["y"]).unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidRequest(_)));
    }

    #[test]
    fn cost_must_be_a_scalar_tensor() {
        let graph = Graph::new();
        graph.tensor(vec![1.0, 2.0], Some("vector")).unwrap();
        let x = graph.tensor(vec![1.0, 2.0], None).unwrap();
        graph.sum(x, None, false, Some("scalar")).unwrap();
        assert!(resolve_cost(&graph, "scalar").is_ok());
        assert!(resolve_cost(&graph, "vector").is_err());
    }

    #[test]
    fn gradient_reachability_walks_the_cost_closure() {
        let graph = Graph::new();
        let variable = graph
            .optimization_variable(2, -1.0, 1.0, false, false, None, None)
            .unwrap();
        let cost = graph.sum(variable, None, false, Some("cost")).unwrap();
        assert!(check_differentiable(&graph, cost.id).is_ok());

        // A graph whose cost has no optimization variable beneath it.
        let flat = Graph::new();
        let x = flat.tensor(vec![1.0], None).unwrap();
        let flat_cost = flat.sum(x, None, false, Some("cost")).unwrap();
        let err = check_differentiable(&flat, flat_cost.id).unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidRequest(_)));
    }

    #[test]
    fn non_differentiable_nodes_fail_optimization() {
        let graph = Graph::new();
        let variable = graph
            .optimization_variable(4, -1.0, 1.0, false, false, None, None)
            .unwrap();
        let rho = graph.reshape(variable, &[2, 2], None).unwrap();
        let wigner = graph
            .wigner_transform(rho, &[0.0], &[0.0], None)
            .unwrap();
        let cost = graph.sum(wigner, None, false, Some("cost")).unwrap();
        let err = check_differentiable(&graph, cost.id).unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedGradient(_)));
    }

    #[test]
    fn pwc_payloads_decode_to_nested_segments() {
        let payload = serde_json::json!([
            {"duration": 0.5, "value": {"dtype": "float64", "shape": [], "data": [1.0]}},
            {"duration": 0.5, "value": {"dtype": "float64", "shape": [], "data": [2.0]}}
        ]);
        let decoded = decode_pwc("signal", &payload).unwrap();
        match decoded {
            PwcResult::Segments(segments) => {
                assert_eq!(segments.len(), 2);
                assert_eq!(segments[0].duration, 0.5);
            }
            PwcResult::Batch(_) => panic!("expected a segment leaf"),
        }
    }
}
