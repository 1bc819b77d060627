//! Wire encoding of operations and evaluation requests.

use num_complex::Complex64;
use qugraph::{
    CooMatrix, EvaluationRequest, Graph, OperatorInput, PwcOperator, SliceIndex, SteadyStateMethod,
};
use serde_json::{json, Value as Json};

fn wire_json(graph: &Graph) -> Vec<Json> {
    graph
        .wire_operations()
        .into_iter()
        .map(|op| serde_json::to_value(op).unwrap())
        .collect()
}

#[test]
fn operations_encode_name_args_and_output_name() {
    let graph = Graph::new();
    graph.tensor(vec![1.0, 2.0], Some("x")).unwrap();
    let ops = wire_json(&graph);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["name"], "tensor");
    assert_eq!(ops[0]["output_name"], "x");
    assert_eq!(
        ops[0]["args"][0],
        json!({"dtype": "float64", "shape": [2], "data": [1.0, 2.0]})
    );
}

#[test]
fn stf_operations_carry_no_output_name() {
    let graph = Graph::new();
    graph.identity_stf().unwrap();
    let ops = wire_json(&graph);
    assert!(ops[0].get("output_name").is_none());
}

#[test]
fn complex_literals_split_into_real_and_imag() {
    let graph = Graph::new();
    let x = graph.tensor(vec![1.0], None).unwrap();
    graph.add(x, Complex64::new(1.0, -2.0), None).unwrap();
    let ops = wire_json(&graph);
    assert_eq!(ops[1]["args"][1], json!({"real": 1.0, "imag": -2.0}));
}

#[test]
fn node_references_use_insertion_indices() {
    let graph = Graph::new();
    let x = graph.tensor(vec![1.0], None).unwrap();
    let y = graph.tensor(vec![2.0], None).unwrap();
    graph.add(x, y, Some("sum")).unwrap();
    let ops = wire_json(&graph);
    assert_eq!(ops[2]["args"][0], json!({"node": 0}));
    assert_eq!(ops[2]["args"][1], json!({"node": 1}));
}

#[test]
fn slices_encode_their_bounds() {
    let graph = Graph::new();
    let x = graph.tensor(vec![1.0, 2.0, 3.0], None).unwrap();
    graph
        .getitem(
            &x,
            &[SliceIndex::Slice {
                start: Some(1),
                stop: None,
                step: -1,
            }],
            None,
        )
        .unwrap();
    let ops = wire_json(&graph);
    assert_eq!(
        ops[1]["args"][1][0],
        json!({"slice": {"start": 1, "stop": null, "step": -1}})
    );
}

#[test]
fn enums_serialize_as_string_tags() {
    let graph = Graph::new();
    let hamiltonian = graph
        .constant_pwc_operator(1.0, ndarray::Array2::<f64>::eye(2), None)
        .unwrap();
    let collapse: qugraph::ArrayLiteral = ndarray::Array2::<f64>::eye(2).into();
    let collapse = OperatorInput::from(collapse);
    graph
        .steady_state(
            PwcOperator::Dense(hamiltonian),
            vec![(1.0, collapse)],
            SteadyStateMethod::EigenDense,
            Some("rho"),
        )
        .unwrap();
    let ops = wire_json(&graph);
    let last = ops.last().unwrap();
    assert_eq!(last["name"], "steady_state");
    assert!(last["args"]
        .as_array()
        .unwrap()
        .iter()
        .any(|arg| arg.as_str() == Some("EIGEN_DENSE")));
}

#[test]
fn sparse_operators_encode_as_coo_triples() {
    let graph = Graph::new();
    let matrix = CooMatrix::new([2, 2], &[(0, 1, Complex64::new(0.0, 1.0))]).unwrap();
    graph.constant_sparse_pwc_operator(1.0, matrix).unwrap();
    let ops = wire_json(&graph);
    let arg = &ops[0]["args"][1];
    assert_eq!(arg["shape"], json!([2, 2]));
    assert_eq!(arg["row"], json!([0]));
    assert_eq!(arg["col"], json!([1]));
    assert_eq!(arg["imag"], json!([1.0]));
}

#[test]
fn requests_round_trip_isomorphically() {
    let graph = Graph::new();
    let x = graph.tensor(vec![1.0, 2.0], Some("x")).unwrap();
    let y = graph.tensor(vec![3.0, 4.0], None).unwrap();
    graph.add(x, y, Some("sum")).unwrap();
    let request = EvaluationRequest {
        operations: graph.wire_operations(),
        outputs: vec!["sum".to_owned()],
        cost: None,
        seed: Some(17),
    };
    let encoded = serde_json::to_string(&request).unwrap();
    let decoded: EvaluationRequest = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.outputs, request.outputs);
    assert_eq!(decoded.cost, None);
    assert_eq!(decoded.seed, Some(17));
    assert_eq!(decoded.operations.len(), request.operations.len());
    for (left, right) in decoded.operations.iter().zip(&request.operations) {
        assert_eq!(left.name, right.name);
        assert_eq!(left.output_name, right.output_name);
        assert_eq!(left.args, right.args);
    }
}

#[test]
fn absent_cost_and_seed_are_omitted_from_the_payload() {
    let request = EvaluationRequest {
        operations: vec![],
        outputs: vec!["x".to_owned()],
        cost: None,
        seed: None,
    };
    let encoded = serde_json::to_value(&request).unwrap();
    assert!(encoded.get("cost").is_none());
    assert!(encoded.get("seed").is_none());
}

#[test]
fn operation_order_is_dependency_order() {
    let graph = Graph::new();
    let x = graph.tensor(vec![1.0], None).unwrap();
    let doubled = graph.mul(x, 2.0, None).unwrap().into_tensor().unwrap();
    graph.sum(doubled, None, false, Some("total")).unwrap();
    let ops = graph.wire_operations();
    assert_eq!(
        ops.iter().map(|op| op.name.as_str()).collect::<Vec<_>>(),
        vec!["tensor", "mul", "sum"]
    );
}
