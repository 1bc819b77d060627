//! Duration meshing and time-domain manipulation of Pwcs.

use approx::assert_relative_eq;
use qugraph::{ErrorCode, Graph, Pwc};

fn assert_durations(pwc: &Pwc, expected: &[f64]) {
    assert_eq!(pwc.durations().len(), expected.len());
    for (&actual, &expected) in pwc.durations().iter().zip(expected) {
        assert_relative_eq!(actual, expected, max_relative = 1e-12);
    }
}

#[test]
fn arithmetic_meshes_segment_boundaries() {
    let graph = Graph::new();
    let a = graph.pwc(&[0.1, 0.3], vec![1.0, 2.0], 0, None).unwrap();
    let b = graph.pwc(&[0.2, 0.2], vec![3.0, 1.0], 0, None).unwrap();
    let sum = graph.add(&a, &b, None).unwrap().into_pwc().unwrap();
    assert_durations(&sum, &[0.1, 0.1, 0.2]);
}

#[test]
fn rounding_error_boundaries_do_not_create_degenerate_segments() {
    let graph = Graph::new();
    let a = graph.pwc(&[0.1, 0.2], vec![1.0, 2.0], 0, None).unwrap();
    let b = graph.pwc(&[0.3], vec![3.0], 0, None).unwrap();
    let sum = graph.add(&a, &b, None).unwrap().into_pwc().unwrap();
    // 0.1 + 0.2 rounds past 0.3; without tolerance the mesh would end
    // with a ~1e-17 tail segment.
    assert_durations(&sum, &[0.1, 0.2]);
}

#[test]
fn meshed_boundaries_contain_every_input_boundary() {
    let graph = Graph::new();
    let a = graph.pwc_signal(vec![1.0, 2.0], 1.0, None).unwrap();
    let b = graph.pwc(&[0.2, 0.8], vec![3.0, 4.0], 0, None).unwrap();
    let sum = graph.add(&a, &b, None).unwrap().into_pwc().unwrap();
    assert_durations(&sum, &[0.2, 0.3, 0.5]);
    let boundaries: Vec<f64> = sum
        .durations()
        .iter()
        .scan(0.0, |acc, d| {
            *acc += d;
            Some(*acc)
        })
        .collect();
    for input_boundary in [0.2, 0.5, 1.0] {
        assert!(boundaries
            .iter()
            .any(|&b| (b - input_boundary).abs() < 1e-12));
    }
}

#[test]
fn total_durations_must_agree() {
    let graph = Graph::new();
    let a = graph.pwc_signal(vec![1.0, 2.0], 1.0, None).unwrap();
    let b = graph.pwc_signal(vec![1.0, 2.0], 2.0, None).unwrap();
    let err = graph.add(&a, &b, None).unwrap_err();
    assert_eq!(err.code, ErrorCode::DurationMismatch);
}

#[test]
fn time_reverse_is_an_involution_on_durations() {
    let graph = Graph::new();
    let signal = graph.pwc(&[0.1, 0.9], vec![1.0, 2.0], 0, None).unwrap();
    let reversed = graph.time_reverse_pwc(&signal, None).unwrap();
    assert_durations(&reversed, &[0.9, 0.1]);
    let restored = graph.time_reverse_pwc(&reversed, None).unwrap();
    assert_durations(&restored, &[0.1, 0.9]);
}

#[test]
fn symmetrize_doubles_the_duration() {
    let graph = Graph::new();
    let signal = graph.pwc(&[0.25, 0.75], vec![1.0, 2.0], 0, None).unwrap();
    let symmetric = graph.symmetrize_pwc(&signal, None).unwrap();
    assert_durations(&symmetric, &[0.25, 0.75, 0.75, 0.25]);
    let total: f64 = symmetric.durations().iter().sum();
    assert_relative_eq!(total, 2.0, max_relative = 1e-12);
}

#[test]
fn time_concatenate_appends_segments() {
    let graph = Graph::new();
    let a = graph
        .constant_pwc_operator(1.0, ndarray::Array2::<f64>::eye(2), None)
        .unwrap();
    let b = graph
        .constant_pwc_operator(0.5, ndarray::Array2::<f64>::eye(2), None)
        .unwrap();
    let joined = graph.time_concatenate_pwc(vec![a.clone(), b], None).unwrap();
    assert_durations(&joined, &[1.0, 0.5]);
    assert_eq!(joined.value_shape(), a.value_shape());
}

#[test]
fn single_segment_pwcs_mesh_like_any_other() {
    let graph = Graph::new();
    let constant = graph.constant_pwc(2.0, 2.0, 0, None).unwrap();
    assert_durations(&constant, &[2.0]);
    let signal = graph.pwc_signal(vec![1.0, 3.0], 2.0, None).unwrap();
    let sum = graph.add(&constant, &signal, None).unwrap().into_pwc().unwrap();
    assert_durations(&sum, &[1.0, 1.0]);
}

#[test]
fn zero_and_negative_durations_are_rejected() {
    let graph = Graph::new();
    let err = graph.pwc_signal(vec![1.0], 0.0, None).unwrap_err();
    assert_eq!(err.code, ErrorCode::NonPositiveDuration);
    let err = graph.pwc(&[0.5, -0.5], vec![1.0, 2.0], 0, None).unwrap_err();
    assert_eq!(err.code, ErrorCode::NonPositiveDuration);
}

#[test]
fn pwc_sum_requires_matching_value_shapes() {
    let graph = Graph::new();
    let a = graph
        .constant_pwc_operator(1.0, ndarray::Array2::<f64>::eye(2), None)
        .unwrap();
    let b = graph
        .constant_pwc_operator(1.0, ndarray::Array2::<f64>::eye(3), None)
        .unwrap();
    let err = graph.pwc_sum(vec![a, b], None).unwrap_err();
    assert_eq!(err.code, ErrorCode::ShapeMismatch);
}

#[test]
fn batched_signals_keep_their_batch_through_arithmetic() {
    let graph = Graph::new();
    let values = ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[3, 4]));
    let batched = graph.pwc_signal(values, 1.0, None).unwrap();
    assert_eq!(batched.batch_shape(), &[3]);
    let scaled = graph.mul(&batched, 2.0, None).unwrap().into_pwc().unwrap();
    assert_eq!(scaled.batch_shape(), &[3]);
    assert_durations(&scaled, batched.durations());
}
