//! End-to-end construction scenarios across the operation catalog.

use ndarray::{array, Array2, ArrayD, IxDyn};
use qugraph::{
    CooMatrix, ErrorCode, Graph, OperatorInput, Pwc, PwcOperator, SteadyStateMethod,
};

fn qubit_hamiltonian(graph: &Graph) -> Pwc {
    let values = ArrayD::from_shape_vec(
        IxDyn(&[2, 2, 2]),
        vec![1.0, 0.0, 0.0, -1.0, -1.0, 0.0, 0.0, 1.0],
    )
    .unwrap();
    graph.pwc(&[0.1, 0.1], values, 0, None).unwrap()
}

#[test]
fn single_qubit_identity_evolution_builds_a_scalar_infidelity() {
    let graph = Graph::new();
    let hamiltonian = qubit_hamiltonian(&graph);
    let target = graph.target(Array2::<f64>::eye(2), None).unwrap();
    let infidelity = graph
        .infidelity_pwc(&hamiltonian, &target, vec![], Some("infidelity"))
        .unwrap();
    assert!(infidelity.shape().is_empty());
}

#[test]
fn pauli_x_infidelity_of_a_matching_unitary() {
    let graph = Graph::new();
    let theta = std::f64::consts::FRAC_PI_2;
    let unitary = array![
        [theta.cos(), theta.sin()],
        [theta.sin(), -theta.cos()]
    ];
    let x = graph.pauli_matrix('X', None).unwrap();
    let infidelity = graph.unitary_infidelity(unitary, &x, None).unwrap();
    assert!(infidelity.shape().is_empty());
}

#[test]
fn pauli_z_embeds_into_a_composite_space() {
    let graph = Graph::new();
    let z = graph.pauli_matrix('Z', None).unwrap();
    let embedded = graph
        .embed_operators(vec![((&z).into(), 0)], &[2, 3], None)
        .unwrap();
    assert_eq!(embedded.shape(), &[6, 6]);
}

#[test]
fn sampled_filter_functions_carry_an_uncertainty_channel() {
    let graph = Graph::new();
    let signal = graph.pwc_signal(vec![1.0, 0.5], 1.0, None).unwrap();
    let hamiltonian = graph
        .pwc_operator(&signal, Array2::<f64>::eye(2), None)
        .unwrap();
    let noise = graph
        .constant_pwc_operator(1.0, array![[1.0, 0.0], [0.0, -1.0]], None)
        .unwrap();
    let frequencies = [0.0, 0.5, 1.0];
    let ff = graph
        .filter_function(&hamiltonian, &noise, &frequencies, Some(100), None, None)
        .unwrap();
    assert_eq!(ff.frequencies(), &frequencies);
    assert!(!ff.exact());
    let uncertainties = ff.uncertainties(None).unwrap();
    assert_eq!(uncertainties.shape(), &[frequencies.len()]);
}

#[test]
fn ms_phases_form_an_ion_by_ion_matrix() {
    let graph = Graph::new();
    let drives: Vec<Pwc> = (0..3)
        .map(|_| graph.pwc_signal(vec![1.0, 2.0], 1.0, None).unwrap())
        .collect();
    let lamb_dicke = ArrayD::<f64>::zeros(IxDyn(&[3, 3, 3]));
    let detunings = ArrayD::<f64>::zeros(IxDyn(&[3, 3]));
    let phases = graph
        .ms_phases(drives, lamb_dicke.into(), detunings.into(), None, None)
        .unwrap();
    assert_eq!(phases.shape(), &[3, 3]);
}

#[test]
fn time_evolution_operators_stack_over_sample_times() {
    let graph = Graph::new();
    let hamiltonian = graph
        .constant_pwc_operator(1.0, Array2::<f64>::eye(2), None)
        .unwrap();
    let unitaries = graph
        .time_evolution_operators_pwc(&hamiltonian, &[0.0, 0.5, 1.0], None)
        .unwrap();
    assert_eq!(unitaries.shape(), &[3, 2, 2]);
}

#[test]
fn sparse_hamiltonians_disable_evolution_gradients() {
    let graph = Graph::new();
    let matrix = CooMatrix::new(
        [2, 2],
        &[(0, 1, 1.0.into()), (1, 0, 1.0.into())],
    )
    .unwrap();
    let sparse = graph.constant_sparse_pwc_operator(1.0, matrix).unwrap();
    let initial = graph.tensor(Array2::<f64>::eye(2), None).unwrap();
    let collapse: qugraph::ArrayLiteral = Array2::<f64>::eye(2).into();
    let evolved = graph
        .density_matrix_evolution_pwc(
            initial,
            PwcOperator::Sparse(sparse),
            vec![(1.0, OperatorInput::from(collapse))],
            None,
            None,
            Some("rho"),
        )
        .unwrap();
    assert_eq!(evolved.shape(), &[2, 2]);
}

#[test]
fn steady_state_validates_lindblad_rates() {
    let graph = Graph::new();
    let hamiltonian = graph
        .constant_pwc_operator(1.0, Array2::<f64>::eye(2), None)
        .unwrap();
    let collapse: qugraph::ArrayLiteral = Array2::<f64>::eye(2).into();
    let err = graph
        .steady_state(
            PwcOperator::Dense(hamiltonian),
            vec![(-1.0, OperatorInput::from(collapse))],
            SteadyStateMethod::Qr,
            None,
        )
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidValue);
}

#[test]
fn fock_space_operators_share_the_truncated_basis() {
    let graph = Graph::new();
    let creation = graph.creation_operator(5, 0, None).unwrap();
    let annihilation = graph.annihilation_operator(5, 0, None).unwrap();
    let product = graph
        .matmul(&creation, &annihilation, None)
        .unwrap()
        .into_tensor()
        .unwrap();
    let number = graph.number_operator(5, 0, None).unwrap();
    assert_eq!(product.shape(), number.shape());
}

#[test]
fn state_infidelity_broadcasts_batches() {
    let graph = Graph::new();
    let x = ArrayD::<f64>::zeros(IxDyn(&[5, 1, 4]));
    let y = ArrayD::<f64>::zeros(IxDyn(&[3, 4]));
    let infidelity = graph.state_infidelity(x, y, None).unwrap();
    assert_eq!(infidelity.shape(), &[5, 3]);
}

#[test]
fn discretized_stfs_become_equal_segment_pwcs() {
    let graph = Graph::new();
    let stf = graph.identity_stf().unwrap();
    let discrete = graph.discretize_stf(&stf, 1.0, 4, 1, None).unwrap();
    assert_eq!(discrete.durations(), &[0.25, 0.25, 0.25, 0.25]);
}

#[test]
fn convolved_signals_lose_their_segment_structure() {
    let graph = Graph::new();
    let signal = graph.pwc_signal(vec![1.0, 2.0], 1.0, None).unwrap();
    let kernel = graph.sinc_convolution_kernel(1.0).unwrap();
    let smooth = graph.convolve_pwc(&signal, &kernel).unwrap();
    assert!(smooth.value_shape().is_empty());
    let samples = graph.sample_stf(&smooth, &[0.1, 0.7], None).unwrap();
    assert_eq!(samples.shape(), &[2]);
}

#[test]
fn random_nodes_record_an_explicit_seed() {
    let graph = Graph::new();
    graph
        .random_normal(&[2], 0.0, 1.0, None, Some("noise"))
        .unwrap();
    let ops = graph.wire_operations();
    let args = serde_json::to_value(&ops[0].args).unwrap();
    // Seed resolved at construction even though the caller gave none.
    assert!(args.as_array().unwrap()[3].is_i64());
}

#[test]
fn einsum_contracts_named_axes() {
    let graph = Graph::new();
    let x = graph
        .tensor(ArrayD::<f64>::zeros(IxDyn(&[2, 3])), None)
        .unwrap();
    let y = graph
        .tensor(ArrayD::<f64>::zeros(IxDyn(&[3, 4])), None)
        .unwrap();
    let product = graph
        .einsum("ij,jk->ik", vec![(&x).into(), (&y).into()], None)
        .unwrap();
    assert_eq!(product.shape(), &[2, 4]);
    let err = graph
        .einsum("ij,jk->iq", vec![(&x).into(), (&y).into()], None)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidEinsumEquation);
}

#[test]
fn toolkit_signals_feed_the_catalog() {
    let graph = Graph::new();
    let drive = graph
        .utils()
        .optimizable_pwc_signal(4, 1.0, -1.0, 1.0, None)
        .unwrap();
    let hamiltonian = graph
        .pwc_operator(&drive, array![[0.0, 1.0], [1.0, 0.0]], None)
        .unwrap();
    let target = graph.target(Array2::<f64>::eye(2), None).unwrap();
    let infidelity = graph
        .infidelity_pwc(&hamiltonian, &target, vec![], Some("cost"))
        .unwrap();
    assert!(infidelity.shape().is_empty());
}
