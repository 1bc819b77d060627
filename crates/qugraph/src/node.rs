//! Value-kind handles returned by the operation factories.
//!
//! Handles are cheap clones carrying the owning [`Graph`], the node id,
//! and the structural metadata computed at construction. Arithmetic
//! operators delegate to the named graph factories; the operators panic
//! on invalid operands while the factories return `Result`, so callers
//! can pick either style.

use std::rc::Rc;

use ndarray::{Array1, Array2, ArrayD};
use num_complex::Complex64;

use crate::error::GraphResult;
use crate::graph::{Argument, Graph, NodeId};
use crate::literal::ArrayLiteral;
use crate::shape::Dims;

/// A symbolic tensor node.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
    pub(crate) shape: Dims,
    pub(crate) name: String,
}

impl Tensor {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The node name used to fetch this tensor from evaluation results.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

/// A piecewise-constant tensor-valued function of time.
#[derive(Debug, Clone)]
pub struct Pwc {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
    pub(crate) value_shape: Dims,
    pub(crate) batch_shape: Dims,
    pub(crate) durations: Rc<[f64]>,
    pub(crate) name: String,
}

impl Pwc {
    pub fn value_shape(&self) -> &[usize] {
        &self.value_shape
    }

    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn segment_count(&self) -> usize {
        self.durations.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

/// A sampleable tensor-valued function of time. Never nameable and never
/// fetchable as a value.
#[derive(Debug, Clone)]
pub struct Stf {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
    pub(crate) value_shape: Dims,
    pub(crate) batch_shape: Dims,
}

impl Stf {
    pub fn value_shape(&self) -> &[usize] {
        &self.value_shape
    }

    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

/// A sparse-backed piecewise-constant operator. Never batched.
#[derive(Debug, Clone)]
pub struct SparsePwc {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
    pub(crate) value_shape: Dims,
    pub(crate) durations: Rc<[f64]>,
}

impl SparsePwc {
    pub fn value_shape(&self) -> &[usize] {
        &self.value_shape
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

/// An opaque convolution kernel, consumed only by `convolve_pwc`.
#[derive(Debug, Clone)]
pub struct ConvolutionKernel {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
}

impl ConvolutionKernel {
    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

/// A target gate for infidelity operations.
#[derive(Debug, Clone)]
pub struct Target {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
    pub(crate) value_shape: Dims,
}

impl Target {
    pub fn value_shape(&self) -> &[usize] {
        &self.value_shape
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

/// The frequency-domain susceptibility of a controlled system to a noise
/// operator.
#[derive(Debug, Clone)]
pub struct FilterFunction {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
    pub(crate) frequencies: Rc<[f64]>,
    pub(crate) exact: bool,
    pub(crate) name: String,
}

impl FilterFunction {
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Whether the exact (un-sampled) method was requested.
    pub fn exact(&self) -> bool {
        self.exact
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

/// A fixed-length list of tensors produced by a single operation.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub(crate) graph: Graph,
    pub(crate) id: NodeId,
    pub(crate) item_shapes: Rc<Vec<Dims>>,
    pub(crate) name: String,
}

impl Sequence {
    pub fn len(&self) -> usize {
        self.item_shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_shapes.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

/// Flexible operand of the arithmetic factories: a literal number or
/// array, or any time-capable node kind.
#[derive(Debug, Clone)]
pub enum Value {
    Real(f64),
    Complex(Complex64),
    Array(ArrayLiteral),
    Tensor(Tensor),
    Pwc(Pwc),
    Stf(Stf),
}

impl Value {
    pub(crate) fn argument(&self) -> Argument {
        match self {
            Value::Real(v) => Argument::Float(*v),
            Value::Complex(v) => Argument::Complex(*v),
            Value::Array(v) => Argument::Array(v.clone()),
            Value::Tensor(v) => Argument::Node(v.id),
            Value::Pwc(v) => Argument::Node(v.id),
            Value::Stf(v) => Argument::Node(v.id),
        }
    }

    /// Whether the operand is a literal (not a graph node) equal to zero.
    pub(crate) fn is_literal_zero(&self) -> bool {
        match self {
            Value::Real(v) => *v == 0.0,
            Value::Complex(v) => v.norm_sqr() == 0.0,
            Value::Array(v) => v.is_all_zero(),
            _ => false,
        }
    }

    pub(crate) fn is_complex_literal(&self) -> bool {
        matches!(self, Value::Complex(_))
            || matches!(self, Value::Array(a) if a.is_complex())
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),+ $(,)?) => {
        $(impl From<$source> for Value {
            fn from(value: $source) -> Self {
                Value::$variant(value)
            }
        })+
    };
}

value_from! {
    f64 => Real,
    Complex64 => Complex,
    ArrayLiteral => Array,
    Tensor => Tensor,
    Pwc => Pwc,
    Stf => Stf,
}

impl From<ArrayD<f64>> for Value {
    fn from(value: ArrayD<f64>) -> Self {
        Value::Array(value.into())
    }
}

impl From<ArrayD<Complex64>> for Value {
    fn from(value: ArrayD<Complex64>) -> Self {
        Value::Array(value.into())
    }
}

impl From<Array1<f64>> for Value {
    fn from(value: Array1<f64>) -> Self {
        Value::Array(value.into())
    }
}

impl From<Array2<f64>> for Value {
    fn from(value: Array2<f64>) -> Self {
        Value::Array(value.into())
    }
}

impl From<Array2<Complex64>> for Value {
    fn from(value: Array2<Complex64>) -> Self {
        Value::Array(value.into())
    }
}

impl From<&Tensor> for Value {
    fn from(value: &Tensor) -> Self {
        Value::Tensor(value.clone())
    }
}

impl From<&Pwc> for Value {
    fn from(value: &Pwc) -> Self {
        Value::Pwc(value.clone())
    }
}

impl From<&Stf> for Value {
    fn from(value: &Stf) -> Self {
        Value::Stf(value.clone())
    }
}

/// Operand of factories that take a literal array or a tensor node.
/// Scalars are rank-0 and rejected wherever a rank check applies.
#[derive(Debug, Clone)]
pub enum TensorLike {
    Real(f64),
    Complex(Complex64),
    Array(ArrayLiteral),
    Tensor(Tensor),
}

impl TensorLike {
    pub(crate) fn shape(&self) -> Dims {
        match self {
            TensorLike::Real(_) | TensorLike::Complex(_) => Dims::new(),
            TensorLike::Array(a) => Dims::from_slice(a.shape()),
            TensorLike::Tensor(t) => t.shape.clone(),
        }
    }

    pub(crate) fn argument(&self) -> Argument {
        match self {
            TensorLike::Real(v) => Argument::Float(*v),
            TensorLike::Complex(v) => Argument::Complex(*v),
            TensorLike::Array(a) => Argument::Array(a.clone()),
            TensorLike::Tensor(t) => Argument::Node(t.id),
        }
    }

    /// The literal payload, when the operand is not a graph node.
    pub(crate) fn literal(&self) -> Option<ArrayLiteral> {
        match self {
            TensorLike::Real(v) => Some(ArrayLiteral::scalar(*v)),
            TensorLike::Complex(v) => Some((*v).into()),
            TensorLike::Array(a) => Some(a.clone()),
            TensorLike::Tensor(_) => None,
        }
    }
}

macro_rules! tensor_like_from {
    ($($source:ty => $variant:ident),+ $(,)?) => {
        $(impl From<$source> for TensorLike {
            fn from(value: $source) -> Self {
                TensorLike::$variant(value)
            }
        })+
    };
}

tensor_like_from! {
    f64 => Real,
    Complex64 => Complex,
    ArrayLiteral => Array,
    Tensor => Tensor,
}

impl From<ArrayD<f64>> for TensorLike {
    fn from(value: ArrayD<f64>) -> Self {
        TensorLike::Array(value.into())
    }
}

impl From<ArrayD<Complex64>> for TensorLike {
    fn from(value: ArrayD<Complex64>) -> Self {
        TensorLike::Array(value.into())
    }
}

impl From<Array1<f64>> for TensorLike {
    fn from(value: Array1<f64>) -> Self {
        TensorLike::Array(value.into())
    }
}

impl From<Array2<f64>> for TensorLike {
    fn from(value: Array2<f64>) -> Self {
        TensorLike::Array(value.into())
    }
}

impl From<Array2<Complex64>> for TensorLike {
    fn from(value: Array2<Complex64>) -> Self {
        TensorLike::Array(value.into())
    }
}

impl From<Vec<f64>> for TensorLike {
    fn from(value: Vec<f64>) -> Self {
        TensorLike::Array(value.into())
    }
}

impl From<&Tensor> for TensorLike {
    fn from(value: &Tensor) -> Self {
        TensorLike::Tensor(value.clone())
    }
}

/// Result of a factory whose output kind follows its operands.
#[derive(Debug, Clone)]
pub enum NodeValue {
    Tensor(Tensor),
    Pwc(Pwc),
    Stf(Stf),
}

impl NodeValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeValue::Tensor(_) => "Tensor",
            NodeValue::Pwc(_) => "Pwc",
            NodeValue::Stf(_) => "Stf",
        }
    }

    pub fn into_tensor(self) -> Option<Tensor> {
        match self {
            NodeValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_pwc(self) -> Option<Pwc> {
        match self {
            NodeValue::Pwc(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_stf(self) -> Option<Stf> {
        match self {
            NodeValue::Stf(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn expect_tensor(self, op: &str) -> Tensor {
        match self {
            NodeValue::Tensor(t) => t,
            other => panic!("graph op {op} returned a {}", other.kind_name()),
        }
    }

    pub(crate) fn expect_pwc(self, op: &str) -> Pwc {
        match self {
            NodeValue::Pwc(p) => p,
            other => panic!("graph op {op} returned a {}", other.kind_name()),
        }
    }

    pub(crate) fn expect_stf(self, op: &str) -> Stf {
        match self {
            NodeValue::Stf(s) => s,
            other => panic!("graph op {op} returned a {}", other.kind_name()),
        }
    }
}

pub(crate) fn unwrap_node<T>(result: GraphResult<T>, op: &str) -> T {
    result.unwrap_or_else(|err| panic!("graph op {op} failed: {err}"))
}

// Operator overloads. The disallowed Pwc ↔ Stf combinations are simply
// not implemented, so mixing them is a compile error rather than a
// runtime one; the factories still reject it for dynamically chosen
// operands.

macro_rules! lhs_graph_op {
    ($trait:ident, $method:ident, $factory:ident, $lhs:ty, $rhs:ty, $out:ty, $expect:ident) => {
        impl std::ops::$trait<$rhs> for $lhs {
            type Output = $out;
            fn $method(self, rhs: $rhs) -> $out {
                let graph = self.graph.clone();
                unwrap_node(graph.$factory(self, rhs, None), stringify!($factory))
                    .$expect(stringify!($factory))
            }
        }
    };
}

macro_rules! rhs_graph_op {
    ($trait:ident, $method:ident, $factory:ident, $lhs:ty, $rhs:ty, $out:ty, $expect:ident) => {
        impl std::ops::$trait<$rhs> for $lhs {
            type Output = $out;
            fn $method(self, rhs: $rhs) -> $out {
                let graph = rhs.graph.clone();
                unwrap_node(graph.$factory(self, rhs, None), stringify!($factory))
                    .$expect(stringify!($factory))
            }
        }
    };
}

macro_rules! arithmetic_ops {
    ($($trait:ident, $method:ident, $factory:ident);+ $(;)?) => {
        $(
            lhs_graph_op!($trait, $method, $factory, Tensor, Tensor, Tensor, expect_tensor);
            lhs_graph_op!($trait, $method, $factory, Tensor, Pwc, Pwc, expect_pwc);
            lhs_graph_op!($trait, $method, $factory, Pwc, Tensor, Pwc, expect_pwc);
            lhs_graph_op!($trait, $method, $factory, Pwc, Pwc, Pwc, expect_pwc);
            lhs_graph_op!($trait, $method, $factory, Tensor, Stf, Stf, expect_stf);
            lhs_graph_op!($trait, $method, $factory, Stf, Tensor, Stf, expect_stf);
            lhs_graph_op!($trait, $method, $factory, Stf, Stf, Stf, expect_stf);
            lhs_graph_op!($trait, $method, $factory, Tensor, f64, Tensor, expect_tensor);
            lhs_graph_op!($trait, $method, $factory, Pwc, f64, Pwc, expect_pwc);
            lhs_graph_op!($trait, $method, $factory, Stf, f64, Stf, expect_stf);
            lhs_graph_op!($trait, $method, $factory, Tensor, Complex64, Tensor, expect_tensor);
            lhs_graph_op!($trait, $method, $factory, Pwc, Complex64, Pwc, expect_pwc);
            lhs_graph_op!($trait, $method, $factory, Stf, Complex64, Stf, expect_stf);
            rhs_graph_op!($trait, $method, $factory, f64, Tensor, Tensor, expect_tensor);
            rhs_graph_op!($trait, $method, $factory, f64, Pwc, Pwc, expect_pwc);
            rhs_graph_op!($trait, $method, $factory, f64, Stf, Stf, expect_stf);
            rhs_graph_op!($trait, $method, $factory, Complex64, Tensor, Tensor, expect_tensor);
            rhs_graph_op!($trait, $method, $factory, Complex64, Pwc, Pwc, expect_pwc);
            rhs_graph_op!($trait, $method, $factory, Complex64, Stf, Stf, expect_stf);
        )+
    };
}

arithmetic_ops! {
    Add, add, add;
    Sub, sub, sub;
    Mul, mul, mul;
    Div, div, truediv;
}

impl std::ops::Neg for Tensor {
    type Output = Tensor;
    fn neg(self) -> Tensor {
        let graph = self.graph.clone();
        unwrap_node(graph.neg(self, None), "neg").expect_tensor("neg")
    }
}

impl std::ops::Neg for Pwc {
    type Output = Pwc;
    fn neg(self) -> Pwc {
        let graph = self.graph.clone();
        unwrap_node(graph.neg(self, None), "neg").expect_pwc("neg")
    }
}

impl std::ops::Neg for Stf {
    type Output = Stf;
    fn neg(self) -> Stf {
        let graph = self.graph.clone();
        unwrap_node(graph.neg(self, None), "neg").expect_stf("neg")
    }
}
