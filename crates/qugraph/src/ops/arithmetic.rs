//! Elementwise binary arithmetic.
//!
//! All factories accept any mix of numbers, literal arrays, tensors, and
//! time-dependent functions, subject to the kind-mixing rules of
//! [`flexible_binary`](super::flexible_binary). Value shapes broadcast by
//! NumPy rules.

use crate::error::{ensure, ErrorCode, GraphResult};
use crate::graph::Graph;
use crate::node::{NodeValue, Value};
use crate::ops::flexible_binary;
use crate::shape::{validate_broadcast, Dims};

fn broadcast_values(x: &[usize], y: &[usize]) -> GraphResult<Dims> {
    validate_broadcast(x, y, "x", "y")
}

macro_rules! broadcast_binary {
    ($(#[$doc:meta])* $factory:ident, $op:literal) => {
        $(#[$doc])*
        pub fn $factory(
            &self,
            x: impl Into<Value>,
            y: impl Into<Value>,
            name: Option<&str>,
        ) -> GraphResult<NodeValue> {
            flexible_binary(self, $op, x.into(), y.into(), name, broadcast_values)
        }
    };
}

impl Graph {
    broadcast_binary! {
        /// Adds two values elementwise.
        add, "add"
    }

    broadcast_binary! {
        /// Subtracts one value from another elementwise.
        sub, "sub"
    }

    broadcast_binary! {
        /// Multiplies two values elementwise.
        mul, "mul"
    }

    /// Divides one value by another elementwise. A literal zero divisor
    /// is rejected at construction.
    pub fn truediv(
        &self,
        x: impl Into<Value>,
        y: impl Into<Value>,
        name: Option<&str>,
    ) -> GraphResult<NodeValue> {
        let y = y.into();
        ensure!(
            !y.is_literal_zero(),
            ErrorCode::InvalidValue,
            "the divisor of truediv must not be zero"
        );
        flexible_binary(self, "truediv", x.into(), y, name, broadcast_values)
    }

    /// Elementwise floor division. Both operands must be real.
    pub fn floordiv(
        &self,
        x: impl Into<Value>,
        y: impl Into<Value>,
        name: Option<&str>,
    ) -> GraphResult<NodeValue> {
        let x = x.into();
        let y = y.into();
        ensure!(
            !x.is_complex_literal() && !y.is_complex_literal(),
            ErrorCode::InvalidDtype,
            "the operands of floordiv must be real-valued"
        );
        ensure!(
            !y.is_literal_zero(),
            ErrorCode::InvalidValue,
            "the divisor of floordiv must not be zero"
        );
        flexible_binary(self, "floordiv", x, y, name, broadcast_values)
    }

    /// Raises one value to the power of another elementwise. `0 ** 0` is
    /// undefined and rejected when both operands are literal.
    pub fn pow(
        &self,
        x: impl Into<Value>,
        y: impl Into<Value>,
        name: Option<&str>,
    ) -> GraphResult<NodeValue> {
        let x = x.into();
        let y = y.into();
        ensure!(
            !(x.is_literal_zero() && y.is_literal_zero()),
            ErrorCode::UndefinedOperation,
            "0 raised to the power 0 is undefined"
        );
        flexible_binary(self, "pow", x, y, name, broadcast_values)
    }

    /// Builds a complex value from real and imaginary parts. Both parts
    /// must be real.
    pub fn complex_value(
        &self,
        re: impl Into<Value>,
        im: impl Into<Value>,
        name: Option<&str>,
    ) -> GraphResult<NodeValue> {
        let re = re.into();
        let im = im.into();
        ensure!(
            !re.is_complex_literal() && !im.is_complex_literal(),
            ErrorCode::InvalidDtype,
            "the parts of complex_value must be real-valued"
        );
        flexible_binary(self, "complex_value", re, im, name, broadcast_values)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorCode;
    use crate::graph::Graph;
    use crate::node::NodeValue;

    #[test]
    fn tensors_with_tensors_give_tensors() {
        let graph = Graph::new();
        let x = graph.tensor(vec![1.0, 2.0, 3.0], Some("x")).unwrap();
        let y = graph.tensor(vec![4.0, 5.0, 6.0], None).unwrap();
        let out = graph.add(x, y, Some("sum")).unwrap();
        match out {
            NodeValue::Tensor(t) => {
                assert_eq!(t.shape(), &[3]);
                assert_eq!(t.name(), "sum");
            }
            other => panic!("expected a tensor, got {}", other.kind_name()),
        }
    }

    #[test]
    fn scalar_broadcasts_against_pwc_values() {
        let graph = Graph::new();
        let signal = graph
            .pwc_signal(vec![1.0, 2.0, 3.0], 1.0, None)
            .unwrap();
        let shifted = graph.add(signal, 0.5, None).unwrap();
        let pwc = shifted.into_pwc().unwrap();
        assert_eq!(pwc.durations().len(), 3);
        assert!(pwc.value_shape().is_empty());
    }

    #[test]
    fn zero_to_the_zero_is_rejected() {
        let graph = Graph::new();
        let err = graph.pow(0.0, 0.0, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::UndefinedOperation);
    }

    #[test]
    fn division_by_literal_zero_is_rejected() {
        let graph = Graph::new();
        let x = graph.tensor(vec![1.0], None).unwrap();
        let err = graph.truediv(x, 0.0, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }

    #[test]
    fn incompatible_shapes_are_rejected() {
        let graph = Graph::new();
        let x = graph.tensor(vec![1.0, 2.0], None).unwrap();
        let y = graph.tensor(vec![1.0, 2.0, 3.0], None).unwrap();
        let err = graph.add(x, y, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::NonBroadcastable);
    }
}
