//! Elementwise unary math.
//!
//! Every factory preserves the operand's kind and shape: tensors give
//! tensors, Pwc and Stf operands keep their durations and batch shapes.

use crate::error::GraphResult;
use crate::graph::Graph;
use crate::node::{NodeValue, Value};
use crate::ops::flexible_unary;
use crate::shape::dims;

macro_rules! elementwise_unary {
    ($($(#[$doc:meta])* $factory:ident, $op:literal;)+) => {
        impl Graph {
            $(
                $(#[$doc])*
                pub fn $factory(
                    &self,
                    x: impl Into<Value>,
                    name: Option<&str>,
                ) -> GraphResult<NodeValue> {
                    flexible_unary(self, $op, x.into(), name, |shape| Ok(dims(shape)))
                }
            )+
        }
    };
}

elementwise_unary! {
    /// Negates a value elementwise.
    neg, "neg";
    /// Elementwise absolute value (modulus for complex values).
    abs, "abs";
    /// Elementwise argument of a complex value, in radians.
    angle, "angle";
    /// Elementwise real part.
    real, "real";
    /// Elementwise imaginary part.
    imag, "imag";
    /// Elementwise complex conjugate.
    conjugate, "conjugate";
    /// Elementwise square root.
    sqrt, "sqrt";
    /// Elementwise sine.
    sin, "sin";
    /// Elementwise cosine.
    cos, "cos";
    /// Elementwise tangent.
    tan, "tan";
    /// Elementwise hyperbolic sine.
    sinh, "sinh";
    /// Elementwise hyperbolic cosine.
    cosh, "cosh";
    /// Elementwise hyperbolic tangent.
    tanh, "tanh";
    /// Elementwise natural logarithm.
    log, "log";
    /// Elementwise exponential.
    exp, "exp";
    /// Elementwise inverse sine.
    arcsin, "arcsin";
    /// Elementwise inverse cosine.
    arccos, "arccos";
    /// Elementwise inverse tangent.
    arctan, "arctan";
}
