//! Late-bound toolkit namespaces.
//!
//! A toolkit is a named collection of convenience factories that compose
//! core graph operations. Toolkits bind to a graph on demand through
//! [`Graph::toolkit`], so the same toolkit can appear under several
//! namespaces without import cycles, and a toolkit only ever uses the
//! public factory surface.

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::error::GraphResult;
use crate::graph::Graph;
use crate::node::Pwc;

/// A namespace of composed factories that can bind to any graph.
pub trait Toolkit {
    const NAME: &'static str;

    fn bind(graph: &Graph) -> Self;
}

static REGISTRY: Lazy<RwLock<BTreeSet<&'static str>>> =
    Lazy::new(|| RwLock::new(BTreeSet::from([UtilsToolkit::NAME])));

/// Announces a toolkit name so callers can discover it.
pub fn register<T: Toolkit>() {
    REGISTRY
        .write()
        .expect("toolkit registry poisoned")
        .insert(T::NAME);
}

/// Names of every registered toolkit, in lexical order.
pub fn registered_toolkits() -> Vec<&'static str> {
    REGISTRY
        .read()
        .expect("toolkit registry poisoned")
        .iter()
        .copied()
        .collect()
}

impl Graph {
    /// Binds a toolkit namespace to this graph.
    pub fn toolkit<T: Toolkit>(&self) -> T {
        T::bind(self)
    }

    /// The built-in `utils` toolkit.
    pub fn utils(&self) -> UtilsToolkit {
        self.toolkit()
    }
}

/// Signal-building conveniences layered over the core factories.
pub struct UtilsToolkit {
    graph: Graph,
}

impl Toolkit for UtilsToolkit {
    const NAME: &'static str = "utils";

    fn bind(graph: &Graph) -> Self {
        UtilsToolkit {
            graph: graph.clone(),
        }
    }
}

impl UtilsToolkit {
    /// A real optimizable signal of equal segments, bounded per segment.
    pub fn optimizable_pwc_signal(
        &self,
        segment_count: i64,
        duration: f64,
        minimum: f64,
        maximum: f64,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        let values = self.graph.optimization_variable(
            segment_count,
            minimum,
            maximum,
            false,
            false,
            None,
            None,
        )?;
        self.graph.pwc_signal(values, duration, name)
    }

    /// A complex optimizable signal with bounded modulus and free phase.
    pub fn complex_optimizable_pwc_signal(
        &self,
        segment_count: i64,
        duration: f64,
        maximum_modulus: f64,
        name: Option<&str>,
    ) -> GraphResult<Pwc> {
        let moduli = self.graph.optimization_variable(
            segment_count,
            0.0,
            maximum_modulus,
            false,
            false,
            None,
            None,
        )?;
        let phases = self.graph.optimization_variable(
            segment_count,
            -PI,
            PI,
            true,
            true,
            None,
            None,
        )?;
        self.graph.complex_pwc_signal(moduli, phases, duration, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utils_is_registered_by_default() {
        assert!(registered_toolkits().contains(&"utils"));
    }

    #[test]
    fn optimizable_signals_compose_core_factories() {
        let graph = Graph::new();
        let signal = graph
            .utils()
            .optimizable_pwc_signal(8, 2.0, -1.0, 1.0, Some("drive"))
            .unwrap();
        assert_eq!(signal.durations().len(), 8);
        assert!(signal.value_shape().is_empty());
        // The underlying variable plus the signal node.
        assert_eq!(graph.operation_count(), 2);
    }

    #[test]
    fn complex_signals_bound_the_modulus() {
        let graph = Graph::new();
        let signal = graph
            .utils()
            .complex_optimizable_pwc_signal(4, 1.0, 0.5, None)
            .unwrap();
        assert_eq!(signal.durations(), &[0.25, 0.25, 0.25, 0.25]);
    }
}
