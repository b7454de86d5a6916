//! Symbolic encoding of spiking network dynamics and robustness queries.
//!
//! The encoding is split by concern:
//! - [`variables`] allocates spike and potential symbols,
//! - [`weights`] turns trained weights into exact rational constants,
//! - [`dynamics`] emits the node equations, initial state and optional
//!   neuron-property lemmas,
//! - [`perturbation`] bounds the distance of the symbolic input train from
//!   a concrete one,
//! - [`property`] states that the predicted class changes.

pub mod dynamics;
pub mod perturbation;
pub mod property;
pub mod variables;
pub mod weights;

use std::collections::HashSet;

use thiserror::Error;

use crate::backends::smtlib_printer::to_smtlib;
use crate::terms::SmtTerm;

pub use dynamics::{encode_initial_state, encode_neuron_properties, encode_node_equations, NeuronPropertyLevel};
pub use perturbation::{encode_delta_reuse, PerturbationMetric};
pub use property::{encode_class_change, label_from_model, SPIKE_COUNT_WEIGHT};
pub use variables::{NeuronIdx, PotentialVar, SpikeVar, SymbolTable};
pub use weights::WeightTable;

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("weight {value} at synapse {synapse} cannot be represented as a rational")]
    UnrepresentableWeight { synapse: String, value: f64 },
    #[error("{what} {value} cannot be represented as a rational")]
    UnrepresentableConstant { what: &'static str, value: f64 },
    #[error("spike train is {actual_steps}x{actual_width}, symbols cover {expected_steps}x{expected_width}")]
    TrainShape {
        expected_steps: usize,
        expected_width: usize,
        actual_steps: usize,
        actual_width: usize,
    },
    #[error("control model assigns {symbol} = {model_value}, concrete input has {concrete_value}")]
    ControlMismatch {
        symbol: String,
        model_value: bool,
        concrete_value: bool,
    },
    #[error("control model has no value for output spike {0}")]
    MissingOutputSpike(String),
    #[error("label {label} is out of range for {outputs} output neuron(s)")]
    LabelOutOfRange { label: usize, outputs: usize },
}

/// An ordered, de-duplicated list of assertions.
///
/// Each constraint family (node equations, initial state, perturbation,
/// property) is built as its own set and combined at the call site.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    assertions: Vec<SmtTerm>,
    keys: HashSet<String>,
    dedup_hits: usize,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert_term(&mut self, term: SmtTerm) {
        if self.keys.insert(to_smtlib(&term)) {
            self.assertions.push(term);
        } else {
            self.dedup_hits = self.dedup_hits.saturating_add(1);
        }
    }

    pub fn extend(&mut self, other: ConstraintSet) {
        for term in other.assertions {
            self.assert_term(term);
        }
    }

    pub fn assertions(&self) -> &[SmtTerm] {
        &self.assertions
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    pub fn dedup_hits(&self) -> usize {
        self.dedup_hits
    }
}

impl FromIterator<SmtTerm> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = SmtTerm>>(iter: I) -> Self {
        let mut set = ConstraintSet::new();
        for term in iter {
            set.assert_term(term);
        }
        set
    }
}
