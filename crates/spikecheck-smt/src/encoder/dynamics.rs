//! Leaky integrate-and-fire node equations.
//!
//! For every non-input neuron `j` of layer `l` and step `t ∈ 1..=T`:
//!
//! ```text
//! P[j,l,t] = β·P[j,l,t-1] + Σ_i ite(S[i,l-1,t], W[i,j,l-1], 0) - ite(S[j,l,t-1], θ, 0)
//! S[j,l,t] = P[j,l,t] > θ
//! ```
//!
//! Potentials are Real throughout; every `ite` in a potential expression
//! uses a Real zero so the assertions stay well-sorted in plain SMT-LIB.

use num::rational::Rational64;
use num::Zero;

use super::variables::{NeuronIdx, SymbolTable};
use super::weights::{to_rational, WeightTable};
use super::{ConstraintSet, EncodeError};
use crate::terms::SmtTerm;

/// Optional implied lemmas added on top of the node equations.
///
/// Both lemma families only mention spike symbols and are consequences of
/// the node equations when `0 ≤ β ≤ 1` and `θ ≥ 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeuronPropertyLevel {
    #[default]
    None,
    /// A neuron that was quiet at `t-1` stays quiet at `t` unless an
    /// excitatory predecessor fires at `t`.
    Direct,
    /// Firing requires the non-leaking accumulator of excitatory drive,
    /// minus past resets, to exceed the threshold.
    Global,
}

impl NeuronPropertyLevel {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::None),
            1 => Some(Self::Direct),
            2 => Some(Self::Global),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Direct => 1,
            Self::Global => 2,
        }
    }
}

fn constant(what: &'static str, value: f64) -> Result<Rational64, EncodeError> {
    to_rational(value).ok_or(EncodeError::UnrepresentableConstant { what, value })
}

/// `ite(S[idx], value, 0.0)` with a Real else-branch.
fn gated(symbols: &SymbolTable, idx: NeuronIdx, value: Rational64) -> SmtTerm {
    SmtTerm::ite(
        symbols.spike(idx).term(),
        SmtTerm::real(value),
        SmtTerm::real_zero(),
    )
}

/// Base equations for all non-input neurons at steps `1..=T`.
pub fn encode_node_equations(
    symbols: &SymbolTable,
    weights: &WeightTable,
    beta: f64,
    threshold: f64,
) -> Result<ConstraintSet, EncodeError> {
    let beta = constant("leak", beta)?;
    let theta = constant("threshold", threshold)?;
    let mut set = ConstraintSet::new();

    for layer in 1..symbols.num_layers() {
        for node in 0..symbols.width(layer) {
            let incoming = weights.incoming(node, layer - 1);
            for step in 1..=symbols.num_steps() {
                let here = NeuronIdx::new(node, layer, step);
                let prev = NeuronIdx::new(node, layer, step - 1);

                let drive = SmtTerm::sum(
                    incoming
                        .iter()
                        .map(|(in_node, w)| gated(symbols, NeuronIdx::new(*in_node, layer - 1, step), *w)),
                    SmtTerm::real_zero(),
                );
                let rhs = SmtTerm::real(beta)
                    .mul(symbols.potential(prev).term())
                    .add(drive)
                    .sub(gated(symbols, prev, theta));

                let potential = symbols.potential(here).term();
                set.assert_term(potential.clone().eq(rhs));
                set.assert_term(
                    symbols
                        .spike(here)
                        .term()
                        .eq(potential.gt(SmtTerm::real(theta))),
                );
            }
        }
    }
    Ok(set)
}

/// Quiet start: zero potential for non-input neurons, no spikes at step 0.
pub fn encode_initial_state(symbols: &SymbolTable) -> ConstraintSet {
    let mut set = ConstraintSet::new();
    for layer in 0..symbols.num_layers() {
        for node in 0..symbols.width(layer) {
            let idx = NeuronIdx::new(node, layer, 0);
            if let Some(p) = symbols.try_potential(idx) {
                set.assert_term(p.term().eq(SmtTerm::real_zero()));
            }
            set.assert_term(symbols.spike(idx).term().not());
        }
    }
    set
}

/// Implied lemmas for `level`; empty for [`NeuronPropertyLevel::None`].
pub fn encode_neuron_properties(
    level: NeuronPropertyLevel,
    symbols: &SymbolTable,
    weights: &WeightTable,
    threshold: f64,
) -> Result<ConstraintSet, EncodeError> {
    match level {
        NeuronPropertyLevel::None => Ok(ConstraintSet::new()),
        NeuronPropertyLevel::Direct => Ok(direct_properties(symbols, weights)),
        NeuronPropertyLevel::Global => {
            let theta = constant("threshold", threshold)?;
            Ok(global_properties(symbols, weights, theta))
        }
    }
}

fn direct_properties(symbols: &SymbolTable, weights: &WeightTable) -> ConstraintSet {
    let mut set = ConstraintSet::new();
    for layer in 1..symbols.num_layers() {
        for node in 0..symbols.width(layer) {
            let excitatory = weights.excitatory(node, layer - 1);
            for step in 1..=symbols.num_steps() {
                let mut quiet = Vec::with_capacity(excitatory.len() + 1);
                if step >= 2 {
                    quiet.push(symbols.spike(NeuronIdx::new(node, layer, step - 1)).term().not());
                }
                quiet.extend(
                    excitatory
                        .iter()
                        .map(|(i, _)| symbols.spike(NeuronIdx::new(*i, layer - 1, step)).term().not()),
                );
                let silent = symbols.spike(NeuronIdx::new(node, layer, step)).term().not();
                let lemma = match quiet.len() {
                    0 => silent,
                    1 => quiet.remove(0).implies(silent),
                    _ => SmtTerm::and(quiet).implies(silent),
                };
                set.assert_term(lemma);
            }
        }
    }
    set
}

fn global_properties(symbols: &SymbolTable, weights: &WeightTable, theta: Rational64) -> ConstraintSet {
    let mut set = ConstraintSet::new();
    for layer in 1..symbols.num_layers() {
        for node in 0..symbols.width(layer) {
            let excitatory = weights.excitatory(node, layer - 1);
            for step in 1..=symbols.num_steps() {
                let drive = (1..=step).flat_map(|k| {
                    excitatory
                        .iter()
                        .map(move |(i, w)| (NeuronIdx::new(*i, layer - 1, k), *w))
                });
                let accumulated = SmtTerm::sum(
                    drive.map(|(idx, w)| gated(symbols, idx, w)),
                    SmtTerm::real_zero(),
                );
                let resets = if theta.is_zero() {
                    SmtTerm::real_zero()
                } else {
                    SmtTerm::sum(
                        (1..step).map(|k| gated(symbols, NeuronIdx::new(node, layer, k), theta)),
                        SmtTerm::real_zero(),
                    )
                };
                let fires = symbols.spike(NeuronIdx::new(node, layer, step)).term();
                set.assert_term(fires.implies(accumulated.sub(resets).gt(SmtTerm::real(theta))));
            }
        }
    }
    set
}
