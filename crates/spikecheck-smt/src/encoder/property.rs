//! "Prediction changes" property over output spike counts.

use spikecheck_ir::network::argmax_lowest;

use super::variables::{NeuronIdx, SymbolTable};
use super::{ConstraintSet, EncodeError};
use crate::solver::Model;
use crate::terms::SmtTerm;

/// Scale applied to both sides of every spike-count comparison.
pub const SPIKE_COUNT_WEIGHT: i64 = 2;

/// `Σ_{k=1..T} ite(S[node, L-1, k], 1, 0)` as an Int term.
fn output_count(symbols: &SymbolTable, node: usize) -> SmtTerm {
    let layer = symbols.output_layer();
    SmtTerm::sum(
        (1..=symbols.num_steps()).map(|step| symbols.spike(NeuronIdx::new(node, layer, step)).count_term()),
        SmtTerm::int(0),
    )
}

/// Predicted class of the control run: the output neuron with the most
/// spikes, lowest index on ties.
pub fn label_from_model(symbols: &SymbolTable, model: &Model) -> Result<usize, EncodeError> {
    let layer = symbols.output_layer();
    let mut counts = vec![0u32; symbols.width(layer)];
    for (node, count) in counts.iter_mut().enumerate() {
        for step in 1..=symbols.num_steps() {
            let spike = symbols.spike(NeuronIdx::new(node, layer, step));
            match model.get_bool(spike.name()) {
                Some(true) => *count += 1,
                Some(false) => {}
                None => return Err(EncodeError::MissingOutputSpike(spike.name().to_string())),
            }
        }
    }
    Ok(argmax_lowest(&counts))
}

/// Some other output neuron spikes at least as often as `label`.
///
/// Ties count as a change. With a single output neuron no other class
/// exists and the property is `false`.
pub fn encode_class_change(symbols: &SymbolTable, label: usize) -> Result<ConstraintSet, EncodeError> {
    let outputs = symbols.width(symbols.output_layer());
    if label >= outputs {
        return Err(EncodeError::LabelOutOfRange { label, outputs });
    }

    let weighted = |node| SmtTerm::int(SPIKE_COUNT_WEIGHT).mul(output_count(symbols, node));
    let mut alternatives: Vec<SmtTerm> = (0..outputs)
        .filter(|node| *node != label)
        .map(|node| weighted(label).gt(weighted(node)).not())
        .collect();

    let property = match alternatives.len() {
        0 => SmtTerm::bool(false),
        1 => alternatives.remove(0),
        _ => SmtTerm::or(alternatives),
    };
    Ok(std::iter::once(property).collect())
}
