//! Symbol allocation for spike and potential indicators.
//!
//! Naming conventions:
//! - `s_{node}_{layer}_{step}`: spike indicator (Bool), every layer
//! - `p_{node}_{layer}_{step}`: membrane potential (Real), non-input layers
//!
//! Steps run over `0..=T`; step 0 is the quiet initial state.

use std::fmt;

use indexmap::IndexMap;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// One neuron's state at one discrete timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeuronIdx {
    pub node: usize,
    pub layer: usize,
    pub step: usize,
}

impl NeuronIdx {
    pub fn new(node: usize, layer: usize, step: usize) -> Self {
        Self { node, layer, step }
    }
}

impl fmt::Display for NeuronIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.node, self.layer, self.step)
    }
}

/// Handle to a Boolean spike symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpikeVar(String);

/// Handle to a Real potential symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PotentialVar(String);

impl SpikeVar {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn term(&self) -> SmtTerm {
        SmtTerm::var(self.0.as_str())
    }

    /// `1` when the neuron fires, `0` otherwise (Int sort).
    pub fn count_term(&self) -> SmtTerm {
        SmtTerm::ite(self.term(), SmtTerm::int(1), SmtTerm::int(0))
    }
}

impl PotentialVar {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn term(&self) -> SmtTerm {
        SmtTerm::var(self.0.as_str())
    }
}

pub(crate) fn spike_name(idx: NeuronIdx) -> String {
    format!("s_{}_{}_{}", idx.node, idx.layer, idx.step)
}

pub(crate) fn potential_name(idx: NeuronIdx) -> String {
    format!("p_{}_{}_{}", idx.node, idx.layer, idx.step)
}

/// Every spike and potential symbol of one run, keyed by neuron index.
///
/// Built once and shared read-only by all queries of the run.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    layers: Vec<usize>,
    num_steps: usize,
    spikes: IndexMap<NeuronIdx, SpikeVar>,
    potentials: IndexMap<NeuronIdx, PotentialVar>,
}

impl SymbolTable {
    pub fn new(layers: &[usize], num_steps: usize) -> Self {
        let mut spikes = IndexMap::new();
        let mut potentials = IndexMap::new();
        for (layer, width) in layers.iter().enumerate() {
            for step in 0..=num_steps {
                for node in 0..*width {
                    let idx = NeuronIdx::new(node, layer, step);
                    spikes.insert(idx, SpikeVar(spike_name(idx)));
                    if layer > 0 {
                        potentials.insert(idx, PotentialVar(potential_name(idx)));
                    }
                }
            }
        }
        Self {
            layers: layers.to_vec(),
            num_steps,
            spikes,
            potentials,
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn width(&self, layer: usize) -> usize {
        self.layers[layer]
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn output_layer(&self) -> usize {
        self.layers.len() - 1
    }

    pub fn try_spike(&self, idx: NeuronIdx) -> Option<&SpikeVar> {
        self.spikes.get(&idx)
    }

    pub fn try_potential(&self, idx: NeuronIdx) -> Option<&PotentialVar> {
        self.potentials.get(&idx)
    }

    /// Spike symbol at `idx`.
    ///
    /// # Panics
    /// If `idx` is outside the allocated index space.
    pub fn spike(&self, idx: NeuronIdx) -> &SpikeVar {
        match self.spikes.get(&idx) {
            Some(var) => var,
            None => panic!("no spike symbol allocated for neuron {idx}"),
        }
    }

    /// Potential symbol at `idx`.
    ///
    /// # Panics
    /// If `idx` is outside the allocated index space or on the input layer.
    pub fn potential(&self, idx: NeuronIdx) -> &PotentialVar {
        match self.potentials.get(&idx) {
            Some(var) => var,
            None => panic!("no potential symbol allocated for neuron {idx}"),
        }
    }

    pub fn spikes(&self) -> impl Iterator<Item = (&NeuronIdx, &SpikeVar)> {
        self.spikes.iter()
    }

    pub fn potentials(&self) -> impl Iterator<Item = (&NeuronIdx, &PotentialVar)> {
        self.potentials.iter()
    }

    pub fn num_spikes(&self) -> usize {
        self.spikes.len()
    }

    pub fn num_potentials(&self) -> usize {
        self.potentials.len()
    }

    /// Solver declarations for every symbol, spikes first.
    pub fn declarations(&self) -> Vec<(String, SmtSort)> {
        self.spikes
            .values()
            .map(|v| (v.name().to_string(), SmtSort::Bool))
            .chain(
                self.potentials
                    .values()
                    .map(|v| (v.name().to_string(), SmtSort::Real)),
            )
            .collect()
    }
}
