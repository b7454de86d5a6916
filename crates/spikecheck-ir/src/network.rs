//! Feed-forward leaky integrate-and-fire network model.
//!
//! A [`Network`] is the trained-model accessor the verification core
//! consumes: layer widths, the leak factor, the firing threshold and one
//! dense weight tensor per layer transition. It also carries the concrete
//! (non-symbolic) forward simulation used to cross-check control labels.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spike_train::SpikeTrain;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to read network file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed network description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("network needs at least an input and an output layer, got {0} layer(s)")]
    TooFewLayers(usize),
    #[error("layer {0} has zero width")]
    EmptyLayer(usize),
    #[error("expected {expected} weight tensors for {layers} layers, got {actual}")]
    WeightCount {
        layers: usize,
        expected: usize,
        actual: usize,
    },
    #[error("weight tensor {layer} has shape mismatch: expected {expected_out}x{expected_in}, row {row} has {actual} column(s)")]
    WeightShape {
        layer: usize,
        expected_out: usize,
        expected_in: usize,
        row: usize,
        actual: usize,
    },
    #[error("weight tensor {layer} has {actual} row(s), expected {expected}")]
    WeightRows {
        layer: usize,
        expected: usize,
        actual: usize,
    },
    #[error("non-finite value in {0}")]
    NonFinite(String),
    #[error("spike train width {actual} does not match input layer width {expected}")]
    InputWidth { expected: usize, actual: usize },
}

/// Directed connection `in_node -> out_node` from `in_layer` to `in_layer + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SynapseIdx {
    pub in_node: usize,
    pub out_node: usize,
    pub in_layer: usize,
}

impl SynapseIdx {
    pub fn new(in_node: usize, out_node: usize, in_layer: usize) -> Self {
        Self {
            in_node,
            out_node,
            in_layer,
        }
    }
}

/// A trained feed-forward spiking network.
///
/// `weights[l][out][in]` is the weight from node `in` of layer `l` to node
/// `out` of layer `l + 1`, the layout of a dense linear layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<usize>,
    pub beta: f64,
    pub threshold: f64,
    pub weights: Vec<Vec<Vec<f64>>>,
}

/// Per-layer spike record of one concrete forward pass.
///
/// `spikes[l][t][n]` is the spike of node `n` in layer `l` at timestep
/// `t + 1`; layer 0 is the input train itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationTrace {
    pub spikes: Vec<Vec<Vec<bool>>>,
    pub potentials: Vec<Vec<Vec<f64>>>,
}

impl SimulationTrace {
    /// Total spike count of every output neuron.
    pub fn output_counts(&self) -> Vec<u32> {
        let Some(output) = self.spikes.last() else {
            return Vec::new();
        };
        let width = output.first().map_or(0, Vec::len);
        let mut counts = vec![0u32; width];
        for step in output {
            for (node, fired) in step.iter().enumerate() {
                if *fired {
                    counts[node] += 1;
                }
            }
        }
        counts
    }
}

impl Network {
    /// Build and validate a network.
    pub fn new(
        layers: Vec<usize>,
        beta: f64,
        threshold: f64,
        weights: Vec<Vec<Vec<f64>>>,
    ) -> Result<Self, NetworkError> {
        let net = Self {
            layers,
            beta,
            threshold,
            weights,
        };
        net.validate()?;
        Ok(net)
    }

    pub fn from_json_str(source: &str) -> Result<Self, NetworkError> {
        let net: Network = serde_json::from_str(source)?;
        net.validate()?;
        Ok(net)
    }

    pub fn load(path: &Path) -> Result<Self, NetworkError> {
        let source = std::fs::read_to_string(path).map_err(|source| NetworkError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.layers.len() < 2 {
            return Err(NetworkError::TooFewLayers(self.layers.len()));
        }
        if let Some(layer) = self.layers.iter().position(|w| *w == 0) {
            return Err(NetworkError::EmptyLayer(layer));
        }
        if !self.beta.is_finite() {
            return Err(NetworkError::NonFinite("beta".into()));
        }
        if !self.threshold.is_finite() {
            return Err(NetworkError::NonFinite("threshold".into()));
        }
        let expected = self.layers.len() - 1;
        if self.weights.len() != expected {
            return Err(NetworkError::WeightCount {
                layers: self.layers.len(),
                expected,
                actual: self.weights.len(),
            });
        }
        for (layer, tensor) in self.weights.iter().enumerate() {
            let expected_in = self.layers[layer];
            let expected_out = self.layers[layer + 1];
            if tensor.len() != expected_out {
                return Err(NetworkError::WeightRows {
                    layer,
                    expected: expected_out,
                    actual: tensor.len(),
                });
            }
            for (row, values) in tensor.iter().enumerate() {
                if values.len() != expected_in {
                    return Err(NetworkError::WeightShape {
                        layer,
                        expected_out,
                        expected_in,
                        row,
                        actual: values.len(),
                    });
                }
                if values.iter().any(|w| !w.is_finite()) {
                    return Err(NetworkError::NonFinite(format!("weights[{layer}][{row}]")));
                }
            }
        }
        Ok(())
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input_width(&self) -> usize {
        self.layers[0]
    }

    pub fn output_width(&self) -> usize {
        self.layers[self.layers.len() - 1]
    }

    pub fn output_layer(&self) -> usize {
        self.layers.len() - 1
    }

    /// Weight of a synapse; out-of-range indices read as 0.
    pub fn weight(&self, syn: SynapseIdx) -> f64 {
        self.weights
            .get(syn.in_layer)
            .and_then(|tensor| tensor.get(syn.out_node))
            .and_then(|row| row.get(syn.in_node))
            .copied()
            .unwrap_or(0.0)
    }

    /// Concrete forward pass over `input`, mirroring the symbolic node
    /// equations: `mem = beta * mem + W * spikes - reset * threshold`,
    /// firing when `mem > threshold`, reset by subtraction.
    pub fn simulate(&self, input: &SpikeTrain) -> Result<SimulationTrace, NetworkError> {
        if input.width() != self.input_width() {
            return Err(NetworkError::InputWidth {
                expected: self.input_width(),
                actual: input.width(),
            });
        }
        let steps = input.num_steps();
        let mut spikes = Vec::with_capacity(self.layers.len());
        let mut potentials = Vec::with_capacity(self.layers.len());
        spikes.push(input.to_rows());
        potentials.push(vec![vec![0.0; self.input_width()]; steps]);

        for (layer, tensor) in self.weights.iter().enumerate() {
            let width = self.layers[layer + 1];
            let mut mem = vec![0.0f64; width];
            let mut fired = vec![false; width];
            let mut layer_spikes = Vec::with_capacity(steps);
            let mut layer_mem = Vec::with_capacity(steps);
            for step in 0..steps {
                let inputs = &spikes[layer][step];
                for out in 0..width {
                    let drive: f64 = tensor[out]
                        .iter()
                        .zip(inputs)
                        .filter(|(_, s)| **s)
                        .map(|(w, _)| *w)
                        .sum();
                    let reset = if fired[out] { self.threshold } else { 0.0 };
                    mem[out] = self.beta * mem[out] + drive - reset;
                }
                for out in 0..width {
                    fired[out] = mem[out] > self.threshold;
                }
                layer_spikes.push(fired.clone());
                layer_mem.push(mem.clone());
            }
            spikes.push(layer_spikes);
            potentials.push(layer_mem);
        }
        Ok(SimulationTrace { spikes, potentials })
    }

    /// Predicted class: output neuron with the highest spike count.
    pub fn predict(&self, input: &SpikeTrain) -> Result<usize, NetworkError> {
        let trace = self.simulate(input)?;
        Ok(argmax_lowest(&trace.output_counts()))
    }
}

/// Index of the maximum count; exact ties resolve to the lowest index.
pub fn argmax_lowest(counts: &[u32]) -> usize {
    let mut best = 0usize;
    for (idx, count) in counts.iter().enumerate() {
        if *count > counts[best] {
            best = idx;
        }
    }
    best
}
