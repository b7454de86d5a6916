//! Materialization of trained weights into exact rational constants.

use std::collections::HashMap;

use num::rational::Rational64;
use num::{Signed, Zero};
use spikecheck_ir::network::{Network, SynapseIdx};

use super::EncodeError;
use crate::terms::SmtTerm;

const FALLBACK_DENOMINATOR: i64 = 1_000_000_000;

/// Exact rational for a finite float.
///
/// Prefers the shortest decimal that prints as `value` (so `0.95` becomes
/// `19/20`), then a continued-fraction approximation, then a fixed 1e-9 grid.
pub(crate) fn to_rational(value: f64) -> Option<Rational64> {
    if !value.is_finite() {
        return None;
    }
    decimal_rational(value)
        .or_else(|| Rational64::approximate_float(value))
        .or_else(|| {
            let scaled = (value * FALLBACK_DENOMINATOR as f64).round();
            (scaled.abs() < i64::MAX as f64).then(|| Rational64::new(scaled as i64, FALLBACK_DENOMINATOR))
        })
}

fn decimal_rational(value: f64) -> Option<Rational64> {
    let text = value.to_string();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let denom = 10i64.checked_pow(u32::try_from(frac_part.len()).ok()?)?;
    let numer: i64 = format!("{int_part}{frac_part}").parse().ok()?;
    Some(Rational64::new(if negative { -numer } else { numer }, denom))
}

/// Read-only weight constants keyed by synapse; absent synapses read as 0.
#[derive(Debug, Clone)]
pub struct WeightTable {
    layers: Vec<usize>,
    values: HashMap<SynapseIdx, Rational64>,
}

impl WeightTable {
    pub fn from_network(network: &Network) -> Result<Self, EncodeError> {
        let mut values = HashMap::new();
        for (in_layer, tensor) in network.weights.iter().enumerate() {
            for (out_node, row) in tensor.iter().enumerate() {
                for (in_node, value) in row.iter().enumerate() {
                    let syn = SynapseIdx::new(in_node, out_node, in_layer);
                    let rational = to_rational(*value).ok_or_else(|| {
                        EncodeError::UnrepresentableWeight {
                            synapse: format!("({in_node}, {out_node}, {in_layer})"),
                            value: *value,
                        }
                    })?;
                    if !rational.is_zero() {
                        values.insert(syn, rational);
                    }
                }
            }
        }
        Ok(Self {
            layers: network.layers.clone(),
            values,
        })
    }

    pub fn get(&self, syn: SynapseIdx) -> Rational64 {
        self.values.get(&syn).copied().unwrap_or_else(Rational64::zero)
    }

    pub fn term(&self, syn: SynapseIdx) -> SmtTerm {
        SmtTerm::real(self.get(syn))
    }

    /// Non-zero incoming synapses of `out_node` in layer `in_layer + 1`.
    pub fn incoming(&self, out_node: usize, in_layer: usize) -> Vec<(usize, Rational64)> {
        let width = self.layers.get(in_layer).copied().unwrap_or(0);
        (0..width)
            .filter_map(|in_node| {
                self.values
                    .get(&SynapseIdx::new(in_node, out_node, in_layer))
                    .map(|w| (in_node, *w))
            })
            .collect()
    }

    /// Strictly positive incoming synapses of `out_node`.
    pub fn excitatory(&self, out_node: usize, in_layer: usize) -> Vec<(usize, Rational64)> {
        self.incoming(out_node, in_layer)
            .into_iter()
            .filter(|(_, w)| w.is_positive())
            .collect()
    }

    pub fn num_nonzero(&self) -> usize {
        self.values.len()
    }
}
