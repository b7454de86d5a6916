//! Proptest strategies for spike trains and small integer-weight networks.

use proptest::prelude::*;

use crate::network::Network;
use crate::spike_train::SpikeTrain;

/// Strategy for a `num_steps x width` spike train with independent bits.
pub fn arb_spike_train(num_steps: usize, width: usize) -> impl Strategy<Value = SpikeTrain> {
    proptest::collection::vec(
        proptest::collection::vec(any::<bool>(), width..=width),
        num_steps..=num_steps,
    )
    .prop_map(|rows| SpikeTrain::from_rows(rows).expect("rows have uniform width"))
}

/// Strategy for a small well-formed network.
///
/// Generated networks have:
/// - 2 or 3 layers, each 1–3 nodes wide (at least 2 outputs)
/// - integer weights in `-2..=3`
/// - leak `beta` in `{0.5, 1.0}` and threshold `1.0`, so the neuron
///   property lemmas are admissible
pub fn arb_small_network() -> impl Strategy<Value = Network> {
    (
        1..=3usize,
        proptest::option::of(1..=3usize),
        2..=3usize,
        prop_oneof![Just(0.5f64), Just(1.0f64)],
    )
        .prop_flat_map(|(input, hidden, output, beta)| {
            let mut layers = vec![input];
            layers.extend(hidden);
            layers.push(output);
            let tensors: Vec<_> = layers
                .windows(2)
                .map(|pair| {
                    proptest::collection::vec(
                        proptest::collection::vec((-2i32..=3).prop_map(f64::from), pair[0]..=pair[0]),
                        pair[1]..=pair[1],
                    )
                })
                .collect();
            (Just(layers), Just(beta), tensors)
        })
        .prop_map(|(layers, beta, weights)| {
            Network::new(layers, beta, 1.0, weights).expect("generated shapes are consistent")
        })
}
