use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spikecheck_ir::network::Network;
use spikecheck_ir::spike_train::rate_encode;
use spikecheck_smt::encoder::{
    encode_class_change, encode_delta_reuse, NeuronPropertyLevel, PerturbationMetric,
};
use spikecheck_smt::robustness::VerificationContext;
use spikecheck_smt::solver::Model;

fn random_network(layers: &[usize], seed: u64) -> Network {
    let mut rng = StdRng::seed_from_u64(seed);
    let weights = layers
        .windows(2)
        .map(|pair| {
            (0..pair[1])
                .map(|_| (0..pair[0]).map(|_| rng.gen_range(-1.0..1.5)).collect())
                .collect()
        })
        .collect();
    Network::new(layers.to_vec(), 0.95, 1.0, weights).unwrap()
}

fn bench_encode_dynamics(c: &mut Criterion) {
    let network = random_network(&[4, 5, 3], 7);
    for (name, level) in [
        ("encode_dynamics_4_5_3_t25", NeuronPropertyLevel::None),
        ("encode_dynamics_4_5_3_t25_np2", NeuronPropertyLevel::Global),
    ] {
        c.bench_function(name, |b| {
            b.iter(|| {
                VerificationContext::new(
                    black_box(&network),
                    25,
                    level,
                    PerturbationMetric::Hamming,
                )
            })
        });
    }
}

fn bench_encode_query(c: &mut Criterion) {
    let network = random_network(&[4, 5, 3], 7);
    let ctx = VerificationContext::new(&network, 25, NeuronPropertyLevel::None, PerturbationMetric::Hamming)
        .unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let train = rate_encode(&[0.2, 0.9, 0.5, 0.7], 25, &mut rng);
    let control = Model::default();
    c.bench_function("encode_query_4_5_3_t25", |b| {
        b.iter(|| {
            let mut set = encode_delta_reuse(ctx.symbols(), black_box(&train), 3, &control, ctx.metric()).unwrap();
            set.extend(encode_class_change(ctx.symbols(), 0).unwrap());
            set
        })
    });
}

criterion_group!(benches, bench_encode_dynamics, bench_encode_query);
criterion_main!(benches);
