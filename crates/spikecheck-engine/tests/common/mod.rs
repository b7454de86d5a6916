#![allow(dead_code)]

use spikecheck_engine::config::VerifyConfig;
use spikecheck_ir::dataset::Dataset;
use spikecheck_ir::network::Network;

pub const TOY_NETWORK_JSON: &str = r#"{
    "layers": [2, 3],
    "beta": 1.0,
    "threshold": 1.0,
    "weights": [[[2.0, 0.0], [0.0, 2.0], [1.0, 1.0]]]
}"#;

/// Two inputs, three outputs with integer weights.
pub fn toy_network() -> Network {
    Network::from_json_str(TOY_NETWORK_JSON).expect("toy network is well-formed")
}

/// Ten two-feature rows spread over the three classes.
pub fn toy_dataset() -> Dataset {
    let features = vec![
        vec![4.0, 0.5],
        vec![0.5, 4.0],
        vec![2.0, 2.0],
        vec![3.5, 1.0],
        vec![1.0, 3.5],
        vec![2.5, 2.5],
        vec![4.0, 0.0],
        vec![0.0, 4.0],
        vec![3.0, 3.0],
        vec![1.5, 0.5],
    ];
    let labels = vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0];
    Dataset::new(features, labels).expect("toy dataset is well-formed")
}

pub fn base_config() -> VerifyConfig {
    VerifyConfig {
        deltas: vec![0, 2],
        num_samples: 10,
        num_steps: 4,
        seed: 7,
        log_name: "engine-tests".into(),
        ..Default::default()
    }
}
