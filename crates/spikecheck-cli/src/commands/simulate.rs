// Command handler for: Simulate

use std::path::Path;

use spikecheck_engine::config::VerifyConfig;
use spikecheck_engine::pipeline::prepare_samples;
use spikecheck_engine::result::SampleInfo;

use super::helpers::{load_dataset, load_network};

pub(crate) fn run_simulate_command(
    network: &Path,
    dataset: &Path,
    config: &VerifyConfig,
) -> miette::Result<Vec<SampleInfo>> {
    let network = load_network(network)?;
    let dataset = load_dataset(dataset)?;
    let samples = prepare_samples(config, &network, &dataset).map_err(|e| miette::miette!("{e}"))?;

    let infos: Vec<SampleInfo> = samples.into_iter().map(|s| s.info).collect();
    let correct = infos.iter().filter(|s| s.label == s.predicted).count();
    for s in &infos {
        println!(
            "sample {:>3} (row {:>4}): label {} predicted {} with {} input spikes",
            s.sample, s.dataset_index, s.label, s.predicted, s.input_spikes
        );
    }
    println!(
        "Accuracy of the model : {:.2}%",
        100.0 * correct as f64 / infos.len().max(1) as f64
    );
    Ok(infos)
}
