// Command handler for: Verify

use std::path::{Path, PathBuf};

use tracing::info;

use spikecheck_engine::config::VerifyConfig;
use spikecheck_engine::pipeline::run_verification;
use spikecheck_engine::result::RunReport;

use super::helpers::{load_dataset, load_network, write_json_artifact};

pub(crate) fn run_verify_command(
    network: &Path,
    dataset: &Path,
    config: &VerifyConfig,
    report_out: Option<PathBuf>,
) -> miette::Result<RunReport> {
    let network = load_network(network)?;
    let dataset = load_dataset(dataset)?;
    let report = run_verification(config, &network, &dataset).map_err(|e| miette::miette!("{e}"))?;

    println!("{report}");
    if let Some(path) = report_out {
        write_json_artifact(&path, &report)?;
        info!(path = %path.display(), "wrote run report");
    }
    Ok(report)
}
