// Shared helpers: input loading, config resolution, tracing setup and
// JSON artifacts.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use spikecheck_engine::config::VerifyConfig;
use spikecheck_ir::dataset::Dataset;
use spikecheck_ir::network::Network;

use crate::cli::RunArgs;

pub(crate) fn load_network(path: &Path) -> miette::Result<Network> {
    Network::load(path).map_err(|e| miette::miette!("Cannot load network {}: {e}", path.display()))
}

pub(crate) fn load_dataset(path: &Path) -> miette::Result<Dataset> {
    Dataset::load(path).map_err(|e| miette::miette!("Cannot load dataset {}: {e}", path.display()))
}

/// `--config` (or defaults) with every CLI flag applied on top.
pub(crate) fn resolve_config(run: &RunArgs) -> miette::Result<VerifyConfig> {
    let base = match &run.config {
        Some(path) => VerifyConfig::load(path).map_err(|e| miette::miette!("{e}"))?,
        None => VerifyConfig::default(),
    };
    let config = run.apply(base);
    config
        .validate()
        .map_err(|e| miette::miette!("Invalid configuration: {e}"))?;
    Ok(config)
}

/// Path of the per-run log file, if file logging is enabled.
pub(crate) fn log_file_path(log_dir: &Path, log_name: &str, disabled: bool) -> Option<PathBuf> {
    (!disabled).then(|| log_dir.join(format!("{log_name}.log")))
}

/// Install the global subscriber: stderr always, plus a plain-text copy
/// in `log_file` when given.
pub(crate) fn init_tracing(log_file: Option<&Path>) -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).into_diagnostic()?;
            }
            let file = fs::File::create(path)
                .map_err(|e| miette::miette!("Cannot create log file {}: {e}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| miette::miette!("Cannot install logger: {e}"))
}

pub(crate) fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> miette::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).into_diagnostic()?;
    }
    fs::write(path, serde_json::to_string_pretty(value).into_diagnostic()?).into_diagnostic()?;
    Ok(())
}
