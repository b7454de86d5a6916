//! Run configuration and its fail-fast validation.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use spikecheck_ir::network::Network;
use spikecheck_smt::encoder::{NeuronPropertyLevel, PerturbationMetric};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("at least one perturbation bound (delta) is required")]
    NoDeltas,
    #[error("num_samples must be positive")]
    NoSamples,
    #[error("num_steps must be positive")]
    NoSteps,
    #[error("np_level must be 0, 1 or 2, got {0}")]
    NpLevel(u8),
    #[error("np_level {level} requires 0 <= beta <= 1 and threshold >= 0 (beta = {beta}, threshold = {threshold})")]
    NpPreconditions { level: u8, beta: f64, threshold: f64 },
    #[error("parallel mode needs at least one worker")]
    NoWorkers,
    #[error("dataset is empty")]
    EmptyDataset,
}

/// Which solver backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverChoice {
    #[default]
    Z3,
    Cvc5,
}

impl fmt::Display for SolverChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverChoice::Z3 => write!(f, "z3"),
            SolverChoice::Cvc5 => write!(f, "cvc5"),
        }
    }
}

/// How the samples of one δ are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// Fixed-size worker pool; each task owns its solver.
    Parallel { workers: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    /// Perturbation bounds to sweep.
    pub deltas: Vec<u32>,
    pub num_samples: usize,
    /// 0 = node equations only, 1 = direct, 2 = global neuron property.
    pub np_level: u8,
    pub seed: u64,
    pub log_name: String,
    pub num_steps: usize,
    pub metric: PerturbationMetric,
    pub mode: ExecutionMode,
    pub solver: SolverChoice,
    /// Per-query solver timeout; 0 disables it.
    pub solver_timeout_secs: u64,
    /// Divide every feature column by its maximum before rate coding.
    pub normalize: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            deltas: vec![1],
            num_samples: 10,
            np_level: 0,
            seed: 42,
            log_name: "spikecheck".into(),
            num_steps: 25,
            metric: PerturbationMetric::Hamming,
            mode: ExecutionMode::Sequential,
            solver: SolverChoice::Z3,
            solver_timeout_secs: 0,
            normalize: true,
        }
    }
}

impl VerifyConfig {
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    /// Checks that do not depend on the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deltas.is_empty() {
            return Err(ConfigError::NoDeltas);
        }
        if self.num_samples == 0 {
            return Err(ConfigError::NoSamples);
        }
        if self.num_steps == 0 {
            return Err(ConfigError::NoSteps);
        }
        self.property_level()?;
        if self.mode == (ExecutionMode::Parallel { workers: 0 }) {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus the neuron-property preconditions
    /// on the network's leak and threshold.
    pub fn validate_for(&self, network: &Network) -> Result<(), ConfigError> {
        self.validate()?;
        let admissible = (0.0..=1.0).contains(&network.beta) && network.threshold >= 0.0;
        if self.np_level > 0 && !admissible {
            return Err(ConfigError::NpPreconditions {
                level: self.np_level,
                beta: network.beta,
                threshold: network.threshold,
            });
        }
        Ok(())
    }

    pub fn property_level(&self) -> Result<NeuronPropertyLevel, ConfigError> {
        NeuronPropertyLevel::from_level(self.np_level).ok_or(ConfigError::NpLevel(self.np_level))
    }

    /// Deltas in ascending order without duplicates.
    pub fn sorted_deltas(&self) -> Vec<u32> {
        let mut deltas = self.deltas.clone();
        deltas.sort_unstable();
        deltas.dedup();
        deltas
    }
}
