//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use spikecheck_engine::config::{ExecutionMode, SolverChoice, VerifyConfig};
use spikecheck_smt::encoder::PerturbationMetric;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Formal δ-local robustness verification of feed-forward spiking neural networks.\n\n\
    Each drawn sample is rate-coded into a spike train; for every perturbation bound δ\n\
    the solver searches for an input within δ flips that changes the predicted class.\n\
    `unsat` means the sample is robust at that δ.";

#[derive(Parser)]
#[command(name = "spikecheck")]
#[command(about = "SMT-based robustness verification for spiking neural networks")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    /// Directory for per-run log files
    #[arg(long, global = true, default_value = "log")]
    pub(crate) log_dir: PathBuf,

    /// Log to stderr only
    #[arg(long, global = true, default_value_t = false)]
    pub(crate) no_log_file: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliSolver {
    Z3,
    Cvc5,
}

impl From<CliSolver> for SolverChoice {
    fn from(value: CliSolver) -> Self {
        match value {
            CliSolver::Z3 => SolverChoice::Z3,
            CliSolver::Cvc5 => SolverChoice::Cvc5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliMetric {
    Hamming,
    PerNeuron,
}

impl From<CliMetric> for PerturbationMetric {
    fn from(value: CliMetric) -> Self {
        match value {
            CliMetric::Hamming => PerturbationMetric::Hamming,
            CliMetric::PerNeuron => PerturbationMetric::PerNeuron,
        }
    }
}

/// Run settings; every flag overrides the same field of `--config`.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// JSON file with a full or partial run configuration
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Perturbation bound to check (repeatable)
    #[arg(long = "delta", value_name = "DELTA")]
    pub(crate) deltas: Vec<u32>,

    /// Number of samples drawn with replacement
    #[arg(long)]
    pub(crate) num_samples: Option<usize>,

    /// Neuron-property lemmas: 0 none, 1 direct, 2 global
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub(crate) np_level: Option<u8>,

    /// Seed for sample drawing and rate coding
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Name of the run, used for the log file
    #[arg(long)]
    pub(crate) log_name: Option<String>,

    /// Simulation horizon in timesteps
    #[arg(long)]
    pub(crate) num_steps: Option<usize>,

    /// How flipped input spikes are counted
    #[arg(long, value_enum)]
    pub(crate) metric: Option<CliMetric>,

    /// Check samples on a pool of this many workers
    #[arg(long)]
    pub(crate) workers: Option<usize>,

    /// Force sequential checking even if the config asks for workers
    #[arg(long, conflicts_with = "workers")]
    pub(crate) sequential: bool,

    /// Solver backend
    #[arg(long, value_enum)]
    pub(crate) solver: Option<CliSolver>,

    /// Per-query solver timeout in seconds (0 = none)
    #[arg(long)]
    pub(crate) timeout: Option<u64>,

    /// Use raw features instead of column-max normalized ones
    #[arg(long)]
    pub(crate) no_normalize: bool,
}

impl RunArgs {
    /// Apply every given flag on top of `base`.
    pub(crate) fn apply(&self, mut base: VerifyConfig) -> VerifyConfig {
        if !self.deltas.is_empty() {
            base.deltas = self.deltas.clone();
        }
        if let Some(n) = self.num_samples {
            base.num_samples = n;
        }
        if let Some(level) = self.np_level {
            base.np_level = level;
        }
        if let Some(seed) = self.seed {
            base.seed = seed;
        }
        if let Some(name) = &self.log_name {
            base.log_name = name.clone();
        }
        if let Some(steps) = self.num_steps {
            base.num_steps = steps;
        }
        if let Some(metric) = self.metric {
            base.metric = metric.into();
        }
        if let Some(workers) = self.workers {
            base.mode = ExecutionMode::Parallel { workers };
        }
        if self.sequential {
            base.mode = ExecutionMode::Sequential;
        }
        if let Some(solver) = self.solver {
            base.solver = solver.into();
        }
        if let Some(timeout) = self.timeout {
            base.solver_timeout_secs = timeout;
        }
        if self.no_normalize {
            base.normalize = false;
        }
        base
    }
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Sweep perturbation bounds over drawn samples
    Verify {
        /// Trained network (JSON)
        #[arg(long)]
        network: PathBuf,

        /// Dataset with features and labels (JSON)
        #[arg(long)]
        dataset: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Write the full run report as JSON
        #[arg(long)]
        report_out: Option<PathBuf>,
    },

    /// Concrete forward pass over drawn samples, reporting accuracy
    Simulate {
        /// Trained network (JSON)
        #[arg(long)]
        network: PathBuf,

        /// Dataset with features and labels (JSON)
        #[arg(long)]
        dataset: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
}
