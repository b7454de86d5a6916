//! Sample orchestration: draw samples, encode them once, then sweep δ.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use spikecheck_ir::dataset::Dataset;
use spikecheck_ir::network::{Network, NetworkError};
use spikecheck_ir::spike_train::{rate_encode, SpikeTrain};
use spikecheck_smt::backends::cvc5_backend::Cvc5Solver;
use spikecheck_smt::backends::z3_backend::Z3Solver;
use spikecheck_smt::encoder::EncodeError;
use spikecheck_smt::robustness::{check_sample, SampleOutcome, SampleStatus, VerificationContext};

use crate::config::{ConfigError, ExecutionMode, SolverChoice, VerifyConfig};
use crate::result::{DeltaSummary, RunReport, SampleInfo};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),
    #[error("dataset has {actual} features per sample, network expects {expected}")]
    InputWidth { expected: usize, actual: usize },
    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A drawn sample with its spike train, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct PreparedSample {
    pub info: SampleInfo,
    pub train: SpikeTrain,
}

/// Draw `num_samples` rows with replacement and rate-code each one.
///
/// Both draws come from one RNG seeded with `config.seed`, so the same
/// config always yields the same trains.
pub fn prepare_samples(
    config: &VerifyConfig,
    network: &Network,
    dataset: &Dataset,
) -> Result<Vec<PreparedSample>, PipelineError> {
    if dataset.is_empty() {
        return Err(ConfigError::EmptyDataset.into());
    }
    if dataset.num_features() != network.input_width() {
        return Err(PipelineError::InputWidth {
            expected: network.input_width(),
            actual: dataset.num_features(),
        });
    }
    let mut data = dataset.clone();
    if config.normalize {
        data.normalize_by_column_max();
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let indices = data.sample_indices(config.num_samples, &mut rng);
    let mut samples = Vec::with_capacity(indices.len());
    for (sample, dataset_index) in indices.into_iter().enumerate() {
        let (features, label) = data
            .sample(dataset_index)
            .ok_or(ConfigError::EmptyDataset)?;
        let train = rate_encode(features, config.num_steps, &mut rng);
        let predicted = network.predict(&train)?;
        debug!(sample, dataset_index, label, predicted, "prepared sample");
        samples.push(PreparedSample {
            info: SampleInfo {
                sample,
                dataset_index,
                label,
                predicted,
                input_spikes: train.spike_count(),
            },
            train,
        });
    }
    Ok(samples)
}

/// One full (sample, δ) query on a fresh solver of the configured kind.
fn verify_one(
    config: &VerifyConfig,
    context: &VerificationContext,
    sample: &PreparedSample,
    delta: u32,
) -> SampleOutcome {
    let sample_no = sample.info.sample;
    let outcome = match config.solver {
        SolverChoice::Z3 => {
            let mut solver = Z3Solver::with_timeout_secs(config.solver_timeout_secs);
            check_sample(&mut solver, context, sample_no, &sample.train, delta)
        }
        SolverChoice::Cvc5 => match Cvc5Solver::with_timeout_secs(config.solver_timeout_secs) {
            Ok(mut solver) => check_sample(&mut solver, context, sample_no, &sample.train, delta),
            Err(e) => SampleOutcome {
                sample: sample_no,
                delta,
                status: SampleStatus::Failed {
                    reason: e.to_string(),
                },
            },
        },
    };
    info!(
        "Completed for delta = {}, sample = {} in {} sec as {}",
        delta,
        sample_no,
        outcome.time_secs(),
        outcome.label()
    );
    outcome
}

/// Sweeps δ over prepared samples with a fixed execution mode.
pub struct Orchestrator<'a> {
    config: &'a VerifyConfig,
    context: &'a VerificationContext,
    pool: Option<rayon::ThreadPool>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a VerifyConfig, context: &'a VerificationContext) -> Result<Self, PipelineError> {
        config.validate()?;
        let pool = match config.mode {
            ExecutionMode::Sequential => None,
            ExecutionMode::Parallel { workers } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("spikecheck-worker-{i}"))
                    .build()?,
            ),
        };
        Ok(Self { config, context, pool })
    }

    /// Check every sample at `delta`, returning outcomes in sample order.
    pub fn run_delta(&self, samples: &[PreparedSample], delta: u32) -> (DeltaSummary, Vec<SampleOutcome>) {
        let (summary, outcomes) = match &self.pool {
            None => {
                let mut summary = DeltaSummary::new(delta);
                let mut outcomes = Vec::with_capacity(samples.len());
                for sample in samples {
                    let outcome = verify_one(self.config, self.context, sample, delta);
                    summary.record(&outcome);
                    outcomes.push(outcome);
                }
                (summary, outcomes)
            }
            Some(pool) => {
                let outcomes: Vec<SampleOutcome> = pool.install(|| {
                    samples
                        .par_iter()
                        .map(|sample| verify_one(self.config, self.context, sample, delta))
                        .collect()
                });
                (DeltaSummary::from_outcomes(delta, &outcomes), outcomes)
            }
        };
        info!(
            "Completed for delta = {} with {} in avg time {} sec",
            delta, summary.robust, summary.avg_time_secs
        );
        (summary, outcomes)
    }

    /// All configured deltas, ascending, strictly one after another.
    pub fn run(&self, samples: &[PreparedSample]) -> (Vec<DeltaSummary>, Vec<SampleOutcome>) {
        let mut summaries = Vec::new();
        let mut all = Vec::with_capacity(samples.len() * self.config.deltas.len());
        for delta in self.config.sorted_deltas() {
            let (summary, outcomes) = self.run_delta(samples, delta);
            summaries.push(summary);
            all.extend(outcomes);
        }
        (summaries, all)
    }
}

/// Validate, encode the network once, prepare samples and sweep every δ.
pub fn run_verification(
    config: &VerifyConfig,
    network: &Network,
    dataset: &Dataset,
) -> Result<RunReport, PipelineError> {
    config.validate_for(network)?;
    info!(?config, "starting robustness run");

    let samples = prepare_samples(config, network, dataset)?;
    let context = VerificationContext::new(network, config.num_steps, config.property_level()?, config.metric)?;
    let orchestrator = Orchestrator::new(config, &context)?;

    let mut report = RunReport::new(config.clone(), samples.iter().map(|s| s.info.clone()).collect());
    info!(
        samples = samples.len(),
        accuracy = report.accuracy(),
        "samples drawn and rate-coded"
    );
    let (deltas, outcomes) = orchestrator.run(&samples);
    report.deltas = deltas;
    report.outcomes = outcomes;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> Network {
        Network::new(
            vec![2, 3],
            1.0,
            1.0,
            vec![vec![vec![2.0, 0.0], vec![0.0, 2.0], vec![1.0, 1.0]]],
        )
        .unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::new(
            vec![vec![0.9, 0.1], vec![0.2, 0.8], vec![0.5, 0.5]],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    fn config() -> VerifyConfig {
        VerifyConfig {
            deltas: vec![1, 0],
            num_samples: 4,
            num_steps: 3,
            ..Default::default()
        }
    }

    #[test]
    fn samples_are_deterministic_for_a_seed() {
        let a = prepare_samples(&config(), &toy(), &dataset()).unwrap();
        let b = prepare_samples(&config(), &toy(), &dataset()).unwrap();
        assert_eq!(a.len(), 4);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.info, y.info);
            assert_eq!(x.train, y.train);
            assert_eq!(x.train.num_steps(), 3);
        }
    }

    #[test]
    fn width_mismatch_is_rejected_before_encoding() {
        let wide = Dataset::new(vec![vec![0.1, 0.2, 0.3]], vec![0]).unwrap();
        let err = prepare_samples(&config(), &toy(), &wide).unwrap_err();
        assert!(matches!(err, PipelineError::InputWidth { expected: 2, actual: 3 }));
    }

    #[test]
    fn invalid_config_fails_before_any_solver_work() {
        let bad = VerifyConfig {
            deltas: vec![],
            ..config()
        };
        let err = run_verification(&bad, &toy(), &dataset()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::NoDeltas)));
    }

    #[test]
    fn run_reports_every_delta_in_ascending_order() {
        let report = run_verification(&config(), &toy(), &dataset()).unwrap();
        let deltas: Vec<u32> = report.deltas.iter().map(|s| s.delta).collect();
        assert_eq!(deltas, vec![0, 1]);
        assert_eq!(report.outcomes.len(), 8);
        for summary in &report.deltas {
            assert_eq!(summary.total(), 4);
            assert_eq!(summary.failed, 0);
        }
    }
}
