use serde::Serialize;
use std::fmt;

use spikecheck_smt::robustness::{SampleOutcome, SampleStatus, Verdict};

use crate::config::VerifyConfig;

/// JSON schema version for run reports.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// One drawn sample and what the concrete network predicts for it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SampleInfo {
    /// Position in the run (the `sample` of every outcome).
    pub sample: usize,
    /// Row of the dataset it was drawn from.
    pub dataset_index: usize,
    pub label: usize,
    pub predicted: usize,
    pub input_spikes: usize,
}

/// Aggregates over all samples checked at one δ.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeltaSummary {
    pub delta: u32,
    /// `Unsat`: no perturbation within δ changes the class.
    pub robust: usize,
    /// `Sat`: a class-changing perturbation exists.
    pub vulnerable: usize,
    pub unknown: usize,
    pub infeasible: usize,
    pub failed: usize,
    /// Mean robustness-solve time over checked samples.
    pub avg_time_secs: f64,
}

impl DeltaSummary {
    pub fn new(delta: u32) -> Self {
        Self {
            delta,
            robust: 0,
            vulnerable: 0,
            unknown: 0,
            infeasible: 0,
            failed: 0,
            avg_time_secs: 0.0,
        }
    }

    pub fn checked(&self) -> usize {
        self.robust + self.vulnerable + self.unknown
    }

    pub fn total(&self) -> usize {
        self.checked() + self.infeasible + self.failed
    }

    /// Fold one outcome in, updating the running mean incrementally.
    pub fn record(&mut self, outcome: &SampleOutcome) {
        match &outcome.status {
            SampleStatus::Checked { verdict, .. } => {
                let n = self.checked() as f64;
                self.avg_time_secs = (self.avg_time_secs * n + outcome.time_secs()) / (n + 1.0);
                match verdict {
                    Verdict::Unsat => self.robust += 1,
                    Verdict::Sat => self.vulnerable += 1,
                    Verdict::Unknown(_) => self.unknown += 1,
                }
            }
            SampleStatus::Infeasible => self.infeasible += 1,
            SampleStatus::Failed { .. } => self.failed += 1,
        }
    }

    pub fn from_outcomes<'a>(delta: u32, outcomes: impl IntoIterator<Item = &'a SampleOutcome>) -> Self {
        let mut summary = Self::new(delta);
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub config: VerifyConfig,
    pub samples: Vec<SampleInfo>,
    /// One entry per δ, ascending.
    pub deltas: Vec<DeltaSummary>,
    pub outcomes: Vec<SampleOutcome>,
}

impl RunReport {
    pub fn new(config: VerifyConfig, samples: Vec<SampleInfo>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            config,
            samples,
            deltas: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn summary(&self, delta: u32) -> Option<&DeltaSummary> {
        self.deltas.iter().find(|s| s.delta == delta)
    }

    /// Fraction of drawn samples the concrete network classifies correctly.
    pub fn accuracy(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let correct = self.samples.iter().filter(|s| s.label == s.predicted).count();
        correct as f64 / self.samples.len() as f64
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ROBUSTNESS SUMMARY")?;
        writeln!(
            f,
            "Samples: {} (accuracy {:.2}%), steps: {}, metric: {:?}, np_level: {}, solver: {}",
            self.samples.len(),
            100.0 * self.accuracy(),
            self.config.num_steps,
            self.config.metric,
            self.config.np_level,
            self.config.solver,
        )?;
        writeln!(
            f,
            "{:>6} {:>7} {:>10} {:>8} {:>10} {:>7} {:>12}",
            "delta", "robust", "vulnerable", "unknown", "infeasible", "failed", "avg time (s)"
        )?;
        for s in &self.deltas {
            writeln!(
                f,
                "{:>6} {:>7} {:>10} {:>8} {:>10} {:>7} {:>12.4}",
                s.delta, s.robust, s.vulnerable, s.unknown, s.infeasible, s.failed, s.avg_time_secs
            )?;
        }
        Ok(())
    }
}
