//! Per-sample robustness queries.
//!
//! Each query runs in two stages on one solver instance. The control solve
//! pins the input train and recovers the network's own run (and with it
//! the predicted label); the robustness solve then frees the inputs within
//! δ and asks for a class change. `Unsat` in the second stage means the
//! sample is robust at δ.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use spikecheck_ir::network::Network;
use spikecheck_ir::spike_train::SpikeTrain;
use thiserror::Error;
use tracing::{debug, warn};

use crate::encoder::{
    encode_class_change, encode_delta_reuse, encode_initial_state, encode_neuron_properties,
    encode_node_equations, label_from_model, perturbation::encode_input_pin, ConstraintSet,
    EncodeError, NeuronPropertyLevel, PerturbationMetric, SymbolTable, WeightTable,
};
use crate::solver::{SatResult, SmtSolver};
use crate::sorts::SmtSort;

/// Reported solve time for samples whose dynamics admit no run.
pub const INFEASIBLE_SENTINEL_SECS: f64 = -1.0;

#[derive(Debug, Error)]
pub enum DriverError<E: std::error::Error> {
    #[error("solver error: {0}")]
    Solver(E),
    #[error("encoding error: {0}")]
    Encode(#[from] EncodeError),
    #[error("solver reported sat without a model")]
    MissingModel,
}

/// Outcome of the robustness solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No perturbation within δ changes the class.
    Unsat,
    /// A perturbation within δ changes the class.
    Sat,
    /// The solver gave up.
    Unknown(String),
}

impl Verdict {
    pub fn is_robust(&self) -> bool {
        matches!(self, Verdict::Unsat)
    }
}

impl From<SatResult> for Verdict {
    fn from(result: SatResult) -> Self {
        match result {
            SatResult::Sat => Verdict::Sat,
            SatResult::Unsat => Verdict::Unsat,
            SatResult::Unknown(reason) => Verdict::Unknown(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Unsat => write!(f, "unsat"),
            Verdict::Sat => write!(f, "sat"),
            Verdict::Unknown(_) => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SampleStatus {
    Checked { verdict: Verdict, elapsed: Duration },
    /// The control solve found no run for the pinned input.
    Infeasible,
    Failed { reason: String },
}

/// Result of one (sample, δ) query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleOutcome {
    pub sample: usize,
    pub delta: u32,
    pub status: SampleStatus,
}

impl SampleOutcome {
    /// Seconds spent in the robustness solve; the sentinel for infeasible
    /// samples and zero for failures.
    pub fn time_secs(&self) -> f64 {
        match &self.status {
            SampleStatus::Checked { elapsed, .. } => elapsed.as_secs_f64(),
            SampleStatus::Infeasible => INFEASIBLE_SENTINEL_SECS,
            SampleStatus::Failed { .. } => 0.0,
        }
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match &self.status {
            SampleStatus::Checked { verdict, .. } => Some(verdict),
            _ => None,
        }
    }

    pub fn is_robust(&self) -> bool {
        self.verdict().is_some_and(Verdict::is_robust)
    }

    /// Short label used in progress lines.
    pub fn label(&self) -> String {
        match &self.status {
            SampleStatus::Checked { verdict, .. } => verdict.to_string(),
            SampleStatus::Infeasible => "infeasible".into(),
            SampleStatus::Failed { .. } => "failed".into(),
        }
    }
}

/// Everything shared by all queries of one run.
#[derive(Debug, Clone)]
pub struct VerificationContext {
    symbols: SymbolTable,
    base: ConstraintSet,
    declarations: Vec<(String, SmtSort)>,
    metric: PerturbationMetric,
}

impl VerificationContext {
    pub fn new(
        network: &Network,
        num_steps: usize,
        np_level: NeuronPropertyLevel,
        metric: PerturbationMetric,
    ) -> Result<Self, EncodeError> {
        let symbols = SymbolTable::new(&network.layers, num_steps);
        let weights = WeightTable::from_network(network)?;
        let mut base = encode_node_equations(&symbols, &weights, network.beta, network.threshold)?;
        base.extend(encode_initial_state(&symbols));
        base.extend(encode_neuron_properties(np_level, &symbols, &weights, network.threshold)?);
        let declarations = symbols.declarations();
        debug!(
            symbols = declarations.len(),
            assertions = base.len(),
            dedup_hits = base.dedup_hits(),
            np_level = np_level.level(),
            "encoded network dynamics"
        );
        Ok(Self {
            symbols,
            base,
            declarations,
            metric,
        })
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Dynamics, initial state and lemmas shared by every query.
    pub fn base_constraints(&self) -> &ConstraintSet {
        &self.base
    }

    pub fn metric(&self) -> PerturbationMetric {
        self.metric
    }

    fn spike_declarations(&self) -> Vec<(&str, &SmtSort)> {
        self.declarations
            .iter()
            .filter(|(_, sort)| *sort == SmtSort::Bool)
            .map(|(name, sort)| (name.as_str(), sort))
            .collect()
    }
}

/// Run one (sample, δ) query; errors are folded into
/// [`SampleStatus::Failed`] so a batch never aborts on one sample.
pub fn check_sample<S: SmtSolver>(
    solver: &mut S,
    context: &VerificationContext,
    sample: usize,
    train: &SpikeTrain,
    delta: u32,
) -> SampleOutcome {
    let status = match run_query(solver, context, train, delta) {
        Ok(status) => status,
        Err(err) => {
            warn!(sample, delta, error = %err, "sample check failed");
            SampleStatus::Failed {
                reason: err.to_string(),
            }
        }
    };
    SampleOutcome {
        sample,
        delta,
        status,
    }
}

/// Both solver stages for one train, propagating errors.
pub fn run_query<S: SmtSolver>(
    solver: &mut S,
    context: &VerificationContext,
    train: &SpikeTrain,
    delta: u32,
) -> Result<SampleStatus, DriverError<S::Error>> {
    solver.reset().map_err(DriverError::Solver)?;
    for (name, sort) in &context.declarations {
        solver.declare_var(name, sort).map_err(DriverError::Solver)?;
    }
    for term in context.base.assertions() {
        solver.assert(term).map_err(DriverError::Solver)?;
    }

    let pin = encode_input_pin(&context.symbols, train)?;
    solver.push().map_err(DriverError::Solver)?;
    for term in pin.assertions() {
        solver.assert(term).map_err(DriverError::Solver)?;
    }
    let (feasible, control) = solver
        .check_sat_with_model(&context.spike_declarations())
        .map_err(DriverError::Solver)?;
    solver.pop().map_err(DriverError::Solver)?;

    let control = match (feasible, control) {
        (SatResult::Unsat, _) => {
            debug!(delta, "control run infeasible, skipping robustness query");
            return Ok(SampleStatus::Infeasible);
        }
        (SatResult::Unknown(reason), _) => {
            return Ok(SampleStatus::Checked {
                verdict: Verdict::Unknown(reason),
                elapsed: Duration::ZERO,
            });
        }
        (SatResult::Sat, Some(model)) => model,
        (SatResult::Sat, None) => return Err(DriverError::MissingModel),
    };

    let label = label_from_model(&context.symbols, &control)?;
    let mut query = encode_delta_reuse(&context.symbols, train, delta, &control, context.metric)?;
    query.extend(encode_class_change(&context.symbols, label)?);
    debug!(label, delta, assertions = query.len(), "control run recovered");
    for term in query.assertions() {
        solver.assert(term).map_err(DriverError::Solver)?;
    }

    let started = Instant::now();
    let result = solver.check_sat().map_err(DriverError::Solver)?;
    let elapsed = started.elapsed();
    Ok(SampleStatus::Checked {
        verdict: result.into(),
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Model, ModelValue};
    use crate::terms::SmtTerm;

    /// Scripted solver: answers `check_sat*` calls from a queue and records
    /// how many times each stage ran.
    #[derive(Default)]
    struct ScriptedSolver {
        answers: Vec<SatResult>,
        model: Model,
        checks: usize,
        asserted: usize,
    }

    #[derive(Debug, Error)]
    #[error("scripted failure")]
    struct ScriptedError;

    impl SmtSolver for ScriptedSolver {
        type Error = ScriptedError;

        fn declare_var(&mut self, _: &str, _: &SmtSort) -> Result<(), ScriptedError> {
            Ok(())
        }

        fn assert(&mut self, _: &SmtTerm) -> Result<(), ScriptedError> {
            self.asserted += 1;
            Ok(())
        }

        fn push(&mut self) -> Result<(), ScriptedError> {
            Ok(())
        }

        fn pop(&mut self) -> Result<(), ScriptedError> {
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, ScriptedError> {
            self.checks += 1;
            if self.answers.is_empty() {
                return Err(ScriptedError);
            }
            Ok(self.answers.remove(0))
        }

        fn check_sat_with_model(
            &mut self,
            _: &[(&str, &SmtSort)],
        ) -> Result<(SatResult, Option<Model>), ScriptedError> {
            let result = self.check_sat()?;
            let model = (result == SatResult::Sat).then(|| self.model.clone());
            Ok((result, model))
        }

        fn reset(&mut self) -> Result<(), ScriptedError> {
            Ok(())
        }
    }

    fn context() -> VerificationContext {
        let network = Network::new(
            vec![2, 2],
            1.0,
            1.0,
            vec![vec![vec![2.0, 0.0], vec![0.0, 2.0]]],
        )
        .unwrap();
        VerificationContext::new(&network, 2, NeuronPropertyLevel::None, PerturbationMetric::Hamming).unwrap()
    }

    fn train() -> SpikeTrain {
        SpikeTrain::from_rows(vec![vec![true, false], vec![true, false]]).unwrap()
    }

    fn quiet_model(ctx: &VerificationContext) -> Model {
        let mut model = Model::default();
        for (_, spike) in ctx.symbols().spikes() {
            model.values.insert(spike.name().to_string(), ModelValue::Bool(false));
        }
        model
    }

    #[test]
    fn infeasible_control_skips_the_robustness_query() {
        let ctx = context();
        let mut solver = ScriptedSolver {
            answers: vec![SatResult::Unsat],
            ..Default::default()
        };
        let outcome = check_sample(&mut solver, &ctx, 4, &train(), 1);
        assert_eq!(outcome.status, SampleStatus::Infeasible);
        assert_eq!(outcome.time_secs(), INFEASIBLE_SENTINEL_SECS);
        assert_eq!(solver.checks, 1);
    }

    #[test]
    fn unknown_control_is_terminal() {
        let ctx = context();
        let mut solver = ScriptedSolver {
            answers: vec![SatResult::Unknown("timeout".into())],
            ..Default::default()
        };
        let outcome = check_sample(&mut solver, &ctx, 0, &train(), 1);
        assert_eq!(outcome.verdict(), Some(&Verdict::Unknown("timeout".into())));
        assert_eq!(solver.checks, 1);
    }

    #[test]
    fn solver_errors_become_failed_outcomes() {
        let ctx = context();
        let mut solver = ScriptedSolver::default();
        let outcome = check_sample(&mut solver, &ctx, 2, &train(), 0);
        assert!(matches!(outcome.status, SampleStatus::Failed { .. }));
        assert_eq!(outcome.label(), "failed");
    }

    #[test]
    fn control_mismatch_is_reported_as_failure() {
        let ctx = context();
        // quiet model disagrees with the train, which fires at node 0
        let mut solver = ScriptedSolver {
            answers: vec![SatResult::Sat, SatResult::Unsat],
            model: quiet_model(&ctx),
            ..Default::default()
        };
        let outcome = check_sample(&mut solver, &ctx, 1, &train(), 0);
        match outcome.status {
            SampleStatus::Failed { reason } => assert!(reason.contains("s_0_0_1"), "{reason}"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(solver.checks, 1);
    }

    #[test]
    fn feasible_control_runs_the_second_stage() {
        let ctx = context();
        let silent = SpikeTrain::silent(2, 2);
        let mut solver = ScriptedSolver {
            answers: vec![SatResult::Sat, SatResult::Unsat],
            model: quiet_model(&ctx),
            ..Default::default()
        };
        let outcome = check_sample(&mut solver, &ctx, 3, &silent, 1);
        assert!(outcome.is_robust());
        assert_eq!(outcome.label(), "unsat");
        assert!(outcome.time_secs() >= 0.0);
        assert_eq!(solver.checks, 2);
    }

    #[test]
    fn shape_errors_surface_before_solving() {
        let ctx = context();
        let mut solver = ScriptedSolver {
            answers: vec![SatResult::Sat],
            ..Default::default()
        };
        let wrong = SpikeTrain::silent(3, 2);
        let err = run_query(&mut solver, &ctx, &wrong, 0).unwrap_err();
        assert!(matches!(err, DriverError::Encode(EncodeError::TrainShape { .. })));
        assert_eq!(solver.checks, 0);
    }
}
