//! Bounded perturbation of the input spike train.
//!
//! Only input-layer spike symbols at steps `1..=T` are constrained, and no
//! new symbols are introduced.

use serde::{Deserialize, Serialize};
use spikecheck_ir::spike_train::SpikeTrain;

use super::variables::{NeuronIdx, SymbolTable};
use super::{ConstraintSet, EncodeError};
use crate::solver::Model;
use crate::terms::SmtTerm;

/// How flipped input positions are counted against δ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerturbationMetric {
    /// Total number of flipped (step, neuron) positions.
    #[default]
    Hamming,
    /// Flips per input neuron, each bounded separately.
    PerNeuron,
}

impl PerturbationMetric {
    /// Largest distance any perturbation can reach under this metric.
    pub fn max_distance(self, num_steps: usize, input_width: usize) -> usize {
        match self {
            Self::Hamming => num_steps * input_width,
            Self::PerNeuron => num_steps,
        }
    }
}

fn check_train_shape(symbols: &SymbolTable, train: &SpikeTrain) -> Result<(), EncodeError> {
    let expected_width = symbols.width(0);
    if train.num_steps() != symbols.num_steps() || train.width() != expected_width {
        return Err(EncodeError::TrainShape {
            expected_steps: symbols.num_steps(),
            expected_width,
            actual_steps: train.num_steps(),
            actual_width: train.width(),
        });
    }
    Ok(())
}

/// Fix every input spike symbol to the concrete train.
pub fn encode_input_pin(symbols: &SymbolTable, train: &SpikeTrain) -> Result<ConstraintSet, EncodeError> {
    check_train_shape(symbols, train)?;
    let mut set = ConstraintSet::new();
    for step in 1..=train.num_steps() {
        for node in 0..train.width() {
            let spike = symbols.spike(NeuronIdx::new(node, 0, step)).term();
            set.assert_term(if train.fires(step, node) { spike } else { spike.not() });
        }
    }
    Ok(set)
}

/// Distance bound around the control run's input.
///
/// Reference bits come from `control` (the feasibility model), falling back
/// to `train` for positions the model omits. A model value that disagrees
/// with the train is rejected.
pub fn encode_delta_reuse(
    symbols: &SymbolTable,
    train: &SpikeTrain,
    delta: u32,
    control: &Model,
    metric: PerturbationMetric,
) -> Result<ConstraintSet, EncodeError> {
    check_train_shape(symbols, train)?;

    let mut per_neuron: Vec<Vec<SmtTerm>> = vec![Vec::with_capacity(train.num_steps()); train.width()];
    for step in 1..=train.num_steps() {
        for (node, flips) in per_neuron.iter_mut().enumerate() {
            let spike = symbols.spike(NeuronIdx::new(node, 0, step));
            let concrete = train.fires(step, node);
            let reference = match control.get_bool(spike.name()) {
                Some(model_value) if model_value != concrete => {
                    return Err(EncodeError::ControlMismatch {
                        symbol: spike.name().to_string(),
                        model_value,
                        concrete_value: concrete,
                    });
                }
                Some(model_value) => model_value,
                None => concrete,
            };
            let flipped = if reference { spike.term().not() } else { spike.term() };
            flips.push(SmtTerm::ite(flipped, SmtTerm::int(1), SmtTerm::int(0)));
        }
    }

    let bound = SmtTerm::int(i64::from(delta));
    let mut set = ConstraintSet::new();
    match metric {
        PerturbationMetric::Hamming => {
            let all = per_neuron.into_iter().flatten();
            set.assert_term(SmtTerm::sum(all, SmtTerm::int(0)).le(bound));
        }
        PerturbationMetric::PerNeuron => {
            for flips in per_neuron {
                set.assert_term(SmtTerm::sum(flips, SmtTerm::int(0)).le(bound.clone()));
            }
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::z3_backend::Z3Solver;
    use crate::solver::{ModelValue, SatResult, SmtSolver};
    use crate::sorts::SmtSort;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn train() -> SpikeTrain {
        SpikeTrain::from_rows(vec![vec![true, false], vec![false, false], vec![true, true]]).unwrap()
    }

    fn inputs_only(symbols: &SymbolTable) -> Vec<(String, SmtSort)> {
        symbols
            .spikes()
            .filter(|(idx, _)| idx.layer == 0)
            .map(|(_, v)| (v.name().to_string(), SmtSort::Bool))
            .collect()
    }

    #[test]
    fn max_distance_by_metric() {
        assert_eq!(PerturbationMetric::Hamming.max_distance(25, 4), 100);
        assert_eq!(PerturbationMetric::PerNeuron.max_distance(25, 4), 25);
    }

    #[test]
    fn metric_names_are_kebab_case() -> TestResult {
        let parsed: PerturbationMetric = serde_json::from_str("\"per-neuron\"")?;
        assert_eq!(parsed, PerturbationMetric::PerNeuron);
        assert_eq!(serde_json::to_string(&PerturbationMetric::Hamming)?, "\"hamming\"");
        Ok(())
    }

    #[test]
    fn constraint_count_by_metric() -> TestResult {
        let symbols = SymbolTable::new(&[2, 3], 3);
        let control = Model::default();
        let hamming = encode_delta_reuse(&symbols, &train(), 1, &control, PerturbationMetric::Hamming)?;
        let per_neuron = encode_delta_reuse(&symbols, &train(), 1, &control, PerturbationMetric::PerNeuron)?;
        assert_eq!(hamming.len(), 1);
        assert_eq!(per_neuron.len(), 2);
        Ok(())
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let symbols = SymbolTable::new(&[3, 3], 3);
        let err = encode_input_pin(&symbols, &train()).unwrap_err();
        assert_eq!(
            err,
            EncodeError::TrainShape {
                expected_steps: 3,
                expected_width: 3,
                actual_steps: 3,
                actual_width: 2,
            }
        );
    }

    #[test]
    fn control_model_disagreeing_with_train_is_rejected() {
        let symbols = SymbolTable::new(&[2, 3], 3);
        let mut control = Model::default();
        control.values.insert("s_0_0_1".into(), ModelValue::Bool(true));
        control.values.insert("s_1_0_1".into(), ModelValue::Bool(true));
        let err =
            encode_delta_reuse(&symbols, &train(), 1, &control, PerturbationMetric::Hamming).unwrap_err();
        assert_eq!(
            err,
            EncodeError::ControlMismatch {
                symbol: "s_1_0_1".into(),
                model_value: true,
                concrete_value: false,
            }
        );
    }

    fn count_solutions(delta: u32, metric: PerturbationMetric) -> Result<usize, Box<dyn std::error::Error>> {
        let symbols = SymbolTable::new(&[2, 3], 3);
        let decls = inputs_only(&symbols);
        let set = encode_delta_reuse(&symbols, &train(), delta, &Model::default(), metric)?;
        let mut solver = Z3Solver::new();
        for (name, sort) in &decls {
            solver.declare_var(name, sort)?;
        }
        for term in set.assertions() {
            solver.assert(term)?;
        }
        let wanted: Vec<_> = decls.iter().map(|(n, s)| (n.as_str(), s)).collect();
        let mut found = 0;
        loop {
            let (result, model) = solver.check_sat_with_model(&wanted)?;
            if result != SatResult::Sat {
                return Ok(found);
            }
            let model = model.ok_or("sat without model")?;
            found += 1;
            let blocking: Vec<SmtTerm> = wanted
                .iter()
                .map(|(name, _)| {
                    let v = SmtTerm::var(*name);
                    if model.get_bool(name).unwrap_or(false) {
                        v.not()
                    } else {
                        v
                    }
                })
                .collect();
            solver.assert(&SmtTerm::or(blocking))?;
        }
    }

    #[test]
    fn zero_delta_admits_only_the_reference_train() -> TestResult {
        assert_eq!(count_solutions(0, PerturbationMetric::Hamming)?, 1);
        Ok(())
    }

    #[test]
    fn solution_counts_follow_the_metric() -> TestResult {
        // six positions: 1 + 6 trains within Hamming distance one,
        // (1 + 3) * (1 + 3) with one flip allowed per neuron
        assert_eq!(count_solutions(1, PerturbationMetric::Hamming)?, 7);
        assert_eq!(count_solutions(1, PerturbationMetric::PerNeuron)?, 16);
        Ok(())
    }
}
