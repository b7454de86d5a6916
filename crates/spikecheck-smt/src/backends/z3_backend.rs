use std::collections::HashMap;

use num::rational::Rational64;
use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::backends::smtlib_printer::parse_real;
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Sort mismatch for variable {0}")]
    SortMismatch(String),
}

/// Native Z3 backend.
///
/// Z3 contexts are thread-local, so a `Z3Solver` must be created and used
/// on the same thread; worker pools build one per task.
pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, z3::ast::Int>,
    real_vars: HashMap<String, z3::ast::Real>,
    bool_vars: HashMap<String, z3::ast::Bool>,
    _params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        let solver = z3::Solver::new();
        Self {
            solver,
            int_vars: HashMap::new(),
            real_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            _params: None,
        }
    }

    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            return Self::new();
        }
        let solver = z3::Solver::new();
        let mut params = z3::Params::new();
        let timeout_ms = timeout_secs.saturating_mul(1000).min(u64::from(u32::MAX));
        params.set_u32("timeout", timeout_ms as u32);
        solver.set_params(&params);
        Self {
            solver,
            int_vars: HashMap::new(),
            real_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            _params: Some(params),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new()
    }

    fn real_literal(r: &Rational64) -> z3::ast::Real {
        let numer = z3::ast::Int::from_i64(*r.numer()).to_real();
        if *r.denom() == 1 {
            return numer;
        }
        let denom = z3::ast::Int::from_i64(*r.denom()).to_real();
        &numer / &denom
    }

    fn arith_pair(&self, lhs: &SmtTerm, rhs: &SmtTerm) -> Result<ArithPair, Z3Error> {
        let l = self.translate_term(lhs)?;
        let r = self.translate_term(rhs)?;
        match (l, r) {
            (Z3Term::Int(a), Z3Term::Int(b)) => Ok(ArithPair::Int(a, b)),
            (Z3Term::Real(a), Z3Term::Real(b)) => Ok(ArithPair::Real(a, b)),
            (Z3Term::Int(a), Z3Term::Real(b)) => Ok(ArithPair::Real(a.to_real(), b)),
            (Z3Term::Real(a), Z3Term::Int(b)) => Ok(ArithPair::Real(a, b.to_real())),
            _ => Err(Z3Error::Internal("Expected arithmetic operands, got Bool".into())),
        }
    }

    /// Flat n-ary sum; Int unless any summand is Real.
    fn translate_sum(&self, terms: &[SmtTerm]) -> Result<Z3Term, Z3Error> {
        let summands = terms
            .iter()
            .map(|t| self.translate_term(t))
            .collect::<Result<Vec<_>, _>>()?;
        if summands.iter().all(|t| matches!(t, Z3Term::Int(_))) {
            let ints: Vec<z3::ast::Int> = summands
                .into_iter()
                .filter_map(|t| match t {
                    Z3Term::Int(i) => Some(i),
                    _ => None,
                })
                .collect();
            if ints.is_empty() {
                return Ok(Z3Term::Int(z3::ast::Int::from_i64(0)));
            }
            let refs: Vec<&z3::ast::Int> = ints.iter().collect();
            return Ok(Z3Term::Int(z3::ast::Int::add(&refs)));
        }
        let reals = summands
            .into_iter()
            .map(|t| match t {
                Z3Term::Int(i) => Ok(i.to_real()),
                Z3Term::Real(r) => Ok(r),
                Z3Term::Bool(_) => Err(Z3Error::Internal("Bool summand in sum".into())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&z3::ast::Real> = reals.iter().collect();
        Ok(Z3Term::Real(z3::ast::Real::add(&refs)))
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else if let Some(v) = self.real_vars.get(name) {
                    Ok(Z3Term::Real(v.clone()))
                } else if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(z3::ast::Int::from_i64(*n))),
            SmtTerm::RealLit(r) => Ok(Z3Term::Real(Self::real_literal(r))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::Add(terms) => self.translate_sum(terms),
            SmtTerm::Sub(lhs, rhs) => Ok(match self.arith_pair(lhs, rhs)? {
                ArithPair::Int(l, r) => Z3Term::Int(&l - &r),
                ArithPair::Real(l, r) => Z3Term::Real(&l - &r),
            }),
            SmtTerm::Mul(lhs, rhs) => Ok(match self.arith_pair(lhs, rhs)? {
                ArithPair::Int(l, r) => Z3Term::Int(&l * &r),
                ArithPair::Real(l, r) => Z3Term::Real(&l * &r),
            }),
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs)?;
                let r = self.translate_term(rhs)?;
                match (l, r) {
                    (Z3Term::Int(li), Z3Term::Int(ri)) => Ok(Z3Term::Bool(li.eq(&ri))),
                    (Z3Term::Real(lr), Z3Term::Real(rr)) => Ok(Z3Term::Bool(lr.eq(&rr))),
                    (Z3Term::Int(li), Z3Term::Real(rr)) => Ok(Z3Term::Bool(li.to_real().eq(&rr))),
                    (Z3Term::Real(lr), Z3Term::Int(ri)) => Ok(Z3Term::Bool(lr.eq(&ri.to_real()))),
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    _ => Err(Z3Error::Internal("Sort mismatch in Eq".into())),
                }
            }
            SmtTerm::Lt(lhs, rhs) => Ok(Z3Term::Bool(match self.arith_pair(lhs, rhs)? {
                ArithPair::Int(l, r) => l.lt(&r),
                ArithPair::Real(l, r) => l.lt(&r),
            })),
            SmtTerm::Le(lhs, rhs) => Ok(Z3Term::Bool(match self.arith_pair(lhs, rhs)? {
                ArithPair::Int(l, r) => l.le(&r),
                ArithPair::Real(l, r) => l.le(&r),
            })),
            SmtTerm::Gt(lhs, rhs) => Ok(Z3Term::Bool(match self.arith_pair(lhs, rhs)? {
                ArithPair::Int(l, r) => l.gt(&r),
                ArithPair::Real(l, r) => l.gt(&r),
            })),
            SmtTerm::Ge(lhs, rhs) => Ok(Z3Term::Bool(match self.arith_pair(lhs, rhs)? {
                ArithPair::Int(l, r) => l.ge(&r),
                ArithPair::Real(l, r) => l.ge(&r),
            })),
            SmtTerm::And(terms) => {
                let bools: Result<Vec<_>, _> = terms
                    .iter()
                    .map(|t| self.translate_term(t).and_then(|z| z.into_bool()))
                    .collect();
                let bools = bools?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools: Result<Vec<_>, _> = terms
                    .iter()
                    .map(|t| self.translate_term(t).and_then(|z| z.into_bool()))
                    .collect();
                let bools = bools?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_bool()?;
                let r = self.translate_term(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond)?.into_bool()?;
                let t = self.translate_term(then)?;
                let e = self.translate_term(els)?;
                match (t, e) {
                    (Z3Term::Int(ti), Z3Term::Int(ei)) => Ok(Z3Term::Int(c.ite(&ti, &ei))),
                    (Z3Term::Real(tr), Z3Term::Real(er)) => Ok(Z3Term::Real(c.ite(&tr, &er))),
                    (Z3Term::Bool(tb), Z3Term::Bool(eb)) => Ok(Z3Term::Bool(c.ite(&tb, &eb))),
                    _ => Err(Z3Error::Internal("Sort mismatch in ITE".into())),
                }
            }
        }
    }
}

enum Z3Term {
    Int(z3::ast::Int),
    Real(z3::ast::Real),
    Bool(z3::ast::Bool),
}

enum ArithPair {
    Int(z3::ast::Int, z3::ast::Int),
    Real(z3::ast::Real, z3::ast::Real),
}

impl Z3Term {
    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) => Err(Z3Error::Internal("Expected Bool, got Int".into())),
            Z3Term::Real(_) => Err(Z3Error::Internal("Expected Bool, got Real".into())),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        let clash = match sort {
            SmtSort::Int => self.real_vars.contains_key(name) || self.bool_vars.contains_key(name),
            SmtSort::Real => self.int_vars.contains_key(name) || self.bool_vars.contains_key(name),
            SmtSort::Bool => self.int_vars.contains_key(name) || self.real_vars.contains_key(name),
        };
        if clash {
            return Err(Z3Error::SortMismatch(name.to_string()));
        }
        match sort {
            SmtSort::Int => {
                let v = z3::ast::Int::new_const(name);
                self.int_vars.insert(name.to_string(), v);
            }
            SmtSort::Real => {
                let v = z3::ast::Real::new_const(name);
                self.real_vars.insert(name.to_string(), v);
            }
            SmtSort::Bool => {
                let v = z3::ast::Bool::new_const(name);
                self.bool_vars.insert(name.to_string(), v);
            }
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => Ok(SatResult::Unknown(self.unknown_reason())),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => {
                let z3_model = self
                    .solver
                    .get_model()
                    .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
                let mut values = HashMap::new();

                for &(name, sort) in var_names {
                    match sort {
                        SmtSort::Int => {
                            if let Some(v) = self.int_vars.get(name) {
                                if let Some(val) = z3_model.eval::<z3::ast::Int>(v, true) {
                                    if let Some(n) = val.as_i64() {
                                        values.insert(name.to_string(), ModelValue::Int(n));
                                    }
                                }
                            }
                        }
                        SmtSort::Bool => {
                            if let Some(v) = self.bool_vars.get(name) {
                                if let Some(val) = z3_model.eval::<z3::ast::Bool>(v, true) {
                                    if let Some(b) = val.as_bool() {
                                        values.insert(name.to_string(), ModelValue::Bool(b));
                                    }
                                }
                            }
                        }
                        SmtSort::Real => {
                            if let Some(v) = self.real_vars.get(name) {
                                if let Some(val) = z3_model.eval::<z3::ast::Real>(v, true) {
                                    if let Some(r) = parse_real(&val.to_string()) {
                                        values.insert(name.to_string(), ModelValue::Real(r));
                                    }
                                }
                            }
                        }
                    }
                }

                Ok((SatResult::Sat, Some(Model { values })))
            }
            Z3SatResult::Unsat => Ok((SatResult::Unsat, None)),
            Z3SatResult::Unknown => Ok((SatResult::Unknown(self.unknown_reason()), None)),
        }
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply timeout if configured.
        if let Some(params) = &self._params {
            self.solver.set_params(params);
        }
        self.int_vars.clear();
        self.real_vars.clear();
        self.bool_vars.clear();
        Ok(())
    }
}

impl Z3Solver {
    fn unknown_reason(&self) -> String {
        self.solver
            .get_reason_unknown()
            .unwrap_or_else(|| "Z3 returned unknown".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn gated(spike: &str, weight: Rational64) -> SmtTerm {
        SmtTerm::ite(SmtTerm::var(spike), SmtTerm::real(weight), SmtTerm::real_zero())
    }

    #[test]
    fn z3_weighted_drive_selects_firing_inputs() -> TestResult {
        let mut solver = Z3Solver::with_default_config();
        let spikes = ["s_0_0_1", "s_1_0_1", "s_2_0_1"];
        for name in spikes {
            solver.declare_var(name, &SmtSort::Bool)?;
        }
        solver.declare_var("p_0_1_1", &SmtSort::Real)?;

        // p = 1/2·s0 + 3/4·s1 − 1/4·s2, two inputs fire, p > 1
        let weights = [Rational64::new(1, 2), Rational64::new(3, 4), Rational64::new(-1, 4)];
        let drive = SmtTerm::sum(
            spikes.iter().zip(weights).map(|(s, w)| gated(s, w)),
            SmtTerm::real_zero(),
        );
        solver.assert(&SmtTerm::var("p_0_1_1").eq(drive))?;
        let fired = SmtTerm::sum(
            spikes
                .iter()
                .map(|s| SmtTerm::ite(SmtTerm::var(*s), SmtTerm::int(1), SmtTerm::int(0))),
            SmtTerm::int(0),
        );
        solver.assert(&fired.eq(SmtTerm::int(2)))?;
        solver.assert(&SmtTerm::var("p_0_1_1").gt(SmtTerm::real(Rational64::new(1, 1))))?;

        let vars: Vec<(&str, &SmtSort)> = spikes.iter().map(|s| (*s, &SmtSort::Bool)).collect();
        let (result, model) = solver.check_sat_with_model(&vars)?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get_bool("s_0_0_1"), Some(true));
        assert_eq!(model.get_bool("s_1_0_1"), Some(true));
        assert_eq!(model.get_bool("s_2_0_1"), Some(false));
        Ok(())
    }

    #[test]
    fn z3_drive_below_threshold_is_unsat() -> TestResult {
        let mut solver = Z3Solver::with_default_config();
        let spikes = ["s_0_0_1", "s_1_0_1", "s_2_0_1"];
        for name in spikes {
            solver.declare_var(name, &SmtSort::Bool)?;
        }
        let quarter = Rational64::new(1, 4);
        let drive = SmtTerm::sum(spikes.iter().map(|s| gated(s, quarter)), SmtTerm::real_zero());
        solver.assert(&drive.gt(SmtTerm::real(Rational64::new(1, 1))))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn z3_sum_promotes_int_summands() -> TestResult {
        let mut solver = Z3Solver::with_default_config();
        solver.declare_var("n", &SmtSort::Int)?;
        let mixed = SmtTerm::sum(
            vec![SmtTerm::var("n"), SmtTerm::real(Rational64::new(1, 2))],
            SmtTerm::real_zero(),
        );
        solver.assert(&mixed.eq(SmtTerm::real(Rational64::new(5, 2))))?;
        let (result, model) = solver.check_sat_with_model(&[("n", &SmtSort::Int)])?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get_int("n"), Some(2));
        Ok(())
    }

    #[test]
    fn z3_bool_summand_is_rejected() -> TestResult {
        let mut solver = Z3Solver::with_default_config();
        solver.declare_var("s", &SmtSort::Bool)?;
        let bad = SmtTerm::var("s").add(SmtTerm::int(1)).gt(SmtTerm::int(0));
        assert!(matches!(solver.assert(&bad), Err(Z3Error::Internal(_))));
        Ok(())
    }

    #[test]
    fn z3_real_leak_arithmetic() -> TestResult {
        let mut solver = Z3Solver::with_default_config();
        solver.declare_var("p0", &SmtSort::Real)?;
        solver.declare_var("p1", &SmtSort::Real)?;

        // p0 = 1, p1 = 19/20 * p0 + 1/2, so p1 = 29/20 > 1.4 but not > 1.5
        solver.assert(&SmtTerm::var("p0").eq(SmtTerm::real(Rational64::new(1, 1))))?;
        solver.assert(
            &SmtTerm::var("p1").eq(SmtTerm::real(Rational64::new(19, 20))
                .mul(SmtTerm::var("p0"))
                .add(SmtTerm::real(Rational64::new(1, 2)))),
        )?;
        solver.push()?;
        solver.assert(&SmtTerm::var("p1").gt(SmtTerm::real(Rational64::new(7, 5))))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        solver.pop()?;
        solver.assert(&SmtTerm::var("p1").gt(SmtTerm::real(Rational64::new(3, 2))))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn z3_mixed_int_real_comparison_promotes() -> TestResult {
        let mut solver = Z3Solver::with_default_config();
        solver.declare_var("n", &SmtSort::Int)?;
        solver.declare_var("r", &SmtSort::Real)?;
        solver.assert(&SmtTerm::var("r").eq(SmtTerm::real(Rational64::new(5, 2))))?;
        solver.assert(&SmtTerm::var("n").gt(SmtTerm::var("r")))?;
        solver.assert(&SmtTerm::var("n").lt(SmtTerm::int(4)))?;

        let vars = vec![("n", &SmtSort::Int)];
        let (result, model) = solver.check_sat_with_model(&vars)?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get_int("n"), Some(3));
        Ok(())
    }

    #[test]
    fn z3_timeout_configuration_survives_reset() -> TestResult {
        let mut solver = Z3Solver::with_timeout_secs(2);
        assert!(
            solver._params.is_some(),
            "timeout-backed solver should persist params for reset()"
        );

        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);

        solver.reset()?;
        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(2)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        assert!(
            solver._params.is_some(),
            "timeout parameters should still be available after reset()"
        );
        Ok(())
    }

    #[test]
    fn z3_redeclaration_with_other_sort_is_rejected() -> TestResult {
        let mut solver = Z3Solver::with_default_config();
        solver.declare_var("x", &SmtSort::Int)?;
        solver.declare_var("x", &SmtSort::Int)?;
        assert!(matches!(
            solver.declare_var("x", &SmtSort::Bool),
            Err(Z3Error::SortMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn z3_translate_real_ite() -> TestResult {
        let mut solver = Z3Solver::with_default_config();
        solver.declare_var("s", &SmtSort::Bool)?;
        solver.declare_var("p", &SmtSort::Real)?;

        // p == ite(s, 3/2, 0) && p > 1  forces s
        solver.assert(&SmtTerm::var("p").eq(SmtTerm::ite(
            SmtTerm::var("s"),
            SmtTerm::real(Rational64::new(3, 2)),
            SmtTerm::real_zero(),
        )))?;
        solver.assert(&SmtTerm::var("p").gt(SmtTerm::real(Rational64::new(1, 1))))?;

        let vars = vec![("s", &SmtSort::Bool), ("p", &SmtSort::Real)];
        let (result, model) = solver.check_sat_with_model(&vars)?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get_bool("s"), Some(true));
        assert_eq!(model.get_real("p"), Some(Rational64::new(3, 2)));
        Ok(())
    }

    #[test]
    fn z3_rejects_undeclared_variable() {
        let mut solver = Z3Solver::with_default_config();
        let result = solver.assert(&SmtTerm::var("ghost").gt(SmtTerm::int(0)));
        assert!(matches!(result, Err(Z3Error::UnknownVariable(name)) if name == "ghost"));
    }
}
