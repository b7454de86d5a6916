use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;

use crate::backends::smtlib_printer::{parse_real, sort_to_smtlib, to_smtlib};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

const CVC5_BINARY: &str = "cvc5";

/// Spike dynamics mix Bool, Int and Real terms, so no single QF logic fits.
const LOGIC: &str = "(set-logic ALL)";

#[derive(Debug, Error)]
pub enum Cvc5Error {
    #[error("cvc5 I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cvc5 not found: {0}")]
    NotFound(String),
    #[error("cvc5 error: {0}")]
    SolverError(String),
}

/// cvc5 driven over SMT-LIB2 through a child process.
///
/// Every instance owns its own solver process, shut down on drop. Models
/// are read with one batched `get-value` per check, so wide input layers
/// cost a single round trip.
pub struct Cvc5Solver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    declared: HashMap<String, SmtSort>,
}

impl Cvc5Solver {
    pub fn new() -> Result<Self, Cvc5Error> {
        Self::spawn(None)
    }

    /// Per-query time limit; 0 disables it.
    pub fn with_timeout_secs(timeout_secs: u64) -> Result<Self, Cvc5Error> {
        Self::spawn((timeout_secs > 0).then(|| timeout_secs.saturating_mul(1000)))
    }

    fn spawn(timeout_ms: Option<u64>) -> Result<Self, Cvc5Error> {
        let mut command = Command::new(CVC5_BINARY);
        command.args(["--lang", "smt2", "--incremental", "--produce-models"]);
        if let Some(ms) = timeout_ms {
            command.arg(format!("--tlimit-per={ms}"));
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Cvc5Error::NotFound(format!("{CVC5_BINARY}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("stdout not captured".into()))?;

        let mut solver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            declared: HashMap::new(),
        };
        solver.send(LOGIC)?;
        Ok(solver)
    }

    /// Write a command that produces no output.
    fn send(&mut self, command: &str) -> Result<(), Cvc5Error> {
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Write a command and read one complete reply, which may span lines.
    fn query(&mut self, command: &str) -> Result<String, Cvc5Error> {
        self.send(command)?;
        let mut reply = String::new();
        loop {
            let read = self.stdout.read_line(&mut reply)?;
            if read == 0 {
                return Err(Cvc5Error::SolverError(format!("cvc5 exited while answering `{command}`")));
            }
            if paren_depth(&reply) <= 0 {
                break;
            }
        }
        let reply = reply.trim().to_string();
        if reply.starts_with("(error") {
            return Err(Cvc5Error::SolverError(reply));
        }
        Ok(reply)
    }
}

impl Drop for Cvc5Solver {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

impl SmtSolver for Cvc5Solver {
    type Error = Cvc5Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Cvc5Error> {
        if self.declared.contains_key(name) {
            return Ok(());
        }
        self.send(&format!("(declare-const {name} {})", sort_to_smtlib(sort)))?;
        self.declared.insert(name.to_string(), sort.clone());
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Cvc5Error> {
        self.send(&format!("(assert {})", to_smtlib(term)))
    }

    fn push(&mut self) -> Result<(), Cvc5Error> {
        self.send("(push 1)")
    }

    fn pop(&mut self) -> Result<(), Cvc5Error> {
        self.send("(pop 1)")
    }

    fn check_sat(&mut self) -> Result<SatResult, Cvc5Error> {
        let reply = self.query("(check-sat)")?;
        match reply.as_str() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => Ok(SatResult::Unknown("cvc5 returned unknown".into())),
            other => Err(Cvc5Error::SolverError(other.to_string())),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Cvc5Error> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }
        if var_names.is_empty() {
            return Ok((result, Some(Model::default())));
        }

        let names: Vec<&str> = var_names.iter().map(|(name, _)| *name).collect();
        let reply = self.query(&format!("(get-value ({}))", names.join(" ")))?;
        let assigned: HashMap<&str, &str> = value_pairs(&reply).into_iter().collect();

        let mut values = HashMap::new();
        for &(name, sort) in var_names {
            if let Some(value) = assigned.get(name).and_then(|text| parse_value(text, sort)) {
                values.insert(name.to_string(), value);
            }
        }
        Ok((SatResult::Sat, Some(Model { values })))
    }

    fn reset(&mut self) -> Result<(), Cvc5Error> {
        self.send("(reset)")?;
        self.send(LOGIC)?;
        self.declared.clear();
        Ok(())
    }
}

/// Open minus close parentheses in `text`.
fn paren_depth(text: &str) -> i64 {
    text.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// Top-level elements of the s-expression list `text`, unparsed.
fn list_items(text: &str) -> Option<Vec<&str>> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => {
                if depth == 0 && start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    items.push(&inner[start.take()?..=i]);
                }
            }
            c if c.is_whitespace() => {
                if depth == 0 {
                    if let Some(s) = start.take() {
                        items.push(&inner[s..i]);
                    }
                }
            }
            _ => {
                if start.is_none() {
                    start = Some(i);
                }
            }
        }
    }
    if let Some(s) = start {
        items.push(&inner[s..]);
    }
    Some(items)
}

/// `(name value)` pairs of a `get-value` reply.
fn value_pairs(reply: &str) -> Vec<(&str, &str)> {
    list_items(reply)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|pair| match list_items(pair)?.as_slice() {
            [name, value] => Some((*name, *value)),
            _ => None,
        })
        .collect()
}

fn parse_value(text: &str, sort: &SmtSort) -> Option<ModelValue> {
    match sort {
        SmtSort::Bool => match text {
            "true" => Some(ModelValue::Bool(true)),
            "false" => Some(ModelValue::Bool(false)),
            _ => None,
        },
        SmtSort::Int => parse_int(text).map(ModelValue::Int),
        SmtSort::Real => parse_real(text).map(ModelValue::Real),
    }
}

fn parse_int(text: &str) -> Option<i64> {
    match text.strip_prefix("(- ").and_then(|t| t.strip_suffix(')')) {
        Some(magnitude) => magnitude.trim().parse::<i64>().ok().map(|n| -n),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::rational::Rational64;

    #[test]
    fn reply_depth_tracks_nesting() {
        assert_eq!(paren_depth("sat"), 0);
        assert_eq!(paren_depth("((s_0_0_1 true)"), 1);
        assert_eq!(paren_depth("((s_0_0_1 true) (p_0_1_1 (/ 1 2)))"), 0);
    }

    #[test]
    fn batched_reply_splits_into_pairs() {
        let reply = "((s_0_0_1 true) (s_1_0_1 false) (p_0_1_1 (- (/ 3 4))) (n (- 7)))";
        assert_eq!(
            value_pairs(reply),
            vec![
                ("s_0_0_1", "true"),
                ("s_1_0_1", "false"),
                ("p_0_1_1", "(- (/ 3 4))"),
                ("n", "(- 7)"),
            ]
        );
    }

    #[test]
    fn values_parse_by_sort() {
        assert_eq!(parse_value("true", &SmtSort::Bool), Some(ModelValue::Bool(true)));
        assert_eq!(parse_value("(- 7)", &SmtSort::Int), Some(ModelValue::Int(-7)));
        assert_eq!(parse_value("42", &SmtSort::Int), Some(ModelValue::Int(42)));
        assert_eq!(
            parse_value("(/ 29 20)", &SmtSort::Real),
            Some(ModelValue::Real(Rational64::new(29, 20)))
        );
        assert_eq!(
            parse_value("2.0", &SmtSort::Real),
            Some(ModelValue::Real(Rational64::from_integer(2)))
        );
        assert_eq!(parse_value("true", &SmtSort::Int), None);
    }

    #[test]
    fn malformed_replies_yield_no_values() {
        assert!(value_pairs("unsat").is_empty());
        assert!(value_pairs("((s_0_0_1))").is_empty());
        assert!(value_pairs("((a true) (b").is_empty());
    }
}
