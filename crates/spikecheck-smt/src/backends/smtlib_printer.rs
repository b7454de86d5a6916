use num::rational::Rational64;
use num::Zero;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => name.clone(),
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        SmtTerm::RealLit(r) => real_to_smtlib(r),
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::Add(terms) => match terms.as_slice() {
            [] => "0".to_string(),
            [single] => to_smtlib(single),
            _ => {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(+ {})", inner.join(" "))
            }
        },
        SmtTerm::Sub(lhs, rhs) => format!("(- {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => {
            if terms.is_empty() {
                "true".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(and {})", inner.join(" "))
            }
        }
        SmtTerm::Or(terms) => {
            if terms.is_empty() {
                "false".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(or {})", inner.join(" "))
            }
        }
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
        SmtTerm::Ite(cond, then, els) => {
            format!(
                "(ite {} {} {})",
                to_smtlib(cond),
                to_smtlib(then),
                to_smtlib(els)
            )
        }
    }
}

/// Real literals use decimal numerals so strict SMT-LIB readers accept them.
fn real_to_smtlib(r: &Rational64) -> String {
    let numer = r.numer().unsigned_abs();
    let magnitude = if *r.denom() == 1 {
        format!("{numer}.0")
    } else {
        format!("(/ {numer}.0 {}.0)", r.denom())
    };
    if *r.numer() < 0 {
        format!("(- {magnitude})")
    } else {
        magnitude
    }
}

/// Parse a Real value as solvers print it: decimals, `(- x)` and `(/ n d)`.
pub fn parse_real(text: &str) -> Option<Rational64> {
    let text = text.trim();
    if let Some(arg) = application(text, "-") {
        return parse_real(arg).map(|r| -r);
    }
    if let Some(args) = application(text, "/") {
        let (numer, denom) = split_operands(args)?;
        let denom = parse_real(denom)?;
        if denom.is_zero() {
            return None;
        }
        return Some(parse_real(numer)? / denom);
    }
    parse_decimal(text)
}

/// Operands of `(op ...)`, if `text` is exactly that application.
fn application<'a>(text: &'a str, op: &str) -> Option<&'a str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?.trim_start();
    let rest = inner.strip_prefix(op)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

/// Split two space-separated operands, respecting parentheses.
fn split_operands(args: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            c if c.is_whitespace() && depth == 0 => {
                return Some((&args[..i], args[i..].trim()));
            }
            _ => {}
        }
    }
    None
}

fn parse_decimal(text: &str) -> Option<Rational64> {
    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let scale = 10i64.checked_pow(u32::try_from(frac.len()).ok()?)?;
    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
    let numer = whole.checked_mul(scale)?.checked_add(frac)?;
    Some(Rational64::new(numer, scale))
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> &'static str {
    match sort {
        SmtSort::Bool => "Bool",
        SmtSort::Int => "Int",
        SmtSort::Real => "Real",
    }
}
