use num::rational::Rational64;
use num::Zero;

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Exact rational literal of sort Real.
    RealLit(Rational64),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    /// N-ary sum, kept flat so wide fan-in never nests.
    Add(Vec<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn real(r: Rational64) -> Self {
        SmtTerm::RealLit(r)
    }

    pub fn real_zero() -> Self {
        SmtTerm::RealLit(Rational64::zero())
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    /// `self + other`, splicing operands that are already sums.
    pub fn add(self, other: SmtTerm) -> Self {
        let mut terms = match self {
            SmtTerm::Add(terms) => terms,
            lhs => vec![lhs],
        };
        match other {
            SmtTerm::Add(more) => terms.extend(more),
            rhs => terms.push(rhs),
        }
        SmtTerm::Add(terms)
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    /// One flat sum of `terms`; `zero` when there are none.
    pub fn sum(terms: impl IntoIterator<Item = SmtTerm>, zero: SmtTerm) -> Self {
        let mut terms: Vec<SmtTerm> = terms.into_iter().collect();
        if terms.len() <= 1 {
            return terms.pop().unwrap_or(zero);
        }
        SmtTerm::Add(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_nothing_is_zero() {
        assert_eq!(SmtTerm::sum(Vec::new(), SmtTerm::int(0)), SmtTerm::int(0));
    }

    #[test]
    fn sum_of_one_is_the_term() {
        assert_eq!(SmtTerm::sum(vec![SmtTerm::var("a")], SmtTerm::int(0)), SmtTerm::var("a"));
    }

    #[test]
    fn sums_stay_flat() {
        let s = SmtTerm::sum(
            vec![SmtTerm::var("a"), SmtTerm::var("b"), SmtTerm::var("c")],
            SmtTerm::int(0),
        );
        assert_eq!(
            s,
            SmtTerm::var("a")
                .add(SmtTerm::var("b"))
                .add(SmtTerm::var("c"))
        );
        assert_eq!(
            s,
            SmtTerm::Add(vec![SmtTerm::var("a"), SmtTerm::var("b"), SmtTerm::var("c")])
        );
    }

    #[test]
    fn wide_sum_has_depth_one() {
        let flips = (0..10_000).map(|i| {
            SmtTerm::ite(SmtTerm::var(format!("s_{i}_0_1")), SmtTerm::int(1), SmtTerm::int(0))
        });
        match SmtTerm::sum(flips, SmtTerm::int(0)) {
            SmtTerm::Add(terms) => {
                assert_eq!(terms.len(), 10_000);
                assert!(terms.iter().all(|t| matches!(t, SmtTerm::Ite(..))));
            }
            other => panic!("expected a flat sum, got {other:?}"),
        }
    }
}
