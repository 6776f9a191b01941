//! Load-time domain and interval analysis. Computed once per
//! expression when a task is built, to size per-evaluatable vector
//! caches and to support reward-lock pruning.

use super::eval::KleeneEnv;
use super::expr::{Expr, ExprArena, ExprId};
use crate::state::kleene::{self, ValueSet};

/// a closed interval `[min, max]`, using signed infinities for
/// expressions whose range load-time analysis cannot bound tightly
/// (e.g. division by an operand whose domain spans zero).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn point(v: f64) -> Self {
        Self { min: v, max: v }
    }

    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    pub fn contains_zero(&self) -> bool {
        self.min <= 0.0 && self.max >= 0.0
    }

    fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// per-fluent domains used for both interval and Kleene "widest state"
/// domain analysis: state fluents carry their declared finite domain,
/// action fluents are binary, non-fluents are a single known constant.
pub struct DomainEnv<'a> {
    pub state_domains: &'a [ValueSet],
    pub action_domains: &'a [ValueSet],
    pub non_fluents: &'a [f64],
}

impl ExprArena {
    /// the set of values an expression can take across every
    /// combination of its operands' declared domains — reusing the
    /// Kleene evaluator's cross-product machinery with "the whole
    /// domain" standing in for "certainly one of these".
    pub fn calc_domain(&self, id: ExprId, domains: &DomainEnv) -> ValueSet {
        let non_fluents: Vec<f64> = domains.non_fluents.to_vec();
        let kenv = KleeneEnv {
            state: domains.state_domains,
            // action domains are finite but the Kleene evaluator wants
            // concrete per-fluent values for actions; since every
            // combination is already folded into `state_domains`-style
            // sets when an expression reads an action fluent, callers
            // that need action-dependent domains should widen the
            // relevant `ActionFluent` leaf themselves. For the common
            // case (reward/CPF domains independent of the *specific*
            // action taken) zero is a representative default.
            action: &vec![0.0; domains.action_domains.len()],
            non_fluents: &non_fluents,
        };
        self.evaluate_kleene(id, &kenv)
    }

    /// the interval `[min, max]` an expression's value can take, given
    /// each leaf's interval. Unlike the cross-product set calculation,
    /// this tracks only the two endpoints, so each connective has its
    /// own bound-propagation rule.
    ///
    /// division's interval is the min/max over *all four* endpoint
    /// products of the numerator and reciprocal-of-denominator
    /// intervals, not a single arm — using only one pair of endpoints
    /// silently narrows the bound whenever the narrower product isn't
    /// the one computed.
    pub fn calc_interval(&self, id: ExprId, leaves: &dyn Fn(ExprId) -> Option<Interval>) -> Interval {
        if let Some(iv) = leaves(id) {
            return iv;
        }
        match self.get(id) {
            Expr::Const(c) => Interval::point(*c),
            Expr::StateFluent(_) | Expr::ActionFluent(_) | Expr::NonFluent(_) => Interval::unbounded(),

            Expr::Not(_) | Expr::Bernoulli(_) => Interval { min: 0.0, max: 1.0 },
            Expr::Neg(e) => {
                let iv = self.calc_interval(*e, leaves);
                Interval {
                    min: -iv.max,
                    max: -iv.min,
                }
            }
            Expr::Exp(e) => {
                let iv = self.calc_interval(*e, leaves);
                Interval {
                    min: iv.min.exp(),
                    max: iv.max.exp(),
                }
            }

            Expr::And(_) | Expr::Or(_) | Expr::Eq(..) | Expr::Lt(..) | Expr::Gt(..) | Expr::Le(..) | Expr::Ge(..) => {
                Interval { min: 0.0, max: 1.0 }
            }

            Expr::Add(es) => es.iter().fold(Interval::point(0.0), |acc, &e| {
                let iv = self.calc_interval(e, leaves);
                Interval {
                    min: acc.min + iv.min,
                    max: acc.max + iv.max,
                }
            }),
            Expr::Sub(a, b) => {
                let ia = self.calc_interval(*a, leaves);
                let ib = self.calc_interval(*b, leaves);
                Interval {
                    min: ia.min - ib.max,
                    max: ia.max - ib.min,
                }
            }
            Expr::Mul(es) => es.iter().fold(Interval::point(1.0), |acc, &e| {
                let iv = self.calc_interval(e, leaves);
                mul_interval(acc, iv)
            }),
            Expr::Div(a, b) => {
                let ia = self.calc_interval(*a, leaves);
                let ib = self.calc_interval(*b, leaves);
                if ib.contains_zero() {
                    // division by an interval spanning zero is
                    // unbounded in both directions; widen rather than
                    // silently pick an endpoint.
                    return Interval::unbounded();
                }
                // all four endpoint products of `ia` against the
                // reciprocal interval of `ib`.
                let reciprocal = Interval {
                    min: 1.0 / ib.max,
                    max: 1.0 / ib.min,
                };
                mul_interval(ia, reciprocal)
            }

            Expr::IfThenElse(_, t, f) => {
                let it = self.calc_interval(*t, leaves);
                let ifa = self.calc_interval(*f, leaves);
                it.union(ifa)
            }
            Expr::Switch(cases) => cases
                .iter()
                .map(|&(_, branch)| self.calc_interval(branch, leaves))
                .reduce(Interval::union)
                .unwrap_or(Interval::point(0.0)),

            Expr::KronDelta(e) => self.calc_interval(*e, leaves),
            Expr::Discrete(pairs) => pairs
                .iter()
                .map(|&(v, _)| self.calc_interval(v, leaves))
                .reduce(Interval::union)
                .unwrap_or(Interval::point(0.0)),
        }
    }
}

/// min/max over all four endpoint products of two intervals — the
/// fix for the division bug described above, also reused by `Mul`.
fn mul_interval(a: Interval, b: Interval) -> Interval {
    let candidates = [a.min * b.min, a.min * b.max, a.max * b.min, a.max * b.max];
    Interval {
        min: candidates.iter().copied().fold(f64::INFINITY, f64::min),
        max: candidates.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::expr::Expr;

    #[test]
    fn division_interval_considers_all_four_endpoint_products() {
        let mut arena = ExprArena::new();
        // numerator in [-2, 3], denominator in [1, 2]: the widest
        // product pairs -2 with the largest reciprocal (1.0), giving
        // a minimum of -2, not just (-2 * 1) vs (3 * 0.5) = 1.5.
        let num = arena.constant(0.0);
        let den = arena.constant(0.0);
        let div = arena.push(Expr::Div(num, den));
        let leaves = |id: ExprId| -> Option<Interval> {
            if id == num {
                Some(Interval { min: -2.0, max: 3.0 })
            } else if id == den {
                Some(Interval { min: 1.0, max: 2.0 })
            } else {
                None
            }
        };
        let iv = arena.calc_interval(div, &leaves);
        assert_eq!(iv.min, -2.0);
        assert_eq!(iv.max, 3.0);
    }

    #[test]
    fn division_by_interval_spanning_zero_is_unbounded() {
        let mut arena = ExprArena::new();
        let num = arena.constant(0.0);
        let den = arena.constant(0.0);
        let div = arena.push(Expr::Div(num, den));
        let leaves = |id: ExprId| -> Option<Interval> {
            if id == num {
                Some(Interval::point(1.0))
            } else if id == den {
                Some(Interval { min: -1.0, max: 1.0 })
            } else {
                None
            }
        };
        let iv = arena.calc_interval(div, &leaves);
        assert_eq!(iv, Interval::unbounded());
    }

    #[test]
    fn calc_domain_reuses_kleene_cross_product_over_whole_domains() {
        let mut arena = ExprArena::new();
        let a = arena.push(Expr::StateFluent(0));
        let b = arena.push(Expr::StateFluent(1));
        let sum = arena.push(Expr::Add(vec![a, b]));
        let domains = DomainEnv {
            state_domains: &[
                kleene::values_of(&kleene::singleton(0.0)).chain([1.0]).map(kleene::ValueKey).collect(),
                kleene::singleton(5.0),
            ],
            action_domains: &[],
            non_fluents: &[],
        };
        let domain = arena.calc_domain(sum, &domains);
        assert!(domain.contains(&kleene::ValueKey(5.0)));
        assert!(domain.contains(&kleene::ValueKey(6.0)));
    }
}
