//! The three evaluators over [`Expr`]: `evaluate` (fully
//! deterministic), `evaluate_pd` (probabilistic, returns
//! [`DiscretePD`]), and `evaluate_kleene` (three-valued, returns a
//! [`ValueSet`]). All three switch on the same `Expr` discriminant
//! rather than dispatching through distinct class hierarchies.

use super::expr::{Expr, ExprArena, ExprId};
use crate::state::kleene::{self, ValueSet};
use crate::state::DiscretePD;
use crate::Value;

/// the fluent values an evaluation runs against: current state values,
/// the action taken, and the instance's non-fluents. Plain slices so
/// this module never needs to depend on `crate::task`.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    pub state: &'a [Value],
    pub action: &'a [Value],
    pub non_fluents: &'a [Value],
}

/// the Kleene analogue of [`Env`]: one [`ValueSet`] per state fluent
/// instead of a single value (action and non-fluents stay concrete —
/// only state fluents carry Kleene uncertainty within a trial).
#[derive(Debug, Clone, Copy)]
pub struct KleeneEnv<'a> {
    pub state: &'a [ValueSet],
    pub action: &'a [Value],
    pub non_fluents: &'a [Value],
}

impl ExprArena {
    /// deterministic evaluation. Probabilistic leaves are permitted
    /// here in a determinized form: `Bernoulli(p)` collapses to its
    /// mode (1 if `p >= 0.5` else 0), `Discrete` collapses to the value
    /// with maximum probability (ties keep declaration order), and
    /// `KronDelta(e)` is transparent.
    pub fn evaluate(&self, id: ExprId, env: &Env) -> f64 {
        match self.get(id) {
            Expr::Const(c) => *c,
            Expr::StateFluent(i) => env.state[*i],
            Expr::ActionFluent(i) => env.action[*i],
            Expr::NonFluent(i) => env.non_fluents[*i],

            Expr::Not(e) => bool_to_f(self.evaluate(*e, env) == 0.0),
            Expr::Neg(e) => -self.evaluate(*e, env),
            Expr::Exp(e) => self.evaluate(*e, env).exp(),

            Expr::And(es) => bool_to_f(es.iter().all(|&e| self.evaluate(e, env) != 0.0)),
            Expr::Or(es) => bool_to_f(es.iter().any(|&e| self.evaluate(e, env) != 0.0)),

            Expr::Eq(a, b) => bool_to_f(self.evaluate(*a, env) == self.evaluate(*b, env)),
            Expr::Lt(a, b) => bool_to_f(self.evaluate(*a, env) < self.evaluate(*b, env)),
            Expr::Gt(a, b) => bool_to_f(self.evaluate(*a, env) > self.evaluate(*b, env)),
            Expr::Le(a, b) => bool_to_f(self.evaluate(*a, env) <= self.evaluate(*b, env)),
            Expr::Ge(a, b) => bool_to_f(self.evaluate(*a, env) >= self.evaluate(*b, env)),

            Expr::Add(es) => es.iter().map(|&e| self.evaluate(e, env)).sum(),
            Expr::Sub(a, b) => self.evaluate(*a, env) - self.evaluate(*b, env),
            Expr::Mul(es) => es.iter().map(|&e| self.evaluate(e, env)).product(),
            Expr::Div(a, b) => self.evaluate(*a, env) / self.evaluate(*b, env),

            Expr::IfThenElse(c, t, f) => {
                if self.evaluate(*c, env) != 0.0 {
                    self.evaluate(*t, env)
                } else {
                    self.evaluate(*f, env)
                }
            }
            Expr::Switch(cases) => self.evaluate_switch(cases, env),

            Expr::KronDelta(e) => self.evaluate(*e, env),
            Expr::Bernoulli(p) => bool_to_f(self.evaluate(*p, env) >= 0.5),
            Expr::Discrete(pairs) => {
                let mut best_v = pairs[0].0;
                let mut best_p = f64::NEG_INFINITY;
                for &(v, p) in pairs {
                    let pv = self.evaluate(p, env);
                    if pv > best_p {
                        best_p = pv;
                        best_v = v;
                    }
                }
                self.evaluate(best_v, env)
            }
        }
    }

    fn evaluate_switch(&self, cases: &[(ExprId, ExprId)], env: &Env) -> f64 {
        for &(cond, branch) in cases {
            if self.evaluate(cond, env) != 0.0 {
                return self.evaluate(branch, env);
            }
        }
        0.0
    }

    /// probabilistic evaluation: every node returns a full
    /// [`DiscretePD`], combined via the cross product of operand
    /// distributions for connectives and arithmetic.
    pub fn evaluate_pd(&self, id: ExprId, env: &Env) -> DiscretePD {
        match self.get(id) {
            Expr::Const(c) => DiscretePD::dirac(*c),
            Expr::StateFluent(i) => DiscretePD::dirac(env.state[*i]),
            Expr::ActionFluent(i) => DiscretePD::dirac(env.action[*i]),
            Expr::NonFluent(i) => DiscretePD::dirac(env.non_fluents[*i]),

            Expr::Not(e) => self.map_pd(*e, env, |v| bool_to_f(v == 0.0)),
            Expr::Neg(e) => self.map_pd(*e, env, |v| -v),
            Expr::Exp(e) => self.map_pd(*e, env, f64::exp),

            Expr::And(es) => self.fold_pd(es, env, 1.0, |acc, v| bool_to_f(acc != 0.0 && v != 0.0)),
            Expr::Or(es) => self.fold_pd(es, env, 0.0, |acc, v| bool_to_f(acc != 0.0 || v != 0.0)),

            Expr::Eq(a, b) => self.zip_pd(*a, *b, env, |x, y| bool_to_f(x == y)),
            Expr::Lt(a, b) => self.zip_pd(*a, *b, env, |x, y| bool_to_f(x < y)),
            Expr::Gt(a, b) => self.zip_pd(*a, *b, env, |x, y| bool_to_f(x > y)),
            Expr::Le(a, b) => self.zip_pd(*a, *b, env, |x, y| bool_to_f(x <= y)),
            Expr::Ge(a, b) => self.zip_pd(*a, *b, env, |x, y| bool_to_f(x >= y)),

            Expr::Add(es) => self.fold_pd(es, env, 0.0, |acc, v| acc + v),
            Expr::Sub(a, b) => self.zip_pd(*a, *b, env, |x, y| x - y),
            Expr::Mul(es) => self.fold_pd(es, env, 1.0, |acc, v| acc * v),
            Expr::Div(a, b) => self.zip_pd(*a, *b, env, |x, y| x / y),

            Expr::IfThenElse(c, t, f) => {
                let cond = self.evaluate_pd(*c, env);
                let mut pairs = Vec::new();
                for (cv, cp) in cond.pairs() {
                    let branch = if cv != 0.0 {
                        self.evaluate_pd(*t, env)
                    } else {
                        self.evaluate_pd(*f, env)
                    };
                    for (v, p) in branch.pairs() {
                        pairs.push((v, p * cp));
                    }
                }
                DiscretePD::new(pairs)
            }
            Expr::Switch(cases) => self.evaluate_switch_pd(cases, env),

            Expr::KronDelta(e) => self.evaluate_pd(*e, env),
            Expr::Bernoulli(p) => DiscretePD::bernoulli(self.evaluate(*p, env)),
            Expr::Discrete(pairs) => {
                let resolved: Vec<(f64, f64)> = pairs
                    .iter()
                    .map(|&(v, p)| (self.evaluate(v, env), self.evaluate(p, env)))
                    .collect();
                DiscretePD::new(resolved)
            }
        }
    }

    fn evaluate_switch_pd(&self, cases: &[(ExprId, ExprId)], env: &Env) -> DiscretePD {
        for &(cond, branch) in cases {
            // switch conditions are deterministic guards (e.g.
            // enum-value comparisons); only the matching branch's
            // distribution is probabilistic.
            if self.evaluate(cond, env) != 0.0 {
                return self.evaluate_pd(branch, env);
            }
        }
        DiscretePD::dirac(0.0)
    }

    fn map_pd(&self, e: ExprId, env: &Env, f: impl Fn(f64) -> f64) -> DiscretePD {
        let pd = self.evaluate_pd(e, env);
        DiscretePD::new(pd.pairs().map(|(v, p)| (f(v), p)).collect())
    }

    fn zip_pd(&self, a: ExprId, b: ExprId, env: &Env, f: impl Fn(f64, f64) -> f64) -> DiscretePD {
        let pa = self.evaluate_pd(a, env);
        let pb = self.evaluate_pd(b, env);
        let mut pairs = Vec::with_capacity(pa.values().len() * pb.values().len());
        for (va, pav) in pa.pairs() {
            for (vb, pbv) in pb.pairs() {
                pairs.push((f(va, vb), pav * pbv));
            }
        }
        DiscretePD::new(pairs)
    }

    fn fold_pd(&self, es: &[ExprId], env: &Env, identity: f64, f: impl Fn(f64, f64) -> f64 + Copy) -> DiscretePD {
        let mut acc = DiscretePD::dirac(identity);
        for &e in es {
            let pd = self.evaluate_pd(e, env);
            let mut pairs = Vec::with_capacity(acc.values().len() * pd.values().len());
            for (av, ap) in acc.pairs() {
                for (v, p) in pd.pairs() {
                    pairs.push((f(av, v), ap * p));
                }
            }
            acc = DiscretePD::new(pairs);
        }
        acc
    }

    /// Kleene (three-valued) evaluation: every node returns the set of
    /// values it could certainly take. Connectives and arithmetic form
    /// the cross product of operand sets, the same shape `evaluate_pd`
    /// uses for distributions — `*` and `/` here are genuine
    /// cross-product multiplication/division, and an expression's
    /// interval is never computed from a single endpoint pair when more
    /// than one combination of operand bounds could produce the
    /// extremum.
    pub fn evaluate_kleene(&self, id: ExprId, env: &KleeneEnv) -> ValueSet {
        match self.get(id) {
            Expr::Const(c) => kleene::singleton(*c),
            Expr::StateFluent(i) => env.state[*i].clone(),
            Expr::ActionFluent(i) => kleene::singleton(env.action[*i]),
            Expr::NonFluent(i) => kleene::singleton(env.non_fluents[*i]),

            Expr::Not(e) => self.map_kleene(*e, env, |v| bool_to_f(v == 0.0)),
            Expr::Neg(e) => self.map_kleene(*e, env, |v| -v),
            Expr::Exp(e) => self.map_kleene(*e, env, f64::exp),

            Expr::And(es) => self.fold_kleene(es, env, 1.0, |acc, v| bool_to_f(acc != 0.0 && v != 0.0)),
            Expr::Or(es) => self.fold_kleene(es, env, 0.0, |acc, v| bool_to_f(acc != 0.0 || v != 0.0)),

            Expr::Eq(a, b) => self.zip_kleene(*a, *b, env, |x, y| bool_to_f(x == y)),
            Expr::Lt(a, b) => self.zip_kleene(*a, *b, env, |x, y| bool_to_f(x < y)),
            Expr::Gt(a, b) => self.zip_kleene(*a, *b, env, |x, y| bool_to_f(x > y)),
            Expr::Le(a, b) => self.zip_kleene(*a, *b, env, |x, y| bool_to_f(x <= y)),
            Expr::Ge(a, b) => self.zip_kleene(*a, *b, env, |x, y| bool_to_f(x >= y)),

            Expr::Add(es) => self.fold_kleene(es, env, 0.0, |acc, v| acc + v),
            Expr::Sub(a, b) => self.zip_kleene(*a, *b, env, |x, y| x - y),
            Expr::Mul(es) => self.fold_kleene(es, env, 1.0, |acc, v| acc * v),
            Expr::Div(a, b) => self.zip_kleene(*a, *b, env, |x, y| x / y),

            Expr::IfThenElse(c, t, f) => {
                let cond = self.evaluate_kleene(*c, env);
                let mut out = ValueSet::new();
                if kleene::values_of(&cond).any(|v| v != 0.0) {
                    out.extend(self.evaluate_kleene(*t, env));
                }
                if kleene::values_of(&cond).any(|v| v == 0.0) {
                    out.extend(self.evaluate_kleene(*f, env));
                }
                out
            }
            Expr::Switch(cases) => self.evaluate_switch_kleene(cases, env),

            Expr::KronDelta(e) => self.evaluate_kleene(*e, env),
            // a Bernoulli trial can always go either way unless its
            // parameter is certainly 0 or 1.
            Expr::Bernoulli(p) => {
                let p = self.evaluate_kleene(*p, env);
                let mut out = ValueSet::new();
                if kleene::values_of(&p).any(|v| v < 1.0) {
                    out.insert(kleene::ValueKey(0.0));
                }
                if kleene::values_of(&p).any(|v| v > 0.0) {
                    out.insert(kleene::ValueKey(1.0));
                }
                out
            }
            Expr::Discrete(pairs) => {
                let mut out = ValueSet::new();
                for &(v, p) in pairs {
                    let prob = self.evaluate_kleene(p, env);
                    if kleene::values_of(&prob).any(|x| x > 0.0) {
                        out.extend(self.evaluate_kleene(v, env));
                    }
                }
                out
            }
        }
    }

    fn evaluate_switch_kleene(&self, cases: &[(ExprId, ExprId)], env: &KleeneEnv) -> ValueSet {
        let mut out = ValueSet::new();
        for &(cond, branch) in cases {
            let cond_set = self.evaluate_kleene(cond, env);
            if kleene::values_of(&cond_set).any(|v| v != 0.0) {
                out.extend(self.evaluate_kleene(branch, env));
            }
            if kleene::values_of(&cond_set).all(|v| v != 0.0) {
                break;
            }
        }
        out
    }

    fn map_kleene(&self, e: ExprId, env: &KleeneEnv, f: impl Fn(f64) -> f64) -> ValueSet {
        kleene::values_of(&self.evaluate_kleene(e, env)).map(|v| kleene::ValueKey(f(v))).collect()
    }

    fn zip_kleene(&self, a: ExprId, b: ExprId, env: &KleeneEnv, f: impl Fn(f64, f64) -> f64) -> ValueSet {
        let sa = self.evaluate_kleene(a, env);
        let sb = self.evaluate_kleene(b, env);
        let mut out = ValueSet::new();
        for va in kleene::values_of(&sa) {
            for vb in kleene::values_of(&sb) {
                out.insert(kleene::ValueKey(f(va, vb)));
            }
        }
        out
    }

    fn fold_kleene(&self, es: &[ExprId], env: &KleeneEnv, identity: f64, f: impl Fn(f64, f64) -> f64 + Copy) -> ValueSet {
        let mut acc = kleene::singleton(identity);
        for &e in es {
            let set = self.evaluate_kleene(e, env);
            let mut next = ValueSet::new();
            for av in kleene::values_of(&acc) {
                for v in kleene::values_of(&set) {
                    next.insert(kleene::ValueKey(f(av, v)));
                }
            }
            acc = next;
        }
        acc
    }
}

fn bool_to_f(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
