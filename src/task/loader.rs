//! Task loader: reads the line-oriented task description format and
//! builds a [`Task`]. Producing this format from higher-level source
//! text is someone else's concern; this module only consumes it.

use super::fluent::ActionState;
use super::model::{FinalRewardPolicy, Task};
use crate::error::TaskError;
use crate::eval::{CachePolicy, Evaluatable, EvaluatableKind};
use crate::logic::{Expr, ExprArena, ExprId};
use crate::state::HashParams;
use crate::state::State;
use crate::Value;
use std::collections::HashMap;
use std::io::BufRead;

/// fluent name -> `(kind, index)` used while resolving bare identifiers
/// in formulas.
struct FluentTable {
    state: HashMap<String, usize>,
    action: HashMap<String, usize>,
    non_fluent: HashMap<String, usize>,
}

/// parses the prefix formula surface form into `Expr` nodes, sharing
/// one arena with every other formula in the task.
struct FormulaParser<'a> {
    tokens: Vec<String>,
    pos: usize,
    arena: &'a mut ExprArena,
    fluents: &'a FluentTable,
}

impl<'a> FormulaParser<'a> {
    fn new(source: &str, arena: &'a mut ExprArena, fluents: &'a FluentTable) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
            arena,
            fluents,
        }
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Result<String, TaskError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| TaskError::MalformedSection {
                section: "formula".into(),
                reason: "unexpected end of formula".into(),
            })?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, want: &str) -> Result<(), TaskError> {
        let got = self.next()?;
        if got != want {
            return Err(TaskError::MalformedSection {
                section: "formula".into(),
                reason: format!("expected `{want}`, found `{got}`"),
            });
        }
        Ok(())
    }

    fn parse(&mut self) -> Result<ExprId, TaskError> {
        let tok = self.next()?;
        if let Ok(value) = tok.parse::<f64>() {
            return Ok(self.arena.constant(value));
        }
        match tok.as_str() {
            "and" => self.parse_nary(Expr::And as fn(Vec<ExprId>) -> Expr),
            "or" => self.parse_nary(Expr::Or as fn(Vec<ExprId>) -> Expr),
            "+" => self.parse_nary(Expr::Add as fn(Vec<ExprId>) -> Expr),
            "*" => self.parse_nary(Expr::Mul as fn(Vec<ExprId>) -> Expr),
            "==" => self.parse_binary(Expr::Eq),
            ">" => self.parse_binary(Expr::Gt),
            "<" => self.parse_binary(Expr::Lt),
            ">=" => self.parse_binary(Expr::Ge),
            "<=" => self.parse_binary(Expr::Le),
            "-" => self.parse_binary(Expr::Sub),
            "/" => self.parse_binary(Expr::Div),
            "~" => self.parse_unary(Expr::Not),
            "exp" => self.parse_unary(Expr::Exp),
            "neg" => self.parse_unary(Expr::Neg),
            "KronDelta" => self.parse_unary(Expr::KronDelta),
            "Bernoulli" => self.parse_unary(Expr::Bernoulli),
            "if" => {
                let cond = self.parse()?;
                self.expect("then")?;
                let t = self.parse()?;
                self.expect("else")?;
                let f = self.parse()?;
                Ok(self.arena.push(Expr::IfThenElse(cond, t, f)))
            }
            "switch" => {
                self.expect("(")?;
                let mut cases = Vec::new();
                while self.peek() != Some(")") {
                    self.expect("(")?;
                    let cond = self.parse()?;
                    self.expect(":")?;
                    let branch = self.parse()?;
                    self.expect(")")?;
                    cases.push((cond, branch));
                }
                self.expect(")")?;
                Ok(self.arena.push(Expr::Switch(cases)))
            }
            "Discrete" => {
                self.expect("(")?;
                self.next()?; // the distribution's value type, unused here
                let mut pairs = Vec::new();
                while self.peek() != Some(")") {
                    self.expect("(")?;
                    let value = self.parse()?;
                    self.expect(":")?;
                    let prob = self.parse()?;
                    self.expect(")")?;
                    pairs.push((value, prob));
                }
                self.expect(")")?;
                Ok(self.arena.push(Expr::Discrete(pairs)))
            }
            identifier => self.resolve_fluent(identifier),
        }
    }

    fn resolve_fluent(&mut self, name: &str) -> Result<ExprId, TaskError> {
        if let Some(&i) = self.fluents.state.get(name) {
            return Ok(self.arena.push(Expr::StateFluent(i)));
        }
        if let Some(&i) = self.fluents.action.get(name) {
            return Ok(self.arena.push(Expr::ActionFluent(i)));
        }
        if let Some(&i) = self.fluents.non_fluent.get(name) {
            return Ok(self.arena.push(Expr::NonFluent(i)));
        }
        Err(TaskError::UndefinedFluent(name.to_string()))
    }

    fn parse_unary(&mut self, make: fn(ExprId) -> Expr) -> Result<ExprId, TaskError> {
        self.expect("(")?;
        let e = self.parse()?;
        self.expect(")")?;
        Ok(self.arena.push(make(e)))
    }

    fn parse_binary(&mut self, make: fn(ExprId, ExprId) -> Expr) -> Result<ExprId, TaskError> {
        self.expect("(")?;
        let a = self.parse()?;
        let b = self.parse()?;
        self.expect(")")?;
        Ok(self.arena.push(make(a, b)))
    }

    fn parse_nary(&mut self, make: fn(Vec<ExprId>) -> Expr) -> Result<ExprId, TaskError> {
        self.expect("(")?;
        let mut children = Vec::new();
        while self.peek() != Some(")") {
            children.push(self.parse()?);
        }
        self.expect(")")?;
        Ok(self.arena.push(make(children)))
    }
}

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };
    for ch in source.chars() {
        match ch {
            '(' | ')' | ':' => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

/// header + sections, read line by line. Blank lines and lines
/// starting with `#` are ignored so fixtures stay readable.
pub fn load_task(reader: impl BufRead) -> Result<Task, TaskError> {
    let mut lines = reader
        .lines()
        .map(|l| l.map_err(TaskError::Io))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

    let name = field_after(&mut lines, "NAME")?;
    let horizon: u32 = parse_field(&mut lines, "HORIZON")?;
    let discount: f64 = parse_field(&mut lines, "DISCOUNT")?;

    let counts_line = next_line(&mut lines, "COUNTS")?;
    let counts: Vec<usize> = counts_line
        .split_whitespace()
        .skip(1)
        .map(|t| t.parse().unwrap_or(0))
        .collect();
    let [num_action_fluents, num_det_fluents, num_prob_fluents, num_preconditions, num_actions, _num_hash_keys] =
        counts.as_slice()
    else {
        return Err(TaskError::MalformedSection {
            section: "COUNTS".into(),
            reason: "expected 6 counts".into(),
        });
    };
    let (num_action_fluents, num_det_fluents, num_prob_fluents, num_preconditions, num_actions) =
        (*num_action_fluents, *num_det_fluents, *num_prob_fluents, *num_preconditions, *num_actions);
    let num_state_fluents = num_det_fluents + num_prob_fluents;

    let initial_line = next_line(&mut lines, "INITIAL")?;
    let initial_values: Vec<Value> = initial_line.split_whitespace().skip(1).map(|t| t.parse().unwrap_or(0.0)).collect();

    let flags_line = next_line(&mut lines, "FLAGS")?;
    let flags: Vec<&str> = flags_line.split_whitespace().skip(1).collect();
    let hashing_enabled = flags.first().copied() == Some("1");
    let kleene_enabled = flags.get(1).copied() == Some("1");

    let final_reward_line = next_line(&mut lines, "FINAL_REWARD")?;
    let mut parts = final_reward_line.split_whitespace().skip(1);
    let final_reward_policy = match parts.next() {
        Some("NOOP") | None => FinalRewardPolicy::Noop,
        Some("FIRST_APPLICABLE") => FinalRewardPolicy::FirstApplicable,
        Some("BEST_OF_CANDIDATE_SET") => {
            FinalRewardPolicy::BestOfCandidateSet(parts.map(|t| t.parse().unwrap_or(0)).collect())
        }
        Some(other) => {
            return Err(TaskError::MalformedSection {
                section: "FINAL_REWARD".into(),
                reason: format!("unknown token `{other}`"),
            })
        }
    };

    let lock_line = next_line(&mut lines, "REWARD_LOCK")?;
    let mut lock_parts = lock_line.split_whitespace().skip(1);
    let reward_lock_detection = lock_parts.next() == Some("1");
    let goal_test_action: usize = lock_parts.next().and_then(|t| t.parse().ok()).unwrap_or(0);

    let mut fluents = FluentTable {
        state: HashMap::new(),
        action: HashMap::new(),
        non_fluent: HashMap::new(),
    };
    let mut action_fluent_domains = Vec::with_capacity(num_action_fluents);
    for _ in 0..num_action_fluents {
        let line = next_line(&mut lines, "ACTION_FLUENT")?;
        let mut tok = line.split_whitespace();
        tok.next();
        let index: usize = parse_tok(&mut tok, "ACTION_FLUENT")?;
        let name = tok.next().ok_or_else(|| malformed("ACTION_FLUENT", "missing name"))?.to_string();
        let domain: usize = parse_tok(&mut tok, "ACTION_FLUENT")?;
        if fluents.action.insert(name.clone(), index).is_some() {
            return Err(TaskError::DuplicateFluent(name));
        }
        action_fluent_domains.push(domain);
    }

    let mut state_fluent_specs = Vec::with_capacity(num_state_fluents);
    for _ in 0..num_state_fluents {
        let line = next_line(&mut lines, "STATE_FLUENT")?;
        let mut tok = line.split_whitespace();
        tok.next();
        let index: usize = parse_tok(&mut tok, "STATE_FLUENT")?;
        let name = tok.next().ok_or_else(|| malformed("STATE_FLUENT", "missing name"))?.to_string();
        let domain: usize = parse_tok(&mut tok, "STATE_FLUENT")?;
        let rest: Vec<&str> = tok.collect();
        // the remaining tokens are `<cpf formula> | <determinized formula>`
        // joined back with single spaces, separated by a literal `|`.
        let joined = rest.join(" ");
        let mut halves = joined.splitn(2, '|');
        let cpf_formula = halves.next().unwrap_or("").trim().to_string();
        let determinized_formula = halves.next().map(str::trim).unwrap_or(&cpf_formula).to_string();
        if fluents.state.insert(name.clone(), index).is_some() {
            return Err(TaskError::DuplicateFluent(name));
        }
        state_fluent_specs.push((index, domain, cpf_formula, determinized_formula));
    }

    let reward_line = next_line(&mut lines, "REWARD")?;
    let mut reward_tok = reward_line.split_whitespace();
    reward_tok.next();
    let action_independent = reward_tok.next() == Some("1");
    let min: f64 = parse_tok(&mut reward_tok, "REWARD")?;
    let max: f64 = parse_tok(&mut reward_tok, "REWARD")?;
    let reward_formula = reward_tok.collect::<Vec<_>>().join(" ");

    let mut precondition_specs = Vec::with_capacity(num_preconditions);
    for _ in 0..num_preconditions {
        let line = next_line(&mut lines, "PRECONDITION")?;
        let mut tok = line.split_whitespace();
        tok.next();
        let index: usize = parse_tok(&mut tok, "PRECONDITION")?;
        let formula = tok.collect::<Vec<_>>().join(" ");
        precondition_specs.push((index, formula));
    }

    let mut action_specs = Vec::with_capacity(num_actions);
    for _ in 0..num_actions {
        let line = next_line(&mut lines, "ACTION_STATE")?;
        let mut halves = line.splitn(2, ';');
        let head = halves.next().unwrap_or_default();
        let tail = halves.next().unwrap_or_default();
        let mut tok = head.split_whitespace();
        tok.next();
        let index: usize = parse_tok(&mut tok, "ACTION_STATE")?;
        let values: Vec<Value> = tok.map(|t| t.parse().unwrap_or(0.0)).collect();
        let relevant: Vec<usize> = tail.split_whitespace().filter_map(|t| t.parse().ok()).collect();
        action_specs.push((index, values, relevant));
    }

    // non-fluents are not separately counted in this loader's header;
    // a future section can populate them when a fixture needs it.
    let non_fluents = Vec::new();

    let mut arena = ExprArena::new();
    let mut cpfs = Vec::with_capacity(num_state_fluents);
    for (i, (index, domain, cpf_src, det_src)) in state_fluent_specs.into_iter().enumerate() {
        let original = FormulaParser::new(&cpf_src, &mut arena, &fluents).parse()?;
        let determinized = if det_src == cpf_src {
            original
        } else {
            FormulaParser::new(&det_src, &mut arena, &fluents).parse()?
        };
        cpfs.push(Evaluatable::new(
            i,
            EvaluatableKind::Cpf {
                head_fluent: index,
                domain_size: domain,
            },
            original,
            determinized,
            vec![0; num_actions],
            if hashing_enabled { CachePolicy::Map } else { CachePolicy::None },
            0,
        ));
    }

    let reward_expr = FormulaParser::new(&reward_formula, &mut arena, &fluents).parse()?;
    let reward = Evaluatable::new(
        num_state_fluents,
        EvaluatableKind::Reward { min, max, action_independent },
        reward_expr,
        reward_expr,
        vec![0; num_actions],
        if hashing_enabled { CachePolicy::Map } else { CachePolicy::None },
        0,
    );

    let mut preconditions = Vec::with_capacity(precondition_specs.len());
    for (i, (_index, formula)) in precondition_specs.into_iter().enumerate() {
        let expr = FormulaParser::new(&formula, &mut arena, &fluents).parse()?;
        preconditions.push(Evaluatable::new(
            num_state_fluents + 1 + i,
            EvaluatableKind::Precondition,
            expr,
            expr,
            vec![0; num_actions],
            CachePolicy::None,
            0,
        ));
    }

    let action_states: Vec<ActionState> = action_specs
        .into_iter()
        .map(|(index, values, relevant)| ActionState {
            index,
            scheduled: values
                .iter()
                .enumerate()
                .filter(|(_, &v)| v != 0.0)
                .map(|(i, _)| i)
                .collect(),
            values,
            relevant_preconditions: relevant,
        })
        .collect();

    // a disabled-hashing task still needs consistent fluent-hash-key
    // table shapes; real hash parameters are expected in dedicated
    // sections this loader does not yet parse, so hashing stays off
    // for any task loaded through this path.
    let num_evaluatables = num_state_fluents + 1 + preconditions.len();
    let hash_params = HashParams::disabled(num_state_fluents, num_evaluatables);
    let _ = (hashing_enabled, kleene_enabled, action_fluent_domains);

    let initial_state = State::make(initial_values, horizon, &hash_params);

    Task::new(
        name,
        horizon,
        discount,
        initial_state,
        hash_params,
        arena,
        num_action_fluents,
        non_fluents,
        cpfs,
        reward,
        preconditions,
        action_states,
        final_reward_policy,
        reward_lock_detection,
        goal_test_action,
    )
}

fn next_line(lines: &mut impl Iterator<Item = String>, expect_prefix: &str) -> Result<String, TaskError> {
    let line = lines.next().ok_or_else(|| malformed(expect_prefix, "missing section"))?;
    if !line.trim_start().starts_with(expect_prefix) {
        return Err(malformed(expect_prefix, &format!("expected section `{expect_prefix}`, found `{line}`")));
    }
    Ok(line)
}

fn field_after(lines: &mut impl Iterator<Item = String>, key: &str) -> Result<String, TaskError> {
    let line = next_line(lines, key)?;
    Ok(line.split_whitespace().skip(1).collect::<Vec<_>>().join(" "))
}

fn parse_field<T: std::str::FromStr>(lines: &mut impl Iterator<Item = String>, key: &str) -> Result<T, TaskError> {
    field_after(lines, key)?.parse().map_err(|_| malformed(key, "not a number"))
}

fn parse_tok<T: std::str::FromStr>(tok: &mut std::str::SplitWhitespace, section: &str) -> Result<T, TaskError> {
    tok.next()
        .ok_or_else(|| malformed(section, "missing field"))?
        .parse()
        .map_err(|_| malformed(section, "malformed field"))
}

fn malformed(section: &str, reason: &str) -> TaskError {
    TaskError::MalformedSection {
        section: section.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const FIXTURE: &str = r#"
NAME dirac-flip
HORIZON 3
DISCOUNT 1.0
COUNTS 0 1 0 0 1 0
INITIAL 0.0
FLAGS 0 0
FINAL_REWARD NOOP
REWARD_LOCK 0 0
STATE_FLUENT 0 s 2 KronDelta ( ~ ( s ) )
REWARD 1 0.0 1.0 s
ACTION_STATE 0;
"#;

    #[test]
    fn loads_minimal_dirac_flip_task() {
        let task = load_task(Cursor::new(FIXTURE)).expect("task should load");
        assert_eq!(task.horizon, 3);
        assert_eq!(task.action_states.len(), 1);
        let noop = &task.action_states[0];
        let (s1, r0) = task.calc_state_transition_deterministic(&task.initial_state, noop);
        assert_eq!(r0, 0.0);
        assert_eq!(s1.value(0), 1.0);
    }

    #[test]
    fn undefined_fluent_reference_is_a_task_error() {
        let bad = FIXTURE.replace("s ) )", "ghost ) )");
        let err = load_task(Cursor::new(bad)).unwrap_err();
        assert!(matches!(err, TaskError::UndefinedFluent(_) | TaskError::MalformedSection { .. }));
    }
}
