//! THTS search nodes and their arena. A pre-sized `Vec` of owned nodes
//! is reused across steps; children are arena indices, never pointers.

use crate::state::State;
use crate::{Probability, Reward};

pub type NodeId = usize;

/// fields shared by decision and chance nodes.
#[derive(Debug, Clone)]
pub struct NodeCommon {
    /// decision node: indexed by action; chance node: indexed by
    /// outcome-variable value. `None` means "not yet allocated": an
    /// inapplicable action at a decision node, or an unsampled outcome
    /// at a chance node.
    pub children: Vec<Option<NodeId>>,
    pub visits: u32,
    pub future_reward: Reward,
    pub immediate_reward: Reward,
    pub solved: bool,
    pub reward_lock: bool,
    pub steps_to_go: u32,
    /// has the leaf initializer already seeded this node's children?
    /// distinct from `visits`, which only counts trial passes.
    pub initialized: bool,
    /// probability of sampling this outcome from its parent chance
    /// node's joint; only meaningful at decision children of a chance
    /// node, left at `1.0` elsewhere.
    pub prob: Probability,
    /// set once `PartialBellmanBackup` has frozen this chance node's
    /// future-reward estimate after repeated stable backups.
    pub backup_locked: bool,
    /// consecutive backups (below the lock depth) whose recomputed
    /// future-reward matched the previous one within epsilon.
    pub lock_streak: u32,
}

impl NodeCommon {
    fn reset(&mut self, steps_to_go: u32, num_children: usize) {
        self.children.clear();
        self.children.resize(num_children, None);
        self.visits = 0;
        self.future_reward = 0.0;
        self.immediate_reward = 0.0;
        self.solved = false;
        self.reward_lock = false;
        self.steps_to_go = steps_to_go;
        self.initialized = false;
        self.prob = 1.0;
        self.backup_locked = false;
        self.lock_streak = 0;
    }

    /// `expected_reward_estimate` is `immediate + future`
    /// at a decision child; chance nodes don't carry an immediate
    /// reward of their own so it is folded into `future` by the backup
    /// functions that update them.
    pub fn expected_reward_estimate(&self) -> Reward {
        self.immediate_reward + self.future_reward
    }
}

#[derive(Debug, Clone)]
pub struct DecisionNode {
    pub common: NodeCommon,
    pub state: State,
}

#[derive(Debug, Clone)]
pub struct ChanceNode {
    pub common: NodeCommon,
    /// the full joint successor distribution for this action, sampled
    /// whole each trial visit rather than factored into one arena layer
    /// per non-Dirac fluent. See `DESIGN.md` for why this crate keeps a
    /// single per-action chance node instead of a per-variable chain.
    pub pending: crate::state::PDState,
    /// every decision child sampled from this chance node so far, keyed
    /// by state hash when hashing is enabled (repeated outcomes then
    /// reuse one child instead of growing the arena unboundedly) and by
    /// `HASH_DISABLED` for every sample otherwise. Always populated: the
    /// backup functions fold over it regardless of dedup state.
    pub outcomes: Vec<(crate::HashKey, NodeId)>,
    /// `outcomes.len()` at the moment `common.backup_locked` was set;
    /// the lock releases once the live length diverges from this,
    /// i.e. the subtree has changed.
    pub locked_support_size: Option<usize>,
}

impl ChanceNode {
    pub fn find_outcome(&self, key: crate::HashKey) -> Option<NodeId> {
        if key == crate::HASH_DISABLED {
            return None;
        }
        self.outcomes.iter().find(|&&(k, _)| k == key).map(|&(_, id)| id)
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Decision(DecisionNode),
    Chance(ChanceNode),
}

impl Node {
    pub fn common(&self) -> &NodeCommon {
        match self {
            Node::Decision(d) => &d.common,
            Node::Chance(c) => &c.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut NodeCommon {
        match self {
            Node::Decision(d) => &mut d.common,
            Node::Chance(c) => &mut c.common,
        }
    }

    pub fn as_decision(&self) -> &DecisionNode {
        match self {
            Node::Decision(d) => d,
            Node::Chance(_) => panic!("expected a decision node"),
        }
    }

    pub fn as_decision_mut(&mut self) -> &mut DecisionNode {
        match self {
            Node::Decision(d) => d,
            Node::Chance(_) => panic!("expected a decision node"),
        }
    }

    pub fn as_chance(&self) -> &ChanceNode {
        match self {
            Node::Chance(c) => c,
            Node::Decision(_) => panic!("expected a chance node"),
        }
    }

    pub fn as_chance_mut(&mut self) -> &mut ChanceNode {
        match self {
            Node::Chance(c) => c,
            Node::Decision(_) => panic!("expected a chance node"),
        }
    }
}

/// a pre-sized vector of owned nodes, reused across steps.
/// `get_decision_node`/`get_chance_node` pick the next free slot,
/// resetting it in place rather than allocating.
pub struct NodeArena {
    nodes: Vec<Node>,
    next_free: usize,
    cap: usize,
}

impl NodeArena {
    pub fn new(cap: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(cap),
            next_free: 0,
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.next_free
    }

    pub fn is_full(&self) -> bool {
        self.next_free >= self.cap
    }

    /// reset the pool counter so the whole arena is free again, but
    /// keep previously-used node storage to avoid reallocating.
    pub fn reset_pool(&mut self) {
        self.next_free = 0;
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// allocate (or reuse, reset in place) a decision node.
    pub fn get_decision_node(&mut self, state: State, num_actions: usize) -> Option<NodeId> {
        if self.is_full() {
            return None;
        }
        let id = self.next_free;
        self.next_free += 1;
        let steps_to_go = state.steps_to_go();
        if id < self.nodes.len() {
            if let Node::Decision(d) = &mut self.nodes[id] {
                d.common.reset(steps_to_go, num_actions);
                d.state = state;
            } else {
                self.nodes[id] = Node::Decision(DecisionNode {
                    common: fresh_common(steps_to_go, num_actions),
                    state,
                });
            }
        } else {
            self.nodes.push(Node::Decision(DecisionNode {
                common: fresh_common(steps_to_go, num_actions),
                state,
            }));
        }
        Some(id)
    }

    /// allocate (or reuse) a chance node. A chance node has no fixed
    /// arity, so its `common.children` stays empty; `outcomes` grows on
    /// demand as distinct successors are sampled.
    pub fn get_chance_node(&mut self, pending: crate::state::PDState, steps_to_go: u32) -> Option<NodeId> {
        if self.is_full() {
            return None;
        }
        let id = self.next_free;
        self.next_free += 1;
        let fresh = ChanceNode {
            common: fresh_common(steps_to_go, 0),
            pending,
            outcomes: Vec::new(),
            locked_support_size: None,
        };
        if id < self.nodes.len() {
            self.nodes[id] = Node::Chance(fresh);
        } else {
            self.nodes.push(Node::Chance(fresh));
        }
        Some(id)
    }
}

fn fresh_common(steps_to_go: u32, num_children: usize) -> NodeCommon {
    NodeCommon {
        children: vec![None; num_children],
        visits: 0,
        future_reward: 0.0,
        immediate_reward: 0.0,
        solved: false,
        reward_lock: false,
        steps_to_go,
        initialized: false,
        prob: 1.0,
        backup_locked: false,
        lock_streak: 0,
    }
}
