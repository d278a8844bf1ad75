//! Unate detection and reduction.
//!
//! A variable is *unate* at a state when every accepted behaviour from that state stays
//! accepted once the variable is forced to one polarity. Fixing it then simplifies the
//! outgoing guards of the state: each guard `g` becomes `g|lit ∧ lit`.
//!
//! Two strategies decide unateness: [`exact::ExactStrategy`] checks language inclusion
//! through complementation, [`heuristic::HeuristicStrategy`] checks a sufficient
//! condition on the guards alone. Both plug into [`UnateHandler`], which visits every
//! state once and finally purges the states that can no longer take part in an accepting
//! run.

pub mod exact;
pub mod heuristic;

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::automaton::{Automaton, StateId};
use crate::deadline::StopFlag;
use crate::types::{Lit, Var};

pub use exact::ExactStrategy;
pub use heuristic::HeuristicStrategy;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UnateType {
    Positive,
    Negative,
}

impl UnateType {
    /// The literal that fixes `var` to this polarity.
    pub fn literal(self, var: Var) -> Lit {
        match self {
            UnateType::Positive => var.pos(),
            UnateType::Negative => var.neg(),
        }
    }
}

impl Display for UnateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnateType::Positive => write!(f, "positive"),
            UnateType::Negative => write!(f, "negative"),
        }
    }
}

/// An edge, as its source state and its slot among the outgoing edges of that state.
pub type EdgeSlot = (StateId, usize);

/// Edges touched while fixing variables at one state.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct UnateEffect {
    /// The guard became unsatisfiable.
    pub removed: BTreeSet<EdgeSlot>,
    /// The guard allowed the opposite polarity before the reduction.
    pub impacted: BTreeSet<EdgeSlot>,
}

/// Outcome of resolving one state.
#[derive(Debug, Clone, Default)]
pub struct TestedState {
    pub state: StateId,
    pub total_duration: Duration,
    pub complement_duration: Duration,
    pub positive: Vec<Var>,
    pub negative: Vec<Var>,
    pub not_unate: Vec<Var>,
    pub unknown: Vec<Var>,
    pub removed_edges: usize,
    pub impacted_edges: usize,
    pub complement_succeeded: bool,
}

impl TestedState {
    pub fn new(state: StateId) -> Self {
        Self {
            state,
            complement_succeeded: true,
            ..Default::default()
        }
    }

    fn record(&mut self, var: Var, unate_type: UnateType) {
        match unate_type {
            UnateType::Positive => self.positive.push(var),
            UnateType::Negative => self.negative.push(var),
        }
    }

    fn finish(&mut self, effect: &UnateEffect, started: Instant) {
        self.removed_edges = effect.removed.len();
        self.impacted_edges = effect.impacted.len();
        self.total_duration = started.elapsed();
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnateReport {
    pub algorithm: &'static str,
    pub tested_states: Vec<TestedState>,
    pub states_after: usize,
    pub edges_after: usize,
    pub postprocess_duration: Duration,
    pub duration: Duration,
    /// `false` if the pass was stopped before every state was visited.
    pub completed: bool,
}

impl UnateReport {
    pub fn failed_complements(&self) -> usize {
        self.tested_states
            .iter()
            .filter(|t| !t.complement_succeeded)
            .count()
    }

    pub fn unate_count(&self) -> usize {
        self.tested_states
            .iter()
            .map(|t| t.positive.len() + t.negative.len())
            .sum()
    }
}

/// Which unateness test to run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UnateStrategyKind {
    Exact,
    Heuristic,
}

/// A way of finding and fixing the unate variables of one state.
pub trait UnateStrategy {
    fn name(&self) -> &'static str;

    /// Tests the candidate variables at `state`, reducing `aut` for every unate one.
    fn resolve(&mut self, aut: &mut Automaton, state: StateId, stop: &StopFlag) -> TestedState;
}

/// Fixes `var` to the polarity of `unate_type` on every outgoing edge of `state`.
pub fn reduce_state(
    aut: &mut Automaton,
    state: StateId,
    var: Var,
    unate_type: UnateType,
    effect: &mut UnateEffect,
) {
    let dict = std::rc::Rc::clone(aut.dict());
    let bdd = dict.bdd();
    let lit = unate_type.literal(var);
    let lit_bdd = bdd.mk_lit(lit);
    for (slot, edge) in aut.out_mut(state).iter_mut().enumerate() {
        let impacted = bdd.is_sat(bdd.apply_and(edge.cond, -lit_bdd));
        edge.cond = bdd.apply_and(bdd.restrict(edge.cond, lit), lit_bdd);
        if bdd.is_zero(edge.cond) {
            effect.removed.insert((state, slot));
        }
        if impacted {
            effect.impacted.insert((state, slot));
        }
    }
}

/// Drives a strategy over every state of an automaton.
pub struct UnateHandler {
    strategy: Box<dyn UnateStrategy>,
}

impl UnateHandler {
    pub fn new(strategy: Box<dyn UnateStrategy>) -> Self {
        Self { strategy }
    }

    /// Builds the strategy selected by `kind` for the given automaton and outputs.
    pub fn with_kind(kind: UnateStrategyKind, aut: &Automaton, outputs: &[Var], complement_multiplier: usize) -> Self {
        let strategy: Box<dyn UnateStrategy> = match kind {
            UnateStrategyKind::Exact => Box::new(ExactStrategy::new(aut, outputs.to_vec(), complement_multiplier)),
            UnateStrategyKind::Heuristic => Box::new(HeuristicStrategy::new(outputs.to_vec())),
        };
        Self::new(strategy)
    }

    /// Resolves every state once, then purges dead states.
    pub fn run(&mut self, aut: &mut Automaton, stop: &StopFlag) -> UnateReport {
        let started = Instant::now();
        let mut report = UnateReport {
            algorithm: self.strategy.name(),
            ..Default::default()
        };
        info!(
            "unate reduction ({}) on {} states and {} edges",
            report.algorithm,
            aut.num_states(),
            aut.num_edges()
        );

        report.completed = true;
        for state in 0..aut.num_states() {
            if stop.should_stop() {
                warn!("unate reduction stopped before state {}", state);
                report.completed = false;
                break;
            }
            let tested = self.strategy.resolve(aut, state, stop);
            debug!(
                "state {}: {} positive, {} negative, {} not unate, {} unknown",
                state,
                tested.positive.len(),
                tested.negative.len(),
                tested.not_unate.len(),
                tested.unknown.len()
            );
            report.tested_states.push(tested);
        }

        let postprocess = Instant::now();
        aut.purge_dead_states();
        report.postprocess_duration = postprocess.elapsed();

        report.states_after = aut.num_states();
        report.edges_after = aut.num_edges();
        report.duration = started.elapsed();
        info!(
            "unate reduction fixed {} variables, {} states and {} edges remain ({} failed complements)",
            report.unate_count(),
            report.states_after,
            report.edges_after,
            report.failed_complements()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::dict::BddDict;

    #[test]
    fn test_literal() {
        let v = Var::new(3);
        assert_eq!(UnateType::Positive.literal(v), v.pos());
        assert_eq!(UnateType::Negative.literal(v), v.neg());
        assert_eq!(UnateType::Negative.to_string(), "negative");
    }

    #[test]
    fn test_reduce_state_effect() {
        let mut aut = Automaton::new(Rc::new(BddDict::new()));
        let a = aut.register_ap("a");
        let x = aut.register_ap("x");
        let bdd = aut.bdd();
        let (fa, fx) = (bdd.mk_var(a), bdd.mk_var(x));
        let one = bdd.one();
        let a_and_not_x = bdd.apply_and(fa, -fx);
        aut.new_state();
        aut.new_edge(0, 0, fx, true); // untouched
        aut.new_edge(0, 0, one, true); // impacted
        aut.new_edge(0, 0, a_and_not_x, true); // impacted and removed

        let mut effect = UnateEffect::default();
        reduce_state(&mut aut, 0, x, UnateType::Positive, &mut effect);

        let bdd = aut.bdd();
        assert_eq!(aut.out(0)[0].cond, fx);
        assert_eq!(aut.out(0)[1].cond, fx);
        assert!(bdd.is_zero(aut.out(0)[2].cond));
        assert_eq!(effect.removed, BTreeSet::from([(0, 2)]));
        assert_eq!(effect.impacted, BTreeSet::from([(0, 1), (0, 2)]));
    }
}
