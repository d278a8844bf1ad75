//! Unateness from the guards of one state.
//!
//! With `βᵢ` the guards leaving the state and `βᵢ(v=b)` their cofactors:
//!
//! - `⋀ᵢ βᵢ(v=0) → βᵢ(v=1)` valid: `v` is positive unate,
//! - `⋀ᵢ βᵢ(v=1) → βᵢ(v=0)` valid: `v` is negative unate,
//! - `⋁ᵢ βᵢ(v=0) ∧ ¬⋁ᵢ βᵢ(v=1)` satisfiable: `v` is not positive unate,
//! - `⋁ᵢ βᵢ(v=1) ∧ ¬⋁ᵢ βᵢ(v=0)` satisfiable: `v` is not negative unate.
//!
//! Anything else is unknown and gets another chance after some other variable of the
//! same state has been fixed.

use std::time::Instant;

use crate::automaton::{Automaton, StateId};
use crate::deadline::StopFlag;
use crate::types::Var;
use crate::unate::{reduce_state, TestedState, UnateEffect, UnateStrategy, UnateType};

enum Verdict {
    Unate(UnateType),
    NotUnate,
    Unknown,
}

pub struct HeuristicStrategy {
    outputs: Vec<Var>,
}

impl HeuristicStrategy {
    pub fn new(outputs: Vec<Var>) -> Self {
        Self { outputs }
    }

    fn test(&self, aut: &Automaton, state: StateId, var: Var) -> Verdict {
        let bdd = aut.bdd();

        let mut positive_sufficient = bdd.one();
        let mut negative_sufficient = bdd.one();
        let mut positive_edges = bdd.zero();
        let mut negative_edges = bdd.zero();

        for edge in aut.out(state) {
            let edge_positive = bdd.restrict(edge.cond, var.pos());
            let edge_negative = bdd.restrict(edge.cond, var.neg());

            positive_sufficient = bdd.apply_and(positive_sufficient, bdd.apply_imply(edge_negative, edge_positive));
            negative_sufficient = bdd.apply_and(negative_sufficient, bdd.apply_imply(edge_positive, edge_negative));

            positive_edges = bdd.apply_or(positive_edges, edge_positive);
            negative_edges = bdd.apply_or(negative_edges, edge_negative);
        }

        if bdd.is_one(positive_sufficient) {
            return Verdict::Unate(UnateType::Positive);
        }
        if bdd.is_one(negative_sufficient) {
            return Verdict::Unate(UnateType::Negative);
        }

        let not_positive = bdd.apply_and(negative_edges, -positive_edges);
        let not_negative = bdd.apply_and(positive_edges, -negative_edges);
        if bdd.is_sat(not_positive) || bdd.is_sat(not_negative) {
            Verdict::NotUnate
        } else {
            Verdict::Unknown
        }
    }
}

impl UnateStrategy for HeuristicStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn resolve(&mut self, aut: &mut Automaton, state: StateId, stop: &StopFlag) -> TestedState {
        let started = Instant::now();
        let mut tested = TestedState::new(state);
        let mut effect = UnateEffect::default();

        let mut untested = self.outputs.clone();
        let mut unknown: Vec<Var> = Vec::new();

        while let Some(var) = untested.pop() {
            if stop.should_stop() {
                break;
            }
            match self.test(aut, state, var) {
                Verdict::Unate(unate_type) => {
                    reduce_state(aut, state, var, unate_type, &mut effect);
                    tested.record(var, unate_type);
                    untested.append(&mut unknown);
                }
                // A refuted variable stays out for this state, even if the other
                // polarity was never refuted. Only unknown variables are retried.
                Verdict::NotUnate => tested.not_unate.push(var),
                Verdict::Unknown => unknown.push(var),
            }
        }

        tested.unknown = unknown;
        tested.finish(&effect, started);
        tested
    }
}
