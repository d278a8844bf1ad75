//! Unateness by language inclusion.
//!
//! To test `v` at state `s`, the automaton is rooted at `s` and complemented once. For a
//! polarity `p`, a forced state gets one edge per edge `e` leaving `s`, labelled
//! `e.cond|v=¬p ∧ lit(p)` and dropped when unsatisfiable. The forced state moves the
//! behaviours that used the opposite polarity over to `p`; `v` is unate in polarity `p`
//! iff none of them lands in the complement.
//!
//! At the original initial state the complement is the negation of the specification,
//! when the caller supplies it. Elsewhere, or without it, the complement is built under
//! a size limit; a state whose complement is too large is skipped.

use std::time::Instant;

use log::{debug, warn};

use crate::automaton::{Automaton, StateId};
use crate::complement::{complement, SizeLimit};
use crate::deadline::StopFlag;
use crate::product::intersects;
use crate::types::Var;
use crate::unate::{reduce_state, TestedState, UnateEffect, UnateStrategy, UnateType};

pub struct ExactStrategy {
    outputs: Vec<Var>,
    /// Working copy, rooted at the state under test and kept in sync with the reductions.
    base: Automaton,
    /// Snapshot of the input plus the forced state.
    prime: Automaton,
    forced: StateId,
    original_init: StateId,
    original_edges: usize,
    multiplier: usize,
    negation: Option<Automaton>,
}

impl ExactStrategy {
    pub fn new(aut: &Automaton, outputs: Vec<Var>, multiplier: usize) -> Self {
        let base = aut.clone();
        let mut prime = aut.clone();
        let forced = prime.new_state();
        prime.set_init_state(forced);
        Self {
            outputs,
            base,
            prime,
            forced,
            original_init: aut.init_state(),
            original_edges: aut.num_edges(),
            multiplier,
            negation: None,
        }
    }

    /// Use `negation` as the complement at the original initial state.
    pub fn with_negation(mut self, negation: Automaton) -> Self {
        assert!(
            negation.same_dict(&self.base),
            "The negated specification must share the automaton dictionary"
        );
        self.negation = Some(negation);
        self
    }

    fn size_limit(&self) -> SizeLimit {
        SizeLimit {
            max_states: self.base.num_states().max(1).saturating_mul(self.multiplier),
            max_edges: self.original_edges.max(1).saturating_mul(self.multiplier),
        }
    }

    fn is_unate(&mut self, state: StateId, var: Var, complement: &Automaton, unate_type: UnateType) -> bool {
        self.prime.kill_state(self.forced);

        let dict = std::rc::Rc::clone(self.base.dict());
        let bdd = dict.bdd();
        let lit = unate_type.literal(var);
        let lit_bdd = bdd.mk_lit(lit);
        for edge in self.base.out(state) {
            let cond = bdd.apply_and(bdd.restrict(edge.cond, !lit), lit_bdd);
            if bdd.is_sat(cond) {
                self.prime.new_edge(self.forced, edge.dst, cond, edge.acc);
            }
        }

        !intersects(complement, &self.prime)
    }
}

impl UnateStrategy for ExactStrategy {
    fn name(&self) -> &'static str {
        "complement"
    }

    fn resolve(&mut self, aut: &mut Automaton, state: StateId, stop: &StopFlag) -> TestedState {
        let started = Instant::now();
        let mut tested = TestedState::new(state);
        let mut effect = UnateEffect::default();

        self.base.set_init_state(state);

        let complement_started = Instant::now();
        let complement = match &self.negation {
            Some(negation) if state == self.original_init => Ok(negation.clone()),
            _ => complement(&self.base, self.size_limit()),
        };
        tested.complement_duration = complement_started.elapsed();

        let complement = match complement {
            Ok(complement) => complement,
            Err(err) => {
                warn!("skipping state {}: {}", state, err);
                self.base.set_init_state(self.original_init);
                self.prime.kill_state(self.forced);
                tested.complement_succeeded = false;
                tested.finish(&effect, started);
                return tested;
            }
        };
        debug!(
            "complement at state {} has {} states",
            state,
            complement.num_states()
        );

        let mut untested = self.outputs.clone();
        let mut not_unate: Vec<Var> = Vec::new();

        while let Some(var) = untested.pop() {
            if stop.should_stop() {
                break;
            }

            let unate_type = [UnateType::Positive, UnateType::Negative]
                .into_iter()
                .find(|&t| self.is_unate(state, var, &complement, t));

            match unate_type {
                Some(unate_type) => {
                    reduce_state(&mut self.base, state, var, unate_type, &mut effect);
                    reduce_state(aut, state, var, unate_type, &mut UnateEffect::default());
                    tested.record(var, unate_type);
                    untested.append(&mut not_unate);
                }
                None => not_unate.push(var),
            }
        }

        self.base.set_init_state(self.original_init);
        self.prime.kill_state(self.forced);

        tested.not_unate = not_unate;
        tested.finish(&effect, started);
        tested
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::dict::BddDict;
    use crate::product::contains;
    use crate::unate::UnateHandler;

    #[test]
    fn test_single_self_loop_is_positive_unate() {
        let mut aut = Automaton::new(Rc::new(BddDict::new()));
        let x = aut.register_ap("x");
        let fx = aut.bdd().mk_var(x);
        aut.new_state();
        aut.new_edge(0, 0, fx, true);

        let mut handler = UnateHandler::new(Box::new(ExactStrategy::new(&aut, vec![x], 50)));
        let report = handler.run(&mut aut, &StopFlag::new());

        assert_eq!(report.algorithm, "complement");
        assert!(report.tested_states[0].complement_succeeded);
        assert_eq!(report.tested_states[0].positive, vec![x]);
        assert_eq!(aut.out(0)[0].cond, fx);
    }

    #[test]
    fn test_free_output_is_fixed() {
        // 0 --a--> 0 (accepting): the output y is irrelevant and gets fixed.
        let mut aut = Automaton::new(Rc::new(BddDict::new()));
        let a = aut.register_ap("a");
        let y = aut.register_ap("y");
        let fa = aut.bdd().mk_var(a);
        aut.new_state();
        aut.new_edge(0, 0, fa, true);
        let original = aut.clone();

        let mut strategy = ExactStrategy::new(&aut, vec![y], 50);
        let tested = strategy.resolve(&mut aut, 0, &StopFlag::new());
        assert_eq!(tested.positive, vec![y]);
        assert_eq!(tested.impacted_edges, 1);

        let bdd = aut.bdd();
        let fy = bdd.mk_var(y);
        assert_eq!(aut.out(0)[0].cond, bdd.apply_and(fa, fy));
        // The reduced automaton only accepts words of the original one.
        assert!(contains(&original, &aut, SizeLimit::unbounded()).unwrap());
    }

    #[test]
    fn test_copy_of_input_is_not_unate() {
        let mut aut = Automaton::new(Rc::new(BddDict::new()));
        let a = aut.register_ap("a");
        let y = aut.register_ap("y");
        let bdd = aut.bdd();
        let guard = bdd.apply_eq(bdd.mk_var(a), bdd.mk_var(y));
        aut.new_state();
        aut.new_edge(0, 0, guard, true);

        let tested = ExactStrategy::new(&aut, vec![y], 50).resolve(&mut aut, 0, &StopFlag::new());
        assert_eq!(tested.not_unate, vec![y]);
        assert_eq!(aut.out(0)[0].cond, guard);
    }

    #[test]
    fn test_failed_complement_skips_state() {
        let mut aut = Automaton::new(Rc::new(BddDict::new()));
        let x = aut.register_ap("x");
        let fx = aut.bdd().mk_var(x);
        aut.new_state();
        aut.new_edge(0, 0, fx, true);

        // A multiplier of one cannot hold the complement.
        let tested = ExactStrategy::new(&aut, vec![x], 1).resolve(&mut aut, 0, &StopFlag::new());
        assert!(!tested.complement_succeeded);
        assert!(tested.positive.is_empty() && tested.not_unate.is_empty());
        assert_eq!(aut.out(0)[0].cond, fx);
    }

    #[test]
    fn test_negation_is_used_at_initial_state() {
        let mut aut = Automaton::new(Rc::new(BddDict::new()));
        let x = aut.register_ap("x");
        let fx = aut.bdd().mk_var(x);
        aut.new_state();
        aut.new_edge(0, 0, fx, true);

        let negation = complement(&aut, SizeLimit::unbounded()).unwrap();
        // Multiplier one would fail without the supplied negation.
        let mut strategy = ExactStrategy::new(&aut, vec![x], 1).with_negation(negation);
        let tested = strategy.resolve(&mut aut, 0, &StopFlag::new());
        assert!(tested.complement_succeeded);
        assert_eq!(tested.positive, vec![x]);
    }
}
