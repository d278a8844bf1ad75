//! Pairs of states reachable by a common prefix.
//!
//! A pair-state `(p, q)` with `p <= q` says that some input/output prefix can lead the
//! automaton both to `p` and to `q`. The search starts from `(init, init)` and follows
//! pairs of edges that either share their destination or whose guards share an
//! assignment. The guard test checks simultaneous satisfiability of two formulas, an
//! over-approximation of agreement on the individual variables; the dependency test is
//! what makes the final decision.

use std::collections::HashSet;

use log::debug;

use crate::automaton::{Automaton, Edge, StateId};
use crate::deadline::StopFlag;

pub type PairState = (StateId, StateId);

pub fn normalize(p: StateId, q: StateId) -> PairState {
    if p <= q {
        (p, q)
    } else {
        (q, p)
    }
}

/// Result of [`compatible_pair_states`].
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PairStateSearch {
    /// Pair-states in discovery order.
    pub pairs: Vec<PairState>,
    /// `false` if the search was stopped; `pairs` is then incomplete.
    pub complete: bool,
}

fn shares_assignment(aut: &Automaton, e1: &Edge, e2: &Edge) -> bool {
    let bdd = aut.bdd();
    bdd.is_sat(bdd.apply_and(e1.cond, e2.cond))
}

/// Collects every pair-state reachable from `(init, init)`.
pub fn compatible_pair_states(aut: &Automaton, stop: &StopFlag) -> PairStateSearch {
    let mut search = PairStateSearch::default();
    if aut.num_states() == 0 {
        search.complete = true;
        return search;
    }

    let init = aut.init_state();
    let mut stack = vec![(init, init)];
    let mut tested: HashSet<PairState> = HashSet::new();

    while let Some((p, q)) = stack.pop() {
        if stop.should_stop() {
            debug!("pair-state search stopped after {} pairs", search.pairs.len());
            return search;
        }

        let pair = normalize(p, q);
        if !tested.insert(pair) {
            continue;
        }
        search.pairs.push(pair);

        for e1 in aut.out(pair.0) {
            for e2 in aut.out(pair.1) {
                if stop.should_stop() {
                    debug!("pair-state search stopped after {} pairs", search.pairs.len());
                    return search;
                }

                let next = normalize(e1.dst, e2.dst);
                if tested.contains(&next) {
                    continue;
                }
                if e1.dst == e2.dst || shares_assignment(aut, e1, e2) {
                    stack.push(next);
                }
            }
        }
    }

    search.complete = true;
    debug!("found {} pair-states", search.pairs.len());
    search
}
