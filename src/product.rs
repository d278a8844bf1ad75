//! Language queries through synchronous products.
//!
//! The product of two automata over the same dictionary runs both in lockstep on edges
//! whose guards intersect. Each product edge carries two marks, one per operand; the
//! product language is non-empty iff some reachable strongly connected component has
//! internal edges carrying both marks.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::automaton::{Automaton, StateId};
use crate::complement::{complement, ComplementError, SizeLimit};
use crate::scc::SccDecomposition;

const MARK_LEFT: u8 = 0b01;
const MARK_RIGHT: u8 = 0b10;

/// Whether some word is accepted by both `a` and `b`.
pub fn intersects(a: &Automaton, b: &Automaton) -> bool {
    assert!(
        a.same_dict(b),
        "Automata must share their dictionary to be intersected"
    );
    if a.num_states() == 0 || b.num_states() == 0 {
        return false;
    }

    let bdd = a.bdd();
    let mut index: HashMap<(StateId, StateId), usize> = HashMap::new();
    let mut pairs = Vec::new();
    let mut succ: Vec<Vec<(usize, u8)>> = Vec::new();

    let start = (a.init_state(), b.init_state());
    index.insert(start, 0);
    pairs.push(start);
    succ.push(Vec::new());

    let mut queue = VecDeque::from([0]);
    while let Some(i) = queue.pop_front() {
        let (p, q) = pairs[i];
        for e1 in a.out(p) {
            for e2 in b.out(q) {
                if !bdd.is_sat(bdd.apply_and(e1.cond, e2.cond)) {
                    continue;
                }
                let key = (e1.dst, e2.dst);
                let j = *index.entry(key).or_insert_with(|| {
                    pairs.push(key);
                    succ.push(Vec::new());
                    queue.push_back(pairs.len() - 1);
                    pairs.len() - 1
                });
                let mut marks = 0;
                if e1.acc {
                    marks |= MARK_LEFT;
                }
                if e2.acc {
                    marks |= MARK_RIGHT;
                }
                succ[i].push((j, marks));
            }
        }
    }

    let scc = SccDecomposition::new(pairs.len(), [0], |i| {
        succ[i].iter().map(|&(j, _)| j).collect::<Vec<_>>()
    });
    let mut marks = vec![0u8; scc.num_components()];
    for (i, out) in succ.iter().enumerate() {
        for &(j, m) in out {
            if scc.same_component(i, j) {
                if let Some(c) = scc.component_of(i) {
                    marks[c] |= m;
                }
            }
        }
    }

    let result = marks.iter().any(|&m| m == MARK_LEFT | MARK_RIGHT);
    debug!(
        "product of {} and {} states has {} states, intersects = {}",
        a.num_states(),
        b.num_states(),
        pairs.len(),
        result
    );
    result
}

/// Whether every word accepted by `b` is accepted by `a`.
pub fn contains(a: &Automaton, b: &Automaton, limit: SizeLimit) -> Result<bool, ComplementError> {
    let not_a = complement(a, limit)?;
    Ok(!intersects(&not_a, b))
}

/// Whether `a` and `b` accept the same language.
pub fn equivalent(a: &Automaton, b: &Automaton, limit: SizeLimit) -> Result<bool, ComplementError> {
    Ok(contains(a, b, limit)? && contains(b, a, limit)?)
}
