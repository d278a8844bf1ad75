//! Rank-based complementation of Büchi automata.
//!
//! The input is first degeneralised into a state-based Büchi automaton whose states
//! remember whether the last edge taken was accepting. Its complement is then built with
//! tight level rankings (Friedgut, Kupferman and Vardi). The construction has two parts:
//!
//! - A plain subset construction that follows the run DAG until its ranking becomes
//!   tight. None of these macrostates is accepting.
//! - Ranked macrostates, entered nondeterministically from any subset. They map every
//!   state of the subset to a rank, accepting states only get even ranks, ranks never
//!   grow along a transition, and the ranking is tight: its largest rank is odd and
//!   every odd rank below it is used. A breakpoint set tracks the even-ranked states that
//!   still have to reach an odd rank; the macrostate is accepting whenever it is empty.
//!
//! Tightness bounds the ranks of a subset by `2k - 1`, where `k` is the number of its
//! non-accepting states.
//!
//! The alphabet stays symbolic: the letters leaving a macrostate are the atoms of the
//! partition induced by the guards of its states, and atoms with the same target are
//! merged back into one guard.
//!
//! Rankings are enumerated lazily, so construction aborts as soon as the result exceeds
//! the given [`SizeLimit`].

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::rc::Rc;

use log::debug;
use thiserror::Error;

use crate::automaton::{Automaton, StateId};
use crate::bdd::Bdd;
use crate::reference::Ref;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum ComplementError {
    #[error("complement is too large ({states} states and {edges} edges allowed)")]
    TooLarge { states: usize, edges: usize },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SizeLimit {
    pub max_states: usize,
    pub max_edges: usize,
}

impl SizeLimit {
    pub fn unbounded() -> Self {
        Self {
            max_states: usize::MAX,
            max_edges: usize::MAX,
        }
    }

    /// `multiplier` times the states and edges of `aut`.
    pub fn relative_to(aut: &Automaton, multiplier: usize) -> Self {
        Self {
            max_states: aut.num_states().max(1).saturating_mul(multiplier),
            max_edges: aut.num_edges().max(1).saturating_mul(multiplier),
        }
    }
}

/// State-based view of a transition-based automaton.
struct Degeneralized {
    accepting: Vec<bool>,
    succ: Vec<Vec<(Ref, usize)>>,
}

impl Degeneralized {
    fn new(aut: &Automaton) -> Self {
        let zero = aut.bdd().zero();
        let mut index: HashMap<(StateId, bool), usize> = HashMap::new();
        let mut states = Vec::new();
        let mut succ: Vec<Vec<(Ref, usize)>> = Vec::new();

        let start = (aut.init_state(), false);
        index.insert(start, 0);
        states.push(start);
        succ.push(Vec::new());

        let mut queue = VecDeque::from([0]);
        while let Some(i) = queue.pop_front() {
            let (q, _) = states[i];
            for e in aut.out(q) {
                if e.cond == zero {
                    continue;
                }
                let key = (e.dst, e.acc);
                let j = *index.entry(key).or_insert_with(|| {
                    states.push(key);
                    succ.push(Vec::new());
                    queue.push_back(states.len() - 1);
                    states.len() - 1
                });
                succ[i].push((e.cond, j));
            }
        }

        Self {
            accepting: states.iter().map(|&(_, acc)| acc).collect(),
            succ,
        }
    }

    fn len(&self) -> usize {
        self.accepting.len()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum Macrostate {
    /// Successors of the initial state, before any ranks are guessed.
    Subset(Vec<usize>),
    /// A tight level ranking over the current subset, plus the breakpoint set.
    Ranked {
        ranks: Vec<(usize, u32)>,
        breakpoint: Vec<usize>,
    },
}

impl Macrostate {
    fn is_accepting(&self) -> bool {
        matches!(self, Macrostate::Ranked { breakpoint, .. } if breakpoint.is_empty())
    }

    fn states(&self) -> Vec<usize> {
        match self {
            Macrostate::Subset(states) => states.clone(),
            Macrostate::Ranked { ranks, .. } => ranks.iter().map(|&(q, _)| q).collect(),
        }
    }
}

/// Splits `one` into the atoms of the partition induced by `guards`.
fn atoms(bdd: &Bdd, guards: &BTreeSet<Ref>) -> Vec<Ref> {
    let mut atoms = vec![bdd.one()];
    for &g in guards {
        let mut next = Vec::with_capacity(atoms.len() * 2);
        for a in atoms {
            for part in [bdd.apply_and(a, g), bdd.apply_and(a, -g)] {
                if bdd.is_sat(part) {
                    next.push(part);
                }
            }
        }
        atoms = next;
    }
    atoms
}

/// Odd ranks still missing before `ranks` can be completed into a tight ranking.
fn missing_odd_ranks(ranks: &[(usize, u32)]) -> usize {
    let max = ranks.iter().map(|&(_, r)| r).max().unwrap_or(0);
    let top = if max % 2 == 1 { max } else { max + 1 };
    (1..=top)
        .step_by(2)
        .filter(|&odd| ranks.iter().all(|&(_, r)| r != odd))
        .count()
}

/// Depth-first enumeration of the tight rankings below a bound.
struct TightRankings<'a> {
    bounds: &'a [(usize, u32)],
    accepting: &'a [bool],
    prefix: Vec<(usize, u32)>,
}

impl<'a> TightRankings<'a> {
    fn new(bounds: &'a [(usize, u32)], accepting: &'a [bool]) -> Self {
        Self {
            bounds,
            accepting,
            prefix: Vec::with_capacity(bounds.len()),
        }
    }

    /// Calls `visit` on every tight ranking `f` with `f(q) <= bound(q)` and even ranks on
    /// accepting states. Stops at the first error.
    fn for_each<E, F>(&mut self, visit: &mut F) -> Result<(), E>
    where
        F: FnMut(Vec<(usize, u32)>) -> Result<(), E>,
    {
        if self.bounds.is_empty() {
            return visit(Vec::new());
        }
        self.extend(visit)
    }

    fn extend<E, F>(&mut self, visit: &mut F) -> Result<(), E>
    where
        F: FnMut(Vec<(usize, u32)>) -> Result<(), E>,
    {
        let depth = self.prefix.len();
        // Only non-accepting states can still fill in odd ranks.
        let free = self.bounds[depth..]
            .iter()
            .filter(|&&(q, _)| !self.accepting[q])
            .count();
        if missing_odd_ranks(&self.prefix) > free {
            return Ok(());
        }
        let Some(&(q, bound)) = self.bounds.get(depth) else {
            return visit(self.prefix.clone());
        };
        for r in 0..=bound {
            if self.accepting[q] && r % 2 == 1 {
                continue;
            }
            self.prefix.push((q, r));
            let res = self.extend(visit);
            self.prefix.pop();
            res?;
        }
        Ok(())
    }
}

/// Macrostates and edges of the complement under construction.
struct Builder<'a> {
    bdd: &'a Bdd,
    limit: SizeLimit,
    index: HashMap<Macrostate, usize>,
    macrostates: Vec<Macrostate>,
    edges: HashMap<(usize, usize), Ref>,
    edge_order: Vec<(usize, usize)>,
    queue: VecDeque<usize>,
}

impl<'a> Builder<'a> {
    fn new(bdd: &'a Bdd, limit: SizeLimit, start: Macrostate) -> Self {
        Self {
            bdd,
            limit,
            index: HashMap::from([(start.clone(), 0)]),
            macrostates: vec![start],
            edges: HashMap::new(),
            edge_order: Vec::new(),
            queue: VecDeque::from([0]),
        }
    }

    fn too_large(&self) -> ComplementError {
        ComplementError::TooLarge {
            states: self.limit.max_states,
            edges: self.limit.max_edges,
        }
    }

    /// Adds `atom` to the guard of the edge from `src` to `target`.
    fn add_edge(
        &mut self,
        src: usize,
        target: Macrostate,
        atom: Ref,
    ) -> Result<(), ComplementError> {
        let t = match self.index.get(&target) {
            Some(&t) => t,
            None => {
                let t = self.macrostates.len();
                if t >= self.limit.max_states {
                    debug!("complement aborted at {} states", t);
                    return Err(self.too_large());
                }
                self.index.insert(target.clone(), t);
                self.macrostates.push(target);
                self.queue.push_back(t);
                t
            }
        };

        match self.edges.get_mut(&(src, t)) {
            Some(cond) => *cond = self.bdd.apply_or(*cond, atom),
            None => {
                if self.edges.len() >= self.limit.max_edges {
                    debug!("complement aborted at {} edges", self.edges.len());
                    return Err(self.too_large());
                }
                self.edges.insert((src, t), atom);
                self.edge_order.push((src, t));
            }
        }
        Ok(())
    }
}

/// Builds an automaton accepting exactly the words `aut` rejects.
pub fn complement(aut: &Automaton, limit: SizeLimit) -> Result<Automaton, ComplementError> {
    let bdd = aut.bdd();

    let mut result = Automaton::new(Rc::clone(aut.dict()));
    for &ap in aut.aps() {
        let name = aut.dict().display_name(ap);
        result.register_ap(&name);
    }
    if aut.num_states() == 0 {
        result.new_state();
        result.new_edge(0, 0, bdd.one(), true);
        return Ok(result);
    }

    let sba = Degeneralized::new(aut);
    debug!(
        "complementing {} states ({} degeneralised, {} non-accepting)",
        aut.num_states(),
        sba.len(),
        sba.accepting.iter().filter(|&&acc| !acc).count()
    );

    let mut builder = Builder::new(bdd, limit, Macrostate::Subset(vec![0]));
    while let Some(m) = builder.queue.pop_front() {
        let current = builder.macrostates[m].clone();
        let states = current.states();

        let guards: BTreeSet<Ref> = states
            .iter()
            .flat_map(|&q| sba.succ[q].iter().map(|&(g, _)| g))
            .collect();

        for atom in atoms(bdd, &guards) {
            // Rank bound of each successor: the minimum over its predecessors.
            let mut bounds: BTreeMap<usize, u32> = BTreeMap::new();
            let mut from_breakpoint: BTreeSet<usize> = BTreeSet::new();
            let (ranks, breakpoint): (Vec<(usize, u32)>, Vec<usize>) = match &current {
                Macrostate::Subset(subset) => {
                    (subset.iter().map(|&q| (q, u32::MAX)).collect(), Vec::new())
                }
                Macrostate::Ranked { ranks, breakpoint } => (ranks.clone(), breakpoint.clone()),
            };
            for &(q, r) in &ranks {
                for &(g, q2) in &sba.succ[q] {
                    if !bdd.is_sat(bdd.apply_and(atom, g)) {
                        continue;
                    }
                    let bound = bounds.entry(q2).or_insert(r);
                    *bound = (*bound).min(r);
                    if breakpoint.contains(&q) {
                        from_breakpoint.insert(q2);
                    }
                }
            }

            // A tight ranking of `k` non-accepting states never goes above `2k - 1`.
            let non_accepting = bounds.keys().filter(|&&q| !sba.accepting[q]).count() as u32;
            let cap = (2 * non_accepting).saturating_sub(1);
            let bounds: Vec<(usize, u32)> =
                bounds.into_iter().map(|(q, b)| (q, b.min(cap))).collect();

            let restart = breakpoint.is_empty();
            if matches!(current, Macrostate::Subset(_)) {
                let subset = bounds.iter().map(|&(q, _)| q).collect();
                builder.add_edge(m, Macrostate::Subset(subset), atom)?;
            }
            let mut add_ranked = |ranks: Vec<(usize, u32)>| {
                let breakpoint = ranks
                    .iter()
                    .filter(|&&(q, r)| r % 2 == 0 && (restart || from_breakpoint.contains(&q)))
                    .map(|&(q, _)| q)
                    .collect();
                builder.add_edge(m, Macrostate::Ranked { ranks, breakpoint }, atom)
            };
            TightRankings::new(&bounds, &sba.accepting).for_each(&mut add_ranked)?;
        }
    }

    result.new_states(builder.macrostates.len());
    result.set_init_state(0);
    for &(src, dst) in &builder.edge_order {
        let cond = builder.edges[&(src, dst)];
        result.new_edge(src, dst, cond, builder.macrostates[src].is_accepting());
    }

    debug!(
        "complement has {} states and {} edges",
        result.num_states(),
        result.num_edges()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::dict::BddDict;
    use crate::product::intersects;

    fn single_loop(guard: impl Fn(&Bdd, Ref) -> Ref) -> Automaton {
        let dict = Rc::new(BddDict::new());
        let mut aut = Automaton::new(dict);
        let x = aut.register_ap("x");
        let x = aut.bdd().mk_var(x);
        let g = guard(aut.bdd(), x);
        aut.new_state();
        aut.new_edge(0, 0, g, true);
        aut
    }

    #[test]
    fn test_complement_of_always_x() {
        let aut = single_loop(|_, x| x);
        let comp = complement(&aut, SizeLimit::unbounded()).unwrap();

        // Same dictionary, disjoint languages.
        assert!(comp.same_dict(&aut));
        assert!(!comp.is_empty());
        assert!(!intersects(&aut, &comp));

        // "Eventually !x" is in the complement.
        let mut eventually_not_x = Automaton::new(Rc::clone(aut.dict()));
        let x = aut.bdd().mk_var(aut.aps()[0]);
        let one = aut.bdd().one();
        eventually_not_x.new_states(2);
        eventually_not_x.new_edge(0, 0, x, false);
        eventually_not_x.new_edge(0, 1, -x, false);
        eventually_not_x.new_edge(1, 1, one, true);
        assert!(intersects(&comp, &eventually_not_x));
    }

    #[test]
    fn test_complement_of_universal_is_empty() {
        let aut = single_loop(|bdd, _| bdd.one());
        let comp = complement(&aut, SizeLimit::unbounded()).unwrap();
        assert!(comp.is_empty());
    }

    #[test]
    fn test_complement_of_empty_is_universal() {
        // The only loop is not accepting.
        let dict = Rc::new(BddDict::new());
        let mut aut = Automaton::new(dict);
        let one = aut.bdd().one();
        aut.new_state();
        aut.new_edge(0, 0, one, false);

        let comp = complement(&aut, SizeLimit::unbounded()).unwrap();
        assert!(aut.is_empty());
        assert!(!comp.is_empty());
    }

    #[test]
    fn test_infinitely_often_x() {
        // GF x: 0 --x (acc)--> 0, 0 --!x--> 0
        let dict = Rc::new(BddDict::new());
        let mut aut = Automaton::new(dict);
        let x = aut.register_ap("x");
        let x = aut.bdd().mk_var(x);
        aut.new_state();
        aut.new_edge(0, 0, x, true);
        aut.new_edge(0, 0, -x, false);

        let comp = complement(&aut, SizeLimit::unbounded()).unwrap();
        assert!(!intersects(&aut, &comp));

        // FG !x belongs to the complement.
        let mut fg_not_x = Automaton::new(Rc::clone(aut.dict()));
        let one = aut.bdd().one();
        fg_not_x.new_states(2);
        fg_not_x.new_edge(0, 0, one, false);
        fg_not_x.new_edge(0, 1, -x, false);
        fg_not_x.new_edge(1, 1, -x, true);
        assert!(intersects(&comp, &fg_not_x));
    }

    #[test]
    fn test_size_limit() {
        let aut = single_loop(|_, x| x);
        let limit = SizeLimit {
            max_states: 2,
            max_edges: 100,
        };
        assert_eq!(
            complement(&aut, limit).unwrap_err(),
            ComplementError::TooLarge {
                states: 2,
                edges: 100
            }
        );

        let limit = SizeLimit::relative_to(&aut, 100);
        assert!(complement(&aut, limit).is_ok());
    }

    #[test]
    fn test_tight_rankings() {
        let collect = |bounds: &[(usize, u32)], accepting: &[bool]| {
            let mut found: Vec<Vec<u32>> = Vec::new();
            let res: Result<(), ()> = TightRankings::new(bounds, accepting).for_each(&mut |ranks| {
                found.push(ranks.iter().map(|&(_, r)| r).collect());
                Ok(())
            });
            assert!(res.is_ok());
            found
        };

        let bounds = [(0, 3), (1, 3)];
        assert_eq!(
            collect(&bounds, &[false, false]),
            vec![vec![0, 1], vec![1, 0], vec![1, 1], vec![1, 3], vec![3, 1]]
        );
        // Accepting states only take even ranks, and the largest rank must be odd.
        assert_eq!(collect(&bounds, &[false, true]), vec![vec![1, 0]]);
        // No odd rank is available at all.
        assert!(collect(&[(0, 3)], &[true]).is_empty());
        // The empty ranking is tight.
        assert_eq!(collect(&[], &[]), vec![Vec::<u32>::new()]);
    }

    #[test]
    fn test_complement_of_eventually_always_x() {
        // FG x: 0 --true--> 0, 0 --x--> 1, 1 --x (acc)--> 1
        let dict = Rc::new(BddDict::new());
        let mut aut = Automaton::new(dict);
        let x = aut.register_ap("x");
        let x = aut.bdd().mk_var(x);
        let one = aut.bdd().one();
        aut.new_states(2);
        aut.new_edge(0, 0, one, false);
        aut.new_edge(0, 1, x, false);
        aut.new_edge(1, 1, x, true);

        let comp = complement(&aut, SizeLimit::relative_to(&aut, 50)).unwrap();
        assert!(!intersects(&aut, &comp));

        // (x !x)^ω visits !x infinitely often.
        let mut alternating = Automaton::new(Rc::clone(aut.dict()));
        alternating.new_states(2);
        alternating.new_edge(0, 1, x, true);
        alternating.new_edge(1, 0, -x, true);
        assert!(intersects(&comp, &alternating));

        let mut never_x = Automaton::new(Rc::clone(aut.dict()));
        never_x.new_state();
        never_x.new_edge(0, 0, -x, true);
        assert!(intersects(&comp, &never_x));
    }

    #[test]
    fn test_blowup_is_reported_before_enumeration() {
        // Eight states, all guards `true`, a single accepting self-loop.
        let dict = Rc::new(BddDict::new());
        let mut aut = Automaton::new(dict);
        let one = aut.bdd().one();
        aut.new_states(8);
        for q in 0..8 {
            aut.new_edge(q, (q + 1) % 8, one, false);
            aut.new_edge(q, 0, one, false);
        }
        aut.new_edge(0, 0, one, true);

        let limit = SizeLimit::relative_to(&aut, 5);
        assert!(matches!(
            complement(&aut, limit),
            Err(ComplementError::TooLarge { .. })
        ));
    }
}
