//! Transition-based Büchi automata with BDD guards.
//!
//! States are dense indices `0..num_states()`. Each state owns the vector of its outgoing
//! edges; an edge is identified within one state by its slot in that vector. Guards are
//! BDDs over the atomic propositions registered in the shared [`BddDict`]. A run is
//! accepting when it takes accepting edges infinitely often.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use log::debug;

use crate::bdd::Bdd;
use crate::dict::BddDict;
use crate::reference::Ref;
use crate::scc::SccDecomposition;
use crate::types::Var;

pub type StateId = usize;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Edge {
    pub src: StateId,
    pub dst: StateId,
    pub cond: Ref,
    pub acc: bool,
}

/// BDD-size statistics over the distinct guards of an automaton.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct GuardSummary {
    /// Sum of guard sizes, counting a shared guard once per edge.
    pub total_size_repeated: usize,
    /// Sum of guard sizes, counting a shared guard once.
    pub total_size_unique: usize,
    /// Number of distinct guards.
    pub total_guards: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub avg_size: usize,
}

/// A deep copy shares only the dictionary: edge storage is never aliased.
#[derive(Clone)]
pub struct Automaton {
    dict: Rc<BddDict>,
    states: Vec<Vec<Edge>>,
    init: StateId,
    aps: Vec<Var>,
}

impl Automaton {
    pub fn new(dict: Rc<BddDict>) -> Self {
        Self {
            dict,
            states: Vec::new(),
            init: 0,
            aps: Vec::new(),
        }
    }

    pub fn dict(&self) -> &Rc<BddDict> {
        &self.dict
    }

    pub fn bdd(&self) -> &Bdd {
        self.dict.bdd()
    }

    pub fn same_dict(&self, other: &Automaton) -> bool {
        Rc::ptr_eq(&self.dict, &other.dict)
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_edges(&self) -> usize {
        self.states.iter().map(|out| out.len()).sum()
    }

    pub fn new_state(&mut self) -> StateId {
        self.states.push(Vec::new());
        self.states.len() - 1
    }

    /// Adds `n` states and returns the first of them.
    pub fn new_states(&mut self, n: usize) -> StateId {
        let first = self.states.len();
        self.states.resize_with(first + n, Vec::new);
        first
    }

    /// Adds an edge and returns its slot among the outgoing edges of `src`.
    pub fn new_edge(&mut self, src: StateId, dst: StateId, cond: Ref, acc: bool) -> usize {
        assert!(src < self.states.len(), "Unknown source state {}", src);
        assert!(dst < self.states.len(), "Unknown destination state {}", dst);
        let out = &mut self.states[src];
        out.push(Edge { src, dst, cond, acc });
        out.len() - 1
    }

    pub fn init_state(&self) -> StateId {
        self.init
    }

    pub fn set_init_state(&mut self, state: StateId) {
        assert!(state < self.states.len(), "Unknown initial state {}", state);
        self.init = state;
    }

    pub fn out(&self, state: StateId) -> &[Edge] {
        &self.states[state]
    }

    /// Outgoing edges of `state`, with mutable guards. Slots stay stable.
    pub fn out_mut(&mut self, state: StateId) -> &mut [Edge] {
        &mut self.states[state]
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.states.iter().flatten()
    }

    /// Removes all outgoing edges of `state`. The state itself stays allocated.
    pub fn kill_state(&mut self, state: StateId) {
        self.states[state].clear();
    }

    /// Registers the proposition `name` with this automaton and returns its variable.
    pub fn register_ap(&mut self, name: &str) -> Var {
        let var = self.dict.register(name);
        if !self.aps.contains(&var) {
            self.aps.push(var);
        }
        var
    }

    pub fn aps(&self) -> &[Var] {
        &self.aps
    }

    pub fn ap_names(&self) -> Vec<String> {
        self.aps.iter().map(|&v| self.dict.display_name(v)).collect()
    }

    pub fn unregister_ap(&mut self, var: Var) {
        self.aps.retain(|&v| v != var);
    }

    /// Projects the propositions `vars` away: every guard is existentially quantified
    /// over them, then they are unregistered.
    pub fn remove_aps(&mut self, vars: &[Var]) {
        let dict = Rc::clone(&self.dict);
        let bdd = dict.bdd();
        for edge in self.states.iter_mut().flatten() {
            edge.cond = bdd.exists(edge.cond, vars);
        }
        for &var in vars {
            self.unregister_ap(var);
        }
        debug!("removed {} propositions, {} remain", vars.len(), self.aps.len());
    }

    fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.num_states()];
        if self.states.is_empty() {
            return seen;
        }
        let mut queue = VecDeque::from([self.init]);
        seen[self.init] = true;
        while let Some(s) = queue.pop_front() {
            for e in &self.states[s] {
                if !seen[e.dst] {
                    seen[e.dst] = true;
                    queue.push_back(e.dst);
                }
            }
        }
        seen
    }

    fn scc(&self) -> SccDecomposition {
        let roots = if self.states.is_empty() {
            vec![]
        } else {
            vec![self.init]
        };
        let zero = self.bdd().zero();
        SccDecomposition::new(self.num_states(), roots, |s| {
            self.states[s]
                .iter()
                .filter(|e| e.cond != zero)
                .map(|e| e.dst)
                .collect::<Vec<_>>()
        })
    }

    /// For each state: can it reach a cycle through an accepting edge?
    fn useful_states(&self) -> Vec<bool> {
        let zero = self.bdd().zero();
        let scc = self.scc();
        let mut accepting = vec![false; scc.num_components()];
        for e in self.edges() {
            if e.acc && e.cond != zero && scc.same_component(e.src, e.dst) {
                if let Some(c) = scc.component_of(e.src) {
                    accepting[c] = true;
                }
            }
        }

        // Components come sinks first, so successors are settled before their predecessors.
        let mut useful_component = vec![false; scc.num_components()];
        for (c, members) in scc.components().iter().enumerate() {
            let useful = accepting[c]
                || members.iter().any(|&s| {
                    self.states[s].iter().filter(|e| e.cond != zero).any(|e| {
                        scc.component_of(e.dst)
                            .is_some_and(|d| d != c && useful_component[d])
                    })
                });
            useful_component[c] = useful;
        }

        (0..self.num_states())
            .map(|s| scc.component_of(s).is_some_and(|c| useful_component[c]))
            .collect()
    }

    /// Whether the automaton accepts no word.
    pub fn is_empty(&self) -> bool {
        if self.states.is_empty() {
            return true;
        }
        !self.useful_states()[self.init]
    }

    /// Drops edges with an unsatisfiable guard and states that cannot take part in an
    /// accepting run, then renumbers the remaining states in their original order.
    ///
    /// The initial state is always kept, without edges when it is dead itself. Returns the
    /// number of removed states.
    pub fn purge_dead_states(&mut self) -> usize {
        if self.states.is_empty() {
            return 0;
        }

        let zero = self.bdd().zero();
        for out in self.states.iter_mut() {
            out.retain(|e| e.cond != zero);
        }

        let reachable = self.reachable();
        let useful = self.useful_states();
        let live: Vec<bool> = (0..self.num_states()).map(|s| reachable[s] && useful[s]).collect();

        let mut renumber = vec![None; self.num_states()];
        let mut next = 0;
        for s in 0..self.num_states() {
            if live[s] || s == self.init {
                renumber[s] = Some(next);
                next += 1;
            }
        }

        let old = std::mem::take(&mut self.states);
        let removed = old.len() - next;
        for (s, out) in old.into_iter().enumerate() {
            let Some(src) = renumber[s] else {
                continue;
            };
            let edges = out
                .into_iter()
                .filter(|e| live[e.dst])
                .filter_map(|e| {
                    renumber[e.dst].map(|dst| Edge {
                        src,
                        dst,
                        cond: e.cond,
                        acc: e.acc,
                    })
                })
                .collect();
            self.states.push(edges);
        }
        self.init = renumber[self.init].unwrap_or(0);

        debug!(
            "purged {} dead states, {} states and {} edges remain",
            removed,
            self.num_states(),
            self.num_edges()
        );
        removed
    }

    pub fn guard_summary(&self) -> GuardSummary {
        let bdd = self.bdd();
        let mut count: HashMap<Ref, usize> = HashMap::new();
        for e in self.edges() {
            *count.entry(e.cond).or_default() += 1;
        }
        if count.is_empty() {
            return GuardSummary::default();
        }

        let mut summary = GuardSummary {
            total_guards: count.len(),
            min_size: usize::MAX,
            ..Default::default()
        };
        for (&cond, &n) in &count {
            // Node count without the terminal.
            let size = bdd.size(cond) - 1;
            summary.total_size_repeated += size * n;
            summary.total_size_unique += size;
            summary.min_size = summary.min_size.min(size);
            summary.max_size = summary.max_size.max(size);
        }
        summary.avg_size = summary.total_size_unique / summary.total_guards;
        summary
    }

    /// Variables occurring in any guard.
    pub fn support(&self) -> BTreeSet<Var> {
        let bdd = self.bdd();
        let mut vars = BTreeSet::new();
        for e in self.edges() {
            vars.extend(bdd.support(e.cond));
        }
        vars
    }
}

impl Debug for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Automaton")
            .field("states", &self.num_states())
            .field("edges", &self.num_edges())
            .field("init", &self.init)
            .field("aps", &self.ap_names())
            .finish()
    }
}

impl Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AP: {}", self.ap_names().join(" "))?;
        writeln!(f, "Start: {}", self.init)?;
        for (s, out) in self.states.iter().enumerate() {
            writeln!(f, "State: {}", s)?;
            for e in out {
                write!(f, "  [{}] {}", self.dict.format(e.cond), e.dst)?;
                if e.acc {
                    write!(f, " {{0}}")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
