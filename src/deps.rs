//! Dependent-variable classification.
//!
//! A candidate `x` is *dependent* on a set `Y` when, at every reachable pair-state
//! `(s1, s2)`, no assignment of `Y` lets an edge of `s1` fire with `x = 1` while an edge
//! of `s2` fires with `x = 0` (or the other way around). Variables outside `Y ∪ {x}` are
//! "reset": in the guard of the second edge they are renamed to fresh prime copies, so
//! the two edges only have to agree on `Y`.
//!
//! Candidates are popped from the back of the worklist. The dependency set of a candidate
//! is made of the candidates still waiting and the variables already found independent
//! (plus all inputs when the candidates are outputs), so the processing order matters and
//! is part of the contract.
//!
//! ```
//! use std::rc::Rc;
//! use depsynth::automaton::Automaton;
//! use depsynth::deadline::StopFlag;
//! use depsynth::deps::DependencyClassifier;
//! use depsynth::dict::BddDict;
//!
//! // One state with a self-loop on `a <-> b`: the output `b` copies the input `a`.
//! let mut aut = Automaton::new(Rc::new(BddDict::new()));
//! let a = aut.register_ap("a");
//! let b = aut.register_ap("b");
//! let bdd = aut.bdd();
//! let guard = bdd.apply_eq(bdd.mk_var(a), bdd.mk_var(b));
//! aut.new_state();
//! aut.new_edge(0, 0, guard, true);
//!
//! let classifier = DependencyClassifier::new(&aut, vec![a], vec![b]);
//! let (classification, report) = classifier.classify(&StopFlag::new());
//! assert_eq!(classification.dependent, vec![b]);
//! assert!(report.completed);
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::automaton::{Automaton, StateId};
use crate::deadline::StopFlag;
use crate::pair_states::{compatible_pair_states, PairState};
use crate::reference::Ref;
use crate::types::Var;

/// Which side of the specification the candidates come from.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum DependentVariableType {
    #[default]
    Output,
    Input,
}

/// A variable together with its prime copy.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VarIndexer {
    pub var: Var,
    pub prime: Var,
}

#[derive(Debug, Clone)]
pub struct VarVerdict {
    pub var: Var,
    pub name: String,
    pub dependent: bool,
    pub dependency_set: Vec<Var>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct DepsReport {
    pub pair_states: usize,
    pub pair_search_duration: Duration,
    pub verdicts: Vec<VarVerdict>,
    /// `false` if the search was stopped before every candidate was tested.
    pub completed: bool,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Classification {
    pub dependent: Vec<Var>,
    pub independent: Vec<Var>,
}

pub struct DependencyClassifier<'a> {
    aut: &'a Automaton,
    inputs: Vec<Var>,
    outputs: Vec<Var>,
    kind: DependentVariableType,
    fast: bool,
    indexers: Vec<VarIndexer>,
}

impl<'a> DependencyClassifier<'a> {
    pub fn new(aut: &'a Automaton, inputs: Vec<Var>, outputs: Vec<Var>) -> Self {
        let all: Vec<Var> = inputs.iter().chain(outputs.iter()).copied().collect();
        let primes = aut.dict().primes(&all);
        let indexers = all
            .into_iter()
            .zip(primes)
            .map(|(var, prime)| VarIndexer { var, prime })
            .collect();
        Self {
            aut,
            inputs,
            outputs,
            kind: DependentVariableType::Output,
            fast: false,
            indexers,
        }
    }

    pub fn with_kind(mut self, kind: DependentVariableType) -> Self {
        self.kind = kind;
        self
    }

    /// Replace the edge-pair double loop with one union per state of the pair.
    pub fn with_fast_check(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    pub fn candidates(&self) -> Vec<Var> {
        match self.kind {
            DependentVariableType::Output => self.outputs.clone(),
            DependentVariableType::Input => self.inputs.clone(),
        }
    }

    /// The variables a candidate may depend on, given the current worklist and the
    /// variables already found independent.
    pub fn dependency_set(&self, candidates: &[Var], independents: &[Var]) -> Vec<Var> {
        let mut set = Vec::new();
        if self.kind == DependentVariableType::Output {
            set.extend_from_slice(&self.inputs);
        }
        set.extend_from_slice(candidates);
        set.extend_from_slice(independents);
        set
    }

    /// Runs the classification. Candidates left untested when `stop` is raised are
    /// classified independent.
    pub fn classify(&self, stop: &StopFlag) -> (Classification, DepsReport) {
        let start = Instant::now();
        let mut report = DepsReport::default();
        let mut classification = Classification::default();
        let mut candidates = self.candidates();
        info!(
            "searching dependencies among {} candidates ({} states, {} edges)",
            candidates.len(),
            self.aut.num_states(),
            self.aut.num_edges()
        );

        let search = compatible_pair_states(self.aut, stop);
        report.pair_states = search.pairs.len();
        report.pair_search_duration = start.elapsed();
        debug!(
            "{} pair-states in {:?}",
            report.pair_states, report.pair_search_duration
        );

        if !search.complete {
            warn!("pair-state search interrupted, all candidates are independent");
            classification.independent.extend(candidates);
            report.duration = start.elapsed();
            return (classification, report);
        }

        let mut stopped = false;
        while !stop.should_stop() {
            let Some(x) = candidates.pop() else {
                break;
            };
            let started = Instant::now();
            let dependency_set = self.dependency_set(&candidates, &classification.independent);

            let verdict = self.is_variable_dependent(x, &dependency_set, &search.pairs, stop);
            let dependent = match verdict {
                Some(dependent) => dependent,
                None => {
                    stopped = true;
                    false
                }
            };

            let name = self.aut.dict().display_name(x);
            debug!(
                "{} is {} (dependency set of {} variables)",
                name,
                if dependent { "dependent" } else { "independent" },
                dependency_set.len()
            );
            if dependent {
                classification.dependent.push(x);
            } else {
                classification.independent.push(x);
            }
            report.verdicts.push(VarVerdict {
                var: x,
                name,
                dependent,
                dependency_set,
                duration: started.elapsed(),
            });

            if stopped {
                break;
            }
        }

        if !candidates.is_empty() {
            warn!(
                "dependency search stopped, {} untested candidates are independent",
                candidates.len()
            );
        }
        report.completed = candidates.is_empty() && !stopped && !stop.should_stop();
        classification.independent.extend(candidates);
        report.duration = start.elapsed();

        info!(
            "found {} dependent and {} independent variables in {:?}",
            classification.dependent.len(),
            classification.independent.len(),
            report.duration
        );
        (classification, report)
    }

    /// Renaming of every variable outside `dependency_set ∪ {x}` to its prime.
    fn reset_pairs(&self, x: Var, dependency_set: &[Var]) -> HashMap<Var, Var> {
        self.indexers
            .iter()
            .filter(|ix| ix.var != x && !dependency_set.contains(&ix.var))
            .map(|ix| (ix.var, ix.prime))
            .collect()
    }

    /// Whether `x` is dependent on `dependency_set` over the given pair-states.
    ///
    /// Returns `None` if `stop` was raised before the answer was known.
    pub fn is_variable_dependent(
        &self,
        x: Var,
        dependency_set: &[Var],
        pairs: &[PairState],
        stop: &StopFlag,
    ) -> Option<bool> {
        let reset = self.reset_pairs(x, dependency_set);

        for &(s1, s2) in pairs {
            if self.fast {
                if stop.should_stop() {
                    return None;
                }
                let z1 = self.union_of_guards(s1);
                let z2 = self.union_of_guards(s2);
                if self.disagree(x, &reset, z1, z2) {
                    return Some(false);
                }
            } else {
                for e1 in self.aut.out(s1) {
                    for e2 in self.aut.out(s2) {
                        if stop.should_stop() {
                            return None;
                        }
                        if self.disagree(x, &reset, e1.cond, e2.cond) {
                            return Some(false);
                        }
                    }
                }
            }
        }

        Some(true)
    }

    fn union_of_guards(&self, state: StateId) -> Ref {
        let bdd = self.aut.bdd();
        bdd.apply_or_many(self.aut.out(state).iter().map(|e| e.cond))
    }

    /// Can `z1` fire with one value of `x` while `z2` (reset variables primed) fires
    /// with the other?
    fn disagree(&self, x: Var, reset: &HashMap<Var, Var>, z1: Ref, z2: Ref) -> bool {
        let bdd = self.aut.bdd();
        let z2 = bdd.rename(z2, reset);

        let case1 = bdd.apply_and(bdd.restrict(z1, x.pos()), bdd.restrict(z2, x.neg()));
        if bdd.is_sat(case1) {
            return true;
        }
        let case2 = bdd.apply_and(bdd.restrict(z1, x.neg()), bdd.restrict(z2, x.pos()));
        bdd.is_sat(case2)
    }
}
