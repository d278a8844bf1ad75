//! Compilation of the dependent variables into a circuit.
//!
//! The circuit tracks the automaton with one latch per state: latch `d` holds whether
//! state `d` is active. Its next function is taken from the projected automaton `A₀`
//! (dependent variables quantified away):
//!
//! ```text
//! next(d) = ⋁ { latch(src) ∧ gate(guard) | src --guard--> d in A₀ }
//! ```
//!
//! Each dependent variable `x` becomes an output computed from the automaton `A_dep`
//! that still mentions the dependent variables:
//!
//! ```text
//! x = ⋁ { latch(src) ∧ partial(guard, x) | src --guard--> _ in A_dep }
//! ```
//!
//! where `partial(guard, x)` follows the BDD of the guard, takes the high branch at `x`,
//! and merges both branches at every other dependent variable.
//!
//! Both automata must share the dictionary and the state numbering. Latches reset to 0;
//! the latch of the initial state has to be set on the first cycle by the caller.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use thiserror::Error;

use crate::aig::Aig;
use crate::automaton::{Automaton, StateId};
use crate::cache::Memo;
use crate::reference::Ref;
use crate::signal::Signal;
use crate::types::Var;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CompileError {
    #[error("the projected automaton has {without_deps} states, the full one has {with_deps}")]
    StateCountMismatch { without_deps: usize, with_deps: usize },

    #[error("the automata do not share a dictionary")]
    DictionaryMismatch,

    #[error("the projected automaton starts in state {without_deps}, the full one in {with_deps}")]
    InitialStateMismatch { without_deps: StateId, with_deps: StateId },

    #[error("the automata have no states")]
    NoStates,

    #[error("there are no dependent variables to compile")]
    NoDependentVariables,

    #[error("variable {0} is neither an input nor a dependent variable")]
    UnknownVariable(String),
}

pub struct DependentsSynthesiser<'a> {
    without_deps: &'a Automaton,
    with_deps: &'a Automaton,
    dependents: Vec<Var>,
    dependent_set: HashSet<Var>,
    aig: Aig,
    signals: HashMap<Var, Signal>,
    latches: Vec<Signal>,
    gate_cache: Memo<Ref, Signal>,
    partial_cache: Memo<(Ref, Var), Signal>,
}

impl<'a> DependentsSynthesiser<'a> {
    /// Prepares a circuit with inputs `inputs ++ independents`, one latch per state and
    /// no outputs yet.
    pub fn new(
        without_deps: &'a Automaton,
        with_deps: &'a Automaton,
        inputs: &[Var],
        independents: &[Var],
        dependents: &[Var],
    ) -> Result<Self> {
        if without_deps.num_states() != with_deps.num_states() {
            return Err(CompileError::StateCountMismatch {
                without_deps: without_deps.num_states(),
                with_deps: with_deps.num_states(),
            });
        }
        if !without_deps.same_dict(with_deps) {
            return Err(CompileError::DictionaryMismatch);
        }
        if with_deps.num_states() == 0 {
            return Err(CompileError::NoStates);
        }
        if without_deps.init_state() != with_deps.init_state() {
            return Err(CompileError::InitialStateMismatch {
                without_deps: without_deps.init_state(),
                with_deps: with_deps.init_state(),
            });
        }
        if dependents.is_empty() {
            return Err(CompileError::NoDependentVariables);
        }

        let dict = with_deps.dict();
        let mut aig = Aig::new();
        let mut signals = HashMap::new();
        for &var in inputs.iter().chain(independents) {
            signals.insert(var, aig.add_input(dict.display_name(var)));
        }
        let latches = (0..with_deps.num_states())
            .map(|_| aig.add_latch(None))
            .collect();

        Ok(Self {
            without_deps,
            with_deps,
            dependents: dependents.to_vec(),
            dependent_set: dependents.iter().copied().collect(),
            aig,
            signals,
            latches,
            gate_cache: Memo::default(),
            partial_cache: Memo::default(),
        })
    }

    /// The latch tracking `state`.
    pub fn latch_of(&self, state: StateId) -> Signal {
        self.latches[state]
    }

    pub fn aig(&self) -> &Aig {
        &self.aig
    }

    pub fn gate_cache(&self) -> &Memo<Ref, Signal> {
        &self.gate_cache
    }

    pub fn partial_cache(&self) -> &Memo<(Ref, Var), Signal> {
        &self.partial_cache
    }

    fn signal_of(&self, var: Var) -> Result<Signal> {
        self.signals
            .get(&var)
            .copied()
            .ok_or_else(|| CompileError::UnknownVariable(self.with_deps.dict().display_name(var)))
    }

    /// The circuit computing `guard`.
    pub fn gate(&mut self, guard: Ref) -> Result<Signal> {
        let aut = self.with_deps;
        let bdd = aut.bdd();
        if bdd.is_one(guard) {
            return Ok(Signal::one());
        }
        if bdd.is_zero(guard) {
            return Ok(Signal::zero());
        }
        if guard.is_negated() {
            return Ok(!self.gate(-guard)?);
        }
        if let Some(res) = self.gate_cache.get(&guard) {
            return Ok(res);
        }

        let high = self.gate(bdd.high_node(guard))?;
        let low = self.gate(bdd.low_node(guard))?;
        let var = Var::new(bdd.variable(guard.id()));
        let top = self.signal_of(var)?;
        let res = self.aig.ite(top, high, low);

        self.gate_cache.insert(guard, res);
        Ok(res)
    }

    /// The condition under which `guard` allows `var` to be 1, with the other dependent
    /// variables quantified existentially.
    pub fn partial_implicant(&mut self, guard: Ref, var: Var) -> Result<Signal> {
        let aut = self.with_deps;
        let bdd = aut.bdd();
        if bdd.is_one(guard) {
            return Ok(Signal::one());
        }
        if bdd.is_zero(guard) {
            return Ok(Signal::zero());
        }
        if let Some(res) = self.partial_cache.get(&(guard, var)) {
            return Ok(res);
        }

        let high = self.partial_implicant(bdd.high_node(guard), var)?;
        let low = self.partial_implicant(bdd.low_node(guard), var)?;
        let top = Var::new(bdd.variable(guard.id()));
        let res = if top == var {
            high
        } else if self.dependent_set.contains(&top) {
            self.aig.or(low, high)
        } else {
            let top = self.signal_of(top)?;
            self.aig.ite(top, high, low)
        };

        self.partial_cache.insert((guard, var), res);
        Ok(res)
    }

    fn define_next_latches(&mut self) -> Result<()> {
        let aut = self.without_deps;
        let mut incoming: Vec<Vec<Signal>> = vec![Vec::new(); aut.num_states()];
        for edge in aut.edges() {
            let cond = self.gate(edge.cond)?;
            let step = self.aig.and(self.latches[edge.src], cond);
            incoming[edge.dst].push(step);
        }
        for (state, steps) in incoming.into_iter().enumerate() {
            // A state without predecessors gets the constant 0.
            let next = self.aig.or_many(steps);
            self.aig.set_latch_next(state, next);
        }
        Ok(())
    }

    fn define_outputs(&mut self) -> Result<()> {
        let aut = self.with_deps;
        for var in self.dependents.clone() {
            let mut terms = Vec::new();
            for edge in aut.edges() {
                let partial = self.partial_implicant(edge.cond, var)?;
                terms.push(self.aig.and(self.latches[edge.src], partial));
            }
            let out = self.aig.or_many(terms);
            self.aig.add_output(aut.dict().display_name(var), out);
        }
        Ok(())
    }

    /// Builds the latch functions and the outputs, then returns the circuit.
    pub fn synthesize(mut self) -> Result<Aig> {
        info!(
            "compiling {} dependent variables over {} states",
            self.dependents.len(),
            self.latches.len()
        );
        self.define_next_latches()?;
        self.define_outputs()?;
        debug!(
            "circuit has {} inputs, {} latches, {} AND gates; gate cache {} hits, partial cache {} hits",
            self.aig.num_inputs(),
            self.aig.num_latches(),
            self.aig.num_ands(),
            self.gate_cache.hits(),
            self.partial_cache.hits()
        );
        Ok(self.aig)
    }
}
