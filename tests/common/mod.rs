#![allow(dead_code)]

use std::rc::Rc;

use depsynth::automaton::Automaton;
use depsynth::dict::BddDict;
use depsynth::reference::Ref;
use depsynth::types::Var;

/// Small deterministic generator, enough to vary the automata between cases.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    pub fn coin(&mut self) -> bool {
        self.next() & 1 == 1
    }
}

/// Bit `k` of `mask` is the value of `vars[k]`.
pub fn value_of(vars: &[Var], mask: u32, var: Var) -> bool {
    vars.iter().position(|&v| v == var).is_some_and(|k| mask >> k & 1 == 1)
}

/// The guard whose models are the masks `m` with bit `m` set in `table`.
pub fn guard_from_table(aut: &Automaton, vars: &[Var], table: u64) -> Ref {
    let bdd = aut.bdd();
    let minterms = (0..1u32 << vars.len())
        .filter(|&m| table >> m & 1 == 1)
        .map(|m| {
            bdd.mk_cube(vars.iter().enumerate().map(|(k, &v)| {
                if m >> k & 1 == 1 {
                    v.pos()
                } else {
                    v.neg()
                }
            }))
        })
        .collect::<Vec<_>>();
    bdd.apply_or_many(minterms)
}

/// A random automaton over the propositions `names`, with satisfiable guards.
pub fn random_automaton(rng: &mut Lcg, states: usize, names: &[&str]) -> (Automaton, Vec<Var>) {
    let mut aut = Automaton::new(Rc::new(BddDict::new()));
    let vars: Vec<Var> = names.iter().map(|name| aut.register_ap(name)).collect();
    let minterms = 1u64 << (1 << vars.len());
    aut.new_states(states);
    for src in 0..states {
        let edges = 1 + rng.below(3);
        for _ in 0..edges {
            let dst = rng.below(states as u64) as usize;
            let table = 1 + rng.below(minterms - 1);
            let guard = guard_from_table(&aut, &vars, table);
            let acc = rng.coin();
            aut.new_edge(src, dst, guard, acc);
        }
    }
    (aut, vars)
}
