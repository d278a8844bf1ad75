//! Variable dictionary shared by automata.
//!
//! A [`BddDict`] owns the BDD manager together with the table mapping atomic
//! proposition names to BDD variables. Automata hold it behind an `Rc`, so clones of an
//! automaton (and automata derived from it, such as complements and products) speak
//! about the same variables.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;

use log::debug;

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::types::Var;

#[derive(Default)]
struct Names {
    by_name: HashMap<String, Var>,
    // Indexed by `var.id() - 1`; anonymous variables have no name.
    by_var: Vec<Option<String>>,
    primes: HashMap<Var, Var>,
}

pub struct BddDict {
    bdd: Bdd,
    names: RefCell<Names>,
}

impl Default for BddDict {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for BddDict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.names.borrow();
        f.debug_struct("BddDict")
            .field("vars", &names.by_var.len())
            .field("named", &names.by_name.len())
            .field("bdd", &self.bdd)
            .finish()
    }
}

impl BddDict {
    pub fn new() -> Self {
        Self {
            bdd: Bdd::default(),
            names: RefCell::new(Names::default()),
        }
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    /// Total number of allocated variables, named or not.
    pub fn num_vars(&self) -> usize {
        self.names.borrow().by_var.len()
    }

    /// Returns the variable for `name`, allocating it on first use.
    pub fn register(&self, name: &str) -> Var {
        let mut names = self.names.borrow_mut();
        if let Some(&var) = names.by_name.get(name) {
            return var;
        }
        names.by_var.push(Some(name.to_string()));
        let var = Var::new(names.by_var.len() as u32);
        names.by_name.insert(name.to_string(), var);
        debug!("registered {} as {}", name, var);
        var
    }

    /// Allocates a contiguous block of `n` unnamed variables and returns the first one.
    pub fn register_anonymous(&self, n: usize) -> Option<Var> {
        if n == 0 {
            return None;
        }
        let mut names = self.names.borrow_mut();
        let first = Var::new(names.by_var.len() as u32 + 1);
        let len = names.by_var.len();
        names.by_var.resize(len + n, None);
        debug!("registered {} anonymous variables starting at {}", n, first);
        Some(first)
    }

    /// The "prime" copies of `vars`, used to decouple variables when renaming.
    ///
    /// Missing primes are allocated together as one anonymous block, then cached for
    /// the lifetime of the dictionary; they never collide with named variables.
    pub fn primes(&self, vars: &[Var]) -> Vec<Var> {
        let missing: Vec<Var> = {
            let names = self.names.borrow();
            let mut missing: Vec<Var> = vars
                .iter()
                .copied()
                .filter(|v| !names.primes.contains_key(v))
                .collect();
            missing.sort();
            missing.dedup();
            missing
        };
        if let Some(first) = self.register_anonymous(missing.len()) {
            let mut names = self.names.borrow_mut();
            for (i, &var) in missing.iter().enumerate() {
                names.primes.insert(var, Var::new(first.id() + i as u32));
            }
        }
        let names = self.names.borrow();
        vars.iter().map(|v| names.primes[v]).collect()
    }

    pub fn prime(&self, var: Var) -> Var {
        self.primes(&[var])[0]
    }

    pub fn lookup(&self, name: &str) -> Option<Var> {
        self.names.borrow().by_name.get(name).copied()
    }

    pub fn name(&self, var: Var) -> Option<String> {
        self.names
            .borrow()
            .by_var
            .get(var.id() as usize - 1)
            .cloned()
            .flatten()
    }

    /// Display name of `var`, falling back to its index for anonymous variables.
    pub fn display_name(&self, var: Var) -> String {
        self.name(var).unwrap_or_else(|| var.to_string())
    }

    /// Renders `f` as a disjunction of cubes over proposition names.
    pub fn format(&self, f: Ref) -> String {
        let bdd = &self.bdd;
        if bdd.is_zero(f) {
            return "false".to_string();
        }
        if bdd.is_one(f) {
            return "true".to_string();
        }

        let mut cubes = Vec::new();
        let mut stack = vec![(f, Vec::new())];
        while let Some((node, path)) = stack.pop() {
            if bdd.is_zero(node) {
                continue;
            }
            if bdd.is_one(node) {
                cubes.push(path.join(" & "));
                continue;
            }
            let var = Var::new(bdd.variable(node.id()));
            let name = self.display_name(var);
            let mut low_path = path.clone();
            low_path.push(format!("!{}", name));
            let mut high_path = path;
            high_path.push(name);
            stack.push((bdd.low_node(node), low_path));
            stack.push((bdd.high_node(node), high_path));
        }
        cubes.join(" | ")
    }

    /// The BDD of the proposition `name`, registering it if needed.
    pub fn ap(&self, name: &str) -> Ref {
        let var = self.register(name);
        self.bdd.mk_var(var)
    }
}
