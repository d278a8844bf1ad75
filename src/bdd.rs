//! The BDD manager.
//!
//! All boolean functions live in one [`Bdd`] manager. Nodes are kept in an arena
//! (`Vec<Node>`) and hash-consed through a unique table, so every function has exactly
//! one [`Ref`]. Complement edges make negation free; canonicity is kept by never storing
//! a complemented `high` child.
//!
//! Variables are ordered by their id: smaller ids are tested first.
//!
//! ```
//! use depsynth::bdd::Bdd;
//! use depsynth::types::Var;
//!
//! let bdd = Bdd::default();
//! let a = bdd.mk_var(Var::new(1));
//! let b = bdd.mk_var(Var::new(2));
//! let f = bdd.apply_and(a, -b);
//!
//! assert!(bdd.is_sat(f));
//! assert_eq!(bdd.restrict(f, Var::new(2).neg()), a);
//! assert_eq!(bdd.exists(f, &[Var::new(1)]), -b);
//! ```

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Debug;

use log::debug;

use crate::cache::{Cache, CacheKey};
use crate::reference::Ref;
use crate::types::{Lit, Var};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum OpKey {
    Ite(Ref, Ref, Ref),
}

impl CacheKey for OpKey {
    fn slot_hash(&self) -> u64 {
        match *self {
            OpKey::Ite(f, g, h) => (f, g, h).slot_hash(),
        }
    }
}

#[derive(Default)]
struct Storage {
    nodes: Vec<Node>,
    unique: HashMap<Node, u32>,
}

impl Storage {
    fn put(&mut self, node: Node) -> u32 {
        if let Some(&id) = self.unique.get(&node) {
            return id;
        }
        let id = self.nodes.len() as u32;
        self.nodes.push(node);
        self.unique.insert(node, id);
        id
    }
}

pub struct Bdd {
    storage: RefCell<Storage>,
    cache: RefCell<Cache<OpKey, Ref>>,
    zero: Ref,
    one: Ref,
}

impl Bdd {
    pub fn new(cache_bits: usize) -> Self {
        let mut storage = Storage::default();
        // Slot 0 is a sentry, slot 1 is the terminal node.
        storage.nodes.push(Node {
            variable: 0,
            low: Ref::positive(1),
            high: Ref::positive(1),
        });
        storage.nodes.push(Node {
            variable: 0,
            low: Ref::positive(1),
            high: Ref::positive(1),
        });
        let one = Ref::positive(1);

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(cache_bits)),
            zero: -one,
            one,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(16)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        let cache = self.cache.borrow();
        f.debug_struct("Bdd")
            .field("nodes", &(storage.nodes.len() - 2))
            .field("cache_hits", &cache.hits())
            .field("cache_misses", &cache.misses())
            .finish()
    }
}

impl Bdd {
    pub fn zero(&self) -> Ref {
        self.zero
    }
    pub fn one(&self) -> Ref {
        self.one
    }

    /// Number of allocated (non-terminal) nodes.
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().nodes.len() - 2
    }

    /// Variable of the node with the given id, `0` for the terminal.
    pub fn variable(&self, id: u32) -> u32 {
        self.storage.borrow().nodes[id as usize].variable
    }
    pub fn low(&self, id: u32) -> Ref {
        self.storage.borrow().nodes[id as usize].low
    }
    pub fn high(&self, id: u32) -> Ref {
        self.storage.borrow().nodes[id as usize].high
    }

    /// Top variable of a non-terminal function.
    pub fn top_variable(&self, node: Ref) -> Option<Var> {
        if self.is_terminal(node) {
            None
        } else {
            Some(Var::new(self.variable(node.id())))
        }
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.id());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.id());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.id() == 1
    }
    pub fn is_sat(&self, node: Ref) -> bool {
        !self.is_zero(node)
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        // Handle canonicity
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        // Handle duplicates
        if low == high {
            return low;
        }

        let id = self.storage.borrow_mut().put(Node {
            variable: v,
            low,
            high,
        });
        Ref::positive(id)
    }

    pub fn mk_var(&self, v: Var) -> Ref {
        self.mk_node(v.id(), self.zero, self.one)
    }

    pub fn mk_lit(&self, lit: Lit) -> Ref {
        let x = self.mk_var(lit.var());
        if lit.is_positive() {
            x
        } else {
            -x
        }
    }

    pub fn mk_cube(&self, literals: impl IntoIterator<Item = Lit>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_by_key(|lit| std::cmp::Reverse(lit.var()));
        let mut current = self.one;
        for lit in literals {
            current = if lit.is_positive() {
                self.mk_node(lit.var().id(), self.zero, current)
            } else {
                self.mk_node(lit.var().id(), current, self.zero)
            };
        }
        current
    }

    fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        if self.is_terminal(node) || v < self.variable(node.id()) {
            return (node, node);
        }
        assert_eq!(v, self.variable(node.id()));
        (self.low_node(node), self.high_node(node))
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        // Constant condition.
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // A branch equal to the condition (or its negation) is a constant.
        let g = if g == f {
            self.one
        } else if g == -f {
            self.zero
        } else {
            g
        };
        let h = if h == f {
            self.zero
        } else if h == -f {
            self.one
        } else {
            h
        };

        // Trivial results: equal branches, `f` itself, `¬f`.
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Normal form: regular condition, regular `then` branch.
        let (mut f, mut g, mut h) = (f, g, h);
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }

        let mut n = false;
        if g.is_negated() {
            n = true;
            g = -g;
            h = -h;
        }

        let key = OpKey::Ite(f, g, h);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return if n { -res } else { res };
        }

        let mut m = self.variable(f.id());
        for x in [g, h] {
            if !self.is_terminal(x) {
                m = m.min(self.variable(x.id()));
            }
        }
        assert_ne!(m, 0);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0);
        let t = self.apply_ite(f1, g1, h1);

        let res = self.mk_node(m, e, t);
        self.cache.borrow_mut().insert(key, res);

        if n {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.one)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes {
            res = self.apply_and(res, node);
            if self.is_zero(res) {
                break;
            }
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.zero;
        for node in nodes {
            res = self.apply_or(res, node);
            if self.is_one(res) {
                break;
            }
        }
        res
    }

    /// Whether `f → g` is valid.
    pub fn is_implies(&self, f: Ref, g: Ref) -> bool {
        self.is_one(self.apply_imply(f, g))
    }

    /// Cofactor: `f|lit`, i.e. `f` with the literal's variable fixed to its polarity.
    pub fn restrict(&self, f: Ref, lit: Lit) -> Ref {
        let mut cache = HashMap::new();
        self.restrict_(f, lit.var().id(), lit.is_positive(), &mut cache)
    }

    fn restrict_(&self, f: Ref, v: u32, b: bool, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }

        let i = self.variable(f.id());

        if v < i {
            // `v` is above the root.
            return f;
        }

        if v == i {
            return if b {
                self.high_node(f)
            } else {
                self.low_node(f)
            };
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let low = self.restrict_(self.low_node(f), v, b, cache);
        let high = self.restrict_(self.high_node(f), v, b, cache);
        let res = self.mk_node(i, low, high);
        cache.insert(f, res);
        res
    }

    /// Existential quantification of `f` over all `vars`.
    pub fn exists(&self, f: Ref, vars: &[Var]) -> Ref {
        let vars: HashSet<u32> = vars.iter().map(|v| v.id()).collect();
        let Some(&last) = vars.iter().max() else {
            return f;
        };
        let mut cache = HashMap::new();
        self.exists_(f, &vars, last, &mut cache)
    }

    fn exists_(&self, f: Ref, vars: &HashSet<u32>, last: u32, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }

        let i = self.variable(f.id());
        if i > last {
            return f;
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let low = self.exists_(self.low_node(f), vars, last, cache);
        let high = self.exists_(self.high_node(f), vars, last, cache);
        let res = if vars.contains(&i) {
            self.apply_or(low, high)
        } else {
            self.mk_node(i, low, high)
        };
        cache.insert(f, res);
        res
    }

    /// Pair substitution: every variable `v` in `pairs` is replaced by `pairs[v]`.
    ///
    /// The targets may sit anywhere in the order, so the result is rebuilt with ITE.
    pub fn rename(&self, f: Ref, pairs: &HashMap<Var, Var>) -> Ref {
        if pairs.is_empty() {
            return f;
        }
        let mut cache = HashMap::new();
        self.rename_(f, pairs, &mut cache)
    }

    fn rename_(&self, f: Ref, pairs: &HashMap<Var, Var>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let v = Var::new(self.variable(f.id()));
        let low = self.rename_(self.low_node(f), pairs, cache);
        let high = self.rename_(self.high_node(f), pairs, cache);
        let target = pairs.get(&v).copied().unwrap_or(v);
        let res = self.apply_ite(self.mk_var(target), high, low);
        cache.insert(f, res);
        res
    }

    /// Arena ids of all nodes reachable from `nodes` (terminal included).
    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<u32> {
        let mut visited = HashSet::new();
        let mut stack: Vec<Ref> = nodes.into_iter().collect();

        while let Some(node) = stack.pop() {
            if visited.insert(node.id()) && !self.is_terminal(node) {
                stack.push(self.low(node.id()));
                stack.push(self.high(node.id()));
            }
        }

        visited
    }

    /// Number of nodes of `f`, terminal included.
    pub fn size(&self, f: Ref) -> usize {
        self.descendants([f]).len()
    }

    /// Variables `f` actually depends on.
    pub fn support(&self, f: Ref) -> BTreeSet<Var> {
        self.descendants([f])
            .into_iter()
            .filter(|&id| id != 1)
            .map(|id| Var::new(self.variable(id)))
            .collect()
    }

    /// Returns one satisfying assignment (a path to the one terminal), if any exists.
    pub fn one_sat(&self, node: Ref) -> Option<Vec<Lit>> {
        if self.is_zero(node) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = node;

        while !self.is_one(current) {
            let var = Var::new(self.variable(current.id()));
            let high = self.high_node(current);
            let low = self.low_node(current);

            if !self.is_zero(high) {
                path.push(var.pos());
                current = high;
            } else {
                path.push(var.neg());
                current = low;
            }
        }

        debug!("one_sat({}) = {:?}", node, path);
        Some(path)
    }

    /// Evaluate `f` under a total assignment given as a predicate over variables.
    pub fn eval(&self, f: Ref, assignment: impl Fn(Var) -> bool) -> bool {
        let mut current = f;
        while !self.is_terminal(current) {
            let var = Var::new(self.variable(current.id()));
            current = if assignment(var) {
                self.high_node(current)
            } else {
                self.low_node(current)
            };
        }
        self.is_one(current)
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        if self.is_zero(node) {
            return "(0)".to_string();
        } else if self.is_one(node) {
            return "(1)".to_string();
        }

        let v = self.variable(node.id());
        let low = self.low_node(node);
        let high = self.high_node(node);

        format!(
            "{}:(x{}, {}, {})",
            node,
            v,
            self.to_bracket_string(high),
            self.to_bracket_string(low)
        )
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn vars(bdd: &Bdd) -> (Ref, Ref, Ref) {
        (
            bdd.mk_var(Var::new(1)),
            bdd.mk_var(Var::new(2)),
            bdd.mk_var(Var::new(3)),
        )
    }

    #[test]
    fn test_var() {
        let bdd = Bdd::default();

        let x = bdd.mk_var(Var::new(1));

        assert_eq!(bdd.variable(x.id()), 1);
        assert_eq!(bdd.high_node(x), bdd.one());
        assert_eq!(bdd.low_node(x), bdd.zero());
        assert_eq!(bdd.top_variable(x), Some(Var::new(1)));
    }

    #[test]
    fn test_terminal() {
        let bdd = Bdd::default();

        assert!(bdd.is_terminal(bdd.zero()));
        assert!(bdd.is_zero(bdd.zero()));
        assert!(!bdd.is_one(bdd.zero()));
        assert!(bdd.is_one(-bdd.zero()));
        assert_eq!(bdd.top_variable(bdd.one()), None);
    }

    #[test]
    fn test_hash_consing() {
        let bdd = Bdd::default();
        let (x1, x2, _) = vars(&bdd);

        let f = bdd.apply_and(x1, x2);
        let g = bdd.apply_and(x2, x1);
        let h = -bdd.apply_or(-x1, -x2);
        assert_eq!(f, g);
        assert_eq!(f, h);
    }

    #[test]
    fn test_cube() {
        let bdd = Bdd::default();
        let (x1, x2, x3) = vars(&bdd);

        let f = bdd.apply_and_many([x1, -x2, -x3]);
        let cube = bdd.mk_cube([1, -2, -3].map(Lit::from_dimacs));
        assert_eq!(f, cube);
    }

    #[test]
    fn test_xor_itself() {
        let bdd = Bdd::default();
        let (x1, x2, _) = vars(&bdd);
        let f = bdd.apply_and(x1, x2);

        assert_eq!(bdd.apply_xor(f, f), bdd.zero());
        assert_eq!(bdd.apply_xor(f, -f), bdd.one());
    }

    #[test]
    fn test_restrict() {
        let bdd = Bdd::default();
        let (x1, x2, x3) = vars(&bdd);

        let f = bdd.apply_or(bdd.apply_eq(x1, x2), x3);

        // f|x2<-0
        let f_x2_zero = bdd.restrict(f, Var::new(2).neg());
        assert_eq!(f_x2_zero, bdd.apply_or(-x1, x3));

        // Restricting a variable outside the support is the identity.
        let g = bdd.apply_and(x1, x3);
        assert_eq!(bdd.restrict(g, Var::new(2).pos()), g);
    }

    #[test]
    fn test_restrict_last_variable() {
        let bdd = Bdd::default();
        let (x1, _, _) = vars(&bdd);

        assert_eq!(bdd.restrict(x1, Var::new(1).pos()), bdd.one());
        assert_eq!(bdd.restrict(x1, Var::new(1).neg()), bdd.zero());
        assert_eq!(bdd.restrict(-x1, Var::new(1).neg()), bdd.one());
    }

    #[test]
    fn test_exists() {
        let bdd = Bdd::default();
        let (x1, x2, x3) = vars(&bdd);

        let f = bdd.apply_and_many([x1, -x2, x3]);
        assert_eq!(bdd.exists(f, &[Var::new(2)]), bdd.apply_and(x1, x3));
        assert_eq!(
            bdd.exists(f, &[Var::new(1), Var::new(2), Var::new(3)]),
            bdd.one()
        );

        let g = bdd.apply_xor(x1, x2);
        assert_eq!(bdd.exists(g, &[Var::new(2)]), bdd.one());
        assert_eq!(bdd.exists(g, &[]), g);
    }

    #[test]
    fn test_rename() {
        let bdd = Bdd::default();
        let (x1, x2, x3) = vars(&bdd);
        let x7 = bdd.mk_var(Var::new(7));

        let f = bdd.apply_or(bdd.apply_and(x1, x2), -x3);
        let pairs = HashMap::from([(Var::new(2), Var::new(7))]);
        let g = bdd.rename(f, &pairs);
        assert_eq!(g, bdd.apply_or(bdd.apply_and(x1, x7), -x3));

        // Swapping two variables moves them across each other in the order.
        let swap = HashMap::from([(Var::new(1), Var::new(3)), (Var::new(3), Var::new(1))]);
        let h = bdd.apply_and(x1, -x3);
        assert_eq!(bdd.rename(h, &swap), bdd.apply_and(x3, -x1));
    }

    #[test]
    fn test_support_and_size() {
        let bdd = Bdd::default();
        let (x1, _, x3) = vars(&bdd);

        let f = bdd.apply_xor(x1, x3);
        assert_eq!(
            bdd.support(f).into_iter().collect::<Vec<_>>(),
            vec![Var::new(1), Var::new(3)]
        );
        // Two nodes plus the terminal (complement edges share the x3 node).
        assert_eq!(bdd.size(f), 3);
    }

    #[test]
    fn test_one_sat() {
        let bdd = Bdd::default();

        let f = bdd.mk_cube([1, -2, -3].map(Lit::from_dimacs));
        let model = bdd.one_sat(f);
        let expected: Vec<Lit> = [1, -2, -3].into_iter().map(Lit::from_dimacs).collect();
        assert_eq!(model, Some(expected.clone()));

        let g = bdd.apply_and(f, -bdd.mk_cube(expected));
        assert_eq!(bdd.one_sat(g), None);
    }

    #[test]
    fn test_implies_and_eval() {
        let bdd = Bdd::default();
        let (x1, x2, _) = vars(&bdd);

        let f = bdd.apply_and(x1, x2);
        assert!(bdd.is_implies(f, x1));
        assert!(!bdd.is_implies(x1, f));
        assert!(bdd.is_implies(bdd.zero(), x2));

        assert!(bdd.eval(f, |_| true));
        assert!(!bdd.eval(f, |v| v == Var::new(1)));
    }

    #[test]
    fn test_tiny_cache_keeps_results_canonical() {
        let bdd = Bdd::new(2);
        let xs: Vec<Ref> = (1..=8).map(|i| bdd.mk_var(Var::new(i))).collect();

        let forward = xs.iter().fold(bdd.zero(), |acc, &x| bdd.apply_xor(acc, x));
        let backward = xs.iter().rev().fold(bdd.zero(), |acc, &x| bdd.apply_xor(acc, x));
        assert_eq!(forward, backward);
        assert_eq!(bdd.size(forward), 9);

        let cache = bdd.cache.borrow();
        assert_eq!(cache.capacity(), 4);
        assert!(cache.len() <= 4);
        assert!(cache.faults() > 0);
    }
}
