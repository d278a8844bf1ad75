//! And-inverter graphs.
//!
//! An [`Aig`] is an arena of nodes addressed by [`Signal`]s. Node 0 is the constant
//! false; every other node is an input, a latch or a two-input AND gate whose operands
//! were created before it, so the node order is a topological order.
//!
//! AND gates are structurally hashed and constant-folded on construction, so building
//! the same gate twice yields the same signal.
//!
//! ```
//! use depsynth::aig::Aig;
//!
//! let mut aig = Aig::new();
//! let a = aig.add_input("a");
//! let b = aig.add_input("b");
//! let f = aig.and(a, b);
//! assert_eq!(aig.and(b, a), f);
//! assert_eq!(aig.and(a, !a), depsynth::signal::Signal::zero());
//! aig.add_output("f", f);
//! assert_eq!(aig.num_ands(), 1);
//! ```

use std::collections::HashMap;

use crate::signal::Signal;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AigNode {
    Const,
    /// Index into the inputs.
    Input(usize),
    /// Index into the latches.
    Latch(usize),
    And(Signal, Signal),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Latch {
    pub output: Signal,
    /// Next-state function. Latches reset to 0.
    pub next: Signal,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Output {
    pub name: String,
    pub signal: Signal,
}

#[derive(Debug, Clone)]
pub struct Aig {
    nodes: Vec<AigNode>,
    inputs: Vec<(Signal, String)>,
    latches: Vec<Latch>,
    outputs: Vec<Output>,
    strash: HashMap<(Signal, Signal), Signal>,
}

impl Default for Aig {
    fn default() -> Self {
        Self::new()
    }
}

impl Aig {
    pub fn new() -> Self {
        Self {
            nodes: vec![AigNode::Const],
            inputs: Vec::new(),
            latches: Vec::new(),
            outputs: Vec::new(),
            strash: HashMap::new(),
        }
    }

    fn push_node(&mut self, node: AigNode) -> Signal {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        Signal::from_node(index)
    }

    pub fn add_input(&mut self, name: impl Into<String>) -> Signal {
        let signal = self.push_node(AigNode::Input(self.inputs.len()));
        self.inputs.push((signal, name.into()));
        signal
    }

    /// Adds a latch with a constant-0 next function.
    pub fn add_latch(&mut self, name: Option<String>) -> Signal {
        let output = self.push_node(AigNode::Latch(self.latches.len()));
        self.latches.push(Latch {
            output,
            next: Signal::zero(),
            name,
        });
        output
    }

    pub fn set_latch_next(&mut self, latch: usize, next: Signal) {
        assert!(
            (next.node() as usize) < self.nodes.len(),
            "Next signal {} does not exist",
            next
        );
        self.latches[latch].next = next;
    }

    pub fn add_output(&mut self, name: impl Into<String>, signal: Signal) {
        assert!(
            (signal.node() as usize) < self.nodes.len(),
            "Output signal {} does not exist",
            signal
        );
        self.outputs.push(Output {
            name: name.into(),
            signal,
        });
    }
}

// Gates
impl Aig {
    pub fn and(&mut self, a: Signal, b: Signal) -> Signal {
        if a == Signal::zero() || b == Signal::zero() || a == !b {
            return Signal::zero();
        }
        if a == Signal::one() || a == b {
            return b;
        }
        if b == Signal::one() {
            return a;
        }

        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&res) = self.strash.get(&key) {
            return res;
        }
        let res = self.push_node(AigNode::And(key.0, key.1));
        self.strash.insert(key, res);
        res
    }

    pub fn or(&mut self, a: Signal, b: Signal) -> Signal {
        !self.and(!a, !b)
    }

    pub fn ite(&mut self, cond: Signal, then: Signal, otherwise: Signal) -> Signal {
        let t = self.and(cond, then);
        let e = self.and(!cond, otherwise);
        self.or(t, e)
    }

    pub fn and_many(&mut self, signals: impl IntoIterator<Item = Signal>) -> Signal {
        let mut res = Signal::one();
        for s in signals {
            res = self.and(res, s);
        }
        res
    }

    pub fn or_many(&mut self, signals: impl IntoIterator<Item = Signal>) -> Signal {
        let mut res = Signal::zero();
        for s in signals {
            res = self.or(res, s);
        }
        res
    }
}

// Accessors
impl Aig {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_latches(&self) -> usize {
        self.latches.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn num_ands(&self) -> usize {
        self.strash.len()
    }

    pub fn node(&self, signal: Signal) -> AigNode {
        self.nodes[signal.node() as usize]
    }

    pub fn input(&self, index: usize) -> Signal {
        self.inputs[index].0
    }

    pub fn input_name(&self, index: usize) -> &str {
        &self.inputs[index].1
    }

    pub fn inputs(&self) -> impl Iterator<Item = (Signal, &str)> + '_ {
        self.inputs.iter().map(|(s, name)| (*s, name.as_str()))
    }

    pub fn latch(&self, index: usize) -> &Latch {
        &self.latches[index]
    }

    pub fn latches(&self) -> &[Latch] {
        &self.latches
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<Signal> {
        self.outputs.iter().find(|o| o.name == name).map(|o| o.signal)
    }

    /// AND gates in creation order, as `(gate, operand, operand)`.
    pub fn ands(&self) -> impl Iterator<Item = (Signal, Signal, Signal)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, node)| match *node {
            AigNode::And(a, b) => Some((Signal::from_node(i as u32), a, b)),
            _ => None,
        })
    }
}

// Rewriting
impl Aig {
    /// A copy of this graph where latch `latch` reads 1 on the first cycle.
    ///
    /// An extra latch `started` (next 1) is added; every read of `latch` becomes
    /// `!started | latch`. The other latches keep their relative order.
    pub fn with_latch_initially_one(&self, latch: usize) -> Aig {
        assert!(latch < self.latches.len(), "Latch {} does not exist", latch);

        let mut res = Aig::new();
        let mut map = vec![Signal::zero(); self.nodes.len()];
        let mut latch_index = vec![0; self.latches.len()];
        let mut started = Signal::zero();
        for (i, node) in self.nodes.iter().enumerate() {
            map[i] = match *node {
                AigNode::Const => Signal::zero(),
                AigNode::Input(k) => res.add_input(self.inputs[k].1.clone()),
                AigNode::Latch(k) => {
                    latch_index[k] = res.num_latches();
                    let out = res.add_latch(self.latches[k].name.clone());
                    if k == latch {
                        started = res.add_latch(Some("started".to_string()));
                        res.set_latch_next(latch_index[k] + 1, Signal::one());
                        res.or(!started, out)
                    } else {
                        out
                    }
                }
                AigNode::And(a, b) => {
                    let (a, b) = (mapped(&map, a), mapped(&map, b));
                    res.and(a, b)
                }
            };
        }
        debug_assert!(!started.is_const());

        for (k, l) in self.latches.iter().enumerate() {
            let next = mapped(&map, l.next);
            res.set_latch_next(latch_index[k], next);
        }
        for o in &self.outputs {
            let signal = mapped(&map, o.signal);
            res.add_output(o.name.clone(), signal);
        }
        res
    }
}

fn mapped(map: &[Signal], signal: Signal) -> Signal {
    map[signal.node() as usize] ^ signal.is_negated()
}

// Simulation
impl Aig {
    fn evaluate(&self, inputs: &[bool], state: &[bool]) -> Vec<bool> {
        let mut values = vec![false; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            values[i] = match *node {
                AigNode::Const => false,
                AigNode::Input(k) => inputs[k],
                AigNode::Latch(k) => state[k],
                AigNode::And(a, b) => value_of(&values, a) && value_of(&values, b),
            };
        }
        values
    }

    /// Runs the circuit from the all-zero latch state, one input vector per cycle.
    ///
    /// Returns the output values of every cycle.
    pub fn simulate(&self, trace: &[Vec<bool>]) -> Vec<Vec<bool>> {
        self.simulate_from(&vec![false; self.latches.len()], trace)
    }

    pub fn simulate_from(&self, initial: &[bool], trace: &[Vec<bool>]) -> Vec<Vec<bool>> {
        assert_eq!(
            initial.len(),
            self.latches.len(),
            "Expected {} latch values",
            self.latches.len()
        );
        let mut state = initial.to_vec();
        let mut result = Vec::with_capacity(trace.len());
        for inputs in trace {
            assert_eq!(
                inputs.len(),
                self.inputs.len(),
                "Expected {} input values",
                self.inputs.len()
            );
            let values = self.evaluate(inputs, &state);
            result.push(
                self.outputs
                    .iter()
                    .map(|o| value_of(&values, o.signal))
                    .collect(),
            );
            state = self
                .latches
                .iter()
                .map(|l| value_of(&values, l.next))
                .collect();
        }
        result
    }
}

fn value_of(values: &[bool], signal: Signal) -> bool {
    values[signal.node() as usize] ^ signal.is_negated()
}
