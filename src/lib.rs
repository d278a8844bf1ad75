//! # depsynth: dependent-output synthesis for Büchi specifications
//!
//! **`depsynth`** finds the outputs of a reactive specification whose value is fully
//! determined by the inputs and the other outputs, and compiles them straight into an
//! and-inverter graph. Only the remaining (independent) outputs have to go through a
//! game solver, which is usually the expensive part of reactive synthesis.
//!
//! ## Pipeline
//!
//! 1. Optionally fix the *unate* outputs of every state ([`unate`]).
//! 2. Compute the pairs of states reachable by the same word ([`pair_states`]) and classify
//!    every output as dependent or independent ([`deps`]).
//! 3. Project the dependent outputs away and let an external solver build a controller for
//!    the rest ([`pipeline::IndependentSynthesizer`]).
//! 4. Compile the dependent outputs from the automaton ([`compile`]).
//! 5. Merge both circuits ([`merge`]) and write the result as ASCII AIGER ([`aiger`]).
//!
//! Every long analysis polls a [`deadline::StopFlag`], and stopping early always yields a
//! sound (if less useful) answer: untested outputs are independent, untested states are
//! left unchanged.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use depsynth::automaton::Automaton;
//! use depsynth::compile::DependentsSynthesiser;
//! use depsynth::deadline::StopFlag;
//! use depsynth::deps::DependencyClassifier;
//! use depsynth::dict::BddDict;
//!
//! // G(o <-> i): the output copies the input.
//! let mut aut = Automaton::new(Rc::new(BddDict::new()));
//! let i = aut.register_ap("i");
//! let o = aut.register_ap("o");
//! let bdd = aut.bdd();
//! let guard = bdd.apply_eq(bdd.mk_var(i), bdd.mk_var(o));
//! aut.new_state();
//! aut.new_edge(0, 0, guard, true);
//!
//! let (classification, _) = DependencyClassifier::new(&aut, vec![i], vec![o]).classify(&StopFlag::new());
//! assert_eq!(classification.dependent, vec![o]);
//!
//! let mut projected = aut.clone();
//! projected.remove_aps(&classification.dependent);
//! let circuit = DependentsSynthesiser::new(&projected, &aut, &[i], &[], &[o])
//!     .and_then(|s| s.synthesize())
//!     .unwrap();
//! assert_eq!(circuit.num_outputs(), 1);
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**, **[`dict`]**: the BDD manager and the named-proposition dictionary.
//! - **[`automaton`]**, **[`complement`]**, **[`product`]**: transition-based Büchi automata.
//! - **[`aig`]**, **[`aiger`]**, **[`blif`]**: circuits and their text formats.

pub mod aig;
pub mod aiger;
pub mod automaton;
pub mod bdd;
pub mod blif;
pub mod cache;
pub mod compile;
pub mod complement;
pub mod config;
pub mod deadline;
pub mod deps;
pub mod dict;
pub mod merge;
pub mod pair_states;
pub mod pipeline;
pub mod product;
pub mod reference;
pub mod scc;
pub mod signal;
pub mod types;
pub mod unate;
