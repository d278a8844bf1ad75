//! The whole pipeline with a scripted solver and merger.

use std::cell::RefCell;
use std::rc::Rc;

use depsynth::aig::Aig;
use depsynth::automaton::Automaton;
use depsynth::config::SynthesisConfig;
use depsynth::dict::BddDict;
use depsynth::merge::{merge_trivial, CircuitMerger, MergeRequest};
use depsynth::pipeline::{IndependentSynthesizer, Outcome, Pipeline, SynthError, SynthInstance};
use depsynth::signal::Signal;
use depsynth::types::Var;
use depsynth::unate::UnateStrategyKind;
use test_log::test;

/// `G (o <-> X i)` together with `G F f`.
fn delay_with_fairness() -> SynthInstance {
    let mut aut = Automaton::new(Rc::new(BddDict::new()));
    let i = aut.register_ap("i");
    let o = aut.register_ap("o");
    let f = aut.register_ap("f");
    let bdd = aut.bdd();
    let (fi, fo, ff) = (bdd.mk_var(i), bdd.mk_var(o), bdd.mk_var(f));
    let mut edges = Vec::new();
    for src in 0..2 {
        let out = if src == 1 { fo } else { -fo };
        for dst in 0..2 {
            let next = if dst == 1 { fi } else { -fi };
            let base = bdd.apply_and(out, next);
            edges.push((src, dst, bdd.apply_and(base, ff), true));
            edges.push((src, dst, bdd.apply_and(base, -ff), false));
        }
    }
    aut.new_states(2);
    for (src, dst, guard, acc) in edges {
        aut.new_edge(src, dst, guard, acc);
    }
    SynthInstance::from_names(aut, &["i"], &["o", "f"]).unwrap()
}

/// Sets every output to 1.
struct ConstantSolver {
    asked: Vec<String>,
}

impl IndependentSynthesizer for ConstantSolver {
    fn synthesize(
        &mut self,
        aut: &Automaton,
        inputs: &[Var],
        outputs: &[Var],
    ) -> depsynth::pipeline::Result<Option<Aig>> {
        let dict = aut.dict();
        assert!(outputs.iter().all(|v| aut.aps().contains(v)));
        let mut aig = Aig::new();
        for &v in inputs {
            aig.add_input(dict.display_name(v));
        }
        for &v in outputs {
            self.asked.push(dict.display_name(v));
            aig.add_output(dict.display_name(v), Signal::one());
        }
        Ok(Some(aig))
    }
}

struct FailingSolver;

impl IndependentSynthesizer for FailingSolver {
    fn synthesize(&mut self, _: &Automaton, _: &[Var], _: &[Var]) -> depsynth::pipeline::Result<Option<Aig>> {
        Err(SynthError::Solver("out of memory".to_string()))
    }
}

/// Keeps the port names it was asked to merge and answers with the dependent side.
#[derive(Default)]
struct RecordingMerger {
    ports: RefCell<Option<(Vec<String>, Vec<String>, Vec<String>, usize)>>,
}

impl CircuitMerger for RecordingMerger {
    fn merge(&self, request: &MergeRequest<'_>) -> depsynth::merge::Result<Aig> {
        *self.ports.borrow_mut() = Some((
            request.inputs.to_vec(),
            request.independents.to_vec(),
            request.dependents.to_vec(),
            request.init_latch,
        ));
        if let Some(res) = merge_trivial(request) {
            return res;
        }
        let dependent = request.dependent.map(|aig| aig.with_latch_initially_one(request.init_latch));
        Ok(dependent.unwrap_or_default())
    }
}

#[test]
fn dependent_and_independent_outputs_are_split() {
    let mut solver = ConstantSolver { asked: Vec::new() };
    let merger = RecordingMerger::default();
    let mut pipeline = Pipeline::new(SynthesisConfig::default(), &mut solver, &merger);

    let Outcome::Realizable { circuit, report } = pipeline.run(delay_with_fairness()).unwrap() else {
        panic!("expected a circuit");
    };
    assert_eq!(report.classification.dependent.len(), 1);
    assert_eq!(report.classification.independent.len(), 1);
    assert!(report.dependencies.unwrap().completed);

    let (inputs, independents, dependents, init) = merger.ports.borrow().clone().unwrap();
    assert_eq!(inputs, vec!["i"]);
    assert_eq!(independents, vec!["f"]);
    assert_eq!(dependents, vec!["o"]);
    assert_eq!(init, 0);
    assert_eq!(solver.asked, vec!["f"]);

    // The dependent circuit reads i and f, and o lags i by one step.
    let trace: Vec<Vec<bool>> = [true, false, false, true].iter().map(|&i| vec![i, true]).collect();
    let out: Vec<bool> = circuit.simulate(&trace).into_iter().map(|o| o[0]).collect();
    assert_eq!(out, vec![false, true, false, false]);
}

#[test]
fn heuristic_unate_pass_runs_first() {
    let mut solver = ConstantSolver { asked: Vec::new() };
    let merger = RecordingMerger::default();
    let config = SynthesisConfig::default().with_unate(Some(UnateStrategyKind::Heuristic));
    let mut pipeline = Pipeline::new(config, &mut solver, &merger);

    let Outcome::Realizable { report, .. } = pipeline.run(delay_with_fairness()).unwrap() else {
        panic!("expected a circuit");
    };
    let unate = report.unate.unwrap();
    assert!(unate.completed);
    assert_eq!(unate.tested_states.len(), 2);
}

#[test]
fn solver_failure_is_an_error() {
    let mut solver = FailingSolver;
    let merger = RecordingMerger::default();
    let mut pipeline = Pipeline::new(SynthesisConfig::default(), &mut solver, &merger);
    assert!(matches!(
        pipeline.run(delay_with_fairness()),
        Err(SynthError::Solver(msg)) if msg == "out of memory"
    ));
    assert!(merger.ports.borrow().is_none());
}
