//! End-to-end synthesis of a controller from a Büchi automaton.
//!
//! The pipeline optionally simplifies the automaton with a unate reduction, splits the
//! outputs into dependent and independent ones, hands the projection without the
//! dependent outputs to an [`IndependentSynthesizer`], compiles the dependent outputs
//! directly from the automaton and finally merges both circuits.

use std::time::Instant;

use log::{debug, info, warn};
use thiserror::Error;

use crate::aig::Aig;
use crate::automaton::Automaton;
use crate::compile::{CompileError, DependentsSynthesiser};
use crate::config::SynthesisConfig;
use crate::deadline::{run_with_deadline, StopFlag};
use crate::deps::{Classification, DependencyClassifier, DependentVariableType, DepsReport};
use crate::merge::{CircuitMerger, MergeError, MergeRequest};
use crate::types::Var;
use crate::unate::exact::ExactStrategy;
use crate::unate::{UnateHandler, UnateReport, UnateStrategyKind};

pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("proposition {0} is not registered")]
    UnknownProposition(String),

    #[error("compilation of the dependent outputs failed: {0}")]
    Compile(#[from] CompileError),

    #[error("merging failed: {0}")]
    Merge(#[from] MergeError),

    #[error("independent synthesis failed: {0}")]
    Solver(String),
}

/// A specification together with its input/output partition.
#[derive(Debug, Clone)]
pub struct SynthInstance {
    pub automaton: Automaton,
    pub inputs: Vec<Var>,
    pub outputs: Vec<Var>,
    /// Automaton of the negated specification, used by the exact unate test if present.
    pub negation: Option<Automaton>,
}

impl SynthInstance {
    pub fn new(automaton: Automaton, inputs: Vec<Var>, outputs: Vec<Var>) -> Self {
        Self {
            automaton,
            inputs,
            outputs,
            negation: None,
        }
    }

    /// Resolves the proposition names against the automaton's dictionary.
    pub fn from_names(automaton: Automaton, inputs: &[&str], outputs: &[&str]) -> Result<Self> {
        let resolve = |names: &[&str]| -> Result<Vec<Var>> {
            names
                .iter()
                .map(|&name| {
                    automaton
                        .dict()
                        .lookup(name)
                        .ok_or_else(|| SynthError::UnknownProposition(name.to_string()))
                })
                .collect()
        };
        let inputs = resolve(inputs)?;
        let outputs = resolve(outputs)?;
        Ok(Self::new(automaton, inputs, outputs))
    }

    pub fn with_negation(mut self, negation: Automaton) -> Self {
        self.negation = Some(negation);
        self
    }
}

/// Solves the game on the automaton left once the dependent outputs are projected away.
pub trait IndependentSynthesizer {
    /// Returns a circuit with inputs `inputs` and outputs `outputs`, or `None` if the
    /// specification is unrealizable.
    fn synthesize(&mut self, aut: &Automaton, inputs: &[Var], outputs: &[Var]) -> Result<Option<Aig>>;
}

#[derive(Debug, Clone, Default)]
pub struct SynthReport {
    pub unate: Option<UnateReport>,
    pub dependencies: Option<DepsReport>,
    pub classification: Classification,
    /// Inputs determined by the other variables, when requested.
    pub input_dependencies: Option<(Classification, DepsReport)>,
    pub dependent_circuit_ands: usize,
    pub independent_circuit_ands: usize,
}

#[derive(Debug)]
pub enum Outcome {
    Unrealizable,
    Realizable { circuit: Aig, report: SynthReport },
}

pub struct Pipeline<'a> {
    config: SynthesisConfig,
    solver: &'a mut dyn IndependentSynthesizer,
    merger: &'a dyn CircuitMerger,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: SynthesisConfig,
        solver: &'a mut dyn IndependentSynthesizer,
        merger: &'a dyn CircuitMerger,
    ) -> Self {
        Self { config, solver, merger }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    fn unate_pass(&self, instance: &mut SynthInstance) -> Option<UnateReport> {
        let kind = self.config.unate?;
        let aut = &mut instance.automaton;
        let mut handler = match (kind, instance.negation.take()) {
            (UnateStrategyKind::Exact, Some(negation)) => {
                let strategy = ExactStrategy::new(aut, instance.outputs.clone(), self.config.complement_multiplier)
                    .with_negation(negation);
                UnateHandler::new(Box::new(strategy))
            }
            (kind, _) => UnateHandler::with_kind(kind, aut, &instance.outputs, self.config.complement_multiplier),
        };
        let stop = StopFlag::new();
        let report = run_with_deadline(self.config.unate_timeout, &stop, |stop| handler.run(aut, stop));
        if !report.completed {
            warn!("unate reduction did not visit every state");
        }
        Some(report)
    }

    fn dependency_pass(&self, instance: &SynthInstance) -> (Classification, Option<DepsReport>) {
        if self.config.skip_dependencies {
            debug!("dependency search skipped");
            let classification = Classification {
                dependent: Vec::new(),
                independent: instance.outputs.clone(),
            };
            return (classification, None);
        }
        let classifier = DependencyClassifier::new(&instance.automaton, instance.inputs.clone(), instance.outputs.clone())
            .with_fast_check(self.config.fast_dependency_check);
        let stop = StopFlag::new();
        let (classification, report) =
            run_with_deadline(self.config.dependency_timeout, &stop, |stop| classifier.classify(stop));
        (classification, Some(report))
    }

    fn input_dependency_pass(&self, instance: &SynthInstance) -> Option<(Classification, DepsReport)> {
        if !self.config.find_input_dependencies {
            return None;
        }
        let classifier = DependencyClassifier::new(&instance.automaton, instance.inputs.clone(), instance.outputs.clone())
            .with_kind(DependentVariableType::Input)
            .with_fast_check(self.config.fast_dependency_check);
        let stop = StopFlag::new();
        let result = run_with_deadline(self.config.dependency_timeout, &stop, |stop| classifier.classify(stop));
        info!("{} inputs are determined by the other variables", result.0.dependent.len());
        Some(result)
    }

    /// Runs every stage on `instance`.
    pub fn run(&mut self, mut instance: SynthInstance) -> Result<Outcome> {
        let started = Instant::now();
        let mut report = SynthReport {
            unate: self.unate_pass(&mut instance),
            ..Default::default()
        };

        let (classification, deps_report) = self.dependency_pass(&instance);
        report.dependencies = deps_report;
        report.input_dependencies = self.input_dependency_pass(&instance);

        let aut = &instance.automaton;
        let dict = aut.dict();
        let dependents = classification.dependent.clone();
        let independents = classification.independent.clone();

        let mut without_deps = aut.clone();
        without_deps.remove_aps(&dependents);

        let dependent_circuit = if dependents.is_empty() {
            None
        } else {
            let compiler =
                DependentsSynthesiser::new(&without_deps, aut, &instance.inputs, &independents, &dependents)?;
            let circuit = compiler.synthesize()?;
            report.dependent_circuit_ands = circuit.num_ands();
            Some(circuit)
        };

        let independent_circuit = if independents.is_empty() {
            None
        } else {
            match self.solver.synthesize(&without_deps, &instance.inputs, &independents)? {
                Some(circuit) => {
                    report.independent_circuit_ands = circuit.num_ands();
                    Some(circuit)
                }
                None => {
                    info!("specification is unrealizable");
                    return Ok(Outcome::Unrealizable);
                }
            }
        };

        let names = |vars: &[Var]| -> Vec<String> { vars.iter().map(|&v| dict.display_name(v)).collect() };
        let (input_names, indep_names, dep_names) = (
            names(&instance.inputs),
            names(&independents),
            names(&dependents),
        );
        let request = MergeRequest {
            independent: independent_circuit.as_ref(),
            dependent: dependent_circuit.as_ref(),
            inputs: &input_names,
            independents: &indep_names,
            dependents: &dep_names,
            init_latch: aut.init_state(),
        };
        let circuit = self.merger.merge(&request)?;

        report.classification = classification;
        info!(
            "synthesised a circuit with {} AND gates in {:?}",
            circuit.num_ands(),
            started.elapsed()
        );
        Ok(Outcome::Realizable { circuit, report })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::dict::BddDict;
    use crate::merge::merge_trivial;

    /// Always answers with the constant-zero strategy.
    struct ZeroSolver {
        calls: usize,
    }

    impl IndependentSynthesizer for ZeroSolver {
        fn synthesize(&mut self, aut: &Automaton, inputs: &[Var], outputs: &[Var]) -> Result<Option<Aig>> {
            self.calls += 1;
            let dict = aut.dict();
            let mut aig = Aig::new();
            for &v in inputs {
                aig.add_input(dict.display_name(v));
            }
            for &v in outputs {
                aig.add_output(dict.display_name(v), crate::signal::Signal::zero());
            }
            Ok(Some(aig))
        }
    }

    struct Unrealizable;

    impl IndependentSynthesizer for Unrealizable {
        fn synthesize(&mut self, _: &Automaton, _: &[Var], _: &[Var]) -> Result<Option<Aig>> {
            Ok(None)
        }
    }

    /// Merges only when one side is missing.
    struct TrivialMerger;

    impl CircuitMerger for TrivialMerger {
        fn merge(&self, request: &MergeRequest<'_>) -> crate::merge::Result<Aig> {
            merge_trivial(request).unwrap_or(Err(MergeError::NothingToMerge))
        }
    }

    /// One state with a self-loop on `x <-> y`.
    fn copy_instance() -> SynthInstance {
        let mut aut = Automaton::new(Rc::new(BddDict::new()));
        let x = aut.register_ap("x");
        let y = aut.register_ap("y");
        let bdd = aut.bdd();
        let guard = bdd.apply_eq(bdd.mk_var(x), bdd.mk_var(y));
        aut.new_state();
        aut.new_edge(0, 0, guard, true);
        SynthInstance::new(aut, vec![x], vec![y])
    }

    #[test]
    fn test_from_names() {
        let instance = copy_instance();
        let aut = instance.automaton.clone();
        let again = SynthInstance::from_names(aut.clone(), &["x"], &["y"]).unwrap();
        assert_eq!(again.inputs, instance.inputs);
        assert_eq!(again.outputs, instance.outputs);
        assert!(matches!(
            SynthInstance::from_names(aut, &["x"], &["nope"]),
            Err(SynthError::UnknownProposition(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_dependent_output_is_compiled() {
        let mut solver = ZeroSolver { calls: 0 };
        let mut pipeline = Pipeline::new(SynthesisConfig::default(), &mut solver, &TrivialMerger);
        let outcome = pipeline.run(copy_instance()).unwrap();
        let Outcome::Realizable { circuit, report } = outcome else {
            panic!("expected a circuit");
        };
        assert_eq!(report.classification.dependent.len(), 1);
        assert!(report.classification.independent.is_empty());
        let out = circuit.simulate(&[vec![true], vec![false], vec![true]]);
        assert_eq!(out, vec![vec![true], vec![false], vec![true]]);
        assert_eq!(solver.calls, 0);
    }

    #[test]
    fn test_skipping_dependencies() {
        let mut solver = ZeroSolver { calls: 0 };
        let config = SynthesisConfig::default().with_skip_dependencies(true);
        let mut pipeline = Pipeline::new(config, &mut solver, &TrivialMerger);
        let Outcome::Realizable { circuit, report } = pipeline.run(copy_instance()).unwrap() else {
            panic!("expected a circuit");
        };
        assert!(report.dependencies.is_none());
        assert_eq!(report.classification.independent.len(), 1);
        assert_eq!(circuit.outputs()[0].name, "y");
        assert_eq!(solver.calls, 1);
    }

    #[test]
    fn test_unrealizable() {
        let mut solver = Unrealizable;
        let config = SynthesisConfig::default().with_skip_dependencies(true);
        let mut pipeline = Pipeline::new(config, &mut solver, &TrivialMerger);
        assert!(matches!(pipeline.run(copy_instance()), Ok(Outcome::Unrealizable)));
    }

    #[test]
    fn test_input_dependencies_are_reported() {
        let mut solver = ZeroSolver { calls: 0 };
        let config = SynthesisConfig::default()
            .with_unate(Some(UnateStrategyKind::Heuristic))
            .with_input_dependencies(true);
        let mut pipeline = Pipeline::new(config, &mut solver, &TrivialMerger);
        let Outcome::Realizable { report, .. } = pipeline.run(copy_instance()).unwrap() else {
            panic!("expected a circuit");
        };
        assert!(report.unate.is_some());
        let (inputs, deps_report) = report.input_dependencies.unwrap();
        assert_eq!(inputs.dependent.len() + inputs.independent.len(), 1);
        assert!(deps_report.completed);
    }
}
