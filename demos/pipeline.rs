use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;

use depsynth::aig::Aig;
use depsynth::automaton::Automaton;
use depsynth::compile::DependentsSynthesiser;
use depsynth::config::SynthesisConfig;
use depsynth::deadline::{run_with_deadline, StopFlag};
use depsynth::deps::DependencyClassifier;
use depsynth::dict::BddDict;
use depsynth::merge::{ExternalMerger, MergeConfig};
use depsynth::pipeline::{IndependentSynthesizer, Outcome, Pipeline, SynthInstance};
use depsynth::signal::Signal;
use depsynth::types::Var;
use depsynth::unate::{UnateHandler, UnateStrategyKind};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of copied inputs.
    #[arg(value_name = "INT", default_value = "3")]
    n: usize,

    /// Dependency search timeout, in seconds.
    #[clap(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Run the heuristic unate reduction first.
    #[clap(long)]
    unate: bool,

    /// Merge with the independent circuit through `abc` and `aigtoaig`.
    #[clap(long)]
    merge: bool,

    /// Path to `abc`.
    #[clap(long, value_name = "PATH", default_value = "abc")]
    abc: PathBuf,

    /// Path to `aigtoaig`.
    #[clap(long, value_name = "PATH", default_value = "aigtoaig")]
    aigtoaig: PathBuf,
}

/// Sets every output to 1, which wins `G F f`.
struct ConstantSolver;

impl IndependentSynthesizer for ConstantSolver {
    fn synthesize(
        &mut self,
        aut: &Automaton,
        inputs: &[Var],
        outputs: &[Var],
    ) -> depsynth::pipeline::Result<Option<Aig>> {
        let dict = aut.dict();
        let mut aig = Aig::new();
        for &v in inputs {
            aig.add_input(dict.display_name(v));
        }
        for &v in outputs {
            aig.add_output(dict.display_name(v), Signal::one());
        }
        Ok(Some(aig))
    }
}

/// `G (o_k <-> i_k)` for every `k`, and `G F f`.
fn copy_spec(n: usize) -> SynthInstance {
    let mut aut = Automaton::new(Rc::new(BddDict::new()));
    let inputs: Vec<Var> = (0..n).map(|k| aut.register_ap(&format!("i{}", k))).collect();
    let mut outputs: Vec<Var> = (0..n).map(|k| aut.register_ap(&format!("o{}", k))).collect();
    let f = aut.register_ap("f");
    outputs.push(f);

    let bdd = aut.bdd();
    let copies = bdd.apply_and_many(
        inputs
            .iter()
            .zip(&outputs)
            .map(|(&i, &o)| bdd.apply_eq(bdd.mk_var(i), bdd.mk_var(o))),
    );
    let with_f = bdd.apply_and(copies, bdd.mk_var(f));
    let without_f = bdd.apply_and(copies, -bdd.mk_var(f));
    aut.new_state();
    aut.new_edge(0, 0, with_f, true);
    aut.new_edge(0, 0, without_f, false);
    SynthInstance::new(aut, inputs, outputs)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);
    let timeout = args.timeout.map(Duration::from_secs);

    let mut instance = copy_spec(args.n);
    println!("automaton:\n{}", instance.automaton);

    if args.merge {
        let config = SynthesisConfig::default()
            .with_unate(args.unate.then_some(UnateStrategyKind::Heuristic))
            .with_dependency_timeout(timeout)
            .with_merge(MergeConfig {
                abc: args.abc.clone(),
                aigtoaig: args.aigtoaig.clone(),
                ..Default::default()
            });
        let merger = ExternalMerger::new(config.merge.clone());
        let mut solver = ConstantSolver;
        let mut pipeline = Pipeline::new(config, &mut solver, &merger);
        match pipeline.run(instance)? {
            Outcome::Unrealizable => println!("UNREALIZABLE"),
            Outcome::Realizable { circuit, report } => {
                println!("REALIZABLE");
                println!("dependent outputs: {}", report.classification.dependent.len());
                print!("{}", circuit.to_aag());
            }
        }
        println!("Total time: {:?}", time_total.elapsed());
        return Ok(());
    }

    if args.unate {
        let mut handler = UnateHandler::with_kind(UnateStrategyKind::Heuristic, &instance.automaton, &instance.outputs, 5);
        let report = handler.run(&mut instance.automaton, &StopFlag::new());
        println!("unate literals fixed: {}", report.unate_count());
    }

    let aut = &instance.automaton;
    let classifier = DependencyClassifier::new(aut, instance.inputs.clone(), instance.outputs.clone());
    let (classification, report) = run_with_deadline(timeout, &StopFlag::new(), |stop| classifier.classify(stop));
    println!(
        "{} pair-states, {} dependent, {} independent, completed = {}",
        report.pair_states,
        classification.dependent.len(),
        classification.independent.len(),
        report.completed
    );
    for verdict in &report.verdicts {
        println!("- {}: dependent = {} ({:?})", verdict.name, verdict.dependent, verdict.duration);
    }

    if classification.dependent.is_empty() {
        println!("Nothing to compile");
    } else {
        let mut projected = aut.clone();
        projected.remove_aps(&classification.dependent);
        let synthesiser = DependentsSynthesiser::new(
            &projected,
            aut,
            &instance.inputs,
            &classification.independent,
            &classification.dependent,
        )?;
        let circuit = synthesiser.synthesize()?;
        print!("{}", circuit.to_aag());
    }

    println!("Total time: {:?}", time_total.elapsed());
    Ok(())
}
