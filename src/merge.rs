//! Merging the independent and dependent circuits.
//!
//! Both circuits are exported to BLIF, the dependent one with its initial-state latch
//! spliced to start at 1, and stitched under a top model. The external optimiser then
//! flattens and optimises the result, and the ASCII AIGER it produces is read back.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};
use thiserror::Error;

use crate::aig::Aig;
use crate::aiger::AigerError;
use crate::blif::{merge_models, Blif, BlifError};

pub type Result<T> = std::result::Result<T, MergeError>;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    ExitStatus {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("cannot read the optimised circuit: {0}")]
    Aiger(#[from] AigerError),

    #[error("{0}")]
    Blif(#[from] BlifError),

    #[error("there is no circuit to merge")]
    NothingToMerge,
}

/// Optimisation passes run by `abc` on the merged model.
pub const DEFAULT_SCRIPT: &str = "strash; \
    rewrite; balance; refactor; \
    rewrite; balance; refactor; \
    rewrite; balance; refactor;";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MergeConfig {
    pub abc: PathBuf,
    pub aigtoaig: PathBuf,
    pub work_dir: PathBuf,
    pub model_name: String,
    pub script: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            abc: PathBuf::from("abc"),
            aigtoaig: PathBuf::from("aigtoaig"),
            work_dir: std::env::temp_dir(),
            model_name: "strategy".to_string(),
            script: DEFAULT_SCRIPT.to_string(),
        }
    }
}

/// The two circuits to merge and the names of their ports.
#[derive(Debug, Clone, Copy)]
pub struct MergeRequest<'a> {
    pub independent: Option<&'a Aig>,
    pub dependent: Option<&'a Aig>,
    pub inputs: &'a [String],
    pub independents: &'a [String],
    pub dependents: &'a [String],
    /// Latch of the dependent circuit tracking the initial state.
    pub init_latch: usize,
}

pub trait CircuitMerger {
    fn merge(&self, request: &MergeRequest<'_>) -> Result<Aig>;
}

/// Handles the cases where one side is missing, without any external tool.
///
/// Returns `None` when both circuits are present.
pub fn merge_trivial(request: &MergeRequest<'_>) -> Option<Result<Aig>> {
    let independent = request.independent.filter(|_| !request.independents.is_empty());
    let dependent = request.dependent.filter(|_| !request.dependents.is_empty());
    match (independent, dependent) {
        (None, None) => Some(Err(MergeError::NothingToMerge)),
        (Some(indeps), None) => Some(Ok(indeps.clone())),
        (None, Some(deps)) => Some(Ok(deps.with_latch_initially_one(request.init_latch))),
        (Some(_), Some(_)) => None,
    }
}

/// Merges through `abc` and `aigtoaig`.
#[derive(Debug, Clone, Default)]
pub struct ExternalMerger {
    config: MergeConfig,
}

impl ExternalMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// The merged BLIF text handed to the optimiser.
    pub fn merged_blif(&self, indeps: &Aig, deps: &Aig, request: &MergeRequest<'_>) -> Result<String> {
        let model = &self.config.model_name;
        let mut deps_blif = Blif::from_aig(deps, &format!("{}_deps", model));
        let init = deps_blif
            .latch_name(request.init_latch)
            .map(str::to_string)
            .ok_or(BlifError::NoLatches)?;
        deps_blif.init_latch_to_one(&init)?;
        let indeps_blif = Blif::from_aig(indeps, &format!("{}_indeps", model));

        Ok(merge_models(
            model,
            request.inputs,
            request.independents,
            request.dependents,
            &indeps_blif,
            &deps_blif,
        ))
    }

    fn run(&self, program: &Path, args: &[String]) -> Result<()> {
        let command = format!("{} {}", program.display(), args.join(" "));
        debug!("running {}", command);
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| MergeError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(MergeError::ExitStatus {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Distinguishes the runs of one process.
static RUN_COUNTER: AtomicUsize = AtomicUsize::new(0);

impl ExternalMerger {
    /// Creates a fresh directory under `work_dir` for the files of a single run.
    fn run_dir(&self) -> io::Result<PathBuf> {
        let config = &self.config;
        fs::create_dir_all(&config.work_dir)?;
        loop {
            let run = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
            let dir = config
                .work_dir
                .join(format!("{}-{}-{}", config.model_name, std::process::id(), run));
            match fs::create_dir(&dir) {
                Ok(()) => return Ok(dir),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl CircuitMerger for ExternalMerger {
    fn merge(&self, request: &MergeRequest<'_>) -> Result<Aig> {
        if let Some(res) = merge_trivial(request) {
            return res;
        }
        let (Some(indeps), Some(deps)) = (request.independent, request.dependent) else {
            return Err(MergeError::NothingToMerge);
        };

        let config = &self.config;
        let dir = self.run_dir()?;
        debug!("merging in {}", dir.display());
        let blif_path = dir.join(format!("{}.blif", config.model_name));
        let aig_path = dir.join(format!("{}.aig", config.model_name));
        let aag_path = dir.join(format!("{}.aag", config.model_name));

        let blif = self.merged_blif(indeps, deps, request)?;
        fs::write(&blif_path, blif)?;

        let script = format!(
            "read {}; {} write {};",
            blif_path.display(),
            config.script,
            aig_path.display()
        );
        self.run(&config.abc, &["-c".to_string(), script])?;
        self.run(
            &config.aigtoaig,
            &[aig_path.display().to_string(), aag_path.display().to_string()],
        )?;

        let merged = Aig::from_aag(File::open(&aag_path)?)?;
        info!(
            "merged circuit has {} inputs, {} latches, {} outputs, {} AND gates",
            merged.num_inputs(),
            merged.num_latches(),
            merged.num_outputs(),
            merged.num_ands()
        );
        Ok(merged)
    }
}
