use std::{fmt::Display, path::Path, path::PathBuf};

use serde::de::DeserializeOwned;

pub use anyhow::{anyhow, bail, Context, Result};

pub use posix_cli_utils::*;

/// Failures the command line front end maps to a specific exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The input file given with `--beast2` does not exist.
    MissingInput(PathBuf),
    /// The submission program could not be started.
    SbatchNotFound(String),
    /// The submission program ran but exited unsuccessfully.
    SbatchFailed { status: Option<i32>, stderr: String },
    /// A flag the selected script flavor has no support for.
    Unsupported { flavor: Flavor, flag: &'static str },
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        use RunError::*;
        match self {
            MissingInput(_) => 1,
            SbatchNotFound(_) => 127,
            SbatchFailed { status, .. } => status.unwrap_or(1),
            Unsupported { .. } => 2,
        }
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use RunError::*;
        match self {
            MissingInput(p) => write!(
                f,
                "The file {:?} (used with --beast2) does not exist.",
                p.display().to_string()
            ),
            SbatchNotFound(p) => write!(f, "unable to run submission program {:?}", p),
            SbatchFailed { status: Some(c), .. } => write!(f, "sbatch failed with exit code {}", c),
            SbatchFailed { status: None, .. } => write!(f, "sbatch was terminated by a signal"),
            Unsupported { flavor, flag } => {
                write!(f, "{} is not available with the {} script flavor", flag, flavor.name())
            }
        }
    }
}

impl std::error::Error for RunError {}

/// Exit status for a failed run: the one carried by a [`RunError`] anywhere
/// in the chain, 1 otherwise.
pub fn exit_status(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<RunError>()
        .map(RunError::exit_code)
        .unwrap_or(1)
}

pub fn read_json<T, P>(path: P) -> Result<T>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
{
    let path = path.as_ref();
    let f = std::fs::File::open(path)
        .context_read(path)?;
    serde_json::from_reader(f)
        .with_context(|| format!("failed to parse {:?}", path))
}

mod config;
pub use config::*;

pub mod resolve;
pub mod script;
pub mod exec;
pub mod submit;
