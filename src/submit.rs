use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::exec::Executor;
use crate::resolve::Configuration;
use crate::script::{render, PayloadLines, ScriptFile};
use crate::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Scheduler output, or the dry-run log.
    pub output: String,
    /// Location of the script if it was kept.
    pub kept: Option<PathBuf>,
}

impl Outcome {
    pub fn report(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{}", self.output)?;
        if let Some(path) = &self.kept {
            writeln!(out, "sbatch script saved to {}", path.display())?;
        }
        out.flush()
    }
}

/// Renders the script into `dir` and hands it to `executor`.
///
/// The script is removed afterwards unless the configuration keeps it,
/// including when submission fails.
pub fn run<E, R>(config: &Configuration, input: R, dir: Option<&Path>, mut executor: E) -> Result<Outcome>
where
    E: Executor,
    R: BufRead,
{
    let mut script = ScriptFile::create(dir, config.flavor)?;
    render(
        config,
        PayloadLines::new(&config.command, input),
        script.as_file_mut(),
    )?;
    script.make_executable()?;
    if log::log_enabled!(log::Level::Debug) {
        let text = std::fs::read_to_string(script.path()).context_read(script.path())?;
        log::debug!("Submission script:\n{}", text);
    }

    let result = executor.submit(script.path());

    let kept = script.finish(config.keep)?;
    Ok(Outcome {
        output: result?,
        kept,
    })
}
