use std::fmt::Display;
use std::path::Path;
use std::process::Command;

use crate::*;

/// Something that can submit a script to the scheduler.
pub trait Executor {
    /// Submits the script at `script` and returns what should be shown to
    /// the user on standard output.
    fn submit(&mut self, script: &Path) -> Result<String>;
}

impl<E: Executor + ?Sized> Executor for &mut E {
    fn submit(&mut self, script: &Path) -> Result<String> {
        (**self).submit(script)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn submit(&mut self, script: &Path) -> Result<String> {
        (**self).submit(script)
    }
}

/// Picks `real`, or a [`DryRun`] logger for `program` when `dry_run` is set.
pub fn executor_for<'a, E>(dry_run: bool, real: E, program: &str) -> Box<dyn Executor + 'a>
where
    E: Executor + 'a,
{
    if dry_run {
        Box::new(DryRun::new(program))
    } else {
        Box::new(real)
    }
}

#[derive(Clone, Copy)]
pub struct DisplayCmd<'a>(pub &'a Command);

impl<'a> Display for DisplayCmd<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get_program().to_string_lossy())?;
        for arg in self.0.get_args() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

fn sbatch_command(program: &str, script: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg(script);
    cmd
}

/// Runs the submission program and passes its output through.
#[derive(Clone, Debug)]
pub struct Sbatch {
    program: String,
}

impl Sbatch {
    pub fn new(program: impl Into<String>) -> Self {
        Sbatch {
            program: program.into(),
        }
    }
}

impl Executor for Sbatch {
    fn submit(&mut self, script: &Path) -> Result<String> {
        let mut cmd = sbatch_command(&self.program, script);
        log::info!("Running {}", DisplayCmd(&cmd));

        let output = cmd
            .output()
            .map_err(|e| anyhow::Error::new(e).context(RunError::SbatchNotFound(self.program.clone())))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            eprint!("{}", stderr);
            bail!(RunError::SbatchFailed {
                status: output.status.code(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            eprint!("{}", stderr);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Records what would have been run instead of running it.
#[derive(Clone, Debug)]
pub struct DryRun {
    program: String,
    pub log: Vec<String>,
}

impl DryRun {
    pub fn new(program: impl Into<String>) -> Self {
        DryRun {
            program: program.into(),
            log: vec![],
        }
    }
}

impl Executor for DryRun {
    fn submit(&mut self, script: &Path) -> Result<String> {
        let cmd = sbatch_command(&self.program, script);
        let line = format!("$ {}", DisplayCmd(&cmd));
        log::info!("Dry run, not executing: {}", DisplayCmd(&cmd));
        self.log.push(line);
        Ok(self.log.join("\n") + "\n")
    }
}
