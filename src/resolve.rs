use std::path::{Path, PathBuf};

use clap::Parser;

use crate::*;

/// Run commands using sbatch
#[derive(Parser, Clone, Debug)]
pub struct Flags {
    /// If given, run on an exclusive machine. Defaults to false, unless --gpu is given.
    #[clap(long)]
    pub exclusive: bool,

    /// If given, do not actually execute the sbatch script. Implies --keep.
    #[clap(long = "dryRun")]
    pub dry_run: bool,

    /// If given, keep the sbatch submission file and print its path.
    #[clap(long)]
    pub keep: bool,

    /// If given, use -overwrite when calling beast2 (via --beast2).
    #[clap(long)]
    pub force: bool,

    /// The job name, passed with -J to sbatch. [default: the program name]
    #[clap(long)]
    pub job: Option<String>,

    /// The account name, passed with -A to sbatch. Default depends on --gpu.
    #[clap(long)]
    pub account: Option<String>,

    /// The SLURM output file name, passed with -o to sbatch.
    #[clap(long, default_value = "slurm-%A.out")]
    pub out: String,

    /// The SLURM partition, passed with -p to sbatch. Default depends on --gpu.
    #[clap(long)]
    pub partition: Option<String>,

    /// The SLURM time limit, passed with --time to sbatch. Default depends on --gpu.
    #[clap(long)]
    pub time: Option<String>,

    /// If given, schedule on a GPU machine. Implies --exclusive and switches to the GPU defaults.
    #[clap(long)]
    pub gpu: bool,

    /// If exactly one argument is given, it is taken as an XML file and given to beast2.
    #[clap(long)]
    pub beast2: bool,

    /// Layout of the generated script.
    #[clap(long, arg_enum, default_value = "current")]
    pub flavor: Flavor,

    /// Read settings from this JSON file instead of the user config directory.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Directory to write the submission script to.
    #[clap(long)]
    pub tmpdir: Option<PathBuf>,

    /// Log more (repeat for debug output).
    #[clap(short, long, parse(from_occurrences))]
    pub verbose: u64,

    /// The command to run. If empty, commands are read from standard input.
    /// Put it after `--` if it has dashed options of its own.
    pub args: Vec<String>,
}

/// Fully resolved submission parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub job: String,
    pub account: String,
    pub out: String,
    pub partition: String,
    pub time: String,
    pub exclusive: bool,
    pub gpu: bool,
    pub dry_run: bool,
    pub keep: bool,
    pub flavor: Flavor,
    pub gpu_nodes: u32,
    pub gpu_gres: String,
    pub library_dir: PathBuf,
    /// Empty when the payload comes from standard input.
    pub command: Vec<String>,
}

fn beast2_command(settings: &Settings, input: &str, force: bool) -> Vec<String> {
    let mut cmd = vec![settings.beast2_binary().to_string_lossy().into_owned()];
    cmd.extend(
        ["-threads", "4", "-beagle_order", "1,2,3,4", "-beagle", "-beagle_GPU"]
            .iter()
            .map(|s| s.to_string()),
    );
    if force {
        cmd.push("-overwrite".to_string());
    }
    cmd.push(input.to_string());
    cmd
}

/// Turns command line flags into a [`Configuration`].
///
/// Values are not validated; sbatch does that.  The only check is that the
/// input file of a `--beast2` run exists.
pub fn resolve(flags: &Flags, settings: &Settings, program: &str) -> Result<Configuration> {
    if !flags.flavor.supports_gpu() {
        if flags.gpu {
            bail!(RunError::Unsupported { flavor: flags.flavor, flag: "--gpu" });
        }
        if flags.beast2 {
            bail!(RunError::Unsupported { flavor: flags.flavor, flag: "--beast2" });
        }
    }

    let mut command = flags.args.clone();
    if flags.beast2 && command.len() == 1 {
        let input = &command[0];
        if !Path::new(input).exists() {
            bail!(RunError::MissingInput(input.into()));
        }
        command = beast2_command(settings, input, flags.force);
    }

    let defaults = settings.profile(flags.gpu);
    log::info!("Using {} defaults", if flags.gpu { "GPU" } else { "CPU" });
    let or_default = |v: &Option<String>, d: &String| v.as_ref().unwrap_or(d).clone();

    Ok(Configuration {
        job: flags.job.clone().unwrap_or_else(|| program.to_string()),
        account: or_default(&flags.account, &defaults.account),
        out: flags.out.clone(),
        partition: or_default(&flags.partition, &defaults.partition),
        time: or_default(&flags.time, &defaults.time),
        exclusive: flags.exclusive || flags.gpu,
        gpu: flags.gpu,
        dry_run: flags.dry_run,
        keep: flags.keep || flags.dry_run,
        flavor: flags.flavor,
        gpu_nodes: settings.gpu_nodes,
        gpu_gres: settings.gpu_gres.clone(),
        library_dir: settings.library_dir(),
        command,
    })
}

/// Base name of the running program, used as the default job name.
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_ref()
        .and_then(|p| Path::new(p).file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sbatch-run".to_string())
}
