use clap::Parser;
use log::info;
use sbatch_run::exec::{executor_for, Sbatch};
use sbatch_run::resolve::{program_name, resolve, Flags};
use sbatch_run::*;

fn init_logging(verbose: u64) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn stdin_is_terminal() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) == 1 }
}

fn run(flags: Flags) -> Result<()> {
    let settings = Settings::load(flags.config.as_deref())?;
    let config = resolve(&flags, &settings, &program_name())?;

    if config.command.is_empty() && stdin_is_terminal() {
        eprintln!("Enter commands, ending input with a control-d");
    }

    let stdin = std::io::stdin();
    let input = stdin.lock();
    let executor = executor_for(config.dry_run, Sbatch::new(settings.sbatch.as_str()), &settings.sbatch);
    let outcome = submit::run(&config, input, flags.tmpdir.as_deref(), executor)?;

    outcome.report(&mut std::io::stdout().lock())?;
    info!("Done");
    Ok(())
}

fn main() {
    reset_sigpipe();
    let flags = Flags::parse();
    init_logging(flags.verbose);

    if let Err(e) = run(flags) {
        match e.downcast_ref::<RunError>() {
            Some(r @ RunError::MissingInput(_)) => eprintln!("{}", r),
            _ => eprintln!("Error: {:?}", e),
        }
        std::process::exit(exit_status(&e));
    }
}
