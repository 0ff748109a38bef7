use anyhow::{Context, Result};
use argh::FromArgs;
use jobsh::logging::init_logging;
use jobsh::{Shell, ShellConfig};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Interactive shell with pipelines, redirection and job control.
struct Args {
    #[argh(option)]
    /// directory treated as `~` and holding the history (default: current directory).
    home: Option<PathBuf>,

    #[argh(option)]
    /// alias and function definitions (default: <home>/.myshrc).
    rc: Option<PathBuf>,

    #[argh(option, default = "ShellConfig::DEFAULT_HISTORY_LIMIT")]
    /// number of commands kept in the history.
    history_limit: usize,

    #[argh(option)]
    /// diagnostic level: error, warn, info, debug or trace (default: $JOBSH_LOG or warn).
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.log_level.as_deref())?;

    let home = match args.home {
        Some(home) => home,
        None => std::env::current_dir().context("can't determine the startup directory")?,
    };
    let mut config = ShellConfig::with_home(&home).history_limit(args.history_limit);
    if let Some(rc) = args.rc {
        config = config.rc_file(rc);
    }

    let shell = Shell::new(config)?;
    shell.run()?;
    Ok(())
}
