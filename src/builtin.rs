use anyhow::anyhow;
use argh::{EarlyExit, FromArgs};
use nix::unistd::Pid;
use std::io::{IsTerminal, Write};
use std::time::Duration;

use crate::errors::{Result, ShellError};
use crate::interpreter::Shell;
use crate::jobs::proc_state;
use crate::tools::reveal::RevealOptions;
use crate::tools::seek::{SeekOptions, find_matches};
use crate::tools::{iman, neonate, proclore, reveal};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and run inside the
/// shell process, with direct access to its state.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Command word(s) the builtin is invoked with, e.g. "hop" or "log purge".
    fn name() -> &'static str;

    /// Treat every argument as positional (`hop -`, `ping 12 -9`).
    const POSITIONAL_ONLY: bool = false;

    /// Expand `-la` into `-l -a` before parsing.
    const COMBINED_SWITCHES: bool = false;

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()>;
}

/// Argument parsing stopped early: a usage error or an explicit `--help`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidArgs {
    pub output: String,
    pub is_error: bool,
}

impl InvalidArgs {
    /// Help goes to stdout; a usage error becomes the command's error.
    pub fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        if self.is_error {
            return Err(ShellError::Usage(self.output.trim_end().to_string()));
        }
        stdout.write_all(self.output.as_bytes())?;
        Ok(())
    }
}

fn split_switches(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg.strip_prefix('-') {
            Some(flags)
                if flags.len() > 1
                    && !flags.starts_with('-')
                    && flags.chars().all(|c| c.is_ascii_alphabetic()) =>
            {
                out.extend(flags.chars().map(|c| format!("-{c}")));
            }
            _ => out.push(arg.clone()),
        }
    }
    out
}

fn parse<T: BuiltinCommand>(args: &[String]) -> std::result::Result<T, InvalidArgs> {
    let mut owned = if T::COMBINED_SWITCHES {
        split_switches(args)
    } else {
        args.to_vec()
    };
    if T::POSITIONAL_ONLY {
        owned.insert(0, "--".to_string());
    }
    let args: Vec<&str> = owned.iter().map(String::as_str).collect();
    T::from_args(&[T::name()], &args).map_err(|EarlyExit { output, status }| InvalidArgs {
        output,
        is_error: status.is_err(),
    })
}

fn pid_arg(raw: i32) -> Pid {
    Pid::from_raw(raw)
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Re-run a command from the history; 1 is the most recent.
pub struct LogExecute {
    #[argh(positional)]
    /// position in the history, counting back from the newest entry.
    pub index: usize,
}

impl BuiltinCommand for LogExecute {
    fn name() -> &'static str {
        "log execute"
    }

    fn execute(self, shell: &mut Shell, _stdout: &mut dyn Write) -> Result<()> {
        let command = shell.history.fetch(self.index)?;
        shell.execute_line(&command);
        Ok(())
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Change the working directory, once per argument, printing each new directory.
/// Understands `~`, `~/path`, `-`, `.` and `..`; no argument means home.
pub struct Hop {
    #[argh(positional)]
    /// directories to visit in order.
    pub targets: Vec<String>,
}

impl BuiltinCommand for Hop {
    fn name() -> &'static str {
        "hop"
    }

    const POSITIONAL_ONLY: bool = true;

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        let targets = if self.targets.is_empty() {
            vec!["~".to_string()]
        } else {
            self.targets
        };
        for target in targets {
            let landed = shell.env.change_dir(&target)?;
            writeln!(stdout, "{}", landed.display())?;
        }
        Ok(())
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// List directory contents.
pub struct Reveal {
    #[argh(switch, short = 'a')]
    /// include entries starting with a dot.
    pub all: bool,

    #[argh(switch, short = 'l')]
    /// long listing: mode, links, owner, group, size, mtime.
    pub long: bool,

    #[argh(positional)]
    /// directory or file to list; defaults to the current directory.
    pub path: Option<String>,
}

impl BuiltinCommand for Reveal {
    fn name() -> &'static str {
        "reveal"
    }

    const COMBINED_SWITCHES: bool = true;

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        let path = shell.env.expand(self.path.as_deref().unwrap_or("."))?;
        let opts = RevealOptions {
            all: self.all,
            long: self.long,
            color: std::io::stdout().is_terminal(),
        };
        reveal::reveal(&path, opts, stdout)?;
        Ok(())
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Exit the shell, killing every remaining job.
pub struct Exit {
    #[argh(positional)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        stdout.flush()?;
        shell.shutdown()
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Print the most recently created process id every interval until `x` is pressed.
pub struct Neonate {
    #[argh(option, short = 'n')]
    /// seconds between reports.
    pub interval: u64,
}

impl BuiltinCommand for Neonate {
    fn name() -> &'static str {
        "neonate"
    }

    fn execute(self, _shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        neonate::neonate(Duration::from_secs(self.interval), stdout)?;
        Ok(())
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Erase the command history.
pub struct LogPurge {}

impl BuiltinCommand for LogPurge {
    fn name() -> &'static str {
        "log purge"
    }

    fn execute(self, shell: &mut Shell, _stdout: &mut dyn Write) -> Result<()> {
        shell.history.clear()
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Show status, process group, memory and executable of a process.
pub struct Proclore {
    #[argh(positional)]
    /// process to inspect; defaults to the shell itself.
    pub pid: Option<i32>,
}

impl BuiltinCommand for Proclore {
    fn name() -> &'static str {
        "proclore"
    }

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        let pid = self.pid.unwrap_or_else(|| nix::unistd::getpid().as_raw());
        let info = proclore::inspect(pid)?;
        proclore::print(&info, |p| shell.env.display_path(p), stdout)?;
        Ok(())
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// List background and stopped jobs, sorted by name.
pub struct Activities {}

impl BuiltinCommand for Activities {
    fn name() -> &'static str {
        "activities"
    }

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        shell.jobs.sort_by_name();
        for job in shell.jobs.iter() {
            let state = proc_state(job.pid).unwrap_or(job.state);
            writeln!(stdout, "[{}] : {} - {}", job.pid, job.name, state)?;
        }
        Ok(())
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Print the command history, oldest first.
pub struct Log {}

impl BuiltinCommand for Log {
    fn name() -> &'static str {
        "log"
    }

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        shell.history.print(stdout)
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Resume a stopped job in the background.
pub struct Bg {
    #[argh(positional)]
    /// process id of the job.
    pub pid: i32,
}

impl BuiltinCommand for Bg {
    fn name() -> &'static str {
        "bg"
    }

    const POSITIONAL_ONLY: bool = true;

    fn execute(self, shell: &mut Shell, _stdout: &mut dyn Write) -> Result<()> {
        shell.resume_in_background(pid_arg(self.pid))
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Resume a job and wait for it in the foreground.
pub struct Fg {
    #[argh(positional)]
    /// process id of the job.
    pub pid: i32,
}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    const POSITIONAL_ONLY: bool = true;

    fn execute(self, shell: &mut Shell, _stdout: &mut dyn Write) -> Result<()> {
        shell.bring_to_foreground(pid_arg(self.pid))
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Fetch a man page from man.he.net.
pub struct IMan {
    #[argh(positional)]
    /// command to look up.
    pub topic: String,

    #[argh(positional)]
    /// ignored.
    pub _rest: Vec<String>,
}

impl BuiltinCommand for IMan {
    fn name() -> &'static str {
        "iMan"
    }

    fn execute(self, _shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        iman::iman(&self.topic, stdout)?;
        Ok(())
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Send a signal (taken modulo 32) to a process.
pub struct Ping {
    #[argh(positional)]
    /// target process id.
    pub pid: i32,

    #[argh(positional)]
    /// signal number.
    pub signal: i32,
}

impl BuiltinCommand for Ping {
    fn name() -> &'static str {
        "ping"
    }

    const POSITIONAL_ONLY: bool = true;

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        let sent = shell.send_signal(pid_arg(self.pid), self.signal)?;
        writeln!(stdout, "Sent signal {sent} to process with pid {}", self.pid)?;
        Ok(())
    }
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
/// Search a directory tree for names containing a term.
pub struct Seek {
    #[argh(switch, short = 'd')]
    /// only match directories.
    pub dirs: bool,

    #[argh(switch, short = 'f')]
    /// only match files.
    pub files: bool,

    #[argh(switch, short = 'e')]
    /// with a single match, enter the directory or print the file.
    pub exact: bool,

    #[argh(positional)]
    /// text to look for in entry names.
    pub term: String,

    #[argh(positional)]
    /// where to search; defaults to the current directory.
    pub dir: Option<String>,
}

impl BuiltinCommand for Seek {
    fn name() -> &'static str {
        "seek"
    }

    const COMBINED_SWITCHES: bool = true;

    fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        if self.dirs && self.files {
            return Err(ShellError::usage("Invalid flags!"));
        }
        let root = shell.env.expand(self.dir.as_deref().unwrap_or("."))?;
        let opts = SeekOptions {
            dirs_only: self.dirs,
            files_only: self.files,
        };
        let found = find_matches(&root, &self.term, opts);
        if found.is_empty() {
            writeln!(stdout, "No match found!")?;
            return Ok(());
        }
        for m in &found {
            writeln!(stdout, "{}", m.display())?;
        }

        if self.exact && found.len() == 1 {
            let only = &found[0];
            let full = root.join(&only.relative);
            if only.is_dir {
                let full = full.to_string_lossy().into_owned();
                shell
                    .env
                    .change_dir(&full)
                    .map_err(|_| anyhow!("Missing permissions for task!"))?;
            } else {
                let contents = std::fs::read_to_string(&full)
                    .map_err(|_| anyhow!("Missing permissions for task!"))?;
                write!(stdout, "{contents}")?;
            }
        }
        Ok(())
    }
}

/// Every builtin, in dispatch priority order.
#[derive(Debug, PartialEq, Eq)]
pub enum Builtin {
    LogExecute(LogExecute),
    Hop(Hop),
    Reveal(Reveal),
    Exit(Exit),
    Neonate(Neonate),
    LogPurge(LogPurge),
    Proclore(Proclore),
    Activities(Activities),
    Log(Log),
    Bg(Bg),
    Fg(Fg),
    IMan(IMan),
    Ping(Ping),
    Seek(Seek),
}

impl Builtin {
    /// Recognize `argv` as a builtin invocation.
    ///
    /// `None` means "not a builtin"; `Some(Err(_))` means it is one but the
    /// arguments did not parse.
    pub fn recognize(argv: &[String]) -> Option<std::result::Result<Builtin, InvalidArgs>> {
        let (first, rest) = argv.split_first()?;
        let second = rest.first().map(String::as_str);

        Some(match (first.as_str(), second) {
            ("log", Some("execute")) => parse(&rest[1..]).map(Builtin::LogExecute),
            ("hop", _) => parse(rest).map(Builtin::Hop),
            ("reveal", _) => parse(rest).map(Builtin::Reveal),
            ("exit", _) => parse(rest).map(Builtin::Exit),
            ("neonate", _) => parse(rest).map(Builtin::Neonate),
            ("log", Some("purge")) => parse(&rest[1..]).map(Builtin::LogPurge),
            ("proclore", _) => parse(rest).map(Builtin::Proclore),
            ("activities", _) => parse(rest).map(Builtin::Activities),
            ("log", _) => parse(rest).map(Builtin::Log),
            ("bg", _) => parse(rest).map(Builtin::Bg),
            ("fg", _) => parse(rest).map(Builtin::Fg),
            ("iMan", _) => parse(rest).map(Builtin::IMan),
            ("ping", _) => parse(rest).map(Builtin::Ping),
            ("seek", _) => parse(rest).map(Builtin::Seek),
            _ => return None,
        })
    }

    pub(crate) fn execute(self, shell: &mut Shell, stdout: &mut dyn Write) -> Result<()> {
        match self {
            Builtin::LogExecute(cmd) => cmd.execute(shell, stdout),
            Builtin::Hop(cmd) => cmd.execute(shell, stdout),
            Builtin::Reveal(cmd) => cmd.execute(shell, stdout),
            Builtin::Exit(cmd) => cmd.execute(shell, stdout),
            Builtin::Neonate(cmd) => cmd.execute(shell, stdout),
            Builtin::LogPurge(cmd) => cmd.execute(shell, stdout),
            Builtin::Proclore(cmd) => cmd.execute(shell, stdout),
            Builtin::Activities(cmd) => cmd.execute(shell, stdout),
            Builtin::Log(cmd) => cmd.execute(shell, stdout),
            Builtin::Bg(cmd) => cmd.execute(shell, stdout),
            Builtin::Fg(cmd) => cmd.execute(shell, stdout),
            Builtin::IMan(cmd) => cmd.execute(shell, stdout),
            Builtin::Ping(cmd) => cmd.execute(shell, stdout),
            Builtin::Seek(cmd) => cmd.execute(shell, stdout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::env::tests::lock_current_dir;
    use crate::jobs::JobState;
    use std::env as stdenv;
    use std::fs;

    fn argv(line: &str) -> Vec<String> {
        crate::lexer::tokenize(line)
    }

    fn recognized(line: &str) -> Builtin {
        Builtin::recognize(&argv(line))
            .expect("is a builtin")
            .expect("arguments parse")
    }

    fn test_shell() -> (tempfile::TempDir, Shell) {
        let home = tempfile::tempdir().unwrap();
        let shell = Shell::new(ShellConfig::with_home(home.path())).unwrap();
        (home, shell)
    }

    #[test]
    fn log_subcommands_take_priority_over_plain_log() {
        assert_eq!(
            recognized("log execute 2"),
            Builtin::LogExecute(LogExecute { index: 2 })
        );
        assert_eq!(recognized("log purge"), Builtin::LogPurge(LogPurge {}));
        assert_eq!(recognized("log"), Builtin::Log(Log {}));
    }

    #[test]
    fn only_the_command_word_selects_a_builtin() {
        assert!(Builtin::recognize(&argv("hopscotch")).is_none());
        assert!(Builtin::recognize(&argv("ls -l")).is_none());
        assert!(Builtin::recognize(&[]).is_none());
    }

    #[test]
    fn positional_only_builtins_accept_dashes() {
        assert_eq!(
            recognized("hop - .."),
            Builtin::Hop(Hop {
                targets: vec!["-".to_string(), "..".to_string()]
            })
        );
        assert_eq!(
            recognized("ping 42 -9"),
            Builtin::Ping(Ping {
                pid: 42,
                signal: -9
            })
        );
    }

    #[test]
    fn combined_switches_are_split() {
        assert_eq!(
            recognized("reveal -la /tmp"),
            Builtin::Reveal(Reveal {
                all: true,
                long: true,
                path: Some("/tmp".to_string())
            })
        );
        match recognized("seek -fe main src") {
            Builtin::Seek(seek) => {
                assert!(seek.files && seek.exact && !seek.dirs);
                assert_eq!(seek.term, "main");
                assert_eq!(seek.dir.as_deref(), Some("src"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_arguments_are_reported_not_run() {
        let err = Builtin::recognize(&argv("bg notapid"))
            .expect("is a builtin")
            .unwrap_err();
        assert!(err.is_error);

        let err = Builtin::recognize(&argv("log execute"))
            .expect("is a builtin")
            .unwrap_err();
        assert!(err.is_error);
        assert!(err.execute(&mut Vec::new()).is_err());

        let help = Builtin::recognize(&argv("activities --help"))
            .expect("is a builtin")
            .unwrap_err();
        assert!(!help.is_error);
        let mut out = Vec::new();
        help.execute(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("activities"));
    }

    #[test]
    fn hop_prints_each_destination() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let (home, mut shell) = test_shell();
        fs::create_dir(home.path().join("sub")).unwrap();
        let canonical_home = fs::canonicalize(home.path()).unwrap();

        let mut out = Vec::new();
        recognized("hop ~ sub ..").execute(&mut shell, &mut out).unwrap();
        let printed = String::from_utf8(out).unwrap();
        let sub = canonical_home.join("sub");
        assert_eq!(
            printed,
            format!(
                "{}\n{}\n{}\n",
                canonical_home.display(),
                sub.display(),
                canonical_home.display()
            )
        );
        assert_eq!(stdenv::current_dir().unwrap(), canonical_home);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
    }

    #[test]
    fn activities_lists_jobs_sorted_by_name() {
        let (_home, mut shell) = test_shell();
        // Pids that cannot exist, so the stored state is what gets shown.
        shell.jobs.insert(Pid::from_raw(i32::MAX - 1), "zz", JobState::Running);
        shell.jobs.insert(Pid::from_raw(i32::MAX - 2), "aa", JobState::Stopped);

        let mut out = Vec::new();
        recognized("activities").execute(&mut shell, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(
                "[{}] : aa - Stopped\n[{}] : zz - Running\n",
                i32::MAX - 2,
                i32::MAX - 1
            )
        );
    }

    #[test]
    fn signal_builtins_report_missing_processes() {
        let (_home, mut shell) = test_shell();
        let ghost = (i32::MAX).to_string();
        for line in [
            format!("bg {ghost}"),
            format!("fg {ghost}"),
            format!("ping {ghost} 9"),
        ] {
            let err = recognized(&line)
                .execute(&mut shell, &mut Vec::new())
                .unwrap_err();
            assert!(matches!(err, ShellError::NoSuchProcess), "{line}: {err}");
        }
    }

    #[test]
    fn ping_zero_only_probes() {
        let (_home, mut shell) = test_shell();
        let me = nix::unistd::getpid().as_raw();
        let mut out = Vec::new();
        recognized(&format!("ping {me} 32"))
            .execute(&mut shell, &mut out)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("Sent signal 0 to process with pid {me}\n")
        );
    }

    #[test]
    fn ping_keeps_the_sign_of_the_remainder() {
        let (_home, mut shell) = test_shell();
        let me = nix::unistd::getpid().as_raw();
        for number in [-1, -9, -33] {
            let err = recognized(&format!("ping {me} {number}"))
                .execute(&mut shell, &mut Vec::new())
                .unwrap_err();
            assert!(matches!(err, ShellError::InvalidSignal), "{number}: {err}");
        }

        let mut out = Vec::new();
        recognized(&format!("ping {me} -64"))
            .execute(&mut shell, &mut out)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("Sent signal 0 to process with pid {me}\n")
        );
    }

    #[test]
    fn log_builtins_use_the_history_file() {
        let (_home, mut shell) = test_shell();
        shell.history.record("reveal").unwrap();
        shell.history.record("hop ~").unwrap();

        let mut out = Vec::new();
        recognized("log").execute(&mut shell, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "reveal\nhop ~\n");

        let err = recognized("log execute 3")
            .execute(&mut shell, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ShellError::HistoryIndex(3)));

        recognized("log purge")
            .execute(&mut shell, &mut Vec::new())
            .unwrap();
        assert!(shell.history.entries().unwrap().is_empty());
    }

    #[test]
    fn seek_rejects_conflicting_kinds() {
        let (_home, mut shell) = test_shell();
        let err = recognized("seek -d -f x")
            .execute(&mut shell, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid flags!");
    }

    #[test]
    fn seek_reports_no_match() {
        let (home, mut shell) = test_shell();
        let mut out = Vec::new();
        recognized(&format!("seek nothing_here {}", home.path().display()))
            .execute(&mut shell, &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No match found!\n");
    }

    #[test]
    fn seek_exact_prints_a_single_file() {
        let (home, mut shell) = test_shell();
        fs::write(home.path().join("notes.txt"), "remember\n").unwrap();
        let mut out = Vec::new();
        recognized(&format!("seek -f -e notes {}", home.path().display()))
            .execute(&mut shell, &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "./notes.txt\nremember\n");
    }
}
