use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::errors::Result;
use crate::history::History;
use crate::jobs::{Foreground, JobTable};
use crate::parser::parse_line;
use crate::rc::RcFile;
use crate::signals;
use crate::tools::prompt;

/// Deepest chain of function calls and history replays allowed.
const MAX_NESTING: usize = 64;

/// Write a shell notice to stdout immediately.
pub(crate) fn notify(msg: impl fmt::Display) {
    let mut out = io::stdout().lock();
    if let Err(e) = writeln!(out, "{msg}").and_then(|()| out.flush()) {
        trace!(error = %e, "stdout unavailable");
    }
}

/// Write an error line to stderr.
pub(crate) fn report(msg: impl fmt::Display) {
    let mut err = io::stderr().lock();
    if let Err(e) = writeln!(err, "{msg}") {
        trace!(error = %e, "stderr unavailable");
    }
}

/// An interactive job-control shell.
///
/// `Shell` owns all mutable shell state: the job table, the foreground slot,
/// history and rc definitions. Signal handlers never touch it; they only leave
/// notes that [`Shell::service_signals`] picks up.
///
/// ```no_run
/// use jobsh::{Shell, ShellConfig};
/// let mut sh = Shell::new(ShellConfig::with_home("/tmp")).unwrap();
/// sh.execute_line("echo hello ; sleep 1 &");
/// ```
pub struct Shell {
    pub(crate) env: Environment,
    pub(crate) jobs: JobTable,
    pub(crate) foreground: Option<Foreground>,
    pub(crate) history: History,
    pub(crate) rc: RcFile,
    /// Name of the last foreground program.
    pub(crate) last_command: String,
    /// Duration of the last completed foreground wait, until shown in a prompt.
    pub(crate) last_elapsed: Option<Duration>,
    pub(crate) dispatched_at: Instant,
    depth: usize,
}

impl Shell {
    /// Build a shell from its configuration.
    ///
    /// Opens (creating its directory if needed) the history file and loads the
    /// rc file. Signal handlers are not installed here; [`Shell::run`] does
    /// that, so a `Shell` can be driven from tests without touching process
    /// dispositions.
    ///
    /// # Arguments
    ///
    /// * `config` - Home directory, history location and limit, rc file.
    ///
    /// # Returns
    ///
    /// * `Result<Shell>` - Fails when the history directory can't be created
    ///   or an existing rc/history file can't be read.
    pub fn new(config: ShellConfig) -> Result<Self> {
        let history = History::open(&config.history_file, config.history_limit)?;
        let rc = RcFile::load(&config.rc_file)?;
        debug!(?config, "shell configured");
        Ok(Self {
            env: Environment::new(config.home),
            jobs: JobTable::new(),
            foreground: None,
            history,
            rc,
            last_command: String::new(),
            last_elapsed: None,
            dispatched_at: Instant::now(),
            depth: 0,
        })
    }

    /// Background and stopped jobs currently tracked.
    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    /// Apply aliases, then run the line.
    pub fn handle_input(&mut self, raw: &str) {
        let line = self.rc.substitute_aliases(raw);
        self.execute_line(&line);
    }

    /// Record `line` in the history and run it.
    pub fn execute_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.dispatched_at = Instant::now();
        if let Err(e) = self.history.record(line) {
            warn!(error = %e, "can't record history");
        }
        self.run_sequence(line);
    }

    /// Run every `;` segment and `&` unit of `line` in order, without touching
    /// the history.
    pub(crate) fn run_sequence(&mut self, line: &str) {
        if self.depth >= MAX_NESTING {
            report("Maximum nesting depth exceeded");
            return;
        }
        self.depth += 1;
        for segment in parse_line(line).segments {
            for unit in segment.units {
                trace!(unit = %unit.text, background = unit.background, "dispatching");
                if let Err(e) = self.execute_unit(&unit.text, unit.background) {
                    report(&e);
                }
                self.service_signals();
            }
        }
        self.depth -= 1;
    }

    /// Classify one unit and run it.
    pub(crate) fn execute_unit(&mut self, unit: &str, background: bool) -> Result<()> {
        match Command::classify(unit, &self.rc)? {
            Command::Empty => Ok(()),
            Command::Pipeline(stages) => self.run_pipeline(&stages),
            Command::Redirect(spec) => self.run_redirected(spec, background),
            Command::Function { name, args } => {
                self.call_function(&name, &args);
                Ok(())
            }
            Command::Builtin(builtin) => builtin.execute(self, &mut io::stdout()),
            Command::Invalid(invalid) => invalid.execute(&mut io::stdout()),
            Command::External(argv) => self.launch(unit, &argv, background),
        }
    }

    fn call_function(&mut self, name: &str, args: &str) {
        let Some(function) = self.rc.function(name) else {
            return;
        };
        let lines = function.expand(args);
        debug!(name, args, lines = lines.len(), "calling function");
        for line in lines {
            self.run_sequence(&line);
        }
    }

    /// Prompt for the next line: `<user@host:path>`, plus the last foreground
    /// command and its duration when that took longer than
    /// [`prompt::SLOW_COMMAND`]. The duration is shown only once.
    pub fn prompt(&mut self) -> String {
        let path = self
            .env
            .current_dir()
            .map(|dir| self.env.display_path(&dir))
            .unwrap_or_else(|_| "?".to_string());
        let slow = self
            .last_elapsed
            .take()
            .filter(|elapsed| *elapsed > prompt::SLOW_COMMAND);
        prompt::render(
            &prompt::user_name(),
            &prompt::host_name(),
            &path,
            slow.map(|elapsed| (self.last_command.as_str(), elapsed)),
        )
    }

    /// Run until end of input, then shut down like SIGQUIT does.
    pub fn run(mut self) -> Result<()> {
        signals::install()?;
        if io::stdin().is_terminal() {
            if let Err(e) = self.repl() {
                report(format_args!("Error: {e}"));
            }
        } else {
            self.run_script(io::stdin().lock())?;
        }
        self.shutdown()
    }

    /// Read lines without a prompt, e.g. from a pipe.
    pub fn run_script(&mut self, input: impl BufRead) -> Result<()> {
        for line in input.lines() {
            let line = line?;
            self.service_signals();
            self.handle_input(&line);
        }
        self.service_signals();
        Ok(())
    }

    fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            self.service_signals();
            let prompt = self.prompt();
            match rl.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.handle_input(&line);
                }
                Err(ReadlineError::Interrupted) => {
                    report("No foreground process to interrupt");
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}
