//! `a | b | c`: one process per stage, connected by pipes.

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::{ForkResult, Pid, dup2, fork, pipe};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use tracing::{debug, error, trace};

use crate::errors::{Result, ShellError};
use crate::interpreter::{Shell, notify, report};
use crate::jobs::JobState;
use crate::lexer::tokenize;
use crate::signals;

const STDIN: i32 = 0;
const STDOUT: i32 = 1;

/// Plumbing failures leave the shell in an unknown descriptor state.
fn fatal(what: &str, err: Errno) -> ! {
    error!(error = %err, "{what}");
    report(format_args!("{what}: {err}"));
    std::process::exit(1)
}

/// Job name of a stage: its program word.
fn stage_name(stage: &str) -> String {
    tokenize(stage)
        .into_iter()
        .next()
        .unwrap_or_else(|| stage.to_string())
}

impl Shell {
    /// Run every stage concurrently and wait for all of them.
    ///
    /// Each child re-enters the dispatcher on its stage, so a stage may be a
    /// builtin or carry its own redirection. Stages are waited on one at a
    /// time as the foreground process, so SIGINT and SIGTSTP reach whichever
    /// stage the shell is currently waiting for.
    pub(crate) fn run_pipeline(&mut self, stages: &[String]) -> Result<()> {
        if stages.len() < 2 || stages.iter().any(|s| s.trim().is_empty()) {
            return Err(ShellError::usage("Invalid use of pipe"));
        }

        let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::with_capacity(stages.len() - 1);
        for _ in 1..stages.len() {
            match pipe() {
                Ok(ends) => pipes.push(ends),
                Err(e) => fatal("Pipe creation failed", e),
            }
        }
        io::stdout().flush()?;

        let last = stages.len() - 1;
        let mut children: Vec<(Pid, String)> = Vec::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            // SAFETY: the child drops its pipe copies and either execs or
            // exits without returning into the caller's loop.
            match unsafe { fork() } {
                Err(e) => fatal("Fork failed", e),
                Ok(ForkResult::Child) => {
                    let read_end = (i > 0).then(|| pipes[i - 1].0.as_raw_fd());
                    let write_end = (i < last).then(|| pipes[i].1.as_raw_fd());
                    self.run_stage(stage, read_end, write_end, std::mem::take(&mut pipes));
                }
                Ok(ForkResult::Parent { child }) => {
                    trace!(pid = %child, stage = %stage, "pipeline stage forked");
                    children.push((child, stage_name(stage)));
                }
            }
        }
        drop(pipes);

        let mut pending = children.into_iter();
        while let Some((pid, name)) = pending.next() {
            if let Err(e) = self.wait_foreground(pid, &name) {
                debug!(%pid, error = %e, "waiting on pipeline stage failed");
                continue;
            }
            if self.jobs.contains(pid) {
                // The stage was stopped; the rest of the pipeline follows it.
                for (pid, name) in pending.by_ref() {
                    if let Err(e) = kill(pid, Signal::SIGTSTP) {
                        debug!(%pid, error = %e, "can't stop pipeline stage");
                    }
                    self.jobs.insert(pid, name, JobState::Stopped);
                    notify(format_args!("Stopped foreground process PID: {pid}"));
                }
            }
        }
        Ok(())
    }

    /// Child side of one stage. Never returns.
    fn run_stage(
        &mut self,
        stage: &str,
        read_end: Option<i32>,
        write_end: Option<i32>,
        pipes: Vec<(OwnedFd, OwnedFd)>,
    ) -> ! {
        signals::restore_defaults();
        self.jobs.clear();

        if let Some(fd) = read_end {
            if let Err(e) = dup2(fd, STDIN) {
                fatal("dup2 failed", e);
            }
        }
        if let Some(fd) = write_end {
            if let Err(e) = dup2(fd, STDOUT) {
                fatal("dup2 failed", e);
            }
        }
        drop(pipes);

        if let Err(e) = self.execute_unit(stage, false) {
            report(&e);
        }
        let _ = io::stdout().flush();
        std::process::exit(0)
    }
}
