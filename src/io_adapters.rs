//! Rebinding the shell's own stdin/stdout around a single command.

use anyhow::Context;
use nix::unistd::dup2;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::{trace, warn};

use crate::errors::{Result, ShellError};
use crate::interpreter::{Shell, report};
use crate::parser::{OutputTarget, RedirectKind, RedirectSpec};

const STDIN: i32 = 0;
const STDOUT: i32 = 1;

/// Saved copies of fd 0 and 1. Dropping the guard puts them back.
///
/// The copies are close-on-exec so children never inherit them.
pub struct StdioGuard {
    stdin: OwnedFd,
    stdout: OwnedFd,
}

impl StdioGuard {
    pub fn save() -> Result<Self> {
        let stdin = io::stdin().as_fd().try_clone_to_owned()?;
        let stdout = io::stdout().as_fd().try_clone_to_owned()?;
        trace!(stdin = stdin.as_raw_fd(), stdout = stdout.as_raw_fd(), "saved stdio");
        Ok(Self { stdin, stdout })
    }

    pub fn redirect_stdin(&self, file: &File) -> Result<()> {
        dup2(file.as_raw_fd(), STDIN).map_err(|e| ShellError::sys("dup2 failed", e))?;
        Ok(())
    }

    pub fn redirect_stdout(&self, file: &File) -> Result<()> {
        io::stdout().flush()?;
        dup2(file.as_raw_fd(), STDOUT).map_err(|e| ShellError::sys("dup2 failed", e))?;
        Ok(())
    }
}

impl Drop for StdioGuard {
    fn drop(&mut self) {
        if let Err(e) = io::stdout().flush() {
            warn!(error = %e, "flush before restoring stdout failed");
        }
        for (saved, target) in [(&self.stdin, STDIN), (&self.stdout, STDOUT)] {
            if let Err(e) = dup2(saved.as_raw_fd(), target) {
                warn!(fd = target, error = %e, "can't restore descriptor");
            }
        }
        trace!("restored stdio");
    }
}

pub fn open_input(path: &str) -> Result<File> {
    if !Path::new(path).exists() {
        report("No such input file found!");
    }
    let file = File::open(path).with_context(|| format!("can't open {path}"))?;
    Ok(file)
}

/// Create mode 0644; truncate for `>`, append for `>>`.
pub fn open_output(target: &OutputTarget) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    match target.kind {
        RedirectKind::Output => options.truncate(true),
        RedirectKind::Append => options.append(true),
    };
    let file = options
        .open(&target.path)
        .with_context(|| format!("can't open {}", target.path))?;
    Ok(file)
}

impl Shell {
    /// Run `spec.command` with the redirections applied, then restore stdio.
    pub(crate) fn run_redirected(&mut self, spec: RedirectSpec, background: bool) -> Result<()> {
        let guard = StdioGuard::save()?;

        if let Some(path) = &spec.input {
            let file = open_input(path)?;
            guard.redirect_stdin(&file)?;
        }
        if let Some(target) = &spec.output {
            let file = open_output(target)?;
            guard.redirect_stdout(&file)?;
        }

        let result = self.execute_unit(&spec.command, background);
        drop(guard);
        result
    }
}
