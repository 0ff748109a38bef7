//! Persistent command history backing `log`.

use anyhow::Context;
use std::fs::{self, DirBuilder};
use std::io::Write;
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;
use tracing::debug;

use crate::errors::{Result, ShellError};

#[derive(Debug)]
pub struct History {
    path: PathBuf,
    limit: usize,
    /// Last recorded command, used to drop immediate repeats.
    last: Option<String>,
}

impl History {
    /// Open (and create the parent directory of) the history file.
    pub fn open(path: impl Into<PathBuf>, limit: usize) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(dir)
                .with_context(|| format!("can't create history directory {}", dir.display()))?;
        }
        let mut history = Self {
            path,
            limit,
            last: None,
        };
        history.last = history.entries()?.pop();
        Ok(history)
    }

    /// Whether `command` would be written by [`History::record`].
    pub fn should_record(&self, command: &str) -> bool {
        !command.is_empty() && !command.contains("log") && self.last.as_deref() != Some(command)
    }

    /// Append a command, dropping the oldest entries past the limit.
    ///
    /// Returns whether anything was written.
    pub fn record(&mut self, command: &str) -> Result<bool> {
        let command = command.trim();
        if !self.should_record(command) {
            return Ok(false);
        }

        let mut entries = self.entries()?;
        entries.push(command.to_string());
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
            self.rewrite(&entries)?;
        } else {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .with_context(|| format!("can't open {}", self.path.display()))?;
            writeln!(file, "{command}")?;
        }
        debug!(command, "recorded history entry");
        self.last = Some(command.to_string());
        Ok(true)
    }

    /// Recorded commands, oldest first. A missing file reads as empty; blank
    /// lines are skipped.
    pub fn entries(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// The `n`-th most recent command; 1 is the newest.
    pub fn fetch(&self, n: usize) -> Result<String> {
        let entries = self.entries()?;
        if n == 0 || n > entries.len() {
            return Err(ShellError::HistoryIndex(n));
        }
        Ok(entries[entries.len() - n].clone())
    }

    /// Truncate the history file (`log purge`).
    pub fn clear(&mut self) -> Result<()> {
        self.rewrite(&[])?;
        self.last = None;
        Ok(())
    }

    /// Write every entry, oldest first, one per line.
    ///
    /// # Arguments
    ///
    /// * `out` - Destination; the shell passes its stdout, which may be a
    ///   redirected file or a pipe.
    pub fn print(&self, out: &mut dyn Write) -> Result<()> {
        for entry in self.entries()? {
            writeln!(out, "{entry}")?;
        }
        Ok(())
    }

    fn rewrite(&self, entries: &[String]) -> Result<()> {
        let mut text = entries.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(&self.path, text)
            .with_context(|| format!("can't write {}", self.path.display()))?;
        Ok(())
    }
}
