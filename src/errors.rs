//! Crate-wide error type.
//!
//! Every error here is reported to stderr by the dispatcher and the shell keeps
//! running; only the callers that explicitly exit (pipeline plumbing failures,
//! `exit`, SIGQUIT) terminate the process.

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{context}: {source}")]
    Sys {
        context: &'static str,
        #[source]
        source: Errno,
    },

    #[error("{0}")]
    Usage(String),

    #[error("No such process found")]
    NoSuchProcess,

    #[error("Invalid signal number")]
    InvalidSignal,

    #[error("Invalid index: no command at position {0} in history")]
    HistoryIndex(usize),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShellError {
    pub fn sys(context: &'static str, source: Errno) -> Self {
        ShellError::Sys { context, source }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        ShellError::Usage(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
