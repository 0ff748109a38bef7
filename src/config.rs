use std::path::{Path, PathBuf};

/// Everything the shell needs to know before reading its first line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Directory shown as `~` in the prompt and used by `hop ~`.
    pub home: PathBuf,
    pub history_file: PathBuf,
    pub history_limit: usize,
    /// Alias and function definitions; a missing file is not an error.
    pub rc_file: PathBuf,
}

impl ShellConfig {
    pub const DEFAULT_HISTORY_LIMIT: usize = 15;
    pub const HISTORY_DIR: &'static str = ".shell_logs";
    pub const HISTORY_FILE: &'static str = "command.log";
    pub const RC_FILE: &'static str = ".myshrc";

    /// Defaults derived from a home directory.
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref().to_path_buf();
        Self {
            history_file: home.join(Self::HISTORY_DIR).join(Self::HISTORY_FILE),
            rc_file: home.join(Self::RC_FILE),
            history_limit: Self::DEFAULT_HISTORY_LIMIT,
            home,
        }
    }

    pub fn rc_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rc_file = path.into();
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}
