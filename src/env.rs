use anyhow::{Context, Result, anyhow};
use std::env as stdenv;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory state of the shell process.
///
/// The real working directory lives in the process itself (children inherit
/// it); this type adds the shell's notion of `~` and the directory `hop -`
/// returns to.
#[derive(Debug, Clone)]
pub struct Environment {
    /// What `~` expands to.
    pub home: PathBuf,
    /// Where the last successful `hop` started from.
    pub previous_dir: Option<PathBuf>,
}

impl Environment {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            previous_dir: None,
        }
    }

    /// The process working directory.
    pub fn current_dir(&self) -> Result<PathBuf> {
        stdenv::current_dir().context("can't read the current directory")
    }

    /// Expand `~`, `~/rest` and `-`; anything else is returned unchanged.
    pub fn expand(&self, raw: &str) -> Result<PathBuf> {
        Ok(match raw {
            "~" => self.home.clone(),
            "-" => self
                .previous_dir
                .clone()
                .ok_or_else(|| anyhow!("OLDPWD not set"))?,
            _ => match raw.strip_prefix("~/") {
                Some(rest) => self.home.join(rest),
                None => PathBuf::from(raw),
            },
        })
    }

    /// Change the process working directory, remembering where we came from.
    pub fn change_dir(&mut self, raw: &str) -> Result<PathBuf> {
        let target = self.expand(raw)?;
        let canonical = fs::canonicalize(&target)
            .with_context(|| format!("hop: can't resolve {}", target.display()))?;
        let before = self.current_dir()?;
        stdenv::set_current_dir(&canonical)
            .with_context(|| format!("hop: can't chdir to {}", canonical.display()))?;
        self.previous_dir = Some(before);
        Ok(canonical)
    }

    /// Path shown in the prompt: relative to home as `~/...` when inside it.
    pub fn display_path(&self, path: &Path) -> String {
        let home = fs::canonicalize(&self.home).unwrap_or_else(|_| self.home.clone());
        match path.strip_prefix(&home) {
            Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
            Ok(rest) => format!("~/{}", rest.display()),
            Err(_) => path.display().to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Serializes tests that touch the process working directory.
    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn expands_tilde_forms() {
        let env = Environment::new("/home/me");
        assert_eq!(env.expand("~").unwrap(), PathBuf::from("/home/me"));
        assert_eq!(env.expand("~/src").unwrap(), PathBuf::from("/home/me/src"));
        assert_eq!(env.expand("rel/x").unwrap(), PathBuf::from("rel/x"));
        assert!(env.expand("-").is_err());
    }

    #[test]
    fn change_dir_tracks_previous() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();

        let mut env = Environment::new(temp.path());
        let landed = env.change_dir("~").unwrap();
        assert_eq!(landed, canonical_temp);
        assert_eq!(stdenv::current_dir().unwrap(), canonical_temp);
        assert_eq!(env.previous_dir.as_deref(), Some(orig.as_path()));

        let back = env.change_dir("-").unwrap();
        assert_eq!(back, fs::canonicalize(&orig).unwrap());
        assert_eq!(env.previous_dir.as_deref(), Some(canonical_temp.as_path()));

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
    }

    #[test]
    fn change_dir_to_missing_path_leaves_cwd_alone() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::new("/");
        let name = format!("nonexistent_dir_for_hop_test_{}", std::process::id());
        assert!(env.change_dir(&name).is_err());
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert!(env.previous_dir.is_none());
    }

    #[test]
    fn display_path_abbreviates_home() {
        let temp = tempfile::tempdir().unwrap();
        let home = fs::canonicalize(temp.path()).unwrap();
        let env = Environment::new(&home);
        assert_eq!(env.display_path(&home), "~");
        assert_eq!(env.display_path(&home.join("a/b")), "~/a/b");
        assert_eq!(env.display_path(Path::new("/")), "/");
    }
}
