//! `seek`: recursive name search.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default)]
pub struct SeekOptions {
    pub dirs_only: bool,
    pub files_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekMatch {
    /// Path relative to the search root.
    pub relative: PathBuf,
    pub is_dir: bool,
}

impl SeekMatch {
    /// `./sub/name` form used for output.
    pub fn display(&self) -> String {
        format!("./{}", self.relative.display())
    }
}

/// Every entry under `root` whose name contains `term`, in traversal order
/// (sorted by name at each level).
pub fn find_matches(root: &Path, term: &str, opts: SeekOptions) -> Vec<SeekMatch> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().contains(term))
        .filter_map(|entry| {
            let is_dir = entry.file_type().is_dir();
            if (opts.dirs_only && !is_dir) || (opts.files_only && is_dir) {
                return None;
            }
            let relative = entry.path().strip_prefix(root).ok()?.to_path_buf();
            Some(SeekMatch { relative, is_dir })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/newsrc")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "").unwrap();
        fs::write(dir.path().join("src/newsrc/newmain.rs"), "").unwrap();
        fs::write(dir.path().join("README"), "").unwrap();
        dir
    }

    fn shown(matches: &[SeekMatch]) -> Vec<String> {
        matches.iter().map(SeekMatch::display).collect()
    }

    #[test]
    fn finds_files_and_dirs_by_substring() {
        let dir = tree();
        let found = find_matches(dir.path(), "main", SeekOptions::default());
        assert_eq!(shown(&found), vec!["./src/main.rs", "./src/newsrc/newmain.rs"]);

        let found = find_matches(dir.path(), "src", SeekOptions::default());
        assert_eq!(shown(&found), vec!["./src", "./src/newsrc"]);
    }

    #[test]
    fn filters_by_kind() {
        let dir = tree();
        let dirs = find_matches(
            dir.path(),
            "new",
            SeekOptions {
                dirs_only: true,
                ..Default::default()
            },
        );
        assert_eq!(shown(&dirs), vec!["./src/newsrc"]);

        let files = find_matches(
            dir.path(),
            "new",
            SeekOptions {
                files_only: true,
                ..Default::default()
            },
        );
        assert_eq!(shown(&files), vec!["./src/newsrc/newmain.rs"]);
        assert!(!files[0].is_dir);
    }

    #[test]
    fn no_match_is_empty() {
        let dir = tree();
        assert!(find_matches(dir.path(), "zzz", SeekOptions::default()).is_empty());
    }
}
