//! `reveal`: directory listing.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use nix::unistd::{Gid, Group, Uid, User};
use std::fs::{self, Metadata};
use std::io::Write;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

const BLUE: &str = "\x1b[34m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, Default)]
pub struct RevealOptions {
    /// Include dot entries.
    pub all: bool,
    pub long: bool,
    /// Colour directories and executables.
    pub color: bool,
}

struct Entry {
    name: String,
    meta: Metadata,
}

pub fn reveal(path: &Path, opts: RevealOptions, out: &mut dyn Write) -> Result<()> {
    let meta = fs::symlink_metadata(path)
        .with_context(|| format!("reveal: {}: no such file or directory", path.display()))?;

    if !meta.is_dir() {
        let entry = Entry {
            name: path.display().to_string(),
            meta,
        };
        return write_entries(&[entry], opts, out);
    }

    let mut entries = Vec::new();
    if opts.all {
        for special in [".", ".."] {
            let meta = fs::symlink_metadata(path.join(special))?;
            entries.push(Entry {
                name: special.to_string(),
                meta,
            });
        }
    }
    for dirent in fs::read_dir(path).with_context(|| format!("reveal: can't open {}", path.display()))? {
        let dirent = dirent?;
        let name = dirent.file_name().to_string_lossy().into_owned();
        if !opts.all && name.starts_with('.') {
            continue;
        }
        let meta = dirent.metadata()?;
        entries.push(Entry { name, meta });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    if opts.long {
        // st_blocks counts 512-byte units; ls reports 1K blocks.
        let total: u64 = entries.iter().map(|e| e.meta.blocks()).sum();
        writeln!(out, "total {}", total / 2)?;
    }
    write_entries(&entries, opts, out)
}

fn write_entries(entries: &[Entry], opts: RevealOptions, out: &mut dyn Write) -> Result<()> {
    for entry in entries {
        let name = colored(entry, opts.color);
        if opts.long {
            writeln!(
                out,
                "{} {:>3} {:<8} {:<8} {:>8} {} {}",
                permissions(&entry.meta),
                entry.meta.nlink(),
                owner(entry.meta.uid()),
                group(entry.meta.gid()),
                entry.meta.len(),
                modified(&entry.meta),
                name
            )?;
        } else {
            writeln!(out, "{name}")?;
        }
    }
    Ok(())
}

fn colored(entry: &Entry, color: bool) -> String {
    if !color {
        return entry.name.clone();
    }
    if entry.meta.is_dir() {
        format!("{BLUE}{}{RESET}", entry.name)
    } else if entry.meta.permissions().mode() & 0o111 != 0 {
        format!("{GREEN}{}{RESET}", entry.name)
    } else {
        entry.name.clone()
    }
}

/// `drwxr-xr-x` style mode string.
pub fn permissions(meta: &Metadata) -> String {
    let kind = if meta.is_dir() {
        'd'
    } else if meta.file_type().is_symlink() {
        'l'
    } else {
        '-'
    };
    let mode = meta.permissions().mode();
    let mut s = String::with_capacity(10);
    s.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}

fn owner(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

fn group(gid: u32) -> String {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}

fn modified(meta: &Metadata) -> String {
    DateTime::from_timestamp(meta.mtime(), 0)
        .map(|t| t.with_timezone(&Local).format("%b %d %H:%M").to_string())
        .unwrap_or_else(|| "?".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(dir: &Path, opts: RevealOptions) -> Vec<String> {
        let mut out = Vec::new();
        reveal(dir, opts, &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn sample_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "bb").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        dir
    }

    #[test]
    fn lists_sorted_without_hidden() {
        let dir = sample_dir();
        assert_eq!(
            listing(dir.path(), RevealOptions::default()),
            vec!["a.txt", "b.txt", "sub"]
        );
    }

    #[test]
    fn all_includes_dot_entries() {
        let dir = sample_dir();
        let opts = RevealOptions {
            all: true,
            ..Default::default()
        };
        assert_eq!(
            listing(dir.path(), opts),
            vec![".", "..", ".hidden", "a.txt", "b.txt", "sub"]
        );
    }

    #[test]
    fn long_format_has_mode_and_size() {
        let dir = sample_dir();
        let opts = RevealOptions {
            long: true,
            ..Default::default()
        };
        let lines = listing(dir.path(), opts);
        assert!(lines[0].starts_with("total "));
        let b = lines.iter().find(|l| l.ends_with(" b.txt")).unwrap();
        assert!(b.starts_with('-'));
        assert!(b.split_whitespace().any(|f| f == "2"));
        let sub = lines.iter().find(|l| l.ends_with(" sub")).unwrap();
        assert!(sub.starts_with('d'));
    }

    #[test]
    fn file_argument_lists_only_that_file() {
        let dir = sample_dir();
        let file = dir.path().join("a.txt");
        let lines = listing(&file, RevealOptions::default());
        assert_eq!(lines, vec![file.display().to_string()]);
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        assert!(reveal(&dir.path().join("missing"), RevealOptions::default(), &mut out).is_err());
    }
}
