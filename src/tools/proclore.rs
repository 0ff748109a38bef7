//! `proclore`: what `/proc` knows about a process.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    pub pid: i32,
    /// State letter, with `+` when the process is in the terminal's foreground group.
    pub status: String,
    pub pgrp: i32,
    /// `VmSize` in kB; kernel threads have none.
    pub vm_size_kb: Option<u64>,
    pub executable: Option<PathBuf>,
}

/// Fields of `/proc/<pid>/stat` we need: state, pgrp and tpgid.
///
/// The command name is parenthesised and may itself contain spaces or
/// parentheses, so parsing starts after the last `)`.
pub fn parse_stat(stat: &str) -> Option<(char, i32, i32)> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let _ppid = fields.next()?;
    let pgrp = fields.next()?.parse().ok()?;
    let _session = fields.next()?;
    let _tty = fields.next()?;
    let tpgid = fields.next()?.parse().ok()?;
    Some((state, pgrp, tpgid))
}

pub fn parse_vm_size(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|l| l.strip_prefix("VmSize:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

pub fn inspect(pid: i32) -> Result<ProcInfo> {
    let base = PathBuf::from(format!("/proc/{pid}"));
    let stat = fs::read_to_string(base.join("stat"))
        .with_context(|| format!("proclore: no such process {pid}"))?;
    let (state, pgrp, tpgid) =
        parse_stat(&stat).ok_or_else(|| anyhow!("proclore: malformed stat for {pid}"))?;
    let status = fs::read_to_string(base.join("status")).unwrap_or_default();

    let mut status_str = state.to_string();
    if pgrp == tpgid {
        status_str.push('+');
    }

    Ok(ProcInfo {
        pid,
        status: status_str,
        pgrp,
        vm_size_kb: parse_vm_size(&status),
        executable: fs::read_link(base.join("exe")).ok(),
    })
}

/// Print in the `key : value` layout; `display_path` shortens the executable path.
pub fn print(
    info: &ProcInfo,
    display_path: impl Fn(&Path) -> String,
    out: &mut dyn Write,
) -> Result<()> {
    writeln!(out, "pid : {}", info.pid)?;
    writeln!(out, "process status : {}", info.status)?;
    writeln!(out, "Process Group : {}", info.pgrp)?;
    match info.vm_size_kb {
        Some(kb) => writeln!(out, "Virtual memory : {kb}")?,
        None => writeln!(out, "Virtual memory : 0")?,
    }
    match &info.executable {
        Some(path) => writeln!(out, "executable path : {}", display_path(path))?,
        None => writeln!(out, "executable path : (unavailable)")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_parsing_survives_odd_command_names() {
        let stat = "4242 (a (weird) name) S 1 4242 4242 34816 4242 4194560 0";
        assert_eq!(parse_stat(stat), Some(('S', 4242, 4242)));
        assert_eq!(parse_stat("garbage"), None);
    }

    #[test]
    fn vm_size_comes_from_status() {
        let status = "Name:\tbash\nState:\tS (sleeping)\nVmSize:\t   10244 kB\nVmRSS:\t 512 kB\n";
        assert_eq!(parse_vm_size(status), Some(10244));
        assert_eq!(parse_vm_size("Name:\tkthreadd\n"), None);
    }

    #[test]
    fn inspects_this_process() {
        let me = std::process::id() as i32;
        let info = inspect(me).unwrap();
        assert_eq!(info.pid, me);
        assert!(info.vm_size_kb.unwrap_or(0) > 0);
        assert!(info.executable.is_some());

        let mut out = Vec::new();
        print(&info, |p| p.display().to_string(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&format!("pid : {me}\n")));
        assert!(text.contains("Process Group : "));
    }
}
