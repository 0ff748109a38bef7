//! Registry of processes the shell owns outside of the current foreground wait.

use nix::unistd::Pid;
use std::fmt;
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => f.write_str("Running"),
            JobState::Stopped => f.write_str("Stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    pub name: String,
    pub state: JobState,
}

/// The single process the shell is currently blocked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Foreground {
    pub pid: Pid,
    pub name: String,
}

impl Foreground {
    pub fn new(pid: Pid, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}

/// Insertion-ordered job list with at most one entry per pid.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job, replacing any existing entry for the same pid in place.
    pub fn insert(&mut self, pid: Pid, name: impl Into<String>, state: JobState) {
        let name = name.into();
        match self.jobs.iter_mut().find(|j| j.pid == pid) {
            Some(job) => {
                job.name = name;
                job.state = state;
            }
            None => self.jobs.push(Job { pid, name, state }),
        }
    }

    /// Take the job out of the table, keeping the order of the others.
    ///
    /// Returns `None` when the pid is not tracked, e.g. after the reaper
    /// already collected it.
    pub fn remove(&mut self, pid: Pid) -> Option<Job> {
        let idx = self.jobs.iter().position(|j| j.pid == pid)?;
        Some(self.jobs.remove(idx))
    }

    /// Display name of the job; callers show `Unknown` for `None`.
    pub fn name(&self, pid: Pid) -> Option<&str> {
        self.get(pid).map(|j| j.name.as_str())
    }

    pub fn get(&self, pid: Pid) -> Option<&Job> {
        self.jobs.iter().find(|j| j.pid == pid)
    }

    /// Whether the pid is currently tracked as a job.
    pub fn contains(&self, pid: Pid) -> bool {
        self.get(pid).is_some()
    }

    /// Returns false when the pid is not tracked.
    pub fn set_state(&mut self, pid: Pid, state: JobState) -> bool {
        match self.jobs.iter_mut().find(|j| j.pid == pid) {
            Some(job) => {
                job.state = state;
                true
            }
            None => false,
        }
    }

    /// Stable sort by display name.
    pub fn sort_by_name(&mut self) {
        self.jobs.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Jobs in table order: insertion order, or name order after
    /// [`JobTable::sort_by_name`].
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Snapshot of the tracked pids, in table order.
    pub fn pids(&self) -> Vec<Pid> {
        self.jobs.iter().map(|j| j.pid).collect()
    }

    /// Forget every job without signalling it. Used by forked pipeline
    /// stages, which must not act on the parent's jobs.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Run state as the kernel reports it in `/proc/<pid>/status`.
pub fn proc_state(pid: Pid) -> Option<JobState> {
    let status = fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let letter = status
        .lines()
        .find_map(|l| l.strip_prefix("State:"))?
        .trim()
        .chars()
        .next()?;
    Some(match letter {
        'T' | 't' => JobState::Stopped,
        _ => JobState::Running,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: i32) -> Pid {
        Pid::from_raw(n)
    }

    #[test]
    fn insert_keeps_insertion_order() {
        let mut table = JobTable::new();
        table.insert(pid(30), "sleep", JobState::Running);
        table.insert(pid(10), "vim", JobState::Stopped);
        table.insert(pid(20), "cat", JobState::Running);
        assert_eq!(table.pids(), vec![pid(30), pid(10), pid(20)]);
    }

    #[test]
    fn at_most_one_entry_per_pid() {
        let mut table = JobTable::new();
        table.insert(pid(7), "sleep", JobState::Running);
        table.insert(pid(7), "sleep", JobState::Stopped);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(pid(7)).unwrap().state, JobState::Stopped);
    }

    #[test]
    fn remove_returns_the_job_once() {
        let mut table = JobTable::new();
        table.insert(pid(5), "top", JobState::Running);
        assert_eq!(table.remove(pid(5)).map(|j| j.name), Some("top".to_string()));
        assert!(table.remove(pid(5)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn name_lookup_misses_for_unknown_pid() {
        let mut table = JobTable::new();
        table.insert(pid(3), "emacs", JobState::Running);
        assert_eq!(table.name(pid(3)), Some("emacs"));
        assert_eq!(table.name(pid(4)), None);
    }

    #[test]
    fn sort_by_name_is_stable() {
        let mut table = JobTable::new();
        table.insert(pid(1), "zsh", JobState::Running);
        table.insert(pid(2), "b", JobState::Running);
        table.insert(pid(3), "a", JobState::Stopped);
        table.insert(pid(4), "b", JobState::Stopped);
        table.sort_by_name();
        let order: Vec<_> = table.iter().map(|j| j.pid.as_raw()).collect();
        assert_eq!(order, vec![3, 2, 4, 1]);
    }

    #[test]
    fn set_state_reports_untracked_pids() {
        let mut table = JobTable::new();
        table.insert(pid(9), "sleep", JobState::Running);
        assert!(table.set_state(pid(9), JobState::Stopped));
        assert!(!table.set_state(pid(10), JobState::Stopped));
        assert_eq!(table.get(pid(9)).unwrap().state, JobState::Stopped);
    }

    #[test]
    fn proc_state_sees_this_process_running() {
        let me = nix::unistd::getpid();
        assert_eq!(proc_state(me), Some(JobState::Running));
        assert_eq!(proc_state(pid(i32::MAX)), None);
    }
}
