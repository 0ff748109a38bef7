//! Signal handling and job control.
//!
//! Handlers do exactly one thing: set a bit in [`PENDING`]. Every reaction to a
//! signal (reaping, forwarding, moving a process into the job table) happens in
//! [`Shell::service_signals`] on the main control flow, which is the only code
//! that touches the job table or the foreground slot.
//!
//! SIGINT, SIGTSTP and SIGQUIT are installed without `SA_RESTART` so that a
//! blocking foreground `waitpid` returns `EINTR` and can service them at once.

use nix::errno::Errno;
use nix::libc::c_int;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, kill, sigaction};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::errors::{Result, ShellError};
use crate::external::exit_code;
use crate::interpreter::{Shell, notify, report};
use crate::jobs::{Foreground, JobState};

static PENDING: AtomicU32 = AtomicU32::new(0);

const HANDLED: [Signal; 4] = [
    Signal::SIGCHLD,
    Signal::SIGINT,
    Signal::SIGTSTP,
    Signal::SIGQUIT,
];

extern "C" fn record_signal(signo: c_int) {
    if (0..32).contains(&signo) {
        PENDING.fetch_or(1 << signo, Ordering::SeqCst);
    }
}

fn bit(sig: Signal) -> u32 {
    1 << (sig as i32)
}

/// Signals delivered since the last [`take_pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pending(u32);

impl Pending {
    pub fn contains(self, sig: Signal) -> bool {
        self.0 & bit(sig) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

pub fn take_pending() -> Pending {
    Pending(PENDING.swap(0, Ordering::SeqCst))
}

/// Forget a pending signal that has already been dealt with some other way.
pub fn discard(sig: Signal) {
    PENDING.fetch_and(!bit(sig), Ordering::SeqCst);
}

/// Install the recording handler for every signal the shell reacts to.
pub fn install() -> Result<()> {
    for sig in HANDLED {
        let flags = if sig == Signal::SIGCHLD {
            SaFlags::SA_RESTART
        } else {
            SaFlags::empty()
        };
        let action = SigAction::new(SigHandler::Handler(record_signal), flags, SigSet::empty());
        // SAFETY: the handler only performs an atomic fetch_or.
        unsafe { sigaction(sig, &action) }
            .map_err(|e| ShellError::sys("can't install signal handler", e))?;
    }
    debug!("signal handlers installed");
    Ok(())
}

/// Put default dispositions back; used by forked children that keep running
/// Rust code instead of exec'ing.
pub fn restore_defaults() {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for sig in HANDLED {
        // SAFETY: installing SIG_DFL has no handler-side requirements.
        if let Err(e) = unsafe { sigaction(sig, &action) } {
            warn!(signal = %sig, error = %e, "can't restore default disposition");
        }
    }
}

/// Check that `pid` exists and may be signalled.
fn probe(pid: Pid) -> Result<()> {
    match kill(pid, None) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(ShellError::NoSuchProcess),
        Err(e) => Err(ShellError::sys("Error sending signal", e)),
    }
}

impl Shell {
    /// Drain pending signals and react to them.
    pub fn service_signals(&mut self) {
        let pending = take_pending();
        if pending.is_empty() {
            return;
        }
        trace!(?pending, "servicing signals");

        if pending.contains(Signal::SIGQUIT) {
            self.shutdown();
        }
        if pending.contains(Signal::SIGINT) {
            self.interrupt_foreground();
        }
        if pending.contains(Signal::SIGTSTP) {
            self.stop_foreground();
        }
        if pending.contains(Signal::SIGCHLD) {
            self.reap_jobs();
        }
    }

    fn interrupt_foreground(&mut self) {
        let Some(fg) = &self.foreground else {
            report("No foreground process to interrupt");
            return;
        };
        match kill(fg.pid, Signal::SIGINT) {
            Ok(()) => notify(format_args!(
                "Sent SIGINT to foreground process PID: {}",
                fg.pid
            )),
            Err(e) => report(format_args!("Failed to send SIGINT to {}: {e}", fg.pid)),
        }
    }

    fn stop_foreground(&mut self) {
        let Some(fg) = self.foreground.take() else {
            report("No foreground process to stop");
            return;
        };
        match kill(fg.pid, Signal::SIGTSTP) {
            Ok(()) => {
                notify(format_args!("Stopped foreground process PID: {}", fg.pid));
                self.jobs.insert(fg.pid, fg.name, JobState::Stopped);
            }
            Err(e) => {
                report(format_args!("Failed to send SIGTSTP to {}: {e}", fg.pid));
                self.foreground = Some(fg);
            }
        }
    }

    /// Collect status changes of job-table processes without blocking.
    ///
    /// Only pids in the table are waited on, so foreground and pipeline
    /// children are left for their own blocking waits.
    pub(crate) fn reap_jobs(&mut self) {
        let fg_pid = self.foreground.as_ref().map(|fg| fg.pid);
        let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;

        for pid in self.jobs.pids() {
            if Some(pid) == fg_pid {
                continue;
            }
            match waitpid(pid, Some(flags)) {
                Ok(WaitStatus::StillAlive) => {}
                Ok(WaitStatus::Exited(_, code)) => {
                    let name = self.jobs.remove(pid).map(|j| j.name);
                    notify(format_args!(
                        "Background process {pid} ({}) ended normally with exit status {code}",
                        name.as_deref().unwrap_or("Unknown")
                    ));
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    let name = self.jobs.remove(pid).map(|j| j.name);
                    notify(format_args!(
                        "Background process {pid} ({}) ended abnormally with signal {}",
                        name.as_deref().unwrap_or("Unknown"),
                        sig as i32
                    ));
                }
                Ok(WaitStatus::Stopped(..)) => {
                    debug!(%pid, "job stopped");
                    self.jobs.set_state(pid, JobState::Stopped);
                }
                Ok(WaitStatus::Continued(_)) => {
                    debug!(%pid, "job continued");
                    self.jobs.set_state(pid, JobState::Running);
                }
                Ok(other) => trace!(%pid, ?other, "ignoring wait status"),
                Err(Errno::ECHILD) => {
                    debug!(%pid, "job is not our child anymore; dropping it");
                    self.jobs.remove(pid);
                }
                Err(e) => warn!(%pid, error = %e, "waitpid failed while reaping"),
            }
        }
    }

    /// Block until `pid` exits or stops, servicing signals meanwhile.
    ///
    /// A stopped process ends up in the job table as `Stopped`; an exited one
    /// is removed from it. The foreground slot is clear when this returns.
    pub(crate) fn wait_foreground(&mut self, pid: Pid, name: &str) -> Result<()> {
        self.foreground = Some(Foreground::new(pid, name));
        self.last_command = name.to_string();
        trace!(%pid, name, "waiting for foreground process");

        let outcome = loop {
            match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(status) => break Ok(Some(status)),
                Err(Errno::EINTR) => {
                    self.service_signals();
                    if self.foreground.as_ref().map(|fg| fg.pid) != Some(pid) {
                        // Demoted to the job table by SIGTSTP.
                        break Ok(None);
                    }
                }
                Err(e) => break Err(e),
            }
        };
        self.foreground = None;
        discard(Signal::SIGINT);
        discard(Signal::SIGTSTP);

        match outcome {
            Ok(Some(status)) => {
                self.last_elapsed = Some(self.dispatched_at.elapsed());
                match status {
                    WaitStatus::Stopped(..) => {
                        if !self.jobs.set_state(pid, JobState::Stopped) {
                            self.jobs.insert(pid, name, JobState::Stopped);
                        }
                        notify(format_args!("Stopped foreground process PID: {pid}"));
                    }
                    WaitStatus::Exited(..) | WaitStatus::Signaled(..) => {
                        debug!(%pid, code = ?exit_code(status), "foreground process finished");
                        self.jobs.remove(pid);
                    }
                    other => trace!(%pid, ?other, "unexpected wait status"),
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(ShellError::sys("waitpid failed", e)),
        }
    }

    /// `bg`: resume a stopped job without waiting for it.
    pub(crate) fn resume_in_background(&mut self, pid: Pid) -> Result<()> {
        probe(pid)?;
        kill(pid, Signal::SIGCONT).map_err(|e| ShellError::sys("Error sending signal", e))?;
        self.jobs.set_state(pid, JobState::Running);
        debug!(%pid, "continued in background");
        Ok(())
    }

    /// `fg`: resume a job and wait for it as the foreground process.
    pub(crate) fn bring_to_foreground(&mut self, pid: Pid) -> Result<()> {
        probe(pid)?;
        let name = self.jobs.name(pid).unwrap_or("Unknown").to_string();
        kill(pid, Signal::SIGCONT).map_err(|e| ShellError::sys("Error sending signal", e))?;
        self.jobs.set_state(pid, JobState::Running);
        self.dispatched_at = Instant::now();
        self.wait_foreground(pid, &name)
    }

    /// `ping`: deliver signal `number % 32`. Returns the number actually sent.
    ///
    /// The remainder keeps the sign of `number`, so a negative number is an
    /// invalid signal rather than some other real one.
    pub(crate) fn send_signal(&mut self, pid: Pid, number: i32) -> Result<i32> {
        let number = number % 32;
        if number < 0 {
            return Err(ShellError::InvalidSignal);
        }
        probe(pid)?;
        if number != 0 {
            let sig = Signal::try_from(number).map_err(|_| ShellError::InvalidSignal)?;
            kill(pid, sig).map_err(|e| ShellError::sys("Error sending signal", e))?;
        }
        debug!(%pid, number, "signal sent");
        Ok(number)
    }

    /// SIGQUIT and end of input: kill every job, and the foreground process
    /// if SIGQUIT arrived during a wait, then exit with status 0.
    pub fn shutdown(&mut self) -> ! {
        let mut victims = self.jobs.pids();
        if let Some(fg) = self.foreground.take() {
            if !self.jobs.contains(fg.pid) {
                victims.push(fg.pid);
            }
        }
        for pid in victims {
            match kill(pid, Signal::SIGKILL) {
                Ok(()) => {
                    notify(format_args!("Sent SIGKILL to process with pid {pid}"));
                    if let Err(e) = waitpid(pid, None) {
                        trace!(%pid, error = %e, "nothing to reap after SIGKILL");
                    }
                }
                Err(e) => report(format_args!("Failed to kill process {pid}: {e}")),
            }
        }
        self.jobs.clear();
        if let Err(e) = io::stdout().flush() {
            warn!(error = %e, "can't flush stdout on exit");
        }
        std::process::exit(0)
    }
}
