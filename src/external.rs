//! Launching programs that are not builtins.

use nix::sys::wait::WaitStatus;
use nix::unistd::{ForkResult, Pid, execvp, fork, setpgid};
use std::ffi::CString;
use std::io::{self, Write};
use tracing::{debug, trace};

use crate::errors::{Result, ShellError};
use crate::interpreter::{Shell, notify};
use crate::jobs::JobState;

/// Argument vector ready for `execvp`.
fn to_c_args(argv: &[String]) -> Result<Vec<CString>> {
    argv.iter()
        .map(|a| {
            CString::new(a.as_str())
                .map_err(|_| ShellError::usage(format!("argument contains a NUL byte: {a:?}")))
        })
        .collect()
}

/// Exit code convention for a child that died from a signal.
pub fn exit_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
        _ => None,
    }
}

impl Shell {
    /// Fork and exec `argv`.
    ///
    /// A background child gets its own process group and a job-table entry; a
    /// foreground child is waited on (see [`Shell::wait_foreground`]).
    /// `command` is the unit text, used only in the exec-failure message.
    pub(crate) fn launch(&mut self, command: &str, argv: &[String], background: bool) -> Result<()> {
        let Some(name) = argv.first() else {
            return Ok(());
        };
        let args = to_c_args(argv)?;

        // Anything still buffered would be written twice after the fork.
        io::stdout().flush()?;

        // SAFETY: the child only calls async-signal-safe functions before
        // execvp, apart from the error path which exits right away.
        match unsafe { fork() } {
            Err(e) => Err(ShellError::sys("fork failed", e)),
            Ok(ForkResult::Child) => {
                if background {
                    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
                }
                let err = match execvp(&args[0], &args) {
                    Err(e) => e,
                    Ok(never) => match never {},
                };
                let mut stderr = io::stderr();
                let _ = writeln!(stderr, "ERROR : '{command}' is not a valid command");
                trace!(error = %err, "execvp failed");
                std::process::exit(1)
            }
            Ok(ForkResult::Parent { child }) => {
                debug!(pid = %child, name, background, "launched");
                if background {
                    // Whichever of parent and child runs first wins; the
                    // loser gets EACCES or ESRCH, which is fine.
                    let _ = setpgid(child, child);
                    self.jobs.insert(child, name.as_str(), JobState::Running);
                    notify(format_args!("Started background process PID: {child}"));
                    Ok(())
                } else {
                    self.wait_foreground(child, name)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    #[test]
    fn c_args_reject_interior_nul() {
        let ok = to_c_args(&["ls".to_string(), "-l".to_string()]).unwrap();
        assert_eq!(ok[1].to_str().unwrap(), "-l");
        assert!(matches!(
            to_c_args(&["a\0b".to_string()]),
            Err(ShellError::Usage(_))
        ));
    }

    #[test]
    fn exit_codes_follow_shell_convention() {
        let pid = Pid::from_raw(1);
        assert_eq!(exit_code(WaitStatus::Exited(pid, 3)), Some(3));
        assert_eq!(
            exit_code(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Some(137)
        );
        assert_eq!(exit_code(WaitStatus::StillAlive), None);
    }
}
