//! `neonate`: print the newest pid on an interval until `x` is pressed.

use anyhow::{Context, Result, anyhow};
use nix::sys::termios::{LocalFlags, SetArg, SpecialCharacterIndices, Termios, tcgetattr, tcsetattr};
use std::fs;
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

const LAST_PID: &str = "/proc/sys/kernel/ns_last_pid";
const TICK: Duration = Duration::from_millis(50);

pub fn last_pid() -> Result<i32> {
    let raw = fs::read_to_string(LAST_PID).with_context(|| format!("can't read {LAST_PID}"))?;
    raw.trim()
        .parse()
        .with_context(|| format!("unexpected contents in {LAST_PID}: {raw:?}"))
}

/// Non-canonical, no-echo terminal with reads that time out after 100ms.
/// The previous settings come back on drop.
struct RawTerminal {
    saved: Termios,
}

impl RawTerminal {
    fn enter() -> Result<Self> {
        let stdin = io::stdin();
        let saved = tcgetattr(&stdin).map_err(|e| anyhow!("neonate needs a terminal: {e}"))?;
        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 1;
        tcsetattr(&stdin, SetArg::TCSAFLUSH, &raw).context("can't switch terminal mode")?;
        Ok(Self { saved })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(&io::stdin(), SetArg::TCSAFLUSH, &self.saved) {
            warn!(error = %e, "can't restore terminal mode");
        }
    }
}

pub fn neonate(interval: Duration, out: &mut dyn Write) -> Result<()> {
    let _terminal = RawTerminal::enter()?;
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            let fd = io::stdin().as_raw_fd();
            let mut byte = [0u8; 1];
            while !stop.load(Ordering::Relaxed) {
                match nix::unistd::read(fd, &mut byte) {
                    Ok(1) if byte[0] == b'x' => stop.store(true, Ordering::Relaxed),
                    Ok(_) | Err(nix::errno::Errno::EINTR) => {}
                    Err(e) => {
                        warn!(error = %e, "stdin read failed; stopping");
                        stop.store(true, Ordering::Relaxed);
                    }
                }
            }
        });

        let result = (|| -> Result<()> {
            while !stop.load(Ordering::Relaxed) {
                writeln!(out, "{}", last_pid()?)?;
                out.flush()?;
                let deadline = Instant::now() + interval;
                while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
                    thread::sleep(TICK);
                }
            }
            Ok(())
        })();
        stop.store(true, Ordering::Relaxed);
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_pid_is_a_positive_number() {
        assert!(last_pid().unwrap() > 0);
    }
}
