#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use tempfile::TempDir;

/// Output of a shell fed a whole script on stdin.
pub struct Transcript {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

fn spawn(home: &TempDir) -> Child {
    Command::new(env!("CARGO_BIN_EXE_jobsh"))
        .arg("--home")
        .arg(home.path())
        .current_dir(home.path())
        .env("JOBSH_LOG", "error")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start jobsh")
}

/// Run `script` to completion in a fresh home directory.
pub fn run_script(script: &str) -> Transcript {
    let home = tempfile::tempdir().unwrap();
    run_script_in(&home, script)
}

pub fn run_script_in(home: &TempDir, script: &str) -> Transcript {
    let mut child = spawn(home);
    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    Transcript {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
    }
}

/// A running shell driven one line at a time.
pub struct Session {
    _home: TempDir,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Session {
    pub fn start() -> Self {
        let home = tempfile::tempdir().unwrap();
        let mut child = spawn(&home);
        let stdin = child.stdin.take();
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self {
            _home: home,
            child,
            stdin,
            stdout,
        }
    }

    /// Start the shell and wait until it is reading commands, so its signal
    /// handlers are installed.
    pub fn ready() -> Self {
        let mut sh = Self::start();
        sh.send("echo ready");
        sh.expect_line("ready");
        sh
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    /// Deliver `sig` to the shell process itself.
    pub fn signal(&self, sig: Signal) {
        kill(self.pid(), sig).unwrap();
    }

    /// Give a just-launched foreground command time to get going.
    pub fn settle(&self) {
        thread::sleep(Duration::from_millis(300));
    }

    pub fn send(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().unwrap();
        writeln!(stdin, "{line}").unwrap();
        stdin.flush().unwrap();
    }

    /// Read stdout until a line containing `needle` shows up.
    pub fn expect_line(&mut self, needle: &str) -> String {
        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line).unwrap();
            assert!(n > 0, "stdout closed before {needle:?} appeared");
            if line.contains(needle) {
                return line.trim_end().to_string();
            }
        }
    }

    /// Close stdin and collect whatever is left.
    pub fn finish(mut self) -> Transcript {
        drop(self.stdin.take());
        let mut stdout = String::new();
        self.stdout.read_to_string(&mut stdout).unwrap();
        let mut stderr = String::new();
        if let Some(mut err) = self.child.stderr.take() {
            err.read_to_string(&mut stderr).unwrap();
        }
        let status = self.child.wait().unwrap();
        Transcript {
            stdout,
            stderr,
            success: status.success(),
        }
    }
}

/// The number at the end of a line such as `Started background process PID: 42`.
pub fn trailing_pid(line: &str) -> i32 {
    line.rsplit(' ')
        .next()
        .and_then(|word| word.trim().parse().ok())
        .unwrap_or_else(|| panic!("no pid in {line:?}"))
}
