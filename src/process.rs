// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{CompError, Result};

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Number of trailing stderr lines kept in an invocation error.
const STDERR_TAIL_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stream {
    Stdout,
    Stderr,
}

type StreamResult = (Stream, io::Result<Vec<u8>>);

fn spawn_reader<R: Read + Send + 'static>(
    which: Stream,
    stream: Option<R>,
    tx: Sender<StreamResult>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match stream {
            Some(mut s) => s.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        // The receiver is gone once the caller has given up on this run.
        let _ = tx.send((which, result));
    });
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

/// Time left until `deadline`, or `None` when there is no deadline.
fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

/// Kill the child and everything it started.
///
/// The child leads its own process group, so signalling the group also
/// reaches descendants that outlive it.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let killed = Command::new("kill")
            .args(["-s", "KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = killed {
            warn!("could not signal process group {}: {}", group, e);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Wait for the child to exit, polling until `deadline`.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Collect both output streams, giving up at `deadline`.
///
/// Returns `None` on timeout.
fn collect_streams(
    rx: &Receiver<StreamResult>,
    deadline: Option<Instant>,
) -> Option<(io::Result<Vec<u8>>, io::Result<Vec<u8>>)> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let received = match remaining(deadline) {
            Some(left) => rx.recv_timeout(left),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((Stream::Stdout, r)) => stdout = Some(r),
            Ok((Stream::Stderr, r)) => stderr = Some(r),
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let lost = || -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::Other, "reader thread exited early"))
    };
    Some((stdout.unwrap_or_else(lost), stderr.unwrap_or_else(lost)))
}

/// Run `program` with an explicit argument vector in `workdir` and return its
/// standard output.
///
/// No shell is involved. The child leads a new process group; standard
/// output and error are drained on helper threads. The whole invocation,
/// including draining pipes held open by descendants, is bounded by
/// `timeout`. When it expires the process group is killed and
/// [`CompError::Timeout`] is returned. A timeout too large to represent as a
/// deadline means no deadline.
///
/// # Errors
/// [`CompError::Invocation`] if the program cannot be launched, exits with a
/// non-zero status (the detail carries the status and the tail of its
/// stderr), its output cannot be read or its standard output is not UTF-8.
/// [`CompError::Timeout`] if it does not finish in time.
pub fn run_process(
    solver: &str,
    program: &str,
    args: &[String],
    workdir: &Path,
    timeout: Duration,
) -> Result<String> {
    debug!(
        "{}: running {} {} (cwd: {}, timeout: {:?})",
        solver,
        program,
        args.join(" "),
        workdir.display(),
        timeout
    );

    let invocation = |detail: String| CompError::Invocation {
        solver: solver.to_string(),
        detail,
    };
    let timed_out = || {
        warn!("{}: {} did not finish within {:?}, killing it", solver, program, timeout);
        CompError::Timeout {
            solver: solver.to_string(),
            timeout,
        }
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let deadline = Instant::now().checked_add(timeout);
    let mut child = command
        .spawn()
        .map_err(|e| invocation(format!("could not launch '{}': {}", program, e)))?;

    let (tx, rx) = mpsc::channel();
    spawn_reader(Stream::Stdout, child.stdout.take(), tx.clone());
    spawn_reader(Stream::Stderr, child.stderr.take(), tx);

    let status = match wait_until(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => {
            kill_tree(&mut child);
            return Err(timed_out());
        }
        Err(e) => {
            kill_tree(&mut child);
            return Err(invocation(format!("waiting for '{}' failed: {}", program, e)));
        }
    };

    // Descendants may still hold the pipes after the child has exited.
    let Some((stdout, stderr)) = collect_streams(&rx, deadline) else {
        kill_tree(&mut child);
        return Err(timed_out());
    };
    let stdout =
        stdout.map_err(|e| invocation(format!("reading stdout of '{}' failed: {}", program, e)))?;
    let stderr =
        stderr.map_err(|e| invocation(format!("reading stderr of '{}' failed: {}", program, e)))?;
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    if !status.success() {
        return Err(invocation(format!(
            "'{}' exited with {}: {}",
            program,
            status,
            stderr_tail(&stderr)
        )));
    }
    if !stderr.trim().is_empty() {
        debug!("{}: {} stderr: {}", solver, program, stderr_tail(&stderr));
    }

    String::from_utf8(stdout)
        .map_err(|e| invocation(format!("output of '{}' is not valid UTF-8: {}", program, e)))
}
