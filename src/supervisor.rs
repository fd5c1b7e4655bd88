//! Spawns a command, drains stdout/stderr under a byte cap, samples RSS at
//! ~1 kHz in a sibling thread, enforces the wall-clock deadline, and reaps
//! the child into a [`SupervisorResult`]. Concurrency is realized as OS
//! threads sharing a single mutex-protected [`RunState`]: a stdin writer,
//! stdout/stderr drainers, and a combined RSS sampler and deadline watcher,
//! with the calling thread acting as the reaper.

use std::io::{Read, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::limits::Limits;

const RSS_POLL_INTERVAL: Duration = Duration::from_millis(1);
const TIME_LIMIT_GRACE_SECS: f64 = 0.5;
const RUN_OUTPUT_CAP_BYTES: usize = 16 * 1024 * 1024;
const COMPILE_OUTPUT_CAP_BYTES: usize = 64 * 1024 * 1024;

/// Why the supervisor killed the child's process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    TimeLimitExceeded,
    MemoryLimitExceeded,
    Cancelled,
}

/// One supervised run's input.
pub struct RunRequest<'a> {
    pub cmd: &'a [String],
    pub stdin: &'a [u8],
    pub time_limit_secs: u32,
    pub memory_limit_mb: u32,
    pub is_compilation: bool,
    pub workdir: &'a Path,
    pub env_overrides: &'a [(String, String)],
    /// Set by the caller to request cancellation mid-run. The executor
    /// doesn't expose a user-visible cancel today, but the supervisor is
    /// written as if cancellation can arrive at any suspension point.
    pub cancel: Arc<AtomicBool>,
}

/// The output of one supervised process.
#[derive(Debug, Clone)]
pub struct SupervisorResult {
    pub stdout: String,
    pub stderr: String,
    pub elapsed_secs: f64,
    /// Nonnegative exit code, or negative signal number.
    pub exit_status: i32,
    pub peak_rss_mib: f64,
    pub output_exceeded: bool,
    pub time_exceeded: bool,
    pub memory_exceeded: bool,
    pub killed_by_supervisor: bool,
    pub kill_reason: Option<KillReason>,
}

#[derive(Default)]
struct RunState {
    peak_rss_mib: f64,
    killed_by_supervisor: Option<KillReason>,
}

/// Run `req` to completion and return the structured result. Never returns
/// `Err` for in-band execution failures (spawn failure becomes a
/// `SupervisorResult` with `exit_status = -1`); the only hard failure is an
/// unrecoverable bug in this function itself, which isn't expected to occur.
pub fn run(req: &RunRequest) -> SupervisorResult {
    let limits = if req.is_compilation {
        Limits::for_compilation(req.memory_limit_mb)
    } else {
        Limits::for_run(req.time_limit_secs, req.memory_limit_mb)
    };

    // A self-pipe carrying Limits::install's failure bitmask out of the
    // forked child, so the parent can log it with `tracing` — the child
    // itself must not touch the subscriber's lock between fork and exec.
    let mut limits_pipe = [-1i32; 2];
    let have_limits_pipe = unsafe { libc::pipe2(limits_pipe.as_mut_ptr(), libc::O_CLOEXEC) } == 0;
    let limits_write_fd = limits_pipe[1];

    let mut command = Command::new(&req.cmd[0]);
    command
        .args(&req.cmd[1..])
        .current_dir(req.workdir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    for (k, v) in req.env_overrides {
        command.env(k, v);
    }
    // SAFETY: the closure runs in the forked child between fork and exec;
    // it only calls rlimit syscalls and a single `write(2)` of one byte to
    // an already-open fd, all async-signal-safe.
    unsafe {
        command.pre_exec(move || {
            let failed = limits.install();
            libc::write(limits_write_fd, [failed].as_ptr().cast(), 1);
            Ok(())
        });
    }

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            if have_limits_pipe {
                unsafe {
                    libc::close(limits_pipe[0]);
                    libc::close(limits_pipe[1]);
                }
            }
            tracing::warn!(error = %e, cmd = ?req.cmd, "spawn failed");
            return SupervisorResult {
                stdout: String::new(),
                stderr: format!("Process start failed: {e}"),
                elapsed_secs: 0.0,
                exit_status: -1,
                peak_rss_mib: 0.0,
                output_exceeded: false,
                time_exceeded: false,
                memory_exceeded: false,
                killed_by_supervisor: false,
                kill_reason: None,
            };
        }
    };

    if have_limits_pipe {
        // Close the parent's copy of the write end so the read below
        // observes EOF if the child never wrote (it always does, just
        // before exec, but this keeps the read from blocking forever).
        unsafe { libc::close(limits_pipe[1]) };
        let mut status = [0u8; 1];
        let n = unsafe { libc::read(limits_pipe[0], status.as_mut_ptr().cast(), 1) };
        unsafe { libc::close(limits_pipe[0]) };
        if n == 1 {
            crate::limits::log_install_failures(status[0]);
        }
    }

    let pid = child.id();
    let start = Instant::now();
    let cap = if req.is_compilation {
        COMPILE_OUTPUT_CAP_BYTES
    } else {
        RUN_OUTPUT_CAP_BYTES
    };

    let state = Arc::new(Mutex::new(RunState::default()));
    let stop = Arc::new(AtomicBool::new(false));
    let stdout_exceeded = Arc::new(AtomicBool::new(false));
    let stderr_exceeded = Arc::new(AtomicBool::new(false));

    let mut stdin_pipe = child.stdin.take();
    let stdin_bytes = req.stdin.to_vec();
    let stdin_thread = thread::spawn(move || {
        if let Some(mut pipe) = stdin_pipe.take() {
            let _ = pipe.write_all(&stdin_bytes);
            // Dropping `pipe` closes the write end so a child blocked
            // reading stdin doesn't deadlock the drainers below.
        }
    });

    let stdout_pipe = child.stdout.take();
    let stdout_flag = Arc::clone(&stdout_exceeded);
    let stdout_thread = thread::spawn(move || drain(stdout_pipe, cap, stdout_flag));

    let stderr_pipe = child.stderr.take();
    let stderr_flag = Arc::clone(&stderr_exceeded);
    let stderr_thread = thread::spawn(move || drain(stderr_pipe, cap, stderr_flag));

    let watcher_state = Arc::clone(&state);
    let watcher_stop = Arc::clone(&stop);
    let watcher_cancel = Arc::clone(&req.cancel);
    let time_limit_secs = req.time_limit_secs as f64;
    let memory_limit_mb = req.memory_limit_mb as f64;
    let watcher_thread = thread::spawn(move || {
        loop {
            if watcher_stop.load(Ordering::SeqCst) {
                return;
            }
            if watcher_cancel.load(Ordering::SeqCst) {
                kill_process_group(pid);
                watcher_state.lock().unwrap().killed_by_supervisor = Some(KillReason::Cancelled);
                return;
            }

            let elapsed = start.elapsed().as_secs_f64();
            if elapsed > time_limit_secs + TIME_LIMIT_GRACE_SECS {
                kill_process_group(pid);
                watcher_state.lock().unwrap().killed_by_supervisor =
                    Some(KillReason::TimeLimitExceeded);
                return;
            }

            match read_rss_mib(pid) {
                Some(rss_mib) => {
                    let mut guard = watcher_state.lock().unwrap();
                    if rss_mib > guard.peak_rss_mib {
                        guard.peak_rss_mib = rss_mib;
                    }
                    if rss_mib > memory_limit_mb {
                        guard.killed_by_supervisor = Some(KillReason::MemoryLimitExceeded);
                        drop(guard);
                        kill_process_group(pid);
                        return;
                    }
                }
                None => {
                    // Child vanished between poll and read: stop polling,
                    // trust the reaper below.
                    return;
                }
            }

            thread::sleep(RSS_POLL_INTERVAL);
        }
    });

    // The reaper: the only suspension point that is authoritative for
    // child termination. Kills started above race with a natural exit;
    // whichever the kernel observes first is what `wait4` reports.
    //
    // `wait4` is used in place of `Child::wait()` because it also hands
    // back an `rusage` scoped to this one child. `getrusage(RUSAGE_CHILDREN)`
    // was tried first, but its `ru_maxrss` is a high-water mark across every
    // child the process has ever reaped, so a single memory-heavy run would
    // permanently inflate the reported peak for every run after it.
    let mut raw_status: libc::c_int = 0;
    let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
    let wait_rc = unsafe { libc::wait4(pid as libc::pid_t, &mut raw_status, 0, &mut rusage) };
    let elapsed_secs = start.elapsed().as_secs_f64();
    stop.store(true, Ordering::SeqCst);

    let _ = stdin_thread.join();
    let _ = watcher_thread.join();
    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    let run_state = Arc::try_unwrap(state)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();

    // ru_maxrss is in KiB on Linux.
    let rusage_peak_mib = if wait_rc >= 0 {
        rusage.ru_maxrss as f64 / 1024.0
    } else {
        0.0
    };
    let peak_rss_mib = run_state.peak_rss_mib.max(rusage_peak_mib);

    let exit_status = if wait_rc < 0 {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "wait4() failed"
        );
        -1
    } else {
        let st = std::process::ExitStatus::from_raw(raw_status);
        st.signal()
            .map(|s| -s)
            .unwrap_or_else(|| st.code().unwrap_or(-1))
    };

    let output_exceeded =
        stdout_exceeded.load(Ordering::SeqCst) || stderr_exceeded.load(Ordering::SeqCst);
    let time_exceeded = elapsed_secs > time_limit_secs;
    let memory_exceeded = peak_rss_mib > memory_limit_mb;
    let kill_reason = run_state.killed_by_supervisor;

    SupervisorResult {
        stdout,
        stderr,
        elapsed_secs,
        exit_status,
        peak_rss_mib,
        output_exceeded,
        time_exceeded,
        memory_exceeded,
        killed_by_supervisor: kill_reason.is_some(),
        kill_reason,
    }
}

fn drain(pipe: Option<impl Read>, cap: usize, exceeded: Arc<AtomicBool>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut kept = Vec::with_capacity(cap.min(64 * 1024));
    let mut chunk = [0u8; 64 * 1024];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if kept.len() < cap {
                    let take = (cap - kept.len()).min(n);
                    kept.extend_from_slice(&chunk[..take]);
                }
                if kept.len() >= cap {
                    exceeded.store(true, Ordering::SeqCst);
                }
                // Keep draining past the cap so the child never stalls on
                // a full pipe buffer, even though we stop storing bytes.
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

fn kill_process_group(pid: u32) {
    // A negative pid signals the whole process group (setsid'd via
    // `process_group(0)` at spawn time), reaching any grandchildren too.
    let _ = signal::kill(Pid::from_raw(-(pid as i32)), Signal::SIGKILL);
}

fn read_rss_mib(pid: u32) -> Option<f64> {
    let process = procfs::process::Process::new(pid as i32).ok()?;
    let status = process.status().ok()?;
    let kb = status.vmrss?;
    Some(kb as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn base_req(cmd: &[&str]) -> (Vec<String>, PathBuf) {
        (
            cmd.iter().map(|s| s.to_string()).collect(),
            std::env::temp_dir(),
        )
    }

    #[test]
    fn normal_exit_is_captured() {
        let (cmd, workdir) = base_req(&["/bin/echo", "hello"]);
        let req = RunRequest {
            cmd: &cmd,
            stdin: b"",
            time_limit_secs: 5,
            memory_limit_mb: 64,
            is_compilation: false,
            workdir: &workdir,
            env_overrides: &[],
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let res = run(&req);
        assert_eq!(res.exit_status, 0);
        assert_eq!(res.stdout.trim(), "hello");
        assert!(!res.time_exceeded);
        assert!(!res.memory_exceeded);
        assert!(!res.output_exceeded);
    }

    #[test]
    fn spawn_failure_becomes_sentinel_result() {
        let (cmd, workdir) = base_req(&["/no/such/executable-xyz"]);
        let req = RunRequest {
            cmd: &cmd,
            stdin: b"",
            time_limit_secs: 5,
            memory_limit_mb: 64,
            is_compilation: false,
            workdir: &workdir,
            env_overrides: &[],
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let res = run(&req);
        assert_eq!(res.exit_status, -1);
        assert!(res.stderr.contains("Process start failed"));
    }

    #[test]
    fn time_limit_exceeded_kills_the_child() {
        let (cmd, workdir) = base_req(&["/bin/sh", "-c", "sleep 5"]);
        let req = RunRequest {
            cmd: &cmd,
            stdin: b"",
            time_limit_secs: 1,
            memory_limit_mb: 64,
            is_compilation: false,
            workdir: &workdir,
            env_overrides: &[],
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let res = run(&req);
        assert!(res.time_exceeded);
        assert!(res.killed_by_supervisor);
        assert_eq!(res.kill_reason, Some(KillReason::TimeLimitExceeded));
    }

    #[test]
    fn stdin_is_fed_to_the_child() {
        let (cmd, workdir) = base_req(&["/bin/cat"]);
        let req = RunRequest {
            cmd: &cmd,
            stdin: b"ping",
            time_limit_secs: 5,
            memory_limit_mb: 64,
            is_compilation: false,
            workdir: &workdir,
            env_overrides: &[],
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let res = run(&req);
        assert_eq!(res.stdout, "ping");
    }
}
