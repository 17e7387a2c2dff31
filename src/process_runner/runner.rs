use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::configuration::ExternalCommand;
use crate::error_handling::types::RunnerError;

/// Exit code reported when the process was terminated by a signal.
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// How long output pipes may stay open once the child itself is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs external commands, merging their output into a log file.
///
/// Output is written line by line and flushed after each line, so another
/// reader can follow the log while the process is still running.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Runs `command` followed by `args` and waits for it to exit.
    ///
    /// A non-zero exit code is returned as `Ok`; only a command that cannot be
    /// started (or a log that cannot be opened, or a timeout) is an error.
    pub async fn run(
        &self,
        command: &ExternalCommand,
        args: &[String],
        log_path: &Path,
    ) -> Result<i32, RunnerError> {
        let log_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path)
            .await
            .map_err(|e| {
                error!("Failed to open process log {}: {}", log_path.display(), e);
                RunnerError::LogFailed(e)
            })?;
        let log = Arc::new(Mutex::new(log_file));

        debug!(
            "Spawning {} {:?} {:?} (log: {})",
            command.program,
            command.args,
            args,
            log_path.display()
        );
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own process group, so a timeout reaches the tool's helpers too
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn {}: {}", command.program, e);
                RunnerError::LaunchFailure(format!("{}: {}", command.program, e))
            })?;
        info!(
            "Started {} (pid {:?}), logging to {}",
            command.program,
            child.id(),
            log_path.display()
        );

        let mut pumps: Vec<JoinHandle<()>> = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, log.clone(), "stdout")));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, log.clone(), "stderr")));
        }

        let status = match self.timeout {
            None => child.wait().await,
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(
                        "{} exceeded {}s, killing it",
                        command.program,
                        limit.as_secs()
                    );
                    terminate(&mut child, &command.program).await;
                    drain(pumps, DRAIN_GRACE).await;
                    return Err(RunnerError::TimedOut(limit.as_secs()));
                }
            },
        }
        .map_err(|e| {
            error!("Failed waiting for {}: {}", command.program, e);
            RunnerError::WaitFailed(e)
        })?;

        drain(pumps, DRAIN_GRACE).await;

        let code = status.code().unwrap_or(SIGNALLED_EXIT_CODE);
        info!("{} exited with code {}", command.program, code);
        Ok(code)
    }
}

/// Kills the whole process group of `child`, then the child itself.
async fn terminate(child: &mut Child, program: &str) {
    kill_process_group(child, program);
    if let Err(e) = child.kill().await {
        warn!("Failed to kill {}: {}", program, e);
    }
}

#[cfg(unix)]
fn kill_process_group(child: &Child, program: &str) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    match i32::try_from(pid) {
        Ok(pgid) => {
            if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                warn!("Failed to kill process group {} of {}: {}", pgid, program, e);
            }
        }
        Err(_) => warn!("Process id {} of {} is out of range", pid, program),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child, _program: &str) {}

/// Waits for the output pumps, abandoning them after `grace`.
///
/// A detached process that kept the pipes open must not hold the run hostage.
async fn drain(pumps: Vec<JoinHandle<()>>, grace: Duration) {
    let aborts: Vec<_> = pumps.iter().map(JoinHandle::abort_handle).collect();
    let joined = tokio::time::timeout(grace, async {
        for pump in pumps {
            if let Err(e) = pump.await {
                warn!("Output pump task failed: {}", e);
            }
        }
    })
    .await;
    if joined.is_err() {
        warn!(
            "Process output still open {}s after exit, closing the log",
            grace.as_secs()
        );
        for abort in aborts {
            abort.abort();
        }
    }
}

/// Copies `reader` into the shared log one line at a time until EOF.
///
/// Keeps draining after a log write failure so the child never blocks on a
/// full pipe.
async fn pump<R>(reader: R, log: Arc<Mutex<File>>, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut writable = true;
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                trace!("[{}] {}", stream, String::from_utf8_lossy(&line).trim_end());
                if !writable {
                    continue;
                }
                let mut file = log.lock().await;
                let written = match file.write_all(&line).await {
                    Ok(()) => file.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    warn!("Failed to write {} line to process log: {}", stream, e);
                    writable = false;
                }
            }
            Err(e) => {
                warn!("Failed reading {}: {}", stream, e);
                break;
            }
        }
    }
    debug!("{} monitoring ended", stream);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::sh_script;
    use std::time::Instant;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_returns_exit_code_and_merges_streams() {
        let dir = TempDir::new().unwrap();
        let script = sh_script(
            dir.path(),
            "tool.sh",
            "echo \"out $1\"\necho \"err $2\" >&2\nexit 3\n",
        );
        let log_path = dir.path().join("run.log");

        let rc = ProcessRunner::default()
            .run(&script, &["one".into(), "two".into()], &log_path)
            .await
            .unwrap();

        assert_eq!(rc, 3);
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("out one\n"));
        assert!(log.contains("err two\n"));
    }

    #[tokio::test]
    async fn test_log_is_truncated_between_runs() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("run.log");
        std::fs::write(&log_path, "stale output\n").unwrap();
        let script = sh_script(dir.path(), "tool.sh", "echo fresh\n");

        let rc = ProcessRunner::default()
            .run(&script, &[], &log_path)
            .await
            .unwrap();

        assert_eq!(rc, 0);
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "fresh\n");
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let dir = TempDir::new().unwrap();
        let command = ExternalCommand::new("/nonexistent/handoff-tool");

        let err = ProcessRunner::default()
            .run(&command, &[], &dir.path().join("run.log"))
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::LaunchFailure(_)));
    }

    #[tokio::test]
    async fn test_non_utf8_output_is_kept() {
        let dir = TempDir::new().unwrap();
        let script = sh_script(dir.path(), "tool.sh", "printf 'a\\377b\\n'\n");
        let log_path = dir.path().join("run.log");

        ProcessRunner::default()
            .run(&script, &[], &log_path)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&log_path).unwrap(), b"a\xffb\n");
    }

    #[tokio::test]
    async fn test_partial_output_is_visible_while_running() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("go");
        let body = format!(
            "echo first\nn=0\nwhile [ ! -e '{}' ] && [ $n -lt 400 ]; do sleep 0.05; n=$((n+1)); done\necho second\n",
            marker.display()
        );
        let script = sh_script(dir.path(), "tool.sh", &body);
        let log_path = dir.path().join("run.log");

        let task = {
            let log_path = log_path.clone();
            tokio::spawn(async move { ProcessRunner::default().run(&script, &[], &log_path).await })
        };

        let started = Instant::now();
        let partial = loop {
            let current = std::fs::read_to_string(&log_path).unwrap_or_default();
            if !current.is_empty() {
                break current;
            }
            assert!(started.elapsed() < Duration::from_secs(10), "no output observed");
            tokio::time::sleep(Duration::from_millis(20)).await;
        };
        assert!(!partial.contains("second"));

        std::fs::write(&marker, "").unwrap();
        let rc = task.await.unwrap().unwrap();
        assert_eq!(rc, 0);

        let full = std::fs::read_to_string(&log_path).unwrap();
        assert!(full.starts_with(&partial));
        assert_eq!(full, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let script = sh_script(dir.path(), "tool.sh", "echo waiting\nexec sleep 30\n");
        let log_path = dir.path().join("run.log");

        let started = Instant::now();
        let err = ProcessRunner::new(Some(Duration::from_secs(1)))
            .run(&script, &[], &log_path)
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::TimedOut(1)));
        assert!(started.elapsed() < Duration::from_secs(20));
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "waiting\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_helper_processes() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("helper.pid");
        let body = format!(
            "echo waiting\nsleep 30 &\necho $! > '{}'\nwait\necho done\n",
            pid_file.display()
        );
        let script = sh_script(dir.path(), "tool.sh", &body);
        let log_path = dir.path().join("run.log");

        let started = Instant::now();
        let err = ProcessRunner::new(Some(Duration::from_secs(1)))
            .run(&script, &[], &log_path)
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::TimedOut(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "waiting\n");

        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        let helper: i32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while kill(Pid::from_raw(helper), None).is_ok() {
            assert!(Instant::now() < deadline, "helper {} survived", helper);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn test_timeout_does_not_wait_for_unexecd_sleep() {
        let dir = TempDir::new().unwrap();
        let script = sh_script(dir.path(), "tool.sh", "echo waiting\nsleep 30\necho done\n");
        let log_path = dir.path().join("run.log");

        let started = Instant::now();
        let err = ProcessRunner::new(Some(Duration::from_secs(1)))
            .run(&script, &[], &log_path)
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::TimedOut(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_detached_output_holder_does_not_block_exit() {
        let dir = TempDir::new().unwrap();
        // the helper outlives the tool and keeps stdout open
        let script = sh_script(dir.path(), "tool.sh", "echo started\nsleep 30 &\nexit 0\n");
        let log_path = dir.path().join("run.log");

        let started = Instant::now();
        let rc = ProcessRunner::default()
            .run(&script, &[], &log_path)
            .await
            .unwrap();

        assert_eq!(rc, 0);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "started\n");
    }
}
