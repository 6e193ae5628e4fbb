use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// What became of one external command. The runner always returns one of
/// these, it never unwinds past its boundary.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed {
        stdout: String,
        stderr: String,
        code: Option<i32>,
    },
    SpawnFailed {
        message: String,
    },
    TimedOut {
        limit: Duration,
    },
}

/// Seam for executing a command vector. The system implementation spawns a
/// real child process; tests substitute fakes that record or simulate runs.
pub trait CommandRunner: Send + Sync {
    fn run(&self, argv: &[String]) -> RunOutcome;
}

/// Spawns the command synchronously, draining stdout/stderr in full.
///
/// An optional wall-clock limit guards against tools that hang: on expiry the
/// child is killed and the invocation reports `TimedOut`.
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<Option<i32>, ()> {
        let Some(limit) = self.timeout else {
            return match child.wait() {
                Ok(status) => Ok(status.code()),
                Err(_) => Ok(None),
            };
        };
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status.code()),
                Ok(None) => {}
                Err(_) => return Ok(None),
            }
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(());
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> RunOutcome {
        let Some((program, args)) = argv.split_first() else {
            return RunOutcome::SpawnFailed {
                message: "empty command vector".to_string(),
            };
        };

        tracing::debug!(command = %argv.join(" "), "spawning");
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return RunOutcome::SpawnFailed {
                    message: format!("{program}: {err}"),
                };
            }
        };

        // Drain both pipes off-thread so a chatty child cannot deadlock
        // against a full pipe buffer while we wait on it.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let code = match self.wait_with_timeout(&mut child) {
            Ok(code) => code,
            Err(()) => {
                let limit = self.timeout.unwrap_or_default();
                tracing::warn!(command = %argv.join(" "), ?limit, "killed after timeout");
                return RunOutcome::TimedOut { limit };
            }
        };

        RunOutcome::Completed {
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
            code,
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = source.read_to_end(&mut buffer);
        buffer
    })
}

fn join_reader(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle.and_then(|h| h.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Splits captured stream text into its non-empty lines, the form every
/// processor output record carries.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_is_an_outcome() {
        let runner = SystemRunner::new(None);
        let outcome = runner.run(&["/nonexistent/binary/xyz".to_string()]);
        assert!(matches!(outcome, RunOutcome::SpawnFailed { .. }));
    }

    #[test]
    fn empty_command_is_a_spawn_failure() {
        let runner = SystemRunner::new(None);
        assert!(matches!(runner.run(&[]), RunOutcome::SpawnFailed { .. }));
    }

    #[test]
    fn split_lines_drops_blanks() {
        assert_eq!(split_lines("a\n\n b\n  \n"), vec!["a", " b"]);
        assert!(split_lines("").is_empty());
    }
}
