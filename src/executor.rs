//! Test execution and process supervision
//!
//! Runs one test program at a time in a child process of the executable under
//! test, enforcing the per-test timeout and capturing its output. Everything
//! that can go wrong with a single test is turned into an [`ExecutionOutcome`]
//! here; nothing propagates to sibling workers.

use crate::aggregate::SharedAggregate;
use crate::config::RunConfiguration;
use crate::discovery::TestCase;
use crate::error::Result;
use crate::ui::{ConsoleLock, UI};
use console::style;
use regex::Regex;
use std::fs;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Directive giving extra arguments for the executable, e.g. `// Flags: --expose-gc`
pub const FLAGS_PATTERN: &str = r"//\s+Flags:(.*)";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for output readers after a child was killed
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Final status of one test execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Passed,
    Failed,
    TimedOut,
}

/// Result of running one test
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub status: OutcomeStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Absent when the test timed out, was killed by a signal, or never started
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl ExecutionOutcome {
    fn not_started(message: String, duration: Duration) -> Self {
        ExecutionOutcome {
            status: OutcomeStatus::Failed,
            stdout: Vec::new(),
            stderr: message.into_bytes(),
            exit_code: None,
            duration,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status != OutcomeStatus::Passed
    }
}

/// Extract the launch flags from a test's source
///
/// Only the first directive counts. Tokens are separated by whitespace.
pub fn parse_flags(pattern: &Regex, source: &str) -> Vec<String> {
    pattern
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Runs tests against the executable under test
#[derive(Debug)]
pub struct TestExecutor<'a> {
    config: &'a RunConfiguration,
    flags_pattern: Regex,
}

impl<'a> TestExecutor<'a> {
    pub fn new(config: &'a RunConfiguration) -> Result<Self> {
        Ok(TestExecutor {
            config,
            flags_pattern: Regex::new(FLAGS_PATTERN)?,
        })
    }

    /// Read the launch flags declared by a test
    pub fn flags_for(&self, case: &TestCase) -> io::Result<Vec<String>> {
        let source = fs::read_to_string(self.config.project_root.join(case.path()))?;
        Ok(parse_flags(&self.flags_pattern, &source))
    }

    /// Empty the shared scratch directory before a sequential test
    ///
    /// Failures are logged and otherwise ignored.
    pub fn prepare_scratch_dir(&self) {
        let dir = &self.config.temp_dir;
        let cleared = match fs::remove_dir_all(dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => fs::create_dir_all(dir),
        };
        if let Err(e) = cleared {
            warn!("Cannot make or remove directory {}: {}", dir.display(), e);
        }
    }

    /// Run a single test and classify the result, without reporting it
    pub fn run(&self, case: &TestCase) -> ExecutionOutcome {
        let started = Instant::now();

        let flags = match self.flags_for(case) {
            Ok(flags) => flags,
            Err(e) => {
                return ExecutionOutcome::not_started(
                    format!("Failed to read {}: {}", case.path(), e),
                    started.elapsed(),
                );
            }
        };

        if case.is_sequential() {
            self.prepare_scratch_dir();
            thread::sleep(self.config.sequential_delay);
        }

        // Armed before the child starts. A plain deadline has nothing to
        // disarm on any return path. A timeout too large to represent means
        // no deadline.
        let deadline = Instant::now().checked_add(self.config.timeout);

        let mut child = match self.spawn(case, &flags) {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome::not_started(
                    format!(
                        "Failed to spawn {}: {}",
                        self.config.executable.display(),
                        e
                    ),
                    started.elapsed(),
                );
            }
        };

        let stdout = child.stdout.take().map(spawn_capture);
        let stderr = child.stderr.take().map(spawn_capture);

        let waited = wait_until(&mut child, deadline);
        let drain_until = if matches!(waited, Ok(Some(_))) {
            // Descendants left behind would keep the pipes open
            os::kill_leftovers(&child);
            deadline.map(|d| d.max(Instant::now() + KILL_GRACE))
        } else {
            Some(Instant::now() + KILL_GRACE)
        };
        let stdout = collect(stdout, drain_until);
        let stderr = collect(stderr, drain_until);
        let drained = stdout.is_some() && stderr.is_some();
        let stdout = stdout.unwrap_or_default();
        let mut stderr = stderr.unwrap_or_default();
        let duration = started.elapsed();

        let outcome = match waited {
            Ok(Some(_)) if !drained => {
                warn!("{}: output still open at the deadline", case.path());
                ExecutionOutcome {
                    status: OutcomeStatus::TimedOut,
                    stdout,
                    stderr,
                    exit_code: None,
                    duration,
                }
            }
            Ok(Some(status)) => ExecutionOutcome {
                status: if status.success() {
                    OutcomeStatus::Passed
                } else {
                    OutcomeStatus::Failed
                },
                stdout,
                stderr,
                exit_code: status.code(),
                duration,
            },
            Ok(None) => ExecutionOutcome {
                status: OutcomeStatus::TimedOut,
                stdout,
                stderr,
                exit_code: None,
                duration,
            },
            Err(e) => {
                stderr.extend_from_slice(format!("Failed to wait for test: {}", e).as_bytes());
                ExecutionOutcome {
                    status: OutcomeStatus::Failed,
                    stdout,
                    stderr,
                    exit_code: None,
                    duration,
                }
            }
        };

        debug!(
            "{} finished as {:?} in {:.2?}",
            case.path(),
            outcome.status,
            outcome.duration
        );
        outcome
    }

    /// Run a test, print its outcome and fold it into the aggregate
    pub fn run_and_record(
        &self,
        case: &TestCase,
        console: &ConsoleLock<'_>,
        aggregate: &SharedAggregate,
    ) -> ExecutionOutcome {
        let outcome = self.run(case);

        let printed = match outcome.status {
            OutcomeStatus::Passed => {
                aggregate.record_success();
                console.output(&style(format!("[PASS]: {}", case.path())).green().to_string())
            }
            OutcomeStatus::Failed => {
                aggregate.record_failure(case.path());
                console.block(|ui| {
                    ui.output(&style(format!("[FAIL]: {}", case.path())).red().to_string())?;
                    print_captured(ui, &outcome.stdout)?;
                    print_captured(ui, &outcome.stderr)
                })
            }
            OutcomeStatus::TimedOut => {
                aggregate.record_failure(case.path());
                console.output(
                    &style(format!("[FAIL]:(TimeOut) {}", case.path()))
                        .red()
                        .to_string(),
                )
            }
        };
        if let Err(e) = printed {
            warn!("Failed to print outcome of {}: {}", case.path(), e);
        }

        outcome
    }

    fn spawn(&self, case: &TestCase, flags: &[String]) -> io::Result<Child> {
        let mut command = Command::new(&self.config.executable);
        command
            .args(flags)
            .arg(case.path())
            .current_dir(&self.config.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        os::set_process_group(&mut command);

        debug!(
            "Spawning {} {:?} {}",
            self.config.executable.display(),
            flags,
            case.path()
        );
        command.spawn()
    }
}

/// Wait for the child to exit or the deadline to pass, whichever is first
///
/// Returns `Ok(None)` on timeout. On timeout or a wait error the child (and
/// its process group where supported) is killed and reaped before returning.
/// Without a deadline this waits for as long as the child runs.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                let pause = match deadline {
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            os::terminate(child);
                            return Ok(None);
                        }
                        POLL_INTERVAL.min(deadline - now)
                    }
                    None => POLL_INTERVAL,
                };
                thread::sleep(pause);
            }
            Err(e) => {
                os::terminate(child);
                return Err(e);
            }
        }
    }
}

/// Spawn a thread draining one of the child's pipes
fn spawn_capture<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buffer) {
            debug!("Failed to read test output: {}", e);
        }
        // Ignore if the receiver gave up waiting
        let _ = tx.send(buffer);
    });
    rx
}

/// Collect captured output, waiting no later than `until` when given
///
/// Returns `None` if the pipe was still open when time ran out.
fn collect(capture: Option<Receiver<Vec<u8>>>, until: Option<Instant>) -> Option<Vec<u8>> {
    let Some(rx) = capture else {
        return Some(Vec::new());
    };
    let Some(until) = until else {
        return Some(rx.recv().unwrap_or_default());
    };
    match rx.recv_timeout(until.saturating_duration_since(Instant::now())) {
        Ok(buffer) => Some(buffer),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
    }
}

fn print_captured(ui: &mut dyn UI, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    ui.output_bytes(bytes)?;
    if !bytes.ends_with(b"\n") {
        ui.output_bytes(b"\n")?;
    }
    Ok(())
}

#[cfg(unix)]
mod os {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    use std::os::unix::process::CommandExt;
    use std::process::{Child, Command};
    use tracing::debug;

    /// Put the child in its own process group so a timeout can kill its
    /// descendants too.
    pub(super) fn set_process_group(cmd: &mut Command) {
        cmd.process_group(0);
    }

    pub(super) fn terminate(child: &mut Child) {
        let pgid = Pid::from_raw(child.id() as i32);
        if let Err(e) = killpg(pgid, Signal::SIGKILL) {
            debug!("killpg({}) failed: {}", pgid, e);
            let _ = child.kill();
        }
        let _ = child.wait();
    }

    /// Kill whatever is left of the group once its leader has exited
    pub(super) fn kill_leftovers(child: &Child) {
        let pgid = Pid::from_raw(child.id() as i32);
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) => debug!("Killed leftover processes of group {}", pgid),
            Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => debug!("killpg({}) failed: {}", pgid, e),
        }
    }
}

#[cfg(not(unix))]
mod os {
    use std::process::{Child, Command};

    pub(super) fn set_process_group(_cmd: &mut Command) {}

    pub(super) fn terminate(child: &mut Child) {
        let _ = child.kill();
        let _ = child.wait();
    }

    pub(super) fn kill_leftovers(_child: &Child) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Classification;

    fn flags_regex() -> Regex {
        Regex::new(FLAGS_PATTERN).unwrap()
    }

    #[test]
    fn test_parse_flags() {
        let source = "'use strict';\n// Flags: --expose-gc  --no-warnings\nrequire('x');\n";
        assert_eq!(
            parse_flags(&flags_regex(), source),
            vec!["--expose-gc", "--no-warnings"]
        );
    }

    #[test]
    fn test_parse_flags_absent() {
        assert!(parse_flags(&flags_regex(), "'use strict';\n").is_empty());
    }

    #[test]
    fn test_parse_flags_first_directive_wins() {
        let source = "// Flags: --a\n// Flags: --b\n";
        assert_eq!(parse_flags(&flags_regex(), source), vec!["--a"]);
    }

    #[test]
    fn test_parse_flags_requires_comment_marker() {
        assert!(parse_flags(&flags_regex(), "Flags: --a\n").is_empty());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::testlist::TestSet;
        use crate::ui::test_ui::TestUI;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use tempfile::TempDir;

        /// Fake executable under test: runs the test file as a shell script
        /// and echoes its arguments to stderr first.
        fn project(root: &Path, timeout: Duration) -> RunConfiguration {
            let executable = root.join("node");
            fs::write(
                &executable,
                "#!/bin/sh\necho \"args: $*\" >&2\nfor last; do :; done\nexec /bin/sh \"$last\"\n",
            )
            .unwrap();
            fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();
            fs::create_dir_all(root.join("test/parallel")).unwrap();

            RunConfiguration {
                project_root: root.to_path_buf(),
                executable,
                test_dir: "test".to_string(),
                temp_dir: root.join("test/tmp"),
                extension: ".js".to_string(),
                modules: vec!["parallel".to_string()],
                timeout,
                process: 2,
                sequential_delay: Duration::ZERO,
                filters: Vec::new(),
                run_all: false,
                skip_list: TestSet::new(),
                sequential_list: TestSet::new(),
            }
        }

        fn write_test(root: &Path, name: &str, body: &str) -> TestCase {
            let path = format!("test/parallel/{}", name);
            fs::write(root.join(&path), body).unwrap();
            TestCase::new(path, Classification::Parallel)
        }

        #[test]
        fn test_passing_test() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(10));
            let case = write_test(temp.path(), "test-ok.js", "echo hello\nexit 0\n");

            let executor = TestExecutor::new(&config).unwrap();
            let outcome = executor.run(&case);

            assert_eq!(outcome.status, OutcomeStatus::Passed);
            assert_eq!(outcome.exit_code, Some(0));
            assert_eq!(String::from_utf8_lossy(&outcome.stdout), "hello\n");
        }

        #[test]
        fn test_failing_test_keeps_output() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(10));
            let case = write_test(temp.path(), "test-bad.js", "echo broken >&2\nexit 3\n");

            let executor = TestExecutor::new(&config).unwrap();
            let outcome = executor.run(&case);

            assert_eq!(outcome.status, OutcomeStatus::Failed);
            assert_eq!(outcome.exit_code, Some(3));
            assert!(String::from_utf8_lossy(&outcome.stderr).contains("broken"));
        }

        #[test]
        fn test_flags_are_passed_before_path() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(10));
            let case = write_test(
                temp.path(),
                "test-flags.js",
                "# // Flags: --expose-gc --abort-on-uncaught-exception\nexit 0\n",
            );

            let executor = TestExecutor::new(&config).unwrap();
            let outcome = executor.run(&case);

            assert_eq!(outcome.status, OutcomeStatus::Passed);
            assert_eq!(
                String::from_utf8_lossy(&outcome.stderr),
                "args: --expose-gc --abort-on-uncaught-exception test/parallel/test-flags.js\n"
            );
        }

        #[test]
        fn test_timeout_kills_child() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(1));
            let marker = temp.path().join("still-running");
            let case = write_test(
                temp.path(),
                "test-hang.js",
                &format!("sleep 3\ntouch {}\n", marker.display()),
            );

            let executor = TestExecutor::new(&config).unwrap();
            let started = Instant::now();
            let outcome = executor.run(&case);

            assert_eq!(outcome.status, OutcomeStatus::TimedOut);
            assert_eq!(outcome.exit_code, None);
            assert!(started.elapsed() < Duration::from_secs(3));

            // Had the process survived, it would create the marker by now.
            thread::sleep(Duration::from_secs(3));
            assert!(!marker.exists());
        }

        #[test]
        fn test_background_children_do_not_outlive_test() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(5));
            let marker = temp.path().join("still-running");
            let case = write_test(
                temp.path(),
                "test-daemon.js",
                &format!(
                    "echo started\nsleep 30 &\n(sleep 2; touch {}) &\nexit 0\n",
                    marker.display()
                ),
            );

            let executor = TestExecutor::new(&config).unwrap();
            let started = Instant::now();
            let outcome = executor.run(&case);

            assert_eq!(outcome.status, OutcomeStatus::Passed, "{:?}", outcome);
            assert_eq!(String::from_utf8_lossy(&outcome.stdout), "started\n");
            assert!(started.elapsed() < Duration::from_secs(2));

            thread::sleep(Duration::from_secs(3));
            assert!(!marker.exists());
        }

        #[test]
        fn test_unrepresentable_timeout_means_no_deadline() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(u64::MAX));
            let case = write_test(temp.path(), "test-ok.js", "exit 0\n");

            let executor = TestExecutor::new(&config).unwrap();
            let outcome = executor.run(&case);

            assert_eq!(outcome.status, OutcomeStatus::Passed);
            assert_eq!(outcome.exit_code, Some(0));
        }

        #[test]
        fn test_unusable_scratch_dir_is_not_fatal() {
            let temp = TempDir::new().unwrap();
            let mut config = project(temp.path(), Duration::from_secs(10));
            let blocker = temp.path().join("blocker");
            fs::write(&blocker, "not a directory").unwrap();
            config.temp_dir = blocker.join("tmp");

            let path = "test/parallel/test-seq.js";
            fs::write(temp.path().join(path), "exit 0\n").unwrap();
            let case = TestCase::new(path, Classification::Sequential);

            let executor = TestExecutor::new(&config).unwrap();
            let aggregate = SharedAggregate::new();
            let mut ui = TestUI::new();
            let outcome = {
                let console = ConsoleLock::new(&mut ui);
                executor.run_and_record(&case, &console, &aggregate)
            };

            assert_eq!(outcome.status, OutcomeStatus::Passed, "{:?}", outcome);
            assert!(blocker.is_file());
            assert_eq!(aggregate.into_snapshot().success, 1);
            assert_eq!(ui.count_containing("[PASS]: test/parallel/test-seq.js"), 1);
        }

        #[test]
        fn test_missing_source_is_a_failure() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(10));
            let case = TestCase::new("test/parallel/test-gone.js", Classification::Parallel);

            let executor = TestExecutor::new(&config).unwrap();
            let outcome = executor.run(&case);

            assert_eq!(outcome.status, OutcomeStatus::Failed);
            assert!(String::from_utf8_lossy(&outcome.stderr).contains("test-gone.js"));
        }

        #[test]
        fn test_sequential_test_gets_empty_scratch_dir() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(10));
            fs::create_dir_all(&config.temp_dir).unwrap();
            fs::write(config.temp_dir.join("leftover"), "x").unwrap();

            let path = "test/parallel/test-seq.js";
            fs::write(
                temp.path().join(path),
                "test -d test/tmp || exit 1\ntest -z \"$(ls -A test/tmp)\" || exit 2\n",
            )
            .unwrap();
            let case = TestCase::new(path, Classification::Sequential);

            let executor = TestExecutor::new(&config).unwrap();
            let outcome = executor.run(&case);

            assert_eq!(outcome.status, OutcomeStatus::Passed, "{:?}", outcome);
        }

        #[test]
        fn test_run_and_record_updates_aggregate() {
            let temp = TempDir::new().unwrap();
            let config = project(temp.path(), Duration::from_secs(10));
            let pass = write_test(temp.path(), "test-pass.js", "exit 0\n");
            let fail = write_test(temp.path(), "test-fail.js", "echo oops\nexit 1\n");

            let executor = TestExecutor::new(&config).unwrap();
            let aggregate = SharedAggregate::new();
            let mut ui = TestUI::new();
            {
                let console = ConsoleLock::new(&mut ui);
                executor.run_and_record(&pass, &console, &aggregate);
                executor.run_and_record(&fail, &console, &aggregate);
            }

            let snapshot = aggregate.into_snapshot();
            assert_eq!(snapshot.success, 1);
            assert_eq!(snapshot.fail, 1);
            assert_eq!(snapshot.failed, vec!["test/parallel/test-fail.js"]);
            assert_eq!(ui.count_containing("[PASS]: test/parallel/test-pass.js"), 1);
            assert_eq!(ui.count_containing("[FAIL]: test/parallel/test-fail.js"), 1);
            assert!(ui.captured_text().contains("oops"));
        }
    }
}
