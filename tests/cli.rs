//! End-to-end runs of the suitepool binary

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const MANIFEST: &str = r#"
suites:
  - name: api
    cases:
      - name: ok
        command: ["true"]
      - name: exits_three
        command: ["sh", "-c", "exit 3"]
        expect_code: 3
      - name: broken
        command: ["sh", "-c", "echo boom >&2; exit 1"]
  - name: misc
    cases:
      - name: later
        command: ["true"]
        skip: not ready
      - name: env_seen
        command: ["sh", "-c", "test \"$GREETING\" = hello"]
        env:
          GREETING: hello
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(manifest: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("suites.yaml"), manifest).unwrap();
        std::fs::write(dir.path().join("config.yaml"), "version: \"1.0\"\n").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_suitepool"));
        command
            .current_dir(self.dir.path())
            .arg("--config")
            .arg(self.path("config.yaml"))
            .args(args)
            .env_remove("SUITEPOOL_PROCESSES")
            .env_remove("SUITEPOOL_PROCESS_TIMEOUT")
            .env_remove("SUITEPOOL_FORMAT")
            .env_remove("RUST_LOG");
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().unwrap()
    }
}

fn manifest_arg(ws: &Workspace) -> String {
    ws.path("suites.yaml").display().to_string()
}

#[test]
fn run_reports_every_case_as_json() {
    let ws = Workspace::new(MANIFEST);
    let manifest = manifest_arg(&ws);
    let output = ws.run(&["run", "-m", &manifest, "-p", "2", "-f", "json"]);

    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let outcome = &report["outcome"];
    assert_eq!(report["suites"], 2);
    assert_eq!(report["processes"], 2);
    assert_eq!(report["interrupted"], false);
    assert_eq!(outcome["tests_run"], 5);
    assert_eq!(outcome["items_completed"], 2);
    assert_eq!(outcome["successes"].as_array().unwrap().len(), 3);
    assert_eq!(outcome["failures"][0]["case"]["name"], "broken");
    assert!(outcome["failures"][0]["message"]
        .as_str()
        .unwrap()
        .contains("boom"));
    assert_eq!(outcome["skipped"][0]["message"], "not ready");
    assert!(outcome["errors"].as_array().unwrap().is_empty());
}

#[test]
fn filtered_run_succeeds_and_saves_report() {
    let ws = Workspace::new(MANIFEST);
    let manifest = manifest_arg(&ws);
    let saved = ws.path("report.txt");
    let output = ws.run(&[
        "run",
        "-m",
        &manifest,
        "-s",
        "api",
        "-k",
        "three",
        "-f",
        "summary",
        "-o",
        saved.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("1/1 passed (100.0%)"), "{stdout}");
    assert!(Path::new(&saved).exists());
}

#[test]
fn duplicate_cases_fail_before_running() {
    let ws = Workspace::new(
        r#"
suites:
  - name: s
    cases:
      - name: a
        command: ["touch", "ran"]
  - name: s
    cases:
      - name: a
        command: ["touch", "ran"]
"#,
    );
    let manifest = manifest_arg(&ws);
    let output = ws.run(&["run", "-m", &manifest]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Case(s::a)"), "{stderr}");
    assert!(!ws.path("ran").exists());
}

#[test]
fn list_shows_suites_and_cases() {
    let ws = Workspace::new(MANIFEST);
    let manifest = manifest_arg(&ws);
    let output = ws.run(&["list", "-m", &manifest, "--detailed"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("2 suites, 5 cases"));
    assert!(stdout.contains("api (3 cases):"));
    assert!(stdout.contains("skip: not ready"));
    assert!(stdout.contains("exit 3"));
}

#[test]
fn zero_process_timeout_is_rejected() {
    let ws = Workspace::new(MANIFEST);
    let manifest = manifest_arg(&ws);

    let output = ws.run(&["run", "-m", &manifest, "--process-timeout", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least 1 second"), "{stderr}");

    let output = ws
        .command(&["run", "-m", &manifest])
        .env("SUITEPOOL_PROCESS_TIMEOUT", "0")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least 1 second"), "{stderr}");
}

#[test]
fn worker_reads_suite_and_writes_one_fragment() {
    let ws = Workspace::new(MANIFEST);
    let suite = r#"{"name":"w","cases":[
        {"name":"ok","suite":"w","command":["true"]},
        {"name":"bad","suite":"w","command":["false"]}
    ]}"#;

    let mut child = ws
        .command(&["worker"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(suite.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1, "{stdout}");

    let fragment: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(fragment["tests_run"], 2);
    assert_eq!(fragment["passed"][0], "Case(w::ok)");
    assert_eq!(fragment["failures"][0][0], "Case(w::bad)");
}

/// Whether `pid` is gone (or a zombie) before `limit` elapses
#[cfg(target_os = "linux")]
fn exited_within(pid: u32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).unwrap_or_default();
        let state = stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.trim().chars().next());
        if matches!(state, None | Some('Z') | Some('X')) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(target_os = "linux")]
#[test]
fn slot_timeout_kills_commands_of_running_suites() {
    let ws = Workspace::new(
        r#"
suites:
  - name: stuck
    cases:
      - name: hang
        command: ["sh", "-c", "echo $$ > hang.pid; exec sleep 30"]
  - name: waiting
    cases:
      - name: never
        command: ["true"]
"#,
    );
    let manifest = manifest_arg(&ws);

    let start = Instant::now();
    let output = ws.run(&[
        "run",
        "-m",
        &manifest,
        "-p",
        "1",
        "--process-timeout",
        "2",
    ]);

    assert!(!output.status.success());
    assert!(start.elapsed() < Duration::from_secs(20));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No free worker slot"), "{stderr}");

    let pid: u32 = std::fs::read_to_string(ws.path("hang.pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(exited_within(pid, Duration::from_secs(5)), "case {pid} still running");
}
