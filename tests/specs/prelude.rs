//! Shared helpers for CLI specs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::OnceLock;

/// Fast polling so specs don't wait a full second per job.
const SPEC_POLL_MS: &str = "20";

/// Path to the `runq` binary, building it on first use if needed.
fn runq_bin() -> &'static Path {
    static BIN: OnceLock<PathBuf> = OnceLock::new();
    BIN.get_or_init(|| {
        let path = assert_cmd::cargo::cargo_bin("runq");
        if !path.exists() {
            let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
            let status = std::process::Command::new(cargo)
                .args(["build", "--quiet", "-p", "runq"])
                .status()
                .expect("failed to run cargo build");
            assert!(status.success(), "building runq failed");
        }
        path
    })
}

/// A `runq` invocation outside any project directory.
pub fn cli() -> CliBuilder {
    CliBuilder { args: Vec::new(), envs: Vec::new(), pwd: None }
}

pub struct CliBuilder {
    args: Vec<String>,
    envs: Vec<(String, String)>,
    pwd: Option<PathBuf>,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn pwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pwd = Some(dir.into());
        self
    }

    fn run(self) -> RunAssert {
        let mut cmd = assert_cmd::Command::new(runq_bin());
        cmd.args(&self.args)
            .env_remove("RUNQ_LOG")
            .env_remove("RUNQ_MULTI_SLOTS")
            .env_remove("RUNQ_MAX_HISTORY")
            .env("RUNQ_POLL_MS", SPEC_POLL_MS)
            .env("NO_COLOR", "1");
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.pwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output().expect("failed to run runq");
        RunAssert { args: self.args, output }
    }

    /// Run and assert a zero exit status.
    pub fn passes(self) -> RunAssert {
        let run = self.run();
        assert!(run.output.status.success(), "expected success: {}", run.describe());
        run
    }

    /// Run and assert a non-zero exit status.
    pub fn fails(self) -> RunAssert {
        let run = self.run();
        assert!(!run.output.status.success(), "expected failure: {}", run.describe());
        run
    }

    /// Run and assert a specific exit code.
    pub fn exits(self, code: i32) -> RunAssert {
        let run = self.run();
        assert_eq!(run.output.status.code(), Some(code), "unexpected exit: {}", run.describe());
        run
    }
}

pub struct RunAssert {
    args: Vec<String>,
    output: Output,
}

impl RunAssert {
    fn describe(&self) -> String {
        format!(
            "runq {}\nstatus: {}\n--- stdout ---\n{}\n--- stderr ---\n{}",
            self.args.join(" "),
            self.output.status,
            self.stdout(),
            self.stderr()
        )
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout().contains(needle), "stdout lacks {needle:?}: {}", self.describe());
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        assert!(!self.stdout().contains(needle), "stdout has {needle:?}: {}", self.describe());
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr().contains(needle), "stderr lacks {needle:?}: {}", self.describe());
        self
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout(), expected);
        self
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout())
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", self.describe()))
    }
}

/// Scratch directory for specs that need files.
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self { dir: tempfile::tempdir().expect("failed to create temp dir") }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, relative: &str, contents: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(path, contents).expect("failed to write file");
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(relative)).unwrap_or_default()
    }

    /// `runq` running inside the project directory.
    pub fn runq(&self) -> CliBuilder {
        cli().pwd(self.path())
    }
}
