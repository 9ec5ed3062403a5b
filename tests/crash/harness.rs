//! Crash test harness for subprocess management
//!
//! A `Device` is a temp directory with a config file and a metadata file.
//! Commands run the built `bootctl` binary against it, optionally with a
//! crash point armed.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use bootctl::crash_point::CRASH_POINT_ENV;
use tempfile::TempDir;

/// Result of one bootctl invocation
#[derive(Debug)]
pub struct CrashTestResult {
    /// Killed by the crash point instead of exiting
    pub crashed: bool,
    pub exit_status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl CrashTestResult {
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.and_then(|s| s.code())
    }
}

/// Simulated device: running slot 0, no commit retries
pub struct Device {
    _dir: TempDir,
    pub config: PathBuf,
    pub metadata: PathBuf,
}

impl Device {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = dir.path().join("bootctl.json");
        let metadata = dir.path().join("metadata/slot_metadata.bin");
        fs::write(&config, r#"{"current_slot": 0, "commit_retries": 0}"#)
            .expect("Failed to write config");
        Self {
            _dir: dir,
            config,
            metadata,
        }
    }

    /// Independent device with the same metadata bytes
    pub fn clone_device(&self) -> Self {
        let copy = Self::new();
        if self.metadata.exists() {
            fs::create_dir_all(copy.metadata.parent().unwrap()).unwrap();
            fs::copy(&self.metadata, &copy.metadata).unwrap();
        }
        copy
    }

    pub fn run(&self, args: &[&str]) -> CrashTestResult {
        self.execute(None, args)
    }

    pub fn run_with_crash_point(&self, crash_point: &str, args: &[&str]) -> CrashTestResult {
        self.execute(Some(crash_point), args)
    }

    /// Committed state as printed by `dump-metadata`
    pub fn dump(&self) -> serde_json::Value {
        let result = self.run(&["dump-metadata"]);
        assert_eq!(
            result.exit_code(),
            Some(0),
            "dump-metadata failed: {}",
            result.stderr
        );
        serde_json::from_str(&result.stdout).expect("dump-metadata must print JSON")
    }

    fn execute(&self, crash_point: Option<&str>, args: &[&str]) -> CrashTestResult {
        let mut command = Command::new(env!("CARGO_BIN_EXE_bootctl"));
        command
            .arg("--config")
            .arg(&self.config)
            .arg("--metadata")
            .arg(&self.metadata)
            .args(args)
            .env_remove(CRASH_POINT_ENV);
        if let Some(point) = crash_point {
            command.env(CRASH_POINT_ENV, point);
        }

        match command.output() {
            Ok(output) => CrashTestResult {
                crashed: output.status.code().is_none(),
                exit_status: Some(output.status),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(e) => CrashTestResult {
                crashed: false,
                exit_status: None,
                stdout: String::new(),
                stderr: format!("Failed to execute: {}", e),
            },
        }
    }
}

/// Report crash test failure
pub fn report_failure(crash_point: &str, operation: &str, expected: &str, actual: &str) {
    eprintln!("=== CRASH TEST FAILURE ===");
    eprintln!("Crash point: {}", crash_point);
    eprintln!("Operation: {}", operation);
    eprintln!("Expected: {}", expected);
    eprintln!("Actual: {}", actual);
    eprintln!("==========================");
}
