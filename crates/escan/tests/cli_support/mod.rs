#![allow(dead_code)]

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Isolated `ESCAN_HOME` with a recognizer that echoes the image file back.
pub struct TestHome {
    dir: tempfile::TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        let dir = tempfile::TempDir::new().expect("create temp home");
        let config = r#"
[recognition]
program = "cat"
args = ["{image}"]
timeout_secs = 10
"#;
        std::fs::write(dir.path().join("config.toml"), config).expect("write config");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A fake "image" whose bytes are the text the recognizer will return.
    pub fn image(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).expect("write image");
        path
    }

    pub fn run(&self, args: &[&str]) -> Output {
        let home = self.dir.path().to_string_lossy().to_string();
        run_cli(args, &[("ESCAN_HOME", home.as_str()), ("RUST_LOG", "error")])
    }

    pub fn run_ok(&self, args: &[&str]) -> Output {
        let output = self.run(args);
        assert_cli_success(&output, args);
        output
    }

    pub fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> T {
        let output = self.run_ok(args);
        parse_json(&output, args)
    }
}

pub fn run_cli(args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_escan"));
    cmd.args(args)
        .env_remove("ESCAN_CONFIG")
        .env_remove("ESCAN_PASSWORD");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("run escan")
}

pub fn assert_cli_success(output: &Output, args: &[&str]) {
    assert!(
        output.status.success(),
        "escan {:?} failed\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn parse_json<T: DeserializeOwned>(output: &Output, args: &[&str]) -> T {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "escan {:?} did not print JSON: {}\nstdout:\n{}",
            args,
            err,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}
