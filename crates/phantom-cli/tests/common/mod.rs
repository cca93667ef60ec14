use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};
use wiremock::MockServer;

/// An isolated home directory and token file for one test.
pub struct Sandbox {
    pub home: tempfile::TempDir,
    pub api_url: String,
}

impl Sandbox {
    pub fn new(server: &MockServer) -> Self {
        Self {
            home: tempfile::tempdir().expect("Failed to create temp dir"),
            api_url: format!("http://127.0.0.1:{}/api", server.address().port()),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.home.path().join("tokens.json")
    }

    /// Write a signed-in session straight into the token file.
    pub fn seed_session(&self, access: &str, refresh: &str) {
        let entries = json!({
            "access_token": access,
            "refresh_token": refresh,
            "username": "alice",
            "user_id": "7",
        });
        std::fs::write(self.store_path(), entries.to_string()).expect("Failed to seed store");
    }

    pub fn stored(&self) -> Value {
        read_store(&self.store_path())
    }

    /// Run the binary on a blocking thread so the mock server keeps serving.
    pub async fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_phantom"));
        cmd.args(args);
        cmd.arg("--api-url").arg(&self.api_url);
        cmd.arg("--store").arg(self.store_path());
        cmd.env("HOME", self.home.path());
        cmd.env("XDG_DATA_HOME", self.home.path().join("data"));
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("PHANTOM_PASSWORD");
        cmd.env_remove("RUST_LOG");

        tokio::task::spawn_blocking(move || cmd.output().expect("Failed to execute CLI"))
            .await
            .expect("CLI task panicked")
    }

    pub async fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args).await;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    pub async fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args).await;
        if output.status.success() {
            panic!("CLI command should have failed: {:?}", args);
        }
        String::from_utf8_lossy(&output.stderr).to_string()
    }
}

fn read_store(path: &Path) -> Value {
    match std::fs::read_to_string(path) {
        Ok(contents) if !contents.trim().is_empty() => {
            serde_json::from_str(&contents).expect("Store is not valid JSON")
        }
        _ => json!({}),
    }
}
