//! Embeds a version string for `phantom --version`.
//!
//! Release builds can pin it with `PHANTOM_BUILD_VERSION`; otherwise it comes
//! from `git describe`, falling back to the crate version outside a checkout.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=PHANTOM_BUILD_VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let version = std::env::var("PHANTOM_BUILD_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(describe)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=PHANTOM_VERSION={version}");
}

fn describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    match described.trim() {
        "" => None,
        v => Some(v.trim_start_matches('v').to_string()),
    }
}
