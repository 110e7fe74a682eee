//! Build script to stamp the binary with a version and git SHA.
//!
//! Environment variables (set by CI or fall back to defaults):
//! - YAMAHA_BRIDGE_VERSION: Version string (defaults to CARGO_PKG_VERSION)
//! - YAMAHA_BRIDGE_GIT_SHA: Git commit SHA (defaults to git rev-parse, then "unknown")

use std::process::Command;

fn main() {
    let version = std::env::var("YAMAHA_BRIDGE_VERSION").unwrap_or_else(|_| {
        std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".into())
    });
    println!("cargo:rustc-env=YAMAHA_BRIDGE_VERSION={}", version);

    let git_sha = std::env::var("YAMAHA_BRIDGE_GIT_SHA")
        .or_else(|_| std::env::var("GITHUB_SHA").map(|s| s.chars().take(7).collect()))
        .unwrap_or_else(|_| short_git_sha());
    println!("cargo:rustc-env=YAMAHA_BRIDGE_GIT_SHA={}", git_sha);

    println!("cargo:rerun-if-env-changed=YAMAHA_BRIDGE_VERSION");
    println!("cargo:rerun-if-env-changed=YAMAHA_BRIDGE_GIT_SHA");
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");
}

fn short_git_sha() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".into())
}
