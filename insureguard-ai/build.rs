//! Build metadata for the startup banner and `/health`
//!
//! Emits `GIT_HASH`, `BUILD_TIMESTAMP` (UTC, RFC 3339) and `BUILD_PROFILE`.
//! Source tarballs without a `.git` directory can set `IG_BUILD_GIT_HASH`.

use std::process::Command;

const GIT_HASH_OVERRIDE: &str = "IG_BUILD_GIT_HASH";

fn main() {
    println!("cargo:rustc-env=GIT_HASH={}", git_hash());
    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    println!(
        "cargo:rustc-env=BUILD_PROFILE={}",
        std::env::var("PROFILE").as_deref().unwrap_or("unknown")
    );
    println!("cargo:rerun-if-env-changed={}", GIT_HASH_OVERRIDE);
}

fn git_hash() -> String {
    if let Some(hash) = std::env::var(GIT_HASH_OVERRIDE).ok().filter(|h| !h.trim().is_empty()) {
        return hash.trim().to_string();
    }

    let head = command_stdout("git", &["rev-parse", "--short=8", "HEAD"]);
    let dirty = command_stdout("git", &["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|changes| !changes.is_empty());

    match head {
        Some(hash) if dirty => format!("{}-dirty", hash),
        Some(hash) => hash,
        None => "unknown".to_string(),
    }
}

/// Trimmed stdout of a successful command
fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}
