use std::process::Command;

fn main() {
    // Embed the short git hash for --version and /api/version.
    // Falls back to "unknown" outside a git checkout (e.g. crate builds).
    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=BUILD_GIT_HASH={hash}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
}
