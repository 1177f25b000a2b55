use std::process::Command;

/// Stamps the short git revision into `BUILD_GIT_SHA` for the start-up log.
/// `POS_BUILD_SHA` wins when set, for builds from a source tarball.
fn main() {
    println!("cargo:rerun-if-env-changed=POS_BUILD_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let sha = std::env::var("POS_BUILD_SHA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(git_short_sha)
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=BUILD_GIT_SHA={}", sha.trim());
}

fn git_short_sha() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short=9", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8(out.stdout).ok()
}
