//! Build script: embeds the git hash and checks GPU toolkits for whisper builds.
//!
//! whisper-rs-sys fails deep inside cmake when a GPU toolkit is missing, so the
//! toolkit is probed up front and the build stops with an actionable message.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        require_tool("nvcc", &["--version"], "CUDA toolkit", "https://developer.nvidia.com/cuda-downloads");
    }
    if cfg!(feature = "vulkan") {
        require_tool("vulkaninfo", &["--summary"], "Vulkan SDK", "https://vulkan.lunarg.com/");
    }
}

fn require_tool(tool: &str, args: &[&str], toolkit: &str, url: &str) {
    let found = Command::new(tool)
        .args(args)
        .output()
        .is_ok_and(|out| out.status.success());
    if !found {
        panic!(
            "\n\n`{tool}` not found: {toolkit} is not installed.\n\
             Install: {url}\n\
             Or build without GPU acceleration: cargo build --release\n"
        );
    }
    if let Some(version) = tool_version(tool, args) {
        println!("cargo::warning={toolkit} detected: {version}");
    }
}

/// First non-empty line that mentions a version, e.g. nvcc's "release 12.4" line.
fn tool_version(tool: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(tool).args(args).output().ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    parse_version_line(&text)
}

fn parse_version_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| line.contains("release ") || line.contains("Version"))
        .map(str::to_string)
}
