use std::process::Command;

/// Playwright driver release matching the `playwright-rs` crate.
const PLAYWRIGHT_RELEASE: &str = "playwright@1.56.1";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=PLAYWRIGHT_SKIP_INSTALL");
    println!("cargo:rerun-if-changed=build.rs");

    if std::env::var("PLAYWRIGHT_SKIP_INSTALL").as_deref() == Ok("1") {
        println!("cargo:warning=PLAYWRIGHT_SKIP_INSTALL=1, not installing the browser");
        return Ok(());
    }

    if std::env::var("CARGO_FEATURE_PLAYWRIGHT").is_err() {
        return Ok(());
    }

    let has_npx = Command::new("which")
        .arg("npx")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !has_npx {
        println!("cargo:warning=npx not found in PATH; run `npx {PLAYWRIGHT_RELEASE} install chromium` before `cpn-e2e run`");
        return Ok(());
    }

    // The harness only ever drives Chromium.
    let status = Command::new("npx")
        .args([PLAYWRIGHT_RELEASE, "install", "chromium"])
        .status()?;

    if !status.success() {
        return Err(format!(
            "`npx {PLAYWRIGHT_RELEASE} install chromium` exited with {}",
            status.code().unwrap_or(-1)
        )
        .into());
    }

    Ok(())
}
