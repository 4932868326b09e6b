//! Remediation hook: make a provider's backend executable available.
//!
//! The dispatch layer invokes this at most once per call, after a failure
//! classified as missing-executable. Installation itself is synchronous and
//! is never retried; the caller decides what a failed install means.

use std::path::PathBuf;
use std::process::Command;

use llmux_core::Provider;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of one remediation attempt.
pub struct InstallOutcome {
    pub installed: bool,
    pub message: String,
}

impl InstallOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            installed: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            installed: false,
            message: message.into(),
        }
    }
}

/// Remediation hook consumed by the dispatch core. `None` means no
/// remediation is mapped for the provider (no self-healing possible).
pub trait Installer: Send + Sync {
    fn install(&self, provider: Provider) -> Option<InstallOutcome>;
}

/// npm package backing each provider's CLI. The static mapping doubles as
/// the "is remediation available" check.
pub fn npm_package(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Claude => Some("@anthropic-ai/claude-code"),
        Provider::Gemini => Some("@google/gemini-cli"),
        Provider::Codex => Some("@openai/codex"),
    }
}

/// Installs provider CLIs globally through bun, bootstrapping bun itself
/// from the official installer script when absent.
pub struct BunInstaller;

const BUN_INSTALL_SCRIPT: &str = "curl -fsSL https://bun.sh/install | bash";

fn bun_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".bun").join("bin").join("bun"))
}

fn ensure_bun_installed() -> Result<PathBuf, String> {
    let Some(bun) = bun_path() else {
        return Err("cannot determine home directory for bun".to_string());
    };
    if bun.is_file() {
        tracing::debug!(path = %bun.display(), "bun found");
        return Ok(bun);
    }

    tracing::info!("bun not found, installing");
    let output = Command::new("bash")
        .arg("-c")
        .arg(BUN_INSTALL_SCRIPT)
        .output()
        .map_err(|error| format!("failed to run bun installer: {error}"))?;
    if !output.status.success() {
        return Err(format!(
            "bun installer failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    if !bun.is_file() {
        return Err("bun installation finished but executable not found".to_string());
    }
    Ok(bun)
}

fn install_global_package(bun: &PathBuf, package: &str) -> Result<(), String> {
    tracing::info!(package, "installing provider package");
    let output = Command::new(bun)
        .args(["add", "-g", package])
        .output()
        .map_err(|error| format!("failed to run bun add: {error}"))?;
    if !output.status.success() {
        return Err(format!(
            "bun add -g {package} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

impl Installer for BunInstaller {
    fn install(&self, provider: Provider) -> Option<InstallOutcome> {
        let package = npm_package(provider)?;
        let outcome = match ensure_bun_installed()
            .and_then(|bun| install_global_package(&bun, package))
        {
            Ok(()) => InstallOutcome::success(format!("{package} installed")),
            Err(message) => {
                tracing::error!(provider = provider.as_str(), %message, "install failed");
                InstallOutcome::failure(message)
            }
        };
        Some(outcome)
    }
}
