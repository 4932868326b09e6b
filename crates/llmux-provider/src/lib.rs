//! Provider adapters and per-call retry for llmux.
//!
//! Exposes the `ProviderAdapter` seam, the retrying invoker that wraps one
//! adapter call, subprocess adapters for the claude/gemini/codex CLIs,
//! executable discovery, and the install-based remediation hook.

pub mod adapter;
pub mod claude;
pub mod codex;
pub mod executable;
pub mod factory;
pub mod gemini;
pub mod install;
pub mod process;
pub mod retry;

pub use adapter::{MessageStream, ProviderAdapter};
pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use executable::{is_executable_available, resolve_executable};
pub use factory::build_adapter;
pub use gemini::GeminiAdapter;
pub use install::{npm_package, BunInstaller, InstallOutcome, Installer};
pub use retry::{backoff_delay, run_with_retry};
