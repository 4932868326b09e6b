//! Shared leaf types for the llmux workspace.
//!
//! Message model, per-call query options, the failure taxonomy with its
//! classification heuristics, and configuration loading. No I/O beyond
//! config file reads; provider execution lives in `llmux-provider`.

pub mod config;
pub mod error;
pub mod options;
pub mod types;

pub use config::{AdapterSettings, Config};
pub use error::{classify_failure, is_missing_executable_text, FailureClass, LlmuxError};
pub use options::QueryOptions;
pub use types::{ContentBlock, Message, MessageRole, Provider};
