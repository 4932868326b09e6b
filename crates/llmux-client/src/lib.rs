//! Dispatch core for llmux.
//!
//! Owns the provider registry and composes the retrying invoker into the
//! four query strategies: single provider with missing-executable
//! self-healing, uniform-random selection, parallel fan-out over every
//! provider, and failure-driven rotation.

pub mod client;

pub use client::{AdapterFactory, LlmuxClient};
