//! Local llama.cpp Generator Driver: streams tokens from a GGUF model on
//! disk, enforcing stop sequences and cancellation at per-token granularity.

mod client;
mod error;
mod provider;

pub use client::{Builder, Llama};
pub use error::GeneratorError;
pub use provider::{ModelEntry, list_models};
