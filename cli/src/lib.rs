//! Command-line shell for the offline RAG engine.
//!
//! This crate provides the process-wide configuration layer, the prompt
//! composer that turns retrieval results into a generation request, and the
//! document-root indexer the `quarry index` subcommand drives. The
//! interactive loop itself lives in `main.rs`.

pub mod config;
pub mod indexer;
pub mod prompt;

pub use config::{ConfigBuilder, ConfigError, CoreConfig, CoreContext};
pub use indexer::{IndexEvent, index_database};
pub use prompt::PromptComposer;
