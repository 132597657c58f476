//! `answerpipe` crate (library surface).
//!
//! The primary entrypoint is the `answerpipe` binary (CLI + MCP stdio). This
//! library re-exports the building blocks for embedding.

pub use answerpipe_core as core;
pub use answerpipe_openai as openai;
