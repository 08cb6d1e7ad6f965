//! sp-convert - conversion pipeline for Sparkport
//!
//! This crate drives statements through the escalation state machine
//! (rewrite, syntax gate, semantic checks, one AI round, manual review),
//! runs whole directories on a bounded worker pool, classifies service
//! messages into root causes, executes converted statements in the
//! integration pass and writes the output artifacts.

pub mod classify;
pub mod discover;
pub mod error;
pub mod integrate;
pub mod orchestrator;
pub mod render;
pub mod runner;

pub use classify::classify_message;
pub use discover::{discover_files, discover_units, load_unit, SourceFile};
pub use error::{ConvertError, ConvertResult};
pub use integrate::IntegrationPass;
pub use orchestrator::Orchestrator;
pub use render::{read_outcomes, render_unit, write_json, write_units};
pub use runner::{BatchRunner, ProgressFn};
