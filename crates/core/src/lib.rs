//! depwatch core library.
//!
//! Pre-commit dependency conflict detection for npm, pnpm and yarn
//! projects: configuration, package manager selection, the probes and the
//! cascade that orders them, and the advisory step that explains a
//! detected conflict.

pub mod advisory;
pub mod cascade;
pub mod config;
pub mod errors;
pub mod manager;
pub mod manifest;
pub mod models;
pub mod probes;
pub mod process;

// Re-exports for convenience.
pub use advisory::{advise, fallback_advice, AdvisoryGenerator, LanguageModel, LlmClient};
pub use cascade::{CascadeStage, ConflictCascade};
pub use config::DepwatchConfig;
pub use manager::PackageManager;
pub use models::{AdvisoryResult, ChangeSet, ConflictKind, ConflictRecord};
pub use process::{CommandOutput, CommandRunner, SystemRunner};
