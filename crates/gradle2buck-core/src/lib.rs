//! gradle2buck core library: per-package Buck build files for Gradle Java
//! projects.
//!
//! A run indexes every Java source under the configured source roots,
//! resolves each file's imports and qualified references to project packages
//! or external Maven artifacts, rejects dependency cycles, and renders one
//! build file per package. See [`run::run`] for the stage order.

pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod errors;
pub mod graph;
pub mod indexer;
pub mod models;
pub mod run;

pub use config::GeneratorConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, ExitStatus, RunReport};
pub use errors::{GeneratorError, GeneratorResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
