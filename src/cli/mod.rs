//! Command Line Interface (CLI) layer for satex.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for directory extraction and
//! date-range chunking. It wires user-provided options to the underlying
//! library functionality exposed via `satex::api`.
//!
//! If you are embedding satex into another application, prefer using
//! the high-level `satex::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
