//! Command Line Interface (CLI) layer for tiletrend.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the dispatch logic (`runner`) for the split, analysis, smoothing,
//! merge and end-to-end subcommands. It wires user-provided options to the
//! library functionality exposed via `tiletrend::api`.
//!
//! If you are embedding tiletrend into another application, prefer using
//! the high-level `tiletrend::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
