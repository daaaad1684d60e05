//! Mirador CLI Library
//!
//! Command-line runner for Mirador suites: argument parsing, console output,
//! and concurrent case execution over chromium pages.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, FormatArg, InitArgs, LogFormatArg, RunArgs, ShowArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_outline, OutputFormat, ProgressReporter};
pub use runner::{run_cases, SuiteRunner};
