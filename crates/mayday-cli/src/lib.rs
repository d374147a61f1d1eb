//! Mayday CLI
//!
//! Thin shell around the engine: argument parsing, configuration loading,
//! logging setup, the TCP gateway link, and the interactive command loop.

pub mod cli;
pub mod error;
pub mod link;
pub mod repl;

pub use error::{CliError, Result};
