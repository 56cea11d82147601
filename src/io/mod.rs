//! Input/Output handling for the CLI.
//!
//! This module provides consistent exit codes derived from pipeline errors.

pub mod exit_code;

pub use exit_code::ExitCode;
