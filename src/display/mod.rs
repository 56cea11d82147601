//! Terminal display utilities for CLI output.
//!
//! Provides progress bars, spinners, and a shared color theme.

pub mod progress;
pub mod theme;

pub use progress::{create_progress_bar, create_spinner, with_spinner};
pub use theme::{THEME, Theme};
