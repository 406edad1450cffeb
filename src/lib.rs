pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use adapters::terminal::{TerminalPrompt, TerminalView};
pub use adapters::wedge::WedgeScanner;
pub use config::AppConfig;
pub use crate::core::{app::ScanApp, lookup::LookupClient};
pub use utils::error::{AppError, Result};
