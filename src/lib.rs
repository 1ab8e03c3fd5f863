//! tunelog library
//!
//! The authenticated access layer behind a music journal: OAuth 2.0 PKCE
//! session management, bearer-token request dispatch with refresh-and-retry,
//! typed Spotify catalog endpoints, and a two-tier album art cache.
//!
//! # Modules
//!
//! - `api` - HTTP endpoints for the local OAuth callback server
//! - `app` - Component wiring done once at startup
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error taxonomy
//! - `management` - Token store and content cache
//! - `server` - Local HTTP server for OAuth callbacks
//! - `spotify` - Session, dispatcher and catalog client
//! - `types` - Data structures and type definitions
//! - `utils` - PKCE and formatting helpers
//!
//! # Example
//!
//! ```
//! use tunelog::{app::App, config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     config::load_env().await?;
//!     let app = App::build(config::Config::from_env()?)?;
//!     app.session.restore().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// Prints an informational message with a blue bullet point.
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only for fatal conditions in the binary, such as invalid configuration at
/// startup. Library code never calls this.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
