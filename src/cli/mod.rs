//! # CLI Module
//!
//! User-facing commands of the `tunelog` binary. Each command receives the
//! [`App`] built at startup and talks to the session, catalog client and
//! content cache through it.
//!
//! ## Commands
//!
//! ### Authentication
//!
//! - [`auth`] - Interactive PKCE login through the browser and the local
//!   callback server, followed by the onboarding confirmation
//! - [`logout`] - Clears persisted tokens
//! - [`status`] - Shows the current session state
//!
//! ### Catalog
//!
//! - [`search`] - Track search
//! - [`track`] - Track, audio features and primary artist in one view
//! - [`recent`] - Recently played tracks
//! - [`now_playing`] - Current playback, once or continuously
//!
//! ### Artwork
//!
//! - [`art`] - Resolves an image URL through the content cache
//! - [`cache_size`] / [`cache_clear`] - Disk cache administration
//!
//! ## Usage
//!
//! ```bash
//! tunelog auth
//! tunelog search "boards of canada"
//! tunelog now-playing --watch --interval 5
//! tunelog cache clear
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::{app::App, error};

mod art;
mod auth;
mod player;
mod tracks;

pub use art::{art, cache_clear, cache_size};
pub use auth::{auth, logout, status};
pub use player::now_playing;
pub use tracks::{recent, search, track};

fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}

fn require_login(app: &App) {
    if !app.session.is_authenticated() {
        error!("Not logged in. Please run tunelog auth");
    }
}
