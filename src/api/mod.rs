//! # API Module
//!
//! HTTP endpoints served by the local loopback server while an interactive
//! login is in progress.
//!
//! ## Endpoints
//!
//! - [`callback`] - Receives the OAuth redirect (`code`, `state`, `error`) and
//!   hands it to [`crate::spotify::AuthSession::complete_login`]. The outcome is
//!   forwarded to the waiting login command through a one-shot channel.
//! - [`health`] - Reports version and current authentication state.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use axum::{Extension, Router, routing::get};
//! use tunelog::api::{CallbackState, callback, health};
//!
//! let (state, outcome) = CallbackState::new(session);
//! let app = Router::new()
//!     .route("/callback", get(callback))
//!     .route("/health", get(health))
//!     .layer(Extension(state));
//! ```

mod callback;
mod health;

pub use callback::{CallbackState, LoginOutcome, callback};
pub use health::health;
