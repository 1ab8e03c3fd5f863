//! # Spotify Integration Module
//!
//! This module is the authenticated access layer between tunelog and the
//! Spotify Web API. It owns the OAuth session, sends every bearer-token
//! request, and exposes the typed endpoints the journal needs.
//!
//! ## Architecture
//!
//! ```text
//! CLI / journal views
//!          ↓
//! RemoteCatalogClient   (catalog)   search, features, artist, now playing
//!          ↓
//! RequestDispatcher     (dispatch)  bearer header, 401 → refresh → one retry
//!          ↓
//! AuthSession           (auth)      PKCE login, state machine, single-flight refresh
//!          ↓
//! oauth / TokenStore                token endpoint, OS secret store
//! ```
//!
//! ## Authentication Strategy
//!
//! Login uses OAuth 2.0 Authorization Code with PKCE (RFC 7636):
//! 1. **Code Verifier Generation**: 43 random characters from the unreserved alphabet
//! 2. **Challenge Creation**: `base64url(SHA-256(verifier))`, unpadded
//! 3. **Authorization Request**: user agent is sent to the authorize endpoint with
//!    the challenge and a random `state` nonce
//! 4. **Redirect**: the loopback server hands `code` and `state` back to the session,
//!    which rejects a mismatched `state`
//! 5. **Token Exchange**: code + verifier are exchanged for the token pair
//! 6. **Token Storage**: both tokens go to the OS secret store
//!
//! ## Refresh and Retry
//!
//! - A missing in-memory access token triggers a refresh before the request is sent
//! - A `401` triggers a refresh, then the original request is retried exactly once
//! - Concurrent refresh requests collapse into a single token exchange
//! - A failed refresh logs the session out; every other failure is soft and
//!   surfaces as `None`
//! - `204 No Content` is a normal, empty answer (nothing playing)
//!
//! ## API Coverage
//!
//! - `GET /search?type=track` - track search
//! - `GET /tracks/{id}` - track lookup
//! - `GET /audio-features/{id}` - mood and tempo descriptors
//! - `GET /artists/{id}` - artist genres and popularity
//! - `GET /me/player/currently-playing` - playback state
//! - `GET /me/player/recently-played` - listening history
//! - `GET /me` - credential validation during restore
//! - `POST /api/token` - code exchange and refresh

pub mod auth;
pub mod catalog;
pub mod dispatch;
pub mod oauth;
pub mod player;

pub use auth::{AuthSession, AuthState, AuthorizationRequest};
pub use catalog::RemoteCatalogClient;
pub use dispatch::{ApiRequest, RequestDispatcher, ResponseClass};
pub use player::{PollerHandle, spawn_poller};
