//! Local state owned by this process: persisted credentials and the album
//! art cache.

mod cache;
mod tokens;

pub use cache::{ContentCache, normalize_artwork};
pub use tokens::{KeyringBackend, MemoryBackend, SecretBackend, TokenKind, TokenStore};
