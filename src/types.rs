use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Result of an authorization-code or refresh-token grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    /// Absent when the server does not rotate refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(skip_deserializing, default = "now_timestamp")]
    pub obtained_at: u64,
}

fn default_expires_in() -> u64 {
    3600
}

fn now_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// The credential pair held in memory by the auth session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Query parameters delivered to the OAuth redirect handler.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleArtist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    pub album: Album,
}

impl Track {
    pub fn primary_artist(&self) -> Option<&SimpleArtist> {
        self.artists.first()
    }

    /// Smallest album image at least `min_width` wide, or the largest available.
    pub fn artwork_url(&self, min_width: u32) -> Option<&str> {
        let mut images: Vec<&Image> = self.album.images.iter().collect();
        images.sort_by_key(|i| i.width.unwrap_or(0));
        images
            .iter()
            .find(|i| i.width.unwrap_or(0) >= min_width)
            .or_else(|| images.last())
            .map(|i| i.url.as_str())
    }

    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub tracks: Paging<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    pub danceability: f32,
    pub energy: f32,
    pub valence: f32,
    pub tempo: f32,
    #[serde(default)]
    pub acousticness: f32,
    #[serde(default)]
    pub instrumentalness: f32,
    #[serde(default)]
    pub speechiness: f32,
    #[serde(default)]
    pub liveness: f32,
    #[serde(default)]
    pub loudness: f32,
    #[serde(default)]
    pub key: i32,
    #[serde(default)]
    pub mode: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    /// `None` for podcasts, ads or private sessions.
    #[serde(default)]
    pub item: Option<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayHistory {
    pub track: Track,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentlyPlayedResponse {
    pub items: Vec<PlayHistory>,
}

/// Everything the journal shows for one track, gathered concurrently.
#[derive(Debug, Clone)]
pub struct TrackDetails {
    pub track: Track,
    pub features: Option<AudioFeatures>,
    pub artist: Option<ArtistDetail>,
}

#[derive(Tabled)]
pub struct TrackTableRow {
    pub id: String,
    pub name: String,
    pub artists: String,
    pub album: String,
}

impl From<&Track> for TrackTableRow {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            artists: track.artist_names(),
            album: track.album.name.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct HistoryTableRow {
    pub played_at: String,
    pub name: String,
    pub artists: String,
}
