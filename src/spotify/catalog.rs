use std::sync::Arc;

use crate::{
    spotify::dispatch::{ApiRequest, RequestDispatcher},
    types::{
        ArtistDetail, AudioFeatures, PlayHistory, PlaybackState, RecentlyPlayedResponse,
        SearchResponse, Track, TrackDetails,
    },
};

pub const SEARCH_LIMIT: u32 = 20;
pub const RECENTLY_PLAYED_MAX: u32 = 50;

/// Typed Web API endpoints. Holds no state besides the dispatcher.
pub struct RemoteCatalogClient {
    dispatcher: Arc<RequestDispatcher>,
}

impl RemoteCatalogClient {
    pub fn new(dispatcher: Arc<RequestDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn search(&self, query: &str) -> Vec<Track> {
        let request = ApiRequest::get("/search")
            .query("q", query)
            .query("type", "track")
            .query("limit", SEARCH_LIMIT);

        self.dispatcher
            .execute::<SearchResponse>(&request)
            .await
            .map(|res| res.tracks.items)
            .unwrap_or_default()
    }

    pub async fn get_track(&self, track_id: &str) -> Option<Track> {
        self.dispatcher
            .execute(&ApiRequest::get(format!("/tracks/{}", track_id)))
            .await
    }

    pub async fn get_features(&self, track_id: &str) -> Option<AudioFeatures> {
        self.dispatcher
            .execute(&ApiRequest::get(format!("/audio-features/{}", track_id)))
            .await
    }

    pub async fn get_artist(&self, artist_id: &str) -> Option<ArtistDetail> {
        self.dispatcher
            .execute(&ApiRequest::get(format!("/artists/{}", artist_id)))
            .await
    }

    /// `None` when nothing is playing (the endpoint answers `204`).
    pub async fn get_currently_playing(&self) -> Option<PlaybackState> {
        self.dispatcher
            .execute(&ApiRequest::get("/me/player/currently-playing"))
            .await
    }

    pub async fn get_recently_played(&self, limit: u32) -> Vec<PlayHistory> {
        let request = ApiRequest::get("/me/player/recently-played")
            .query("limit", limit.clamp(1, RECENTLY_PLAYED_MAX));

        self.dispatcher
            .execute::<RecentlyPlayedResponse>(&request)
            .await
            .map(|res| res.items)
            .unwrap_or_default()
    }

    /// Loads a track, then its audio features and primary artist side by side.
    pub async fn track_details(&self, track_id: &str) -> Option<TrackDetails> {
        let track = self.get_track(track_id).await?;
        let artist_id = track.primary_artist().map(|a| a.id.clone());

        let (features, artist) = tokio::join!(self.get_features(track_id), async {
            match artist_id {
                Some(id) => self.get_artist(&id).await,
                None => None,
            }
        });

        Some(TrackDetails {
            track,
            features,
            artist,
        })
    }
}
