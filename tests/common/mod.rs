#![allow(dead_code)]

use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use image::{ImageFormat, RgbImage};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tunelog::{
    config::{CacheConfig, Config, OAuthConfig},
    management::TokenStore,
    spotify::AuthSession,
};

/// Knobs and counters shared between a test and its mock server.
#[derive(Default)]
pub struct Mock {
    pub token_hits: AtomicUsize,
    pub me_hits: AtomicUsize,
    pub api_hits: AtomicUsize,
    pub image_hits: AtomicUsize,
    pub recent_hits: AtomicUsize,

    /// Bearer token the API accepts.
    pub valid_access: Mutex<String>,
    /// Refresh token the token endpoint accepts; empty accepts any.
    pub valid_refresh: Mutex<String>,
    pub token_fails: AtomicBool,
    pub rotate_refresh: AtomicBool,
    pub token_delay_ms: AtomicU64,

    pub recent_fails: AtomicBool,
    pub nothing_playing: AtomicBool,
    pub playing_delay_ms: AtomicU64,
    pub image_delay_ms: AtomicU64,

    /// Last form posted to the token endpoint.
    pub last_form: Mutex<HashMap<String, String>>,
}

impl Mock {
    pub fn accept(&self, access: &str) {
        *self.valid_access.lock() = access.to_string();
    }
}

pub struct MockServer {
    pub base: String,
    pub mock: Arc<Mock>,
}

impl MockServer {
    pub async fn start() -> Self {
        let mock = Arc::new(Mock::default());
        let app = Router::new()
            .route("/token", post(token))
            .route("/v1/me", get(me))
            .route("/v1/me/player/recently-played", get(recently_played))
            .route("/v1/me/player/currently-playing", get(currently_playing))
            .route("/v1/tracks/{id}", get(track))
            .route("/v1/audio-features/{id}", get(features))
            .route("/v1/artists/{id}", get(artist))
            .route("/v1/search", get(search))
            .route("/v1/broken", get(broken))
            .route("/img/{name}", get(image_file))
            .with_state(Arc::clone(&mock));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            mock,
        }
    }

    pub fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client".into(),
            redirect_uri: "http://127.0.0.1:8888/callback".into(),
            scope: "user-read-recently-played".into(),
            auth_url: format!("{}/authorize", self.base),
            token_url: format!("{}/token", self.base),
            api_url: format!("{}/v1", self.base),
        }
    }

    pub fn config(&self, cache_dir: &std::path::Path) -> Config {
        Config {
            oauth: self.oauth_config(),
            cache: CacheConfig::new(cache_dir),
            server_address: "127.0.0.1:0".into(),
            keyring_service: "tunelog.test".into(),
            request_timeout: Duration::from_secs(5),
            refresh_wait: Duration::from_secs(5),
        }
    }

    pub fn session(&self, store: TokenStore) -> Arc<AuthSession> {
        Arc::new(AuthSession::new(
            self.oauth_config(),
            reqwest::Client::new(),
            store,
            Duration::from_secs(5),
        ))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn authorized(mock: &Mock, headers: &HeaderMap) -> bool {
    bearer(headers).as_deref() == Some(mock.valid_access.lock().as_str())
}

async fn sleep_ms(ms: &AtomicU64) {
    let ms = ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

async fn token(State(mock): State<Arc<Mock>>, Form(form): Form<HashMap<String, String>>) -> Response {
    let n = mock.token_hits.fetch_add(1, Ordering::SeqCst) + 1;
    *mock.last_form.lock() = form.clone();
    sleep_ms(&mock.token_delay_ms).await;

    if mock.token_fails.load(Ordering::SeqCst) {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response();
    }
    if form.get("grant_type").map(String::as_str) == Some("refresh_token") {
        let expected = mock.valid_refresh.lock().clone();
        if !expected.is_empty() && form.get("refresh_token") != Some(&expected) {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
                .into_response();
        }
    }

    let access = format!("access-{}", n);
    mock.accept(&access);

    let mut body = json!({
        "access_token": access,
        "token_type": "Bearer",
        "scope": "user-read-recently-played",
        "expires_in": 3600,
    });
    let first_grant = form.get("grant_type").map(String::as_str) == Some("authorization_code");
    if first_grant || mock.rotate_refresh.load(Ordering::SeqCst) {
        body["refresh_token"] = json!(format!("refresh-{}", n));
    }
    Json(body).into_response()
}

async fn me(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Response {
    mock.me_hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&mock, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"id": "listener", "display_name": "Listener"})).into_response()
}

pub fn track_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Song {}", id),
        "uri": format!("spotify:track:{}", id),
        "duration_ms": 215_000,
        "artists": [{"id": "artist-1", "name": "Nina Simone"}],
        "album": {
            "id": "album-1",
            "name": "Pastel Blues",
            "images": [
                {"url": "https://i.example.com/640.jpg", "width": 640, "height": 640},
                {"url": "https://i.example.com/64.jpg", "width": 64, "height": 64}
            ]
        }
    })
}

async fn recently_played(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Response {
    mock.recent_hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&mock, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if mock.recent_fails.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({
        "items": [
            {"track": track_json("t1"), "played_at": "2024-05-01T10:00:00Z"},
            {"track": track_json("t2"), "played_at": "2024-05-01T09:55:00.123Z"}
        ]
    }))
    .into_response()
}

async fn currently_playing(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Response {
    mock.api_hits.fetch_add(1, Ordering::SeqCst);
    sleep_ms(&mock.playing_delay_ms).await;
    if !authorized(&mock, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if mock.nothing_playing.load(Ordering::SeqCst) {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(json!({
        "is_playing": true,
        "progress_ms": 61_000,
        "timestamp": 1_714_557_600_000u64,
        "item": track_json("t1"),
    }))
    .into_response()
}

async fn track(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    mock.api_hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&mock, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id == "missing" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(track_json(&id)).into_response()
}

async fn features(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    mock.api_hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&mock, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "id": id,
        "danceability": 0.5,
        "energy": 0.25,
        "valence": 0.75,
        "tempo": 120.0
    }))
    .into_response()
}

async fn artist(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    mock.api_hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&mock, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "id": id,
        "name": "Nina Simone",
        "genres": ["jazz", "soul"],
        "popularity": 71
    }))
    .into_response()
}

async fn search(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Response {
    mock.api_hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&mock, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "tracks": {"items": [track_json("t1"), track_json("t2")], "next": null, "total": 2}
    }))
    .into_response()
}

async fn broken(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Response {
    mock.api_hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&mock, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    (StatusCode::OK, "{\"id\": ").into_response()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

async fn image_file(State(mock): State<Arc<Mock>>, Path(name): Path<String>) -> Response {
    mock.image_hits.fetch_add(1, Ordering::SeqCst);
    sleep_ms(&mock.image_delay_ms).await;
    match name.as_str() {
        "garbage.png" => (StatusCode::OK, "definitely not an image").into_response(),
        "missing.png" => StatusCode::NOT_FOUND.into_response(),
        "large.png" => ([(header::CONTENT_TYPE, "image/png")], png(1200, 600)).into_response(),
        _ => ([(header::CONTENT_TYPE, "image/png")], png(32, 32)).into_response(),
    }
}

/// Runs the PKCE login against the mock and confirms onboarding.
pub async fn login(session: &AuthSession) {
    let request = session.begin_login().unwrap();
    session
        .complete_login(tunelog::types::AuthCallback {
            code: Some("auth-code".into()),
            state: Some(request.state),
            error: None,
        })
        .await
        .unwrap();
    assert!(session.finish_onboarding());
}
