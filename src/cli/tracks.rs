use tabled::Table;

use crate::{
    app::App,
    cli::{require_login, spinner},
    info,
    types::{HistoryTableRow, TrackTableRow},
    utils::{format_bytes, format_duration_ms},
    warning,
};

const ARTWORK_MIN_WIDTH: u32 = 300;

pub async fn search(app: &App, query: &str) {
    require_login(app);

    let pb = spinner(format!("Searching for \"{}\"...", query));
    let tracks = app.catalog.search(query).await;
    pb.finish_and_clear();

    if tracks.is_empty() {
        warning!("No tracks found.");
        return;
    }

    let rows: Vec<TrackTableRow> = tracks.iter().map(TrackTableRow::from).collect();
    println!("{}", Table::new(rows));
}

pub async fn track(app: &App, track_id: &str) {
    require_login(app);

    let pb = spinner("Fetching track details...");
    let details = app.catalog.track_details(track_id).await;
    pb.finish_and_clear();

    let Some(details) = details else {
        warning!("Track {} not found.", track_id);
        return;
    };

    let track = &details.track;
    info!("{} by {}", track.name, track.artist_names());
    info!("Album: {}", track.album.name);
    info!("Length: {}", format_duration_ms(track.duration_ms));

    match &details.features {
        Some(f) => info!(
            "Tempo {:.0} bpm, energy {:.2}, danceability {:.2}, valence {:.2}",
            f.tempo, f.energy, f.danceability, f.valence
        ),
        None => warning!("Audio features unavailable."),
    }

    if let Some(artist) = &details.artist {
        if !artist.genres.is_empty() {
            info!("Genres: {}", artist.genres.join(", "));
        }
        info!("Artist popularity: {}", artist.popularity);
    }

    if let Some(url) = track.artwork_url(ARTWORK_MIN_WIDTH) {
        match app.cache.fetch(url).await {
            Some(bytes) => info!(
                "Artwork: {} ({})",
                app.cache.disk_path(url).display(),
                format_bytes(bytes.len() as u64)
            ),
            None => warning!("Artwork unavailable."),
        }
    }
}

pub async fn recent(app: &App, limit: u32) {
    require_login(app);

    let pb = spinner("Fetching recently played tracks...");
    let history = app.catalog.get_recently_played(limit).await;
    pb.finish_and_clear();

    if history.is_empty() {
        warning!("Nothing played recently.");
        return;
    }

    let rows: Vec<HistoryTableRow> = history
        .iter()
        .map(|h| HistoryTableRow {
            played_at: h.played_at.format("%Y-%m-%d %H:%M").to_string(),
            name: h.track.name.clone(),
            artists: h.track.artist_names(),
        })
        .collect();
    println!("{}", Table::new(rows));
}
