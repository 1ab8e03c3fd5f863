use std::{sync::Arc, time::Duration};

use crate::{
    app::App,
    cli::{require_login, spinner},
    info,
    spotify::spawn_poller,
    types::PlaybackState,
    utils::format_duration_ms,
    warning,
};

pub async fn now_playing(app: &App, watch: bool, interval_secs: u64) {
    require_login(app);

    if !watch {
        let pb = spinner("Checking playback...");
        let playback = app.catalog.get_currently_playing().await;
        pb.finish_and_clear();
        print_playback(playback.as_ref());
        return;
    }

    let every = Duration::from_secs(interval_secs.max(1));
    let poller = spawn_poller(Arc::clone(&app.catalog), every, app.config.request_timeout);
    let mut updates = poller.updates();
    info!("Watching playback every {}s. Press Ctrl-C to stop.", every.as_secs());

    let mut last_track: Option<String> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let playback = updates.borrow_and_update().clone();
                let current = playback.as_ref().and_then(|p| p.item.as_ref()).map(|t| t.id.clone());
                if current != last_track {
                    print_playback(playback.as_ref());
                    last_track = current;
                }
            }
        }
    }

    poller.shutdown().await;
}

fn print_playback(playback: Option<&PlaybackState>) {
    match playback {
        Some(PlaybackState {
            is_playing,
            progress_ms,
            item: Some(track),
            ..
        }) => {
            let verb = if *is_playing { "Playing" } else { "Paused" };
            info!(
                "{}: {} - {} [{} / {}]",
                verb,
                track.artist_names(),
                track.name,
                format_duration_ms(progress_ms.unwrap_or(0)),
                format_duration_ms(track.duration_ms)
            );
        }
        Some(_) => warning!("Something is playing, but it is not a track."),
        None => warning!("Nothing is playing."),
    }
}
