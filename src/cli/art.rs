use crate::{app::App, cli::spinner, info, success, utils::format_bytes, warning};

pub async fn art(app: &App, url: &str) {
    let pb = spinner("Resolving artwork...");
    let bytes = app.cache.fetch(url).await;
    pb.finish_and_clear();

    match bytes {
        Some(bytes) => {
            success!("Artwork ready ({}).", format_bytes(bytes.len() as u64));
            info!("Stored at {}", app.cache.disk_path(url).display());
            info!(
                "Memory tier: {} entries, {}",
                app.cache.memory_len(),
                format_bytes(app.cache.memory_bytes() as u64)
            );
        }
        None => warning!("Artwork could not be loaded from {}", url),
    }
}

pub async fn cache_size(app: &App) {
    let size = app.cache.disk_size().await;
    info!(
        "Artwork cache at {} uses {}",
        app.config.cache.dir.display(),
        format_bytes(size)
    );
}

pub async fn cache_clear(app: &App) {
    if app.cache.clear_all().await {
        success!("Artwork cache cleared.");
    } else {
        warning!("Artwork cache could not be fully cleared.");
    }
}
