mod common;

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use common::MockServer;
use futures::future::join_all;
use tempfile::TempDir;
use tunelog::{config::CacheConfig, management::ContentCache};

fn cache(dir: &TempDir, max_items: usize) -> ContentCache {
    let mut config = CacheConfig::new(dir.path().join("art"));
    config.max_items = max_items;
    ContentCache::new(&config, reqwest::Client::new())
}

#[tokio::test]
async fn concurrent_fetches_share_one_download() {
    let server = MockServer::start().await;
    server.mock.image_delay_ms.store(200, Ordering::SeqCst);
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 10);
    let url = server.url("/img/cover.png");

    let results = join_all((0..10).map(|_| cache.fetch(&url))).await;

    let first = results[0].clone().unwrap();
    assert!(results.iter().all(|r| r.as_ref() == Some(&first)));
    assert_eq!(cache.downloads(), 1);
    assert_eq!(server.mock.image_hits.load(Ordering::SeqCst), 1);
    assert!(cache.contains_in_memory(&url));
    assert!(cache.contains_on_disk(&url).await);
}

#[tokio::test]
async fn evicted_entries_come_back_from_disk() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 2);
    let (a, b, c) = (
        server.url("/img/a.png"),
        server.url("/img/b.png"),
        server.url("/img/c.png"),
    );

    for url in [&a, &b, &c] {
        assert!(cache.fetch(url).await.is_some());
    }
    assert_eq!(cache.memory_len(), 2);
    assert!(!cache.contains_in_memory(&a));
    assert!(cache.contains_on_disk(&a).await);

    assert!(cache.fetch(&a).await.is_some());
    assert!(cache.contains_in_memory(&a));
    assert!(!cache.contains_in_memory(&b));
    assert_eq!(cache.downloads(), 3);
    assert_eq!(server.mock.image_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn disk_tier_survives_a_new_instance() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = server.url("/img/persist.png");

    let first = cache(&dir, 10).fetch(&url).await.unwrap();

    let reopened = cache(&dir, 10);
    assert!(!reopened.contains_in_memory(&url));
    assert_eq!(reopened.fetch(&url).await, Some(first));
    assert_eq!(reopened.downloads(), 0);
    assert_eq!(server.mock.image_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn undecodable_payload_is_not_cached() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 10);
    let url = server.url("/img/garbage.png");

    assert!(cache.fetch(&url).await.is_none());
    assert!(!cache.contains_in_memory(&url));
    assert!(!cache.contains_on_disk(&url).await);

    // Nothing was remembered, so the next call goes to the network again.
    assert!(cache.fetch(&url).await.is_none());
    assert_eq!(cache.downloads(), 2);
}

#[tokio::test]
async fn http_errors_are_misses() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 10);

    assert!(cache.fetch(&server.url("/img/missing.png")).await.is_none());
    assert_eq!(cache.memory_len(), 0);
    assert_eq!(cache.disk_size().await, 0);
}

#[tokio::test]
async fn failed_followers_can_retry() {
    let server = MockServer::start().await;
    server.mock.image_delay_ms.store(100, Ordering::SeqCst);
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 10);
    let url = server.url("/img/garbage.png");

    let results = join_all((0..4).map(|_| cache.fetch(&url))).await;
    assert!(results.iter().all(Option::is_none));
    assert_eq!(cache.downloads(), 1);

    assert!(cache.fetch(&url).await.is_none());
    assert_eq!(cache.downloads(), 2);
}

#[tokio::test]
async fn large_artwork_is_downscaled() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 10);

    let bytes = cache.fetch(&server.url("/img/large.png")).await.unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (640, 320));
}

#[tokio::test]
async fn oversized_values_stay_on_disk_only() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = CacheConfig::new(dir.path().join("art"));
    config.max_bytes = 16;
    let cache = ContentCache::new(&config, reqwest::Client::new());
    let url = server.url("/img/cover.png");

    assert!(cache.fetch(&url).await.is_some());
    assert!(!cache.contains_in_memory(&url));
    assert!(cache.contains_on_disk(&url).await);

    assert!(cache.fetch(&url).await.is_some());
    assert_eq!(cache.downloads(), 1);
}

#[tokio::test]
async fn clear_all_empties_both_tiers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 10);
    let url = server.url("/img/cover.png");

    let bytes = cache.fetch(&url).await.unwrap();
    assert_eq!(cache.disk_size().await, bytes.len() as u64);
    assert_eq!(cache.memory_bytes(), bytes.len());

    assert!(cache.clear_all().await);
    assert_eq!(cache.disk_size().await, 0);
    assert_eq!(cache.memory_len(), 0);
    assert!(!cache.contains_on_disk(&url).await);

    assert!(cache.fetch(&url).await.is_some());
    assert_eq!(cache.downloads(), 2);
}

#[tokio::test]
async fn truncated_disk_file_is_replaced() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 10);
    let url = server.url("/img/cover.png");

    let full = common::png(32, 32);
    let path = cache.disk_path(&url);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, &full[..full.len() / 2]).unwrap();

    let bytes = cache.fetch(&url).await.unwrap();
    assert!(image::load_from_memory(&bytes).is_ok());
    assert_eq!(cache.downloads(), 1);
    assert_eq!(std::fs::read(&path).unwrap(), bytes.as_ref());
}

#[tokio::test]
async fn disk_tier_holds_only_complete_files() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir, 10);

    cache.fetch(&server.url("/img/a.png")).await.unwrap();
    cache.fetch(&server.url("/img/b.png")).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path().join("art"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| !n.ends_with(".part")));
}

#[tokio::test]
async fn aborted_leader_releases_followers() {
    let server = MockServer::start().await;
    server.mock.image_delay_ms.store(300, Ordering::SeqCst);
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(cache(&dir, 10));
    let url = server.url("/img/cover.png");

    let leader = {
        let (cache, url) = (Arc::clone(&cache), url.clone());
        tokio::spawn(async move { cache.fetch(&url).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let followers: Vec<_> = (0..3)
        .map(|_| {
            let (cache, url) = (Arc::clone(&cache), url.clone());
            tokio::spawn(async move { cache.fetch(&url).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    leader.abort();
    for follower in followers {
        assert!(follower.await.unwrap().is_none());
    }
    assert_eq!(cache.downloads(), 1);
    assert!(!cache.contains_on_disk(&url).await);

    server.mock.image_delay_ms.store(0, Ordering::SeqCst);
    assert!(cache.fetch(&url).await.is_some());
    assert_eq!(cache.downloads(), 2);
}
