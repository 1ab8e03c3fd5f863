use std::{
    collections::HashMap,
    io::{Cursor, ErrorKind},
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use futures::StreamExt;
use image::{ImageFormat, imageops::FilterType};
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::{config::CacheConfig, error::Result, utils};

/// `None` while the download runs, then `Some(outcome)`.
type Slot = Option<Option<Bytes>>;

/// Bounded in-memory tier. The LRU list is unbounded; the count and byte
/// limits are enforced on insert.
pub(crate) struct MemoryTier {
    entries: LruCache<String, Bytes>,
    total_bytes: usize,
    max_items: usize,
    max_bytes: usize,
}

impl MemoryTier {
    pub(crate) fn new(max_items: usize, max_bytes: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_bytes: 0,
            max_items,
            max_bytes,
        }
    }

    /// Marks the entry as most recently used.
    pub(crate) fn get(&mut self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Returns the keys evicted to make room.
    pub(crate) fn insert(&mut self, key: String, value: Bytes) -> Vec<String> {
        if let Some(old) = self.entries.pop(&key) {
            self.total_bytes -= old.len();
        }
        if self.max_items == 0 || value.len() > self.max_bytes {
            return Vec::new();
        }

        self.total_bytes += value.len();
        self.entries.put(key, value);

        let mut evicted = Vec::new();
        while self.entries.len() > self.max_items || self.total_bytes > self.max_bytes {
            match self.entries.pop_lru() {
                Some((key, value)) => {
                    self.total_bytes -= value.len();
                    evicted.push(key);
                }
                None => break,
            }
        }
        evicted
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

/// Releases the in-flight marker on every exit path, including cancellation.
struct InFlightGuard<'a> {
    key: String,
    in_flight: &'a Mutex<HashMap<String, watch::Receiver<Slot>>>,
    tx: watch::Sender<Slot>,
}

impl InFlightGuard<'_> {
    fn complete(self, outcome: Option<Bytes>) {
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(None);
                true
            } else {
                false
            }
        });
        self.in_flight.lock().remove(&self.key);
    }
}

enum Role<'a> {
    Leader(InFlightGuard<'a>),
    Follower(watch::Receiver<Slot>),
}

/// Two-tier album art cache: bounded memory in front of an unbounded
/// directory, with at most one download per URL in flight.
pub struct ContentCache {
    dir: PathBuf,
    max_dimension: u32,
    client: Client,
    memory: Mutex<MemoryTier>,
    in_flight: Mutex<HashMap<String, watch::Receiver<Slot>>>,
    downloads: AtomicUsize,
}

impl ContentCache {
    pub fn new(config: &CacheConfig, client: Client) -> Self {
        Self {
            dir: config.dir.clone(),
            max_dimension: config.max_dimension,
            client,
            memory: Mutex::new(MemoryTier::new(config.max_items, config.max_bytes)),
            in_flight: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Resolves `url` from memory, then disk, then the network.
    ///
    /// Concurrent calls for the same URL share one download. Failures return
    /// `None` and leave nothing behind, so the next call tries again.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Option<Bytes> {
        let key = utils::cache_key(url);

        if let Some(bytes) = self.lookup(&key).await {
            return Some(bytes);
        }

        let guard = match self.join_or_lead(&key) {
            Role::Follower(mut rx) => {
                debug!("waiting for in-flight download");
                return match rx.wait_for(|slot| slot.is_some()).await {
                    Ok(slot) => slot.clone().flatten(),
                    Err(_) => None,
                };
            }
            Role::Leader(guard) => guard,
        };

        // The previous leader may have finished between our lookup and
        // taking the marker.
        if let Some(bytes) = self.lookup(&key).await {
            guard.complete(Some(bytes.clone()));
            return Some(bytes);
        }

        match self.download(url).await {
            Ok(bytes) => {
                self.store(&key, bytes.clone()).await;
                guard.complete(Some(bytes.clone()));
                Some(bytes)
            }
            Err(e) => {
                warn!(error = %e, "artwork download failed");
                guard.complete(None);
                None
            }
        }
    }

    fn join_or_lead(&self, key: &str) -> Role<'_> {
        let mut in_flight = self.in_flight.lock();
        if let Some(rx) = in_flight.get(key) {
            return Role::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        in_flight.insert(key.to_string(), rx);
        Role::Leader(InFlightGuard {
            key: key.to_string(),
            in_flight: &self.in_flight,
            tx,
        })
    }

    async fn lookup(&self, key: &str) -> Option<Bytes> {
        let hit = self.memory.lock().get(key);
        if let Some(bytes) = hit {
            debug!("memory hit");
            return Some(bytes);
        }

        let path = self.path_for(key);
        match async_fs::read(&path).await {
            Ok(data) => {
                let bytes = Bytes::from(data);
                let candidate = bytes.clone();
                let valid = tokio::task::spawn_blocking(move || image::load_from_memory(&candidate).is_ok())
                    .await
                    .unwrap_or(false);
                if !valid {
                    warn!(path = %path.display(), "discarding unreadable cache file");
                    if let Err(e) = async_fs::remove_file(&path).await {
                        warn!(error = %e, "cannot remove unreadable cache file");
                    }
                    return None;
                }

                debug!("disk hit");
                self.memory.lock().insert(key.to_string(), bytes.clone());
                Some(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, "disk cache read failed, treating as miss");
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let raw = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let max_dimension = self.max_dimension;
        tokio::task::spawn_blocking(move || normalize_artwork(raw, max_dimension))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?
    }

    /// Disk first: a memory entry must always be reconstructible from disk.
    async fn store(&self, key: &str, bytes: Bytes) {
        if let Err(e) = async_fs::create_dir_all(&self.dir).await {
            warn!(error = %e, "cannot create cache directory");
            return;
        }
        // Written beside the target and renamed, so the key never names a partial file.
        let partial = self.dir.join(format!("{}.{:08x}.part", key, rand::random::<u32>()));
        if let Err(e) = async_fs::write(&partial, &bytes).await {
            warn!(error = %e, "disk cache write failed");
            let _ = async_fs::remove_file(&partial).await;
            return;
        }
        if let Err(e) = async_fs::rename(&partial, self.path_for(key)).await {
            warn!(error = %e, "disk cache rename failed");
            let _ = async_fs::remove_file(&partial).await;
            return;
        }

        let evicted = self.memory.lock().insert(key.to_string(), bytes);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted from memory tier");
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    pub fn contains_in_memory(&self, url: &str) -> bool {
        self.memory.lock().contains(&utils::cache_key(url))
    }

    pub async fn contains_on_disk(&self, url: &str) -> bool {
        async_fs::metadata(self.path_for(&utils::cache_key(url)))
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    pub fn memory_bytes(&self) -> usize {
        self.memory.lock().total_bytes()
    }

    /// Network transfers started since construction.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Where a URL lives (or would live) on disk.
    pub fn disk_path(&self, url: &str) -> PathBuf {
        self.path_for(&utils::cache_key(url))
    }

    /// Total size of the disk tier in bytes.
    pub async fn disk_size(&self) -> u64 {
        let mut entries = match async_fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(error = %e, "cannot list cache directory");
                return 0;
            }
        };

        let mut total = 0;
        while let Some(entry) = entries.next().await {
            let Ok(entry) = entry else { continue };
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    total += meta.len();
                }
            }
        }
        total
    }

    /// Empties both tiers. Returns `false` if the directory could not be removed.
    pub async fn clear_all(&self) -> bool {
        self.memory.lock().clear();
        match async_fs::remove_dir_all(&self.dir).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(error = %e, "failed to clear cache directory");
                false
            }
        }
    }
}

/// Validates the payload as an image and shrinks anything larger than
/// `max_dimension` on either side, re-encoding it as JPEG.
pub fn normalize_artwork(raw: Bytes, max_dimension: u32) -> Result<Bytes> {
    let img = image::load_from_memory(&raw)?;
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return Ok(raw);
    }

    let resized = img.resize(max_dimension, max_dimension, FilterType::Triangle);
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(resized.to_rgb8())
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)?;
    Ok(Bytes::from(out))
}
