//! Sample store
//!
//! This module owns the canonical, deduplicated, time-ordered collection of
//! device samples for the active session, persists it as a JSON cache, and
//! republishes snapshots to subscribers.
//!
//! All mutating operations run FIFO on one dedicated worker thread, so two
//! mutations never interleave on the in-memory state or the cache file.
//! Published snapshots live behind a shared lock and subscriber callbacks
//! fire on the worker's publish path; hosts marshal to their own context.
//!
//! Persistence failures never surface to callers: a failed read degrades to
//! an empty collection and a failed write leaves the in-memory state as the
//! source of truth for the session.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::DeviceSample;

/// Well-known cache file name inside the storage directory
pub const SAMPLE_CACHE_FILE: &str = "device_samples.json";

/// Callback invoked with the freshly published collection
pub type SampleSubscriber = Arc<dyn Fn(&[DeviceSample]) + Send + Sync>;

enum Command {
    StartSession,
    Append(Vec<DeviceSample>),
    ResetAll,
    ReloadFromDisk,
    Flush(mpsc::Sender<()>),
    Shutdown,
}

/// State visible to readers, updated only by the worker
struct Shared {
    samples: Mutex<Vec<DeviceSample>>,
    loading: AtomicBool,
    subscribers: Mutex<Vec<(Uuid, SampleSubscriber)>>,
}

/// Authoritative store for the active device session.
///
/// Construct once at process start and hand references to the components
/// that need it; there is no ambient global instance.
pub struct SampleStore {
    tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl SampleStore {
    /// Open (or create) a store backed by `dir`/[`SAMPLE_CACHE_FILE`].
    ///
    /// Any previously cached samples are loaded asynchronously; the store
    /// reports `loading` until the first publish.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the worker thread. The store is
    /// unusable without its worker, so there is no degraded mode.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("store: could not create storage dir {}: {e}", dir.display());
        }

        let shared = Arc::new(Shared {
            samples: Mutex::new(Vec::new()),
            loading: AtomicBool::new(true),
            subscribers: Mutex::new(Vec::new()),
        });

        let (tx, rx) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let cache_path = dir.join(SAMPLE_CACHE_FILE);
        let worker = thread::Builder::new()
            .name("pulsekit-store".into())
            .spawn(move || Worker::new(cache_path, worker_shared).run(rx))
            .expect("failed to spawn store worker thread");

        // Warm start from whatever the last session persisted.
        let _ = tx.send(Command::ReloadFromDisk);

        Self {
            tx,
            shared,
            worker: Some(worker),
        }
    }

    /// Begin a fresh live session: clears the in-memory collection so the
    /// incoming stream accumulates from a clean slate instead of blending
    /// with a stale prior run. The cache file is left untouched.
    pub fn start_session(&self) {
        let _ = self.tx.send(Command::StartSession);
    }

    /// Ingest one decoded batch. Empty input is a complete no-op.
    ///
    /// The batch replaces the entire collection: device firmware sends its
    /// full buffered history per sync, not a delta. Steps sentinels are
    /// normalized, timestamps deduplicated last-write-wins, the result
    /// sorted ascending, persisted, and published.
    pub fn append(&self, batch: Vec<DeviceSample>) {
        if batch.is_empty() {
            return;
        }
        let _ = self.tx.send(Command::Append(batch));
    }

    /// Wipe everything: in-memory collection, index, and the cache file.
    pub fn reset_all(&self) {
        let _ = self.tx.send(Command::ResetAll);
    }

    /// Re-read the cache file and republish. Skipped once live data has
    /// been seen this process, so a disk reload can never clobber a fresh
    /// live stream.
    pub fn reload_from_disk(&self) {
        let _ = self.tx.send(Command::ReloadFromDisk);
    }

    /// Block until every previously queued mutation has completed.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Snapshot of the current collection, ascending by timestamp
    pub fn samples(&self) -> Vec<DeviceSample> {
        self.shared.samples.lock().clone()
    }

    /// True until the first publish of a session (initial load or first batch)
    pub fn is_loading(&self) -> bool {
        self.shared.loading.load(Ordering::Acquire)
    }

    /// Register a callback fired on every publish. Returns a handle for
    /// [`Self::unsubscribe`].
    pub fn subscribe(&self, subscriber: SampleSubscriber) -> Uuid {
        let id = Uuid::new_v4();
        self.shared.subscribers.lock().push((id, subscriber));
        id
    }

    /// Remove a previously registered subscriber
    pub fn unsubscribe(&self, id: Uuid) {
        self.shared.subscribers.lock().retain(|(sid, _)| *sid != id);
    }
}

impl Drop for SampleStore {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Worker-owned mutable state; only ever touched on the worker thread.
struct Worker {
    cache_path: PathBuf,
    storage: Vec<DeviceSample>,
    index: HashSet<u32>,
    has_seen_live_data: bool,
    shared: Arc<Shared>,
}

impl Worker {
    fn new(cache_path: PathBuf, shared: Arc<Shared>) -> Self {
        Self {
            cache_path,
            storage: Vec::new(),
            index: HashSet::new(),
            has_seen_live_data: false,
            shared,
        }
    }

    fn run(mut self, rx: mpsc::Receiver<Command>) {
        while let Ok(command) = rx.recv() {
            match command {
                Command::StartSession => self.start_session(),
                Command::Append(batch) => self.append(batch),
                Command::ResetAll => self.reset_all(),
                Command::ReloadFromDisk => self.reload_from_disk(),
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
                Command::Shutdown => break,
            }
        }
    }

    fn start_session(&mut self) {
        debug!("store: starting new live session");
        self.has_seen_live_data = false;
        self.storage.clear();
        self.index.clear();
        self.publish(true);
    }

    fn append(&mut self, batch: Vec<DeviceSample>) {
        self.has_seen_live_data = true;
        self.replace_with(batch.into_iter().map(|s| s.sanitized()));

        if let Err(e) = write_cache(&self.cache_path, &self.storage) {
            warn!("store: persist failed: {e}");
        } else {
            debug!("store: persisted {} samples", self.storage.len());
        }

        self.publish(false);
    }

    fn reset_all(&mut self) {
        self.has_seen_live_data = false;
        self.storage.clear();
        self.index.clear();
        match fs::remove_file(&self.cache_path) {
            Ok(()) => debug!("store: deleted cache file"),
            Err(e) => debug!("store: cache delete failed: {e}"),
        }
        self.publish(false);
    }

    fn reload_from_disk(&mut self) {
        if self.has_seen_live_data {
            debug!("store: disk reload skipped, live data already present");
            return;
        }
        match read_cache(&self.cache_path) {
            Ok(decoded) => {
                debug!("store: loaded {} samples from disk", decoded.len());
                self.replace_with(decoded.into_iter());
            }
            Err(e) => {
                debug!("store: cache load failed: {e}");
                self.storage.clear();
                self.index.clear();
            }
        }
        self.publish(false);
    }

    /// Replace the canonical collection: dedup by timestamp last-write-wins,
    /// sort ascending, rebuild the uniqueness index.
    fn replace_with(&mut self, samples: impl Iterator<Item = DeviceSample>) {
        let mut ordered: Vec<DeviceSample> = samples.collect();
        // Stable sort keeps batch order among equal timestamps, so walking
        // from the back keeps the last write per timestamp.
        ordered.sort_by_key(|s| s.timestamp);

        self.index.clear();
        let mut deduped = Vec::with_capacity(ordered.len());
        for sample in ordered.into_iter().rev() {
            if self.index.insert(sample.timestamp) {
                deduped.push(sample);
            }
        }
        deduped.reverse();
        self.storage = deduped;
    }

    fn publish(&self, loading: bool) {
        *self.shared.samples.lock() = self.storage.clone();
        self.shared.loading.store(loading, Ordering::Release);

        // Snapshot the registry and release the lock before invoking
        // anything: callbacks may subscribe or unsubscribe in reaction to a
        // publish, and must never re-enter the registry lock.
        let subscribers: Vec<SampleSubscriber> = self
            .shared
            .subscribers
            .lock()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(&self.storage);
        }
    }
}

fn read_cache(path: &Path) -> Result<Vec<DeviceSample>, StoreError> {
    let raw = fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Write the cache through a temp file plus rename so a concurrent reader
/// never observes a half-written file.
fn write_cache(path: &Path, samples: &[DeviceSample]) -> Result<(), StoreError> {
    let encoded = serde_json::to_vec(samples)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, encoded)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;

    fn make_sample(timestamp: u32, hr: u16, steps: u32) -> DeviceSample {
        DeviceSample {
            timestamp,
            hr,
            spo2: 97,
            skin_temp_c: 33.4,
            steps,
        }
    }

    fn timestamps(samples: &[DeviceSample]) -> Vec<u32> {
        samples.iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn test_new_store_loads_empty_when_no_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());
        store.flush();

        assert!(store.samples().is_empty());
        assert!(!store.is_loading());
    }

    #[test]
    fn test_append_empty_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());
        store.flush();

        store.start_session();
        store.flush();
        assert!(store.is_loading());

        store.append(Vec::new());
        store.flush();

        // Collection and loading state unchanged.
        assert!(store.samples().is_empty());
        assert!(store.is_loading());
    }

    #[test]
    fn test_append_sorts_normalizes_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());

        store.append(vec![
            make_sample(300, 80, 123), // glitch sentinel
            make_sample(100, 70, 1000),
            make_sample(300, 85, 2000), // same timestamp, last wins
        ]);
        store.flush();

        let samples = store.samples();
        assert_eq!(timestamps(&samples), vec![100, 300]);
        assert_eq!(samples[1].hr, 85);
        assert_eq!(samples[1].steps, 2000);
        assert_eq!(samples[0].steps, 1000);
        assert!(!store.is_loading());
    }

    #[test]
    fn test_append_replaces_entire_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());

        store.append(vec![make_sample(100, 70, 100), make_sample(200, 72, 200)]);
        store.append(vec![make_sample(900, 75, 900)]);
        store.flush();

        // Full-replace semantics: only the latest batch survives.
        assert_eq!(timestamps(&store.samples()), vec![900]);
    }

    #[test]
    fn test_persist_and_reload_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SampleStore::new(dir.path());
            store.append(vec![make_sample(100, 70, 100), make_sample(200, 72, 200)]);
            store.flush();
        }

        let reopened = SampleStore::new(dir.path());
        reopened.flush();
        assert_eq!(timestamps(&reopened.samples()), vec![100, 200]);
    }

    #[test]
    fn test_reset_all_then_reload_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());

        store.append(vec![make_sample(100, 70, 100)]);
        store.reset_all();
        store.reload_from_disk();
        store.flush();

        assert!(store.samples().is_empty());
        assert!(!store.is_loading());
        assert!(!dir.path().join(SAMPLE_CACHE_FILE).exists());
    }

    #[test]
    fn test_reload_skipped_after_live_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());

        store.append(vec![make_sample(500, 70, 100)]);
        store.flush();

        // Clobber the cache behind the store's back; the reload latch must
        // keep the live collection authoritative.
        let stale = vec![make_sample(1, 50, 1)];
        fs::write(
            dir.path().join(SAMPLE_CACHE_FILE),
            serde_json::to_vec(&stale).unwrap(),
        )
        .unwrap();

        store.reload_from_disk();
        store.flush();
        assert_eq!(timestamps(&store.samples()), vec![500]);
    }

    #[test]
    fn test_start_session_clears_memory_but_not_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());

        store.append(vec![make_sample(100, 70, 100)]);
        store.start_session();
        store.flush();

        assert!(store.samples().is_empty());
        assert!(store.is_loading());
        assert!(dir.path().join(SAMPLE_CACHE_FILE).exists());
    }

    #[test]
    fn test_corrupt_cache_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(SAMPLE_CACHE_FILE), b"{not json").unwrap();

        let store = SampleStore::new(dir.path());
        store.flush();

        assert!(store.samples().is_empty());
        assert!(!store.is_loading());
    }

    #[test]
    fn test_subscriber_receives_published_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());
        store.flush();

        let seen: Arc<StdMutex<Vec<Vec<u32>>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = store.subscribe(Arc::new(move |samples| {
            sink.lock().unwrap().push(samples.iter().map(|s| s.timestamp).collect());
        }));

        store.append(vec![make_sample(100, 70, 100), make_sample(200, 72, 200)]);
        store.flush();

        assert_eq!(seen.lock().unwrap().last().unwrap(), &vec![100, 200]);

        store.unsubscribe(id);
        store.append(vec![make_sample(300, 74, 300)]);
        store.flush();

        // No further notifications after unsubscribe.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_subscriber_may_unsubscribe_from_its_own_callback() {
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SampleStore::new(dir.path()));
        store.flush();

        // The callback tears down its own registration mid-publish. The
        // worker must survive that without stalling on the registry lock.
        let id_cell: Arc<StdMutex<Option<Uuid>>> = Arc::new(StdMutex::new(None));
        let registry = Arc::clone(&store);
        let cell = Arc::clone(&id_cell);
        let id = store.subscribe(Arc::new(move |_| {
            if let Some(id) = cell.lock().unwrap().take() {
                registry.unsubscribe(id);
            }
        }));
        *id_cell.lock().unwrap() = Some(id);

        let (done_tx, done_rx) = mpsc::channel();
        let publisher = Arc::clone(&store);
        thread::spawn(move || {
            publisher.append(vec![make_sample(100, 70, 100)]);
            publisher.flush();
            let _ = done_tx.send(());
        });

        assert!(
            done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
            "publish did not complete; worker stalled on a subscriber callback"
        );
        assert_eq!(timestamps(&store.samples()), vec![100]);
        assert!(id_cell.lock().unwrap().is_none());
    }

    #[test]
    fn test_decode_ingest_score_end_to_end() {
        use crate::decoder::{decode_packet, TAG_BULK};
        use crate::wellness::WellnessEngine;
        use chrono::TimeZone;

        let reference = chrono::Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let base = reference.timestamp() as u32;

        // One bulk packet: two readings inside the 6h window.
        let mut packet = vec![TAG_BULK, 2];
        for (ago, steps) in [(3600u32, 10_000u32), (7200, 9_000)] {
            packet.extend_from_slice(&(base - ago).to_le_bytes());
            packet.extend_from_slice(&70u16.to_le_bytes());
            packet.push(100);
            packet.extend_from_slice(&3350i16.to_le_bytes());
            packet.extend_from_slice(&steps.to_le_bytes());
        }

        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::new(dir.path());
        store.append(decode_packet(&packet));
        store.flush();

        let snapshot = WellnessEngine::compute(&store.samples(), reference);
        assert!(!snapshot.is_unavailable());
        // Ideal factors across the board: the composite hits the ceiling.
        assert_eq!(snapshot.score, 100);
    }
}
