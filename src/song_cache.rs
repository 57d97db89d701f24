//! Shared in-memory song cache and the catalog change observer.
//!
//! The cache holds every song currently visible under the active path
//! filters, in canonical catalog order (ascending id). It is the single
//! source of truth the reconciler and all read views compare against.
//! Rebuilds replace the whole set; targeted change notifications patch
//! single rows without a full requery.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::{debug, info, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::catalog_query::{FilterSnapshot, CANONICAL_ORDER};
use crate::collection_store::CollectionStore;
use crate::config::Config;
use crate::media_index::MediaIndex;
use crate::protocol::{CatalogChange, CatalogMessage, Message};
use crate::song::{self, Song};

/// Join handle for one cache rebuild. Cloned handles share completion
/// state, so concurrent `refresh()` callers wait on the same rebuild.
#[derive(Clone)]
pub struct RefreshHandle {
    state: Arc<RefreshState>,
}

struct RefreshState {
    done: Mutex<bool>,
    signal: Condvar,
}

impl RefreshHandle {
    fn new() -> Self {
        RefreshHandle {
            state: Arc::new(RefreshState {
                done: Mutex::new(false),
                signal: Condvar::new(),
            }),
        }
    }

    /// Blocks until the rebuild behind this handle has finished.
    pub fn wait(&self) {
        let mut done = self
            .state
            .done
            .lock()
            .expect("refresh state lock poisoned");
        while !*done {
            done = self
                .state
                .signal
                .wait(done)
                .expect("refresh state lock poisoned");
        }
    }

    pub fn is_complete(&self) -> bool {
        *self
            .state
            .done
            .lock()
            .expect("refresh state lock poisoned")
    }

    fn complete(&self) {
        let mut done = self
            .state
            .done
            .lock()
            .expect("refresh state lock poisoned");
        *done = true;
        self.state.signal.notify_all();
    }

    fn joins_same_task(&self, other: &RefreshHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

pub struct SongCache {
    media_index: Arc<Mutex<MediaIndex>>,
    store: Arc<Mutex<CollectionStore>>,
    config: Arc<Mutex<Config>>,
    songs: Mutex<Vec<Song>>,
    in_flight: Mutex<Option<RefreshHandle>>,
    bus_producer: Sender<Message>,
}

impl SongCache {
    pub fn new(
        media_index: Arc<Mutex<MediaIndex>>,
        store: Arc<Mutex<CollectionStore>>,
        config: Arc<Mutex<Config>>,
        bus_producer: Sender<Message>,
    ) -> Arc<Self> {
        Arc::new(SongCache {
            media_index,
            store,
            config,
            songs: Mutex::new(Vec::new()),
            in_flight: Mutex::new(None),
            bus_producer,
        })
    }

    /// Snapshot in canonical catalog order.
    pub fn songs(&self) -> Vec<Song> {
        self.songs.lock().expect("song cache lock poisoned").clone()
    }

    /// Derived sorted view using the active sort preference. Recomputed
    /// per read; the cache itself stays in canonical order.
    pub fn sorted_songs(&self) -> Vec<Song> {
        let order = self
            .config
            .lock()
            .expect("config lock poisoned")
            .sorting
            .song_sort_order;
        let snapshot = self.songs();
        song::sorted_songs(&snapshot, order)
    }

    /// Cache lookup by id; `Song::empty()` when absent.
    pub fn song(&self, song_id: i64) -> Song {
        self.songs
            .lock()
            .expect("song cache lock poisoned")
            .iter()
            .find(|song| song.id == song_id)
            .cloned()
            .unwrap_or_else(Song::empty)
    }

    /// The set of song ids currently visible under the active filters.
    pub fn song_ids(&self) -> HashSet<i64> {
        self.songs
            .lock()
            .expect("song cache lock poisoned")
            .iter()
            .map(|song| song.id)
            .collect()
    }

    /// Reads the active path filters and duration floor for query building.
    pub fn filter_snapshot(&self) -> Result<FilterSnapshot, rusqlite::Error> {
        let (whitelist_mode, min_duration_ms) = {
            let config = self.config.lock().expect("config lock poisoned");
            (
                config.filters.whitelist_mode,
                config.filters.min_song_duration_ms,
            )
        };
        let store = self.store.lock().expect("collection store lock poisoned");
        Ok(FilterSnapshot {
            whitelist_mode,
            whitelist: store.whitelist_paths()?,
            blacklist: store.blacklist_paths()?,
            min_duration_ms,
        })
    }

    /// Starts a full rebuild, or joins the one already in flight.
    ///
    /// At most one rebuild runs at a time; every concurrent caller gets a
    /// handle on the same task, so only one catalog query is issued.
    pub fn refresh(self: &Arc<Self>) -> RefreshHandle {
        let mut in_flight = self
            .in_flight
            .lock()
            .expect("refresh slot lock poisoned");
        if let Some(handle) = in_flight.as_ref() {
            if !handle.is_complete() {
                debug!("Song cache refresh already in flight, joining");
                return handle.clone();
            }
        }

        let handle = RefreshHandle::new();
        *in_flight = Some(handle.clone());

        let cache = Arc::clone(self);
        let task = handle.clone();
        thread::spawn(move || {
            cache.rebuild();
            task.complete();
        });
        handle
    }

    fn rebuild(&self) {
        let filter = match self.filter_snapshot() {
            Ok(filter) => filter,
            Err(err) => {
                warn!("Song cache rebuild aborted, failed to load path filters: {}", err);
                return;
            }
        };

        let songs = {
            let index = self.media_index.lock().expect("media index lock poisoned");
            index
                .songs_filtered(None, &[], &filter, CANONICAL_ORDER, false)
                .unwrap_or_default()
        };
        info!("Song cache rebuilt with {} song(s)", songs.len());

        {
            let mut current = self.songs.lock().expect("song cache lock poisoned");
            *current = songs.clone();
        }
        self.publish(songs);
    }

    /// Applies one catalog change notification.
    ///
    /// Targeted inserts and updates requery the single row through the
    /// normal filtered path, so a row that fails the active filters never
    /// enters the cache; a row that stopped matching them is dropped.
    /// Unknown changes trigger a full rebuild.
    pub fn apply_change(self: &Arc<Self>, change: CatalogChange) {
        match change {
            CatalogChange::Unknown => {
                self.refresh();
            }
            CatalogChange::Inserted(song_id) | CatalogChange::Updated(song_id) => {
                let filter = match self.filter_snapshot() {
                    Ok(filter) => filter,
                    Err(err) => {
                        warn!("Cache patch aborted, failed to load path filters: {}", err);
                        return;
                    }
                };
                let loaded = {
                    let index = self.media_index.lock().expect("media index lock poisoned");
                    index.song_by_id_filtered(song_id, &filter)
                };
                let snapshot = {
                    let mut songs = self.songs.lock().expect("song cache lock poisoned");
                    let before = songs.len();
                    songs.retain(|song| song.id != song_id);
                    let removed = songs.len() != before;
                    match loaded {
                        Some(song) => {
                            let slot = songs.partition_point(|existing| existing.id < song.id);
                            songs.insert(slot, song);
                        }
                        None if !removed => return,
                        None => {}
                    }
                    songs.clone()
                };
                self.publish(snapshot);
            }
            CatalogChange::Deleted(song_id) => {
                let snapshot = {
                    let mut songs = self.songs.lock().expect("song cache lock poisoned");
                    let before = songs.len();
                    songs.retain(|song| song.id != song_id);
                    if songs.len() == before {
                        return;
                    }
                    songs.clone()
                };
                self.publish(snapshot);
            }
        }
    }

    fn publish(&self, songs: Vec<Song>) {
        let _ = self
            .bus_producer
            .send(Message::Catalog(CatalogMessage::SongsChanged(songs)));
    }
}

/// Bus consumer that keeps the cache synchronized with the media index.
///
/// Runs as a blocking loop on its own thread. Falling behind the bus is
/// treated as an unknown change: missed notifications are compensated by
/// a full rebuild.
pub struct ChangeObserver {
    bus_consumer: Receiver<Message>,
    cache: Arc<SongCache>,
}

impl ChangeObserver {
    pub fn new(bus_consumer: Receiver<Message>, cache: Arc<SongCache>) -> Self {
        Self { bus_consumer, cache }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Catalog(CatalogMessage::Changed(change))) => {
                    self.cache.apply_change(change);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "ChangeObserver lagged on bus, skipped {} message(s); rebuilding",
                        skipped
                    );
                    self.cache.refresh();
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
