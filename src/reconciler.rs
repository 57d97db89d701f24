//! Stale-reference sweep keeping the collection store consistent with the
//! filtered catalog view.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use tokio::sync::broadcast::Sender;

use crate::collection_store::CollectionStore;
use crate::protocol::{CollectionMessage, Message};
use crate::song_cache::SongCache;

/// Row counts removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub history_removed: usize,
    pub playlist_entries_removed: usize,
}

/// Removes collection rows whose song id has left the song cache.
///
/// History and playlist membership rows are deleted outright. Queue and
/// original-queue rows are intentionally never pruned; their reads filter
/// stale ids in memory instead.
pub struct Reconciler {
    cache: Arc<SongCache>,
    store: Arc<Mutex<CollectionStore>>,
    bus_producer: Sender<Message>,
}

impl Reconciler {
    pub fn new(
        cache: Arc<SongCache>,
        store: Arc<Mutex<CollectionStore>>,
        bus_producer: Sender<Message>,
    ) -> Arc<Self> {
        Arc::new(Reconciler {
            cache,
            store,
            bus_producer,
        })
    }

    /// Refreshes the cache, waits for the rebuild, then deletes every
    /// history and playlist membership row referencing a song id absent
    /// from the rebuilt cache.
    ///
    /// Passes run history first, playlist members second; the first
    /// storage failure aborts the sweep and propagates, leaving later
    /// passes unexecuted.
    pub fn sweep(&self) -> Result<SweepOutcome, rusqlite::Error> {
        self.cache.refresh().wait();
        let valid_ids = self.cache.song_ids();

        let outcome = SweepOutcome {
            history_removed: self.sweep_history(&valid_ids)?,
            playlist_entries_removed: self.sweep_playlist_entries(&valid_ids)?,
        };

        if outcome.history_removed > 0 {
            let _ = self
                .bus_producer
                .send(Message::Collection(CollectionMessage::HistoryChanged));
        }
        if outcome.playlist_entries_removed > 0 {
            let _ = self
                .bus_producer
                .send(Message::Collection(CollectionMessage::PlaylistsChanged));
        }

        info!(
            "Reconciler sweep removed {} history row(s), {} playlist row(s)",
            outcome.history_removed, outcome.playlist_entries_removed
        );
        Ok(outcome)
    }

    fn sweep_history(&self, valid_ids: &HashSet<i64>) -> Result<usize, rusqlite::Error> {
        let all = {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.all_history()?
        };
        let stale: Vec<i64> = all
            .iter()
            .filter(|entry| !valid_ids.contains(&entry.song_id))
            .map(|entry| entry.song_id)
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        debug!("Pruning {} stale history row(s)", stale.len());
        let mut store = self.store.lock().expect("collection store lock poisoned");
        store.delete_history_entries(&stale)?;
        Ok(stale.len())
    }

    fn sweep_playlist_entries(
        &self,
        valid_ids: &HashSet<i64>,
    ) -> Result<usize, rusqlite::Error> {
        let all = {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.all_playlist_entries()?
        };
        let stale: Vec<_> = all
            .into_iter()
            .filter(|entry| !valid_ids.contains(&entry.song_id))
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        debug!("Pruning {} stale playlist membership row(s)", stale.len());
        let mut store = self.store.lock().expect("collection store lock poisoned");
        store.delete_playlist_entries(&stale)?;
        Ok(stale.len())
    }
}
