//! Facade wiring the catalog, cache, reconciler, and collection store
//! together, plus the aggregated read views consumed by the UI layer.
//!
//! Reads that promise filtered consistency (playlist songs, history,
//! favorites) run a reconciler sweep first. Queue reads filter stale ids
//! in memory and never delete rows.

use std::cmp::min;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::catalog_query::{self, CANONICAL_ORDER, MAX_BOUND_PATHS};
use crate::collection_store::{
    CollectionStore, HistoryEntry, PlaylistRow, PlaylistWithSongs, HISTORY_LIMIT,
};
use crate::config::{Config, PlaylistSortOrder, SongSortOrder};
use crate::config_persistence;
use crate::media_index::MediaIndex;
use crate::path_filter::PathFilterStore;
use crate::protocol::{CollectionMessage, ConfigMessage, Message};
use crate::reconciler::{Reconciler, SweepOutcome};
use crate::song::Song;
use crate::song_cache::{ChangeObserver, RefreshHandle, SongCache};

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}

pub struct MusicRepository {
    config: Arc<Mutex<Config>>,
    config_path: PathBuf,
    media_index: Arc<Mutex<MediaIndex>>,
    store: Arc<Mutex<CollectionStore>>,
    cache: Arc<SongCache>,
    reconciler: Arc<Reconciler>,
    path_filters: PathFilterStore,
    bus_producer: Sender<Message>,
}

impl MusicRepository {
    /// Wires the repository from pre-built components sharing one bus.
    pub fn new(
        config: Config,
        config_path: PathBuf,
        media_index: MediaIndex,
        store: CollectionStore,
        bus_producer: Sender<Message>,
    ) -> Self {
        let config = Arc::new(Mutex::new(config));
        let media_index = Arc::new(Mutex::new(media_index));
        let store = Arc::new(Mutex::new(store));
        let cache = SongCache::new(
            Arc::clone(&media_index),
            Arc::clone(&store),
            Arc::clone(&config),
            bus_producer.clone(),
        );
        let reconciler = Reconciler::new(
            Arc::clone(&cache),
            Arc::clone(&store),
            bus_producer.clone(),
        );
        let path_filters = PathFilterStore::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&reconciler),
            Arc::clone(&config),
            config_path.clone(),
            bus_producer.clone(),
        );
        Self {
            config,
            config_path,
            media_index,
            store,
            cache,
            reconciler,
            path_filters,
            bus_producer,
        }
    }

    /// Opens the repository at the default platform locations.
    pub fn open_default() -> Result<Self, rusqlite::Error> {
        let (bus_producer, _) = tokio::sync::broadcast::channel(1024);
        let config_path = config_persistence::config_file_path();
        let config = config_persistence::load_config(&config_path);
        let media_index = MediaIndex::open_default(bus_producer.clone())?;
        let store = CollectionStore::open_default()?;
        Ok(Self::new(
            config,
            config_path,
            media_index,
            store,
            bus_producer,
        ))
    }

    /// Seeds first-run filter defaults, runs the startup sweep, and starts
    /// the catalog change observer.
    pub fn start(&self) -> Result<(), rusqlite::Error> {
        self.path_filters.seed_defaults()?;
        self.reconciler.sweep()?;

        let mut observer = ChangeObserver::new(self.subscribe(), Arc::clone(&self.cache));
        thread::spawn(move || observer.run());
        Ok(())
    }

    /// Registers a bus subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<Message> {
        self.bus_producer.subscribe()
    }

    pub fn path_filters(&self) -> &PathFilterStore {
        &self.path_filters
    }

    /// Runs an on-demand reconciler sweep.
    pub fn sweep(&self) -> Result<SweepOutcome, rusqlite::Error> {
        self.reconciler.sweep()
    }

    // --- songs ---

    pub fn songs(&self) -> Vec<Song> {
        self.cache.songs()
    }

    pub fn sorted_songs(&self) -> Vec<Song> {
        self.cache.sorted_songs()
    }

    pub fn song(&self, song_id: i64) -> Song {
        self.cache.song(song_id)
    }

    pub fn refresh_songs(&self) -> RefreshHandle {
        self.cache.refresh()
    }

    /// Title substring search through the filtered catalog.
    pub fn search_songs(&self, query: &str) -> Vec<Song> {
        let filter = match self.cache.filter_snapshot() {
            Ok(filter) => filter,
            Err(err) => {
                warn!("Search aborted, failed to load path filters: {}", err);
                return Vec::new();
            }
        };
        let args = vec![format!("%{}%", query)];
        let index = self.media_index.lock().expect("media index lock poisoned");
        index
            .songs_filtered(Some("title LIKE ?"), &args, &filter, CANONICAL_ORDER, false)
            .unwrap_or_default()
    }

    /// Exact-path lookup, optionally bypassing the path filters.
    pub fn songs_by_path(&self, path: &Path, ignore_filters: bool) -> Vec<Song> {
        let filter = match self.cache.filter_snapshot() {
            Ok(filter) => filter,
            Err(err) => {
                warn!("Path lookup aborted, failed to load path filters: {}", err);
                return Vec::new();
            }
        };
        let args = vec![path.to_string_lossy().to_string()];
        let index = self.media_index.lock().expect("media index lock poisoned");
        index
            .songs_filtered(
                Some("path = ?"),
                &args,
                &filter,
                CANONICAL_ORDER,
                ignore_filters,
            )
            .unwrap_or_default()
    }

    /// Matches browsed files against the catalog, bypassing the path
    /// filters. Paths are bound in chunks below the parameter ceiling.
    pub fn songs_by_paths(&self, paths: &[PathBuf]) -> Vec<Song> {
        let filter = match self.cache.filter_snapshot() {
            Ok(filter) => filter,
            Err(err) => {
                warn!("Path match aborted, failed to load path filters: {}", err);
                return Vec::new();
            }
        };
        let index = self.media_index.lock().expect("media index lock poisoned");
        let mut songs = Vec::new();
        for chunk in paths.chunks(MAX_BOUND_PATHS) {
            let clause = catalog_query::path_in_clause(chunk.len());
            let args: Vec<String> = chunk
                .iter()
                .map(|path| path.to_string_lossy().to_string())
                .collect();
            songs.extend(
                index
                    .songs_filtered(Some(&clause), &args, &filter, CANONICAL_ORDER, true)
                    .unwrap_or_default(),
            );
        }
        songs
    }

    /// Maps song ids to cached songs, preserving order and dropping ids
    /// absent from the cache.
    fn songs_for_ids(&self, song_ids: &[i64]) -> Vec<Song> {
        let songs = self.cache.songs();
        song_ids
            .iter()
            .filter_map(|id| songs.iter().find(|song| song.id == *id).cloned())
            .collect()
    }

    // --- playlists ---

    pub fn create_playlist(&self, name: &str) -> Result<i64, rusqlite::Error> {
        let playlist_id = {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.create_playlist(name, None)?
        };
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::PlaylistsChanged));
        Ok(playlist_id)
    }

    pub fn rename_playlist(&self, playlist_id: i64, name: &str) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.rename_playlist(playlist_id, name)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::PlaylistsChanged));
        Ok(())
    }

    pub fn delete_playlist(&self, playlist_id: i64) -> Result<(), rusqlite::Error> {
        {
            let mut store = self.store.lock().expect("collection store lock poisoned");
            store.delete_playlist(playlist_id)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::PlaylistsChanged));
        Ok(())
    }

    pub fn playlists(&self) -> Result<Vec<PlaylistRow>, rusqlite::Error> {
        let store = self.store.lock().expect("collection store lock poisoned");
        store.playlists()
    }

    pub fn playlists_by_name(&self, name: &str) -> Result<Vec<PlaylistRow>, rusqlite::Error> {
        let store = self.store.lock().expect("collection store lock poisoned");
        store.playlists_by_name(name)
    }

    pub fn playlist_exists(&self, playlist_id: i64) -> Result<bool, rusqlite::Error> {
        let store = self.store.lock().expect("collection store lock poisoned");
        store.playlist_exists(playlist_id)
    }

    /// All playlists with members, swept for stale references first and
    /// sorted by the active playlist sort preference.
    pub fn playlists_with_songs(&self) -> Result<Vec<PlaylistWithSongs>, rusqlite::Error> {
        self.reconciler.sweep()?;
        let order = self
            .config
            .lock()
            .expect("config lock poisoned")
            .sorting
            .playlist_sort_order;
        let store = self.store.lock().expect("collection store lock poisoned");
        store.playlists_with_songs(order)
    }

    /// Songs of one playlist in stored order, swept first.
    pub fn playlist_songs(&self, playlist_id: i64) -> Result<Vec<Song>, rusqlite::Error> {
        self.reconciler.sweep()?;
        let entries = {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.songs_from_playlist(playlist_id)?
        };
        let ids: Vec<i64> = entries.iter().map(|entry| entry.song_id).collect();
        Ok(self.songs_for_ids(&ids))
    }

    pub fn add_songs_to_playlist(
        &self,
        playlist_id: i64,
        song_ids: &[i64],
    ) -> Result<(), rusqlite::Error> {
        {
            let mut store = self.store.lock().expect("collection store lock poisoned");
            store.add_songs_to_playlist(playlist_id, song_ids)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::PlaylistSongsChanged {
                playlist_id,
            }));
        Ok(())
    }

    pub fn remove_song_from_playlist(
        &self,
        playlist_id: i64,
        song_id: i64,
    ) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.remove_song_from_playlist(playlist_id, song_id)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::PlaylistSongsChanged {
                playlist_id,
            }));
        Ok(())
    }

    // --- favorites ---

    pub fn favorites_playlist_id(&self) -> Result<i64, rusqlite::Error> {
        let store = self.store.lock().expect("collection store lock poisoned");
        store.ensure_favorites_playlist()
    }

    pub fn is_favorite(&self, song_id: i64) -> Result<bool, rusqlite::Error> {
        let store = self.store.lock().expect("collection store lock poisoned");
        let playlist_id = store.ensure_favorites_playlist()?;
        store.is_song_in_playlist(playlist_id, song_id)
    }

    pub fn add_favorite(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        {
            let mut store = self.store.lock().expect("collection store lock poisoned");
            let playlist_id = store.ensure_favorites_playlist()?;
            store.add_songs_to_playlist(playlist_id, &[song_id])?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::FavoritesChanged));
        Ok(())
    }

    pub fn remove_favorite(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            let playlist_id = store.ensure_favorites_playlist()?;
            store.remove_song_from_playlist(playlist_id, song_id)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::FavoritesChanged));
        Ok(())
    }

    pub fn favorite_songs(&self) -> Result<Vec<Song>, rusqlite::Error> {
        let playlist_id = self.favorites_playlist_id()?;
        self.playlist_songs(playlist_id)
    }

    // --- history ---

    /// Records one play: first play inserts a row, repeats bump the count
    /// and the timestamp.
    pub fn record_play(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            let entry = match store.history_entry(song_id)? {
                Some(existing) => HistoryEntry {
                    song_id,
                    time_played: now_unix_ms(),
                    play_count: existing.play_count + 1,
                },
                None => HistoryEntry {
                    song_id,
                    time_played: now_unix_ms(),
                    play_count: 1,
                },
            };
            store.upsert_history(&entry)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::HistoryChanged));
        Ok(())
    }

    /// Most recently played songs, swept first, bounded to the history
    /// window.
    pub fn recently_played(&self) -> Result<Vec<Song>, rusqlite::Error> {
        self.reconciler.sweep()?;
        let entries = {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.recent_history()?
        };
        let ids: Vec<i64> = entries.iter().map(|entry| entry.song_id).collect();
        Ok(self.songs_for_ids(&ids))
    }

    /// Most played songs, swept first, bounded to the history window.
    pub fn top_played(&self) -> Result<Vec<Song>, rusqlite::Error> {
        self.reconciler.sweep()?;
        let entries = {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.most_played_history()?
        };
        let ids: Vec<i64> = entries.iter().map(|entry| entry.song_id).collect();
        Ok(self.songs_for_ids(&ids))
    }

    /// Songs absent from recent history, shuffled. Small libraries are
    /// padded with the tail half of the recents so the view never starves.
    pub fn not_recently_played(&self) -> Result<Vec<Song>, rusqlite::Error> {
        let recent = self.recently_played()?;
        let recent_ids: HashSet<i64> = recent.iter().map(|song| song.id).collect();
        let all_songs = self.cache.songs();

        let mut forgotten: Vec<Song> = all_songs
            .into_iter()
            .filter(|song| !recent_ids.contains(&song.id))
            .collect();

        let mut rng = StdRng::from_rng(&mut rand::rng());
        if forgotten.len() >= HISTORY_LIMIT {
            forgotten.shuffle(&mut rng);
            forgotten.truncate(HISTORY_LIMIT);
        } else {
            let recents_take = min(HISTORY_LIMIT - forgotten.len(), recent.len() / 2);
            forgotten.extend(recent[recent.len() - recents_take..].iter().cloned());
            forgotten.shuffle(&mut rng);
        }
        Ok(forgotten)
    }

    /// Suggestion shelf: not-recently-played songs, or nothing when the
    /// pool is too small to be interesting.
    pub fn suggestions(&self) -> Result<Vec<Song>, rusqlite::Error> {
        let songs = self.not_recently_played()?;
        if songs.len() > 9 {
            Ok(songs)
        } else {
            Ok(Vec::new())
        }
    }

    pub fn history_size(&self) -> Result<usize, rusqlite::Error> {
        self.reconciler.sweep()?;
        let store = self.store.lock().expect("collection store lock poisoned");
        store.history_size()
    }

    pub fn remove_from_history(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.delete_history_entry(song_id)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::HistoryChanged));
        Ok(())
    }

    pub fn clear_history(&self) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.clear_history()?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::HistoryChanged));
        Ok(())
    }

    /// Drops a song the consumer deleted from disk: purges history and
    /// playlist references immediately.
    pub fn delete_song(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.delete_song(song_id)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::HistoryChanged));
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::PlaylistsChanged));
        Ok(())
    }

    // --- queue snapshots ---

    pub fn set_queue(&self, song_ids: &[i64]) -> Result<(), rusqlite::Error> {
        {
            let mut store = self.store.lock().expect("collection store lock poisoned");
            store.replace_queue(song_ids)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::QueueChanged));
        Ok(())
    }

    pub fn set_original_queue(&self, song_ids: &[i64]) -> Result<(), rusqlite::Error> {
        {
            let mut store = self.store.lock().expect("collection store lock poisoned");
            store.replace_original_queue(song_ids)?;
        }
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::QueueChanged));
        Ok(())
    }

    /// The persisted queue with stale ids filtered in memory. Rows are
    /// never deleted here; only a full queue write replaces them.
    pub fn queue(&self) -> Result<Vec<Song>, rusqlite::Error> {
        self.cache.refresh().wait();
        let entries = {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.queue()?
        };
        let ids: Vec<i64> = entries.iter().map(|entry| entry.song_id).collect();
        Ok(self.songs_for_ids(&ids))
    }

    pub fn original_queue(&self) -> Result<Vec<Song>, rusqlite::Error> {
        self.cache.refresh().wait();
        let entries = {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.original_queue()?
        };
        let ids: Vec<i64> = entries.iter().map(|entry| entry.song_id).collect();
        Ok(self.songs_for_ids(&ids))
    }

    // --- preferences ---

    pub fn set_song_sort_order(&self, order: SongSortOrder) {
        let snapshot = {
            let mut config = self.config.lock().expect("config lock poisoned");
            config.sorting.song_sort_order = order;
            config.clone()
        };
        self.persist_config(&snapshot);
        let _ = self
            .bus_producer
            .send(Message::Config(ConfigMessage::ConfigChanged(snapshot)));
    }

    pub fn set_playlist_sort_order(&self, order: PlaylistSortOrder) {
        let snapshot = {
            let mut config = self.config.lock().expect("config lock poisoned");
            config.sorting.playlist_sort_order = order;
            config.clone()
        };
        self.persist_config(&snapshot);
        let _ = self
            .bus_producer
            .send(Message::Config(ConfigMessage::ConfigChanged(snapshot)));
    }

    fn persist_config(&self, config: &Config) {
        if let Err(err) = config_persistence::save_config(&self.config_path, config) {
            warn!(
                "Failed to persist config {}: {}",
                self.config_path.display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_index::AudioRow;

    struct RepositoryHarness {
        repository: MusicRepository,
        _config_dir: tempfile::TempDir,
    }

    impl RepositoryHarness {
        fn new() -> Self {
            let (bus_sender, _) = tokio::sync::broadcast::channel(1024);
            let media_index = MediaIndex::new_in_memory(bus_sender.clone()).expect("index");
            let store = CollectionStore::new_in_memory().expect("store");
            let mut config = Config::default();
            config.filters.min_song_duration_ms = 0;
            let config_dir = tempfile::tempdir().expect("tempdir");
            let repository = MusicRepository::new(
                config,
                config_dir.path().join("config.toml"),
                media_index,
                store,
                bus_sender,
            );
            Self {
                repository,
                _config_dir: config_dir,
            }
        }

        fn insert_song(&self, title: &str, path: &str) -> i64 {
            let index = self
                .repository
                .media_index
                .lock()
                .expect("media index lock");
            index
                .insert(&AudioRow {
                    title: title.to_string(),
                    path: PathBuf::from(path),
                    duration_ms: 60_000,
                    ..AudioRow::default()
                })
                .expect("insert")
        }

        fn delete_song_from_index(&self, song_id: i64) {
            let index = self
                .repository
                .media_index
                .lock()
                .expect("media index lock");
            index.delete(song_id).expect("delete");
        }
    }

    #[test]
    fn test_playlist_songs_drop_stale_references_after_sweep() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        let one = harness.insert_song("One", "/music/1.mp3");
        let two = harness.insert_song("Two", "/music/2.mp3");
        let three = harness.insert_song("Three", "/music/3.mp3");

        let playlist = repo.create_playlist("Mix").expect("create");
        repo.add_songs_to_playlist(playlist, &[one, two, three])
            .expect("add");

        harness.delete_song_from_index(two);

        let ids: Vec<i64> = repo
            .playlist_songs(playlist)
            .expect("playlist songs")
            .iter()
            .map(|song| song.id)
            .collect();
        assert_eq!(ids, vec![one, three]);
    }

    #[test]
    fn test_queue_replace_semantics_and_read_filtering() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        let a = harness.insert_song("A", "/music/a.mp3");
        let b = harness.insert_song("B", "/music/b.mp3");
        let c = harness.insert_song("C", "/music/c.mp3");

        repo.set_queue(&[a, b]).expect("first queue");
        repo.set_queue(&[c, a]).expect("second queue");

        let ids: Vec<i64> = repo.queue().expect("queue").iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![c, a]);

        // A deleted song disappears from the read without row deletion.
        harness.delete_song_from_index(c);
        let ids: Vec<i64> = repo.queue().expect("queue").iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a]);
        {
            let store = repo.store.lock().expect("store lock");
            assert_eq!(store.queue().expect("rows").len(), 2);
        }
    }

    #[test]
    fn test_favorites_round_trip_and_singleton() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        let song = harness.insert_song("Fav", "/music/f.mp3");

        assert!(!repo.is_favorite(song).expect("is favorite"));
        repo.add_favorite(song).expect("add");
        assert!(repo.is_favorite(song).expect("is favorite"));

        let favorites: Vec<i64> = repo
            .favorite_songs()
            .expect("favorites")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(favorites, vec![song]);

        repo.remove_favorite(song).expect("remove");
        assert!(!repo.is_favorite(song).expect("is favorite"));

        // Repeated ensure calls never create a second tagged playlist.
        let first = repo.favorites_playlist_id().expect("ensure");
        let second = repo.favorites_playlist_id().expect("ensure");
        assert_eq!(first, second);
        assert_eq!(repo.playlists().expect("playlists").len(), 1);
    }

    #[test]
    fn test_record_play_increments_play_count() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        let song = harness.insert_song("Hit", "/music/h.mp3");

        repo.record_play(song).expect("first play");
        repo.record_play(song).expect("second play");

        let store = repo.store.lock().expect("store lock");
        let entry = store.history_entry(song).expect("read").expect("present");
        assert_eq!(entry.play_count, 2);
    }

    #[test]
    fn test_recently_played_orders_by_recency() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        let older = harness.insert_song("Older", "/music/o.mp3");
        let newer = harness.insert_song("Newer", "/music/n.mp3");

        {
            let store = repo.store.lock().expect("store lock");
            store
                .upsert_history(&HistoryEntry {
                    song_id: older,
                    time_played: 1_000,
                    play_count: 5,
                })
                .expect("insert");
            store
                .upsert_history(&HistoryEntry {
                    song_id: newer,
                    time_played: 2_000,
                    play_count: 1,
                })
                .expect("insert");
        }

        let recent: Vec<i64> = repo
            .recently_played()
            .expect("recent")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(recent, vec![newer, older]);

        let top: Vec<i64> = repo
            .top_played()
            .expect("top")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(top, vec![older, newer]);
    }

    #[test]
    fn test_not_recently_played_pads_small_libraries() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(harness.insert_song(&format!("S{}", i), &format!("/music/{}.mp3", i)));
        }
        // Four of six songs are recent; two are forgotten.
        {
            let store = repo.store.lock().expect("store lock");
            for (offset, id) in ids.iter().take(4).enumerate() {
                store
                    .upsert_history(&HistoryEntry {
                        song_id: *id,
                        time_played: 1_000 + offset as i64,
                        play_count: 1,
                    })
                    .expect("insert");
            }
        }

        let pool = repo.not_recently_played().expect("pool");
        // Two forgotten songs plus half of the four recents.
        assert_eq!(pool.len(), 4);
        let pool_ids: HashSet<i64> = pool.iter().map(|s| s.id).collect();
        assert!(pool_ids.contains(&ids[4]));
        assert!(pool_ids.contains(&ids[5]));
    }

    #[test]
    fn test_suggestions_require_a_minimum_pool() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        for i in 0..5 {
            harness.insert_song(&format!("S{}", i), &format!("/music/{}.mp3", i));
        }
        assert!(repo.suggestions().expect("suggestions").is_empty());

        for i in 5..15 {
            harness.insert_song(&format!("S{}", i), &format!("/music/{}.mp3", i));
        }
        assert_eq!(repo.suggestions().expect("suggestions").len(), 15);
    }

    #[test]
    fn test_search_songs_matches_title_substring() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        harness.insert_song("Love Song", "/music/a.mp3");
        harness.insert_song("Other", "/music/b.mp3");

        let found = repo.search_songs("love");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Love Song");
        assert!(repo.search_songs("polka").is_empty());
    }

    #[test]
    fn test_songs_by_paths_bypasses_filters() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        let hidden = harness.insert_song("Hidden", "/ringtones/h.mp3");
        {
            let store = repo.store.lock().expect("store lock");
            store.add_blacklist_path("/ringtones").expect("blacklist");
        }

        let matched = repo.songs_by_paths(&[PathBuf::from("/ringtones/h.mp3")]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, hidden);

        assert!(repo
            .songs_by_path(Path::new("/ringtones/h.mp3"), false)
            .is_empty());
    }

    #[test]
    fn test_set_song_sort_order_changes_sorted_view_and_persists() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        harness.insert_song("beta", "/music/b.mp3");
        harness.insert_song("Alpha", "/music/a.mp3");
        repo.refresh_songs().wait();

        repo.set_song_sort_order(SongSortOrder::TitleZa);
        let titles: Vec<String> = repo
            .sorted_songs()
            .iter()
            .map(|s| s.title.clone())
            .collect();
        assert_eq!(titles, vec!["beta".to_string(), "Alpha".to_string()]);

        let reloaded = config_persistence::load_config(&repo.config_path);
        assert_eq!(reloaded.sorting.song_sort_order, SongSortOrder::TitleZa);
    }

    #[test]
    fn test_start_seeds_filters_and_starts_observer() {
        let harness = RepositoryHarness::new();
        let repo = &harness.repository;
        repo.start().expect("start");

        assert_eq!(
            repo.path_filters().blacklist_paths().expect("blacklist").len(),
            3
        );
        assert_eq!(
            repo.path_filters().whitelist_paths().expect("whitelist").len(),
            1
        );

        // The observer picks up platform inserts without an explicit
        // refresh from the consumer.
        let id = harness.insert_song("Live", "/music/live.mp3");
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            if repo.songs().iter().any(|song| song.id == id) {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "observer did not pick up the insert"
            );
            thread::sleep(std::time::Duration::from_millis(10));
        }
    }
}
