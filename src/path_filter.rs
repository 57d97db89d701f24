//! Blacklist/whitelist path management.
//!
//! Mutations persist synchronously, broadcast the updated list, and keep
//! the song cache and collection store consistent: a mutation that can
//! only grow the visible song set rebuilds the cache, one that can shrink
//! it runs a full reconciler sweep (which rebuilds first).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use tokio::sync::broadcast::Sender;

use crate::collection_store::CollectionStore;
use crate::config::Config;
use crate::config_persistence;
use crate::protocol::{CollectionMessage, ConfigMessage, Message};
use crate::reconciler::Reconciler;
use crate::song_cache::SongCache;

/// Canonicalizes a path, falling back to the path as given when the file
/// system cannot resolve it.
pub fn safe_canonical_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Platform directories seeded into the blacklist on first run: the
/// alarm, notification, and ringtone folders next to the music directory.
pub fn default_blacklist_paths() -> Vec<PathBuf> {
    let storage_root = dirs::audio_dir()
        .and_then(|audio| audio.parent().map(Path::to_path_buf))
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("/"));
    ["Alarms", "Notifications", "Ringtones"]
        .iter()
        .map(|name| storage_root.join(name))
        .collect()
}

/// Platform music directory seeded into the whitelist on first run.
pub fn default_whitelist_path() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
        .unwrap_or_else(|| PathBuf::from("/"))
}

pub struct PathFilterStore {
    store: Arc<Mutex<CollectionStore>>,
    cache: Arc<SongCache>,
    reconciler: Arc<Reconciler>,
    config: Arc<Mutex<Config>>,
    config_path: PathBuf,
    bus_producer: Sender<Message>,
}

impl PathFilterStore {
    pub fn new(
        store: Arc<Mutex<CollectionStore>>,
        cache: Arc<SongCache>,
        reconciler: Arc<Reconciler>,
        config: Arc<Mutex<Config>>,
        config_path: PathBuf,
        bus_producer: Sender<Message>,
    ) -> Self {
        Self {
            store,
            cache,
            reconciler,
            config,
            config_path,
            bus_producer,
        }
    }

    // --- blacklist ---

    /// Adds a blacklist prefix. Shrinks the visible set, so the cache is
    /// rebuilt and stale references are swept.
    pub fn add_blacklist_path(&self, path: &Path) -> Result<(), rusqlite::Error> {
        let canonical = safe_canonical_path(path);
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.add_blacklist_path(&canonical.to_string_lossy())?;
        }
        self.broadcast_blacklist()?;
        self.reconciler.sweep()?;
        Ok(())
    }

    /// Removes a blacklist prefix. Can only grow the visible set, so a
    /// rebuild suffices.
    pub fn remove_blacklist_path(&self, path: &Path) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.remove_blacklist_path(&safe_canonical_path(path).to_string_lossy())?;
        }
        self.broadcast_blacklist()?;
        self.cache.refresh().wait();
        Ok(())
    }

    pub fn clear_blacklist(&self) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.clear_blacklist()?;
        }
        self.broadcast_blacklist()?;
        self.cache.refresh().wait();
        Ok(())
    }

    pub fn blacklist_paths(&self) -> Result<Vec<String>, rusqlite::Error> {
        let store = self.store.lock().expect("collection store lock poisoned");
        store.blacklist_paths()
    }

    // --- whitelist ---

    /// Adds a whitelist prefix. In whitelist mode this grows the visible
    /// set; a rebuild suffices.
    pub fn add_whitelist_path(&self, path: &Path) -> Result<(), rusqlite::Error> {
        let canonical = safe_canonical_path(path);
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.add_whitelist_path(&canonical.to_string_lossy())?;
        }
        self.broadcast_whitelist()?;
        self.cache.refresh().wait();
        Ok(())
    }

    /// Removes a whitelist prefix. Shrinks the visible set: sweep.
    pub fn remove_whitelist_path(&self, path: &Path) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.remove_whitelist_path(&safe_canonical_path(path).to_string_lossy())?;
        }
        self.broadcast_whitelist()?;
        self.reconciler.sweep()?;
        Ok(())
    }

    pub fn clear_whitelist(&self) -> Result<(), rusqlite::Error> {
        {
            let store = self.store.lock().expect("collection store lock poisoned");
            store.clear_whitelist()?;
        }
        self.broadcast_whitelist()?;
        self.reconciler.sweep()?;
        Ok(())
    }

    pub fn whitelist_paths(&self) -> Result<Vec<String>, rusqlite::Error> {
        let store = self.store.lock().expect("collection store lock poisoned");
        store.whitelist_paths()
    }

    // --- mode ---

    pub fn whitelist_mode(&self) -> bool {
        self.config
            .lock()
            .expect("config lock poisoned")
            .filters
            .whitelist_mode
    }

    /// Switches between blacklist and whitelist mode. Turning whitelist
    /// mode on can shrink the visible set (sweep); turning it off can
    /// only grow it (rebuild).
    pub fn set_whitelist_mode(&self, enabled: bool) -> Result<(), rusqlite::Error> {
        let config_snapshot = {
            let mut config = self.config.lock().expect("config lock poisoned");
            if config.filters.whitelist_mode == enabled {
                return Ok(());
            }
            config.filters.whitelist_mode = enabled;
            config.clone()
        };
        self.persist_config(&config_snapshot);
        let _ = self
            .bus_producer
            .send(Message::Config(ConfigMessage::ConfigChanged(
                config_snapshot,
            )));

        if enabled {
            self.reconciler.sweep()?;
        } else {
            self.cache.refresh().wait();
        }
        Ok(())
    }

    // --- first-run seeding ---

    /// Seeds the default blacklist and whitelist entries once. Writes go
    /// straight to the store; the caller runs the startup sweep afterward.
    pub fn seed_defaults(&self) -> Result<(), rusqlite::Error> {
        let (seed_blacklist, seed_whitelist) = {
            let config = self.config.lock().expect("config lock poisoned");
            (
                !config.filters.blacklist_seeded,
                !config.filters.whitelist_seeded,
            )
        };
        if !seed_blacklist && !seed_whitelist {
            return Ok(());
        }

        {
            let store = self.store.lock().expect("collection store lock poisoned");
            if seed_blacklist {
                store.clear_blacklist()?;
                for path in default_blacklist_paths() {
                    store.add_blacklist_path(&safe_canonical_path(&path).to_string_lossy())?;
                }
                info!("Seeded default blacklist directories");
            }
            if seed_whitelist {
                store.clear_whitelist()?;
                let path = default_whitelist_path();
                store.add_whitelist_path(&safe_canonical_path(&path).to_string_lossy())?;
                info!("Seeded default whitelist directory");
            }
        }

        let config_snapshot = {
            let mut config = self.config.lock().expect("config lock poisoned");
            config.filters.blacklist_seeded = true;
            config.filters.whitelist_seeded = true;
            config.clone()
        };
        self.persist_config(&config_snapshot);
        self.broadcast_blacklist()?;
        self.broadcast_whitelist()?;
        Ok(())
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

    fn broadcast_blacklist(&self) -> Result<(), rusqlite::Error> {
        let paths = self.blacklist_paths()?;
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::BlacklistChanged(
                paths,
            )));
        Ok(())
    }

    fn broadcast_whitelist(&self) -> Result<(), rusqlite::Error> {
        let paths = self.whitelist_paths()?;
        let _ = self
            .bus_producer
            .send(Message::Collection(CollectionMessage::WhitelistChanged(
                paths,
            )));
        Ok(())
    }
}
