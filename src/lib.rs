//! Data-access and media-library layer for a music player.
//!
//! Mirrors the platform media index into an in-memory song cache, keeps
//! user collections (playlists, history, favorites, queue snapshots) in
//! SQLite, and reconciles the two whenever the catalog or the path
//! filters change. Consumers subscribe to the broadcast bus for snapshot
//! updates and call [`MusicRepository`] for everything else.

pub mod catalog_query;
pub mod collection_store;
pub mod config;
pub mod config_persistence;
pub mod folder_scan;
pub mod media_index;
pub mod path_filter;
pub mod protocol;
pub mod reconciler;
pub mod repository;
pub mod song;
pub mod song_cache;

pub use collection_store::{
    CollectionStore, HistoryEntry, PlaylistEntry, PlaylistRow, PlaylistWithSongs, QueueEntry,
    FAVORITES_TAG, HISTORY_LIMIT,
};
pub use config::{Config, PlaylistSortOrder, SongSortOrder};
pub use media_index::{AudioRow, MediaIndex};
pub use path_filter::PathFilterStore;
pub use protocol::{CatalogChange, CatalogMessage, CollectionMessage, ConfigMessage, Message};
pub use reconciler::{Reconciler, SweepOutcome};
pub use repository::MusicRepository;
pub use song::Song;
pub use song_cache::{ChangeObserver, RefreshHandle, SongCache};
