//! Event-bus protocol shared by the catalog, collection storage, and
//! consumers.
//!
//! This module defines all message payloads exchanged between the song
//! cache, the collection store, the path-filter layer, and any subscribed
//! consumer. A subscriber's `Receiver` is its registration token: dropping
//! the receiver unsubscribes it.

use crate::config::Config;
use crate::song::Song;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Catalog(CatalogMessage),
    Collection(CollectionMessage),
    Config(ConfigMessage),
}

/// One change notification from the media index.
///
/// Targeted variants carry the id of the affected row; `Unknown` means the
/// index changed in some unspecified way and the whole cache must be
/// rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogChange {
    Unknown,
    Inserted(i64),
    Updated(i64),
    Deleted(i64),
}

/// Catalog-domain notifications.
#[derive(Debug, Clone)]
pub enum CatalogMessage {
    /// The media index reported a change. Consumed by the change observer.
    Changed(CatalogChange),
    /// A new cache snapshot is available after a rebuild or patch.
    SongsChanged(Vec<Song>),
}

/// Collection-domain notifications. Consumers re-read the affected
/// collection through the repository on receipt.
#[derive(Debug, Clone)]
pub enum CollectionMessage {
    PlaylistsChanged,
    PlaylistSongsChanged { playlist_id: i64 },
    HistoryChanged,
    FavoritesChanged,
    QueueChanged,
    BlacklistChanged(Vec<String>),
    WhitelistChanged(Vec<String>),
}

/// Settings updates.
#[derive(Debug, Clone)]
pub enum ConfigMessage {
    ConfigChanged(Config),
}
