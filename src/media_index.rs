//! Media-index stand-in: the upstream, externally mutable audio catalog.
//!
//! The index is owned by the platform/scanner side; this crate reads it
//! through filtered queries and listens for its change notifications.
//! Mutating helpers model the platform side of that contract: every write
//! broadcasts a targeted [`CatalogChange`] so the change observer can
//! patch the song cache.

use std::path::PathBuf;

use log::warn;
use rusqlite::{params, Connection};
use tokio::sync::broadcast::Sender;

use crate::catalog_query::{self, CatalogSelection, FilterSnapshot};
use crate::protocol::{CatalogChange, CatalogMessage, Message};
use crate::song::Song;

/// Handle on the media-index database.
pub struct MediaIndex {
    conn: Connection,
    bus_producer: Sender<Message>,
}

/// One audio row as written by the platform side.
#[derive(Debug, Clone)]
pub struct AudioRow {
    pub title: String,
    pub track_number: i64,
    pub year: i64,
    pub duration_ms: i64,
    pub path: PathBuf,
    pub date_modified: i64,
    pub album_id: i64,
    pub album_name: String,
    pub artist_id: i64,
    pub artist_name: String,
    pub composer: String,
    pub album_artist: String,
    /// Rows flagged false (ringtone fragments, recordings) never match
    /// the base music predicate.
    pub is_music: bool,
}

impl Default for AudioRow {
    fn default() -> Self {
        AudioRow {
            title: String::new(),
            track_number: 0,
            year: 0,
            duration_ms: 0,
            path: PathBuf::new(),
            date_modified: 0,
            album_id: 0,
            album_name: String::new(),
            artist_id: 0,
            artist_name: String::new(),
            composer: String::new(),
            album_artist: String::new(),
            is_music: true,
        }
    }
}

impl MediaIndex {
    /// Opens the index at the default platform data location.
    pub fn open_default(bus_producer: Sender<Message>) -> Result<Self, rusqlite::Error> {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("songvault");
        if !data_dir.exists() {
            if let Err(err) = std::fs::create_dir_all(&data_dir) {
                warn!("Failed to create data directory {}: {}", data_dir.display(), err);
            }
        }
        Self::open(&data_dir.join("media_index.db"), bus_producer)
    }

    pub fn open(
        path: &std::path::Path,
        bus_producer: Sender<Message>,
    ) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let index = Self { conn, bus_producer };
        index.initialize_schema()?;
        Ok(index)
    }

    pub fn new_in_memory(bus_producer: Sender<Message>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let index = Self { conn, bus_producer };
        index.initialize_schema()?;
        Ok(index)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS audio (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                track_number INTEGER NOT NULL DEFAULT 0,
                year INTEGER NOT NULL DEFAULT 0,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                path TEXT NOT NULL UNIQUE,
                date_modified INTEGER NOT NULL DEFAULT 0,
                album_id INTEGER NOT NULL DEFAULT 0,
                album TEXT,
                artist_id INTEGER NOT NULL DEFAULT 0,
                artist TEXT,
                composer TEXT,
                album_artist TEXT,
                is_music INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )?;
        Ok(())
    }

    /// Issues a built selection and maps every row to a `Song`.
    ///
    /// Row mapping is unconditional: missing optional text fields are
    /// coalesced to empty strings, never an error.
    pub fn query_songs(
        &self,
        selection: &CatalogSelection,
    ) -> Result<Vec<Song>, rusqlite::Error> {
        let sql = match &selection.clause {
            Some(clause) => format!(
                "SELECT id, title, track_number, year, duration_ms, path, date_modified, \
                 album_id, album, artist_id, artist, composer, album_artist \
                 FROM audio WHERE {} ORDER BY {}",
                clause, selection.order_by
            ),
            None => format!(
                "SELECT id, title, track_number, year, duration_ms, path, date_modified, \
                 album_id, album, artist_id, artist, composer, album_artist \
                 FROM audio ORDER BY {}",
                selection.order_by
            ),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(selection.args.iter()),
            Self::song_from_row,
        )?;

        let mut songs = Vec::new();
        for song in rows {
            songs.push(song?);
        }
        Ok(songs)
    }

    /// The filtered catalog query.
    ///
    /// Builds the selection from the caller's predicate and the filter
    /// snapshot, then issues it. Returns `None` without querying when
    /// whitelist mode is active with an empty whitelist, and maps any
    /// query failure (the platform's permission denial) to `None` as well.
    pub fn songs_filtered(
        &self,
        extra_clause: Option<&str>,
        extra_args: &[String],
        filter: &FilterSnapshot,
        order_by: &str,
        ignore_filters: bool,
    ) -> Option<Vec<Song>> {
        let selection =
            catalog_query::build_selection(extra_clause, extra_args, filter, order_by, ignore_filters)?;
        match self.query_songs(&selection) {
            Ok(songs) => Some(songs),
            Err(err) => {
                warn!("Catalog query failed: {}", err);
                None
            }
        }
    }

    /// Single-row lookup through the normal filtered path, so a row that
    /// no longer matches the active filters resolves to `None`.
    pub fn song_by_id_filtered(&self, song_id: i64, filter: &FilterSnapshot) -> Option<Song> {
        let args = vec![song_id.to_string()];
        self.songs_filtered(
            Some("id = ?"),
            &args,
            filter,
            catalog_query::CANONICAL_ORDER,
            false,
        )
        .and_then(|songs| songs.into_iter().next())
    }

    fn song_from_row(row: &rusqlite::Row<'_>) -> Result<Song, rusqlite::Error> {
        Ok(Song {
            id: row.get(0)?,
            title: row.get(1).unwrap_or_default(),
            track_number: row.get(2).unwrap_or_default(),
            year: row.get(3).unwrap_or_default(),
            duration_ms: row.get(4).unwrap_or_default(),
            path: PathBuf::from(row.get::<_, String>(5)?),
            date_modified: row.get(6).unwrap_or_default(),
            album_id: row.get(7).unwrap_or_default(),
            album_name: row.get(8).unwrap_or_default(),
            artist_id: row.get(9).unwrap_or_default(),
            artist_name: row.get(10).unwrap_or_default(),
            composer: row.get(11).unwrap_or_default(),
            album_artist: row.get(12).unwrap_or_default(),
        })
    }

    /// Platform-side insert. Broadcasts a targeted insert notification.
    pub fn insert(&self, row: &AudioRow) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO audio (title, track_number, year, duration_ms, path, date_modified, \
             album_id, album, artist_id, artist, composer, album_artist, is_music) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                row.title,
                row.track_number,
                row.year,
                row.duration_ms,
                row.path.to_string_lossy(),
                row.date_modified,
                row.album_id,
                row.album_name,
                row.artist_id,
                row.artist_name,
                row.composer,
                row.album_artist,
                row.is_music as i64,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        let _ = self
            .bus_producer
            .send(Message::Catalog(CatalogMessage::Changed(
                CatalogChange::Inserted(id),
            )));
        Ok(id)
    }

    /// Platform-side metadata update. Broadcasts a targeted update.
    pub fn update(&self, song_id: i64, row: &AudioRow) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE audio SET title = ?1, track_number = ?2, year = ?3, duration_ms = ?4, \
             path = ?5, date_modified = ?6, album_id = ?7, album = ?8, artist_id = ?9, \
             artist = ?10, composer = ?11, album_artist = ?12, is_music = ?13 WHERE id = ?14",
            params![
                row.title,
                row.track_number,
                row.year,
                row.duration_ms,
                row.path.to_string_lossy(),
                row.date_modified,
                row.album_id,
                row.album_name,
                row.artist_id,
                row.artist_name,
                row.composer,
                row.album_artist,
                row.is_music as i64,
                song_id,
            ],
        )?;
        let _ = self
            .bus_producer
            .send(Message::Catalog(CatalogMessage::Changed(
                CatalogChange::Updated(song_id),
            )));
        Ok(())
    }

    /// Platform-side delete. Broadcasts a targeted delete.
    pub fn delete(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM audio WHERE id = ?1", params![song_id])?;
        let _ = self
            .bus_producer
            .send(Message::Catalog(CatalogMessage::Changed(
                CatalogChange::Deleted(song_id),
            )));
        Ok(())
    }

    /// Broadcasts an unspecified catalog change, forcing a full rebuild.
    pub fn notify_changed(&self) {
        let _ = self
            .bus_producer
            .send(Message::Catalog(CatalogMessage::Changed(
                CatalogChange::Unknown,
            )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_query::CANONICAL_ORDER;
    use tokio::sync::broadcast;

    fn test_index() -> MediaIndex {
        let (bus_sender, _) = broadcast::channel(64);
        MediaIndex::new_in_memory(bus_sender).expect("in-memory index")
    }

    fn audio_row(title: &str, path: &str, duration_ms: i64) -> AudioRow {
        AudioRow {
            title: title.to_string(),
            path: PathBuf::from(path),
            duration_ms,
            ..AudioRow::default()
        }
    }

    fn open_filter() -> FilterSnapshot {
        FilterSnapshot::default()
    }

    #[test]
    fn test_insert_then_query_round_trips_song_fields() {
        let index = test_index();
        let mut row = audio_row("First", "/music/a.mp3", 180_000);
        row.album_name = "Album".to_string();
        row.artist_name = "Artist".to_string();
        let id = index.insert(&row).expect("insert");

        let songs = index
            .songs_filtered(None, &[], &open_filter(), CANONICAL_ORDER, false)
            .expect("songs");
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].id, id);
        assert_eq!(songs[0].title, "First");
        assert_eq!(songs[0].album_name, "Album");
        assert_eq!(songs[0].path, PathBuf::from("/music/a.mp3"));
    }

    #[test]
    fn test_null_optional_fields_are_coalesced_to_empty() {
        let index = test_index();
        index
            .conn
            .execute(
                "INSERT INTO audio (title, duration_ms, path) VALUES ('Bare', 60000, '/m/b.mp3')",
                [],
            )
            .expect("raw insert");

        let songs = index
            .songs_filtered(None, &[], &open_filter(), CANONICAL_ORDER, false)
            .expect("songs");
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].album_name, "");
        assert_eq!(songs[0].artist_name, "");
        assert_eq!(songs[0].composer, "");
        assert_eq!(songs[0].album_artist, "");
    }

    #[test]
    fn test_non_music_rows_are_excluded_unless_filters_ignored() {
        let index = test_index();
        let mut row = audio_row("Ringtone", "/ringtones/r.mp3", 30_000);
        row.is_music = false;
        index.insert(&row).expect("insert");

        let filter = FilterSnapshot {
            min_duration_ms: 0,
            ..FilterSnapshot::default()
        };
        let filtered = index
            .songs_filtered(None, &[], &filter, CANONICAL_ORDER, false)
            .expect("songs");
        assert!(filtered.is_empty());

        let unfiltered = index
            .songs_filtered(None, &[], &filter, CANONICAL_ORDER, true)
            .expect("songs");
        assert_eq!(unfiltered.len(), 1);
    }

    #[test]
    fn test_duration_floor_excludes_short_rows() {
        let index = test_index();
        index
            .insert(&audio_row("Short", "/music/s.mp3", 5_000))
            .expect("insert");
        index
            .insert(&audio_row("Long", "/music/l.mp3", 120_000))
            .expect("insert");

        let filter = FilterSnapshot {
            min_duration_ms: 20_000,
            ..FilterSnapshot::default()
        };
        let songs = index
            .songs_filtered(None, &[], &filter, CANONICAL_ORDER, false)
            .expect("songs");
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Long");
    }

    #[test]
    fn test_blacklisted_prefix_is_excluded() {
        let index = test_index();
        index
            .insert(&audio_row("Keep", "/music/a.mp3", 60_000))
            .expect("insert");
        index
            .insert(&audio_row("Drop", "/ringtones/b.mp3", 60_000))
            .expect("insert");

        let filter = FilterSnapshot {
            blacklist: vec!["/ringtones".to_string()],
            min_duration_ms: 0,
            ..FilterSnapshot::default()
        };
        let songs = index
            .songs_filtered(None, &[], &filter, CANONICAL_ORDER, false)
            .expect("songs");
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Keep");
    }

    #[test]
    fn test_whitelist_mode_includes_only_matching_prefixes() {
        let index = test_index();
        index
            .insert(&audio_row("In", "/music/a.mp3", 60_000))
            .expect("insert");
        index
            .insert(&audio_row("Out", "/downloads/b.mp3", 60_000))
            .expect("insert");

        let filter = FilterSnapshot {
            whitelist_mode: true,
            whitelist: vec!["/music".to_string()],
            min_duration_ms: 0,
            ..FilterSnapshot::default()
        };
        let songs = index
            .songs_filtered(None, &[], &filter, CANONICAL_ORDER, false)
            .expect("songs");
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "In");
    }

    #[test]
    fn test_empty_whitelist_returns_none_without_querying() {
        let index = test_index();
        index
            .insert(&audio_row("Any", "/music/a.mp3", 60_000))
            .expect("insert");

        let filter = FilterSnapshot {
            whitelist_mode: true,
            min_duration_ms: 0,
            ..FilterSnapshot::default()
        };
        assert!(index
            .songs_filtered(None, &[], &filter, CANONICAL_ORDER, false)
            .is_none());
    }

    #[test]
    fn test_mutations_broadcast_targeted_changes() {
        let (bus_sender, mut receiver) = broadcast::channel(64);
        let index = MediaIndex::new_in_memory(bus_sender).expect("index");

        let id = index
            .insert(&audio_row("One", "/music/one.mp3", 60_000))
            .expect("insert");
        index
            .update(id, &audio_row("One!", "/music/one.mp3", 61_000))
            .expect("update");
        index.delete(id).expect("delete");

        let mut changes = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            if let Message::Catalog(CatalogMessage::Changed(change)) = message {
                changes.push(change);
            }
        }
        assert_eq!(
            changes,
            vec![
                CatalogChange::Inserted(id),
                CatalogChange::Updated(id),
                CatalogChange::Deleted(id),
            ]
        );
    }

    #[test]
    fn test_song_by_id_filtered_respects_filters() {
        let index = test_index();
        let id = index
            .insert(&audio_row("Hidden", "/ringtones/h.mp3", 60_000))
            .expect("insert");

        let open = FilterSnapshot {
            min_duration_ms: 0,
            ..FilterSnapshot::default()
        };
        assert!(index.song_by_id_filtered(id, &open).is_some());

        let blocked = FilterSnapshot {
            blacklist: vec!["/ringtones".to_string()],
            min_duration_ms: 0,
            ..FilterSnapshot::default()
        };
        assert!(index.song_by_id_filtered(id, &blocked).is_none());
    }
}
