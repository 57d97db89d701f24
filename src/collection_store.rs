//! SQLite store for user collections: playlists, play history, queue
//! snapshots, and the blacklist/whitelist path tables.
//!
//! Rows reference songs by catalog id only. There are no enforced foreign
//! keys to the media index; the reconciler removes rows whose song id has
//! left the filtered catalog view.

use std::path::{Path, PathBuf};

use log::warn;
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::PlaylistSortOrder;

/// Tag carried by the single reserved favorites playlist.
pub const FAVORITES_TAG: &str = "favorites";

/// Display name given to the lazily created favorites playlist.
pub const FAVORITES_NAME: &str = "Favorites";

/// Largest number of rows returned by bounded history reads.
pub const HISTORY_LIMIT: usize = 100;

/// One stored playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRow {
    pub playlist_id: i64,
    pub name: String,
    pub tag: Option<String>,
}

/// One playlist membership row. `entry_id` is the surrogate ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub entry_id: i64,
    pub playlist_id: i64,
    pub song_id: i64,
}

/// One play-history row; at most one per song id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub song_id: i64,
    /// Unix milliseconds of the most recent play.
    pub time_played: i64,
    pub play_count: i64,
}

/// One persisted queue slot. Positions start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub position: i64,
    pub song_id: i64,
}

/// A playlist together with its membership rows in stored order.
#[derive(Debug, Clone)]
pub struct PlaylistWithSongs {
    pub playlist: PlaylistRow,
    pub songs: Vec<PlaylistEntry>,
}

pub struct CollectionStore {
    conn: Connection,
}

impl CollectionStore {
    /// Opens the store at the default platform data location.
    pub fn open_default() -> Result<Self, rusqlite::Error> {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("songvault");
        if !data_dir.exists() {
            if let Err(err) = std::fs::create_dir_all(&data_dir) {
                warn!("Failed to create data directory {}: {}", data_dir.display(), err);
            }
        }
        Self::open(&data_dir.join("collections.db"))
    }

    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS playlists (
                playlist_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                tag TEXT
            );
            CREATE TABLE IF NOT EXISTS playlist_songs (
                entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
                playlist_id INTEGER NOT NULL,
                song_id INTEGER NOT NULL,
                UNIQUE(playlist_id, song_id)
            );
            CREATE TABLE IF NOT EXISTS history (
                song_id INTEGER PRIMARY KEY,
                time_played INTEGER NOT NULL,
                play_count INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS queue (
                position INTEGER PRIMARY KEY,
                song_id INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS original_queue (
                position INTEGER PRIMARY KEY,
                song_id INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS blacklist_paths (
                path TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS whitelist_paths (
                path TEXT PRIMARY KEY
            );",
        )?;
        Ok(())
    }

    // --- playlists ---

    pub fn create_playlist(
        &self,
        name: &str,
        tag: Option<&str>,
    ) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO playlists (name, tag) VALUES (?1, ?2)",
            params![name, tag],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn rename_playlist(&self, playlist_id: i64, name: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE playlists SET name = ?1 WHERE playlist_id = ?2",
            params![name, playlist_id],
        )?;
        Ok(())
    }

    /// Deletes a playlist and all of its membership rows.
    pub fn delete_playlist(&mut self, playlist_id: i64) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM playlist_songs WHERE playlist_id = ?1",
            params![playlist_id],
        )?;
        tx.execute(
            "DELETE FROM playlists WHERE playlist_id = ?1",
            params![playlist_id],
        )?;
        tx.commit()
    }

    pub fn playlists(&self) -> Result<Vec<PlaylistRow>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT playlist_id, name, tag FROM playlists")?;
        let rows = stmt.query_map([], Self::playlist_from_row)?;
        rows.collect()
    }

    pub fn playlists_by_name(&self, name: &str) -> Result<Vec<PlaylistRow>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT playlist_id, name, tag FROM playlists WHERE name = ?1")?;
        let rows = stmt.query_map(params![name], Self::playlist_from_row)?;
        rows.collect()
    }

    pub fn playlists_with_tag(&self, tag: &str) -> Result<Vec<PlaylistRow>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT playlist_id, name, tag FROM playlists WHERE tag = ?1")?;
        let rows = stmt.query_map(params![tag], Self::playlist_from_row)?;
        rows.collect()
    }

    pub fn playlist_exists(&self, playlist_id: i64) -> Result<bool, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM playlists WHERE playlist_id = ?1",
            params![playlist_id],
            |row| row.get(0),
        )?;
        Ok(count != 0)
    }

    fn playlist_from_row(row: &rusqlite::Row<'_>) -> Result<PlaylistRow, rusqlite::Error> {
        Ok(PlaylistRow {
            playlist_id: row.get(0)?,
            name: row.get(1)?,
            tag: row.get(2)?,
        })
    }

    // --- playlist membership ---

    /// Adds songs to a playlist. Replaying an existing (playlist, song)
    /// pair replaces the row, keeping the pair unique.
    pub fn add_songs_to_playlist(
        &mut self,
        playlist_id: i64,
        song_ids: &[i64],
    ) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO playlist_songs (playlist_id, song_id) VALUES (?1, ?2)",
            )?;
            for song_id in song_ids {
                stmt.execute(params![playlist_id, song_id])?;
            }
        }
        tx.commit()
    }

    pub fn remove_song_from_playlist(
        &self,
        playlist_id: i64,
        song_id: i64,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "DELETE FROM playlist_songs WHERE playlist_id = ?1 AND song_id = ?2",
            params![playlist_id, song_id],
        )?;
        Ok(())
    }

    pub fn remove_song_from_all_playlists(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "DELETE FROM playlist_songs WHERE song_id = ?1",
            params![song_id],
        )?;
        Ok(())
    }

    pub fn clear_playlist(&self, playlist_id: i64) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "DELETE FROM playlist_songs WHERE playlist_id = ?1",
            params![playlist_id],
        )?;
        Ok(())
    }

    pub fn songs_from_playlist(
        &self,
        playlist_id: i64,
    ) -> Result<Vec<PlaylistEntry>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, playlist_id, song_id FROM playlist_songs \
             WHERE playlist_id = ?1 ORDER BY entry_id ASC",
        )?;
        let rows = stmt.query_map(params![playlist_id], Self::entry_from_row)?;
        rows.collect()
    }

    pub fn all_playlist_entries(&self) -> Result<Vec<PlaylistEntry>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry_id, playlist_id, song_id FROM playlist_songs")?;
        let rows = stmt.query_map([], Self::entry_from_row)?;
        rows.collect()
    }

    pub fn delete_playlist_entries(
        &mut self,
        entries: &[PlaylistEntry],
    ) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM playlist_songs WHERE entry_id = ?1")?;
            for entry in entries {
                stmt.execute(params![entry.entry_id])?;
            }
        }
        tx.commit()
    }

    pub fn is_song_in_playlist(
        &self,
        playlist_id: i64,
        song_id: i64,
    ) -> Result<bool, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM playlist_songs WHERE playlist_id = ?1 AND song_id = ?2 LIMIT 1",
            params![playlist_id, song_id],
            |row| row.get(0),
        )?;
        Ok(count != 0)
    }

    /// All playlists with their membership rows, sorted by `order`.
    pub fn playlists_with_songs(
        &self,
        order: PlaylistSortOrder,
    ) -> Result<Vec<PlaylistWithSongs>, rusqlite::Error> {
        let mut listed = Vec::new();
        for playlist in self.playlists()? {
            let songs = self.songs_from_playlist(playlist.playlist_id)?;
            listed.push(PlaylistWithSongs { playlist, songs });
        }

        match order {
            PlaylistSortOrder::NameAz => listed.sort_by(|a, b| {
                a.playlist
                    .name
                    .to_lowercase()
                    .cmp(&b.playlist.name.to_lowercase())
            }),
            PlaylistSortOrder::NameZa => listed.sort_by(|a, b| {
                b.playlist
                    .name
                    .to_lowercase()
                    .cmp(&a.playlist.name.to_lowercase())
            }),
            PlaylistSortOrder::SongCount => listed.sort_by_key(|p| p.songs.len()),
            PlaylistSortOrder::SongCountDesc => {
                listed.sort_by_key(|p| std::cmp::Reverse(p.songs.len()))
            }
        }
        Ok(listed)
    }

    fn entry_from_row(row: &rusqlite::Row<'_>) -> Result<PlaylistEntry, rusqlite::Error> {
        Ok(PlaylistEntry {
            entry_id: row.get(0)?,
            playlist_id: row.get(1)?,
            song_id: row.get(2)?,
        })
    }

    // --- favorites ---

    /// Returns the favorites playlist id, creating the tagged playlist on
    /// first use. Never creates a second tagged playlist.
    pub fn ensure_favorites_playlist(&self) -> Result<i64, rusqlite::Error> {
        let existing = self.playlists_with_tag(FAVORITES_TAG)?;
        match existing.first() {
            Some(playlist) => Ok(playlist.playlist_id),
            None => self.create_playlist(FAVORITES_NAME, Some(FAVORITES_TAG)),
        }
    }

    // --- history ---

    pub fn upsert_history(&self, entry: &HistoryEntry) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO history (song_id, time_played, play_count) \
             VALUES (?1, ?2, ?3)",
            params![entry.song_id, entry.time_played, entry.play_count],
        )?;
        Ok(())
    }

    pub fn insert_history_entries(
        &mut self,
        entries: &[HistoryEntry],
    ) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO history (song_id, time_played, play_count) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for entry in entries {
                stmt.execute(params![entry.song_id, entry.time_played, entry.play_count])?;
            }
        }
        tx.commit()
    }

    pub fn history_entry(&self, song_id: i64) -> Result<Option<HistoryEntry>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT song_id, time_played, play_count FROM history WHERE song_id = ?1",
                params![song_id],
                Self::history_from_row,
            )
            .optional()
    }

    pub fn delete_history_entry(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM history WHERE song_id = ?1", params![song_id])?;
        Ok(())
    }

    pub fn delete_history_entries(&mut self, song_ids: &[i64]) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM history WHERE song_id = ?1")?;
            for song_id in song_ids {
                stmt.execute(params![song_id])?;
            }
        }
        tx.commit()
    }

    pub fn clear_history(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM history", [])?;
        Ok(())
    }

    pub fn all_history(&self) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT song_id, time_played, play_count FROM history")?;
        let rows = stmt.query_map([], Self::history_from_row)?;
        rows.collect()
    }

    /// Most recently played first, bounded to [`HISTORY_LIMIT`] rows.
    pub fn recent_history(&self) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
        self.bounded_history("ORDER BY time_played DESC")
    }

    /// Least recently played first, bounded to [`HISTORY_LIMIT`] rows.
    pub fn oldest_history(&self) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
        self.bounded_history("ORDER BY time_played ASC")
    }

    /// Most played first, bounded to [`HISTORY_LIMIT`] rows.
    pub fn most_played_history(&self) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
        self.bounded_history("ORDER BY play_count DESC")
    }

    fn bounded_history(&self, order_by: &str) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
        let sql = format!(
            "SELECT song_id, time_played, play_count FROM history {} LIMIT {}",
            order_by, HISTORY_LIMIT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::history_from_row)?;
        rows.collect()
    }

    pub fn history_size(&self) -> Result<usize, rusqlite::Error> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn history_from_row(row: &rusqlite::Row<'_>) -> Result<HistoryEntry, rusqlite::Error> {
        Ok(HistoryEntry {
            song_id: row.get(0)?,
            time_played: row.get(1)?,
            play_count: row.get(2)?,
        })
    }

    // --- queue snapshots ---

    /// Replaces the whole queue. Queue writes are never incremental.
    pub fn replace_queue(&mut self, song_ids: &[i64]) -> Result<(), rusqlite::Error> {
        Self::replace_queue_table(&mut self.conn, "queue", song_ids)
    }

    pub fn replace_original_queue(&mut self, song_ids: &[i64]) -> Result<(), rusqlite::Error> {
        Self::replace_queue_table(&mut self.conn, "original_queue", song_ids)
    }

    fn replace_queue_table(
        conn: &mut Connection,
        table: &str,
        song_ids: &[i64],
    ) -> Result<(), rusqlite::Error> {
        let tx = conn.transaction()?;
        {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {} (position, song_id) VALUES (?1, ?2)",
                table
            ))?;
            for (index, song_id) in song_ids.iter().enumerate() {
                stmt.execute(params![(index + 1) as i64, song_id])?;
            }
        }
        tx.commit()
    }

    pub fn queue(&self) -> Result<Vec<QueueEntry>, rusqlite::Error> {
        self.queue_table("queue")
    }

    pub fn original_queue(&self) -> Result<Vec<QueueEntry>, rusqlite::Error> {
        self.queue_table("original_queue")
    }

    fn queue_table(&self, table: &str) -> Result<Vec<QueueEntry>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT position, song_id FROM {} ORDER BY position ASC",
            table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(QueueEntry {
                position: row.get(0)?,
                song_id: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    // --- path filter tables ---

    pub fn add_blacklist_path(&self, path: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR IGNORE INTO blacklist_paths (path) VALUES (?1)",
            params![path],
        )?;
        Ok(())
    }

    pub fn remove_blacklist_path(&self, path: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "DELETE FROM blacklist_paths WHERE path = ?1",
            params![path],
        )?;
        Ok(())
    }

    pub fn clear_blacklist(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM blacklist_paths", [])?;
        Ok(())
    }

    pub fn blacklist_paths(&self) -> Result<Vec<String>, rusqlite::Error> {
        self.path_table("blacklist_paths")
    }

    pub fn add_whitelist_path(&self, path: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR IGNORE INTO whitelist_paths (path) VALUES (?1)",
            params![path],
        )?;
        Ok(())
    }

    pub fn remove_whitelist_path(&self, path: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "DELETE FROM whitelist_paths WHERE path = ?1",
            params![path],
        )?;
        Ok(())
    }

    pub fn clear_whitelist(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM whitelist_paths", [])?;
        Ok(())
    }

    pub fn whitelist_paths(&self) -> Result<Vec<String>, rusqlite::Error> {
        self.path_table("whitelist_paths")
    }

    fn path_table(&self, table: &str) -> Result<Vec<String>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT path FROM {} ORDER BY path ASC", table))?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    // --- cross-collection maintenance ---

    /// Drops a song id from history and every playlist. Queue snapshots
    /// are left untouched; their reads filter stale ids in memory.
    pub fn delete_song(&self, song_id: i64) -> Result<(), rusqlite::Error> {
        self.delete_history_entry(song_id)?;
        self.remove_song_from_all_playlists(song_id)
    }
}
