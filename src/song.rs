//! Immutable song value type and derived sort views.

use std::cmp::Ordering;
use std::path::PathBuf;

use crate::config::SongSortOrder;

/// One song row mirrored from the media index.
///
/// Values are rebuilt fresh on every catalog sync and never mutated in
/// place. Identity for reconciliation purposes is `id` alone; the derived
/// `PartialEq` compares full values and must not be used to decide whether
/// a reference is still live.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Song {
    /// Catalog-assigned id, stable per media-index row.
    pub id: i64,
    pub title: String,
    pub track_number: i64,
    pub year: i64,
    /// Duration in milliseconds.
    pub duration_ms: i64,
    /// Absolute file path on disk.
    pub path: PathBuf,
    /// Last-modified timestamp in unix milliseconds.
    pub date_modified: i64,
    pub album_id: i64,
    pub album_name: String,
    pub artist_id: i64,
    pub artist_name: String,
    pub composer: String,
    pub album_artist: String,
}

impl Song {
    /// Sentinel returned by lookups that found nothing.
    pub fn empty() -> Song {
        Song {
            id: -1,
            title: String::new(),
            track_number: -1,
            year: -1,
            duration_ms: -1,
            path: PathBuf::new(),
            date_modified: -1,
            album_id: -1,
            album_name: String::new(),
            artist_id: -1,
            artist_name: String::new(),
            composer: String::new(),
            album_artist: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id == -1
    }
}

/// Case-insensitive string ordering used for all sorted song views.
fn collate(left: &str, right: &str) -> Ordering {
    left.to_lowercase().cmp(&right.to_lowercase())
}

/// Returns a sorted copy of `songs` for the given order.
///
/// `Unsorted` preserves canonical catalog order. Sorts are stable, so ties
/// keep their catalog order too.
pub fn sorted_songs(songs: &[Song], order: SongSortOrder) -> Vec<Song> {
    let mut sorted: Vec<Song> = songs.to_vec();
    match order {
        SongSortOrder::TitleAz => sorted.sort_by(|a, b| collate(&a.title, &b.title)),
        SongSortOrder::TitleZa => sorted.sort_by(|a, b| collate(&b.title, &a.title)),
        SongSortOrder::Album => sorted.sort_by(|a, b| collate(&a.album_name, &b.album_name)),
        SongSortOrder::AlbumArtist => {
            sorted.sort_by(|a, b| collate(&a.album_artist, &b.album_artist))
        }
        SongSortOrder::Artist => sorted.sort_by(|a, b| collate(&a.artist_name, &b.artist_name)),
        SongSortOrder::Composer => sorted.sort_by(|a, b| collate(&a.composer, &b.composer)),
        SongSortOrder::Unsorted => {}
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: i64, title: &str, album: &str, artist: &str) -> Song {
        Song {
            id,
            title: title.to_string(),
            album_name: album.to_string(),
            artist_name: artist.to_string(),
            ..Song::empty()
        }
    }

    #[test]
    fn test_title_sort_is_case_insensitive_both_directions() {
        let songs = vec![
            song(1, "beta", "", ""),
            song(2, "Alpha", "", ""),
            song(3, "gamma", "", ""),
        ];

        let ascending = sorted_songs(&songs, SongSortOrder::TitleAz);
        let ids: Vec<i64> = ascending.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);

        let descending = sorted_songs(&songs, SongSortOrder::TitleZa);
        let ids: Vec<i64> = descending.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_unsorted_keeps_canonical_order() {
        let songs = vec![song(9, "z", "", ""), song(1, "a", "", "")];
        let unsorted = sorted_songs(&songs, SongSortOrder::Unsorted);
        let ids: Vec<i64> = unsorted.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![9, 1]);
    }

    #[test]
    fn test_album_sort_keeps_catalog_order_for_ties() {
        let songs = vec![
            song(5, "b", "Same Album", ""),
            song(3, "a", "Same Album", ""),
            song(7, "c", "Another", ""),
        ];
        let by_album = sorted_songs(&songs, SongSortOrder::Album);
        let ids: Vec<i64> = by_album.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![7, 5, 3]);
    }

    #[test]
    fn test_empty_song_sentinel() {
        let empty = Song::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.id, -1);
        assert!(empty.title.is_empty());
    }
}
