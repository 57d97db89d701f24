//! Persistent application configuration model and defaults.

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Path-filter behavior and first-run seeding state.
    pub filters: FilterConfig,
    #[serde(default)]
    /// Sort preferences for derived views.
    pub sorting: SortConfig,
}

/// Path-filter preferences persisted between sessions.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FilterConfig {
    /// When true the whitelist is in effect and the blacklist is ignored
    /// entirely. An empty whitelist in this mode yields zero songs.
    #[serde(default)]
    pub whitelist_mode: bool,
    /// Songs shorter than this are excluded from the catalog view.
    #[serde(default = "default_min_song_duration_ms")]
    pub min_song_duration_ms: i64,
    /// Set once the default blacklist directories have been written.
    #[serde(default)]
    pub blacklist_seeded: bool,
    /// Set once the default whitelist directory has been written.
    #[serde(default)]
    pub whitelist_seeded: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            whitelist_mode: false,
            min_song_duration_ms: default_min_song_duration_ms(),
            blacklist_seeded: false,
            whitelist_seeded: false,
        }
    }
}

/// Sort preferences persisted between sessions.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SortConfig {
    #[serde(default)]
    pub song_sort_order: SongSortOrder,
    #[serde(default)]
    pub playlist_sort_order: PlaylistSortOrder,
}

/// Sort key applied to the derived sorted song view.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SongSortOrder {
    #[default]
    TitleAz,
    TitleZa,
    Album,
    AlbumArtist,
    Artist,
    Composer,
    /// Canonical catalog order.
    Unsorted,
}

/// Sort key applied to playlists-with-songs listings.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistSortOrder {
    #[default]
    NameAz,
    NameZa,
    SongCount,
    SongCountDesc,
}

fn default_min_song_duration_ms() -> i64 {
    20_000
}

#[cfg(test)]
mod tests {
    use super::{Config, PlaylistSortOrder, SongSortOrder};

    #[test]
    fn test_default_config_has_expected_values() {
        let config = Config::default();

        assert!(!config.filters.whitelist_mode);
        assert_eq!(config.filters.min_song_duration_ms, 20_000);
        assert!(!config.filters.blacklist_seeded);
        assert!(!config.filters.whitelist_seeded);
        assert_eq!(config.sorting.song_sort_order, SongSortOrder::TitleAz);
        assert_eq!(
            config.sorting.playlist_sort_order,
            PlaylistSortOrder::NameAz
        );
    }

    #[test]
    fn test_partial_config_deserialization_fills_defaults() {
        let partial_toml = r#"
[filters]
whitelist_mode = true
"#;

        let parsed: Config = toml::from_str(partial_toml).expect("config should parse");
        assert!(parsed.filters.whitelist_mode);
        assert_eq!(parsed.filters.min_song_duration_ms, 20_000);
        assert_eq!(parsed.sorting.song_sort_order, SongSortOrder::TitleAz);
    }

    #[test]
    fn test_sort_orders_round_trip_as_snake_case() {
        let mut config = Config::default();
        config.sorting.song_sort_order = SongSortOrder::AlbumArtist;
        config.sorting.playlist_sort_order = PlaylistSortOrder::SongCountDesc;

        let rendered = toml::to_string(&config).expect("config should serialize");
        assert!(rendered.contains("album_artist"));
        assert!(rendered.contains("song_count_desc"));

        let parsed: Config = toml::from_str(&rendered).expect("config should parse");
        assert_eq!(parsed, config);
    }
}
