//! Dumps collection and catalog counts from the default databases.

use log::info;
use songvault::MusicRepository;

fn main() -> Result<(), rusqlite::Error> {
    colog::init();

    let repository = MusicRepository::open_default()?;
    repository.start()?;

    let songs = repository.songs();
    info!("Visible songs: {}", songs.len());

    let playlists = repository.playlists()?;
    info!("Playlists: {}", playlists.len());
    for playlist in &playlists {
        let members = repository.playlist_songs(playlist.playlist_id)?;
        info!(
            "  [{}] {} ({} song(s))",
            playlist.playlist_id,
            playlist.name,
            members.len()
        );
    }

    info!("History rows: {}", repository.history_size()?);
    info!("Queue length: {}", repository.queue()?.len());
    info!(
        "Blacklist: {:?}",
        repository.path_filters().blacklist_paths()?
    );
    info!(
        "Whitelist: {:?} (whitelist mode: {})",
        repository.path_filters().whitelist_paths()?,
        repository.path_filters().whitelist_mode()
    );
    Ok(())
}
