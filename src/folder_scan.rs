//! Cancellable audio-file discovery for the folder-browsing consumer.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::debug;

pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 7] =
    ["mp3", "wav", "ogg", "flac", "aac", "m4a", "mp4"];

pub fn is_supported_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_AUDIO_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Recursively collects audio files under `folder_path`, checking the
/// cancellation flag between steps. Returns whatever was collected when
/// cancelled; results are sorted.
pub fn collect_audio_files(folder_path: &Path, cancelled: &AtomicBool) -> Vec<PathBuf> {
    let mut pending_directories = vec![folder_path.to_path_buf()];
    let mut tracks = Vec::new();

    while let Some(directory) = pending_directories.pop() {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Folder scan: failed to read {}: {}", directory.display(), err);
                continue;
            }
        };

        for entry in entries {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(
                        "Folder scan: failed to read entry in {}: {}",
                        directory.display(),
                        err
                    );
                    continue;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    debug!("Folder scan: failed to inspect {}: {}", path.display(), err);
                    continue;
                }
            };

            if file_type.is_dir() {
                pending_directories.push(path);
                continue;
            }

            if file_type.is_file() && is_supported_audio_file(&path) {
                tracks.push(path);
            }
        }
    }

    tracks.sort_unstable();
    tracks
}

/// Deduplicated audio files from a mix of dropped files and folders.
pub fn collect_audio_files_from_paths(paths: &[PathBuf], cancelled: &AtomicBool) -> Vec<PathBuf> {
    let mut tracks = BTreeSet::new();
    for path in paths {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        if path.is_file() {
            if is_supported_audio_file(path) {
                tracks.insert(path.clone());
            }
            continue;
        }
        if path.is_dir() {
            for track in collect_audio_files(path, cancelled) {
                tracks.insert(track);
            }
        }
    }
    tracks.into_iter().collect()
}

/// A folder scan running on a background thread.
///
/// The caller holds the handle; `cancel()` is safe from any thread and
/// cancellation is cooperative, so `join()` returns promptly with the
/// partial result.
pub struct FolderScan {
    cancelled: Arc<AtomicBool>,
    worker: JoinHandle<Vec<PathBuf>>,
}

impl FolderScan {
    pub fn spawn(folder_path: PathBuf) -> FolderScan {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let worker = thread::spawn(move || collect_audio_files(&folder_path, &flag));
        FolderScan { cancelled, worker }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn join(self) -> Vec<PathBuf> {
        self.worker.join().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"").expect("write file");
    }

    #[test]
    fn test_supported_extension_check_is_case_insensitive() {
        assert!(is_supported_audio_file(Path::new("/a/b.mp3")));
        assert!(is_supported_audio_file(Path::new("/a/b.FLAC")));
        assert!(!is_supported_audio_file(Path::new("/a/b.txt")));
        assert!(!is_supported_audio_file(Path::new("/a/noext")));
    }

    #[test]
    fn test_scan_collects_nested_audio_files_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).expect("mkdir");
        touch(&dir.path().join("b.mp3"));
        touch(&dir.path().join("skip.txt"));
        touch(&nested.join("a.flac"));

        let found = collect_audio_files(dir.path(), &AtomicBool::new(false));
        assert_eq!(found.len(), 2);
        assert!(found[0] < found[1]);
    }

    #[test]
    fn test_scan_stops_after_cancellation() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("a.mp3"));

        let cancelled = AtomicBool::new(true);
        let found = collect_audio_files(dir.path(), &cancelled);
        assert!(found.is_empty());
    }

    #[test]
    fn test_spawned_scan_can_be_cancelled_from_caller() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("a.mp3"));

        let scan = FolderScan::spawn(dir.path().to_path_buf());
        scan.cancel();
        // Either the scan finished before the cancel or it stopped early;
        // both are valid partial results.
        let found = scan.join();
        assert!(found.len() <= 1);
    }

    #[test]
    fn test_mixed_paths_are_deduplicated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("a.mp3");
        touch(&file);

        let found = collect_audio_files_from_paths(
            &[file.clone(), dir.path().to_path_buf()],
            &AtomicBool::new(false),
        );
        assert_eq!(found, vec![file]);
    }
}
