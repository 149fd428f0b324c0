/// Cached directory listings for the device dropdown.
///
/// A listing session starts with [`DirectoryLister::open`] and ends with
/// [`DirectoryLister::close`].  While a session is open, repeated `open`
/// calls for the same directory return the cached entries without touching
/// the filesystem, so a caller may query it as often as it redraws.
///
/// Closing releases the directory handle but keeps the last listing, so the
/// selected entry stays readable until the next `open` rescans.
use std::fs::{self, FileType, ReadDir};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{LaunchError, Result};

/// Most entries a single listing holds.
pub const MAX_ENTRIES: usize = 64;
/// Longest entry name accepted, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Which directory entries a listing keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Symlink,
    File,
    Dir,
    Any,
}

impl EntryKind {
    fn matches(self, file_type: FileType) -> bool {
        match self {
            EntryKind::Symlink => file_type.is_symlink(),
            EntryKind::File => file_type.is_file(),
            EntryKind::Dir => file_type.is_dir(),
            EntryKind::Any => true,
        }
    }
}

struct Session {
    path: PathBuf,
    kind: EntryKind,
    entries: Vec<String>,
    truncated: bool,
    // `None` once the session is closed.
    handle: Option<ReadDir>,
}

/// Lazily scanned, cached listing of one directory plus a selected index.
///
/// The selected index is always inside the listing, or 0 when it is empty.
#[derive(Default)]
pub struct DirectoryLister {
    session: Option<Session>,
    selected: usize,
    // Restored selection, applied by the next scan.
    preferred: Option<usize>,
}

impl DirectoryLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lister whose first scan selects `index` if the listing is long
    /// enough, and 0 otherwise.
    pub fn with_selection(index: usize) -> Self {
        Self {
            preferred: Some(index),
            ..Self::default()
        }
    }

    /// Starts a listing session for `path`, or returns the cached entries if
    /// one is already open for the same directory and filter.
    ///
    /// Entries come back in readdir order.  A previously selected index that
    /// no longer fits the new listing is reset to 0.  If the directory cannot
    /// be read the previous listing is dropped.
    pub fn open(&mut self, path: &Path, kind: EntryKind) -> Result<&[String]> {
        let reuse = matches!(
            &self.session,
            Some(s) if s.handle.is_some() && s.path == path && s.kind == kind
        );
        if !reuse {
            self.close();
            let wanted = self.preferred.unwrap_or(self.selected);
            self.session = None;
            self.selected = 0;
            self.session = Some(scan(path, kind)?);
            self.preferred = None;
            if wanted < self.len() {
                self.selected = wanted;
            }
        }
        Ok(self.listing())
    }

    /// Ends the session and releases the directory handle.  The listing
    /// stays available.  Safe to call when nothing is open.
    pub fn close(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.handle.take().is_some() {
                debug!("Closing listing of {}", session.path.display());
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.handle.is_some())
    }

    /// The entries of the most recent scan, whether or not the session is
    /// still open; empty before the first successful `open`.
    pub fn listing(&self) -> &[String] {
        self.session
            .as_ref()
            .map(|s| s.entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.listing().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listing().is_empty()
    }

    /// `true` if the last scan dropped entries over [`MAX_ENTRIES`] or with
    /// names over [`MAX_NAME_LEN`].
    pub fn truncated(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.truncated)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Name at the selected index, if the listing has one.
    pub fn selected_name(&self) -> Option<&str> {
        self.listing().get(self.selected).map(String::as_str)
    }

    /// Selects `index`.  Returns `false` and keeps the current selection if
    /// `index` is outside the listing; 0 is always accepted.
    pub fn select(&mut self, index: usize) -> bool {
        if index != 0 && index >= self.len() {
            return false;
        }
        self.selected = index;
        true
    }
}

fn scan(path: &Path, kind: EntryKind) -> Result<Session> {
    let directory_error = |source| LaunchError::DeviceDirectory {
        path: path.to_path_buf(),
        source,
    };
    let mut handle = fs::read_dir(path).map_err(directory_error)?;

    let mut entries = Vec::new();
    let mut truncated = false;

    for entry in handle.by_ref() {
        let entry = entry.map_err(directory_error)?;
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !kind.matches(file_type) {
            continue;
        }
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                debug!("Skipping non UTF-8 entry {:?}", raw);
                continue;
            }
        };
        if name.len() > MAX_NAME_LEN || entries.len() == MAX_ENTRIES {
            truncated = true;
            continue;
        }
        entries.push(name);
    }

    if truncated {
        warn!(
            "Listing of {} truncated to {} entries",
            path.display(),
            entries.len()
        );
    }

    Ok(Session {
        path: path.to_path_buf(),
        kind,
        entries,
        truncated,
        handle: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn device_dir(links: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("event0");
        fs::write(&target, b"").unwrap();
        for name in links {
            symlink(&target, dir.path().join(name)).unwrap();
        }
        dir
    }

    fn sorted(entries: &[String]) -> Vec<String> {
        let mut v = entries.to_vec();
        v.sort();
        v
    }

    // ── filtering ─────────────────────────────────────────────────────────────

    #[test]
    fn symlink_filter_skips_files_and_dirs() {
        let dir = device_dir(&["kbd-a", "kbd-b"]);
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let mut lister = DirectoryLister::new();
        let entries = lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert_eq!(sorted(entries), ["kbd-a", "kbd-b"]);
    }

    #[test]
    fn file_filter_keeps_regular_files() {
        let dir = device_dir(&["kbd-a"]);
        let mut lister = DirectoryLister::new();
        let entries = lister.open(dir.path(), EntryKind::File).unwrap();
        assert_eq!(sorted(entries), ["event0"]);
    }

    #[test]
    fn dir_and_any_filters() {
        let dir = device_dir(&["kbd-a"]);
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let mut lister = DirectoryLister::new();
        assert_eq!(lister.open(dir.path(), EntryKind::Dir).unwrap(), ["subdir"]);
        let all = lister.open(dir.path(), EntryKind::Any).unwrap();
        assert_eq!(sorted(all), ["event0", "kbd-a", "subdir"]);
    }

    #[test]
    fn missing_directory_is_an_error_and_leaves_lister_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut lister = DirectoryLister::new();
        let err = lister.open(&dir.path().join("nope"), EntryKind::Symlink).unwrap_err();
        assert!(matches!(err, LaunchError::DeviceDirectory { .. }));
        assert!(!lister.is_open());
        assert!(lister.listing().is_empty());
    }

    // ── caching ───────────────────────────────────────────────────────────────

    #[test]
    fn repeated_listing_is_stable_while_open() {
        let dir = device_dir(&["kbd-a", "kbd-b", "kbd-c"]);
        let mut lister = DirectoryLister::new();
        let first = lister.open(dir.path(), EntryKind::Symlink).unwrap().to_vec();
        assert_eq!(lister.listing(), first.as_slice());
        assert_eq!(lister.listing(), first.as_slice());
    }

    #[test]
    fn open_while_open_does_not_rescan() {
        let dir = device_dir(&["kbd-a"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();

        symlink(dir.path().join("event0"), dir.path().join("kbd-new")).unwrap();
        let entries = lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert_eq!(entries, ["kbd-a"]);
    }

    #[test]
    fn close_then_open_rescans() {
        let dir = device_dir(&["kbd-a"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();

        symlink(dir.path().join("event0"), dir.path().join("kbd-new")).unwrap();
        lister.close();
        let entries = lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert_eq!(sorted(entries), ["kbd-a", "kbd-new"]);
    }

    #[test]
    fn close_is_idempotent() {
        let mut lister = DirectoryLister::new();
        lister.close();
        lister.close();
        assert!(!lister.is_open());
    }

    #[test]
    fn listing_and_selection_survive_close() {
        let dir = device_dir(&["kbd-a", "kbd-b", "kbd-c"]);
        let mut lister = DirectoryLister::new();
        let entries = lister.open(dir.path(), EntryKind::Symlink).unwrap().to_vec();
        assert!(lister.select(2));
        lister.close();

        assert!(!lister.is_open());
        assert_eq!(lister.listing(), entries.as_slice());
        assert_eq!(lister.selected_index(), 2);
        assert_eq!(lister.selected_name(), Some(entries[2].as_str()));
    }

    #[test]
    fn failed_open_drops_previous_listing() {
        let dir = device_dir(&["kbd-a", "kbd-b"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        lister.select(1);

        assert!(lister.open(&dir.path().join("nope"), EntryKind::Symlink).is_err());
        assert!(lister.is_empty());
        assert_eq!(lister.selected_index(), 0);
    }

    // ── bounds ────────────────────────────────────────────────────────────────

    #[test]
    fn listing_caps_entries_and_signals_truncation() {
        let names: Vec<String> = (0..MAX_ENTRIES + 6).map(|i| format!("kbd-{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let dir = device_dir(&refs);

        let mut lister = DirectoryLister::new();
        let entries = lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert!(lister.truncated());
    }

    #[test]
    fn small_listing_is_not_truncated() {
        let dir = device_dir(&["kbd-a"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert!(!lister.truncated());
    }

    // ── selection ─────────────────────────────────────────────────────────────

    #[test]
    fn selection_starts_at_zero() {
        let dir = device_dir(&["kbd-a"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert_eq!(lister.selected_index(), 0);
        assert_eq!(lister.selected_name(), Some("kbd-a"));
    }

    #[test]
    fn select_rejects_out_of_range_while_open() {
        let dir = device_dir(&["kbd-a", "kbd-b"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert!(lister.select(1));
        assert!(!lister.select(2));
        assert_eq!(lister.selected_index(), 1);
    }

    #[test]
    fn selection_survives_close_and_reopen() {
        let dir = device_dir(&["kbd-a", "kbd-b", "kbd-c"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        lister.select(2);
        let chosen = lister.selected_name().map(str::to_string);

        lister.close();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert_eq!(lister.selected_index(), 2);
        assert_eq!(lister.selected_name().map(str::to_string), chosen);
    }

    #[test]
    fn selection_clamps_to_zero_when_listing_shrinks() {
        let dir = device_dir(&["kbd-a", "kbd-b", "kbd-c"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        lister.select(2);
        lister.close();

        fs::remove_file(dir.path().join("kbd-b")).unwrap();
        fs::remove_file(dir.path().join("kbd-c")).unwrap();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert_eq!(lister.selected_index(), 0);
        assert_eq!(lister.selected_name(), Some("kbd-a"));
    }

    #[test]
    fn select_rejects_out_of_range_after_close() {
        let dir = device_dir(&["kbd-a", "kbd-b"]);
        let mut lister = DirectoryLister::new();
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        lister.close();
        assert!(!lister.select(2));
        assert!(lister.select(1));
        assert_eq!(lister.selected_name(), Some(lister.listing()[1].as_str()));
    }

    #[test]
    fn select_before_any_listing_only_accepts_zero() {
        let mut lister = DirectoryLister::new();
        assert!(!lister.select(4));
        assert!(lister.select(0));
        assert_eq!(lister.selected_index(), 0);
    }

    #[test]
    fn restored_selection_applies_on_first_open() {
        let dir = device_dir(&["kbd-a", "kbd-b"]);
        let mut lister = DirectoryLister::with_selection(1);
        assert_eq!(lister.selected_index(), 0);
        lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert_eq!(lister.selected_index(), 1);
    }

    #[test]
    fn restored_selection_on_empty_listing_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut lister = DirectoryLister::with_selection(4);
        let entries = lister.open(dir.path(), EntryKind::Symlink).unwrap();
        assert!(entries.is_empty());
        assert_eq!(lister.selected_index(), 0);
        assert!(lister.selected_name().is_none());
    }
}
