//! Shared state management - The Source of Truth
//!
//! One `FolderState` per mounted overlay, created before mount and handed
//! to every organ behind an `Arc`. Two small locks with disjoint concerns:
//! the registry (state lock) and the pending queue (queue lock). Neither is
//! ever held across I/O, and no operation nests them; when both are needed
//! they are taken sequentially, registry first.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::core::{Bouncer, Identity, InodeStore};
use crate::error::Result;
use crate::queue::PendingQueue;
use crate::registry::Registry;

/// Shared state wrapper for easy cloning and sharing
pub type SharedState = Arc<FolderState>;

pub struct FolderState {
    /// Flat directory holding the real bytes.
    pub backing_store: PathBuf,

    /// Hidden set + category index (state lock).
    pub registry: Mutex<Registry>,

    /// Filenames awaiting classification (queue lock).
    pub pending: Mutex<PendingQueue>,

    /// Wakes the Courier when the queue gains work or shutdown begins.
    pub queue_notify: Notify,

    /// Cleared on unmount; the Courier exits once it observes this.
    running: AtomicBool,

    /// inode <-> virtual node mapping for the kernel surface.
    pub inodes: InodeStore,

    /// uid/gid reported on synthetic directories.
    pub identity: Identity,
}

impl FolderState {
    pub fn new(backing_store: PathBuf, identity: Identity) -> SharedState {
        Arc::new(Self {
            backing_store,
            registry: Mutex::new(Registry::new()),
            pending: Mutex::new(PendingQueue::new()),
            queue_notify: Notify::new(),
            running: AtomicBool::new(true),
            inodes: InodeStore::new(),
            identity,
        })
    }

    /// Backing-store path for a basename. The category segment of a virtual
    /// path is semantic only; every file lives flat in the store.
    pub fn backing_path(&self, name: &str) -> PathBuf {
        self.backing_store.join(name)
    }

    /// Unknown -> Observed: hide a freshly created root file.
    pub fn observe(&self, name: &str) {
        if Bouncer::is_noise(name) {
            return;
        }
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.observe(name);
        tracing::info!("[MagicFolder] File queued for classification: {}", name);
    }

    /// Observed -> Pending: hand a closed root file to the Courier.
    ///
    /// Idempotent: already-queued, in-flight, and already-categorized names
    /// are skipped, so double `release` calls cost nothing. The enqueued
    /// entry carries the observation's generation, so a verdict can only
    /// ever land on the incarnation it was asked about.
    pub fn enqueue_for_classification(&self, name: &str) {
        if Bouncer::is_noise(name) {
            return;
        }

        let generation = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            if registry.is_categorized(name) {
                return;
            }
            match registry.generation_of(name) {
                Some(generation) => generation,
                None => return,
            }
        };

        let added = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.push(name, generation)
        };

        if added {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.mark_processing(name, true);
            drop(registry);
            self.queue_notify.notify_one();
            tracing::info!("[MagicFolder] Enqueued for async classification: {}", name);
        }
    }

    /// Atomically take everything queued; names stay deduped until
    /// `finish_batch`.
    pub fn drain_batch(&self) -> Vec<(String, u64)> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.drain_batch()
    }

    pub fn finish_batch(&self, batch: &[(String, u64)]) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.finish(batch);
    }

    pub fn queue_is_empty(&self) -> bool {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the Courier to finish up. Callbacks in flight complete
    /// normally; nothing is interrupted.
    pub fn begin_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.queue_notify.notify_one();
    }

    /// Names the root listing shows, in listing order: non-empty categories
    /// first, then real backing entries that are neither hidden nor
    /// categorized. The bool marks directories.
    pub fn visible_root_entries(&self) -> Result<Vec<(String, bool)>> {
        let categories = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.nonempty_categories()
        };
        let mut entries: Vec<(String, bool)> =
            categories.iter().map(|c| (c.clone(), true)).collect();

        for dirent in std::fs::read_dir(&self.backing_store)? {
            let dirent = dirent?;
            let name = match dirent.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            // A category shadows a same-named real entry.
            if categories.iter().any(|c| *c == name) {
                continue;
            }
            let suppressed = {
                let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
                !registry.visible_in_root(&name)
            };
            if suppressed {
                continue;
            }
            let is_dir = dirent.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push((name, is_dir));
        }

        Ok(entries)
    }

    /// Filenames a category directory shows. Entries whose backing file has
    /// disappeared are skipped. None if the category does not exist.
    pub fn visible_category_entries(&self, category: &str) -> Option<Vec<String>> {
        let files = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.files_in(category)?
        };
        Some(
            files
                .into_iter()
                .filter(|name| self.backing_path(name).is_file())
                .collect(),
        )
    }

    /// Startup rescan: observe and enqueue every non-ignored regular file
    /// already sitting in the backing store, so a restarted driver
    /// reclassifies instead of showing a flat root.
    pub fn rescan_backing_store(&self) -> Result<usize> {
        let mut enqueued = 0;
        for dirent in std::fs::read_dir(&self.backing_store)? {
            let dirent = dirent?;
            if !dirent.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = match dirent.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if Bouncer::is_noise(&name) {
                continue;
            }
            self.observe(&name);
            self.enqueue_for_classification(&name);
            enqueued += 1;
        }
        Ok(enqueued)
    }

    /// Safety check: the overlay must not nest with its own backing store,
    /// or the kernel surface would feed on itself.
    pub fn check_no_feedback(backing: &Path, mountpoint: &Path) -> Result<()> {
        let abs_backing = std::fs::canonicalize(backing).unwrap_or_else(|_| backing.to_path_buf());
        let abs_mount = std::fs::canonicalize(mountpoint).unwrap_or_else(|_| mountpoint.to_path_buf());

        if abs_backing.starts_with(&abs_mount) || abs_mount.starts_with(&abs_backing) {
            return Err(crate::error::FolderError::InvalidPath(format!(
                "mount point {} nests with backing store {}",
                abs_mount.display(),
                abs_backing.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state_in(dir: &TempDir) -> SharedState {
        FolderState::new(dir.path().to_path_buf(), Identity::capture())
    }

    #[test]
    fn noise_names_never_enter_the_pipeline() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);

        state.observe(".DS_Store");
        state.enqueue_for_classification(".DS_Store");
        state.observe("._resource");
        state.enqueue_for_classification("._resource");

        assert!(state.queue_is_empty());
        let registry = state.registry.lock().unwrap();
        assert!(!registry.is_hidden(".DS_Store"));
        assert!(!registry.is_hidden("._resource"));
    }

    #[test]
    fn double_release_enqueues_once() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);

        state.observe("doc1.txt");
        state.enqueue_for_classification("doc1.txt");
        state.enqueue_for_classification("doc1.txt");

        let batch = state.drain_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].0, "doc1.txt");
        assert!(state.queue_is_empty());
    }

    #[test]
    fn categorized_names_are_not_reenqueued() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);

        state.observe("doc1.txt");
        {
            let mut registry = state.registry.lock().unwrap();
            let gen = registry.generation_of("doc1.txt").unwrap();
            registry.categorize("doc1.txt", "Documents", gen);
        }
        state.enqueue_for_classification("doc1.txt");
        assert!(state.queue_is_empty());
    }

    #[test]
    fn root_listing_hides_pending_and_categorized() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        std::fs::write(state.backing_path("a.txt"), b"a").unwrap();
        std::fs::write(state.backing_path("b.txt"), b"b").unwrap();
        std::fs::write(state.backing_path(".DS_Store"), b"").unwrap();

        state.observe("a.txt");
        {
            let mut registry = state.registry.lock().unwrap();
            let gen = registry.observe("b.txt");
            registry.categorize("b.txt", "Documents", gen);
        }

        let names: Vec<String> = state
            .visible_root_entries()
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();

        assert!(names.contains(&"Documents".to_string()));
        assert!(!names.contains(&"a.txt".to_string()));
        assert!(!names.contains(&"b.txt".to_string()));
        // Ignored names pass through untouched.
        assert!(names.contains(&".DS_Store".to_string()));
    }

    #[test]
    fn category_listing_skips_vanished_backing_files() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        std::fs::write(state.backing_path("kept.txt"), b"x").unwrap();

        {
            let mut registry = state.registry.lock().unwrap();
            let gen = registry.observe("kept.txt");
            registry.categorize("kept.txt", "Documents", gen);
            let gen = registry.observe("gone.txt");
            registry.categorize("gone.txt", "Documents", gen);
        }

        let listed = state.visible_category_entries("Documents").unwrap();
        assert_eq!(listed, vec!["kept.txt"]);
        assert!(state.visible_category_entries("Images").is_none());
    }

    #[test]
    fn rescan_enqueues_existing_files_only() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        std::fs::write(state.backing_path("old.pdf"), b"x").unwrap();
        std::fs::write(state.backing_path(".DS_Store"), b"").unwrap();
        std::fs::create_dir(state.backing_path("subdir")).unwrap();

        let count = state.rescan_backing_store().unwrap();
        assert_eq!(count, 1);
        let batch = state.drain_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].0, "old.pdf");
    }

    #[test]
    fn feedback_mounts_are_rejected() {
        let dir = TempDir::new().unwrap();
        let backing = dir.path().join("store");
        std::fs::create_dir(&backing).unwrap();
        let nested = backing.join("mnt");
        std::fs::create_dir(&nested).unwrap();

        assert!(FolderState::check_no_feedback(&backing, &nested).is_err());
        assert!(FolderState::check_no_feedback(&backing, dir.path()).is_err());

        let elsewhere = TempDir::new().unwrap();
        assert!(FolderState::check_no_feedback(&backing, elsewhere.path()).is_ok());
    }
}
