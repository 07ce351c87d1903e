//! TagDb - the thread-safe facade over the catalog
//!
//! # Architecture
//!
//! - `TagDb` owns one `Catalog` behind a `Mutex`; every operation, read or
//!   write, holds it for its whole duration
//! - File ids come from an `IdGenerator`
//! - With a snapshot path and `autosave`, every successful mutation is
//!   written to the snapshot before the lock is released. If the write fails
//!   the mutation is undone and the error returned
//! - Writes carry a generation number so an older snapshot never replaces a
//!   newer one
//!
//! # Usage
//!
//! ```no_run
//! use tagdb::{TagDb, TagDbConfig, Target};
//!
//! let db = TagDb::open(&TagDbConfig::with_root("/srv/tags")).unwrap();
//! let id = db.create("notes.txt", &["work".to_string()]).unwrap();
//! let listing = db.resolve("/work", Target::Dir).unwrap();
//! ```

use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::catalog::{Catalog, FileId, FileRecord, IdGenerator, Tag};
use crate::classify::Resolution;
use crate::config::TagDbConfig;
use crate::error::{Result, TagDbError};
use crate::mutation::{RemoveOutcome, RenameOutcome};
use crate::path::{resolve_path, split_path, Target};
use crate::snapshot;

/// Snapshot location plus the bookkeeping that keeps autosaves ordered.
struct Persistence {
    path: PathBuf,
    autosave: bool,
    /// Generation of the last snapshot written to `path`.
    written: Mutex<u64>,
}

pub struct TagDb {
    catalog: Mutex<Catalog>,
    ids: IdGenerator,
    persistence: Option<Persistence>,
    /// Bumped under the catalog lock on every successful mutation.
    generation: AtomicU64,
}

impl TagDb {
    /// In-memory database; nothing is persisted unless `save_to` is called.
    pub fn ephemeral() -> Self {
        Self::with_parts(Catalog::new(), IdGenerator::new(), None)
    }

    /// In-memory database with a fixed id seed, for reproducible ids.
    pub fn ephemeral_with_seed(seed: u64) -> Self {
        Self::with_parts(Catalog::new(), IdGenerator::with_seed(seed), None)
    }

    /// Open the database described by `config`, loading its snapshot when
    /// the file exists.
    pub fn open(config: &TagDbConfig) -> Result<Self> {
        let path = config.snapshot_path();
        let catalog = if path.exists() {
            snapshot::load_from_path(&path)?
        } else {
            tracing::info!(path = %path.display(), "no snapshot, starting empty");
            Catalog::new()
        };

        let persistence = Persistence {
            path,
            autosave: config.autosave,
            written: Mutex::new(0),
        };
        Ok(Self::with_parts(catalog, IdGenerator::new(), Some(persistence)))
    }

    fn with_parts(catalog: Catalog, ids: IdGenerator, persistence: Option<Persistence>) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            ids,
            persistence,
            generation: AtomicU64::new(0),
        }
    }

    /// Configured snapshot path, if any.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.persistence.as_ref().map(|p| p.path.as_path())
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        // Mutations complete or roll back before returning, so a poisoned
        // catalog is still consistent.
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the catalog under the lock.
    pub fn read<T>(&self, f: impl FnOnce(&Catalog) -> T) -> T {
        f(&self.lock())
    }

    /// Run a mutation under the lock and autosave before releasing it. A
    /// failed autosave restores the catalog as it was before `op`.
    fn mutate<T>(&self, op: impl FnOnce(&mut Catalog) -> Result<T>) -> Result<T> {
        let autosave = self.persistence.as_ref().filter(|p| p.autosave);

        let mut catalog = self.lock();
        let before = autosave.map(|_| catalog.clone());
        let value = op(&mut catalog)?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let (Some(persistence), Some(before)) = (autosave, before) {
            let saved = snapshot::encode(&catalog)
                .and_then(|bytes| Self::write_generation(persistence, generation, &bytes));
            if let Err(e) = saved {
                tracing::warn!(
                    path = %persistence.path.display(),
                    error = %e,
                    "autosave failed, mutation rolled back"
                );
                *catalog = before;
                self.generation.store(generation - 1, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(value)
    }

    fn write_generation(persistence: &Persistence, generation: u64, bytes: &[u8]) -> Result<()> {
        let mut written = persistence
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generation <= *written {
            tracing::debug!(generation, "newer snapshot already written");
            return Ok(());
        }
        snapshot::write_file(&persistence.path, bytes)?;
        *written = generation;
        Ok(())
    }

    // === QUERIES ===

    pub fn resolve(&self, path: &str, target: Target) -> Result<Resolution> {
        self.lock().resolve(path, target)
    }

    /// `resolve` with the target given as a string hint
    /// (`file`, `dir` or `unsure`).
    pub fn resolve_hint(&self, path: &str, hint: &str) -> Result<Resolution> {
        self.resolve(path, hint.parse()?)
    }

    pub fn query_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Result<BTreeSet<FileId>> {
        self.lock().query_by_tags(tags)
    }

    pub fn list_tags_of(&self, path: &str) -> Result<BTreeSet<Tag>> {
        self.lock().list_tags_of(path)
    }

    pub fn file(&self, id: FileId) -> Option<FileRecord> {
        self.lock().file(id).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.lock().file_count()
    }

    pub fn tag_count(&self) -> usize {
        self.lock().tag_count()
    }

    // === MUTATIONS ===

    /// Create a file named `name` under `tags` and return its fresh id.
    pub fn create(&self, name: &str, tags: &[Tag]) -> Result<FileId> {
        self.mutate(|catalog| {
            let mut id = self.ids.next_id(name);
            while catalog.file(id).is_some() {
                tracing::debug!(id = %id, "file id collision, regenerating");
                id = self.ids.next_id(name);
            }
            catalog.create(id, name, tags)
        })
    }

    pub fn add_tags(&self, id: FileId, tags: &[Tag]) -> Result<()> {
        self.mutate(|catalog| catalog.add_tags(id, tags))
    }

    pub fn remove_tags_by_path(&self, id: FileId, tags: &[Tag]) -> Result<RemoveOutcome> {
        self.mutate(|catalog| catalog.remove_tags_by_path(id, tags))
    }

    pub fn remove_empty_tag_buckets(&self, tags: &[Tag]) -> Result<Vec<Tag>> {
        self.mutate(|catalog| Ok(catalog.remove_empty_tag_buckets(tags)))
    }

    pub fn create_tags(&self, tags: &[Tag]) -> Result<usize> {
        self.mutate(|catalog| catalog.create_tags(tags))
    }

    pub fn retag(&self, id: FileId, remove: &[Tag], add: &[Tag]) -> Result<()> {
        self.mutate(|catalog| catalog.retag(id, remove, add))
    }

    pub fn rename_file(
        &self,
        id: FileId,
        new_name: &str,
        remove: &[Tag],
        add: &[Tag],
    ) -> Result<RenameOutcome> {
        self.mutate(|catalog| catalog.rename_file(id, new_name, remove, add))
    }

    pub fn delete_file(&self, id: FileId) -> Result<String> {
        self.mutate(|catalog| catalog.delete_file(id))
    }

    // === PATH OPERATIONS ===

    /// Create a file from a path: leading components are tags, the last one
    /// is the name. `/n` creates a root file.
    pub fn create_at(&self, path: &str) -> Result<FileId> {
        let parsed = resolve_path(path, Target::File);
        let name = parsed
            .name
            .ok_or_else(|| TagDbError::NoSuchFile(path.to_string()))?;
        self.create(&name, &parsed.tags)
    }

    /// Create a bucket for every component of `path`.
    pub fn mkdir(&self, path: &str) -> Result<usize> {
        let tags: Vec<Tag> = split_path(path).into_iter().map(str::to_string).collect();
        self.create_tags(&tags)
    }

    /// Remove the directory at `path`: it must list no files. Empty buckets
    /// among its components are pruned.
    pub fn rmdir(&self, path: &str) -> Result<Vec<Tag>> {
        self.mutate(|catalog| {
            if let Resolution::Directory(entries) = catalog.resolve(path, Target::Dir)? {
                if !entries.is_empty() {
                    return Err(TagDbError::DirectoryNotEmpty(path.to_string()));
                }
            }
            let tags: Vec<Tag> = split_path(path).into_iter().map(str::to_string).collect();
            Ok(catalog.remove_empty_tag_buckets(&tags))
        })
    }

    /// Remove the file at `path` from the path's scope: its tags (or the
    /// root membership for `/n`) are removed, and the record goes when
    /// nothing is left.
    pub fn unlink(&self, path: &str) -> Result<RemoveOutcome> {
        self.mutate(|catalog| {
            let id = Self::file_at(catalog, path)?;
            let parsed = resolve_path(path, Target::File);
            catalog.remove_tags_by_path(id, &parsed.tags)
        })
    }

    /// Move the file at `from` to `to`: tags only in `from` are removed,
    /// tags only in `to` are added and the leaf name becomes the new name.
    pub fn rename(&self, from: &str, to: &str) -> Result<RenameOutcome> {
        self.mutate(|catalog| {
            let id = Self::file_at(catalog, from)?;
            let source = resolve_path(from, Target::File);
            let dest = resolve_path(to, Target::File);
            let new_name = dest
                .name
                .ok_or_else(|| TagDbError::NoSuchFile(to.to_string()))?;

            let from_tags: BTreeSet<Tag> = source.tags.into_iter().collect();
            let to_tags: BTreeSet<Tag> = dest.tags.into_iter().collect();
            let remove: Vec<Tag> = from_tags.difference(&to_tags).cloned().collect();
            let add: Vec<Tag> = to_tags.difference(&from_tags).cloned().collect();

            catalog.rename_file(id, &new_name, &remove, &add)
        })
    }

    /// The single file a path names, for write paths.
    fn file_at(catalog: &Catalog, path: &str) -> Result<FileId> {
        let resolution = catalog.resolve(path, Target::File)?;
        match resolution.single_file() {
            Some(entry) => Ok(entry.id),
            None => match resolution {
                Resolution::Files(entries) => {
                    Err(TagDbError::NoUniqueMatch(entries.iter().map(|e| e.id).collect()))
                }
                _ => Err(TagDbError::NoSuchFile(path.to_string())),
            },
        }
    }

    // === SNAPSHOTS ===

    /// Replace the catalog with the snapshot read from `reader`.
    pub fn load_snapshot<R: Read>(&self, reader: &mut R) -> Result<()> {
        let loaded = snapshot::read_snapshot(reader)?;
        *self.lock() = loaded;
        Ok(())
    }

    /// Write a snapshot to `writer`. The catalog is encoded under the lock
    /// and written after it is released.
    pub fn save_snapshot<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = snapshot::encode(&self.lock())?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    pub fn load_from(&self, path: &Path) -> Result<()> {
        let loaded = snapshot::load_from_path(path)?;
        *self.lock() = loaded;
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let bytes = snapshot::encode(&self.lock())?;
        snapshot::write_file(path, &bytes)
    }

    /// Save to the configured snapshot path. Returns false for an
    /// ephemeral database.
    pub fn flush(&self) -> Result<bool> {
        let Some(persistence) = &self.persistence else {
            return Ok(false);
        };
        let (generation, bytes) = {
            let catalog = self.lock();
            (self.generation.load(Ordering::SeqCst), snapshot::encode(&catalog)?)
        };
        let mut written = persistence
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generation < *written {
            return Ok(true);
        }
        snapshot::write_file(&persistence.path, &bytes)?;
        *written = generation;
        Ok(true)
    }
}
