//! Mutation engine: validated, all-or-nothing changes to the catalog.
//!
//! Every operation follows validate → apply → (on failure) undo. Applied
//! changes go through a `Journal` that records each primitive step, so undo
//! replays the steps in reverse and leaves the catalog exactly as it was,
//! bucket creation included.
//!
//! Validation has three parts:
//! - `check_unique`: resolving the placement's own path (`/<tags>/<name>`)
//!   must not land on another file or a directory;
//! - scope sweep: every single-tag scope the file belongs to must still be
//!   resolvable by `make_unique`. A collision group only grows when the scope
//!   narrows, so single-tag scopes cover every multi-tag scope;
//! - shadowing: no path may become both a file and a populated directory.

use std::collections::BTreeSet;

use crate::catalog::{is_valid_name, is_valid_tag, Catalog, FileId, FileRecord, LinkChange, Tag, ROOT_TAG};
use crate::classify::Resolution;
use crate::error::{Result, TagDbError};
use crate::path::{join_file_path, split_path, Target};

/// Result of `remove_tags_by_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// The record is gone; the caller should delete the backing object.
    pub deleted: bool,
    /// Backing object name (`<id>_<name>`).
    pub storage_name: String,
}

/// Result of `rename_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub old_storage_name: String,
    pub new_storage_name: String,
}

// ── Journal ────────────────────────────────────────────────────────

enum Step {
    Linked { tag: Tag, id: FileId, change: LinkChange },
    Unlinked { tag: Tag, id: FileId },
    Inserted(FileId),
    Removed(FileRecord),
    Renamed { id: FileId, old: String },
}

/// Primitive changes applied during one mutation, for rollback.
#[derive(Default)]
struct Journal {
    steps: Vec<Step>,
}

impl Journal {
    fn link(&mut self, catalog: &mut Catalog, tag: &str, id: FileId) {
        let change = catalog.link(tag, id);
        if change.added || change.created_bucket {
            self.steps.push(Step::Linked {
                tag: tag.to_string(),
                id,
                change,
            });
        }
    }

    fn unlink(&mut self, catalog: &mut Catalog, tag: &str, id: FileId) {
        if catalog.unlink(tag, id) {
            self.steps.push(Step::Unlinked {
                tag: tag.to_string(),
                id,
            });
        }
    }

    fn insert(&mut self, catalog: &mut Catalog, record: FileRecord) {
        let id = record.id;
        catalog.insert_record(record);
        self.steps.push(Step::Inserted(id));
    }

    fn remove(&mut self, catalog: &mut Catalog, id: FileId) -> Option<FileRecord> {
        let record = catalog.remove_record(id)?;
        self.steps.push(Step::Removed(record.clone()));
        Some(record)
    }

    fn rename(&mut self, catalog: &mut Catalog, id: FileId, name: &str) {
        if let Some(old) = catalog.set_name(id, name) {
            self.steps.push(Step::Renamed { id, old });
        }
    }

    fn rollback(self, catalog: &mut Catalog) {
        for step in self.steps.into_iter().rev() {
            match step {
                Step::Linked { tag, id, change } => {
                    if change.added {
                        catalog.unlink(&tag, id);
                    }
                    if change.created_bucket {
                        catalog.remove_bucket(&tag);
                    }
                }
                Step::Unlinked { tag, id } => {
                    catalog.link(&tag, id);
                }
                Step::Inserted(id) => {
                    catalog.remove_record(id);
                }
                Step::Removed(record) => catalog.insert_record(record),
                Step::Renamed { id, old } => {
                    catalog.set_name(id, &old);
                }
            }
        }
    }
}

/// Run `apply` against the catalog; undo everything it journaled if it fails.
fn transact<T>(
    catalog: &mut Catalog,
    apply: impl FnOnce(&mut Catalog, &mut Journal) -> Result<T>,
) -> Result<T> {
    let mut journal = Journal::default();
    match apply(catalog, &mut journal) {
        Ok(value) => Ok(value),
        Err(e) => {
            journal.rollback(catalog);
            Err(e)
        }
    }
}

fn user_tags<'a, I>(tags: I) -> BTreeSet<Tag>
where
    I: IntoIterator<Item = &'a Tag>,
{
    tags.into_iter()
        .filter(|t| t.as_str() != ROOT_TAG)
        .cloned()
        .collect()
}

/// Reject names and tags no path could ever reach.
fn check_input(name: Option<&str>, tags: &[Tag]) -> Result<()> {
    if let Some(name) = name.filter(|n| !is_valid_name(n)) {
        return Err(TagDbError::InvalidName(name.to_string()));
    }
    match tags.iter().find(|t| !is_valid_tag(t)) {
        Some(tag) => Err(TagDbError::InvalidTag(tag.clone())),
        None => Ok(()),
    }
}

/// `NameConflict` for the path `/<shared>/<leaf>`.
fn conflict(shared: Tag, leaf: &str) -> TagDbError {
    let mut path = Vec::with_capacity(2);
    if shared != ROOT_TAG {
        path.push(shared);
    }
    path.push(leaf.to_string());
    TagDbError::NameConflict(path)
}

// ── Validation ─────────────────────────────────────────────────────

impl Catalog {
    /// Check that a file named `name` under `tags` would be addressable.
    ///
    /// Resolves `/<tags>/<name>` as `unsure`:
    /// - nothing there (`TagNotFound`, `NoSuchFile`) is always fine;
    /// - a `File`/`Files` hit is fine for an `existed` placement, when the
    ///   file the path opens is `this` (the file being mutated), or when every
    ///   other file found carries more tags than `tags`;
    /// - a directory, an ambiguous group or a name conflict is rejected.
    pub fn check_unique(
        &self,
        tags: &BTreeSet<Tag>,
        name: &str,
        existed: bool,
        this: Option<FileId>,
    ) -> Result<()> {
        let path = join_file_path(tags, name);
        let outcome = match self.resolve(&path, Target::Unsure) {
            Ok(resolution) => resolution,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        let found: Vec<FileId> = match &outcome {
            Resolution::Directory(_) => {
                return Err(if existed {
                    TagDbError::NoUniqueMatch(this.into_iter().collect())
                } else {
                    TagDbError::NameConflict(split_path(&path).into_iter().map(str::to_string).collect())
                });
            }
            Resolution::File(entry) => vec![entry.id],
            Resolution::Files(entries) => entries.iter().map(|e| e.id).collect(),
        };

        // `this` already opens from the path; suffixed siblings stay reachable.
        let held_by_this = this.is_some() && outcome.single_file().map(|e| e.id) == this;
        // Files carrying more tags than the placement get a suffix once it
        // lands, and keep their own longer paths.
        let only_longer = found
            .iter()
            .filter(|id| Some(**id) != this)
            .filter_map(|id| self.file(*id))
            .all(|record| record.tags.len() > tags.len());
        if existed || held_by_this || only_longer {
            return Ok(());
        }
        tracing::debug!(path = %path, "placement already taken");
        Err(TagDbError::NoUniqueMatch(found))
    }

    /// Every single-tag scope `id` belongs to must still disambiguate.
    fn sweep_scopes(&self, id: FileId) -> Result<()> {
        for tag in self.memberships(id) {
            let ids = self.query_by_tags(&[tag])?;
            self.make_unique(&ids)?;
        }
        Ok(())
    }

    /// No path may name both a file and a populated directory because of
    /// `id`'s placement.
    ///
    /// - a file tagged with its own name makes `/<name>/<name>` both;
    /// - a file `g` named after one of our tags `t`, reachable from the root
    ///   or from a tag we share, makes `/<shared>/t` both;
    /// - files in the bucket named after us, reachable from the root or a tag
    ///   we share, make `/<shared>/<name>` both.
    fn check_shadowing(&self, id: FileId) -> Result<()> {
        let Some(record) = self.file(id) else {
            return Ok(());
        };
        let in_root = self.in_root(id);

        if record.tags.contains(&record.name) {
            return Err(TagDbError::NameConflict(vec![record.name.clone(), record.name.clone()]));
        }

        // First tag of `other` (other than `except`) that `record` also carries.
        let shared_tag = |other: &FileRecord, except: &str| -> Option<Tag> {
            other
                .tags
                .iter()
                .find(|t| t.as_str() != except && record.tags.contains(*t))
                .cloned()
        };

        for tag in &record.tags {
            for other in self.files().filter(|g| g.id != id && &g.name == tag) {
                let shared = if self.in_root(other.id) {
                    Some(ROOT_TAG.to_string())
                } else {
                    shared_tag(other, tag)
                };
                if let Some(shared) = shared {
                    return Err(conflict(shared, tag));
                }
            }
        }

        if let Some(bucket) = self.bucket(&record.name) {
            for other in bucket.iter().filter(|h| **h != id).filter_map(|h| self.file(*h)) {
                let shared = if in_root {
                    Some(ROOT_TAG.to_string())
                } else {
                    shared_tag(other, &record.name)
                };
                if let Some(shared) = shared {
                    return Err(conflict(shared, &record.name));
                }
            }
        }

        Ok(())
    }

    fn validate_placement(&self, id: FileId) -> Result<()> {
        self.sweep_scopes(id)?;
        self.check_shadowing(id)
    }

    fn require(&self, id: FileId) -> Result<&FileRecord> {
        self.file(id).ok_or(TagDbError::UnknownFile(id))
    }
}

// ── Operations ─────────────────────────────────────────────────────

impl Catalog {
    /// Create a file record under `id`.
    ///
    /// `"/"` in `tags` is dropped; a file without user tags is linked under
    /// `"/"`. Fails with `InvalidName`/`InvalidTag` or
    /// `NoUniqueMatch`/`NameConflict` without changing anything.
    pub fn create(&mut self, id: FileId, name: &str, tags: &[Tag]) -> Result<FileId> {
        check_input(Some(name), tags)?;
        let tags = user_tags(tags);
        self.check_unique(&tags, name, false, None)?;

        transact(self, |catalog, journal| {
            journal.insert(catalog, FileRecord::new(id, name, Vec::<Tag>::new()));
            if tags.is_empty() {
                journal.link(catalog, ROOT_TAG, id);
            }
            for tag in &tags {
                journal.link(catalog, tag, id);
            }
            catalog.validate_placement(id)
        })
        .inspect_err(|e| tracing::warn!(name, error = %e, "create rejected"))?;

        tracing::info!(id = %id, name, tags = tags.len(), "file created");
        Ok(id)
    }

    /// Attach tags to a file. `"/"` adds a root membership.
    pub fn add_tags(&mut self, id: FileId, new_tags: &[Tag]) -> Result<()> {
        check_input(None, new_tags)?;
        let record = self.require(id)?;
        let name = record.name.clone();
        let union: BTreeSet<Tag> = record.tags.iter().chain(user_tags(new_tags).iter()).cloned().collect();
        self.check_unique(&union, &name, false, Some(id))?;

        transact(self, |catalog, journal| {
            for tag in new_tags {
                journal.link(catalog, tag, id);
            }
            catalog.validate_placement(id)
        })
        .inspect_err(|e| tracing::warn!(id = %id, error = %e, "add_tags rejected"))?;

        tracing::info!(id = %id, added = new_tags.len(), "tags added");
        Ok(())
    }

    /// Remove tags (and `"/"`) from a file.
    ///
    /// When no membership remains, the record is deleted and the outcome says
    /// so; the caller removes the backing object. Otherwise the remaining
    /// placement is re-validated and the removal undone on failure.
    pub fn remove_tags_by_path(&mut self, id: FileId, tags: &[Tag]) -> Result<RemoveOutcome> {
        let storage_name = self.require(id)?.storage_name();

        let deleted = transact(self, |catalog, journal| {
            for tag in tags {
                journal.unlink(catalog, tag, id);
            }

            if catalog.memberships(id).is_empty() {
                journal.remove(catalog, id);
                return Ok(true);
            }

            let record = catalog.require(id)?;
            catalog.check_unique(&record.tags, &record.name, true, Some(id))?;
            catalog.validate_placement(id)?;
            Ok(false)
        })
        .map_err(|e| match e {
            TagDbError::NameConflict(_) => TagDbError::NoUniqueMatch(vec![id]),
            other => other,
        })
        .inspect_err(|e| tracing::warn!(id = %id, error = %e, "remove_tags_by_path rejected"))?;

        tracing::info!(id = %id, deleted, "tags removed");
        Ok(RemoveOutcome {
            deleted,
            storage_name,
        })
    }

    /// Prune the named buckets that are empty. The root bucket is kept.
    ///
    /// Callers confirm emptiness first (a directory query); non-empty buckets
    /// are left alone. Returns the pruned tags.
    pub fn remove_empty_tag_buckets(&mut self, tags: &[Tag]) -> Vec<Tag> {
        let mut pruned = Vec::new();
        for tag in tags {
            if tag == ROOT_TAG {
                continue;
            }
            if self.bucket(tag).is_some_and(BTreeSet::is_empty) {
                self.remove_bucket(tag);
                pruned.push(tag.clone());
            }
        }
        if !pruned.is_empty() {
            tracing::info!(count = pruned.len(), "empty tag buckets pruned");
        }
        pruned
    }

    /// Ensure buckets exist for `tags` (an empty directory). Returns how many
    /// were created.
    pub fn create_tags(&mut self, tags: &[Tag]) -> Result<usize> {
        check_input(None, tags)?;
        Ok(tags.iter().filter(|t| self.ensure_bucket(t)).count())
    }

    /// Swap tags atomically: remove `remove`, add `add`, validate the result.
    /// Any failure leaves the file as it was.
    pub fn retag(&mut self, id: FileId, remove: &[Tag], add: &[Tag]) -> Result<()> {
        check_input(None, add)?;
        self.require(id)?;
        transact(self, |catalog, journal| catalog.retag_in(journal, id, None, remove, add))
            .inspect_err(|e| tracing::warn!(id = %id, error = %e, "retag rejected"))?;
        tracing::info!(id = %id, removed = remove.len(), added = add.len(), "file retagged");
        Ok(())
    }

    /// `retag` plus a display-name change, as one transaction.
    pub fn rename_file(
        &mut self,
        id: FileId,
        new_name: &str,
        remove: &[Tag],
        add: &[Tag],
    ) -> Result<RenameOutcome> {
        check_input(Some(new_name), add)?;
        let old_storage_name = self.require(id)?.storage_name();
        transact(self, |catalog, journal| {
            catalog.retag_in(journal, id, Some(new_name), remove, add)
        })
        .inspect_err(|e| tracing::warn!(id = %id, error = %e, "rename rejected"))?;

        let new_storage_name = self.require(id)?.storage_name();
        tracing::info!(id = %id, name = new_name, "file renamed");
        Ok(RenameOutcome {
            old_storage_name,
            new_storage_name,
        })
    }

    fn retag_in(
        &mut self,
        journal: &mut Journal,
        id: FileId,
        new_name: Option<&str>,
        remove: &[Tag],
        add: &[Tag],
    ) -> Result<()> {
        for tag in remove {
            journal.unlink(self, tag, id);
        }
        if let Some(name) = new_name {
            journal.rename(self, id, name);
        }

        let record = self.require(id)?;
        let union: BTreeSet<Tag> = record.tags.iter().chain(user_tags(add).iter()).cloned().collect();
        let name = record.name.clone();
        self.check_unique(&union, &name, false, Some(id))?;

        for tag in add {
            journal.link(self, tag, id);
        }
        if self.memberships(id).is_empty() {
            journal.link(self, ROOT_TAG, id);
        }
        self.validate_placement(id)
    }

    /// Remove a file and all its memberships. Returns its storage name.
    pub fn delete_file(&mut self, id: FileId) -> Result<String> {
        let storage_name = self.require(id)?.storage_name();
        for tag in self.memberships(id) {
            self.unlink(&tag, id);
        }
        self.remove_record(id);
        tracing::info!(id = %id, "file deleted");
        Ok(storage_name)
    }
}
