//! Catalog - the two core maps of the tag engine
//!
//! - `files`: file id → file record (the single owner of records)
//! - `tags`: tag → set of file ids (the index; stores ids only)
//!
//! Both maps are ordered so iteration, serialization and tie-breaks are
//! deterministic. The reserved tag `"/"` holds files that carry no user
//! tags; its bucket always exists.
//!
//! The mutation primitives here (`link`, `unlink`, ...) keep the record's tag
//! set and the index in step but do no uniqueness validation. Validation and
//! rollback live in the mutation engine.

pub mod id_gen;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagDbError};

pub use id_gen::IdGenerator;

/// A tag is a plain string; `ROOT_TAG` is the only one allowed to contain `/`.
pub type Tag = String;

/// Reserved tag for files without user tags.
pub const ROOT_TAG: &str = "/";

/// A user tag is a non-empty path component; `ROOT_TAG` is the one
/// exception.
pub fn is_valid_tag(tag: &str) -> bool {
    tag == ROOT_TAG || is_valid_name(tag)
}

/// Display names must be single, non-empty path components.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

/// Separator between id and display name in a backing object name.
pub const STORAGE_SEPARATOR: char = '_';

/// Opaque file identifier, rendered as 32 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u128);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self)
    }
}

impl FromStr for FileId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(FileId)
    }
}

/// File record: id, display name and user tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Display name. Only unique within a query scope, not database-wide.
    pub name: String,
    /// User tags. Never contains `ROOT_TAG`.
    pub tags: BTreeSet<Tag>,
}

impl FileRecord {
    pub fn new<I, T>(id: FileId, name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        Self {
            id,
            name: name.into(),
            tags: tags
                .into_iter()
                .map(Into::into)
                .filter(|t| t != ROOT_TAG)
                .collect(),
        }
    }

    /// Name of the backing storage object: `<id>_<name>`.
    pub fn storage_name(&self) -> String {
        format!("{}{}{}", self.id, STORAGE_SEPARATOR, self.name)
    }
}

/// Outcome of a `link` call, kept by the mutation journal for undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkChange {
    pub created_bucket: bool,
    pub added: bool,
}

/// The tag index and file registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub(crate) files: BTreeMap<FileId, FileRecord>,
    pub(crate) tags: BTreeMap<Tag, BTreeSet<FileId>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Empty catalog with only the root bucket.
    pub fn new() -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(ROOT_TAG.to_string(), BTreeSet::new());
        Self {
            files: BTreeMap::new(),
            tags,
        }
    }

    /// Build a catalog from raw tables, as read from a snapshot.
    ///
    /// The root bucket is added if missing. Integrity is checked.
    pub fn from_parts(
        files: BTreeMap<FileId, FileRecord>,
        mut tags: BTreeMap<Tag, BTreeSet<FileId>>,
    ) -> Result<Self> {
        tags.entry(ROOT_TAG.to_string()).or_default();
        let catalog = Self { files, tags };
        catalog.check_integrity()?;
        Ok(catalog)
    }

    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of user tag buckets (the root bucket is not counted).
    pub fn tag_count(&self) -> usize {
        self.tags.len() - usize::from(self.tags.contains_key(ROOT_TAG))
    }

    /// User tags with a bucket, in order.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.keys().filter(|t| t.as_str() != ROOT_TAG)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn bucket(&self, tag: &str) -> Option<&BTreeSet<FileId>> {
        self.tags.get(tag)
    }

    /// Whether the file holds a membership in the root bucket.
    pub fn in_root(&self, id: FileId) -> bool {
        self.tags.get(ROOT_TAG).is_some_and(|b| b.contains(&id))
    }

    /// Every bucket the file is a member of: its user tags, plus `"/"` when
    /// it holds a root membership.
    pub fn memberships(&self, id: FileId) -> Vec<Tag> {
        let mut out = Vec::new();
        if self.in_root(id) {
            out.push(ROOT_TAG.to_string());
        }
        if let Some(record) = self.files.get(&id) {
            out.extend(record.tags.iter().cloned());
        }
        out
    }

    /// Insert a record and link it under its tags (or `"/"` when it has none).
    ///
    /// No uniqueness validation happens here; `Catalog::create` validates.
    /// Replaces any record with the same id.
    pub(crate) fn insert_file(&mut self, record: FileRecord) {
        let id = record.id;
        let tags: Vec<Tag> = record.tags.iter().cloned().collect();
        if let Some(old) = self.files.insert(id, record) {
            for tag in &old.tags {
                if let Some(bucket) = self.tags.get_mut(tag) {
                    bucket.remove(&id);
                }
            }
        }
        if tags.is_empty() {
            self.link(ROOT_TAG, id);
        }
        for tag in &tags {
            self.link(tag, id);
        }
    }

    // === PRIMITIVES ===

    /// Create an empty bucket if `tag` has none. Returns true if created.
    pub(crate) fn ensure_bucket(&mut self, tag: &str) -> bool {
        if self.tags.contains_key(tag) {
            return false;
        }
        self.tags.insert(tag.to_string(), BTreeSet::new());
        true
    }

    /// Add `id` to the bucket of `tag`, and to the record's tag set for user
    /// tags.
    pub(crate) fn link(&mut self, tag: &str, id: FileId) -> LinkChange {
        let created_bucket = self.ensure_bucket(tag);
        let added = self
            .tags
            .get_mut(tag)
            .is_some_and(|bucket| bucket.insert(id));
        if tag != ROOT_TAG {
            if let Some(record) = self.files.get_mut(&id) {
                record.tags.insert(tag.to_string());
            }
        }
        LinkChange {
            created_bucket,
            added,
        }
    }

    /// Remove `id` from the bucket of `tag` and from the record's tag set.
    /// The bucket stays even if it becomes empty. Returns true if `id` was a
    /// member.
    pub(crate) fn unlink(&mut self, tag: &str, id: FileId) -> bool {
        let removed = self
            .tags
            .get_mut(tag)
            .is_some_and(|bucket| bucket.remove(&id));
        if tag != ROOT_TAG {
            if let Some(record) = self.files.get_mut(&id) {
                record.tags.remove(tag);
            }
        }
        removed
    }

    pub(crate) fn insert_record(&mut self, record: FileRecord) {
        self.files.insert(record.id, record);
    }

    pub(crate) fn remove_record(&mut self, id: FileId) -> Option<FileRecord> {
        self.files.remove(&id)
    }

    /// Drop a bucket regardless of content. Callers guarantee emptiness.
    pub(crate) fn remove_bucket(&mut self, tag: &str) -> Option<BTreeSet<FileId>> {
        self.tags.remove(tag)
    }

    pub(crate) fn set_name(&mut self, id: FileId, name: &str) -> Option<String> {
        self.files
            .get_mut(&id)
            .map(|record| std::mem::replace(&mut record.name, name.to_string()))
    }

    // === INTEGRITY ===

    /// Verify the structural invariants:
    /// - every user tag of a record has a bucket containing the record;
    /// - every bucket member exists and carries the tag (or the bucket is `"/"`);
    /// - every record has at least one membership;
    /// - no record lists `"/"` among its tags;
    /// - the root bucket exists.
    pub fn check_integrity(&self) -> Result<()> {
        if !self.tags.contains_key(ROOT_TAG) {
            return Err(TagDbError::InvalidFormat("root bucket missing".to_string()));
        }

        for record in self.files.values() {
            if !is_valid_name(&record.name) {
                return Err(TagDbError::InvalidFormat(format!(
                    "file {} has an unusable name {:?}",
                    record.id, record.name
                )));
            }
            if record.tags.contains(ROOT_TAG) {
                return Err(TagDbError::InvalidFormat(format!(
                    "file {} lists the reserved tag",
                    record.id
                )));
            }
            for tag in &record.tags {
                let linked = self.tags.get(tag).is_some_and(|b| b.contains(&record.id));
                if !linked {
                    return Err(TagDbError::InvalidFormat(format!(
                        "file {} has tag {} but is missing from its bucket",
                        record.id, tag
                    )));
                }
            }
            if record.tags.is_empty() && !self.in_root(record.id) {
                return Err(TagDbError::InvalidFormat(format!(
                    "file {} has no index membership",
                    record.id
                )));
            }
        }

        for (tag, bucket) in &self.tags {
            if !is_valid_tag(tag) {
                return Err(TagDbError::InvalidFormat(format!("unusable tag {:?}", tag)));
            }
            for id in bucket {
                let Some(record) = self.files.get(id) else {
                    return Err(TagDbError::InvalidFormat(format!(
                        "bucket {} references unknown file {}",
                        tag, id
                    )));
                };
                if tag != ROOT_TAG && !record.tags.contains(tag) {
                    return Err(TagDbError::InvalidFormat(format!(
                        "bucket {} lists file {} which does not carry the tag",
                        tag, id
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u128, name: &str, tags: &[&str]) -> FileRecord {
        FileRecord::new(FileId(id), name, tags.iter().copied())
    }

    #[test]
    fn test_new_catalog_has_root_bucket() {
        let catalog = Catalog::new();
        assert!(catalog.has_tag(ROOT_TAG));
        assert_eq!(catalog.tag_count(), 0);
        assert_eq!(catalog.file_count(), 0);
        assert!(catalog.check_integrity().is_ok());
    }

    #[test]
    fn test_insert_file_links_tags() {
        let mut catalog = Catalog::new();
        catalog.insert_file(record(1, "n", &["x", "y"]));

        assert!(catalog.bucket("x").unwrap().contains(&FileId(1)));
        assert!(catalog.bucket("y").unwrap().contains(&FileId(1)));
        assert!(!catalog.in_root(FileId(1)));
        assert_eq!(catalog.tag_count(), 2);
        assert!(catalog.check_integrity().is_ok());
    }

    #[test]
    fn test_insert_tagless_file_goes_to_root() {
        let mut catalog = Catalog::new();
        catalog.insert_file(record(1, "n", &[]));

        assert!(catalog.in_root(FileId(1)));
        assert_eq!(catalog.memberships(FileId(1)), vec!["/".to_string()]);
        assert!(catalog.check_integrity().is_ok());
    }

    #[test]
    fn test_record_drops_reserved_tag() {
        let r = record(1, "n", &["/", "x"]);
        assert_eq!(r.tags.len(), 1);
        assert!(r.tags.contains("x"));
    }

    #[test]
    fn test_storage_name() {
        let r = record(0xabc, "notes.txt", &[]);
        assert_eq!(r.storage_name(), "00000000000000000000000000000abc_notes.txt");
    }

    #[test]
    fn test_file_id_parse_roundtrip() {
        let id = FileId(0x1234_5678_9abc_def0);
        let parsed: FileId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-hex".parse::<FileId>().is_err());
    }

    #[test]
    fn test_link_and_unlink_keep_record_in_step() {
        let mut catalog = Catalog::new();
        catalog.insert_file(record(1, "n", &["x"]));

        let change = catalog.link("y", FileId(1));
        assert!(change.created_bucket);
        assert!(change.added);
        assert!(catalog.file(FileId(1)).unwrap().tags.contains("y"));

        let again = catalog.link("y", FileId(1));
        assert!(!again.created_bucket);
        assert!(!again.added);

        assert!(catalog.unlink("y", FileId(1)));
        assert!(!catalog.file(FileId(1)).unwrap().tags.contains("y"));
        // Bucket stays until explicitly pruned
        assert!(catalog.has_tag("y"));
        assert!(catalog.bucket("y").unwrap().is_empty());
    }

    #[test]
    fn test_integrity_detects_dangling_bucket_member() {
        let mut catalog = Catalog::new();
        catalog.tags.insert("x".to_string(), [FileId(9)].into_iter().collect());
        let err = catalog.check_integrity().unwrap_err();
        assert!(matches!(err, TagDbError::InvalidFormat(_)));
    }

    #[test]
    fn test_integrity_detects_orphan_record() {
        let mut catalog = Catalog::new();
        catalog.insert_record(record(1, "n", &[]));
        assert!(catalog.check_integrity().is_err());
    }

    #[test]
    fn test_integrity_detects_missing_membership() {
        let mut catalog = Catalog::new();
        catalog.insert_file(record(1, "n", &["x"]));
        catalog.tags.get_mut("x").unwrap().clear();
        assert!(catalog.check_integrity().is_err());
    }

    #[test]
    fn test_from_parts_adds_root_bucket() {
        let catalog = Catalog::from_parts(BTreeMap::new(), BTreeMap::new()).unwrap();
        assert!(catalog.has_tag(ROOT_TAG));
    }

    #[test]
    fn test_tag_and_name_validity() {
        assert!(is_valid_tag(ROOT_TAG));
        assert!(is_valid_tag("work"));
        assert!(!is_valid_tag(""));
        assert!(!is_valid_tag("a/b"));
        assert!(is_valid_name("notes.txt"));
        assert!(!is_valid_name(ROOT_TAG));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_integrity_rejects_unreachable_entries() {
        let mut catalog = Catalog::new();
        catalog.insert_file(record(1, "n", &["a/b"]));
        assert!(matches!(catalog.check_integrity(), Err(TagDbError::InvalidFormat(_))));

        let mut catalog = Catalog::new();
        catalog.insert_file(record(1, "", &["x"]));
        assert!(matches!(catalog.check_integrity(), Err(TagDbError::InvalidFormat(_))));
    }
}
