//! Path classifier: decides what a path names.
//!
//! A path like `/a/b` is either the file `b` under tag `a`, or the directory
//! `a ∩ b`. With an `unsure` target both interpretations are evaluated and
//! reconciled; a path that is both a file and a populated directory is a
//! `NameConflict`.

use std::collections::BTreeSet;

use crate::catalog::{Catalog, Tag};
use crate::error::{Result, TagDbError};
use crate::path::{TagPath, Target};
use crate::unique::Entry;

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Directory(Vec<Entry>),
    File(Entry),
    /// Several same-named files matched the leaf name.
    Files(Vec<Entry>),
}

impl Resolution {
    pub fn kind(&self) -> &'static str {
        match self {
            Resolution::Directory(_) => "dir",
            Resolution::File(_) => "file",
            Resolution::Files(_) => "files",
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Resolution::Directory(_))
    }

    /// The file an adapter should open: the only match of `File`, or the
    /// bare entry of `Files`. Directories and suffix-only `Files` yield
    /// `None`.
    pub fn single_file(&self) -> Option<&Entry> {
        match self {
            Resolution::File(entry) => Some(entry),
            Resolution::Files(entries) => entries.iter().find(|e| e.is_bare()),
            Resolution::Directory(_) => None,
        }
    }

    fn from_matches(mut matches: Vec<Entry>) -> Option<Self> {
        match matches.len() {
            0 => None,
            1 => matches.pop().map(Resolution::File),
            _ => Some(Resolution::Files(matches)),
        }
    }
}

/// Errors an `unsure` lookup swallows from either interpretation.
fn is_suppressible(err: &TagDbError) -> bool {
    matches!(err, TagDbError::TagNotFound(_) | TagDbError::NoUniqueMatch(_))
}

impl Catalog {
    /// Resolve `path` under a target hint.
    pub fn resolve(&self, path: &str, target: Target) -> Result<Resolution> {
        let parsed = TagPath::parse(path);
        match target {
            Target::Dir => Ok(Resolution::Directory(self.resolve_dir(&parsed.dir_tags())?)),
            Target::File => {
                let (tags, name) = parsed
                    .file_parts()
                    .ok_or_else(|| TagDbError::NoSuchFile(path.to_string()))?;
                let matches = self.resolve_file(&tags, name)?;
                Resolution::from_matches(matches)
                    .ok_or_else(|| TagDbError::NoSuchFile(path.to_string()))
            }
            Target::Unsure => self.resolve_unsure(path, &parsed),
        }
    }

    fn resolve_dir(&self, tags: &[Tag]) -> Result<Vec<Entry>> {
        let ids = self.query_by_tags(tags)?;
        self.make_unique(&ids)
    }

    /// Entries under `tags` whose display name is `name`. May be empty.
    fn resolve_file(&self, tags: &[Tag], name: &str) -> Result<Vec<Entry>> {
        let ids = self.query_by_tags(tags)?;
        Ok(self
            .make_unique(&ids)?
            .into_iter()
            .filter(|entry| entry.name == name)
            .collect())
    }

    fn resolve_unsure(&self, path: &str, parsed: &TagPath) -> Result<Resolution> {
        let Some((file_tags, name)) = parsed.file_parts() else {
            return Ok(Resolution::Directory(self.resolve_dir(&parsed.dir_tags())?));
        };

        let file = match self.resolve_file(&file_tags, name) {
            Ok(matches) => Some(matches),
            Err(e) if is_suppressible(&e) => {
                tracing::debug!(path, error = %e, "file interpretation failed");
                None
            }
            Err(e) => return Err(e),
        };

        let dir_tags = parsed.dir_tags();
        let dir = match self.resolve_dir(&dir_tags) {
            Ok(entries) => Ok(entries),
            Err(e) if is_suppressible(&e) => {
                tracing::debug!(path, error = %e, "directory interpretation failed");
                Err(e)
            }
            Err(e) => return Err(e),
        };

        match (file, dir) {
            (Some(matches), Ok(entries)) if !matches.is_empty() && !entries.is_empty() => {
                tracing::warn!(path, "path names both a file and a directory");
                Err(TagDbError::NameConflict(dir_tags))
            }
            (Some(matches), _) if !matches.is_empty() => Resolution::from_matches(matches)
                .ok_or_else(|| TagDbError::NoSuchFile(path.to_string())),
            (_, Ok(entries)) => Ok(Resolution::Directory(entries)),
            (Some(_), Err(_)) => Err(TagDbError::NoSuchFile(path.to_string())),
            (None, Err(e)) => Err(e),
        }
    }

    /// Tags shown for a path on the extended-attribute read path.
    ///
    /// - root: every user tag;
    /// - directory: tags of its files, minus the path's own tags;
    /// - file: the file's tags (for `Files`, the bare entry's).
    pub fn list_tags_of(&self, path: &str) -> Result<BTreeSet<Tag>> {
        let parsed = TagPath::parse(path);
        if parsed.is_root() {
            return Ok(self.tags().cloned().collect());
        }

        let resolution = self.resolve(path, Target::Unsure)?;
        if let Resolution::Directory(entries) = &resolution {
            let scope: BTreeSet<&Tag> = parsed.components().iter().collect();
            return Ok(entries
                .iter()
                .filter_map(|e| self.file(e.id))
                .flat_map(|r| r.tags.iter())
                .filter(|t| !scope.contains(t))
                .cloned()
                .collect());
        }

        resolution
            .single_file()
            .and_then(|entry| self.file(entry.id))
            .map(|record| record.tags.clone())
            .ok_or_else(|| TagDbError::NoSuchFile(path.to_string()))
    }
}
