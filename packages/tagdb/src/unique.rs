//! Uniqueness resolver.
//!
//! Files sharing a display name inside one query result form a collision
//! group. Each member is made addressable by a distinguishing tag (a tag it
//! carries and no other member does), listed as `<tag>/<name>`. One member
//! per group may stay bare when it has no distinguishing tag; a second such
//! member makes the whole result ambiguous.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{Catalog, FileId, FileRecord, Tag};
use crate::error::{Result, TagDbError};

/// An addressable member of a query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub id: FileId,
    pub name: String,
    /// Distinguishing tag, present only for collision group members.
    pub suffix: Option<Tag>,
}

impl Entry {
    fn bare(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            suffix: None,
        }
    }

    fn suffixed(record: &FileRecord, tag: &Tag) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            suffix: Some(tag.clone()),
        }
    }

    pub fn is_bare(&self) -> bool {
        self.suffix.is_none()
    }

    /// Name as shown in a directory listing.
    pub fn listing_name(&self) -> String {
        match &self.suffix {
            Some(tag) => format!("{}/{}", tag, self.name),
            None => self.name.clone(),
        }
    }
}

/// Smallest tag of `member` not carried by any other group member.
fn distinguishing_tag<'a>(member: &'a FileRecord, group: &[&FileRecord]) -> Option<&'a Tag> {
    member.tags.iter().find(|tag| {
        !group
            .iter()
            .any(|other| other.id != member.id && other.tags.contains(*tag))
    })
}

impl Catalog {
    /// Turn a candidate set into addressable entries.
    ///
    /// Output is ordered by display name, then file id. Within a collision
    /// group the suffix is the lexicographically smallest distinguishing tag,
    /// and the bare fallback goes to the lowest id without one. Fails with
    /// `NoUniqueMatch` (carrying the group's ids) when two members of a group
    /// have no distinguishing tag. Pure: never mutates the catalog.
    pub fn make_unique(&self, ids: &BTreeSet<FileId>) -> Result<Vec<Entry>> {
        let mut groups: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
        for id in ids {
            if let Some(record) = self.file(*id) {
                groups.entry(record.name.as_str()).or_default().push(record);
            }
        }

        let mut entries = Vec::with_capacity(ids.len());
        for (name, group) in groups {
            if let [only] = group.as_slice() {
                entries.push(Entry::bare(only));
                continue;
            }

            let mut fallback_taken = false;
            for member in &group {
                match distinguishing_tag(member, &group) {
                    Some(tag) => entries.push(Entry::suffixed(member, tag)),
                    None if !fallback_taken => {
                        fallback_taken = true;
                        entries.push(Entry::bare(member));
                    }
                    None => {
                        let ids: Vec<FileId> = group.iter().map(|r| r.id).collect();
                        tracing::debug!(name, members = ids.len(), "indistinguishable collision group");
                        return Err(TagDbError::NoUniqueMatch(ids));
                    }
                }
            }
        }

        Ok(entries)
    }
}
