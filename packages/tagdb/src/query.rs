//! Query engine: tag conjunction → candidate file ids.

use std::collections::BTreeSet;

use crate::catalog::{Catalog, FileId, ROOT_TAG};
use crate::error::{Result, TagDbError};

impl Catalog {
    /// Intersect the buckets of `tags` in order.
    ///
    /// Every tag must have a bucket, even after the running intersection is
    /// already empty: the first missing tag in path order is reported as
    /// `TagNotFound`. An empty sequence queries the root scope.
    pub fn query_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Result<BTreeSet<FileId>> {
        if tags.is_empty() {
            return self.query_by_tags(&[ROOT_TAG]);
        }

        let mut result: Option<BTreeSet<FileId>> = None;
        for tag in tags {
            let tag = tag.as_ref();
            let bucket = self
                .bucket(tag)
                .ok_or_else(|| TagDbError::TagNotFound(tag.to_string()))?;

            result = Some(match result {
                None => bucket.clone(),
                Some(acc) if acc.is_empty() => acc,
                Some(acc) => acc.intersection(bucket).copied().collect(),
            });
        }

        tracing::trace!(tags = tags.len(), "query_by_tags");
        Ok(result.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileRecord;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert_file(FileRecord::new(FileId(1), "a", ["x", "y"]));
        catalog.insert_file(FileRecord::new(FileId(2), "b", ["x"]));
        catalog.insert_file(FileRecord::new(FileId(3), "c", ["y", "z"]));
        catalog.insert_file(FileRecord::new(FileId(4), "d", Vec::<&str>::new()));
        catalog
    }

    fn ids(list: &[u128]) -> BTreeSet<FileId> {
        list.iter().map(|&i| FileId(i)).collect()
    }

    #[test]
    fn test_single_tag() {
        assert_eq!(catalog().query_by_tags(&["x"]).unwrap(), ids(&[1, 2]));
    }

    #[test]
    fn test_intersection() {
        let c = catalog();
        assert_eq!(c.query_by_tags(&["x", "y"]).unwrap(), ids(&[1]));
        assert_eq!(c.query_by_tags(&["y", "x"]).unwrap(), ids(&[1]));
        assert!(c.query_by_tags(&["x", "z"]).unwrap().is_empty());
    }

    #[test]
    fn test_root_scope() {
        let c = catalog();
        assert_eq!(c.query_by_tags(&["/"]).unwrap(), ids(&[4]));
        assert_eq!(c.query_by_tags::<&str>(&[]).unwrap(), ids(&[4]));
    }

    #[test]
    fn test_missing_tag() {
        let err = catalog().query_by_tags(&["x", "nope"]).unwrap_err();
        assert!(matches!(err, TagDbError::TagNotFound(ref t) if t == "nope"));
    }

    #[test]
    fn test_missing_tag_after_empty_intersection_still_reported() {
        // x ∩ z is already empty, but "nope" must still surface
        let err = catalog().query_by_tags(&["x", "z", "nope"]).unwrap_err();
        assert!(matches!(err, TagDbError::TagNotFound(ref t) if t == "nope"));
    }

    #[test]
    fn test_first_missing_tag_wins() {
        let err = catalog().query_by_tags(&["first", "second"]).unwrap_err();
        assert!(matches!(err, TagDbError::TagNotFound(ref t) if t == "first"));
    }

    #[test]
    fn test_empty_bucket_is_not_missing() {
        let mut c = catalog();
        c.ensure_bucket("empty");
        assert!(c.query_by_tags(&["empty"]).unwrap().is_empty());
    }
}
