//! Error types for the tag engine

use thiserror::Error;

use crate::catalog::{FileId, Tag};

pub type Result<T> = std::result::Result<T, TagDbError>;

#[derive(Error, Debug)]
pub enum TagDbError {
    #[error("Tag not found: {0}")]
    TagNotFound(Tag),

    #[error("No such file: {0}")]
    NoSuchFile(String),

    #[error("Cannot distinguish files: {}", format_ids(.0))]
    NoUniqueMatch(Vec<FileId>),

    #[error("Path is both a file and a directory: /{}", .0.join("/"))]
    NameConflict(Vec<Tag>),

    #[error("Invalid tag: {0:?}")]
    InvalidTag(Tag),

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("Invalid target: {0} (expected file, dir or unsure)")]
    InvalidTarget(String),

    #[error("Unknown file id: {0}")]
    UnknownFile(FileId),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidFormat(String),
}

fn format_ids(ids: &[FileId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl TagDbError {
    /// Get error code for the protocol adapter
    pub fn code(&self) -> &'static str {
        match self {
            TagDbError::TagNotFound(_) => "TAG_NOT_FOUND",
            TagDbError::NoSuchFile(_) => "NO_SUCH_FILE",
            TagDbError::NoUniqueMatch(_) => "NO_UNIQUE_MATCH",
            TagDbError::NameConflict(_) => "NAME_CONFLICT",
            TagDbError::InvalidTag(_) => "INVALID_TAG",
            TagDbError::InvalidName(_) => "INVALID_NAME",
            TagDbError::InvalidTarget(_) => "INVALID_TARGET",
            TagDbError::UnknownFile(_) => "UNKNOWN_FILE",
            TagDbError::DirectoryNotEmpty(_) => "DIRECTORY_NOT_EMPTY",
            TagDbError::InvalidFormat(_) => "INVALID_SNAPSHOT",
            _ => "INTERNAL_ERROR",
        }
    }

    /// POSIX status a filesystem adapter should report for this error.
    ///
    /// Lookup misses are `ENOENT`. An ambiguous lookup is reported as
    /// `EISDIR`, the closest "this path names more than one thing" status.
    pub fn errno(&self) -> i32 {
        const ENOENT: i32 = 2;
        const EIO: i32 = 5;
        const EEXIST: i32 = 17;
        const EISDIR: i32 = 21;
        const EINVAL: i32 = 22;
        const ENOTEMPTY: i32 = 39;

        match self {
            TagDbError::TagNotFound(_)
            | TagDbError::NoSuchFile(_)
            | TagDbError::UnknownFile(_) => ENOENT,
            TagDbError::NoUniqueMatch(_) => EISDIR,
            TagDbError::NameConflict(_) => EEXIST,
            TagDbError::InvalidTag(_)
            | TagDbError::InvalidName(_)
            | TagDbError::InvalidTarget(_) => EINVAL,
            TagDbError::DirectoryNotEmpty(_) => ENOTEMPTY,
            _ => EIO,
        }
    }

    /// True for the "nothing lives at this path" outcomes.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TagDbError::TagNotFound(_) | TagDbError::NoSuchFile(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(TagDbError::TagNotFound("x".into()).code(), "TAG_NOT_FOUND");
        assert_eq!(TagDbError::NoSuchFile("/x/n".into()).code(), "NO_SUCH_FILE");
        assert_eq!(TagDbError::NoUniqueMatch(vec![]).code(), "NO_UNIQUE_MATCH");
        assert_eq!(TagDbError::NameConflict(vec![]).code(), "NAME_CONFLICT");
        assert_eq!(TagDbError::InvalidTarget("both".into()).code(), "INVALID_TARGET");
        assert_eq!(TagDbError::InvalidTag("".into()).code(), "INVALID_TAG");
        assert_eq!(TagDbError::InvalidName("a/b".into()).code(), "INVALID_NAME");

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(TagDbError::from(io).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(TagDbError::TagNotFound("x".into()).errno(), 2);
        assert_eq!(TagDbError::NoSuchFile("n".into()).errno(), 2);
        assert_eq!(TagDbError::NoUniqueMatch(vec![FileId(1)]).errno(), 21);
        assert_eq!(TagDbError::DirectoryNotEmpty("/x".into()).errno(), 39);
        assert_eq!(TagDbError::InvalidTag("a/b".into()).errno(), 22);
        assert_eq!(TagDbError::InvalidName(String::new()).errno(), 22);
    }

    #[test]
    fn test_display_messages() {
        let err = TagDbError::NameConflict(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Path is both a file and a directory: /a/b");

        let err = TagDbError::NoUniqueMatch(vec![FileId(1), FileId(2)]);
        assert_eq!(
            err.to_string(),
            "Cannot distinguish files: 00000000000000000000000000000001, 00000000000000000000000000000002"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(TagDbError::TagNotFound("x".into()).is_not_found());
        assert!(TagDbError::NoSuchFile("x".into()).is_not_found());
        assert!(!TagDbError::NoUniqueMatch(vec![]).is_not_found());
    }
}
