//! TagDB - tag index and query-resolution engine for tag-based filesystems
//!
//! Files carry a set of tags; a path like `/work/2024/notes.txt` names the
//! file `notes.txt` tagged both `work` and `2024`, and `/work/2024/` names the
//! directory of every file carrying both tags. The engine turns such paths
//! into file sets, keeps same-named files addressable by suffixing them with
//! a distinguishing tag, and rejects any mutation that would make a file
//! unreachable.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod database;
pub mod error;
pub mod mutation;
pub mod path;
pub mod query;
pub mod snapshot;
pub mod unique;

pub use catalog::{Catalog, FileId, FileRecord, IdGenerator, Tag, ROOT_TAG};
pub use classify::Resolution;
pub use config::TagDbConfig;
pub use database::TagDb;
pub use error::{Result, TagDbError};
pub use mutation::{RemoveOutcome, RenameOutcome};
pub use path::{resolve_path, ParsedPath, Target};
pub use unique::Entry;
