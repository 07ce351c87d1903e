//! Property tests: random mutation sequences against the catalog.
//!
//! After every operation:
//! - the record/index invariants hold (`check_integrity`);
//! - every single-tag scope, and the root scope, lists without ambiguity;
//! - every file opens from its own full path;
//! - a rejected operation leaves the encoded catalog byte-identical;
//! - tags and names that no path can reach are always refused.

use proptest::prelude::*;

use tagdb::path::join_file_path;
use tagdb::snapshot::encode;
use tagdb::{Catalog, FileId, Tag, TagDbError, Target, ROOT_TAG};

// Names and tags overlap so file/directory clashes get exercised.
const NAMES: &[&str] = &["a", "n", "x"];
const TAGS: &[&str] = &["x", "y", "z", "n", "/"];
// Neither a tag nor a name may be empty or span path components.
const UNREACHABLE: &[&str] = &["", "a/b", "x/", "/x"];

#[derive(Debug, Clone)]
enum Op {
    Create(usize, Vec<usize>),
    AddTags(usize, Vec<usize>),
    RemoveTags(usize, Vec<usize>),
    Retag(usize, Vec<usize>, Vec<usize>),
    Rename(usize, usize),
    Prune(Vec<usize>),
}

fn tag_list() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..TAGS.len(), 0..3)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..NAMES.len(), tag_list()).prop_map(|(n, t)| Op::Create(n, t)),
        2 => (any::<usize>(), tag_list()).prop_map(|(f, t)| Op::AddTags(f, t)),
        2 => (any::<usize>(), tag_list()).prop_map(|(f, t)| Op::RemoveTags(f, t)),
        1 => (any::<usize>(), tag_list(), tag_list()).prop_map(|(f, r, a)| Op::Retag(f, r, a)),
        1 => (any::<usize>(), 0..NAMES.len()).prop_map(|(f, n)| Op::Rename(f, n)),
        1 => tag_list().prop_map(Op::Prune),
    ]
}

fn tags(indices: &[usize]) -> Vec<Tag> {
    indices.iter().map(|&i| TAGS[i].to_string()).collect()
}

fn pick(catalog: &Catalog, index: usize) -> Option<FileId> {
    let ids: Vec<FileId> = catalog.files().map(|r| r.id).collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids[index % ids.len()])
    }
}

/// Apply one op; `None` when it did not apply (no files yet).
fn apply(catalog: &mut Catalog, next_id: &mut u128, op: &Op) -> Option<bool> {
    let ok = match op {
        Op::Create(name, t) => {
            *next_id += 1;
            catalog.create(FileId(*next_id), NAMES[*name], &tags(t)).is_ok()
        }
        Op::AddTags(f, t) => catalog.add_tags(pick(catalog, *f)?, &tags(t)).is_ok(),
        Op::RemoveTags(f, t) => catalog.remove_tags_by_path(pick(catalog, *f)?, &tags(t)).is_ok(),
        Op::Retag(f, r, a) => catalog.retag(pick(catalog, *f)?, &tags(r), &tags(a)).is_ok(),
        Op::Rename(f, n) => {
            let id = pick(catalog, *f)?;
            catalog.rename_file(id, NAMES[*n], &[], &[]).is_ok()
        }
        Op::Prune(t) => {
            let empty: Vec<Tag> = tags(t)
                .into_iter()
                .filter(|tag| catalog.bucket(tag).is_some_and(|b| b.is_empty()))
                .collect();
            catalog.remove_empty_tag_buckets(&empty);
            true
        }
    };
    Some(ok)
}

fn assert_addressable(catalog: &Catalog) -> Result<(), TestCaseError> {
    prop_assert!(catalog.check_integrity().is_ok());

    let mut scopes: Vec<Tag> = catalog.tags().cloned().collect();
    scopes.push(ROOT_TAG.to_string());
    for scope in &scopes {
        let ids = catalog.query_by_tags(&[scope]).unwrap();
        prop_assert!(catalog.make_unique(&ids).is_ok(), "scope {} is ambiguous", scope);
    }

    for record in catalog.files() {
        let path = join_file_path(&record.tags, &record.name);
        let resolution = catalog.resolve(&path, Target::Unsure);
        prop_assert!(resolution.is_ok(), "{} failed: {:?}", path, resolution);
        let resolution = resolution.unwrap();
        prop_assert_eq!(resolution.single_file().map(|e| e.id), Some(record.id), "{}", path);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn mutations_keep_catalog_addressable(ops in prop::collection::vec(op(), 1..40)) {
        let mut catalog = Catalog::new();
        let mut next_id = 0u128;

        for op in &ops {
            let before = encode(&catalog).unwrap();
            match apply(&mut catalog, &mut next_id, op) {
                Some(false) => {
                    prop_assert_eq!(encode(&catalog).unwrap(), before, "{:?}", op);
                }
                Some(true) | None => {}
            }
            assert_addressable(&catalog)?;
        }
    }

    #[test]
    fn snapshot_roundtrip_preserves_state(ops in prop::collection::vec(op(), 1..30)) {
        let mut catalog = Catalog::new();
        let mut next_id = 0u128;
        for op in &ops {
            apply(&mut catalog, &mut next_id, op);
        }

        let bytes = encode(&catalog).unwrap();
        let loaded = tagdb::snapshot::read_snapshot(&mut bytes.as_slice()).unwrap();
        prop_assert_eq!(&loaded, &catalog);
        prop_assert_eq!(encode(&loaded).unwrap(), bytes);
    }

    #[test]
    fn unreachable_input_is_refused(
        ops in prop::collection::vec(op(), 0..20),
        bad in 0..UNREACHABLE.len(),
        target in any::<usize>(),
    ) {
        let mut catalog = Catalog::new();
        let mut next_id = 0u128;
        for op in &ops {
            apply(&mut catalog, &mut next_id, op);
        }
        let before = encode(&catalog).unwrap();
        let bad = UNREACHABLE[bad];
        let bad_tags = vec!["y".to_string(), bad.to_string()];

        let fresh = FileId(u128::MAX);
        prop_assert!(matches!(catalog.create(fresh, "n", &bad_tags), Err(TagDbError::InvalidTag(_))));
        prop_assert!(matches!(catalog.create(fresh, bad, &[]), Err(TagDbError::InvalidName(_))));
        prop_assert!(matches!(catalog.create_tags(&bad_tags), Err(TagDbError::InvalidTag(_))));

        if let Some(id) = pick(&catalog, target) {
            prop_assert!(matches!(catalog.add_tags(id, &bad_tags), Err(TagDbError::InvalidTag(_))));
            prop_assert!(matches!(catalog.retag(id, &[], &bad_tags), Err(TagDbError::InvalidTag(_))));
            prop_assert!(matches!(
                catalog.rename_file(id, bad, &[], &[]),
                Err(TagDbError::InvalidName(_))
            ));
        }

        prop_assert_eq!(encode(&catalog).unwrap(), before);
        assert_addressable(&catalog)?;
    }
}
