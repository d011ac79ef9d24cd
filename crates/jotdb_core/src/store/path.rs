//! Key-to-path mapping for the store layout.
//!
//! # Responsibility
//! - Resolve `(collection, resource)` keys to `<root>/<collection>/<resource>.json`.
//! - Reject empty keys and names that could escape the store root.
//! - Create directories on demand.
//!
//! # Invariants
//! - Every path returned here is a child of the cleaned root.
//! - Validation happens before any filesystem access.

use super::error::{IoOp, NameKind, StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::DirBuilder;
use std::path::{Component, Path, PathBuf};

/// Extension of persisted records.
pub const RECORD_EXTENSION: &str = "json";
/// Suffix appended to a record path while it is being staged.
pub const STAGING_SUFFIX: &str = ".tmp";

static FORBIDDEN_NAME_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[/\\\x00]").expect("valid forbidden name regex"));

/// Makes `path` absolute and removes `.`/`..` segments lexically.
pub fn clean_root(path: &Path) -> StoreResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(StoreError::InvalidStoreLocation {
            path: path.to_path_buf(),
        });
    }
    let absolute =
        std::path::absolute(path).map_err(|err| StoreError::io(IoOp::Stat, path, err))?;
    Ok(lexical_clean(&absolute))
}

fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(cleaned.components().next_back(), Some(Component::Normal(_))) {
                    cleaned.pop();
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

pub fn validate_collection(name: &str) -> StoreResult<()> {
    validate_name(NameKind::Collection, name)
}

pub fn validate_resource(name: &str) -> StoreResult<()> {
    validate_name(NameKind::Resource, name)
}

fn validate_name(kind: NameKind, name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(match kind {
            NameKind::Collection => StoreError::MissingCollection,
            NameKind::Resource => StoreError::MissingResource,
        });
    }
    if name == "." || name == ".." || FORBIDDEN_NAME_CHARS_RE.is_match(name) {
        return Err(StoreError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Path layout rooted at one store directory.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    pub fn resource_path(&self, collection: &str, resource: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{resource}.{RECORD_EXTENSION}"))
    }

    pub fn staging_path(&self, collection: &str, resource: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{resource}.{RECORD_EXTENSION}{STAGING_SUFFIX}"))
    }
}

/// Classification of one directory entry inside a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A persisted record; carries the resource name.
    Record(String),
    /// A staging file left behind by an interrupted write.
    Staging,
    Other,
}

pub fn classify_file_name(file_name: &str) -> EntryKind {
    let record_suffix = format!(".{RECORD_EXTENSION}");
    let staging_suffix = format!("{record_suffix}{STAGING_SUFFIX}");
    if file_name.ends_with(&staging_suffix) {
        return EntryKind::Staging;
    }
    match file_name.strip_suffix(&record_suffix) {
        Some(stem) if !stem.is_empty() => EntryKind::Record(stem.to_string()),
        _ => EntryKind::Other,
    }
}

/// Creates `dir` and any missing ancestors.
///
/// Fails with `InvalidStoreLocation` when `dir` exists and is not a directory.
pub fn ensure_dir(dir: &Path, mode: u32) -> StoreResult<bool> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => return Ok(false),
        Ok(_) => {
            return Err(StoreError::InvalidStoreLocation {
                path: dir.to_path_buf(),
            })
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(StoreError::io(IoOp::Stat, dir, err)),
    }

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder
        .create(dir)
        .map_err(|err| StoreError::io(IoOp::CreateDir, dir, err))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::{
        classify_file_name, lexical_clean, validate_collection, validate_resource, EntryKind,
        StoreLayout,
    };
    use crate::store::error::{NameKind, StoreError};
    use std::path::{Path, PathBuf};

    #[test]
    fn lexical_clean_folds_dot_segments() {
        assert_eq!(
            lexical_clean(Path::new("/data/./deep//school/../fish")),
            PathBuf::from("/data/deep/fish")
        );
        assert_eq!(lexical_clean(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn empty_names_map_to_missing_errors() {
        assert!(matches!(
            validate_collection(""),
            Err(StoreError::MissingCollection)
        ));
        assert!(matches!(
            validate_resource(""),
            Err(StoreError::MissingResource)
        ));
    }

    #[test]
    fn traversal_names_are_rejected() {
        for name in ["..", ".", "a/b", "a\\b", "nul\0byte"] {
            let err = validate_resource(name).expect_err("name must be rejected");
            assert!(matches!(
                err,
                StoreError::InvalidName {
                    kind: NameKind::Resource,
                    ..
                }
            ));
        }
        validate_collection("fish.v2").expect("dots inside a name are fine");
    }

    #[test]
    fn layout_resolves_record_and_staging_paths() {
        let layout = StoreLayout::new(PathBuf::from("/db"));
        assert_eq!(
            layout.resource_path("fish", "onefish"),
            PathBuf::from("/db/fish/onefish.json")
        );
        assert_eq!(
            layout.staging_path("fish", "onefish"),
            PathBuf::from("/db/fish/onefish.json.tmp")
        );
    }

    #[test]
    fn classify_distinguishes_records_from_staging_files() {
        assert_eq!(
            classify_file_name("onefish.json"),
            EntryKind::Record("onefish".to_string())
        );
        assert_eq!(classify_file_name("onefish.json.tmp"), EntryKind::Staging);
        assert_eq!(classify_file_name("notes.txt"), EntryKind::Other);
        assert_eq!(classify_file_name(".json"), EntryKind::Other);
    }
}
