//! Synchronized record driver.
//!
//! # Responsibility
//! - Serialize records to indented JSON and persist them crash-atomically.
//! - Read single records, scan whole collections, delete records or
//!   collections.
//! - Serialize mutations per collection through the lock registry.
//!
//! # Invariants
//! - At most one write/delete per collection runs at a time in this process.
//! - A record file is only ever replaced by renaming a fully written staging
//!   file onto it, so readers never see partial content.
//! - Locks are released on every exit path (guards are scoped).
//!
//! Generated ids are only unique within one process: nothing fences two
//! processes writing the same collection.

use super::error::{IoOp, StoreError, StoreResult};
use super::lock::{acquire, LockRegistry};
use super::options::DriverOptions;
use super::path::{
    classify_file_name, clean_root, ensure_dir, validate_collection, validate_resource,
    EntryKind, StoreLayout,
};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

static GENERATED_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid generated id regex"));

/// Handle to one store root.
///
/// `Driver` is `Send + Sync`; share it across threads by reference or `Arc`.
#[derive(Debug)]
pub struct Driver {
    layout: StoreLayout,
    options: DriverOptions,
    locks: LockRegistry,
}

impl Driver {
    /// Opens (or creates) the store rooted at `root`.
    ///
    /// # Errors
    /// - `InvalidStoreLocation` when `root` is empty or exists as a non-directory.
    /// - `Io` when the directory cannot be created.
    pub fn open(root: impl AsRef<Path>, options: DriverOptions) -> StoreResult<Self> {
        let started_at = Instant::now();
        let root = clean_root(root.as_ref())?;

        let created = match ensure_dir(&root, options.dir_mode) {
            Ok(created) => created,
            Err(err) => {
                error!(
                    "event=store_open module=store status=error root={} duration_ms={} error_code={} error={}",
                    root.display(),
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=store_open module=store status=ok mode={} root={} duration_ms={}",
            if created { "created" } else { "reused" },
            root.display(),
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            layout: StoreLayout::new(root),
            options,
            locks: LockRegistry::new(),
        })
    }

    /// Opens the store with `DriverOptions::default()`.
    pub fn open_default(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(root, DriverOptions::default())
    }

    /// Cleaned absolute store root.
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Number of collections that have a lock allocated.
    pub fn tracked_collections(&self) -> usize {
        self.locks.len()
    }

    /// Writes `value` as `<collection>/<resource>.json`, replacing any prior record.
    ///
    /// # Errors
    /// - `MissingCollection` / `MissingResource` / `InvalidName` before any I/O.
    /// - `Serialization` before any filesystem mutation.
    /// - `Io` when creating the collection, staging, or renaming fails.
    pub fn write<T>(&self, collection: &str, resource: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + ?Sized,
    {
        validate_collection(collection)?;
        validate_resource(resource)?;

        let lock = self.locks.handle(collection);
        let _guard = acquire(&lock);
        self.write_locked(collection, resource, value)
    }

    /// Writes `value` under the next numeric id of `collection` and returns the id.
    ///
    /// The id is one more than the largest all-digit resource name present
    /// (starting at 1), zero-padded to `DriverOptions::id_width`.
    pub fn write_with_generated_id<T>(&self, collection: &str, value: &T) -> StoreResult<String>
    where
        T: Serialize + ?Sized,
    {
        validate_collection(collection)?;

        let lock = self.locks.handle(collection);
        let _guard = acquire(&lock);

        let entries = match self.scan(collection) {
            Ok(entries) => entries,
            Err(StoreError::NotFound { .. }) => Vec::new(),
            Err(err) => return Err(err),
        };
        let last = entries
            .iter()
            .filter(|(name, _)| GENERATED_ID_RE.is_match(name))
            .filter_map(|(name, _)| name.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let next = last.checked_add(1).ok_or_else(|| {
            StoreError::io(
                IoOp::Write,
                self.layout.collection_dir(collection),
                io::Error::other("generated id space exhausted"),
            )
        })?;
        let id = format!("{next:0width$}", width = self.options.id_width);

        self.write_locked(collection, &id, value)?;
        Ok(id)
    }

    /// Reads `<collection>/<resource>.json` into a `T`.
    ///
    /// # Errors
    /// - `NotFound` when the record does not exist.
    /// - `Deserialization` when the stored JSON does not fit `T`.
    pub fn read<T>(&self, collection: &str, resource: &str) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        validate_collection(collection)?;
        validate_resource(resource)?;

        let lock = self.options.lock_reads.then(|| self.locks.handle(collection));
        let _guard = lock.as_ref().map(acquire);

        let path = self.layout.resource_path(collection, resource);
        let bytes = fs::read(&path).map_err(|err| StoreError::from_io(IoOp::Read, &path, err))?;
        let value = serde_json::from_slice(&bytes).map_err(|source| {
            warn!(
                "event=record_read module=store status=warn collection={} resource={} error_code=deserialization_failed error={}",
                collection, resource, source
            );
            StoreError::Deserialization {
                path: path.clone(),
                source,
            }
        })?;

        debug!(
            "event=record_read module=store status=ok collection={} resource={} bytes={}",
            collection,
            resource,
            bytes.len()
        );
        Ok(value)
    }

    /// Returns whether `<collection>/<resource>.json` exists.
    pub fn exists(&self, collection: &str, resource: &str) -> StoreResult<bool> {
        validate_collection(collection)?;
        validate_resource(resource)?;

        let path = self.layout.resource_path(collection, resource);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) => match StoreError::from_io(IoOp::Stat, path, err) {
                StoreError::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    /// Returns resource names of `collection`, sorted by file name.
    ///
    /// # Errors
    /// - `NotFound` when the collection directory does not exist.
    pub fn list(&self, collection: &str) -> StoreResult<Vec<String>> {
        validate_collection(collection)?;

        let lock = self.options.lock_reads.then(|| self.locks.handle(collection));
        let _guard = lock.as_ref().map(acquire);

        Ok(self
            .scan(collection)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Returns every raw JSON document of `collection`, ordered by file name.
    ///
    /// An absent collection is `NotFound`, not an empty result. Any single
    /// read failure aborts the scan.
    pub fn read_all(&self, collection: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .read_all_entries(collection)?
            .into_iter()
            .map(|(_, document)| document)
            .collect())
    }

    /// Like `read_all`, deserializing each document into `T`.
    ///
    /// Fails without partial results on the first malformed document.
    pub fn read_all_as<T>(&self, collection: &str) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.read_all_entries(collection)?
            .into_iter()
            .map(|(path, document)| {
                serde_json::from_str(&document)
                    .map_err(|source| StoreError::Deserialization { path, source })
            })
            .collect()
    }

    /// Deletes one record, or the whole collection when `resource` is empty.
    ///
    /// # Errors
    /// - `NotFound` when the record or collection does not exist.
    pub fn delete(&self, collection: &str, resource: &str) -> StoreResult<()> {
        if resource.is_empty() {
            return self.delete_collection(collection);
        }
        validate_collection(collection)?;
        validate_resource(resource)?;

        let started_at = Instant::now();
        let lock = self.locks.handle(collection);
        let _guard = acquire(&lock);

        let path = self.layout.resource_path(collection, resource);
        fs::remove_file(&path).map_err(|err| {
            let err = StoreError::from_io(IoOp::Remove, &path, err);
            if !err.is_not_found() {
                error!(
                    "event=record_delete module=store status=error collection={} resource={} error_code={} error={}",
                    collection, resource, err.code(), err
                );
            }
            err
        })?;

        debug!(
            "event=record_delete module=store status=ok collection={} resource={} duration_ms={}",
            collection,
            resource,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Removes the collection directory and everything in it.
    pub fn delete_collection(&self, collection: &str) -> StoreResult<()> {
        validate_collection(collection)?;

        let started_at = Instant::now();
        let lock = self.locks.handle(collection);
        let _guard = acquire(&lock);

        let dir = self.layout.collection_dir(collection);
        let meta = fs::metadata(&dir).map_err(|err| StoreError::from_io(IoOp::Stat, &dir, err))?;
        if !meta.is_dir() {
            return Err(StoreError::NotFound { path: dir });
        }
        fs::remove_dir_all(&dir).map_err(|err| {
            let err = StoreError::from_io(IoOp::Remove, &dir, err);
            error!(
                "event=collection_delete module=store status=error collection={} error_code={} error={}",
                collection,
                err.code(),
                err
            );
            err
        })?;

        info!(
            "event=collection_delete module=store status=ok collection={} duration_ms={}",
            collection,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn read_all_entries(&self, collection: &str) -> StoreResult<Vec<(PathBuf, String)>> {
        validate_collection(collection)?;

        let lock = self.options.lock_reads.then(|| self.locks.handle(collection));
        let _guard = lock.as_ref().map(acquire);

        let entries = self.scan(collection)?;
        let mut documents = Vec::with_capacity(entries.len());
        for (_, path) in entries {
            let bytes = fs::read(&path).map_err(|err| StoreError::io(IoOp::Read, &path, err))?;
            let document = match String::from_utf8(bytes) {
                Ok(document) => document,
                Err(err) => {
                    return Err(StoreError::Deserialization {
                        source: serde::de::Error::custom(err),
                        path,
                    })
                }
            };
            documents.push((path, document));
        }

        debug!(
            "event=collection_read module=store status=ok collection={} records={}",
            collection,
            documents.len()
        );
        Ok(documents)
    }

    /// Lists record files of `collection` as `(resource, path)` sorted by file name.
    fn scan(&self, collection: &str) -> StoreResult<Vec<(String, PathBuf)>> {
        let dir = self.layout.collection_dir(collection);
        let read_dir =
            fs::read_dir(&dir).map_err(|err| StoreError::from_io(IoOp::ListDir, &dir, err))?;

        let mut records = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|err| StoreError::io(IoOp::ListDir, &dir, err))?;
            let file_type = entry
                .file_type()
                .map_err(|err| StoreError::io(IoOp::Stat, entry.path(), err))?;
            if !file_type.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                warn!(
                    "event=collection_scan module=store status=warn collection={} reason=non_utf8_file_name path={}",
                    collection,
                    entry.path().display()
                );
                continue;
            };
            match classify_file_name(file_name) {
                EntryKind::Record(name) => {
                    records.push((file_name.to_string(), name, entry.path()))
                }
                EntryKind::Staging => warn!(
                    "event=collection_scan module=store status=warn collection={} reason=stale_staging_file path={}",
                    collection,
                    entry.path().display()
                ),
                EntryKind::Other => {}
            }
        }

        records.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(records
            .into_iter()
            .map(|(_, name, path)| (name, path))
            .collect())
    }

    fn write_locked<T>(&self, collection: &str, resource: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + ?Sized,
    {
        let started_at = Instant::now();
        let bytes = self.encode(value)?;

        let result = self.persist(collection, resource, &bytes);
        match &result {
            Ok(()) => debug!(
                "event=record_write module=store status=ok collection={} resource={} bytes={} duration_ms={}",
                collection,
                resource,
                bytes.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=record_write module=store status=error collection={} resource={} error_code={} error={}",
                collection,
                resource,
                err.code(),
                err
            ),
        }
        result
    }

    fn encode<T>(&self, value: &T) -> StoreResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let indent = self.options.indent_bytes();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
        let mut bytes = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
        value
            .serialize(&mut serializer)
            .map_err(StoreError::Serialization)?;
        Ok(bytes)
    }

    fn persist(&self, collection: &str, resource: &str, bytes: &[u8]) -> StoreResult<()> {
        let dir = self.layout.collection_dir(collection);
        match ensure_dir(&dir, self.options.dir_mode) {
            Ok(_) => {}
            Err(StoreError::InvalidStoreLocation { path }) => {
                return Err(StoreError::io(
                    IoOp::CreateDir,
                    path,
                    io::Error::other("collection path exists and is not a directory"),
                ))
            }
            Err(err) => return Err(err),
        }

        let staging = self.layout.staging_path(collection, resource);
        let final_path = self.layout.resource_path(collection, resource);

        if let Err(err) = self.stage(&staging, bytes) {
            discard_staging(&staging);
            return Err(err);
        }
        if let Err(err) = fs::rename(&staging, &final_path) {
            discard_staging(&staging);
            return Err(StoreError::io(IoOp::Rename, final_path, err));
        }
        Ok(())
    }

    fn stage(&self, staging: &Path, bytes: &[u8]) -> StoreResult<()> {
        let mut file =
            File::create(staging).map_err(|err| StoreError::io(IoOp::Write, staging, err))?;
        file.write_all(bytes)
            .map_err(|err| StoreError::io(IoOp::Write, staging, err))?;
        if self.options.sync_writes {
            file.sync_all()
                .map_err(|err| StoreError::io(IoOp::Sync, staging, err))?;
        }
        Ok(())
    }
}

fn discard_staging(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            "event=staging_cleanup module=store status=warn path={} error={}",
            staging.display(),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::Driver;
    use crate::store::options::DriverOptions;
    use serde_json::json;

    #[test]
    fn encode_honours_indent_option() {
        let dir = tempfile::tempdir().unwrap();
        let tabs = Driver::open(dir.path(), DriverOptions::new().with_indent(0)).unwrap();
        let encoded = tabs.encode(&json!({"name": "onefish"})).unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            "{\n\t\"name\": \"onefish\"\n}"
        );

        let spaces = Driver::open(dir.path(), DriverOptions::new().with_indent(4)).unwrap();
        let encoded = spaces.encode(&json!({"name": "onefish"})).unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            "{\n    \"name\": \"onefish\"\n}"
        );
    }

    #[test]
    fn reads_do_not_allocate_locks_unless_strict() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Driver::open_default(dir.path()).unwrap();
        let _ = driver.read::<serde_json::Value>("fish", "onefish");
        assert_eq!(driver.tracked_collections(), 0);

        let strict = Driver::open(dir.path(), DriverOptions::new().with_lock_reads(true)).unwrap();
        let _ = strict.read::<serde_json::Value>("fish", "onefish");
        assert_eq!(strict.tracked_collections(), 1);
    }
}
