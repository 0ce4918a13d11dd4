// Sales Ledger - the single source of truth for sale records
//
// Durable form: a pretty-printed JSON array, rewritten through a temp file
// + rename on every append. Every mutation goes through `write_lock`;
// readers take the committed snapshot without touching the disk.
// An open ledger holds an exclusive lock on `<file>.lock`, so a second
// process (the CLI next to a running server) cannot write behind its back.

use crate::record::Record;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// ERRORS
// ============================================================================

/// Durable store failures
///
/// At startup any of these is fatal. After startup a failed append is
/// reported to the caller and the ledger keeps its previous state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read ledger {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ledger {} is not a JSON array of sales: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ledger {}: record #{index} is invalid: {reason}", .path.display())]
    Invalid {
        path: PathBuf,
        index: usize,
        reason: String,
    },

    #[error("ledger {} is in use by another process", .path.display())]
    Locked { path: PathBuf },

    #[error("record rejected: {0}")]
    Rejected(String),

    #[error("failed to write ledger {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

// ============================================================================
// LEDGER
// ============================================================================

/// Append-only, ordered, durable collection of records
///
/// Construct once at startup and share it (`Arc<Ledger>`) with every
/// adapter. `append` calls are totally ordered; `list_all` reflects every
/// append that returned `Ok` before it was called.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    // released when the ledger is dropped
    _lock: File,
    write_lock: Mutex<()>,
    committed: RwLock<Arc<Vec<Record>>>,
}

impl Ledger {
    /// Open the ledger at `path`, creating an empty store if none exists
    ///
    /// An unreadable or corrupt store is an error, never silently
    /// replaced by an empty one. Fails with `StorageError::Locked` while
    /// another `Ledger` (in this or any process) has the same file open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        fs::create_dir_all(parent_dir(&path)).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;
        let lock = acquire_lock(&path)?;

        let records = if path.exists() {
            load_records(&path)?
        } else {
            write_atomically(&path, &[])?;
            info!(path = %path.display(), "created empty ledger");
            Vec::new()
        };

        info!(path = %path.display(), records = records.len(), "ledger opened");

        Ok(Ledger {
            path,
            _lock: lock,
            write_lock: Mutex::new(()),
            committed: RwLock::new(Arc::new(records)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every committed record, in append order
    pub fn list_all(&self) -> Vec<Record> {
        self.snapshot().as_ref().clone()
    }

    /// Shared view of the committed records (no copy)
    pub fn snapshot(&self) -> Arc<Vec<Record>> {
        let guard = self
            .committed
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durably add one record to the end of the ledger
    ///
    /// Either the file and the in-memory view both gain the record, or
    /// neither does.
    pub fn append(&self, record: Record) -> Result<(), StorageError> {
        self.append_all(vec![record]).map(|_| ())
    }

    /// Durably add several records as one transaction
    ///
    /// Returns how many were appended. All records are validated before
    /// anything is written.
    pub fn append_all(&self, records: Vec<Record>) -> Result<usize, StorageError> {
        for record in &records {
            record.validate().map_err(StorageError::Rejected)?;
        }
        if records.is_empty() {
            return Ok(0);
        }

        let _writer = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current = self.snapshot();
        let mut next = Vec::with_capacity(current.len() + records.len());
        next.extend(current.iter().cloned());
        next.extend(records.iter().cloned());

        if let Err(e) = write_atomically(&self.path, &next) {
            warn!(path = %self.path.display(), error = %e, "append failed, ledger unchanged");
            return Err(e);
        }

        *self
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        for record in &records {
            info!(
                id = %record.id,
                item = %record.item,
                total = %record.total,
                source = record.source.name(),
                "sale appended"
            );
        }

        Ok(records.len())
    }
}

/// Read the committed records without opening the ledger for writing
///
/// Does not take the writer lock, so it works next to a running server.
/// A missing store reads as empty.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>, StorageError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    load_records(path)
}

// ============================================================================
// DURABLE STORE
// ============================================================================

fn acquire_lock(path: &Path) -> Result<File, StorageError> {
    let lock_path = sibling(path, ".lock");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|source| StorageError::Read {
            path: lock_path.clone(),
            source,
        })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            warn!(path = %path.display(), "ledger already locked");
            Err(StorageError::Locked {
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(StorageError::Read {
            path: lock_path,
            source,
        }),
    }
}

fn load_records(path: &Path) -> Result<Vec<Record>, StorageError> {
    let text = fs::read_to_string(path).map_err(|source| StorageError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let records: Vec<Record> =
        serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    for (index, record) in records.iter().enumerate() {
        record.validate().map_err(|reason| StorageError::Invalid {
            path: path.to_path_buf(),
            index,
            reason,
        })?;
    }

    Ok(records)
}

/// Write the full ledger next to `path`, fsync, then rename over it
fn write_atomically(path: &Path, records: &[Record]) -> Result<(), StorageError> {
    let mut json = serde_json::to_vec_pretty(records)?;
    json.push(b'\n');

    let tmp = sibling(path, ".tmp");
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path))
        .and_then(|_| sync_dir(parent_dir(path)));

    if let Err(source) = written {
        let _ = fs::remove_file(&tmp);
        return Err(StorageError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!(path = %path.display(), records = records.len(), bytes = json.len(), "ledger written");
    Ok(())
}

/// Persist the rename itself
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "ledger".into());
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Grammar;
    use crate::record::{Amount, Source};
    use tempfile::tempdir;

    fn sale(line: &str) -> Record {
        Grammar::ItemQtyPrice.parse(line, Source::Cli).unwrap()
    }

    #[test]
    fn test_open_creates_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.json");

        let ledger = Ledger::open(&path).unwrap();

        assert!(ledger.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[test]
    fn test_open_creates_missing_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("shop").join("sales.json");

        Ledger::open(&path).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_append_then_list_has_record_last_exactly_once() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("sales.json")).unwrap();

        ledger.append(sale("Apple, 5, 2000")).unwrap();
        let banana = sale("Banana, 2, 500");
        ledger.append(banana.clone()).unwrap();

        let all = ledger.list_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all.last(), Some(&banana));
        assert_eq!(all.iter().filter(|r| r.id == banana.id).count(), 1);
    }

    #[test]
    fn test_reopen_reproduces_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.json");

        let written = {
            let ledger = Ledger::open(&path).unwrap();
            ledger.append(sale("Apple, 5, 2000")).unwrap();
            ledger.append(sale("Mango, 1, 3500")).unwrap();
            ledger
                .append(Grammar::ItemAmount.parse("tea, 1.25", Source::Bot).unwrap())
                .unwrap();
            ledger.list_all()
        };

        let reopened = Ledger::open(&path).unwrap();
        assert_eq!(reopened.list_all(), written);
        assert_eq!(reopened.list_all()[2].price, Amount::Decimal(1.25));
    }

    #[test]
    fn test_corrupt_store_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Ledger::open(&path).unwrap_err();

        assert!(matches!(err, StorageError::Corrupt { .. }));
        // the broken file is left alone for inspection
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_inconsistent_record_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.json");
        let mut record = sale("Apple, 5, 2000");
        record.total = Amount::Whole(1);
        fs::write(&path, serde_json::to_string(&vec![record]).unwrap()).unwrap();

        let err = Ledger::open(&path).unwrap_err();

        assert!(matches!(err, StorageError::Invalid { index: 0, .. }));
    }

    #[test]
    fn test_unreadable_store_fails_fast() {
        let dir = tempdir().unwrap();
        // a directory where the file should be
        let path = dir.path().join("sales.json");
        fs::create_dir(&path).unwrap();

        let err = Ledger::open(&path).unwrap_err();

        assert!(matches!(err, StorageError::Read { .. }));
    }

    #[test]
    fn test_failed_write_leaves_ledger_unchanged() {
        let dir = tempdir().unwrap();
        let store_dir = dir.path().join("store");
        let ledger = Ledger::open(store_dir.join("sales.json")).unwrap();
        ledger.append(sale("Apple, 5, 2000")).unwrap();
        let before = ledger.list_all();

        fs::remove_dir_all(&store_dir).unwrap();
        let err = ledger.append(sale("Pear, 1, 100")).unwrap_err();

        assert!(matches!(err, StorageError::Write { .. }));
        assert_eq!(ledger.list_all(), before);
    }

    #[test]
    fn test_invalid_record_rejected_before_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.json");
        let ledger = Ledger::open(&path).unwrap();
        let mut record = sale("Apple, 5, 2000");
        record.item = "   ".to_string();

        let err = ledger.append(record).unwrap_err();

        assert!(matches!(err, StorageError::Rejected(_)));
        assert!(ledger.is_empty());
        assert!(read_records(&path).unwrap().is_empty());
    }

    #[test]
    fn test_append_all_is_one_transaction() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("sales.json")).unwrap();
        let mut bad = sale("Pear, 1, 100");
        bad.total = Amount::Whole(7);

        let err = ledger
            .append_all(vec![sale("Apple, 5, 2000"), bad])
            .unwrap_err();

        assert!(matches!(err, StorageError::Rejected(_)));
        assert!(ledger.is_empty());

        let added = ledger
            .append_all(vec![sale("Apple, 5, 2000"), sale("Pear, 1, 100")])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_second_open_is_refused_while_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.json");
        let server = Ledger::open(&path).unwrap();

        let err = Ledger::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::Locked { .. }));

        // the holder keeps writing, nothing is lost behind its back
        server.append(sale("BotSale, 1, 100")).unwrap();
        assert_eq!(read_records(&path).unwrap().len(), 1);

        drop(server);
        let cli = Ledger::open(&path).unwrap();
        cli.append(sale("CliSale, 1, 100")).unwrap();
        let items: Vec<_> = cli.list_all().into_iter().map(|r| r.item).collect();
        assert_eq!(items, ["BotSale", "CliSale"]);
    }

    #[test]
    fn test_read_records_without_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.json");
        assert!(read_records(&path).unwrap().is_empty());

        let ledger = Ledger::open(&path).unwrap();
        ledger.append(sale("Apple, 5, 2000")).unwrap();

        assert_eq!(read_records(&path).unwrap(), ledger.list_all());
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("sales.json")), Path::new("."));
        assert_eq!(parent_dir(Path::new("data/sales.json")), Path::new("data"));
        sync_dir(parent_dir(Path::new("sales.json"))).unwrap();
    }

    #[test]
    fn test_store_is_human_readable_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.json");
        let ledger = Ledger::open(&path).unwrap();
        ledger.append(sale("ស្វាយ, 2, 1000")).unwrap();

        let text = fs::read_to_string(&path).unwrap();

        assert!(text.contains("\"item\": \"ស្វាយ\""));
        assert!(!sibling(&path, ".tmp").exists());
    }
}
