//! File-backed review store
//!
//! Layout inside the data directory:
//!
//! - `pending.json`: the pending pool with its leases, replaced
//!   atomically (temp file, fsync, rename, directory fsync)
//! - `journal.jsonl`: append-only results, discards and audit entries,
//!   one JSON object per line
//! - `reviewdesk.lock`: advisory lock shared by every handle on the
//!   directory, in this process or another
//!
//! Every operation takes the directory lock (exclusive to write, shared
//! to read) and catches up with both files before it touches the
//! in-memory replica, so a CLI `load` can run next to a live server.
//!
//! A decision or discard commits as one fsynced journal line carrying
//! the result and its audit entry; the snapshot is rewritten after it.
//! A crash between the two leaves a pending document whose
//! `(record_id, lease_version)` already has a journal line, and the
//! next reader drops it. A line replayed twice counts once.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::errors::{StoreError, StoreResult};
use super::state::StoreState;
use super::{
    CasOutcome, CommitOutcome, DecisionCommit, DiscardCommit, DiscardEntry, PendingDocument,
    ResultEntry, ReviewStore,
};
use crate::audit::AuditLogEntry;
use crate::lease::Lease;
use crate::record::{RecordId, ReviewRecord};

/// Pending snapshot file name inside the data directory
pub const STORE_FILE_NAME: &str = "pending.json";

/// Append-only journal file name inside the data directory
pub const JOURNAL_FILE_NAME: &str = "journal.jsonl";

const LOCK_FILE_NAME: &str = "reviewdesk.lock";

#[derive(Debug, Default, Deserialize)]
struct PendingSnapshot {
    /// Journal length when the snapshot was written
    #[serde(default)]
    journal_len: u64,
    #[serde(default)]
    pending: BTreeMap<RecordId, PendingDocument>,
}

#[derive(Serialize)]
struct PendingSnapshotRef<'a> {
    journal_len: u64,
    pending: &'a BTreeMap<RecordId, PendingDocument>,
}

/// One journal line
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JournalEntry {
    Audit {
        entry: AuditLogEntry,
    },
    Decision {
        result: ResultEntry,
        audit: AuditLogEntry,
    },
    Discard {
        discard: DiscardEntry,
        audit: AuditLogEntry,
    },
}

/// Journal offset of a committed decision or discard
#[derive(Debug)]
struct CommitMark {
    offset: u64,
    record_id: RecordId,
    lease_version: u64,
}

/// In-memory copy of the directory, valid up to `journal_len`
#[derive(Debug, Default)]
struct Replica {
    state: StoreState,
    journal_len: u64,
    commits: Vec<CommitMark>,
}

impl Replica {
    fn apply(&mut self, offset: u64, entry: JournalEntry) {
        match entry {
            JournalEntry::Audit { entry } => self.state.audit_log.push(entry),
            JournalEntry::Decision { result, audit } => {
                if self
                    .state
                    .find_result(&result.record_id, result.lease_version)
                    .is_some()
                {
                    return;
                }
                self.mark(offset, &result.record_id, result.lease_version);
                self.state.results.push(result);
                self.state.audit_log.push(audit);
            }
            JournalEntry::Discard { discard, audit } => {
                if self
                    .state
                    .find_discard(&discard.record_id, discard.lease_version)
                    .is_some()
                {
                    return;
                }
                self.mark(offset, &discard.record_id, discard.lease_version);
                self.state.discards.push(discard);
                self.state.audit_log.push(audit);
            }
        }
    }

    fn mark(&mut self, offset: u64, record_id: &RecordId, lease_version: u64) {
        self.commits.push(CommitMark {
            offset,
            record_id: record_id.clone(),
            lease_version,
        });
    }

    /// Adopt `snapshot` as the pending pool, dropping documents settled
    /// by journal lines the snapshot predates
    fn settle(&mut self, snapshot: PendingSnapshot) {
        let mut pending = snapshot.pending;
        let first = self
            .commits
            .partition_point(|mark| mark.offset < snapshot.journal_len);
        for mark in &self.commits[first..] {
            let settled = pending
                .get(&mark.record_id)
                .is_some_and(|doc| doc.lease_version == mark.lease_version);
            if settled {
                debug!(
                    record_id = %mark.record_id,
                    lease_version = mark.lease_version,
                    "dropping pending document already committed in journal"
                );
                pending.remove(&mark.record_id);
            }
        }
        self.state.pending = pending;
    }
}

/// What a mutation needs written
struct Staged<T> {
    out: T,
    journal: Option<JournalEntry>,
    pending_changed: bool,
}

impl<T> Staged<T> {
    fn unchanged(out: T) -> Self {
        Self {
            out,
            journal: None,
            pending_changed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Held directory lock; released on drop
struct DirLock<'a> {
    file: &'a File,
}

impl Drop for DirLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(self.file) {
            warn!(error = %e, "failed to release store lock");
        }
    }
}

/// Durable store persisted as a pending snapshot plus a journal
#[derive(Debug)]
pub struct FileReviewStore {
    dir: PathBuf,
    snapshot_path: PathBuf,
    temp_path: PathBuf,
    journal_path: PathBuf,
    lock_path: PathBuf,
    lock_file: File,
    replica: Mutex<Replica>,
}

impl FileReviewStore {
    /// Open the store in `data_dir`, creating an empty one if absent
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)?;

        let lock_path = dir.join(LOCK_FILE_NAME);
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        let store = Self {
            dir: dir.to_path_buf(),
            snapshot_path: dir.join(STORE_FILE_NAME),
            temp_path: dir.join(format!("{}.tmp", STORE_FILE_NAME)),
            journal_path: dir.join(JOURNAL_FILE_NAME),
            lock_path,
            lock_file,
            replica: Mutex::new(Replica::default()),
        };

        {
            let mut replica = store.replica.lock().map_err(|_| StoreError::poisoned())?;
            let _lock = store.lock(LockMode::Exclusive)?;
            store.catch_up(&mut replica, LockMode::Exclusive)?;
            debug!(
                path = %store.dir.display(),
                pending = replica.state.pending.len(),
                journal_len = replica.journal_len,
                "opened review store"
            );
        }

        Ok(store)
    }

    /// Path of the pending snapshot
    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Path of the append-only journal
    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Write the pending snapshot, creating it if needed
    pub fn sync(&self) -> StoreResult<()> {
        self.mutate(|_| Staged {
            out: (),
            journal: None,
            pending_changed: true,
        })
    }

    fn lock(&self, mode: LockMode) -> StoreResult<DirLock<'_>> {
        let locked = match mode {
            LockMode::Shared => fs2::FileExt::lock_shared(&self.lock_file),
            LockMode::Exclusive => fs2::FileExt::lock_exclusive(&self.lock_file),
        };
        locked.map_err(|e| {
            StoreError::Unavailable(format!("cannot lock {}: {}", self.lock_path.display(), e))
        })?;
        Ok(DirLock {
            file: &self.lock_file,
        })
    }

    /// Bring the replica up to date with the files. On failure the
    /// replica is dropped so the next operation reloads from scratch.
    fn catch_up(&self, replica: &mut Replica, mode: LockMode) -> StoreResult<()> {
        let result = self.refresh(replica, mode);
        if result.is_err() {
            *replica = Replica::default();
        }
        result
    }

    fn refresh(&self, replica: &mut Replica, mode: LockMode) -> StoreResult<()> {
        let on_disk = match fs::metadata(&self.journal_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        if on_disk < replica.journal_len {
            warn!(
                path = %self.journal_path.display(),
                on_disk,
                seen = replica.journal_len,
                "journal shrank, reloading"
            );
            *replica = Replica::default();
        }
        if on_disk > replica.journal_len {
            self.read_journal(replica, mode)?;
        }

        let snapshot = self.read_snapshot()?;
        replica.settle(snapshot);
        Ok(())
    }

    fn read_journal(&self, replica: &mut Replica, mode: LockMode) -> StoreResult<()> {
        let mut file = File::open(&self.journal_path)?;
        file.seek(SeekFrom::Start(replica.journal_len))?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                return Ok(());
            }
            if !line.ends_with('\n') {
                return self.drop_torn_tail(replica.journal_len, mode);
            }

            let offset = replica.journal_len;
            let entry: JournalEntry = serde_json::from_str(line.trim_end()).map_err(|e| {
                StoreError::Corrupted(format!("{} at byte {}: {}", JOURNAL_FILE_NAME, offset, e))
            })?;
            replica.apply(offset, entry);
            replica.journal_len += read as u64;
        }
    }

    /// A line without its newline is a write that never finished.
    /// Readers skip it; a writer cuts it off before appending.
    fn drop_torn_tail(&self, valid_len: u64, mode: LockMode) -> StoreResult<()> {
        warn!(path = %self.journal_path.display(), valid_len, "torn journal tail");
        if mode == LockMode::Exclusive {
            let file = OpenOptions::new().write(true).open(&self.journal_path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(())
    }

    fn read_snapshot(&self) -> StoreResult<PendingSnapshot> {
        match fs::read(&self.snapshot_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::Corrupted(format!("{}: {}", STORE_FILE_NAME, e))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PendingSnapshot::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn append(&self, entry: &JournalEntry, fresh: bool) -> StoreResult<u64> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)?;
        file.write_all(&line)?;
        file.sync_data()?;

        if fresh {
            self.sync_dir();
        }
        Ok(line.len() as u64)
    }

    fn write_snapshot(&self, replica: &Replica) -> StoreResult<()> {
        let content = serde_json::to_vec(&PendingSnapshotRef {
            journal_len: replica.journal_len,
            pending: &replica.state.pending,
        })?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)?;
        file.write_all(&content)?;
        file.sync_all()?;

        fs::rename(&self.temp_path, &self.snapshot_path)?;
        self.sync_dir();
        Ok(())
    }

    fn sync_dir(&self) {
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }
    }

    /// Journal first, snapshot second
    fn persist(
        &self,
        replica: &mut Replica,
        journal: Option<JournalEntry>,
        pending_changed: bool,
    ) -> StoreResult<()> {
        if let Some(entry) = journal {
            let offset = replica.journal_len;
            replica.journal_len += self.append(&entry, offset == 0)?;
            match entry {
                JournalEntry::Decision { ref result, .. } => {
                    replica.mark(offset, &result.record_id, result.lease_version)
                }
                JournalEntry::Discard { ref discard, .. } => {
                    replica.mark(offset, &discard.record_id, discard.lease_version)
                }
                JournalEntry::Audit { .. } => {}
            }
        }
        if pending_changed {
            self.write_snapshot(replica)?;
        }
        Ok(())
    }

    /// Apply `op` under the exclusive lock and write what it staged
    fn mutate<T>(&self, op: impl FnOnce(&mut StoreState) -> Staged<T>) -> StoreResult<T> {
        let mut replica = self.replica.lock().map_err(|_| StoreError::poisoned())?;
        let _lock = self.lock(LockMode::Exclusive)?;
        self.catch_up(&mut replica, LockMode::Exclusive)?;

        let Staged {
            out,
            journal,
            pending_changed,
        } = op(&mut replica.state);
        if let Err(e) = self.persist(&mut replica, journal, pending_changed) {
            warn!(error = %e, path = %self.dir.display(), "store write failed");
            *replica = Replica::default();
            return Err(e);
        }
        Ok(out)
    }

    fn read<T>(&self, op: impl FnOnce(&StoreState) -> T) -> StoreResult<T> {
        let mut replica = self.replica.lock().map_err(|_| StoreError::poisoned())?;
        let _lock = self.lock(LockMode::Shared)?;
        self.catch_up(&mut replica, LockMode::Shared)?;
        Ok(op(&replica.state))
    }
}

impl ReviewStore for FileReviewStore {
    fn insert_pending(&self, record: ReviewRecord) -> StoreResult<()> {
        self.mutate(|state| match state.insert_pending(record) {
            Ok(()) => Staged {
                out: Ok(()),
                journal: None,
                pending_changed: true,
            },
            Err(e) => Staged::unchanged(Err(e)),
        })?
    }

    fn list_pending(&self) -> StoreResult<Vec<PendingDocument>> {
        self.read(|state| state.pending.values().cloned().collect())
    }

    fn get_pending(&self, id: &RecordId) -> StoreResult<Option<PendingDocument>> {
        self.read(|state| state.pending.get(id).cloned())
    }

    fn compare_and_set_lease(
        &self,
        id: &RecordId,
        expected_version: u64,
        lease: Option<Lease>,
    ) -> StoreResult<CasOutcome> {
        self.mutate(|state| {
            let outcome = state.compare_and_set_lease(id, expected_version, lease);
            let pending_changed = outcome == CasOutcome::Applied;
            Staged {
                out: outcome,
                journal: None,
                pending_changed,
            }
        })
    }

    fn commit_decision(&self, commit: DecisionCommit) -> StoreResult<CommitOutcome> {
        let entry = JournalEntry::Decision {
            result: commit.result.clone(),
            audit: commit.audit.clone(),
        };
        self.mutate(|state| {
            let outcome = state.commit_decision(commit);
            let applied = outcome == CommitOutcome::Applied;
            Staged {
                out: outcome,
                journal: applied.then_some(entry),
                pending_changed: applied,
            }
        })
    }

    fn commit_discard(&self, commit: DiscardCommit) -> StoreResult<CommitOutcome> {
        let entry = JournalEntry::Discard {
            discard: commit.discard.clone(),
            audit: commit.audit.clone(),
        };
        self.mutate(|state| {
            let outcome = state.commit_discard(commit);
            let applied = outcome == CommitOutcome::Applied;
            Staged {
                out: outcome,
                journal: applied.then_some(entry),
                pending_changed: applied,
            }
        })
    }

    fn find_result(&self, id: &RecordId, lease_version: u64) -> StoreResult<Option<ResultEntry>> {
        self.read(|state| state.find_result(id, lease_version).cloned())
    }

    fn find_discard(
        &self,
        id: &RecordId,
        lease_version: u64,
    ) -> StoreResult<Option<DiscardEntry>> {
        self.read(|state| state.find_discard(id, lease_version).cloned())
    }

    fn append_audit(&self, entry: AuditLogEntry) -> StoreResult<()> {
        self.mutate(|state| {
            state.audit_log.push(entry.clone());
            Staged {
                out: (),
                journal: Some(JournalEntry::Audit { entry }),
                pending_changed: false,
            }
        })
    }

    fn results(&self) -> StoreResult<Vec<ResultEntry>> {
        self.read(|state| state.results.clone())
    }

    fn discards(&self) -> StoreResult<Vec<DiscardEntry>> {
        self.read(|state| state.discards.clone())
    }

    fn audit_log(&self) -> StoreResult<Vec<AuditLogEntry>> {
        self.read(|state| state.audit_log.clone())
    }
}
