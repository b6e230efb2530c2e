use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{hash_map, BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{StoreError, StoreResult};
use super::journal::{self, Record, JOURNAL_FILE, JOURNAL_FILE_TMP};
use super::registry::DirectoryLease;
use super::traits::{DiskStore, StoreEditor};

/// Redundant journal records tolerated before the journal is rewritten
const COMPACT_THRESHOLD: usize = 2000;

/// Journaled, size-bounded LRU store with one value file per key.
///
/// Keys are hashed with SHA-256 so any string is accepted. The journal is
/// replayed on open; entries whose last edit never committed are discarded.
#[derive(Debug)]
pub struct DiskLruStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    directory: PathBuf,
    app_version: u32,
    max_size: u64,
    state: Mutex<State>,
}

#[derive(Debug)]
struct Entry {
    length: u64,
    readable: bool,
    editing: bool,
    stamp: u64,
}

#[derive(Debug)]
struct State {
    directory: PathBuf,
    entries: HashMap<String, Entry>,
    // stamp -> digest, oldest first
    recency: BTreeMap<u64, String>,
    next_stamp: u64,
    size: u64,
    journal: Option<BufWriter<File>>,
    redundant_ops: usize,
    // bumped by delete_all and close so stale editors can tell
    generation: u64,
    closed: bool,
    lease: Option<DirectoryLease>,
}

/// Hash a key into the name used on disk and in the journal
pub fn key_digest(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

fn clean_path(directory: &Path, digest: &str) -> PathBuf {
    directory.join(format!("{digest}.0"))
}

fn dirty_path(directory: &Path, digest: &str) -> PathBuf {
    directory.join(format!("{digest}.0.tmp"))
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn open_append(directory: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .append(true)
        .open(directory.join(JOURNAL_FILE))?;
    Ok(BufWriter::new(file))
}

/// Flush a finished value to disk and report its length
fn finish_file(writer: BufWriter<File>) -> StoreResult<u64> {
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_data()?;
    Ok(file.metadata()?.len())
}

/// Delete value files left behind without a journal to describe them
fn remove_entry_files(directory: &Path) -> io::Result<()> {
    for item in fs::read_dir(directory)? {
        let item = item?;
        let name = item.file_name();
        let Some(name) = name.to_str() else { continue };
        let stem = name
            .strip_suffix(".0.tmp")
            .or_else(|| name.strip_suffix(".0"));
        if let Some(stem) = stem {
            if stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit()) {
                remove_if_exists(&item.path())?;
            }
        }
    }
    Ok(())
}

impl State {
    fn new(directory: PathBuf, lease: DirectoryLease) -> Self {
        Self {
            directory,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_stamp: 0,
            size: 0,
            journal: None,
            redundant_ops: 0,
            generation: 0,
            closed: false,
            lease: Some(lease),
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.size = 0;
        self.redundant_ops = 0;
    }

    fn touch(&mut self, digest: &str) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        if let Some(entry) = self.entries.get_mut(digest) {
            self.recency.remove(&entry.stamp);
            entry.stamp = stamp;
            self.recency.insert(stamp, digest.to_string());
        }
    }

    fn entry_or_insert(&mut self, digest: &str) -> &mut Entry {
        match self.entries.entry(digest.to_string()) {
            hash_map::Entry::Occupied(slot) => slot.into_mut(),
            hash_map::Entry::Vacant(slot) => {
                let stamp = self.next_stamp;
                self.next_stamp += 1;
                self.recency.insert(stamp, digest.to_string());
                slot.insert(Entry {
                    length: 0,
                    readable: false,
                    editing: false,
                    stamp,
                })
            }
        }
    }

    fn forget(&mut self, digest: &str) -> Option<Entry> {
        let entry = self.entries.remove(digest)?;
        self.recency.remove(&entry.stamp);
        Some(entry)
    }

    fn append(&mut self, record: &Record, flush: bool) -> StoreResult<()> {
        let journal = self.journal.as_mut().ok_or(StoreError::Closed)?;
        writeln!(journal, "{record}")?;
        if flush {
            journal.flush()?;
        }
        Ok(())
    }

    fn replay(&mut self, records: Vec<Record>) {
        let total = records.len();
        for record in records {
            match record {
                Record::Dirty(digest) => {
                    self.entry_or_insert(&digest).editing = true;
                }
                Record::Clean(digest, length) => {
                    let entry = self.entry_or_insert(&digest);
                    entry.editing = false;
                    entry.readable = true;
                    entry.length = length;
                    self.touch(&digest);
                }
                Record::Read(digest) => self.touch(&digest),
                Record::Remove(digest) => {
                    self.forget(&digest);
                }
            }
        }
        self.redundant_ops = total.saturating_sub(self.entries.len());
    }

    /// Drop the traces of edits that were in flight when the journal ended
    fn discard_incomplete(&mut self) -> io::Result<()> {
        let interrupted: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.editing)
            .map(|(d, _)| d.clone())
            .collect();

        for digest in interrupted {
            remove_if_exists(&dirty_path(&self.directory, &digest))?;
            let keep = match self.entries.get_mut(&digest) {
                Some(entry) => {
                    entry.editing = false;
                    entry.readable
                }
                None => continue,
            };
            if !keep {
                remove_if_exists(&clean_path(&self.directory, &digest))?;
                self.forget(&digest);
            }
        }

        self.size = self.entries.values().map(|e| e.length).sum();
        Ok(())
    }

    fn needs_compaction(&self) -> bool {
        self.redundant_ops >= COMPACT_THRESHOLD && self.redundant_ops >= self.entries.len()
    }

    /// Write a journal holding only live entries and swap it in
    fn rebuild_journal(&mut self, app_version: u32) -> StoreResult<()> {
        if let Some(mut old) = self.journal.take() {
            old.flush()?;
        }

        let tmp = self.directory.join(JOURNAL_FILE_TMP);
        let mut out = BufWriter::new(File::create(&tmp)?);
        journal::write_header(&mut out, app_version)?;
        for digest in self.recency.values() {
            let entry = &self.entries[digest];
            if entry.readable {
                writeln!(out, "{}", Record::Clean(digest.clone(), entry.length))?;
            }
            if entry.editing {
                writeln!(out, "{}", Record::Dirty(digest.clone()))?;
            }
        }
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, self.directory.join(JOURNAL_FILE))?;
        self.journal = Some(open_append(&self.directory)?);
        self.redundant_ops = 0;
        debug!(directory = %self.directory.display(), entries = self.entries.len(), "Journal rebuilt");
        Ok(())
    }

    fn compact_if_needed(&mut self, app_version: u32) -> StoreResult<()> {
        if self.needs_compaction() {
            self.rebuild_journal(app_version)?;
        }
        Ok(())
    }

    fn remove_entry(&mut self, digest: &str) -> StoreResult<()> {
        remove_if_exists(&clean_path(&self.directory, digest))?;
        if let Some(entry) = self.forget(digest) {
            self.size -= entry.length;
        }
        self.redundant_ops += 1;
        self.append(&Record::Remove(digest.to_string()), true)
    }

    fn trim_to_size(&mut self, max_size: u64) -> StoreResult<()> {
        while self.size > max_size {
            let victim = self
                .recency
                .values()
                .find(|d| {
                    let entry = &self.entries[*d];
                    entry.readable && !entry.editing
                })
                .cloned();
            let Some(victim) = victim else { break };
            self.remove_entry(&victim)?;
            debug!(digest = %victim, size = self.size, max_size, "Evicted least recently used entry");
        }
        Ok(())
    }
}

impl DiskLruStore {
    /// Open the store in `directory`, creating it if needed.
    ///
    /// A journal written by another `app_version`, or one that cannot be
    /// parsed, resets the directory to an empty store.
    pub fn open(directory: impl Into<PathBuf>, app_version: u32, max_size: u64) -> StoreResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        let lease = DirectoryLease::acquire(&directory)?;
        let mut state = State::new(directory.clone(), lease);

        remove_if_exists(&directory.join(JOURNAL_FILE_TMP))?;
        let journal_path = directory.join(JOURNAL_FILE);

        if journal_path.exists() {
            match journal::read(&journal_path, app_version) {
                Ok(replay) => {
                    state.replay(replay.records);
                    state.discard_incomplete()?;
                    if replay.truncated || state.needs_compaction() {
                        state.rebuild_journal(app_version)?;
                    } else {
                        state.journal = Some(open_append(&directory)?);
                    }
                }
                Err(StoreError::CorruptJournal(reason)) => {
                    warn!(directory = %directory.display(), %reason, "Journal unusable, resetting store");
                    fs::remove_dir_all(&directory)?;
                    fs::create_dir_all(&directory)?;
                    state.rebuild_journal(app_version)?;
                }
                Err(e) => return Err(e),
            }
        } else {
            remove_entry_files(&directory)?;
            state.rebuild_journal(app_version)?;
        }

        state.trim_to_size(max_size)?;
        info!(
            directory = %directory.display(),
            entries = state.entries.len(),
            size = state.size,
            max_size,
            "Disk store opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                directory,
                app_version,
                max_size,
                state: Mutex::new(state),
            }),
        })
    }
}

impl Inner {
    fn complete_edit(
        &self,
        digest: &str,
        generation: u64,
        writer: Option<BufWriter<File>>,
        success: bool,
    ) -> StoreResult<()> {
        let tmp = dirty_path(&self.directory, digest);

        // Finish the payload before taking the lock
        let written: StoreResult<u64> = match (success, writer) {
            (true, Some(writer)) => finish_file(writer),
            (true, None) => Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "editor has no open file",
            ))),
            (false, writer) => {
                drop(writer);
                Err(StoreError::Stale)
            }
        };

        let mut state = self.state.lock();
        if state.generation != generation {
            // A newer editor may own the temp file by now
            if !state.entries.get(digest).is_some_and(|e| e.editing) {
                remove_if_exists(&tmp)?;
            }
            let stale = if state.closed { StoreError::Closed } else { StoreError::Stale };
            return if success { Err(stale) } else { Ok(()) };
        }

        let readable = match state.entries.get_mut(digest) {
            Some(entry) if entry.editing => {
                entry.editing = false;
                entry.readable
            }
            _ => {
                remove_if_exists(&tmp)?;
                return if success { Err(StoreError::Stale) } else { Ok(()) };
            }
        };

        let outcome = match written {
            Ok(length) => match fs::rename(&tmp, clean_path(&self.directory, digest)) {
                Ok(()) => Ok(length),
                Err(e) => Err(StoreError::Io(e)),
            },
            Err(e) => Err(e),
        };

        state.redundant_ops += 1;
        let result = match outcome {
            Ok(length) => {
                let entry = state.entry_or_insert(digest);
                let previous = if entry.readable { entry.length } else { 0 };
                entry.readable = true;
                entry.length = length;
                state.size = state.size - previous + length;
                state.touch(digest);
                state.append(&Record::Clean(digest.to_string(), length), true)?;
                debug!(digest, length, "Entry committed");
                Ok(())
            }
            Err(e) => {
                remove_if_exists(&tmp)?;
                if readable {
                    let length = state.entries[digest].length;
                    state.append(&Record::Clean(digest.to_string(), length), true)?;
                } else {
                    state.forget(digest);
                    state.append(&Record::Remove(digest.to_string()), true)?;
                }
                if success {
                    warn!(digest, error = %e, "Edit failed, entry left unchanged");
                    Err(e)
                } else {
                    debug!(digest, "Edit aborted");
                    Ok(())
                }
            }
        };

        // The outcome is already decided; housekeeping failures are retried
        // on the next commit
        if let Err(e) = state.trim_to_size(self.max_size) {
            warn!(digest, error = %e, "Eviction failed after edit");
        }
        if let Err(e) = state.compact_if_needed(self.app_version) {
            warn!(digest, error = %e, "Journal compaction failed after edit");
        }
        result
    }
}

impl DiskStore for DiskLruStore {
    type Editor = LruEditor;

    fn edit(&self, key: &str) -> StoreResult<Option<LruEditor>> {
        let digest = key_digest(key);
        let generation = {
            let mut state = self.inner.state.lock();
            state.ensure_open()?;
            if state.entries.get(&digest).is_some_and(|e| e.editing) {
                debug!(key, "Edit rejected, another editor is open");
                return Ok(None);
            }
            state.append(&Record::Dirty(digest.clone()), true)?;
            state.entry_or_insert(&digest).editing = true;
            state.generation
        };

        let mut editor = LruEditor {
            inner: Arc::clone(&self.inner),
            digest,
            generation,
            writer: None,
            done: false,
        };
        // Dropping the editor on error aborts the edit
        let file = File::create(dirty_path(&self.inner.directory, &editor.digest))?;
        editor.writer = Some(BufWriter::new(file));
        Ok(Some(editor))
    }

    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let digest = key_digest(key);
        let path = {
            let mut state = self.inner.state.lock();
            state.ensure_open()?;
            if !state.entries.get(&digest).is_some_and(|e| e.readable) {
                return Ok(None);
            }
            state.redundant_ops += 1;
            state.append(&Record::Read(digest.clone()), false)?;
            state.touch(&digest);
            state.compact_if_needed(self.inner.app_version)?;
            clean_path(&self.inner.directory, &digest)
        };

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let mut state = self.inner.state.lock();
                let vanished = state
                    .entries
                    .get(&digest)
                    .is_some_and(|e| e.readable && !e.editing)
                    && !path.exists();
                if vanished {
                    warn!(key, "Value file missing, dropping entry");
                    state.remove_entry(&digest)?;
                }
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        let digest = key_digest(key);
        let state = self.inner.state.lock();
        state.ensure_open()?;
        Ok(state.entries.get(&digest).is_some_and(|e| e.readable))
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let digest = key_digest(key);
        let mut state = self.inner.state.lock();
        state.ensure_open()?;
        match state.entries.get(&digest) {
            Some(entry) if entry.editing => Err(StoreError::EditInProgress),
            Some(entry) if entry.readable => {
                state.remove_entry(&digest)?;
                state.compact_if_needed(self.inner.app_version)?;
                debug!(key, "Entry removed");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_all(&self) -> StoreResult<()> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;

        if let Some(mut journal) = state.journal.take() {
            let _ = journal.flush();
        }
        state.generation += 1;
        state.reset();

        let wiped = match fs::remove_dir_all(&self.inner.directory) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
        fs::create_dir_all(&self.inner.directory)?;
        state.rebuild_journal(self.inner.app_version)?;
        wiped?;

        info!(directory = %self.inner.directory.display(), "Disk store cleared");
        Ok(())
    }

    fn flush(&self) -> StoreResult<()> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;
        if let Some(journal) = state.journal.as_mut() {
            journal.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.generation += 1;
        let flushed = match state.journal.take() {
            Some(mut journal) => journal.flush(),
            None => Ok(()),
        };
        state.lease = None;
        info!(directory = %self.inner.directory.display(), "Disk store closed");
        Ok(flushed?)
    }

    fn directory(&self) -> &Path {
        &self.inner.directory
    }

    fn size(&self) -> u64 {
        self.inner.state.lock().size
    }

    fn max_size(&self) -> u64 {
        self.inner.max_size
    }

    fn len(&self) -> usize {
        self.inner
            .state
            .lock()
            .entries
            .values()
            .filter(|e| e.readable)
            .count()
    }
}

/// Writer for one pending value; dropping it without committing aborts
#[derive(Debug)]
pub struct LruEditor {
    inner: Arc<Inner>,
    digest: String,
    generation: u64,
    writer: Option<BufWriter<File>>,
    done: bool,
}

impl LruEditor {
    fn finish(&mut self, success: bool) -> StoreResult<()> {
        self.done = true;
        let writer = self.writer.take();
        self.inner
            .complete_edit(&self.digest, self.generation, writer, success)
    }
}

impl Write for LruEditor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "editor has no open file")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl StoreEditor for LruEditor {
    fn commit(mut self) -> StoreResult<()> {
        self.finish(true)
    }

    fn abort(mut self) -> StoreResult<()> {
        self.finish(false)
    }
}

impl Drop for LruEditor {
    fn drop(&mut self) {
        if !self.done {
            if let Err(e) = self.finish(false) {
                warn!(digest = %self.digest, error = %e, "Failed to abort dropped editor");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::TempDir;

    fn put(store: &DiskLruStore, key: &str, value: &[u8]) {
        let mut editor = store.edit(key).unwrap().expect("no editor in flight");
        editor.write_all(value).unwrap();
        editor.commit().unwrap();
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();

        put(&store, "a", b"hello");
        assert_eq!(store.read("a").unwrap(), Some(b"hello".to_vec()));
        assert!(store.contains("a").unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.size(), 5);

        assert_eq!(store.read("missing").unwrap(), None);
        assert!(!store.contains("missing").unwrap());
    }

    #[test]
    fn test_overwrite_updates_size() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();

        put(&store, "a", b"hello");
        put(&store, "a", b"hi");
        assert_eq!(store.read("a").unwrap(), Some(b"hi".to_vec()));
        assert_eq!(store.size(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_one_editor_per_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();

        let editor = store.edit("a").unwrap().unwrap();
        assert!(store.edit("a").unwrap().is_none());
        assert!(store.edit("b").unwrap().is_some());
        assert!(matches!(store.remove("a"), Err(StoreError::EditInProgress)));

        editor.abort().unwrap();
        assert!(store.edit("a").unwrap().is_some());
    }

    #[test]
    fn test_abort_and_drop_leave_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();

        let mut editor = store.edit("a").unwrap().unwrap();
        editor.write_all(b"partial").unwrap();
        editor.abort().unwrap();
        assert!(!store.contains("a").unwrap());

        {
            let mut editor = store.edit("b").unwrap().unwrap();
            editor.write_all(b"partial").unwrap();
        }
        assert!(!store.contains("b").unwrap());
        assert_eq!(store.size(), 0);

        // Aborting an overwrite keeps the previous value
        put(&store, "c", b"old");
        let mut editor = store.edit("c").unwrap().unwrap();
        editor.write_all(b"new").unwrap();
        editor.abort().unwrap();
        assert_eq!(store.read("c").unwrap(), Some(b"old".to_vec()));

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 10).unwrap();

        put(&store, "a", b"aaaa");
        put(&store, "b", b"bbbb");
        // Reading "a" makes "b" the eviction candidate
        store.read("a").unwrap();
        put(&store, "c", b"cccc");

        assert!(store.contains("a").unwrap());
        assert!(!store.contains("b").unwrap());
        assert!(store.contains("c").unwrap());
        assert!(store.size() <= store.max_size());
    }

    #[test]
    fn test_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();

        put(&store, "a", b"hello");
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.read("a").unwrap(), None);
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_reopen_replays_journal() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
            put(&store, "a", b"hello");
            put(&store, "b", b"world");
            store.remove("b").unwrap();
            // Left dirty on purpose
            let mut editor = store.edit("c").unwrap().unwrap();
            editor.write_all(b"pending").unwrap();
            std::mem::forget(editor);
            store.close().unwrap();
        }

        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
        assert_eq!(store.read("a").unwrap(), Some(b"hello".to_vec()));
        assert!(!store.contains("b").unwrap());
        assert!(!store.contains("c").unwrap());
        assert!(!dirty_path(temp_dir.path(), &key_digest("c")).exists());
        assert_eq!(store.len(), 1);
        assert_eq!(store.size(), 5);
    }

    #[test]
    fn test_version_change_resets() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
            put(&store, "a", b"hello");
        }

        let store = DiskLruStore::open(temp_dir.path(), 2, 1024).unwrap();
        assert!(!store.contains("a").unwrap());
        assert!(!clean_path(temp_dir.path(), &key_digest("a")).exists());
    }

    #[test]
    fn test_corrupt_journal_resets() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
            put(&store, "a", b"hello");
        }
        let journal_path = temp_dir.path().join(JOURNAL_FILE);
        let mut journal = OpenOptions::new().append(true).open(&journal_path).unwrap();
        writeln!(journal, "GARBAGE line").unwrap();
        drop(journal);

        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
        assert!(store.is_empty());
        put(&store, "b", b"fresh");
        assert!(store.contains("b").unwrap());
    }

    #[test]
    fn test_reopen_after_truncated_journal() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
            put(&store, "a", b"hello");
            put(&store, "b", b"world");
        }
        let journal_path = temp_dir.path().join(JOURNAL_FILE);
        let mut journal = OpenOptions::new().append(true).open(&journal_path).unwrap();
        write!(journal, "REMO").unwrap();
        drop(journal);

        {
            let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
            assert_eq!(store.read("a").unwrap(), Some(b"hello".to_vec()));
            assert_eq!(store.read("b").unwrap(), Some(b"world".to_vec()));
            store.close().unwrap();
        }

        // The partial line was dropped when the journal was rewritten
        let journal = fs::read_to_string(&journal_path).unwrap();
        assert!(journal.ends_with('\n'));
        assert!(!journal.contains("REMO"));

        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.read("b").unwrap(), Some(b"world".to_vec()));
    }

    #[test]
    fn test_open_trims_to_smaller_budget() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
            put(&store, "a", b"aaaa");
            put(&store, "b", b"bbbb");
            put(&store, "c", b"cccc");
        }

        let store = DiskLruStore::open(temp_dir.path(), 1, 5).unwrap();
        assert!(store.size() <= store.max_size());
        assert_eq!(store.len(), 1);
        assert!(store.contains("c").unwrap());
        assert!(!clean_path(temp_dir.path(), &key_digest("a")).exists());
        store.close().unwrap();

        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read("c").unwrap(), Some(b"cccc".to_vec()));
    }

    #[test]
    fn test_commit_succeeds_when_eviction_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 10).unwrap();
        put(&store, "a", b"aaaa");

        // A directory in place of the value file makes evicting "a" fail
        let blocked = clean_path(temp_dir.path(), &key_digest("a"));
        fs::remove_file(&blocked).unwrap();
        fs::create_dir(&blocked).unwrap();

        let mut editor = store.edit("b").unwrap().unwrap();
        editor.write_all(b"bbbbbbbb").unwrap();
        editor.commit().unwrap();
        assert_eq!(store.read("b").unwrap(), Some(b"bbbbbbbb".to_vec()));
    }

    #[test]
    fn test_delete_all_is_reusable() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("cache");
        let store = DiskLruStore::open(&dir, 1, 1024).unwrap();

        put(&store, "a", b"hello");
        let mut pending = store.edit("b").unwrap().unwrap();
        pending.write_all(b"in flight").unwrap();

        store.delete_all().unwrap();
        assert!(!store.contains("a").unwrap());
        assert!(matches!(pending.commit(), Err(StoreError::Stale)));
        assert!(!store.contains("b").unwrap());

        put(&store, "a", b"again");
        assert_eq!(store.read("a").unwrap(), Some(b"again".to_vec()));
        assert!(dir.join(JOURNAL_FILE).exists());
    }

    #[test]
    fn test_single_store_per_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
        assert!(matches!(
            DiskLruStore::open(temp_dir.path(), 1, 1024),
            Err(StoreError::Locked(_))
        ));

        store.close().unwrap();
        assert!(matches!(store.read("a"), Err(StoreError::Closed)));
        assert!(DiskLruStore::open(temp_dir.path(), 1, 1024).is_ok());
    }

    #[test]
    fn test_journal_compaction() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
        put(&store, "a", b"x");

        for _ in 0..(COMPACT_THRESHOLD + 10) {
            store.read("a").unwrap();
        }
        store.flush().unwrap();

        let journal = fs::read_to_string(temp_dir.path().join(JOURNAL_FILE)).unwrap();
        assert!(journal.lines().count() < COMPACT_THRESHOLD);
        drop(store);

        let store = DiskLruStore::open(temp_dir.path(), 1, 1024).unwrap();
        assert_eq!(store.read("a").unwrap(), Some(b"x".to_vec()));
    }
}
