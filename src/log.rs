//! In-memory append-only log (spec §4.2).
//!
//! The `LogStorage` trait this module reconstructs isn't present in
//! the retrieved teacher pack; it is rebuilt from its call sites in
//! the teacher's `consensus.rs` (`log.last_index()`, `log.term()`,
//! `log.append()`, `log.truncate_suffix()`, `log.first_index()`).
//! Batch payload sharing (spec §3, §9) is realized directly with
//! `bytes::Bytes`, which is itself a reference-counted slice: slicing
//! one batch buffer per entry and dropping the last live slice
//! releases the backing allocation with no bookkeeping of our own.

use crate::errors::*;
use crate::protos::{Entry, EntryData, LogIndex, Term};

/// An in-memory, append-only sequence of entries indexed from
/// `start_index`. `start_index == last_index + 1` denotes an empty
/// log (nothing appended yet, or everything before `start_index` has
/// been compacted away — compaction itself is out of scope per
/// spec §1, but the abstraction is carried so a future snapshot layer
/// can bump `start_index` without changing this module's contract).
#[derive(Debug, Default)]
pub struct Log {
    start_index: LogIndex,
    entries: Vec<Entry>,
}

impl Log {
    /// A fresh log starting at index 1 with nothing appended.
    pub fn new() -> Self {
        Log { start_index: 1, entries: Vec::new() }
    }

    /// Restore a log whose first retained entry is `start_index`
    /// (spec §6, `load()`).
    pub fn restore(start_index: LogIndex, entries: Vec<Entry>) -> Self {
        Log { start_index, entries }
    }

    pub fn start_index(&self) -> LogIndex {
        self.start_index
    }

    /// Highest index present in the log; `start_index - 1` if empty.
    pub fn last_index(&self) -> LogIndex {
        self.start_index + self.entries.len() as LogIndex - 1
    }

    fn in_range(&self, index: LogIndex) -> bool {
        index >= self.start_index && index <= self.last_index()
    }

    fn slot(&self, index: LogIndex) -> usize {
        (index - self.start_index) as usize
    }

    /// Term at `index`, or `0` for index `0` (the conventional "no
    /// previous entry" sentinel used throughout spec §4.4). `None` if
    /// `index` falls outside `[start_index, last_index]` and isn't 0.
    pub fn term_at(&self, index: LogIndex) -> Option<Term> {
        if index == 0 {
            return Some(0);
        }
        if self.in_range(index) {
            Some(self.entries[self.slot(index)].term)
        } else {
            None
        }
    }

    pub fn entry(&self, index: LogIndex) -> Option<&Entry> {
        if self.in_range(index) {
            Some(&self.entries[self.slot(index)])
        } else {
            None
        }
    }

    pub fn entries_from(&self, index: LogIndex) -> &[Entry] {
        if index > self.last_index() {
            return &[];
        }
        let start = if index < self.start_index { 0 } else { self.slot(index) };
        &self.entries[start..]
    }

    /// Appends one entry at `last_index() + 1`, returning its index.
    /// `term`/`data` become the entry's contents; the caller supplies
    /// the term (always the leader's current term for self-appends).
    pub fn append(&mut self, term: Term, data: EntryData) -> LogIndex {
        let index = self.last_index() + 1;
        self.entries.push(Entry { index, term, data });
        index
    }

    /// Appends an entry already carrying its index (used when
    /// accepting entries replicated from a leader); the caller is
    /// responsible for having validated that `entry.index ==
    /// last_index() + 1` beforehand (spec §4.4 receiver rule 5).
    pub fn append_entry(&mut self, entry: Entry) {
        debug_assert_eq!(entry.index, self.last_index() + 1);
        self.entries.push(entry);
    }

    /// Removes entries with index `>= from`. Fails
    /// `CommittedTruncation` if `from <= commit_index`; the caller
    /// supplies `commit_index` since the log itself doesn't track
    /// commitment (that's `Metadata`'s job, spec §3).
    pub fn truncate_suffix(&mut self, from: LogIndex, commit_index: LogIndex) -> Result<()> {
        if from <= commit_index {
            return Err(ErrorKind::CommittedTruncation(from, commit_index).into());
        }
        if from <= self.last_index() {
            let keep = if from < self.start_index { 0 } else { self.slot(from) };
            self.entries.truncate(keep);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn cmd(b: &'static str) -> EntryData {
        EntryData::Command(Bytes::from_static(b.as_bytes()))
    }

    #[test]
    fn append_assigns_contiguous_indices() {
        let mut log = Log::new();
        assert_eq!(log.append(1, cmd("a")), 1);
        assert_eq!(log.append(1, cmd("b")), 2);
        assert_eq!(log.last_index(), 2);
    }

    #[test]
    fn term_at_zero_is_sentinel() {
        let log = Log::new();
        assert_eq!(log.term_at(0), Some(0));
        assert_eq!(log.term_at(1), None);
    }

    #[test]
    fn truncate_suffix_drops_tail() {
        let mut log = Log::new();
        log.append(1, cmd("a"));
        log.append(1, cmd("b"));
        log.append(2, cmd("c"));
        log.truncate_suffix(2, 0).unwrap();
        assert_eq!(log.last_index(), 1);
        assert_eq!(log.term_at(1), Some(1));
        assert_eq!(log.term_at(2), None);
    }

    #[test]
    fn truncate_suffix_rejects_committed() {
        let mut log = Log::new();
        log.append(1, cmd("a"));
        log.append(1, cmd("b"));
        assert!(log.truncate_suffix(1, 2).is_err());
    }

    #[test]
    fn batch_release_on_truncation() {
        // A single shared allocation split into two entries' payloads.
        let batch = Bytes::from(&b"abcdef"[..]);
        let a = batch.slice(0..3);
        let b = batch.slice(3..6);
        drop(batch);

        let mut log = Log::new();
        log.append(1, EntryData::Command(a));
        log.append(1, EntryData::Command(b.clone()));
        log.truncate_suffix(1, 0).unwrap();
        // Only `b`'s clone keeps the shared allocation alive; dropping
        // it drops the batch's last reference.
        drop(b);
    }
}
