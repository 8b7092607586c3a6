//! Replication component (spec §4.4): per-peer progress, outbound
//! append-entries assembly, log repair on rejection, and commit-index
//! advancement.
//!
//! Grounded on `consensus.rs::{replicate_entries,
//! append_entries_callback, find_next_commit_index, ServerProgress}`.

use std::collections::HashMap;

use crate::config::Configuration;
use crate::log::Log;
use crate::protos::{AppendEntriesRequest, AppendEntriesResponse, LogIndex, ServerId, Term};

/// Leader-side replication bookkeeping for one peer (spec §3,
/// "Leader" per-role state; spec §4.4).
#[derive(Debug, Clone)]
pub struct ServerProgress {
    /// Next log index the leader will attempt to send to this peer;
    /// optimistic, decremented on rejection.
    pub next_index: LogIndex,
    /// Highest log index known to be replicated on this peer.
    pub match_index: LogIndex,
}

impl ServerProgress {
    pub fn new(last_log_index: LogIndex) -> Self {
        ServerProgress { next_index: last_log_index + 1, match_index: 0 }
    }
}

/// Builds the `AppendEntries` this leader sends to `peer`, given its
/// current progress. Empty (`entries == []`) if the peer is already
/// caught up, otherwise carries everything from `next_index` through
/// `last_index` — spec §4.4 allows capping batch size; `max_entries`
/// implements that cap (`None` for unbounded).
pub fn build_append_entries(
    term: Term,
    leader_id: ServerId,
    leader_commit: LogIndex,
    log: &Log,
    progress: &ServerProgress,
    max_entries: Option<usize>,
) -> AppendEntriesRequest {
    let prev_log_index = progress.next_index - 1;
    let prev_log_term = log.term_at(prev_log_index).unwrap_or(0);

    let mut entries: Vec<_> = log.entries_from(progress.next_index).to_vec();
    if let Some(max) = max_entries {
        entries.truncate(max);
    }

    AppendEntriesRequest {
        term,
        leader_id,
        prev_log_index,
        prev_log_term,
        entries,
        leader_commit,
    }
}

/// Applies a successful `AppendEntriesResult` to one peer's progress
/// (spec §4.4 "Result handling on leader").
pub fn on_success(progress: &mut ServerProgress, last_log_index: LogIndex) {
    if last_log_index > progress.match_index {
        progress.match_index = last_log_index;
        progress.next_index = progress.match_index + 1;
    }
}

/// Applies a rejected `AppendEntriesResult` to one peer's progress,
/// backing off `next_index` to speed up log repair (spec §4.4
/// "Result handling on leader", `success=false` branch).
pub fn on_rejection(progress: &mut ServerProgress, resp: &AppendEntriesResponse) {
    let candidate = resp.last_log_index + 1;
    progress.next_index = candidate.min(progress.next_index.saturating_sub(1)).max(1);
}

/// Finds the highest index `N > commit_index` such that a voting
/// quorum of servers (including the leader itself, if voting) has
/// `match_index >= N` *and* `term_at(N) == current_term` (spec §4.4
/// "Result handling on leader": only the leader's own term may be
/// committed directly — Invariant 5 of spec §3).
pub fn find_next_commit_index(
    config: &Configuration,
    self_id: ServerId,
    self_voting: bool,
    current_term: Term,
    commit_index: LogIndex,
    log: &Log,
    progress: &HashMap<ServerId, ServerProgress>,
) -> Option<LogIndex> {
    let quorum = config.quorum();
    let mut candidate = log.last_index();

    while candidate > commit_index {
        let term = match log.term_at(candidate) {
            Some(t) => t,
            None => break,
        };

        if term < current_term {
            // Terms are monotonic walking backwards through the log;
            // once we drop below the current term we'll never find a
            // directly-committable entry at a lower index either.
            break;
        }

        if term == current_term {
            let mut count = if self_voting { 1 } else { 0 };
            for (id, p) in progress.iter() {
                let voting = config.get(*id).map(|s| s.voting).unwrap_or(false);
                if *id != self_id && voting && p.match_index >= candidate {
                    count += 1;
                }
            }
            if count >= quorum {
                return Some(candidate);
            }
        }

        candidate -= 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protos::EntryData;

    fn cfg3() -> Configuration {
        let mut c = Configuration::new();
        c.add(1, "a".into(), true).unwrap();
        c.add(2, "b".into(), true).unwrap();
        c.add(3, "c".into(), true).unwrap();
        c
    }

    #[test]
    fn build_request_empty_when_caught_up() {
        let log = Log::new();
        let progress = ServerProgress::new(0);
        let req = build_append_entries(5, 1, 0, &log, &progress, None);
        assert!(req.entries.is_empty());
        assert_eq!(req.prev_log_index, 0);
        assert_eq!(req.prev_log_term, 0);
    }

    #[test]
    fn build_request_carries_missing_entries() {
        let mut log = Log::new();
        log.append(1, EntryData::Noop);
        log.append(2, EntryData::Noop);
        let progress = ServerProgress { next_index: 1, match_index: 0 };
        let req = build_append_entries(2, 1, 0, &log, &progress, None);
        assert_eq!(req.entries.len(), 2);
        assert_eq!(req.prev_log_index, 0);
    }

    #[test]
    fn success_advances_match_and_next() {
        let mut progress = ServerProgress::new(0);
        on_success(&mut progress, 5);
        assert_eq!(progress.match_index, 5);
        assert_eq!(progress.next_index, 6);
        // Stale (smaller) success is ignored.
        on_success(&mut progress, 3);
        assert_eq!(progress.match_index, 5);
    }

    #[test]
    fn rejection_backs_off_next_index() {
        let mut progress = ServerProgress { next_index: 10, match_index: 0 };
        let resp = AppendEntriesResponse { term: 1, success: false, last_log_index: 4 };
        on_rejection(&mut progress, &resp);
        assert_eq!(progress.next_index, 5);
    }

    #[test]
    fn commit_requires_current_term_and_quorum() {
        let cfg = cfg3();
        let mut log = Log::new();
        log.append(1, EntryData::Noop); // index 1, term 1
        log.append(2, EntryData::Noop); // index 2, term 2 (current term)

        let mut progress = HashMap::new();
        progress.insert(2, ServerProgress { next_index: 3, match_index: 2 });
        progress.insert(3, ServerProgress { next_index: 1, match_index: 0 });

        // Leader (self, voting) + server 2 = quorum of 2.
        let n = find_next_commit_index(&cfg, 1, true, 2, 0, &log, &progress);
        assert_eq!(n, Some(2));
    }

    #[test]
    fn commit_never_counts_earlier_term_directly() {
        let cfg = cfg3();
        let mut log = Log::new();
        log.append(1, EntryData::Noop); // index 1, term 1 -- not current term

        let mut progress = HashMap::new();
        progress.insert(2, ServerProgress { next_index: 2, match_index: 1 });
        progress.insert(3, ServerProgress { next_index: 2, match_index: 1 });

        // current_term = 2, but log's only entry is term 1: must not commit.
        let n = find_next_commit_index(&cfg, 1, true, 2, 0, &log, &progress);
        assert_eq!(n, None);
    }
}
