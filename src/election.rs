//! Election component (spec §4.3): vote request construction, vote
//! tallying, and election timeout randomization.
//!
//! Grounded on `consensus.rs::{perform_election, pre_vote,
//! request_vote_callback, new_election_timeout}`.

use std::time::Duration;

use rand::Rng;

use crate::config::Configuration;
use crate::log::Log;
use crate::protos::{RequestVoteRequest, ServerId, Term};
use crate::state::{CandidateState, Metadata};

/// Samples a randomized election timeout uniformly from
/// `[base_ms, 2*base_ms)` (spec §4.3 "Timer"). Grounded on
/// `consensus.rs::new_election_timeout`, generalized to take the
/// configured base instead of the teacher's hardcoded
/// `ELECTION_TIMEOUT` constant.
pub fn sample_election_timeout(base_ms: u64) -> Duration {
    let extra = rand::thread_rng().gen_range(0, base_ms);
    Duration::from_millis(base_ms + extra)
}

/// Constructs a fresh candidate state: empty vote set plus a newly
/// sampled timeout, timer reset to zero (spec §4.3 "Start election"
/// steps 3-4).
pub fn new_candidate_state(election_timeout_ms: u64) -> CandidateState {
    CandidateState {
        votes_granted: Default::default(),
        timer: Duration::from_millis(0),
        election_timeout_rand: sample_election_timeout(election_timeout_ms),
    }
}

/// Builds the `RequestVote` this server sends to every other voting
/// server upon starting an election (spec §4.3 step 5).
pub fn build_request_vote(self_id: ServerId, meta: &Metadata, log: &Log) -> RequestVoteRequest {
    let last_log_index = log.last_index();
    let last_log_term = log.term_at(last_log_index).unwrap_or(0);
    RequestVoteRequest {
        term: meta.current_term,
        candidate_id: self_id,
        last_log_index,
        last_log_term,
    }
}

/// Whether a vote for `req` should be granted, assuming the caller
/// has already run `observe_term` (so `req.term <= meta.current_term`
/// no longer implies a stale/ignorable request — the term-comparison
/// itself is the caller's job per spec §4.3 "Handling RequestVote").
/// Checks the remaining three conditions: we are voting-eligible, the
/// "already voted for someone else this term" guard, and log
/// up-to-dateness.
pub fn should_grant_vote(meta: &Metadata, log: &Log, req: &RequestVoteRequest, self_voting: bool) -> bool {
    if !self_voting {
        return false;
    }

    if req.term < meta.current_term {
        return false;
    }

    let already_voted_elsewhere = matches!(meta.voted_for, Some(id) if id != req.candidate_id);
    if already_voted_elsewhere {
        return false;
    }

    let last_log_index = log.last_index();
    let last_log_term = log.term_at(last_log_index).unwrap_or(0);

    // Candidate's log must be at least as up-to-date as ours:
    // (last_log_term', last_log_index') >= (our term, our index)
    // lexicographically.
    (req.last_log_term, req.last_log_index) >= (last_log_term, last_log_index)
}

/// Records a vote result against an in-progress candidacy. Returns
/// `true` if this vote was actually counted (i.e. the response term
/// matched and the candidacy is still ongoing) so the caller knows
/// whether to re-check for a new quorum.
pub fn record_vote(state: &mut CandidateState, from_id: ServerId, granted: bool) {
    if granted {
        state.votes_granted.insert(from_id);
    }
}

/// Total votes held by the candidate, counting its own implicit
/// self-vote plus any granted by others (spec §4.3 "Tallying").
pub fn vote_count(state: &CandidateState, self_id: ServerId, self_votes: bool) -> usize {
    let mut count = state.votes_granted.iter().filter(|id| **id != self_id).count();
    if self_votes {
        count += 1;
    }
    count
}

pub fn has_quorum(state: &CandidateState, config: &Configuration, self_id: ServerId, self_votes: bool) -> bool {
    vote_count(state, self_id, self_votes) >= config.quorum()
}

/// Whether `candidate`'s advertised log is at least as up-to-date as
/// `(term, index)` — exposed standalone for tests and for the
/// dispatcher's pre-step-down sanity checks.
pub fn log_is_up_to_date(candidate_term: Term, candidate_index: u64, term: Term, index: u64) -> bool {
    (candidate_term, candidate_index) >= (term, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_when_unvoted_and_up_to_date() {
        let meta = Metadata { current_term: 2, voted_for: None, commit_index: 0 };
        let log = Log::new();
        let req = RequestVoteRequest { term: 2, candidate_id: 9, last_log_index: 0, last_log_term: 0 };
        assert!(should_grant_vote(&meta, &log, &req, true));
    }

    #[test]
    fn refuses_when_already_voted_for_someone_else() {
        let meta = Metadata { current_term: 2, voted_for: Some(3), commit_index: 0 };
        let log = Log::new();
        let req = RequestVoteRequest { term: 2, candidate_id: 9, last_log_index: 0, last_log_term: 0 };
        assert!(!should_grant_vote(&meta, &log, &req, true));
    }

    #[test]
    fn regrants_same_candidate_idempotently() {
        let meta = Metadata { current_term: 2, voted_for: Some(9), commit_index: 0 };
        let log = Log::new();
        let req = RequestVoteRequest { term: 2, candidate_id: 9, last_log_index: 0, last_log_term: 0 };
        assert!(should_grant_vote(&meta, &log, &req, true));
    }

    #[test]
    fn refuses_stale_log() {
        let meta = Metadata { current_term: 2, voted_for: None, commit_index: 0 };
        let mut log = Log::new();
        log.append(2, crate::protos::EntryData::Noop);
        let req = RequestVoteRequest { term: 2, candidate_id: 9, last_log_index: 0, last_log_term: 0 };
        assert!(!should_grant_vote(&meta, &log, &req, true));
    }

    #[test]
    fn refuses_when_not_voting_eligible() {
        let meta = Metadata { current_term: 2, voted_for: None, commit_index: 0 };
        let log = Log::new();
        let req = RequestVoteRequest { term: 2, candidate_id: 9, last_log_index: 0, last_log_term: 0 };
        assert!(!should_grant_vote(&meta, &log, &req, false));
    }

    #[test]
    fn quorum_counts_self_vote() {
        let mut cfg = Configuration::new();
        cfg.add(1, "a".into(), true).unwrap();
        cfg.add(2, "b".into(), true).unwrap();
        cfg.add(3, "c".into(), true).unwrap();

        let mut state = new_candidate_state(100);
        assert!(!has_quorum(&state, &cfg, 1, true));
        record_vote(&mut state, 2, true);
        assert!(has_quorum(&state, &cfg, 1, true));
    }
}
