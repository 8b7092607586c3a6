//! Tick component (spec §4.5, §2 "Tick"): time-driven dispatch.
//!
//! The teacher folds tick dispatch into `consensus.rs::cycle`
//! alongside replication triggering; this crate splits tick dispatch
//! into its own module per the spec's component table (§2), and
//! follows the C library's three-way per-role split
//! (`original_source/src/tick.c`:
//! `raft_tick__follower`/`raft_tick__candidate`/`raft_tick__leader`)
//! for the exact ordering of the self-elect-if-sole-voter
//! short-circuit and the promotion abort check.

use std::time::Duration;

use crate::state::{CandidateState, FollowerState, LeaderState};

/// What a follower's tick decided to do (spec §4.5 "Follower").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerTick {
    /// Not in the configuration; nothing to do.
    NotInConfig,
    /// Still within the timeout; nothing to do yet.
    Wait,
    /// Sole voting member: convert straight to candidate then leader
    /// in the same tick (spec §4.5, §4.6 "Follower → Leader").
    SelfElect,
    /// Timed out: start an election (spec §4.6 "Follower → Candidate").
    StartElection,
}

/// Advances a follower's timer and decides what (if anything) to do.
/// `in_config`/`voting` reflect this server's current roster
/// membership; `sole_voter` is whether it is the only voting member
/// of the cluster.
pub fn follower_tick(
    state: &mut FollowerState,
    elapsed: Duration,
    in_config: bool,
    voting: bool,
    sole_voter: bool,
) -> FollowerTick {
    if !in_config {
        return FollowerTick::NotInConfig;
    }

    state.timer += elapsed;

    if sole_voter {
        return if voting { FollowerTick::SelfElect } else { FollowerTick::Wait };
    }

    if state.timer > state.election_timeout_rand && voting {
        FollowerTick::StartElection
    } else {
        FollowerTick::Wait
    }
}

/// Advances a candidate's timer; `true` means the election timed out
/// and should be restarted (spec §4.5 "Candidate").
pub fn candidate_tick(state: &mut CandidateState, elapsed: Duration) -> bool {
    state.timer += elapsed;
    state.timer > state.election_timeout_rand
}

/// What a leader's tick decided to do about replication (spec §4.5
/// "Leader").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderTick {
    Wait,
    Heartbeat,
}

/// Advances a leader's heartbeat timer; any in-progress promotion's
/// `round_duration` is advanced unconditionally in the same call
/// (spec §4.5: "If a promotion is in progress..., advance its
/// round_duration_ms"; `original_source/src/tick.c::raft_tick__leader`
/// does this every tick, not just on the heartbeat boundary).
pub fn leader_tick(state: &mut LeaderState, elapsed: Duration, heartbeat_timeout_ms: u64) -> LeaderTick {
    state.heartbeat_timer += elapsed;

    if let Some(promotion) = state.promotion.as_mut() {
        promotion.round_duration += elapsed;
    }

    if state.heartbeat_timer > Duration::from_millis(heartbeat_timeout_ms) {
        state.heartbeat_timer = Duration::from_millis(0);
        LeaderTick::Heartbeat
    } else {
        LeaderTick::Wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn follower(timeout_ms: u64) -> FollowerState {
        FollowerState {
            current_leader_id: None,
            timer: Duration::from_millis(0),
            election_timeout_rand: Duration::from_millis(timeout_ms),
        }
    }

    #[test]
    fn sole_voter_self_elects_without_waiting() {
        let mut f = follower(1_000_000);
        let r = follower_tick(&mut f, Duration::from_millis(1), true, true, true);
        assert_eq!(r, FollowerTick::SelfElect);
    }

    #[test]
    fn non_voting_sole_member_waits_forever() {
        let mut f = follower(100);
        let r = follower_tick(&mut f, Duration::from_millis(1), true, false, true);
        assert_eq!(r, FollowerTick::Wait);
    }

    #[test]
    fn multi_voter_follower_waits_then_elects() {
        let mut f = follower(100);
        assert_eq!(follower_tick(&mut f, Duration::from_millis(50), true, true, false), FollowerTick::Wait);
        assert_eq!(follower_tick(&mut f, Duration::from_millis(51), true, true, false), FollowerTick::StartElection);
    }

    #[test]
    fn not_in_config_is_noop() {
        let mut f = follower(100);
        assert_eq!(follower_tick(&mut f, Duration::from_millis(1000), false, true, false), FollowerTick::NotInConfig);
    }

    #[test]
    fn leader_heartbeat_resets_timer() {
        let mut l = LeaderState::default();
        assert_eq!(leader_tick(&mut l, Duration::from_millis(50), 100), LeaderTick::Wait);
        assert_eq!(leader_tick(&mut l, Duration::from_millis(51), 100), LeaderTick::Heartbeat);
        assert_eq!(l.heartbeat_timer, Duration::from_millis(0));
    }
}
