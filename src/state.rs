//! Persistent metadata and per-role state (spec §3 "Role").
//!
//! Grounded on the teacher's `protos::Metadata` and the per-role
//! structs referenced throughout `consensus.rs`
//! (`ServerFollowerState`/`ServerCandidateState`/`ServerLeaderState`)
//! — those structs weren't themselves in the retrieved pack, so they
//! are reconstructed here from their field accesses, re-expressed as
//! a single tagged `Role` enum per the crate's design note (§9:
//! "per-role state held as a tagged variant to make inaccessible
//! fields unrepresentable").

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::protos::ServerId;
use crate::replication::ServerProgress;

/// Durable term/vote/commit state (spec §3 "Persistent state"). Owned
/// logically by this struct; the I/O collaborator (spec §6) is
/// responsible for making writes to it durable before the core emits
/// any message that depends on them (enforced by
/// [`crate::consensus::Tick::write_meta`]).
#[derive(Debug, Clone)]
pub struct Metadata {
    pub current_term: u64,
    /// `None` denotes "no vote cast this term" (spec's `voted_for = 0`).
    pub voted_for: Option<ServerId>,
    pub commit_index: u64,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata { current_term: 0, voted_for: None, commit_index: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct FollowerState {
    /// 0 if no leader observed yet this term.
    pub current_leader_id: Option<ServerId>,
    pub timer: Duration,
    pub election_timeout_rand: Duration,
}

#[derive(Debug, Clone)]
pub struct CandidateState {
    pub votes_granted: HashSet<ServerId>,
    pub timer: Duration,
    pub election_timeout_rand: Duration,
}

/// Membership-change fields a leader carries while promoting a
/// learner to a voting member (spec §4.6).
#[derive(Debug, Clone)]
pub struct PromotionState {
    pub promotee_id: ServerId,
    pub round_number: u32,
    pub round_index: u64,
    pub round_duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct LeaderState {
    pub progress: HashMap<ServerId, ServerProgress>,
    pub heartbeat_timer: Duration,
    pub promotion: Option<PromotionState>,
}

/// The server-role state machine (spec §3, §4.6 "Role transition
/// summary").
#[derive(Debug, Clone)]
pub enum Role {
    Unavailable,
    Follower(FollowerState),
    Candidate(CandidateState),
    Leader(LeaderState),
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader(_))
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self, Role::Candidate(_))
    }

    pub fn is_follower(&self) -> bool {
        matches!(self, Role::Follower(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Unavailable => "unavailable",
            Role::Follower(_) => "follower",
            Role::Candidate(_) => "candidate",
            Role::Leader(_) => "leader",
        }
    }
}
