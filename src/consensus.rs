//! The consensus core (spec §2, "RoleMachine" + entry points).
//!
//! Grounded on the teacher's `consensus.rs::ConsensusModule` almost in
//! full: the struct name, the `Tick` effects-accumulator shape
//! (`meta`/`config`/`new_entries`/`messages`/`next_tick` fields), and
//! `cycle`/`observe_term`/`update_commited`/`start_election`/
//! `become_follower` are reused nearly verbatim, generalized to call
//! into the split-out `election`/`replication`/`membership`/`tick`
//! modules instead of doing everything inline.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use ::log::{debug, error, info, warn};

use crate::config::Configuration;
use crate::constraint::MustPersist;
use crate::election;
use crate::errors::*;
use crate::log::Log;
use crate::membership::{self, MembershipEvent, MembershipRequest, RoundOutcome};
use crate::protos::{
    AppendEntriesRequest, AppendEntriesResponse, Entry, EntryData, LogIndex, Message, MessageBody,
    RequestVoteRequest, RequestVoteResponse, ServerId, Term,
};
use crate::replication::{self, ServerProgress};
use crate::state::{FollowerState, LeaderState, Metadata, Role};
use crate::tick::{self, FollowerTick, LeaderTick};

/// Validated startup options (spec §6 "Configuration options").
#[derive(Debug, Clone)]
pub struct Options {
    pub id: ServerId,
    pub address: String,
    pub election_timeout_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub max_catch_up_ms: u64,
    pub max_rounds: u32,
}

impl Options {
    pub fn new(id: ServerId, address: String, election_timeout_ms: u64, heartbeat_timeout_ms: u64) -> Result<Self> {
        Self::with_membership_limits(id, address, election_timeout_ms, heartbeat_timeout_ms, 30_000, 10)
    }

    pub fn with_membership_limits(
        id: ServerId,
        address: String,
        election_timeout_ms: u64,
        heartbeat_timeout_ms: u64,
        max_catch_up_ms: u64,
        max_rounds: u32,
    ) -> Result<Self> {
        if election_timeout_ms == 0 || heartbeat_timeout_ms == 0 {
            return Err(ErrorKind::BadRequest("timeouts must be positive".into()).into());
        }
        if heartbeat_timeout_ms >= election_timeout_ms {
            return Err(ErrorKind::BadRequest(
                "heartbeat_timeout_ms must be less than election_timeout_ms".into(),
            )
            .into());
        }
        Ok(Options {
            id,
            address,
            election_timeout_ms,
            heartbeat_timeout_ms,
            max_catch_up_ms,
            max_rounds,
        })
    }
}

/// A successfully accepted proposal: the `(index, term)` it was
/// assigned. It may still fail to ultimately commit (spec §4.4's
/// Applier only ever sees committed entries; an entry can be
/// overwritten by a later leader before that happens).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub index: LogIndex,
    pub term: Term,
}

/// All external side effects requested by the core during a single
/// entry-point call (spec §2 "Control flow"). Grounded on the
/// teacher's `Tick` struct; field names kept, `config`/`meta` kept as
/// dirty-bits the driving process uses to know what to persist rather
/// than duplicating the actual state here.
#[derive(Debug, Default)]
pub struct Tick {
    /// If true, `current_term`/`voted_for` must be persisted before
    /// any of `messages` is released (spec §3, §4.6).
    pub persist_meta: bool,
    /// If true, new entries were appended to the log and must be
    /// persisted before `messages` referencing them is released.
    pub new_entries: bool,
    /// Messages to send, in the order they were queued (spec §5:
    /// "AppendEntries with identical prev_log_index must be sent in
    /// the order the leader issued them").
    pub messages: Vec<Message>,
    /// Entries newly eligible for application to the user state
    /// machine, strictly in index order (spec §4.4 "Applier").
    pub applies: Vec<Entry>,
    /// Out-of-band membership notifications (spec §4.6, §8 S6).
    pub events: Vec<MembershipEvent>,
    /// If present and nothing else happens first, the next tick
    /// should occur no later than this long from now.
    pub next_tick: Option<Duration>,
}

impl Tick {
    fn send(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// The consensus core: role state machine, log, configuration, and
/// the three public entry points (spec §2).
pub struct ConsensusModule {
    options: Options,
    meta: Metadata,
    config: Configuration,
    log: Log,
    role: Role,
    last_applied: LogIndex,
    /// Set once a `Shutdown` invariant violation has been detected
    /// (spec §7): every entry point refuses to do anything further.
    shut_down: bool,
}

impl ConsensusModule {
    /// Creates a fresh core given the options, the durable state
    /// loaded from the I/O collaborator (spec §6 `load()`), and the
    /// initial configuration. Starts in `Follower` (spec §4.6
    /// "Unavailable → Follower: successful start").
    pub fn new(options: Options, meta: Metadata, log: Log, config: Configuration) -> Self {
        ConsensusModule {
            options,
            meta,
            config,
            log,
            role: Role::Follower(new_follower_state(0)),
            last_applied: 0,
            shut_down: false,
        }
    }

    pub fn id(&self) -> ServerId {
        self.options.id
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    fn check_not_shut_down(&self) -> Result<()> {
        if self.shut_down {
            return Err(ErrorKind::BadRequest("this server has been shut down".into()).into());
        }
        Ok(())
    }

    // ------------------------------------------------------------
    // Entry point 1: tick
    // ------------------------------------------------------------

    /// spec §4.5. Advances the role timer by `elapsed_ms` and applies
    /// whatever time-driven rule follows for the current role.
    pub fn tick(&mut self, elapsed_ms: u64) -> Result<Tick> {
        self.check_not_shut_down()?;
        let mut out = Tick::default();

        if matches!(self.role, Role::Unavailable) {
            return Ok(out);
        }

        let elapsed = Duration::from_millis(elapsed_ms);

        match &mut self.role {
            Role::Unavailable => unreachable!(),
            Role::Follower(_) => {
                let in_config = self.config.get(self.options.id).is_some();
                let voting = self.config.get(self.options.id).map(|s| s.voting).unwrap_or(false);
                let sole_voter = self.config.n_voting() == 1 && voting;

                let decision = if let Role::Follower(s) = &mut self.role {
                    tick::follower_tick(s, elapsed, in_config, voting, sole_voter)
                } else {
                    unreachable!()
                };

                match decision {
                    FollowerTick::NotInConfig | FollowerTick::Wait => {}
                    FollowerTick::SelfElect => {
                        debug!("server {}: sole voter, self-electing", self.options.id);
                        self.start_election(&mut out);
                        self.become_leader(&mut out);
                    }
                    FollowerTick::StartElection => {
                        info!("server {}: election timeout, starting election", self.options.id);
                        self.start_election(&mut out);
                    }
                }
            }
            Role::Candidate(_) => {
                let restart = if let Role::Candidate(s) = &mut self.role {
                    tick::candidate_tick(s, elapsed)
                } else {
                    unreachable!()
                };
                if restart {
                    info!("server {}: election timed out with no winner, restarting", self.options.id);
                    self.start_election(&mut out);
                }
            }
            Role::Leader(_) => {
                let decision = if let Role::Leader(s) = &mut self.role {
                    tick::leader_tick(s, elapsed, self.options.heartbeat_timeout_ms)
                } else {
                    unreachable!()
                };

                self.check_promotion_abort(&mut out);

                if decision == LeaderTick::Heartbeat {
                    self.replicate(&mut out);
                }
            }
        }

        Ok(out)
    }

    // ------------------------------------------------------------
    // Entry point 2: recv
    // ------------------------------------------------------------

    /// spec §4.7 "RPC Dispatch": validates the envelope, updates role
    /// on a higher observed term, then routes to the right handler.
    pub fn recv(&mut self, msg: Message) -> Result<Tick> {
        self.check_not_shut_down()?;
        let mut out = Tick::default();

        if self.config.get(msg.server_id).is_none() {
            // spec §4.7: "Unknown senders are logged and ignored."
            // AppendEntries from a server not yet in our configuration
            // is normal during a membership change bootstrapping a new
            // server (spec §4.4 receiver rules don't gate on envelope
            // membership), so only request/response pairs whose sender
            // really must be a known peer are dropped here.
            if matches!(&msg.body, MessageBody::RequestVoteResult(_) | MessageBody::AppendEntriesResult(_)) {
                warn!("server {}: dropping message from unknown sender {}", self.options.id, msg.server_id);
                return Ok(out);
            }
        }

        let from_id = msg.server_id;
        let from_address = msg.server_address.clone();

        match msg.body {
            MessageBody::RequestVote(req) => {
                let resp = self.request_vote(req, &mut out)?;
                out.send(Message {
                    server_id: from_id,
                    server_address: from_address,
                    body: MessageBody::RequestVoteResult(resp.persisted()),
                });
            }
            MessageBody::RequestVoteResult(resp) => {
                self.request_vote_callback(from_id, resp, &mut out);
            }
            MessageBody::AppendEntries(req) => {
                let resp = self.append_entries(req, &mut out)?;
                out.send(Message {
                    server_id: from_id,
                    server_address: from_address,
                    body: MessageBody::AppendEntriesResult(resp),
                });
            }
            MessageBody::AppendEntriesResult(resp) => {
                self.append_entries_callback(from_id, resp, &mut out);
            }
        }

        Ok(out)
    }

    // ------------------------------------------------------------
    // Entry point 3: submit
    // ------------------------------------------------------------

    /// spec §2 "submit(entry)": proposes one opaque command to be
    /// replicated. Entries submitted are assigned contiguous
    /// increasing indices in submit order (spec §5 "Ordering
    /// guarantees").
    pub fn submit(&mut self, payload: Bytes) -> Result<(Proposal, Tick)> {
        self.check_not_shut_down()?;
        let mut out = Tick::default();
        let proposal = self.propose(EntryData::Command(payload), &mut out)?;
        Ok((proposal, out))
    }

    /// spec §4.6: add, remove, or promote a single server. Only the
    /// leader may initiate; followers fail with `NotLeader`.
    pub fn request_membership_change(&mut self, req: MembershipRequest) -> Result<Tick> {
        self.check_not_shut_down()?;
        let mut out = Tick::default();

        if !self.role.is_leader() {
            return Err(self.not_leader_error());
        }

        match req {
            MembershipRequest::Add { id, address } => {
                let mut next = self.config.clone();
                next.add(id, address, false)?;
                self.propose(EntryData::Configuration(next.servers().to_vec()), &mut out)?;
            }
            MembershipRequest::Remove { id } => {
                let mut next = self.config.clone();
                next.remove(id)?;
                self.propose(EntryData::Configuration(next.servers().to_vec()), &mut out)?;
            }
            MembershipRequest::Promote { id } => {
                self.start_promotion(id, &mut out)?;
            }
        }

        Ok(out)
    }

    // ------------------------------------------------------------
    // Internal: proposing entries
    // ------------------------------------------------------------

    fn not_leader_error(&self) -> Error {
        let leader_hint = match &self.role {
            Role::Follower(s) => s.current_leader_id,
            _ => None,
        };
        ErrorKind::NotLeader(leader_hint).into()
    }

    fn propose(&mut self, data: EntryData, tick: &mut Tick) -> Result<Proposal> {
        if !self.role.is_leader() {
            return Err(self.not_leader_error());
        }

        let term = self.meta.current_term;
        let index = self.log.append(term, data);
        tick.new_entries = true;

        self.replicate(tick);

        Ok(Proposal { index, term })
    }

    // ------------------------------------------------------------
    // Role transitions (spec §4.6)
    // ------------------------------------------------------------

    fn start_election(&mut self, tick: &mut Tick) {
        self.meta.current_term += 1;
        self.meta.voted_for = Some(self.options.id);
        tick.persist_meta = true;

        let mut candidate = election::new_candidate_state(self.options.election_timeout_ms);
        if self.config.get(self.options.id).map(|s| s.voting).unwrap_or(false) {
            election::record_vote(&mut candidate, self.options.id, true);
        }
        info!("server {}: starting election for term {}", self.options.id, self.meta.current_term);
        self.role = Role::Candidate(candidate);

        let req = election::build_request_vote(self.options.id, &self.meta, &self.log);
        for peer in self.config.other_voters(self.options.id) {
            let address = self.config.get(peer).map(|s| s.address.clone()).unwrap_or_default();
            tick.send(Message {
                server_id: peer,
                server_address: address,
                body: MessageBody::RequestVote(req.clone()),
            });
        }
    }

    fn become_follower(&mut self, tick: &mut Tick) {
        let _ = tick;
        self.role = Role::Follower(new_follower_state(self.options.election_timeout_ms));
    }

    fn become_leader(&mut self, tick: &mut Tick) {
        info!("server {}: won election for term {}", self.options.id, self.meta.current_term);
        let last_log_index = self.log.last_index();

        let mut progress = HashMap::new();
        for id in self.config.other_servers(self.options.id) {
            progress.insert(id, ServerProgress::new(last_log_index));
        }

        self.role = Role::Leader(LeaderState {
            progress,
            heartbeat_timer: Duration::from_millis(0),
            promotion: None,
        });

        // spec §9 design note: anchor commitment with a no-op in the
        // new term (decision recorded in SPEC_FULL.md §9).
        let _ = self.propose(EntryData::Noop, tick);
        self.replicate(tick);
    }

    /// spec §4.3/§4.4: run whenever a higher term is observed in any
    /// inbound message; steps down to Follower if so.
    fn observe_term(&mut self, term: Term, tick: &mut Tick) {
        if term > self.meta.current_term {
            self.meta.current_term = term;
            self.meta.voted_for = None;
            tick.persist_meta = true;
            self.become_follower(tick);
        }
    }

    fn update_commit_index(&mut self, index: LogIndex, tick: &mut Tick) {
        if index <= self.meta.commit_index {
            return;
        }
        debug!("server {}: advancing commit index to {}", self.options.id, index);
        self.meta.commit_index = index;
        tick.persist_meta = true;
        self.apply_committed(tick);
    }

    fn apply_committed(&mut self, tick: &mut Tick) {
        while self.last_applied < self.meta.commit_index {
            let next = self.last_applied + 1;
            if let Some(entry) = self.log.entry(next) {
                if let EntryData::Configuration(servers) = &entry.data {
                    self.config = Configuration::from_servers(servers.clone());
                }
                tick.applies.push(entry.clone());
                self.last_applied = next;
            } else {
                break;
            }
        }
    }

    // ------------------------------------------------------------
    // Election (spec §4.3)
    // ------------------------------------------------------------

    fn request_vote(&mut self, req: RequestVoteRequest, tick: &mut Tick) -> Result<MustPersist<RequestVoteResponse>> {
        self.observe_term(req.term, tick);

        let self_voting = self.config.get(self.options.id).map(|s| s.voting).unwrap_or(false);
        let granted = election::should_grant_vote(&self.meta, &self.log, &req, self_voting);

        if granted {
            self.meta.voted_for = Some(req.candidate_id);
            tick.persist_meta = true;
            if let Role::Follower(s) = &mut self.role {
                s.timer = Duration::from_millis(0);
            }
            debug!("server {}: granted vote to {} for term {}", self.options.id, req.candidate_id, req.term);
        }

        Ok(MustPersist::new(RequestVoteResponse { term: self.meta.current_term, granted }))
    }

    fn request_vote_callback(&mut self, from_id: ServerId, resp: RequestVoteResponse, tick: &mut Tick) {
        self.observe_term(resp.term, tick);

        if resp.term != self.meta.current_term {
            return;
        }

        if let Role::Candidate(state) = &mut self.role {
            election::record_vote(state, from_id, resp.granted);

            let self_voting = self.config.get(self.options.id).map(|s| s.voting).unwrap_or(false);
            if election::has_quorum(state, &self.config, self.options.id, self_voting) {
                self.become_leader(tick);
            }
        }
    }

    // ------------------------------------------------------------
    // Replication (spec §4.4)
    // ------------------------------------------------------------

    fn replicate(&mut self, tick: &mut Tick) {
        let progress = match &mut self.role {
            Role::Leader(s) => &mut s.progress,
            _ => return,
        };

        let term = self.meta.current_term;
        let leader_commit = self.meta.commit_index;
        let last_log_index = self.log.last_index();

        for id in self.config.other_servers(self.options.id) {
            let address = self.config.get(id).map(|s| s.address.clone()).unwrap_or_default();
            let p = progress.entry(id).or_insert_with(|| ServerProgress::new(last_log_index));
            let req = replication::build_append_entries(term, self.options.id, leader_commit, &self.log, p, None);
            tick.send(Message { server_id: id, server_address: address, body: MessageBody::AppendEntries(req) });
        }
    }

    fn append_entries(&mut self, req: AppendEntriesRequest, tick: &mut Tick) -> Result<AppendEntriesResponse> {
        self.observe_term(req.term, tick);

        // A candidate observing an AppendEntries at >= its term means
        // another server won the election; step down (spec §4.4
        // "Receiver rules" preamble).
        if req.term >= self.meta.current_term && self.role.is_candidate() {
            self.become_follower(tick);
        }

        let our_term = self.meta.current_term;
        let reject = |last: LogIndex| AppendEntriesResponse { term: our_term, success: false, last_log_index: last };

        if req.term < self.meta.current_term {
            return Ok(reject(self.log.last_index()));
        }

        if let Role::Follower(s) = &mut self.role {
            s.current_leader_id = Some(req.leader_id);
            s.timer = Duration::from_millis(0);
            s.election_timeout_rand = election::sample_election_timeout(self.options.election_timeout_ms);
        }

        if req.prev_log_index > self.log.last_index() {
            return Ok(reject(self.log.last_index()));
        }

        match self.log.term_at(req.prev_log_index) {
            Some(t) if t != req.prev_log_term => {
                if req.prev_log_index <= self.meta.commit_index {
                    self.shut_down = true;
                    error!("server {}: fatal: committed entry at {} conflicts with leader", self.options.id, req.prev_log_index);
                    return Err(ErrorKind::Shutdown(req.prev_log_index, t, req.prev_log_term).into());
                }
                return Ok(reject(self.log.last_index()));
            }
            None => return Ok(reject(self.log.last_index())),
            _ => {}
        }

        let mut last_new = req.prev_log_index;
        for entry in req.entries.into_iter() {
            let index = entry.index;
            match self.log.term_at(index) {
                Some(existing_term) if existing_term == entry.term => {
                    // already matched, nothing to do
                }
                Some(_) => {
                    if index <= self.meta.commit_index {
                        self.shut_down = true;
                        error!("server {}: fatal: committed entry at {} conflicts with leader", self.options.id, index);
                        return Err(ErrorKind::Shutdown(index, self.log.term_at(index).unwrap(), entry.term).into());
                    }
                    self.log.truncate_suffix(index, self.meta.commit_index)?;
                    self.log.append_entry(entry);
                    tick.new_entries = true;
                }
                None => {
                    self.log.append_entry(entry);
                    tick.new_entries = true;
                }
            }
            last_new = index;
        }

        if req.leader_commit > self.meta.commit_index {
            let next_commit = req.leader_commit.min(last_new);
            if next_commit > self.meta.commit_index {
                self.update_commit_index(next_commit, tick);
            }
        }

        Ok(AppendEntriesResponse { term: our_term, success: true, last_log_index: self.log.last_index() })
    }

    fn append_entries_callback(&mut self, from_id: ServerId, resp: AppendEntriesResponse, tick: &mut Tick) {
        self.observe_term(resp.term, tick);

        if resp.term != self.meta.current_term || !self.role.is_leader() {
            return;
        }

        let mut promoted_round_complete = false;

        if let Role::Leader(state) = &mut self.role {
            let progress = state.progress.entry(from_id).or_insert_with(|| ServerProgress::new(0));

            if resp.success {
                replication::on_success(progress, resp.last_log_index);
                if let Some(promotion) = &state.promotion {
                    if promotion.promotee_id == from_id && membership::round_complete(promotion, progress.match_index) {
                        promoted_round_complete = true;
                    }
                }
            } else {
                replication::on_rejection(progress, &resp);
            }
        }

        if promoted_round_complete {
            self.conclude_promotion_round(tick);
        }

        self.recompute_commit_index(tick);

        if !resp.success {
            // Resend immediately to speed up repair (spec §4.4).
            self.replicate_to(from_id, tick);
        }
    }

    fn replicate_to(&mut self, peer: ServerId, tick: &mut Tick) {
        let term = self.meta.current_term;
        let leader_commit = self.meta.commit_index;
        let last_log_index = self.log.last_index();

        let address = self.config.get(peer).map(|s| s.address.clone()).unwrap_or_default();

        if let Role::Leader(state) = &mut self.role {
            let p = state.progress.entry(peer).or_insert_with(|| ServerProgress::new(last_log_index));
            let req = replication::build_append_entries(term, self.options.id, leader_commit, &self.log, p, None);
            tick.send(Message { server_id: peer, server_address: address, body: MessageBody::AppendEntries(req) });
        }
    }

    fn recompute_commit_index(&mut self, tick: &mut Tick) {
        let current_term = self.meta.current_term;
        let commit_index = self.meta.commit_index;
        let self_id = self.options.id;
        let self_voting = self.config.get(self_id).map(|s| s.voting).unwrap_or(false);

        let next = if let Role::Leader(state) = &self.role {
            replication::find_next_commit_index(
                &self.config,
                self_id,
                self_voting,
                current_term,
                commit_index,
                &self.log,
                &state.progress,
            )
        } else {
            None
        };

        if let Some(n) = next {
            self.update_commit_index(n, tick);
        }
    }

    // ------------------------------------------------------------
    // Membership (spec §4.6)
    // ------------------------------------------------------------

    fn start_promotion(&mut self, target: ServerId, tick: &mut Tick) -> Result<()> {
        let descriptor = self.config.get(target).ok_or(ErrorKind::NotFound(target))?.clone();
        if descriptor.voting {
            return Err(ErrorKind::BadRequest(format!("server {} is already voting", target)).into());
        }

        let last_log_index = self.log.last_index();
        if let Role::Leader(state) = &mut self.role {
            if state.promotion.is_some() {
                return Err(ErrorKind::BadRequest("a promotion is already in progress".into()).into());
            }
            state.promotion = Some(membership::start_promotion(target, last_log_index));
        } else {
            return Err(self.not_leader_error());
        }

        self.replicate_to(target, tick);
        Ok(())
    }

    fn conclude_promotion_round(&mut self, tick: &mut Tick) {
        let last_log_index = self.log.last_index();
        let election_timeout_ms = self.options.election_timeout_ms;

        let outcome = if let Role::Leader(state) = &mut self.role {
            state.promotion.as_mut().map(|p| membership::conclude_round(p, election_timeout_ms, last_log_index))
        } else {
            None
        };

        match outcome {
            Some(RoundOutcome::Commit) => {
                let target = if let Role::Leader(state) = &self.role {
                    state.promotion.as_ref().map(|p| p.promotee_id)
                } else {
                    None
                };
                if let Some(target) = target {
                    let mut next = self.config.clone();
                    let _ = next.set_voting(target, true);
                    let _ = self.propose(EntryData::Configuration(next.servers().to_vec()), tick);
                    if let Role::Leader(state) = &mut self.role {
                        state.promotion = None;
                    }
                    info!("server {}: committed promotion of {}", self.options.id, target);
                }
            }
            Some(RoundOutcome::NextRound) => {
                let target = if let Role::Leader(state) = &self.role {
                    state.promotion.as_ref().map(|p| p.promotee_id)
                } else {
                    None
                };
                if let Some(target) = target {
                    self.replicate_to(target, tick);
                }
            }
            None => {}
        }
    }

    fn check_promotion_abort(&mut self, tick: &mut Tick) {
        let election_timeout_ms = self.options.election_timeout_ms;
        let max_rounds = self.options.max_rounds;
        let max_catch_up_ms = self.options.max_catch_up_ms;

        let abort_target = if let Role::Leader(state) = &self.role {
            state.promotion.as_ref().and_then(|p| {
                if membership::should_abort(p, election_timeout_ms, max_rounds, max_catch_up_ms) {
                    Some(p.promotee_id)
                } else {
                    None
                }
            })
        } else {
            None
        };

        if let Some(target) = abort_target {
            if let Role::Leader(state) = &mut self.role {
                state.promotion = None;
            }
            warn!("server {}: aborting promotion of {}: catch-up took too long", self.options.id, target);
            tick.events.push(MembershipEvent::PromotionAborted(target));
        }
    }
}

fn new_follower_state(election_timeout_ms: u64) -> FollowerState {
    FollowerState {
        current_leader_id: None,
        timer: Duration::from_millis(0),
        election_timeout_rand: election::sample_election_timeout(election_timeout_ms.max(1)),
    }
}
