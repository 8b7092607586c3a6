//! Shared scaffolding for the scenario and property tests: builds a
//! bootstrapped cluster of [`raft_core::ConsensusModule`]s and an
//! in-memory message queue standing in for the transport, modeled on
//! the C library's `test/unit/test_io_stub.c` stub-I/O fixture but
//! re-expressed as a plain Rust harness rather than translated.

#![allow(dead_code)]

use raft_core::log::Log;
use raft_core::protos::{Entry, EntryData, Message, MessageBody, ServerDescriptor};
use raft_core::{ConsensusModule, Configuration, Metadata, Options};

/// One cluster member's full roster entry, the form every test builds
/// its `Configuration` from.
#[derive(Debug, Clone, Copy)]
pub struct Member {
    pub id: u64,
    pub voting: bool,
}

pub fn member(id: u64, voting: bool) -> Member {
    Member { id, voting }
}

fn address(id: u64) -> String {
    format!("127.0.0.1:{}", 10_000 + id)
}

pub fn configuration(members: &[Member]) -> Configuration {
    let mut cfg = Configuration::new();
    for m in members {
        cfg.add(m.id, address(m.id), m.voting).unwrap();
    }
    cfg
}

/// A log bootstrapped with a single configuration entry at index 1,
/// term 1 (spec §6 `bootstrap(configuration)`), the state every fresh
/// server in these tests starts from.
pub fn bootstrap_log(members: &[Member]) -> Log {
    let descriptors: Vec<ServerDescriptor> = members
        .iter()
        .map(|m| ServerDescriptor { id: m.id, address: address(m.id), voting: m.voting })
        .collect();
    Log::restore(
        1,
        vec![Entry { index: 1, term: 1, data: EntryData::Configuration(descriptors) }],
    )
}

/// Builds one server already past bootstrap: term 1, the bootstrap
/// entry committed and applied, role `Follower`.
pub fn build_server(id: u64, members: &[Member], election_timeout_ms: u64, heartbeat_timeout_ms: u64) -> ConsensusModule {
    let options = Options::new(id, address(id), election_timeout_ms, heartbeat_timeout_ms).unwrap();
    let meta = Metadata { current_term: 1, voted_for: None, commit_index: 1 };
    let log = bootstrap_log(members);
    let config = configuration(members);
    ConsensusModule::new(options, meta, log, config)
}

/// Ticks `module` with a duration guaranteed to exceed the randomized
/// election timeout range `[election_timeout_ms, 2*election_timeout_ms)`
/// no matter what was sampled, forcing a follower or candidate to
/// advance past its timer deterministically.
pub fn tick_past_election_timeout(module: &mut ConsensusModule, election_timeout_ms: u64) -> raft_core::Tick {
    module.tick(2 * election_timeout_ms + 1).unwrap()
}

/// Convenience: the first `RequestVote` found in a batch of outbound
/// messages addressed to `to`.
pub fn request_vote_to(tick: &raft_core::Tick, to: u64) -> Option<raft_core::protos::RequestVoteRequest> {
    tick.messages.iter().find_map(|m| {
        if m.server_id == to {
            if let MessageBody::RequestVote(req) = &m.body {
                return Some(req.clone());
            }
        }
        None
    })
}

pub fn envelope_from(server_id: u64, body: MessageBody) -> Message {
    Message { server_id, server_address: address(server_id), body }
}
