//! Property tests over random schedules (spec §8 "Invariants").
//!
//! Drives a small in-memory cluster through a proptest-generated
//! interleaving of ticks, message deliveries, and client submissions,
//! and checks invariants that must hold no matter the schedule: term
//! monotonicity, vote uniqueness, election safety, and state machine
//! safety. Modeled on the C library's `test/unit/test_io_stub.c`
//! stub-I/O fixture, re-expressed as an in-process harness.

mod common;

use std::collections::HashMap;

use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use common::*;
use raft_core::protos::{Message, ServerId, Term};
use raft_core::ConsensusModule;

const ELECTION_MS: u64 = 50;
const HEARTBEAT_MS: u64 = 10;
const N: usize = 3;

struct Cluster {
    nodes: Vec<ConsensusModule>,
    /// In-flight messages, FIFO overall (not per-destination, but
    /// relative order per (sender, destination) pair is preserved
    /// since each node's Tick enqueues its outbound messages in the
    /// order it issued them -- spec §5 ordering guarantee).
    queue: Vec<Message>,
    /// Highest `current_term` any node has ever been observed to
    /// hold, used to assert monotonicity per node instead.
    last_term: Vec<Term>,
    /// term -> the one server id that has become Leader in it
    /// (spec §8 invariant 1, Election Safety).
    leaders_by_term: HashMap<Term, ServerId>,
    /// (server, term) -> the one candidate id it voted for
    /// (spec §8 invariant 7, Vote Uniqueness).
    votes: HashMap<(ServerId, Term), ServerId>,
    /// index -> (term, payload-length fingerprint) of the entry every
    /// node that has applied that index agrees on (spec §8 invariant
    /// 5, State Machine Safety). Payload length is a cheap stand-in
    /// for content equality good enough for the synthetic commands
    /// this harness submits.
    applied: HashMap<u64, (Term, usize)>,
}

impl Cluster {
    fn new() -> Self {
        let members: Vec<Member> = (1..=N as u64).map(|id| member(id, true)).collect();
        let nodes: Vec<ConsensusModule> =
            (1..=N as u64).map(|id| build_server(id, &members, ELECTION_MS, HEARTBEAT_MS)).collect();
        Cluster {
            last_term: nodes.iter().map(|n| n.meta().current_term).collect(),
            nodes,
            queue: Vec::new(),
            leaders_by_term: HashMap::new(),
            votes: HashMap::new(),
            applied: HashMap::new(),
        }
    }

    fn check_node_invariants(&mut self, idx: usize) {
        let node = &self.nodes[idx];
        let id = node.id();
        let term = node.meta().current_term;

        assert!(term >= self.last_term[idx], "term went backwards on node {}", id);
        self.last_term[idx] = term;

        if let Some(voted_for) = node.meta().voted_for {
            let prior = self.votes.entry((id, term)).or_insert(voted_for);
            assert_eq!(*prior, voted_for, "node {} voted for two different candidates in term {}", id, term);
        }

        if node.role().is_leader() {
            let prior = self.leaders_by_term.entry(term).or_insert(id);
            assert_eq!(*prior, id, "two leaders in term {}: {} and {}", term, prior, id);
        }
    }

    fn absorb(&mut self, idx: usize, tick: raft_core::Tick) {
        let id = self.nodes[idx].id();
        for entry in &tick.applies {
            let fingerprint = match &entry.data {
                raft_core::protos::EntryData::Command(b) => b.len(),
                raft_core::protos::EntryData::Noop => usize::MAX,
                raft_core::protos::EntryData::Configuration(v) => v.len(),
            };
            let seen = (entry.term, fingerprint);
            let prior = *self.applied.entry(entry.index).or_insert(seen);
            assert_eq!(
                prior, seen,
                "node {} applied a different entry at index {} than an earlier applier",
                id, entry.index
            );
        }
        self.queue.extend(tick.messages);
        self.check_node_invariants(idx);
    }

    fn do_tick(&mut self, idx: usize, ms: u64) {
        let tick = self.nodes[idx].tick(ms).unwrap();
        self.absorb(idx, tick);
    }

    fn deliver_one(&mut self, pick: usize) {
        if self.queue.is_empty() {
            return;
        }
        let msg = self.queue.remove(pick % self.queue.len());
        let to = msg.server_id as usize - 1;
        if to >= self.nodes.len() {
            return;
        }
        let tick = self.nodes[to].recv(msg).unwrap();
        self.absorb(to, tick);
    }

    fn submit(&mut self, idx: usize, payload: &'static [u8]) {
        if let Ok((_, tick)) = self.nodes[idx].submit(bytes::Bytes::from_static(payload)) {
            self.absorb(idx, tick);
        }
    }
}

#[derive(Debug, Clone)]
enum Action {
    Tick { node: usize, ms: u64 },
    Deliver { pick: usize },
    Submit { node: usize },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..N, 1u64..150).prop_map(|(node, ms)| Action::Tick { node, ms }),
        (0usize..64).prop_map(|pick| Action::Deliver { pick }),
        (0..N).prop_map(|node| Action::Submit { node }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Runs a random schedule of ticks, message deliveries, and
    /// client submissions across a 3-node cluster and checks that
    /// term monotonicity, vote uniqueness, election safety, and
    /// state machine safety all hold throughout (spec §8 invariants
    /// 1, 5, 6, 7).
    #[test]
    fn random_schedule_preserves_safety(actions in prop_vec(action_strategy(), 1..300)) {
        let mut cluster = Cluster::new();
        for action in actions {
            match action {
                Action::Tick { node, ms } => cluster.do_tick(node, ms),
                Action::Deliver { pick } => cluster.deliver_one(pick),
                Action::Submit { node } => cluster.submit(node, b"payload"),
            }
        }
    }
}
