//! The I/O collaborator contract (spec §6, §9 design note).
//!
//! Grounded on the design note's "small capability trait with four
//! methods (log append, state write, message send, apply), each
//! returning an asynchronous completion identity that feeds one
//! inbound dispatch on the core", and on the callback shapes exercised
//! by the C library's `test/unit/test_io_stub.c` fixture
//! (`tick_cb`/`recv_cb`/`append_cb`/`send_cb`).
//!
//! This crate does not implement an `Io`; it only defines the trait
//! the core is driven against. On-disk logs, network transports, and
//! the reference stub used for testing are all out of scope (spec
//! §1) and live outside this crate (the in-crate `tests/` harness
//! implements a minimal one for its own use).

use crate::protos::{Entry, Message, ServerId};

/// Opaque identity of one in-flight asynchronous operation. The core
/// never inspects this value; it only threads it back to itself
/// unchanged, via the matching `*_done` call, so that a completion
/// can be correlated without the collaborator ever handing the core a
/// pointer it would have to track the lifetime of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionId(pub u64);

/// Status of a completed I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
}

/// The boundary the consensus core consumes. A real implementation
/// durably persists term/vote/log state, performs network sends, and
/// applies committed entries to a user state machine; none of that
/// behavior is specified here (spec §1).
pub trait Io {
    /// Durably writes `current_term`/`voted_for`. Spec §6
    /// `set_term`/`set_vote` folded into one call since both must be
    /// durable before any outbound message reflecting them is
    /// released (spec §3 "Persistent state" monotonic invariant).
    fn persist_meta(&mut self, current_term: u64, voted_for: Option<ServerId>) -> CompletionId;

    /// Durably appends `entries` to the log. Completion is the signal
    /// to advance `match_index` for self (spec §6 `append`).
    fn append(&mut self, entries: &[Entry]) -> CompletionId;

    /// Best-effort delivery of one outbound message (spec §6 `send`).
    /// Failures are non-fatal; the replication layer retries on the
    /// next heartbeat/repair cycle.
    fn send(&mut self, message: Message) -> CompletionId;

    /// Delivers one committed entry to the user state machine, in
    /// commit order (spec §4.4 "Applier").
    fn apply(&mut self, entry: &Entry) -> CompletionId;
}
