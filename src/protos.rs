//! Wire message and log entry types.
//!
//! Shapes mirror the teacher crate's `protos.rs` (`Metadata`,
//! `LogEntryData`, `AppendEntries*`/`RequestVote*`) narrowed to the
//! four RPCs this spec actually needs, plus an explicit sender
//! envelope (spec §6: "Each envelope additionally carries `server_id`
//! and `server_address` of the sender").

use bytes::Bytes;

/// Type used to uniquely identify each server. Assigned out of band
/// (not by this crate); 0 is reserved to mean "no server" (e.g. an
/// unset `voted_for`).
pub type ServerId = u64;

pub type Term = u64;

pub type LogIndex = u64;

/// One server's roster entry: identity, transport address, and
/// whether it counts towards voting quorums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub id: ServerId,
    pub address: String,
    pub voting: bool,
}

/// The tag half of an entry's `(term, type, payload)` triple (spec
/// §3). Kept distinct from [`EntryData`] so callers can match on type
/// without destructuring the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Command,
    Configuration,
    Noop,
}

/// The payload half of an entry. `Configuration` entries carry the
/// entire new roster rather than an incremental change (unlike the
/// teacher's `LogEntryData::Config(ConfigChange)`): the promotion
/// protocol in spec §4.6 commits "a configuration entry with the
/// target set to voting", i.e. a full snapshot of the roster after
/// the change, which is what `Configuration` applies in place on
/// every server (spec §4.4, "Applier").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntryData {
    /// Occupies a log index without any effect beyond commitment.
    /// Appended once at the start of every leader term so that the
    /// leader-completeness commit rule (spec §9 design note) applies
    /// immediately.
    Noop,
    /// The new roster, applied in place once committed.
    Configuration(Vec<ServerDescriptor>),
    /// Opaque state-machine command. The payload is a `Bytes` slice
    /// of a shared batch allocation (see [`crate::log`]); dropping the
    /// last live slice of a batch releases it.
    #[serde(skip)]
    Command(Bytes),
}

impl EntryData {
    pub fn entry_type(&self) -> EntryType {
        match self {
            EntryData::Noop => EntryType::Noop,
            EntryData::Configuration(_) => EntryType::Configuration,
            EntryData::Command(_) => EntryType::Command,
        }
    }
}

/// One log entry. `(index, term)` uniquely identifies an entry in a
/// healthy cluster's history (spec §3, Log Matching).
#[derive(Debug, Clone)]
pub struct Entry {
    pub index: LogIndex,
    pub term: Term,
    pub data: EntryData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestVoteRequest {
    pub term: Term,
    pub candidate_id: ServerId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestVoteResponse {
    pub term: Term,
    pub granted: bool,
}

#[derive(Debug, Clone)]
pub struct AppendEntriesRequest {
    pub term: Term,
    pub leader_id: ServerId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<Entry>,
    pub leader_commit: LogIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendEntriesResponse {
    pub term: Term,
    pub success: bool,
    pub last_log_index: LogIndex,
}

/// The body of one of the four RPCs this core understands.
#[derive(Debug, Clone)]
pub enum MessageBody {
    RequestVote(RequestVoteRequest),
    RequestVoteResult(RequestVoteResponse),
    AppendEntries(AppendEntriesRequest),
    AppendEntriesResult(AppendEntriesResponse),
}

/// A fully addressed inbound/outbound message: the body plus the
/// identity of the other end of the wire (spec §6: "Each envelope
/// additionally carries `server_id` and `server_address`"). For a
/// message the core hands to the I/O collaborator via `send`, these
/// name the recipient; for a message delivered back to the core via
/// `recv`, they name the sender.
#[derive(Debug, Clone)]
pub struct Message {
    pub server_id: ServerId,
    pub server_address: String,
    pub body: MessageBody,
}
