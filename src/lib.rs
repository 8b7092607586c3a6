//! A deterministic, I/O-agnostic Raft consensus core.
//!
//! This crate implements leader election, log replication, commit-index
//! advancement, and single-server membership change. It produces no
//! side effects of its own: every outcome — a log append, a network
//! send, a state-machine apply — is returned from one of the three
//! public entry points (`ConsensusModule::tick`, `ConsensusModule::recv`,
//! `ConsensusModule::submit`) as a [`consensus::Tick`] for the caller to
//! carry out against its own [`io::Io`] collaborator.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate serde_derive;

extern crate bytes;
extern crate rand;
extern crate serde;

pub mod errors;

pub mod protos;

mod config;
mod constraint;
mod election;
// Named `log` after the in-memory replicated log it implements; call
// sites that also want the `log` logging crate's macros reach it as
// `::log::{debug, info, ...}` to keep the two apart.
pub mod log;
mod membership;
mod replication;
mod state;
mod tick;

pub mod consensus;
pub mod io;

pub use config::Configuration;
pub use consensus::{ConsensusModule, Options, Proposal, Tick};
pub use errors::{Error, ErrorKind, Result};
pub use membership::{MembershipEvent, MembershipRequest};
pub use state::{Metadata, Role};
