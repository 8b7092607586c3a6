//! Configuration component (spec §4.1): an ordered roster of servers
//! with identity, address, and voting flag, plus quorum arithmetic.
//!
//! Grounded on the teacher's `protos::Configuration` (two `HashSet`s
//! of member/learner ids), generalized to the spec's ordered roster
//! since the spec additionally requires position lookups
//! (`index(id)`) that a hash-set model can't give, and since address
//! is carried per server rather than looked up elsewhere.

use crate::errors::*;
use crate::protos::{ServerDescriptor, ServerId};

/// A snapshot of the cluster roster. Treated as immutable between
/// mutations (spec §4.1): every quorum computation reads a stable
/// `&Configuration` rather than racing a mutator.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    servers: Vec<ServerDescriptor>,
}

impl Configuration {
    pub fn new() -> Self {
        Configuration { servers: Vec::new() }
    }

    pub fn from_servers(servers: Vec<ServerDescriptor>) -> Self {
        Configuration { servers }
    }

    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    pub fn get(&self, id: ServerId) -> Option<&ServerDescriptor> {
        self.servers.iter().find(|s| s.id == id)
    }

    /// Position of `id` in the roster, if present.
    pub fn index(&self, id: ServerId) -> Option<usize> {
        self.servers.iter().position(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Number of servers with `voting = true`.
    pub fn n_voting(&self) -> usize {
        self.servers.iter().filter(|s| s.voting).count()
    }

    /// The voting quorum size: `floor(n_voting / 2) + 1`.
    pub fn quorum(&self) -> usize {
        self.n_voting() / 2 + 1
    }

    /// Ids of every other voting server besides `self_id`.
    pub fn other_voters(&self, self_id: ServerId) -> Vec<ServerId> {
        self.servers
            .iter()
            .filter(|s| s.voting && s.id != self_id)
            .map(|s| s.id)
            .collect()
    }

    /// Ids of every other server (voting or not) besides `self_id`,
    /// used when replicating entries (followers and learners alike
    /// need the log even if they don't vote).
    pub fn other_servers(&self, self_id: ServerId) -> Vec<ServerId> {
        self.servers
            .iter()
            .filter(|s| s.id != self_id)
            .map(|s| s.id)
            .collect()
    }

    pub fn add(&mut self, id: ServerId, address: String, voting: bool) -> Result<()> {
        if self.get(id).is_some() {
            return Err(ErrorKind::DuplicateId(id).into());
        }
        self.servers.push(ServerDescriptor { id, address, voting });
        Ok(())
    }

    pub fn remove(&mut self, id: ServerId) -> Result<()> {
        let idx = self.index(id).ok_or_else(|| ErrorKind::NotFound(id))?;
        self.servers.remove(idx);
        Ok(())
    }

    /// Used by promotion (spec §4.6) to flip a learner to a full
    /// voting member once it has caught up.
    pub fn set_voting(&mut self, id: ServerId, voting: bool) -> Result<()> {
        let idx = self.index(id).ok_or_else(|| ErrorKind::NotFound(id))?;
        self.servers[idx].voting = voting;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(ids: &[(u64, bool)]) -> Configuration {
        let mut c = Configuration::new();
        for (id, voting) in ids {
            c.add(*id, format!("addr-{}", id), *voting).unwrap();
        }
        c
    }

    #[test]
    fn quorum_arithmetic() {
        assert_eq!(cfg(&[(1, true)]).quorum(), 1);
        assert_eq!(cfg(&[(1, true), (2, true)]).quorum(), 2);
        assert_eq!(cfg(&[(1, true), (2, true), (3, true)]).quorum(), 2);
        assert_eq!(cfg(&[(1, true), (2, true), (3, true), (4, true)]).quorum(), 3);
        // Learners don't count.
        assert_eq!(cfg(&[(1, true), (2, true), (3, false)]).quorum(), 2);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut c = cfg(&[(1, true)]);
        assert!(c.add(1, "x".into(), true).is_err());
    }

    #[test]
    fn remove_missing_rejected() {
        let mut c = cfg(&[(1, true)]);
        assert!(c.remove(2).is_err());
    }

    #[test]
    fn index_lookup() {
        let c = cfg(&[(5, true), (7, true)]);
        assert_eq!(c.index(5), Some(0));
        assert_eq!(c.index(7), Some(1));
        assert_eq!(c.index(9), None);
    }
}
