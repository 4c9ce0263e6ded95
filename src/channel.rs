use std::collections::BTreeSet;

use crate::conn::ConnId;

#[derive(Debug, Default)]
pub struct Channel {
    members: BTreeSet<ConnId>,
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `id` was already a member.
    pub fn add(&mut self, id: ConnId) -> bool {
        self.members.insert(id)
    }

    pub fn remove(&mut self, id: ConnId) -> bool {
        self.members.remove(&id)
    }

    pub fn members(&self) -> impl Iterator<Item = ConnId> + '_ {
        self.members.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}
