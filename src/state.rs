use std::collections::BTreeMap;

use crate::channel::Channel;
use crate::conn::{ConnId, Connection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joined {
    Created,
    Existing,
}

/// Connection registry and channel table. Owned by the event loop; every
/// channel member is also a key of `connections`.
#[derive(Debug, Default)]
pub struct ServerState {
    connections: BTreeMap<ConnId, Connection>,
    channels: BTreeMap<String, Channel>,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_connection(&mut self, id: ConnId, conn: Connection) {
        self.connections.insert(id, conn);
    }

    pub fn get(&self, id: ConnId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Unregisters `id` from all of its channels and the registry. A second
    /// call for the same id returns `None`.
    pub fn remove_connection(&mut self, id: ConnId) -> Option<Connection> {
        let conn = self.connections.remove(&id)?;

        for name in &conn.channels {
            if let Some(ch) = self.channels.get_mut(name) {
                ch.remove(id);
            }
        }

        Some(conn)
    }

    /// Returns the previous nickname, if any.
    pub fn set_nick(&mut self, id: ConnId, nick: String) -> Option<String> {
        let conn = self.connections.get_mut(&id)?;
        conn.nick.replace(nick)
    }

    /// Adds `id` to `name`, creating the channel on first use. `None` if `id`
    /// is not registered.
    pub fn join(&mut self, id: ConnId, name: &str) -> Option<Joined> {
        let conn = self.connections.get_mut(&id)?;

        let joined = if self.channels.contains_key(name) {
            Joined::Existing
        } else {
            self.channels.insert(name.to_string(), Channel::new());
            Joined::Created
        };

        if let Some(ch) = self.channels.get_mut(name) {
            ch.add(id);
        }
        conn.channels.insert(name.to_string());

        Some(joined)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Earliest registered connection using `nick`.
    pub fn find_by_nick(&self, nick: &str) -> Option<ConnId> {
        self.connections
            .iter()
            .find(|(_, c)| c.nick.as_deref() == Some(nick))
            .map(|(id, _)| *id)
    }
}
