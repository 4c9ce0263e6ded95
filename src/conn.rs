use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

/// How an unset nickname is shown to other clients.
pub const UNSET_NICK: &str = "None";

/// Opaque connection handle, handed out in accept order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(u64);

impl ConnId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of queueing a line for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Queued,
    /// Queue full; the line was dropped.
    Dropped,
    /// Writer is gone; the connection should be reaped.
    Closed,
}

#[derive(Debug)]
pub struct Outbound {
    tx: mpsc::Sender<String>,
    writer: Option<AbortHandle>,
}

impl Outbound {
    /// Spawns the writer task for `writer` behind a queue of `capacity` lines.
    pub fn spawn(id: ConnId, writer: OwnedWriteHalf, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(write_lines(id, writer, rx));

        Self {
            tx,
            writer: Some(task.abort_handle()),
        }
    }

    #[cfg(test)]
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx, writer: None }
    }

    pub fn push(&self, line: String) -> Push {
        match self.tx.try_send(line) {
            Ok(()) => Push::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Push::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => Push::Closed,
        }
    }

    /// Stops the writer task even if it is stuck on a peer that stopped
    /// reading. Queued lines are discarded and the write half is released.
    pub fn close(&self) {
        if let Some(writer) = &self.writer {
            writer.abort();
        }
    }
}

/// A registered client.
#[derive(Debug)]
pub struct Connection {
    pub peer: SocketAddr,
    pub nick: Option<String>,
    pub channels: BTreeSet<String>,
    pub outbound: Outbound,
}

impl Connection {
    pub fn new(peer: SocketAddr, outbound: Outbound) -> Self {
        Self {
            peer,
            nick: None,
            channels: BTreeSet::new(),
            outbound,
        }
    }

    /// Nickname as shown to other clients.
    pub fn display_nick(&self) -> &str {
        self.nick.as_deref().unwrap_or(UNSET_NICK)
    }
}

/// Drains `rx` onto the socket, one line per message. Returns when every
/// sender is gone or a write fails; either way the write half is dropped.
async fn write_lines(id: ConnId, mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<String>) {
    while let Some(line) = rx.recv().await {
        let res = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await
        }
        .await;

        if let Err(err) = res {
            debug!(conn = %id, "write failed: {err}");
            return;
        }
    }

    let _ = writer.shutdown().await;
}
