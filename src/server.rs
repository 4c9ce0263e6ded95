use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_stream::{Stream, StreamExt, StreamMap};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::conn::{ConnId, Connection, Outbound, Push};
use crate::protocol::parse_command;
use crate::router::{self, Delivery};
use crate::state::ServerState;

pub const WELCOME: &str = "Please set your nickname using /nick <nickname>";

enum Inbound {
    Line(String),
    Failed(LinesCodecError),
    Eof,
}

type InboundStream = Pin<Box<dyn Stream<Item = Inbound> + Send>>;

/// The event loop. Owns the registry and channel table; nothing else touches
/// them, so no locking is needed.
pub struct Server {
    listener: TcpListener,
    config: Config,
    state: ServerState,
    readers: StreamMap<ConnId, InboundStream>,
    next_id: u64,
}

pub async fn run(config: Config) -> Result<()> {
    Server::bind(config)?.serve().await
}

impl Server {
    pub fn bind(config: Config) -> Result<Self> {
        let addr = config.listen_addr();

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .context("creating listener socket")?;

        socket.set_reuseaddr(true)?;
        socket
            .bind(addr)
            .with_context(|| format!("binding {addr}"))?;

        let listener = socket
            .listen(config.backlog)
            .with_context(|| format!("listening on {addr}"))?;

        Ok(Self {
            listener,
            config,
            state: ServerState::new(),
            readers: StreamMap::new(),
            next_id: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(mut self) -> Result<()> {
        info!("server running on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => self.accept(socket, peer),
                    Err(err) => {
                        warn!("accept failed: {err}");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },

                Some((id, event)) = self.readers.next(), if !self.readers.is_empty() => {
                    self.service(id, event);
                }
            }
        }
    }

    fn accept(&mut self, socket: TcpStream, peer: SocketAddr) {
        self.next_id += 1;
        let id = ConnId::new(self.next_id);

        let (reader, writer) = socket.into_split();

        let outbound = Outbound::spawn(id, writer, self.config.outbound_capacity as usize);

        let codec = LinesCodec::new_with_max_length(self.config.max_line_length);
        let lines = FramedRead::new(reader, codec)
            .map(|res| match res {
                Ok(line) => Inbound::Line(line),
                Err(err) => Inbound::Failed(err),
            })
            .chain(tokio_stream::once(Inbound::Eof));
        self.readers.insert(id, Box::pin(lines));

        let conn = Connection::new(peer, outbound);
        conn.outbound.push(WELCOME.to_string());
        self.state.insert_connection(id, conn);

        info!(conn = %id, %peer, clients = self.state.connection_count(), "client connected");
    }

    fn service(&mut self, id: ConnId, event: Inbound) {
        match event {
            Inbound::Line(line) => {
                if line.trim().is_empty() {
                    return;
                }

                let cmd = parse_command(&line);
                debug!(conn = %id, ?cmd, "command");

                let deliveries = router::route(&mut self.state, id, cmd);
                self.deliver(deliveries);
            }
            Inbound::Failed(err) => {
                warn!(conn = %id, "read failed: {err}");
                self.close(id);
            }
            Inbound::Eof => self.close(id),
        }
    }

    fn deliver(&mut self, deliveries: Vec<Delivery>) {
        let mut dead = Vec::new();

        for Delivery { to, text } in deliveries {
            let Some(conn) = self.state.get(to) else {
                continue;
            };

            match conn.outbound.push(text) {
                Push::Queued => {}
                Push::Dropped => warn!(conn = %to, "outbound queue full, dropping line"),
                Push::Closed => dead.push(to),
            }
        }

        for id in dead {
            self.close(id);
        }
    }

    /// Safe to call more than once for the same id.
    fn close(&mut self, id: ConnId) {
        self.readers.remove(&id);

        if let Some(conn) = self.state.remove_connection(id) {
            conn.outbound.close();

            info!(
                conn = %id,
                peer = %conn.peer,
                nick = conn.display_nick(),
                clients = self.state.connection_count(),
                "client disconnected"
            );
        }
    }
}
