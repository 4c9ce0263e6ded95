use std::net::{IpAddr, SocketAddr};

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "chatd", version, about = "Line-based multi-channel chat server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "CHATD_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "CHATD_PORT", default_value_t = 6667)]
    pub port: u16,

    /// Listen backlog
    #[arg(long, env = "CHATD_BACKLOG", default_value_t = 128)]
    pub backlog: u32,

    /// Longest accepted input line in bytes
    #[arg(long, env = "CHATD_MAX_LINE_LENGTH", default_value_t = 4096)]
    pub max_line_length: usize,

    /// Lines queued per client before new ones are dropped
    #[arg(long, env = "CHATD_OUTBOUND_CAPACITY", default_value_t = 512, value_parser = clap::value_parser!(u32).range(1..))]
    pub outbound_capacity: u32,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
