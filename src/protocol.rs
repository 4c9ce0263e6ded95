#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetNickname(String),
    JoinChannel(String),
    PrivateMessage { to: String, body: String },
    Broadcast(String),
    /// A `/word` that is not a known command.
    Unknown(String),
    /// A known command missing its argument, e.g. a bare `/nick`.
    Malformed(String),
}

/// Turns one inbound line (newline already stripped) into a [`Command`].
///
/// Lines are split on ASCII whitespace, there is no quoting. Anything not
/// starting with `/` is chat text for the sender's channels.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();

    if !line.starts_with('/') {
        return Command::Broadcast(line.to_string());
    }

    let mut parts = line.split_ascii_whitespace();

    let word = parts.next().map(|w| &w[1..]).unwrap_or("");

    match word {
        "nick" => match parts.next() {
            Some(name) => Command::SetNickname(name.to_string()),
            None => Command::Malformed(word.to_string()),
        },
        "join" => match parts.next() {
            Some(channel) => Command::JoinChannel(channel.to_string()),
            None => Command::Malformed(word.to_string()),
        },
        "privmsg" => match parts.next() {
            Some(to) => Command::PrivateMessage {
                to: to.to_string(),
                body: parts.collect::<Vec<_>>().join(" "),
            },
            None => Command::Malformed(word.to_string()),
        },
        _ => Command::Unknown(word.to_string()),
    }
}
