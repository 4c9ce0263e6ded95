use tracing::debug;

use crate::conn::ConnId;
use crate::protocol::Command;
use crate::state::{Joined, ServerState};

/// One line owed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ConnId,
    pub text: String,
}

impl Delivery {
    fn new(to: ConnId, text: impl Into<String>) -> Self {
        Self {
            to,
            text: text.into(),
        }
    }
}

/// Applies `cmd` from `from` to the state and returns what must be sent
/// where. Does no I/O. A sender that is not registered gets nothing.
pub fn route(state: &mut ServerState, from: ConnId, cmd: Command) -> Vec<Delivery> {
    if state.get(from).is_none() {
        return Vec::new();
    }

    match cmd {
        Command::SetNickname(name) => {
            let text = format!("Nickname set to {name}");
            state.set_nick(from, name);
            vec![Delivery::new(from, text)]
        }

        Command::JoinChannel(name) => join(state, from, &name),

        Command::PrivateMessage { to, body } => {
            let Some(sender) = state.get(from) else {
                return Vec::new();
            };

            match state.find_by_nick(&to) {
                Some(target) => vec![Delivery::new(
                    target,
                    format!("Private message from {}: {body}", sender.display_nick()),
                )],
                None => vec![Delivery::new(from, format!("User {to} not found"))],
            }
        }

        Command::Broadcast(body) => broadcast(state, from, &body),

        Command::Unknown(word) => {
            debug!(conn = %from, "ignoring unknown command /{word}");
            Vec::new()
        }

        Command::Malformed(word) => {
            debug!(conn = %from, "ignoring /{word} without argument");
            Vec::new()
        }
    }
}

fn join(state: &mut ServerState, from: ConnId, name: &str) -> Vec<Delivery> {
    let Some(joined) = state.join(from, name) else {
        return Vec::new();
    };

    let notice = match joined {
        Joined::Created => format!("Created new channel {name}"),
        Joined::Existing => format!("Joined existing channel {name}"),
    };

    let mut out = vec![Delivery::new(from, notice)];

    let (Some(sender), Some(channel)) = (state.get(from), state.channel(name)) else {
        return out;
    };

    debug!(
        conn = %from,
        channel = name,
        members = channel.len(),
        channels = state.channel_count(),
        "joined"
    );

    let announce = format!("{name}: {} has joined {name}", sender.display_nick());

    out.extend(channel.members().map(|id| Delivery::new(id, announce.as_str())));

    out
}

fn broadcast(state: &ServerState, from: ConnId, body: &str) -> Vec<Delivery> {
    let Some(sender) = state.get(from) else {
        return Vec::new();
    };

    let nick = sender.display_nick();

    let mut out = Vec::new();

    for name in &sender.channels {
        let Some(channel) = state.channel(name) else {
            continue;
        };

        let text = format!("{name} <{nick}> {body}");

        out.extend(
            channel
                .members()
                .filter(|&id| id != from)
                .map(|id| Delivery::new(id, text.as_str())),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::{Connection, Outbound};
    use crate::protocol::parse_command;
    use tokio::sync::mpsc;

    const A: ConnId = ConnId::new(1);
    const B: ConnId = ConnId::new(2);
    const C: ConnId = ConnId::new(3);

    fn state_with(ids: &[ConnId]) -> ServerState {
        let mut state = ServerState::new();
        for &id in ids {
            let (tx, _rx) = mpsc::channel(8);
            let peer = "127.0.0.1:9000".parse().unwrap();
            state.insert_connection(id, Connection::new(peer, Outbound::new(tx)));
        }
        state
    }

    fn send(state: &mut ServerState, from: ConnId, line: &str) -> Vec<Delivery> {
        route(state, from, parse_command(line))
    }

    fn d(to: ConnId, text: &str) -> Delivery {
        Delivery::new(to, text)
    }

    #[test]
    fn nick_confirms_to_sender() {
        let mut state = state_with(&[A]);

        assert_eq!(send(&mut state, A, "/nick alice"), vec![d(A, "Nickname set to alice")]);
        assert_eq!(send(&mut state, A, "/nick al"), vec![d(A, "Nickname set to al")]);
        assert_eq!(state.get(A).unwrap().nick.as_deref(), Some("al"));
    }

    #[test]
    fn first_join_creates_and_announces() {
        let mut state = state_with(&[A]);
        send(&mut state, A, "/nick alice");

        assert_eq!(
            send(&mut state, A, "/join general"),
            vec![
                d(A, "Created new channel general"),
                d(A, "general: alice has joined general"),
            ]
        );
    }

    #[test]
    fn second_join_announces_to_all_members() {
        let mut state = state_with(&[A, B]);
        send(&mut state, A, "/nick alice");
        send(&mut state, A, "/join general");
        send(&mut state, B, "/nick bob");

        assert_eq!(
            send(&mut state, B, "/join general"),
            vec![
                d(B, "Joined existing channel general"),
                d(A, "general: bob has joined general"),
                d(B, "general: bob has joined general"),
            ]
        );
    }

    #[test]
    fn join_without_nick_shows_none() {
        let mut state = state_with(&[A]);

        let out = send(&mut state, A, "/join lobby");
        assert_eq!(out[1], d(A, "lobby: None has joined lobby"));
    }

    #[test]
    fn broadcast_skips_sender_and_reaches_others_once() {
        let mut state = state_with(&[A, B, C]);
        send(&mut state, B, "/nick bob");
        for id in [A, B, C] {
            send(&mut state, id, "/join general");
        }
        send(&mut state, B, "/join general");

        assert_eq!(
            send(&mut state, B, "hello"),
            vec![d(A, "general <bob> hello"), d(C, "general <bob> hello")]
        );
    }

    #[test]
    fn broadcast_goes_to_each_shared_channel() {
        let mut state = state_with(&[A, B]);
        send(&mut state, A, "/nick alice");
        send(&mut state, A, "/join x");
        send(&mut state, A, "/join y");
        send(&mut state, B, "/join y");

        assert_eq!(send(&mut state, A, "hi"), vec![d(B, "y <alice> hi")]);
    }

    #[test]
    fn broadcast_without_channels_delivers_nothing() {
        let mut state = state_with(&[A, B]);

        assert!(send(&mut state, A, "anyone?").is_empty());
    }

    #[test]
    fn removed_member_no_longer_receives() {
        let mut state = state_with(&[A, B]);
        send(&mut state, A, "/join x");
        send(&mut state, A, "/join y");
        send(&mut state, B, "/join x");
        send(&mut state, B, "/join y");

        state.remove_connection(A);

        assert!(send(&mut state, B, "still there?").is_empty());
    }

    #[test]
    fn private_message_ignores_channels() {
        let mut state = state_with(&[A, B]);
        send(&mut state, A, "/nick alice");
        send(&mut state, B, "/nick bob");

        assert_eq!(
            send(&mut state, A, "/privmsg bob secret"),
            vec![d(B, "Private message from alice: secret")]
        );
    }

    #[test]
    fn private_message_to_unknown_nick() {
        let mut state = state_with(&[A, B]);
        send(&mut state, A, "/nick alice");
        send(&mut state, B, "/nick bob");

        assert_eq!(
            send(&mut state, A, "/privmsg carol hi"),
            vec![d(A, "User carol not found")]
        );
    }

    #[test]
    fn private_message_to_duplicate_nick_hits_earliest() {
        let mut state = state_with(&[A, B, C]);
        send(&mut state, C, "/nick bob");
        send(&mut state, B, "/nick bob");

        assert_eq!(send(&mut state, A, "/privmsg bob yo"), vec![d(B, "Private message from None: yo")]);
    }

    #[test]
    fn ignored_commands_deliver_nothing() {
        let mut state = state_with(&[A]);

        assert!(send(&mut state, A, "/nick").is_empty());
        assert!(send(&mut state, A, "/part general").is_empty());
        assert_eq!(state.get(A).unwrap().nick, None);
        assert_eq!(state.channel_count(), 0);
    }

    #[test]
    fn unregistered_sender_is_ignored() {
        let mut state = state_with(&[A]);

        assert!(send(&mut state, B, "/join x").is_empty());
        assert_eq!(state.channel_count(), 0);
    }
}
