//! Chat relay and slash commands
//!
//! A message starting with `/` is never relayed. It is looked up in a fixed
//! command table by exact match and answered with whispers to the sender.
//! Everything else is broadcast as received.

use crate::session::SessionRegistry;
use log::{info, warn};
use shared::ChatMessage;

const CLEAR_LINES: usize = 25;

const BEE_MOVIE: &str = "🐝 According to all known laws of aviation, there is no way a bee \
should be able to fly. Its wings are too small to get its fat little body off the ground. \
The bee, of course, flies anyway because bees don't care what humans think is impossible.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Kill,
    Ping,
    Version,
    Bee,
    Clear,
    Unknown,
}

impl Command {
    pub const ALL: [(&'static str, Command); 6] = [
        ("/help", Command::Help),
        ("/kill", Command::Kill),
        ("/ping", Command::Ping),
        ("/version", Command::Version),
        ("/bee", Command::Bee),
        ("/clear", Command::Clear),
    ];

    /// Returns `None` for plain chat. Arguments are not supported, so
    /// `/kill me` is an unknown command.
    pub fn parse(message: &str) -> Option<Command> {
        if !message.starts_with('/') {
            return None;
        }
        let command = Self::ALL
            .iter()
            .find(|(name, _)| *name == message)
            .map(|(_, command)| *command)
            .unwrap_or(Command::Unknown);
        Some(command)
    }
}

/// What a command asks the game to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandReply {
    /// Delivered only to the issuing connection, in order.
    pub whispers: Vec<String>,
    /// System line for every connection.
    pub announcement: Option<String>,
    /// Set when server state changed and the cleanup sweep must run now.
    pub run_cleanup: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Relay(ChatMessage),
    Command(CommandReply),
    /// Clients may not speak with the system id.
    Rejected,
}

/// Routes one validated chat message, applying command side effects to
/// `sessions`.
pub fn process(
    msg: ChatMessage,
    sessions: &mut SessionRegistry,
    game_version: &str,
) -> ChatOutcome {
    if msg.is_system() {
        warn!("Dropped chat message impersonating the server: {:?}", msg.message);
        return ChatOutcome::Rejected;
    }

    let Some(command) = Command::parse(&msg.message) else {
        info!("{}: {}", msg.name, msg.message);
        return ChatOutcome::Relay(msg);
    };

    let text = msg.message.as_str();
    let mut reply = CommandReply::default();
    match command {
        Command::Help => {
            let names: Vec<&str> = Command::ALL.iter().map(|(name, _)| *name).collect();
            reply
                .whispers
                .push(format!("{} -> commands: {}", text, names.join(", ")));
        }
        Command::Kill => {
            // Ignored for ids without a session.
            if let Some(player) = sessions.get_mut(msg.id) {
                player.health = 0.0;
                reply
                    .whispers
                    .push(format!("{} -> killed {}", text, player.name));
                reply.announcement = Some(format!("{} killed himself", player.name));
                reply.run_cleanup = true;
                info!("{}({}) used /kill", player.name, player.id);
            }
        }
        Command::Ping => reply.whispers.push(format!("{} -> pong!", text)),
        Command::Version => reply
            .whispers
            .push(format!("{} -> running {}", text, game_version)),
        Command::Bee => reply.whispers.push(format!("{} -> {}", text, BEE_MOVIE)),
        Command::Clear => {
            reply.whispers.extend(std::iter::repeat(String::new()).take(CLEAR_LINES));
            reply.whispers.push(format!("{} -> chat cleared", text));
        }
        Command::Unknown => reply
            .whispers
            .push(format!("{} -> unknown command.", text)),
    }
    ChatOutcome::Command(reply)
}
