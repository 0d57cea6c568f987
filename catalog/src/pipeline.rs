use std::time::Duration;

/// A single store command queued in a [`Pipeline`]
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Option<Duration>,
    },
    RPush {
        key: String,
        value: Vec<u8>,
    },
    ZAdd {
        key: String,
        score: f64,
        member: Vec<u8>,
    },
    Expire {
        key: String,
        ttl: Duration,
    },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. }
            | Command::RPush { key, .. }
            | Command::ZAdd { key, .. }
            | Command::Expire { key, .. } => key,
        }
    }
}

/// Result of one pipelined command
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    Ok,
    /// Integer reply: list length, number of added members, expire flag
    Count(i64),
    Failed(String),
}

impl CommandOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CommandOutcome::Failed(_))
    }
}

/// Batch builder: commands are accumulated here and submitted to the store in one round trip.
/// The store executes them in insertion order; a failing command does not stop the rest.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> &mut Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value,
            ttl,
        });
        self
    }

    pub fn rpush(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.commands.push(Command::RPush {
            key: key.into(),
            value,
        });
        self
    }

    pub fn zadd(&mut self, key: impl Into<String>, score: f64, member: Vec<u8>) -> &mut Self {
        self.commands.push(Command::ZAdd {
            key: key.into(),
            score,
            member,
        });
        self
    }

    pub fn expire(&mut self, key: impl Into<String>, ttl: Duration) -> &mut Self {
        self.commands.push(Command::Expire {
            key: key.into(),
            ttl,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
