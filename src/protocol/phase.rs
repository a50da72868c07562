//! Session lifecycle phases.

use std::fmt;

/// Where a session is in its lifecycle. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Disconnected,
    Discovering,
    ConnectingToServer,
    AwaitingUserInfo,
    LoggedIn,
    Messaging,
    Exiting,
}

impl Phase {
    /// The phase that follows this one, or `None` once exiting
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Disconnected => Some(Phase::Discovering),
            Phase::Discovering => Some(Phase::ConnectingToServer),
            Phase::ConnectingToServer => Some(Phase::AwaitingUserInfo),
            Phase::AwaitingUserInfo => Some(Phase::LoggedIn),
            Phase::LoggedIn => Some(Phase::Messaging),
            Phase::Messaging => Some(Phase::Exiting),
            Phase::Exiting => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Disconnected => "disconnected",
            Phase::Discovering => "discovering",
            Phase::ConnectingToServer => "connecting-to-server",
            Phase::AwaitingUserInfo => "awaiting-user-info",
            Phase::LoggedIn => "logged-in",
            Phase::Messaging => "messaging",
            Phase::Exiting => "exiting",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
