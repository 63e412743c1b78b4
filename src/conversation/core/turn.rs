//! Turn model for conversation transcripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author of a turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TurnRole {
    /// Human input.
    #[serde(rename = "user")]
    User,
    /// Model reply. Stored as `assistant` to match chat-completion roles.
    #[serde(rename = "assistant", alias = "agent")]
    Agent,
}

impl TurnRole {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "assistant",
        }
    }

    /// Label used when rendering a transcript for the model.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Agent => "Assistant",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" | "agent" => Ok(Self::Agent),
            _ => Err(value.to_string()),
        }
    }
}

/// One message of a conversation. Immutable once created.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Author.
    pub role: TurnRole,
    /// Message text.
    #[serde(rename = "content")]
    pub text: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Build a user turn stamped now.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Build an agent turn stamped now.
    #[must_use]
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Agent,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
