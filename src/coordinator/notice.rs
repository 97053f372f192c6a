//! Transient user notifications raised by vote settlement

use crate::forum::VoteDirection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    VoteRecorded {
        post_id: String,
        direction: VoteDirection,
    },
    VoteFailed {
        post_id: String,
        direction: VoteDirection,
        reason: String,
    },
}

impl Notice {
    pub fn post_id(&self) -> &str {
        match self {
            Notice::VoteRecorded { post_id, .. } | Notice::VoteFailed { post_id, .. } => post_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::VoteFailed { .. })
    }

    /// Toast text
    pub fn message(&self) -> String {
        match self {
            Notice::VoteRecorded { direction, .. } => format!("{}vote recorded", direction),
            Notice::VoteFailed { reason, .. } => format!("Vote failed: {}", reason),
        }
    }
}
