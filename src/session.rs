//! Signed-in member state
//!
//! Identity is resolved here, before any vote reaches the coordinator.

use crate::common::{Error, Result};
use crate::forum::VoterId;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// Platform roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Trainer,
    Member,
}

/// Authenticated member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Default)]
pub struct Session {
    member: RwLock<Option<Member>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(member: Member) -> Self {
        Self {
            member: RwLock::new(Some(member)),
        }
    }

    pub fn sign_in(&self, member: Member) {
        tracing::info!(email = %member.email, role = ?member.role, "Member signed in");
        *self.member.write().unwrap_or_else(PoisonError::into_inner) = Some(member);
    }

    pub fn sign_out(&self) {
        let previous = self
            .member
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(member) = previous {
            tracing::info!(email = %member.email, "Member signed out");
        }
    }

    pub fn member(&self) -> Option<Member> {
        self.member
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Voter identity, or `Unauthenticated` so the caller can send the user to sign-in
    pub fn require_voter(&self) -> Result<VoterId> {
        self.member()
            .map(|member| VoterId::new(member.email))
            .ok_or(Error::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_voter() {
        let session = Session::new();
        assert!(matches!(session.require_voter(), Err(Error::Unauthenticated)));

        session.sign_in(Member {
            email: "u1".into(),
            name: None,
            role: Role::Member,
        });
        assert_eq!(session.require_voter().unwrap(), VoterId::from("u1"));

        session.sign_out();
        assert!(session.require_voter().is_err());
    }

    #[test]
    fn test_member_json() {
        let member: Member =
            serde_json::from_str(r#"{"email":"coach@gym.io","role":"trainer"}"#).unwrap();
        assert_eq!(member.role, Role::Trainer);
        assert!(Session::signed_in(member).require_voter().is_ok());
    }
}
