use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roster::Roster;

/// How the group was assembled before heading to the game hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum GroupMode {
    /// Playing with existing friends from the friend graph.
    Friends,
    /// Playing with people met on the spot, seated as local guests.
    NewFriends,
}

/// Opaque identity handed over by an authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user id.
    pub user_id: String,
    /// Email used for magic-code sign in, if any.
    pub email: Option<String>,
    /// E.164 phone number used for OTP sign in, if any.
    pub phone: Option<String>,
}

/// Per-device session state, passed explicitly to whoever needs it.
#[derive(Debug, Default)]
pub struct Session {
    identity: Option<Identity>,
    roster: Roster,
    mode: Option<GroupMode>,
}

impl Session {
    /// Open a session for a signed-in identity with an empty roster.
    pub fn create(identity: Option<Identity>) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    /// Signed-in identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Current group mode.
    pub fn mode(&self) -> Option<GroupMode> {
        self.mode
    }

    /// Choose how the group is assembled.
    pub fn set_mode(&mut self, mode: Option<GroupMode>) {
        self.mode = mode;
    }

    /// Roster shared by every mini-game of the session.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Mutable access to the roster.
    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    /// Clear the roster and group mode but keep the identity.
    pub fn reset(&mut self) {
        self.roster = Roster::new();
        self.mode = None;
    }

    /// Drop everything, including the identity (sign out).
    pub fn teardown(self) -> Option<Identity> {
        self.identity
    }
}
