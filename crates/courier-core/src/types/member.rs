//! Chat membership changes.

use serde::{Deserialize, Serialize};

use super::chat::{Chat, User};

/// Membership status of a user in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
    /// A status this crate does not know.
    #[serde(other)]
    Unknown,
}

impl ChatMemberStatus {
    /// Returns `true` when the user can currently see the chat.
    pub fn is_present(self) -> bool {
        matches!(
            self,
            Self::Creator | Self::Administrator | Self::Member | Self::Restricted
        )
    }
}

/// A member of a chat.
///
/// The wire format is a union keyed by `status`; only the fields shared by
/// every variant are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMember {
    pub status: ChatMemberStatus,
    pub user: User,
}

/// A change in the status of a chat member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    /// Performer of the action that caused the change.
    pub from: User,
    #[serde(default)]
    pub date: i64,
    pub old_chat_member: ChatMember,
    pub new_chat_member: ChatMember,
}

/// A request to join a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
    /// Private chat with the requesting user, usable for a short time.
    pub user_chat_id: Option<i64>,
    #[serde(default)]
    pub date: i64,
    pub bio: Option<String>,
}
