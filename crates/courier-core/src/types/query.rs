//! Callback queries, inline queries and polls.

use serde::{Deserialize, Serialize};

use super::chat::{Chat, User};
use super::message::Message;

/// A press on an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Identifier used to answer the query.
    pub id: String,
    /// User who pressed the button.
    pub from: User,
    /// Message the button was attached to, if it is still accessible.
    pub message: Option<Box<Message>>,
    /// Identifier of the inline message the button was attached to.
    pub inline_message_id: Option<String>,
    /// Global identifier of the chat the message was sent in.
    #[serde(default)]
    pub chat_instance: String,
    /// Data associated with the button.
    pub data: Option<String>,
    /// Short name of a game to be returned.
    pub game_short_name: Option<String>,
}

/// An incoming inline query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    /// Text typed after the bot's username.
    #[serde(default)]
    pub query: String,
    /// Pagination offset requested by the client.
    #[serde(default)]
    pub offset: String,
    pub chat_type: Option<String>,
}

/// An inline result chosen by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
    pub inline_message_id: Option<String>,
}

/// One answer option of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    #[serde(default)]
    pub voter_count: u32,
}

/// A poll, either attached to a message or delivered as a state update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub total_voter_count: u32,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub is_anonymous: bool,
    /// `"regular"` or `"quiz"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub allows_multiple_answers: bool,
}

/// A user's answer in a non-anonymous poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAnswer {
    pub poll_id: String,
    /// The user that changed the answer, when not voting as a chat.
    pub user: Option<User>,
    /// The chat that changed the answer, for anonymous admins.
    pub voter_chat: Option<Chat>,
    /// Chosen option indices; empty when the vote was retracted.
    #[serde(default)]
    pub option_ids: Vec<u32>,
}
