//! The update envelope.
//!
//! On the wire an update is an object with an `update_id` and exactly one
//! payload field. [`Update`] keeps the id and turns the payload field into the
//! [`UpdateKind`] tag; serialization writes the same field back.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chat::{Chat, User};
use super::member::{ChatJoinRequest, ChatMemberUpdated};
use super::message::Message;
use super::payment::{PreCheckoutQuery, ShippingQuery};
use super::query::{CallbackQuery, ChosenInlineResult, InlineQuery, Poll, PollAnswer};

/// An inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Monotonically increasing identifier assigned by the server.
    pub id: i64,
    /// The payload.
    pub kind: UpdateKind,
}

/// The payload of an [`Update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    CallbackQuery(CallbackQuery),
    ShippingQuery(ShippingQuery),
    PreCheckoutQuery(PreCheckoutQuery),
    Poll(Poll),
    PollAnswer(PollAnswer),
    MyChatMember(ChatMemberUpdated),
    ChatMember(ChatMemberUpdated),
    ChatJoinRequest(ChatJoinRequest),
    /// A payload this crate does not model; holds every field except
    /// `update_id`.
    Unknown(Value),
}

/// Wire field names, in the order they are checked when decoding.
const WIRE_FIELDS: &[&str] = &[
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
    "inline_query",
    "chosen_inline_result",
    "callback_query",
    "shipping_query",
    "pre_checkout_query",
    "poll",
    "poll_answer",
    "my_chat_member",
    "chat_member",
    "chat_join_request",
];

impl UpdateKind {
    /// Returns the wire field name of this payload, or `"unknown"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::EditedMessage(_) => "edited_message",
            Self::ChannelPost(_) => "channel_post",
            Self::EditedChannelPost(_) => "edited_channel_post",
            Self::InlineQuery(_) => "inline_query",
            Self::ChosenInlineResult(_) => "chosen_inline_result",
            Self::CallbackQuery(_) => "callback_query",
            Self::ShippingQuery(_) => "shipping_query",
            Self::PreCheckoutQuery(_) => "pre_checkout_query",
            Self::Poll(_) => "poll",
            Self::PollAnswer(_) => "poll_answer",
            Self::MyChatMember(_) => "my_chat_member",
            Self::ChatMember(_) => "chat_member",
            Self::ChatJoinRequest(_) => "chat_join_request",
            Self::Unknown(_) => "unknown",
        }
    }

    fn from_field(field: &str, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match field {
            "message" => Self::Message(serde_json::from_value(value)?),
            "edited_message" => Self::EditedMessage(serde_json::from_value(value)?),
            "channel_post" => Self::ChannelPost(serde_json::from_value(value)?),
            "edited_channel_post" => Self::EditedChannelPost(serde_json::from_value(value)?),
            "inline_query" => Self::InlineQuery(serde_json::from_value(value)?),
            "chosen_inline_result" => Self::ChosenInlineResult(serde_json::from_value(value)?),
            "callback_query" => Self::CallbackQuery(serde_json::from_value(value)?),
            "shipping_query" => Self::ShippingQuery(serde_json::from_value(value)?),
            "pre_checkout_query" => Self::PreCheckoutQuery(serde_json::from_value(value)?),
            "poll" => Self::Poll(serde_json::from_value(value)?),
            "poll_answer" => Self::PollAnswer(serde_json::from_value(value)?),
            "my_chat_member" => Self::MyChatMember(serde_json::from_value(value)?),
            "chat_member" => Self::ChatMember(serde_json::from_value(value)?),
            "chat_join_request" => Self::ChatJoinRequest(serde_json::from_value(value)?),
            _ => Self::Unknown(value),
        })
    }
}

impl Update {
    /// Creates an update.
    pub fn new(id: i64, kind: UpdateKind) -> Self {
        Self { id, kind }
    }

    /// Returns the message-shaped payload, if any.
    ///
    /// Covers messages, edited messages, channel posts, edited channel posts
    /// and the message a callback query's button was attached to.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => Some(m),
            UpdateKind::CallbackQuery(q) => q.message.as_deref(),
            _ => None,
        }
    }

    /// Returns the user that produced this update.
    pub fn sender(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => m.from.as_ref(),
            UpdateKind::InlineQuery(q) => Some(&q.from),
            UpdateKind::ChosenInlineResult(r) => Some(&r.from),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::ShippingQuery(q) => Some(&q.from),
            UpdateKind::PreCheckoutQuery(q) => Some(&q.from),
            UpdateKind::PollAnswer(a) => a.user.as_ref(),
            UpdateKind::MyChatMember(c) | UpdateKind::ChatMember(c) => Some(&c.from),
            UpdateKind::ChatJoinRequest(r) => Some(&r.from),
            UpdateKind::Poll(_) | UpdateKind::Unknown(_) => None,
        }
    }

    /// Returns the sender's user id.
    pub fn sender_id(&self) -> Option<i64> {
        self.sender().map(|u| u.id)
    }

    /// Returns the chat this update happened in.
    pub fn chat(&self) -> Option<&Chat> {
        match &self.kind {
            UpdateKind::MyChatMember(c) | UpdateKind::ChatMember(c) => Some(&c.chat),
            UpdateKind::ChatJoinRequest(r) => Some(&r.chat),
            _ => self.message().map(|m| &m.chat),
        }
    }

    /// Returns `true` for edited messages and edited channel posts.
    pub fn is_edited(&self) -> bool {
        matches!(
            self.kind,
            UpdateKind::EditedMessage(_) | UpdateKind::EditedChannelPost(_)
        )
    }

    /// Returns the wire field name of the payload.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl<'de> Deserialize<'de> for Update {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let RawUpdate { update_id, rest } = RawUpdate::deserialize(deserializer)?;

        // A payload that does not fit the model is kept raw so the update
        // still carries its id and can be acknowledged.
        let kind = match WIRE_FIELDS.iter().find(|f| rest.contains_key(**f)) {
            Some(name) => match UpdateKind::from_field(name, rest[*name].clone()) {
                Ok(kind) => kind,
                Err(_) => UpdateKind::Unknown(Value::Object(rest)),
            },
            None => UpdateKind::Unknown(Value::Object(rest)),
        };

        Ok(Update {
            id: update_id,
            kind,
        })
    }
}

impl Serialize for Update {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("update_id", &self.id)?;
        let name = self.kind.name();
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => map.serialize_entry(name, m)?,
            UpdateKind::InlineQuery(v) => map.serialize_entry(name, v)?,
            UpdateKind::ChosenInlineResult(v) => map.serialize_entry(name, v)?,
            UpdateKind::CallbackQuery(v) => map.serialize_entry(name, v)?,
            UpdateKind::ShippingQuery(v) => map.serialize_entry(name, v)?,
            UpdateKind::PreCheckoutQuery(v) => map.serialize_entry(name, v)?,
            UpdateKind::Poll(v) => map.serialize_entry(name, v)?,
            UpdateKind::PollAnswer(v) => map.serialize_entry(name, v)?,
            UpdateKind::MyChatMember(v) | UpdateKind::ChatMember(v) => {
                map.serialize_entry(name, v)?
            }
            UpdateKind::ChatJoinRequest(v) => map.serialize_entry(name, v)?,
            UpdateKind::Unknown(Value::Object(fields)) => {
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
            }
            UpdateKind::Unknown(other) => map.serialize_entry("unknown", other)?,
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatKind, ChatMemberStatus};
    use serde_json::json;

    fn message_json(text: &str) -> Value {
        json!({
            "message_id": 10,
            "date": 1700000000,
            "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
            "chat": {"id": 42, "type": "private", "first_name": "Ann"},
            "text": text,
        })
    }

    #[test]
    fn test_decode_message_update() {
        let update: Update =
            serde_json::from_value(json!({"update_id": 5, "message": message_json("hi")}))
                .unwrap();
        assert_eq!(update.id, 5);
        assert_eq!(update.kind_name(), "message");
        assert_eq!(update.message().and_then(|m| m.text.as_deref()), Some("hi"));
        assert_eq!(update.sender_id(), Some(42));
        assert_eq!(update.chat().map(|c| c.id), Some(42));
        assert!(!update.is_edited());
    }

    #[test]
    fn test_decode_edited_and_callback() {
        let edited: Update =
            serde_json::from_value(json!({"update_id": 6, "edited_message": message_json("x")}))
                .unwrap();
        assert!(matches!(edited.kind, UpdateKind::EditedMessage(_)));
        assert!(edited.is_edited());

        let callback: Update = serde_json::from_value(json!({
            "update_id": 7,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 9, "first_name": "Cy"},
                "chat_instance": "ci",
                "data": "vote:yes",
                "message": message_json("pick one"),
            }
        }))
        .unwrap();
        assert_eq!(callback.sender_id(), Some(9));
        assert_eq!(
            callback.message().and_then(|m| m.text.as_deref()),
            Some("pick one")
        );
    }

    #[test]
    fn test_unknown_payload_round_trips() {
        let raw = json!({"update_id": 11, "business_message": {"foo": 1}});
        let update: Update = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(update.kind, UpdateKind::Unknown(_)));
        assert!(update.sender().is_none());
        assert_eq!(serde_json::to_value(&update).unwrap(), raw);
    }

    #[test]
    fn test_serialize_writes_wire_field() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 12,
            "poll": {"id": "p", "question": "q?", "options": [], "type": "regular"}
        }))
        .unwrap();
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["update_id"], 12);
        assert_eq!(value["poll"]["question"], "q?");
        assert!(update.sender().is_none());
    }

    #[test]
    fn test_missing_update_id_is_rejected() {
        let result: Result<Update, _> = serde_json::from_value(json!({"message": {}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_payload_is_kept_raw() {
        let raw = json!({"update_id": 1, "message": {"text": "no chat"}});
        let update: Update = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(update.id, 1);
        assert!(matches!(update.kind, UpdateKind::Unknown(_)));
        assert_eq!(serde_json::to_value(&update).unwrap(), raw);
    }

    #[test]
    fn test_unknown_member_status_and_chat_type() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 2,
            "my_chat_member": {
                "chat": {"id": -100, "type": "forum_v2", "title": "T"},
                "from": {"id": 9, "first_name": "Cy"},
                "date": 1700000000,
                "old_chat_member": {"status": "member", "user": {"id": 9, "first_name": "Cy"}},
                "new_chat_member": {"status": "owner_v2", "user": {"id": 9, "first_name": "Cy"}},
            }
        }))
        .unwrap();
        let UpdateKind::MyChatMember(change) = &update.kind else {
            panic!("unexpected {:?}", update.kind);
        };
        assert_eq!(change.chat.kind, ChatKind::Unknown);
        assert_eq!(change.new_chat_member.status, ChatMemberStatus::Unknown);
        assert!(!change.new_chat_member.status.is_present());
    }
}
