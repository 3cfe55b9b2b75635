//! Composable message predicates.
//!
//! A [`Filter`] looks at a single [`Message`] and nothing else. Filters
//! combine with `&`, `|` and `!` (or the equivalent [`Filter::and`],
//! [`Filter::or`] and `Not::not`); combination is binary and associates
//! left-to-right exactly as written.
//!
//! ```rust,ignore
//! use courier_framework::Filter;
//! use courier_core::ChatKind;
//!
//! let filter = Filter::text() & Filter::chat_kind(ChatKind::Private) & !Filter::forwarded();
//! ```

use std::collections::HashSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use courier_core::{ChatKind, ContentKind, Message};
use regex::Regex;

/// A user-supplied message predicate.
pub type Predicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// A pure predicate over a message.
#[derive(Clone)]
pub enum Filter {
    /// Matches every message.
    All,
    /// Non-empty text is present.
    Text,
    /// The text is a bot command.
    Command,
    /// A caption is present.
    Caption,
    /// Sent by one of these user ids.
    Sender(HashSet<i64>),
    /// Sent by one of these usernames, compared case-insensitively without `@`.
    Username(HashSet<String>),
    /// Sent in one of these chats.
    Chat(HashSet<i64>),
    /// Sent in a chat of this kind.
    ChatKind(ChatKind),
    /// Carries this kind of content.
    Content(ContentKind),
    /// Text or caption matches the expression.
    Regex(Regex),
    /// Is a reply to another message.
    Reply,
    /// Was forwarded.
    Forwarded,
    /// Sent by a bot account.
    BotSender,
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Custom(Predicate),
}

impl Filter {
    pub fn all() -> Self {
        Self::All
    }

    pub fn text() -> Self {
        Self::Text
    }

    pub fn command() -> Self {
        Self::Command
    }

    pub fn caption() -> Self {
        Self::Caption
    }

    pub fn sender(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::Sender(ids.into_iter().collect())
    }

    pub fn username<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Username(names.into_iter().map(|n| normalize_username(n.as_ref())).collect())
    }

    pub fn chat(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::Chat(ids.into_iter().collect())
    }

    pub fn chat_kind(kind: ChatKind) -> Self {
        Self::ChatKind(kind)
    }

    pub fn content(kind: ContentKind) -> Self {
        Self::Content(kind)
    }

    /// Compiles `pattern` into a filter over text or caption.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    pub fn reply() -> Self {
        Self::Reply
    }

    pub fn forwarded() -> Self {
        Self::Forwarded
    }

    pub fn bot_sender() -> Self {
        Self::BotSender
    }

    /// Wraps an arbitrary predicate.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    /// True when both filters match; `other` is skipped when `self` fails.
    pub fn and(self, other: Filter) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// True when either filter matches; `other` is skipped when `self` passes.
    pub fn or(self, other: Filter) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the filter.
    pub fn matches(&self, message: &Message) -> bool {
        match self {
            Self::All => true,
            Self::Text => message.text.as_deref().is_some_and(|t| !t.is_empty()),
            Self::Command => message.is_command(),
            Self::Caption => message.caption.is_some(),
            Self::Sender(ids) => message.from.as_ref().is_some_and(|u| ids.contains(&u.id)),
            Self::Username(names) => message
                .from
                .as_ref()
                .and_then(|u| u.username.as_deref())
                .is_some_and(|n| names.contains(&normalize_username(n))),
            Self::Chat(ids) => ids.contains(&message.chat.id),
            Self::ChatKind(kind) => message.chat.kind == *kind,
            Self::Content(kind) => message.content_kind() == *kind,
            Self::Regex(re) => message.text_or_caption().is_some_and(|t| re.is_match(t)),
            Self::Reply => message.reply_to_message.is_some(),
            Self::Forwarded => message.is_forwarded(),
            Self::BotSender => message.from.as_ref().is_some_and(|u| u.is_bot),
            Self::And(a, b) => a.matches(message) && b.matches(message),
            Self::Or(a, b) => a.matches(message) || b.matches(message),
            Self::Not(f) => !f.matches(message),
            Self::Custom(predicate) => predicate(message),
        }
    }
}

fn normalize_username(name: &str) -> String {
    name.trim_start_matches('@').to_lowercase()
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        self.and(rhs)
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        self.or(rhs)
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        Filter::Not(Box::new(self))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Text => write!(f, "Text"),
            Self::Command => write!(f, "Command"),
            Self::Caption => write!(f, "Caption"),
            Self::Sender(ids) => f.debug_tuple("Sender").field(ids).finish(),
            Self::Username(names) => f.debug_tuple("Username").field(names).finish(),
            Self::Chat(ids) => f.debug_tuple("Chat").field(ids).finish(),
            Self::ChatKind(kind) => f.debug_tuple("ChatKind").field(kind).finish(),
            Self::Content(kind) => f.debug_tuple("Content").field(kind).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Reply => write!(f, "Reply"),
            Self::Forwarded => write!(f, "Forwarded"),
            Self::BotSender => write!(f, "BotSender"),
            Self::And(a, b) => f.debug_tuple("And").field(a).field(b).finish(),
            Self::Or(a, b) => f.debug_tuple("Or").field(a).field(b).finish(),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{private_chat, text_message, user};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(result: bool, counter: &Arc<AtomicUsize>) -> Filter {
        let counter = Arc::clone(counter);
        Filter::custom(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            result
        })
    }

    #[test]
    fn test_composition_truth_table() {
        let msg = text_message(1, 10, "hello");
        let filters = [Filter::all(), !Filter::all()];
        for a in &filters {
            for b in &filters {
                let (ra, rb) = (a.matches(&msg), b.matches(&msg));
                assert_eq!((a.clone() & b.clone()).matches(&msg), ra && rb);
                assert_eq!((a.clone() | b.clone()).matches(&msg), ra || rb);
                assert_eq!((!a.clone()).matches(&msg), !ra);
                assert_eq!(Not::not(a.clone()).matches(&msg), !ra);
            }
        }
    }

    #[test]
    fn test_and_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let msg = text_message(1, 10, "hello");
        let filter = Filter::caption().and(counting(true, &calls));
        assert!(!filter.matches(&msg));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_or_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let msg = text_message(1, 10, "hello");
        let filter = Filter::text().or(counting(false, &calls));
        assert!(filter.matches(&msg));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_primitives() {
        let mut msg = text_message(1, 10, "/start");
        assert!(Filter::text().matches(&msg));
        assert!(Filter::command().matches(&msg));
        assert!(Filter::sender([10]).matches(&msg));
        assert!(!Filter::sender([11]).matches(&msg));
        assert!(Filter::chat([10]).matches(&msg));
        assert!(Filter::chat_kind(ChatKind::Private).matches(&msg));
        assert!(Filter::content(ContentKind::Text).matches(&msg));
        assert!(!Filter::reply().matches(&msg));
        assert!(!Filter::forwarded().matches(&msg));
        assert!(!Filter::bot_sender().matches(&msg));

        msg.from = Some(user(10, Some("Alice")));
        assert!(Filter::username(["@alice"]).matches(&msg));
        assert!(!Filter::username(["bob"]).matches(&msg));

        msg.text = Some(String::new());
        assert!(!Filter::text().matches(&msg));
    }

    #[test]
    fn test_absent_fields_yield_false() {
        let mut msg = text_message(1, 10, "x");
        msg.from = None;
        msg.text = None;
        assert!(!Filter::sender([10]).matches(&msg));
        assert!(!Filter::username(["alice"]).matches(&msg));
        assert!(!Filter::bot_sender().matches(&msg));
        assert!(!Filter::regex(".*").unwrap().matches(&msg));
        assert!(!Filter::command().matches(&msg));
    }

    #[test]
    fn test_regex_over_caption() {
        let mut msg = Message::text(1, private_chat(5), None, "x");
        msg.text = None;
        msg.caption = Some("order #1234".into());
        assert!(Filter::regex(r"#\d+").unwrap().matches(&msg));
        assert!(Filter::regex("[").is_err());
    }
}
