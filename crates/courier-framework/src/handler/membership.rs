use std::future::Future;

use async_trait::async_trait;
use courier_core::{
    ChatJoinRequest, ChatMemberStatus, ChatMemberUpdated, Message, Update, UpdateKind, User,
};

use super::{Action, DEFAULT_GROUP, Handler, action};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

/// Which membership change a [`MembershipHandler`] reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipKind {
    /// Users joined or were added (service message).
    NewMembers,
    /// A user left or was removed (service message).
    LeftMember,
    /// The bot's own status in a chat changed.
    MyStatusChanged,
    /// Another member's status changed.
    ChatMemberChanged,
    /// A user asked to join.
    JoinRequest,
}

/// The membership payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Membership {
    NewMembers { message: Message, members: Vec<User> },
    LeftMember { message: Message, member: User },
    MyStatusChanged(ChatMemberUpdated),
    ChatMemberChanged(ChatMemberUpdated),
    JoinRequest(ChatJoinRequest),
}

/// Handles membership changes.
pub struct MembershipHandler {
    kind: MembershipKind,
    status: Option<ChatMemberStatus>,
    group: String,
    action: Action<Membership>,
}

impl MembershipHandler {
    pub fn new<F, Fut>(kind: MembershipKind, f: F) -> Self
    where
        F: Fn(Context, Membership) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            kind,
            status: None,
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
        }
    }

    /// Only matches status changes whose new status is `status`.
    ///
    /// Applies to [`MembershipKind::MyStatusChanged`] and
    /// [`MembershipKind::ChatMemberChanged`]; ignored otherwise.
    pub fn status(mut self, status: ChatMemberStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn status_ok(&self, change: &ChatMemberUpdated) -> bool {
        self.status
            .is_none_or(|wanted| change.new_chat_member.status == wanted)
    }

    fn extract(&self, update: &Update) -> Option<Membership> {
        match (self.kind, &update.kind) {
            (MembershipKind::NewMembers, UpdateKind::Message(m)) => {
                m.new_chat_members.as_ref().map(|members| Membership::NewMembers {
                    message: m.clone(),
                    members: members.clone(),
                })
            }
            (MembershipKind::LeftMember, UpdateKind::Message(m)) => {
                m.left_chat_member.as_ref().map(|member| Membership::LeftMember {
                    message: m.clone(),
                    member: member.clone(),
                })
            }
            (MembershipKind::MyStatusChanged, UpdateKind::MyChatMember(c)) if self.status_ok(c) => {
                Some(Membership::MyStatusChanged(c.clone()))
            }
            (MembershipKind::ChatMemberChanged, UpdateKind::ChatMember(c))
                if self.status_ok(c) =>
            {
                Some(Membership::ChatMemberChanged(c.clone()))
            }
            (MembershipKind::JoinRequest, UpdateKind::ChatJoinRequest(r)) => {
                Some(Membership::JoinRequest(r.clone()))
            }
            _ => None,
        }
    }
}

group_builder!(MembershipHandler);

#[async_trait]
impl Handler for MembershipHandler {
    fn name(&self) -> &str {
        "membership"
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        match (self.kind, &update.kind) {
            (MembershipKind::NewMembers, UpdateKind::Message(m)) => m.new_chat_members.is_some(),
            (MembershipKind::LeftMember, UpdateKind::Message(m)) => m.left_chat_member.is_some(),
            (MembershipKind::MyStatusChanged, UpdateKind::MyChatMember(c))
            | (MembershipKind::ChatMemberChanged, UpdateKind::ChatMember(c)) => self.status_ok(c),
            (MembershipKind::JoinRequest, UpdateKind::ChatJoinRequest(_)) => true,
            _ => false,
        }
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let payload = self
            .extract(ctx.update())
            .ok_or(HandlerError::MissingPayload("membership"))?;
        (self.action)(ctx, payload).await
    }
}
