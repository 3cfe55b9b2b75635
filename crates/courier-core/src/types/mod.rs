//! Entity model mirroring the remote protocol.
//!
//! Only the fields needed for routing are modeled. Unknown wire fields are
//! ignored when decoding.

mod chat;
mod media;
mod member;
mod message;
mod payment;
mod query;
mod update;

pub use chat::{Chat, ChatKind, User};
pub use media::{Animation, Audio, Document, Game, PhotoSize, Sticker, Video, VideoNote, Voice};
pub use member::{ChatJoinRequest, ChatMember, ChatMemberStatus, ChatMemberUpdated};
pub use message::{ContentKind, Message, MessageEntity};
pub use payment::{
    Invoice, OrderInfo, PreCheckoutQuery, ShippingAddress, ShippingQuery, SuccessfulPayment,
};
pub use query::{CallbackQuery, ChosenInlineResult, InlineQuery, Poll, PollAnswer, PollOption};
pub use update::{Update, UpdateKind};
