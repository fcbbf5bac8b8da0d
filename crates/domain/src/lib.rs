//! 聊天核心领域模型。
//!
//! 包含聊天室、成员、消息等核心实体，以及标识符等值对象。

pub mod chat_room;
pub mod errors;
pub mod message;
pub mod participant;
pub mod user;
pub mod value_objects;

pub use chat_room::ChatRoom;
pub use errors::{DomainError, RepositoryError};
pub use message::{Message, MessageType};
pub use participant::{Participant, ParticipantRole};
pub use user::User;
pub use value_objects::{MessageContent, MessageId, PairKey, RoomId, Timestamp, UserId};
