use std::cmp::Ordering;

use crate::value_objects::{MessageContent, MessageId, RoomId, Timestamp, UserId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "message_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Text
    }
}

/// 消息实体。创建后不可变；排序键是 `(created_at, id)`，
/// 时间戳相同时按 id 决出确定性顺序。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_room_id: RoomId,
    pub sender_id: UserId,
    pub content: MessageContent,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
}

impl Message {
    pub fn new(
        chat_room_id: RoomId,
        sender_id: UserId,
        content: MessageContent,
        message_type: MessageType,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            chat_room_id,
            sender_id,
            content,
            message_type,
            created_at,
        }
    }

    /// 分页排序键。
    pub fn ordering_key(&self) -> (Timestamp, MessageId) {
        (self.created_at, self.id)
    }

    /// 按 `(created_at, id)` 比较，新消息排在前。
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        other.ordering_key().cmp(&self.ordering_key())
    }
}
