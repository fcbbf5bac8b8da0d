use crate::value_objects::{RoomId, Timestamp, UserId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "participant_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Admin,
    Member,
}

/// 房间成员。`(user_id, room_id)` 唯一；`last_read_at`
/// 是已读水位线，只会向前移动。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub chat_room_id: RoomId,
    pub role: ParticipantRole,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: Timestamp,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_read_at: Option<Timestamp>,
}

impl Participant {
    pub fn new(
        user_id: UserId,
        chat_room_id: RoomId,
        role: ParticipantRole,
        joined_at: Timestamp,
    ) -> Self {
        Self {
            user_id,
            chat_room_id,
            role,
            joined_at,
            last_read_at: None,
        }
    }

    /// 推进已读水位线；时间回退时保持不变。
    pub fn advance_read_watermark(&mut self, at: Timestamp) {
        match self.last_read_at {
            Some(current) if current >= at => {}
            _ => self.last_read_at = Some(at),
        }
    }
}
