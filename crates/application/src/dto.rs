//! 对外响应的数据传输对象。

use domain::{
    ChatRoom, Message, MessageId, Participant, ParticipantRole, RoomId, Timestamp, User, UserId,
};
use serde::Serialize;

/// 用户档案摘要，私聊侧边栏里的"对方用户"。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub nickname: String,
    pub avatar_url: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            nickname: user.nickname,
            avatar_url: user.avatar_url,
        }
    }
}

/// 侧边栏的单个房间条目。
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub is_group: bool,
    pub name: Option<String>,
    pub last_message: Option<Message>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<Timestamp>,
    pub unread_count: u64,
    pub other_user: Option<UserSummary>,
}

/// 房间详情里的成员档案。
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantProfile {
    pub user_id: UserId,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub email: String,
    pub role: ParticipantRole,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: Timestamp,
}

impl ParticipantProfile {
    pub fn new(participant: &Participant, user: User) -> Self {
        Self {
            user_id: user.id,
            nickname: user.nickname,
            avatar_url: user.avatar_url,
            email: user.email,
            role: participant.role,
            joined_at: participant.joined_at,
        }
    }
}

/// 房间详情。
#[derive(Debug, Clone, Serialize)]
pub struct RoomDetail {
    #[serde(flatten)]
    pub room: ChatRoom,
    pub participants: Vec<ParticipantProfile>,
}

/// 一页消息历史。`next_cursor` 仅在取满一页时出现。
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<MessageId>,
    pub has_more: bool,
}
