use async_trait::async_trait;
use domain::{Message, RoomId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 广播通道键。房间通道面向当前订阅该房间的连接；
/// 个人通道面向一个用户的所有在线设备，用于侧边栏与已读状态同步。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    Room(RoomId),
    User(UserId),
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKey::Room(id) => write!(f, "room:{}", id),
            ChannelKey::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// `room_updated` 事件的房间摘要。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomActivity {
    pub chat_room_id: RoomId,
    pub last_message: Message,
    pub sender_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub last_message_at: Timestamp,
}

/// 服务端到客户端的事件，闭合变体集合，
/// 载荷结构由编译器保证。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    /// 完整消息，发往房间通道。
    NewMessage { message: Message },
    /// 房间摘要，发往每个成员的个人通道。
    RoomUpdated(RoomActivity),
    /// 发往读者自己的个人通道，其余设备清除角标。
    RoomRead { chat_room_id: RoomId },
    /// 发往房间通道，同房间的人看到已读状态。
    MessageRead {
        chat_room_id: RoomId,
        user_id: UserId,
    },
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    /// 把事件投递到一个通道的所有在线连接。
    /// 掉线连接直接跳过，不算失败。
    async fn publish(&self, channel: ChannelKey, event: ChatEvent) -> Result<(), BroadcastError>;
}
