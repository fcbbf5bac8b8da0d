use std::sync::Arc;

use domain::{
    DomainError, Message, MessageContent, MessageId, MessageType, RoomId, UserId,
};

use crate::{
    broadcaster::{ChannelKey, ChatEvent, EventBroadcaster, RoomActivity},
    clock::Clock,
    dto::MessagePage,
    error::ApplicationError,
    repository::{ChatRoomRepository, MessageRepository, ParticipantRepository},
};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub struct MessageServiceDependencies {
    pub room_repository: Arc<dyn ChatRoomRepository>,
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    /// 核心写路径：校验 → 事务持久化 → 提交后广播。
    ///
    /// 广播只发生在事务提交之后，房间内消息的广播顺序
    /// 与落库顺序一致。
    pub async fn send_message(
        &self,
        sender_id: UserId,
        room_id: RoomId,
        content: String,
        message_type: MessageType,
    ) -> Result<Message, ApplicationError> {
        let content = MessageContent::new(content)?;

        self.deps
            .room_repository
            .find_by_id(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound)?;

        self.deps
            .participant_repository
            .find(sender_id, room_id)
            .await?
            .ok_or(DomainError::NotParticipant)?;

        let now = self.deps.clock.now();
        let message = Message::new(room_id, sender_id, content, message_type, now);
        let stored = self.deps.message_repository.append(message).await?;
        tracing::debug!(message_id = %stored.id, room_id = %room_id, "消息已落库");

        // 完整消息进房间通道
        self.deps
            .broadcaster
            .publish(
                ChannelKey::Room(room_id),
                ChatEvent::NewMessage {
                    message: stored.clone(),
                },
            )
            .await?;

        // 摘要进每个成员的个人通道，
        // 没订阅这个房间的设备也能刷新侧边栏
        let participants = self
            .deps
            .participant_repository
            .list_by_room(room_id)
            .await?;
        let activity = RoomActivity {
            chat_room_id: room_id,
            last_message: stored.clone(),
            sender_id,
            last_message_at: stored.created_at,
        };
        for participant in participants {
            self.deps
                .broadcaster
                .publish(
                    ChannelKey::User(participant.user_id),
                    ChatEvent::RoomUpdated(activity.clone()),
                )
                .await?;
        }

        Ok(stored)
    }

    /// 往旧翻页。重复携带返回的游标可以不重不漏地走完
    /// 整个历史，即使期间有新消息写入。
    pub async fn page_messages(
        &self,
        user_id: UserId,
        room_id: RoomId,
        cursor: Option<MessageId>,
        limit: Option<u32>,
    ) -> Result<MessagePage, ApplicationError> {
        self.deps
            .participant_repository
            .find(user_id, room_id)
            .await?
            .ok_or(DomainError::NotParticipant)?;

        let limit = limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let messages = self
            .deps
            .message_repository
            .list_page(room_id, cursor, limit)
            .await?;

        let next_cursor = if messages.len() as u32 == limit {
            messages.last().map(|m| m.id)
        } else {
            None
        };

        Ok(MessagePage {
            has_more: next_cursor.is_some(),
            next_cursor,
            messages,
        })
    }
}
