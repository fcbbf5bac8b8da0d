use std::sync::Arc;

use domain::{DomainError, RoomId, UserId};

use crate::{
    broadcaster::{ChannelKey, ChatEvent, EventBroadcaster},
    clock::Clock,
    error::ApplicationError,
    repository::{MessageRepository, ParticipantRepository},
};

pub struct ReadServiceDependencies {
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
}

pub struct ReadService {
    deps: ReadServiceDependencies,
}

impl ReadService {
    pub fn new(deps: ReadServiceDependencies) -> Self {
        Self { deps }
    }

    /// 推进已读水位线。幂等：重复调用只会前移或持平。
    pub async fn mark_read(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        self.deps
            .participant_repository
            .find(user_id, room_id)
            .await?
            .ok_or(DomainError::NotParticipant)?;

        let now = self.deps.clock.now();
        self.deps
            .participant_repository
            .advance_read_watermark(user_id, room_id, now)
            .await?;
        Ok(())
    }

    /// 加入房间时的标记已读：通知读者自己的其他设备清角标。
    pub async fn mark_read_on_join(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        self.mark_read(user_id, room_id).await?;
        self.deps
            .broadcaster
            .publish(
                ChannelKey::User(user_id),
                ChatEvent::RoomRead {
                    chat_room_id: room_id,
                },
            )
            .await?;
        Ok(())
    }

    /// 显式已读回执：读者的设备清角标，房间内其他人看到已读。
    pub async fn acknowledge_read(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        self.mark_read(user_id, room_id).await?;
        self.deps
            .broadcaster
            .publish(
                ChannelKey::User(user_id),
                ChatEvent::RoomRead {
                    chat_room_id: room_id,
                },
            )
            .await?;
        self.deps
            .broadcaster
            .publish(
                ChannelKey::Room(room_id),
                ChatEvent::MessageRead {
                    chat_room_id: room_id,
                    user_id,
                },
            )
            .await?;
        Ok(())
    }

    /// 未读数：水位线之后、非本人发送的消息数。
    pub async fn unread_count(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<u64, ApplicationError> {
        let participant = self
            .deps
            .participant_repository
            .find(user_id, room_id)
            .await?
            .ok_or(DomainError::NotParticipant)?;

        let count = self
            .deps
            .message_repository
            .count_unread(room_id, user_id, participant.last_read_at)
            .await?;
        Ok(count)
    }
}
