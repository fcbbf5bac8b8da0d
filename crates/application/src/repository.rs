use async_trait::async_trait;
use domain::{
    ChatRoom, Message, MessageId, PairKey, Participant, RepositoryError, RoomId, Timestamp, User,
    UserId,
};

#[async_trait]
pub trait ChatRoomRepository: Send + Sync {
    /// 原子创建私聊房间和两条成员记录。
    /// pair_key 唯一索引冲突时返回 `RepositoryError::Conflict`，
    /// 由调用方重新按 pair_key 查询竞争获胜者。
    async fn create_private(
        &self,
        room: ChatRoom,
        participants: [Participant; 2],
    ) -> Result<ChatRoom, RepositoryError>;

    /// 原子创建群聊房间和全部成员记录。
    async fn create_group(
        &self,
        room: ChatRoom,
        participants: Vec<Participant>,
    ) -> Result<ChatRoom, RepositoryError>;

    async fn find_by_id(&self, id: RoomId) -> Result<Option<ChatRoom>, RepositoryError>;

    async fn find_private_by_pair_key(
        &self,
        pair_key: &PairKey,
    ) -> Result<Option<ChatRoom>, RepositoryError>;
}

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    async fn find(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<Participant>, RepositoryError>;

    async fn list_by_room(&self, room_id: RoomId) -> Result<Vec<Participant>, RepositoryError>;

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Participant>, RepositoryError>;

    /// 推进已读水位线，只向前移动（重复调用幂等）。
    async fn advance_read_watermark(
        &self,
        user_id: UserId,
        room_id: RoomId,
        at: Timestamp,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 持久化消息并在同一事务内更新房间的 last_message_at。
    /// 事务中止时两者都不可见。
    async fn append(&self, message: Message) -> Result<Message, RepositoryError>;

    /// 按 `(created_at, id)` 倒序取一页，严格早于游标（游标不含）。
    /// 游标消息不存在时返回 `RepositoryError::NotFound`。
    async fn list_page(
        &self,
        room_id: RoomId,
        before: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;

    async fn latest(&self, room_id: RoomId) -> Result<Option<Message>, RepositoryError>;

    /// 水位线之后、非本人发送的消息数。
    async fn count_unread(
        &self,
        room_id: RoomId,
        reader_id: UserId,
        watermark: Option<Timestamp>,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError>;
}
