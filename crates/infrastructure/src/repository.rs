//! Postgres 仓储实现。
//!
//! 行记录用 `FromRow` 结构体承接，再 `TryFrom` 转回领域实体，
//! 非法数据在边界上报 `RepositoryError::Storage`。

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use application::{
    ChatRoomRepository, MessageRepository, ParticipantRepository, UserRepository,
};
use domain::{
    ChatRoom, Message, MessageContent, MessageId, MessageType, PairKey, Participant,
    ParticipantRole, RepositoryError, RoomId, Timestamp, User, UserId,
};

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        // 23505 = unique_violation
        if db_err.code().as_deref() == Some("23505") {
            return RepositoryError::Conflict;
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: Uuid,
    is_group: bool,
    name: Option<String>,
    created_by: Option<Uuid>,
    pair_key: Option<String>,
    last_message_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl From<RoomRecord> for ChatRoom {
    fn from(value: RoomRecord) -> Self {
        ChatRoom {
            id: RoomId::from(value.id),
            is_group: value.is_group,
            name: value.name,
            created_by: value.created_by.map(UserId::from),
            pair_key: value.pair_key.map(PairKey::from_raw),
            last_message_at: value.last_message_at,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    user_id: Uuid,
    chat_room_id: Uuid,
    role: ParticipantRole,
    joined_at: OffsetDateTime,
    last_read_at: Option<OffsetDateTime>,
}

impl From<ParticipantRecord> for Participant {
    fn from(value: ParticipantRecord) -> Self {
        Participant {
            user_id: UserId::from(value.user_id),
            chat_room_id: RoomId::from(value.chat_room_id),
            role: value.role,
            joined_at: value.joined_at,
            last_read_at: value.last_read_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_room_id: Uuid,
    sender_id: Uuid,
    content: String,
    message_type: MessageType,
    created_at: OffsetDateTime,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Message {
            id: MessageId::from(value.id),
            chat_room_id: RoomId::from(value.chat_room_id),
            sender_id: UserId::from(value.sender_id),
            content,
            message_type: value.message_type,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    nickname: String,
    avatar_url: Option<String>,
}

impl From<UserRecord> for User {
    fn from(value: UserRecord) -> Self {
        User {
            id: UserId::from(value.id),
            nickname: value.nickname,
            avatar_url: value.avatar_url,
            email: value.email,
        }
    }
}

#[derive(Clone)]
pub struct PgChatRoomRepository {
    pool: PgPool,
}

impl PgChatRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRoomRepository for PgChatRoomRepository {
    async fn create_private(
        &self,
        room: ChatRoom,
        participants: [Participant; 2],
    ) -> Result<ChatRoom, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO chat_rooms (id, is_group, name, created_by, pair_key, last_message_at, created_at)
            VALUES ($1, FALSE, NULL, NULL, $2, NULL, $3)
            RETURNING id, is_group, name, created_by, pair_key, last_message_at, created_at
            "#,
        )
        .bind(Uuid::from(room.id))
        .bind(room.pair_key.as_ref().map(PairKey::as_str))
        .bind(room.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        for participant in &participants {
            insert_participant(&mut tx, participant).await?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(ChatRoom::from(record))
    }

    async fn create_group(
        &self,
        room: ChatRoom,
        participants: Vec<Participant>,
    ) -> Result<ChatRoom, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO chat_rooms (id, is_group, name, created_by, pair_key, last_message_at, created_at)
            VALUES ($1, TRUE, $2, $3, NULL, NULL, $4)
            RETURNING id, is_group, name, created_by, pair_key, last_message_at, created_at
            "#,
        )
        .bind(Uuid::from(room.id))
        .bind(room.name.as_deref())
        .bind(room.created_by.map(Uuid::from))
        .bind(room.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        for participant in &participants {
            insert_participant(&mut tx, participant).await?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(ChatRoom::from(record))
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<ChatRoom>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, is_group, name, created_by, pair_key, last_message_at, created_at
            FROM chat_rooms WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(ChatRoom::from))
    }

    async fn find_private_by_pair_key(
        &self,
        pair_key: &PairKey,
    ) -> Result<Option<ChatRoom>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, is_group, name, created_by, pair_key, last_message_at, created_at
            FROM chat_rooms WHERE pair_key = $1
            "#,
        )
        .bind(pair_key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(ChatRoom::from))
    }
}

async fn insert_participant(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    participant: &Participant,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO chat_participants (user_id, chat_room_id, role, joined_at, last_read_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::from(participant.user_id))
    .bind(Uuid::from(participant.chat_room_id))
    .bind(&participant.role)
    .bind(participant.joined_at)
    .bind(participant.last_read_at)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_err)?;
    Ok(())
}

#[derive(Clone)]
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    async fn find(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<Participant>, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT user_id, chat_room_id, role, joined_at, last_read_at
            FROM chat_participants WHERE user_id = $1 AND chat_room_id = $2
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(Uuid::from(room_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Participant::from))
    }

    async fn list_by_room(&self, room_id: RoomId) -> Result<Vec<Participant>, RepositoryError> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT user_id, chat_room_id, role, joined_at, last_read_at
            FROM chat_participants WHERE chat_room_id = $1
            "#,
        )
        .bind(Uuid::from(room_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Participant::from).collect())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Participant>, RepositoryError> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT user_id, chat_room_id, role, joined_at, last_read_at
            FROM chat_participants WHERE user_id = $1
            "#,
        )
        .bind(Uuid::from(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Participant::from).collect())
    }

    async fn advance_read_watermark(
        &self,
        user_id: UserId,
        room_id: RoomId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        // GREATEST 保证水位线只向前，重复与乱序调用都幂等
        let result = sqlx::query(
            r#"
            UPDATE chat_participants
            SET last_read_at = GREATEST(COALESCE(last_read_at, 'epoch'::timestamptz), $3)
            WHERE user_id = $1 AND chat_room_id = $2
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(Uuid::from(room_id))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (id, chat_room_id, sender_id, content, message_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, chat_room_id, sender_id, content, message_type, created_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.chat_room_id))
        .bind(Uuid::from(message.sender_id))
        .bind(message.content.as_str())
        .bind(&message.message_type)
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query("UPDATE chat_rooms SET last_message_at = $2 WHERE id = $1")
            .bind(Uuid::from(message.chat_room_id))
            .bind(message.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Message::try_from(record)
    }

    async fn list_page(
        &self,
        room_id: RoomId,
        before: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let records = match before {
            Some(cursor) => {
                let bound = sqlx::query_as::<_, MessageRecord>(
                    r#"
                    SELECT id, chat_room_id, sender_id, content, message_type, created_at
                    FROM messages WHERE id = $1 AND chat_room_id = $2
                    "#,
                )
                .bind(Uuid::from(cursor))
                .bind(Uuid::from(room_id))
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?
                .ok_or(RepositoryError::NotFound)?;

                // 行值比较走 (chat_room_id, created_at, id) 索引
                sqlx::query_as::<_, MessageRecord>(
                    r#"
                    SELECT id, chat_room_id, sender_id, content, message_type, created_at
                    FROM messages
                    WHERE chat_room_id = $1 AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(Uuid::from(room_id))
                .bind(bound.created_at)
                .bind(bound.id)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_err)?
            }
            None => {
                sqlx::query_as::<_, MessageRecord>(
                    r#"
                    SELECT id, chat_room_id, sender_id, content, message_type, created_at
                    FROM messages
                    WHERE chat_room_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(Uuid::from(room_id))
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_err)?
            }
        };

        records.into_iter().map(Message::try_from).collect()
    }

    async fn latest(&self, room_id: RoomId) -> Result<Option<Message>, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, chat_room_id, sender_id, content, message_type, created_at
            FROM messages
            WHERE chat_room_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(Uuid::from(room_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Message::try_from).transpose()
    }

    async fn count_unread(
        &self,
        room_id: RoomId,
        reader_id: UserId,
        watermark: Option<Timestamp>,
    ) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE chat_room_id = $1
              AND sender_id <> $2
              AND created_at > COALESCE($3, 'epoch'::timestamptz)
            "#,
        )
        .bind(Uuid::from(room_id))
        .bind(Uuid::from(reader_id))
        .bind(watermark)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(count as u64)
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, email, nickname, avatar_url FROM users WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(User::from))
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let raw: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let records = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, email, nickname, avatar_url FROM users WHERE id = ANY($1)"#,
        )
        .bind(&raw)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(User::from).collect())
    }
}
