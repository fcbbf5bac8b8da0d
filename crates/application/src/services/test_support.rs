//! 服务层测试用的内存假件。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use domain::{
    ChatRoom, Message, MessageId, PairKey, Participant, RepositoryError, RoomId, Timestamp, User,
    UserId,
};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    broadcaster::{BroadcastError, ChannelKey, ChatEvent, EventBroadcaster},
    clock::Clock,
    repository::{ChatRoomRepository, MessageRepository, ParticipantRepository, UserRepository},
};

/// 单个 Mutex 罩住全部表，模拟事务原子性。
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    rooms: Vec<ChatRoom>,
    participants: Vec<Participant>,
    messages: Vec<Message>,
    users: Vec<User>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, user: User) {
        self.inner.lock().unwrap().users.push(user);
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().unwrap().rooms.len()
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    pub fn participants_of(&self, room_id: RoomId) -> Vec<Participant> {
        self.inner
            .lock()
            .unwrap()
            .participants
            .iter()
            .filter(|p| p.chat_room_id == room_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatRoomRepository for InMemoryStore {
    async fn create_private(
        &self,
        room: ChatRoom,
        participants: [Participant; 2],
    ) -> Result<ChatRoom, RepositoryError> {
        let mut tables = self.inner.lock().unwrap();
        let duplicate = tables
            .rooms
            .iter()
            .any(|r| r.pair_key.is_some() && r.pair_key == room.pair_key);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.rooms.push(room.clone());
        tables.participants.extend(participants);
        Ok(room)
    }

    async fn create_group(
        &self,
        room: ChatRoom,
        participants: Vec<Participant>,
    ) -> Result<ChatRoom, RepositoryError> {
        let mut tables = self.inner.lock().unwrap();
        tables.rooms.push(room.clone());
        tables.participants.extend(participants);
        Ok(room)
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<ChatRoom>, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.rooms.iter().find(|r| r.id == id).cloned())
    }

    async fn find_private_by_pair_key(
        &self,
        pair_key: &PairKey,
    ) -> Result<Option<ChatRoom>, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .rooms
            .iter()
            .find(|r| r.pair_key.as_ref() == Some(pair_key))
            .cloned())
    }
}

#[async_trait]
impl ParticipantRepository for InMemoryStore {
    async fn find(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<Participant>, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .participants
            .iter()
            .find(|p| p.user_id == user_id && p.chat_room_id == room_id)
            .cloned())
    }

    async fn list_by_room(&self, room_id: RoomId) -> Result<Vec<Participant>, RepositoryError> {
        Ok(self.participants_of(room_id))
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Participant>, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn advance_read_watermark(
        &self,
        user_id: UserId,
        room_id: RoomId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.lock().unwrap();
        let participant = tables
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id && p.chat_room_id == room_id)
            .ok_or(RepositoryError::NotFound)?;
        participant.advance_read_watermark(at);
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn append(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut tables = self.inner.lock().unwrap();
        let room = tables
            .rooms
            .iter_mut()
            .find(|r| r.id == message.chat_room_id)
            .ok_or(RepositoryError::NotFound)?;
        room.last_message_at = Some(message.created_at);
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_page(
        &self,
        room_id: RoomId,
        before: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        let bound = match before {
            Some(cursor) => Some(
                tables
                    .messages
                    .iter()
                    .find(|m| m.id == cursor)
                    .map(Message::ordering_key)
                    .ok_or(RepositoryError::NotFound)?,
            ),
            None => None,
        };

        let mut page: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.chat_room_id == room_id)
            .filter(|m| bound.map_or(true, |b| m.ordering_key() < b))
            .cloned()
            .collect();
        page.sort_by(|a, b| a.cmp_newest_first(b));
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn latest(&self, room_id: RoomId) -> Result<Option<Message>, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.chat_room_id == room_id)
            .max_by_key(|m| m.ordering_key())
            .cloned())
    }

    async fn count_unread(
        &self,
        room_id: RoomId,
        reader_id: UserId,
        watermark: Option<Timestamp>,
    ) -> Result<u64, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        let watermark = watermark.unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Ok(tables
            .messages
            .iter()
            .filter(|m| {
                m.chat_room_id == room_id
                    && m.sender_id != reader_id
                    && m.created_at > watermark
            })
            .count() as u64)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }
}

/// 记录所有发布事件的广播器。
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(ChannelKey, ChatEvent)>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(ChannelKey, ChatEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_on(&self, channel: ChannelKey) -> Vec<ChatEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| *key == channel)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

#[async_trait]
impl EventBroadcaster for RecordingBroadcaster {
    async fn publish(&self, channel: ChannelKey, event: ChatEvent) -> Result<(), BroadcastError> {
        self.events.lock().unwrap().push((channel, event));
        Ok(())
    }
}

/// 手动拨动的时钟，测试里控制时间前进。
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(OffsetDateTime::now_utc()),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }
}

pub fn user_id() -> UserId {
    UserId::from(Uuid::new_v4())
}

pub fn test_user(id: UserId, nickname: &str) -> User {
    User {
        id,
        nickname: nickname.to_owned(),
        avatar_url: None,
        email: format!("{}@example.com", nickname),
    }
}
