//! 集成测试的内存装配：真实的服务、路由和通道注册表，
//! 仓储换成进程内实现，不需要数据库。

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::TcpListener;
use uuid::Uuid;

use application::{
    ChatRoomRepository, Clock, MessageRepository, MessageService, MessageServiceDependencies,
    ParticipantRepository, ReadService, ReadServiceDependencies, RoomService,
    RoomServiceDependencies, SystemClock, UserRepository,
};
use domain::{
    ChatRoom, Message, MessageId, PairKey, Participant, RepositoryError, RoomId, Timestamp, User,
    UserId,
};
use infrastructure::ChannelRegistry;
use time::OffsetDateTime;
use web_api::{router, AppState, JwtConfig, JwtService};

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
    pub fn add_user(&self, id: UserId, nickname: &str) {
        self.inner.lock().unwrap().users.push(User {
            id,
            nickname: nickname.to_owned(),
            avatar_url: None,
            email: format!("{nickname}@example.com"),
        });
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
        if tables
            .rooms
            .iter()
            .any(|r| r.pair_key.is_some() && r.pair_key == room.pair_key)
        {
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
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .participants
            .iter()
            .filter(|p| p.chat_room_id == room_id)
            .cloned()
            .collect())
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
                m.chat_room_id == room_id && m.sender_id != reader_id && m.created_at > watermark
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

pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<InMemoryStore>,
    pub jwt: Arc<JwtService>,
}

impl TestApp {
    pub fn token(&self, user_id: UserId) -> String {
        self.jwt.generate_token(user_id).expect("token")
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn new_user(&self, nickname: &str) -> UserId {
        let id = UserId::from(Uuid::new_v4());
        self.store.add_user(id, nickname);
        id
    }
}

pub async fn spawn_app() -> TestApp {
    let store = Arc::new(InMemoryStore::default());
    let registry = Arc::new(ChannelRegistry::new(64));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let jwt = Arc::new(JwtService::new(JwtConfig {
        secret: "integration-test-secret".to_owned(),
        expiration_hours: 1,
    }));

    let room_service = Arc::new(RoomService::new(RoomServiceDependencies {
        room_repository: store.clone(),
        participant_repository: store.clone(),
        message_repository: store.clone(),
        user_repository: store.clone(),
        clock: clock.clone(),
    }));
    let message_service = Arc::new(MessageService::new(MessageServiceDependencies {
        room_repository: store.clone(),
        participant_repository: store.clone(),
        message_repository: store.clone(),
        broadcaster: registry.clone(),
        clock: clock.clone(),
    }));
    let read_service = Arc::new(ReadService::new(ReadServiceDependencies {
        participant_repository: store.clone(),
        message_repository: store.clone(),
        broadcaster: registry.clone(),
        clock,
    }));

    let state = AppState {
        room_service,
        message_service,
        read_service,
        registry,
        jwt_service: jwt.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state).into_make_service())
            .await
            .ok();
    });

    TestApp { addr, store, jwt }
}
