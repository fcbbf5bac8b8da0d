//! 进程内的通道注册表。
//!
//! 一个连接先 `bind` 拿到收件箱，再按需订阅若干通道；
//! 发布走通道维度的扇出，慢消费者丢消息而不是拖垮整体。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

use application::{BroadcastError, ChannelKey, ChatEvent, EventBroadcaster};

/// 单个 WebSocket 连接的标识。一个用户可以有多个连接（多设备）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct ChannelRegistry {
    mailbox_capacity: usize,
    senders: RwLock<HashMap<ConnectionId, mpsc::Sender<ChatEvent>>>,
    subscribers: RwLock<HashMap<ChannelKey, HashSet<ConnectionId>>>,
    subscriptions: RwLock<HashMap<ConnectionId, HashSet<ChannelKey>>>,
}

impl ChannelRegistry {
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            mailbox_capacity,
            senders: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// 注册连接，返回它的收件箱。
    pub async fn bind(&self) -> (ConnectionId, mpsc::Receiver<ChatEvent>) {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        self.senders.write().await.insert(id, tx);
        self.subscriptions.write().await.insert(id, HashSet::new());
        (id, rx)
    }

    /// 订阅幂等：重复订阅同一通道不产生重复投递。
    pub async fn subscribe(&self, connection_id: ConnectionId, channel: ChannelKey) {
        self.subscribers
            .write()
            .await
            .entry(channel)
            .or_default()
            .insert(connection_id);
        self.subscriptions
            .write()
            .await
            .entry(connection_id)
            .or_default()
            .insert(channel);
    }

    pub async fn unsubscribe(&self, connection_id: ConnectionId, channel: ChannelKey) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(set) = subscribers.get_mut(&channel) {
            set.remove(&connection_id);
            if set.is_empty() {
                subscribers.remove(&channel);
            }
        }
        if let Some(set) = self.subscriptions.write().await.get_mut(&connection_id) {
            set.remove(&channel);
        }
    }

    /// 断开连接时的整体清理。
    pub async fn unbind(&self, connection_id: ConnectionId) {
        self.senders.write().await.remove(&connection_id);
        let channels = self
            .subscriptions
            .write()
            .await
            .remove(&connection_id)
            .unwrap_or_default();
        let mut subscribers = self.subscribers.write().await;
        for channel in channels {
            if let Some(set) = subscribers.get_mut(&channel) {
                set.remove(&connection_id);
                if set.is_empty() {
                    subscribers.remove(&channel);
                }
            }
        }
    }

    pub async fn is_subscribed(&self, connection_id: ConnectionId, channel: ChannelKey) -> bool {
        self.subscriptions
            .read()
            .await
            .get(&connection_id)
            .is_some_and(|set| set.contains(&channel))
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

#[async_trait]
impl EventBroadcaster for ChannelRegistry {
    async fn publish(&self, channel: ChannelKey, event: ChatEvent) -> Result<(), BroadcastError> {
        let targets: Vec<ConnectionId> = match self.subscribers.read().await.get(&channel) {
            Some(set) => set.iter().copied().collect(),
            None => return Ok(()),
        };

        let mut dead = Vec::new();
        {
            let senders = self.senders.read().await;
            for connection_id in targets {
                let Some(sender) = senders.get(&connection_id) else {
                    dead.push(connection_id);
                    continue;
                };
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        // 收件箱满说明消费端卡住，丢这条而不是阻塞发布方
                        warn!(%connection_id, %channel, "mailbox full, dropping event");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(connection_id);
                    }
                }
            }
        }

        for connection_id in dead {
            self.unbind(connection_id).await;
        }
        Ok(())
    }
}
