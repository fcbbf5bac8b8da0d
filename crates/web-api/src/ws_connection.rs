//! 单个 WebSocket 连接的生命周期。
//!
//! 连接建立即订阅用户的个人通道；订阅的房间通道随 `join_room`
//! 增加；断开时统一退订并注销收件箱。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use application::{ChannelKey, ChatEvent};
use domain::UserId;
use infrastructure::ConnectionId;

use crate::{
    error::ApiError,
    events::{ClientEvent, GatewayReply},
    state::AppState,
};

pub struct WsConnection {
    state: AppState,
    user_id: UserId,
    connection_id: ConnectionId,
    mailbox: mpsc::Receiver<ChatEvent>,
}

impl WsConnection {
    /// 注册收件箱并订阅个人通道。此时还没有任何房间订阅。
    pub async fn establish(state: AppState, user_id: UserId) -> Self {
        let (connection_id, mailbox) = state.registry.bind().await;
        state
            .registry
            .subscribe(connection_id, ChannelKey::User(user_id))
            .await;

        tracing::info!(%user_id, %connection_id, "websocket connected");

        Self {
            state,
            user_id,
            connection_id,
            mailbox,
        }
    }

    pub async fn run(mut self, socket: WebSocket) {
        let (mut sender, mut incoming) = socket.split();

        loop {
            tokio::select! {
                event = self.mailbox.recv() => {
                    let Some(event) = event else { break };
                    let payload = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize event");
                            continue;
                        }
                    };
                    if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                frame = incoming.next() => {
                    let reply = match frame {
                        Some(Ok(WsMessage::Text(text))) => self.handle_text(&text).await,
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => None,
                        Some(Err(_)) => break,
                    };
                    if let Some(reply) = reply {
                        let payload = match serde_json::to_string(&reply) {
                            Ok(json) => json,
                            Err(err) => {
                                tracing::warn!(error = %err, "failed to serialize reply");
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        self.state.registry.unbind(self.connection_id).await;
        tracing::info!(user_id = %self.user_id, connection_id = %self.connection_id, "websocket disconnected");
    }

    /// 处理一条客户端帧。错误只回给当前连接，不打断其他事件流。
    async fn handle_text(&self, text: &str) -> Option<GatewayReply> {
        let event: ClientEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(err) => {
                return Some(GatewayReply::Error {
                    message: format!("malformed event: {err}"),
                })
            }
        };

        match self.dispatch(event).await {
            Ok(reply) => reply,
            Err(err) => Some(GatewayReply::Error {
                message: err.message().to_owned(),
            }),
        }
    }

    async fn dispatch(&self, event: ClientEvent) -> Result<Option<GatewayReply>, ApiError> {
        match event {
            ClientEvent::JoinRoom { chat_room_id } => {
                // 成员校验在订阅之前，外人订阅不到任何通道
                self.state
                    .room_service
                    .validate_participant(self.user_id, chat_room_id)
                    .await?;
                self.state
                    .registry
                    .subscribe(self.connection_id, ChannelKey::Room(chat_room_id))
                    .await;
                self.state
                    .read_service
                    .mark_read_on_join(self.user_id, chat_room_id)
                    .await?;
                Ok(Some(GatewayReply::Joined { chat_room_id }))
            }
            ClientEvent::SendMessage {
                chat_room_id,
                content,
                message_type,
            } => {
                self.state
                    .message_service
                    .send_message(self.user_id, chat_room_id, content, message_type)
                    .await?;
                Ok(None)
            }
            ClientEvent::ReadMessage { chat_room_id } => {
                self.state
                    .read_service
                    .acknowledge_read(self.user_id, chat_room_id)
                    .await?;
                Ok(None)
            }
        }
    }
}
