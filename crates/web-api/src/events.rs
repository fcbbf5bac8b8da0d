//! WebSocket 客户端事件的线格式。
//!
//! 与服务端推送的 `ChatEvent` 同一种信封：`event` 字段区分类型，
//! `data` 字段装载荷。未知的 `event` 值在反序列化时报错。

use domain::{MessageType, RoomId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// 订阅房间通道并把房间标成已读。
    JoinRoom { chat_room_id: RoomId },
    SendMessage {
        chat_room_id: RoomId,
        content: String,
        #[serde(default, rename = "type")]
        message_type: MessageType,
    },
    /// 已读回执。
    ReadMessage { chat_room_id: RoomId },
}

/// 只发给当前连接的应答帧。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum GatewayReply {
    Joined { chat_room_id: RoomId },
    Error { message: String },
}
