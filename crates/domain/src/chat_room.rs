use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;
use crate::value_objects::{PairKey, RoomId, Timestamp, UserId};

/// 聊天室实体。私聊（两人）没有名称、携带规范化用户对键；
/// 群聊必须有名称和创建者。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: RoomId,
    pub is_group: bool,
    pub name: Option<String>,
    pub created_by: Option<UserId>,
    #[serde(skip_serializing, default)]
    pub pair_key: Option<PairKey>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<Timestamp>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
}

impl ChatRoom {
    /// 新建私聊房间。调用方负责保证两个用户不同。
    pub fn new_private(a: UserId, b: UserId, now: Timestamp) -> Result<Self, DomainError> {
        if a == b {
            return Err(DomainError::SelfRoomCreation);
        }
        Ok(Self {
            id: RoomId::from(Uuid::new_v4()),
            is_group: false,
            name: None,
            created_by: None,
            pair_key: Some(PairKey::new(a, b)),
            last_message_at: None,
            created_at: now,
        })
    }

    /// 新建群聊房间。
    pub fn new_group(
        name: impl Into<String>,
        created_by: UserId,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(DomainError::invalid_argument("name", "cannot be empty"));
        }
        Ok(Self {
            id: RoomId::from(Uuid::new_v4()),
            is_group: true,
            name: Some(name),
            created_by: Some(created_by),
            pair_key: None,
            last_message_at: None,
            created_at: now,
        })
    }
}
