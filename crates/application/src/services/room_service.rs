use std::collections::BTreeSet;
use std::sync::Arc;

use domain::{
    ChatRoom, DomainError, PairKey, Participant, ParticipantRole, RepositoryError, RoomId, UserId,
};

use crate::{
    clock::Clock,
    dto::{ParticipantProfile, RoomDetail, RoomSummary, UserSummary},
    error::ApplicationError,
    repository::{ChatRoomRepository, MessageRepository, ParticipantRepository, UserRepository},
};

pub struct RoomServiceDependencies {
    pub room_repository: Arc<dyn ChatRoomRepository>,
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct RoomService {
    deps: RoomServiceDependencies,
}

impl RoomService {
    pub fn new(deps: RoomServiceDependencies) -> Self {
        Self { deps }
    }

    /// 私聊房间的幂等解析：已有房间直接返回，没有就建。
    ///
    /// 并发场景下两个调用可能同时走到创建分支，靠 pair_key
    /// 唯一索引兜底：慢的一方拿到 Conflict 后重新查询获胜者。
    pub async fn resolve_private_room(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<ChatRoom, ApplicationError> {
        if user_id == friend_id {
            return Err(DomainError::SelfRoomCreation.into());
        }

        let pair_key = PairKey::new(user_id, friend_id);
        if let Some(existing) = self
            .deps
            .room_repository
            .find_private_by_pair_key(&pair_key)
            .await?
        {
            return Ok(existing);
        }

        let now = self.deps.clock.now();
        let room = ChatRoom::new_private(user_id, friend_id, now)?;
        let participants = [
            Participant::new(user_id, room.id, ParticipantRole::Member, now),
            Participant::new(friend_id, room.id, ParticipantRole::Member, now),
        ];

        match self
            .deps
            .room_repository
            .create_private(room, participants)
            .await
        {
            Ok(created) => {
                tracing::info!(room_id = %created.id, "私聊房间已创建");
                Ok(created)
            }
            Err(RepositoryError::Conflict) => {
                // 并发创建输了，取获胜者
                self.deps
                    .room_repository
                    .find_private_by_pair_key(&pair_key)
                    .await?
                    .ok_or_else(|| {
                        RepositoryError::storage("pair key conflict but no room found").into()
                    })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 创建群聊：成员去重后并入创建者，创建者是 admin。
    pub async fn create_group_room(
        &self,
        creator_id: UserId,
        name: String,
        member_ids: Vec<UserId>,
    ) -> Result<ChatRoom, ApplicationError> {
        let mut members: BTreeSet<UserId> = member_ids.into_iter().collect();
        members.insert(creator_id);
        if members.len() < 2 {
            return Err(DomainError::invalid_argument(
                "member_ids",
                "a group room needs at least two distinct participants",
            )
            .into());
        }

        let now = self.deps.clock.now();
        let room = ChatRoom::new_group(name, creator_id, now)?;
        let participants = members
            .into_iter()
            .map(|user_id| {
                let role = if user_id == creator_id {
                    ParticipantRole::Admin
                } else {
                    ParticipantRole::Member
                };
                Participant::new(user_id, room.id, role, now)
            })
            .collect();

        let created = self
            .deps
            .room_repository
            .create_group(room, participants)
            .await?;
        tracing::info!(room_id = %created.id, creator_id = %creator_id, "群聊房间已创建");
        Ok(created)
    }

    /// 房间级操作的统一守卫。
    pub async fn validate_participant(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Participant, ApplicationError> {
        self.deps
            .participant_repository
            .find(user_id, room_id)
            .await?
            .ok_or_else(|| DomainError::NotParticipant.into())
    }

    /// 侧边栏：按活跃时间排序的房间列表，
    /// 带最后一条消息、未读数，私聊还带对方档案。
    pub async fn list_my_rooms(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RoomSummary>, ApplicationError> {
        let memberships = self
            .deps
            .participant_repository
            .list_by_user(user_id)
            .await?;

        let mut summaries = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let room_id = membership.chat_room_id;
            let Some(room) = self.deps.room_repository.find_by_id(room_id).await? else {
                continue;
            };

            let last_message = self.deps.message_repository.latest(room_id).await?;
            let unread_count = self
                .deps
                .message_repository
                .count_unread(room_id, user_id, membership.last_read_at)
                .await?;

            let other_user = if room.is_group {
                None
            } else {
                self.find_other_user(user_id, room_id).await?
            };

            summaries.push(RoomSummary {
                id: room.id,
                is_group: room.is_group,
                name: room.name.clone(),
                last_message,
                last_message_at: room.last_message_at,
                unread_count,
                other_user,
            });
        }

        // 最近活跃的排前面，还没有消息的房间垫底
        summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(summaries)
    }

    /// 房间详情：房间本体加全部成员档案。
    pub async fn room_detail(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<RoomDetail, ApplicationError> {
        self.validate_participant(user_id, room_id).await?;

        let room = self
            .deps
            .room_repository
            .find_by_id(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound)?;

        let participants = self
            .deps
            .participant_repository
            .list_by_room(room_id)
            .await?;
        let ids: Vec<UserId> = participants.iter().map(|p| p.user_id).collect();
        let users = self.deps.user_repository.find_by_ids(&ids).await?;

        let profiles = participants
            .iter()
            .filter_map(|participant| {
                users
                    .iter()
                    .find(|user| user.id == participant.user_id)
                    .map(|user| ParticipantProfile::new(participant, user.clone()))
            })
            .collect();

        Ok(RoomDetail {
            room,
            participants: profiles,
        })
    }

    async fn find_other_user(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<UserSummary>, ApplicationError> {
        let participants = self
            .deps
            .participant_repository
            .list_by_room(room_id)
            .await?;
        let Some(other) = participants.iter().find(|p| p.user_id != user_id) else {
            return Ok(None);
        };
        let user = self.deps.user_repository.find_by_id(other.user_id).await?;
        Ok(user.map(UserSummary::from))
    }
}
