//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、事务边界、
//! 以及对外部适配器（存储、事件广播）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod repository;
pub mod services;

pub use broadcaster::{BroadcastError, ChannelKey, ChatEvent, EventBroadcaster, RoomActivity};
pub use clock::{Clock, SystemClock};
pub use dto::{
    MessagePage, ParticipantProfile, RoomDetail, RoomSummary, UserSummary,
};
pub use error::ApplicationError;
pub use repository::{
    ChatRoomRepository, MessageRepository, ParticipantRepository, UserRepository,
};
pub use services::{
    MessageService, MessageServiceDependencies, ReadService, ReadServiceDependencies,
    RoomService, RoomServiceDependencies,
};
