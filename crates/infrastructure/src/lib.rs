//! 基础设施层：Postgres 仓储与进程内的连接/通道注册表。

pub mod db;
pub mod registry;
pub mod repository;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

pub use db::{create_pool, DbPool};
pub use registry::{ChannelRegistry, ConnectionId};
pub use repository::{
    PgChatRoomRepository, PgMessageRepository, PgParticipantRepository, PgUserRepository,
};
