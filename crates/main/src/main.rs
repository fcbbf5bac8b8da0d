//! 主应用程序入口
//!
//! 加载配置、连接数据库、装配服务并启动 Axum 服务。

use std::sync::Arc;

use application::{
    Clock, MessageService, MessageServiceDependencies, ReadService, ReadServiceDependencies,
    RoomService, RoomServiceDependencies, SystemClock,
};
use config::AppConfig;
use infrastructure::{
    create_pool, ChannelRegistry, PgChatRoomRepository, PgMessageRepository,
    PgParticipantRepository, PgUserRepository, MIGRATOR,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').last().unwrap_or("unknown")
    );
    let pool = create_pool(&config.database.url, config.database.max_connections).await?;
    MIGRATOR.run(&pool).await?;

    let room_repository = Arc::new(PgChatRoomRepository::new(pool.clone()));
    let participant_repository = Arc::new(PgParticipantRepository::new(pool.clone()));
    let message_repository = Arc::new(PgMessageRepository::new(pool.clone()));
    let user_repository = Arc::new(PgUserRepository::new(pool));

    let registry = Arc::new(ChannelRegistry::new(config.broadcast.mailbox_capacity));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let room_service = Arc::new(RoomService::new(RoomServiceDependencies {
        room_repository: room_repository.clone(),
        participant_repository: participant_repository.clone(),
        message_repository: message_repository.clone(),
        user_repository,
        clock: clock.clone(),
    }));
    let message_service = Arc::new(MessageService::new(MessageServiceDependencies {
        room_repository,
        participant_repository: participant_repository.clone(),
        message_repository: message_repository.clone(),
        broadcaster: registry.clone(),
        clock: clock.clone(),
    }));
    let read_service = Arc::new(ReadService::new(ReadServiceDependencies {
        participant_repository,
        message_repository,
        broadcaster: registry.clone(),
        clock,
    }));

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState {
        room_service,
        message_service,
        read_service,
        registry,
        jwt_service,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("服务启动: http://{addr}");

    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}
