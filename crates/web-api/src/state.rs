use std::sync::Arc;

use application::{MessageService, ReadService, RoomService};
use infrastructure::ChannelRegistry;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub room_service: Arc<RoomService>,
    pub message_service: Arc<MessageService>,
    pub read_service: Arc<ReadService>,
    pub registry: Arc<ChannelRegistry>,
    pub jwt_service: Arc<JwtService>,
}
