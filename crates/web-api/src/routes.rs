use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use application::{MessagePage, RoomDetail, RoomSummary};
use domain::{ChatRoom, MessageId, RoomId, UserId};

use crate::{error::ApiError, state::AppState, ws_connection::WsConnection};

#[derive(Debug, Deserialize)]
struct PrivateRoomPayload {
    friend_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct GroupRoomPayload {
    name: String,
    member_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    cursor: Option<Uuid>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/chat", chat_routes())
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/private", post(create_private_room))
        .route("/rooms/group", post(create_group_room))
        .route("/rooms/{room_id}", get(room_detail))
        .route("/rooms/{room_id}/messages", get(message_history))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_private_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PrivateRoomPayload>,
) -> Result<(StatusCode, Json<ChatRoom>), ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let room = state
        .room_service
        .resolve_private_room(user_id, UserId::from(payload.friend_id))
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

async fn create_group_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GroupRoomPayload>,
) -> Result<(StatusCode, Json<ChatRoom>), ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let members = payload.member_ids.into_iter().map(UserId::from).collect();
    let room = state
        .room_service
        .create_group_room(user_id, payload.name, members)
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoomSummary>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let rooms = state.room_service.list_my_rooms(user_id).await?;
    Ok(Json(rooms))
}

async fn room_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomDetail>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let detail = state
        .room_service
        .room_detail(user_id, RoomId::from(room_id))
        .await?;
    Ok(Json(detail))
}

async fn message_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagePage>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let page = state
        .message_service
        .page_messages(
            user_id,
            RoomId::from(room_id),
            query.cursor.map(MessageId::from),
            query.limit,
        )
        .await?;
    Ok(Json(page))
}

/// 握手阶段就验 token，无效凭据拿不到升级响应。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = state.jwt_service.verify_token(&query.token)?;

    Ok(ws.on_upgrade(move |socket| async move {
        let connection = WsConnection::establish(state, user_id).await;
        connection.run(socket).await;
    }))
}
