//! 방 검색 (로그인 전 공개 라우트)

use crate::protocol::{RoomSearchQuery, RoomSummary};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::Json,
};
use std::sync::Arc;

/// 이름으로 방 검색. 검색어가 비어 있으면 전체 목록.
pub async fn search_rooms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoomSearchQuery>,
) -> Json<Vec<RoomSummary>> {
    let rooms: Vec<RoomSummary> = state
        .directory
        .search(&query.name)
        .into_iter()
        .map(|room| RoomSummary {
            room_id: room.id,
            room_name: room.name,
            member_count: room.members.len(),
        })
        .collect();

    tracing::debug!(query = %query.name, found = rooms.len(), "Searched rooms");
    Json(rooms)
}
