//! 영상 제출 핸들러

use crate::directory::Video;
use crate::error::AppError;
use crate::protocol::{RemoveVideoRequest, SubmitVideoRequest, VideoSummary};
use crate::session::SessionData;
use crate::state::AppState;
use axum::{
    extract::{Extension, State},
    response::Json,
};
use std::sync::Arc;

/// 방에 제출된 영상 목록
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
) -> Json<Vec<VideoSummary>> {
    let videos = state
        .directory
        .submissions(session.room_id)
        .into_iter()
        .map(|s| VideoSummary {
            video_id: s.video.video_id,
            title: s.video.title,
            channel_name: s.video.channel_name,
            thumbnail_url: s.video.thumbnail_url,
        })
        .collect();
    Json(videos)
}

pub async fn submit_video(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
    Json(body): Json<SubmitVideoRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    ensure_lobby(&state, &session)?;

    if body.video_id.trim().is_empty() {
        return Err(AppError::BadRequest("video id is required".to_string()));
    }

    let video = Video {
        video_id: body.video_id.trim().to_string(),
        title: body.title,
        channel_name: body.channel_name,
        thumbnail_url: body.thumbnail_url,
    };
    if !state
        .directory
        .submit_video(session.room_id, session.user_id, video)
    {
        return Err(AppError::Conflict("video already submitted".to_string()));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn remove_video(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
    Json(body): Json<RemoveVideoRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    ensure_lobby(&state, &session)?;

    if !state
        .directory
        .remove_video(session.room_id, session.user_id, &body.video_id)
    {
        return Err(AppError::NotFound(format!(
            "video {} not submitted by you",
            body.video_id
        )));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// 게임 중에는 대기열이 고정된다
fn ensure_lobby(state: &AppState, session: &SessionData) -> Result<(), AppError> {
    if state.games.is_active(session.room_id) {
        return Err(AppError::Conflict("game in progress".to_string()));
    }
    Ok(())
}
