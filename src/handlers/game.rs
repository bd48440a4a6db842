//! 게임 진행 핸들러 (시작/종료, 영상 변경, 재생 제어)

use crate::directory::{Submission, Video};
use crate::error::AppError;
use crate::hub::UserId;
use crate::protocol::{
    ChangeVideoRequest, GameStartContent, GameStateResponse, MemberResponse, PlaybackRequest,
    PlaybackStateContent, ServerMessage, StartGameResponse, VideoChangeContent, VideoSummary,
};
use crate::session::SessionData;
use crate::state::AppState;
use axum::{
    extract::{Extension, Path, State},
    response::Json,
};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 호스트 전용 동작 확인
fn require_host(session: &SessionData, action: &'static str) -> Result<(), AppError> {
    if !session.is_host {
        tracing::warn!(
            user_id = session.user_id,
            room_id = session.room_id,
            action,
            "Non-host attempted host action"
        );
        return Err(AppError::Forbidden("only the host can do that"));
    }
    Ok(())
}

/// 게임 시작: 제출된 영상을 섞어서 대기열을 만들고 방 전체에 알린다
pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<StartGameResponse>, AppError> {
    require_host(&session, "start_game")?;
    let room_id = session.room_id;

    if state.games.is_active(room_id) {
        return Err(AppError::Conflict("game already started".to_string()));
    }

    let (videos, submitters) = build_queue(state.directory.submissions(room_id));
    let members = state.directory.members(room_id);
    let summaries: Vec<VideoSummary> = videos.iter().map(summary).collect();
    let video_count = videos.len();

    if !state.games.start_game(room_id, videos, members, submitters) {
        return Err(AppError::Conflict("game already started".to_string()));
    }

    tracing::info!(room_id = room_id, videos = video_count, "Sending game start message");
    state
        .hub
        .broadcast_to_room(
            room_id,
            &ServerMessage::GameStart(GameStartContent { videos: summaries }),
        )
        .await;

    Ok(Json(StartGameResponse {
        success: true,
        video_count,
    }))
}

/// 게임 종료
pub async fn stop_game(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_host(&session, "stop_game")?;

    if !state.games.stop_game(session.room_id) {
        return Err(AppError::BadRequest(format!(
            "no active game to stop for room {}",
            session.room_id
        )));
    }

    state
        .hub
        .broadcast_to_room(session.room_id, &ServerMessage::GameStop)
        .await;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// 대기열의 다른 영상으로 교체 (타임라인은 0부터)
pub async fn change_video(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
    Json(body): Json<ChangeVideoRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_host(&session, "change_video")?;
    let room_id = session.room_id;

    let game = state
        .games
        .get_state(room_id)
        .ok_or_else(|| AppError::BadRequest("no active game".to_string()))?;
    let video = game.videos.get(body.index).ok_or_else(|| {
        tracing::warn!(room_id = room_id, index = body.index, "Video index out of range");
        AppError::BadRequest("video index out of range".to_string())
    })?;

    state.hub.set_current_video(
        room_id,
        &video.video_id,
        body.index,
        &video.title,
        &video.channel_name,
    );

    state
        .hub
        .broadcast_to_room(
            room_id,
            &ServerMessage::VideoChange(VideoChangeContent {
                video_id: video.video_id.clone(),
                index: body.index,
                title: video.title.clone(),
                channel: video.channel_name.clone(),
            }),
        )
        .await;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// 호스트 재생/일시정지/탐색 보고
pub async fn update_playback(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
    Json(body): Json<PlaybackRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_host(&session, "update_playback")?;

    if !body.timestamp.is_finite() || body.timestamp < 0.0 {
        return Err(AppError::BadRequest("timestamp must be a non-negative number".to_string()));
    }

    if !state
        .hub
        .update_playback_state(session.room_id, body.action, body.timestamp, body.is_paused)
    {
        return Err(AppError::Conflict("no video is playing".to_string()));
    }

    state
        .hub
        .broadcast_to_room(
            session.room_id,
            &ServerMessage::PlaybackState(PlaybackStateContent {
                is_paused: body.is_paused,
                timestamp: body.timestamp,
                action: body.action,
            }),
        )
        .await;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// 로비/게임 화면 결정용 상태 조회
pub async fn game_state(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<GameStateResponse>, AppError> {
    let room_id = session.room_id;
    let room = state
        .directory
        .get(room_id)
        .ok_or_else(|| AppError::NotFound(format!("room {room_id} not found")))?;
    let game = state.games.get_state(room_id);

    Ok(Json(GameStateResponse {
        active: game.is_some(),
        room_id,
        room_name: room.name,
        is_host: session.is_host,
        started_at_unix: game.as_ref().map(|g| g.started_at_unix),
        videos: game
            .as_ref()
            .map(|g| g.videos.iter().map(summary).collect()),
        current_video: game.as_ref().and_then(|_| state.hub.playback_position(room_id)),
        connected_clients: state.hub.connected_count(room_id).await,
    }))
}

/// 영상 제출자 조회 (호스트 전용)
pub async fn video_submitter(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
    Path(video_id): Path<String>,
) -> Result<Json<MemberResponse>, AppError> {
    require_host(&session, "video_submitter")?;

    let member = state
        .games
        .get_submitter(session.room_id, &video_id)
        .ok_or_else(|| AppError::NotFound(format!("no submitter for video {video_id}")))?;

    Ok(Json(MemberResponse {
        user_id: member.id,
        display_name: member.name,
        avatar: member.avatar,
    }))
}

/// 중복 없는 영상 목록을 무작위 순서로 섞고 제출자 색인을 만든다.
/// 같은 영상을 여러 명이 냈으면 먼저 낸 사람이 제출자.
pub fn build_queue(submissions: Vec<Submission>) -> (Vec<Video>, HashMap<String, UserId>) {
    let mut seen = HashSet::new();
    let mut submitters = HashMap::new();
    let mut videos = Vec::new();

    for submission in submissions {
        if seen.insert(submission.video.video_id.clone()) {
            submitters.insert(submission.video.video_id.clone(), submission.submitter_id);
            videos.push(submission.video);
        }
    }

    videos.shuffle(&mut rand::thread_rng());
    (videos, submitters)
}

fn summary(video: &Video) -> VideoSummary {
    VideoSummary {
        video_id: video.video_id.clone(),
        title: video.title.clone(),
        channel_name: video.channel_name.clone(),
        thumbnail_url: video.thumbnail_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(video_id: &str, submitter_id: UserId) -> Submission {
        Submission {
            video: Video {
                video_id: video_id.to_string(),
                title: format!("title {video_id}"),
                channel_name: "chan".to_string(),
                thumbnail_url: String::new(),
            },
            submitter_id,
        }
    }

    #[test]
    fn queue_is_a_permutation_of_distinct_videos() {
        let (videos, submitters) = build_queue(vec![
            submission("a", 1),
            submission("b", 2),
            submission("a", 3),
            submission("c", 3),
        ]);

        let mut ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(submitters["a"], 1);
        assert_eq!(submitters["c"], 3);
    }

    #[test]
    fn empty_submissions_give_empty_queue() {
        let (videos, submitters) = build_queue(Vec::new());
        assert!(videos.is_empty());
        assert!(submitters.is_empty());
    }
}
