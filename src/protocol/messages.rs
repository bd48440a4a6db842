//! 서버 → 클라이언트 메시지와 HTTP 요청/응답 본문 정의

use crate::hub::{RoomId, UserId};
use serde::{Deserialize, Serialize};

/// 서버 → 클라이언트 메시지
///
/// 클라이언트 → 서버 애플리케이션 메시지는 없다. pong 프레임만 받는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ServerMessage {
    GameStart(GameStartContent),
    GameStop,
    VideoChange(VideoChangeContent),
    CurrentVideo(CurrentVideoContent),
    PlaybackState(PlaybackStateContent),
}

impl ServerMessage {
    /// 와이어 포맷(JSON 텍스트)으로 직렬화
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartContent {
    pub videos: Vec<VideoSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoChangeContent {
    pub video_id: String,
    pub index: usize,
    pub title: String,
    pub channel: String,
}

/// 늦게 들어온 클라이언트에게 보내는 현재 재생 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentVideoContent {
    pub video_id: String,
    pub index: usize,
    pub title: String,
    pub channel: String,
    pub timestamp: f64,
    pub is_paused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStateContent {
    pub is_paused: bool,
    pub timestamp: f64,
    pub action: PlaybackAction,
}

/// 호스트 재생 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Play,
    Pause,
    Seek,
}

impl std::fmt::Display for PlaybackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PlaybackAction::Play => "play",
            PlaybackAction::Pause => "pause",
            PlaybackAction::Seek => "seek",
        })
    }
}

/// 대기열 영상 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thumbnail_url: String,
}

// ---- HTTP 본문 ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRequest {
    pub room_name: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// roomId와 roomName 중 하나는 있어야 한다 (둘 다 있으면 roomId 우선)
    pub room_id: Option<RoomId>,
    pub room_name: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
}

/// 방 검색 쿼리 (`?name=`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomSearchQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub room_name: String,
    pub member_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub is_host: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVideoRequest {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    #[serde(default)]
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveVideoRequest {
    pub video_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeVideoRequest {
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackRequest {
    pub action: PlaybackAction,
    pub timestamp: f64,
    pub is_paused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameResponse {
    pub success: bool,
    pub video_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    pub active: bool,
    pub room_id: RoomId,
    pub room_name: String,
    pub is_host: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_unix: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<VideoSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_video: Option<CurrentVideoContent>,
    pub connected_clients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_video_uses_type_envelope() {
        let msg = ServerMessage::CurrentVideo(CurrentVideoContent {
            video_id: "abc".into(),
            index: 0,
            title: "T".into(),
            channel: "C".into(),
            timestamp: 2.0,
            is_paused: false,
        });
        let value: serde_json::Value = serde_json::from_str(&msg.to_text().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "current_video",
                "content": {
                    "videoId": "abc",
                    "index": 0,
                    "title": "T",
                    "channel": "C",
                    "timestamp": 2.0,
                    "isPaused": false
                }
            })
        );
    }

    #[test]
    fn game_stop_has_no_payload() {
        let text = ServerMessage::GameStop.to_text().unwrap();
        assert_eq!(text, r#"{"type":"game_stop"}"#);
    }

    #[test]
    fn playback_action_is_lowercase() {
        let req: PlaybackRequest =
            serde_json::from_str(r#"{"action":"seek","timestamp":42.5,"isPaused":true}"#).unwrap();
        assert_eq!(req.action, PlaybackAction::Seek);
        assert!(serde_json::from_str::<PlaybackRequest>(
            r#"{"action":"rewind","timestamp":1,"isPaused":false}"#
        )
        .is_err());
    }
}
