//! 세션 쿠키 처리 (발급, 검증 미들웨어, 로그아웃)

use crate::error::AppError;
use crate::protocol::{HostRequest, JoinRequest, ServerMessage, SessionResponse};
use crate::session::SessionData;
use crate::state::AppState;
use axum::{
    extract::{Extension, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

pub const SESSION_COOKIE_NAME: &str = "gang_session";

/// Cookie 헤더에서 세션 토큰 추출
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// HttpOnly, SameSite=Strict 세션 쿠키
pub fn session_cookie_header(state: &AppState, token: &str) -> Result<HeaderValue, AppError> {
    let session = &state.config.session;
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        SESSION_COOKIE_NAME, token, session.lifetime_secs
    );
    if session.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.to_string()))
}

pub fn clear_cookie_header() -> HeaderValue {
    HeaderValue::from_static("gang_session=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict")
}

/// 보호된 라우트용 미들웨어.
/// 유효한 세션이면 `SessionData`를 요청 확장에 넣고, 오래된 토큰은 응답에서 재발급한다.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = session_cookie(req.headers()) else {
        tracing::debug!(path = %req.uri().path(), "No session cookie found");
        return reject();
    };

    let session = match state.sessions.validate_token(&token) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Error validating session");
            return reject();
        }
    };

    if state.directory.get(session.room_id).is_none() {
        tracing::warn!(room_id = session.room_id, "Room from session not found");
        return reject();
    }

    req.extensions_mut().insert(session.clone());
    let mut response = next.run(req).await;

    // 핸들러가 이미 쿠키를 정했으면 (로그아웃) 재발급하지 않는다
    if !response.headers().contains_key(SET_COOKIE) && state.sessions.should_rotate(&token) {
        match state
            .sessions
            .rotate_token(&token, &session)
            .map_err(AppError::from)
            .and_then(|new_token| session_cookie_header(&state, &new_token))
        {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
                tracing::debug!(user_id = session.user_id, "Session token rotated");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to rotate session token"),
        }
    }

    response
}

/// 401 + 쿠키 삭제
fn reject() -> Response {
    let mut response = AppError::Unauthorized.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, clear_cookie_header());
    response
}

/// 방 만들기 (만든 사람이 호스트)
pub async fn host_room(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HostRequest>,
) -> Result<Response, AppError> {
    let room_name = non_empty(&body.room_name, "room name")?;
    let display_name = non_empty(&body.display_name, "display name")?;

    let (room, host) = state
        .directory
        .create_room(room_name, display_name, &body.avatar)?;
    let session = SessionData::new(host.id, room.id, &room.name, &host.name, &host.avatar, true);

    issue_session(&state, session)
}

/// 기존 방 참여 (id 또는 이름으로). 같은 이름으로 다시 들어오면 기존 멤버가 된다.
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Json(body): Json<JoinRequest>,
) -> Result<Response, AppError> {
    let display_name = non_empty(&body.display_name, "display name")?;

    let room_id = match (body.room_id, body.room_name.as_deref()) {
        (Some(room_id), _) => room_id,
        (None, Some(name)) => {
            let name = non_empty(name, "room name")?;
            state
                .directory
                .find_by_name(name)
                .map(|room| room.id)
                .ok_or_else(|| AppError::NotFound(format!("room '{name}' not found")))?
        }
        (None, None) => {
            return Err(AppError::BadRequest(
                "room id or room name is required".to_string(),
            ))
        }
    };

    let (room, member) = state
        .directory
        .join_room(room_id, display_name, &body.avatar)?;
    let session = SessionData::new(
        member.id,
        room.id,
        &room.name,
        &member.name,
        &member.avatar,
        room.is_host(member.id),
    );

    issue_session(&state, session)
}

/// 로그아웃. 호스트가 나가면 진행 중인 게임도 끝낸다.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
) -> Response {
    let room_id = session.room_id;
    if session.is_host && state.games.is_active(room_id) && state.games.stop_game(room_id) {
        tracing::info!(
            user_id = session.user_id,
            room_id = room_id,
            "Host logged out, stopping active game"
        );
        state
            .hub
            .broadcast_to_room(room_id, &ServerMessage::GameStop)
            .await;
    }

    tracing::info!(user_id = session.user_id, room_id = room_id, "User logged out");
    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, clear_cookie_header());
    response
}

fn issue_session(state: &AppState, session: SessionData) -> Result<Response, AppError> {
    let token = state.sessions.create_token(&session)?;
    let cookie = session_cookie_header(state, &token)?;

    tracing::info!(
        user_id = session.user_id,
        room_id = session.room_id,
        is_host = session.is_host,
        "Session issued"
    );

    let mut response = Json(SessionResponse {
        room_id: session.room_id,
        user_id: session.user_id,
        is_host: session.is_host,
    })
    .into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

fn non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed)
}
