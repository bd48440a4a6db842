//! 갱 단위 동기화 시청 서버
//!
//! 호스트가 재생을 제어하고, 나머지 멤버의 플레이어는 같은 영상, 같은 재생 상태,
//! 같은 경과 시간으로 수렴한다. 중간에 들어온 클라이언트도 마찬가지.

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod game;
pub mod handlers;
pub mod hub;
pub mod protocol;
pub mod session;
pub mod state;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use clock::Clock;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// 전체 라우터 구성
pub fn build_router(state: Arc<AppState>) -> Router {
    // 세션 쿠키가 필요한 라우트
    let protected = Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/session/logout", post(handlers::logout))
        .route("/videos", get(handlers::list_videos))
        .route("/videos/submit", post(handlers::submit_video))
        .route("/videos/remove", post(handlers::remove_video))
        .route("/game/state", get(handlers::game_state))
        .route("/game/start", post(handlers::start_game))
        .route("/game/stop", post(handlers::stop_game))
        .route("/game/change-video", post(handlers::change_video))
        .route("/game/playback", post(handlers::update_playback))
        .route("/game/submitter/:video_id", get(handlers::video_submitter))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_session,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms/search", get(handlers::search_rooms))
        .route("/session/host", post(handlers::host_room))
        .route("/session/join", post(handlers::join_room))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

/// 쿠키를 주고받으려면 와일드카드 없이 출처를 명시해야 한다
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "gangsync-rs",
        "activeGames": state.games.active_games_count(),
        "timestamp": clock::SystemClock.unix_now()
    }))
}
