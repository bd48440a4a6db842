//! 애플리케이션 상태 관리

use crate::clock::Clock;
use crate::config::Config;
use crate::directory::RoomDirectory;
use crate::game::GameStateManager;
use crate::hub::Hub;
use crate::session::SessionTokenStore;
use std::sync::Arc;

/// 전역 애플리케이션 상태 (핸들러에 주입)
pub struct AppState {
    /// 연결 레지스트리 + 재생 상태
    pub hub: Hub,
    /// 게임 상태 (room_id -> GameState)
    pub games: GameStateManager,
    /// 방/멤버/제출 영상
    pub directory: RoomDirectory,
    pub sessions: Arc<SessionTokenStore>,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    /// tokio 런타임 안에서 호출 (허브 태스크를 띄운다)
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        let sessions = Arc::new(SessionTokenStore::new(&config.session, clock.clone()));
        Self {
            hub: Hub::new(clock.clone()),
            games: GameStateManager::new(clock),
            directory: RoomDirectory::new(),
            sessions,
            config: Arc::new(config),
        }
    }
}
