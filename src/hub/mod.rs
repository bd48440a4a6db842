//! 방별 연결 레지스트리와 브로드캐스트 허브
//!
//! 등록/해제는 허브 소유 태스크 하나가 처리한다 (채널로 요청을 넘김).
//! 브로드캐스트는 읽기 락으로 수신자 목록만 복사한 뒤 락 밖에서 전송한다.
//! 전송 실패(버퍼 가득 참 = 느린 소비자)는 즉시 강제 해제로 이어진다.

pub mod client;
pub mod playback;

pub use client::{Client, ClientId};
pub use playback::{PlaybackState, PlaybackStateTracker};

use crate::clock::Clock;
use crate::protocol::{CurrentVideoContent, PlaybackAction, ServerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, RwLock};

pub type RoomId = i32;
pub type UserId = i32;

/// 클라이언트 송신 채널 (허브가 유일한 소유자)
pub type Outbound = mpsc::Sender<String>;

struct Registration {
    client: Client,
    sender: Outbound,
}

type RoomIndex = HashMap<RoomId, HashMap<ClientId, Registration>>;

struct RegisterRequest {
    client: Client,
    sender: Outbound,
    ack: oneshot::Sender<()>,
}

struct UnregisterRequest {
    client: Client,
    ack: oneshot::Sender<()>,
}

/// 허브 핸들 (복제해서 공유)
#[derive(Clone)]
pub struct Hub {
    rooms: Arc<RwLock<RoomIndex>>,
    playback: Arc<PlaybackStateTracker>,
    register_tx: mpsc::UnboundedSender<RegisterRequest>,
    unregister_tx: mpsc::UnboundedSender<UnregisterRequest>,
}

impl Hub {
    /// 허브 생성 및 소유 태스크 시작. tokio 런타임 안에서 호출해야 한다.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let rooms = Arc::new(RwLock::new(RoomIndex::new()));
        let playback = Arc::new(PlaybackStateTracker::new(clock));
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();

        tokio::spawn(run(
            rooms.clone(),
            playback.clone(),
            register_rx,
            unregister_rx,
        ));

        Self {
            rooms,
            playback,
            register_tx,
            unregister_tx,
        }
    }

    /// 클라이언트 등록. 반환 시점에는 이미 방 목록에 들어가 있다.
    pub async fn register(&self, client: Client, sender: Outbound) {
        let (ack, done) = oneshot::channel();
        let request = RegisterRequest {
            client,
            sender,
            ack,
        };
        if self.register_tx.send(request).is_err() || done.await.is_err() {
            tracing::warn!("Hub is not running, register dropped");
        }
    }

    /// 클라이언트 해제. 송신 채널은 여기서 닫힌다 (중복 호출은 무시).
    pub async fn unregister(&self, client: &Client) {
        let (ack, done) = oneshot::channel();
        let request = UnregisterRequest {
            client: client.clone(),
            ack,
        };
        if self.unregister_tx.send(request).is_err() || done.await.is_err() {
            tracing::warn!("Hub is not running, unregister dropped");
        }
    }

    /// 방의 모든 클라이언트에게 전송. 실제로 전달된 수를 반환한다.
    pub async fn broadcast_to_room(&self, room_id: RoomId, message: &ServerMessage) -> usize {
        match message.to_text() {
            Ok(text) => self.broadcast_text(room_id, text).await,
            Err(e) => {
                tracing::error!(room_id = room_id, error = %e, "Failed to serialize broadcast");
                0
            }
        }
    }

    pub async fn broadcast_text(&self, room_id: RoomId, text: String) -> usize {
        // 읽기 락은 수신자 복사까지만
        let recipients: Vec<(ClientId, Outbound)> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&room_id) {
                Some(clients) => clients
                    .iter()
                    .map(|(id, reg)| (*id, reg.sender.clone()))
                    .collect(),
                None => {
                    tracing::debug!(room_id = room_id, "No clients found in room for broadcast");
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (client_id, sender) in recipients {
            match sender.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    log_send_failure(room_id, client_id, &e);
                    failed.push((client_id, sender));
                }
            }
        }

        for (client_id, sender) in failed {
            drop_failed(&self.rooms, room_id, client_id, &sender).await;
        }

        tracing::debug!(room_id = room_id, delivered = delivered, "Broadcast message");
        delivered
    }

    /// 특정 클라이언트에게만 전송
    pub async fn send_to_client(&self, client: &Client, message: &ServerMessage) -> bool {
        let text = match message.to_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return false;
            }
        };

        let sender = {
            let rooms = self.rooms.read().await;
            rooms
                .get(&client.room_id)
                .and_then(|clients| clients.get(&client.id))
                .map(|reg| reg.sender.clone())
        };
        let Some(sender) = sender else {
            return false;
        };

        deliver(&self.rooms, client.room_id, client.id, &sender, text).await
    }

    /// 방의 호스트 연결 (호스트가 잠시 끊겼으면 None)
    pub async fn get_host_client(&self, room_id: RoomId) -> Option<Client> {
        let rooms = self.rooms.read().await;
        rooms.get(&room_id).and_then(|clients| {
            clients
                .values()
                .find(|reg| reg.client.is_host)
                .map(|reg| reg.client.clone())
        })
    }

    pub async fn connected_count(&self, room_id: RoomId) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(&room_id).map(|clients| clients.len()).unwrap_or(0)
    }

    pub fn set_current_video(
        &self,
        room_id: RoomId,
        video_id: &str,
        index: usize,
        title: &str,
        channel: &str,
    ) {
        self.playback
            .set_current_video(room_id, video_id, index, title, channel);
    }

    pub fn update_playback_state(
        &self,
        room_id: RoomId,
        action: PlaybackAction,
        timestamp: f64,
        is_paused: bool,
    ) -> bool {
        self.playback
            .update_playback_state(room_id, action, timestamp, is_paused)
    }

    pub fn current_video(&self, room_id: RoomId) -> Option<CurrentVideoContent> {
        self.playback.current_video(room_id)
    }

    /// `current_video`와 같은 값이지만 로그를 남기지 않는다 (상태 폴링용)
    pub fn playback_position(&self, room_id: RoomId) -> Option<CurrentVideoContent> {
        self.playback.position(room_id)
    }
}

/// 허브 소유 태스크: 등록/해제 요청을 순서대로 처리
async fn run(
    rooms: Arc<RwLock<RoomIndex>>,
    playback: Arc<PlaybackStateTracker>,
    mut register_rx: mpsc::UnboundedReceiver<RegisterRequest>,
    mut unregister_rx: mpsc::UnboundedReceiver<UnregisterRequest>,
) {
    loop {
        tokio::select! {
            Some(request) = register_rx.recv() => {
                handle_register(&rooms, &playback, request).await;
            }
            Some(request) = unregister_rx.recv() => {
                handle_unregister(&rooms, request).await;
            }
            else => break,
        }
    }
    tracing::debug!("Hub stopped");
}

async fn handle_register(
    rooms: &Arc<RwLock<RoomIndex>>,
    playback: &PlaybackStateTracker,
    request: RegisterRequest,
) {
    let RegisterRequest {
        client,
        sender,
        ack,
    } = request;

    let total = {
        let mut index = rooms.write().await;
        let clients = index.entry(client.room_id).or_default();
        clients.insert(
            client.id,
            Registration {
                client: client.clone(),
                sender: sender.clone(),
            },
        );
        clients.len()
    };

    tracing::info!(
        user_id = client.user_id,
        room_id = client.room_id,
        is_host = client.is_host,
        total = total,
        "Client registered"
    );

    // 이미 재생 중이면 이 클라이언트에게만 현재 상태 전송 (등록 경로는 막지 않음)
    match playback.current_video(client.room_id) {
        Some(current) => {
            let rooms = rooms.clone();
            tokio::spawn(async move {
                match ServerMessage::CurrentVideo(current).to_text() {
                    Ok(text) => {
                        deliver(&rooms, client.room_id, client.id, &sender, text).await;
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to serialize current video"),
                }
            });
        }
        None => {
            tracing::debug!(
                room_id = client.room_id,
                user_id = client.user_id,
                "No current video for room"
            );
        }
    }

    let _ = ack.send(());
}

async fn handle_unregister(rooms: &RwLock<RoomIndex>, request: UnregisterRequest) {
    let UnregisterRequest { client, ack } = request;
    {
        let mut index = rooms.write().await;
        if let Some(removed) = remove_client(&mut index, client.room_id, client.id) {
            tracing::info!(
                user_id = removed.client.user_id,
                room_id = client.room_id,
                remaining = index.get(&client.room_id).map(|c| c.len()).unwrap_or(0),
                "Client unregistered"
            );
        }
    }
    let _ = ack.send(());
}

/// 방 목록에서 제거. 방이 비면 방 항목도 지운다 (재생/게임 상태는 건드리지 않음).
fn remove_client(
    index: &mut RoomIndex,
    room_id: RoomId,
    client_id: ClientId,
) -> Option<Registration> {
    let clients = index.get_mut(&room_id)?;
    let removed = clients.remove(&client_id)?;
    if clients.is_empty() {
        index.remove(&room_id);
        tracing::info!(room_id = room_id, "Removed empty room from hub");
    }
    Some(removed)
}

async fn deliver(
    rooms: &RwLock<RoomIndex>,
    room_id: RoomId,
    client_id: ClientId,
    sender: &Outbound,
    text: String,
) -> bool {
    match sender.try_send(text) {
        Ok(()) => true,
        Err(e) => {
            log_send_failure(room_id, client_id, &e);
            drop_failed(rooms, room_id, client_id, sender).await;
            false
        }
    }
}

/// 전송 실패한 클라이언트 강제 해제.
/// 읽기 락을 놓은 뒤 쓰기 락을 다시 잡으므로, 그 사이 재등록된 경우엔 건드리지 않는다.
async fn drop_failed(
    rooms: &RwLock<RoomIndex>,
    room_id: RoomId,
    client_id: ClientId,
    failed: &Outbound,
) {
    let mut index = rooms.write().await;
    let still_same = index
        .get(&room_id)
        .and_then(|clients| clients.get(&client_id))
        .is_some_and(|reg| reg.sender.same_channel(failed));
    if still_same && remove_client(&mut index, room_id, client_id).is_some() {
        tracing::warn!(
            room_id = room_id,
            client_id = %client_id,
            "Dropped unresponsive client"
        );
    }
}

fn log_send_failure(room_id: RoomId, client_id: ClientId, err: &TrySendError<String>) {
    let reason = match err {
        TrySendError::Full(_) => "outbound buffer full",
        TrySendError::Closed(_) => "connection closed",
    };
    tracing::warn!(room_id = room_id, client_id = %client_id, reason = reason, "Send failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::protocol::VideoChangeContent;
    use std::time::Duration;

    fn hub() -> Hub {
        Hub::new(Arc::new(SystemClock))
    }

    fn connect(
        room_id: RoomId,
        user_id: UserId,
        is_host: bool,
    ) -> (Client, Outbound, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        (Client::new(room_id, user_id, is_host), tx, rx)
    }

    fn video_change() -> ServerMessage {
        ServerMessage::VideoChange(VideoChangeContent {
            video_id: "abc".into(),
            index: 0,
            title: "T".into(),
            channel: "C".into(),
        })
    }

    #[tokio::test]
    async fn register_and_unregister_track_count() {
        let hub = hub();
        let (a, a_tx, _a_rx) = connect(1, 10, true);
        let (b, b_tx, _b_rx) = connect(1, 11, false);

        hub.register(a.clone(), a_tx).await;
        hub.register(b.clone(), b_tx).await;
        assert_eq!(hub.connected_count(1).await, 2);

        hub.unregister(&a).await;
        hub.unregister(&a).await;
        assert_eq!(hub.connected_count(1).await, 1);

        hub.unregister(&b).await;
        assert_eq!(hub.connected_count(1).await, 0);
    }

    #[tokio::test]
    async fn duplicate_register_overwrites() {
        let hub = hub();
        let (a, a_tx, _a_rx) = connect(1, 10, false);
        hub.register(a.clone(), a_tx.clone()).await;
        hub.register(a.clone(), a_tx).await;
        assert_eq!(hub.connected_count(1).await, 1);
    }

    #[tokio::test]
    async fn unregister_closes_outbound_channel() {
        let hub = hub();
        let (a, a_tx, mut a_rx) = connect(1, 10, false);
        hub.register(a.clone(), a_tx).await;
        hub.unregister(&a).await;
        assert!(a_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn broadcast_stays_inside_room() {
        let hub = hub();
        let (a, a_tx, mut a_rx) = connect(1, 10, true);
        let (b, b_tx, mut b_rx) = connect(1, 11, false);
        let (c, c_tx, mut c_rx) = connect(2, 12, false);
        hub.register(a, a_tx).await;
        hub.register(b, b_tx).await;
        hub.register(c, c_tx).await;

        assert_eq!(hub.broadcast_to_room(1, &video_change()).await, 2);

        let expected = video_change().to_text().unwrap();
        assert_eq!(a_rx.recv().await.unwrap(), expected);
        assert_eq!(b_rx.recv().await.unwrap(), expected);
        assert!(c_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_room_delivers_nothing() {
        let hub = hub();
        assert_eq!(hub.broadcast_to_room(42, &ServerMessage::GameStop).await, 0);
    }

    #[tokio::test]
    async fn host_lookup() {
        let hub = hub();
        let (member, m_tx, _m_rx) = connect(1, 11, false);
        hub.register(member, m_tx).await;
        assert!(hub.get_host_client(1).await.is_none());

        let (host, h_tx, _h_rx) = connect(1, 10, true);
        hub.register(host.clone(), h_tx).await;
        assert_eq!(hub.get_host_client(1).await, Some(host));
    }

    #[tokio::test]
    async fn send_to_client_targets_one() {
        let hub = hub();
        let (a, a_tx, mut a_rx) = connect(1, 10, false);
        let (b, b_tx, mut b_rx) = connect(1, 11, false);
        hub.register(a.clone(), a_tx).await;
        hub.register(b, b_tx).await;

        assert!(hub.send_to_client(&a, &ServerMessage::GameStop).await);
        assert_eq!(a_rx.recv().await.unwrap(), r#"{"type":"game_stop"}"#);
        assert!(b_rx.try_recv().is_err());

        hub.unregister(&a).await;
        assert!(!hub.send_to_client(&a, &ServerMessage::GameStop).await);
    }

    #[tokio::test]
    async fn closed_connection_is_dropped_on_broadcast() {
        let hub = hub();
        let (a, a_tx, a_rx) = connect(1, 10, false);
        hub.register(a, a_tx).await;
        drop(a_rx);

        assert_eq!(hub.broadcast_to_room(1, &ServerMessage::GameStop).await, 0);
        assert_eq!(hub.connected_count(1).await, 0);
    }

    #[tokio::test]
    async fn late_joiner_gets_current_video() {
        let clock = Arc::new(ManualClock::new(0));
        let hub = Hub::new(clock.clone());
        hub.set_current_video(1, "abc", 0, "T", "C");
        clock.advance(Duration::from_secs(2));

        let (b, b_tx, mut b_rx) = connect(1, 11, false);
        hub.register(b, b_tx).await;

        let text = tokio::time::timeout(Duration::from_secs(1), b_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let msg: ServerMessage = serde_json::from_str(&text).unwrap();
        let ServerMessage::CurrentVideo(current) = msg else {
            panic!("expected current_video, got {text}");
        };
        assert_eq!(current.video_id, "abc");
        assert_eq!(current.index, 0);
        assert!(!current.is_paused);
        assert!((current.timestamp - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_current_video_means_no_unicast() {
        let hub = hub();
        let (b, b_tx, mut b_rx) = connect(1, 11, false);
        hub.register(b, b_tx).await;
        tokio::task::yield_now().await;
        assert!(b_rx.try_recv().is_err());
    }
}
