//! WebSocket 연결 핸들러 (읽기/쓰기 펌프, heartbeat)

use crate::config::HubConfig;
use crate::hub::Client;
use crate::session::SessionData;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// 인증된 업그레이드 요청 처리
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
) -> impl IntoResponse {
    // 호스트 여부는 방 정보 기준으로 다시 확인
    let is_host = state
        .directory
        .get(session.room_id)
        .map(|room| room.is_host(session.user_id))
        .unwrap_or(false);
    let client = Client::new(session.room_id, session.user_id, is_host);

    ws.max_message_size(state.config.hub.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, client))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, client: Client) {
    let hub_config = state.config.hub.clone();
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<String>(hub_config.send_buffer);

    state.hub.register(client.clone(), tx).await;

    // 송신 태스크
    let mut write_task = tokio::spawn(write_pump(ws_sender, rx, hub_config.clone()));

    // 수신 처리 (쓰기 쪽이 먼저 죽어도 연결 종료)
    let write_finished = tokio::select! {
        _ = read_pump(ws_receiver, &client, hub_config.pong_wait) => false,
        _ = &mut write_task => true,
    };

    // 연결 해제: 허브가 송신 채널을 닫으면 쓰기 펌프가 close 프레임을 보내고 끝난다
    state.hub.unregister(&client).await;
    if !write_finished
        && tokio::time::timeout(hub_config.write_wait, &mut write_task)
            .await
            .is_err()
    {
        write_task.abort();
    }

    tracing::info!(
        user_id = client.user_id,
        room_id = client.room_id,
        "Connection closed"
    );
}

/// 수신 펌프. 애플리케이션 메시지는 받지 않고 끊김과 pong만 본다.
/// `pong_wait` 안에 pong이 없으면 종료.
pub async fn read_pump<R>(mut receiver: R, client: &Client, pong_wait: Duration)
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut deadline = Instant::now() + pong_wait;
    loop {
        match tokio::time::timeout_at(deadline, receiver.next()).await {
            Err(_) => {
                tracing::info!(user_id = client.user_id, "Pong timeout, closing connection");
                break;
            }
            Ok(None) | Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(user_id = client.user_id, error = %e, "WebSocket read error");
                break;
            }
            Ok(Some(Ok(Message::Pong(_)))) => {
                deadline = Instant::now() + pong_wait;
            }
            Ok(Some(Ok(_))) => {}
        }
    }
}

/// 송신 펌프. 허브 메시지와 주기적 ping 중 먼저 오는 것을 보낸다.
/// 채널이 닫히면 close 프레임을 보내고 끝난다.
pub async fn write_pump<S>(mut sender: S, mut rx: mpsc::Receiver<String>, config: HubConfig)
where
    S: Sink<Message> + Unpin,
{
    let ping_interval = config.ping_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(text) => {
                    if !write_frame(&mut sender, Message::Text(text), config.write_wait).await {
                        return;
                    }
                }
                None => {
                    write_frame(&mut sender, Message::Close(None), config.write_wait).await;
                    return;
                }
            },
            _ = ticker.tick() => {
                if !write_frame(&mut sender, Message::Ping(Vec::new()), config.write_wait).await {
                    return;
                }
            }
        }
    }
}

async fn write_frame<S>(sender: &mut S, message: Message, write_wait: Duration) -> bool
where
    S: Sink<Message> + Unpin,
{
    matches!(
        tokio::time::timeout(write_wait, sender.send(message)).await,
        Ok(Ok(()))
    )
}
