//! WebSocket transport for the realtime channel.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::models::UserId;

use super::codec::{OpenInfo, Packet};
use super::event::{authenticate_packet, RealtimeEvent};
use super::subscription::{Subscription, EVENT_BUFFER_SIZE};
use super::RealtimeError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long the open/connect handshake may take.
const HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Opens authenticated realtime subscriptions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and authenticate as `user_id`. Each call opens a new connection.
    async fn subscribe(&self, user_id: &UserId) -> Result<Subscription, RealtimeError>;
}

/// Socket.IO-over-WebSocket connector for the backend's realtime server.
#[derive(Debug, Clone)]
pub struct WsConnector {
    endpoint: Url,
}

impl WsConnector {
    /// `server_url` is the backend root, e.g. `http://localhost:3001`.
    pub fn new(server_url: &str) -> Result<Self, RealtimeError> {
        Ok(Self {
            endpoint: socket_endpoint(server_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Map the HTTP server root to its Engine.IO WebSocket endpoint.
pub fn socket_endpoint(server_url: &str) -> Result<Url, RealtimeError> {
    let mut url = Url::parse(server_url)
        .map_err(|e| RealtimeError::Connect(format!("invalid server url '{}': {}", server_url, e)))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RealtimeError::Connect(format!(
                "unsupported url scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RealtimeError::Connect(format!("cannot use scheme '{}'", scheme)))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

#[async_trait]
impl Connector for WsConnector {
    async fn subscribe(&self, user_id: &UserId) -> Result<Subscription, RealtimeError> {
        info!(url = %self.endpoint, "Connecting to realtime channel");
        let (mut ws, _) = connect_async(self.endpoint.as_str()).await?;

        let open = tokio::time::timeout(
            Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
            handshake(&mut ws, user_id),
        )
        .await
        .map_err(|_| RealtimeError::Handshake("timed out".to_string()))??;

        info!(user = %user_id, sid = %open.sid, "Realtime channel authenticated");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let shutdown = CancellationToken::new();
        tokio::spawn(pump(ws, open, tx, shutdown.clone()));

        Ok(Subscription::new(user_id.clone(), rx, shutdown))
    }
}

async fn send_packet(ws: &mut WsStream, packet: &Packet) -> Result<(), RealtimeError> {
    let frame = packet.encode();
    trace!(frame = %frame, "Sending frame");
    ws.send(Message::text(frame)).await?;
    Ok(())
}

/// Read the next text frame, answering pings along the way.
async fn next_packet(ws: &mut WsStream) -> Result<Packet, RealtimeError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let packet = Packet::decode(text.as_str())?;
                if packet == Packet::Ping {
                    send_packet(ws, &Packet::Pong).await?;
                    continue;
                }
                return Ok(packet);
            }
            Some(Ok(Message::Close(_))) | None => return Err(RealtimeError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// open -> namespace connect -> authenticate
async fn handshake(ws: &mut WsStream, user_id: &UserId) -> Result<OpenInfo, RealtimeError> {
    let open = match next_packet(ws).await? {
        Packet::Open(info) => info,
        other => {
            return Err(RealtimeError::Handshake(format!(
                "expected open packet, got {:?}",
                other
            )))
        }
    };
    debug!(sid = %open.sid, ping_interval = open.ping_interval, "Engine opened");

    send_packet(ws, &Packet::Connect(None)).await?;
    loop {
        match next_packet(ws).await? {
            Packet::Connect(_) => break,
            Packet::ConnectError(data) => {
                return Err(RealtimeError::Handshake(format!("connect refused: {}", data)))
            }
            Packet::Noop => continue,
            other => debug!(?other, "Ignoring packet during handshake"),
        }
    }

    send_packet(ws, &authenticate_packet(user_id)).await?;
    Ok(open)
}

/// The server pings every interval; silence past interval + timeout means it
/// is gone.
fn liveness_window(open: &OpenInfo) -> Duration {
    Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout))
}

/// Forward events until shutdown, socket loss, or the subscription going away.
async fn pump(mut ws: WsStream, open: OpenInfo, tx: mpsc::Sender<RealtimeEvent>, shutdown: CancellationToken) {
    let liveness = liveness_window(&open);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                let _ = send_packet(&mut ws, &Packet::Disconnect).await;
                let _ = ws.close(None).await;
                debug!(sid = %open.sid, "Realtime channel closed by client");
                return;
            }

            packet = tokio::time::timeout(liveness, next_packet(&mut ws)) => {
                let packet = match packet {
                    Ok(Ok(packet)) => packet,
                    Ok(Err(RealtimeError::Protocol(reason))) => {
                        warn!(reason = %reason, "Failed to decode frame");
                        continue;
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "Realtime channel lost");
                        return;
                    }
                    Err(_) => {
                        warn!("Realtime channel missed heartbeats");
                        return;
                    }
                };

                match packet {
                    Packet::Event { name, args } => match RealtimeEvent::from_socket(&name, &args) {
                        Ok(Some(event)) => {
                            trace!(event = event.name(), "Realtime event");
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => debug!(event = %name, "Ignoring unhandled event"),
                        Err(e) => warn!(error = %e, "Dropping malformed event"),
                    },
                    Packet::Disconnect | Packet::Close => {
                        info!("Realtime channel closed by server");
                        return;
                    }
                    Packet::ConnectError(data) => {
                        error!(%data, "Realtime channel refused");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use crate::models::Status;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Next text frame from the client, `None` once it closes.
    async fn client_frame(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
        loop {
            match ws.next().await? {
                Ok(Message::Text(text)) => return Some(text.as_str().to_string()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
    }

    /// A minimal Socket.IO server: handshake, one ping, a few events, then
    /// record everything the client sends until it hangs up.
    async fn serve_once(listener: TcpListener) -> Vec<String> {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let mut frames = Vec::new();

        ws.send(Message::text(r#"0{"sid":"engine-1","pingInterval":300,"pingTimeout":200}"#))
            .await
            .unwrap();
        frames.push(client_frame(&mut ws).await.unwrap());
        ws.send(Message::text(r#"40{"sid":"socket-1"}"#)).await.unwrap();
        frames.push(client_frame(&mut ws).await.unwrap());

        ws.send(Message::text("2")).await.unwrap();
        frames.push(client_frame(&mut ws).await.unwrap());

        ws.send(Message::text(r#"42["statusChanged",{"userId":2,"status":"asleep"}]"#))
            .await
            .unwrap();
        ws.send(Message::text(r#"42["bogus""#)).await.unwrap();
        ws.send(Message::text(r#"42["friendRequestAccepted"]"#)).await.unwrap();

        while let Some(frame) = client_frame(&mut ws).await {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_subscribe_authenticates_and_forwards_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener));

        let connector = WsConnector::new(&format!("http://{}", addr)).unwrap();
        let mut subscription = tokio::time::timeout(TEST_TIMEOUT, connector.subscribe(&UserId::from(7_i64)))
            .await
            .unwrap()
            .unwrap();

        let first = tokio::time::timeout(TEST_TIMEOUT, subscription.next_event())
            .await
            .unwrap();
        assert_eq!(
            first,
            Some(RealtimeEvent::StatusChanged {
                user_id: UserId::new("2"),
                status: Status::Asleep,
            })
        );
        // the malformed frame in between is skipped
        let second = tokio::time::timeout(TEST_TIMEOUT, subscription.next_event())
            .await
            .unwrap();
        assert_eq!(second, Some(RealtimeEvent::FriendRequestAccepted));

        subscription.close();
        let frames = tokio::time::timeout(TEST_TIMEOUT, server).await.unwrap().unwrap();
        assert_eq!(frames, vec!["40", r#"42["authenticate",7]"#, "3", "41"]);
    }

    #[tokio::test]
    async fn test_refused_namespace_fails_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::text(r#"0{"sid":"engine-1"}"#)).await.unwrap();
            let connect = client_frame(&mut ws).await;
            ws.send(Message::text(r#"44{"message":"not allowed"}"#)).await.unwrap();
            connect
        });

        let connector = WsConnector::new(&format!("http://{}", addr)).unwrap();
        let result = tokio::time::timeout(TEST_TIMEOUT, connector.subscribe(&UserId::from(7_i64)))
            .await
            .unwrap();

        assert!(matches!(result, Err(RealtimeError::Handshake(_))));
        assert_eq!(server.await.unwrap().as_deref(), Some("40"));
    }

    #[test]
    fn test_liveness_window_saturates() {
        let open = OpenInfo {
            sid: "s".to_string(),
            ping_interval: 25_000,
            ping_timeout: 20_000,
        };
        assert_eq!(liveness_window(&open), Duration::from_millis(45_000));

        let absurd = OpenInfo {
            ping_interval: u64::MAX,
            ..open
        };
        assert_eq!(liveness_window(&absurd), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_socket_endpoint() {
        let url = socket_endpoint("http://localhost:3001").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3001/socket.io/?EIO=4&transport=websocket");

        let url = socket_endpoint("https://ays.example.com/").unwrap();
        assert_eq!(url.as_str(), "wss://ays.example.com/socket.io/?EIO=4&transport=websocket");
    }

    #[test]
    fn test_socket_endpoint_rejects_bad_urls() {
        assert!(socket_endpoint("not a url").is_err());
        assert!(socket_endpoint("ftp://example.com").is_err());
    }
}
