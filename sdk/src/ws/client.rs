//! WebSocket transport implementation.
//!
//! Provides [`WsTransport`], the [`Transport`] implementation that speaks the
//! Centrifugo JSON protocol over `tokio-tungstenite`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::config::WsConfig;
use super::messages::{decode_frame, is_terminal_code, Command, Method, Reply};
use crate::auth::AuthToken;
use crate::transport::{Transport, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// What to do with the reply to a sent command.
#[derive(Debug)]
enum Pending {
    /// Hand the reply, or the reason the socket closed, to the waiting
    /// caller.
    Reply(oneshot::Sender<Result<Reply, TransportError>>),
    /// Turn the reply into a subscribe outcome event.
    Subscribe(String),
    /// Turn the reply into an unsubscribe event.
    Unsubscribe(String),
    /// Report publish errors only.
    Publish(String),
}

type PendingMap = Arc<Mutex<HashMap<u32, Pending>>>;

/// Event tagged with the generation of the socket that produced it.
type Tagged = (u64, TransportEvent);

/// WebSocket transport for a Centrifugo server.
#[derive(Debug)]
pub struct WsTransport {
    config: WsConfig,
    sink: Arc<Mutex<Option<WsSink>>>,
    pending: PendingMap,
    next_id: AtomicU32,
    generation: AtomicU64,
    event_tx: mpsc::Sender<Tagged>,
    event_rx: Mutex<mpsc::Receiver<Tagged>>,
    connected: Arc<RwLock<bool>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    refresh_timer: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Creates a new transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WsConfig) -> Result<Self, TransportError> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);

        Ok(Self {
            config,
            sink: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            event_tx,
            event_rx: Mutex::new(event_rx),
            connected: Arc::new(RwLock::new(false)),
            reader: Mutex::new(None),
            refresh_timer: Mutex::new(None),
        })
    }

    /// Creates a new transport with the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_url(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(WsConfig::new(url))
    }

    /// Returns the transport configuration.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Returns true if connected.
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Spawns the frame reader task.
    fn spawn_reader(&self, source: WsSource) -> JoinHandle<()> {
        let reader = Reader {
            sink: Arc::clone(&self.sink),
            pending: Arc::clone(&self.pending),
            event_tx: self.event_tx.clone(),
            connected: Arc::clone(&self.connected),
            generation: self.current_generation(),
        };
        tokio::spawn(reader.run(source))
    }

    /// Schedules a `RefreshRequired` event `ttl` seconds from now.
    async fn schedule_refresh(&self, ttl: u64) {
        let event_tx = self.event_tx.clone();
        let generation = self.current_generation();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(ttl)).await;
            debug!("connection token about to expire");
            let _ = event_tx
                .send((generation, TransportEvent::RefreshRequired))
                .await;
        });

        if let Some(previous) = self.refresh_timer.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Sends a command and registers what to do with its reply.
    async fn send(&self, method: Method, pending: Pending) -> Result<u32, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let name = method.name();
        let json = serde_json::to_string(&Command { id, method })
            .map_err(|e| TransportError::Serialization(e.to_string()))?;

        let mut sink_guard = self.sink.lock().await;
        let sink = sink_guard.as_mut().ok_or(TransportError::NotConnected)?;

        self.pending.lock().await.insert(id, pending);
        if let Err(err) = sink.send(Message::Text(json.into())).await {
            self.pending.lock().await.remove(&id);
            return Err(TransportError::SendFailed(err.to_string()));
        }

        debug!(id, command = name, "command sent");
        Ok(id)
    }

    /// Sends a command and waits for its reply.
    async fn request(&self, method: Method) -> Result<Reply, TransportError> {
        let (tx, rx) = oneshot::channel();
        let id = self.send(method, Pending::Reply(tx)).await?;

        let reply = match tokio::time::timeout(self.config.reply_timeout, rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(TransportError::Timeout);
            }
        };

        match reply.error {
            Some(error) => Err(TransportError::Server {
                code: error.code,
                message: error.message,
            }),
            None => Ok(reply),
        }
    }

    /// Drops the socket and everything attached to it. Events the old socket
    /// already queued are discarded by [`Transport::next_event`].
    async fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);

        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        if let Some(timer) = self.refresh_timer.lock().await.take() {
            timer.abort();
        }

        *self.connected.write().await = false;

        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }

        self.pending.lock().await.clear();
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, token: &AuthToken) -> Result<(), TransportError> {
        self.shutdown().await;

        let (ws_stream, _) = tokio_tungstenite::connect_async(self.config.url.as_str())
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let (sink, source) = ws_stream.split();
        *self.sink.lock().await = Some(sink);
        let reader = self.spawn_reader(source);
        *self.reader.lock().await = Some(reader);

        let reply = match self
            .request(Method::Connect {
                token: token.expose().to_string(),
                name: self.config.client_name.clone(),
            })
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                self.shutdown().await;
                return Err(err);
            }
        };

        *self.connected.write().await = true;

        let result = reply.connect.unwrap_or_default();
        info!(url = %self.config.url, client = %result.client, "websocket connected");
        if result.expires {
            self.schedule_refresh(result.ttl).await;
        }

        Ok(())
    }

    async fn refresh(&self, token: &AuthToken) -> Result<(), TransportError> {
        if !self.is_connected().await {
            return Err(TransportError::NotConnected);
        }

        let reply = self
            .request(Method::Refresh {
                token: token.expose().to_string(),
            })
            .await?;

        if let Some(result) = reply.refresh.filter(|r| r.expires) {
            self.schedule_refresh(result.ttl).await;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.shutdown().await;
        debug!("websocket closed");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.send(
            Method::Subscribe {
                channel: channel.to_string(),
            },
            Pending::Subscribe(channel.to_string()),
        )
        .await
        .map(|_| ())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.send(
            Method::Unsubscribe {
                channel: channel.to_string(),
            },
            Pending::Unsubscribe(channel.to_string()),
        )
        .await
        .map(|_| ())
    }

    async fn publish(&self, channel: &str, data: Value) -> Result<(), TransportError> {
        self.send(
            Method::Publish {
                channel: channel.to_string(),
                data,
            },
            Pending::Publish(channel.to_string()),
        )
        .await
        .map(|_| ())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        let mut events = self.event_rx.lock().await;
        loop {
            let (generation, event) = events.recv().await?;
            if generation == self.current_generation() {
                return Some(event);
            }
            debug!(?event, "event from a closed socket dropped");
        }
    }
}

/// How a socket ended.
#[derive(Debug)]
struct Close {
    code: u32,
    reason: String,
}

impl Close {
    fn new(code: u32, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Socket gone without a close code.
    fn lost(reason: impl Into<String>) -> Self {
        Self::new(0, reason)
    }

    fn reconnect(&self) -> bool {
        !is_terminal_code(self.code)
    }

    fn event(&self) -> TransportEvent {
        TransportEvent::Disconnected {
            reason: self.reason.clone(),
            reconnect: self.reconnect(),
        }
    }

    /// Error handed to commands still waiting for a reply.
    fn error(&self) -> TransportError {
        if self.reconnect() {
            TransportError::Closed
        } else {
            TransportError::Terminal {
                code: self.code,
                reason: self.reason.clone(),
            }
        }
    }
}

/// State shared with the reader task.
struct Reader {
    sink: Arc<Mutex<Option<WsSink>>>,
    pending: PendingMap,
    event_tx: mpsc::Sender<Tagged>,
    connected: Arc<RwLock<bool>>,
    generation: u64,
}

impl Reader {
    async fn run(self, mut source: WsSource) {
        let mut closed = None;

        while let Some(result) = source.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if let Some(close) = self.on_text(&text).await {
                        closed = Some(close);
                        break;
                    }
                }
                Ok(Message::Close(frame)) => {
                    closed = Some(frame.map_or_else(
                        || Close::lost("connection closed"),
                        |f| Close::new(u32::from(u16::from(f.code)), f.reason.as_str()),
                    ));
                    break;
                }
                Err(err) => {
                    let err = TransportError::from(err);
                    warn!(error = %err, "websocket read failed");
                    closed = Some(Close::lost(err.to_string()));
                    break;
                }
                _ => {}
            }
        }

        let close = closed.unwrap_or_else(|| Close::lost("connection closed"));
        debug!(code = close.code, reason = %close.reason, "websocket reader finished");

        *self.connected.write().await = false;
        *self.sink.lock().await = None;
        self.emit(close.event()).await;

        let waiting: Vec<Pending> = self
            .pending
            .lock()
            .await
            .drain()
            .map(|(_, pending)| pending)
            .collect();
        for pending in waiting {
            if let Pending::Reply(tx) = pending {
                let _ = tx.send(Err(close.error()));
            }
        }
    }

    /// Handles one text frame. Returns how the socket ended if the server
    /// pushed a disconnect.
    async fn on_text(&self, text: &str) -> Option<Close> {
        for entry in decode_frame(text) {
            let reply = match entry {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(error = %err, "undecodable entry dropped");
                    self.emit(TransportEvent::Error(err.to_string())).await;
                    continue;
                }
            };

            if reply.is_ping() {
                self.pong().await;
            } else if reply.id > 0 {
                self.on_reply(reply).await;
            } else if let Some(push) = reply.push {
                if let Some(disconnect) = push.disconnect {
                    info!(code = disconnect.code, reason = %disconnect.reason, "server disconnect");
                    return Some(Close::new(disconnect.code, disconnect.reason));
                }
                if let Some(publication) = push.publication {
                    self.emit(TransportEvent::Publication {
                        channel: push.channel,
                        data: publication.data,
                    })
                    .await;
                } else if push.unsubscribe.is_some() {
                    self.emit(TransportEvent::Unsubscribed {
                        channel: push.channel,
                    })
                    .await;
                }
            }
        }

        None
    }

    async fn on_reply(&self, reply: Reply) {
        let Some(pending) = self.pending.lock().await.remove(&reply.id) else {
            debug!(id = reply.id, "reply without pending command");
            return;
        };

        match pending {
            Pending::Reply(tx) => {
                let _ = tx.send(Ok(reply));
            }
            Pending::Subscribe(channel) => match reply.error {
                Some(error) => {
                    self.emit(TransportEvent::SubscribeFailed {
                        channel,
                        reason: error.message,
                    })
                    .await;
                }
                None => self.emit(TransportEvent::Subscribed { channel }).await,
            },
            Pending::Unsubscribe(channel) => {
                if let Some(error) = reply.error {
                    warn!(%channel, code = error.code, message = %error.message, "unsubscribe rejected");
                }
                self.emit(TransportEvent::Unsubscribed { channel }).await;
            }
            Pending::Publish(channel) => {
                if let Some(error) = reply.error {
                    self.emit(TransportEvent::Error(format!(
                        "publish to {} failed: [{}] {}",
                        channel, error.code, error.message
                    )))
                    .await;
                }
            }
        }
    }

    async fn pong(&self) {
        if let Some(sink) = self.sink.lock().await.as_mut() {
            if let Err(err) = sink.send(Message::Text("{}".into())).await {
                warn!(error = %err, "pong failed");
            }
        }
    }

    async fn emit(&self, event: TransportEvent) {
        if self.event_tx.send((self.generation, event)).await.is_err() {
            debug!("event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Utf8Bytes;

    use crate::auth::TokenProvider;
    use crate::connection::{ConnectionManager, ReconnectPolicy};
    use crate::error::ConnectionError;
    use crate::testing::ScriptedTokens;

    type ServerSocket = WebSocketStream<TcpStream>;

    async fn next_json(ws: &mut ServerSocket) -> Value {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).expect("json"),
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    async fn send_json(ws: &mut ServerSocket, value: Value) {
        ws.send(Message::Text(value.to_string().into()))
            .await
            .expect("server send");
    }

    async fn next_event(transport: &WsTransport) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), transport.next_event())
            .await
            .expect("event in time")
            .expect("event")
    }

    async fn close_invalid_token(ws: &mut ServerSocket) {
        ws.close(Some(CloseFrame {
            code: CloseCode::from(3500),
            reason: Utf8Bytes::from_static("invalid token"),
        }))
        .await
        .expect("server close");
    }

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        (listener, format!("ws://{}/connection/websocket", addr))
    }

    #[test]
    fn test_transport_new() {
        assert!(WsTransport::new(WsConfig::default()).is_ok());
        assert!(WsTransport::with_url("ws://localhost:8000/connection/websocket").is_ok());
    }

    #[test]
    fn test_transport_invalid_config() {
        assert!(WsTransport::with_url("").is_err());
        assert!(WsTransport::with_url("http://localhost:8000").is_err());
    }

    #[tokio::test]
    async fn test_transport_not_connected_initially() {
        let transport = WsTransport::new(WsConfig::default()).expect("transport");
        assert!(!transport.is_connected().await);
        assert_eq!(
            transport.subscribe("event-channel-1").await,
            Err(TransportError::NotConnected)
        );
        assert_eq!(
            transport
                .refresh(&AuthToken::new("t"))
                .await,
            Err(TransportError::NotConnected)
        );
        assert_eq!(transport.disconnect().await, Ok(()));
    }

    #[tokio::test]
    async fn test_transport_session_flow() {
        let (listener, url) = listen().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");

            let cmd = next_json(&mut ws).await;
            assert_eq!(cmd["connect"]["token"], "secret");
            send_json(&mut ws, json!({"id": cmd["id"], "connect": {"client": "c1", "version": "6.0.0"}})).await;

            let cmd = next_json(&mut ws).await;
            let channel = cmd["subscribe"]["channel"].clone();
            let reply = json!({"id": cmd["id"], "subscribe": {}});
            let publication = json!({"push": {"channel": channel, "pub": {"data": {"emoji": "😊"}}}});
            ws.send(Message::Text(format!("{}\n{}", reply, publication).into()))
                .await
                .expect("server send");

            let cmd = next_json(&mut ws).await;
            assert_eq!(cmd["publish"]["data"]["emoji"], "👍");

            ws.send(Message::Text("{}".into())).await.expect("ping");
            assert_eq!(next_json(&mut ws).await, json!({}));

            send_json(&mut ws, json!({"push": {"disconnect": {"code": 3501, "reason": "bad request"}}})).await;
            ws
        });

        let transport = WsTransport::with_url(url).expect("transport");
        transport
            .connect(&AuthToken::new("secret"))
            .await
            .expect("connect");
        assert!(transport.is_connected().await);

        transport.subscribe("event-channel-1").await.expect("subscribe");
        assert_eq!(
            next_event(&transport).await,
            TransportEvent::Subscribed {
                channel: "event-channel-1".to_string()
            }
        );
        assert_eq!(
            next_event(&transport).await,
            TransportEvent::Publication {
                channel: "event-channel-1".to_string(),
                data: json!({"emoji": "😊"}),
            }
        );

        transport
            .publish("event-channel-1", json!({"emoji": "👍"}))
            .await
            .expect("publish");

        assert_eq!(
            next_event(&transport).await,
            TransportEvent::Disconnected {
                reason: "bad request".to_string(),
                reconnect: false,
            }
        );
        assert!(!transport.is_connected().await);

        let _ws = server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_transport_connect_rejected() {
        let (listener, url) = listen().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            let cmd = next_json(&mut ws).await;
            send_json(&mut ws, json!({"id": cmd["id"], "error": {"code": 109, "message": "token expired"}})).await;
            ws
        });

        let transport = WsTransport::with_url(url).expect("transport");
        let err = transport
            .connect(&AuthToken::new("stale"))
            .await
            .expect_err("rejected");

        assert_eq!(
            err,
            TransportError::Server {
                code: 109,
                message: "token expired".to_string()
            }
        );
        assert!(!transport.is_connected().await);
        let _ws = server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_transport_connect_refused() {
        let (listener, url) = listen().await;
        drop(listener);

        let transport = WsTransport::with_url(url).expect("transport");
        let err = transport
            .connect(&AuthToken::new("t"))
            .await
            .expect_err("refused");
        assert!(matches!(err, TransportError::Connection(_)));
    }

    #[tokio::test]
    async fn test_transport_terminal_close_during_connect() {
        let (listener, url) = listen().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut rejected = accept_async(stream).await.expect("handshake");
            let cmd = next_json(&mut rejected).await;
            assert_eq!(cmd["connect"]["token"], "rejected");
            close_invalid_token(&mut rejected).await;

            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            let cmd = next_json(&mut ws).await;
            assert_eq!(cmd["connect"]["token"], "valid");
            send_json(&mut ws, json!({"id": cmd["id"], "connect": {"client": "c2"}})).await;
            send_json(
                &mut ws,
                json!({"push": {"channel": "event-channel-1", "pub": {"data": {"emoji": "👍"}}}}),
            )
            .await;
            (rejected, ws)
        });

        let transport = WsTransport::with_url(url).expect("transport");
        let err = transport
            .connect(&AuthToken::new("rejected"))
            .await
            .expect_err("terminal close");
        assert_eq!(
            err,
            TransportError::Terminal {
                code: 3500,
                reason: "invalid token".to_string()
            }
        );
        assert!(!transport.is_connected().await);

        transport
            .connect(&AuthToken::new("valid"))
            .await
            .expect("connect");

        // The disconnect of the rejected socket never reaches the caller.
        assert_eq!(
            next_event(&transport).await,
            TransportEvent::Publication {
                channel: "event-channel-1".to_string(),
                data: json!({"emoji": "👍"}),
            }
        );

        let _sockets = server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_manager_stops_on_terminal_close() {
        let (listener, url) = listen().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            let _ = next_json(&mut ws).await;
            close_invalid_token(&mut ws).await;
            ws
        });

        let transport = Arc::new(WsTransport::with_url(url).expect("transport"));
        let tokens = Arc::new(ScriptedTokens::new());
        let policy = ReconnectPolicy::default()
            .with_delays(Duration::from_millis(1), Duration::from_millis(2))
            .with_max_attempts(4);
        let mut conn = ConnectionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&tokens) as Arc<dyn TokenProvider>,
            policy,
        );

        assert_eq!(
            conn.connect().await,
            Err(ConnectionError::Terminated {
                code: 3500,
                reason: "invalid token".to_string()
            })
        );
        assert_eq!(tokens.fetches(), 1);

        let queued = tokio::time::timeout(Duration::from_millis(200), transport.next_event()).await;
        assert!(queued.is_err(), "unexpected event: {:?}", queued);

        let _ws = server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_transport_token_refresh() {
        let (listener, url) = listen().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");

            let cmd = next_json(&mut ws).await;
            send_json(
                &mut ws,
                json!({"id": cmd["id"], "connect": {"client": "c1", "expires": true, "ttl": 1}}),
            )
            .await;

            let cmd = next_json(&mut ws).await;
            assert_eq!(cmd["refresh"], json!({"token": "fresh"}));
            send_json(&mut ws, json!({"id": cmd["id"], "refresh": {"expires": true, "ttl": 1}})).await;
            ws
        });

        let transport = WsTransport::with_url(url).expect("transport");
        transport
            .connect(&AuthToken::new("initial"))
            .await
            .expect("connect");

        assert_eq!(next_event(&transport).await, TransportEvent::RefreshRequired);
        transport
            .refresh(&AuthToken::new("fresh"))
            .await
            .expect("refresh");

        // Re-armed from the refresh reply.
        assert_eq!(next_event(&transport).await, TransportEvent::RefreshRequired);
        assert!(transport.is_connected().await);

        let _ws = server.await.expect("server task");
    }
}
