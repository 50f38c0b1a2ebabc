//! Live event stream from the local client
//!
//! Maintains a persistent WebSocket subscription to the client's event bus
//! and surfaces exactly one signal of interest: the end-of-game payload.
//! The transport multiplexes a broad bus; everything else is discarded at
//! this layer. While disconnected, events are permanently lost here; the
//! backend's own match list stays authoritative.

use crate::error::{Result, SyncError};
use crate::models::{ConnectionInfo, EndOfGamePayload, RawGameEvent};
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::{debug, info, warn};

/// Resource path whose events surface as `GameEnded`.
pub const END_OF_GAME_URI: &str = "/lol-end-of-game/v1/eog-stats-block";

/// Wire opcodes of the client's event bus.
const OP_SUBSCRIBE: i64 = 5;
const OP_EVENT: i64 = 8;
const SUBSCRIBE_KIND: &str = "OnJsonApiEvent";

/// Configuration for the event stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Initial reconnect backoff
    pub initial_backoff: Duration,
    /// Reconnect backoff ceiling
    pub max_backoff: Duration,
    /// Buffer size of the surfaced GameEnded channel
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            channel_capacity: 16,
        }
    }
}

/// Persistent subscription to the client event bus.
pub struct EventStream {
    info: ConnectionInfo,
    config: StreamConfig,
    events_tx: mpsc::Sender<EndOfGamePayload>,
}

impl EventStream {
    /// Returns the stream plus the receiving side of the GameEnded channel.
    pub fn new(
        info: ConnectionInfo,
        config: StreamConfig,
    ) -> (Self, mpsc::Receiver<EndOfGamePayload>) {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        (
            Self {
                info,
                config,
                events_tx,
            },
            events_rx,
        )
    }

    /// Runs until shutdown. Reconnects automatically with capped backoff
    /// and re-subscribes after every (re)connect.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);

        loop {
            match self.connect_and_pump(&mut shutdown, &mut backoff).await {
                SessionEnd::Shutdown => {
                    info!("event stream shutting down");
                    return;
                }
                SessionEnd::Closed => {}
                SessionEnd::Failed(err) => {
                    warn!(error = %err, "event stream disconnected");
                }
            }

            let delay = backoff.next_delay();
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect_and_pump(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
        backoff: &mut Backoff,
    ) -> SessionEnd {
        let mut socket = match self.connect().await {
            Ok(socket) => socket,
            Err(err) => return SessionEnd::Failed(err.to_string()),
        };

        let subscribe = serde_json::json!([OP_SUBSCRIBE, SUBSCRIBE_KIND]).to_string();
        if let Err(err) = socket.send(Message::Text(subscribe)).await {
            return SessionEnd::Failed(format!("subscribe frame: {}", err));
        }
        info!(port = self.info.port, "subscribed to client event bus");
        // The session is healthy once subscribed; a later failure backs off
        // from the start again instead of inheriting doubled delays.
        backoff.reset();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    let _ = socket.close(None).await;
                    return SessionEnd::Shutdown;
                }
                next = socket.next() => {
                    let text = match next {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => return SessionEnd::Failed(err.to_string()),
                    };

                    // A malformed individual frame is logged and dropped,
                    // never terminates the stream.
                    let Some(event) = parse_frame(&text) else {
                        debug!("dropping non-qualifying frame");
                        continue;
                    };
                    let Some(payload) = extract_game_ended(&event) else {
                        continue;
                    };

                    if self.events_tx.send(payload).await.is_err() {
                        warn!("game-ended receiver dropped; stopping event stream");
                        let _ = socket.close(None).await;
                        return SessionEnd::Shutdown;
                    }
                }
            }
        }
    }

    async fn connect(
        &self,
    ) -> Result<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    > {
        let url = format!("wss://127.0.0.1:{}/", self.info.port);
        let mut request = url
            .into_client_request()
            .map_err(SyncError::transient)?;

        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("riot:{}", self.info.secret));
        let auth = HeaderValue::from_str(&format!("Basic {}", credentials))
            .map_err(SyncError::transient)?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let connect = connect_async_tls_with_config(
            request,
            None,
            false,
            Some(Connector::Rustls(loopback_tls_config())),
        );
        // Bounded so a wedged handshake cannot stall reconnection forever.
        let (socket, _response) = tokio::time::timeout(Duration::from_secs(10), connect)
            .await
            .map_err(|_| SyncError::Transient("websocket connect timed out".to_string()))?
            .map_err(SyncError::transient)?;

        Ok(socket)
    }
}

enum SessionEnd {
    Shutdown,
    Closed,
    Failed(String),
}

/// Capped exponential reconnect delay.
struct Backoff {
    current: Duration,
    initial: Duration,
    max: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            initial,
            max,
        }
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.max);
        delay
    }
}

/// TLS config that skips trust validation; the endpoint is loopback-only
/// and presents the client's self-signed certificate.
fn loopback_tls_config() -> Arc<rustls::ClientConfig> {
    struct NoVerification;

    impl rustls::client::ServerCertVerifier for NoVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &rustls::Certificate,
            _intermediates: &[rustls::Certificate],
            _server_name: &rustls::ServerName,
            _scts: &mut dyn Iterator<Item = &[u8]>,
            _ocsp_response: &[u8],
            _now: std::time::SystemTime,
        ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
            Ok(rustls::client::ServerCertVerified::assertion())
        }
    }

    Arc::new(
        rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_no_client_auth(),
    )
}

/// Parses one inbound frame. Qualifying shape: `[8, "<kind>", {uri, data}]`.
fn parse_frame(text: &str) -> Option<RawGameEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let array = value.as_array()?;
    if array.len() != 3 || array[0].as_i64() != Some(OP_EVENT) {
        return None;
    }
    let kind = array[1].as_str()?.to_string();
    let body = array[2].as_object()?;
    let uri = body.get("uri")?.as_str()?.to_string();
    let data = body.get("data").cloned().unwrap_or(serde_json::Value::Null);
    Some(RawGameEvent { kind, uri, data })
}

/// Surfaces only end-of-game events; everything else is discarded here.
fn extract_game_ended(event: &RawGameEvent) -> Option<EndOfGamePayload> {
    if event.uri != END_OF_GAME_URI {
        return None;
    }
    match serde_json::from_value(event.data.clone()) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(error = %err, "end-of-game payload failed to parse; dropping frame");
            None
        }
    }
}
