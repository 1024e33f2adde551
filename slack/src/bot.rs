//! Socket Mode connection lifecycle.
//!
//! `OracleBot` authenticates, loads the user directory, then keeps a
//! WebSocket open to Slack. Every envelope is acknowledged before it is
//! processed, and each mention is answered on its own task so a slow
//! question never blocks the socket.

use std::sync::Arc;
use std::time::Duration;

use basebone_core::ChatService;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::client::SlackClient;
use crate::config::SlackConfig;
use crate::error::{SlackError, SlackResult};
use crate::events::{EventPayload, SlackEvent, SocketModeAck, SocketModeEnvelope, parse_event};
use crate::handler::MentionHandler;
use crate::users::UserDirectory;

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct BotOptions {
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// Why a single socket session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Reconnect,
}

pub struct OracleBot {
    client: SlackClient,
    service: Arc<ChatService>,
    users: Arc<UserDirectory>,
    options: BotOptions,
    shutdown_tx: broadcast::Sender<()>,
}

impl OracleBot {
    pub fn new(config: SlackConfig, service: Arc<ChatService>) -> SlackResult<Self> {
        config.validate()?;

        let client = SlackClient::new(config)?;
        let users = Arc::new(UserDirectory::new(client.clone()));
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            client,
            service,
            users,
            options: BotOptions::default(),
            shutdown_tx,
        })
    }

    pub fn with_options(mut self, options: BotOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs until [`OracleBot::shutdown`] is called or authentication fails.
    pub async fn start(&self) -> SlackResult<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let identity = self.client.auth_test().await?;
        info!(user_id = %identity.user_id, name = %identity.name, "authenticated with Slack");

        self.users.refresh().await?;

        let handler = Arc::new(MentionHandler::new(
            self.client.clone(),
            self.users.clone(),
            self.service.clone(),
            identity,
        ));

        self.run_socket_mode(handler, &mut shutdown_rx).await
    }

    pub fn shutdown(&self) {
        info!("shutting down Slack bot");
        let _ = self.shutdown_tx.send(());
    }

    async fn run_socket_mode(
        &self,
        handler: Arc<MentionHandler>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> SlackResult<()> {
        loop {
            let session = match self.client.open_socket_url().await {
                Ok(url) => {
                    info!("connecting to Socket Mode");
                    self.connect_and_run(&url, &handler, shutdown_rx).await
                }
                Err(e) => Err(e),
            };

            let delay = match session {
                Ok(SessionEnd::Shutdown) => {
                    info!("Socket Mode connection closed");
                    return Ok(());
                }
                Ok(SessionEnd::Reconnect) => {
                    info!("Slack asked us to reconnect");
                    continue;
                }
                Err(e @ (SlackError::Auth(_) | SlackError::Config(_))) => return Err(e),
                Err(SlackError::RateLimited { retry_after_secs }) => {
                    warn!(retry_after_secs, "rate limited opening Socket Mode");
                    Duration::from_secs(retry_after_secs)
                }
                Err(e) => {
                    error!(error = %e, "Socket Mode connection error");
                    self.options.reconnect_delay
                }
            };
            info!(?delay, "reconnecting");

            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect_and_run(
        &self,
        ws_url: &str,
        handler: &Arc<MentionHandler>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> SlackResult<SessionEnd> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (mut write, read) = ws_stream.split();

        let (msg_tx, mut msg_rx) = mpsc::channel::<WsMessage>(100);

        let write_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    error!(error = %e, "failed to send WebSocket message");
                    break;
                }
            }
        });

        let ping_tx = msg_tx.clone();
        let ping_interval = self.options.ping_interval;
        let ping_task = tokio::spawn(async move {
            let mut interval = interval(ping_interval);
            loop {
                interval.tick().await;
                if ping_tx.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        });

        let result = self
            .process_messages(read, &msg_tx, handler, shutdown_rx)
            .await;

        ping_task.abort();
        write_task.abort();

        result
    }

    async fn process_messages(
        &self,
        mut read: SplitStream<WsConnection>,
        msg_tx: &mpsc::Sender<WsMessage>,
        handler: &Arc<MentionHandler>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> SlackResult<SessionEnd> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    let _ = msg_tx.send(WsMessage::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
                msg = read.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if handle_socket_message(&text, msg_tx, handler).await {
                            return Ok(SessionEnd::Reconnect);
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = msg_tx.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("WebSocket closed by server");
                        return Ok(SessionEnd::Reconnect);
                    }
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}

/// Acks, then dispatches. Returns `true` when Slack asked us to reconnect.
async fn handle_socket_message(
    text: &str,
    msg_tx: &mpsc::Sender<WsMessage>,
    handler: &Arc<MentionHandler>,
) -> bool {
    let envelope: SocketModeEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "failed to parse Socket Mode envelope");
            return false;
        }
    };

    if let Some(envelope_id) = &envelope.envelope_id {
        match serde_json::to_string(&SocketModeAck::new(envelope_id)) {
            Ok(ack) => {
                let _ = msg_tx.send(WsMessage::Text(ack)).await;
            }
            Err(e) => warn!(error = %e, "failed to encode ack"),
        }
    }

    match envelope.envelope_type.as_str() {
        "events_api" => {
            if let Some(payload) = envelope.payload {
                dispatch_event(payload, handler);
            }
            false
        }
        "hello" => {
            info!("Socket Mode connection established");
            false
        }
        "disconnect" => true,
        other => {
            debug!(envelope_type = other, "ignoring envelope");
            false
        }
    }
}

fn dispatch_event(payload: EventPayload, handler: &Arc<MentionHandler>) {
    match parse_event(&payload) {
        Ok(SlackEvent::AppMention(event)) => {
            let handler = handler.clone();
            tokio::spawn(async move {
                let channel = event.channel.clone();
                if let Err(e) = handler.handle(event).await {
                    error!(%channel, error = %e, "failed to answer mention");
                }
            });
        }
        Ok(SlackEvent::Unknown(event_type)) => debug!(%event_type, "ignoring event"),
        Err(e) => warn!(error = %e, "failed to parse event"),
    }
}
