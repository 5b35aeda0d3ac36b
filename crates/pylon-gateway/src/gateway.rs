//! Gateway client — connection task and its select loop.
//!
//! One spawned task owns the socket, the [`Session`] value, and the
//! heartbeat timer; commands and inbound frames are multiplexed through
//! a single `tokio::select!` so all connection state is touched from one
//! logical thread of control.

use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use pylon_core::{
    GatewayFrame, HelloPayload, IdentifyPayload, Opcode, ReadyInfo, CLEAN_CLOSE_CODE,
};

use crate::error::GatewayError;
use crate::event::{GatewayEvent, EVENT_CHANNEL_CAPACITY};
use crate::heartbeat::{Beat, Heartbeat};
use crate::reconnect::ReconnectPolicy;
use crate::session::{ConnectionState, Session};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Event-type tag of the handshake-complete dispatch.
const READY_EVENT: &str = "READY";
/// Synthesized close code when the transport drops without a close frame.
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Gateway connection configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// WebSocket URL to dial (already carries the API-version selector).
    pub url: String,
    /// Identify payload sent in response to the Hello challenge.
    pub identify: IdentifyPayload,
    /// Reconnect schedule template, cloned per connection task.
    pub reconnect: ReconnectPolicy,
}

impl GatewayConfig {
    /// Config with the production reconnect schedule.
    #[must_use]
    pub fn new(url: impl Into<String>, identify: IdentifyPayload) -> Self {
        Self {
            url: url.into(),
            identify,
            reconnect: ReconnectPolicy::new(),
        }
    }
}

/// Commands accepted by the connection task.
enum Command {
    /// Send a frame over the socket.
    Send(GatewayFrame),
    /// Clean shutdown: close with the sentinel code, suppress reconnect.
    Disconnect,
}

/// How one connection ended.
struct CloseOutcome {
    clean: bool,
    code: u16,
    reason: String,
}

/// Handle to the persistent gateway connection.
///
/// At most one connection task is live per instance. Lifecycle events
/// fan out to every [`subscribe`](Self::subscribe)d listener.
pub struct Gateway {
    config: GatewayConfig,
    events: broadcast::Sender<GatewayEvent>,
    command_tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    state: Arc<RwLock<ConnectionState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Create a gateway handle. Does not dial until [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            events,
            command_tx: Mutex::new(None),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            task: Mutex::new(None),
        }
    }

    /// Subscribe to lifecycle and dispatch events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Current connection state snapshot.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Spawn the connection task. A no-op while a task is already live.
    pub fn connect(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("connect() ignored: connection task already running");
            return;
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.command_tx.lock() = Some(command_tx);
        *task = Some(tokio::spawn(run_connection(
            self.config.clone(),
            self.events.clone(),
            Arc::clone(&self.state),
            command_rx,
        )));
    }

    /// Request a clean shutdown. Deterministic: supersedes any reconnect
    /// backoff in progress and never triggers a reconnect itself.
    pub fn disconnect(&self) {
        if let Some(tx) = self.command_tx.lock().take() {
            let _ = tx.send(Command::Disconnect);
        }
    }

    /// Send a raw frame over the live connection.
    pub fn send(&self, frame: GatewayFrame) -> Result<(), GatewayError> {
        let guard = self.command_tx.lock();
        let tx = guard.as_ref().ok_or(GatewayError::NotConnected)?;
        tx.send(Command::Send(frame))
            .map_err(|_| GatewayError::NotConnected)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.disconnect();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

/// Outer connection loop: dial, drive, then either stop or back off and
/// redial per the reconnect policy.
async fn run_connection(
    config: GatewayConfig,
    events: broadcast::Sender<GatewayEvent>,
    state: Arc<RwLock<ConnectionState>>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut policy = config.reconnect.clone();

    loop {
        *state.write() = ConnectionState::Connecting;
        match connect_async(&config.url).await {
            Ok((ws, _)) => {
                *state.write() = ConnectionState::AwaitingHello;
                let _ = events.send(GatewayEvent::Connected);

                let outcome =
                    drive_connection(ws, &config, &events, &state, &mut command_rx, &mut policy)
                        .await;

                *state.write() = ConnectionState::Disconnected;
                let _ = events.send(GatewayEvent::Disconnected {
                    code: outcome.code,
                    reason: outcome.reason.clone(),
                });
                if outcome.clean {
                    info!(code = outcome.code, "gateway closed cleanly");
                    return;
                }
                warn!(code = outcome.code, reason = %outcome.reason, "abnormal gateway close");
            }
            Err(e) => {
                *state.write() = ConnectionState::Disconnected;
                warn!(error = %e, "gateway dial failed");
                let _ = events.send(GatewayEvent::Error(format!("connect failed: {e}")));
            }
        }

        let Some(delay) = policy.next_delay() else {
            warn!("reconnect attempts exhausted");
            let _ = events.send(GatewayEvent::ReconnectExhausted);
            return;
        };
        info!(
            attempt = policy.attempts(),
            delay_ms = delay.as_millis() as u64,
            "reconnecting after backoff"
        );
        if !wait_backoff(delay, &mut command_rx).await {
            info!("disconnect requested during reconnect backoff");
            return;
        }
    }
}

/// Sleep out a reconnect backoff while draining commands.
///
/// Returns `false` when an explicit disconnect (or a dropped handle)
/// supersedes the wait.
async fn wait_backoff(
    delay: std::time::Duration,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> bool {
    let deadline = tokio::time::sleep(delay);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => return true,
            cmd = command_rx.recv() => match cmd {
                Some(Command::Disconnect) | None => return false,
                Some(Command::Send(_)) => {
                    warn!("dropping outbound frame while disconnected");
                }
            },
        }
    }
}

/// Drive one live connection until it closes.
async fn drive_connection(
    ws: WsStream,
    config: &GatewayConfig,
    events: &broadcast::Sender<GatewayEvent>,
    state: &Arc<RwLock<ConnectionState>>,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
    policy: &mut ReconnectPolicy,
) -> CloseOutcome {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut session = Session::new();
    session.state = ConnectionState::AwaitingHello;
    let mut heartbeat: Option<Heartbeat> = None;

    loop {
        tokio::select! {
            () = tick(&mut heartbeat) => {
                let Some(hb) = heartbeat.as_mut() else { continue };
                match hb.on_tick() {
                    Beat::Send => {
                        let frame = GatewayFrame::heartbeat(session.sequence);
                        if let Err(e) = send_frame(&mut ws_tx, &frame).await {
                            let _ = events.send(GatewayEvent::Error(format!("heartbeat send: {e}")));
                            return abnormal(e.to_string());
                        }
                        debug!(sequence = ?session.sequence, "heartbeat sent");
                    }
                    Beat::AckTimeout => {
                        warn!("heartbeat ack timeout, closing stalled connection");
                        let _ = events.send(GatewayEvent::Error("heartbeat ack timeout".into()));
                        let _ = ws_tx.close().await;
                        return abnormal("heartbeat ack timeout".into());
                    }
                }
            }

            msg = ws_rx.next() => match msg {
                None => return abnormal("connection reset".into()),
                Some(Err(e)) => {
                    let _ = events.send(GatewayEvent::Error(format!("socket error: {e}")));
                    return abnormal(e.to_string());
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or(
                        (ABNORMAL_CLOSE_CODE, String::new()),
                        |f| (u16::from(f.code), f.reason.to_string()),
                    );
                    return CloseOutcome {
                        clean: code == CLEAN_CLOSE_CODE,
                        code,
                        reason,
                    };
                }
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = handle_frame(
                        text.as_str(),
                        &mut session,
                        &mut heartbeat,
                        &mut ws_tx,
                        events,
                        state,
                        config,
                        policy,
                    )
                    .await
                    {
                        let _ = events.send(GatewayEvent::Error(format!("frame send: {e}")));
                        return abnormal(e.to_string());
                    }
                }
                // Binary frames are not part of the protocol; ping/pong is
                // handled by the transport.
                Some(Ok(_)) => {}
            },

            cmd = command_rx.recv() => match cmd {
                Some(Command::Send(frame)) => {
                    if let Err(e) = send_frame(&mut ws_tx, &frame).await {
                        let _ = events.send(GatewayEvent::Error(format!("send failed: {e}")));
                        return abnormal(e.to_string());
                    }
                }
                Some(Command::Disconnect) | None => {
                    session.state = ConnectionState::Closing;
                    *state.write() = ConnectionState::Closing;
                    let close = Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    }));
                    let _ = ws_tx.send(close).await;
                    let _ = ws_tx.close().await;
                    return CloseOutcome {
                        clean: true,
                        code: CLEAN_CLOSE_CODE,
                        reason: "disconnect requested".into(),
                    };
                }
            },
        }
    }
}

/// Resolve the next heartbeat tick, or park forever while no heartbeat
/// is running yet.
async fn tick(heartbeat: &mut Option<Heartbeat>) {
    match heartbeat.as_mut() {
        Some(hb) => hb.tick().await,
        None => std::future::pending().await,
    }
}

fn abnormal(reason: String) -> CloseOutcome {
    CloseOutcome {
        clean: false,
        code: ABNORMAL_CLOSE_CODE,
        reason,
    }
}

/// Handle one inbound text frame.
///
/// Protocol anomalies (unparseable JSON, unknown opcodes, malformed
/// payloads) are logged and dropped — never fatal. Only a failed write
/// back to the socket escalates.
#[allow(clippy::too_many_arguments)]
async fn handle_frame(
    text: &str,
    session: &mut Session,
    heartbeat: &mut Option<Heartbeat>,
    ws_tx: &mut WsSink,
    events: &broadcast::Sender<GatewayEvent>,
    state: &Arc<RwLock<ConnectionState>>,
    config: &GatewayConfig,
    policy: &mut ReconnectPolicy,
) -> Result<(), GatewayError> {
    let frame: GatewayFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "unparseable inbound frame, dropping");
            return Ok(());
        }
    };
    session.observe_sequence(frame.s);

    match frame.opcode() {
        Some(Opcode::Hello) => {
            let hello: HelloPayload = match serde_json::from_value(frame.d) {
                Ok(hello) => hello,
                Err(e) => {
                    warn!(error = %e, "malformed hello payload, dropping");
                    return Ok(());
                }
            };
            let interval = std::time::Duration::from_millis(hello.heartbeat_interval);
            session.heartbeat_interval = interval;
            *heartbeat = Some(Heartbeat::new(interval));
            session.state = ConnectionState::Identifying;
            *state.write() = ConnectionState::Identifying;
            debug!(interval_ms = hello.heartbeat_interval, "hello received, identifying");
            send_frame(ws_tx, &GatewayFrame::identify(&config.identify)).await?;
        }
        Some(Opcode::HeartbeatAck) => {
            if let Some(hb) = heartbeat.as_mut() {
                hb.ack();
            }
        }
        Some(Opcode::Dispatch) => match frame.t.as_deref() {
            Some(READY_EVENT) => match serde_json::from_value::<ReadyInfo>(frame.d) {
                Ok(ready) => {
                    session.session_id = Some(ready.session_id.clone());
                    session.state = ConnectionState::Ready;
                    *state.write() = ConnectionState::Ready;
                    policy.reset();
                    info!(session_id = %ready.session_id, "handshake complete");
                    let _ = events.send(GatewayEvent::Ready(ready));
                }
                Err(e) => warn!(error = %e, "malformed ready payload, dropping"),
            },
            Some(event_type) => {
                let _ = events.send(GatewayEvent::Dispatch {
                    event_type: event_type.to_string(),
                    data: frame.d,
                });
            }
            None => warn!("dispatch frame without event type, dropping"),
        },
        Some(op @ (Opcode::Heartbeat | Opcode::Identify)) => {
            warn!(op = op.as_u8(), "outbound-only opcode received, dropping");
        }
        None => {
            warn!(op = frame.op, "unrecognized opcode, dropping");
        }
    }
    Ok(())
}

/// Serialize and send one frame.
async fn send_frame(ws_tx: &mut WsSink, frame: &GatewayFrame) -> Result<(), GatewayError> {
    let json = serde_json::to_string(frame)?;
    ws_tx.send(Message::Text(json.into())).await?;
    Ok(())
}
