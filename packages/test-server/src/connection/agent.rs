//! Agent Connection
//!
//! One accepted WebSocket connection from an agent. The connection owns the
//! write half of the socket; the read half is driven by [`AgentConnection::run`],
//! which the acceptor spawns as its own task.
//!
//! A connection operates in exactly one [`ConnectionMode`] for its lifetime:
//!
//! - `RequestResponse`: every command waits for the next inbound text frame,
//!   which is handed back verbatim as the agent's answer.
//! - `FireAndForget`: commands return as soon as the frame is written, and
//!   inbound binary frames are decoded as [`AgentSnapshot`]s for subscribers.

use chrono::{DateTime, Utc};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::command::builder::{build_run_command, build_stop_command, serialize_command};
use crate::connection::protocol::{AgentSnapshot, RemoteCommand};
use crate::error::ConnectionError;

/// Server side of an accepted agent socket
pub type AgentSocket = WebSocketStream<TcpStream>;

type FrameSink = SplitSink<AgentSocket, Message>;
type FrameSource = SplitStream<AgentSocket>;

/// How a connection interprets inbound frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Text frames answer commands, first sent first answered
    #[default]
    RequestResponse,
    /// Commands are not answered; binary frames carry snapshots
    FireAndForget,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::RequestResponse => write!(f, "request_response"),
            ConnectionMode::FireAndForget => write!(f, "fire_and_forget"),
        }
    }
}

impl std::str::FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request_response" | "request-response" => Ok(ConnectionMode::RequestResponse),
            "fire_and_forget" | "fire-and-forget" => Ok(ConnectionMode::FireAndForget),
            other => Err(format!(
                "unknown connection mode {other:?} (expected request_response or fire_and_forget)"
            )),
        }
    }
}

/// Settings applied to every accepted connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub mode: ConnectionMode,
    pub response_queue_capacity: usize,
    pub snapshot_queue_capacity: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            mode: ConnectionMode::default(),
            response_queue_capacity: 16,
            snapshot_queue_capacity: 64,
        }
    }
}

impl ConnectionOptions {
    /// Default options with the given mode
    pub fn with_mode(mode: ConnectionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The agent's text reply (request/response mode)
    Response(String),
    /// Frame written, no reply expected (fire-and-forget mode)
    Sent,
}

/// A live (or finished) agent connection
pub struct AgentConnection {
    id: Uuid,
    peer_addr: SocketAddr,
    mode: ConnectionMode,
    connected_at: DateTime<Utc>,
    sink: tokio::sync::Mutex<FrameSink>,
    // Kept here rather than moved into the loop: a reader waiting on a reply
    // stays pending after close instead of seeing the channel end.
    response_tx: mpsc::Sender<String>,
    response_rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
    snapshot_tx: Mutex<Option<mpsc::Sender<AgentSnapshot>>>,
    // Receiving end of the channel created on accept; frames that arrive
    // before the first subscriber wait here.
    early_snapshots: Mutex<Option<mpsc::Receiver<AgentSnapshot>>>,
    snapshot_queue_capacity: usize,
    shutdown: CancellationToken,
    closed: CancellationToken,
}

impl AgentConnection {
    pub(crate) fn new(sink: FrameSink, peer_addr: SocketAddr, options: &ConnectionOptions) -> Self {
        let (response_tx, response_rx) = mpsc::channel(options.response_queue_capacity.max(1));
        let snapshot_queue_capacity = options.snapshot_queue_capacity.max(1);
        let (snapshot_tx, snapshot_rx) = mpsc::channel(snapshot_queue_capacity);

        Self {
            id: Uuid::new_v4(),
            peer_addr,
            mode: options.mode,
            connected_at: Utc::now(),
            sink: tokio::sync::Mutex::new(sink),
            response_tx,
            response_rx: tokio::sync::Mutex::new(response_rx),
            snapshot_tx: Mutex::new(Some(snapshot_tx)),
            early_snapshots: Mutex::new(Some(snapshot_rx)),
            snapshot_queue_capacity,
            shutdown: CancellationToken::new(),
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// True once the receive loop has terminated. Never goes back to false.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Wait until the receive loop has terminated
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Send a command to the agent.
    ///
    /// In request/response mode this waits for the agent's text reply. If the
    /// connection dies while waiting, the call stays pending; use
    /// [`send_command_timeout`](Self::send_command_timeout) to bound it.
    pub async fn send_command(&self, cmd: &RemoteCommand) -> Result<CommandOutcome, ConnectionError> {
        if cmd.command.is_none() {
            return Err(ConnectionError::EmptyCommand);
        }
        self.ensure_open()?;

        match self.mode {
            ConnectionMode::FireAndForget => {
                self.write_command(cmd).await?;
                Ok(CommandOutcome::Sent)
            }
            ConnectionMode::RequestResponse => {
                // Held across write and read so replies pair up with sends in order.
                let mut responses = self.response_rx.lock().await;
                self.ensure_open()?;
                self.write_command(cmd).await?;

                match responses.recv().await {
                    Some(response) => {
                        debug!(
                            connection_id = %self.id,
                            kind = cmd.kind(),
                            response = %response,
                            "Received command response"
                        );
                        Ok(CommandOutcome::Response(response))
                    }
                    None => Err(ConnectionError::Closed),
                }
            }
        }
    }

    /// [`send_command`](Self::send_command) bounded by `timeout`
    pub async fn send_command_timeout(
        &self,
        cmd: &RemoteCommand,
        timeout: Duration,
    ) -> Result<CommandOutcome, ConnectionError> {
        tokio::time::timeout(timeout, self.send_command(cmd))
            .await
            .map_err(|_| ConnectionError::ResponseTimeout(timeout))?
    }

    /// Build and send a run command
    pub async fn send_run_command(
        &self,
        image_name: &str,
        tag: Option<&str>,
        port_mapping: Option<&str>,
    ) -> Result<CommandOutcome, ConnectionError> {
        let cmd = build_run_command(image_name, tag, port_mapping)?;
        self.send_command(&cmd).await
    }

    /// Build and send a stop command
    pub async fn send_stop_command(&self, container_id: &str) -> Result<CommandOutcome, ConnectionError> {
        let cmd = build_stop_command(container_id)?;
        self.send_command(&cmd).await
    }

    /// Subscribe to decoded snapshots.
    ///
    /// The first subscriber also receives the snapshots buffered since the
    /// connection was accepted. Later calls replace the previous subscriber.
    /// The receiver ends when the connection closes. Only fire-and-forget
    /// connections ever deliver anything.
    pub fn subscribe_snapshots(&self) -> mpsc::Receiver<AgentSnapshot> {
        let mut current = self.snapshot_tx.lock();

        let rx = match self.early_snapshots.lock().take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = mpsc::channel(self.snapshot_queue_capacity);
                if !self.is_closed() {
                    *current = Some(tx);
                }
                rx
            }
        };

        if self.mode != ConnectionMode::FireAndForget {
            debug!(
                connection_id = %self.id,
                mode = %self.mode,
                "Snapshot subscriber registered on a connection that does not deliver snapshots"
            );
        }

        rx
    }

    /// Run `handler` for every snapshot, in arrival order, on a separate task.
    pub fn set_snapshot_handler<F>(&self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(AgentSnapshot) + Send + 'static,
    {
        let mut snapshots = self.subscribe_snapshots();
        tokio::spawn(async move {
            while let Some(snapshot) = snapshots.recv().await {
                handler(snapshot);
            }
        })
    }

    /// Close the transport. The receive loop observes this and terminates.
    pub async fn close(&self) {
        self.shutdown.cancel();

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            debug!(connection_id = %self.id, error = %e, "Error while closing websocket");
        }
    }

    /// Ask the receive loop to stop without touching the socket
    pub(crate) fn cancel(&self) {
        self.shutdown.cancel();
    }

    fn ensure_open(&self) -> Result<(), ConnectionError> {
        if self.is_closed() || self.shutdown.is_cancelled() {
            return Err(ConnectionError::Closed);
        }
        Ok(())
    }

    async fn write_command(&self, cmd: &RemoteCommand) -> Result<(), ConnectionError> {
        let bytes = serialize_command(cmd);
        let len = bytes.len();

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::binary(bytes)).await {
            warn!(connection_id = %self.id, error = %e, "Failed to write command frame");
            self.shutdown.cancel();
            return Err(e.into());
        }

        debug!(connection_id = %self.id, kind = cmd.kind(), bytes = len, "Command sent");
        Ok(())
    }

    /// Receive loop. Returns once the peer closes, the transport fails, or
    /// the connection is shut down; the connection is closed afterwards.
    pub(crate) async fn run(&self, mut source: FrameSource) {
        debug!(connection_id = %self.id, mode = %self.mode, "Receive loop started");

        let reason = loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => break "shutdown requested".to_string(),
                message = source.next() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => self.on_text(text),
                Some(Ok(Message::Binary(data))) => self.on_binary(&data),
                Some(Ok(Message::Ping(_))) => trace!(connection_id = %self.id, "Received ping"),
                Some(Ok(Message::Pong(_))) => trace!(connection_id = %self.id, "Received pong"),
                Some(Ok(Message::Close(frame))) => {
                    debug!(connection_id = %self.id, ?frame, "Received close frame");
                    break "peer closed".to_string();
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    warn!(connection_id = %self.id, error = %e, "WebSocket error");
                    break format!("transport error: {e}");
                }
                None => break "stream ended".to_string(),
            }
        };

        self.mark_closed(&reason);
    }

    // Never waits for queue capacity, so a peer close is always read.
    fn on_text(&self, text: String) {
        if self.mode != ConnectionMode::RequestResponse {
            debug!(connection_id = %self.id, "Ignoring text frame in fire-and-forget mode");
            return;
        }

        match self.response_tx.try_send(text) {
            Ok(()) => {}
            Err(TrySendError::Full(text)) => warn!(
                connection_id = %self.id,
                response = %text,
                "Response queue full, dropping unsolicited response"
            ),
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %self.id, "Response queue gone, dropping response")
            }
        }
    }

    fn on_binary(&self, data: &[u8]) {
        if self.mode != ConnectionMode::FireAndForget {
            debug!(
                connection_id = %self.id,
                bytes = data.len(),
                "Ignoring binary frame in request/response mode"
            );
            return;
        }

        let snapshot = match AgentSnapshot::from_bytes(data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    connection_id = %self.id,
                    bytes = data.len(),
                    error = %e,
                    "Dropping malformed snapshot frame"
                );
                return;
            }
        };

        let mut current = self.snapshot_tx.lock();
        let Some(tx) = current.as_ref() else {
            trace!(connection_id = %self.id, "No snapshot subscriber, dropping snapshot");
            return;
        };

        match tx.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(
                connection_id = %self.id,
                capacity = self.snapshot_queue_capacity,
                "Snapshot queue full, dropping snapshot"
            ),
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %self.id, "Snapshot subscriber went away");
                *current = None;
            }
        }
    }

    fn mark_closed(&self, reason: &str) {
        let mut subscriber = self.snapshot_tx.lock();
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        self.shutdown.cancel();
        subscriber.take();
        drop(subscriber);

        info!(
            connection_id = %self.id,
            peer = %self.peer_addr,
            reason = %reason,
            "Agent connection closed"
        );
    }
}

impl fmt::Debug for AgentConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("mode", &self.mode)
            .field("connected_at", &self.connected_at)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::{connect_async, MaybeTlsStream};

    use crate::connection::protocol::{remote_command::Command, ContainerStatus};

    type AgentSide = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Accept one agent over a real socket and spawn its receive loop
    async fn pair(mode: ConnectionMode) -> (Arc<AgentConnection>, AgentSide) {
        pair_with(ConnectionOptions::with_mode(mode)).await
    }

    async fn pair_with(options: ConnectionOptions) -> (Arc<AgentConnection>, AgentSide) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            (ws, peer)
        });

        let (agent, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let (ws, peer) = server.await.unwrap();

        let (sink, source) = ws.split();
        let connection = Arc::new(AgentConnection::new(sink, peer, &options));
        let runner = connection.clone();
        tokio::spawn(async move { runner.run(source).await });

        (connection, agent)
    }

    async fn next_command(agent: &mut AgentSide) -> RemoteCommand {
        loop {
            match agent.next().await.unwrap().unwrap() {
                Message::Binary(data) => return RemoteCommand::from_bytes(&data).unwrap(),
                _ => continue,
            }
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("fire_and_forget".parse::<ConnectionMode>().unwrap(), ConnectionMode::FireAndForget);
        assert_eq!("request-response".parse::<ConnectionMode>().unwrap(), ConnectionMode::RequestResponse);
        assert!("both".parse::<ConnectionMode>().is_err());
        assert_eq!(ConnectionMode::FireAndForget.to_string(), "fire_and_forget");
    }

    #[tokio::test]
    async fn test_request_response_returns_text_unchanged() {
        let (connection, mut agent) = pair(ConnectionMode::RequestResponse).await;

        let agent_task = tokio::spawn(async move {
            let cmd = next_command(&mut agent).await;
            assert!(matches!(cmd.command, Some(Command::Run(_))));
            agent.send(Message::text("ok")).await.unwrap();
            agent
        });

        let outcome = connection
            .send_run_command("nginx", Some("latest"), None)
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Response("ok".to_string()));
        let _agent = agent_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_responses_answer_in_send_order() {
        let (connection, mut agent) = pair(ConnectionMode::RequestResponse).await;

        tokio::spawn(async move {
            for reply in ["first", "second"] {
                let _ = next_command(&mut agent).await;
                agent.send(Message::text(reply)).await.unwrap();
            }
            // keep the socket open
            let _ = agent.next().await;
        });

        let first = connection.send_stop_command("a").await.unwrap();
        let second = connection.send_stop_command("b").await.unwrap();
        assert_eq!(first, CommandOutcome::Response("first".to_string()));
        assert_eq!(second, CommandOutcome::Response("second".to_string()));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let (connection, _agent) = pair(ConnectionMode::FireAndForget).await;
        let result = connection.send_command(&RemoteCommand::default()).await;
        assert!(matches!(result, Err(ConnectionError::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_the_wire() {
        let (connection, _agent) = pair(ConnectionMode::FireAndForget).await;
        let result = connection.send_run_command("nginx", None, Some("8080")).await;
        assert!(matches!(result, Err(ConnectionError::InvalidCommand(_))));
    }

    #[tokio::test]
    async fn test_fire_and_forget_delivers_snapshots_and_skips_garbage() {
        let (connection, mut agent) = pair(ConnectionMode::FireAndForget).await;
        let mut snapshots = connection.subscribe_snapshots();

        let outcome = connection.send_stop_command("4f2a").await.unwrap();
        assert_eq!(outcome, CommandOutcome::Sent);
        assert!(matches!(next_command(&mut agent).await.command, Some(Command::Stop(_))));

        let snapshot = AgentSnapshot {
            timestamp: None,
            container_status: vec![ContainerStatus {
                id: "4f2a".to_string(),
                ..Default::default()
            }],
        };
        agent.send(Message::binary(vec![0xff, 0xff, 0xff])).await.unwrap();
        agent.send(Message::text("ignored")).await.unwrap();
        agent.send(Message::binary(snapshot.to_bytes())).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), snapshots.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, snapshot);
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_snapshot_handler_sees_frames_in_order() {
        let (connection, mut agent) = pair(ConnectionMode::FireAndForget).await;
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        connection.set_snapshot_handler(move |snapshot| {
            let _ = seen_tx.send(snapshot.container_status.len());
        });

        for n in 1..=3 {
            let snapshot = AgentSnapshot {
                timestamp: None,
                container_status: vec![ContainerStatus::default(); n],
            };
            agent.send(Message::binary(snapshot.to_bytes())).await.unwrap();
        }

        let mut counts = Vec::new();
        for _ in 0..3 {
            let n = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
                .await
                .unwrap()
                .unwrap();
            counts.push(n);
        }
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_peer_close_marks_closed_and_sends_fail_fast() {
        let (connection, mut agent) = pair(ConnectionMode::FireAndForget).await;
        let mut snapshots = connection.subscribe_snapshots();

        agent
            .close(Some(CloseFrame {
                code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Normal,
                reason: "bye".into(),
            }))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), connection.closed())
            .await
            .unwrap();
        assert!(connection.is_closed());
        assert!(snapshots.recv().await.is_none());

        let result = connection.send_stop_command("4f2a").await;
        assert!(matches!(result, Err(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn test_pending_request_outlives_close_until_timeout() {
        let (connection, agent) = pair(ConnectionMode::RequestResponse).await;
        drop(agent);

        let cmd = build_stop_command("4f2a").unwrap();
        let result = connection
            .send_command_timeout(&cmd, Duration::from_millis(200))
            .await;
        // Either the write lost the race with the close, or the reader stayed
        // pending until the timeout; it never resolves with a response.
        assert!(matches!(
            result,
            Err(ConnectionError::ResponseTimeout(_))
                | Err(ConnectionError::Closed)
                | Err(ConnectionError::Transport(_))
        ));

        tokio::time::timeout(Duration::from_secs(2), connection.closed())
            .await
            .unwrap();
        assert!(connection.is_closed());
        let result = connection.send_command(&cmd).await;
        assert!(matches!(result, Err(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn test_failed_write_closes_connection() {
        let (connection, _agent) = pair(ConnectionMode::FireAndForget).await;

        // Close the write half underneath the connection; the next write fails.
        connection.sink.lock().await.close().await.unwrap();
        assert!(!connection.shutdown.is_cancelled());

        let result = connection.send_stop_command("4f2a").await;
        assert!(matches!(
            result,
            Err(ConnectionError::Transport(_)) | Err(ConnectionError::Closed)
        ));

        tokio::time::timeout(Duration::from_secs(2), connection.closed())
            .await
            .unwrap();
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_unsolicited_responses_do_not_hide_peer_close() {
        let options = ConnectionOptions {
            response_queue_capacity: 4,
            ..ConnectionOptions::with_mode(ConnectionMode::RequestResponse)
        };
        let (connection, mut agent) = pair_with(options).await;

        for n in 0..20 {
            agent.send(Message::text(format!("reply {n}"))).await.unwrap();
        }
        agent.close(None).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), connection.closed())
            .await
            .unwrap();
        assert!(connection.is_closed());

        let mut responses = connection.response_rx.lock().await;
        let mut queued = Vec::new();
        while let Ok(response) = responses.try_recv() {
            queued.push(response);
        }
        assert_eq!(queued, vec!["reply 0", "reply 1", "reply 2", "reply 3"]);
    }

    #[tokio::test]
    async fn test_snapshots_before_subscribe_are_buffered() {
        let (connection, mut agent) = pair(ConnectionMode::FireAndForget).await;

        let snapshot = AgentSnapshot {
            timestamp: None,
            container_status: vec![ContainerStatus {
                id: "early".to_string(),
                ..Default::default()
            }],
        };
        agent.send(Message::binary(snapshot.to_bytes())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut snapshots = connection.subscribe_snapshots();
        let received = tokio::time::timeout(Duration::from_secs(2), snapshots.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, snapshot);
    }

    #[tokio::test]
    async fn test_full_snapshot_queue_does_not_stall_loop() {
        let options = ConnectionOptions {
            snapshot_queue_capacity: 2,
            ..ConnectionOptions::with_mode(ConnectionMode::FireAndForget)
        };
        let (connection, mut agent) = pair_with(options).await;

        for n in 1..=10 {
            let snapshot = AgentSnapshot {
                timestamp: None,
                container_status: vec![ContainerStatus::default(); n],
            };
            agent.send(Message::binary(snapshot.to_bytes())).await.unwrap();
        }
        agent.close(None).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), connection.closed())
            .await
            .unwrap();

        // The oldest frames were kept, the rest dropped.
        let mut snapshots = connection.subscribe_snapshots();
        let mut counts = Vec::new();
        while let Some(snapshot) = snapshots.recv().await {
            counts.push(snapshot.container_status.len());
        }
        assert_eq!(counts, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_local_close_terminates_loop() {
        let (connection, _agent) = pair(ConnectionMode::RequestResponse).await;
        connection.close().await;

        tokio::time::timeout(Duration::from_secs(2), connection.closed())
            .await
            .unwrap();
        assert!(connection.is_closed());
    }
}
