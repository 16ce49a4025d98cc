//! Socket client for a Moonraker instance.
//!
//! The client owns two tasks. The writer drains the command queue fed by
//! [`ChannelTransport`], assigns request ids and records each request in the
//! pending table. The reader correlates responses back to their command,
//! clears the command's wait, and forwards everything as [`InboundEvent`]s.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use lunadeck_types::ServerNotification;

use crate::actions::SocketActions;
use crate::command::{ChannelTransport, Command, DispatchTarget};
use crate::helpers::notification_to_event;
use crate::protocol::{Message, Notification, Request, RequestId, Response, RpcError, SEND_FAILED};
use crate::transport::{CodecError, JsonRpcCodec};
use crate::waits::WaitRegistry;

/// Errors that can occur with the socket client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("RPC error: {code} - {message}")]
    Rpc { code: i32, message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timeout")]
    Timeout,
}

impl From<RpcError> for ClientError {
    fn from(e: RpcError) -> Self {
        ClientError::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

/// Something that arrived from the server, or the loss of the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Reply to a command, carrying the command's routing data.
    Response {
        id: RequestId,
        method: String,
        dispatch: DispatchTarget,
        wait: Option<String>,
        result: Result<Value, RpcError>,
    },

    Notification(ServerNotification),

    /// The socket closed. Every request still pending was dropped.
    Disconnected,
}

#[derive(Debug)]
struct PendingRequest {
    method: String,
    dispatch: DispatchTarget,
    wait: Option<String>,
}

type PendingTable = Arc<Mutex<HashMap<RequestId, PendingRequest>>>;

fn lock(pending: &PendingTable) -> MutexGuard<'_, HashMap<RequestId, PendingRequest>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SocketClient {
    transport: ChannelTransport,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    pending: PendingTable,
    waits: WaitRegistry,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl SocketClient {
    /// Connect to Moonraker's unix socket at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the socket connection fails.
    pub async fn connect_to(
        path: impl AsRef<Path>,
        waits: WaitRegistry,
    ) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).await?;
        debug!("Connected to {}", path.display());
        Ok(Self::from_stream(stream, waits))
    }

    /// Run the client over an already connected byte stream.
    pub fn from_stream<S>(stream: S, waits: WaitRegistry) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (sink, stream) = Framed::new(stream, JsonRpcCodec::new()).split();
        let (transport, commands) = ChannelTransport::channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(write_loop(
            sink,
            commands,
            pending.clone(),
            waits.clone(),
            events_tx.clone(),
        ));
        let reader = tokio::spawn(read_loop(stream, pending.clone(), waits.clone(), events_tx));

        Self {
            transport,
            events,
            pending,
            waits,
            writer,
            reader,
        }
    }

    /// Handle for queueing commands on this connection.
    #[must_use]
    pub fn transport(&self) -> ChannelTransport {
        self.transport.clone()
    }

    #[must_use]
    pub fn actions(&self) -> SocketActions<ChannelTransport> {
        SocketActions::new(self.transport(), self.waits.clone())
    }

    #[must_use]
    pub fn waits(&self) -> &WaitRegistry {
        &self.waits
    }

    /// Requests written but not yet answered.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Timeout` if nothing arrives in time, or
    /// `ClientError::ConnectionClosed` once both tasks have stopped.
    pub async fn next_event(&mut self, timeout: Duration) -> Result<InboundEvent, ClientError> {
        tokio::time::timeout(timeout, self.events.recv())
            .await
            .map_err(|_| ClientError::Timeout)?
            .ok_or(ClientError::ConnectionClosed)
    }

    /// Wait for the next command reply, skipping notifications.
    ///
    /// # Errors
    ///
    /// Returns the server's error as `ClientError::Rpc`, `ClientError::Timeout`
    /// if no reply arrives within `timeout` overall, and
    /// `ClientError::ConnectionClosed` if the socket closes first.
    pub async fn next_response(
        &mut self,
        timeout: Duration,
    ) -> Result<(DispatchTarget, Value), ClientError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_event(remaining).await? {
                InboundEvent::Response {
                    dispatch, result, ..
                } => return Ok((dispatch, result?)),
                InboundEvent::Disconnected => return Err(ClientError::ConnectionClosed),
                InboundEvent::Notification(note) => {
                    trace!("Skipping {} while waiting for a reply", note.method());
                }
            }
        }
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}

async fn write_loop<S>(
    mut sink: SplitSink<Framed<S, JsonRpcCodec>, Message>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    pending: PendingTable,
    waits: WaitRegistry,
    events: mpsc::UnboundedSender<InboundEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut next_id: u64 = 1;
    while let Some(command) = commands.recv().await {
        let Command {
            method,
            dispatch,
            params,
            wait,
        } = command;
        let id = RequestId(next_id);
        next_id += 1;

        if let Some(wait) = &wait {
            waits.add(wait);
        }
        lock(&pending).insert(
            id.clone(),
            PendingRequest {
                method: method.clone(),
                dispatch,
                wait: wait.clone(),
            },
        );

        trace!("-> {method} (id {id}, dispatch {dispatch})");
        let request = Request::new(method.clone(), params, id.clone());
        if let Err(err) = sink.send(Message::Request(request)).await {
            warn!("Failed to send '{method}': {err}");
            lock(&pending).remove(&id);
            if let Some(wait) = &wait {
                waits.remove(wait);
            }
            let _ = events.send(InboundEvent::Response {
                id,
                method,
                dispatch,
                wait,
                result: Err(RpcError::new(SEND_FAILED, err.to_string())),
            });
        }
    }
    debug!("Command queue closed, writer stopping");
}

async fn read_loop<S>(
    mut stream: SplitStream<Framed<S, JsonRpcCodec>>,
    pending: PendingTable,
    waits: WaitRegistry,
    events: mpsc::UnboundedSender<InboundEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Response(response)) => {
                if let Some(event) = correlate(response, &pending, &waits) {
                    let _ = events.send(event);
                }
            }
            Ok(Message::Notification(Notification { method, params, .. })) => {
                if let Some(note) = notification_to_event(&method, params.as_ref()) {
                    let _ = events.send(InboundEvent::Notification(note));
                }
            }
            Ok(Message::Request(request)) => {
                debug!("Ignoring request '{}' from server", request.method);
            }
            Err(err) => {
                warn!("Socket read failed: {err}");
                break;
            }
        }
    }

    let dropped: Vec<PendingRequest> = lock(&pending).drain().map(|(_, req)| req).collect();
    for request in &dropped {
        if let Some(wait) = &request.wait {
            waits.remove(wait);
        }
    }
    debug!("Socket closed with {} request(s) pending", dropped.len());
    let _ = events.send(InboundEvent::Disconnected);
}

fn correlate(
    response: Response,
    pending: &PendingTable,
    waits: &WaitRegistry,
) -> Option<InboundEvent> {
    let Some(request) = lock(pending).remove(&response.id) else {
        warn!("Response for unknown request id {}", response.id);
        return None;
    };
    if let Some(wait) = &request.wait {
        waits.remove(wait);
    }

    let id = response.id.clone();
    let result = response.into_result();
    if let Err(error) = &result {
        debug!("<- {} failed: {error}", request.method);
    }

    Some(InboundEvent::Response {
        id,
        method: request.method,
        dispatch: request.dispatch,
        wait: request.wait,
        result,
    })
}
