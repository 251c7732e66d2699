use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::error::CdpError;
use super::types::{CdpCommand, CdpEvent, MessageKind, RawCdpMessage};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Reply = oneshot::Sender<Result<Value, CdpError>>;

/// Work handed to the socket task.
pub enum Op {
    Call {
        frame: CdpCommand,
        reply: Reply,
        deadline: Instant,
    },
    /// Forward events named in `methods` for `session_id` to `sink`, in
    /// arrival order.
    Listen {
        methods: Vec<String>,
        session_id: Option<String>,
        sink: mpsc::Sender<CdpEvent>,
    },
    Close,
}

struct InFlight {
    reply: Reply,
    method: String,
    deadline: Instant,
}

struct Listener {
    methods: Vec<String>,
    session_id: Option<String>,
    sink: mpsc::Sender<CdpEvent>,
}

impl Listener {
    fn matches(&self, event: &CdpEvent) -> bool {
        self.session_id == event.session_id && self.methods.contains(&event.method)
    }
}

/// Clonable front of the task that owns the WebSocket.
#[derive(Debug, Clone)]
pub struct Transport {
    ops: mpsc::Sender<Op>,
    ids: Arc<AtomicU64>,
}

impl Transport {
    /// Open the WebSocket at `url` and start the task that owns it.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Connection` or `CdpError::ConnectionTimeout` if the
    /// handshake does not complete.
    pub async fn connect(url: &str, capacity: usize, timeout: Duration) -> Result<Self, CdpError> {
        let socket = match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => return Err(CdpError::Connection(e.to_string())),
            Err(_) => return Err(CdpError::ConnectionTimeout),
        };

        let (ops, inbox) = mpsc::channel(capacity);
        tokio::spawn(
            SocketTask {
                socket,
                inbox,
                in_flight: HashMap::new(),
                listeners: Vec::new(),
                peer_gone: false,
            }
            .run(),
        );

        Ok(Self {
            ops,
            ids: Arc::new(AtomicU64::new(1)),
        })
    }

    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the socket task has exited.
    pub async fn submit(&self, op: Op) -> Result<(), CdpError> {
        self.ops
            .send(op)
            .await
            .map_err(|_| CdpError::Internal("transport task is not running".into()))
    }

    /// Send one command and wait for its reply, at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::CommandTimeout`, `CdpError::Protocol` for an error
    /// reply, or `CdpError::ConnectionClosed` once the browser has gone.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<String>,
        timeout: Duration,
    ) -> Result<Value, CdpError> {
        let frame = CdpCommand {
            id: self.ids.fetch_add(1, Ordering::Relaxed),
            method: method.to_owned(),
            params,
            session_id,
        };
        let (reply, answer) = oneshot::channel();
        self.submit(Op::Call {
            frame,
            reply,
            deadline: Instant::now() + timeout,
        })
        .await?;

        answer
            .await
            .map_err(|_| CdpError::Internal("transport task exited before responding".into()))?
    }
}

struct SocketTask {
    socket: Socket,
    inbox: mpsc::Receiver<Op>,
    in_flight: HashMap<u64, InFlight>,
    listeners: Vec<Listener>,
    peer_gone: bool,
}

impl SocketTask {
    async fn run(mut self) {
        loop {
            if self.peer_gone {
                // No reconnect: answer every later call with ConnectionClosed.
                match self.inbox.recv().await {
                    Some(Op::Call { reply, .. }) => {
                        let _ = reply.send(Err(CdpError::ConnectionClosed));
                    }
                    Some(Op::Listen { .. }) => {}
                    Some(Op::Close) | None => return,
                }
                continue;
            }

            let next_deadline = self.in_flight.values().map(|f| f.deadline).min();
            let overdue = async {
                match next_deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                frame = self.socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.on_frame(&text),
                    Some(Ok(Message::Close(_)) | Err(_)) | None => self.on_peer_gone(),
                    Some(Ok(_)) => {}
                },
                op = self.inbox.recv() => match op {
                    Some(Op::Call { frame, reply, deadline }) => self.write(frame, reply, deadline).await,
                    Some(Op::Listen { methods, session_id, sink }) => {
                        self.listeners.push(Listener { methods, session_id, sink });
                    }
                    Some(Op::Close) | None => {
                        self.fail_in_flight();
                        let _ = self.socket.close(None).await;
                        return;
                    }
                },
                () = overdue => self.expire_overdue(),
            }
        }
    }

    async fn write(&mut self, frame: CdpCommand, reply: Reply, deadline: Instant) {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                let _ = reply.send(Err(CdpError::Internal(format!("serialization error: {e}"))));
                return;
            }
        };

        tracing::debug!(id = frame.id, method = %frame.method, "CDP send");
        if let Err(e) = self.socket.send(Message::Text(text.into())).await {
            let _ = reply.send(Err(CdpError::Connection(format!("WebSocket write error: {e}"))));
            return;
        }
        self.in_flight.insert(
            frame.id,
            InFlight {
                reply,
                method: frame.method,
                deadline,
            },
        );
    }

    fn on_frame(&mut self, text: &str) {
        let Ok(raw) = serde_json::from_str::<RawCdpMessage>(text) else {
            tracing::debug!("ignoring malformed CDP frame");
            return;
        };

        match raw.classify() {
            Some(MessageKind::Response(response)) => {
                let Some(call) = self.in_flight.remove(&response.id) else {
                    return;
                };
                tracing::debug!(id = response.id, method = %call.method, "CDP reply");
                let _ = call.reply.send(response.result.map_err(|e| CdpError::Protocol {
                    code: e.code,
                    message: e.message,
                }));
            }
            Some(MessageKind::Event(event)) => {
                // A full sink loses the event; a dropped sink loses its listener.
                self.listeners.retain(|listener| {
                    if listener.sink.is_closed() {
                        return false;
                    }
                    if listener.matches(&event)
                        && let Err(mpsc::error::TrySendError::Full(dropped)) =
                            listener.sink.try_send(event.clone())
                    {
                        tracing::debug!(method = %dropped.method, "listener queue full, dropping event");
                    }
                    true
                });
            }
            None => {}
        }
    }

    fn expire_overdue(&mut self) {
        let now = Instant::now();
        let overdue: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, call)| call.deadline <= now)
            .map(|(&id, _)| id)
            .collect();
        for id in overdue {
            if let Some(call) = self.in_flight.remove(&id) {
                let _ = call.reply.send(Err(CdpError::CommandTimeout { method: call.method }));
            }
        }
    }

    fn fail_in_flight(&mut self) {
        for (_, call) in self.in_flight.drain() {
            let _ = call.reply.send(Err(CdpError::ConnectionClosed));
        }
    }

    fn on_peer_gone(&mut self) {
        tracing::debug!("browser closed the CDP socket");
        self.peer_gone = true;
        self.fail_in_flight();
        // Dropping the sinks ends every listener's stream.
        self.listeners.clear();
    }
}
