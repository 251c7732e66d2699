use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::Duration;

use super::error::CdpError;
use super::transport::{Op, Transport};
use super::types::CdpEvent;

#[derive(Debug, Clone)]
pub struct CdpConfig {
    /// Bound on the WebSocket handshake (default: 10s).
    pub connect_timeout: Duration,
    /// Bound on each individual command (default: 60s).
    pub command_timeout: Duration,
    pub channel_capacity: usize,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(60),
            channel_capacity: 256,
        }
    }
}

/// Browser-level connection. Page work goes through a [`CdpSession`]
/// obtained from [`CdpClient::attach`].
#[derive(Debug)]
pub struct CdpClient {
    transport: Transport,
    config: CdpConfig,
}

impl CdpClient {
    /// # Errors
    ///
    /// Returns `CdpError::Connection` if the WebSocket handshake fails, or
    /// `CdpError::ConnectionTimeout` if it does not finish in time.
    pub async fn connect(url: &str, config: CdpConfig) -> Result<Self, CdpError> {
        let transport = Transport::connect(url, config.channel_capacity, config.connect_timeout).await?;
        tracing::debug!(%url, "connected to browser");
        Ok(Self { transport, config })
    }

    /// Browser-level command, outside any tab.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::CommandTimeout`, `CdpError::Protocol`, or a
    /// transport error.
    pub async fn send_command(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport
            .call(method, params, None, self.config.command_timeout)
            .await
    }

    /// Open a new tab and return its target id.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::InvalidResponse` if the reply carries no `targetId`.
    pub async fn create_target(&self, url: &str) -> Result<String, CdpError> {
        let result = self
            .send_command("Target.createTarget", Some(json!({ "url": url })))
            .await?;
        string_field(&result, "targetId", "Target.createTarget")
    }

    /// Attach to a tab with a flattened session sharing this socket.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Protocol` if the target does not exist.
    pub async fn attach(&self, target_id: &str) -> Result<CdpSession, CdpError> {
        let result = self
            .send_command(
                "Target.attachToTarget",
                Some(json!({ "targetId": target_id, "flatten": true })),
            )
            .await?;
        let session_id = string_field(&result, "sessionId", "Target.attachToTarget")?;

        Ok(CdpSession {
            session_id,
            target_id: target_id.to_owned(),
            transport: self.transport.clone(),
            config: self.config.clone(),
        })
    }

    /// Stop the socket task. Sessions attached through this client fail
    /// with `ConnectionClosed` afterwards.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has already exited.
    pub async fn close(self) -> Result<(), CdpError> {
        self.transport.submit(Op::Close).await
    }
}

fn string_field(result: &Value, key: &str, method: &str) -> Result<String, CdpError> {
    result[key]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| CdpError::InvalidResponse(format!("{method} response missing {key}")))
}

/// Commands and events routed to one attached tab.
#[derive(Debug)]
pub struct CdpSession {
    session_id: String,
    target_id: String,
    transport: Transport,
    config: CdpConfig,
}

impl CdpSession {
    /// # Errors
    ///
    /// Same as [`CdpClient::send_command`].
    pub async fn send_command(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport
            .call(
                method,
                params,
                Some(self.session_id.clone()),
                self.config.command_timeout,
            )
            .await
    }

    /// Receive every event named in `methods` on a single channel, so
    /// interleaved kinds keep their relative order.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Internal` if the transport task has exited.
    pub async fn subscribe(&self, methods: &[&str]) -> Result<mpsc::Receiver<CdpEvent>, CdpError> {
        let (sink, events) = mpsc::channel(self.config.channel_capacity);
        self.transport
            .submit(Op::Listen {
                methods: methods.iter().map(|m| (*m).to_owned()).collect(),
                session_id: Some(self.session_id.clone()),
                sink,
            })
            .await?;
        Ok(events)
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.target_id
    }
}
