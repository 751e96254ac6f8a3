//! Control protocol: one JSON object per line in each direction.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// Read timeout for quick control commands. Reconcile waits without one.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);
const STATUS_ATTEMPTS: u32 = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DaemonRequest {
    Status,
    Stop,
    /// `repository` is `owner/name`; absent means every subscription.
    Reconcile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repository: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Unwrap the payload, turning a refusal into [`DaemonError::Protocol`].
    pub fn into_result(self) -> Result<Value, DaemonError> {
        match (self.ok, self.error) {
            (true, _) => Ok(self.data.unwrap_or(Value::Null)),
            (false, Some(message)) => Err(DaemonError::Protocol(message)),
            (false, None) => Err(DaemonError::Protocol("daemon refused without a reason".into())),
        }
    }
}

/// Blocking client for the daemon's control socket.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(home: &Path) -> Self {
        Self {
            socket: socket_path(home),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Query status, retrying briefly while a just-started daemon binds.
    pub fn status(&self) -> Result<Value, DaemonError> {
        let mut attempt = 1;
        loop {
            match self.call(&DaemonRequest::Status, Some(CONTROL_TIMEOUT)) {
                Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                    attempt += 1;
                    sleep(STATUS_RETRY_DELAY);
                }
                reply => return reply?.into_result(),
            }
        }
    }

    pub fn stop(&self) -> Result<(), DaemonError> {
        self.call(&DaemonRequest::Stop, Some(CONTROL_TIMEOUT))?
            .into_result()
            .map(drop)
    }

    /// Trigger a pass and block until its summary comes back.
    pub fn reconcile(&self, repository: Option<String>) -> Result<Value, DaemonError> {
        self.call(&DaemonRequest::Reconcile { repository }, None)?
            .into_result()
    }

    /// Send one request and read exactly one response line.
    pub fn call(
        &self,
        request: &DaemonRequest,
        timeout: Option<Duration>,
    ) -> Result<DaemonResponse, DaemonError> {
        let stream = self.connect()?;
        stream
            .set_read_timeout(timeout)
            .map_err(|e| io_err(&self.socket, e))?;

        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        (&stream)
            .write_all(line.as_bytes())
            .map_err(|e| io_err(&self.socket, e))?;

        let mut reply = String::new();
        BufReader::new(&stream)
            .read_line(&mut reply)
            .map_err(|e| io_err(&self.socket, e))?;
        if reply.is_empty() {
            return Err(DaemonError::Protocol(
                "daemon hung up without replying".to_string(),
            ));
        }
        Ok(serde_json::from_str(reply.trim_end())?)
    }

    fn connect(&self) -> Result<UnixStream, DaemonError> {
        UnixStream::connect(&self.socket).map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused => DaemonError::DaemonNotRunning {
                socket: self.socket.clone(),
            },
            _ => io_err(&self.socket, err),
        })
    }
}
