//! Remote control of a running simulation over TCP.
//!
//! Clients send one JSON object per line and get one JSON line back:
//!
//! ```text
//! -> {"command":"set_speed","speed":2.0}
//! <- {"ok":true,"result":null}
//! -> {"command":"get_field","name":"temperature"}
//! <- {"ok":true,"result":24.0}
//! -> {"command":"set_speed","speed":-1}
//! <- {"ok":false,"error":"Invalid argument: ..."}
//! -> {"command":"api"}
//! <- {"ok":true,"result":{"commands":["pause",...],"fields":["temperature",...]}}
//! ```
//!
//! The server only enqueues commands; the run loop applies them between
//! cycles. Requests that need an answer from the loop (`status`,
//! `get_field`, `set_field`) wait for the next cycle boundary.

use crate::simulation::SimulationError;
use plankton_env::{ControlError, ControlHandle, Value};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::thread::JoinHandle;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A request line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Pause,
    Resume,
    SetSpeed { speed: f64 },
    SetCycleDelay { cycle_delay: f64 },
    Stop,
    Reset,
    Status,
    GetField { name: String },
    SetField { name: String, value: Value },
    Api,
}

impl Request {
    /// Every `command` value the server understands.
    pub const COMMANDS: &'static [&'static str] = &[
        "pause",
        "resume",
        "set_speed",
        "set_cycle_delay",
        "stop",
        "reset",
        "status",
        "get_field",
        "set_field",
        "api",
    ];
}

/// A reply line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// Background TCP listener feeding a simulation's control queue.
///
/// Runs on its own thread with a single-threaded tokio runtime. Dropping
/// the server shuts the listener down.
pub struct ControlServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Binds `address` (`HOST:PORT`) and starts serving.
    ///
    /// The socket is bound on the calling thread so that address problems
    /// are reported here; the accept loop runs on the server thread.
    pub fn start(address: &str, handle: ControlHandle) -> Result<Self, SimulationError> {
        let failed = |e: std::io::Error| SimulationError::ControlServer(format!("{}: {}", address, e));

        let listener = std::net::TcpListener::bind(address).map_err(failed)?;
        listener.set_nonblocking(true).map_err(failed)?;
        let local_addr = listener.local_addr().map_err(failed)?;

        info!(addr = %local_addr, "Control server listening");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let thread = std::thread::Builder::new()
            .name("control-server".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "Failed to create control server runtime");
                        return;
                    }
                };
                runtime.block_on(async move {
                    match TcpListener::from_std(listener) {
                        Ok(listener) => serve(listener, handle, shutdown_rx).await,
                        Err(e) => error!(error = %e, "Failed to register control listener"),
                    }
                });
            })
            .map_err(failed)?;

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the server thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Control server thread panicked");
            }
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(listener: TcpListener, handle: ControlHandle, mut shutdown_rx: mpsc::Receiver<()>) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        debug!(peer_addr = %addr, "Accepted control connection");
                        let handle = handle.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handle).await {
                                warn!(peer_addr = %addr, error = %e, "Control connection error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Accept error");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutting down control server");
                break;
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, handle: ControlHandle) -> Result<(), ControlError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match dispatch(&handle, line).await {
            Ok(result) => Reply::success(result),
            Err(e) => {
                warn!(request = %line, error = %e, "Control request rejected");
                Reply::failure(e)
            }
        };

        let mut encoded = serde_json::to_string(&reply).map_err(ControlError::rejected)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
    }

    Ok(())
}

/// Decodes one request line and forwards it to the run loop.
pub async fn dispatch(handle: &ControlHandle, line: &str) -> Result<serde_json::Value, ControlError> {
    let request: Request =
        serde_json::from_str(line).map_err(|e| ControlError::MalformedRequest(e.to_string()))?;

    match request {
        Request::Pause => handle.pause()?,
        Request::Resume => handle.resume()?,
        Request::SetSpeed { speed } => handle.set_speed(speed)?,
        Request::SetCycleDelay { cycle_delay } => handle.set_cycle_delay(cycle_delay)?,
        Request::Stop => handle.stop()?,
        Request::Reset => handle.reset()?,
        Request::Status => {
            let status = handle.status().await?;
            return serde_json::to_value(status).map_err(ControlError::rejected);
        }
        Request::GetField { name } => {
            let value = handle.get_field(name).await?;
            return serde_json::to_value(value).map_err(ControlError::rejected);
        }
        Request::SetField { name, value } => handle.set_field(name, value).await?,
        Request::Api => {
            let fields = handle.fields().await?;
            return Ok(serde_json::json!({
                "commands": Request::COMMANDS,
                "fields": fields,
            }));
        }
    }

    Ok(serde_json::Value::Null)
}
