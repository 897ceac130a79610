//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! `AutoTypeEvent`s to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::AutoTypeEvent;
use crate::hotkey::HotkeySpec;
use crate::state::Controller;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted frame
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State every client handler sees
struct Shared {
    controller: Controller,
    event_tx: broadcast::Sender<AutoTypeEvent>,
    start_time: Instant,
}

impl Server {
    /// Bind the socket; events on `event_tx` are pushed to subscribers
    pub fn new(
        socket_path: &Path,
        controller: Controller,
        event_tx: broadcast::Sender<AutoTypeEvent>,
    ) -> Result<Self> {
        // A directory created here is owner-only; existing ones are left alone
        if let Some(parent) = socket_path.parent() {
            if !parent.exists() {
                crate::config::create_private_dir(parent)
                    .context("failed to create socket directory")?;
            }
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only: requests carry credentials
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            shared: Arc::new(Shared {
                controller,
                event_tx,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(error = %e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // Frames are read on their own task so a subscriber can be pushed
        // events while no request is pending
        let (request_tx, mut request_rx) = mpsc::channel::<Result<Vec<u8>>>(8);
        let read_task = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(frame)) => {
                        if request_tx.send(Ok(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = request_tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        let mut events: Option<broadcast::Receiver<AutoTypeEvent>> = None;
        let result = loop {
            let next_event = async {
                match events.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                frame = request_rx.recv() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => break Err(e),
                        None => {
                            debug!("client disconnected");
                            break Ok(());
                        }
                    };

                    let response = match serde_json::from_slice::<Request>(&frame) {
                        Ok(request) => {
                            debug!(?request, "received request");
                            if matches!(request, Request::Subscribe) && events.is_none() {
                                events = Some(shared.event_tx.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            Self::process_request(request, &shared).await
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to parse request");
                            Response::error("invalid_request", e.to_string())
                        }
                    };

                    if let Err(e) = write_frame(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = next_event => match event {
                    Ok(event) => {
                        let notification = Notification::Event { event };
                        if let Err(e) = write_frame(&mut writer, &notification).await {
                            break Err(e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        events = None;
                    }
                },
            }
        };

        read_task.abort();
        result
    }

    /// Process a request and return a response
    async fn process_request(request: Request, shared: &Shared) -> Response {
        let controller = &shared.controller;
        let result = match request {
            Request::Ping => return Response::Pong,

            Request::Subscribe => return Response::Subscribed,

            Request::GetStatus => controller.status().await.map(|snapshot| {
                let uptime = shared.start_time.elapsed().as_secs();
                Response::Status(DaemonStatus::from_snapshot(snapshot, uptime))
            }),

            Request::AutoType { entry, template } => controller
                .auto_type(entry.map(Into::into), template)
                .await
                .map(|actions| Response::Typed { actions }),

            Request::Arm { entry, template } => controller
                .arm(entry.into(), template)
                .await
                .map(|()| Response::Armed),

            Request::Disarm => controller
                .disarm()
                .await
                .map(|was_armed| Response::Disarmed { was_armed }),

            Request::RegisterHotkey { hotkey } => {
                let spec = match HotkeySpec::parse(&hotkey) {
                    Ok(spec) => spec,
                    Err(e) => return Response::error("invalid_hotkey", e.to_string()),
                };
                let display = spec.to_string();
                controller
                    .register_hotkey(spec)
                    .await
                    .map(|()| Response::HotkeyRegistered { hotkey: display })
            }

            Request::UnregisterHotkey => controller
                .unregister_hotkey()
                .await
                .map(|()| Response::HotkeyUnregistered),

            Request::Cancel => controller
                .cancel()
                .await
                .map(|was_running| Response::Cancelled { was_running }),
        };

        result.unwrap_or_else(|e| {
            debug!(code = e.code(), error = %e, "request failed");
            Response::error(e.code(), e.to_string())
        })
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(error = %e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Read one length-prefixed frame; `None` on clean EOF
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        anyhow::bail!("message too large ({} bytes)", len);
    }

    let mut msg_buf = vec![0u8; len];
    reader
        .read_exact(&mut msg_buf)
        .await
        .context("truncated message body")?;
    Ok(Some(msg_buf))
}

/// Send a length-prefixed JSON message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
