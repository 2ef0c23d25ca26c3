//! Local WebSocket server for the viewer.
//!
//! Serves the bundled viewer page and a single `/ws` endpoint. Only one
//! viewer may be connected at a time: further upgrade attempts are
//! rejected with HTTP 400 before the handshake, because accepting and
//! then closing trips the viewer's automatic-reconnect loop.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::host::{control_frame, VIEWER_CLOSE, VIEWER_OPEN};

/// Errors from the viewer-facing server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen socket could not be bound.
    #[error("unable to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared state handed to the `/ws` handler.
#[derive(Clone)]
pub struct RelayState {
    /// Whether a viewer currently holds the websocket.
    connected: Arc<AtomicBool>,
    /// Messages from the extension, drained by the active viewer session.
    from_extension: Arc<Mutex<mpsc::Receiver<String>>>,
    /// Outbound frames to the extension (shared with control messages).
    to_extension: mpsc::Sender<String>,
}

impl RelayState {
    /// Create relay state around the two bridge channels.
    pub fn new(
        from_extension: mpsc::Receiver<String>,
        to_extension: mpsc::Sender<String>,
    ) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(false)),
            from_extension: Arc::new(Mutex::new(from_extension)),
            to_extension,
        }
    }

    /// Whether a viewer session is currently active.
    pub fn viewer_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Resolve the listen address: loopback unless remote viewers are allowed.
pub fn listen_addr(port: u16, allow_remote: bool) -> SocketAddr {
    let ip = if allow_remote {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    };
    SocketAddr::new(ip, port)
}

/// Build the viewer router: `/ws` plus static assets.
pub fn router(state: RelayState, static_dir: &Path) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and run the viewer server until it fails or is aborted.
///
/// # Errors
///
/// Returns a [`ServerError`] if the socket cannot be bound or the server
/// stops unexpectedly.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "viewer server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Upgrade handler for `/ws`, enforcing the single-viewer rule.
async fn ws_handler(State(state): State<RelayState>, ws: WebSocketUpgrade) -> Response {
    if state
        .connected
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        warn!("rejecting viewer connection, client already connected");
        return (StatusCode::BAD_REQUEST, "Client already connected").into_response();
    }
    ws.on_upgrade(move |socket| viewer_session(state, socket))
}

/// Run one viewer session: extension messages out, viewer messages in.
async fn viewer_session(state: RelayState, mut socket: WebSocket) {
    info!("viewer connected");
    if state
        .to_extension
        .send(control_frame(VIEWER_OPEN))
        .await
        .is_err()
    {
        debug!("extension side gone before viewer session started");
    }

    // Held for the whole session; only the active viewer may drain
    // extension messages.
    let mut from_extension = state.from_extension.lock().await;

    loop {
        tokio::select! {
            msg = from_extension.recv() => {
                let Some(msg) = msg else {
                    debug!("extension channel closed, ending viewer session");
                    break;
                };
                if let Err(e) = socket.send(Message::Text(msg)).await {
                    warn!(error = %e, "unable to send to viewer");
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if state.to_extension.send(text).await.is_err() {
                            debug!("extension side gone, ending viewer session");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("viewer closed the websocket");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary/ping/pong frames carry nothing for the
                        // extension.
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "viewer websocket error");
                        break;
                    }
                }
            }
        }
    }

    drop(from_extension);
    if state
        .to_extension
        .send(control_frame(VIEWER_CLOSE))
        .await
        .is_err()
    {
        debug!("extension side gone before close notification");
    }
    state.connected.store(false, Ordering::Release);
    info!("viewer disconnected");
}
