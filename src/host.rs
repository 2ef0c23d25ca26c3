//! Stdio side of the relay.
//!
//! Chrome owns both ends of the pipe: the reader task pulls frames off
//! stdin and hands the payloads to the relay, the writer task is the sole
//! owner of stdout. Log output must never touch stdout — a stray byte
//! there corrupts the frame stream.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::framing::{read_frame, write_frame, FrameError};

/// Greeting sent to the extension as soon as the relay is up.
pub const STARTUP_MESSAGE: &str = "This is clay-relay";

/// Control message sent when a viewer connects.
pub const VIEWER_OPEN: &str = "open";

/// Control message sent when a viewer disconnects.
pub const VIEWER_CLOSE: &str = "close";

/// Out-of-band message from the relay itself to the extension.
#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    #[serde(rename = "relayMessage")]
    relay_message: &'a str,
}

/// Build the JSON control frame `{"relayMessage": <text>}`.
pub fn control_frame(text: &str) -> String {
    serde_json::to_string(&RelayMessage {
        relay_message: text,
    })
    // Serializing a single borrowed string field cannot fail.
    .unwrap_or_else(|_| String::from("{\"relayMessage\":\"\"}"))
}

/// Pump frames from `reader` into the relay until the peer closes it.
///
/// Returns `Ok(())` on clean EOF. A send failure means the relay side is
/// gone, which also ends the pump.
///
/// # Errors
///
/// Returns a [`FrameError`] when a frame is truncated, oversize, or
/// unreadable.
pub async fn pump_frames_in<R>(
    reader: &mut R,
    max_frame: usize,
    to_relay: mpsc::Sender<String>,
) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(reader, max_frame).await? {
            Some(payload) => {
                trace!(bytes = payload.len(), "message received from extension");
                if to_relay.send(payload).await.is_err() {
                    debug!("relay channel closed, stopping frame reader");
                    return Ok(());
                }
            }
            None => {
                debug!("frame stream closed");
                return Ok(());
            }
        }
    }
}

/// Write every outbound message to `writer` as a native messaging frame.
///
/// Runs until the outbound channel closes. Viewer messages and relay
/// control frames share this channel, so frames never interleave.
///
/// # Errors
///
/// Returns a [`FrameError`] if the writer fails.
pub async fn pump_frames_out<W>(
    writer: &mut W,
    mut outbound: mpsc::Receiver<String>,
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write_frame(writer, message.as_bytes()).await {
            warn!(error = %e, "unable to write outbound frame");
            return Err(e);
        }
    }
    debug!("outbound channel closed, stopping frame writer");
    Ok(())
}

/// Run [`pump_frames_in`] over stdin until Chrome closes the pipe.
///
/// # Errors
///
/// Returns a [`FrameError`] when a frame is truncated, oversize, or
/// unreadable.
pub async fn run_stdin_reader(
    max_frame: usize,
    to_relay: mpsc::Sender<String>,
) -> Result<(), FrameError> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    pump_frames_in(&mut stdin, max_frame, to_relay).await
}

/// Run [`pump_frames_out`] over stdout.
///
/// # Errors
///
/// Returns a [`FrameError`] if stdout becomes unwritable.
pub async fn run_stdout_writer(outbound: mpsc::Receiver<String>) -> Result<(), FrameError> {
    let mut stdout = tokio::io::stdout();
    pump_frames_out(&mut stdout, outbound).await
}
