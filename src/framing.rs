//! Native messaging wire codec.
//!
//! Chrome frames every message as a 4-byte unsigned length in native byte
//! order followed by exactly that many bytes of UTF-8 JSON. Both sides of
//! the pipe run on the same machine, so native endianness round-trips.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default I/O buffer and frame-size ceiling in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8192;

/// Errors from reading or writing native messaging frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Underlying I/O failure.
    #[error("frame I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The pipe closed in the middle of the 4-byte length prefix.
    #[error("pipe closed mid-prefix after {0} bytes")]
    TruncatedPrefix(usize),

    /// The pipe closed before the announced payload arrived.
    #[error("pipe closed mid-frame, expected {expected} payload bytes")]
    TruncatedPayload {
        /// Payload length announced by the prefix.
        expected: usize,
    },

    /// The announced payload length exceeds the configured ceiling.
    #[error("frame of {len} bytes exceeds maximum of {max}")]
    Oversize {
        /// Announced payload length.
        len: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// The payload is not valid UTF-8.
    #[error("frame payload is not UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// An outbound payload does not fit in the u32 length prefix.
    #[error("outbound payload of {0} bytes does not fit a u32 length prefix")]
    PayloadTooLarge(usize),
}

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` on clean EOF (pipe closed at a frame boundary),
/// which is how Chrome signals disconnection.
///
/// # Errors
///
/// Returns an error on I/O failure, a frame truncated mid-prefix or
/// mid-payload, an announced length above `max_frame`, or non-UTF-8
/// payload bytes.
pub async fn read_frame<R>(reader: &mut R, max_frame: usize) -> Result<Option<String>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0usize;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::TruncatedPrefix(filled));
        }
        filled = filled.saturating_add(n);
    }

    let len = usize::try_from(u32::from_ne_bytes(prefix)).unwrap_or(usize::MAX);
    if len > max_frame {
        return Err(FrameError::Oversize { len, max: max_frame });
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => FrameError::TruncatedPayload { expected: len },
            _ => FrameError::Io(e),
        })?;

    Ok(Some(String::from_utf8(payload)?))
}

/// Write one frame (length prefix + payload) to `writer` and flush.
///
/// # Errors
///
/// Returns an error if the payload exceeds `u32::MAX` bytes or the write
/// fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len =
        u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge(payload.len()))?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
