//! # NDJSON stream framer
//!
//! Turns a watch response body into a lazy sequence of decoded JSON values,
//! one per newline-terminated frame.
//!
//! - Chunks are appended to a buffer as they arrive; a frame ends at each `\n`
//!   (a trailing `\r` is stripped too).
//! - Buffered frames are always handed out before the body is polled again.
//! - Whitespace-only frames are keep-alives and are skipped.
//! - A non-blank frame that is not valid JSON ends the sequence with
//!   [`FrameError::Decode`]. There is no resynchronisation.
//! - A non-blank remainder without a trailing newline at end-of-stream is
//!   decoded as a final best-effort record.
//!
//! A framer is single-use: once it has returned an error or reached the end
//! of the body it only ever returns `None`.

use crate::error::TransportError;
use crate::transport::ByteStream;
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Failures ending a framed sequence
#[derive(Debug, Error)]
pub enum FrameError {
    /// Reading the body failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame is not valid JSON
    #[error("malformed frame `{raw}`: {source}")]
    Decode {
        /// Raw frame contents, delimiter stripped
        raw: String,
        /// Parser diagnostic
        #[source]
        source: serde_json::Error,
    },
}

/// Newline-delimited JSON decoder over a [`ByteStream`]
pub struct NdjsonFramer {
    stream: Option<ByteStream>,
    buffer: BytesMut,
    // bytes of `buffer` already known to contain no newline
    scanned: usize,
}

impl std::fmt::Debug for NdjsonFramer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonFramer")
            .field("open", &self.stream.is_some())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl NdjsonFramer {
    /// Wrap a response body
    pub fn new(stream: ByteStream) -> Self {
        Self {
            stream: Some(stream),
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
        }
    }

    /// Wait for the next decoded record
    ///
    /// Returns `None` once the body is exhausted or after an error was returned.
    pub async fn next_event(&mut self) -> Option<Result<Value, FrameError>> {
        loop {
            let unscanned = &self.buffer[self.scanned..];
            if let Some(offset) = unscanned.iter().position(|&b| b == b'\n') {
                let newline_pos = self.scanned + offset;
                self.scanned = 0;
                let mut frame = self.buffer.split_to(newline_pos + 1);
                frame.truncate(newline_pos);
                if frame.last() == Some(&b'\r') {
                    frame.truncate(frame.len() - 1);
                }

                match decode_frame(&frame) {
                    Some(Ok(value)) => return Some(Ok(value)),
                    Some(Err(e)) => {
                        self.close();
                        return Some(Err(e));
                    }
                    // keep-alive
                    None => continue,
                }
            }
            self.scanned = self.buffer.len();

            let stream = self.stream.as_mut()?;
            match stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.close();
                    return Some(Err(FrameError::Transport(e)));
                }
                None => {
                    self.stream = None;
                    self.scanned = 0;
                    let remainder = self.buffer.split();
                    return match decode_frame(&remainder) {
                        Some(Ok(value)) => Some(Ok(value)),
                        Some(Err(e)) => {
                            warn!("Discarding undecodable trailing watch data: {}", e);
                            None
                        }
                        None => None,
                    };
                }
            }
        }
    }

    /// Consume the framer as a [`Stream`] of records
    pub fn into_stream(self) -> impl Stream<Item = Result<Value, FrameError>> + Send {
        futures::stream::unfold(self, |mut framer| async move {
            framer.next_event().await.map(|item| (item, framer))
        })
    }

    fn close(&mut self) {
        self.stream = None;
        self.buffer.clear();
        self.scanned = 0;
    }
}

fn decode_frame(frame: &[u8]) -> Option<Result<Value, FrameError>> {
    if frame.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    Some(
        serde_json::from_slice(frame).map_err(|source| FrameError::Decode {
            raw: String::from_utf8_lossy(frame).into_owned(),
            source,
        }),
    )
}
