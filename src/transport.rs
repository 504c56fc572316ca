use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::error::Result;

/// Type alias for a streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Pulls raw chunks off a response body in network order.
///
/// Once the body reports its end, the reader never polls it again.
pub struct TransportReader {
    body: ByteStream,
    done: bool,
    bytes_read: u64,
}

impl TransportReader {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            done: false,
            bytes_read: 0,
        }
    }

    /// Wrap any stream of byte chunks, converting its errors into transport errors.
    pub fn from_stream<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: Into<Bytes>,
        E: Into<crate::error::CouncilError>,
    {
        Self::new(Box::pin(stream.map(|chunk| -> Result<Bytes> {
            chunk.map(Into::into).map_err(Into::into)
        })))
    }

    pub fn from_response(response: reqwest::Response) -> Self {
        Self::from_stream(response.bytes_stream())
    }

    /// A reader that is already at end-of-stream.
    pub fn empty() -> Self {
        Self::new(Box::pin(futures::stream::empty()))
    }

    /// Next chunk of bytes, or `None` once the body is exhausted.
    ///
    /// Empty chunks are skipped.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        while !self.done {
            match self.body.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => {
                    self.bytes_read += chunk.len() as u64;
                    return Ok(Some(chunk));
                }
                Some(Err(e)) => return Err(e),
                None => self.done = true,
            }
        }
        Ok(None)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Total bytes delivered so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
