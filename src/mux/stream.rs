//! Peekable stream wrapper for protocol detection
//!
//! Wraps a raw connection so its leading bytes can be inspected without
//! consuming them: peeked bytes are buffered and served back first on
//! subsequent reads, leaving the byte stream the eventual protocol server
//! sees identical to the raw connection from position zero.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

use crate::common::{MuxError, Result};

/// A stream wrapper that allows peeking at the first bytes
///
/// Reads drain the peek buffer before touching the inner stream; writes,
/// flush, and shutdown pass straight through.
pub struct PeekStream<S> {
    inner: S,
    buf: BytesMut,
    /// Read position within `buf`; bytes before it are already consumed.
    pos: usize,
}

impl<S> PeekStream<S> {
    /// Wrap a raw stream
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            pos: 0,
        }
    }

    /// Get a reference to the inner stream
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner stream
    ///
    /// Reading from the inner stream directly bypasses the peek buffer and
    /// loses any buffered bytes.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: AsyncRead + Unpin> PeekStream<S> {
    /// Peek at the first `len` bytes of the stream without consuming them
    ///
    /// Fills the internal buffer from the inner stream until `len` bytes are
    /// available and returns them. Repeated peeks are idempotent; a later
    /// peek for more bytes only reads the difference. If the stream ends
    /// before `len` bytes arrive this returns
    /// [`MuxError::InsufficientData`]; underlying read errors propagate
    /// unchanged.
    ///
    /// Peeking is only meaningful before the stream has been read from.
    pub async fn peek(&mut self, len: usize) -> Result<&[u8]> {
        debug_assert_eq!(self.pos, 0, "peek after the stream was read from");

        while self.buf.len() < len {
            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(MuxError::InsufficientData {
                    needed: len,
                    got: self.buf.len(),
                });
            }
        }

        Ok(&self.buf[..len])
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PeekStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        // Drain buffered-but-unconsumed bytes first
        if this.pos < this.buf.len() {
            let to_copy = (this.buf.len() - this.pos).min(buf.remaining());
            buf.put_slice(&this.buf[this.pos..this.pos + to_copy]);
            this.pos += to_copy;

            if this.pos == this.buf.len() {
                this.buf.clear();
                this.pos = 0;
            }
            return Poll::Ready(Ok(()));
        }

        // Buffer exhausted, read from the inner stream
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PeekStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl<S> std::fmt::Debug for PeekStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeekStream")
            .field("buffered", &(self.buf.len() - self.pos))
            .finish()
    }
}
