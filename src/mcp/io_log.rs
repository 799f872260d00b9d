//! Stream decorators that log protocol traffic.
//!
//! Enabled with `--log-command`. Every chunk that passes through is emitted
//! on the `skywalking_mcp::io` target; the bytes themselves are forwarded
//! unchanged.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Tracing target for logged traffic.
pub const IO_LOG_TARGET: &str = "skywalking_mcp::io";

fn log_chunk(direction: &'static str, chunk: &[u8]) {
    if chunk.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(chunk);
    tracing::info!(
        target: IO_LOG_TARGET,
        direction,
        bytes = chunk.len(),
        "{}",
        text.trim_end()
    );
}

/// Logs everything read from the wrapped reader.
#[derive(Debug)]
pub struct LoggedReader<R> {
    inner: R,
}

impl<R> LoggedReader<R> {
    /// Wraps `inner`.
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LoggedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let result = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = result {
            log_chunk("received", &buf.filled()[before..]);
        }
        result
    }
}

/// Logs everything written to the wrapped writer.
#[derive(Debug)]
pub struct LoggedWriter<W> {
    inner: W,
}

impl<W> LoggedWriter<W> {
    /// Wraps `inner`.
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for LoggedWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let result = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = result {
            log_chunk("sending", &buf[..written]);
        }
        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
