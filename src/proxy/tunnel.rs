//! Bidirectional byte relay between a client and an upstream proxy
//!
//! The client to upstream direction may splice a `Proxy-Authorization`
//! header line into the first chunk it forwards.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

/// Size of each read from either side
pub const PIPE_BUFFER_SIZE: usize = 1024;

/// Bytes forwarded in each direction of a finished relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Insert `header_line` right after the first CRLF of `chunk`.
///
/// Returns `None` when the chunk has no CRLF.
pub fn inject_header(chunk: &[u8], header_line: &[u8]) -> Option<Bytes> {
    let pos = chunk.windows(2).position(|w| w == b"\r\n")? + 2;

    let mut out = BytesMut::with_capacity(chunk.len() + header_line.len() + 2);
    out.put_slice(&chunk[..pos]);
    out.put_slice(header_line);
    out.put_slice(b"\r\n");
    out.put_slice(&chunk[pos..]);
    Some(out.freeze())
}

/// Copy `reader` into `writer` until end of stream.
///
/// When `header_line` is set it is spliced into the first chunk only. The
/// writer is shut down however the loop ends.
pub async fn pipe<R, W>(
    reader: &mut R,
    writer: &mut W,
    header_line: Option<&[u8]>,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = forward(reader, writer, header_line).await;
    let _ = writer.shutdown().await;
    result
}

async fn forward<R, W>(
    reader: &mut R,
    writer: &mut W,
    header_line: Option<&[u8]>,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = [0u8; PIPE_BUFFER_SIZE];
    let mut forwarded = 0u64;
    let mut first = true;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        let chunk = &buf[..n];
        let injected = match (first, header_line) {
            (true, Some(line)) => inject_header(chunk, line),
            _ => None,
        };
        first = false;

        let out: &[u8] = injected.as_deref().unwrap_or(chunk);
        writer.write_all(out).await?;
        forwarded += out.len() as u64;
    }

    writer.flush().await?;
    Ok(forwarded)
}

/// Run both pipe directions concurrently until each has finished.
///
/// An I/O error in one direction only closes that direction's destination;
/// the other keeps draining. The first error seen is returned once both
/// loops are done.
#[instrument(skip(client, upstream, header_line))]
pub async fn relay<C, U>(
    client: C,
    upstream: U,
    header_line: Option<&[u8]>,
) -> io::Result<RelayStats>
where
    C: AsyncRead + AsyncWrite + Unpin + Send,
    U: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);

    let (client_to_upstream, upstream_to_client) = tokio::join!(
        pipe(&mut client_read, &mut upstream_write, header_line),
        pipe(&mut upstream_read, &mut client_write, None),
    );

    if let Err(e) = &client_to_upstream {
        debug!("Client to upstream pipe ended: {}", e);
    }
    if let Err(e) = &upstream_to_client {
        debug!("Upstream to client pipe ended: {}", e);
    }

    let stats = RelayStats {
        bytes_sent: client_to_upstream?,
        bytes_received: upstream_to_client?,
    };

    debug!(
        bytes_sent = stats.bytes_sent,
        bytes_received = stats.bytes_received,
        "Relay closed"
    );

    Ok(stats)
}
