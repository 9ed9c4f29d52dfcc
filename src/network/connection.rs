//! Per-connection request handling.

use super::protocol::{Request, Response};
use crate::execution::ExecutionClient;
use serde_json::json;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What every connection task needs from the network module.
#[derive(Clone, Debug)]
pub struct ConnectionContext {
    pub node_id: Arc<str>,
    pub execution: ExecutionClient,
}

/// One framed read from the client.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line(Vec<u8>),
    TooLong,
    Eof,
}

/// Serves one client until it disconnects, misbehaves or the network is stopped.
///
/// The stop flag is raced against the whole read-handle-write step, so a
/// client that never reads its replies cannot hold up shutdown.
pub async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: ConnectionContext,
    mut stop: watch::Receiver<bool>,
) {
    info!(%peer, "Connection established");
    let max_line = ctx.execution.limits().max_request_len();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let step = tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => break,
            step = serve_one(&mut reader, &mut writer, &ctx, max_line) => step,
        };
        match step {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                debug!(%peer, error = %e, "Connection failed");
                break;
            }
        }
    }

    info!(%peer, "Connection closed");
}

/// Reads one request and writes its response. Returns `false` when the
/// connection should be closed.
async fn serve_one<R, W>(
    reader: &mut R,
    writer: &mut W,
    ctx: &ConnectionContext,
    max_line: usize,
) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (response, keep_open) = match read_frame(reader, max_line).await? {
        Frame::Eof => return Ok(false),
        Frame::TooLong => {
            warn!(max_line, "Request line too long, closing connection");
            let message = format!("request exceeds {max_line} bytes");
            (Response::error(message), false)
        }
        Frame::Line(bytes) => match String::from_utf8(bytes) {
            Ok(line) if line.trim().is_empty() => return Ok(true),
            Ok(line) => (handle(&line, ctx).await, true),
            Err(e) => (Response::error(format!("bad request: {e}")), true),
        },
    };

    let mut encoded = serde_json::to_vec(&response).map_err(io::Error::other)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    Ok(keep_open)
}

/// Reads up to and including the next newline, giving up after `max_line` bytes.
async fn read_frame<R>(reader: &mut R, max_line: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let limit = u64::try_from(max_line).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut line).await?;

    if read == 0 {
        return Ok(Frame::Eof);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        return Ok(Frame::Line(line));
    }
    if line.len() > max_line {
        return Ok(Frame::TooLong);
    }
    // Last line without a terminator.
    Ok(Frame::Line(line))
}

/// Decodes one request line and runs it against execution.
pub async fn handle(line: &str, ctx: &ConnectionContext) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Response::error(format!("bad request: {e}")),
    };
    debug!(?request, "Request");

    let result = match request {
        Request::Put { key, value } => ctx.execution.put(key, value).await.map(|seq| json!(seq)),
        Request::Delete { key } => ctx.execution.delete(key).await.map(|seq| json!(seq)),
        Request::Get { key } => ctx.execution.query(key).await.map(|value| json!(value)),
        Request::Status => ctx
            .execution
            .applied()
            .await
            .map(|applied| json!({ "node_id": &*ctx.node_id, "applied": applied })),
    };

    match result {
        Ok(value) => Response::ok(value),
        Err(e) => Response::error(e),
    }
}
