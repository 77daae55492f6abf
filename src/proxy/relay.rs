//! Upstream-to-caller response relay.
//!
//! Streaming mode copies the upstream body through a [`ChunkSink`] in pieces
//! of at most [`RELAY_CHUNK_SIZE`] bytes, flushing after each one, and keeps
//! a copy of everything the caller received for the audit record. Buffered
//! mode reads the whole body first and replies in one unit.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::Response;
use futures_core::Stream;
use futures_util::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

pub const RELAY_CHUNK_SIZE: usize = 4096;

/// Connection-scoped headers owned by the local HTTP stack.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "proxy-connection",
    "upgrade",
    "te",
    "trailer",
];

/// Whether the caller asked for a streamed response.
///
/// `true`, or a string spelling boolean true, selects streaming. Anything
/// else, including a body that does not parse, selects buffered mode.
/// A repeated `stream` key resolves to its last value.
pub fn stream_requested(body: &[u8]) -> bool {
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
        return false;
    };
    match fields.get("stream") {
        Some(Value::Bool(stream)) => *stream,
        Some(Value::String(text)) => matches!(
            text.as_str(),
            "1" | "t" | "T" | "TRUE" | "true" | "True"
        ),
        _ => false,
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Build the caller-facing response: upstream status and headers, minus
/// hop-by-hop headers, around `body`.
pub fn relay_response(status: StatusCode, upstream_headers: &HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in upstream_headers {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    response
}

#[derive(Debug, Error)]
#[error("downstream connection closed")]
pub struct SinkClosed;

/// Destination of a streamed relay.
///
/// `write_chunk` hands a chunk to the connection; `flush` completes once the
/// connection side has taken everything written so far.
pub trait ChunkSink {
    fn write_chunk(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), SinkClosed>> + Send;

    fn flush(&mut self) -> impl Future<Output = Result<(), SinkClosed>> + Send;
}

/// [`ChunkSink`] feeding a response body through a single-slot channel.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChunkSink for ChannelSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(chunk).await.map_err(|_| SinkClosed)
    }

    async fn flush(&mut self) -> Result<(), SinkClosed> {
        // The slot frees only after the body has yielded the last chunk.
        self.tx.reserve().await.map(drop).map_err(|_| SinkClosed)
    }
}

/// Response body side of [`channel_body`]. Dropped by the server when the
/// caller goes away, which closes the sink.
pub struct ChannelBody {
    rx: mpsc::Receiver<Bytes>,
}

impl Stream for ChannelBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(bytes)) => Poll::Ready(Some(Ok(bytes))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub fn channel_body() -> (ChannelSink, ChannelBody) {
    let (tx, rx) = mpsc::channel(1);
    (ChannelSink { tx }, ChannelBody { rx })
}

#[derive(Debug, Default)]
pub struct RelayOutcome {
    /// Everything successfully written to the caller.
    pub captured: Vec<u8>,
    pub bytes_relayed: usize,
    pub chunks: usize,
    /// The caller stopped reading. Not an error.
    pub downstream_closed: bool,
    /// Reading the upstream body failed partway.
    pub upstream_error: Option<String>,
}

/// Copy `upstream` into `sink` until the upstream ends, fails, or the
/// caller disconnects.
pub async fn relay_stream<S, E, K>(upstream: S, sink: &mut K) -> RelayOutcome
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
    K: ChunkSink,
{
    let mut upstream = std::pin::pin!(upstream);
    let mut outcome = RelayOutcome::default();

    while let Some(next) = upstream.next().await {
        let mut bytes = match next {
            Ok(bytes) => bytes,
            Err(err) => {
                outcome.upstream_error = Some(err.to_string());
                break;
            }
        };

        while !bytes.is_empty() {
            let chunk = bytes.split_to(bytes.len().min(RELAY_CHUNK_SIZE));
            if sink.write_chunk(chunk.clone()).await.is_err() {
                outcome.downstream_closed = true;
                return outcome;
            }
            outcome.captured.extend_from_slice(&chunk);
            outcome.bytes_relayed += chunk.len();
            outcome.chunks += 1;

            if sink.flush().await.is_err() {
                outcome.downstream_closed = true;
                return outcome;
            }
        }
    }

    outcome
}
