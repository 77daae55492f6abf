//! Tests for the streaming relay loop.

mod common;

use axum::body::Bytes;
use futures_util::stream;
use mimic_gateway::proxy::relay::{relay_stream, ChunkSink, SinkClosed, RELAY_CHUNK_SIZE};

/// Records every write and flush; optionally refuses writes after a limit.
#[derive(Default)]
struct RecordingSink {
    written: Vec<Bytes>,
    flushes: usize,
    accept_writes: Option<usize>,
}

impl ChunkSink for RecordingSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        if self.accept_writes == Some(self.written.len()) {
            return Err(SinkClosed);
        }
        self.written.push(chunk);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkClosed> {
        self.flushes += 1;
        Ok(())
    }
}

impl RecordingSink {
    fn closing_after(writes: usize) -> Self {
        Self {
            accept_writes: Some(writes),
            ..Self::default()
        }
    }

    fn joined(&self) -> Vec<u8> {
        self.written.iter().flat_map(|c| c.iter().copied()).collect()
    }
}

fn upstream(chunks: Vec<Vec<u8>>) -> impl futures_core::Stream<Item = Result<Bytes, String>> {
    stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
}

#[tokio::test]
async fn relays_bytes_unchanged_in_bounded_chunks() {
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let chunks = vec![payload[..9_000].to_vec(), payload[9_000..].to_vec()];
    let mut sink = RecordingSink::default();

    let outcome = relay_stream(upstream(chunks), &mut sink).await;

    assert_eq!(sink.joined(), payload);
    assert_eq!(outcome.captured, payload);
    assert_eq!(outcome.bytes_relayed, payload.len());
    assert!(sink.written.iter().all(|c| c.len() <= RELAY_CHUNK_SIZE));
    // 9000 -> 4096 + 4096 + 808, then 1000
    assert_eq!(outcome.chunks, 4);
    assert_eq!(sink.flushes, outcome.chunks);
    assert!(!outcome.downstream_closed);
    assert!(outcome.upstream_error.is_none());
}

#[tokio::test]
async fn empty_upstream_finishes_cleanly() {
    let mut sink = RecordingSink::default();
    let outcome = relay_stream(upstream(Vec::new()), &mut sink).await;
    assert!(outcome.captured.is_empty());
    assert_eq!(outcome.chunks, 0);
    assert!(outcome.upstream_error.is_none());
}

#[tokio::test]
async fn disconnect_stops_forwarding_and_keeps_sent_bytes() {
    let chunks = vec![vec![b'a'; 100], vec![b'b'; 100], vec![b'c'; 100]];
    let mut sink = RecordingSink::closing_after(2);

    let outcome = relay_stream(upstream(chunks), &mut sink).await;

    assert!(outcome.downstream_closed);
    assert!(outcome.upstream_error.is_none());
    assert_eq!(outcome.chunks, 2);
    let mut expected = vec![b'a'; 100];
    expected.extend(vec![b'b'; 100]);
    assert_eq!(outcome.captured, expected);
}

#[tokio::test]
async fn upstream_error_stops_relay_and_is_reported() {
    let items: Vec<Result<Bytes, String>> = vec![
        Ok(Bytes::from_static(b"partial")),
        Err("connection reset".to_string()),
        Ok(Bytes::from_static(b"never sent")),
    ];
    let mut sink = RecordingSink::default();

    let outcome = relay_stream(stream::iter(items), &mut sink).await;

    assert_eq!(outcome.captured, b"partial");
    assert_eq!(outcome.upstream_error.as_deref(), Some("connection reset"));
    assert!(!outcome.downstream_closed);
}
