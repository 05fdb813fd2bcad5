//! Terminating relay stream (ProviderChunk -> RelayEvent)
//!
//! Whatever the upstream does, the stream yields exactly one terminal
//! [`RelayEvent::Done`] as its last item and then ends.

use crate::types::events::{ProviderChunk, RelayEvent};
use crate::{BoxStream, PipeResult};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stops a [`RelayStream`] from another task.
///
/// The stream still yields its terminal marker (carrying a "cancelled" error)
/// and releases the upstream connection.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Lazy, single-pass sequence of [`RelayEvent`]s for one relay invocation.
pub struct RelayStream {
    inner: Pin<Box<dyn Stream<Item = RelayEvent> + Send>>,
    cancel: CancellationToken,
}

struct Streaming {
    chunks: BoxStream<'static, ProviderChunk>,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
    request_id: String,
    fragments: usize,
}

enum State {
    Streaming(Box<Streaming>),
    Terminated,
}

enum Step {
    Chunk(Option<PipeResult<ProviderChunk>>),
    Idle(Duration),
    Cancelled,
}

async fn next_step(s: &mut Streaming) -> Step {
    let Streaming {
        chunks,
        cancel,
        idle_timeout,
        ..
    } = s;
    let idle_timeout = *idle_timeout;

    let read = async move {
        match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, chunks.next()).await {
                Ok(item) => Step::Chunk(item),
                Err(_) => Step::Idle(limit),
            },
            None => Step::Chunk(chunks.next().await),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Step::Cancelled,
        step = read => step,
    }
}

impl RelayStream {
    /// Wrap decoded upstream chunks. `idle_timeout` bounds the wait for each chunk.
    pub fn from_chunks(
        chunks: BoxStream<'static, ProviderChunk>,
        idle_timeout: Option<Duration>,
        request_id: impl Into<String>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let state = State::Streaming(Box::new(Streaming {
            chunks,
            cancel: cancel.clone(),
            idle_timeout,
            request_id: request_id.into(),
            fragments: 0,
        }));

        let inner = stream::unfold(state, |state| async move {
            let mut s = match state {
                State::Terminated => return None,
                State::Streaming(s) => s,
            };

            let event = loop {
                match next_step(&mut s).await {
                    Step::Chunk(Some(Ok(ProviderChunk::Delta(text)))) => {
                        if text.is_empty() {
                            continue;
                        }
                        s.fragments += 1;
                        return Some((RelayEvent::Content(text), State::Streaming(s)));
                    }
                    Step::Chunk(Some(Ok(ProviderChunk::Done))) => break RelayEvent::done(),
                    Step::Chunk(Some(Ok(ProviderChunk::Finished(reason)))) => {
                        debug!(request_id = %s.request_id, reason = %reason, "upstream reported finish reason");
                        break RelayEvent::done();
                    }
                    Step::Chunk(Some(Err(e))) => {
                        warn!(request_id = %s.request_id, error = %e, "upstream read failed mid-stream");
                        break RelayEvent::failed(e.to_string());
                    }
                    Step::Chunk(None) => {
                        debug!(request_id = %s.request_id, "upstream closed without done sentinel");
                        break RelayEvent::done();
                    }
                    Step::Idle(limit) => {
                        warn!(
                            request_id = %s.request_id,
                            idle_ms = limit.as_millis() as u64,
                            "upstream went idle"
                        );
                        break RelayEvent::failed(format!(
                            "no upstream data within {}ms",
                            limit.as_millis()
                        ));
                    }
                    Step::Cancelled => break RelayEvent::failed("cancelled"),
                }
            };

            info!(
                request_id = %s.request_id,
                fragments = s.fragments,
                error = event.error(),
                "relay stream terminated"
            );
            // Dropping the upstream stream here releases its connection.
            drop(s);
            Some((event, State::Terminated))
        });

        Self {
            inner: Box::pin(inner),
            cancel,
        }
    }

    /// A stream that has already failed: a single terminal marker carrying `error`.
    pub fn terminated(error: Option<String>) -> Self {
        Self {
            inner: Box::pin(stream::once(async move { RelayEvent::Done { error } })),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
        }
    }

    /// Wire frames for the client, one per event.
    pub fn into_frames(self) -> impl Stream<Item = Bytes> + Send {
        self.map(|event| event.to_frame())
    }
}

impl Stream for RelayStream {
    type Item = RelayEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(items: Vec<PipeResult<ProviderChunk>>) -> BoxStream<'static, ProviderChunk> {
        Box::pin(stream::iter(items))
    }

    async fn collect(stream: RelayStream) -> Vec<RelayEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn content_then_single_terminal() {
        let events = collect(RelayStream::from_chunks(
            chunks(vec![
                Ok(ProviderChunk::Delta("Hello".into())),
                Ok(ProviderChunk::Delta(String::new())),
                Ok(ProviderChunk::Delta(" there".into())),
                Ok(ProviderChunk::Done),
                Ok(ProviderChunk::Delta("ignored".into())),
            ]),
            None,
            "t1",
        ))
        .await;

        assert_eq!(
            events,
            vec![
                RelayEvent::Content("Hello".into()),
                RelayEvent::Content(" there".into()),
                RelayEvent::done(),
            ]
        );
    }

    #[tokio::test]
    async fn upstream_close_still_terminates() {
        let events = collect(RelayStream::from_chunks(
            chunks(vec![Ok(ProviderChunk::Delta("partial".into()))]),
            None,
            "t2",
        ))
        .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], RelayEvent::done());
    }

    #[tokio::test]
    async fn finish_reason_terminates() {
        let events = collect(RelayStream::from_chunks(
            chunks(vec![
                Ok(ProviderChunk::Delta("a".into())),
                Ok(ProviderChunk::Finished("stop".into())),
                Ok(ProviderChunk::Delta("b".into())),
            ]),
            None,
            "t3",
        ))
        .await;
        assert_eq!(
            events,
            vec![RelayEvent::Content("a".into()), RelayEvent::done()]
        );
    }

    #[tokio::test]
    async fn read_error_becomes_failed_terminal() {
        let events = collect(RelayStream::from_chunks(
            chunks(vec![
                Ok(ProviderChunk::Delta("a".into())),
                Err(crate::Error::Transport(
                    crate::transport::TransportError::Other("reset by peer".into()),
                )),
            ]),
            None,
            "t4",
        ))
        .await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
        assert!(events[1].error().unwrap().contains("reset by peer"));
    }

    #[tokio::test]
    async fn idle_upstream_times_out() {
        let events = collect(RelayStream::from_chunks(
            Box::pin(stream::pending::<PipeResult<ProviderChunk>>()),
            Some(Duration::from_millis(20)),
            "t5",
        ))
        .await;
        assert_eq!(events.len(), 1);
        assert!(events[0].error().unwrap().contains("20ms"));
    }

    #[tokio::test]
    async fn cancel_emits_terminal_marker() {
        let mut relay = RelayStream::from_chunks(
            Box::pin(
                stream::iter(vec![Ok::<_, crate::Error>(ProviderChunk::Delta("first".into()))])
                    .chain(stream::pending()),
            ),
            None,
            "t6",
        );
        let handle = relay.cancel_handle();

        assert_eq!(relay.next().await, Some(RelayEvent::Content("first".into())));
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(relay.next().await, Some(RelayEvent::failed("cancelled")));
        assert_eq!(relay.next().await, None);
    }

    #[tokio::test]
    async fn terminated_stream_yields_one_event() {
        let events = collect(RelayStream::terminated(Some("HTTP 500".into()))).await;
        assert_eq!(events, vec![RelayEvent::failed("HTTP 500")]);
    }

    #[tokio::test]
    async fn frames_match_wire_format() {
        let frames: Vec<Bytes> = RelayStream::from_chunks(
            chunks(vec![
                Ok(ProviderChunk::Delta("Hi".into())),
                Ok(ProviderChunk::Done),
            ]),
            None,
            "t7",
        )
        .into_frames()
        .collect()
        .await;
        assert_eq!(
            frames,
            vec![
                Bytes::from_static(b"data: {\"content\":\"Hi\"}\n\n"),
                Bytes::from_static(b"data: [DONE]\n\n"),
            ]
        );
    }
}
