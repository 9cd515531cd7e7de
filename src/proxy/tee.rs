//! Streaming tee
//!
//! [`RelayStream`] forwards upstream chunks to the client unchanged while
//! capturing exactly the bytes the client consumed. A yielded chunk is only
//! committed to the capture once the transport polls again (or the stream
//! ends), so a disconnect right after a yield does not count that chunk.
//!
//! The completion callback runs exactly once, on whichever comes first:
//! end of stream, upstream read error, or the stream being dropped.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::Stream;

/// How a relayed stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed,
    Disconnected,
    UpstreamFailed,
}

impl RelayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOutcome::Completed => "completed",
            RelayOutcome::Disconnected => "disconnected",
            RelayOutcome::UpstreamFailed => "upstream_failed",
        }
    }
}

pub type FinishFn = Box<dyn FnOnce(Bytes, RelayOutcome) + Send>;

pub struct RelayStream<E> {
    upstream: BoxStream<'static, Result<Bytes, E>>,
    captured: BytesMut,
    in_flight: Option<Bytes>,
    on_finish: Option<FinishFn>,
}

impl<E> RelayStream<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(upstream: BoxStream<'static, Result<Bytes, E>>, on_finish: FinishFn) -> Self {
        Self {
            upstream,
            captured: BytesMut::new(),
            in_flight: None,
            on_finish: Some(on_finish),
        }
    }
}

impl<E> RelayStream<E> {
    fn commit_in_flight(&mut self) {
        if let Some(chunk) = self.in_flight.take() {
            self.captured.extend_from_slice(&chunk);
        }
    }

    fn finish(&mut self, outcome: RelayOutcome) {
        if let Some(on_finish) = self.on_finish.take() {
            let snapshot = std::mem::take(&mut self.captured).freeze();
            on_finish(snapshot, outcome);
        }
    }
}

impl<E> Stream for RelayStream<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.on_finish.is_none() {
            return Poll::Ready(None);
        }

        // Being polled again means the previous chunk was taken by the transport
        this.commit_in_flight();

        match this.upstream.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.in_flight = Some(chunk.clone());
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish(RelayOutcome::UpstreamFailed);
                Poll::Ready(Some(Err(io::Error::other(e))))
            }
            Poll::Ready(None) => {
                this.finish(RelayOutcome::Completed);
                Poll::Ready(None)
            }
        }
    }
}

impl<E> Drop for RelayStream<E> {
    fn drop(&mut self) {
        self.finish(RelayOutcome::Disconnected);
    }
}
