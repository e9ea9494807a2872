//! Consumer side of a relay run.

use crate::core::{PipelineEvent, RelayFrame};
use crate::errors::RelayError;
use crate::sse;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// The receiving end of a relay run.
///
/// Yields frames in order; the last frame of a run that finished normally or
/// faulted is [`RelayFrame::End`]. Dropping the stream cancels forwarding.
#[derive(Debug)]
pub struct RelayStream {
    rx: mpsc::Receiver<RelayFrame>,
    ended: bool,
}

impl RelayStream {
    pub(crate) fn new(rx: mpsc::Receiver<RelayFrame>) -> Self {
        Self { rx, ended: false }
    }

    /// Creates a bounded channel pair for a relay run.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<RelayFrame>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// Receives the next frame. Returns `None` after the sentinel or once the
    /// relay is gone.
    pub async fn recv(&mut self) -> Option<RelayFrame> {
        if self.ended {
            return None;
        }
        let frame = self.rx.recv().await;
        if matches!(frame, Some(RelayFrame::End)) {
            self.ended = true;
        }
        frame
    }

    /// Receives the next event, skipping nothing; `None` at end of stream.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        match self.recv().await? {
            RelayFrame::Event(event) => Some(event),
            RelayFrame::End => None,
        }
    }

    /// Drains the stream, returning every event and whether the sentinel arrived.
    pub async fn collect_events(mut self) -> (Vec<PipelineEvent>, bool) {
        let mut events = Vec::new();
        while let Some(frame) = self.recv().await {
            if let RelayFrame::Event(event) = frame {
                events.push(event);
            }
        }
        (events, self.ended)
    }

    /// Returns true once the end-of-stream sentinel has been received.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Maps the stream to `text/event-stream` frames.
    pub fn into_sse(self) -> impl Stream<Item = Result<String, RelayError>> {
        futures::StreamExt::map(self, |frame| sse::encode_frame(&frame))
    }
}

impl Stream for RelayStream {
    type Item = RelayFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.ended {
            return Poll::Ready(None);
        }
        let poll = self.rx.poll_recv(cx);
        if let Poll::Ready(Some(RelayFrame::End)) = poll {
            self.ended = true;
        }
        poll
    }
}
