//! The stream relay.

use super::{PipelineState, RelayMetrics, RelayStream};
use crate::cancellation::CancellationToken;
use crate::classifier::{AgentEventClassifier, EventClassifier, RawEvent};
use crate::config::RelayConfig;
use crate::core::{PipelineEvent, RelayFrame};
use crate::errors::RelayError;
use crate::events::{EventSink, NoOpEventSink};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How a relay run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream finished; the sentinel was sent.
    Finished,
    /// Upstream failed; one error event and the sentinel were sent.
    Faulted(String),
    /// The consumer cancelled or went away; no sentinel was sent.
    Cancelled,
}

/// The final state of a spawned run.
#[derive(Debug)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: RelayOutcome,
    /// The run's state, inspectable after the fact.
    pub state: PipelineState,
}

/// Handle to a relay run spawned on the tokio runtime.
#[derive(Debug)]
pub struct RelayHandle {
    run_id: Uuid,
    events: RelayStream,
    cancel: CancellationToken,
    task: JoinHandle<RunReport>,
}

impl RelayHandle {
    /// Returns the run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the consumer side of the run.
    pub fn events(&mut self) -> &mut RelayStream {
        &mut self.events
    }

    /// Returns a clone of the run's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops forwarding. The run's state stays available through [`Self::join`].
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    /// Splits the handle into the event stream and a join handle for the state.
    #[must_use]
    pub fn split(self) -> (RelayStream, RelayTask) {
        (
            self.events,
            RelayTask {
                cancel: self.cancel,
                task: self.task,
            },
        )
    }

    /// Waits for the run to end and returns its report.
    ///
    /// Events not yet received are discarded.
    pub async fn join(self) -> Result<RunReport, RelayError> {
        let (events, task) = self.split();
        drop(events);
        task.join().await
    }
}

/// The state-owning half of a spawned run.
#[derive(Debug)]
pub struct RelayTask {
    cancel: CancellationToken,
    task: JoinHandle<RunReport>,
}

impl RelayTask {
    /// Stops forwarding.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    /// Waits for the run to end and returns its report.
    pub async fn join(self) -> Result<RunReport, RelayError> {
        self.task
            .await
            .map_err(|e| RelayError::Internal(format!("relay task failed: {e}")))
    }
}

/// Relays normalized events from an agent runtime to a consumer.
///
/// For every upstream record the relay classifies it, applies it to the
/// run's [`PipelineState`], and forwards the resulting event. Recoverable
/// errors are forwarded as status diagnostics. When upstream ends the relay
/// sends [`RelayFrame::End`]; when upstream fails it sends one error event
/// and then the sentinel. Nothing is sent after the sentinel.
#[derive(Clone)]
pub struct StreamRelay<C = AgentEventClassifier> {
    classifier: C,
    sink: Arc<dyn EventSink>,
    metrics: Arc<RelayMetrics>,
    channel_capacity: usize,
}

impl StreamRelay<AgentEventClassifier> {
    /// Builds a relay with the default agent classifier.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;
        Ok(Self::new(
            AgentEventClassifier::from_config(config)?,
            config.channel_capacity,
        ))
    }
}

impl<C: EventClassifier> StreamRelay<C> {
    /// Creates a relay around a classifier.
    #[must_use]
    pub fn new(classifier: C, channel_capacity: usize) -> Self {
        Self {
            classifier,
            sink: Arc::new(NoOpEventSink),
            metrics: Arc::new(RelayMetrics::default()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Sets the sink that mirrors forwarded events.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the relay's counters.
    #[must_use]
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Creates an output channel sized for this relay.
    #[must_use]
    pub fn channel(&self) -> (mpsc::Sender<RelayFrame>, RelayStream) {
        RelayStream::channel(self.channel_capacity)
    }

    /// Runs one relay pass over `upstream`, mutating `state` in place.
    ///
    /// Returns when upstream ends, faults, or the consumer cancels. `state`
    /// remains valid and inspectable in every case.
    pub async fn run<S>(
        &self,
        upstream: S,
        state: &mut PipelineState,
        output: &mpsc::Sender<RelayFrame>,
        cancel: &CancellationToken,
    ) -> RelayOutcome
    where
        S: Stream<Item = Result<RawEvent, anyhow::Error>>,
    {
        let run_id = state.run_id();
        state.begin();
        let mut upstream = std::pin::pin!(upstream);

        let outcome = loop {
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                item = upstream.next() => Some(item),
            };
            let Some(next) = polled else {
                break RelayOutcome::Cancelled;
            };

            match next {
                None => {
                    if self.send(output, RelayFrame::End, cancel).await {
                        break RelayOutcome::Finished;
                    }
                    break RelayOutcome::Cancelled;
                }
                Some(Err(err)) => {
                    let fault = RelayError::upstream(&err);
                    warn!(run_id = %run_id, error = %fault, "Upstream fault");
                    self.metrics.record_fault();
                    let message = fault.to_string();
                    state.fail(&message);

                    let delivered = self
                        .forward(run_id, PipelineEvent::error(message.clone()), output, cancel)
                        .await
                        && self.send(output, RelayFrame::End, cancel).await;
                    if delivered {
                        break RelayOutcome::Faulted(message);
                    }
                    break RelayOutcome::Cancelled;
                }
                Some(Ok(raw)) => {
                    self.metrics.record_received();
                    let Some(event) = self.process(&raw, state) else {
                        continue;
                    };
                    if !self.forward(run_id, event, output, cancel).await {
                        break RelayOutcome::Cancelled;
                    }
                }
            }
        };

        if outcome == RelayOutcome::Cancelled {
            self.metrics.record_cancellation();
            state.mark_cancelled();
            info!(run_id = %run_id, reason = ?cancel.reason(), "Relay cancelled by consumer");
        } else {
            info!(run_id = %run_id, status = %state.status(), "Relay finished");
        }
        outcome
    }

    /// Classifies one record and applies it; returns the event to forward.
    fn process(&self, raw: &RawEvent, state: &mut PipelineState) -> Option<PipelineEvent> {
        let applied = self
            .classifier
            .classify(raw)
            .and_then(|event| state.apply(event));

        match applied {
            Ok(Some(event)) => {
                debug!(run_id = %state.run_id(), event_type = event.event_type(), "Classified event");
                Some(event)
            }
            Ok(None) => {
                self.metrics.record_suppressed();
                None
            }
            Err(err) => {
                warn!(run_id = %state.run_id(), code = err.code(), error = %err, "Forwarding diagnostic");
                self.metrics.record_diagnostic();
                Some(PipelineEvent::diagnostic(&err))
            }
        }
    }

    async fn forward(
        &self,
        run_id: Uuid,
        event: PipelineEvent,
        output: &mpsc::Sender<RelayFrame>,
        cancel: &CancellationToken,
    ) -> bool {
        let mirrored = event.clone();
        if !self.send(output, RelayFrame::Event(event), cancel).await {
            return false;
        }
        self.metrics.record_forwarded();
        self.sink.emit(run_id, &mirrored).await;
        true
    }

    /// Sends with backpressure; false if the consumer is gone or cancelled.
    async fn send(
        &self,
        output: &mpsc::Sender<RelayFrame>,
        frame: RelayFrame,
        cancel: &CancellationToken,
    ) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            sent = output.send(frame) => sent.is_ok(),
        }
    }
}

impl<C> StreamRelay<C>
where
    C: EventClassifier + Clone + 'static,
{
    /// Spawns a run on the tokio runtime.
    ///
    /// The task owns `state` while the run is live and hands it back through
    /// [`RelayHandle::join`]. Dropping the handle's event stream or calling
    /// [`RelayHandle::cancel`] stops forwarding and drops `upstream`.
    pub fn spawn<S>(&self, upstream: S, mut state: PipelineState) -> RelayHandle
    where
        S: Stream<Item = Result<RawEvent, anyhow::Error>> + Send + 'static,
    {
        let relay = self.clone();
        let cancel = CancellationToken::new();
        let (tx, events) = self.channel();
        let run_id = state.run_id();
        let span = info_span!("relay_run", run_id = %run_id, stages = state.stages().len());

        let task_cancel = cancel.clone();
        let task = tokio::spawn(
            async move {
                let outcome = relay.run(upstream, &mut state, &tx, &task_cancel).await;
                RunReport { outcome, state }
            }
            .instrument(span),
        );

        RelayHandle {
            run_id,
            events,
            cancel,
            task,
        }
    }
}

impl<C> std::fmt::Debug for StreamRelay<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRelay")
            .field("channel_capacity", &self.channel_capacity)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
