//! Per-job event fan-out
//!
//! Every job owns a [`JobChannel`]: a bounded `tokio::sync::broadcast` ring for
//! progress and retry notices, plus an out-of-band slot for the terminal event.
//!
//! - Subscribing is restartable-from-now: a new [`Subscription`] sees events
//!   published after it attached, never history.
//! - Finishing stores the terminal event and drops the sender. Subscribers drain
//!   whatever is still buffered, observe the close, and then yield the stored
//!   terminal event exactly once.
//! - A subscriber that attaches after the job finished yields only the terminal
//!   event.
//! - A slow subscriber loses its oldest buffered events (the ring overwrites
//!   them). The terminal event is not in the ring and cannot be lost.
//!
//! Channels live inside registry entries, so a job's channel disappears together
//! with the job when it is evicted.

use crate::registry::JobRegistry;
use crate::types::{JobEvent, JobId, TerminalEvent};
use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

/// Event channel of a single job
#[derive(Debug)]
pub struct JobChannel {
    job_id: JobId,
    /// `None` once the job finished
    sender: Mutex<Option<broadcast::Sender<JobEvent>>>,
    terminal: OnceLock<TerminalEvent>,
}

impl JobChannel {
    /// Create an open channel buffering up to `capacity` events per subscriber
    ///
    /// A zero capacity is raised to one.
    pub fn new(job_id: JobId, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            job_id,
            sender: Mutex::new(Some(sender)),
            terminal: OnceLock::new(),
        }
    }

    /// Deliver a non-terminal event to every current subscriber
    ///
    /// Returns how many subscribers the event was queued for. Never waits on
    /// subscribers. Terminal events are routed to [`finish`](Self::finish).
    pub fn publish(&self, event: JobEvent) -> usize {
        if let JobEvent::Terminal(terminal) = event {
            return usize::from(self.finish(terminal));
        }

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            // Err only means nobody is listening right now
            Some(tx) => tx.send(event).unwrap_or(0),
            None => {
                tracing::debug!(job_id = %self.job_id, "event published after finish dropped");
                0
            }
        }
    }

    /// Store the terminal event and close the channel
    ///
    /// Returns `false` if the channel was already finished; the first terminal
    /// event wins.
    pub fn finish(&self, terminal: TerminalEvent) -> bool {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if self.terminal.set(terminal).is_err() {
            tracing::warn!(
                job_id = %self.job_id,
                "job already finished, second terminal event ignored"
            );
            return false;
        }
        sender.take();
        true
    }

    /// Attach a new subscriber
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let receiver = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(broadcast::Sender::subscribe);

        Subscription {
            channel: Arc::clone(self),
            receiver,
            done: false,
        }
    }

    /// The stored terminal event, once the job finished
    pub fn terminal(&self) -> Option<&TerminalEvent> {
        self.terminal.get()
    }

    /// Whether the terminal event has been stored
    pub fn is_finished(&self) -> bool {
        self.terminal.get().is_some()
    }

    /// Number of attached live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

/// One observer's handle on a job's events
///
/// Dropping the handle detaches it, same as [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct Subscription {
    channel: Arc<JobChannel>,
    receiver: Option<broadcast::Receiver<JobEvent>>,
    done: bool,
}

impl Subscription {
    /// Job this subscription observes
    pub fn job_id(&self) -> JobId {
        self.channel.job_id
    }

    /// Next event, or `None` after the terminal event was yielded
    pub async fn recv(&mut self) -> Option<JobEvent> {
        if self.done {
            return None;
        }

        if let Some(receiver) = self.receiver.as_mut() {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            job_id = %self.channel.job_id,
                            skipped,
                            "subscriber lagging, oldest events dropped"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            self.receiver = None;
        }

        self.done = true;
        self.channel.terminal().cloned().map(JobEvent::Terminal)
    }

    /// Detach from the channel; safe to call repeatedly or after close
    pub fn unsubscribe(&mut self) {
        self.receiver = None;
        self.done = true;
    }

    /// Whether the subscription has nothing more to yield
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Convert into a stream of events ending after the terminal event
    pub fn into_stream(mut self) -> impl Stream<Item = JobEvent> + Send + 'static {
        let job_id = self.channel.job_id;
        let channel = Arc::clone(&self.channel);
        let detached = self.done;
        let receiver = self.receiver.take();

        let live = futures::stream::iter(receiver.map(BroadcastStream::new))
            .flatten()
            .filter_map(move |item| {
                futures::future::ready(match item {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            job_id = %job_id,
                            skipped,
                            "stream lagging, oldest events dropped"
                        );
                        None
                    }
                })
            });

        let terminal = futures::stream::once(async move {
            if detached {
                None
            } else {
                channel.terminal().cloned().map(JobEvent::Terminal)
            }
        })
        .filter_map(futures::future::ready);

        live.chain(terminal)
    }
}

/// Routes events to job channels by job id
#[derive(Clone, Debug)]
pub struct BroadcastHub {
    registry: JobRegistry,
}

impl BroadcastHub {
    /// Create a hub over the channels held by `registry`
    pub fn new(registry: JobRegistry) -> Self {
        Self { registry }
    }

    /// Deliver an event to all current subscribers of `id`
    ///
    /// Unknown ids are ignored (returns 0).
    pub async fn publish(&self, id: JobId, event: JobEvent) -> usize {
        match self.registry.channel(id).await {
            Some(channel) => channel.publish(event),
            None => 0,
        }
    }

    /// Store the terminal event for `id` and close its channel
    pub async fn finish(&self, id: JobId, terminal: TerminalEvent) -> bool {
        match self.registry.channel(id).await {
            Some(channel) => channel.finish(terminal),
            None => false,
        }
    }

    /// Subscribe to `id`, `None` if the job is unknown or evicted
    pub async fn subscribe(&self, id: JobId) -> Option<Subscription> {
        self.registry.channel(id).await.map(|c| c.subscribe())
    }
}
