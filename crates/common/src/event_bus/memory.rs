//! In-process event bus.

use std::time::{Duration, Instant};

use futures::{stream, StreamExt};
use parking_lot::Mutex;

use super::{DeadLetter, DispatchReport, EventBus, EventBusError, EventListener, RetryPolicy};
use crate::events::RepairEvent;

/// Furthest a redelivery is ever scheduled ahead.
const MAX_SCHEDULE_AHEAD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Instant `delay` from now, clamped so huge backoffs never overflow.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay.min(MAX_SCHEDULE_AHEAD)).unwrap_or(now)
}

#[derive(Debug)]
struct Delivery {
    event: RepairEvent,
    failed_attempts: u32,
    not_before: Instant,
}

impl Delivery {
    fn new(event: RepairEvent) -> Self {
        Self {
            event,
            failed_attempts: 0,
            not_before: Instant::now(),
        }
    }
}

/// Event bus living inside the current process.
///
/// Published events go through a flume channel; deliveries awaiting their
/// backoff and dead letters are kept alongside it. Nothing survives a restart.
#[derive(Debug)]
pub struct InMemoryEventBus {
    tx: flume::Sender<RepairEvent>,
    rx: flume::Receiver<RepairEvent>,
    policy: RetryPolicy,
    scheduled: Mutex<Vec<Delivery>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl InMemoryEventBus {
    pub fn new(policy: RetryPolicy) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx,
            rx,
            policy,
            scheduled: Mutex::new(Vec::new()),
            dead_letters: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Take every delivery that is due, leaving the others scheduled.
    fn take_due(&self) -> Vec<Delivery> {
        let mut scheduled = self.scheduled.lock();
        scheduled.extend(self.rx.try_iter().map(Delivery::new));

        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) = scheduled
            .drain(..)
            .partition(|delivery| delivery.not_before <= now);
        *scheduled = later;
        due
    }
}

#[async_trait::async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: RepairEvent) -> Result<(), EventBusError> {
        tracing::debug!(
            event_id = %event.event_id(),
            kind = event.kind(),
            "publishing repair event"
        );
        self.tx.send(event).map_err(|_| EventBusError::Closed)
    }

    async fn dispatch_pending(
        &self,
        listener: &dyn EventListener,
    ) -> Result<DispatchReport, EventBusError> {
        let due = self.take_due();
        if due.is_empty() {
            return Ok(DispatchReport::default());
        }

        let outcomes: Vec<(Delivery, anyhow::Result<()>)> = stream::iter(due)
            .map(|delivery| async move {
                let result = listener.handle(&delivery.event).await;
                (delivery, result)
            })
            .buffer_unordered(self.policy.concurrency.max(1))
            .collect()
            .await;

        let mut report = DispatchReport::default();
        for (mut delivery, result) in outcomes {
            let Err(e) = result else {
                report.delivered += 1;
                continue;
            };

            delivery.failed_attempts += 1;
            match self.policy.next_delay(delivery.failed_attempts) {
                Some(delay) => {
                    tracing::warn!(
                        listener = listener.name(),
                        event_id = %delivery.event.event_id(),
                        attempts = delivery.failed_attempts,
                        "repair event delivery failed, retrying in {:?}: {:#}",
                        delay,
                        e
                    );
                    delivery.not_before = deadline_after(delay);
                    self.scheduled.lock().push(delivery);
                    report.retried += 1;
                }
                None => {
                    tracing::error!(
                        listener = listener.name(),
                        event_id = %delivery.event.event_id(),
                        attempts = delivery.failed_attempts,
                        "repair event dead-lettered: {:#}",
                        e
                    );
                    self.dead_letters.lock().push(DeadLetter::new(
                        delivery.event,
                        delivery.failed_attempts,
                        format!("{:#}", e),
                    ));
                    report.dead_lettered += 1;
                }
            }
        }

        Ok(report)
    }

    async fn pending_count(&self) -> Result<usize, EventBusError> {
        Ok(self.rx.len() + self.scheduled.lock().len())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, EventBusError> {
        Ok(self.dead_letters.lock().clone())
    }
}
