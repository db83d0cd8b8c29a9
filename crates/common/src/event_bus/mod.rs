//! Event channel carrying repair events from the replicated store to the repair worker.
//!
//! The bus owns delivery policy: at-least-once delivery, exponential backoff
//! between attempts, and a dead-letter list once the retries are exhausted.
//! Listeners perform a single attempt per delivery and report the outcome.

mod memory;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::events::RepairEvent;

pub use memory::InMemoryEventBus;

/// Consumer of repair events.
#[async_trait::async_trait]
pub trait EventListener: Send + Sync {
    /// Group name, used in logs
    fn name(&self) -> &str;

    /// Handle one delivery. An error leaves the event to the bus for redelivery.
    async fn handle(&self, event: &RepairEvent) -> anyhow::Result<()>;
}

/// Transport for repair events.
#[async_trait::async_trait]
pub trait EventBus: Send + Sync + std::fmt::Debug {
    /// Queue an event for delivery.
    async fn publish(&self, event: RepairEvent) -> Result<(), EventBusError>;

    /// Deliver every event currently due to `listener`.
    ///
    /// Successful deliveries are acknowledged and dropped. Failed ones are
    /// rescheduled per the bus `RetryPolicy`, or dead-lettered.
    async fn dispatch_pending(
        &self,
        listener: &dyn EventListener,
    ) -> Result<DispatchReport, EventBusError>;

    /// Number of events not yet acknowledged nor dead-lettered.
    async fn pending_count(&self) -> Result<usize, EventBusError>;

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, EventBusError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event bus is closed")]
    Closed,
    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("event bus backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Redelivery policy of a bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Redeliveries after the first failed attempt before dead-lettering
    pub max_retries: u32,
    pub first_backoff: Duration,
    pub max_backoff: Duration,
    /// Extra random delay, as a fraction of the computed backoff
    pub jitter_factor: f64,
    /// Deliveries in flight at once within one dispatch round
    pub concurrency: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            first_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            jitter_factor: 0.5,
            concurrency: 4,
        }
    }
}

impl RetryPolicy {
    /// Policy redelivering without delay, mostly for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            first_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_factor: 0.0,
            ..Self::default()
        }
    }

    /// Delay before the next delivery after `failed_attempts` failures,
    /// or `None` once the event should be dead-lettered.
    pub fn next_delay(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 {
            return Some(Duration::ZERO);
        }
        if failed_attempts > self.max_retries {
            return None;
        }

        let factor = 2u32.saturating_pow(failed_attempts - 1);
        let base = self
            .first_backoff
            .saturating_mul(factor)
            .min(self.max_backoff);
        let jitter = if self.jitter_factor > 0.0 {
            Duration::try_from_secs_f64(
                base.as_secs_f64() * self.jitter_factor * rand::random::<f64>(),
            )
            .unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        Some(base.saturating_add(jitter))
    }
}

/// An event the bus gave up on.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    /// `None` when the stored payload no longer deserializes
    pub event: Option<RepairEvent>,
    /// The event as the bus stores it
    pub payload: String,
    pub attempts: u32,
    pub last_error: String,
}

impl DeadLetter {
    pub fn new(event: RepairEvent, attempts: u32, last_error: String) -> Self {
        Self {
            payload: event.to_json().unwrap_or_default(),
            event: Some(event),
            attempts,
            last_error,
        }
    }
}

/// Outcome of one `dispatch_pending` round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.delivered + self.retried + self.dead_lettered
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Spawn a task delivering due events to `listener` every `poll_interval`
/// until `shutdown` fires.
pub fn spawn_dispatcher(
    bus: Arc<dyn EventBus>,
    listener: Arc<dyn EventListener>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(listener = listener.name(), "repair dispatcher started");
        loop {
            match bus.dispatch_pending(listener.as_ref()).await {
                Ok(report) if !report.is_empty() => {
                    tracing::debug!(
                        listener = listener.name(),
                        delivered = report.delivered,
                        retried = report.retried,
                        dead_lettered = report.dead_lettered,
                        "dispatch round finished"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(listener = listener.name(), "dispatch round failed: {}", e);
                }
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
        tracing::info!(listener = listener.name(), "repair dispatcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            first_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            jitter_factor: 0.0,
            concurrency: 1,
        };

        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_millis(800)));
        assert_eq!(policy.next_delay(5), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(10), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(11), None);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            max_retries: 3,
            first_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            jitter_factor: 0.5,
            concurrency: 1,
        };

        for _ in 0..50 {
            let delay = policy.next_delay(1).unwrap();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_zero_retries_dead_letters_on_first_failure() {
        assert_eq!(RetryPolicy::immediate(0).next_delay(1), None);
        assert_eq!(RetryPolicy::immediate(1).next_delay(1), Some(Duration::ZERO));
    }

    #[test]
    fn test_huge_backoff_saturates() {
        let policy = RetryPolicy {
            max_retries: 3,
            first_backoff: Duration::MAX,
            max_backoff: Duration::MAX,
            jitter_factor: 0.5,
            concurrency: 1,
        };

        assert_eq!(policy.next_delay(3), Some(Duration::MAX));
    }
}
