//! Durable repair event queue in SQLite.
//!
//! Events survive restarts of the process that published them, so a repair
//! scheduled by `postblob put` is delivered by a later `postblob repair`.
//! Deliveries are claimed with a lease: a worker that dies mid-round leaves
//! its claims to expire and be picked up again.

use std::time::Duration;

use futures::{stream, StreamExt};
use sqlx::Row;

use common::event_bus::{
    DeadLetter, DispatchReport, EventBus, EventBusError, EventListener, RetryPolicy,
};
use common::events::RepairEvent;

use super::Database;

/// How long a claimed delivery stays invisible to other dispatch rounds.
const CLAIM_LEASE: Duration = Duration::from_secs(300);
/// Deliveries claimed per round.
const DISPATCH_BATCH: i64 = 64;

fn backend(e: sqlx::Error) -> EventBusError {
    EventBusError::Backend(Box::new(e))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

struct Claimed {
    event_id: String,
    payload: String,
    attempts: u32,
}

#[derive(Debug, Clone)]
pub struct SqliteEventBus {
    db: Database,
    policy: RetryPolicy,
}

impl SqliteEventBus {
    pub fn new(db: Database, policy: RetryPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn claim_due(&self) -> Result<Vec<Claimed>, EventBusError> {
        let now = now_millis();
        let rows = sqlx::query(
            r#"
            UPDATE repair_events
            SET next_attempt_at = ?1
            WHERE event_id IN (
                SELECT event_id FROM repair_events
                WHERE dead_lettered = 0 AND next_attempt_at <= ?2
                ORDER BY next_attempt_at
                LIMIT ?3
            )
            RETURNING event_id, payload, attempts
            "#,
        )
        .bind(now.saturating_add(millis(CLAIM_LEASE)))
        .bind(now)
        .bind(DISPATCH_BATCH)
        .fetch_all(&*self.db)
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|row| Claimed {
                event_id: row.get("event_id"),
                payload: row.get("payload"),
                attempts: u32::try_from(row.get::<i64, _>("attempts")).unwrap_or(u32::MAX),
            })
            .collect())
    }

    async fn ack(&self, event_id: &str) -> Result<(), EventBusError> {
        sqlx::query("DELETE FROM repair_events WHERE event_id = ?1")
            .bind(event_id)
            .execute(&*self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn reschedule(
        &self,
        event_id: &str,
        attempts: u32,
        delay: Duration,
        error: &str,
    ) -> Result<(), EventBusError> {
        sqlx::query(
            r#"
            UPDATE repair_events
            SET attempts = ?2, next_attempt_at = ?3, last_error = ?4
            WHERE event_id = ?1
            "#,
        )
        .bind(event_id)
        .bind(i64::from(attempts))
        .bind(now_millis().saturating_add(millis(delay)))
        .bind(error)
        .execute(&*self.db)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn bury(&self, event_id: &str, attempts: u32, error: &str) -> Result<(), EventBusError> {
        sqlx::query(
            r#"
            UPDATE repair_events
            SET attempts = ?2, dead_lettered = 1, last_error = ?3
            WHERE event_id = ?1
            "#,
        )
        .bind(event_id)
        .bind(i64::from(attempts))
        .bind(error)
        .execute(&*self.db)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventBus for SqliteEventBus {
    async fn publish(&self, event: RepairEvent) -> Result<(), EventBusError> {
        let payload = event.to_json()?;
        let now = now_millis();

        sqlx::query(
            r#"
            INSERT INTO repair_events (event_id, kind, payload, next_attempt_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id().to_string())
        .bind(event.kind())
        .bind(payload)
        .bind(now)
        .execute(&*self.db)
        .await
        .map_err(backend)?;

        tracing::debug!(
            event_id = %event.event_id(),
            kind = event.kind(),
            "repair event queued"
        );
        Ok(())
    }

    async fn dispatch_pending(
        &self,
        listener: &dyn EventListener,
    ) -> Result<DispatchReport, EventBusError> {
        let claimed = self.claim_due().await?;
        let mut report = DispatchReport::default();
        if claimed.is_empty() {
            return Ok(report);
        }

        let outcomes: Vec<(Claimed, anyhow::Result<()>)> = stream::iter(claimed)
            .map(|claim| async move {
                let result = match RepairEvent::from_json(&claim.payload) {
                    Ok(event) => listener.handle(&event).await,
                    Err(e) => Err(anyhow::Error::new(e).context("malformed repair event")),
                };
                (claim, result)
            })
            .buffer_unordered(self.policy.concurrency.max(1))
            .collect()
            .await;

        for (claim, result) in outcomes {
            let e = match result {
                Ok(()) => {
                    self.ack(&claim.event_id).await?;
                    report.delivered += 1;
                    continue;
                }
                Err(e) => format!("{:#}", e),
            };

            let attempts = claim.attempts.saturating_add(1);
            match self.policy.next_delay(attempts) {
                Some(delay) => {
                    tracing::warn!(
                        listener = listener.name(),
                        event_id = %claim.event_id,
                        attempts,
                        "repair event delivery failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    self.reschedule(&claim.event_id, attempts, delay, &e).await?;
                    report.retried += 1;
                }
                None => {
                    tracing::error!(
                        listener = listener.name(),
                        event_id = %claim.event_id,
                        attempts,
                        "repair event dead-lettered: {}",
                        e
                    );
                    self.bury(&claim.event_id, attempts, &e).await?;
                    report.dead_lettered += 1;
                }
            }
        }

        Ok(report)
    }

    async fn pending_count(&self) -> Result<usize, EventBusError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count FROM repair_events WHERE dead_lettered = 0
            "#,
        )
        .fetch_one(&*self.db)
        .await
        .map_err(backend)?;

        Ok(usize::try_from(row.get::<i64, _>("count")).unwrap_or(0))
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>, EventBusError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, payload, attempts, last_error FROM repair_events
            WHERE dead_lettered = 1
            ORDER BY created_at
            "#,
        )
        .fetch_all(&*self.db)
        .await
        .map_err(backend)?;

        let mut letters = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            let event = match RepairEvent::from_json(&payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    let event_id: String = row.get("event_id");
                    tracing::warn!(%event_id, "unreadable dead letter: {}", e);
                    None
                }
            };
            letters.push(DeadLetter {
                event,
                payload,
                attempts: u32::try_from(row.get::<i64, _>("attempts")).unwrap_or(u32::MAX),
                last_error: row
                    .get::<Option<String>, _>("last_error")
                    .unwrap_or_default(),
            });
        }
        Ok(letters)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use object_store::{BlobId, BucketName};

    use common::events::ObjectStorageIdentity;

    use super::*;

    struct FlakyListener {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EventListener for FlakyListener {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn handle(&self, _event: &RepairEvent) -> anyhow::Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                anyhow::bail!("replica still unreachable");
            }
            Ok(())
        }
    }

    fn listener(failures: usize) -> FlakyListener {
        FlakyListener {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    fn event() -> RepairEvent {
        RepairEvent::blob_addition(
            &BucketName::new("messages").unwrap(),
            &BlobId::of(b"body"),
            ObjectStorageIdentity::Primary,
        )
    }

    async fn bus(policy: RetryPolicy) -> SqliteEventBus {
        SqliteEventBus::new(Database::in_memory().await.unwrap(), policy)
    }

    #[tokio::test]
    async fn test_publish_is_idempotent_per_event_id() {
        let bus = bus(RetryPolicy::immediate(3)).await;
        let event = event();

        bus.publish(event.clone()).await.unwrap();
        bus.publish(event).await.unwrap();

        assert_eq!(bus.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delivers_after_retries() {
        let bus = bus(RetryPolicy::immediate(3)).await;
        let listener = listener(1);
        bus.publish(event()).await.unwrap();

        assert_eq!(bus.dispatch_pending(&listener).await.unwrap().retried, 1);
        assert_eq!(bus.dispatch_pending(&listener).await.unwrap().delivered, 1);
        assert_eq!(bus.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dead_letters_survive_with_their_event() {
        let bus = bus(RetryPolicy::immediate(0)).await;
        let published = event();
        bus.publish(published.clone()).await.unwrap();

        let report = bus.dispatch_pending(&listener(usize::MAX)).await.unwrap();
        assert_eq!(report.dead_lettered, 1);

        let dead = bus.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].event.as_ref(), Some(&published));
        assert_eq!(dead[0].attempts, 1);
        assert!(dead[0].last_error.contains("unreachable"));
        assert_eq!(bus.pending_count().await.unwrap(), 0);

        // Dead letters are never delivered again
        assert!(bus
            .dispatch_pending(&listener(0))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dead_lettered() {
        let bus = bus(RetryPolicy::immediate(0)).await;
        sqlx::query(
            r#"
            INSERT INTO repair_events (event_id, kind, payload, next_attempt_at, created_at)
            VALUES ('bogus', 'Unknown', '{"type":"BlobRename"}', 0, 0)
            "#,
        )
        .execute(&*bus.db)
        .await
        .unwrap();

        let listener = listener(0);
        let report = bus.dispatch_pending(&listener).await.unwrap();

        assert_eq!(report.dead_lettered, 1);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 0);

        // Still visible to operators, raw payload included
        let dead = bus.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].event.is_none());
        assert_eq!(dead[0].payload, r#"{"type":"BlobRename"}"#);
        assert!(dead[0].last_error.contains("malformed repair event"));
        assert_eq!(bus.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_backoff_hides_event_until_due() {
        let policy = RetryPolicy {
            max_retries: 3,
            first_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
            jitter_factor: 0.0,
            concurrency: 1,
        };
        let bus = bus(policy).await;
        let listener = listener(1);
        bus.publish(event()).await.unwrap();

        assert_eq!(bus.dispatch_pending(&listener).await.unwrap().retried, 1);
        assert!(bus.dispatch_pending(&listener).await.unwrap().is_empty());
        assert_eq!(bus.pending_count().await.unwrap(), 1);
    }
}
