use clap::Args;

use common::event_bus::{EventBus, EventBusError};
use postblob_daemon::process::{spawn_repair_worker, ProcessError};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Repair {
    /// Keep running and poll the repair queue until SIGINT/SIGTERM
    #[arg(long)]
    pub follow: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("repair queue error: {0}")]
    EventBus(#[from] EventBusError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Repair {
    type Error = RepairError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let service = ctx.service().await?;

        if self.follow {
            spawn_repair_worker(&service).await?;
            return Ok("repair worker stopped".to_string());
        }

        let listener = service
            .repair_listener()
            .ok_or(ProcessError::ReplicationDisabled)?;
        let bus = service.event_bus();

        // A single pass: retries scheduled during this run wait for the next one
        let report = bus.dispatch_pending(&**listener).await?;
        let pending = bus.pending_count().await?;

        Ok(format!(
            "repaired: {}\nretrying: {}\ndead-lettered: {}\nstill pending: {}",
            report.delivered, report.retried, report.dead_lettered, pending
        ))
    }
}
