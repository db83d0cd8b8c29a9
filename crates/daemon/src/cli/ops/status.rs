use clap::Args;

use common::event_bus::EventBus;

#[derive(Args, Debug, Clone)]
pub struct Status;

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Status check failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Status {
    type Error = StatusError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        // 1. Check config directory
        lines.push("Config:".to_string());
        let state = match ctx.app_state() {
            Ok(state) => state,
            Err(e) => {
                lines.push(format!("  error: {}", e));
                return Ok(lines.join("\n"));
            }
        };
        let strategy = &state.config.strategy;
        lines.push(format!("  directory:    {}", state.postblob_dir.display()));
        lines.push("  config.toml:  OK".to_string());
        lines.push(format!("  replication:  {}", strategy.secondary_enabled));
        lines.push(format!("  single-save:  {}", strategy.single_save));
        lines.push(format!("  encryption:   {}", strategy.encryption.is_some()));

        // 2. Check storage and the repair queue
        lines.push(String::new());
        lines.push("Storage:".to_string());
        let service = match ctx.service().await {
            Ok(service) => service,
            Err(e) => {
                lines.push(format!("  error: {}", e));
                return Ok(lines.join("\n"));
            }
        };
        match service.store().list_buckets().await {
            Ok(buckets) => lines.push(format!("  buckets:      {}", buckets.len())),
            Err(e) => lines.push(format!("  buckets:      error: {}", e)),
        }

        let bus = service.event_bus();
        match (bus.pending_count().await, bus.dead_letters().await) {
            (Ok(pending), Ok(dead)) => {
                lines.push(format!("  pending:      {}", pending));
                lines.push(format!("  dead letters: {}", dead.len()));
            }
            (Err(e), _) | (_, Err(e)) => {
                lines.push(format!("  repair queue: error: {}", e));
            }
        }

        Ok(lines.join("\n"))
    }
}
