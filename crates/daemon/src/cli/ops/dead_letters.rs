use clap::Args;

use common::event_bus::{DeadLetter, EventBus, EventBusError};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct DeadLetters {
    /// Print the raw event JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeadLettersError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("repair queue error: {0}")]
    EventBus(#[from] EventBusError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for DeadLetters {
    type Error = DeadLettersError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let service = ctx.service().await?;
        let letters = service.event_bus().dead_letters().await?;

        if letters.is_empty() {
            return Ok("No dead letters".to_string());
        }

        let lines: Vec<String> = letters
            .iter()
            .map(|letter| {
                if self.json {
                    letter.payload.clone()
                } else {
                    summarize(letter)
                }
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

fn summarize(letter: &DeadLetter) -> String {
    match &letter.event {
        Some(event) => format!(
            "{} {} bucket={} failed={} attempts={} error={}",
            event.event_id(),
            event.kind(),
            event.bucket_name(),
            event.failed_object_storage(),
            letter.attempts,
            letter.last_error
        ),
        None => format!(
            "unreadable payload={} attempts={} error={}",
            letter.payload, letter.attempts, letter.last_error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_letter_shows_raw_payload() {
        let letter = DeadLetter {
            event: None,
            payload: r#"{"type":"BlobRename"}"#.to_string(),
            attempts: 1,
            last_error: "malformed repair event".to_string(),
        };

        let line = summarize(&letter);
        assert!(line.starts_with("unreadable"));
        assert!(line.contains(r#"{"type":"BlobRename"}"#));
        assert!(line.contains("attempts=1"));
    }
}
