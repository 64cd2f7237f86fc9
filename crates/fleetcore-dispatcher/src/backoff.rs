//! Track errors and successes to enable backing off Store-polling retries.
use std::time::Duration;

use anyhow::Error;
use anyhow::Result;
use fleetcore_context::Context;

use crate::conf::DispatcherBackoff;

/// Incrementally delay retries after errors, reset on success. Used around
/// the dispatcher's Store polling, not around action execution itself
/// (action failures are terminal status transitions, not retried in place).
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
    max_retries: u16,
    multiplier: u32,
    seen: u16,
    start_delay: Duration,
}

impl Backoff {
    pub fn new(conf: &DispatcherBackoff) -> Backoff {
        let start_delay = Duration::from_millis(conf.start_delay_ms);
        Backoff {
            delay: start_delay,
            max_delay: Duration::from_secs(conf.max_delay_secs),
            max_retries: conf.max_retries,
            multiplier: conf.multiplier,
            seen: 0,
            start_delay,
        }
    }

    pub async fn retry(&mut self, context: &Context, error: Error) -> Result<()> {
        self.seen += 1;
        if self.seen > self.max_retries {
            return Err(error.context("dispatcher Store polling retries exceeded"));
        }
        slog::warn!(context.logger, "Dispatcher Store poll failed, retrying"; "error" => error.to_string());
        tokio::time::sleep(self.delay).await;
        self.delay = std::cmp::min(self.delay * self.multiplier, self.max_delay);
        Ok(())
    }

    pub fn success(&mut self) {
        self.delay = self.start_delay;
        self.seen = 0;
    }
}
