/*
[INPUT]:  Retry delays from the reconnection policy
[OUTPUT]: A single cancellable pending wake-up
[POS]:    Connection layer - retry timer owned by the connection worker
[UPDATE]: When changing timer semantics
*/

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep};

/// At most one armed timer at a time.
#[derive(Debug, Default)]
pub struct RetryTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. Refuses (returns false) while another wake-up is pending.
    pub fn arm(&mut self, delay: Duration) -> bool {
        if self.sleep.is_some() {
            return false;
        }
        self.sleep = Some(Box::pin(sleep(delay)));
        true
    }

    /// Cancel the pending wake-up, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|sleep| sleep.deadline())
    }

    /// Resolves when the armed timer fires, disarming it. Pends forever if unarmed.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => pending::<()>().await,
        }
    }
}
