use async_trait::async_trait;
use std::time::Duration;

/// Time source for the refresh loop, injectable so tests never wait.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, period: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}
