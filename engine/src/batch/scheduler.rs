use std::time::Duration;

use async_stream::stream;
use tokio_stream::Stream;

use crate::batch::{GenerationResult, WorkItem};

/// Decides when each item's job runs. The per-item work itself is opaque to
/// the scheduler, so a bounded-concurrency strategy can replace the sequential
/// one without touching generation code.
pub trait Scheduler {
    /// Results must come out in item order, exactly one per item.
    fn schedule<'a, F, Fut>(
        &'a self,
        items: &'a [WorkItem],
        job: F,
    ) -> impl Stream<Item = GenerationResult> + 'a
    where
        F: Fn(&'a WorkItem) -> Fut + 'a,
        Fut: Future<Output = GenerationResult> + 'a;
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

/// One item at a time with a fixed pause between consecutive attempts.
/// There is no pause after the last item.
#[derive(Debug, Clone)]
pub struct RateLimitedSequential<S = TokioSleeper> {
    delay: Duration,
    sleeper: S,
}

impl RateLimitedSequential {
    pub fn new(delay: Duration) -> Self {
        Self::with_sleeper(delay, TokioSleeper)
    }
}

impl<S> RateLimitedSequential<S> {
    pub fn with_sleeper(delay: Duration, sleeper: S) -> Self {
        Self { delay, sleeper }
    }
}

impl<S: Sleeper> Scheduler for RateLimitedSequential<S> {
    fn schedule<'a, F, Fut>(
        &'a self,
        items: &'a [WorkItem],
        job: F,
    ) -> impl Stream<Item = GenerationResult> + 'a
    where
        F: Fn(&'a WorkItem) -> Fut + 'a,
        Fut: Future<Output = GenerationResult> + 'a,
    {
        stream! {
            for (i, item) in items.iter().enumerate() {
                if i > 0 && !self.delay.is_zero() {
                    self.sleeper.sleep(self.delay).await;
                }
                yield job(item).await;
            }
        }
    }
}
