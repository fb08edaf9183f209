use core::{future::Future, pin::Pin, time::Duration};

/// How the allocator waits on its blocking path.
///
/// Waiting happens only when a segment is exhausted and no standby is ready:
/// between failed refill attempts (linear backoff) and while another caller's
/// refill is in flight. Swapping the provider changes that wait without
/// touching the dispensing path.
pub trait SleepProvider {
    /// Must be `Send` so `next_id` futures can move between worker threads.
    type Sleep: Future<Output = ()> + Send;

    fn sleep_for(dur: Duration) -> Self::Sleep;
}

/// Waits the full backoff on Tokio's timer. The default provider.
pub struct TokioSleep;

impl SleepProvider for TokioSleep {
    type Sleep = tokio::time::Sleep;

    fn sleep_for(dur: Duration) -> Self::Sleep {
        tokio::time::sleep(dur)
    }
}

/// Ignores the requested delay and only yields to the Tokio scheduler.
///
/// Retries against an unavailable store then happen back to back, so a
/// switch fails within microseconds instead of waiting out the backoff. Suits
/// callers that run their own retry policy above `next_id`.
pub struct TokioYield;

impl SleepProvider for TokioYield {
    // `yield_now()` returns an unnameable future.
    type Sleep = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn sleep_for(_dur: Duration) -> Self::Sleep {
        Box::pin(tokio::task::yield_now())
    }
}
