//! Clock/scheduler seam so reply and keepalive timers can be driven by the
//! real tokio clock in production and by `tokio::time::pause`/`advance` in
//! tests, without the kernel caring which.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub trait Scheduler: Send + Sync {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// The production scheduler: plain `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}
