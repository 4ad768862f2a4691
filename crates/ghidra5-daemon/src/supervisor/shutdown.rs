use std::time::Duration;
use tokio::sync::watch;

/// Single shutdown signal shared by the supervisor loop and the health
/// monitor. Any in-progress wait (restart delay, monitor sleep, graceful
/// termination wait) wakes as soon as the signal fires rather than at the
/// next polling boundary.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { receiver: rx })
    }

    pub fn is_signaled(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn signaled(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                break;
            }
        }
    }

    /// Sleep for `duration` unless shutdown fires first. Returns true when
    /// the full duration elapsed, false when the sleep was cancelled.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_signaled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.signaled() => false,
        }
    }
}
