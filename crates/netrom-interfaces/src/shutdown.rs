//! Stop signalling and task bookkeeping shared by connectors.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Coordinates the background tasks of one connector.
///
/// Tasks hold a receiver from [`subscribe`](Self::subscribe) and leave their
/// `select!` loop when it flips to `true`. [`stop`](Self::stop) signals and
/// then awaits every registered task.
pub struct ShutdownToken {
    stop_tx: watch::Sender<bool>,
    online: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx,
            online: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Track a spawned task. Finished handles are pruned on the way.
    pub fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Flip the stop signal and mark the connector offline. Idempotent.
    pub fn signal_stop(&self) {
        self.stop_tx.send_replace(true);
        self.set_online(false);
    }

    /// Signal, then await every tracked task. Join errors are ignored.
    pub async fn stop(&self) {
        self.signal_stop();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Clear the stop signal so the connector can be started again.
    pub fn rearm(&self) {
        self.stop_tx.send_replace(false);
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_offline_and_running() {
        let token = ShutdownToken::new();
        assert!(!token.is_online());
        assert!(!token.is_stopped());
        token.set_online(true);
        assert!(token.is_online());
    }

    #[test]
    fn signal_stop_is_idempotent() {
        let token = ShutdownToken::new();
        token.set_online(true);
        token.signal_stop();
        token.signal_stop();
        assert!(token.is_stopped());
        assert!(!token.is_online());
    }

    #[tokio::test]
    async fn subscribers_see_stop() {
        let token = ShutdownToken::new();
        let mut rx = token.subscribe();
        token.signal_stop();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn stop_joins_tracked_tasks() {
        let token = ShutdownToken::new();
        for _ in 0..3 {
            let mut rx = token.subscribe();
            token.track(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(60)) => {}
                        _ = rx.changed() => break,
                    }
                }
            }));
        }
        assert_eq!(token.task_count(), 3);

        tokio::time::timeout(Duration::from_secs(2), token.stop())
            .await
            .expect("tasks should exit on stop");
        assert_eq!(token.task_count(), 0);
    }

    #[tokio::test]
    async fn rearm_clears_stop() {
        let token = ShutdownToken::new();
        token.signal_stop();
        token.rearm();
        assert!(!token.is_stopped());
    }

    #[tokio::test]
    async fn finished_tasks_are_pruned() {
        let token = ShutdownToken::new();
        let done = tokio::spawn(async {});
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.track(done);
        let mut rx = token.subscribe();
        token.track(tokio::spawn(async move {
            let _ = rx.changed().await;
        }));
        assert_eq!(token.task_count(), 1);
        token.stop().await;
    }
}
