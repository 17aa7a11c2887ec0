/// Drop-cancelled subscription handle.
///
/// Wraps a watch channel fed by a background task. Dropping the handle
/// aborts the task, so a defunct view can never receive another
/// snapshot or leak its callback.
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct Subscription<T> {
    rx: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T: Clone> Subscription<T> {
    pub fn new(rx: watch::Receiver<T>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Latest published snapshot.
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Waits for the next snapshot. Returns false once the producing
    /// task is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Extra receiver for a second consumer of the same feed.
    pub fn receiver(&self) -> watch::Receiver<T> {
        self.rx.clone()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drop_cancels_producer() {
        let (tx, rx) = watch::channel(0u32);
        let task = tokio::spawn(async move {
            let mut n = 0;
            loop {
                tokio::time::sleep(Duration::from_millis(5)).await;
                n += 1;
                if tx.send(n).is_err() {
                    return;
                }
            }
        });

        let mut sub = Subscription::new(rx, task);
        assert!(sub.changed().await);
        assert!(sub.current() >= 1);

        let mut extra = sub.receiver();
        drop(sub);

        // Producer is aborted; the extra receiver sees the channel close.
        let closed = tokio::time::timeout(Duration::from_secs(1), async {
            while extra.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
