use crate::domain::ports::Notifier;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 4;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    /// `(recipient, reason)` for every delivery that did not go through.
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fans one message out to many recipients with a bounded number of sends in
/// flight. `dispatch` returns only after every send has finished.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    permits: Arc<Semaphore>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, max_concurrent: usize) -> Self {
        Self {
            notifier,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn dispatch(
        &self,
        recipients: &[String],
        text: &str,
        cancel: &CancellationToken,
    ) -> DispatchReport {
        let text: Arc<str> = Arc::from(text);
        let mut tasks = JoinSet::new();

        for recipient in recipients {
            let notifier = self.notifier.clone();
            let permits = self.permits.clone();
            let cancel = cancel.clone();
            let recipient = recipient.clone();
            let text = text.clone();

            tasks.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err("cancelled".to_string()),
                    permit = permits.acquire_owned() => match permit {
                        Ok(_permit) => notifier.send(&recipient, &text).await.map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    },
                };
                (recipient, outcome)
            });
        }

        let mut report = DispatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.sent += 1,
                Ok((recipient, Err(reason))) => {
                    tracing::warn!(%recipient, %reason, "Notification not delivered");
                    report.failed.push((recipient, reason));
                }
                Err(e) => tracing::error!(error = %e, "Notification task aborted"),
            }
        }

        tracing::info!(sent = report.sent, failed = report.failed.len(), "📨 Notifications dispatched");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{MenuError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        delivered: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, recipient: &str, _text: &str) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if recipient == "blocked" {
                return Err(MenuError::HttpStatus {
                    url: "http://chat/".to_string(),
                    status: 403,
                });
            }
            self.delivered.lock().unwrap().push(recipient.to_string());
            Ok(())
        }
    }

    fn recipients(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chat-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_dispatch_is_bounded_and_awaited() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new(notifier.clone(), 2);

        let report = dispatcher
            .dispatch(&recipients(7), "Меню", &CancellationToken::new())
            .await;

        assert_eq!(report.sent, 7);
        assert!(report.is_complete());
        assert_eq!(notifier.delivered.lock().unwrap().len(), 7);
        assert!(notifier.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failures_are_reported() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new(notifier, 4);
        let mut targets = recipients(2);
        targets.push("blocked".to_string());

        let report = dispatcher
            .dispatch(&targets, "Меню", &CancellationToken::new())
            .await;

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "blocked");
        assert!(report.failed[0].1.contains("403"));
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_sends_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new(notifier.clone(), 4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = dispatcher.dispatch(&recipients(3), "Меню", &cancel).await;

        assert_eq!(report.sent, 0);
        assert_eq!(report.failed.len(), 3);
        assert!(notifier.delivered.lock().unwrap().is_empty());
    }
}
