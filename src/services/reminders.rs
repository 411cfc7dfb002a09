//! Reminders service
//!
//! Single process-wide background scan over all records, fixed 60 s
//! period, independent of any open view. The scan runs inline in the
//! interval loop, so a tick always completes, persists included, before
//! the next scan begins. Marking goes through the same serialized
//! merge-and-persist path foreground saves use, which is what keeps a
//! scan from clobbering (or being clobbered by) a concurrent edit.
//!
//! Delivery is at most once: a due reminder is consumed even when the
//! notifier fails or permission is missing. That is a recorded design
//! choice, not an accident.

use crate::config::REMINDER_SCAN_PERIOD_SECS;
use crate::database::ProblemPatch;
use crate::error::{AppError, Result};
use crate::notify::Notifier;
use crate::services::problems::{EngineEvent, ProblemService};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct ReminderScheduler {
    problems: ProblemService,
    notifier: Arc<dyn Notifier>,
}

impl ReminderScheduler {
    pub fn new(problems: ProblemService, notifier: Arc<dyn Notifier>) -> Self {
        Self { problems, notifier }
    }

    /// Spawn the background scan loop. The first tick fires immediately,
    /// which at startup runs against a still-opening store and defers.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting reminder scheduler");

            let mut interval =
                tokio::time::interval(Duration::from_secs(REMINDER_SCAN_PERIOD_SECS));

            loop {
                interval.tick().await;

                if let Err(e) = self.scan().await {
                    tracing::error!("Error scanning reminders: {}", e);
                }
            }
        })
    }

    /// One scan pass: notify and mark every newly-due reminder.
    pub async fn scan(&self) -> Result<()> {
        let problems = match self.problems.list().await {
            Ok(problems) => problems,
            Err(AppError::StoreUnavailable) => {
                tracing::debug!("Store not ready, skipping reminder scan");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();

        for candidate in problems {
            if !candidate.reminder_due(now) {
                continue;
            }

            // Re-read through the session-aware path and re-check right
            // before acting: a foreground edit may have moved or cleared
            // the reminder since this scan's snapshot.
            let latest = match self.problems.latest(&candidate.id).await {
                Ok(latest) => latest,
                Err(AppError::ProblemNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if !latest.reminder_due(now) {
                continue;
            }

            tracing::info!(
                "Triggering reminder for problem {} ({})",
                latest.id,
                latest.title
            );

            if let Err(e) = self
                .notifier
                .notify("Problem Reminder", &format!("Time to review: {}", latest.title))
            {
                // Delivery failure still consumes the reminder.
                tracing::error!("Failed to send notification: {}", e);
            }

            self.problems
                .apply_patch(
                    &latest.id,
                    ProblemPatch {
                        reminder_notified: Some(true),
                        ..Default::default()
                    },
                )
                .await?;

            self.problems.emit(EngineEvent::ReminderTriggered {
                problem_id: latest.id.clone(),
                title: latest.title.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Store;
    use crate::error::AppError;
    use crate::notify::NotificationPermission;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records deliveries; optionally fails every one of them.
    #[derive(Default)]
    struct MockNotifier {
        delivered: AtomicUsize,
        fail: bool,
    }

    impl MockNotifier {
        fn failing() -> Self {
            Self {
                delivered: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn count(&self) -> usize {
            self.delivered.load(Ordering::Relaxed)
        }
    }

    impl Notifier for MockNotifier {
        fn permission(&self) -> NotificationPermission {
            NotificationPermission::Granted
        }

        fn notify(&self, _title: &str, _body: &str) -> crate::error::Result<()> {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(AppError::Notification("delivery failed".to_string()));
            }
            Ok(())
        }
    }

    async fn create_test_setup(
        notifier: Arc<MockNotifier>,
    ) -> (ProblemService, ReminderScheduler) {
        let store = Store::new();
        store.open_in_memory().await.unwrap();

        let problems = ProblemService::new(store);
        let scheduler = ReminderScheduler::new(problems.clone(), notifier);

        (problems, scheduler)
    }

    #[tokio::test]
    async fn test_due_reminder_fires_exactly_once() {
        let notifier = Arc::new(MockNotifier::default());
        let (problems, scheduler) = create_test_setup(Arc::clone(&notifier)).await;

        let problem = problems.create("Two Sum", None).await.unwrap();
        problems
            .apply_patch(
                &problem.id,
                ProblemPatch {
                    reminder: Some(Some(Utc::now() - ChronoDuration::seconds(1))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        scheduler.scan().await.unwrap();
        assert_eq!(notifier.count(), 1);

        let stored = problems.get(&problem.id).await.unwrap();
        assert!(stored.reminder_notified);

        // A second immediate tick must not fire again.
        scheduler.scan().await.unwrap();
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_future_reminder_does_not_fire() {
        let notifier = Arc::new(MockNotifier::default());
        let (problems, scheduler) = create_test_setup(Arc::clone(&notifier)).await;

        let problem = problems.create("Later", None).await.unwrap();
        problems
            .apply_patch(
                &problem.id,
                ProblemPatch {
                    reminder: Some(Some(Utc::now() + ChronoDuration::hours(1))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        scheduler.scan().await.unwrap();
        assert_eq!(notifier.count(), 0);
        assert!(!problems.get(&problem.id).await.unwrap().reminder_notified);
    }

    #[tokio::test]
    async fn test_failed_delivery_still_consumes_reminder() {
        let notifier = Arc::new(MockNotifier::failing());
        let (problems, scheduler) = create_test_setup(Arc::clone(&notifier)).await;

        let problem = problems.create("Flaky", None).await.unwrap();
        problems
            .apply_patch(
                &problem.id,
                ProblemPatch {
                    reminder: Some(Some(Utc::now() - ChronoDuration::minutes(5))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        scheduler.scan().await.unwrap();
        assert_eq!(notifier.count(), 1);
        assert!(problems.get(&problem.id).await.unwrap().reminder_notified);

        scheduler.scan().await.unwrap();
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_rearmed_reminder_fires_again() {
        let notifier = Arc::new(MockNotifier::default());
        let (problems, scheduler) = create_test_setup(Arc::clone(&notifier)).await;

        let problem = problems.create("Re-arm", None).await.unwrap();
        problems
            .apply_patch(
                &problem.id,
                ProblemPatch {
                    reminder: Some(Some(Utc::now() - ChronoDuration::seconds(10))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        scheduler.scan().await.unwrap();
        assert_eq!(notifier.count(), 1);

        // Moving the reminder resets delivery; once due, it fires again.
        problems
            .apply_patch(
                &problem.id,
                ProblemPatch {
                    reminder: Some(Some(Utc::now() - ChronoDuration::seconds(5))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        scheduler.scan().await.unwrap();
        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn test_scan_defers_on_unready_store() {
        let notifier = Arc::new(MockNotifier::default());
        let store = Store::new();
        let problems = ProblemService::new(store.clone());
        let scheduler = ReminderScheduler::new(problems, notifier.clone());

        // No store yet: the scan skips quietly instead of failing.
        scheduler.scan().await.unwrap();
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_scan_marks_open_session_current_record() {
        let notifier = Arc::new(MockNotifier::default());
        let (problems, scheduler) = create_test_setup(Arc::clone(&notifier)).await;

        let problem = problems.create("Open view", None).await.unwrap();
        let open = problems.open(&problem.id).await.unwrap();
        open.set_reminder(Some(Utc::now() - ChronoDuration::seconds(1)))
            .await
            .unwrap();

        let mut events = problems.subscribe();
        scheduler.scan().await.unwrap();

        // The foreground view's cached record reflects the delivery.
        assert!(open.snapshot().await.reminder_notified);

        let event = events.try_recv().unwrap();
        let EngineEvent::ReminderTriggered { problem_id, title } = event;
        assert_eq!(problem_id, problem.id);
        assert_eq!(title, "Open view");

        open.close().await;
    }
}
