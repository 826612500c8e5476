//! Birthday notification scheduler
//!
//! Once per period the scheduler finds every user whose birthday is today,
//! resolves their subscribers and sends each subscriber one notification.
//! A failure for one recipient never stops the rest of the cycle. Missed
//! ticks are not caught up, and a day that already had a cycle is skipped
//! when the period is shorter than a day.

use std::{sync::Arc, time::Duration};

use chrono::{Datelike, Local, NaiveDate};
use common::repositories::UserRepository;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delivery::{DeliveryError, Notifier, birthday_message};

/// Outcome of one notification cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Users whose birthday is today
    pub birthdays: usize,
    pub delivered: usize,
    /// Subscribers without a bound Telegram account
    pub unreachable: usize,
    /// Sends that failed or subscriber lookups that errored
    pub failed: usize,
}

pub struct BirthdayScheduler {
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    period: Duration,
}

impl BirthdayScheduler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
        period: Duration,
    ) -> Self {
        Self {
            users,
            notifier,
            period,
        }
    }

    /// Run a cycle every period until `cancellation_token` fires
    ///
    /// The first cycle runs one full period after start. A cycle in flight
    /// when cancellation arrives is dropped. At most one cycle completes per
    /// calendar day.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!("Starting birthday scheduler, period {:?}", self.period);

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_notified: Option<NaiveDate> = None;

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = interval.tick() => {
                    let today = Local::now().date_naive();
                    if last_notified == Some(today) {
                        debug!("Birthdays for {} were already notified", today);
                        continue;
                    }
                    tokio::select! {
                        _ = cancellation_token.cancelled() => {
                            info!("Dropping in-flight notification cycle");
                            break;
                        }
                        report = self.run_cycle(today) => {
                            info!(?report, "Notification cycle for {} finished", today);
                            last_notified = Some(today);
                        }
                    }
                }
            }
        }

        info!("Birthday scheduler stopped");
    }

    /// Notify every subscriber of every user born on `today`'s month and day
    pub async fn run_cycle(&self, today: NaiveDate) -> CycleReport {
        let mut report = CycleReport::default();

        let birthday_users = match self.users.find_by_birthday(today.month(), today.day()).await {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to fetch users with birthdays on {}: {}", today, e);
                return report;
            }
        };

        if birthday_users.is_empty() {
            debug!("No birthdays on {}", today);
            return report;
        }
        report.birthdays = birthday_users.len();

        for user in birthday_users {
            let subscribers = match self.users.list_subscribers(user.id).await {
                Ok(subscribers) => subscribers,
                Err(e) => {
                    error!("Failed to fetch subscribers of user {}: {}", user.id, e);
                    report.failed += 1;
                    continue;
                }
            };

            if subscribers.is_empty() {
                debug!("User {} has no subscribers", user.id);
                continue;
            }

            let text = birthday_message(&user.display_name());
            for subscriber in subscribers {
                let result = match subscriber.telegram_id {
                    Some(recipient) => self.notifier.send(recipient, &text).await,
                    None => Err(DeliveryError::RecipientUnreachable(subscriber.id)),
                };

                match result {
                    Ok(()) => report.delivered += 1,
                    Err(e @ DeliveryError::RecipientUnreachable(_)) => {
                        warn!("Skipping subscriber of user {}: {}", user.id, e);
                        report.unreachable += 1;
                    }
                    Err(e) => {
                        error!(
                            "Failed to notify user {} about user {}: {}",
                            subscriber.id, user.id, e
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use common::{models::User, repositories::UserRepository};
    use test_utils::{MemoryUserRepository, date, new_user};

    use super::*;

    type Sent = Arc<Mutex<Vec<(i64, String)>>>;

    /// Records every send; sends to `failing` recipients error out
    struct RecordingNotifier {
        sent: Sent,
        failing: Vec<i64>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, recipient: i64, text: &str) -> Result<(), DeliveryError> {
            if self.failing.contains(&recipient) {
                return Err(DeliveryError::Telegram(teloxide::RequestError::Io(
                    std::io::Error::other("connection reset").into(),
                )));
            }
            self.sent.lock().unwrap().push((recipient, text.to_string()));
            Ok(())
        }
    }

    struct TestContext {
        users: Arc<MemoryUserRepository>,
        sent: Sent,
        scheduler: BirthdayScheduler,
    }

    impl TestContext {
        fn new() -> Self {
            Self::with_failing(vec![])
        }

        fn with_failing(failing: Vec<i64>) -> Self {
            let users = Arc::new(MemoryUserRepository::new());
            let sent = Sent::default();
            let notifier = Arc::new(RecordingNotifier {
                sent: sent.clone(),
                failing,
            });
            let scheduler =
                BirthdayScheduler::new(users.clone(), notifier, Duration::from_secs(86_400));
            Self {
                users,
                sent,
                scheduler,
            }
        }

        async fn user(&self, name: &str, birthday: NaiveDate, telegram_id: Option<i64>) -> User {
            let user = self.users.create(&new_user(name, birthday)).await.unwrap();
            if let Some(id) = telegram_id {
                self.users
                    .bind_telegram_account(id, &user.telegram)
                    .await
                    .unwrap();
            }
            user
        }

        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn notifies_subscriber_on_birthday_only() {
        let ctx = TestContext::new();
        let anna = ctx.user("anna", date(1990, 6, 15), None).await;
        let boris = ctx.user("boris", date(1985, 1, 2), Some(200)).await;
        ctx.users.subscribe(anna.id, boris.id).await.unwrap();

        let report = ctx.scheduler.run_cycle(date(2025, 6, 15)).await;
        assert_eq!(report.delivered, 1);
        let sent = ctx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 200);
        assert!(sent[0].1.contains(&anna.display_name()));

        let report = ctx.scheduler.run_cycle(date(2025, 6, 16)).await;
        assert_eq!(report, CycleReport::default());
        assert_eq!(ctx.sent().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_subscriber_does_not_block_others() {
        let ctx = TestContext::new();
        let anna = ctx.user("anna", date(1990, 6, 15), None).await;
        let silent = ctx.user("silent", date(1980, 3, 3), None).await;
        let boris = ctx.user("boris", date(1985, 1, 2), Some(200)).await;
        ctx.users.subscribe(anna.id, silent.id).await.unwrap();
        ctx.users.subscribe(anna.id, boris.id).await.unwrap();

        let report = ctx.scheduler.run_cycle(date(2025, 6, 15)).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.unreachable, 1);
        assert_eq!(ctx.sent().iter().map(|(to, _)| *to).collect::<Vec<_>>(), vec![200]);
    }

    #[tokio::test]
    async fn failed_send_does_not_block_others() {
        let ctx = TestContext::with_failing(vec![300]);
        let anna = ctx.user("anna", date(1990, 6, 15), None).await;
        let carl = ctx.user("carl", date(1980, 3, 3), Some(300)).await;
        let boris = ctx.user("boris", date(1985, 1, 2), Some(200)).await;
        ctx.users.subscribe(anna.id, carl.id).await.unwrap();
        ctx.users.subscribe(anna.id, boris.id).await.unwrap();

        let report = ctx.scheduler.run_cycle(date(2025, 6, 15)).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(ctx.sent()[0].0, 200);
    }

    #[tokio::test]
    async fn users_without_subscribers_are_skipped() {
        let ctx = TestContext::new();
        ctx.user("lonely", date(1990, 6, 15), Some(1)).await;
        let anna = ctx.user("anna", date(1991, 6, 15), None).await;
        let boris = ctx.user("boris", date(1985, 1, 2), Some(200)).await;
        ctx.users.subscribe(anna.id, boris.id).await.unwrap();

        let report = ctx.scheduler.run_cycle(date(2025, 6, 15)).await;

        assert_eq!(report.birthdays, 2);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn each_pair_is_notified_once_per_cycle() {
        let ctx = TestContext::new();
        let anna = ctx.user("anna", date(1990, 6, 15), Some(100)).await;
        let vera = ctx.user("vera", date(1992, 6, 15), Some(101)).await;
        let boris = ctx.user("boris", date(1985, 1, 2), Some(200)).await;
        for owner in [anna.id, vera.id] {
            ctx.users.subscribe(owner, boris.id).await.unwrap();
            ctx.users.subscribe(owner, boris.id).await.unwrap();
        }
        ctx.users.subscribe(anna.id, vera.id).await.unwrap();

        ctx.scheduler.run_cycle(date(2025, 6, 15)).await;

        let mut recipients: Vec<i64> = ctx.sent().iter().map(|(to, _)| *to).collect();
        recipients.sort();
        assert_eq!(recipients, vec![101, 200, 200]);
    }

    #[tokio::test]
    async fn store_outage_ends_cycle_quietly() {
        let ctx = TestContext::new();
        ctx.user("anna", date(1990, 6, 15), None).await;
        ctx.users.set_unavailable(true);

        let report = ctx.scheduler.run_cycle(date(2025, 6, 15)).await;
        assert_eq!(report, CycleReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn run_fires_after_each_period() {
        let ctx = TestContext::new();
        let today = Local::now().date_naive();
        let anna = ctx
            .user("anna", date(1990, today.month(), today.day().min(28)), None)
            .await;
        let boris = ctx.user("boris", date(1985, 1, 2), Some(200)).await;
        ctx.users.subscribe(anna.id, boris.id).await.unwrap();

        let scheduler = Arc::new(BirthdayScheduler::new(
            ctx.users.clone(),
            Arc::new(RecordingNotifier {
                sent: ctx.sent.clone(),
                failing: vec![],
            }),
            Duration::from_secs(60),
        ));
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            let token = token.clone();
            async move { scheduler.run(token).await }
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(ctx.sent().is_empty(), "no cycle before the first period");

        tokio::time::sleep(Duration::from_secs(31)).await;
        let after_first = ctx.sent().len();

        token.cancel();
        handle.await.unwrap();

        if today.day() <= 28 {
            assert_eq!(after_first, 1);
        }
    }

    #[tokio::test]
    async fn unsubscribed_user_is_not_notified() {
        let ctx = TestContext::new();
        let anna = ctx.user("anna", date(1990, 6, 15), None).await;
        let boris = ctx.user("boris", date(1985, 1, 2), Some(200)).await;
        ctx.users.subscribe(anna.id, boris.id).await.unwrap();
        ctx.users.unsubscribe(anna.id, boris.id).await.unwrap();
        assert!(ctx.users.list_subscribers(anna.id).await.unwrap().is_empty());

        let report = ctx.scheduler.run_cycle(date(2025, 6, 15)).await;

        assert_eq!(report.birthdays, 1);
        assert_eq!(report.delivered, 0);
        assert!(ctx.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn short_period_notifies_once_per_day() {
        let ctx = TestContext::new();
        let today = Local::now().date_naive();
        let anna = ctx
            .user("anna", date(1990, today.month(), today.day().min(28)), None)
            .await;
        let boris = ctx.user("boris", date(1985, 1, 2), Some(200)).await;
        ctx.users.subscribe(anna.id, boris.id).await.unwrap();

        let scheduler = Arc::new(BirthdayScheduler::new(
            ctx.users.clone(),
            Arc::new(RecordingNotifier {
                sent: ctx.sent.clone(),
                failing: vec![],
            }),
            Duration::from_secs(60),
        ));
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            let token = token.clone();
            async move { scheduler.run(token).await }
        });

        // Five ticks on the same wall-clock day
        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        token.cancel();
        handle.await.unwrap();

        let still_today = Local::now().date_naive() == today;
        if today.day() <= 28 && still_today {
            assert_eq!(ctx.sent().len(), 1);
        }
        assert!(ctx.sent().len() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop_promptly() {
        let ctx = TestContext::new();
        let scheduler = Arc::new(ctx.scheduler);
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            let token = token.clone();
            async move { scheduler.run(token).await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop within the timeout")
            .unwrap();
    }
}
