//! Deadline monitor and recurring quest scheduler
//!
//! All coordination lives in durable flags on the deadline and schedule
//! rows, so repeated polls and restarts never warn, expire or create twice.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::quest::{TemplateOverrides, build_quest, template_quest};
use super::templates;
use crate::config::SchedulerConfig;
use crate::data::{Database, EntityId, Quest, QuestDeadline, RecurrenceInterval, RecurringQuest};
use crate::error::AppError;

/// Longest deadline a quest may be given, in hours (one year)
pub const MAX_DEADLINE_HOURS: i64 = 24 * 365;

/// Largest multiplier accepted for a recurring schedule
pub const MAX_INTERVAL_VALUE: i64 = 365;

/// Receives scheduler events for delivery to members
#[cfg_attr(test, mockall::automock)]
pub trait SchedulerNotifier: Send + Sync {
    fn deadline_warning(&self, quest_id: &str, remaining: Duration);

    fn quest_expired(&self, quest_id: &str);

    fn recurring_created(&self, schedule_id: &str, quest: &Quest);
}

/// Default notifier that emits structured log events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl SchedulerNotifier for TracingNotifier {
    fn deadline_warning(&self, quest_id: &str, remaining: Duration) {
        tracing::warn!(
            quest_id,
            hours = remaining.num_hours(),
            minutes = remaining.num_minutes() % 60,
            "Quest deadline approaching"
        );
    }

    fn quest_expired(&self, quest_id: &str) {
        tracing::info!(quest_id, "Quest expired");
    }

    fn recurring_created(&self, schedule_id: &str, quest: &Quest) {
        tracing::info!(
            schedule_id,
            quest_id = %quest.quest_id,
            guild_id = quest.guild_id,
            "Recurring quest instance created"
        );
    }
}

/// What one deadline pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeadlineReport {
    pub warnings_sent: usize,
    pub quests_expired: usize,
}

/// Quest scheduler
pub struct QuestScheduler {
    db: Arc<Database>,
    notifier: Arc<dyn SchedulerNotifier>,
    warning_lead: Duration,
}

impl QuestScheduler {
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<dyn SchedulerNotifier>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            db,
            notifier,
            warning_lead: Duration::try_minutes(config.warning_lead_minutes)
                .unwrap_or(Duration::MAX),
        }
    }

    // =========================================================================
    // Deadlines
    // =========================================================================

    pub async fn set_quest_deadline(
        &self,
        quest_id: &str,
        hours: i64,
    ) -> Result<QuestDeadline, AppError> {
        self.set_quest_deadline_at(quest_id, hours, Utc::now()).await
    }

    /// Give a quest a deadline `hours` from `now`
    ///
    /// Replacing a deadline re-arms its warning and expiry.
    pub async fn set_quest_deadline_at(
        &self,
        quest_id: &str,
        hours: i64,
        now: DateTime<Utc>,
    ) -> Result<QuestDeadline, AppError> {
        if hours <= 0 {
            return Err(AppError::Validation(
                "Deadline must be at least one hour away".to_string(),
            ));
        }
        if hours > MAX_DEADLINE_HOURS {
            return Err(AppError::Validation(format!(
                "Deadline must be at most {MAX_DEADLINE_HOURS} hours away"
            )));
        }
        let deadline = Duration::try_hours(hours)
            .and_then(|offset| now.checked_add_signed(offset))
            .ok_or_else(|| AppError::Validation("Deadline is out of range".to_string()))?;

        self.db
            .get_quest(quest_id)
            .await?
            .ok_or(AppError::NotFound)?;

        self.db.upsert_deadline(quest_id, deadline).await?;
        tracing::info!(quest_id, %deadline, "Quest deadline set");

        Ok(QuestDeadline {
            quest_id: quest_id.to_string(),
            deadline,
            warning_sent: false,
            expired: false,
        })
    }

    pub async fn clear_quest_deadline(&self, quest_id: &str) -> Result<bool, AppError> {
        self.db.delete_deadline(quest_id).await
    }

    pub async fn get_quest_deadline(&self, quest_id: &str) -> Result<Option<QuestDeadline>, AppError> {
        self.db.get_deadline(quest_id).await
    }

    /// Warn on deadlines inside the lead window and expire passed ones
    ///
    /// An expired quest is cancelled in the same transaction that sets its
    /// expired flag. Each warning and expiry is notified at most once.
    pub async fn check_deadlines(&self, now: DateTime<Utc>) -> Result<DeadlineReport, AppError> {
        let mut report = DeadlineReport::default();

        for deadline in self.db.get_pending_deadlines().await? {
            let remaining = deadline.deadline - now;

            if remaining <= self.warning_lead
                && !deadline.warning_sent
                && self.db.claim_deadline_warning(&deadline.quest_id).await?
            {
                self.notifier.deadline_warning(&deadline.quest_id, remaining);
                crate::metrics::record_deadline_event("warning");
                report.warnings_sent += 1;
            }

            if remaining <= Duration::zero() && self.db.expire_deadline(&deadline.quest_id).await? {
                self.notifier.quest_expired(&deadline.quest_id);
                crate::metrics::record_deadline_event("expired");
                report.quests_expired += 1;
            }
        }

        Ok(report)
    }

    // =========================================================================
    // Recurring quests
    // =========================================================================

    pub async fn create_recurring_quest(
        &self,
        template_id: &str,
        guild_id: i64,
        creator_id: i64,
        interval: RecurrenceInterval,
        interval_value: i64,
    ) -> Result<RecurringQuest, AppError> {
        self.create_recurring_quest_at(
            template_id,
            guild_id,
            creator_id,
            interval,
            interval_value,
            Utc::now(),
        )
        .await
    }

    /// Start a schedule; the first instance is due one interval after `now`
    ///
    /// # Errors
    /// * `NotFound` - unknown template
    /// * `Validation` - interval value outside `1..=MAX_INTERVAL_VALUE`
    pub async fn create_recurring_quest_at(
        &self,
        template_id: &str,
        guild_id: i64,
        creator_id: i64,
        interval: RecurrenceInterval,
        interval_value: i64,
        now: DateTime<Utc>,
    ) -> Result<RecurringQuest, AppError> {
        if templates::get_template(template_id).is_none() {
            return Err(AppError::NotFound);
        }
        if interval_value < 1 {
            return Err(AppError::Validation(
                "Interval value must be at least 1".to_string(),
            ));
        }
        if interval_value > MAX_INTERVAL_VALUE {
            return Err(AppError::Validation(format!(
                "Interval value must be at most {MAX_INTERVAL_VALUE}"
            )));
        }

        let schedule = RecurringQuest {
            id: EntityId::new().0,
            template_id: template_id.to_string(),
            guild_id,
            creator_id,
            interval,
            interval_value,
            last_created: Some(now),
            is_active: true,
        };
        self.db.insert_recurring_quest(&schedule).await?;

        tracing::info!(
            schedule_id = %schedule.id,
            template_id,
            guild_id,
            interval = %interval,
            interval_value,
            "Recurring quest scheduled"
        );
        Ok(schedule)
    }

    /// # Returns
    /// `false` if no active schedule with that ID exists in the guild
    pub async fn deactivate_recurring_quest(&self, id: &str, guild_id: i64) -> Result<bool, AppError> {
        self.db.deactivate_recurring_quest(id, guild_id).await
    }

    pub async fn list_recurring_quests(&self, guild_id: i64) -> Result<Vec<RecurringQuest>, AppError> {
        self.db.list_recurring_quests(guild_id).await
    }

    /// Create one instance for every schedule whose interval has elapsed
    ///
    /// # Returns
    /// Number of quests created
    pub async fn check_recurring_quests(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let mut created = 0;

        for schedule in self.db.get_active_recurring_quests().await? {
            let Some(last_created) = schedule.last_created else {
                continue;
            };
            let Some(due) = schedule.next_due_after(last_created) else {
                tracing::warn!(
                    schedule_id = %schedule.id,
                    interval = %schedule.interval,
                    interval_value = schedule.interval_value,
                    "Skipping recurring quest with out-of-range interval"
                );
                continue;
            };
            if now < due {
                continue;
            }

            let new_quest = match template_quest(
                &schedule.template_id,
                TemplateOverrides::default(),
                schedule.creator_id,
                schedule.guild_id,
            ) {
                Ok(new_quest) => new_quest,
                Err(error) => {
                    tracing::warn!(
                        schedule_id = %schedule.id,
                        template_id = %schedule.template_id,
                        %error,
                        "Skipping recurring quest with unusable template"
                    );
                    continue;
                }
            };
            let instance = build_quest(new_quest, now)?;

            if self
                .db
                .advance_recurring_quest(&schedule.id, schedule.last_created, now, &instance)
                .await?
            {
                self.notifier.recurring_created(&schedule.id, &instance);
                crate::metrics::record_deadline_event("recurring_created");
                created += 1;
            }
        }

        Ok(created)
    }

    // =========================================================================
    // Background loop
    // =========================================================================

    /// Run both checks once, logging failures instead of returning them
    pub async fn run_once(&self, now: DateTime<Utc>) {
        match self.check_deadlines(now).await {
            Ok(report) => {
                crate::metrics::record_scheduler_run("deadlines", "success");
                if report != DeadlineReport::default() {
                    tracing::info!(
                        warnings_sent = report.warnings_sent,
                        quests_expired = report.quests_expired,
                        "Deadline check completed"
                    );
                }
            }
            Err(e) => {
                crate::metrics::record_scheduler_run("deadlines", "error");
                tracing::error!(error = %e, "Deadline check failed");
            }
        }

        match self.check_recurring_quests(now).await {
            Ok(created) => {
                crate::metrics::record_scheduler_run("recurring", "success");
                if created > 0 {
                    tracing::info!(created, "Recurring quest check completed");
                }
            }
            Err(e) => {
                crate::metrics::record_scheduler_run("recurring", "error");
                tracing::error!(error = %e, "Recurring quest check failed");
            }
        }
    }

    /// Poll forever at `period`
    pub async fn run(self: Arc<Self>, period: std::time::Duration) {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            tracing::debug!("Running scheduled quest checks...");
            self.run_once(Utc::now()).await;
        }
    }
}
