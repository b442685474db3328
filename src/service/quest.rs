//! Quest lifecycle service
//!
//! Owns the per-user state machine:
//! `accepted -> completed -> approved | rejected`, and `rejected -> accepted`
//! once the rejection cooldown has run out. Permission checks happen in the
//! caller; this service trusts it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::templates;
use crate::config::LifecycleConfig;
use crate::data::{
    Database, EntityId, NewQuest, PendingApproval, ProgressStatus, Quest, QuestProgress,
    QuestStatus,
};
use crate::error::AppError;

/// Caller-supplied replacements when creating a quest from a template
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub reward: Option<String>,
    /// Placeholder values such as `target` or `amount`
    #[serde(default)]
    pub values: HashMap<String, String>,
    #[serde(default)]
    pub required_role_ids: Vec<i64>,
}

/// Build a persisted-ready quest from creation input
pub(crate) fn build_quest(new_quest: NewQuest, now: DateTime<Utc>) -> Result<Quest, AppError> {
    let title = new_quest.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Quest title must not be empty".to_string()));
    }

    Ok(Quest {
        quest_id: EntityId::new().0,
        title: title.to_string(),
        description: new_quest.description,
        creator_id: new_quest.creator_id,
        guild_id: new_quest.guild_id,
        requirements: new_quest.requirements,
        reward: new_quest.reward,
        rank: new_quest.rank,
        category: new_quest.category,
        status: QuestStatus::Available,
        created_at: now,
        required_role_ids: new_quest.required_role_ids,
    })
}

/// Creation input for a template with overrides applied
pub(crate) fn template_quest(
    template_id: &str,
    overrides: TemplateOverrides,
    creator_id: i64,
    guild_id: i64,
) -> Result<NewQuest, AppError> {
    let applied =
        templates::apply_template(template_id, &overrides.values).ok_or(AppError::NotFound)?;

    Ok(NewQuest {
        title: overrides.title.unwrap_or(applied.title),
        description: overrides.description.unwrap_or(applied.description),
        creator_id,
        guild_id,
        requirements: overrides.requirements.unwrap_or(applied.requirements),
        reward: overrides.reward.unwrap_or(applied.reward),
        rank: applied.rank,
        category: applied.category,
        required_role_ids: overrides.required_role_ids,
    })
}

/// Quest lifecycle service
pub struct QuestService {
    db: Arc<Database>,
    cooldown: Duration,
}

impl QuestService {
    /// Create new quest service
    pub fn new(db: Arc<Database>, lifecycle: &LifecycleConfig) -> Self {
        Self {
            db,
            cooldown: Duration::try_hours(lifecycle.cooldown_hours).unwrap_or(Duration::MAX),
        }
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    pub async fn create_quest(&self, new_quest: NewQuest) -> Result<Quest, AppError> {
        self.create_quest_at(new_quest, Utc::now()).await
    }

    /// Create a quest in status `available`
    ///
    /// # Errors
    /// `Validation` if the trimmed title is empty
    pub async fn create_quest_at(
        &self,
        new_quest: NewQuest,
        now: DateTime<Utc>,
    ) -> Result<Quest, AppError> {
        let quest = build_quest(new_quest, now)?;
        self.db.insert_quest(&quest).await?;

        tracing::info!(
            quest_id = %quest.quest_id,
            guild_id = quest.guild_id,
            creator_id = quest.creator_id,
            "Quest created"
        );
        Ok(quest)
    }

    /// Create a quest from a built-in template
    ///
    /// # Errors
    /// `NotFound` if the template does not exist
    pub async fn create_quest_from_template(
        &self,
        template_id: &str,
        overrides: TemplateOverrides,
        creator_id: i64,
        guild_id: i64,
    ) -> Result<Quest, AppError> {
        let new_quest = template_quest(template_id, overrides, creator_id, guild_id)?;
        self.create_quest(new_quest).await
    }

    pub async fn get_quest(&self, quest_id: &str) -> Result<Quest, AppError> {
        self.db.get_quest(quest_id).await?.ok_or(AppError::NotFound)
    }

    /// Tenant-scoped lookup; a quest of another guild is reported as absent
    pub async fn get_quest_in_guild(&self, quest_id: &str, guild_id: i64) -> Result<Quest, AppError> {
        let quest = self.get_quest(quest_id).await?;
        if quest.guild_id != guild_id {
            return Err(AppError::NotFound);
        }
        Ok(quest)
    }

    pub async fn get_available_quests(&self, guild_id: i64) -> Result<Vec<Quest>, AppError> {
        self.db.get_available_quests(guild_id).await
    }

    pub async fn get_guild_quests(&self, guild_id: i64) -> Result<Vec<Quest>, AppError> {
        self.db.get_guild_quests(guild_id).await
    }

    /// Delete a quest and everything attached to it
    ///
    /// # Returns
    /// `false` if the quest did not exist
    pub async fn delete_quest(&self, quest_id: &str) -> Result<bool, AppError> {
        let deleted = self.db.delete_quest(quest_id).await?;
        if deleted {
            tracing::info!(quest_id, "Quest deleted");
        }
        Ok(deleted)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub async fn accept_quest(
        &self,
        quest_id: &str,
        user_id: i64,
        user_role_ids: &[i64],
        channel_id: Option<i64>,
    ) -> Result<QuestProgress, AppError> {
        self.accept_quest_at(quest_id, user_id, user_role_ids, channel_id, Utc::now())
            .await
    }

    /// Accept a quest for a user
    ///
    /// Checks run in order and the first failure wins: the quest exists,
    /// it is available, the user has no blocking progress row, and the
    /// role gate passes.
    ///
    /// # Errors
    /// * `NotFound` - unknown quest
    /// * `NotAvailable` - quest status is not `available`
    /// * `AlreadyActive` - progress is accepted, completed or approved, or a
    ///   concurrent accept won
    /// * `CooldownActive` - rejected less than the cooldown ago
    /// * `MissingRole` - none of the required roles held
    pub async fn accept_quest_at(
        &self,
        quest_id: &str,
        user_id: i64,
        user_role_ids: &[i64],
        channel_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<QuestProgress, AppError> {
        let result = self
            .try_accept(quest_id, user_id, user_role_ids, channel_id, now)
            .await;

        match &result {
            Ok(progress) => {
                crate::metrics::record_transition("accept");
                tracing::info!(
                    quest_id,
                    user_id,
                    guild_id = progress.guild_id,
                    "Quest accepted"
                );
            }
            Err(error) => {
                crate::metrics::record_rejection(error.kind());
                tracing::debug!(quest_id, user_id, %error, "Quest accept refused");
            }
        }

        result
    }

    async fn try_accept(
        &self,
        quest_id: &str,
        user_id: i64,
        user_role_ids: &[i64],
        channel_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<QuestProgress, AppError> {
        let quest = self.get_quest(quest_id).await?;

        if quest.status != QuestStatus::Available {
            return Err(AppError::NotAvailable {
                status: quest.status,
            });
        }

        let existing = self.db.get_progress(user_id, quest_id).await?;
        if let Some(existing) = &existing {
            self.check_reattempt(existing, now)?;
        }

        if !quest.role_gate_allows(user_role_ids) {
            return Err(AppError::MissingRole {
                required_role_ids: quest.required_role_ids.clone(),
            });
        }

        let progress = QuestProgress::accepted(&quest, user_id, channel_id, now);
        if !self.db.accept_progress(&progress, existing.as_ref()).await? {
            return Err(AppError::AlreadyActive(
                "You have already accepted this quest".to_string(),
            ));
        }

        Ok(progress)
    }

    /// Whether an existing row allows a fresh attempt at `now`
    fn check_reattempt(&self, existing: &QuestProgress, now: DateTime<Utc>) -> Result<(), AppError> {
        match existing.status {
            ProgressStatus::Accepted | ProgressStatus::Completed => Err(AppError::AlreadyActive(
                "You have already accepted this quest".to_string(),
            )),
            ProgressStatus::Approved => Err(AppError::AlreadyActive(
                "You have already completed this quest".to_string(),
            )),
            ProgressStatus::Rejected => {
                let Some(rejected_at) = existing.completed_at else {
                    return Ok(());
                };
                let elapsed = now - rejected_at;
                if elapsed < self.cooldown {
                    return Err(AppError::CooldownActive {
                        hours_left: self.cooldown.num_hours() - elapsed.num_hours(),
                    });
                }
                Ok(())
            }
        }
    }

    pub async fn complete_quest(
        &self,
        quest_id: &str,
        user_id: i64,
        proof_text: &str,
        proof_attachments: &[String],
    ) -> Result<QuestProgress, AppError> {
        self.complete_quest_at(quest_id, user_id, proof_text, proof_attachments, Utc::now())
            .await
    }

    /// Submit proof for an accepted quest
    ///
    /// # Errors
    /// * `NotFound` - the user never accepted this quest
    /// * `InvalidState` - progress is not `accepted`
    pub async fn complete_quest_at(
        &self,
        quest_id: &str,
        user_id: i64,
        proof_text: &str,
        proof_attachments: &[String],
        now: DateTime<Utc>,
    ) -> Result<QuestProgress, AppError> {
        let updated = self
            .db
            .complete_progress(user_id, quest_id, proof_text, proof_attachments, now)
            .await?;

        match updated {
            Some(progress) => {
                crate::metrics::record_transition("submit");
                tracing::info!(
                    quest_id,
                    user_id,
                    guild_id = progress.guild_id,
                    attachments = progress.proof_attachments.len(),
                    "Quest proof submitted"
                );
                Ok(progress)
            }
            None => Err(self
                .transition_failure(quest_id, user_id, ProgressStatus::Accepted)
                .await),
        }
    }

    pub async fn approve_quest(
        &self,
        quest_id: &str,
        user_id: i64,
        approved: bool,
    ) -> Result<QuestProgress, AppError> {
        self.approve_quest_at(quest_id, user_id, approved, Utc::now())
            .await
    }

    /// Approve or reject a submitted quest
    ///
    /// Counts the outcome in the user's stats exactly once.
    ///
    /// # Errors
    /// * `NotFound` - no progress row for the user
    /// * `InvalidState` - progress is not `completed`
    pub async fn approve_quest_at(
        &self,
        quest_id: &str,
        user_id: i64,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<QuestProgress, AppError> {
        let updated = self
            .db
            .review_progress(user_id, quest_id, approved, now)
            .await?;

        match updated {
            Some(progress) => {
                let transition = if approved { "approve" } else { "reject" };
                crate::metrics::record_transition(transition);
                tracing::info!(
                    quest_id,
                    user_id,
                    guild_id = progress.guild_id,
                    outcome = %progress.status,
                    "Quest reviewed"
                );
                Ok(progress)
            }
            None => Err(self
                .transition_failure(quest_id, user_id, ProgressStatus::Completed)
                .await),
        }
    }

    /// Explain why a conditional transition matched no row
    async fn transition_failure(
        &self,
        quest_id: &str,
        user_id: i64,
        expected: ProgressStatus,
    ) -> AppError {
        let error = match self.db.get_progress(user_id, quest_id).await {
            Ok(Some(progress)) => AppError::InvalidState {
                expected,
                actual: progress.status,
            },
            Ok(None) => AppError::NotFound,
            Err(error) => error,
        };
        crate::metrics::record_rejection(error.kind());
        error
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Progress rows of a user in a guild, most recently accepted first
    pub async fn get_user_quests(
        &self,
        user_id: i64,
        guild_id: i64,
    ) -> Result<Vec<QuestProgress>, AppError> {
        self.db.get_user_progress(user_id, guild_id).await
    }

    pub async fn get_user_quest_progress(
        &self,
        user_id: i64,
        quest_id: &str,
    ) -> Result<Option<QuestProgress>, AppError> {
        self.db.get_progress(user_id, quest_id).await
    }

    /// Submissions awaiting review on quests the creator owns
    pub async fn get_pending_approvals(
        &self,
        creator_id: i64,
        guild_id: i64,
    ) -> Result<Vec<PendingApproval>, AppError> {
        self.db.get_pending_approvals(creator_id, guild_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{QuestCategory, QuestRank};
    use futures::future::join_all;
    use std::collections::HashSet;
    use tempfile::TempDir;

    async fn create_test_service() -> (Arc<QuestService>, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-quest.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let service = QuestService::new(db.clone(), &LifecycleConfig::default());
        (Arc::new(service), db, temp_dir)
    }

    fn new_quest(title: &str) -> NewQuest {
        NewQuest {
            title: title.to_string(),
            description: "Prove it".to_string(),
            creator_id: 100,
            guild_id: 1,
            ..NewQuest::default()
        }
    }

    #[tokio::test]
    async fn create_quest_assigns_id_and_trims_title() {
        let (service, _db, _temp_dir) = create_test_service().await;

        let quest = service.create_quest(new_quest("  Herbs  ")).await.unwrap();
        assert_eq!(quest.title, "Herbs");
        assert_eq!(quest.quest_id.len(), 26);
        assert_eq!(quest.status, QuestStatus::Available);
        assert_eq!(quest.rank, QuestRank::Normal);
        assert_eq!(quest.category, QuestCategory::Other);

        let error = service.create_quest(new_quest("   ")).await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_from_template_applies_overrides() {
        let (service, _db, _temp_dir) = create_test_service().await;

        let quest = service
            .create_quest_from_template(
                "puzzle_basic",
                TemplateOverrides {
                    reward: Some("A shiny badge".to_string()),
                    ..TemplateOverrides::default()
                },
                100,
                1,
            )
            .await
            .unwrap();
        assert_eq!(quest.title, "Puzzle Challenge");
        assert_eq!(quest.reward, "A shiny badge");
        assert_eq!(quest.rank, QuestRank::Hard);
        assert_eq!(quest.category, QuestCategory::Puzzle);

        let error = service
            .create_quest_from_template("nope", TemplateOverrides::default(), 100, 1)
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::NotFound));
    }

    #[tokio::test]
    async fn accept_checks_run_in_order() {
        let (service, db, _temp_dir) = create_test_service().await;

        let missing = service.accept_quest("nope", 1, &[], None).await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound));

        let gated = service
            .create_quest(NewQuest {
                required_role_ids: vec![77],
                ..new_quest("Gated")
            })
            .await
            .unwrap();
        let error = service
            .accept_quest(&gated.quest_id, 1, &[5], None)
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            AppError::MissingRole { ref required_role_ids } if required_role_ids == &vec![77]
        ));
        service
            .accept_quest(&gated.quest_id, 1, &[5, 77], None)
            .await
            .unwrap();

        let second = service
            .accept_quest(&gated.quest_id, 1, &[77], None)
            .await
            .unwrap_err();
        assert_eq!(second.to_string(), "You have already accepted this quest");

        db.update_quest_status(&gated.quest_id, QuestStatus::Cancelled)
            .await
            .unwrap();
        let unavailable = service
            .accept_quest(&gated.quest_id, 2, &[77], None)
            .await
            .unwrap_err();
        assert!(matches!(
            unavailable,
            AppError::NotAvailable {
                status: QuestStatus::Cancelled
            }
        ));
    }

    #[tokio::test]
    async fn full_lifecycle_with_rejection_cooldown() {
        let (service, db, _temp_dir) = create_test_service().await;
        let quest = service.create_quest(new_quest("Wolves")).await.unwrap();
        let t0 = Utc::now();

        service
            .accept_quest_at(&quest.quest_id, 42, &[], Some(9), t0)
            .await
            .unwrap();
        let submitted_at = t0 + Duration::minutes(30);
        service
            .complete_quest_at(&quest.quest_id, 42, "pics", &["a.png".to_string()], submitted_at)
            .await
            .unwrap();
        let rejected = service
            .approve_quest_at(&quest.quest_id, 42, false, submitted_at + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(rejected.status, ProgressStatus::Rejected);
        assert_eq!(rejected.approval_status, "rejected");
        // Review time goes to reviewed_at; the cooldown anchor stays put
        assert_eq!(
            rejected.completed_at.map(|at| at.timestamp()),
            Some(submitted_at.timestamp())
        );
        assert_eq!(
            rejected.reviewed_at.map(|at| at.timestamp()),
            Some((submitted_at + Duration::minutes(5)).timestamp())
        );

        let too_soon = service
            .accept_quest_at(&quest.quest_id, 42, &[], None, submitted_at + Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(too_soon, AppError::CooldownActive { hours_left: 23 }));

        let retried = service
            .accept_quest_at(&quest.quest_id, 42, &[], None, submitted_at + Duration::hours(25))
            .await
            .unwrap();
        assert_eq!(retried.status, ProgressStatus::Accepted);
        assert!(retried.completed_at.is_none());
        assert!(retried.proof_attachments.is_empty());

        let stats = db.get_or_create_user_stats(42, 1, t0).await.unwrap();
        assert_eq!(stats.quests_accepted, 2);
        assert_eq!(stats.quests_rejected, 1);
        assert_eq!(stats.quests_completed, 0);
    }

    #[tokio::test]
    async fn quest_ids_stay_unique_across_hundreds_of_creations() {
        let (service, _db, _temp_dir) = create_test_service().await;

        let direct = join_all((0..150).map(|i| {
            let service = service.clone();
            async move { service.create_quest(new_quest(&format!("Errand {i}"))).await }
        }))
        .await;

        let mut ids: Vec<String> = direct
            .into_iter()
            .map(|quest| quest.unwrap().quest_id)
            .collect();
        for template_id in ["combat_basic", "hunting_basic", "puzzle_basic"] {
            for _ in 0..50 {
                let quest = service
                    .create_quest_from_template(template_id, TemplateOverrides::default(), 100, 1)
                    .await
                    .unwrap();
                ids.push(quest.quest_id);
            }
        }

        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), 300);
        assert_eq!(unique.len(), ids.len());
    }

    #[tokio::test]
    async fn unbounded_cooldown_keeps_rejected_members_waiting() {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::connect(&temp_dir.path().join("cooldown.db")).await.unwrap());
        let service = QuestService::new(
            db,
            &LifecycleConfig {
                cooldown_hours: i64::MAX,
            },
        );
        let quest = service.create_quest(new_quest("Forever")).await.unwrap();
        let t0 = Utc::now();

        service.accept_quest_at(&quest.quest_id, 5, &[], None, t0).await.unwrap();
        service
            .complete_quest_at(&quest.quest_id, 5, "done", &[], t0)
            .await
            .unwrap();
        service
            .approve_quest_at(&quest.quest_id, 5, false, t0)
            .await
            .unwrap();

        let error = service
            .accept_quest_at(&quest.quest_id, 5, &[], None, t0 + Duration::days(3650))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::CooldownActive { .. }));
    }

    #[tokio::test]
    async fn approved_progress_is_terminal() {
        let (service, _db, _temp_dir) = create_test_service().await;
        let quest = service.create_quest(new_quest("Ore")).await.unwrap();

        service.accept_quest(&quest.quest_id, 42, &[], None).await.unwrap();
        service
            .complete_quest(&quest.quest_id, 42, "done", &[])
            .await
            .unwrap();
        service.approve_quest(&quest.quest_id, 42, true).await.unwrap();

        let again = service
            .accept_quest(&quest.quest_id, 42, &[], None)
            .await
            .unwrap_err();
        assert_eq!(again.to_string(), "You have already completed this quest");

        let double_approve = service
            .approve_quest(&quest.quest_id, 42, true)
            .await
            .unwrap_err();
        assert!(matches!(
            double_approve,
            AppError::InvalidState {
                expected: ProgressStatus::Completed,
                actual: ProgressStatus::Approved
            }
        ));
    }

    #[tokio::test]
    async fn transitions_without_progress_are_not_found() {
        let (service, _db, _temp_dir) = create_test_service().await;
        let quest = service.create_quest(new_quest("Ore")).await.unwrap();

        let submit = service
            .complete_quest(&quest.quest_id, 42, "done", &[])
            .await
            .unwrap_err();
        assert!(matches!(submit, AppError::NotFound));

        service.accept_quest(&quest.quest_id, 42, &[], None).await.unwrap();
        let early_review = service
            .approve_quest(&quest.quest_id, 42, true)
            .await
            .unwrap_err();
        assert!(matches!(
            early_review,
            AppError::InvalidState {
                expected: ProgressStatus::Completed,
                actual: ProgressStatus::Accepted
            }
        ));

        service
            .complete_quest(&quest.quest_id, 42, "done", &[])
            .await
            .unwrap();
        let double_submit = service
            .complete_quest(&quest.quest_id, 42, "again", &[])
            .await
            .unwrap_err();
        assert!(matches!(double_submit, AppError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn concurrent_accepts_have_one_winner() {
        let (service, db, _temp_dir) = create_test_service().await;
        let quest = service.create_quest(new_quest("Race")).await.unwrap();

        let attempts = (0..8).map(|_| {
            let service = service.clone();
            let quest_id = quest.quest_id.clone();
            tokio::spawn(async move { service.accept_quest(&quest_id, 42, &[], None).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let winners = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results.iter().all(|result| match result {
            Ok(_) => true,
            Err(error) => matches!(error, AppError::AlreadyActive(_)),
        }));

        let stats = db.get_or_create_user_stats(42, 1, Utc::now()).await.unwrap();
        assert_eq!(stats.quests_accepted, 1);
    }

    #[tokio::test]
    async fn pending_approvals_and_tenant_scope() {
        let (service, _db, _temp_dir) = create_test_service().await;
        let quest = service.create_quest(new_quest("Review me")).await.unwrap();

        service.accept_quest(&quest.quest_id, 42, &[], None).await.unwrap();
        service
            .complete_quest(&quest.quest_id, 42, "proof", &["p.png".to_string()])
            .await
            .unwrap();

        let pending = service.get_pending_approvals(100, 1).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "Review me");
        assert_eq!(pending[0].proof_attachments, vec!["p.png".to_string()]);
        assert!(service.get_pending_approvals(101, 1).await.unwrap().is_empty());

        let cross_tenant = service
            .get_quest_in_guild(&quest.quest_id, 2)
            .await
            .unwrap_err();
        assert!(matches!(cross_tenant, AppError::NotFound));

        assert_eq!(service.get_user_quests(42, 1).await.unwrap().len(), 1);
        assert!(service.delete_quest(&quest.quest_id).await.unwrap());
        assert!(service.get_user_quests(42, 1).await.unwrap().is_empty());
    }
}
