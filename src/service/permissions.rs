//! Permission policy
//!
//! Decides who may create and manage quests. The check is injected into
//! the API layer so deployments can swap in their own rules.

use crate::config::PermissionsConfig;
use crate::data::Quest;

/// An already-authenticated member acting within one guild
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub guild_id: i64,
    pub role_ids: Vec<i64>,
    pub role_names: Vec<String>,
    pub is_guild_owner: bool,
    pub is_administrator: bool,
    pub can_manage_guild: bool,
    pub can_manage_channels: bool,
}

impl Actor {
    /// Whether the platform grants this member elevated guild permissions
    pub fn has_elevated_permissions(&self) -> bool {
        self.is_guild_owner
            || self.is_administrator
            || self.can_manage_guild
            || self.can_manage_channels
    }
}

/// Capability checks consulted before privileged operations
pub trait PermissionPolicy: Send + Sync {
    fn can_create_quests(&self, actor: &Actor) -> bool;

    /// Delete, review and schedule a specific quest
    fn can_manage_quest(&self, actor: &Actor, quest: &Quest) -> bool;

    /// Change guild-wide settings such as channel routing
    fn can_configure_guild(&self, actor: &Actor) -> bool {
        actor.has_elevated_permissions()
    }
}

/// Default policy: elevated guild permissions or a quest-manager role name
#[derive(Debug, Clone)]
pub struct GuildRolePolicy {
    creator_role_names: Vec<String>,
}

impl GuildRolePolicy {
    pub fn new(config: &PermissionsConfig) -> Self {
        Self {
            creator_role_names: config
                .creator_role_names
                .iter()
                .map(|name| name.trim().to_lowercase())
                .collect(),
        }
    }

    fn has_creator_role(&self, actor: &Actor) -> bool {
        actor.role_names.iter().any(|name| {
            let name = name.trim().to_lowercase();
            self.creator_role_names.contains(&name)
        })
    }
}

impl Default for GuildRolePolicy {
    fn default() -> Self {
        Self::new(&PermissionsConfig::default())
    }
}

impl PermissionPolicy for GuildRolePolicy {
    fn can_create_quests(&self, actor: &Actor) -> bool {
        actor.has_elevated_permissions() || self.has_creator_role(actor)
    }

    fn can_manage_quest(&self, actor: &Actor, quest: &Quest) -> bool {
        if quest.guild_id != actor.guild_id {
            return false;
        }
        quest.creator_id == actor.user_id || self.can_create_quests(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{QuestCategory, QuestRank, QuestStatus};
    use chrono::Utc;

    fn member(user_id: i64) -> Actor {
        Actor {
            user_id,
            guild_id: 1,
            ..Actor::default()
        }
    }

    fn quest_by(creator_id: i64) -> Quest {
        Quest {
            quest_id: "q".to_string(),
            title: "t".to_string(),
            description: String::new(),
            creator_id,
            guild_id: 1,
            requirements: String::new(),
            reward: String::new(),
            rank: QuestRank::Normal,
            category: QuestCategory::Other,
            status: QuestStatus::Available,
            created_at: Utc::now(),
            required_role_ids: Vec::new(),
        }
    }

    #[test]
    fn plain_member_cannot_create() {
        let policy = GuildRolePolicy::default();
        assert!(!policy.can_create_quests(&member(5)));
    }

    #[test]
    fn role_names_match_case_insensitively() {
        let policy = GuildRolePolicy::default();
        let actor = Actor {
            role_names: vec!["quest master".to_string()],
            ..member(5)
        };
        assert!(policy.can_create_quests(&actor));
    }

    #[test]
    fn elevated_flags_grant_creation() {
        let policy = GuildRolePolicy::default();
        let actor = Actor {
            can_manage_channels: true,
            ..member(5)
        };
        assert!(policy.can_create_quests(&actor));
    }

    #[test]
    fn creator_manages_own_quest_only_in_its_guild() {
        let policy = GuildRolePolicy::default();
        assert!(policy.can_manage_quest(&member(5), &quest_by(5)));
        assert!(!policy.can_manage_quest(&member(6), &quest_by(5)));

        let elsewhere = Actor {
            guild_id: 2,
            is_guild_owner: true,
            ..member(5)
        };
        assert!(!policy.can_manage_quest(&elsewhere, &quest_by(5)));
    }

    #[test]
    fn configured_role_list_replaces_defaults() {
        let policy = GuildRolePolicy::new(&PermissionsConfig {
            creator_role_names: vec!["Guildmaster".to_string()],
        });
        let moderator = Actor {
            role_names: vec!["Moderator".to_string()],
            ..member(5)
        };
        let guildmaster = Actor {
            role_names: vec!["GUILDMASTER".to_string()],
            ..member(6)
        };
        assert!(!policy.can_create_quests(&moderator));
        assert!(policy.can_create_quests(&guildmaster));
    }

    #[test]
    fn creator_role_alone_cannot_configure_guild() {
        let policy = GuildRolePolicy::default();
        let quest_master = Actor {
            role_names: vec!["Quest Master".to_string()],
            ..member(5)
        };
        let admin = Actor {
            is_administrator: true,
            ..member(6)
        };
        assert!(!policy.can_configure_guild(&quest_master));
        assert!(policy.can_configure_guild(&admin));
    }
}
