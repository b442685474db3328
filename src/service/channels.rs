//! Channel routing configuration
//!
//! Records which platform channel each kind of quest traffic goes to.

use std::sync::Arc;

use crate::data::{ChannelConfig, ChannelKind, Database};
use crate::error::AppError;

/// Channel configuration service
pub struct ChannelService {
    db: Arc<Database>,
}

impl ChannelService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Replace the routing of a guild
    pub async fn set_guild_channels(&self, config: &ChannelConfig) -> Result<(), AppError> {
        self.db.upsert_channel_config(config).await?;
        tracing::info!(guild_id = config.guild_id, "Channel configuration saved");
        Ok(())
    }

    /// Routing of a guild; an unconfigured guild has every route unset
    pub async fn get_guild_config(&self, guild_id: i64) -> Result<ChannelConfig, AppError> {
        Ok(self
            .db
            .get_channel_config(guild_id)
            .await?
            .unwrap_or(ChannelConfig {
                guild_id,
                ..ChannelConfig::default()
            }))
    }

    pub async fn channel_for(
        &self,
        guild_id: i64,
        kind: ChannelKind,
    ) -> Result<Option<i64>, AppError> {
        Ok(self.get_guild_config(guild_id).await?.channel(kind))
    }
}
