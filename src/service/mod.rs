//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database operations and enforce lifecycle rules.

mod bookmark;
mod channels;
pub mod permissions;
mod quest;
mod scheduler;
mod search;
mod stats;
mod team;
pub mod templates;

pub use bookmark::BookmarkService;
pub use channels::ChannelService;
pub use permissions::{Actor, GuildRolePolicy, PermissionPolicy};
pub use quest::{QuestService, TemplateOverrides};
pub use scheduler::{DeadlineReport, QuestScheduler, SchedulerNotifier, TracingNotifier};
pub use search::{SearchQuery, SearchService};
pub use stats::StatsService;
pub use team::TeamService;
