//! Bulk-create Jira issue hierarchies from a declarative `jiraconfig.json`, into the active sprint.

pub mod auth;
pub mod duration;
pub mod error;
pub mod estimate;
pub mod import;
pub mod jira;
pub mod jira_config;
pub mod ledger;
pub mod mock_jira;
pub mod payload;
pub mod plan;
pub mod settings;
pub mod sprint;

// Re-export the types most callers need at crate root
pub use duration::{Duration, MalformedDuration};
pub use error::{ImportError, InvalidConfig, ParentKind};
pub use estimate::{EstimateBreakdown, aggregate};
pub use import::{Prepared, RunOutcome};
pub use jira::{BoxedJiraClient, JiraClient, RestJiraClient, create_client};
pub use jira_config::{ConfigEntry, EntryType, ImportConfig, IssueSpec, NEW_DEV_TASK_KEY, SubTaskSpec};
pub use ledger::RunLedger;
pub use mock_jira::MockJiraClient;
pub use plan::{Classification, EntryPlan, IssuePlan, RemoteParent};
pub use settings::{Settings, SettingsFlags};
