//! BusinessApi trait: the external business backend the agent acts on.
//!
//! The loop only needs four things from it: who the caller is, details about
//! a known caller, the knowledge-base pages, and a way to execute one action.

use crate::action::Action;
use crate::error::DispatchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity and permission snapshot for the caller of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// `true` for anonymous / public callers.
    #[serde(default)]
    pub is_public: bool,

    /// Stable identity key of a known caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<String>,

    /// Any further fields the backend reports (location, department, today's date, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CallerIdentity {
    /// Whether the caller is an identified individual.
    pub fn is_known(&self) -> bool {
        !self.is_public && self.current_user.is_some()
    }
}

/// A loaded knowledge-base page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePage {
    pub path: String,
    pub content: String,
}

/// The business API as seen by the agent.
#[async_trait]
pub trait BusinessApi: Send + Sync {
    /// Identity snapshot of the caller.
    async fn who_am_i(&self) -> std::result::Result<CallerIdentity, DispatchError>;

    /// Expanded record for a known caller.
    async fn identity_details(
        &self,
        user_id: &str,
    ) -> std::result::Result<serde_json::Value, DispatchError>;

    /// Paths of every knowledge-base page.
    async fn list_pages(&self) -> std::result::Result<Vec<String>, DispatchError>;

    /// Load one knowledge-base page.
    async fn load_page(&self, path: &str) -> std::result::Result<KnowledgePage, DispatchError>;

    /// Execute one action and return the response payload.
    async fn dispatch(
        &self,
        action: &Action,
    ) -> std::result::Result<serde_json::Value, DispatchError>;
}
