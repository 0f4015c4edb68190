//! Initial transcript assembly.
//!
//! Produces exactly two turns:
//!
//! 1. **Instruction**: policy, outcome catalog, caller identity snapshot,
//!    optional expanded identity record, and every knowledge page that loaded
//! 2. **User**: the literal task text
//!
//! Only the identity snapshot is required. Identity details, the page
//! listing, and each page load are best-effort: failures are logged and the
//! corresponding section is left out.
//!
//! # Determinism
//!
//! Pages are embedded in listing order, so identical backend responses
//! always produce identical transcripts.

use super::best_effort::best_effort;
use super::policy::policy_text;
use stepwise_core::{BusinessApi, CallerIdentity, DispatchError, KnowledgePage, Transcript, Turn};
use tracing::{debug, info};

/// The assembled starting point of one task.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Instruction turn followed by the user turn.
    pub transcript: Transcript,
    /// The caller snapshot the instruction turn was built from.
    pub caller: CallerIdentity,
    /// Paths of pages that made it into the instruction turn.
    pub pages_loaded: Vec<String>,
    /// Paths that were listed but failed to load.
    pub pages_skipped: Vec<String>,
}

/// Assembly could not even establish who the caller is.
#[derive(Debug, Clone, thiserror::Error)]
#[error("could not identify caller: {0}")]
pub struct AssemblyError(#[from] pub DispatchError);

/// Builds the initial transcript from the business API.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    /// Fetch the expanded record of a known caller.
    pub include_identity_details: bool,
    /// Embed knowledge-base pages.
    pub include_pages: bool,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            include_identity_details: true,
            include_pages: true,
        }
    }
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch identity and knowledge, then build the two-turn transcript.
    pub async fn assemble(
        &self,
        api: &dyn BusinessApi,
        task_text: &str,
    ) -> Result<AssembledContext, AssemblyError> {
        let caller = api.who_am_i().await?;

        let details = match (&caller.current_user, self.include_identity_details) {
            (Some(user), true) if caller.is_known() => {
                best_effort("identity details", api.identity_details(user)).await
            }
            _ => None,
        };

        let (pages, skipped) = if self.include_pages {
            Self::load_pages(api).await
        } else {
            (Vec::new(), Vec::new())
        };

        let instruction = Self::render_instruction(&caller, details.as_ref(), &pages);

        let mut transcript = Transcript::new();
        transcript.push(Turn::instruction(instruction));
        transcript.push(Turn::user(task_text));

        info!(
            known_caller = caller.is_known(),
            pages = pages.len(),
            skipped = skipped.len(),
            "Assembled initial context"
        );

        Ok(AssembledContext {
            transcript,
            caller,
            pages_loaded: pages.into_iter().map(|p| p.path).collect(),
            pages_skipped: skipped,
        })
    }

    /// Load every listed page, skipping the ones that fail.
    async fn load_pages(api: &dyn BusinessApi) -> (Vec<KnowledgePage>, Vec<String>) {
        let Some(paths) = best_effort("knowledge page listing", api.list_pages()).await else {
            return (Vec::new(), Vec::new());
        };

        let mut pages = Vec::with_capacity(paths.len());
        let mut skipped = Vec::new();
        for path in paths {
            match best_effort("knowledge page", api.load_page(&path)).await {
                Some(page) => {
                    debug!(path = %page.path, bytes = page.content.len(), "Loaded page");
                    pages.push(page);
                }
                None => skipped.push(path),
            }
        }
        (pages, skipped)
    }

    fn render_instruction(
        caller: &CallerIdentity,
        details: Option<&serde_json::Value>,
        pages: &[KnowledgePage],
    ) -> String {
        let mut text = policy_text();

        text.push_str("\n# Current user context:\n");
        text.push_str(&serde_json::to_string(caller).unwrap_or_else(|_| "{}".into()));
        text.push('\n');

        if let Some(details) = details {
            text.push_str("\n# Current user details:\n");
            text.push_str(&details.to_string());
            text.push('\n');
        }

        if !pages.is_empty() {
            text.push_str("\n# COMPANY WIKI AND RULES:\n");
            for page in pages {
                text.push_str(&format!("\n## {}\n{}\n", page.path, page.content));
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubBusinessApi;
    use stepwise_core::TurnRole;

    #[tokio::test]
    async fn builds_instruction_then_user_turn() {
        let api = StubBusinessApi::employee("jane_doe")
            .with_page("rulebook.md", "No salary talk with guests.")
            .with_page("people/ceo.md", "The CEO is Elena.");

        let ctx = ContextAssembler::new()
            .assemble(&api, "Who is the CEO?")
            .await
            .unwrap();

        let turns = ctx.transcript.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role(), TurnRole::Instruction);
        assert_eq!(turns[1].role(), TurnRole::User);
        assert_eq!(turns[1].content(), "Who is the CEO?");

        let instruction = turns[0].content();
        assert!(instruction.contains("ok_not_found"));
        assert!(instruction.contains("\"current_user\":\"jane_doe\""));
        assert!(instruction.contains("# Current user details:"));
        assert!(instruction.contains("## rulebook.md\nNo salary talk with guests."));
        assert_eq!(ctx.pages_loaded, vec!["rulebook.md", "people/ceo.md"]);
    }

    #[tokio::test]
    async fn page_failures_degrade_gracefully() {
        let api = StubBusinessApi::employee("jane_doe")
            .with_page("rulebook.md", "rules")
            .with_page("faq.md", "faq")
            .failing_page_loads();

        let ctx = ContextAssembler::new()
            .assemble(&api, "hello")
            .await
            .unwrap();

        assert_eq!(ctx.transcript.len(), 2);
        assert!(ctx.pages_loaded.is_empty());
        assert_eq!(ctx.pages_skipped, vec!["rulebook.md", "faq.md"]);
        let instruction = ctx.transcript.turns()[0].content();
        assert!(instruction.contains("# Current user context:"));
        assert!(!instruction.contains("# COMPANY WIKI"));
    }

    #[tokio::test]
    async fn listing_failure_degrades_gracefully() {
        let api = StubBusinessApi::public().failing_page_listing();
        let ctx = ContextAssembler::new().assemble(&api, "hi").await.unwrap();
        assert_eq!(ctx.transcript.len(), 2);
        assert!(ctx.pages_skipped.is_empty());
    }

    #[tokio::test]
    async fn guest_gets_no_identity_details() {
        let api = StubBusinessApi::public();
        let ctx = ContextAssembler::new().assemble(&api, "date?").await.unwrap();
        assert!(!ctx.caller.is_known());
        assert!(!ctx.transcript.turns()[0].content().contains("# Current user details:"));
    }

    #[tokio::test]
    async fn identity_detail_failure_is_ignored() {
        let api = StubBusinessApi::employee("jane_doe").failing_identity_details();
        let ctx = ContextAssembler::new().assemble(&api, "hi").await.unwrap();
        assert!(!ctx.transcript.turns()[0].content().contains("# Current user details:"));
    }

    #[tokio::test]
    async fn whoami_failure_is_an_error() {
        let api = StubBusinessApi::employee("jane_doe").failing_whoami();
        let err = ContextAssembler::new().assemble(&api, "hi").await.unwrap_err();
        assert!(err.to_string().contains("could not identify caller"));
    }
}
