//! Scripted stand-ins for the decoder and the business API.
//!
//! Compiled for this crate's unit tests, and for integration tests
//! elsewhere in the workspace through the `test-util` feature.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use stepwise_core::action::Page;
use stepwise_core::provider::{DecodeRequest, StructuredDecoder, UsageStats};
use stepwise_core::{
    Action, BusinessApi, CallerIdentity, Decision, DecodingFailure, DispatchError, KnowledgePage,
    Outcome, ProvideAgentResponse,
};

/// Usage reported by [`ScriptedDecoder`] for every call.
pub const SCRIPTED_USAGE: UsageStats = UsageStats {
    prompt_tokens: 10,
    completion_tokens: 5,
    total_tokens: 15,
};

/// A decoder that returns scripted results in order.
///
/// When the script runs out it repeats the fallback decision if one was
/// given, and otherwise fails with a malformed-output error.
pub struct ScriptedDecoder {
    script: Mutex<VecDeque<Result<Decision, DecodingFailure>>>,
    fallback: Option<Decision>,
    delay: Option<Duration>,
    transcript_lengths: Mutex<Vec<usize>>,
}

impl ScriptedDecoder {
    pub fn new(script: Vec<Result<Decision, DecodingFailure>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            delay: None,
            transcript_lengths: Mutex::new(Vec::new()),
        }
    }

    /// A decoder that returns `decision` forever.
    pub fn repeating(decision: Decision) -> Self {
        let mut decoder = Self::new(Vec::new());
        decoder.fallback = Some(decision);
        decoder
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.transcript_lengths.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Transcript length seen by each call, in call order.
    pub fn transcript_lengths(&self) -> Vec<usize> {
        self.transcript_lengths.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StructuredDecoder for ScriptedDecoder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn decide(
        &self,
        request: DecodeRequest<'_>,
    ) -> Result<(Decision, UsageStats), DecodingFailure> {
        self.transcript_lengths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.transcript.len());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match (next, &self.fallback) {
            (Some(result), _) => result.map(|d| (d, SCRIPTED_USAGE)),
            (None, Some(decision)) => Ok((decision.clone(), SCRIPTED_USAGE)),
            (None, None) => Err(DecodingFailure::Malformed("script exhausted".into())),
        }
    }
}

/// An in-memory business API with switchable failures.
pub struct StubBusinessApi {
    identity: CallerIdentity,
    pages: Vec<KnowledgePage>,
    fail_whoami: bool,
    fail_details: bool,
    fail_listing: bool,
    fail_page_loads: bool,
    /// 1-based dispatch call number → error returned on that call.
    dispatch_failures: HashMap<usize, DispatchError>,
    fail_every_dispatch: Option<DispatchError>,
    dispatch_delay: Option<Duration>,
    dispatched: Mutex<Vec<Action>>,
}

impl StubBusinessApi {
    fn with_identity(identity: CallerIdentity) -> Self {
        Self {
            identity,
            pages: Vec::new(),
            fail_whoami: false,
            fail_details: false,
            fail_listing: false,
            fail_page_loads: false,
            dispatch_failures: HashMap::new(),
            fail_every_dispatch: None,
            dispatch_delay: None,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    /// A known employee caller.
    pub fn employee(user: &str) -> Self {
        let mut identity = CallerIdentity {
            is_public: false,
            current_user: Some(user.to_string()),
            extra: serde_json::Map::new(),
        };
        identity
            .extra
            .insert("today".into(), serde_json::json!("2025-04-01"));
        Self::with_identity(identity)
    }

    /// An anonymous public caller.
    pub fn public() -> Self {
        Self::with_identity(CallerIdentity {
            is_public: true,
            ..CallerIdentity::default()
        })
    }

    pub fn with_page(mut self, path: &str, content: &str) -> Self {
        self.pages.push(KnowledgePage {
            path: path.into(),
            content: content.into(),
        });
        self
    }

    pub fn failing_whoami(mut self) -> Self {
        self.fail_whoami = true;
        self
    }

    pub fn failing_identity_details(mut self) -> Self {
        self.fail_details = true;
        self
    }

    pub fn failing_page_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_page_loads(mut self) -> Self {
        self.fail_page_loads = true;
        self
    }

    /// Fail the `call`-th dispatch (1-based) with `error`.
    pub fn failing_dispatch_at(mut self, call: usize, error: DispatchError) -> Self {
        self.dispatch_failures.insert(call, error);
        self
    }

    /// Fail every dispatch with `error`.
    pub fn failing_every_dispatch(mut self, error: DispatchError) -> Self {
        self.fail_every_dispatch = Some(error);
        self
    }

    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = Some(delay);
        self
    }

    pub fn identity(&self) -> CallerIdentity {
        self.identity.clone()
    }

    /// Every action dispatched so far, including failed ones.
    pub fn dispatched(&self) -> Vec<Action> {
        self.dispatched.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Terminal actions dispatched so far.
    pub fn terminal_responses(&self) -> Vec<ProvideAgentResponse> {
        self.dispatched()
            .iter()
            .filter_map(|a| a.as_final_response().cloned())
            .collect()
    }
}

fn offline(what: &str) -> DispatchError {
    DispatchError::Transport(format!("{what} unavailable"))
}

#[async_trait]
impl BusinessApi for StubBusinessApi {
    async fn who_am_i(&self) -> Result<CallerIdentity, DispatchError> {
        if self.fail_whoami {
            return Err(offline("whoami"));
        }
        Ok(self.identity.clone())
    }

    async fn identity_details(&self, user_id: &str) -> Result<serde_json::Value, DispatchError> {
        if self.fail_details {
            return Err(offline("employee record"));
        }
        Ok(serde_json::json!({"employee": {"id": user_id, "department": "Engineering"}}))
    }

    async fn list_pages(&self) -> Result<Vec<String>, DispatchError> {
        if self.fail_listing {
            return Err(offline("wiki listing"));
        }
        Ok(self.pages.iter().map(|p| p.path.clone()).collect())
    }

    async fn load_page(&self, path: &str) -> Result<KnowledgePage, DispatchError> {
        if self.fail_page_loads {
            return Err(offline("wiki page"));
        }
        self.pages
            .iter()
            .find(|p| p.path == path)
            .cloned()
            .ok_or_else(|| DispatchError::Business {
                code: "not_found".into(),
                detail: format!("no page {path}"),
            })
    }

    async fn dispatch(&self, action: &Action) -> Result<serde_json::Value, DispatchError> {
        let call = {
            let mut dispatched = self.dispatched.lock().unwrap_or_else(|e| e.into_inner());
            dispatched.push(action.clone());
            dispatched.len()
        };

        if let Some(delay) = self.dispatch_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = &self.fail_every_dispatch {
            return Err(err.clone());
        }
        if let Some(err) = self.dispatch_failures.get(&call) {
            return Err(err.clone());
        }
        Ok(serde_json::json!({"ok": true, "tool": action.name(), "extra": null}))
    }
}

// ── Decision builders ─────────────────────────────────────────────────────

/// A decision with a one-step plan around `action`.
pub fn decision(action: Action, completed: bool) -> Decision {
    Decision {
        reasoning: format!("Next I should use {}.", action.name()),
        security_check: "Caller permissions checked.".into(),
        current_state: "working".into(),
        plan: vec![format!("call {}", action.name())],
        completed,
        action,
    }
}

/// A non-terminal read decision.
pub fn read_step() -> Decision {
    decision(
        Action::ListProjects(Page {
            offset: 0,
            limit: 10,
        }),
        false,
    )
}

/// A terminal decision with the given outcome.
pub fn final_answer(outcome: Outcome, message: &str, completed: bool) -> Decision {
    decision(
        Action::ProvideAgentResponse(ProvideAgentResponse {
            message: message.into(),
            outcome,
            links: Vec::new(),
        }),
        completed,
    )
}
