//! Action dispatch: run one action against the business API and always
//! come back with an [`ActionResult`].
//!
//! Nothing here retries. A failed action becomes observation text, and the
//! model decides what to do about it on the next step.

use std::sync::Arc;
use std::time::Duration;
use stepwise_config::PolicyMode;
use stepwise_core::{Action, BusinessApi, CallerIdentity, DispatchError};
use tracing::{debug, warn};

/// The outcome of dispatching one action.
#[derive(Debug, Clone)]
pub enum ActionResult {
    /// The API accepted the action and returned this payload.
    Success(serde_json::Value),
    /// The action failed; the error class decides the observation prefix.
    Failed(DispatchError),
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Text of the observation turn for this result.
    ///
    /// Success is compact JSON with `null` fields dropped; failures use the
    /// error's display form, which carries a distinct prefix per class.
    pub fn to_observation(&self) -> String {
        match self {
            Self::Success(value) => {
                let mut value = value.clone();
                strip_nulls(&mut value);
                serde_json::to_string(&value).unwrap_or_else(|_| "{}".into())
            }
            Self::Failed(err) => err.to_string(),
        }
    }
}

fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// Routes actions to the business API.
pub struct ActionDispatcher {
    api: Arc<dyn BusinessApi>,
    policy: PolicyMode,
    timeout: Option<Duration>,
}

impl ActionDispatcher {
    pub fn new(api: Arc<dyn BusinessApi>) -> Self {
        Self {
            api,
            policy: PolicyMode::Advisory,
            timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: PolicyMode) -> Self {
        self.policy = policy;
        self
    }

    /// Bound each dispatch call; an expired call becomes a transport failure.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api(&self) -> &Arc<dyn BusinessApi> {
        &self.api
    }

    /// In enforced mode, refuse what the caller's tier cannot do.
    ///
    /// Terminal actions are always allowed. Public callers may do nothing
    /// else; callers without a known identity may not write.
    pub fn check_policy(
        &self,
        action: &Action,
        caller: &CallerIdentity,
    ) -> Result<(), DispatchError> {
        if self.policy == PolicyMode::Advisory || action.is_terminal() {
            return Ok(());
        }
        if caller.is_public {
            return Err(DispatchError::PolicyDenied(format!(
                "public callers may not use {}",
                action.name()
            )));
        }
        if action.is_write() && !caller.is_known() {
            return Err(DispatchError::PolicyDenied(format!(
                "{} requires an identified caller",
                action.name()
            )));
        }
        Ok(())
    }

    /// Dispatch `action`. Never fails: errors are folded into the result.
    pub async fn dispatch(&self, action: &Action, caller: &CallerIdentity) -> ActionResult {
        if let Err(denied) = self.check_policy(action, caller) {
            warn!(action = action.name(), reason = %denied, "Action refused by policy");
            return ActionResult::Failed(denied);
        }

        debug!(action = action.name(), route = action.route(), "Dispatching action");

        let call = self.api.dispatch(action);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Transport(format!(
                    "{} timed out after {}s",
                    action.name(),
                    limit.as_secs()
                ))),
            },
            None => call.await,
        };

        match result {
            Ok(value) => ActionResult::Success(value),
            Err(err) => {
                warn!(action = action.name(), kind = err.kind(), error = %err, "Action failed");
                ActionResult::Failed(err)
            }
        }
    }
}
