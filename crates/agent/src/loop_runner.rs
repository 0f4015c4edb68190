//! The reasoning loop: decide, record, dispatch, observe, repeat.
//!
//! Each step from `Running(n)`:
//!
//! 1. Ask the decoder for one [`Decision`]. A decoding failure triggers one
//!    best-effort synthetic `error_internal` response and ends in `Aborted`.
//! 2. Append the decision turn (`step_{n}` call id).
//! 3. Dispatch the action. Dispatch never fails; errors become text.
//! 4. Append the observation turn.
//! 5. A terminal action ends the task in `Completed`, whatever the
//!    decision's `completed` flag says.
//! 6. Otherwise continue; after `max_steps` steps the loop ends in
//!    `BudgetExhausted` and sends one best-effort synthetic response.
//!
//! Every exit path yields exactly one [`TerminationRecord`].

use crate::context::{AssembledContext, ContextAssembler};
use crate::dispatcher::ActionDispatcher;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwise_config::{AppConfig, PolicyMode};
use stepwise_core::provider::{DecodeRequest, StructuredDecoder, UsageStats};
use stepwise_core::{
    Action, ActionCall, BusinessApi, CallerIdentity, Decision, DecodingFailure, Link, Outcome,
    ProvideAgentResponse, Transcript, Turn,
};
use stepwise_telemetry::{UsageRecord, UsageSink, emit};
use tracing::{debug, info, warn};

/// Default step budget per task.
pub const MAX_STEPS: u32 = 25;

/// Default token budget per decoding call.
pub const DEFAULT_MAX_TOKENS: u32 = 16384;

/// Message sent when the step budget runs out.
pub const REASONING_LIMIT_MESSAGE: &str =
    "I've reached my reasoning limit. Please try breaking this down into smaller requests.";

/// Who produced the termination record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationSource {
    /// The model chose the terminal action.
    Agent,
    /// The loop ran out of steps.
    BudgetExhausted,
    /// Decoding (or caller identification) failed.
    Aborted,
}

/// The single externally meaningful result of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationRecord {
    pub outcome: Outcome,
    pub message: String,
    pub links: Vec<Link>,
    pub source: TerminationSource,
}

impl TerminationRecord {
    fn from_response(response: &ProvideAgentResponse, source: TerminationSource) -> Self {
        Self {
            outcome: response.outcome,
            message: response.message.clone(),
            links: response.links.clone(),
            source,
        }
    }
}

/// Loop state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Running { step: u32 },
    Completed(TerminationRecord),
    BudgetExhausted,
    Aborted { cause: String },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running { .. })
    }
}

/// Everything a finished task produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: String,
    pub state: LoopState,
    pub termination: TerminationRecord,
    pub transcript: Transcript,
    /// Decision steps that reached dispatch.
    pub steps: u32,
    /// Summed usage of every successful decoding call.
    pub usage: UsageStats,
}

/// Drives one task from initial transcript to termination.
pub struct ReasoningLoop {
    decoder: Arc<dyn StructuredDecoder>,
    dispatcher: ActionDispatcher,
    assembler: ContextAssembler,
    usage_sink: Option<Arc<dyn UsageSink>>,
    schema: serde_json::Value,
    max_steps: u32,
    max_tokens: u32,
    decode_timeout: Option<Duration>,
}

impl ReasoningLoop {
    pub fn new(decoder: Arc<dyn StructuredDecoder>, api: Arc<dyn BusinessApi>) -> Self {
        Self {
            decoder,
            dispatcher: ActionDispatcher::new(api),
            assembler: ContextAssembler::new(),
            usage_sink: None,
            schema: Decision::json_schema(),
            max_steps: MAX_STEPS,
            max_tokens: DEFAULT_MAX_TOKENS,
            decode_timeout: None,
        }
    }

    /// Build a loop with limits, timeouts, and policy mode from `config`.
    pub fn from_config(
        decoder: Arc<dyn StructuredDecoder>,
        api: Arc<dyn BusinessApi>,
        config: &AppConfig,
    ) -> Self {
        let agent = &config.agent;
        Self::new(decoder, api)
            .with_max_steps(agent.max_steps)
            .with_max_tokens(agent.max_tokens)
            .with_policy_mode(agent.policy_mode)
            .with_decode_timeout(agent.decode_timeout_secs.map(Duration::from_secs))
            .with_dispatch_timeout(agent.dispatch_timeout_secs.map(Duration::from_secs))
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_policy_mode(mut self, mode: PolicyMode) -> Self {
        self.dispatcher = self.dispatcher.with_policy(mode);
        self
    }

    pub fn with_decode_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.decode_timeout = timeout;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dispatcher = self.dispatcher.with_timeout(timeout);
        self
    }

    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage_sink = Some(sink);
        self
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Assemble the initial context for `task_text` and run the loop.
    ///
    /// If the caller cannot be identified the task is aborted with an
    /// `error_internal` record; the transcript is then empty.
    pub async fn run_task(&self, task_id: &str, task_text: &str) -> TaskReport {
        info!(task_id, "Starting task");

        match self
            .assembler
            .assemble(self.dispatcher.api().as_ref(), task_text)
            .await
        {
            Ok(AssembledContext {
                transcript, caller, ..
            }) => self.run(task_id, transcript, &caller).await,
            Err(e) => {
                warn!(task_id, error = %e, "Context assembly failed");
                let cause = e.to_string();
                let termination = self
                    .abort_with(&cause, &CallerIdentity::default())
                    .await;
                TaskReport {
                    task_id: task_id.to_string(),
                    state: LoopState::Aborted { cause },
                    termination,
                    transcript: Transcript::new(),
                    steps: 0,
                    usage: UsageStats::default(),
                }
            }
        }
    }

    /// Run the loop over an already assembled transcript.
    pub async fn run(
        &self,
        task_id: &str,
        mut transcript: Transcript,
        caller: &CallerIdentity,
    ) -> TaskReport {
        let mut usage = UsageStats::default();
        let mut steps = 0;
        let mut state = LoopState::Running { step: 1 };
        let mut termination = None;

        while let LoopState::Running { step } = state {
            if step > self.max_steps {
                warn!(task_id, max_steps = self.max_steps, "Step budget exhausted");
                let response = ProvideAgentResponse::internal_error(REASONING_LIMIT_MESSAGE);
                self.send_synthetic(&response, caller).await;
                termination = Some(TerminationRecord::from_response(
                    &response,
                    TerminationSource::BudgetExhausted,
                ));
                state = LoopState::BudgetExhausted;
                break;
            }

            debug!(task_id, step, turns = transcript.len(), "Loop step");

            let decision = match self.decide(task_id, &transcript).await {
                Ok((decision, step_usage)) => {
                    usage = usage.add(step_usage);
                    decision
                }
                Err(failure) => {
                    warn!(task_id, step, error = %failure, "Decoding failed, aborting task");
                    let cause = failure.to_string();
                    termination = Some(self.abort_with(&cause, caller).await);
                    state = LoopState::Aborted { cause };
                    break;
                }
            };

            info!(
                task_id,
                step,
                action = decision.action.name(),
                next = decision.next_step(),
                completed = decision.completed,
                "Decision"
            );

            let call_id = format!("step_{step}");
            transcript.push(Turn::decision(
                decision.summary(),
                ActionCall {
                    id: call_id.clone(),
                    name: decision.action.name().to_string(),
                    arguments: decision.action.arguments_json(),
                },
            ));

            let result = self.dispatcher.dispatch(&decision.action, caller).await;
            transcript.push(Turn::observation(call_id, result.to_observation()));
            steps = step;

            if let Action::ProvideAgentResponse(response) = &decision.action {
                if !decision.completed {
                    debug!(task_id, step, "Terminal action with completed=false; stopping anyway");
                }
                info!(task_id, step, outcome = %response.outcome, "Task complete");
                let record = TerminationRecord::from_response(response, TerminationSource::Agent);
                termination = Some(record.clone());
                state = LoopState::Completed(record);
                break;
            }

            state = LoopState::Running { step: step + 1 };
        }

        let termination = termination.unwrap_or_else(|| {
            TerminationRecord::from_response(
                &ProvideAgentResponse::internal_error("loop ended without a termination record"),
                TerminationSource::Aborted,
            )
        });

        TaskReport {
            task_id: task_id.to_string(),
            state,
            termination,
            transcript,
            steps,
            usage,
        }
    }

    /// One decoding call, bounded by the decode timeout, with usage reported.
    async fn decide(
        &self,
        task_id: &str,
        transcript: &Transcript,
    ) -> Result<(Decision, UsageStats), DecodingFailure> {
        let request = DecodeRequest {
            transcript,
            schema: &self.schema,
            max_tokens: self.max_tokens,
        };

        let started = Instant::now();
        let result = match self.decode_timeout {
            Some(limit) => tokio::time::timeout(limit, self.decoder.decide(request))
                .await
                .unwrap_or(Err(DecodingFailure::Timeout(limit.as_secs()))),
            None => self.decoder.decide(request).await,
        };
        let duration = started.elapsed().as_secs_f64();

        if let (Ok((_, step_usage)), Some(sink)) = (&result, &self.usage_sink) {
            let record = UsageRecord::new(task_id, self.decoder.model(), duration, *step_usage);
            emit(sink.as_ref(), &record).await;
        }

        result
    }

    /// Send the synthetic failure response and build the abort record.
    async fn abort_with(&self, cause: &str, caller: &CallerIdentity) -> TerminationRecord {
        let response = ProvideAgentResponse::internal_error(format!(
            "I encountered an error processing your request: {cause}"
        ));
        self.send_synthetic(&response, caller).await;
        TerminationRecord::from_response(&response, TerminationSource::Aborted)
    }

    /// Best-effort dispatch of a loop-generated terminal response.
    async fn send_synthetic(&self, response: &ProvideAgentResponse, caller: &CallerIdentity) {
        let action = Action::ProvideAgentResponse(response.clone());
        let result = self.dispatcher.dispatch(&action, caller).await;
        if !result.is_success() {
            warn!(
                observation = %result.to_observation(),
                "Synthetic final response could not be delivered"
            );
        }
    }
}
