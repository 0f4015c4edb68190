//! The Stepwise reasoning loop.
//!
//! One task runs as a **Decide → Dispatch → Observe** cycle:
//!
//! 1. **Assemble** the initial transcript (policy, caller identity, knowledge pages, task text)
//! 2. **Decide**: ask the configured decoder for exactly one structured decision
//! 3. **Dispatch** the decision's action against the business API
//! 4. **Observe**: append the result (or the error text) to the transcript
//! 5. **Stop** on the terminal action, the step budget, or a decoding failure
//!
//! Every task ends with exactly one termination record.

pub mod context;
pub mod dispatcher;
pub mod loop_runner;

#[cfg(any(test, feature = "test-util"))]
pub mod test_helpers;

pub use context::{AssembledContext, AssemblyError, ContextAssembler};
pub use dispatcher::{ActionDispatcher, ActionResult};
pub use loop_runner::{
    LoopState, MAX_STEPS, ReasoningLoop, TaskReport, TerminationRecord, TerminationSource,
};
