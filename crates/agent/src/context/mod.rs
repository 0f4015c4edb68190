//! Initial context for a task.
//!
//! | Section | Source | On failure |
//! |---------|--------|------------|
//! | Policy + outcomes | static text | n/a |
//! | Caller snapshot | `who_am_i` | task aborts |
//! | Identity details | `identity_details` | omitted |
//! | Knowledge pages | `list_pages` / `load_page` | page omitted |
//! | Task text | caller | n/a |

pub mod assembler;
pub mod best_effort;
pub mod policy;

pub use assembler::{AssembledContext, AssemblyError, ContextAssembler};
pub use best_effort::best_effort;
pub use policy::policy_text;
