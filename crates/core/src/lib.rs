//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise structured
//! reasoning agent. This crate performs **no I/O**; it defines the contract
//! every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The two external seams of the reasoning loop are traits defined here:
//! - [`StructuredDecoder`] turns a [`Transcript`] into one validated [`Decision`]
//! - [`BusinessApi`] executes one [`Action`] against the business backend
//!
//! Implementations live in `stepwise-providers` and `stepwise-business`, and
//! tests swap in scripted stubs without touching the loop.

pub mod action;
pub mod business;
pub mod decision;
pub mod error;
pub mod provider;
pub mod transcript;

// Re-export key types at crate root for ergonomics
pub use action::{Action, Link, LinkKind, Outcome, ProvideAgentResponse};
pub use business::{BusinessApi, CallerIdentity, KnowledgePage};
pub use decision::Decision;
pub use error::{DecodingFailure, DispatchError, Error, Result};
pub use provider::{DecodeRequest, StructuredDecoder, UsageStats};
pub use transcript::{ActionCall, Transcript, Turn, TurnRole};
