//! Tool-invocation policy evaluation for the Manifold gateway
//!
//! Decides, per proposed tool call, whether the call may proceed. A call is
//! blocked when untrusted content is present in the conversation and the
//! tool's policy does not allow untrusted usage, or when an argument-level
//! rule matches. Blocking is not an error: the evaluator produces a refusal
//! payload that the gateway substitutes for the provider's response, so the
//! client sees a normal assistant reply.
//!
//! Policy storage is external; this crate only defines the lookup trait and
//! ships an in-memory implementation for config-driven deployments.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod evaluate;
mod rule;
mod store;
mod untrusted;

pub use evaluate::{PolicyRefusal, ProposedCall, blocked_tools, evaluate};
pub use rule::{ArgumentRule, PolicyError, ToolPolicy};
pub use store::{ANY_AGENT, MemoryPolicyStore, PolicyStore};
pub use untrusted::{UNTRUSTED_BEGIN, UNTRUSTED_END, contains_untrusted_marker, wrap_untrusted};
