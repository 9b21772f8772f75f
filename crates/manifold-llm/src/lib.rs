//! Provider adapter layer for the Manifold gateway
//!
//! Wraps each supported provider's native chat-completions wire format
//! (`OpenAI`, Anthropic, Gemini, plus the `OpenAI`-compatible DeepSeek and
//! Ollama dialects) behind a shared adapter contract: canonical read access
//! to requests, stream accumulation into complete responses, tool-result
//! compression, and policy-driven refusal substitution.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod accumulator;
pub mod adapter;
pub mod compress;
pub mod error;
pub mod gateway;
pub mod pricing;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod tokenizer;

pub use accumulator::{StreamAccumulator, StreamPhase, ToolCallDraft};
pub use adapter::{ChunkDisposition, EmittedFrame, FrameKind, RequestAdapter, ResponseAdapter, StreamAdapter};
pub use error::GatewayError;
pub use gateway::{DispatchOutcome, Gateway, SseFrameStream};
pub use pricing::{ModelProfile, ModelProfiles};
pub use provider::{ClientOptions, ProviderClient, ProviderDialect};
pub use registry::{ProviderId, ProviderRegistry};
