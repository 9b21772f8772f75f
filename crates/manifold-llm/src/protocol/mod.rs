//! Wire format types for provider-specific API protocols
//!
//! Each module contains pure serde structs matching the respective provider's
//! JSON API format. Request types are deserialize-only views over the raw
//! body: the adapters keep the original `serde_json::Value` for lossless
//! re-serialization and use these structs for reading, so a view only names
//! the fields the gateway inspects.

pub mod anthropic;
pub mod gemini;
pub mod openai;
