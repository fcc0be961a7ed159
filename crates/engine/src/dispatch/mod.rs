//! LLM Dispatch Layer — the single chokepoint every other
//! subsystem calls through to reach a model. Owns retry/backoff, error
//! classification, and the model registry; never interprets message
//! content beyond what's needed to build a request body.

pub mod breaker;
pub mod classify;
pub mod client;
pub mod registry;
pub mod types;

pub use breaker::{RetryConfig, RetryTracker};
pub use classify::{classify as classify_error, ErrorClass};
pub use client::{DispatchClient, DispatchError, Transport, TransportResponse};
pub use registry::ModelRegistry;
pub use types::{
    CallOptions, DispatchResponse, FinishReason, Message, ModelEntry, ReasoningPayload, ToolCall,
    ToolSpec,
};
