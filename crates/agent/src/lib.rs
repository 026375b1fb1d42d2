//! Model-backed decision authority.
//!
//! [`ModelRuntime`] implements the core decision contract by consulting a
//! language model over a narrow [`LlmClient`] seam: one prompt in, one
//! string out. [`HttpLlmClient`] speaks to any OpenAI-compatible chat
//! completions endpoint; tests script the seam directly.

pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod sink;

pub use llm::{HttpLlmClient, LlmClient, LlmError};
pub use runtime::ModelRuntime;
pub use sink::FileReportSink;
