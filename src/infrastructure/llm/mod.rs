//! OpenAI-compatible chat-completions client used by the judge and the refiner

pub mod client;
pub mod errors;
pub mod rate_limiter;
pub mod types;

pub use client::{ChatClient, ChatClientConfig};
pub use errors::LlmApiError;
pub use rate_limiter::TokenBucketRateLimiter;
