//! Per-thread caller context

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Fetches the opaque caller context for a new thread
///
/// Called exactly once per thread, before its first step. The result is stored in
/// [`ConversationState::user_context`](crate::state::ConversationState::user_context) and
/// handed to every tool invocation.
#[async_trait]
pub trait UserContextFetcher: Send + Sync {
    /// Fetch context for `thread_id`
    async fn fetch_user_context(&self, thread_id: &str) -> Result<Value>;
}

/// Returns the same context for every thread
#[derive(Debug, Clone, Default)]
pub struct StaticContext(pub Value);

impl StaticContext {
    /// Create a static context
    pub fn new(value: Value) -> Self {
        Self(value)
    }
}

#[async_trait]
impl UserContextFetcher for StaticContext {
    async fn fetch_user_context(&self, _thread_id: &str) -> Result<Value> {
        Ok(self.0.clone())
    }
}
