//! Policy nodes
//!
//! A [`Policy`] is the external decision maker, usually an LLM call, that produces the
//! next assistant message for a scope. [`PolicyNode`] wraps it with a bounded retry for
//! empty replies:
//!
//! 1. Invoke the policy up to `1 + max_empty_retries` times while it returns neither
//!    text nor tool calls.
//! 2. Invoke once more with the corrective prompt appended to a local copy of the
//!    conversation. The prompt is never committed to the thread.
//! 3. Give up with the configured fallback reply, which has no tool calls and therefore
//!    ends the turn.
//!
//! None of these attempts count as graph steps.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::messages::{Message, Role};
use crate::scope::ScopeView;
use crate::state::ConversationState;

/// Produces the next assistant message for a scope
#[async_trait]
pub trait Policy: Send + Sync {
    /// Decide the next assistant message given the conversation so far
    ///
    /// Errors are transport failures (model unreachable, malformed response) and abort
    /// the step.
    async fn invoke(&self, scope: &ScopeView, state: &ConversationState) -> Result<Message>;
}

/// Policy node with bounded empty-reply retry
#[derive(Clone)]
pub struct PolicyNode {
    policy: Arc<dyn Policy>,
    max_empty_retries: usize,
    corrective_prompt: String,
    fallback_reply: String,
}

impl PolicyNode {
    /// Wrap a policy using the retry settings from `config`
    pub fn new(policy: Arc<dyn Policy>, config: &EngineConfig) -> Self {
        Self {
            policy,
            max_empty_retries: config.max_empty_retries,
            corrective_prompt: config.corrective_prompt.clone(),
            fallback_reply: config.fallback_reply.clone(),
        }
    }

    /// The wrapped policy
    pub fn policy(&self) -> Arc<dyn Policy> {
        self.policy.clone()
    }

    /// Produce exactly one assistant message for `scope`
    #[tracing::instrument(skip(self, scope, state), fields(scope = %scope.name))]
    pub async fn run(&self, scope: &ScopeView, state: &ConversationState) -> Result<Message> {
        for attempt in 0..=self.max_empty_retries {
            let reply = self.invoke(scope, state).await?;
            if !reply.is_empty_response() {
                return Ok(reply);
            }
            tracing::warn!(scope = %scope.name, attempt, "Policy returned an empty reply");
        }

        let mut corrected = state.clone();
        corrected.messages.push(Message::user(self.corrective_prompt.clone()));
        let reply = self.invoke(scope, &corrected).await?;
        if !reply.is_empty_response() {
            return Ok(reply);
        }

        tracing::warn!(scope = %scope.name, "Policy produced no output after corrective prompt, using fallback reply");
        Ok(Message::assistant(self.fallback_reply.clone()).with_name(scope.name.clone()))
    }

    async fn invoke(&self, scope: &ScopeView, state: &ConversationState) -> Result<Message> {
        let mut reply = self.policy.invoke(scope, state).await?;
        if reply.role != Role::Assistant {
            return Err(GraphError::policy(
                &scope.name,
                format!("expected an assistant message, got {:?}", reply.role),
            ));
        }
        if reply.name.is_none() {
            reply.name = Some(scope.name.clone());
        }
        Ok(reply)
    }
}

impl std::fmt::Debug for PolicyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyNode")
            .field("policy", &"<policy>")
            .field("max_empty_retries", &self.max_empty_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns empty replies for the first `empty_for` calls
    struct Flaky {
        calls: AtomicUsize,
        empty_for: usize,
    }

    #[async_trait]
    impl Policy for Flaky {
        async fn invoke(&self, _scope: &ScopeView, state: &ConversationState) -> Result<Message> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.empty_for {
                Ok(Message::assistant(""))
            } else {
                let last = state.last_message().map(|m| m.content.clone()).unwrap_or_default();
                Ok(Message::assistant(format!("answer after {last}")))
            }
        }
    }

    fn view() -> ScopeView {
        ScopeView {
            name: "primary_assistant".into(),
            tools: vec![],
        }
    }

    fn state() -> ConversationState {
        ConversationState {
            messages: vec![Message::user("hello")],
            ..Default::default()
        }
    }

    fn node(empty_for: usize) -> (PolicyNode, Arc<Flaky>) {
        let policy = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            empty_for,
        });
        (PolicyNode::new(policy.clone(), &EngineConfig::default()), policy)
    }

    #[tokio::test]
    async fn test_first_reply_used() {
        let (node, policy) = node(0);
        let reply = node.run(&view(), &state()).await.unwrap();
        assert_eq!(reply.content, "answer after hello");
        assert_eq!(reply.name.as_deref(), Some("primary_assistant"));
        assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_within_bound() {
        let (node, policy) = node(2);
        let reply = node.run(&view(), &state()).await.unwrap();
        assert_eq!(reply.content, "answer after hello");
        assert_eq!(policy.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_corrective_prompt_after_bound() {
        let (node, policy) = node(3);
        let reply = node.run(&view(), &state()).await.unwrap();
        assert_eq!(reply.content, "answer after Respond with a real output.");
        assert_eq!(policy.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fallback_reply() {
        let (node, policy) = node(usize::MAX);
        let reply = node.run(&view(), &state()).await.unwrap();
        assert_eq!(reply.content, EngineConfig::default().fallback_reply);
        assert!(!reply.has_tool_calls());
        assert_eq!(policy.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_assistant_reply_is_error() {
        struct Wrong;

        #[async_trait]
        impl Policy for Wrong {
            async fn invoke(&self, _scope: &ScopeView, _state: &ConversationState) -> Result<Message> {
                Ok(Message::user("oops"))
            }
        }

        let node = PolicyNode::new(Arc::new(Wrong), &EngineConfig::default());
        assert!(matches!(node.run(&view(), &state()).await, Err(GraphError::Policy { .. })));
    }
}
