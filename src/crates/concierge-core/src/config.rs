//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Tunables for the graph engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum node executions in a single turn
    pub max_steps: usize,

    /// Extra policy attempts when the model returns an empty reply
    pub max_empty_retries: usize,

    /// Instruction appended for the final corrective attempt
    pub corrective_prompt: String,

    /// Reply used when the policy still produces nothing
    pub fallback_reply: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            max_empty_retries: 2,
            corrective_prompt: "Respond with a real output.".to_string(),
            fallback_reply: "Sorry, I could not come up with an answer. Could you rephrase your request?"
                .to_string(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-turn step limit
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the empty-reply retry bound
    pub fn with_max_empty_retries(mut self, retries: usize) -> Self {
        self.max_empty_retries = retries;
        self
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(GraphError::Configuration("max_steps must be at least 1".to_string()));
        }
        if self.fallback_reply.trim().is_empty() {
            return Err(GraphError::Configuration("fallback_reply cannot be empty".to_string()));
        }
        Ok(())
    }
}
