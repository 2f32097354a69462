//! Static dialog graph construction
//!
//! [`GraphBuilder`] assembles a [`DialogGraph`] once at startup from a tool registry, the
//! primary controller and the specialized scopes. Construction validates every tool name
//! a scope declares, so typos fail here rather than at runtime, and derives the node
//! table, the tool nodes and the interrupt points. Nothing is added after `build`.
//!
//! ```text
//!                       ┌──────────────────────────┐
//!   user input ───────► │ route_to_workflow        │
//!                       └──────┬────────────┬──────┘
//!                              │            │
//!                              ↓            ↓
//!   ┌─────────────────────────────┐   ┌──────────────────────────────┐
//!   │ primary_assistant           │   │ <scope>                      │
//!   │  ├─► primary_assistant_tools│   │  ├─► <scope>_safe_tools      │
//!   │  ├─► enter_<scope> ─────────┼──►│  ├─► <scope>_sensitive_tools │ (interrupt)
//!   │  └─► END                    │   │  ├─► leave_skill ──► primary │
//!   └─────────────────────────────┘   │  └─► END                     │
//!                                     └──────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::executor::ToolNode;
use crate::node::{NodeId, LEAVE_NODE, PRIMARY_TOOLS_NODE};
use crate::router::{route_primary, route_scope, route_to_workflow, PrimaryRoute, ScopeRoute};
use crate::scope::{PrimaryScope, Scope, ScopeView, COMPLETE_OR_ESCALATE, PRIMARY_SCOPE};
use crate::state::ConversationState;
use crate::tools::ToolRegistry;

/// Interrupt points of a graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterruptConfig {
    /// Nodes the engine always pauses before
    pub interrupt_before: Vec<String>,
}

impl InterruptConfig {
    /// Whether `node` is an interrupt point
    pub fn is_interrupt_before(&self, node: &str) -> bool {
        self.interrupt_before.iter().any(|n| n == node)
    }
}

/// Builder for [`DialogGraph`]
#[derive(Debug, Default)]
pub struct GraphBuilder {
    registry: ToolRegistry,
    primary: PrimaryScope,
    scopes: Vec<Scope>,
}

impl GraphBuilder {
    /// Start a graph over the given tools
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            primary: PrimaryScope::default(),
            scopes: Vec::new(),
        }
    }

    /// Declare the primary controller
    pub fn primary(mut self, primary: PrimaryScope) -> Self {
        self.primary = primary;
        self
    }

    /// Add a specialized scope
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Validate declarations and build the graph
    pub fn build(self) -> Result<DialogGraph> {
        self.validate()?;

        let registry = Arc::new(self.registry);
        let mut nodes = Vec::new();
        let mut tool_nodes = HashMap::new();
        let mut interrupts = InterruptConfig::default();

        nodes.push(NodeId::Primary);
        nodes.push(NodeId::PrimaryTools);
        tool_nodes.insert(
            PRIMARY_TOOLS_NODE.to_string(),
            ToolNode::new(PRIMARY_TOOLS_NODE, PRIMARY_SCOPE, registry.clone(), self.primary.tools.iter().cloned()),
        );

        for scope in &self.scopes {
            let safe = NodeId::SafeTools(scope.name.clone());
            let sensitive = NodeId::SensitiveTools(scope.name.clone());

            tool_nodes.insert(
                safe.name(),
                ToolNode::new(safe.name(), &scope.name, registry.clone(), scope.safe_tools.iter().cloned()),
            );
            tool_nodes.insert(
                sensitive.name(),
                ToolNode::new(sensitive.name(), &scope.name, registry.clone(), scope.all_tools().cloned()),
            );
            interrupts.interrupt_before.push(sensitive.name());

            nodes.push(NodeId::Enter(scope.name.clone()));
            nodes.push(NodeId::Policy(scope.name.clone()));
            nodes.push(safe);
            nodes.push(sensitive);
        }
        nodes.push(NodeId::Leave);

        let mut index = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            if index.insert(node.name(), node.clone()).is_some() {
                return Err(GraphError::Validation(format!(
                    "node name '{}' is produced by more than one declaration",
                    node.name()
                )));
            }
        }

        tracing::debug!(
            scopes = self.scopes.len(),
            nodes = nodes.len(),
            interrupts = ?interrupts.interrupt_before,
            "Dialog graph built"
        );

        Ok(DialogGraph {
            registry,
            primary: self.primary,
            scopes: self.scopes,
            nodes,
            index,
            tool_nodes,
            interrupts,
        })
    }

    fn validate(&self) -> Result<()> {
        let reserved = [PRIMARY_SCOPE, PRIMARY_TOOLS_NODE, LEAVE_NODE];

        if self.registry.has_tool(COMPLETE_OR_ESCALATE) {
            return Err(GraphError::Validation(format!(
                "'{COMPLETE_OR_ESCALATE}' is a routing signal and cannot be registered as a tool"
            )));
        }

        for tool in &self.primary.tools {
            self.require_tool(PRIMARY_SCOPE, tool)?;
        }

        let mut names = HashSet::new();
        let mut delegations = HashSet::new();
        for scope in &self.scopes {
            if scope.name.is_empty() || reserved.contains(&scope.name.as_str()) {
                return Err(GraphError::Validation(format!("invalid scope name '{}'", scope.name)));
            }
            if !names.insert(scope.name.as_str()) {
                return Err(GraphError::Validation(format!("duplicate scope '{}'", scope.name)));
            }
            if !delegations.insert(scope.delegation_tool.as_str()) {
                return Err(GraphError::Validation(format!(
                    "delegation tool '{}' is used by more than one scope",
                    scope.delegation_tool
                )));
            }
            if self.registry.has_tool(&scope.delegation_tool) {
                return Err(GraphError::Validation(format!(
                    "delegation tool '{}' is a routing signal and cannot be registered as a tool",
                    scope.delegation_tool
                )));
            }
            for tool in scope.all_tools() {
                self.require_tool(&scope.name, tool)?;
            }
            if let Some(both) = scope.safe_tools.iter().find(|t| scope.is_sensitive(t)) {
                return Err(GraphError::Validation(format!(
                    "tool '{}' is declared both safe and sensitive in scope '{}'",
                    both, scope.name
                )));
            }
        }
        Ok(())
    }

    fn require_tool(&self, scope: &str, tool: &str) -> Result<()> {
        if self.registry.has_tool(tool) {
            Ok(())
        } else {
            Err(GraphError::Validation(format!(
                "scope '{scope}' declares unknown tool '{tool}'"
            )))
        }
    }
}

/// Immutable dialog graph
#[derive(Debug)]
pub struct DialogGraph {
    registry: Arc<ToolRegistry>,
    primary: PrimaryScope,
    scopes: Vec<Scope>,
    nodes: Vec<NodeId>,
    index: HashMap<String, NodeId>,
    tool_nodes: HashMap<String, ToolNode>,
    interrupts: InterruptConfig,
}

impl DialogGraph {
    /// Shared tool registry
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Declared scopes, in declaration order
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Look up a scope by name
    pub fn scope(&self, name: &str) -> Result<&Scope> {
        self.scopes
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// All nodes, in construction order
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Resolve a node name
    pub fn node(&self, name: &str) -> Result<&NodeId> {
        self.index
            .get(name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// Tool node backing a tools-kind node
    pub fn tool_node(&self, node: &NodeId) -> Result<&ToolNode> {
        let name = node.name();
        self.tool_nodes
            .get(&name)
            .ok_or_else(|| GraphError::UnknownNode(name))
    }

    /// Interrupt points
    pub fn interrupts(&self) -> &InterruptConfig {
        &self.interrupts
    }

    /// Whether the engine pauses before `node`
    pub fn is_interrupt_point(&self, node: &NodeId) -> bool {
        self.interrupts.is_interrupt_before(&node.name())
    }

    /// What the policy of `node`'s owner may see and call
    pub fn scope_view(&self, node: &NodeId) -> Result<ScopeView> {
        match node.scope() {
            None => {
                let mut tools = self.primary.tools.clone();
                tools.extend(self.scopes.iter().map(|s| s.delegation_tool.clone()));
                Ok(ScopeView {
                    name: PRIMARY_SCOPE.to_string(),
                    tools,
                })
            }
            Some(name) => {
                let scope = self.scope(name)?;
                let mut tools: Vec<String> = scope.all_tools().cloned().collect();
                tools.push(COMPLETE_OR_ESCALATE.to_string());
                Ok(ScopeView {
                    name: scope.name.clone(),
                    tools,
                })
            }
        }
    }

    /// Policy node that should handle fresh user input
    pub fn entry_node(&self, state: &ConversationState) -> Result<NodeId> {
        match route_to_workflow(&state.dialog_stack) {
            None => Ok(NodeId::Primary),
            Some(scope) => Ok(NodeId::Policy(self.scope(scope)?.name.clone())),
        }
    }

    /// Node to run after `node` completed, `None` when the turn is over
    pub fn next_node(&self, node: &NodeId, state: &ConversationState) -> Result<Option<NodeId>> {
        match node {
            NodeId::Primary => {
                let Some(last) = state.last_message() else {
                    return Err(GraphError::routing(node.name(), "no message to route on"));
                };
                Ok(match route_primary(last, &self.scopes) {
                    PrimaryRoute::Terminate => None,
                    PrimaryRoute::Enter(scope) => Some(NodeId::Enter(scope)),
                    PrimaryRoute::PrimaryTools => Some(NodeId::PrimaryTools),
                })
            }
            NodeId::Policy(name) => {
                let scope = self.scope(name)?;
                let Some(last) = state.last_message() else {
                    return Err(GraphError::routing(node.name(), "no message to route on"));
                };
                Ok(match route_scope(last, scope) {
                    ScopeRoute::Terminate => None,
                    ScopeRoute::Leave => Some(NodeId::Leave),
                    ScopeRoute::SafeTools => Some(NodeId::SafeTools(name.clone())),
                    ScopeRoute::SensitiveTools => Some(NodeId::SensitiveTools(name.clone())),
                })
            }
            NodeId::Leave => self.entry_node(state).map(Some),
            NodeId::PrimaryTools | NodeId::SafeTools(_) | NodeId::SensitiveTools(_) | NodeId::Enter(_) => {
                Ok(Some(node.owner_policy()))
            }
        }
    }

    /// Render the graph as a Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut output = String::from("graph TD\n");
        output.push_str("    START((START))\n");
        output.push_str("    END((END))\n");

        for node in &self.nodes {
            let name = node.name();
            if self.is_interrupt_point(node) {
                output.push_str(&format!("    {name}[/\"{name}\"/]\n"));
                output.push_str(&format!("    style {name} fill:#FFE4B5,stroke:#FF8C00,stroke-width:2px\n"));
            } else {
                output.push_str(&format!("    {name}[\"{name}\"]\n"));
            }
        }

        output.push_str(&format!("    START -.-> {PRIMARY_SCOPE}\n"));
        for scope in &self.scopes {
            output.push_str(&format!("    START -.-> {}\n", scope.name));
        }

        output.push_str(&format!("    {PRIMARY_SCOPE} -.-> {PRIMARY_TOOLS_NODE}\n"));
        output.push_str(&format!("    {PRIMARY_TOOLS_NODE} --> {PRIMARY_SCOPE}\n"));
        output.push_str(&format!("    {PRIMARY_SCOPE} -.-> END\n"));

        for scope in &self.scopes {
            let s = &scope.name;
            output.push_str(&format!(
                "    {PRIMARY_SCOPE} -.\"{}\".-> enter_{s}\n",
                scope.delegation_tool
            ));
            output.push_str(&format!("    enter_{s} --> {s}\n"));
            output.push_str(&format!("    {s} -.-> {s}_safe_tools\n"));
            output.push_str(&format!("    {s} -.-> {s}_sensitive_tools\n"));
            output.push_str(&format!("    {s} -.\"{COMPLETE_OR_ESCALATE}\".-> {LEAVE_NODE}\n"));
            output.push_str(&format!("    {s} -.-> END\n"));
            output.push_str(&format!("    {s}_safe_tools --> {s}\n"));
            output.push_str(&format!("    {s}_sensitive_tools --> {s}\n"));
        }
        output.push_str(&format!("    {LEAVE_NODE} --> {PRIMARY_SCOPE}\n"));
        output
    }
}
