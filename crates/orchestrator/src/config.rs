//! Swarm configuration.
//!
//! A swarm is a set of named agents, each bound to a model and a working
//! directory, plus the shared integrations every agent can reach. The
//! configuration is external input: it is typically loaded from YAML, and
//! [`SwarmConfig::validate`] is called before the pool is initialized.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use covey_core::{Error, Result};

/// Configuration for one agent in the swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Human-readable description, surfaced in peer tool descriptors.
    #[serde(default)]
    pub description: String,

    /// Working directory for built-in tools and commands.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Model identifier handed to the model-invocation layer.
    #[serde(default = "default_model")]
    pub model: String,

    /// Built-in tools this agent may use. Empty means all built-ins.
    #[serde(default)]
    pub allowed_tools: Vec<String>,

    /// Names of peer agents this agent may call as tools.
    #[serde(default)]
    pub connect_to_agents: Vec<String>,

    /// Whether this agent is exposed as a callable tool to its peers.
    #[serde(default = "default_expose")]
    pub expose_as_tool: bool,

    /// Names of shared integrations this agent connects to.
    #[serde(default)]
    pub integrations: Vec<String>,
}

impl Default for AgentDefinition {
    fn default() -> Self {
        Self {
            description: String::new(),
            directory: default_directory(),
            model: default_model(),
            allowed_tools: Vec::new(),
            connect_to_agents: Vec::new(),
            expose_as_tool: default_expose(),
            integrations: Vec::new(),
        }
    }
}

impl AgentDefinition {
    /// Create a definition with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Allow a built-in tool.
    #[must_use]
    pub fn with_allowed_tool(mut self, tool: impl Into<String>) -> Self {
        self.allowed_tools.push(tool.into());
        self
    }

    /// Add a peer agent.
    #[must_use]
    pub fn with_peer(mut self, agent: impl Into<String>) -> Self {
        self.connect_to_agents.push(agent.into());
        self
    }

    /// Add a shared integration.
    #[must_use]
    pub fn with_integration(mut self, name: impl Into<String>) -> Self {
        self.integrations.push(name.into());
        self
    }
}

/// Configuration for one shared integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Integration name, matched against agent `integrations` lists.
    pub name: String,

    /// Integration kind (issue tracker, chat, browser automation, ...).
    #[serde(default)]
    pub kind: String,

    /// Integration-specific settings, passed through untouched.
    #[serde(default)]
    pub settings: Value,
}

/// Configuration for the swarm system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Swarm name, used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Named agents. BTreeMap keeps worker spawn order deterministic.
    pub agents: BTreeMap<String, AgentDefinition>,

    /// Cap on the number of workers; unset means one per agent.
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Shared integrations available to agents that declare them.
    #[serde(default)]
    pub integrations: Vec<IntegrationConfig>,
}

fn default_name() -> String {
    "covey".to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_model() -> String {
    "default".to_string()
}

fn default_expose() -> bool {
    true
}

impl SwarmConfig {
    /// Create an empty swarm configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: BTreeMap::new(),
            max_parallel: None,
            integrations: Vec::new(),
        }
    }

    /// Add an agent.
    #[must_use]
    pub fn with_agent(mut self, name: impl Into<String>, definition: AgentDefinition) -> Self {
        self.agents.insert(name.into(), definition);
        self
    }

    /// Set the parallelism cap.
    #[must_use]
    pub fn with_max_parallel(mut self, cap: usize) -> Self {
        self.max_parallel = Some(cap);
        self
    }

    /// Declare a shared integration.
    #[must_use]
    pub fn with_integration(mut self, config: IntegrationConfig) -> Self {
        self.integrations.push(config);
        self
    }

    /// Load a configuration from YAML.
    pub fn from_yaml(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).map_err(|e| Error::yaml_parse_failed(e.to_string()))
    }

    /// Validate the configuration.
    ///
    /// Rejects empty agent sets, peer references to unknown agents, agents
    /// peered with themselves, references to undeclared integrations, and a
    /// zero parallelism cap.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(Error::invalid_config("swarm has no agents"));
        }

        if self.max_parallel == Some(0) {
            return Err(Error::invalid_config("max_parallel must be greater than 0"));
        }

        let integration_names: Vec<&str> =
            self.integrations.iter().map(|i| i.name.as_str()).collect();

        for (name, agent) in &self.agents {
            for peer in &agent.connect_to_agents {
                if peer == name {
                    return Err(Error::invalid_config(format!(
                        "agent '{name}' is peered with itself"
                    )));
                }
                if !self.agents.contains_key(peer) {
                    return Err(Error::invalid_config(format!(
                        "agent '{name}' references unknown peer '{peer}'"
                    )));
                }
            }
            for integration in &agent.integrations {
                if !integration_names.contains(&integration.as_str()) {
                    return Err(Error::invalid_config(format!(
                        "agent '{name}' references undeclared integration '{integration}'"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Agent names in spawn order, honoring the parallelism cap.
    #[must_use]
    pub fn worker_names(&self) -> Vec<String> {
        let cap = self.max_parallel.unwrap_or(self.agents.len());
        self.agents.keys().take(cap).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    fn two_agent_config() -> SwarmConfig {
        SwarmConfig::new("test")
            .with_agent(
                "lead",
                AgentDefinition::new()
                    .with_description("coordinates the others")
                    .with_peer("researcher"),
            )
            .with_agent("researcher", AgentDefinition::new())
    }

    #[test]
    fn should_validate_well_formed_config() {
        assert!(two_agent_config().validate().is_ok());
    }

    #[test]
    fn should_reject_empty_agent_set() {
        let config = SwarmConfig::new("empty");
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_unknown_peer_reference() {
        let config = SwarmConfig::new("test")
            .with_agent("lead", AgentDefinition::new().with_peer("ghost"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn should_reject_self_peering() {
        let config =
            SwarmConfig::new("test").with_agent("lead", AgentDefinition::new().with_peer("lead"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("peered with itself"));
    }

    #[test]
    fn should_reject_undeclared_integration() {
        let config = SwarmConfig::new("test")
            .with_agent("lead", AgentDefinition::new().with_integration("github"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("github"));
    }

    #[test]
    fn should_reject_zero_parallelism() {
        let config = two_agent_config().with_max_parallel(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_cap_worker_names_at_max_parallel() {
        let config = two_agent_config().with_max_parallel(1);
        assert_eq!(config.worker_names(), vec!["lead".to_string()]);
    }

    #[test]
    fn should_load_config_from_yaml() {
        let yaml = r#"
name: research-swarm
max_parallel: 4
agents:
  lead:
    description: Coordinates research
    model: sonnet
    directory: ./lead
    connect_to_agents: [researcher]
    integrations: [tracker]
  researcher:
    description: Digs into sources
    allowed_tools: [read_file, search]
integrations:
  - name: tracker
    kind: issues
"#;
        let config = SwarmConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "research-swarm");
        assert_eq!(config.agents.len(), 2);
        assert!(config.validate().is_ok());

        let lead = config.agents.get("lead").unwrap();
        assert_eq!(lead.model, "sonnet");
        assert_eq!(lead.connect_to_agents, vec!["researcher".to_string()]);

        let researcher = config.agents.get("researcher").unwrap();
        assert_eq!(researcher.model, "default");
        assert_eq!(researcher.allowed_tools.len(), 2);
    }

    #[test]
    fn should_reject_malformed_yaml() {
        assert!(SwarmConfig::from_yaml("agents: [not, a, map]").is_err());
    }
}
