//! Shared external integrations.
//!
//! A shared integration is an external tool or service (issue tracker,
//! chat, browser automation) exposed identically to every agent that
//! declares it. The orchestrator only knows the [`SharedIntegration`]
//! seam; concrete transports live with the embedder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use covey_core::{Error, Result};

/// An external service callable by agents as `{action, params}`.
#[async_trait]
pub trait SharedIntegration: Send + Sync {
    /// Integration name, matched against tool-call names.
    fn name(&self) -> &str;

    /// Establish the connection. Called once per declaring agent during
    /// pool initialization; failures are logged, not fatal.
    async fn connect(&self) -> Result<()>;

    /// Dispatch an action and return a textual summary of what happened.
    async fn call(&self, action: &str, params: &Value) -> Result<String>;

    /// Release the connection. Called during pool shutdown.
    async fn disconnect(&self) {}
}

/// Registry of shared integrations, keyed by name.
///
/// Built once before the pool starts and immutable afterwards, so lookups
/// are lock-free.
#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    map: HashMap<String, Arc<dyn SharedIntegration>>,
}

impl IntegrationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an integration under its own name.
    pub fn register(&mut self, integration: Arc<dyn SharedIntegration>) {
        self.map.insert(integration.name().to_string(), integration);
    }

    /// Look up an integration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn SharedIntegration>> {
        self.map.get(name).cloned()
    }

    /// Whether the registry holds an integration with this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }

    /// A registry restricted to the given names. Unknown names are dropped.
    #[must_use]
    pub fn subset(&self, names: &[String]) -> Self {
        let map = names
            .iter()
            .filter_map(|n| self.map.get(n).map(|i| (n.clone(), i.clone())))
            .collect();
        Self { map }
    }

    /// Disconnect every registered integration.
    pub async fn disconnect_all(&self) {
        for integration in self.map.values() {
            integration.disconnect().await;
        }
    }
}

impl std::fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// In-memory integration that records every call and answers with a
/// textual summary. Used in tests and as a wiring placeholder.
pub struct RecordingIntegration {
    name: String,
    fail_connect: bool,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingIntegration {
    /// Create a recording integration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail_connect: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make `connect` fail, for exercising degraded initialization.
    #[must_use]
    pub fn with_failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Calls recorded so far, as `(action, params)` pairs.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SharedIntegration for RecordingIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<()> {
        if self.fail_connect {
            return Err(Error::integration_failed(&self.name, "connection refused"));
        }
        Ok(())
    }

    async fn call(&self, action: &str, params: &Value) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((action.to_string(), params.clone()));
        }
        Ok(format!("{} performed {action}", self.name))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn should_record_calls_with_params() {
        let integration = RecordingIntegration::new("tracker");
        let params = serde_json::json!({"title": "bug"});

        let summary = integration.call("create-issue", &params).await.unwrap();

        assert_eq!(summary, "tracker performed create-issue");
        assert_eq!(integration.calls(), vec![("create-issue".to_string(), params)]);
    }

    #[tokio::test]
    async fn should_fail_connect_when_configured() {
        let integration = RecordingIntegration::new("tracker").with_failing_connect();
        assert!(integration.connect().await.is_err());
    }

    #[test]
    fn should_look_up_registered_integration() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Arc::new(RecordingIntegration::new("chat")));

        assert!(registry.contains("chat"));
        assert!(registry.get("chat").is_some());
        assert!(registry.get("browser").is_none());
    }

    #[test]
    fn should_restrict_registry_to_subset() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Arc::new(RecordingIntegration::new("chat")));
        registry.register(Arc::new(RecordingIntegration::new("tracker")));

        let subset = registry.subset(&["tracker".to_string(), "ghost".to_string()]);

        assert_eq!(subset.names(), vec!["tracker".to_string()]);
    }
}
