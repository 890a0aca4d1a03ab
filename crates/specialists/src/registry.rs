//! Specialist registry: id → handler, resolved once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use switchyard_common::{Result, Specialist, SwitchyardError};
use switchyard_llm::LlmClient;
use tracing::info;

use crate::config::{SpecialistConfig, SpecialistKind};
use crate::{HttpSpecialist, LlmSpecialist, StaticSpecialist};

/// Decision value meaning "no further specialist is needed".
pub const END_SENTINEL: &str = "END";

/// Spellings of the END sentinel accepted from the decision source.
pub const END_ALIASES: &[&str] = &["END", "__end__"];

#[derive(Default, Clone)]
pub struct SpecialistRegistry {
    specialists: BTreeMap<String, Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own id.
    pub fn register(&mut self, specialist: Arc<dyn Specialist>) -> Result<()> {
        let id = specialist.id().to_string();
        if id.trim().is_empty() {
            return Err(SwitchyardError::Registry("specialist id must not be empty".into()));
        }
        if END_ALIASES.iter().any(|alias| alias.eq_ignore_ascii_case(&id)) {
            return Err(SwitchyardError::Registry(format!(
                "'{id}' is reserved for the END sentinel"
            )));
        }
        if self.specialists.contains_key(&id) {
            return Err(SwitchyardError::Registry(format!(
                "specialist '{id}' registered twice"
            )));
        }
        self.specialists.insert(id, specialist);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, specialist: Arc<dyn Specialist>) -> Result<Self> {
        self.register(specialist)?;
        Ok(self)
    }

    /// Build every configured specialist. LLM specialists share `llm`.
    pub fn from_configs(configs: &[SpecialistConfig], llm: Arc<dyn LlmClient>) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(build_specialist(config, llm.clone())?)?;
        }
        info!(specialists = ?registry.ids().collect::<Vec<_>>(), "Specialist registry ready");
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Specialist>> {
        self.specialists.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.specialists.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.specialists.keys().map(String::as_str)
    }

    /// `(id, description)` pairs for prompt building, ordered by id.
    pub fn roster(&self) -> Vec<(&str, &str)> {
        self.specialists
            .iter()
            .map(|(id, s)| (id.as_str(), s.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }
}

impl std::fmt::Debug for SpecialistRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistRegistry")
            .field("ids", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

fn build_specialist(config: &SpecialistConfig, llm: Arc<dyn LlmClient>) -> Result<Arc<dyn Specialist>> {
    let specialist: Arc<dyn Specialist> = match config.kind {
        SpecialistKind::Static => {
            let reply = config.reply.clone().ok_or_else(|| {
                SwitchyardError::Config(format!("static specialist '{}' needs a reply", config.id))
            })?;
            Arc::new(StaticSpecialist::new(&config.id, &config.description, reply))
        }
        SpecialistKind::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                SwitchyardError::Config(format!("http specialist '{}' needs an endpoint", config.id))
            })?;
            Arc::new(HttpSpecialist::new(
                &config.id,
                &config.description,
                endpoint,
                Duration::from_millis(config.timeout_ms),
            )?)
        }
        SpecialistKind::Llm => {
            let mut specialist = LlmSpecialist::new(&config.id, &config.description, llm)
                .with_temperature(config.temperature);
            if let Some(prompt) = &config.system_prompt {
                specialist = specialist.with_system_prompt(prompt);
            }
            Arc::new(specialist)
        }
    };
    Ok(specialist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_llm::ScriptedClient;

    fn static_one(id: &str) -> Arc<dyn Specialist> {
        Arc::new(StaticSpecialist::new(id, format!("{id} handler"), "ok"))
    }

    #[test]
    fn register_and_lookup() {
        let registry = SpecialistRegistry::new()
            .with(static_one("metrics-query"))
            .unwrap()
            .with(static_one("domain-lookup"))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("domain-lookup"));
        assert!(!registry.contains("bogus-id"));
        assert!(registry.get("metrics-query").is_some());
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["domain-lookup", "metrics-query"]
        );
        assert_eq!(registry.roster()[0], ("domain-lookup", "domain-lookup handler"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = SpecialistRegistry::new();
        registry.register(static_one("other")).unwrap();
        assert!(matches!(
            registry.register(static_one("other")),
            Err(SwitchyardError::Registry(_))
        ));
    }

    #[test]
    fn end_sentinel_cannot_be_registered() {
        let mut registry = SpecialistRegistry::new();
        assert!(registry.register(static_one("END")).is_err());
        assert!(registry.register(static_one("__end__")).is_err());
        assert!(registry.register(static_one("")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn from_configs_builds_each_kind() {
        let configs = vec![
            SpecialistConfig::http("domain-lookup", "Domain lookups", "http://127.0.0.1:10025/lookup"),
            SpecialistConfig::llm("creative-other", "Creative asks", "Be witty."),
            SpecialistConfig::static_reply("other", "Fallback", "Sorry."),
        ];
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedClient::new());

        let registry = SpecialistRegistry::from_configs(&configs, llm).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("creative-other").unwrap().description(), "Creative asks");
    }

    #[test]
    fn from_configs_reports_missing_fields() {
        let mut broken = SpecialistConfig::http("domain-lookup", "Domain lookups", "x");
        broken.endpoint = None;
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedClient::new());

        let err = SpecialistRegistry::from_configs(&[broken], llm).unwrap_err();
        assert!(matches!(err, SwitchyardError::Config(_)));
    }
}
