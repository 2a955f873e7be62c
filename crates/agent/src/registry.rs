use std::time::Duration;

use quotesmith_core::config::AppConfig;
use quotesmith_core::{Role, RoleConfig};

use crate::prompts::PromptLibrary;

/// Immutable role table resolved from configuration at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct RoleRegistry {
    orchestrator: RoleConfig,
    analyst: RoleConfig,
    generator: RoleConfig,
    max_output_tokens: u32,
}

impl RoleRegistry {
    pub fn from_config(config: &AppConfig) -> Self {
        let resolve = |role: Role| {
            let settings = config.agent.role(role);
            RoleConfig {
                role,
                template: PromptLibrary::template_name(role),
                model: config.model_for(role).to_string(),
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
                timeout: Duration::from_secs(settings.timeout_secs),
                required_keys: role.required_keys(),
            }
        };

        Self {
            orchestrator: resolve(Role::Orchestrator),
            analyst: resolve(Role::Analyst),
            generator: resolve(Role::Generator),
            max_output_tokens: config.agent.max_output_tokens,
        }
    }

    pub fn get(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Orchestrator => &self.orchestrator,
            Role::Analyst => &self.analyst,
            Role::Generator => &self.generator,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleConfig> {
        Role::ALL.into_iter().map(|role| self.get(role))
    }

    /// Global ceiling applied to every per-call output budget.
    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    /// Builder used at construction time, mostly by tests that need a short deadline.
    pub fn with_timeout(mut self, role: Role, timeout: Duration) -> Self {
        let config = match role {
            Role::Orchestrator => &mut self.orchestrator,
            Role::Analyst => &mut self.analyst,
            Role::Generator => &mut self.generator,
        };
        config.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quotesmith_core::config::AppConfig;
    use quotesmith_core::Role;

    use super::RoleRegistry;

    #[test]
    fn registry_resolves_role_settings_and_default_model() {
        let mut config = AppConfig::default();
        config.agent.generator.model = Some("big-model".to_string());

        let registry = RoleRegistry::from_config(&config);

        let analyst = registry.get(Role::Analyst);
        assert_eq!(analyst.model, config.llm.model);
        assert_eq!(analyst.max_tokens, 4000);
        assert_eq!(analyst.timeout, Duration::from_secs(90));
        assert_eq!(analyst.template, "analyst");
        assert_eq!(registry.get(Role::Generator).model, "big-model");
        assert_eq!(registry.max_output_tokens(), 8192);
    }

    #[test]
    fn iteration_follows_pipeline_order() {
        let registry = RoleRegistry::from_config(&AppConfig::default());
        let roles = registry.iter().map(|config| config.role).collect::<Vec<_>>();
        assert_eq!(roles, Role::ALL.to_vec());
    }

    #[test]
    fn with_timeout_only_touches_one_role() {
        let registry = RoleRegistry::from_config(&AppConfig::default())
            .with_timeout(Role::Orchestrator, Duration::from_millis(20));

        assert_eq!(registry.get(Role::Orchestrator).timeout, Duration::from_millis(20));
        assert_eq!(registry.get(Role::Analyst).timeout, Duration::from_secs(90));
    }
}
