//! Template storage.
//!
//! Built-in templates are registered once at startup and are immutable at
//! runtime; operators may register additional custom templates.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::Channel;

use super::builtin::builtin_templates;
use super::render::{self, RenderedMessage, VariableCheck};
use super::types::{MessageTemplate, TemplateError, TemplateResult};

/// In-memory template registry keyed by template id.
pub struct TemplateStore {
    templates: DashMap<String, MessageTemplate>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Create a store pre-loaded with the built-in template set.
    pub fn with_builtins() -> Arc<Self> {
        let store = Self::new();
        for template in builtin_templates() {
            // Built-ins are static and validated by their own tests
            let _ = store.register(template);
        }
        Arc::new(store)
    }

    /// Register a new template.
    pub fn register(&self, template: MessageTemplate) -> TemplateResult<MessageTemplate> {
        template.validate()?;

        if self.templates.contains_key(&template.id) {
            return Err(TemplateError::AlreadyExists(template.id));
        }

        self.templates
            .insert(template.id.clone(), template.clone());
        Ok(template)
    }

    /// Look up a template by id.
    pub fn get(&self, id: &str) -> TemplateResult<MessageTemplate> {
        self.templates
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// List all registered templates.
    pub fn list(&self) -> Vec<MessageTemplate> {
        self.templates.iter().map(|e| e.value().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }

    /// Check supplied variables against a template's requirements.
    pub fn validate_variables(
        &self,
        id: &str,
        variables: &HashMap<String, String>,
    ) -> TemplateResult<VariableCheck> {
        let template = self.get(id)?;
        Ok(render::validate_variables(&template, variables))
    }

    /// Render a template by id for one channel.
    pub fn render(
        &self,
        id: &str,
        channel: Channel,
        variables: &HashMap<String, String>,
    ) -> TemplateResult<RenderedMessage> {
        let template = self.get(id)?;
        render::render(&template, channel, variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_template() -> MessageTemplate {
        MessageTemplate {
            id: "promo".to_string(),
            name: "Promotion".to_string(),
            kind: "promo".to_string(),
            channels: vec![Channel::Sms],
            subject: None,
            sms_template: "{{offer}} just for you".to_string(),
            email_template: None,
            whatsapp_template: None,
            required_variables: vec!["offer".to_string()],
        }
    }

    #[test]
    fn test_builtins_registered() {
        let store = TemplateStore::with_builtins();
        assert!(store.get("payment_reminder").is_ok());
        assert!(store.get("welcome").is_ok());
        assert!(store.count() >= 5);
    }

    #[test]
    fn test_register_and_render_custom() {
        let store = TemplateStore::new();
        store.register(custom_template()).unwrap();

        let mut vars = HashMap::new();
        vars.insert("offer".to_string(), "20% off".to_string());

        let rendered = store.render("promo", Channel::Sms, &vars).unwrap();
        assert_eq!(rendered.body, "20% off just for you");
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let store = TemplateStore::new();
        store.register(custom_template()).unwrap();
        assert!(matches!(
            store.register(custom_template()),
            Err(TemplateError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_unknown_template() {
        let store = TemplateStore::new();
        assert!(matches!(
            store.get("nope"),
            Err(TemplateError::NotFound(_))
        ));
    }
}
