//! Template types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Channel;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid template ID: {0}")]
    InvalidId(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Missing required variables for template {template_id}: {}", missing.join(", "))]
    MissingVariables {
        template_id: String,
        missing: Vec<String>,
    },
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// A named, parameterized per-channel message template.
///
/// The SMS body is mandatory and doubles as the fallback for channels without a
/// dedicated body. The subject only applies to email rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    /// Unique template identifier (alphanumeric, dash, underscore)
    pub id: String,

    /// Human-readable template name
    pub name: String,

    /// Business notification type this template produces
    pub kind: String,

    /// Channels this template supports
    pub channels: Vec<Channel>,

    /// Email subject line (optional, may contain variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// SMS body, also the fallback body for other channels
    pub sms_template: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_template: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_template: Option<String>,

    /// Variables that must be supplied for rendering to proceed
    #[serde(default)]
    pub required_variables: Vec<String>,
}

impl MessageTemplate {
    /// Validate the template definition
    pub fn validate(&self) -> TemplateResult<()> {
        if self.id.is_empty() || self.id.len() > 64 {
            return Err(TemplateError::InvalidId(
                "ID must be 1-64 characters".to_string(),
            ));
        }

        if !self
            .id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TemplateError::InvalidId(
                "ID must contain only alphanumeric, dash, or underscore".to_string(),
            ));
        }

        if self.name.is_empty() || self.name.len() > 256 {
            return Err(TemplateError::InvalidTemplate(
                "Name must be 1-256 characters".to_string(),
            ));
        }

        if self.sms_template.is_empty() {
            return Err(TemplateError::InvalidTemplate(
                "SMS body must not be empty".to_string(),
            ));
        }

        if self.channels.is_empty() {
            return Err(TemplateError::InvalidTemplate(
                "Template must support at least one channel".to_string(),
            ));
        }

        Ok(())
    }

    /// The body text used for a given channel, falling back to the SMS body.
    pub fn body_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Sms => &self.sms_template,
            Channel::Email => self.email_template.as_deref().unwrap_or(&self.sms_template),
            Channel::Whatsapp => self
                .whatsapp_template
                .as_deref()
                .unwrap_or(&self.sms_template),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> MessageTemplate {
        MessageTemplate {
            id: "welcome".to_string(),
            name: "Welcome".to_string(),
            kind: "welcome".to_string(),
            channels: vec![Channel::Sms, Channel::Email],
            subject: Some("Welcome to Jua".to_string()),
            sms_template: "Hi {{name}}".to_string(),
            email_template: Some("Dear {{name}},".to_string()),
            whatsapp_template: None,
            required_variables: vec!["name".to_string()],
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(template().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_id() {
        let mut t = template();
        t.id = "no spaces allowed".to_string();
        assert!(matches!(t.validate(), Err(TemplateError::InvalidId(_))));
    }

    #[test]
    fn test_body_falls_back_to_sms() {
        let t = template();
        assert_eq!(t.body_for(Channel::Whatsapp), "Hi {{name}}");
        assert_eq!(t.body_for(Channel::Email), "Dear {{name}},");
    }
}
