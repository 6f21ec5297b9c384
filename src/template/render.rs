//! Variable substitution and validation for templates.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::Channel;

use super::types::{MessageTemplate, TemplateError, TemplateResult};

/// A rendered message ready to hand to a channel provider.
///
/// The subject is populated only for email renders of templates that declare
/// one; every other channel carries a bare body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub subject: Option<String>,
    pub body: String,
}

/// Outcome of checking supplied variables against a template's requirements.
#[derive(Debug, Clone, Serialize)]
pub struct VariableCheck {
    pub valid: bool,
    pub missing: Vec<String>,
}

/// Replace every `{{name}}` token that has a supplied value.
///
/// Tokens without a matching variable are left verbatim in the output. That is
/// a documented limitation, not an error: required variables are enforced
/// separately by [`validate_variables`], and optional tokens surface visibly
/// rather than vanishing.
pub fn substitute(text: &str, variables: &HashMap<String, String>) -> String {
    let mut result = text.to_string();
    for (key, value) in variables {
        let token = format!("{{{{{}}}}}", key);
        result = result.replace(&token, value);
    }
    result
}

/// Check that every required variable is present and non-empty.
///
/// Fails closed: any missing variable makes the whole check invalid, and the
/// caller must treat that as a permanent (non-retryable) failure.
pub fn validate_variables(
    template: &MessageTemplate,
    variables: &HashMap<String, String>,
) -> VariableCheck {
    let missing: Vec<String> = template
        .required_variables
        .iter()
        .filter(|name| !variables.contains_key(name.as_str()))
        .cloned()
        .collect();

    VariableCheck {
        valid: missing.is_empty(),
        missing,
    }
}

/// Render a template for one channel.
pub fn render(
    template: &MessageTemplate,
    channel: Channel,
    variables: &HashMap<String, String>,
) -> TemplateResult<RenderedMessage> {
    let check = validate_variables(template, variables);
    if !check.valid {
        return Err(TemplateError::MissingVariables {
            template_id: template.id.clone(),
            missing: check.missing,
        });
    }

    let body = substitute(template.body_for(channel), variables);

    let subject = match (channel, &template.subject) {
        (Channel::Email, Some(subject)) => Some(substitute(subject, variables)),
        _ => None,
    };

    Ok(RenderedMessage { subject, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn payment_reminder() -> MessageTemplate {
        MessageTemplate {
            id: "payment_reminder".to_string(),
            name: "Payment Reminder".to_string(),
            kind: "payment_reminder".to_string(),
            channels: vec![Channel::Sms, Channel::Email, Channel::Whatsapp],
            subject: Some("Payment due on {{dueDate}}".to_string()),
            sms_template:
                "Hi {{name}}, your payment of {{amount}} for {{vehicleName}} is due on {{dueDate}}."
                    .to_string(),
            email_template: None,
            whatsapp_template: None,
            required_variables: vec![
                "name".to_string(),
                "amount".to_string(),
                "dueDate".to_string(),
                "vehicleName".to_string(),
            ],
        }
    }

    #[test]
    fn test_all_supplied_variables_substituted() {
        let variables = vars(&[
            ("name", "Amina"),
            ("amount", "UGX 50,000"),
            ("dueDate", "2024-06-01"),
            ("vehicleName", "Toyota Corolla"),
        ]);

        let rendered = render(&payment_reminder(), Channel::Sms, &variables).unwrap();
        assert!(rendered.body.contains("Amina"));
        assert!(rendered.body.contains("UGX 50,000"));
        assert!(rendered.body.contains("2024-06-01"));
        assert!(rendered.body.contains("Toyota Corolla"));
        assert!(!rendered.body.contains("{{"));
        assert!(rendered.subject.is_none());
    }

    #[test]
    fn test_email_renders_subject() {
        let variables = vars(&[
            ("name", "Amina"),
            ("amount", "UGX 50,000"),
            ("dueDate", "2024-06-01"),
            ("vehicleName", "Toyota Corolla"),
        ]);

        let rendered = render(&payment_reminder(), Channel::Email, &variables).unwrap();
        assert_eq!(rendered.subject.as_deref(), Some("Payment due on 2024-06-01"));
    }

    #[test]
    fn test_missing_variable_fails_closed() {
        let variables = vars(&[("name", "Amina"), ("amount", "UGX 50,000")]);

        let check = validate_variables(&payment_reminder(), &variables);
        assert!(!check.valid);
        assert_eq!(check.missing, vec!["dueDate", "vehicleName"]);

        let err = render(&payment_reminder(), Channel::Sms, &variables).unwrap_err();
        assert!(matches!(err, TemplateError::MissingVariables { .. }));
    }

    #[test]
    fn test_unmatched_tokens_left_verbatim() {
        let out = substitute("Hello {{name}}, ref {{unknown}}", &vars(&[("name", "Joe")]));
        assert_eq!(out, "Hello Joe, ref {{unknown}}");
    }
}
