//! Built-in message templates for marketplace lifecycle notifications.
//!
//! Variable names are camelCase to match the field names carried by upstream
//! domain events.

use crate::domain::Channel;

use super::types::MessageTemplate;

fn all_channels() -> Vec<Channel> {
    vec![Channel::Sms, Channel::Email, Channel::Whatsapp]
}

fn required(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// The template set registered at startup.
pub fn builtin_templates() -> Vec<MessageTemplate> {
    vec![
        MessageTemplate {
            id: "payment_reminder".to_string(),
            name: "Payment Reminder".to_string(),
            kind: "payment_reminder".to_string(),
            channels: all_channels(),
            subject: Some("Payment reminder: {{vehicleName}}".to_string()),
            sms_template:
                "Hi {{name}}, your payment of {{amount}} for {{vehicleName}} is due on {{dueDate}}. Pay on time to keep your ride."
                    .to_string(),
            email_template: Some(
                "Dear {{name}},\n\nThis is a reminder that your payment of {{amount}} for {{vehicleName}} is due on {{dueDate}}.\n\nThe Jua Team"
                    .to_string(),
            ),
            whatsapp_template: None,
            required_variables: required(&["name", "amount", "dueDate", "vehicleName"]),
        },
        MessageTemplate {
            id: "payment_confirmation".to_string(),
            name: "Payment Confirmation".to_string(),
            kind: "payment_confirmation".to_string(),
            channels: all_channels(),
            subject: Some("Payment received".to_string()),
            sms_template: "Hi {{name}}, we received your payment of {{amount}}. Thank you!"
                .to_string(),
            email_template: None,
            whatsapp_template: None,
            required_variables: required(&["name", "amount"]),
        },
        MessageTemplate {
            id: "payment_failed".to_string(),
            name: "Payment Failed".to_string(),
            kind: "payment_failed".to_string(),
            channels: all_channels(),
            subject: Some("Payment failed".to_string()),
            sms_template:
                "Hi {{name}}, your payment of {{amount}} failed: {{reason}}. Please try again."
                    .to_string(),
            email_template: None,
            whatsapp_template: None,
            required_variables: required(&["name", "amount", "reason"]),
        },
        MessageTemplate {
            id: "payment_overdue".to_string(),
            name: "Payment Overdue".to_string(),
            kind: "payment_overdue".to_string(),
            channels: all_channels(),
            subject: Some("Payment overdue".to_string()),
            sms_template:
                "Hi {{name}}, your payment of {{amount}} is {{daysOverdue}} days overdue. Please pay now to avoid penalties."
                    .to_string(),
            email_template: None,
            whatsapp_template: None,
            required_variables: required(&["name", "amount", "daysOverdue"]),
        },
        MessageTemplate {
            id: "welcome".to_string(),
            name: "Welcome".to_string(),
            kind: "welcome".to_string(),
            channels: all_channels(),
            subject: Some("Welcome to Jua, {{name}}!".to_string()),
            sms_template:
                "Welcome to Jua, {{name}}! Browse vehicles and start your rent-to-own journey today."
                    .to_string(),
            email_template: Some(
                "Dear {{name}},\n\nWelcome to Jua! Your account is ready. Browse vehicles and start your rent-to-own journey today.\n\nThe Jua Team"
                    .to_string(),
            ),
            whatsapp_template: None,
            required_variables: required(&["name"]),
        },
        MessageTemplate {
            id: "risk_alert".to_string(),
            name: "Vehicle Risk Alert".to_string(),
            kind: "risk_alert".to_string(),
            channels: all_channels(),
            subject: Some("Urgent: vehicle alert".to_string()),
            sms_template:
                "Hi {{name}}, we detected a critical issue with your vehicle: {{riskType}}. Our team will contact you shortly."
                    .to_string(),
            email_template: None,
            whatsapp_template: None,
            required_variables: required(&["name", "riskType"]),
        },
    ]
}
