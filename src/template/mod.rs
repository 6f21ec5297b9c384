//! Message templating: named per-channel templates with `{{variable}}`
//! substitution and fail-closed variable validation.

mod builtin;
mod render;
mod store;
mod types;

pub use builtin::builtin_templates;
pub use render::{substitute, validate_variables, RenderedMessage, VariableCheck};
pub use store::TemplateStore;
pub use types::{MessageTemplate, TemplateError, TemplateResult};
