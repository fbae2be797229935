//! Message template rendering.
//!
//! Message bodies carry `{{field}}` placeholders resolved against the
//! contact's attribute map. Rendering is built on minijinja; unresolved
//! tokens render as empty strings, and a template that fails to parse
//! degrades to the raw text (a malformed template is configuration, not a
//! delivery failure).

use copper_pigeon_contact::ContactProfile;
use minijinja::Environment;
use std::fmt;

/// Error from template rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    /// What minijinja reported.
    pub reason: String,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template rendering failed: {}", self.reason)
    }
}

impl std::error::Error for RenderError {}

/// Renders a template against a contact's attributes.
///
/// # Errors
///
/// Returns an error if the template does not parse or rendering fails.
pub fn try_render(template: &str, profile: &ContactProfile) -> Result<String, RenderError> {
    let env = Environment::new();
    env.render_str(template, profile.attributes())
        .map_err(|e| RenderError {
            reason: e.to_string(),
        })
}

/// Renders a template, falling back to the raw text on failure.
#[must_use]
pub fn render(template: &str, profile: &ContactProfile) -> String {
    match try_render(template, profile) {
        Ok(rendered) => rendered,
        Err(error) => {
            tracing::warn!(%error, "template failed to render, sending raw text");
            template.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copper_pigeon_core::ContactId;
    use serde_json::json;

    fn profile() -> ContactProfile {
        ContactProfile::new(ContactId::new())
            .with_name("Test User")
            .with_email("test@example.com")
    }

    #[test]
    fn substitutes_contact_attributes() {
        let rendered = render(
            "Hello {{name}}! Your email is {{email}}.",
            &profile(),
        );
        assert_eq!(rendered, "Hello Test User! Your email is test@example.com.");
    }

    #[test]
    fn substitutes_custom_fields() {
        let profile = profile().with_field("plan", json!("pro"));
        let rendered = render("You are on the {{plan}} plan.", &profile);
        assert_eq!(rendered, "You are on the pro plan.");
    }

    #[test]
    fn unresolved_token_renders_empty() {
        let rendered = render("Hi {{nickname}}!", &profile());
        assert_eq!(rendered, "Hi !");
    }

    #[test]
    fn template_without_tokens_passes_through() {
        let rendered = render("Plain text.", &profile());
        assert_eq!(rendered, "Plain text.");
    }

    #[test]
    fn malformed_template_degrades_to_raw_text() {
        let raw = "Hello {% if %}";
        assert!(try_render(raw, &profile()).is_err());
        assert_eq!(render(raw, &profile()), raw);
    }
}
