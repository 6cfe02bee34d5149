//! Renders prompt definitions into messages.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use handlebars::Handlebars;
use pawtrip_core::{AppError, AppResult};
use std::collections::HashMap;

/// Render a prompt with the supplied variables.
///
/// Every name listed in the definition's `variables` must be present.
/// Values are inserted verbatim (no HTML escaping).
///
/// # Example
/// ```no_run
/// use pawtrip_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("query".to_string(), "속초에 강아지랑 1박 2일".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let missing: Vec<&str> = definition
        .variables
        .iter()
        .filter(|name| !variables.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt {} is missing variables: {}",
            definition.id,
            missing.join(", ")
        )));
    }

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?
        .map(|s| s.trim_end().to_string());

    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        system,
        user,
        temperature: definition.behavior.temperature,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            resolved_variables: variables,
        },
    })
}

/// Render a Handlebars template.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptBehavior, PromptOutputSpec};

    fn definition() -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            behavior: PromptBehavior {
                temperature: Some(0.3),
                style: String::new(),
            },
            variables: vec!["query".to_string(), "region".to_string()],
            system: Some("지역: {{region}}\n".to_string()),
            template: "질문: {{query}}".to_string(),
            output: PromptOutputSpec {
                format: "markdown".to_string(),
            },
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_does_not_escape() {
        let out = render_template("{{x}}", &vars(&[("x", "[속초](https://a?b=1&c=2)")])).unwrap();
        assert_eq!(out, "[속초](https://a?b=1&c=2)");
    }

    #[test]
    fn test_build_prompt_renders_system_and_user() {
        let built =
            build_prompt(&definition(), vars(&[("query", "강아지랑 여행"), ("region", "속초")]))
                .unwrap();

        assert_eq!(built.system.as_deref(), Some("지역: 속초"));
        assert_eq!(built.user, "질문: 강아지랑 여행");
        assert_eq!(built.temperature, Some(0.3));
        assert_eq!(built.metadata.source_prompt_id, "test.prompt");
    }

    #[test]
    fn test_missing_variable_is_error() {
        let err = build_prompt(&definition(), vars(&[("query", "q")])).unwrap_err();
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_undeclared_variable_renders_empty() {
        let out = render_template("[{{missing}}]", &HashMap::new()).unwrap();
        assert_eq!(out, "[]");
    }
}
