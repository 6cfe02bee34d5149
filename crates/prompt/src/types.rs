//! Prompt definitions and rendered prompts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt definition, either built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier, e.g. `pawtrip.answer`
    pub id: String,

    pub title: String,

    #[serde(rename = "apiVersion")]
    pub api_version: String,

    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    #[serde(default)]
    pub behavior: PromptBehavior,

    /// Variables the caller must supply
    #[serde(default)]
    pub variables: Vec<String>,

    /// Optional system message (Handlebars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// User message template (Handlebars)
    pub template: String,

    pub output: PromptOutputSpec,
}

/// Sampling hints carried with the prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptBehavior {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub style: String,
}

/// Expected output shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// "csv", "json" or "markdown"
    pub format: String,
}

/// A rendered prompt ready for an LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub system: Option<String>,
    pub user: String,
    pub temperature: Option<f32>,
    pub metadata: BuiltPromptMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: test.prompt
title: Test Prompt
apiVersion: "1.0"
behavior:
  temperature: 0.0
variables: [query]
template: "{{query}}"
output:
  format: csv
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "test.prompt");
        assert_eq!(def.behavior.temperature, Some(0.0));
        assert_eq!(def.variables, vec!["query".to_string()]);
        assert!(def.system.is_none());
        assert!(def.created_by.is_empty());
    }

    #[test]
    fn test_behavior_is_optional() {
        let yaml = r#"
id: bare
title: Bare
apiVersion: "1.0"
template: "hi"
output:
  format: markdown
"#;
        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.behavior.temperature.is_none());
        assert!(def.variables.is_empty());
    }
}
