//! Resolves prompt definitions from workspace overrides or built-ins.

use crate::builtin;
use crate::types::PromptDefinition;
use pawtrip_core::{AppError, AppResult};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path
        .join(pawtrip_core::config::STATE_DIR)
        .join("prompts")
}

/// Load a prompt by id.
///
/// `.pawtrip/prompts/<id>.yml` wins over the built-in prompt of the same id.
///
/// # Example
/// ```no_run
/// use pawtrip_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "pawtrip.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let override_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    let (contents, origin) = if override_file.exists() {
        tracing::debug!("Loading prompt override from {:?}", override_file);
        let contents = std::fs::read_to_string(&override_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                override_file, e
            ))
        })?;
        (contents, override_file.display().to_string())
    } else {
        let contents = builtin::source(prompt_id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))?;
        (contents.to_string(), "built-in".to_string())
    };

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML ({}): {}", origin, e))
    })?;

    validate_prompt(&definition)?;

    tracing::debug!(id = %definition.id, %origin, "prompt loaded");

    Ok(definition)
}

/// All prompt ids available in the workspace, built-ins included.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut ids: BTreeSet<String> = builtin::ids().map(str::to_string).collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.insert(stem.to_string());
                }
            }
        }
    }

    Ok(ids.into_iter().collect())
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt {} has an empty template",
            def.id
        )));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if let Some(t) = def.behavior.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(AppError::Prompt(format!(
                "Prompt {} temperature {} is outside 0.0..=2.0",
                def.id, t
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, id: &str, body: &str) {
        let prompts = prompts_dir(dir);
        fs::create_dir_all(&prompts).unwrap();
        fs::write(prompts.join(format!("{}.yml", id)), body).unwrap();
    }

    #[test]
    fn test_builtins_load_and_validate() {
        let temp_dir = TempDir::new().unwrap();
        for id in builtin::ids() {
            let prompt = load_prompt(temp_dir.path(), id).unwrap();
            assert_eq!(prompt.id, id);
        }
    }

    #[test]
    fn test_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            builtin::ANSWER,
            r#"
id: pawtrip.answer
title: Short answers
apiVersion: "1.1"
variables: [query]
template: "짧게 답하세요: {{query}}"
output:
  format: markdown
"#,
        );

        let prompt = load_prompt(temp_dir.path(), builtin::ANSWER).unwrap();
        assert_eq!(prompt.title, "Short answers");
    }

    #[test]
    fn test_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            load_prompt(temp_dir.path(), "nonexistent"),
            Err(AppError::Prompt(_))
        ));
    }

    #[test]
    fn test_invalid_yaml_override() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "broken", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "broken").is_err());
    }

    #[test]
    fn test_bad_temperature_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "hot",
            r#"
id: hot
title: Hot
apiVersion: "1.0"
behavior:
  temperature: 3.5
template: "x"
output:
  format: markdown
"#,
        );
        assert!(load_prompt(temp_dir.path(), "hot").is_err());
    }

    #[test]
    fn test_list_prompts_merges_overrides() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "custom.greeting", "id: x");

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert!(prompts.contains(&"custom.greeting".to_string()));
        assert!(prompts.contains(&builtin::CLASSIFY.to_string()));
        assert_eq!(prompts.len(), 4);
    }
}
