//! Prompt definitions for pawtrip.
//!
//! Prompts are YAML documents with Handlebars templates. The classifier,
//! intent extractor and answer generator each have a built-in prompt that a
//! workspace can override under `.pawtrip/prompts/`.

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

pub use builder::{build_prompt, render_template};
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec};
