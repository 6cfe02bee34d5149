//! Prompts compiled into the binary.
//!
//! Each can be replaced by dropping a file with the same id into
//! `.pawtrip/prompts/`.

pub const CLASSIFY: &str = "pawtrip.classify";
pub const INTENT: &str = "pawtrip.intent";
pub const ANSWER: &str = "pawtrip.answer";

const SOURCES: &[(&str, &str)] = &[
    (CLASSIFY, include_str!("../prompts/pawtrip.classify.yml")),
    (INTENT, include_str!("../prompts/pawtrip.intent.yml")),
    (ANSWER, include_str!("../prompts/pawtrip.answer.yml")),
];

/// Raw YAML of a built-in prompt.
pub fn source(id: &str) -> Option<&'static str> {
    SOURCES
        .iter()
        .find(|(name, _)| *name == id)
        .map(|(_, yaml)| *yaml)
}

/// Ids of all built-in prompts.
pub fn ids() -> impl Iterator<Item = &'static str> {
    SOURCES.iter().map(|(name, _)| *name)
}
