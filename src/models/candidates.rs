//! Model identifiers and prioritized candidate lists

use serde::{Deserialize, Serialize};
use std::fmt;

const RESOURCE_PREFIX: &str = "models/";

/// Identifier of one upstream model, e.g. `gemini-2.5-flash`
///
/// Accepts both the bare name and the `models/`-prefixed resource form;
/// [`ModelId::resource_path`] normalizes to the latter.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the `models/` prefix, used for logs and metric labels
    pub fn short_name(&self) -> &str {
        self.0.strip_prefix(RESOURCE_PREFIX).unwrap_or(&self.0)
    }

    /// `models/<name>` path segment used in API URLs
    pub fn resource_path(&self) -> String {
        format!("{}{}", RESOURCE_PREFIX, self.short_name())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl From<String> for ModelId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ModelId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Ordered model identifiers, highest priority first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCandidates(Vec<ModelId>);

impl ModelCandidates {
    pub fn new(models: Vec<ModelId>) -> Self {
        Self(models)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any identifier is blank
    pub fn has_blank(&self) -> bool {
        self.0.iter().any(|m| m.short_name().trim().is_empty())
    }
}

impl<S: Into<ModelId>> FromIterator<S> for ModelCandidates {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a ModelCandidates {
    type Item = &'a ModelId;
    type IntoIter = std::slice::Iter<'a, ModelId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_path_adds_prefix_once() {
        assert_eq!(ModelId::from("gemini-2.5-pro").resource_path(), "models/gemini-2.5-pro");
        assert_eq!(
            ModelId::from("models/gemini-2.5-pro").resource_path(),
            "models/gemini-2.5-pro"
        );
    }

    #[test]
    fn test_display_uses_short_name() {
        assert_eq!(ModelId::from("models/gemini-flash-latest").to_string(), "gemini-flash-latest");
    }

    #[test]
    fn test_candidates_deserialize_from_plain_list_in_order() {
        #[derive(Deserialize)]
        struct Wrapper {
            chain: ModelCandidates,
        }
        let parsed: Wrapper = toml::from_str(r#"chain = ["a", "models/b", "c"]"#).unwrap();
        let names: Vec<_> = parsed.chain.iter().map(|m| m.short_name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blank_identifier_detected() {
        let candidates: ModelCandidates = ["ok", "  "].into_iter().collect();
        assert!(candidates.has_blank());
    }
}
