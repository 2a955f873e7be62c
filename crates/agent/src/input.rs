use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Named inputs handed to one role execution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleInput {
    fields: Map<String, Value>,
}

impl RoleInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Source document text, empty when the input carries none.
    pub fn document(&self) -> &str {
        self.fields.get("document").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn keys(&self) -> BTreeSet<String> {
        self.fields.keys().cloned().collect()
    }

    /// Approximate size of everything the prompt will embed.
    pub fn char_len(&self) -> usize {
        self.fields
            .values()
            .map(|value| match value {
                Value::String(text) => text.chars().count(),
                other => other.to_string().chars().count(),
            })
            .sum()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::RoleInput;

    #[test]
    fn document_defaults_to_empty() {
        assert_eq!(RoleInput::new().document(), "");
        assert_eq!(RoleInput::new().with("document", 42).document(), "");
    }

    #[test]
    fn keys_and_sizes_cover_all_fields() {
        let input = RoleInput::new().with("document", "abcd").with("metadata", json!({"k": "v"}));

        assert_eq!(
            input.keys().into_iter().collect::<Vec<_>>(),
            vec!["document".to_string(), "metadata".to_string()]
        );
        assert_eq!(input.char_len(), 4 + r#"{"k":"v"}"#.len());
    }
}
