use serde::{Deserialize, Serialize};

/// Input limits applied before and during parsing.
///
/// These bound the work a single parse can do: oversized input is rejected
/// before tokenizing, and deeply nested groups are rejected before they can
/// exhaust the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserLimits {
    /// Maximum statement length in characters. Default: 4096.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Maximum nesting depth of `(...)` and `not (...)` groups. Default: 32.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            max_depth: default_max_depth(),
        }
    }
}

impl ParserLimits {
    /// Byte offset of the first character past `max_length`, if any.
    pub fn length_overflow(&self, text: &str) -> Option<usize> {
        text.char_indices().nth(self.max_length).map(|(offset, _)| offset)
    }
}

fn default_max_length() -> usize {
    4096
}

fn default_max_depth() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = ParserLimits::default();
        assert_eq!(limits.max_length, 4096);
        assert_eq!(limits.max_depth, 32);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let limits: ParserLimits = toml::from_str("max_depth = 4").unwrap();
        assert_eq!(limits.max_depth, 4);
        assert_eq!(limits.max_length, 4096);
    }

    #[test]
    fn test_length_counts_characters() {
        let limits = ParserLimits {
            max_length: 3,
            ..Default::default()
        };
        assert_eq!(limits.length_overflow("abc"), None);
        assert_eq!(limits.length_overflow("ééé"), None);
        assert_eq!(limits.length_overflow("éééé"), Some(6));
        assert_eq!(limits.length_overflow("abcd"), Some(3));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<ParserLimits>("max_width = 4").is_err());
    }
}
