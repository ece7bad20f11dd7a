use serde::{Deserialize, Serialize};

/// A document field that upstream stores either as a scalar or as a list.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StringOrVec {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrVec {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Single(value) => Some(value.as_str()),
            Self::Multiple(values) => values.first().map(|value| value.as_str()),
        }
    }

    /// True for an absent value, an empty string, or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Single(value) => value.is_empty(),
            Self::Multiple(values) => values.is_empty(),
        }
    }

    /// First element of a list, the scalar itself, or `""`.
    pub fn first_or_empty(&self) -> String {
        self.first().unwrap_or_default().to_string()
    }
}
