use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLanguage {
    #[default]
    Turkish,
    English,
}

impl AppLanguage {
    /// Unknown or missing codes fall back to Turkish.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
            Some("en") => Self::English,
            _ => Self::Turkish,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Turkish => "tr",
            Self::English => "en",
        }
    }

    /// Appended to every prompt so free text comes back in the user's language.
    pub fn prompt_instruction(self) -> &'static str {
        match self {
            Self::Turkish => "Answer in Turkish.",
            Self::English => "Answer in English.",
        }
    }
}
