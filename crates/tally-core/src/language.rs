use serde::{Deserialize, Serialize};

/// Display language preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ja,
    #[default]
    En,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::En => "en",
        }
    }

    /// Anything other than `ja` falls back to English.
    pub fn parse_or_default(value: &str) -> Self {
        if value == "ja" { Language::Ja } else { Language::En }
    }

    pub fn toggled(self) -> Self {
        match self {
            Language::Ja => Language::En,
            Language::En => Language::Ja,
        }
    }
}
