use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Recognition languages supported by the session. The tag bound at `start`
/// is immutable for the lifetime of that stream; a new selection only takes
/// effect on the next start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageTag {
    EnUs,
    JaJp,
}

impl LanguageTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageTag::EnUs => "en-US",
            LanguageTag::JaJp => "ja-JP",
        }
    }

    pub fn all() -> &'static [LanguageTag] {
        &[LanguageTag::EnUs, LanguageTag::JaJp]
    }
}

impl Default for LanguageTag {
    fn default() -> Self {
        LanguageTag::EnUs
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown language tag: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for LanguageTag {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en-US" => Ok(LanguageTag::EnUs),
            "ja-JP" => Ok(LanguageTag::JaJp),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}
