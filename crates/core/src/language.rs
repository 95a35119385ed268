//! Languages, scripts and language preferences
//!
//! The set of scripts is closed: a character either belongs to one of the
//! recognized Unicode blocks below or it carries no script information
//! (digits, punctuation, whitespace, symbols, unknown blocks).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Writing system recognized by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Latin,
    Bengali,
    Devanagari,
    Arabic,
    Gurmukhi,
    Gujarati,
    Odia,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
}

impl Script {
    /// All recognized scripts
    pub const ALL: [Script; 11] = [
        Script::Latin,
        Script::Bengali,
        Script::Devanagari,
        Script::Arabic,
        Script::Gurmukhi,
        Script::Gujarati,
        Script::Odia,
        Script::Tamil,
        Script::Telugu,
        Script::Kannada,
        Script::Malayalam,
    ];

    /// Classify a single character by Unicode block
    pub fn of(c: char) -> Option<Script> {
        let code = c as u32;
        match code {
            // Basic and extended Latin, letters only
            0x0041..=0x005A | 0x0061..=0x007A => Some(Script::Latin),
            0x00C0..=0x024F if c.is_alphabetic() => Some(Script::Latin),
            0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF if c.is_alphabetic() => {
                Some(Script::Arabic)
            }
            0x0900..=0x097F | 0xA8E0..=0xA8FF => Some(Script::Devanagari),
            // Bengali/Assamese
            0x0980..=0x09FF => Some(Script::Bengali),
            0x0A00..=0x0A7F => Some(Script::Gurmukhi),
            0x0A80..=0x0AFF => Some(Script::Gujarati),
            0x0B00..=0x0B7F => Some(Script::Odia),
            0x0B80..=0x0BFF => Some(Script::Tamil),
            0x0C00..=0x0C7F => Some(Script::Telugu),
            0x0C80..=0x0CFF => Some(Script::Kannada),
            0x0D00..=0x0D7F => Some(Script::Malayalam),
            _ => None,
        }
    }

    /// Primary language written in this script
    pub fn primary_language(&self) -> Language {
        match self {
            Script::Latin => Language::English,
            Script::Bengali => Language::Bengali,
            Script::Devanagari => Language::Hindi,
            Script::Arabic => Language::Urdu,
            Script::Gurmukhi => Language::Punjabi,
            Script::Gujarati => Language::Gujarati,
            Script::Odia => Language::Odia,
            Script::Tamil => Language::Tamil,
            Script::Telugu => Language::Telugu,
            Script::Kannada => Language::Kannada,
            Script::Malayalam => Language::Malayalam,
        }
    }
}

/// Language with a known code and script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Language {
    Bengali,
    English,
    Hindi,
    Urdu,
    Punjabi,
    Gujarati,
    Odia,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
}

impl Language {
    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::Bengali => "bn",
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Urdu => "ur",
            Language::Punjabi => "pa",
            Language::Gujarati => "gu",
            Language::Odia => "or",
            Language::Tamil => "ta",
            Language::Telugu => "te",
            Language::Kannada => "kn",
            Language::Malayalam => "ml",
        }
    }

    /// English name, as some transcription APIs report it
    pub fn name(&self) -> &'static str {
        match self {
            Language::Bengali => "bengali",
            Language::English => "english",
            Language::Hindi => "hindi",
            Language::Urdu => "urdu",
            Language::Punjabi => "punjabi",
            Language::Gujarati => "gujarati",
            Language::Odia => "odia",
            Language::Tamil => "tamil",
            Language::Telugu => "telugu",
            Language::Kannada => "kannada",
            Language::Malayalam => "malayalam",
        }
    }

    /// Script the language is written in
    pub fn script(&self) -> Script {
        match self {
            Language::Bengali => Script::Bengali,
            Language::English => Script::Latin,
            Language::Hindi => Script::Devanagari,
            Language::Urdu => Script::Arabic,
            Language::Punjabi => Script::Gurmukhi,
            Language::Gujarati => Script::Gujarati,
            Language::Odia => Script::Odia,
            Language::Tamil => Script::Tamil,
            Language::Telugu => Script::Telugu,
            Language::Kannada => Script::Kannada,
            Language::Malayalam => Script::Malayalam,
        }
    }

    /// Parse an ISO code or an English language name, case-insensitively
    pub fn parse(value: &str) -> Option<Language> {
        let v = value.trim().to_ascii_lowercase();
        let lang = match v.as_str() {
            "bn" | "bengali" | "bangla" => Language::Bengali,
            "en" | "english" => Language::English,
            "hi" | "hindi" => Language::Hindi,
            "ur" | "urdu" => Language::Urdu,
            "pa" | "punjabi" | "panjabi" => Language::Punjabi,
            "gu" | "gujarati" => Language::Gujarati,
            "or" | "odia" | "oriya" => Language::Odia,
            "ta" | "tamil" => Language::Tamil,
            "te" | "telugu" => Language::Telugu,
            "kn" | "kannada" => Language::Kannada,
            "ml" | "malayalam" => Language::Malayalam,
            _ => return None,
        };
        Some(lang)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<Language> for &'static str {
    fn from(lang: Language) -> Self {
        lang.code()
    }
}

impl TryFrom<String> for Language {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Language::parse(&value).ok_or_else(|| format!("unknown language: {}", value))
    }
}

/// Language expectation for a session or a transcription call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LanguagePreference {
    /// Let the backend detect the language
    #[default]
    Auto,
    /// Force a specific language
    Explicit(Language),
}

impl LanguagePreference {
    /// Parse a client/config hint. Empty, `auto` and `auto_detect` mean auto;
    /// unknown codes are rejected.
    pub fn parse(value: Option<&str>) -> Result<Self, String> {
        let Some(raw) = value else {
            return Ok(Self::Auto);
        };
        let v = raw.trim();
        if v.is_empty() || v.eq_ignore_ascii_case("auto") || v.eq_ignore_ascii_case("auto_detect")
        {
            return Ok(Self::Auto);
        }
        Language::parse(v)
            .map(Self::Explicit)
            .ok_or_else(|| format!("unsupported language hint: {}", raw))
    }

    /// The forced language, if any
    pub fn language(&self) -> Option<Language> {
        match self {
            Self::Auto => None,
            Self::Explicit(lang) => Some(*lang),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Explicit(lang) => lang.code(),
        }
    }
}

impl fmt::Display for LanguagePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Language> for LanguagePreference {
    fn from(lang: Language) -> Self {
        Self::Explicit(lang)
    }
}
