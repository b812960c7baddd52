use serde::{Deserialize, Serialize};

/// First-class source languages with full parser/extractor support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    Kotlin,
    JavaScript,
    TypeScript,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Java,
        Language::Kotlin,
        Language::JavaScript,
        Language::TypeScript,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
        }
    }

    pub fn parse(raw: &str) -> Option<Language> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "python" => Some(Language::Python),
            "java" => Some(Language::Java),
            "kotlin" => Some(Language::Kotlin),
            "javascript" => Some(Language::JavaScript),
            "typescript" => Some(Language::TypeScript),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect a source language from a file extension.
pub fn detect_language_from_extension(ext: &str) -> Option<Language> {
    match ext {
        "py" | "pyi" => Some(Language::Python),
        "java" => Some(Language::Java),
        "kt" | "kts" => Some(Language::Kotlin),
        "js" | "jsx" => Some(Language::JavaScript),
        "ts" | "tsx" => Some(Language::TypeScript),
        _ => None,
    }
}

pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];
pub const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "toml", "properties"];

pub fn is_markdown_extension(ext: &str) -> bool {
    MARKDOWN_EXTENSIONS.contains(&ext)
}

pub fn is_config_extension(ext: &str) -> bool {
    CONFIG_EXTENSIONS.contains(&ext)
}

/// Per-language tree-sitter parse timeout. Kotlin's grammar is the slowest
/// on deeply nested DSL-style sources, TypeScript sits in between.
pub fn parse_timeout_micros(language: Language) -> u64 {
    match language {
        Language::Python | Language::Java | Language::JavaScript => 5_000_000,
        Language::TypeScript => 7_000_000,
        Language::Kotlin => 10_000_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection_covers_supported_languages() {
        assert_eq!(detect_language_from_extension("py"), Some(Language::Python));
        assert_eq!(detect_language_from_extension("kt"), Some(Language::Kotlin));
        assert_eq!(
            detect_language_from_extension("tsx"),
            Some(Language::TypeScript)
        );
        assert_eq!(
            detect_language_from_extension("jsx"),
            Some(Language::JavaScript)
        );
        assert_eq!(detect_language_from_extension("md"), None);
        assert_eq!(detect_language_from_extension("toml"), None);
    }

    #[test]
    fn document_extensions_are_disjoint_from_code() {
        for ext in MARKDOWN_EXTENSIONS.iter().chain(CONFIG_EXTENSIONS) {
            assert!(detect_language_from_extension(ext).is_none());
        }
    }

    #[test]
    fn language_round_trips_through_str() {
        for language in Language::ALL {
            assert_eq!(Language::parse(language.as_str()), Some(language));
        }
    }
}
