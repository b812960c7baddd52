use crate::grammars;
use codecontext_core::error::ParseError;
use codecontext_core::languages::{self, Language};

/// Parse a source file with tree-sitter, enforcing the per-language timeout.
///
/// Tree-sitter recovers from syntax errors on its own, so a tree comes back
/// even for broken files; `None` from the parser means timeout or a grammar
/// failure and maps to an error the sync engine logs and skips.
pub fn parse_source(
    source: &str,
    language: Language,
    path: &str,
) -> Result<tree_sitter::Tree, ParseError> {
    let mut parser = tree_sitter::Parser::new();
    let grammar = grammars::grammar_for(language, path);
    parser
        .set_language(&grammar)
        .map_err(|e| ParseError::GrammarNotAvailable {
            language: format!("{language}: {e}"),
        })?;

    let timeout_micros = languages::parse_timeout_micros(language);
    parser.set_timeout_micros(timeout_micros);

    parser.parse(source, None).ok_or_else(|| ParseError::Timeout {
        path: path.to_string(),
        timeout_ms: timeout_micros / 1000,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_python() {
        let tree = parse_source("def hello():\n    return 1\n", Language::Python, "a.py").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn recovers_from_syntax_errors() {
        let tree = parse_source("def broken(:\n  ???\n", Language::Python, "b.py").unwrap();
        assert!(tree.root_node().has_error());
    }

    #[test]
    fn parses_all_supported_languages() {
        let samples = [
            (Language::Python, "x = 1\n", "a.py"),
            (Language::Java, "class A {}\n", "A.java"),
            (Language::Kotlin, "class A\n", "A.kt"),
            (Language::JavaScript, "const a = 1;\n", "a.js"),
            (Language::TypeScript, "const a: number = 1;\n", "a.ts"),
        ];
        for (language, source, path) in samples {
            parse_source(source, language, path)
                .unwrap_or_else(|e| panic!("{language} failed: {e}"));
        }
    }
}
