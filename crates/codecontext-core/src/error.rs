use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config value: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("provider '{name}' not found. Available providers: {}", format_available(.available))]
    ProviderNotFound { name: String, available: Vec<String> },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(String),

    #[error("corrupt index state: {0}")]
    CorruptState(String),

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    InvalidChecksum {
        path: String,
        expected: String,
        actual: String,
    },

    #[error(
        "project '{project}' not found.{}\nUse 'codecontext list-projects' to see all available projects.",
        format_suggestions(.suggestions)
    )]
    ProjectNotFound {
        project: String,
        suggestions: Vec<String>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Convenience constructor for SQLite errors — use with `.map_err(StorageError::sqlite)`.
    pub fn sqlite<E: std::fmt::Display>(e: E) -> Self {
        Self::Sqlite(e.to_string())
    }

    pub fn project_not_found(project: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::ProjectNotFound {
            project: project.into(),
            suggestions,
        }
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = suggestions
        .iter()
        .take(3)
        .map(|s| format!("  - {s}"))
        .collect();
    format!("\nDid you mean:\n{}", lines.join("\n"))
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding runtime error: {0}")]
    Runtime(String),

    #[error("embedding output size mismatch: expected={expected} got={got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("external embedding provider error: {0}")]
    External(String),
}

impl EmbeddingError {
    pub fn runtime<E: std::fmt::Display>(e: E) -> Self {
        Self::Runtime(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("tree-sitter parse failed: {path}")]
    TreeSitterFailed { path: String },

    #[error("parse timed out after {timeout_ms}ms: {path}")]
    Timeout { path: String, timeout_ms: u64 },

    #[error("grammar not available: {language}")]
    GrammarNotAvailable { language: String },

    #[error("unsupported language: {language}")]
    UnsupportedLanguage { language: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("not a git repository: {path}")]
    NotGitRepo { path: String },

    #[error("git error: {0}")]
    Git(String),
}

impl VcsError {
    pub fn git<E: std::fmt::Display>(e: E) -> Self {
        Self::Git(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("file not in repository: {path}")]
    FileNotInRepository { path: String },

    #[error("chunk {chunk_index} failed after {attempts} attempts: {reason}")]
    ChunkFailed {
        chunk_index: usize,
        attempts: u32,
        reason: String,
    },

    #[error("indexing cancelled")]
    Cancelled,

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(
        "search query cannot be empty.\n\nUsage: codecontext search \"your query\"\nExample: codecontext search \"user authentication\""
    )]
    EmptyQuery,

    #[error("invalid parameter '{param}' = {value}: {constraint}")]
    InvalidParameter {
        param: String,
        value: String,
        constraint: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl SearchError {
    pub fn invalid_parameter(
        param: impl Into<String>,
        value: impl std::fmt::Display,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_not_found_lists_suggestions() {
        let err = StorageError::project_not_found(
            "acme",
            vec!["acme-api (1a2b)".into(), "acme-web (3c4d)".into()],
        );
        let message = err.to_string();
        assert!(message.contains("Did you mean"));
        assert!(message.contains("acme-api"));
        assert!(message.contains("list-projects"));
    }

    #[test]
    fn provider_not_found_names_alternatives() {
        let err = ConfigError::ProviderNotFound {
            name: "qdrant".into(),
            available: vec!["embedded".into()],
        };
        assert!(err.to_string().contains("Available providers: embedded"));
    }

    #[test]
    fn empty_query_carries_usage_hint() {
        assert!(SearchError::EmptyQuery.to_string().contains("Usage:"));
    }
}
