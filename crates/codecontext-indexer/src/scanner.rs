//! File discovery: walk the repository, apply include/exclude globs with
//! gitignore semantics, gate on size, and split hits into code files and
//! document files (markdown + config).

use codecontext_core::config::Config;
use codecontext_core::languages::{
    self, is_config_extension, is_markdown_extension, Language,
};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A discovered file with repo-relative path.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub kind: ScannedKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannedKind {
    Code(Language),
    Markdown,
    Config,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub code_files: Vec<ScannedFile>,
    pub document_files: Vec<ScannedFile>,
}

impl ScanResult {
    pub fn total(&self) -> usize {
        self.code_files.len() + self.document_files.len()
    }
}

/// Binary/generated artifacts never worth indexing, applied before the
/// configured patterns.
const BUILTIN_IGNORE_EXTENSIONS: &[&str] = &[
    ".exe", ".dll", ".so", ".dylib", ".o", ".a", ".wasm", ".pyc", ".class", ".jar", ".min.js",
    ".min.css",
];

const BUILTIN_IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".tox",
    "target",
    "build",
    "dist",
    ".next",
    ".nuxt",
    "vendor",
    ".venv",
    "venv",
    ".gradle",
    ".idea",
];

const BUILTIN_IGNORE_PATTERNS: &[&str] = &["*.generated.*", "*.pb.go", "*_generated.rs"];

pub struct FileScanner {
    repo_root: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    max_file_size: u64,
}

impl FileScanner {
    pub fn new(repo_root: &Path, config: &Config) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            include: config.project.include.clone(),
            exclude: config.project.exclude.clone(),
            max_file_size: config.max_file_size_bytes(),
        }
    }

    /// Walk the tree and classify every kept file.
    pub fn scan(&self) -> ScanResult {
        let mut walker = WalkBuilder::new(&self.repo_root);
        walker
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(false);

        // Include/exclude with gitwildmatch semantics: includes are
        // whitelist patterns, excludes are negated.
        let mut overrides = OverrideBuilder::new(&self.repo_root);
        let mut have_overrides = false;
        for pattern in &self.include {
            if pattern == "**/*" || pattern == "**" {
                continue;
            }
            if overrides.add(pattern).is_err() {
                warn!(pattern, "invalid include pattern, skipped");
            } else {
                have_overrides = true;
            }
        }
        for pattern in &self.exclude {
            let negated = format!("!{pattern}");
            if overrides.add(&negated).is_err() {
                warn!(pattern, "invalid exclude pattern, skipped");
            } else {
                have_overrides = true;
            }
        }
        if have_overrides {
            match overrides.build() {
                Ok(built) => {
                    walker.overrides(built);
                }
                Err(e) => warn!("failed to build override matcher: {e}"),
            }
        }

        let mut result = ScanResult::default();
        for entry in walker.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("walk error: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                continue;
            }

            let path_str = path.to_string_lossy();
            if should_ignore_builtin(&path_str) {
                debug!(?path, "skipped by built-in ignore");
                continue;
            }

            match std::fs::metadata(path) {
                Ok(metadata) if metadata.len() > self.max_file_size => {
                    warn!(?path, size = metadata.len(), "skipped: file too large");
                    continue;
                }
                Err(e) => {
                    warn!(?path, "skipped: {e}");
                    continue;
                }
                _ => {}
            }

            let Some(kind) = classify(path) else {
                continue;
            };

            let relative_path = path
                .strip_prefix(&self.repo_root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            let scanned = ScannedFile {
                path: path.to_path_buf(),
                relative_path,
                kind,
            };
            match kind {
                ScannedKind::Code(_) => result.code_files.push(scanned),
                ScannedKind::Markdown | ScannedKind::Config => {
                    result.document_files.push(scanned)
                }
            }
        }

        debug!(
            code = result.code_files.len(),
            documents = result.document_files.len(),
            "scan complete"
        );
        result
    }
}

fn classify(path: &Path) -> Option<ScannedKind> {
    let ext = path.extension()?.to_str()?;
    if let Some(language) = languages::detect_language_from_extension(ext) {
        return Some(ScannedKind::Code(language));
    }
    if is_markdown_extension(ext) {
        return Some(ScannedKind::Markdown);
    }
    if is_config_extension(ext) {
        return Some(ScannedKind::Config);
    }
    None
}

fn should_ignore_builtin(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    for dir in BUILTIN_IGNORE_DIRS {
        if normalized.contains(&format!("/{dir}/")) {
            return true;
        }
    }
    for ext in BUILTIN_IGNORE_EXTENSIONS {
        if normalized.ends_with(ext) {
            return true;
        }
    }
    builtin_ignore_globset().is_match(&normalized)
}

fn builtin_ignore_globset() -> &'static GlobSet {
    static SET: OnceLock<GlobSet> = OnceLock::new();
    SET.get_or_init(|| {
        let mut builder = GlobSetBuilder::new();
        for pattern in BUILTIN_IGNORE_PATTERNS {
            builder.add(Glob::new(pattern).expect("builtin ignore glob pattern must be valid"));
        }
        builder
            .build()
            .expect("builtin ignore glob set must build successfully")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_temp_project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("create tempdir");
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("create parent dirs");
            }
            fs::write(&full, content).expect("write file");
        }
        dir
    }

    fn scan(dir: &tempfile::TempDir, config: &Config) -> ScanResult {
        FileScanner::new(dir.path(), config).scan()
    }

    #[test]
    fn scan_separates_code_and_documents() {
        let dir = create_temp_project(&[
            ("src/main.py", "def main(): pass"),
            ("src/App.tsx", "export const App = () => null;"),
            ("README.md", "# Readme\n\n## Usage\ntext"),
            ("config/app.yaml", "server:\n  port: 8080"),
            ("image.png", "not really an image"),
        ]);
        let result = scan(&dir, &Config::default());

        let code: Vec<&str> = result
            .code_files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        assert!(code.contains(&"src/main.py"));
        assert!(code.contains(&"src/App.tsx"));

        let documents: Vec<&str> = result
            .document_files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        assert!(documents.contains(&"README.md"));
        assert!(documents.contains(&"config/app.yaml"));
        assert!(!documents.contains(&"image.png"));
    }

    #[test]
    fn scan_skips_builtin_ignore_dirs() {
        let dir = create_temp_project(&[
            ("src/main.py", "def main(): pass"),
            ("node_modules/pkg/index.js", "module.exports = {}"),
            ("__pycache__/main.pyc", "binary"),
        ]);
        let result = scan(&dir, &Config::default());
        assert!(
            !result
                .code_files
                .iter()
                .any(|f| f.relative_path.contains("node_modules"))
        );
        assert_eq!(result.code_files.len(), 1);
    }

    #[test]
    fn scan_respects_max_file_size() {
        let dir = create_temp_project(&[
            ("small.py", "def small(): pass"),
            ("large.py", &"x = 1\n".repeat(400_000)),
        ]);
        let mut config = Config::default();
        config.indexing.max_file_size_mb = 1;
        let result = scan(&dir, &config);
        let names: Vec<&str> = result
            .code_files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        assert!(names.contains(&"small.py"));
        assert!(!names.contains(&"large.py"));
    }

    #[test]
    fn exclude_patterns_filter_files() {
        let dir = create_temp_project(&[
            ("src/main.py", "def main(): pass"),
            ("tests/test_main.py", "def test(): pass"),
        ]);
        let mut config = Config::default();
        config.project.exclude.push("tests/**".to_string());
        let result = scan(&dir, &config);
        let names: Vec<&str> = result
            .code_files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        assert!(names.contains(&"src/main.py"));
        assert!(!names.iter().any(|n| n.starts_with("tests/")));
    }

    #[test]
    fn include_patterns_restrict_scan() {
        let dir = create_temp_project(&[
            ("src/main.py", "def main(): pass"),
            ("scripts/tool.py", "def tool(): pass"),
        ]);
        let mut config = Config::default();
        config.project.include = vec!["src/**".to_string()];
        let result = scan(&dir, &config);
        let names: Vec<&str> = result
            .code_files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        assert!(names.contains(&"src/main.py"));
        assert!(!names.contains(&"scripts/tool.py"));
    }
}
