//! Stable project identity.
//!
//! A project is identified by its git origin URL when available (so clones of
//! the same repository share an index) and by its absolute path otherwise.
//! The normalized form is a DNS-label-safe collection name.

use crate::repo::GitRepo;
use codecontext_core::checksum;
use std::path::Path;

/// Derive the stable 16-hex-char project id for a repository path.
pub fn project_id(repo_path: &Path) -> String {
    if let Ok(repo) = GitRepo::open(repo_path) {
        if let Some(origin) = repo.remote_origin_url() {
            let origin = origin.trim();
            if !origin.is_empty() {
                return checksum::digest_str(&normalize_origin(origin));
            }
        }
    }
    let absolute = repo_path
        .canonicalize()
        .unwrap_or_else(|_| repo_path.to_path_buf());
    checksum::digest_str(&absolute.to_string_lossy())
}

/// Strip scheme, convert scp-style `git@host:` to `host/`, drop `.git`.
fn normalize_origin(origin: &str) -> String {
    origin
        .replace("https://", "")
        .replace("http://", "")
        .replace("git@", "")
        .replace(':', "/")
        .trim_end_matches(".git")
        .to_string()
}

/// Normalize a project id into a DNS-label-safe collection name:
/// lowercase, `[a-z0-9-]` only, no leading/trailing hyphens, max 63 chars
/// (longer ids are truncated to 50 chars plus a 10-hex digest suffix).
pub fn normalize_project_id(project_id: &str) -> String {
    let mut normalized: String = project_id
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    normalized = normalized.trim_matches('-').to_string();

    if normalized.len() > 63 {
        let suffix = &checksum::digest_str(project_id)[..10];
        normalized = format!("{}-{}", &normalized[..50], suffix);
    }

    if normalized.is_empty() {
        "default-project".to_string()
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_normalization_strips_scheme_and_suffix() {
        assert_eq!(
            normalize_origin("https://github.com/acme/repo.git"),
            "github.com/acme/repo"
        );
        assert_eq!(
            normalize_origin("git@github.com:acme/repo.git"),
            "github.com/acme/repo"
        );
    }

    #[test]
    fn ssh_and_https_clones_share_an_id() {
        assert_eq!(
            checksum::digest_str(&normalize_origin("git@github.com:acme/repo.git")),
            checksum::digest_str(&normalize_origin("https://github.com/acme/repo.git"))
        );
    }

    #[test]
    fn path_fallback_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = project_id(dir.path());
        let second = project_id(dir.path());
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn normalization_produces_dns_label() {
        assert_eq!(
            normalize_project_id("GitHub.com/ACME/Repo.git"),
            "github-com-acme-repo-git"
        );
        assert_eq!(normalize_project_id("--weird__name--"), "weird--name");
        assert_eq!(normalize_project_id("***"), "default-project");
    }

    #[test]
    fn overlong_ids_get_digest_suffix() {
        let long = "x".repeat(80);
        let normalized = normalize_project_id(&long);
        assert_eq!(normalized.len(), 61); // 50 + '-' + 10
        assert!(normalized.starts_with(&"x".repeat(50)));
    }
}
