//! Per-project metadata side file.
//!
//! Lives alongside the store's persistent state under
//! `$DATA_DIR/<project_id>/metadata.json` so deleting the project directory
//! removes everything at once.

use codecontext_core::constants::METADATA_FILE;
use codecontext_core::error::StorageError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_id: String,
    pub name: String,
    pub git_origin: Option<String>,
    pub indexed_at: String,
    pub source_path: String,
    pub last_used: String,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Write (or refresh) a project's metadata after a successful index run.
pub fn update_project_metadata(
    data_dir: &Path,
    project_id: &str,
    name: &str,
    git_origin: Option<String>,
    source_path: &Path,
) -> Result<ProjectMetadata, StorageError> {
    let project_dir = data_dir.join(project_id);
    std::fs::create_dir_all(&project_dir)?;

    let now = now_rfc3339();
    let metadata = ProjectMetadata {
        project_id: project_id.to_string(),
        name: name.to_string(),
        git_origin,
        indexed_at: now.clone(),
        source_path: source_path
            .canonicalize()
            .unwrap_or_else(|_| source_path.to_path_buf())
            .to_string_lossy()
            .to_string(),
        last_used: now,
    };

    let json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| StorageError::CorruptState(e.to_string()))?;
    std::fs::write(project_dir.join(METADATA_FILE), json)?;
    Ok(metadata)
}

/// Touch `last_used` without changing `indexed_at`.
pub fn touch_project(data_dir: &Path, project_id: &str) -> Result<(), StorageError> {
    let Some(mut metadata) = get_project_metadata(data_dir, project_id)? else {
        return Ok(());
    };
    metadata.last_used = now_rfc3339();
    let json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| StorageError::CorruptState(e.to_string()))?;
    std::fs::write(data_dir.join(project_id).join(METADATA_FILE), json)?;
    Ok(())
}

pub fn get_project_metadata(
    data_dir: &Path,
    project_id: &str,
) -> Result<Option<ProjectMetadata>, StorageError> {
    let path = data_dir.join(project_id).join(METADATA_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let metadata = serde_json::from_str(&content)
        .map_err(|e| StorageError::CorruptState(e.to_string()))?;
    Ok(Some(metadata))
}

/// Scan the data directory for indexed projects.
pub fn list_projects(data_dir: &Path) -> Result<Vec<ProjectMetadata>, StorageError> {
    let mut projects = Vec::new();
    if !data_dir.exists() {
        return Ok(projects);
    }
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let project_id = entry.file_name().to_string_lossy().to_string();
        if let Some(metadata) = get_project_metadata(data_dir, &project_id)? {
            projects.push(metadata);
        }
    }
    projects.sort_by(|a, b| a.project_id.cmp(&b.project_id));
    Ok(projects)
}

/// Delete a project's entire data directory. Errors with name suggestions
/// when the id does not exist.
pub fn delete_project(data_dir: &Path, project_id: &str) -> Result<(), StorageError> {
    let project_dir = data_dir.join(project_id);
    if !project_dir.is_dir() {
        let suggestions = suggest_projects(data_dir, project_id)?;
        return Err(StorageError::project_not_found(project_id, suggestions));
    }
    std::fs::remove_dir_all(project_dir)?;
    Ok(())
}

/// Up to three "did you mean" entries for an unknown project reference.
pub fn suggest_projects(data_dir: &Path, query: &str) -> Result<Vec<String>, StorageError> {
    let needle = query.to_lowercase();
    let mut suggestions: Vec<String> = list_projects(data_dir)?
        .into_iter()
        .filter(|p| {
            p.project_id.to_lowercase().contains(&needle)
                || p.name.to_lowercase().contains(&needle)
                || needle.contains(&p.name.to_lowercase())
        })
        .map(|p| format!("{} ({})", p.name, p.project_id))
        .collect();
    suggestions.truncate(3);
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        update_project_metadata(dir.path(), "abc123", "my-repo", None, source.path()).unwrap();

        let loaded = get_project_metadata(dir.path(), "abc123").unwrap().unwrap();
        assert_eq!(loaded.name, "my-repo");
        assert!(loaded.git_origin.is_none());

        let projects = list_projects(dir.path()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].project_id, "abc123");
    }

    #[test]
    fn delete_unknown_project_suggests_alternatives() {
        let dir = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        update_project_metadata(dir.path(), "abc123", "acme-api", None, source.path()).unwrap();

        let err = delete_project(dir.path(), "acme").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("acme-api"), "got: {message}");

        delete_project(dir.path(), "abc123").unwrap();
        assert!(list_projects(dir.path()).unwrap().is_empty());
    }
}
