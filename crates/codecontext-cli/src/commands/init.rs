use crate::context::CliContext;
use codecontext_store::{metadata, VectorStore as _};
use codecontext_vcs::GitRepo;
use std::path::Path;
use tracing::info;

pub fn run(repo_path: &Path, config_file: Option<&str>) -> anyhow::Result<()> {
    let context = CliContext::build(repo_path, config_file)?;

    std::fs::create_dir_all(context.project_dir())?;
    let mut store = context.open_store()?;
    store.close()?;

    let git_origin = GitRepo::open(repo_path)
        .ok()
        .and_then(|repo| repo.remote_origin_url());
    let name = if context.config.project.name.is_empty() {
        repo_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    } else {
        context.config.project.name.clone()
    };
    metadata::update_project_metadata(
        &context.data_dir,
        &context.collection_name,
        &name,
        git_origin,
        repo_path,
    )?;

    info!(project = context.collection_name, "project initialized");
    println!("Initialized project '{}'", name);
    println!("  project id: {}", context.project_id);
    println!("  collection: {}", context.collection_name);
    println!("  data dir:   {}", context.project_dir().display());
    println!("\nNext: codecontext index");
    Ok(())
}
