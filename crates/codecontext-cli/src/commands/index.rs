use crate::context::CliContext;
use codecontext_indexer::sync::SyncEngine;
use codecontext_store::metadata;
use codecontext_vcs::GitRepo;
use std::path::Path;
use std::time::Instant;
use tracing::info;

pub fn run(
    repo_path: &Path,
    incremental: bool,
    force: bool,
    config_file: Option<&str>,
) -> anyhow::Result<()> {
    let context = CliContext::build(repo_path, config_file)?;
    let mut store = context.open_store()?;
    let mut coordinator = context.build_coordinator()?;

    let started = Instant::now();
    let outcome = {
        let mut engine = SyncEngine::new(
            &context.config,
            repo_path,
            store.as_mut(),
            &mut coordinator,
        );
        if incremental {
            engine.incremental_sync()?
        } else {
            engine.full_sync(force)?
        }
    };
    let elapsed = started.elapsed();

    // Refresh the registry entry after a successful run.
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
    if !outcome.no_op {
        metadata::update_project_metadata(
            &context.data_dir,
            &context.collection_name,
            &name,
            git_origin,
            repo_path,
        )?;
    }

    info!(
        files = outcome.files_indexed,
        objects = outcome.objects_indexed,
        elapsed_ms = elapsed.as_millis() as u64,
        "index run finished"
    );

    if outcome.no_op {
        println!("Index is already up to date.");
        return Ok(());
    }
    println!(
        "Indexed {} file{} in {:.1}s",
        outcome.files_indexed,
        if outcome.files_indexed == 1 { "" } else { "s" },
        elapsed.as_secs_f64()
    );
    println!("  code objects:  {}", outcome.objects_indexed);
    println!("  documents:     {}", outcome.documents_indexed);
    println!("  relationships: {}", outcome.relationships_indexed);
    if outcome.files_skipped > 0 {
        println!("  skipped (unchanged): {}", outcome.files_skipped);
    }
    if outcome.files_deleted > 0 {
        println!("  removed (deleted files): {}", outcome.files_deleted);
    }
    if let Some(commit) = &outcome.last_commit {
        println!("  at commit: {}", &commit[..commit.len().min(12)]);
    }
    Ok(())
}
