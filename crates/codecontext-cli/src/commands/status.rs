use crate::context::CliContext;
use codecontext_store::{metadata, VectorStore as _};
use std::path::Path;

pub fn run(repo_path: &Path, config_file: Option<&str>) -> anyhow::Result<()> {
    let context = CliContext::build(repo_path, config_file)?;
    let project_dir = context.project_dir();
    if !project_dir.exists() {
        println!(
            "Project is not indexed yet. Run 'codecontext init' and 'codecontext index' first."
        );
        return Ok(());
    }

    let store = context.open_store()?;
    let state = store.get_index_state()?;
    let statistics = store.get_statistics()?;

    println!("Project: {}", context.collection_name);
    println!("  project id: {}", context.project_id);
    if let Some(meta) = metadata::get_project_metadata(&context.data_dir, &context.collection_name)? {
        println!("  name:       {}", meta.name);
        if let Some(origin) = meta.git_origin {
            println!("  git origin: {origin}");
        }
        println!("  indexed at: {}", meta.indexed_at);
    }

    match state {
        Some(state) => {
            match &state.last_commit_hash {
                Some(commit) => {
                    println!("  last commit: {}", &commit[..commit.len().min(12)])
                }
                None => println!("  last commit: (not under git)"),
            }
            println!("  files:      {}", state.total_files);
            println!("  chunks:     {}", state.total_objects);
            if !state.languages.is_empty() {
                println!("  languages:  {}", state.languages.join(", "));
            }
            println!("  updated at: {}", state.updated_at);
        }
        None => println!("  (no index state — run 'codecontext index')"),
    }

    println!("  code chunks:     {}", statistics.code_count);
    println!("  document chunks: {}", statistics.document_count);
    println!("  relationships:   {}", statistics.relationship_count);
    Ok(())
}
