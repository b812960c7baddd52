use codecontext_core::config::Config;
use codecontext_store::metadata;

fn data_dir(config_file: Option<&str>) -> anyhow::Result<std::path::PathBuf> {
    let cwd = std::env::current_dir()?;
    let overrides = match config_file {
        Some(path) => Some(std::fs::read_to_string(path)?.parse::<toml::Value>()?),
        None => None,
    };
    let config = Config::load(&cwd, overrides)?;
    Ok(config.data_dir())
}

pub fn list(config_file: Option<&str>) -> anyhow::Result<()> {
    let data_dir = data_dir(config_file)?;
    let projects = metadata::list_projects(&data_dir)?;
    if projects.is_empty() {
        println!("No indexed projects under {}", data_dir.display());
        println!("Run 'codecontext init' inside a repository to get started.");
        return Ok(());
    }

    println!("{} indexed project(s):", projects.len());
    for project in projects {
        println!("  {} ({})", project.name, project.project_id);
        println!("    source:     {}", project.source_path);
        println!("    indexed at: {}", project.indexed_at);
    }
    Ok(())
}

pub fn delete(project_id: &str, config_file: Option<&str>) -> anyhow::Result<()> {
    let data_dir = data_dir(config_file)?;
    metadata::delete_project(&data_dir, project_id)?;
    println!("Deleted project '{project_id}'");
    Ok(())
}
