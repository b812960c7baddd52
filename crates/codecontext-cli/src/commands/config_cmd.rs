use codecontext_core::config::{self, Config};

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# CodeContext global configuration.
# Project-level overrides go in .codecontext.toml at the repository root.

[embeddings]
provider = "fastembed"

[embeddings.fastembed]
model = "BGESmallENV15Q"
dimensions = 384
batch_size = 64
device = "cpu"

[storage]
provider = "embedded"
mode = "embedded"
# fusion_method = "rrf"   # or "dbsf"
# upsert_batch_size = 100

[search]
enable_graph_expansion = false
graph_max_hops = 2
graph_ppr_threshold = 0.15
max_chunks_per_file = 3

[translation]
enabled = false

[indexing]
parallel_workers = 0      # 0 = derive from CPU count
max_file_size_mb = 5

[project]
include = ["**/*"]
exclude = [".git/", "node_modules/", "target/", "build/", "dist/"]

[logging]
level = "info"
"#;

pub fn init() -> anyhow::Result<()> {
    let path = config::global_config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

pub fn show(config_file: Option<&str>) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let overrides = match config_file {
        Some(path) => Some(std::fs::read_to_string(path)?.parse::<toml::Value>()?),
        None => None,
    };
    let config = Config::load(&cwd, overrides)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path() -> anyhow::Result<()> {
    println!("{}", config::global_config_path().display());
    Ok(())
}

pub fn edit() -> anyhow::Result<()> {
    let path = config::global_config_path();
    if !path.exists() {
        init()?;
    }
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = std::process::Command::new(&editor).arg(&path).status()?;
    if !status.success() {
        anyhow::bail!("editor '{editor}' exited with {status}");
    }
    Ok(())
}

pub fn validate(config_file: Option<&str>) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let overrides = match config_file {
        Some(path) => Some(std::fs::read_to_string(path)?.parse::<toml::Value>()?),
        None => None,
    };
    match Config::load(&cwd, overrides) {
        Ok(config) => {
            println!("Configuration is valid.");
            println!("  storage provider:   {}", config.storage.provider);
            println!("  embedding provider: {}", config.embeddings.provider);
            println!("  fusion method:      {}", config.storage.fusion_method);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("invalid configuration: {e}")),
    }
}
