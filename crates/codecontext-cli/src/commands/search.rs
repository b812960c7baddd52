use crate::context::CliContext;
use codecontext_core::instruction::InstructionType;
use codecontext_core::types::{ResultType, SearchQuery};
use codecontext_query::formatters::{format_results, OutputFormat, EXPANDABLE_FIELDS};
use codecontext_query::Retriever;
use codecontext_store::translation::TranslationRegistry;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub struct SearchArgs {
    pub repo_path: PathBuf,
    pub query: String,
    pub limit: usize,
    pub format: String,
    pub language: Option<String>,
    pub file: Option<String>,
    pub type_filter: Option<String>,
    pub expand: Vec<String>,
    pub instruction: Option<String>,
    pub config_file: Option<String>,
}

pub fn run(args: SearchArgs) -> anyhow::Result<()> {
    let context = CliContext::build(&args.repo_path, args.config_file.as_deref())?;
    let store = context.open_store()?;
    let mut coordinator = context.build_coordinator()?;

    let type_filter = match args.type_filter.as_deref() {
        Some(raw) => Some(ResultType::parse(raw).ok_or_else(|| {
            anyhow::anyhow!("invalid --type '{raw}': expected 'code' or 'document'")
        })?),
        None => None,
    };

    let instruction = match args.instruction.as_deref() {
        Some(raw) => InstructionType::parse(raw).ok_or_else(|| {
            anyhow::anyhow!(
                "invalid --instruction '{raw}': expected one of {}",
                InstructionType::ALL
                    .iter()
                    .map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?,
        None => InstructionType::Nl2CodeQuery,
    };

    let mut expand = BTreeSet::new();
    for field in &args.expand {
        let field = field.trim().to_ascii_lowercase();
        if !EXPANDABLE_FIELDS.contains(&field.as_str()) {
            anyhow::bail!(
                "invalid --expand '{field}': expected one of {}",
                EXPANDABLE_FIELDS.join(", ")
            );
        }
        expand.insert(field);
    }

    let query = SearchQuery {
        query: args.query.clone(),
        limit: args.limit,
        language_filter: args.language,
        file_filter: args.file,
        type_filter,
    };

    let mut retriever = Retriever::new(&context.config, store.as_ref(), &mut coordinator);
    if context.config.translation.enabled {
        let translator = TranslationRegistry::with_builtins().build(&context.config)?;
        retriever = retriever.with_translator(translator);
    }
    let results = retriever.search(&query, instruction)?;

    let output = format_results(
        &results,
        OutputFormat::parse(&args.format),
        &args.query,
        Some(store.as_ref()),
        &expand,
    );
    println!("{output}");
    Ok(())
}
