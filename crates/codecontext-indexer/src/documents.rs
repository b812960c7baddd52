//! Document parsers: markdown section splitting and configuration-file
//! section extraction.

use codecontext_core::checksum;
use codecontext_core::types::{CodeReference, DocumentKind, DocumentNode};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn backtick_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"`([A-Z][A-Za-z0-9.]+)`").expect("valid regex"))
}

fn file_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"([A-Za-z_/]+\.(?:py|kt|java|ts|tsx|js|jsx))").expect("valid regex"))
}

fn env_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("valid regex")
    })
}

/// Split markdown on ATX headers of depth 2–6. Each section spans from its
/// header line to the line before the next header (or EOF).
pub fn parse_markdown(file_path: &str, relative_path: &str, source: &str) -> Vec<DocumentNode> {
    let lines: Vec<&str> = source.lines().collect();
    let mut header_lines = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if let Some((depth, title)) = parse_atx_header(line) {
            if (2..=6).contains(&depth) {
                header_lines.push((idx, depth, title));
            }
        }
    }

    let mut nodes = Vec::new();
    for (pos, (start_idx, depth, title)) in header_lines.iter().enumerate() {
        let end_idx = header_lines
            .get(pos + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(lines.len());
        let content = lines[*start_idx..end_idx].join("\n");
        let start_line = *start_idx as u32 + 1;
        let end_line = end_idx as u32;

        nodes.push(DocumentNode {
            id: checksum::chunk_id(relative_path, *start_idx, end_idx, &content),
            file_path: file_path.to_string(),
            relative_path: relative_path.to_string(),
            node_type: DocumentKind::Markdown,
            section_title: title.to_string(),
            start_line,
            end_line,
            code_references: extract_code_references(&content),
            content,
            config_keys: Vec::new(),
            env_references: Vec::new(),
            section_depth: *depth as u32,
            config_format: None,
        });
    }
    nodes
}

fn parse_atx_header(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some((hashes, rest.trim()))
}

fn extract_code_references(content: &str) -> Vec<CodeReference> {
    let mut references = Vec::new();
    let mut seen = BTreeSet::new();
    for capture in backtick_reference_pattern().captures_iter(content) {
        let name = capture[1].to_string();
        if seen.insert(name.clone()) {
            references.push(CodeReference {
                name,
                match_reason: "backtick reference".to_string(),
            });
        }
    }
    for capture in file_reference_pattern().captures_iter(content) {
        let name = capture[1].to_string();
        if seen.insert(name.clone()) {
            references.push(CodeReference {
                name,
                match_reason: "file reference".to_string(),
            });
        }
    }
    references
}

/// Parse a config file in its native format and emit one node per top-level
/// key, carrying flattened key paths, env references, and nesting depth.
pub fn parse_config(file_path: &str, relative_path: &str, source: &str) -> Vec<DocumentNode> {
    let Some(format) = config_format(relative_path) else {
        return Vec::new();
    };

    let sections: Vec<(String, ConfigValue)> = match format {
        "yaml" => serde_yaml::from_str::<serde_yaml::Value>(source)
            .ok()
            .map(yaml_sections)
            .unwrap_or_default(),
        "json" => serde_json::from_str::<serde_json::Value>(source)
            .ok()
            .map(json_sections)
            .unwrap_or_default(),
        "toml" => source
            .parse::<toml::Value>()
            .ok()
            .map(toml_sections)
            .unwrap_or_default(),
        "properties" => properties_sections(source),
        _ => Vec::new(),
    };

    sections
        .into_iter()
        .map(|(title, value)| {
            let mut keys = Vec::new();
            flatten_keys(&value, &title, &mut keys);
            let depth = value.depth();
            let content = value.render(format, &title, source);
            let (start_line, end_line) = locate_section(source, &title, format);

            DocumentNode {
                id: checksum::chunk_id(relative_path, 0, depth as usize, &format!("{title}|{content}")),
                file_path: file_path.to_string(),
                relative_path: relative_path.to_string(),
                node_type: DocumentKind::Config,
                section_title: title,
                start_line,
                end_line,
                env_references: extract_env_references(&content),
                content,
                code_references: Vec::new(),
                config_keys: keys,
                section_depth: depth,
                config_format: Some(format.to_string()),
            }
        })
        .collect()
}

pub fn config_format(relative_path: &str) -> Option<&'static str> {
    let ext = relative_path.rsplit('.').next()?;
    match ext {
        "yaml" | "yml" => Some("yaml"),
        "json" => Some("json"),
        "toml" => Some("toml"),
        "properties" => Some("properties"),
        _ => None,
    }
}

fn extract_env_references(content: &str) -> Vec<String> {
    let mut references = Vec::new();
    let mut seen = BTreeSet::new();
    for capture in env_reference_pattern().captures_iter(content) {
        let name = capture
            .get(1)
            .or_else(|| capture.get(2))
            .map(|m| m.as_str().to_string());
        if let Some(name) = name {
            if seen.insert(name.clone()) {
                references.push(name);
            }
        }
    }
    references
}

/// Format-agnostic config tree used for flattening and depth measurement.
#[derive(Debug, Clone)]
enum ConfigValue {
    Leaf(String),
    Map(Vec<(String, ConfigValue)>),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    fn depth(&self) -> u32 {
        match self {
            ConfigValue::Leaf(_) => 1,
            ConfigValue::Map(entries) => {
                1 + entries.iter().map(|(_, v)| v.depth()).max().unwrap_or(0)
            }
            ConfigValue::List(items) => {
                1 + items.iter().map(ConfigValue::depth).max().unwrap_or(0)
            }
        }
    }

    fn render(&self, format: &str, title: &str, _source: &str) -> String {
        let mut out = String::new();
        match format {
            "properties" => self.render_properties(title, &mut out),
            _ => {
                out.push_str(title);
                out.push_str(":\n");
                self.render_indented(1, &mut out);
            }
        }
        out
    }

    fn render_indented(&self, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);
        match self {
            ConfigValue::Leaf(value) => {
                out.push_str(&pad);
                out.push_str(value);
                out.push('\n');
            }
            ConfigValue::Map(entries) => {
                for (key, value) in entries {
                    match value {
                        ConfigValue::Leaf(leaf) => {
                            out.push_str(&format!("{pad}{key}: {leaf}\n"));
                        }
                        _ => {
                            out.push_str(&format!("{pad}{key}:\n"));
                            value.render_indented(indent + 1, out);
                        }
                    }
                }
            }
            ConfigValue::List(items) => {
                for item in items {
                    match item {
                        ConfigValue::Leaf(leaf) => out.push_str(&format!("{pad}- {leaf}\n")),
                        _ => {
                            out.push_str(&format!("{pad}-\n"));
                            item.render_indented(indent + 1, out);
                        }
                    }
                }
            }
        }
    }

    fn render_properties(&self, prefix: &str, out: &mut String) {
        match self {
            ConfigValue::Leaf(value) => {
                out.push_str(&format!("{prefix}={value}\n"));
            }
            ConfigValue::Map(entries) => {
                for (key, value) in entries {
                    value.render_properties(&format!("{prefix}.{key}"), out);
                }
            }
            ConfigValue::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    item.render_properties(&format!("{prefix}[{idx}]"), out);
                }
            }
        }
    }
}

fn flatten_keys(value: &ConfigValue, prefix: &str, keys: &mut Vec<String>) {
    match value {
        ConfigValue::Leaf(_) => keys.push(prefix.to_string()),
        ConfigValue::Map(entries) => {
            for (key, child) in entries {
                flatten_keys(child, &format!("{prefix}.{key}"), keys);
            }
        }
        ConfigValue::List(_) => keys.push(prefix.to_string()),
    }
}

fn yaml_sections(root: serde_yaml::Value) -> Vec<(String, ConfigValue)> {
    match root {
        serde_yaml::Value::Mapping(map) => map
            .into_iter()
            .filter_map(|(key, value)| {
                let key = yaml_scalar(&key)?;
                Some((key, yaml_value(value)))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn yaml_value(value: serde_yaml::Value) -> ConfigValue {
    match value {
        serde_yaml::Value::Mapping(map) => ConfigValue::Map(
            map.into_iter()
                .filter_map(|(key, value)| {
                    let key = yaml_scalar(&key)?;
                    Some((key, yaml_value(value)))
                })
                .collect(),
        ),
        serde_yaml::Value::Sequence(items) => {
            ConfigValue::List(items.into_iter().map(yaml_value).collect())
        }
        serde_yaml::Value::String(s) => ConfigValue::Leaf(s),
        serde_yaml::Value::Number(n) => ConfigValue::Leaf(n.to_string()),
        serde_yaml::Value::Bool(b) => ConfigValue::Leaf(b.to_string()),
        serde_yaml::Value::Null => ConfigValue::Leaf("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_value(tagged.value),
    }
}

fn json_sections(root: serde_json::Value) -> Vec<(String, ConfigValue)> {
    match root {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key, json_value(value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn json_value(value: serde_json::Value) -> ConfigValue {
    match value {
        serde_json::Value::Object(map) => ConfigValue::Map(
            map.into_iter()
                .map(|(key, value)| (key, json_value(value)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            ConfigValue::List(items.into_iter().map(json_value).collect())
        }
        serde_json::Value::String(s) => ConfigValue::Leaf(s),
        other => ConfigValue::Leaf(other.to_string()),
    }
}

fn toml_sections(root: toml::Value) -> Vec<(String, ConfigValue)> {
    match root {
        toml::Value::Table(table) => table
            .into_iter()
            .map(|(key, value)| (key, toml_value(value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn toml_value(value: toml::Value) -> ConfigValue {
    match value {
        toml::Value::Table(table) => ConfigValue::Map(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_value(value)))
                .collect(),
        ),
        toml::Value::Array(items) => {
            ConfigValue::List(items.into_iter().map(toml_value).collect())
        }
        toml::Value::String(s) => ConfigValue::Leaf(s),
        other => ConfigValue::Leaf(other.to_string()),
    }
}

/// `.properties`: group `a.b.c=value` lines by their first key segment.
fn properties_sections(source: &str) -> Vec<(String, ConfigValue)> {
    let mut groups: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        let top = key.split('.').next().unwrap_or(key).to_string();
        let rest = key.strip_prefix(&top).unwrap_or("").trim_start_matches('.');
        match groups.iter_mut().find(|(name, _)| *name == top) {
            Some((_, entries)) => entries.push((rest.to_string(), value.to_string())),
            None => groups.push((top, vec![(rest.to_string(), value.to_string())])),
        }
    }

    groups
        .into_iter()
        .map(|(top, entries)| {
            let value = if entries.len() == 1 && entries[0].0.is_empty() {
                ConfigValue::Leaf(entries[0].1.clone())
            } else {
                ConfigValue::Map(
                    entries
                        .into_iter()
                        .map(|(rest, value)| {
                            if rest.is_empty() {
                                ("value".to_string(), ConfigValue::Leaf(value))
                            } else {
                                (rest, ConfigValue::Leaf(value))
                            }
                        })
                        .collect(),
                )
            };
            (top, value)
        })
        .collect()
}

/// Best-effort line span of a top-level section inside the raw text.
fn locate_section(source: &str, title: &str, format: &str) -> (u32, u32) {
    let needle = match format {
        "toml" => format!("[{title}"),
        "properties" => title.to_string(),
        _ => format!("{title}:"),
    };
    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(&needle) || trimmed.starts_with(&format!("\"{title}\"")) {
            return (idx as u32 + 1, idx as u32 + 1);
        }
    }
    (0, 0)
}
