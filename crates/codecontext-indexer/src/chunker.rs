//! Chunking policy: bound chunk size so embeddings stay accurate.
//!
//! Classes above the size threshold are collapsed to a summary chunk
//! (signature + docstring + member names); their methods are always emitted
//! as independent chunks pointing back via `parent_id`. Every chunk carries
//! added context (file imports, enclosing class signature) in front of its
//! raw content, and the raw content must survive verbatim inside the final
//! content.

use crate::languages::FileExtraction;
use codecontext_core::constants::{MAX_CLASS_METHODS, MAX_OBJECT_BYTES};
use codecontext_core::types::{CodeChunk, CodeObject, ObjectType};
use std::collections::HashMap;

const MAX_CONTEXT_IMPORTS: usize = 12;

/// Turn one file's extraction into retrievable chunks.
pub fn chunk_objects(extraction: &FileExtraction) -> Vec<CodeChunk> {
    let method_counts = count_children(&extraction.objects);
    let imports_context = imports_prefix(&extraction.imports);
    let signatures: HashMap<&str, &str> = extraction
        .objects
        .iter()
        .map(|object| (object.id.as_str(), object.signature.as_str()))
        .collect();

    let mut chunks = Vec::with_capacity(extraction.objects.len());
    for object in &extraction.objects {
        let chunk = if is_class_like(object) {
            let methods = method_counts.get(object.id.as_str()).copied().unwrap_or(0);
            if methods >= MAX_CLASS_METHODS || object.content.len() > MAX_OBJECT_BYTES {
                summary_chunk(object, &imports_context)
            } else {
                whole_chunk(object, &imports_context, None)
            }
        } else if let Some(parent_id) = &object.parent_id {
            let parent_signature = signatures.get(parent_id.as_str()).copied();
            whole_chunk(object, &imports_context, parent_signature)
        } else {
            whole_chunk(object, &imports_context, None)
        };

        debug_assert!(
            chunk.content.contains(&chunk.raw_content),
            "raw_content must be a substring of content"
        );
        chunks.push(chunk);
    }
    chunks
}

fn is_class_like(object: &CodeObject) -> bool {
    matches!(
        object.object_type,
        ObjectType::Class | ObjectType::Interface | ObjectType::Enum
    )
}

fn count_children(objects: &[CodeObject]) -> HashMap<&str, usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for object in objects {
        if let Some(parent_id) = &object.parent_id {
            *counts.entry(parent_id.as_str()).or_insert(0) += 1;
        }
    }
    counts
}

fn imports_prefix(imports: &[String]) -> String {
    if imports.is_empty() {
        return String::new();
    }
    let mut prefix = imports
        .iter()
        .take(MAX_CONTEXT_IMPORTS)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    prefix.push_str("\n\n");
    prefix
}

fn whole_chunk(
    object: &CodeObject,
    imports_context: &str,
    parent_signature: Option<&str>,
) -> CodeChunk {
    let raw_content = object.content.clone();
    let mut content = String::new();
    content.push_str(imports_context);
    if let Some(signature) = parent_signature {
        if !signature.is_empty() {
            content.push_str(signature);
            content.push_str("\n");
        }
    }
    content.push_str(&raw_content);

    CodeChunk {
        object: object.clone(),
        content,
        raw_content,
        imports: Vec::new(),
        parent_definition: parent_signature.map(str::to_string),
        is_summary: false,
    }
}

/// Signature + docstring + member names standing in for an oversize body.
fn summary_chunk(object: &CodeObject, imports_context: &str) -> CodeChunk {
    let mut summary = String::new();
    summary.push_str(&object.signature);
    if let Some(docstring) = &object.docstring {
        summary.push_str("\n");
        summary.push_str(docstring);
    }
    let members = member_names(object);
    if !members.is_empty() {
        summary.push_str("\nMembers: ");
        summary.push_str(&members.join(", "));
    }

    let content = format!("{imports_context}{summary}");
    CodeChunk {
        object: object.clone(),
        content,
        raw_content: summary,
        imports: Vec::new(),
        parent_definition: None,
        is_summary: true,
    }
}

/// Member names visible in the summary: declared enum members plus callee
/// names double as a cheap table of contents for huge classes.
fn member_names(object: &CodeObject) -> Vec<String> {
    if !object.ast_metadata.members.is_empty() {
        return object.ast_metadata.members.clone();
    }
    object.ast_metadata.calls.iter().take(24).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::extract_file;
    use codecontext_core::languages::Language;

    #[test]
    fn small_class_keeps_whole_body_and_method_chunks() {
        let source = r#"
import os

class Wallet:
    def balance(self):
        return 0

    def deposit(self, amount):
        return amount
"#;
        let extraction = extract_file("/repo/wallet.py", "wallet.py", source, Language::Python).unwrap();
        let chunks = chunk_objects(&extraction);
        assert_eq!(chunks.len(), 3);

        let class_chunk = &chunks[0];
        assert!(!class_chunk.is_summary);
        assert!(class_chunk.content.starts_with("import os"));
        assert!(class_chunk.content.contains(&class_chunk.raw_content));

        let method_chunk = &chunks[1];
        assert_eq!(
            method_chunk.parent_definition.as_deref(),
            Some("class Wallet")
        );
        assert!(method_chunk.content.contains("class Wallet"));
        assert!(method_chunk.content.contains(&method_chunk.raw_content));
    }

    #[test]
    fn oversize_class_becomes_summary_plus_methods() {
        let mut source = String::from("class Huge:\n");
        for i in 0..35 {
            source.push_str(&format!("    def method_{i}(self):\n        return {i}\n\n"));
        }
        let extraction = extract_file("/repo/huge.py", "huge.py", &source, Language::Python).unwrap();
        let chunks = chunk_objects(&extraction);

        let class_chunk = chunks
            .iter()
            .find(|c| c.object.name == "Huge")
            .expect("class chunk");
        assert!(class_chunk.is_summary);
        assert!(class_chunk.raw_content.starts_with("class Huge"));
        assert!(class_chunk.content.contains(&class_chunk.raw_content));
        // Methods stay independently retrievable.
        let method_chunks = chunks.iter().filter(|c| !c.is_summary).count();
        assert_eq!(method_chunks, 35);
    }

    #[test]
    fn raw_content_is_always_a_substring() {
        let source = r#"
import json
from typing import Any

def lonely():
    return json.dumps({})
"#;
        let extraction = extract_file("/repo/a.py", "a.py", source, Language::Python).unwrap();
        for chunk in chunk_objects(&extraction) {
            assert!(chunk.content.contains(&chunk.raw_content));
        }
    }
}
