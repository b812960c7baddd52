//! Per-language structural extraction.
//!
//! Each language module walks its tree-sitter AST and produces CodeObjects
//! plus the raw material for relationship edges. Cross-file targets stay
//! name-only stubs; resolution beyond the current file happens at query time.

mod java;
mod javascript;
mod kotlin;
mod python;

use codecontext_core::error::ParseError;
use codecontext_core::languages::Language;
use codecontext_core::types::{CodeObject, RelationKind, Relationship};
use std::collections::HashMap;

/// Everything extracted from one source file.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub objects: Vec<CodeObject>,
    /// Import statements, carried into chunk context.
    pub imports: Vec<String>,
    /// (source object id, supertype name, INHERITS|IMPLEMENTS)
    pub supertypes: Vec<SupertypeEdge>,
}

#[derive(Debug, Clone)]
pub struct SupertypeEdge {
    pub source_id: String,
    pub target_name: String,
    pub kind: RelationKind,
}

/// Extract code objects from a single file. Parse failures bubble up as
/// `ParseError`; the sync engine logs and skips the file.
pub fn extract_file(
    file_path: &str,
    relative_path: &str,
    source: &str,
    language: Language,
) -> Result<FileExtraction, ParseError> {
    match language {
        Language::Python => python::extract(file_path, relative_path, source),
        Language::Java => java::extract(file_path, relative_path, source),
        Language::Kotlin => kotlin::extract(file_path, relative_path, source),
        Language::JavaScript => {
            javascript::extract(file_path, relative_path, source, Language::JavaScript)
        }
        Language::TypeScript => {
            javascript::extract(file_path, relative_path, source, Language::TypeScript)
        }
    }
}

/// Build relationship edges for one file's extraction.
///
/// Intra-file targets resolve to concrete ids; everything else becomes a
/// name-carrying stub with `resolved = false`.
pub fn build_relationships(extraction: &FileExtraction) -> Vec<Relationship> {
    let by_name: HashMap<&str, &CodeObject> = extraction
        .objects
        .iter()
        .map(|object| (object.name.as_str(), object))
        .collect();
    let mut edges = Vec::new();

    for object in &extraction.objects {
        // Containment is always resolved: chunks carry their parent's id.
        if let Some(parent_id) = &object.parent_id {
            edges.push(Relationship {
                source_id: parent_id.clone(),
                target_id: Some(object.id.clone()),
                target_name: object.name.clone(),
                kind: RelationKind::Contains,
                resolved: true,
            });
        }

        for callee in &object.ast_metadata.calls {
            if callee == &object.name {
                continue;
            }
            let target = by_name.get(callee.as_str());
            edges.push(Relationship {
                source_id: object.id.clone(),
                target_id: target.map(|t| t.id.clone()),
                target_name: callee.clone(),
                kind: RelationKind::Calls,
                resolved: target.is_some(),
            });
        }

        for reference in &object.ast_metadata.references {
            // Only keep references that look like bare names worth joining.
            let head = reference.split(['.', '(']).next().unwrap_or(reference);
            if head.is_empty() || head == object.name {
                continue;
            }
            if let Some(target) = by_name.get(head) {
                edges.push(Relationship {
                    source_id: object.id.clone(),
                    target_id: Some(target.id.clone()),
                    target_name: head.to_string(),
                    kind: RelationKind::References,
                    resolved: true,
                });
            }
        }
    }

    for supertype in &extraction.supertypes {
        let target = by_name.get(supertype.target_name.as_str());
        edges.push(Relationship {
            source_id: supertype.source_id.clone(),
            target_id: target.map(|t| t.id.clone()),
            target_name: supertype.target_name.clone(),
            kind: supertype.kind,
            resolved: target.is_some(),
        });
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_call_edges_resolve_within_the_file() {
        let source = "\
def helper():
    return 1

def caller():
    return helper()
";
        let extraction = extract_file("/repo/a.py", "a.py", source, Language::Python).unwrap();
        let edges = build_relationships(&extraction);
        let call = edges
            .iter()
            .find(|e| e.kind == RelationKind::Calls && e.target_name == "helper")
            .expect("caller -> helper edge");
        assert!(call.resolved);
        assert!(call.target_id.is_some());
    }

    #[test]
    fn unresolved_calls_become_name_stubs() {
        let source = "\
def caller():
    return external_service()
";
        let extraction = extract_file("/repo/a.py", "a.py", source, Language::Python).unwrap();
        let edges = build_relationships(&extraction);
        let stub = edges
            .iter()
            .find(|e| e.target_name == "external_service")
            .expect("stub edge");
        assert!(!stub.resolved);
        assert!(stub.target_id.is_none());
    }

    #[test]
    fn methods_produce_contains_edges() {
        let source = "\
class OrderService:
    def process(self):
        pass
";
        let extraction = extract_file("/repo/a.py", "a.py", source, Language::Python).unwrap();
        let edges = build_relationships(&extraction);
        assert!(edges
            .iter()
            .any(|e| e.kind == RelationKind::Contains && e.resolved));
    }
}
